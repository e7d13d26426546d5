//! Turns a settled ghost set into command batches on the real sequence.
//!
//! The first batch carries the collision handling and every clip and
//! transition edit. A second, trailing batch re-fits transitions on the
//! clips the first batch touched.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use timeline::{
    edit_operations::{fit_transitions, move_clip, ripple, EditPlan},
    ClipId, CommandLog, EditCommand, Frame, Sequence, TimelineError, TrackId, Transition,
    TransitionEdge,
};

use crate::{
    collision::{self, make_room_for_transition, Placement},
    context::{clean_up_selections, GestureContext},
    ghost::{ClipFrame, Ghost, GhostSet, GhostTarget},
    tool::{Edge, Tool, TransitionAction},
    EngineError,
};

/// What a committed gesture changed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureResult {
    /// Clips the batches actually mutated, ascending.
    pub mutated: Vec<ClipId>,
    /// Commands in the main batch.
    pub commands: usize,
    /// Commands in the trailing transition batch.
    pub corrections: usize,
    /// Commands refused because they touched a locked track.
    pub dropped: usize,
}

impl GestureResult {
    pub fn is_empty(&self) -> bool {
        self.commands == 0 && self.corrections == 0
    }
}

/// Applies `set` to `sequence` and appends the resulting batches to `log`.
/// On error the sequence is left as it was and nothing is appended.
pub fn commit(
    set: &GhostSet,
    tool: &Tool,
    sequence: &mut Sequence,
    ctx: &mut GestureContext,
    log: &mut dyn CommandLog,
) -> Result<GestureResult, EngineError> {
    let live = set.live(sequence);
    for (ghost, _) in set.ghosts().iter().zip(&live).filter(|(_, alive)| !**alive) {
        warn!(ghost = ?ghost.target, "skipping ghost whose clip is gone");
    }
    let changed = set
        .ghosts()
        .iter()
        .zip(&live)
        .any(|(ghost, alive)| *alive && ghost.has_changed());
    if !changed {
        return Ok(GestureResult::default());
    }

    let mut plan = EditPlan::new(sequence);
    let mut placements = placements(set, tool, &live);
    let keep = set.clip_ids();
    let mut selection_shift: Option<(Frame, Frame)> = None;

    match tool {
        Tool::Move | Tool::Trim { .. } | Tool::Slide => {
            collision::overwrite(&mut plan, &placements, &keep);
        }
        Tool::Insert => {
            let ghost_tracks: Vec<TrackId> = placements
                .iter()
                .map(|p| p.track)
                .chain(set.ghosts().iter().map(|g| g.old_track))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let tracks = if ctx.settings.ripple_all_tracks_on_insert {
                None
            } else {
                Some(ghost_tracks.as_slice())
            };
            match plan.atomic(|plan| collision::insert(plan, set, &placements, tracks)) {
                Ok(outcome) if outcome.ghost_shift != 0 => {
                    for placement in &mut placements {
                        placement.timeline_in += outcome.ghost_shift;
                        placement.timeline_out += outcome.ghost_shift;
                    }
                    selection_shift = Some((Frame::MIN, outcome.ghost_shift));
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "insert could not make room"),
            }
        }
        Tool::RippleTrim { edge } => {
            if let (Some(bounds), Some(frame_diff)) = (set.ripple(), ripple_frame_diff(set, &live)) {
                let length = match edge {
                    Edge::In => -frame_diff,
                    Edge::Out => frame_diff,
                };
                let point = bounds.point;
                match plan.atomic(|plan| ripple(plan, point, length, None, &keep)) {
                    Ok(_) => selection_shift = Some((point, length)),
                    Err(err) => warn!(%err, point, length, "ripple failed"),
                }
            }
        }
        Tool::Roll { .. } | Tool::Slip | Tool::Transition { .. } => {}
    }

    for placement in &placements {
        let Placement {
            clip,
            track,
            timeline_in,
            timeline_out,
            media_in,
        } = *placement;
        let moved = plan.atomic(|plan| {
            move_clip(plan, clip, track, timeline_in, timeline_out, media_in)
        });
        if let Err(err) = moved {
            warn!(%err, %clip, "skipping clip edit");
        }
    }

    for (ghost, _) in set.ghosts().iter().zip(&live).filter(|(_, alive)| **alive) {
        let edited = match tool {
            Tool::Transition { action } => plan.atomic(|plan| commit_transition(plan, ghost, action)),
            _ if ghost.resize_edge().is_some() => plan.atomic(|plan| resize_transition(plan, ghost)),
            _ => Ok(()),
        };
        if let Err(err) = edited {
            warn!(%err, ghost = ?ghost.target, "skipping transition edit");
        }
    }

    if plan.is_empty() {
        return Ok(GestureResult {
            dropped: plan.dropped(),
            ..GestureResult::default()
        });
    }

    let label = tool.name().to_string();
    let dropped = plan.dropped();
    let mut mutated: BTreeSet<ClipId> = plan.commands().iter().filter_map(touched_clip).collect();
    let mut batch = plan.into_batch(label.clone());
    batch.apply(sequence)?;
    let commands = batch.len();
    log.append(batch);

    let mut corrections = 0;
    if let Some((applied, touched)) = refit_transitions(sequence, &mutated, &label, log) {
        corrections = applied;
        mutated.extend(touched);
    }

    if let Some((point, length)) = selection_shift {
        for selection in &mut ctx.selections {
            // locked tracks do not ripple
            if selection.old_in >= point && !sequence.is_track_locked(selection.old_track) {
                selection.shift(length);
            }
        }
    }
    clean_up_selections(&mut ctx.selections);
    ctx.selections.iter_mut().for_each(|s| s.snapshot());

    let result = GestureResult {
        mutated: mutated.into_iter().collect(),
        commands,
        corrections,
        dropped,
    };
    info!(
        tool = %label,
        commands = result.commands,
        corrections = result.corrections,
        mutated = result.mutated.len(),
        dropped = result.dropped,
        "committed gesture"
    );
    Ok(result)
}

fn touched_clip(command: &EditCommand) -> Option<ClipId> {
    match command {
        EditCommand::InsertTransition { transition } => Some(transition.primary),
        other => other.clip_id(),
    }
}

/// Shared displacement of a ripple trim, read back from its ghosts.
fn ripple_frame_diff(set: &GhostSet, live: &[bool]) -> Option<Frame> {
    set.ghosts()
        .iter()
        .zip(live)
        .find(|(_, alive)| **alive)
        .map(|(ghost, _)| {
            if ghost.trim_in {
                ghost.in_point - ghost.old_in
            } else {
                ghost.out_point - ghost.old_out
            }
        })
}

/// Final clip positions the live ghosts ask for.
fn placements(set: &GhostSet, tool: &Tool, live: &[bool]) -> Vec<Placement> {
    let mut out = Vec::new();
    for (ghost, _) in set.ghosts().iter().zip(live).filter(|(_, alive)| **alive) {
        match ghost.target {
            GhostTarget::Clip(clip) => {
                let mut placement = Placement {
                    clip,
                    track: ghost.track,
                    timeline_in: ghost.in_point,
                    timeline_out: ghost.out_point,
                    media_in: ghost.media_in,
                };
                if matches!(tool, Tool::RippleTrim { .. }) && ghost.trim_in {
                    // the head is removed and the clip pulled back to its
                    // old in-point
                    let trimmed = ghost.in_point - ghost.old_in;
                    placement.timeline_in -= trimmed;
                    placement.timeline_out -= trimmed;
                }
                out.push(placement);
            }
            GhostTarget::Transition(_) if ghost.resizes_clip() => {
                out.extend(resize_placement(ghost));
            }
            GhostTarget::Transition(_) if ghost.resize_edge().is_some() => {}
            GhostTarget::Transition(_) if matches!(tool, Tool::Move | Tool::Insert) => {
                out.extend(transition_move_placements(ghost));
            }
            GhostTarget::Transition(_) | GhostTarget::NewTransition { .. } => {}
        }
    }
    out
}

/// Moving a transition drags the edge or cut it hangs on.
fn transition_move_placements(ghost: &Ghost) -> Vec<Placement> {
    let Some(transition) = &ghost.transition else {
        return Vec::new();
    };
    let frame_diff = ghost.in_point - ghost.old_in;
    let at = |clip: &ClipFrame, start: Frame, end: Frame, media_in: Frame| Placement {
        clip: clip.id,
        track: clip.track,
        timeline_in: start,
        timeline_out: end,
        media_in: media_in.max(0),
    };
    let primary = &transition.primary;
    match (transition.edge, &transition.secondary) {
        (TransitionEdge::Opening, Some(secondary)) => vec![
            at(
                primary,
                primary.timeline_in + frame_diff,
                primary.timeline_out,
                primary.media_in + frame_diff,
            ),
            at(
                secondary,
                secondary.timeline_in,
                secondary.timeline_out + frame_diff,
                secondary.media_in,
            ),
        ],
        (TransitionEdge::Opening, None) => vec![at(
            primary,
            primary.timeline_in + frame_diff,
            primary.timeline_out,
            primary.media_in + frame_diff,
        )],
        (TransitionEdge::Closing, _) => vec![at(
            primary,
            primary.timeline_in,
            primary.timeline_out + frame_diff,
            primary.media_in,
        )],
    }
}

/// The primary clip's edge where an outer transition edge was dragged to.
fn resize_placement(ghost: &Ghost) -> Option<Placement> {
    let primary = &ghost.transition.as_ref()?.primary;
    let (timeline_in, timeline_out) = match ghost.resize_edge()? {
        Edge::In => (ghost.in_point, primary.timeline_out),
        Edge::Out => (primary.timeline_in, ghost.out_point),
    };
    Some(Placement {
        clip: primary.id,
        track: primary.track,
        timeline_in,
        timeline_out,
        media_in: primary.media_in + (timeline_in - primary.timeline_in),
    })
}

fn resize_transition(plan: &mut EditPlan, ghost: &Ghost) -> Result<(), TimelineError> {
    let (Some(transition), Some(length)) = (&ghost.transition, ghost.transition_length()) else {
        return Ok(());
    };
    let Some(transition_id) = transition.id else {
        return Ok(());
    };
    if length == transition.length {
        return Ok(());
    }
    let command = if length >= 1 {
        EditCommand::ResizeTransition {
            transition_id,
            length,
        }
    } else {
        EditCommand::RemoveTransition { transition_id }
    };
    plan.push(command)?;
    Ok(())
}

fn commit_transition(
    plan: &mut EditPlan,
    ghost: &Ghost,
    action: &TransitionAction,
) -> Result<(), TimelineError> {
    let (Some(transition), Some(length)) = (&ghost.transition, ghost.transition_length()) else {
        return Ok(());
    };
    match action {
        TransitionAction::Resize { .. } => resize_transition(plan, ghost)?,
        TransitionAction::Create { .. } => {
            if length < 1 {
                return Ok(());
            }
            make_room_for_transition(plan, transition.primary.id, transition.edge, length)?;
            if let Some(secondary) = &transition.secondary {
                make_room_for_transition(plan, secondary.id, TransitionEdge::Closing, length)?;
            }
            let id = plan.allocate_transition_id();
            plan.push(EditCommand::InsertTransition {
                transition: Transition {
                    id,
                    kind: transition.kind.clone(),
                    primary: transition.primary.id,
                    secondary: transition.secondary.map(|s| s.id),
                    edge: transition.edge,
                    length,
                },
            })?;
        }
    }
    Ok(())
}

/// Applies the trailing batch that fits transitions to the final clip
/// positions. Returns how many commands it applied and the clips they
/// touched, or `None` when nothing needed fixing or the batch was rejected.
fn refit_transitions(
    sequence: &mut Sequence,
    clips: &BTreeSet<ClipId>,
    label: &str,
    log: &mut dyn CommandLog,
) -> Option<(usize, Vec<ClipId>)> {
    let mut plan = EditPlan::new(sequence);
    let clips: Vec<ClipId> = clips.iter().copied().collect();
    if let Err(err) = plan.atomic(|plan| fit_transitions(plan, &clips)) {
        warn!(%err, "could not fit transitions");
        return None;
    }
    if plan.is_empty() {
        return None;
    }
    let touched: Vec<ClipId> = plan
        .commands()
        .iter()
        .filter_map(|command| match command {
            EditCommand::RemoveTransition { transition_id }
            | EditCommand::ResizeTransition { transition_id, .. } => {
                sequence.transition(*transition_id).map(|t| t.primary)
            }
            other => touched_clip(other),
        })
        .collect();
    let mut batch = plan.into_batch(format!("{label} (transitions)"));
    if let Err(err) = batch.apply(sequence) {
        warn!(%err, "transition batch rejected");
        return None;
    }
    let applied = batch.len();
    log.append(batch);
    Some((applied, touched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Selection;
    use timeline::{Clip, CommandBatch, Fps, MediaSource, TransitionKind};

    fn create_test_clip(
        seq: &mut Sequence,
        track: i32,
        start: Frame,
        end: Frame,
        media_in: Frame,
    ) -> ClipId {
        let clip = Clip::new(
            seq.allocate_clip_id(),
            "test clip",
            TrackId(track),
            start,
            end,
            MediaSource::footage("test.mp4", 1000),
        )
        .with_media_in(media_in);
        seq.insert_clip(clip).unwrap()
    }

    fn placed(seq: &Sequence, ctx: &GestureContext, frame_diff: Frame) -> GhostSet {
        let mut set = GhostSet::build(seq, ctx);
        let live = set.live(seq);
        let start = ctx.selections.first().map_or(TrackId(0), |s| s.track);
        set.place(&ctx.tool, frame_diff, 0, start, &live);
        set
    }

    #[test]
    fn test_moving_shared_transition_moves_cut() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, -1, 0, 50, 0);
        let b = create_test_clip(&mut seq, -1, 50, 100, 20);
        let transition = seq
            .add_transition(b, TransitionEdge::Opening, Some(a), TransitionKind::Dissolve, 10)
            .unwrap();
        let mut ctx = GestureContext::new(Tool::Move)
            .with_selection(Selection::new(TrackId(-1), 40, 60));
        let set = placed(&seq, &ctx, 5);
        let mut log: Vec<CommandBatch> = Vec::new();

        let result = commit(&set, &Tool::Move, &mut seq, &mut ctx, &mut log).unwrap();
        assert_eq!(result.mutated, vec![a, b]);
        let a = seq.clip(a).unwrap();
        assert_eq!((a.timeline_in, a.timeline_out), (0, 55));
        let b = seq.clip(b).unwrap();
        assert_eq!((b.timeline_in, b.timeline_out, b.media_in), (55, 100, 25));
        assert_eq!(seq.transition(transition).unwrap().length, 10);
        assert_eq!(seq.transition_span(transition), Some((45, 65)));
    }

    #[test]
    fn test_ripple_trim_in_placement_pulls_back() {
        let mut seq = Sequence::new("test", Fps::default());
        let b = create_test_clip(&mut seq, 0, 50, 100, 0);
        let tool = Tool::RippleTrim { edge: Edge::In };
        let ctx = GestureContext::new(tool.clone())
            .with_selection(Selection::new(TrackId(0), 50, 100));
        let set = placed(&seq, &ctx, 10);
        let live = set.live(&seq);

        assert_eq!(ripple_frame_diff(&set, &live), Some(10));
        assert_eq!(
            placements(&set, &tool, &live),
            vec![Placement {
                clip: b,
                track: TrackId(0),
                timeline_in: 50,
                timeline_out: 90,
                media_in: 10,
            }]
        );
    }

    #[test]
    fn test_create_transition_makes_room() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, -1, 0, 30, 0);
        let closing = seq
            .add_transition(a, TransitionEdge::Closing, None, TransitionKind::Dissolve, 20)
            .unwrap();
        let tool = Tool::Transition {
            action: TransitionAction::Create {
                clip: a,
                edge: TransitionEdge::Opening,
                partner: None,
                kind: TransitionKind::Wipe,
            },
        };
        let mut ctx = GestureContext::new(tool.clone());
        let set = placed(&seq, &ctx, 18);
        let mut log: Vec<CommandBatch> = Vec::new();

        let result = commit(&set, &tool, &mut seq, &mut ctx, &mut log).unwrap();
        assert_eq!(result.corrections, 0);
        assert_eq!(log.len(), 1);
        assert_eq!(seq.transition(closing).unwrap().length, 12);
        let opening = seq.clip_transition(a, TransitionEdge::Opening).unwrap();
        assert_eq!((opening.length, opening.kind.clone()), (18, TransitionKind::Wipe));
    }

    #[test]
    fn test_stale_ghost_is_skipped() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, 0, 0, 20, 0);
        let b = create_test_clip(&mut seq, 0, 40, 60, 0);
        let mut ctx = GestureContext::new(Tool::Move)
            .with_selection(Selection::new(TrackId(0), 0, 60));
        let set = placed(&seq, &ctx, 10);
        seq.remove_clip(a).unwrap();
        let mut log: Vec<CommandBatch> = Vec::new();

        let result = commit(&set, &Tool::Move, &mut seq, &mut ctx, &mut log).unwrap();
        assert_eq!(result.mutated, vec![b]);
        assert_eq!(seq.clip(b).unwrap().timeline_in, 50);
    }
}
