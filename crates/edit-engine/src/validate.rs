//! Per-tool clamping of the gesture displacement.
//!
//! Every ghost contributes bounds on the shared `frame_diff`. The bounds are
//! then settled by a capped fixed-point loop that only ever pulls the
//! displacement toward zero, since the arrangement at gesture start is legal.

use tracing::{debug, warn};
use timeline::{Frame, Sequence, TrackId, TransitionEdge};

use crate::{
    ghost::{Ghost, GhostSet, GhostTarget},
    tool::{Edge, Tool, TransitionAction},
};

/// A bound on `frame_diff`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Constraint {
    AtLeast(Frame),
    AtMost(Frame),
}

impl Constraint {
    pub fn admits(&self, frame_diff: Frame) -> bool {
        match *self {
            Constraint::AtLeast(min) => frame_diff >= min,
            Constraint::AtMost(max) => frame_diff <= max,
        }
    }

    fn clamp(&self, frame_diff: Frame) -> Frame {
        match *self {
            Constraint::AtLeast(min) => frame_diff.max(min),
            Constraint::AtMost(max) => frame_diff.min(max),
        }
    }
}

/// Moves `current` toward `target` without crossing or leaving zero behind.
fn toward_zero(current: Frame, target: Frame) -> Frame {
    target.clamp(current.min(0), current.max(0))
}

/// Clamps `frame_diff` pass by pass until a pass leaves it unchanged.
/// Returns `None` when that takes more than `max_iterations` passes.
pub fn settle(frame_diff: Frame, constraints: &[Constraint], max_iterations: usize) -> Option<Frame> {
    let mut current = frame_diff;
    for _ in 0..max_iterations {
        let before = current;
        for constraint in constraints {
            if !constraint.admits(current) {
                current = toward_zero(current, constraint.clamp(current));
            }
        }
        if current == before {
            return Some(current);
        }
    }
    None
}

/// Bounds every live ghost puts on `frame_diff` under `tool`.
pub fn constraints(tool: &Tool, set: &GhostSet, live: &[bool]) -> Vec<Constraint> {
    let mut out = Vec::new();
    let ghosts = set.ghosts();
    for (index, ghost) in ghosts.iter().enumerate() {
        if !live.get(index).copied().unwrap_or(false) {
            continue;
        }
        if let Some(edge) = ghost.resize_edge() {
            resize_bounds(ghost, edge, &mut out);
            continue;
        }
        match tool {
            Tool::Move | Tool::Insert => match ghost.target {
                GhostTarget::Clip(_) => out.push(Constraint::AtLeast(-ghost.old_in)),
                _ => transition_move_bounds(ghost, &mut out),
            },
            Tool::Trim { .. } => {
                trim_bounds(ghost, false, &mut out);
                ghost_bounds(ghost, ghosts, &mut out);
            }
            Tool::RippleTrim { .. } => trim_bounds(ghost, true, &mut out),
            Tool::Roll { .. } => {
                trim_bounds(ghost, false, &mut out);
                neighbour_bounds(ghost, &mut out);
                ghost_bounds(ghost, ghosts, &mut out);
            }
            Tool::Slip => slip_bounds(ghost, &mut out),
            Tool::Slide => {
                if ghost.trimming {
                    trim_bounds(ghost, false, &mut out);
                } else {
                    out.push(Constraint::AtLeast(-ghost.old_in));
                }
            }
            Tool::Transition { action } => match action {
                TransitionAction::Create { .. } => create_bounds(ghost, &mut out),
                TransitionAction::Resize { edge, .. } => resize_bounds(ghost, *edge, &mut out),
            },
        }
    }

    if let (Tool::RippleTrim { edge }, Some(ripple)) = (tool, set.ripple()) {
        for gap in &ripple.gaps {
            // the clips after the point travel by the ripple and must not
            // run into what stays before it
            out.push(match edge {
                Edge::In => Constraint::AtMost(gap.after - gap.before.unwrap_or(0)),
                Edge::Out => Constraint::AtLeast(gap.before.unwrap_or(0) - gap.after),
            });
        }
    }
    out
}

/// Clamps `frame_diff` for `tool`. Returns `None`, and logs, when the bounds
/// cannot be settled within `max_iterations`.
pub fn clamp_frame_diff(
    tool: &Tool,
    set: &GhostSet,
    live: &[bool],
    frame_diff: Frame,
    max_iterations: usize,
) -> Option<Frame> {
    let constraints = constraints(tool, set, live);
    let settled = settle(frame_diff, &constraints, max_iterations);
    match settled {
        Some(clamped) if clamped != frame_diff => {
            debug!(requested = frame_diff, clamped, "clamped frame diff");
        }
        None => {
            warn!(
                requested = frame_diff,
                constraints = constraints.len(),
                max_iterations,
                "clamp did not settle, ignoring update"
            );
        }
        _ => {}
    }
    settled
}

/// Walks `track_diff` back toward zero until every moving clip ghost keeps
/// its track kind and avoids locked tracks. Only Move and Insert change
/// tracks, and only ghosts of the same kind as `start_track` follow.
pub fn clamp_track_diff(
    tool: &Tool,
    set: &GhostSet,
    sequence: &Sequence,
    start_track: TrackId,
    track_diff: i32,
) -> i32 {
    if !matches!(tool, Tool::Move | Tool::Insert) {
        return 0;
    }
    let mut current = track_diff;
    while current != 0 {
        let legal = set
            .ghosts()
            .iter()
            .filter(|g| matches!(g.target, GhostTarget::Clip(_)))
            .filter(|g| g.old_track.same_kind(start_track))
            .all(|g| {
                let target = g.old_track.offset(current);
                target.same_kind(g.old_track) && !sequence.is_track_locked(target)
            });
        if legal {
            break;
        }
        current -= current.signum();
    }
    current
}

/// Length and media bounds for a single-edge trim. Ripple trims keep the
/// in-point where it is, so the timeline-zero bound does not apply.
fn trim_bounds(ghost: &Ghost, ripple: bool, out: &mut Vec<Constraint>) {
    if ghost.trim_in {
        out.push(Constraint::AtMost(ghost.length - 1));
        if !ripple {
            out.push(Constraint::AtLeast(-ghost.old_in));
        }
        if ghost.media_length.is_some() {
            out.push(Constraint::AtLeast(-ghost.old_media_in));
        }
    } else {
        out.push(Constraint::AtLeast(1 - ghost.length));
        if let Some(media_length) = ghost.media_length {
            out.push(Constraint::AtMost(
                media_length - ghost.old_media_in - ghost.length,
            ));
        }
    }
}

/// Keeps the trimmed edge short of the next clip that is not itself edited.
fn neighbour_bounds(ghost: &Ghost, out: &mut Vec<Constraint>) {
    if ghost.trim_in {
        if let Some(before) = ghost.before {
            out.push(Constraint::AtLeast(before - ghost.old_in));
        }
    } else if let Some(after) = ghost.after {
        out.push(Constraint::AtMost(after - ghost.old_out));
    }
}

/// Keeps trimmed edges from running into other ghosts on the same track,
/// which the overwrite pass will not delete. Ghosts trimming the same edge
/// move together and never collide.
fn ghost_bounds(ghost: &Ghost, ghosts: &[Ghost], out: &mut Vec<Constraint>) {
    let others = ghosts.iter().filter(|g| {
        g.target != ghost.target
            && g.old_track == ghost.old_track
            && !(g.trimming && g.trimmed_edge() == ghost.trimmed_edge())
    });
    for other in others {
        if ghost.trim_in && other.old_out <= ghost.old_in {
            out.push(Constraint::AtLeast(other.old_out - ghost.old_in));
        } else if !ghost.trim_in && other.old_in >= ghost.old_out {
            out.push(Constraint::AtMost(other.old_in - ghost.old_out));
        }
    }
}

fn slip_bounds(ghost: &Ghost, out: &mut Vec<Constraint>) {
    // a shared transition borrows media beyond the visible edges
    let media_in = ghost.old_media_in - ghost.clip.handle_in;
    let length = ghost.length + ghost.clip.handle_in + ghost.clip.handle_out;
    out.push(Constraint::AtMost(media_in));
    if let Some(media_length) = ghost.media_length {
        out.push(Constraint::AtLeast(media_in + length - media_length));
    }
}

/// Moving a transition moves the edge (or cut) it hangs on.
fn transition_move_bounds(ghost: &Ghost, out: &mut Vec<Constraint>) {
    let Some(transition) = &ghost.transition else {
        return;
    };
    let primary = &transition.primary;
    let used = primary.opening + primary.closing;
    match (transition.edge, &transition.secondary) {
        (TransitionEdge::Opening, Some(secondary)) => {
            // the cut moves: primary's in-point and secondary's out-point
            out.push(Constraint::AtMost(primary.length() - used.max(1)));
            out.push(Constraint::AtLeast(transition.length - primary.media_in));
            let secondary_used = secondary.opening + secondary.closing;
            out.push(Constraint::AtLeast(secondary_used.max(1) - secondary.length()));
            if let Some(media_length) = secondary.max_length {
                out.push(Constraint::AtMost(
                    media_length - secondary.media_in - secondary.length() - transition.length,
                ));
            }
        }
        (TransitionEdge::Opening, None) => {
            out.push(Constraint::AtMost(primary.length() - used.max(1)));
            out.push(Constraint::AtLeast(-primary.timeline_in));
            if primary.max_length.is_some() {
                out.push(Constraint::AtLeast(-primary.media_in));
            }
        }
        (TransitionEdge::Closing, _) => {
            out.push(Constraint::AtLeast(used.max(1) - primary.length()));
            if let Some(media_length) = primary.max_length {
                out.push(Constraint::AtMost(
                    media_length - primary.media_in - primary.length(),
                ));
            }
        }
    }
}

/// A new transition grows from zero. Across a cut it grows both ways by
/// `|frame_diff|`, so every limit is applied to the displacement and its
/// mirror.
fn create_bounds(ghost: &Ghost, out: &mut Vec<Constraint>) {
    let Some(transition) = &ghost.transition else {
        return;
    };
    let primary = &transition.primary;
    match &transition.secondary {
        Some(secondary) => {
            let mut limits = vec![primary.length(), secondary.length(), primary.media_in];
            if let Some(media_length) = secondary.max_length {
                limits.push(media_length - secondary.media_in - secondary.length());
            }
            for limit in limits {
                out.push(Constraint::AtMost(limit));
                out.push(Constraint::AtLeast(-limit));
            }
        }
        None if ghost.trim_in => {
            out.push(Constraint::AtMost(0));
            out.push(Constraint::AtLeast(-primary.length()));
        }
        None => {
            out.push(Constraint::AtLeast(0));
            out.push(Constraint::AtMost(primary.length()));
        }
    }
}

/// Resizing changes the length by `+frame_diff` on the out edge and
/// `-frame_diff` on the in edge. The length stays at least one frame and
/// leaves room for the clip's other transition.
fn resize_bounds(ghost: &Ghost, edge: Edge, out: &mut Vec<Constraint>) {
    let Some(transition) = &ghost.transition else {
        return;
    };
    let primary = &transition.primary;
    if ghost.resizes_clip() {
        // the clip edge travels with the transition
        match edge {
            Edge::In => {
                out.push(Constraint::AtMost(transition.length - 1));
                out.push(Constraint::AtLeast(-primary.timeline_in));
                if primary.max_length.is_some() {
                    out.push(Constraint::AtLeast(-primary.media_in));
                }
                if let Some(before) = ghost.before {
                    out.push(Constraint::AtLeast(before - ghost.old_in));
                }
            }
            Edge::Out => {
                out.push(Constraint::AtLeast(1 - transition.length));
                if let Some(media_length) = primary.max_length {
                    out.push(Constraint::AtMost(
                        media_length - primary.media_in - primary.length(),
                    ));
                }
                if let Some(after) = ghost.after {
                    out.push(Constraint::AtMost(after - ghost.old_out));
                }
            }
        }
        return;
    }
    let other = primary.transition_length(transition.edge.opposite());
    let mut limit = primary.length() - other;
    if let Some(secondary) = &transition.secondary {
        limit = limit
            .min(secondary.length() - secondary.opening)
            .min(primary.media_in);
        if let Some(media_length) = secondary.max_length {
            limit = limit.min(media_length - secondary.media_in - secondary.length());
        }
    }
    let length = transition.length;
    match edge {
        Edge::Out => {
            out.push(Constraint::AtLeast(1 - length));
            out.push(Constraint::AtMost(limit - length));
        }
        Edge::In => {
            out.push(Constraint::AtMost(length - 1));
            out.push(Constraint::AtLeast(length - limit));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GestureContext, Selection};
    use timeline::{ClipId, Fps, MediaSource, TransitionKind};

    fn create_test_clip(seq: &mut Sequence, track: i32, start: Frame, end: Frame, media: Frame) -> ClipId {
        seq.create_clip(
            "test clip",
            TrackId(track),
            start,
            end,
            MediaSource::footage("test.mp4", media),
        )
        .unwrap()
    }

    fn clamp(seq: &Sequence, tool: Tool, selection: (i32, Frame, Frame), frame_diff: Frame) -> Frame {
        let ctx = GestureContext::new(tool.clone()).with_selection(Selection::new(
            TrackId(selection.0),
            selection.1,
            selection.2,
        ));
        let set = GhostSet::build(seq, &ctx);
        let live = vec![true; set.len()];
        clamp_frame_diff(&tool, &set, &live, frame_diff, 64).unwrap()
    }

    #[test]
    fn test_settle_stops_at_zero() {
        let constraints = [Constraint::AtMost(-5)];
        assert_eq!(settle(10, &constraints, 8), Some(0));
        assert_eq!(settle(-10, &[Constraint::AtLeast(-3)], 8), Some(-3));
    }

    #[test]
    fn test_settle_gives_up_past_cap() {
        assert_eq!(settle(10, &[Constraint::AtMost(5)], 1), None);
        assert_eq!(settle(10, &[Constraint::AtMost(5)], 2), Some(5));
        assert_eq!(settle(5, &[], 0), None);
    }

    #[test]
    fn test_bound_violated_at_rest_pins_zero() {
        assert_eq!(settle(0, &[Constraint::AtLeast(2)], 4), Some(0));
    }

    #[test]
    fn test_conflicting_bounds_take_tightest() {
        let constraints = [
            Constraint::AtMost(40),
            Constraint::AtMost(25),
            Constraint::AtLeast(-3),
        ];
        assert_eq!(settle(100, &constraints, 8), Some(25));
        assert_eq!(settle(-100, &constraints, 8), Some(-3));
    }

    #[test]
    fn test_trim_out_clamps_to_media() {
        let mut seq = Sequence::new("test", Fps::default());
        create_test_clip(&mut seq, 0, 0, 100, 500);
        assert_eq!(clamp(&seq, Tool::Trim { edge: Edge::Out }, (0, 0, 100), 2900), 400);
        assert_eq!(clamp(&seq, Tool::Trim { edge: Edge::Out }, (0, 0, 100), -200), -99);
    }

    #[test]
    fn test_trim_in_keeps_timeline_and_media_positive() {
        let mut seq = Sequence::new("test", Fps::default());
        let clip = create_test_clip(&mut seq, 0, 20, 60, 500);
        let mut plan = timeline::edit_operations::EditPlan::new(&seq);
        timeline::edit_operations::move_clip(&mut plan, clip, TrackId(0), 20, 60, 50).unwrap();
        plan.into_batch("setup").apply(&mut seq).unwrap();

        assert_eq!(clamp(&seq, Tool::Trim { edge: Edge::In }, (0, 20, 60), -30), -20);
        // ripple trims ignore the timeline origin but not media
        assert_eq!(clamp(&seq, Tool::RippleTrim { edge: Edge::In }, (0, 20, 60), -80), -50);
    }

    #[test]
    fn test_roll_stops_at_next_clip() {
        let mut seq = Sequence::new("test", Fps::default());
        create_test_clip(&mut seq, 0, 0, 50, 1000);
        create_test_clip(&mut seq, 0, 50, 100, 1000);
        // partner can shrink to one frame
        assert_eq!(clamp(&seq, Tool::Roll { edge: Edge::Out }, (0, 0, 50), 80), 49);
    }

    #[test]
    fn test_slip_bounds() {
        let mut seq = Sequence::new("test", Fps::default());
        create_test_clip(&mut seq, 0, 0, 30, 30);
        assert_eq!(clamp(&seq, Tool::Slip, (0, 0, 30), 10), 0);
        assert_eq!(clamp(&seq, Tool::Slip, (0, 0, 30), -10), 0);

        let mut seq = Sequence::new("test", Fps::default());
        create_test_clip(&mut seq, 0, 0, 30, 50);
        assert_eq!(clamp(&seq, Tool::Slip, (0, 0, 30), -30), -20);
    }

    #[test]
    fn test_ripple_out_cannot_pull_into_straddling_clip() {
        let mut seq = Sequence::new("test", Fps::default());
        create_test_clip(&mut seq, 0, 0, 50, 1000);
        create_test_clip(&mut seq, 1, 40, 60, 1000);
        create_test_clip(&mut seq, 1, 70, 90, 1000);
        // track 1 clip at 70 may only travel back to 60
        assert_eq!(clamp(&seq, Tool::RippleTrim { edge: Edge::Out }, (0, 0, 50), -30), -10);
    }

    #[test]
    fn test_track_walk_back_keeps_kind() {
        let mut seq = Sequence::new("test", Fps::default());
        create_test_clip(&mut seq, -1, 0, 10, 100);
        let ctx = GestureContext::new(Tool::Move).with_selection(Selection::new(TrackId(-1), 0, 10));
        let set = GhostSet::build(&seq, &ctx);
        assert_eq!(clamp_track_diff(&Tool::Move, &set, &seq, TrackId(-1), 3), 0);
        assert_eq!(clamp_track_diff(&Tool::Move, &set, &seq, TrackId(-1), -2), -2);

        seq.set_track_locked(TrackId(-3), true);
        assert_eq!(clamp_track_diff(&Tool::Move, &set, &seq, TrackId(-1), -2), -1);
        assert_eq!(clamp_track_diff(&Tool::Slide, &set, &seq, TrackId(-1), -1), 0);
    }

    #[test]
    fn test_shared_transition_creation_is_symmetric() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, -1, 0, 50, 1000);
        let b = create_test_clip(&mut seq, -1, 50, 80, 1000);
        let mut plan = timeline::edit_operations::EditPlan::new(&seq);
        timeline::edit_operations::move_clip(&mut plan, b, TrackId(-1), 50, 80, 12).unwrap();
        plan.into_batch("setup").apply(&mut seq).unwrap();

        let tool = Tool::Transition {
            action: TransitionAction::Create {
                clip: a,
                edge: TransitionEdge::Closing,
                partner: Some(b),
                kind: TransitionKind::Dissolve,
            },
        };
        let set = GhostSet::build(&seq, &GestureContext::new(tool.clone()));
        let live = vec![true; set.len()];
        // b only has twelve frames of media before its in-point
        assert_eq!(clamp_frame_diff(&tool, &set, &live, 20, 64), Some(12));
        assert_eq!(clamp_frame_diff(&tool, &set, &live, -20, 64), Some(-12));
    }

    #[test]
    fn test_resize_leaves_room_for_other_transition() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, -1, 0, 40, 1000);
        let opening = seq
            .add_transition(a, TransitionEdge::Opening, None, TransitionKind::Dissolve, 10)
            .unwrap();
        seq.add_transition(a, TransitionEdge::Closing, None, TransitionKind::Wipe, 15)
            .unwrap();

        let tool = Tool::Transition {
            action: TransitionAction::Resize {
                transition: opening,
                edge: Edge::Out,
            },
        };
        let set = GhostSet::build(&seq, &GestureContext::new(tool.clone()));
        let live = vec![true; set.len()];
        assert_eq!(clamp_frame_diff(&tool, &set, &live, 100, 64), Some(15));
        assert_eq!(clamp_frame_diff(&tool, &set, &live, -100, 64), Some(-9));
    }
}
