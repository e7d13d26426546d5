//! Making room for the ghosts' final footprint at commit time.

use std::collections::HashSet;

use tracing::{debug, warn};
use timeline::{
    edit_operations::{clear_area, ripple, split_clip, EditPlan},
    ClipId, EditCommand, Frame, TimelineError, TrackId, TransitionEdge,
};

use crate::ghost::GhostSet;

/// Final position of one clip a gesture edits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub clip: ClipId,
    pub track: TrackId,
    pub timeline_in: Frame,
    pub timeline_out: Frame,
    pub media_in: Frame,
}

/// Deletes, trims or splits whatever sits under each placement, except the
/// clips in `keep`. A footprint that cannot be cleared is logged and left.
pub fn overwrite(
    plan: &mut EditPlan,
    placements: &[Placement],
    keep: &HashSet<ClipId>,
) -> Vec<ClipId> {
    let mut touched = Vec::new();
    for placement in placements {
        let cleared = plan.atomic(|plan| {
            clear_area(
                plan,
                placement.track,
                placement.timeline_in,
                placement.timeline_out,
                keep,
            )
        });
        match cleared {
            Ok(clips) => touched.extend(clips),
            Err(err) => warn!(%err, clip = %placement.clip, "could not clear footprint"),
        }
    }
    touched
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Extra offset the ghosts travel once the gap they left is closed.
    pub ghost_shift: Frame,
    pub rippled: Vec<ClipId>,
}

/// Ripples existing clips aside for the placements instead of overwriting.
/// `tracks` limits the ripple, `None` means every unlocked track.
pub fn insert(
    plan: &mut EditPlan,
    ghosts: &GhostSet,
    placements: &[Placement],
    tracks: Option<&[TrackId]>,
) -> Result<InsertOutcome, TimelineError> {
    let keep = ghosts.clip_ids();
    let moving: Vec<_> = ghosts
        .ghosts()
        .iter()
        .filter(|g| g.clip_id().is_some())
        .collect();
    let old_start = moving.iter().map(|g| g.old_in).min();
    let old_end = moving.iter().map(|g| g.old_out).max();
    let new_start = placements.iter().map(|p| p.timeline_in).min();
    let new_end = placements.iter().map(|p| p.timeline_out).max();
    let (Some(earliest_old), Some(latest_old), Some(earliest_new), Some(latest_new)) =
        (old_start, old_end, new_start, new_end)
    else {
        return Ok(InsertOutcome::default());
    };

    let rippling = |track: TrackId| tracks.map_or(true, |t| t.contains(&track));
    let sequence = plan.sequence();
    // the vacated span is only closed when nothing else covers it
    let close_old_gap = !sequence.clips().any(|c| {
        !keep.contains(&c.id) && rippling(c.track) && c.overlaps(earliest_old, latest_old)
    });
    let straddling: Vec<ClipId> = sequence
        .clips()
        .filter(|c| !keep.contains(&c.id) && rippling(c.track))
        .filter(|c| !sequence.is_track_locked(c.track))
        .filter(|c| c.timeline_in < earliest_new && c.timeline_out > earliest_new)
        .map(|c| c.id)
        .collect();

    for clip_id in straddling {
        split_clip(plan, clip_id, earliest_new)?;
    }
    let mut rippled = ripple(plan, earliest_new, latest_new - earliest_new, tracks, &keep)?;

    let mut ghost_shift = 0;
    if close_old_gap {
        rippled.extend(ripple(
            plan,
            latest_old,
            earliest_old - latest_old,
            tracks,
            &keep,
        )?);
        if earliest_old < earliest_new {
            ghost_shift = earliest_old - latest_old;
        }
    }
    rippled.sort();
    rippled.dedup();
    debug!(
        earliest_new,
        latest_new,
        close_old_gap,
        ghost_shift,
        rippled = rippled.len(),
        "insert"
    );
    Ok(InsertOutcome {
        ghost_shift,
        rippled,
    })
}

/// Clears `edge` of `clip_id` for a new transition of `length` frames and
/// shrinks or removes the clip's opposite transition if both would not fit.
pub fn make_room_for_transition(
    plan: &mut EditPlan,
    clip_id: ClipId,
    edge: TransitionEdge,
    length: Frame,
) -> Result<(), TimelineError> {
    let clip_length = plan
        .sequence()
        .clip(clip_id)
        .map(|c| c.length())
        .ok_or(TimelineError::ClipNotFound(clip_id))?;
    if let Some(existing) = plan.sequence().clip_transition(clip_id, edge) {
        let transition_id = existing.id;
        plan.push(EditCommand::RemoveTransition { transition_id })?;
    }
    if let Some(opposite) = plan
        .sequence()
        .clip_transition(clip_id, edge.opposite())
        .cloned()
    {
        if opposite.length + length > clip_length {
            let remaining = clip_length - length;
            if remaining >= 1 {
                plan.push(EditCommand::ResizeTransition {
                    transition_id: opposite.id,
                    length: remaining,
                })?;
            } else {
                plan.push(EditCommand::RemoveTransition {
                    transition_id: opposite.id,
                })?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::{GestureContext, Selection},
        tool::Tool,
    };
    use timeline::{Fps, MediaSource, Sequence, TransitionKind};

    fn create_test_clip(seq: &mut Sequence, track: i32, start: Frame, end: Frame) -> ClipId {
        seq.create_clip(
            "test clip",
            TrackId(track),
            start,
            end,
            MediaSource::footage("test.mp4", 1000),
        )
        .unwrap()
    }

    fn moved(seq: &Sequence, clip: ClipId, frame_diff: Frame) -> Placement {
        let clip = seq.clip(clip).unwrap();
        Placement {
            clip: clip.id,
            track: clip.track,
            timeline_in: clip.timeline_in + frame_diff,
            timeline_out: clip.timeline_out + frame_diff,
            media_in: clip.media_in,
        }
    }

    fn ghosts_for(seq: &Sequence, track: i32, start: Frame, end: Frame) -> GhostSet {
        let ctx = GestureContext::new(Tool::Insert)
            .with_selection(Selection::new(TrackId(track), start, end));
        GhostSet::build(seq, &ctx)
    }

    #[test]
    fn test_overwrite_keeps_ghosts() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, 0, 0, 20);
        let b = create_test_clip(&mut seq, 0, 20, 40);
        let keep: HashSet<ClipId> = [a].into_iter().collect();

        let mut plan = EditPlan::new(&seq);
        let touched = overwrite(&mut plan, &[moved(&seq, a, 10)], &keep);
        assert_eq!(touched, vec![b]);
        let b = plan.sequence().clip(b).unwrap();
        assert_eq!((b.timeline_in, b.media_in), (30, 10));
        assert_eq!(plan.sequence().clip(a).unwrap().timeline_in, 0);
    }

    #[test]
    fn test_insert_ripples_instead_of_deleting() {
        let mut seq = Sequence::new("test", Fps::default());
        let dragged = create_test_clip(&mut seq, 0, 10, 20);
        let existing = create_test_clip(&mut seq, 0, 15, 30);
        let ghosts = ghosts_for(&seq, 0, 10, 20);

        let mut plan = EditPlan::new(&seq);
        let outcome = insert(&mut plan, &ghosts, &[moved(&seq, dragged, 5)], None).unwrap();
        assert_eq!(outcome.ghost_shift, 0);
        assert_eq!(outcome.rippled, vec![existing]);
        let existing = plan.sequence().clip(existing).unwrap();
        assert_eq!((existing.timeline_in, existing.timeline_out), (25, 40));
    }

    #[test]
    fn test_insert_splits_straddling_clip() {
        let mut seq = Sequence::new("test", Fps::default());
        let dragged = create_test_clip(&mut seq, 0, 0, 10);
        let long = create_test_clip(&mut seq, 1, 20, 60);
        let ghosts = ghosts_for(&seq, 0, 0, 10);

        let mut plan = EditPlan::new(&seq);
        let placement = Placement {
            track: TrackId(1),
            ..moved(&seq, dragged, 30)
        };
        insert(&mut plan, &ghosts, &[placement], None).unwrap();
        // split at 30, the tail pushed by the insert, then everything after
        // the vacated span pulled back by its ten frames
        let head = plan.sequence().clip(long).unwrap();
        assert_eq!((head.timeline_in, head.timeline_out), (10, 20));
        let tail = plan
            .sequence()
            .clips_on_track(TrackId(1))
            .into_iter()
            .find(|c| c.id != long)
            .unwrap();
        assert_eq!((tail.timeline_in, tail.timeline_out, tail.media_in), (30, 60, 10));
    }

    #[test]
    fn test_insert_closes_vacated_gap() {
        let mut seq = Sequence::new("test", Fps::default());
        let dragged = create_test_clip(&mut seq, 0, 10, 20);
        let middle = create_test_clip(&mut seq, 0, 30, 40);
        let ghosts = ghosts_for(&seq, 0, 10, 20);

        let mut plan = EditPlan::new(&seq);
        let outcome = insert(&mut plan, &ghosts, &[moved(&seq, dragged, 40)], None).unwrap();
        assert_eq!(outcome.ghost_shift, -10);
        let middle = plan.sequence().clip(middle).unwrap();
        assert_eq!((middle.timeline_in, middle.timeline_out), (20, 30));
    }

    #[test]
    fn test_make_room_shrinks_opposite() {
        let mut seq = Sequence::new("test", Fps::default());
        let clip = create_test_clip(&mut seq, -1, 0, 30);
        let closing = seq
            .add_transition(clip, TransitionEdge::Closing, None, TransitionKind::Dissolve, 20)
            .unwrap();
        let old_opening = seq
            .add_transition(clip, TransitionEdge::Opening, None, TransitionKind::Wipe, 5)
            .unwrap();

        let mut plan = EditPlan::new(&seq);
        make_room_for_transition(&mut plan, clip, TransitionEdge::Opening, 18).unwrap();
        assert!(plan.sequence().transition(old_opening).is_none());
        assert_eq!(plan.sequence().transition(closing).unwrap().length, 12);

        let mut plan = EditPlan::new(&seq);
        make_room_for_transition(&mut plan, clip, TransitionEdge::Opening, 30).unwrap();
        assert!(plan.sequence().transition(closing).is_none());
    }
}
