//! Multi-command edits: ripple, split, clear an area, close gap, nudge and
//! ripple delete. Each builds on an [`EditPlan`] so later steps see the
//! result of earlier ones.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::{
    apply_command, ClipId, CommandBatch, EditCommand, Frame, Sequence, TimelineError, TrackId,
    Transition, TransitionEdge, TransitionId,
};

/// Records commands while applying them to a scratch copy of the sequence.
#[derive(Debug, Clone)]
pub struct EditPlan {
    scratch: Sequence,
    commands: Vec<EditCommand>,
    dropped: usize,
}

impl EditPlan {
    pub fn new(sequence: &Sequence) -> Self {
        Self {
            scratch: sequence.clone(),
            commands: Vec::new(),
            dropped: 0,
        }
    }

    /// The sequence as it will look once the recorded commands are applied.
    pub fn sequence(&self) -> &Sequence {
        &self.scratch
    }

    pub fn commands(&self) -> &[EditCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands refused because they touched a locked track.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn allocate_clip_id(&mut self) -> ClipId {
        self.scratch.allocate_clip_id()
    }

    pub fn allocate_transition_id(&mut self) -> TransitionId {
        self.scratch.allocate_transition_id()
    }

    /// Records `command` unless it touches a locked track. Returns whether it
    /// was recorded.
    pub fn push(&mut self, command: EditCommand) -> Result<bool, TimelineError> {
        let locked = command
            .tracks(&self.scratch)
            .into_iter()
            .find(|track| self.scratch.is_track_locked(*track));
        if let Some(track) = locked {
            warn!(%track, ?command, "dropping command on locked track");
            self.dropped += 1;
            return Ok(false);
        }
        apply_command(&mut self.scratch, command.clone())?;
        self.commands.push(command);
        Ok(true)
    }

    /// Runs `f`, discarding everything it recorded if it fails.
    pub fn atomic<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, TimelineError>,
    ) -> Result<T, TimelineError> {
        let scratch = self.scratch.clone();
        let recorded = self.commands.len();
        let dropped = self.dropped;
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.scratch = scratch;
                self.commands.truncate(recorded);
                self.dropped = dropped;
                Err(err)
            }
        }
    }

    pub fn into_commands(self) -> Vec<EditCommand> {
        self.commands
    }

    pub fn into_batch(self, label: impl Into<String>) -> CommandBatch {
        CommandBatch::new(label, self.commands)
    }
}

/// Moves a clip to an absolute position. Unchanged positions record nothing.
pub fn move_clip(
    plan: &mut EditPlan,
    clip_id: ClipId,
    track: TrackId,
    timeline_in: Frame,
    timeline_out: Frame,
    media_in: Frame,
) -> Result<bool, TimelineError> {
    let clip = plan
        .sequence()
        .clip(clip_id)
        .ok_or(TimelineError::ClipNotFound(clip_id))?;
    if clip.track == track
        && clip.timeline_in == timeline_in
        && clip.timeline_out == timeline_out
        && clip.media_in == media_in
    {
        return Ok(false);
    }
    plan.push(EditCommand::MoveClip {
        clip_id,
        track,
        timeline_in,
        timeline_out,
        media_in,
    })
}

fn shift_clip(plan: &mut EditPlan, clip_id: ClipId, delta: Frame) -> Result<bool, TimelineError> {
    let clip = plan
        .sequence()
        .clip(clip_id)
        .ok_or(TimelineError::ClipNotFound(clip_id))?;
    let (track, start, end, media_in) = (
        clip.track,
        clip.timeline_in + delta,
        clip.timeline_out + delta,
        clip.media_in,
    );
    move_clip(plan, clip_id, track, start, end, media_in)
}

/// Shifts every clip starting at or after `point` by `length`. `tracks`
/// limits the ripple, `None` ripples every track. Clips on locked tracks stay
/// put. Returns the clips that moved.
pub fn ripple(
    plan: &mut EditPlan,
    point: Frame,
    length: Frame,
    tracks: Option<&[TrackId]>,
    ignore: &HashSet<ClipId>,
) -> Result<Vec<ClipId>, TimelineError> {
    if length == 0 {
        return Ok(Vec::new());
    }
    let mut targets: Vec<(Frame, ClipId)> = plan
        .sequence()
        .clips()
        .filter(|c| c.timeline_in >= point)
        .filter(|c| tracks.map_or(true, |t| t.contains(&c.track)))
        .filter(|c| !ignore.contains(&c.id))
        .filter(|c| !plan.sequence().is_track_locked(c.track))
        .map(|c| (c.timeline_in, c.id))
        .collect();
    // move away from the direction of travel first
    targets.sort();
    if length > 0 {
        targets.reverse();
    }

    let mut moved = Vec::new();
    for (_, clip_id) in targets {
        if shift_clip(plan, clip_id, length)? {
            moved.push(clip_id);
        }
    }
    debug!(point, length, moved = moved.len(), "ripple");
    Ok(moved)
}

/// Splits a clip at `frame`, which must lie strictly inside it. The closing
/// transition moves to the new tail clip. Returns the tail's id.
pub fn split_clip(
    plan: &mut EditPlan,
    clip_id: ClipId,
    frame: Frame,
) -> Result<ClipId, TimelineError> {
    plan.atomic(|plan| {
        let clip = plan
            .sequence()
            .clip(clip_id)
            .cloned()
            .ok_or(TimelineError::ClipNotFound(clip_id))?;
        if frame <= clip.timeline_in || frame >= clip.timeline_out {
            return Err(TimelineError::InvalidOp(format!(
                "cannot split {} at frame {}",
                clip_id, frame
            )));
        }

        let closing = clip
            .closing
            .and_then(|id| plan.sequence().transition(id).cloned());
        if let Some(transition) = &closing {
            plan.push(EditCommand::RemoveTransition {
                transition_id: transition.id,
            })?;
        }

        let tail_id = plan.allocate_clip_id();
        let mut tail = clip.clone();
        tail.id = tail_id;
        tail.timeline_in = frame;
        tail.media_in = clip.media_in + (frame - clip.timeline_in);
        tail.links.clear();
        tail.opening = None;
        tail.closing = None;

        move_clip(
            plan,
            clip_id,
            clip.track,
            clip.timeline_in,
            frame,
            clip.media_in,
        )?;
        plan.push(EditCommand::InsertClip { clip: tail })?;

        if let Some(mut transition) = closing {
            if transition.primary == clip_id {
                transition.primary = tail_id;
            } else {
                transition.secondary = Some(tail_id);
            }
            plan.push(EditCommand::InsertTransition { transition })?;
        }
        fit_transitions(plan, &[clip_id, tail_id])?;
        Ok(tail_id)
    })
}

/// Removes or shortens every clip on `track` that overlaps `[start, end)`,
/// except those in `keep`. Clips spanning the whole area are split first.
/// Returns the clips that were touched.
pub fn clear_area(
    plan: &mut EditPlan,
    track: TrackId,
    start: Frame,
    end: Frame,
    keep: &HashSet<ClipId>,
) -> Result<Vec<ClipId>, TimelineError> {
    if end <= start || plan.sequence().is_track_locked(track) {
        return Ok(Vec::new());
    }
    let overlapping: Vec<ClipId> = plan
        .sequence()
        .clips_on_track(track)
        .into_iter()
        .filter(|c| c.overlaps(start, end) && !keep.contains(&c.id))
        .map(|c| c.id)
        .collect();

    let mut touched = Vec::new();
    for clip_id in overlapping {
        let Some(clip) = plan.sequence().clip(clip_id).cloned() else {
            continue;
        };
        touched.push(clip_id);
        let exact_transition = clip
            .opening
            .into_iter()
            .chain(clip.closing)
            .find(|id| plan.sequence().transition_span(*id) == Some((start, end)));
        if let Some(transition_id) = exact_transition {
            plan.push(EditCommand::RemoveTransition { transition_id })?;
        } else if start <= clip.timeline_in && end >= clip.timeline_out {
            delete_clip(plan, clip_id)?;
        } else if clip.timeline_in < start && clip.timeline_out > end {
            split_clip(plan, clip_id, end)?;
            trim_out(plan, clip_id, start)?;
        } else if clip.timeline_in < start {
            trim_out(plan, clip_id, start)?;
        } else {
            trim_in(plan, clip_id, end)?;
        }
    }
    if !touched.is_empty() {
        debug!(%track, start, end, touched = touched.len(), "cleared area");
    }
    Ok(touched)
}

/// Removes a clip along with its transitions.
pub fn delete_clip(plan: &mut EditPlan, clip_id: ClipId) -> Result<(), TimelineError> {
    plan.atomic(|plan| {
        let clip = plan
            .sequence()
            .clip(clip_id)
            .ok_or(TimelineError::ClipNotFound(clip_id))?;
        let transitions: Vec<TransitionId> = clip.opening.into_iter().chain(clip.closing).collect();
        for transition_id in transitions {
            plan.push(EditCommand::RemoveTransition { transition_id })?;
        }
        plan.push(EditCommand::RemoveClip { clip_id })?;
        Ok(())
    })
}

/// Pulls a clip's out-point back to `frame`. A closing transition loses the
/// trimmed part and disappears once nothing of it is left.
fn trim_out(plan: &mut EditPlan, clip_id: ClipId, frame: Frame) -> Result<(), TimelineError> {
    let clip = plan
        .sequence()
        .clip(clip_id)
        .cloned()
        .ok_or(TimelineError::ClipNotFound(clip_id))?;
    if let Some(closing) = plan
        .sequence()
        .clip_transition(clip_id, TransitionEdge::Closing)
        .cloned()
    {
        let trimmed = clip.timeline_out - frame;
        if closing.is_shared() || closing.length <= trimmed {
            plan.push(EditCommand::RemoveTransition {
                transition_id: closing.id,
            })?;
        } else {
            plan.push(EditCommand::ResizeTransition {
                transition_id: closing.id,
                length: closing.length - trimmed,
            })?;
        }
    }
    move_clip(plan, clip_id, clip.track, clip.timeline_in, frame, clip.media_in)?;
    fit_transitions(plan, &[clip_id])?;
    Ok(())
}

/// Pushes a clip's in-point forward to `frame`, mirroring [`trim_out`].
fn trim_in(plan: &mut EditPlan, clip_id: ClipId, frame: Frame) -> Result<(), TimelineError> {
    let clip = plan
        .sequence()
        .clip(clip_id)
        .cloned()
        .ok_or(TimelineError::ClipNotFound(clip_id))?;
    if let Some(opening) = plan
        .sequence()
        .clip_transition(clip_id, TransitionEdge::Opening)
        .cloned()
    {
        let trimmed = frame - clip.timeline_in;
        if opening.is_shared() || opening.length <= trimmed {
            plan.push(EditCommand::RemoveTransition {
                transition_id: opening.id,
            })?;
        } else {
            plan.push(EditCommand::ResizeTransition {
                transition_id: opening.id,
                length: opening.length - trimmed,
            })?;
        }
    }
    let media_in = clip.media_in + (frame - clip.timeline_in);
    move_clip(plan, clip_id, clip.track, frame, clip.timeline_out, media_in)?;
    fit_transitions(plan, &[clip_id])?;
    Ok(())
}

/// Longest length `transition` may have given its clips' current state.
pub fn transition_limit(sequence: &Sequence, transition: &Transition) -> Frame {
    let Some(primary) = sequence.clip(transition.primary) else {
        return 0;
    };
    let mut limit = primary.length();
    if let Some(secondary) = transition.secondary.and_then(|id| sequence.clip(id)) {
        // a cut transition also needs media handles on both sides
        limit = limit.min(secondary.length()).min(primary.media_in);
        if let Some(max) = secondary.maximum_length() {
            limit = limit.min(max - (secondary.media_in + secondary.length()));
        }
    }
    limit
}

/// Resizes or removes transitions on `clips` so every length fits its clips
/// and a clip's opening and closing never overlap. Shared transitions whose
/// clips no longer meet at a cut are removed. Returns the transitions changed.
pub fn fit_transitions(
    plan: &mut EditPlan,
    clips: &[ClipId],
) -> Result<Vec<TransitionId>, TimelineError> {
    let mut seen = HashSet::new();
    let mut changed = Vec::new();

    for clip_id in clips {
        let Some(clip) = plan.sequence().clip(*clip_id) else {
            continue;
        };
        let ids: Vec<TransitionId> = clip.opening.into_iter().chain(clip.closing).collect();
        for transition_id in ids {
            if !seen.insert(transition_id) {
                continue;
            }
            let Some(transition) = plan.sequence().transition(transition_id).cloned() else {
                continue;
            };
            let broken_cut = transition.secondary.is_some_and(|secondary| {
                match (
                    plan.sequence().clip(transition.primary),
                    plan.sequence().clip(secondary),
                ) {
                    (Some(p), Some(s)) => p.track != s.track || s.timeline_out != p.timeline_in,
                    _ => true,
                }
            });
            let limit = transition_limit(plan.sequence(), &transition);
            if broken_cut || limit <= 0 {
                plan.push(EditCommand::RemoveTransition { transition_id })?;
                changed.push(transition_id);
            } else if transition.length > limit {
                plan.push(EditCommand::ResizeTransition {
                    transition_id,
                    length: limit,
                })?;
                changed.push(transition_id);
            }
        }

        // opening and closing share the clip's body
        let Some(clip) = plan.sequence().clip(*clip_id) else {
            continue;
        };
        let length = clip.length();
        let opening = plan.sequence().clip_transition(*clip_id, TransitionEdge::Opening);
        let closing = plan.sequence().clip_transition(*clip_id, TransitionEdge::Closing);
        if let (Some(opening), Some(closing)) = (opening, closing) {
            let excess = opening.length + closing.length - length;
            if excess > 0 {
                let transition_id = closing.id;
                let remaining = closing.length - excess;
                if remaining > 0 {
                    plan.push(EditCommand::ResizeTransition {
                        transition_id,
                        length: remaining,
                    })?;
                } else {
                    plan.push(EditCommand::RemoveTransition { transition_id })?;
                }
                changed.push(transition_id);
            }
        }
    }
    Ok(changed)
}

/// Closes an empty gap on one track by pulling later clips back.
pub fn close_gap(
    plan: &mut EditPlan,
    track: TrackId,
    gap_start: Frame,
    gap_end: Frame,
) -> Result<Vec<ClipId>, TimelineError> {
    if gap_end <= gap_start {
        return Err(TimelineError::InvalidRange {
            start: gap_start,
            end: gap_end,
        });
    }
    if let Some(clip) = plan
        .sequence()
        .clips_on_track(track)
        .into_iter()
        .find(|c| c.overlaps(gap_start, gap_end))
    {
        return Err(TimelineError::InvalidOp(format!(
            "{} sits inside the gap {}..{}",
            clip.id, gap_start, gap_end
        )));
    }
    ripple(
        plan,
        gap_end,
        gap_start - gap_end,
        Some(&[track][..]),
        &HashSet::new(),
    )
}

/// Shifts the given clips by `delta` frames on their own tracks.
pub fn nudge(plan: &mut EditPlan, clips: &[ClipId], delta: Frame) -> Result<(), TimelineError> {
    plan.atomic(|plan| {
        let mut ordered: Vec<(Frame, ClipId)> = clips
            .iter()
            .filter_map(|id| plan.sequence().clip(*id).map(|c| (c.timeline_in, c.id)))
            .collect();
        ordered.sort();
        if delta > 0 {
            ordered.reverse();
        }
        for (_, clip_id) in &ordered {
            shift_clip(plan, *clip_id, delta)?;
        }
        let ids: Vec<ClipId> = ordered.into_iter().map(|(_, id)| id).collect();
        fit_transitions(plan, &ids)?;
        Ok(())
    })
}

/// Removes `[start, end)` from the given tracks and pulls later clips back.
pub fn ripple_delete(
    plan: &mut EditPlan,
    tracks: &[TrackId],
    start: Frame,
    end: Frame,
) -> Result<(), TimelineError> {
    if end <= start {
        return Err(TimelineError::InvalidRange { start, end });
    }
    plan.atomic(|plan| {
        let unlocked: Vec<TrackId> = tracks
            .iter()
            .copied()
            .filter(|t| !plan.sequence().is_track_locked(*t))
            .collect();
        for track in &unlocked {
            clear_area(plan, *track, start, end, &HashSet::new())?;
        }
        let moved = ripple(plan, end, start - end, Some(unlocked.as_slice()), &HashSet::new())?;
        fit_transitions(plan, &moved)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fps, MediaSource, TransitionKind};

    fn create_test_clip(seq: &mut Sequence, track: i32, start: Frame, end: Frame) -> ClipId {
        seq.create_clip(
            "test clip",
            TrackId(track),
            start,
            end,
            MediaSource::footage("test.mp4", (end - start) * 3),
        )
        .unwrap()
    }

    fn apply(seq: &mut Sequence, plan: EditPlan) {
        plan.into_batch("test").apply(seq).unwrap();
    }

    #[test]
    fn test_ripple_shifts_later_clips() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, 0, 0, 50);
        let b = create_test_clip(&mut seq, 0, 50, 100);
        let c = create_test_clip(&mut seq, 1, 60, 80);

        let mut plan = EditPlan::new(&seq);
        let moved = ripple(&mut plan, 50, 10, None, &HashSet::new()).unwrap();
        assert_eq!(moved.len(), 2);
        apply(&mut seq, plan);

        assert_eq!(seq.clip(a).unwrap().timeline_in, 0);
        assert_eq!(seq.clip(b).unwrap().timeline_in, 60);
        assert_eq!(seq.clip(c).unwrap().timeline_out, 90);
    }

    #[test]
    fn test_ripple_skips_locked_track() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, 0, 10, 20);
        let b = create_test_clip(&mut seq, 1, 10, 20);
        seq.set_track_locked(TrackId(1), true);

        let mut plan = EditPlan::new(&seq);
        ripple(&mut plan, 0, 5, None, &HashSet::new()).unwrap();
        apply(&mut seq, plan);
        assert_eq!(seq.clip(a).unwrap().timeline_in, 15);
        assert_eq!(seq.clip(b).unwrap().timeline_in, 10);
    }

    #[test]
    fn test_locked_command_is_dropped() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, 0, 10, 20);
        seq.set_track_locked(TrackId(0), true);

        let mut plan = EditPlan::new(&seq);
        assert!(!move_clip(&mut plan, a, TrackId(0), 30, 40, 0).unwrap());
        assert!(plan.is_empty());
        assert_eq!(plan.dropped(), 1);
    }

    #[test]
    fn test_split_moves_closing_transition_to_tail() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, -1, 0, 100);
        let fade = seq
            .add_transition(a, TransitionEdge::Closing, None, TransitionKind::Dissolve, 10)
            .unwrap();

        let mut plan = EditPlan::new(&seq);
        let tail = split_clip(&mut plan, a, 40).unwrap();
        apply(&mut seq, plan);

        let head = seq.clip(a).unwrap();
        assert_eq!((head.timeline_in, head.timeline_out), (0, 40));
        assert!(head.closing.is_none());
        let tail = seq.clip(tail).unwrap();
        assert_eq!((tail.timeline_in, tail.timeline_out, tail.media_in), (40, 100, 40));
        assert_eq!(tail.closing, Some(fade));
        assert_eq!(seq.transition(fade).unwrap().primary, tail.id);
    }

    #[test]
    fn test_split_outside_clip_fails_cleanly() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, 0, 0, 10);
        let mut plan = EditPlan::new(&seq);
        assert!(split_clip(&mut plan, a, 10).is_err());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_clear_area_cases() {
        let mut seq = Sequence::new("test", Fps::default());
        let whole = create_test_clip(&mut seq, 0, 10, 20);
        let spanning = create_test_clip(&mut seq, 1, 0, 100);
        let left = create_test_clip(&mut seq, 2, 0, 15);
        let right = create_test_clip(&mut seq, 2, 15, 30);

        let mut plan = EditPlan::new(&seq);
        for track in 0..3 {
            clear_area(&mut plan, TrackId(track), 10, 20, &HashSet::new()).unwrap();
        }
        apply(&mut seq, plan);

        assert!(seq.clip(whole).is_none());
        assert_eq!(seq.clip(spanning).unwrap().timeline_out, 10);
        let track_one = seq.clips_on_track(TrackId(1));
        assert_eq!(track_one.len(), 2);
        assert_eq!(track_one[1].timeline_in, 20);
        assert_eq!(track_one[1].media_in, 20);
        assert_eq!(seq.clip(left).unwrap().timeline_out, 10);
        let right = seq.clip(right).unwrap();
        assert_eq!((right.timeline_in, right.media_in), (20, 5));
    }

    #[test]
    fn test_clear_area_respects_keep_set() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, 0, 0, 50);
        let keep: HashSet<ClipId> = [a].into_iter().collect();
        let mut plan = EditPlan::new(&seq);
        let touched = clear_area(&mut plan, TrackId(0), 0, 50, &keep).unwrap();
        assert!(touched.is_empty());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_close_gap() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, 0, 0, 10);
        let b = create_test_clip(&mut seq, 0, 20, 30);

        let mut plan = EditPlan::new(&seq);
        close_gap(&mut plan, TrackId(0), 10, 20).unwrap();
        apply(&mut seq, plan);
        assert_eq!(seq.clip(a).unwrap().timeline_out, 10);
        assert_eq!(seq.clip(b).unwrap().timeline_in, 10);

        let mut plan = EditPlan::new(&seq);
        assert!(close_gap(&mut plan, TrackId(0), 5, 15).is_err());
    }

    #[test]
    fn test_ripple_delete_pulls_back() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, 0, 0, 40);
        let b = create_test_clip(&mut seq, 0, 40, 60);

        let mut plan = EditPlan::new(&seq);
        ripple_delete(&mut plan, &[TrackId(0)], 30, 45).unwrap();
        apply(&mut seq, plan);

        assert_eq!(seq.clip(a).unwrap().timeline_out, 30);
        let b = seq.clip(b).unwrap();
        assert_eq!((b.timeline_in, b.timeline_out, b.media_in), (30, 45, 5));
        assert!(seq.validate().is_ok());
    }

    #[test]
    fn test_nudge_breaks_cut_transition() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, -1, 0, 50);
        let b = seq
            .create_clip("b", TrackId(-1), 50, 100, MediaSource::footage("b.mp4", 300))
            .unwrap();
        let mut plan = EditPlan::new(&seq);
        move_clip(&mut plan, b, TrackId(-1), 50, 100, 20).unwrap();
        apply(&mut seq, plan);
        let cut = seq
            .add_transition(b, TransitionEdge::Opening, Some(a), TransitionKind::Dissolve, 8)
            .unwrap();

        let mut plan = EditPlan::new(&seq);
        nudge(&mut plan, &[b], 5).unwrap();
        apply(&mut seq, plan);

        assert!(seq.transition(cut).is_none());
        assert!(seq.clip(a).unwrap().closing.is_none());
        assert_eq!(seq.clip(b).unwrap().timeline_in, 55);
    }

    #[test]
    fn test_fit_transitions_shrinks_to_clip() {
        let mut seq = Sequence::new("test", Fps::default());
        let a = create_test_clip(&mut seq, 0, 0, 40);
        let fade = seq
            .add_transition(a, TransitionEdge::Opening, None, TransitionKind::Dissolve, 30)
            .unwrap();

        let mut plan = EditPlan::new(&seq);
        move_clip(&mut plan, a, TrackId(0), 0, 20, 0).unwrap();
        let changed = fit_transitions(&mut plan, &[a]).unwrap();
        assert_eq!(changed, vec![fade]);
        apply(&mut seq, plan);
        assert_eq!(seq.transition(fade).unwrap().length, 20);
    }
}
