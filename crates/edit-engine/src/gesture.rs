//! The begin / update / commit lifecycle of one pointer gesture.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use timeline::{CommandLog, Frame, Sequence};

use crate::{
    commit::{self, GestureResult},
    context::{GestureContext, Pointer},
    ghost::{GhostSet, GhostSnapshot},
    snap::{Snap, SnapResolver},
    tool::{Tool, TransitionAction},
    validate::{clamp_frame_diff, clamp_track_diff},
    EngineError,
};

/// What the caller shows while a gesture is in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureReadout {
    pub frame_diff: Frame,
    pub track_diff: i32,
    /// New length of the trimmed clip or transition, if the tool has one.
    pub duration: Option<Frame>,
    pub snapped: Option<Snap>,
}

/// One in-flight edit. Nothing reaches the sequence until [`Gesture::commit`].
#[derive(Debug)]
pub struct Gesture {
    tool: Tool,
    start: Pointer,
    ghosts: GhostSet,
    snapper: SnapResolver,
    readout: GestureReadout,
}

impl Gesture {
    /// Starts a gesture with the context's tool at `pointer`. The selections
    /// are frozen so they can follow the ghosts and be restored on cancel.
    pub fn begin(sequence: &Sequence, ctx: &mut GestureContext, pointer: Pointer) -> Self {
        ctx.selections.iter_mut().for_each(|s| s.snapshot());
        let ghosts = GhostSet::build(sequence, ctx);
        let snapper = if ghosts.is_empty() {
            SnapResolver::default()
        } else {
            SnapResolver::new(sequence, &ctx.settings.snap, &ghosts)
        };
        debug!(
            tool = ctx.tool.name(),
            frame = pointer.frame,
            track = %pointer.track,
            ghosts = ghosts.len(),
            "begin gesture"
        );
        Self {
            tool: ctx.tool.clone(),
            start: pointer,
            ghosts,
            snapper,
            readout: GestureReadout::default(),
        }
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    pub fn ghosts(&self) -> &GhostSet {
        &self.ghosts
    }

    /// Current ghost positions for drawing.
    pub fn snapshot(&self) -> Vec<GhostSnapshot> {
        self.ghosts.snapshot()
    }

    pub fn readout(&self) -> GestureReadout {
        self.readout
    }

    /// Switches between moving and inserting mid-gesture. Takes effect on
    /// the next update.
    pub fn set_insert(&mut self, insert: bool) {
        self.tool = self.tool.clone().with_insert(insert);
    }

    /// Re-places every ghost for the pointer's new position.
    pub fn update(
        &mut self,
        sequence: &Sequence,
        ctx: &mut GestureContext,
        pointer: Pointer,
    ) -> GestureReadout {
        if self.ghosts.is_empty() {
            return self.readout;
        }
        let live = self.ghosts.live(sequence);
        if live.iter().any(|alive| !alive) {
            warn!(
                stale = live.iter().filter(|alive| !**alive).count(),
                "ghosts refer to clips that no longer exist"
            );
        }

        let mut frame_diff = pointer.frame - self.start.frame;
        let mut snapped = None;
        if ctx.settings.snap.enabled && !pointer.snap_locked && self.tool.moves_timeline() {
            (frame_diff, snapped) =
                self.snapper
                    .snap_ghosts(&self.ghosts, frame_diff, ctx.snap_tolerance());
        }

        let settled = clamp_frame_diff(
            &self.tool,
            &self.ghosts,
            &live,
            frame_diff,
            ctx.settings.max_clamp_iterations,
        );
        let (frame_diff, track_diff) = match settled {
            Some(clamped) => {
                if clamped != frame_diff {
                    snapped = None;
                }
                let track_diff = clamp_track_diff(
                    &self.tool,
                    &self.ghosts,
                    sequence,
                    self.start.track,
                    pointer.track.0 - self.start.track.0,
                );
                (clamped, track_diff)
            }
            None => {
                snapped = None;
                (0, 0)
            }
        };

        self.ghosts
            .place(&self.tool, frame_diff, track_diff, self.start.track, &live);
        self.follow_selections(ctx, frame_diff, track_diff);
        self.readout = GestureReadout {
            frame_diff,
            track_diff,
            duration: self.duration(),
            snapped,
        };
        self.readout
    }

    /// Applies the gesture to `sequence`, appending its batches to `log`.
    /// The selections are restored if the commit fails.
    pub fn commit(
        self,
        sequence: &mut Sequence,
        ctx: &mut GestureContext,
        log: &mut dyn CommandLog,
    ) -> Result<GestureResult, EngineError> {
        if self.ghosts.is_empty() {
            return Ok(GestureResult::default());
        }
        let committed = commit::commit(&self.ghosts, &self.tool, sequence, ctx, log);
        if committed.is_err() {
            ctx.selections.iter_mut().for_each(|s| s.restore());
        }
        committed
    }

    /// Drops the gesture and puts the selections back.
    pub fn cancel(self, ctx: &mut GestureContext) {
        ctx.selections.iter_mut().for_each(|s| s.restore());
        debug!(tool = self.tool.name(), "cancelled gesture");
    }

    fn follow_selections(&self, ctx: &mut GestureContext, frame_diff: Frame, track_diff: i32) {
        for selection in &mut ctx.selections {
            selection.restore();
        }
        match &self.tool {
            Tool::Move | Tool::Insert | Tool::Slide => {
                for selection in &mut ctx.selections {
                    selection.shift(frame_diff);
                    if selection.old_track.same_kind(self.start.track) {
                        selection.track = selection.old_track.offset(track_diff);
                    }
                }
            }
            Tool::Trim { .. } | Tool::RippleTrim { .. } | Tool::Roll { .. } => {
                let trimmed = self
                    .ghosts
                    .ghosts()
                    .iter()
                    .filter(|g| g.trimming && !g.discovered);
                for ghost in trimmed {
                    for selection in ctx
                        .selections
                        .iter_mut()
                        .filter(|s| s.old_track == ghost.old_track)
                    {
                        if ghost.trim_in && selection.old_in == ghost.old_in {
                            selection.in_point = ghost.in_point;
                        } else if !ghost.trim_in && selection.old_out == ghost.old_out {
                            selection.out_point = ghost.out_point;
                        }
                    }
                }
            }
            Tool::Slip | Tool::Transition { .. } => {}
        }
    }

    fn duration(&self) -> Option<Frame> {
        match &self.tool {
            Tool::Trim { .. } | Tool::RippleTrim { .. } | Tool::Roll { .. } => self
                .ghosts
                .ghosts()
                .iter()
                .find(|g| !g.discovered)
                .map(|g| g.out_point - g.in_point),
            Tool::Transition {
                action: TransitionAction::Create { .. } | TransitionAction::Resize { .. },
            } => self.ghosts.ghosts().first().and_then(|g| g.transition_length()),
            Tool::Move | Tool::Insert | Tool::Slip | Tool::Slide => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::Selection, tool::Edge};
    use timeline::{CommandBatch, Fps, MediaSource, TrackId};

    fn create_test_clip(seq: &mut Sequence, track: i32, start: Frame, end: Frame) -> timeline::ClipId {
        seq.create_clip(
            "test clip",
            TrackId(track),
            start,
            end,
            MediaSource::footage("test.mp4", 1000),
        )
        .unwrap()
    }

    fn clips(seq: &Sequence) -> Vec<timeline::Clip> {
        seq.clips().cloned().collect()
    }

    fn context(tool: Tool, track: i32, start: Frame, end: Frame) -> GestureContext {
        let mut ctx =
            GestureContext::new(tool).with_selection(Selection::new(TrackId(track), start, end));
        ctx.settings.snap.enabled = false;
        ctx
    }

    #[test]
    fn test_update_leaves_sequence_alone() {
        let mut seq = Sequence::new("test", Fps::default());
        create_test_clip(&mut seq, 0, 0, 50);
        let before = clips(&seq);
        let mut ctx = context(Tool::Move, 0, 0, 50);

        let mut gesture = Gesture::begin(&seq, &mut ctx, Pointer::new(10, TrackId(0)));
        let readout = gesture.update(&seq, &mut ctx, Pointer::new(40, TrackId(1)));
        assert_eq!((readout.frame_diff, readout.track_diff), (30, 1));
        assert_eq!(gesture.snapshot()[0].in_point, 30);
        assert_eq!(ctx.selections[0].track, TrackId(1));
        assert_eq!(clips(&seq), before);

        gesture.cancel(&mut ctx);
        assert_eq!(ctx.selections[0], Selection::new(TrackId(0), 0, 50));
    }

    #[test]
    fn test_snapping_is_skipped_when_locked() {
        let mut seq = Sequence::new("test", Fps::default());
        create_test_clip(&mut seq, 0, 0, 50);
        create_test_clip(&mut seq, 0, 100, 150);
        seq.playhead = 1000;
        let mut ctx = context(Tool::Move, 0, 0, 50);
        ctx.settings.snap.enabled = true;

        let mut gesture = Gesture::begin(&seq, &mut ctx, Pointer::new(0, TrackId(0)));
        let readout = gesture.update(&seq, &mut ctx, Pointer::new(47, TrackId(0)));
        assert_eq!(readout.frame_diff, 50);
        assert!(readout.snapped.is_some());

        let pointer = Pointer::new(47, TrackId(0)).without_snapping();
        let readout = gesture.update(&seq, &mut ctx, pointer);
        assert_eq!(readout.frame_diff, 47);
        assert_eq!(readout.snapped, None);
    }

    #[test]
    fn test_trim_readout_and_selection() {
        let mut seq = Sequence::new("test", Fps::default());
        create_test_clip(&mut seq, 0, 0, 50);
        let mut ctx = context(Tool::Trim { edge: Edge::Out }, 0, 0, 50);

        let mut gesture = Gesture::begin(&seq, &mut ctx, Pointer::new(50, TrackId(0)));
        let readout = gesture.update(&seq, &mut ctx, Pointer::new(30, TrackId(3)));
        assert_eq!(readout.track_diff, 0);
        assert_eq!(readout.duration, Some(30));
        assert_eq!(
            (ctx.selections[0].in_point, ctx.selections[0].out_point),
            (0, 30)
        );
    }

    #[test]
    fn test_commit_without_movement_is_empty() {
        let mut seq = Sequence::new("test", Fps::default());
        create_test_clip(&mut seq, 0, 0, 50);
        let before = clips(&seq);
        let mut ctx = context(Tool::Move, 0, 0, 50);
        let mut log: Vec<CommandBatch> = Vec::new();

        let mut gesture = Gesture::begin(&seq, &mut ctx, Pointer::new(10, TrackId(0)));
        gesture.update(&seq, &mut ctx, Pointer::new(10, TrackId(0)));
        let result = gesture.commit(&mut seq, &mut ctx, &mut log).unwrap();
        assert!(result.is_empty());
        assert!(log.is_empty());
        assert_eq!(clips(&seq), before);
    }

    #[test]
    fn test_move_then_undo() {
        let mut seq = Sequence::new("test", Fps::default());
        let clip = create_test_clip(&mut seq, 0, 0, 50);
        let before = clips(&seq);
        let mut ctx = context(Tool::Move, 0, 0, 50);
        let mut history = timeline::CommandHistory::default();

        let mut gesture = Gesture::begin(&seq, &mut ctx, Pointer::new(0, TrackId(0)));
        gesture.update(&seq, &mut ctx, Pointer::new(25, TrackId(0)));
        let result = gesture.commit(&mut seq, &mut ctx, &mut history).unwrap();
        assert_eq!(result.mutated, vec![clip]);
        assert_eq!(seq.clip(clip).unwrap().timeline_in, 25);
        assert_eq!(ctx.selections[0].old_in, 25);

        history.undo(&mut seq).unwrap();
        assert_eq!(clips(&seq), before);
    }

    #[test]
    fn test_switching_to_insert_mid_gesture() {
        let mut seq = Sequence::new("test", Fps::default());
        let dragged = create_test_clip(&mut seq, 0, 0, 10);
        let other = create_test_clip(&mut seq, 1, 20, 40);
        let mut ctx = context(Tool::Move, 0, 0, 10);
        let mut log: Vec<CommandBatch> = Vec::new();

        let mut gesture = Gesture::begin(&seq, &mut ctx, Pointer::new(0, TrackId(0)));
        gesture.set_insert(true);
        assert_eq!(gesture.tool(), &Tool::Insert);
        gesture.update(&seq, &mut ctx, Pointer::new(25, TrackId(1)));
        gesture.commit(&mut seq, &mut ctx, &mut log).unwrap();

        // split at 25, pushed by ten, then the vacated head span closed
        let dragged = seq.clip(dragged).unwrap();
        assert_eq!((dragged.track, dragged.timeline_in), (TrackId(1), 15));
        let head = seq.clip(other).unwrap();
        assert_eq!((head.timeline_in, head.timeline_out), (10, 15));
        assert_eq!(seq.clips_on_track(TrackId(1)).len(), 3);
    }
}
