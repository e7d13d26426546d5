use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Clip, ClipId, Frame, Sequence, TimelineError, TrackId, Transition, TransitionId};

/// Primitive, invertible mutation of a [`Sequence`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditCommand {
    InsertClip {
        clip: Clip,
    },
    RemoveClip {
        clip_id: ClipId,
    },
    MoveClip {
        clip_id: ClipId,
        track: TrackId,
        timeline_in: Frame,
        timeline_out: Frame,
        media_in: Frame,
    },
    InsertTransition {
        transition: Transition,
    },
    RemoveTransition {
        transition_id: TransitionId,
    },
    ResizeTransition {
        transition_id: TransitionId,
        length: Frame,
    },
}

impl EditCommand {
    /// Clip a command changes directly, if any.
    pub fn clip_id(&self) -> Option<ClipId> {
        match self {
            EditCommand::InsertClip { clip } => Some(clip.id),
            EditCommand::RemoveClip { clip_id } | EditCommand::MoveClip { clip_id, .. } => {
                Some(*clip_id)
            }
            _ => None,
        }
    }

    /// Every track the command would touch when applied to `sequence`.
    pub fn tracks(&self, sequence: &Sequence) -> Vec<TrackId> {
        let clip_track = |id: ClipId| sequence.clip(id).map(|c| c.track);
        let transition_tracks = |id: TransitionId| {
            sequence
                .transition(id)
                .map(|t| {
                    std::iter::once(t.primary)
                        .chain(t.secondary)
                        .filter_map(clip_track)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };
        match self {
            EditCommand::InsertClip { clip } => vec![clip.track],
            EditCommand::RemoveClip { clip_id } => clip_track(*clip_id).into_iter().collect(),
            EditCommand::MoveClip { clip_id, track, .. } => {
                let mut tracks = vec![*track];
                tracks.extend(clip_track(*clip_id).filter(|t| t != track));
                tracks
            }
            EditCommand::InsertTransition { transition } => std::iter::once(transition.primary)
                .chain(transition.secondary)
                .filter_map(clip_track)
                .collect(),
            EditCommand::RemoveTransition { transition_id }
            | EditCommand::ResizeTransition { transition_id, .. } => {
                transition_tracks(*transition_id)
            }
        }
    }
}

/// Applies one command and returns the command that undoes it.
pub fn apply_command(
    sequence: &mut Sequence,
    command: EditCommand,
) -> Result<EditCommand, TimelineError> {
    match command {
        EditCommand::InsertClip { clip } => insert_clip(sequence, clip),
        EditCommand::RemoveClip { clip_id } => remove_clip(sequence, clip_id),
        EditCommand::MoveClip {
            clip_id,
            track,
            timeline_in,
            timeline_out,
            media_in,
        } => move_clip(sequence, clip_id, track, timeline_in, timeline_out, media_in),
        EditCommand::InsertTransition { transition } => insert_transition(sequence, transition),
        EditCommand::RemoveTransition { transition_id } => {
            remove_transition(sequence, transition_id)
        }
        EditCommand::ResizeTransition {
            transition_id,
            length,
        } => resize_transition(sequence, transition_id, length),
    }
}

fn insert_clip(sequence: &mut Sequence, clip: Clip) -> Result<EditCommand, TimelineError> {
    if clip.opening.is_some() || clip.closing.is_some() {
        return Err(TimelineError::InvalidOp(format!(
            "{} must be inserted without transitions",
            clip.id
        )));
    }
    let clip_id = sequence.insert_clip(clip)?;
    Ok(EditCommand::RemoveClip { clip_id })
}

fn remove_clip(sequence: &mut Sequence, clip_id: ClipId) -> Result<EditCommand, TimelineError> {
    let clip = sequence.remove_clip(clip_id)?;
    Ok(EditCommand::InsertClip { clip })
}

fn move_clip(
    sequence: &mut Sequence,
    clip_id: ClipId,
    track: TrackId,
    timeline_in: Frame,
    timeline_out: Frame,
    media_in: Frame,
) -> Result<EditCommand, TimelineError> {
    if timeline_in < 0 || timeline_out <= timeline_in {
        return Err(TimelineError::InvalidRange {
            start: timeline_in,
            end: timeline_out,
        });
    }
    if media_in < 0 {
        return Err(TimelineError::InvalidOp(format!(
            "{} cannot start at media frame {}",
            clip_id, media_in
        )));
    }
    let clip = sequence
        .clip_mut(clip_id)
        .ok_or(TimelineError::ClipNotFound(clip_id))?;
    let previous = EditCommand::MoveClip {
        clip_id,
        track: clip.track,
        timeline_in: clip.timeline_in,
        timeline_out: clip.timeline_out,
        media_in: clip.media_in,
    };
    clip.track = track;
    clip.timeline_in = timeline_in;
    clip.timeline_out = timeline_out;
    clip.media_in = media_in;
    Ok(previous)
}

fn insert_transition(
    sequence: &mut Sequence,
    transition: Transition,
) -> Result<EditCommand, TimelineError> {
    let transition_id = sequence.insert_transition(transition)?;
    Ok(EditCommand::RemoveTransition { transition_id })
}

fn remove_transition(
    sequence: &mut Sequence,
    transition_id: TransitionId,
) -> Result<EditCommand, TimelineError> {
    let transition = sequence.remove_transition(transition_id)?;
    Ok(EditCommand::InsertTransition { transition })
}

fn resize_transition(
    sequence: &mut Sequence,
    transition_id: TransitionId,
    length: Frame,
) -> Result<EditCommand, TimelineError> {
    if length < 1 {
        return Err(TimelineError::InvalidOp(format!(
            "{} cannot be resized to {} frames",
            transition_id, length
        )));
    }
    let transition = sequence
        .transition_mut(transition_id)
        .ok_or(TimelineError::TransitionNotFound(transition_id))?;
    let previous = std::mem::replace(&mut transition.length, length);
    Ok(EditCommand::ResizeTransition {
        transition_id,
        length: previous,
    })
}

/// Applies `commands` in order. On failure every command already applied is
/// undone before the error is returned. Returns the inverses in application
/// order.
fn apply_all(
    sequence: &mut Sequence,
    commands: impl IntoIterator<Item = EditCommand>,
) -> Result<Vec<EditCommand>, TimelineError> {
    let mut inverses = Vec::new();
    for command in commands {
        match apply_command(sequence, command) {
            Ok(inverse) => inverses.push(inverse),
            Err(err) => {
                rollback(sequence, inverses);
                return Err(err);
            }
        }
    }
    Ok(inverses)
}

fn rollback(sequence: &mut Sequence, inverses: Vec<EditCommand>) {
    for inverse in inverses.into_iter().rev() {
        if let Err(err) = apply_command(sequence, inverse) {
            warn!(%err, "rollback command failed");
        }
    }
}

/// An ordered list of commands applied and undone as one unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CommandBatch {
    pub label: String,
    pub commands: Vec<EditCommand>,
    /// Filled in by [`CommandBatch::apply`], in application order.
    #[serde(default)]
    pub inverses: Vec<EditCommand>,
}

impl CommandBatch {
    pub fn new(label: impl Into<String>, commands: Vec<EditCommand>) -> Self {
        Self {
            label: label.into(),
            commands,
            inverses: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Applies every command or none. A batch that leaves clips overlapping
    /// or out of range is rolled back.
    pub fn apply(&mut self, sequence: &mut Sequence) -> Result<(), TimelineError> {
        let inverses = apply_all(sequence, self.commands.iter().cloned())?;
        if let Err(err) = sequence.validate_clips() {
            rollback(sequence, inverses);
            return Err(err);
        }
        self.inverses = inverses;
        Ok(())
    }

    /// Undoes a previously applied batch.
    pub fn revert(&self, sequence: &mut Sequence) -> Result<(), TimelineError> {
        apply_all(sequence, self.inverses.iter().rev().cloned()).map(|_| ())
    }
}

/// Sink for applied batches. Each appended batch is one undo unit.
pub trait CommandLog {
    fn append(&mut self, batch: CommandBatch);
}

impl CommandLog for Vec<CommandBatch> {
    fn append(&mut self, batch: CommandBatch) {
        self.push(batch);
    }
}

#[derive(Debug, Default, Clone)]
pub struct CommandHistory {
    undo_stack: Vec<CommandBatch>,
    redo_stack: Vec<CommandBatch>,
}

impl CommandHistory {
    pub fn apply(
        &mut self,
        sequence: &mut Sequence,
        mut batch: CommandBatch,
    ) -> Result<(), TimelineError> {
        batch.apply(sequence)?;
        self.append(batch);
        Ok(())
    }

    pub fn undo(&mut self, sequence: &mut Sequence) -> Result<(), TimelineError> {
        let batch = self
            .undo_stack
            .pop()
            .ok_or(TimelineError::HistoryEmpty("undo stack"))?;
        if let Err(err) = batch.revert(sequence) {
            self.undo_stack.push(batch);
            return Err(err);
        }
        self.redo_stack.push(batch);
        Ok(())
    }

    pub fn redo(&mut self, sequence: &mut Sequence) -> Result<(), TimelineError> {
        let mut batch = self
            .redo_stack
            .pop()
            .ok_or(TimelineError::HistoryEmpty("redo stack"))?;
        if let Err(err) = batch.apply(sequence) {
            self.redo_stack.push(batch);
            return Err(err);
        }
        self.undo_stack.push(batch);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn last(&self) -> Option<&CommandBatch> {
        self.undo_stack.last()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl CommandLog for CommandHistory {
    fn append(&mut self, batch: CommandBatch) {
        self.undo_stack.push(batch);
        self.redo_stack.clear();
    }
}
