use serde::{Deserialize, Serialize};
use timeline::{ClipId, Frame, Sequence, TrackId, TransitionId};

use crate::{config::EngineSettings, tool::Tool};

/// A selected region on one track. The `old_*` copies hold the bounds from
/// before the current gesture so they can be diffed or restored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub track: TrackId,
    pub in_point: Frame,
    pub out_point: Frame,
    pub old_in: Frame,
    pub old_out: Frame,
    pub old_track: TrackId,
}

impl Selection {
    pub fn new(track: TrackId, in_point: Frame, out_point: Frame) -> Self {
        Self {
            track,
            in_point,
            out_point,
            old_in: in_point,
            old_out: out_point,
            old_track: track,
        }
    }

    /// Freezes the current bounds as the pre-gesture copy.
    pub fn snapshot(&mut self) {
        self.old_in = self.in_point;
        self.old_out = self.out_point;
        self.old_track = self.track;
    }

    pub fn restore(&mut self) {
        self.in_point = self.old_in;
        self.out_point = self.old_out;
        self.track = self.old_track;
    }

    pub fn shift(&mut self, frames: Frame) {
        self.in_point += frames;
        self.out_point += frames;
    }

    pub fn covers(&self, track: TrackId, start: Frame, end: Frame) -> bool {
        self.track == track && self.in_point <= start && self.out_point >= end
    }

    pub fn overlaps(&self, track: TrackId, start: Frame, end: Frame) -> bool {
        self.track == track && self.in_point < end && self.out_point > start
    }
}

/// Caller-supplied pointer position, already mapped to frames and tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    pub frame: Frame,
    pub track: TrackId,
    /// Modifier held to suppress snapping for this position.
    #[serde(default)]
    pub snap_locked: bool,
}

impl Pointer {
    pub fn new(frame: Frame, track: TrackId) -> Self {
        Self {
            frame,
            track,
            snap_locked: false,
        }
    }

    pub fn without_snapping(mut self) -> Self {
        self.snap_locked = true;
        self
    }
}

/// Everything a gesture needs from the caller. Owned by the caller and
/// passed into every engine call.
#[derive(Clone, Debug, Default)]
pub struct GestureContext {
    pub tool: Tool,
    pub selections: Vec<Selection>,
    /// Current zoom, used to turn the pixel snap tolerance into frames.
    pub pixels_per_frame: f64,
    pub settings: EngineSettings,
}

impl GestureContext {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            selections: Vec::new(),
            pixels_per_frame: 1.0,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_zoom(mut self, pixels_per_frame: f64) -> Self {
        self.pixels_per_frame = pixels_per_frame;
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selections.push(selection);
        self
    }

    pub fn snap_tolerance(&self) -> Frame {
        self.settings.snap.tolerance_frames(self.pixels_per_frame)
    }

    pub fn is_clip_selected(&self, sequence: &Sequence, clip_id: ClipId) -> bool {
        sequence.clip(clip_id).is_some_and(|clip| {
            self.selections
                .iter()
                .any(|s| s.covers(clip.track, clip.timeline_in, clip.timeline_out))
        })
    }
}

/// Selects a clip and, when `include_links` is set, every clip linked to it.
pub fn select_clip(
    sequence: &Sequence,
    selections: &mut Vec<Selection>,
    clip_id: ClipId,
    include_links: bool,
) {
    let Some(clip) = sequence.clip(clip_id) else {
        return;
    };
    selections.push(Selection::new(clip.track, clip.timeline_in, clip.timeline_out));
    if include_links {
        for linked in sequence.linked_clips(clip_id) {
            if let Some(clip) = sequence.clip(linked) {
                selections.push(Selection::new(clip.track, clip.timeline_in, clip.timeline_out));
            }
        }
    }
    clean_up_selections(selections);
}

/// Drops empty selections and merges ones that overlap or touch on the same
/// track.
pub fn clean_up_selections(selections: &mut Vec<Selection>) {
    selections.retain(|s| s.out_point > s.in_point);
    selections.sort_by_key(|s| (s.track, s.in_point, s.out_point));

    let mut merged: Vec<Selection> = Vec::with_capacity(selections.len());
    for selection in selections.drain(..) {
        match merged.last_mut() {
            Some(last) if last.track == selection.track && selection.in_point <= last.out_point => {
                last.out_point = last.out_point.max(selection.out_point);
                last.old_out = last.old_out.max(selection.old_out);
            }
            _ => merged.push(selection),
        }
    }
    *selections = merged;
}

/// True when a selection covers exactly the span of `transition_id`.
pub fn selection_contains_transition(
    sequence: &Sequence,
    selection: &Selection,
    transition_id: TransitionId,
) -> bool {
    let Some(transition) = sequence.transition(transition_id) else {
        return false;
    };
    let Some(track) = sequence.clip(transition.primary).map(|c| c.track) else {
        return false;
    };
    sequence.transition_span(transition_id) == Some((selection.in_point, selection.out_point))
        && selection.track == track
}

/// Removes `[start, end)` on `track` from the selections, splitting any that
/// span the whole area.
pub fn deselect_area(selections: &mut Vec<Selection>, track: TrackId, start: Frame, end: Frame) {
    let mut remaining = Vec::with_capacity(selections.len());
    for selection in selections.drain(..) {
        if !selection.overlaps(track, start, end) {
            remaining.push(selection);
            continue;
        }
        if selection.in_point < start {
            let mut head = selection;
            head.out_point = start;
            remaining.push(head);
        }
        if selection.out_point > end {
            let mut tail = selection;
            tail.in_point = end;
            remaining.push(tail);
        }
    }
    *selections = remaining;
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeline::{Fps, MediaSource, TransitionEdge, TransitionKind};

    #[test]
    fn test_clean_up_merges_touching() {
        let mut selections = vec![
            Selection::new(TrackId(0), 10, 20),
            Selection::new(TrackId(0), 20, 30),
            Selection::new(TrackId(1), 15, 25),
            Selection::new(TrackId(0), 40, 40),
        ];
        clean_up_selections(&mut selections);
        assert_eq!(selections.len(), 2);
        assert_eq!((selections[0].in_point, selections[0].out_point), (10, 30));
        assert_eq!(selections[1].track, TrackId(1));
    }

    #[test]
    fn test_deselect_area_splits() {
        let mut selections = vec![Selection::new(TrackId(0), 0, 100)];
        deselect_area(&mut selections, TrackId(0), 40, 60);
        assert_eq!(selections.len(), 2);
        assert_eq!(selections[0].out_point, 40);
        assert_eq!(selections[1].in_point, 60);

        deselect_area(&mut selections, TrackId(1), 0, 100);
        assert_eq!(selections.len(), 2);
    }

    #[test]
    fn test_select_clip_with_links() {
        let mut seq = Sequence::new("test", Fps::default());
        let video = seq
            .create_clip("v", TrackId(-1), 0, 30, MediaSource::footage("a.mp4", 90))
            .unwrap();
        let audio = seq
            .create_clip("a", TrackId(0), 0, 30, MediaSource::footage("a.mp4", 90))
            .unwrap();
        seq.link_clips(video, audio).unwrap();

        let mut selections = Vec::new();
        select_clip(&seq, &mut selections, video, true);
        assert_eq!(selections.len(), 2);

        let mut selections = Vec::new();
        select_clip(&seq, &mut selections, video, false);
        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].track, TrackId(-1));
    }

    #[test]
    fn test_transition_selection_is_exact() {
        let mut seq = Sequence::new("test", Fps::default());
        let clip = seq
            .create_clip("c", TrackId(-1), 0, 50, MediaSource::generated("solid"))
            .unwrap();
        let fade = seq
            .add_transition(clip, TransitionEdge::Opening, None, TransitionKind::Dissolve, 10)
            .unwrap();
        assert!(selection_contains_transition(
            &seq,
            &Selection::new(TrackId(-1), 0, 10),
            fade
        ));
        assert!(!selection_contains_transition(
            &seq,
            &Selection::new(TrackId(-1), 0, 11),
            fade
        ));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut selection = Selection::new(TrackId(2), 5, 10);
        selection.shift(7);
        selection.track = TrackId(3);
        selection.restore();
        assert_eq!(selection, Selection::new(TrackId(2), 5, 10));
    }
}
