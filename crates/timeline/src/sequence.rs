use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use crate::{markers::MarkerCollection, Fps, Frame, TimelineError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ClipId(pub u64);

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TransitionId(pub u64);

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transition#{}", self.0)
    }
}

/// Track number. Negative tracks hold video, zero and above hold audio.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TrackId(pub i32);

impl TrackId {
    pub const fn is_video(&self) -> bool {
        self.0 < 0
    }

    pub const fn is_audio(&self) -> bool {
        self.0 >= 0
    }

    pub const fn same_kind(&self, other: TrackId) -> bool {
        self.is_video() == other.is_video()
    }

    pub const fn offset(&self, delta: i32) -> TrackId {
        TrackId(self.0 + delta)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_video() {
            write!(f, "V{}", -self.0)
        } else {
            write!(f, "A{}", self.0 + 1)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackState {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for TrackState {
    fn default() -> Self {
        Self {
            name: String::new(),
            locked: false,
            enabled: true,
        }
    }
}

/// Where a clip's frames come from. Generated sources never run out of media.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaSource {
    Footage { asset: String, length: Frame },
    Nested { sequence: String, length: Frame },
    Generated { generator: String },
}

impl MediaSource {
    pub fn footage(asset: impl Into<String>, length: Frame) -> Self {
        Self::Footage {
            asset: asset.into(),
            length,
        }
    }

    pub fn generated(generator: impl Into<String>) -> Self {
        Self::Generated {
            generator: generator.into(),
        }
    }

    /// Source length in source frames, `None` for infinite sources.
    pub fn length(&self) -> Option<Frame> {
        match self {
            MediaSource::Footage { length, .. } | MediaSource::Nested { length, .. } => {
                Some(*length)
            }
            MediaSource::Generated { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransitionEdge {
    Opening,
    Closing,
}

impl TransitionEdge {
    pub const fn opposite(&self) -> Self {
        match self {
            TransitionEdge::Opening => TransitionEdge::Closing,
            TransitionEdge::Closing => TransitionEdge::Opening,
        }
    }
}

/// A clip on a track. `media_in` and the usable media length are both
/// counted in timeline frames at the clip's speed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clip {
    pub id: ClipId,
    pub name: String,
    pub track: TrackId,
    pub timeline_in: Frame,
    pub timeline_out: Frame,
    #[serde(default)]
    pub media_in: Frame,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default)]
    pub reverse: bool,
    pub media: MediaSource,
    #[serde(default)]
    pub links: Vec<ClipId>,
    #[serde(default)]
    pub opening: Option<TransitionId>,
    #[serde(default)]
    pub closing: Option<TransitionId>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn default_speed() -> f64 {
    1.0
}

impl Clip {
    pub fn new(
        id: ClipId,
        name: impl Into<String>,
        track: TrackId,
        timeline_in: Frame,
        timeline_out: Frame,
        media: MediaSource,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            track,
            timeline_in,
            timeline_out,
            media_in: 0,
            speed: 1.0,
            reverse: false,
            media,
            links: Vec::new(),
            opening: None,
            closing: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_media_in(mut self, media_in: Frame) -> Self {
        self.media_in = media_in;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn length(&self) -> Frame {
        self.timeline_out - self.timeline_in
    }

    /// Usable source length in timeline frames once speed is applied.
    pub fn maximum_length(&self) -> Option<Frame> {
        self.media.length().map(|length| {
            if self.speed > 0.0 {
                (length as f64 / self.speed).floor() as Frame
            } else {
                length
            }
        })
    }

    pub fn has_finite_media(&self) -> bool {
        self.media.length().is_some()
    }

    pub fn transition(&self, edge: TransitionEdge) -> Option<TransitionId> {
        match edge {
            TransitionEdge::Opening => self.opening,
            TransitionEdge::Closing => self.closing,
        }
    }

    pub(crate) fn transition_slot_mut(&mut self, edge: TransitionEdge) -> &mut Option<TransitionId> {
        match edge {
            TransitionEdge::Opening => &mut self.opening,
            TransitionEdge::Closing => &mut self.closing,
        }
    }

    /// True when any part of `[start, end)` lies inside this clip.
    pub fn overlaps(&self, start: Frame, end: Frame) -> bool {
        self.timeline_in < end && self.timeline_out > start
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Dissolve,
    Wipe,
    Slide,
    Custom(String),
}

impl Default for TransitionKind {
    fn default() -> Self {
        Self::Dissolve
    }
}

/// A transition hangs off its primary clip's edge. When it spans a cut it is
/// stored as the opening of the later clip and `secondary` names the earlier
/// clip, whose closing slot points back at the same transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transition {
    pub id: TransitionId,
    #[serde(default)]
    pub kind: TransitionKind,
    pub primary: ClipId,
    #[serde(default)]
    pub secondary: Option<ClipId>,
    pub edge: TransitionEdge,
    pub length: Frame,
}

impl Transition {
    pub fn is_shared(&self) -> bool {
        self.secondary.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    pub fps: Fps,
    #[serde(default)]
    pub playhead: Frame,
    #[serde(default)]
    pub tracks: BTreeMap<TrackId, TrackState>,
    #[serde(default)]
    pub markers: MarkerCollection,
    #[serde(default)]
    clips: BTreeMap<ClipId, Clip>,
    #[serde(default)]
    transitions: BTreeMap<TransitionId, Transition>,
    #[serde(default)]
    next_id: u64,
}

impl Sequence {
    pub fn new(name: impl Into<String>, fps: Fps) -> Self {
        Self {
            name: name.into(),
            fps,
            playhead: 0,
            tracks: BTreeMap::new(),
            markers: MarkerCollection::new(),
            clips: BTreeMap::new(),
            transitions: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn bump_ids_past(&mut self, raw: u64) {
        if raw >= self.next_id {
            self.next_id = raw + 1;
        }
    }

    pub fn allocate_clip_id(&mut self) -> ClipId {
        let id = ClipId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        id
    }

    pub fn allocate_transition_id(&mut self) -> TransitionId {
        let id = TransitionId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        id
    }

    // --- tracks -----------------------------------------------------------

    pub fn track_state(&self, track: TrackId) -> TrackState {
        self.tracks.get(&track).cloned().unwrap_or_default()
    }

    pub fn is_track_locked(&self, track: TrackId) -> bool {
        self.tracks.get(&track).is_some_and(|t| t.locked)
    }

    pub fn is_track_enabled(&self, track: TrackId) -> bool {
        self.tracks.get(&track).map_or(true, |t| t.enabled)
    }

    pub fn set_track_locked(&mut self, track: TrackId, locked: bool) {
        self.tracks.entry(track).or_default().locked = locked;
    }

    pub fn set_track_enabled(&mut self, track: TrackId, enabled: bool) {
        self.tracks.entry(track).or_default().enabled = enabled;
    }

    /// Every track that has stored state or holds a clip, in ascending order.
    pub fn track_ids(&self) -> Vec<TrackId> {
        let mut ids: Vec<TrackId> = self.tracks.keys().copied().collect();
        ids.extend(self.clips.values().map(|c| c.track));
        ids.sort();
        ids.dedup();
        ids
    }

    // --- clips ------------------------------------------------------------

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.get(&id)
    }

    pub(crate) fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips.get_mut(&id)
    }

    pub fn clips(&self) -> impl Iterator<Item = &Clip> {
        self.clips.values()
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    /// Clips on `track` ordered by timeline in-point.
    pub fn clips_on_track(&self, track: TrackId) -> Vec<&Clip> {
        let mut clips: Vec<&Clip> = self.clips.values().filter(|c| c.track == track).collect();
        clips.sort_by_key(|c| (c.timeline_in, c.id));
        clips
    }

    pub fn clip_at(&self, track: TrackId, frame: Frame) -> Option<&Clip> {
        self.clips
            .values()
            .find(|c| c.track == track && c.timeline_in <= frame && frame < c.timeline_out)
    }

    /// Last frame covered by any clip.
    pub fn end_frame(&self) -> Frame {
        self.clips.values().map(|c| c.timeline_out).max().unwrap_or(0)
    }

    /// Adds a clip with a fresh id and returns it.
    pub fn create_clip(
        &mut self,
        name: impl Into<String>,
        track: TrackId,
        timeline_in: Frame,
        timeline_out: Frame,
        media: MediaSource,
    ) -> Result<ClipId, TimelineError> {
        let id = self.allocate_clip_id();
        self.insert_clip(Clip::new(id, name, track, timeline_in, timeline_out, media))?;
        Ok(id)
    }

    pub fn insert_clip(&mut self, clip: Clip) -> Result<ClipId, TimelineError> {
        if self.clips.contains_key(&clip.id) {
            return Err(TimelineError::ClipExists(clip.id));
        }
        check_range(clip.timeline_in, clip.timeline_out)?;
        if clip.media_in < 0 {
            return Err(TimelineError::InvalidOp(format!(
                "{} has negative media in {}",
                clip.id, clip.media_in
            )));
        }
        let id = clip.id;
        self.bump_ids_past(id.0);
        self.clips.insert(id, clip);
        Ok(id)
    }

    /// Removes a clip that no longer carries transitions.
    pub fn remove_clip(&mut self, id: ClipId) -> Result<Clip, TimelineError> {
        let clip = self.clips.get(&id).ok_or(TimelineError::ClipNotFound(id))?;
        if clip.opening.is_some() || clip.closing.is_some() {
            return Err(TimelineError::InvalidOp(format!(
                "{} still carries transitions",
                id
            )));
        }
        self.clips.remove(&id).ok_or(TimelineError::ClipNotFound(id))
    }

    pub fn link_clips(&mut self, a: ClipId, b: ClipId) -> Result<(), TimelineError> {
        if !self.clips.contains_key(&b) {
            return Err(TimelineError::ClipNotFound(b));
        }
        let clip_a = self.clips.get_mut(&a).ok_or(TimelineError::ClipNotFound(a))?;
        if !clip_a.links.contains(&b) {
            clip_a.links.push(b);
        }
        if let Some(clip_b) = self.clips.get_mut(&b) {
            if !clip_b.links.contains(&a) {
                clip_b.links.push(a);
            }
        }
        Ok(())
    }

    /// Linked siblings that still exist.
    pub fn linked_clips(&self, id: ClipId) -> Vec<ClipId> {
        self.clips
            .get(&id)
            .map(|c| {
                c.links
                    .iter()
                    .copied()
                    .filter(|l| self.clips.contains_key(l))
                    .collect()
            })
            .unwrap_or_default()
    }

    // --- transitions ------------------------------------------------------

    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions.get(&id)
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    pub fn clip_transition(&self, clip: ClipId, edge: TransitionEdge) -> Option<&Transition> {
        self.clips
            .get(&clip)
            .and_then(|c| c.transition(edge))
            .and_then(|id| self.transitions.get(&id))
    }

    /// Creates a transition on `primary`'s edge. A transition across a cut is
    /// normalised so the later clip owns it as its opening.
    pub fn add_transition(
        &mut self,
        primary: ClipId,
        edge: TransitionEdge,
        secondary: Option<ClipId>,
        kind: TransitionKind,
        length: Frame,
    ) -> Result<TransitionId, TimelineError> {
        let (primary, edge, secondary) = match (edge, secondary) {
            (TransitionEdge::Closing, Some(other)) => (other, TransitionEdge::Opening, Some(primary)),
            other => (primary, other.0, other.1),
        };
        let id = self.allocate_transition_id();
        self.insert_transition(Transition {
            id,
            kind,
            primary,
            secondary,
            edge,
            length,
        })?;
        Ok(id)
    }

    pub fn insert_transition(&mut self, transition: Transition) -> Result<TransitionId, TimelineError> {
        if self.transitions.contains_key(&transition.id) {
            return Err(TimelineError::TransitionExists(transition.id));
        }
        if transition.length < 1 {
            return Err(TimelineError::InvalidOp(format!(
                "{} must be at least one frame long",
                transition.id
            )));
        }
        let primary = self
            .clips
            .get(&transition.primary)
            .ok_or(TimelineError::ClipNotFound(transition.primary))?;
        if primary.transition(transition.edge).is_some() {
            return Err(TimelineError::InvalidOp(format!(
                "{} already has a transition on that edge",
                primary.id
            )));
        }
        if let Some(secondary_id) = transition.secondary {
            let secondary = self
                .clips
                .get(&secondary_id)
                .ok_or(TimelineError::ClipNotFound(secondary_id))?;
            if secondary.track != primary.track || secondary.timeline_out != primary.timeline_in {
                return Err(TimelineError::InvalidOp(format!(
                    "{} and {} do not share a cut",
                    secondary.id, primary.id
                )));
            }
            if secondary.transition(transition.edge.opposite()).is_some() {
                return Err(TimelineError::InvalidOp(format!(
                    "{} already has a transition on that edge",
                    secondary.id
                )));
            }
        }

        let id = transition.id;
        self.bump_ids_past(id.0);
        if let Some(clip) = self.clips.get_mut(&transition.primary) {
            *clip.transition_slot_mut(transition.edge) = Some(id);
        }
        if let Some(secondary) = transition.secondary {
            if let Some(clip) = self.clips.get_mut(&secondary) {
                *clip.transition_slot_mut(transition.edge.opposite()) = Some(id);
            }
        }
        self.transitions.insert(id, transition);
        Ok(id)
    }

    pub fn remove_transition(&mut self, id: TransitionId) -> Result<Transition, TimelineError> {
        let transition = self
            .transitions
            .remove(&id)
            .ok_or(TimelineError::TransitionNotFound(id))?;
        if let Some(clip) = self.clips.get_mut(&transition.primary) {
            let slot = clip.transition_slot_mut(transition.edge);
            if *slot == Some(id) {
                *slot = None;
            }
        }
        if let Some(secondary) = transition.secondary {
            if let Some(clip) = self.clips.get_mut(&secondary) {
                let slot = clip.transition_slot_mut(transition.edge.opposite());
                if *slot == Some(id) {
                    *slot = None;
                }
            }
        }
        Ok(transition)
    }

    pub(crate) fn transition_mut(&mut self, id: TransitionId) -> Option<&mut Transition> {
        self.transitions.get_mut(&id)
    }

    /// Timeline span a transition covers, see [`Transition`].
    pub fn transition_span(&self, id: TransitionId) -> Option<(Frame, Frame)> {
        let transition = self.transitions.get(&id)?;
        let primary = self.clips.get(&transition.primary)?;
        let span = match (transition.edge, transition.is_shared()) {
            (TransitionEdge::Opening, true) => (
                primary.timeline_in - transition.length,
                primary.timeline_in + transition.length,
            ),
            (TransitionEdge::Opening, false) => {
                (primary.timeline_in, primary.timeline_in + transition.length)
            }
            (TransitionEdge::Closing, true) => (
                primary.timeline_out - transition.length,
                primary.timeline_out + transition.length,
            ),
            (TransitionEdge::Closing, false) => {
                (primary.timeline_out - transition.length, primary.timeline_out)
            }
        };
        Some(span)
    }

    fn shared_handle(&self, clip: &Clip, edge: TransitionEdge) -> Frame {
        clip.transition(edge)
            .and_then(|id| self.transitions.get(&id))
            .filter(|t| t.is_shared())
            .map_or(0, |t| t.length)
    }

    /// Timeline in-point including the handle a shared opening transition uses.
    pub fn timeline_in_with_transition(&self, clip: &Clip) -> Frame {
        clip.timeline_in - self.shared_handle(clip, TransitionEdge::Opening)
    }

    /// Timeline out-point including the handle a shared closing transition uses.
    pub fn timeline_out_with_transition(&self, clip: &Clip) -> Frame {
        clip.timeline_out + self.shared_handle(clip, TransitionEdge::Closing)
    }

    pub fn media_in_with_transition(&self, clip: &Clip) -> Frame {
        clip.media_in - self.shared_handle(clip, TransitionEdge::Opening)
    }

    // --- invariants -------------------------------------------------------

    /// Checks the committed-state invariants: clip layout and transition
    /// length bounds.
    pub fn validate(&self) -> Result<(), TimelineError> {
        self.validate_clips()?;
        self.validate_transitions()
    }

    /// Ordered, non-negative clip ranges that never overlap on a track.
    pub fn validate_clips(&self) -> Result<(), TimelineError> {
        for clip in self.clips.values() {
            check_range(clip.timeline_in, clip.timeline_out)?;
        }
        for track in self.track_ids() {
            let clips = self.clips_on_track(track);
            for pair in clips.windows(2) {
                if pair[0].timeline_out > pair[1].timeline_in {
                    return Err(TimelineError::InvalidOp(format!(
                        "{} overlaps {} on track {}",
                        pair[0].id, pair[1].id, track
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn validate_transitions(&self) -> Result<(), TimelineError> {
        for transition in self.transitions.values() {
            let primary = self
                .clips
                .get(&transition.primary)
                .ok_or(TimelineError::ClipNotFound(transition.primary))?;
            let mut limit = primary.length();
            if let Some(secondary) = transition.secondary {
                let secondary = self
                    .clips
                    .get(&secondary)
                    .ok_or(TimelineError::ClipNotFound(secondary))?;
                limit = limit.min(secondary.length());
            }
            if transition.length < 0 || transition.length > limit {
                return Err(TimelineError::InvalidOp(format!(
                    "{} length {} exceeds {}",
                    transition.id, transition.length, limit
                )));
            }
        }
        Ok(())
    }
}

fn check_range(start: Frame, end: Frame) -> Result<(), TimelineError> {
    if start < 0 || end <= start {
        return Err(TimelineError::InvalidRange { start, end });
    }
    Ok(())
}
