//! Proposed-state mirrors of the clips and transitions a gesture edits.
//!
//! Everything the validator needs is captured when the set is built so
//! nothing has to be re-queried while the pointer moves.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;
use timeline::{
    Clip, ClipId, Frame, Sequence, TrackId, Transition, TransitionEdge, TransitionId,
    TransitionKind,
};

use crate::{
    context::{selection_contains_transition, GestureContext},
    tool::{Edge, Tool, TransitionAction},
};

/// A clip as it was when the gesture began.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipFrame {
    pub id: ClipId,
    pub track: TrackId,
    pub timeline_in: Frame,
    pub timeline_out: Frame,
    pub media_in: Frame,
    pub max_length: Option<Frame>,
    /// Lengths of the transitions on each edge, zero when absent.
    pub opening: Frame,
    pub closing: Frame,
    /// Media a shared transition borrows beyond each edge.
    pub handle_in: Frame,
    pub handle_out: Frame,
}

impl ClipFrame {
    pub fn capture(sequence: &Sequence, clip: &Clip) -> Self {
        let length_of = |edge| sequence.clip_transition(clip.id, edge).map_or(0, |t| t.length);
        Self {
            id: clip.id,
            track: clip.track,
            timeline_in: clip.timeline_in,
            timeline_out: clip.timeline_out,
            media_in: clip.media_in,
            max_length: clip.maximum_length(),
            opening: length_of(TransitionEdge::Opening),
            closing: length_of(TransitionEdge::Closing),
            handle_in: clip.timeline_in - sequence.timeline_in_with_transition(clip),
            handle_out: sequence.timeline_out_with_transition(clip) - clip.timeline_out,
        }
    }

    pub fn length(&self) -> Frame {
        self.timeline_out - self.timeline_in
    }

    /// Transition length on `edge`, zero when the edge is bare.
    pub fn transition_length(&self, edge: TransitionEdge) -> Frame {
        match edge {
            TransitionEdge::Opening => self.opening,
            TransitionEdge::Closing => self.closing,
        }
    }
}

/// A transition as it was when the gesture began, or the one being created.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionFrame {
    pub id: Option<TransitionId>,
    pub kind: TransitionKind,
    pub edge: TransitionEdge,
    pub length: Frame,
    pub primary: ClipFrame,
    pub secondary: Option<ClipFrame>,
}

impl TransitionFrame {
    fn capture(sequence: &Sequence, transition: &Transition) -> Option<Self> {
        let primary = sequence.clip(transition.primary)?;
        let secondary = match transition.secondary {
            Some(id) => Some(ClipFrame::capture(sequence, sequence.clip(id)?)),
            None => None,
        };
        Some(Self {
            id: Some(transition.id),
            kind: transition.kind.clone(),
            edge: transition.edge,
            length: transition.length,
            primary: ClipFrame::capture(sequence, primary),
            secondary,
        })
    }

    pub fn is_shared(&self) -> bool {
        self.secondary.is_some()
    }

    /// The edge that sits on the primary clip's own edge. Dragging it drags
    /// the clip edge too. Shared transitions have none.
    pub fn outer_edge(&self) -> Option<Edge> {
        match (self.edge, self.is_shared()) {
            (_, true) => None,
            (TransitionEdge::Opening, false) => Some(Edge::In),
            (TransitionEdge::Closing, false) => Some(Edge::Out),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GhostTarget {
    Clip(ClipId),
    Transition(TransitionId),
    /// A transition that only exists once the gesture commits.
    NewTransition {
        clip: ClipId,
        edge: TransitionEdge,
        partner: Option<ClipId>,
    },
}

impl GhostTarget {
    pub fn kind(&self) -> GhostKind {
        match self {
            GhostTarget::Clip(_) => GhostKind::Clip,
            GhostTarget::Transition(_) => GhostKind::Transition,
            GhostTarget::NewTransition { .. } => GhostKind::PendingTransition,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostKind {
    Clip,
    Transition,
    PendingTransition,
}

/// Read-only view of a ghost for the drawing layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostSnapshot {
    pub track: TrackId,
    pub in_point: Frame,
    pub out_point: Frame,
    pub kind: GhostKind,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ghost {
    pub target: GhostTarget,
    pub old_in: Frame,
    pub old_out: Frame,
    pub old_track: TrackId,
    pub old_media_in: Frame,
    pub in_point: Frame,
    pub out_point: Frame,
    pub track: TrackId,
    pub media_in: Frame,
    /// Span at gesture start.
    pub length: Frame,
    /// Usable media length, `None` for infinite sources.
    pub media_length: Option<Frame>,
    pub trimming: bool,
    pub trim_in: bool,
    /// Found by the tool rather than taken from the selection.
    pub discovered: bool,
    /// The mirrored clip, or the primary clip of a transition.
    pub clip: ClipFrame,
    pub transition: Option<TransitionFrame>,
    /// Out-point of the nearest other clip ending at or before `old_in`.
    pub before: Option<Frame>,
    /// In-point of the nearest other clip starting at or after `old_out`.
    pub after: Option<Frame>,
}

impl Ghost {
    fn new(target: GhostTarget, clip: ClipFrame, in_point: Frame, out_point: Frame) -> Self {
        Self {
            target,
            old_in: in_point,
            old_out: out_point,
            old_track: clip.track,
            old_media_in: clip.media_in,
            in_point,
            out_point,
            track: clip.track,
            media_in: clip.media_in,
            length: out_point - in_point,
            media_length: clip.max_length,
            trimming: false,
            trim_in: false,
            discovered: false,
            clip,
            transition: None,
            before: None,
            after: None,
        }
    }

    pub fn for_clip(sequence: &Sequence, clip: &Clip) -> Self {
        let frame = ClipFrame::capture(sequence, clip);
        Self::new(
            GhostTarget::Clip(clip.id),
            frame,
            clip.timeline_in,
            clip.timeline_out,
        )
    }

    fn trimming(mut self, trim_in: bool) -> Self {
        self.trimming = true;
        self.trim_in = trim_in;
        self
    }

    fn discovered(mut self) -> Self {
        self.discovered = true;
        self
    }

    pub fn for_transition(sequence: &Sequence, transition_id: TransitionId) -> Option<Self> {
        let transition = sequence.transition(transition_id)?;
        let frame = TransitionFrame::capture(sequence, transition)?;
        let (start, end) = sequence.transition_span(transition_id)?;
        let mut ghost = Self::new(
            GhostTarget::Transition(transition_id),
            frame.primary,
            start,
            end,
        );
        ghost.transition = Some(frame);
        Some(ghost)
    }

    /// Zero-length ghost at the edge a new transition grows from. A partner
    /// that does not share the cut is ignored.
    pub fn for_new_transition(
        sequence: &Sequence,
        clip_id: ClipId,
        edge: TransitionEdge,
        partner: Option<ClipId>,
        kind: TransitionKind,
    ) -> Option<Self> {
        let clip = sequence.clip(clip_id)?;
        let partner = partner.and_then(|id| sequence.clip(id)).filter(|other| {
            other.track == clip.track
                && match edge {
                    TransitionEdge::Opening => other.timeline_out == clip.timeline_in,
                    TransitionEdge::Closing => other.timeline_in == clip.timeline_out,
                }
        });
        if partner.is_none() {
            debug!(%clip_id, "creating single-sided transition");
        }

        let (primary, edge_on_primary, secondary) = match (edge, partner) {
            (TransitionEdge::Closing, Some(later)) => (later, TransitionEdge::Opening, Some(clip)),
            (edge, partner) => (clip, edge, partner),
        };
        let frame = match edge_on_primary {
            TransitionEdge::Opening => primary.timeline_in,
            TransitionEdge::Closing => primary.timeline_out,
        };
        let primary_frame = ClipFrame::capture(sequence, primary);
        let target = GhostTarget::NewTransition {
            clip: clip_id,
            edge,
            partner: partner.map(|p| p.id),
        };
        let shared = secondary.is_some();
        let mut ghost = Self::new(target, primary_frame, frame, frame)
            .trimming(!shared && edge_on_primary == TransitionEdge::Closing);
        ghost.transition = Some(TransitionFrame {
            id: None,
            kind,
            edge: edge_on_primary,
            length: 0,
            primary: primary_frame,
            secondary: secondary.map(|s| ClipFrame::capture(sequence, s)),
        });
        Some(ghost)
    }

    pub fn kind(&self) -> GhostKind {
        self.target.kind()
    }

    pub fn clip_id(&self) -> Option<ClipId> {
        match self.target {
            GhostTarget::Clip(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_shared_transition(&self) -> bool {
        self.transition.as_ref().is_some_and(|t| t.is_shared())
    }

    /// Edge of an existing transition this ghost drags, whatever the tool.
    pub fn resize_edge(&self) -> Option<Edge> {
        match self.target {
            GhostTarget::Transition(_) if self.trimming => Some(Edge::from_trim_in(self.trim_in)),
            _ => None,
        }
    }

    /// Whether resizing drags the primary clip's edge along.
    pub fn resizes_clip(&self) -> bool {
        let outer = self.transition.as_ref().and_then(TransitionFrame::outer_edge);
        outer.is_some() && outer == self.resize_edge()
    }

    /// Whether everything the ghost mirrors still exists.
    pub fn is_live(&self, sequence: &Sequence) -> bool {
        match self.target {
            GhostTarget::Clip(id) => sequence.clip(id).is_some(),
            GhostTarget::Transition(id) => sequence.transition(id).is_some(),
            GhostTarget::NewTransition { clip, partner, .. } => {
                sequence.clip(clip).is_some() && partner.map_or(true, |p| sequence.clip(p).is_some())
            }
        }
    }

    /// Clips whose placement this ghost decides.
    pub fn clip_ids(&self) -> Vec<ClipId> {
        match (&self.target, &self.transition) {
            (GhostTarget::Clip(id), _) => vec![*id],
            (_, Some(transition)) => std::iter::once(transition.primary.id)
                .chain(transition.secondary.map(|s| s.id))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn snapshot(&self) -> GhostSnapshot {
        GhostSnapshot {
            track: self.track,
            in_point: self.in_point,
            out_point: self.out_point,
            kind: self.kind(),
        }
    }

    pub fn reset(&mut self) {
        self.in_point = self.old_in;
        self.out_point = self.old_out;
        self.track = self.old_track;
        self.media_in = self.old_media_in;
    }

    pub fn has_changed(&self) -> bool {
        self.in_point != self.old_in
            || self.out_point != self.old_out
            || self.track != self.old_track
            || self.media_in != self.old_media_in
    }

    /// Frame the trimmed edge sat on at gesture start.
    pub fn trimmed_edge(&self) -> Frame {
        if self.trim_in {
            self.old_in
        } else {
            self.old_out
        }
    }

    /// Transition length the ghost currently proposes.
    pub fn transition_length(&self) -> Option<Frame> {
        let transition = self.transition.as_ref()?;
        let span = self.out_point - self.in_point;
        Some(if transition.is_shared() { span / 2 } else { span })
    }

    /// Moves the ghost to `frame_diff` frames (and `track_diff` tracks) away
    /// from where it started, the way `tool` edits it.
    pub fn place(&mut self, tool: &Tool, frame_diff: Frame, track_diff: i32) {
        self.reset();
        if let Some(edge) = self.resize_edge() {
            self.resize(edge, frame_diff);
            return;
        }
        match tool {
            Tool::Move | Tool::Insert => {
                self.in_point += frame_diff;
                self.out_point += frame_diff;
                if matches!(self.target, GhostTarget::Clip(_)) {
                    self.track = self.old_track.offset(track_diff);
                }
            }
            Tool::Trim { .. } | Tool::RippleTrim { .. } | Tool::Roll { .. } => self.trim(frame_diff),
            Tool::Slip => self.media_in = self.old_media_in - frame_diff,
            Tool::Slide => {
                if self.trimming {
                    self.trim(frame_diff);
                } else {
                    self.in_point += frame_diff;
                    self.out_point += frame_diff;
                }
            }
            Tool::Transition {
                action: TransitionAction::Create { .. },
            } => {
                if self.is_shared_transition() {
                    self.in_point -= frame_diff.abs();
                    self.out_point += frame_diff.abs();
                } else {
                    self.trim(frame_diff);
                }
            }
            Tool::Transition {
                action: TransitionAction::Resize { edge, .. },
            } => self.resize(*edge, frame_diff),
        }
    }

    fn trim(&mut self, frame_diff: Frame) {
        if self.trim_in {
            self.in_point = self.old_in + frame_diff;
            self.media_in = self.old_media_in + frame_diff;
            if self.media_length.is_none() {
                // generated media has frames before any offset
                self.media_in = self.media_in.max(0);
            }
        } else {
            self.out_point = self.old_out + frame_diff;
        }
    }

    /// The dragged edge follows the pointer and the far edge stays. Across a
    /// cut both edges move, keeping the transition centred on the cut.
    fn resize(&mut self, edge: Edge, frame_diff: Frame) {
        let Some(transition) = &self.transition else {
            return;
        };
        if transition.is_shared() {
            let length = match edge {
                Edge::In => transition.length - frame_diff,
                Edge::Out => transition.length + frame_diff,
            };
            let cut = (self.old_in + self.old_out) / 2;
            (self.in_point, self.out_point) = (cut - length, cut + length);
            return;
        }
        let moves_clip = transition.outer_edge() == Some(edge);
        match edge {
            Edge::In => {
                self.in_point = self.old_in + frame_diff;
                if moves_clip {
                    self.media_in = self.old_media_in + frame_diff;
                }
            }
            Edge::Out => self.out_point = self.old_out + frame_diff,
        }
    }
}

/// Clips around the ripple point on one track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RippleGap {
    pub track: TrackId,
    /// Latest out-point among clips starting before the ripple point.
    pub before: Option<Frame>,
    /// Earliest in-point at or after the ripple point.
    pub after: Frame,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RippleBounds {
    pub point: Frame,
    pub gaps: Vec<RippleGap>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GhostSet {
    ghosts: Vec<Ghost>,
    ripple: Option<RippleBounds>,
}

impl GhostSet {
    /// Builds the ghosts the context's tool edits. An empty set means the
    /// gesture has nothing to do.
    pub fn build(sequence: &Sequence, ctx: &GestureContext) -> Self {
        let mut ghosts = match &ctx.tool {
            Tool::Move | Tool::Insert => {
                let mut ghosts: Vec<Ghost> = selected_clips(sequence, ctx)
                    .into_iter()
                    .map(|clip| Ghost::for_clip(sequence, clip))
                    .collect();
                let moving: HashSet<ClipId> = ghosts.iter().filter_map(Ghost::clip_id).collect();
                for transition in selected_transitions(sequence, ctx) {
                    let parents_moving = std::iter::once(transition.primary)
                        .chain(transition.secondary)
                        .any(|id| moving.contains(&id));
                    if parents_moving {
                        continue;
                    }
                    ghosts.extend(Ghost::for_transition(sequence, transition.id));
                }
                with_partial_transitions(sequence, ctx, ghosts)
            }
            Tool::Trim { edge } => {
                let ghosts = selected_clips(sequence, ctx)
                    .into_iter()
                    .map(|clip| Ghost::for_clip(sequence, clip).trimming(edge.is_in()))
                    .collect();
                with_partial_transitions(sequence, ctx, ghosts)
            }
            Tool::RippleTrim { edge } => selected_clips(sequence, ctx)
                .into_iter()
                .map(|clip| Ghost::for_clip(sequence, clip).trimming(edge.is_in()))
                .collect(),
            Tool::Roll { edge } => {
                let ghosts = selected_clips(sequence, ctx)
                    .into_iter()
                    .map(|clip| Ghost::for_clip(sequence, clip).trimming(edge.is_in()))
                    .collect();
                with_roll_partners(sequence, ghosts)
            }
            Tool::Slip => selected_clips(sequence, ctx)
                .into_iter()
                .map(|clip| Ghost::for_clip(sequence, clip))
                .collect(),
            Tool::Slide => {
                let ghosts = selected_clips(sequence, ctx)
                    .into_iter()
                    .map(|clip| Ghost::for_clip(sequence, clip))
                    .collect();
                with_slide_neighbours(sequence, ghosts)
            }
            Tool::Transition { action } => match action {
                TransitionAction::Create {
                    clip,
                    edge,
                    partner,
                    kind,
                } => Ghost::for_new_transition(sequence, *clip, *edge, *partner, kind.clone())
                    .into_iter()
                    .collect(),
                TransitionAction::Resize { transition, edge } => {
                    Ghost::for_transition(sequence, *transition)
                        .map(|ghost| ghost.trimming(edge.is_in()))
                        .into_iter()
                        .collect()
                }
            },
        };

        // ghosts never start on a locked track
        ghosts.retain(|g| !sequence.is_track_locked(g.old_track));

        let ripple = match &ctx.tool {
            Tool::RippleTrim { .. } => {
                let point = ghosts.iter().map(Ghost::trimmed_edge).min();
                point.map(|point| {
                    ghosts.retain(|g| g.trimmed_edge() == point);
                    ripple_bounds(sequence, &ghosts, point)
                })
            }
            _ => None,
        };

        let mut set = Self { ghosts, ripple };
        set.find_neighbours(sequence);
        debug!(
            tool = ctx.tool.name(),
            ghosts = set.ghosts.len(),
            "built ghost set"
        );
        set
    }

    fn find_neighbours(&mut self, sequence: &Sequence) {
        let owned = self.clip_ids();
        for ghost in &mut self.ghosts {
            let others = sequence
                .clips_on_track(ghost.old_track)
                .into_iter()
                .filter(|c| !owned.contains(&c.id));
            let (mut before, mut after) = (None::<Frame>, None::<Frame>);
            for clip in others {
                if clip.timeline_out <= ghost.old_in {
                    before = Some(before.map_or(clip.timeline_out, |b| b.max(clip.timeline_out)));
                }
                if clip.timeline_in >= ghost.old_out {
                    after = Some(after.map_or(clip.timeline_in, |a| a.min(clip.timeline_in)));
                }
            }
            ghost.before = before;
            ghost.after = after;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ghosts.len()
    }

    pub fn ghosts(&self) -> &[Ghost] {
        &self.ghosts
    }

    pub fn ripple(&self) -> Option<&RippleBounds> {
        self.ripple.as_ref()
    }

    /// Every clip the ghosts mirror or hang off. These are never deleted to
    /// make room for the ghosts.
    pub fn clip_ids(&self) -> HashSet<ClipId> {
        self.ghosts.iter().flat_map(Ghost::clip_ids).collect()
    }

    pub fn snapshot(&self) -> Vec<GhostSnapshot> {
        self.ghosts.iter().map(Ghost::snapshot).collect()
    }

    pub fn reset(&mut self) {
        self.ghosts.iter_mut().for_each(Ghost::reset);
    }

    /// Which ghosts still mirror something in `sequence`, by index.
    pub fn live(&self, sequence: &Sequence) -> Vec<bool> {
        self.ghosts.iter().map(|g| g.is_live(sequence)).collect()
    }

    /// Places every live ghost `frame_diff` frames from where it started.
    /// Only ghosts of the same track kind as `start_track` change track.
    pub fn place(
        &mut self,
        tool: &Tool,
        frame_diff: Frame,
        track_diff: i32,
        start_track: TrackId,
        live: &[bool],
    ) {
        for (index, ghost) in self.ghosts.iter_mut().enumerate() {
            if !live.get(index).copied().unwrap_or(false) {
                continue;
            }
            let tracks = if ghost.old_track.same_kind(start_track) {
                track_diff
            } else {
                0
            };
            ghost.place(tool, frame_diff, tracks);
        }
    }

    pub fn has_changes(&self) -> bool {
        self.ghosts.iter().any(Ghost::has_changed)
    }
}

fn selected_clips<'a>(sequence: &'a Sequence, ctx: &GestureContext) -> Vec<&'a Clip> {
    sequence
        .clips()
        .filter(|clip| {
            ctx.selections
                .iter()
                .any(|s| s.covers(clip.track, clip.timeline_in, clip.timeline_out))
        })
        .collect()
}

fn selected_transitions<'a>(sequence: &'a Sequence, ctx: &GestureContext) -> Vec<&'a Transition> {
    sequence
        .transitions()
        .filter(|t| {
            ctx.selections
                .iter()
                .any(|s| selection_contains_transition(sequence, s, t.id))
        })
        .collect()
}

/// Adds a trimming ghost for every transition a selection overlaps without
/// covering, unless one of its clips is already a ghost. Openings trim their
/// in edge and closings their out edge.
fn with_partial_transitions(
    sequence: &Sequence,
    ctx: &GestureContext,
    mut ghosts: Vec<Ghost>,
) -> Vec<Ghost> {
    let owned: HashSet<ClipId> = ghosts.iter().flat_map(Ghost::clip_ids).collect();
    for transition in sequence.transitions() {
        let Some((start, end)) = sequence.transition_span(transition.id) else {
            continue;
        };
        let Some(track) = sequence.clip(transition.primary).map(|c| c.track) else {
            continue;
        };
        let partial = ctx
            .selections
            .iter()
            .any(|s| s.overlaps(track, start, end) && !s.covers(track, start, end));
        let parents_edited = std::iter::once(transition.primary)
            .chain(transition.secondary)
            .any(|id| owned.contains(&id));
        if !partial || parents_edited {
            continue;
        }
        let trim_in = transition.edge == TransitionEdge::Opening;
        ghosts.extend(Ghost::for_transition(sequence, transition.id).map(|g| g.trimming(trim_in)));
    }
    ghosts
}

/// Adds the clip on the other side of every trimmed edge, trimming the
/// opposite edge. Touching means exactly equal frames. A partner that is
/// already a ghost keeps its own trim.
fn with_roll_partners(sequence: &Sequence, mut ghosts: Vec<Ghost>) -> Vec<Ghost> {
    ghosts.sort_by_key(|g| (g.old_track, g.old_in));
    let mut index = 0;
    while index < ghosts.len() {
        let (track, trim_in, edge) = {
            let ghost = &ghosts[index];
            (ghost.old_track, ghost.trim_in, ghost.trimmed_edge())
        };
        index += 1;
        let partner = sequence.clips_on_track(track).into_iter().find(|c| {
            if trim_in {
                c.timeline_out == edge
            } else {
                c.timeline_in == edge
            }
        });
        let Some(partner) = partner else {
            continue;
        };
        let already_ghost = ghosts.iter().any(|g| g.clip_id() == Some(partner.id));
        if !already_ghost && !sequence.is_track_locked(partner.track) {
            ghosts.push(
                Ghost::for_clip(sequence, partner)
                    .trimming(!trim_in)
                    .discovered(),
            );
        }
    }
    ghosts
}

/// Adds the unselected clips touching each sliding clip as trim ghosts.
fn with_slide_neighbours(sequence: &Sequence, mut ghosts: Vec<Ghost>) -> Vec<Ghost> {
    let mut seen: HashSet<ClipId> = ghosts.iter().filter_map(Ghost::clip_id).collect();
    let mut neighbours = Vec::new();
    for ghost in &ghosts {
        for clip in sequence.clips_on_track(ghost.old_track) {
            if seen.contains(&clip.id) {
                continue;
            }
            let trim_in = if clip.timeline_in == ghost.old_out {
                true
            } else if clip.timeline_out == ghost.old_in {
                false
            } else {
                continue;
            };
            seen.insert(clip.id);
            neighbours.push(Ghost::for_clip(sequence, clip).trimming(trim_in).discovered());
        }
    }
    ghosts.extend(neighbours);
    ghosts
}

fn ripple_bounds(sequence: &Sequence, ghosts: &[Ghost], point: Frame) -> RippleBounds {
    let owned: HashSet<ClipId> = ghosts.iter().flat_map(Ghost::clip_ids).collect();
    let gaps = sequence
        .track_ids()
        .into_iter()
        .filter(|track| !sequence.is_track_locked(*track))
        .filter_map(|track| {
            let clips: Vec<&Clip> = sequence
                .clips_on_track(track)
                .into_iter()
                .filter(|c| !owned.contains(&c.id))
                .collect();
            let after = clips
                .iter()
                .filter(|c| c.timeline_in >= point)
                .map(|c| c.timeline_in)
                .min()?;
            let before = clips
                .iter()
                .filter(|c| c.timeline_in < point)
                .map(|c| c.timeline_out)
                .max();
            Some(RippleGap {
                track,
                before,
                after,
            })
        })
        .collect();
    RippleBounds { point, gaps }
}
