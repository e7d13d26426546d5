use serde::{Deserialize, Serialize};
use timeline::{ClipId, TransitionEdge, TransitionId, TransitionKind};

/// Which edge of a clip or transition a trim grabs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    In,
    Out,
}

impl Edge {
    pub fn is_in(&self) -> bool {
        matches!(self, Edge::In)
    }

    pub fn from_trim_in(trim_in: bool) -> Self {
        if trim_in {
            Edge::In
        } else {
            Edge::Out
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransitionAction {
    /// Drag a new transition out of `clip`'s edge. With a `partner` the
    /// transition spans the cut between the two clips.
    Create {
        clip: ClipId,
        edge: TransitionEdge,
        partner: Option<ClipId>,
        #[serde(default)]
        kind: TransitionKind,
    },
    /// Drag one edge of an existing transition.
    Resize { transition: TransitionId, edge: Edge },
}

/// Tool driving a gesture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum Tool {
    /// Move selected clips, overwriting whatever they land on.
    Move,
    /// Trim one edge of the selected clips, overwriting on extension.
    Trim { edge: Edge },
    /// Trim one edge and shift everything after the edit.
    RippleTrim { edge: Edge },
    /// Move two touching edges together.
    Roll { edge: Edge },
    /// Change source offset without moving on the timeline.
    Slip,
    /// Move clips while neighbours absorb the change.
    Slide,
    Transition { action: TransitionAction },
    /// Move selected clips, rippling existing content aside on drop.
    Insert,
}

impl Default for Tool {
    fn default() -> Self {
        Self::Move
    }
}

impl Tool {
    pub fn name(&self) -> &str {
        match self {
            Self::Move => "Move",
            Self::Trim { .. } => "Trim",
            Self::RippleTrim { .. } => "Ripple",
            Self::Roll { .. } => "Roll",
            Self::Slip => "Slip",
            Self::Slide => "Slide",
            Self::Transition { .. } => "Transition",
            Self::Insert => "Insert",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Move => "Move clips, overwriting what they land on",
            Self::Trim { .. } => "Trim a clip edge",
            Self::RippleTrim { .. } => "Trim and shift all following clips",
            Self::Roll { .. } => "Adjust the edit point between two clips",
            Self::Slip => "Change visible portion of media",
            Self::Slide => "Move a clip between its neighbours",
            Self::Transition { .. } => "Create or resize transitions",
            Self::Insert => "Move clips and ripple existing content aside",
        }
    }

    /// Edge being trimmed by single-edge tools.
    pub fn trim_edge(&self) -> Option<Edge> {
        match self {
            Self::Trim { edge } | Self::RippleTrim { edge } | Self::Roll { edge } => Some(*edge),
            Self::Transition {
                action: TransitionAction::Resize { edge, .. },
            } => Some(*edge),
            _ => None,
        }
    }

    /// Slip leaves timeline positions alone, so nothing snaps.
    pub fn moves_timeline(&self) -> bool {
        !matches!(self, Self::Slip)
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Self::Insert)
    }

    /// Swaps between Move and Insert; other tools are unchanged.
    pub fn with_insert(self, insert: bool) -> Self {
        match (self, insert) {
            (Self::Move, true) => Self::Insert,
            (Self::Insert, false) => Self::Move,
            (tool, _) => tool,
        }
    }
}
