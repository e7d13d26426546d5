//! Gesture engine for non-destructive timeline edits.
//!
//! A gesture is begun from the caller's selection and tool, updated on every
//! pointer move and finally committed or cancelled. Only the commit touches
//! the [`timeline::Sequence`]; everything before works on ghosts.

use thiserror::Error;

pub mod collision;
pub mod commit;
pub mod config;
pub mod context;
pub mod ghost;
pub mod gesture;
pub mod snap;
pub mod tool;
pub mod validate;

pub use config::{EngineSettings, SnapSettings};
pub use context::{GestureContext, Pointer, Selection};
pub use commit::GestureResult;
pub use gesture::{Gesture, GestureReadout};
pub use ghost::{Ghost, GhostKind, GhostSet, GhostSnapshot, GhostTarget};
pub use snap::{Snap, SnapResolver, SnapSource};
pub use tool::{Edge, Tool, TransitionAction};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("timeline error: {0}")]
    Timeline(#[from] timeline::TimelineError),
    #[error("invalid settings: {0}")]
    Config(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}
