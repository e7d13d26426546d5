use serde::{Deserialize, Serialize};
use thiserror::Error;

mod sequence;
pub use sequence::*;
mod commands;
pub use commands::*;
pub mod edit_operations;
pub mod markers;
pub use markers::{Marker, MarkerCollection, MarkerId, MarkerType};

#[derive(Debug, Error, PartialEq)]
pub enum TimelineError {
    #[error("invalid operation: {0}")]
    InvalidOp(String),
    #[error("clip not found: {0}")]
    ClipNotFound(ClipId),
    #[error("transition not found: {0}")]
    TransitionNotFound(TransitionId),
    #[error("clip already exists: {0}")]
    ClipExists(ClipId),
    #[error("transition already exists: {0}")]
    TransitionExists(TransitionId),
    #[error("invalid range {start}..{end}")]
    InvalidRange { start: Frame, end: Frame },
    #[error("track {0} is locked")]
    TrackLocked(TrackId),
    #[error("history empty: {0}")]
    HistoryEmpty(&'static str),
}

pub type Frame = i64; // timeline and media positions in sequence frames

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fps {
    pub num: u32,
    pub den: u32,
}

impl Fps {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self::new(30, 1)
    }
}
