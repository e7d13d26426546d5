use serde::{Deserialize, Serialize};
use timeline::Frame;

use crate::EngineError;

/// Snapping configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapSettings {
    pub enabled: bool,
    pub snap_to_playhead: bool,
    pub snap_to_markers: bool,
    /// Snap to the In/Out work area bounds
    pub snap_to_work_area: bool,
    /// Snap to clip edges and transition inner edges
    pub snap_to_clips: bool,
    /// Snap tolerance in pixels
    pub snap_tolerance_px: f64,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            snap_to_playhead: true,
            snap_to_markers: true,
            snap_to_work_area: true,
            snap_to_clips: true,
            snap_tolerance_px: 10.0,
        }
    }
}

impl SnapSettings {
    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    /// Tolerance in frames at the given zoom.
    pub fn tolerance_frames(&self, pixels_per_frame: f64) -> Frame {
        if pixels_per_frame <= 0.0 || !pixels_per_frame.is_finite() {
            return 0;
        }
        ((self.snap_tolerance_px / pixels_per_frame).floor() as Frame).max(0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub snap: SnapSettings,
    /// Upper bound on clamp passes per pointer update. Every update needs at
    /// least one pass, so zero would turn each update into a no-op and is
    /// rejected on load.
    pub max_clamp_iterations: usize,
    /// Insert-mode drops ripple every unlocked track rather than only the
    /// tracks the ghosts land on.
    pub ripple_all_tracks_on_insert: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            snap: SnapSettings::default(),
            max_clamp_iterations: 64,
            ripple_all_tracks_on_insert: true,
        }
    }
}

impl EngineSettings {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_clamp_iterations == 0 {
            return Err(EngineError::InvalidSettings(
                "max_clamp_iterations must be at least 1".to_string(),
            ));
        }
        if !self.snap.snap_tolerance_px.is_finite() || self.snap.snap_tolerance_px < 0.0 {
            return Err(EngineError::InvalidSettings(format!(
                "snap_tolerance_px must be a non-negative number, got {}",
                self.snap.snap_tolerance_px
            )));
        }
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_in_frames() {
        let snap = SnapSettings::default();
        assert_eq!(snap.tolerance_frames(1.0), 10);
        assert_eq!(snap.tolerance_frames(3.0), 3);
        assert_eq!(snap.tolerance_frames(20.0), 0);
        assert_eq!(snap.tolerance_frames(0.0), 0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings =
            EngineSettings::from_json_str(r#"{ "snap": { "snap_to_markers": false } }"#).unwrap();
        assert!(!settings.snap.snap_to_markers);
        assert!(settings.snap.enabled);
        assert_eq!(settings.max_clamp_iterations, 64);
        assert!(settings.ripple_all_tracks_on_insert);
    }

    #[test]
    fn test_zero_clamp_iterations_rejected() {
        let err = EngineSettings::from_json_str(r#"{ "max_clamp_iterations": 0 }"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSettings(_)));
        assert!(EngineSettings::default().validate().is_ok());
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = EngineSettings::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
