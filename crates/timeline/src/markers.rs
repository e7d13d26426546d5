//! Sequence markers and the In/Out work area. Both feed the snap sources of
//! the edit engine.

use crate::Frame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MarkerId(pub Uuid);

impl MarkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MarkerId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarkerType {
    #[default]
    Standard,
    /// Work area start.
    In,
    /// Work area end.
    Out,
    Chapter,
    Comment,
}

impl MarkerType {
    pub fn is_work_area(&self) -> bool {
        matches!(self, MarkerType::In | MarkerType::Out)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub frame: Frame,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub marker_type: MarkerType,
    #[serde(default)]
    pub note: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Marker {
    pub fn new(frame: Frame, label: impl Into<String>) -> Self {
        Self {
            id: MarkerId::new(),
            frame,
            label: label.into(),
            marker_type: MarkerType::Standard,
            note: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_type(mut self, marker_type: MarkerType) -> Self {
        self.marker_type = marker_type;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkerCollection {
    markers: HashMap<MarkerId, Marker>,
}

impl MarkerCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_marker(&mut self, marker: Marker) -> MarkerId {
        let id = marker.id;
        self.markers.insert(id, marker);
        id
    }

    pub fn remove_marker(&mut self, id: &MarkerId) -> Option<Marker> {
        self.markers.remove(id)
    }

    pub fn get_marker(&self, id: &MarkerId) -> Option<&Marker> {
        self.markers.get(id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn markers_sorted(&self) -> Vec<&Marker> {
        let mut markers: Vec<_> = self.markers.values().collect();
        markers.sort_by_key(|m| (m.frame, m.created_at));
        markers
    }

    /// Frames of ordinary markers, ascending. Work area bounds are excluded.
    pub fn marker_frames(&self) -> Vec<Frame> {
        let mut frames: Vec<Frame> = self
            .markers
            .values()
            .filter(|m| !m.marker_type.is_work_area())
            .map(|m| m.frame)
            .collect();
        frames.sort_unstable();
        frames.dedup();
        frames
    }

    pub fn markers_at(&self, frame: Frame, tolerance: Frame) -> Vec<&Marker> {
        self.markers
            .values()
            .filter(|m| (m.frame - frame).abs() <= tolerance)
            .collect()
    }

    pub fn nearest_marker(&self, frame: Frame) -> Option<&Marker> {
        self.markers
            .values()
            .filter(|m| !m.marker_type.is_work_area())
            .min_by_key(|m| ((m.frame - frame).abs(), m.frame))
    }

    pub fn set_in_point(&mut self, frame: Frame) -> MarkerId {
        self.markers.retain(|_, m| m.marker_type != MarkerType::In);
        self.add_marker(Marker::new(frame, "In").with_type(MarkerType::In))
    }

    pub fn set_out_point(&mut self, frame: Frame) -> MarkerId {
        self.markers.retain(|_, m| m.marker_type != MarkerType::Out);
        self.add_marker(Marker::new(frame, "Out").with_type(MarkerType::Out))
    }

    /// Work area as an ordered `(start, end)` pair when both bounds are set.
    pub fn work_area(&self) -> Option<(Frame, Frame)> {
        let find = |kind: MarkerType| {
            self.markers
                .values()
                .find(|m| m.marker_type == kind)
                .map(|m| m.frame)
        };
        let (a, b) = (find(MarkerType::In)?, find(MarkerType::Out)?);
        Some((a.min(b), a.max(b)))
    }

    pub fn clear_work_area(&mut self) {
        self.markers.retain(|_, m| !m.marker_type.is_work_area());
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_frames_skip_work_area() {
        let mut markers = MarkerCollection::new();
        markers.add_marker(Marker::new(40, "beat"));
        markers.add_marker(Marker::new(10, "intro").with_type(MarkerType::Chapter));
        markers.set_in_point(5);
        markers.set_out_point(90);

        assert_eq!(markers.marker_frames(), vec![10, 40]);
        assert_eq!(markers.work_area(), Some((5, 90)));
    }

    #[test]
    fn test_set_in_point_replaces_previous() {
        let mut markers = MarkerCollection::new();
        markers.set_in_point(5);
        markers.set_in_point(12);
        markers.set_out_point(3);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers.work_area(), Some((3, 12)));

        markers.clear_work_area();
        assert!(markers.work_area().is_none());
        assert!(markers.is_empty());
    }

    #[test]
    fn test_nearest_marker() {
        let mut markers = MarkerCollection::new();
        markers.add_marker(Marker::new(100, "a"));
        markers.add_marker(Marker::new(200, "b"));
        assert_eq!(markers.nearest_marker(140).map(|m| m.frame), Some(100));
        assert_eq!(markers.nearest_marker(180).map(|m| m.frame), Some(200));
        assert_eq!(markers.markers_at(198, 2).len(), 1);
    }
}
