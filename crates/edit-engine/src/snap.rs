//! Snapping of ghost edges to the playhead, markers, the work area and
//! the edges of clips outside the gesture.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;
use timeline::{ClipId, Frame, Sequence, TransitionEdge};

use crate::{config::SnapSettings, ghost::GhostSet};

/// What a snapped frame lined up with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapSource {
    Playhead,
    Marker,
    WorkArea,
    ClipEdge,
    TransitionEdge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snap {
    pub frame: Frame,
    pub source: SnapSource,
}

/// Snap points gathered once per gesture, grouped by priority. The first
/// group with a point in range wins; within a group the nearest point does.
#[derive(Clone, Debug, Default)]
pub struct SnapResolver {
    groups: Vec<Vec<Snap>>,
}

impl SnapResolver {
    pub fn new(sequence: &Sequence, settings: &SnapSettings, ghosts: &GhostSet) -> Self {
        let mut groups = Vec::new();
        if settings.snap_to_playhead {
            groups.push(vec![Snap {
                frame: sequence.playhead,
                source: SnapSource::Playhead,
            }]);
        }
        if settings.snap_to_markers {
            groups.push(
                sequence
                    .markers
                    .marker_frames()
                    .into_iter()
                    .map(|frame| Snap {
                        frame,
                        source: SnapSource::Marker,
                    })
                    .collect(),
            );
        }
        if settings.snap_to_work_area {
            if let Some((start, end)) = sequence.markers.work_area() {
                groups.push(
                    [start, end]
                        .into_iter()
                        .map(|frame| Snap {
                            frame,
                            source: SnapSource::WorkArea,
                        })
                        .collect(),
                );
            }
        }
        if settings.snap_to_clips {
            groups.push(clip_points(sequence, &ghosts.clip_ids()));
        }
        groups.retain(|g| !g.is_empty());
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Nearest snap point to `frame` within `tolerance` frames.
    pub fn snap(&self, frame: Frame, tolerance: Frame) -> Option<Snap> {
        if tolerance < 0 {
            return None;
        }
        self.groups.iter().find_map(|group| {
            group
                .iter()
                .filter(|s| (s.frame - frame).abs() <= tolerance)
                .min_by_key(|s| ((s.frame - frame).abs(), s.frame))
                .copied()
        })
    }

    /// Adjusts `frame_diff` so the first ghost edge that lands near a snap
    /// point sits exactly on it. Trimming ghosts only snap their moving edge.
    pub fn snap_ghosts(
        &self,
        ghosts: &GhostSet,
        frame_diff: Frame,
        tolerance: Frame,
    ) -> (Frame, Option<Snap>) {
        for ghost in ghosts.ghosts() {
            let edges = if ghost.trimming {
                vec![ghost.trimmed_edge()]
            } else {
                vec![ghost.old_in, ghost.old_out]
            };
            for edge in edges {
                let candidate = edge + frame_diff;
                if let Some(snap) = self.snap(candidate, tolerance) {
                    debug!(candidate, snapped = snap.frame, source = ?snap.source, "snap");
                    return (frame_diff + snap.frame - candidate, Some(snap));
                }
            }
        }
        (frame_diff, None)
    }
}

/// Clip edges and transition inner edges, skipping the ghosts' own clips.
fn clip_points(sequence: &Sequence, skip: &HashSet<ClipId>) -> Vec<Snap> {
    let mut points = Vec::new();
    for clip in sequence.clips().filter(|c| !skip.contains(&c.id)) {
        for frame in [clip.timeline_in, clip.timeline_out] {
            points.push(Snap {
                frame,
                source: SnapSource::ClipEdge,
            });
        }
        for edge in [TransitionEdge::Opening, TransitionEdge::Closing] {
            let Some(transition) = sequence.clip_transition(clip.id, edge) else {
                continue;
            };
            if transition.primary != clip.id {
                continue;
            }
            let inner = match (edge, transition.is_shared()) {
                (_, true) => vec![
                    clip.timeline_in - transition.length,
                    clip.timeline_in + transition.length,
                ],
                (TransitionEdge::Opening, false) => vec![clip.timeline_in + transition.length],
                (TransitionEdge::Closing, false) => vec![clip.timeline_out - transition.length],
            };
            points.extend(inner.into_iter().map(|frame| Snap {
                frame,
                source: SnapSource::TransitionEdge,
            }));
        }
    }
    points
}
