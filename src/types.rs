// src/types.rs

use serde::{Deserialize, Serialize};

/// A candidate or confirmed vein detection for one frame.
///
/// Coordinates are ROI-local until the caller remaps them to frame space
/// with [`VeinRegion::offset_by`]; that remap happens exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VeinRegion {
    pub center: (i32, i32),
    /// Equivalent radius; derived from the major axis when elliptical.
    pub radius: f32,
    pub area: f32,
    /// Approximated as `2π·radius` when not measured directly.
    pub perimeter: f32,
    /// Minor/major axis ratio in (0, 1]; 1.0 means circular.
    pub ellipticity: f32,
    /// Fused detector confidence in [0, 1].
    pub confidence: f32,
    /// Axis-aligned bounding box (x, y, w, h), same space as `center`.
    pub bbox: (i32, i32, i32, i32),
}

impl VeinRegion {
    /// Remap from ROI-local to frame-global coordinates.
    pub fn offset_by(&mut self, dx: i32, dy: i32) {
        self.center = (self.center.0 + dx, self.center.1 + dy);
        self.bbox = (self.bbox.0 + dx, self.bbox.1 + dy, self.bbox.2, self.bbox.3);
    }
}

/// The tracked region-of-interest window.
///
/// Replaced wholesale on every tracker update, never partially mutated
/// by external code. The tracker itself does not clamp against frame
/// bounds; the pipeline does that where the frame size is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiState {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl RoiState {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Clamp the window so it lies inside a `frame_w` × `frame_h` frame.
    pub fn clamped(&self, frame_w: i32, frame_h: i32) -> Self {
        let width = self.width.min(frame_w);
        let height = self.height.min(frame_h);
        Self {
            x: self.x.clamp(0, frame_w - width),
            y: self.y.clamp(0, frame_h - height),
            width,
            height,
        }
    }
}

/// Descriptive classification of a single ROI movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Stable,
    Drift,
    Jump,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Drift => "drift",
            Self::Jump => "jump",
        }
    }
}

/// One tracker decision, kept in a bounded history for smoothing and
/// statistics only, never for correctness-critical state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MovementRecord {
    pub dx: i32,
    pub dy: i32,
    pub confidence: f32,
    pub movement_type: MovementType,
}

/// Read-only snapshot of cumulative tracker statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoiStatistics {
    pub total_movements: u64,
    pub stable_frames: u64,
    pub drift_frames: u64,
    pub stability_rate: f32,
    pub drift_rate: f32,
    pub current_position: (i32, i32),
    pub current_roi: Option<RoiState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roi_center() {
        let roi = RoiState::new(100, 50, 200, 100);
        assert_eq!(roi.center(), (200, 100));
    }

    #[test]
    fn test_roi_clamp_inside_frame() {
        let roi = RoiState::new(-20, 400, 200, 200);
        let clamped = roi.clamped(640, 480);
        assert_eq!(clamped, RoiState::new(0, 280, 200, 200));
    }

    #[test]
    fn test_region_offset() {
        let mut region = VeinRegion {
            center: (10, 20),
            radius: 5.0,
            area: 78.5,
            perimeter: 31.4,
            ellipticity: 1.0,
            confidence: 0.8,
            bbox: (5, 15, 10, 10),
        };
        region.offset_by(100, 200);
        assert_eq!(region.center, (110, 220));
        assert_eq!(region.bbox, (105, 215, 10, 10));
    }

    #[test]
    fn test_vein_region_serde_round_trip() {
        let region = VeinRegion {
            center: (42, 17),
            radius: 12.5,
            area: 490.8,
            perimeter: 78.5,
            ellipticity: 0.85,
            confidence: 0.72,
            bbox: (30, 5, 25, 25),
        };
        let json = serde_json::to_string(&region).unwrap();
        let back: VeinRegion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, region);
    }
}
