// src/detection/mod.rs

mod edge_circle;
mod ellipse_fit;
mod fusion;
mod region_props;
mod types;

pub use edge_circle::EdgeCircleDetector;
pub use ellipse_fit::EllipseFitDetector;
pub use fusion::{fuse, overlap_ratio, OVERLAP_THRESHOLD};
pub use region_props::RegionPropsDetector;
pub use types::{Candidate, CandidateSource};

use image::GrayImage;
use tracing::{debug, info};

use crate::config::DetectionSettings;
use crate::preprocessing;
use crate::types::{RoiState, VeinRegion};

/// Multi-algorithm vein detector: preprocesses a frame, runs the three
/// candidate generators over the same edge map, and fuses their output
/// into a confidence-ranked region list.
///
/// One instance per logical video/task; settings may be hot-swapped
/// between frames, never mid-frame.
pub struct VeinDetector {
    settings: DetectionSettings,
}

impl VeinDetector {
    pub fn new(settings: DetectionSettings) -> Self {
        Self {
            settings: settings.sanitized(),
        }
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    pub fn update_settings(&mut self, settings: DetectionSettings) {
        self.settings = settings.sanitized();
        info!(settings = ?self.settings, "detection settings updated");
    }

    /// Detect veins in one frame, restricted to `roi` when given.
    ///
    /// Region coordinates are remapped to frame space before returning.
    /// An empty result is not an error; noisy frames simply yield no
    /// evidence.
    pub fn detect(&self, frame: &GrayImage, roi: Option<RoiState>) -> Vec<VeinRegion> {
        let (frame_w, frame_h) = frame.dimensions();
        if frame_w == 0 || frame_h == 0 {
            return Vec::new();
        }

        // Crop to the ROI when one is active and non-degenerate.
        let cropped_roi = roi
            .map(|r| r.clamped(frame_w as i32, frame_h as i32))
            .filter(|r| r.width > 0 && r.height > 0);
        let work = match cropped_roi {
            Some(r) => image::imageops::crop_imm(
                frame,
                r.x as u32,
                r.y as u32,
                r.width as u32,
                r.height as u32,
            )
            .to_image(),
            None => frame.clone(),
        };

        let enhanced = preprocessing::enhance(&work);
        let edges = preprocessing::edge_map(&enhanced, &self.settings);

        let mut candidates = EdgeCircleDetector::generate(&enhanced, &edges, &self.settings);
        let n_circles = candidates.len();
        candidates.extend(EllipseFitDetector::generate(&edges, &self.settings));
        let n_ellipses = candidates.len() - n_circles;
        candidates.extend(RegionPropsDetector::generate(&enhanced, &edges, &self.settings));
        let n_regions = candidates.len() - n_circles - n_ellipses;

        let mut regions = fuse(candidates, OVERLAP_THRESHOLD);

        // One-time remap from ROI-local to frame coordinates.
        if let Some(r) = cropped_roi {
            for region in &mut regions {
                region.offset_by(r.x, r.y);
            }
        }

        debug!(
            circles = n_circles,
            ellipses = n_ellipses,
            components = n_regions,
            fused = regions.len(),
            "frame detection complete"
        );
        regions
    }
}
