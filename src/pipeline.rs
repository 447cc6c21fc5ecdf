// src/pipeline.rs
//
// Per-frame decision loop: detection output feeds the tracker, and the
// tracker's ROI feeds back into the next frame's detection. One pipeline
// value per logical video/task; single-threaded, no I/O, no blocking.

use image::GrayImage;
use tracing::debug;

use crate::config::{DetectionSettings, PipelineConfig, TrackerSettings};
use crate::detection::VeinDetector;
use crate::roi_tracker::RoiTracker;
use crate::types::{RoiState, RoiStatistics, VeinRegion};

/// Result of processing one frame: fused regions in confidence order
/// (frame coordinates) and the updated, frame-clamped ROI.
#[derive(Debug, Clone)]
pub struct FrameResult {
    pub frame_number: u64,
    pub regions: Vec<VeinRegion>,
    pub roi: RoiState,
}

pub struct VeinTrackingPipeline {
    detector: VeinDetector,
    tracker: RoiTracker,
    /// Prior-frame regions, used as temporal continuity hints for target
    /// selection on the next frame.
    last_regions: Vec<VeinRegion>,
    frame_number: u64,
}

impl VeinTrackingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            detector: VeinDetector::new(config.detection),
            tracker: RoiTracker::new(config.tracker),
            last_regions: Vec::new(),
            frame_number: 0,
        }
    }

    /// Run one detection + tracking cycle on a grayscale frame.
    ///
    /// The tracker leaves the ROI unbounded by design; the pipeline knows
    /// the frame size, so the bounds clamp lives here.
    pub fn process_frame(&mut self, frame: &GrayImage) -> FrameResult {
        let (frame_w, frame_h) = frame.dimensions();
        let (frame_w, frame_h) = (frame_w as i32, frame_h as i32);
        self.frame_number += 1;

        let regions = self.detector.detect(frame, self.tracker.current_roi());

        let centers: Vec<(i32, i32)> = regions.iter().map(|r| r.center).collect();
        let hints: Vec<(i32, i32)> = self.last_regions.iter().map(|r| r.center).collect();
        let hints = if hints.is_empty() {
            None
        } else {
            Some(hints.as_slice())
        };

        self.tracker.update(frame_w, frame_h, &centers, hints);
        let roi = self
            .tracker
            .clamp_to_frame(frame_w, frame_h)
            .unwrap_or(RoiState::new(0, 0, frame_w, frame_h));

        debug!(
            frame = self.frame_number,
            regions = regions.len(),
            ?roi,
            "frame processed"
        );

        self.last_regions = regions.clone();
        FrameResult {
            frame_number: self.frame_number,
            regions,
            roi,
        }
    }

    /// Swap in new detection settings between frames.
    pub fn update_settings(&mut self, settings: DetectionSettings) {
        self.detector.update_settings(settings);
    }

    /// Swap in new tracker settings between frames. The speed cap takes
    /// effect on the next frame; the window size on the next ROI reset.
    pub fn update_tracker_settings(&mut self, settings: TrackerSettings) {
        self.tracker.update_settings(settings);
    }

    /// Re-center the tracked window, clearing all tracker history.
    pub fn reset_roi(&mut self, center: (i32, i32), frame_w: i32, frame_h: i32) -> RoiState {
        self.last_regions.clear();
        self.tracker.reset(center, frame_w, frame_h)
    }

    pub fn predict_next_position(&self, lookahead_frames: u32) -> Option<(i32, i32)> {
        self.tracker.predict_next_position(lookahead_frames)
    }

    pub fn statistics(&self) -> RoiStatistics {
        self.tracker.get_statistics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("vein_tracking=debug")
            .with_test_writer()
            .try_init();
    }

    fn vein_frame(w: u32, h: u32, cx: f32, cy: f32, radius: f32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            if (dx * dx + dy * dy).sqrt() < radius {
                image::Luma([40u8])
            } else {
                image::Luma([200u8])
            }
        })
    }

    #[test]
    fn test_roi_follows_moving_vein() {
        init_logging();
        let mut pipeline = VeinTrackingPipeline::new(PipelineConfig::default());

        // First frame initializes the ROI at the frame center.
        let first = pipeline.process_frame(&vein_frame(400, 300, 200.0, 150.0, 15.0));
        assert_eq!(first.roi.center(), (200, 150));

        // Vein drifts right; the ROI center should trail it.
        let mut cx = 200.0;
        let mut last_center_x = first.roi.center().0;
        for _ in 0..5 {
            cx += 8.0;
            let result = pipeline.process_frame(&vein_frame(400, 300, cx, 150.0, 15.0));
            assert!(!result.regions.is_empty(), "vein should stay detected");
            assert!(result.roi.center().0 >= last_center_x);
            last_center_x = result.roi.center().0;
        }
        assert!(
            last_center_x > 210,
            "ROI should have followed the drift, ended at x={last_center_x}"
        );
    }

    #[test]
    fn test_blank_frames_keep_roi_stationary() {
        let mut pipeline = VeinTrackingPipeline::new(PipelineConfig::default());
        let blank = GrayImage::from_pixel(400, 300, image::Luma([128u8]));

        let first = pipeline.process_frame(&blank);
        let second = pipeline.process_frame(&blank);
        assert!(second.regions.is_empty());
        assert_eq!(second.roi, first.roi);
        assert_eq!(pipeline.statistics().total_movements, 0);
    }

    #[test]
    fn test_roi_stays_inside_frame() {
        let mut pipeline = VeinTrackingPipeline::new(PipelineConfig::default());
        // Vein near the frame edge keeps pulling the ROI outward.
        for _ in 0..10 {
            let result = pipeline.process_frame(&vein_frame(300, 300, 240.0, 150.0, 12.0));
            let roi = result.roi;
            assert!(roi.x >= 0 && roi.y >= 0);
            assert!(roi.x + roi.width <= 300);
            assert!(roi.y + roi.height <= 300);
        }
    }

    #[test]
    fn test_reset_recenters() {
        let mut pipeline = VeinTrackingPipeline::new(PipelineConfig::default());
        pipeline.process_frame(&vein_frame(400, 300, 200.0, 150.0, 15.0));
        let roi = pipeline.reset_roi((100, 100), 400, 300);
        assert_eq!(roi, RoiState::new(0, 0, 200, 200));
        assert_eq!(pipeline.statistics().total_movements, 0);
    }

    #[test]
    fn test_tracker_settings_hot_swap_limits_movement() {
        init_logging();
        let mut pipeline = VeinTrackingPipeline::new(PipelineConfig::default());

        // Initialize the ROI at the frame center, then tighten the cap.
        pipeline.process_frame(&vein_frame(400, 300, 200.0, 150.0, 15.0));
        pipeline.update_tracker_settings(TrackerSettings {
            max_movement_speed: 5.0,
            ..TrackerSettings::default()
        });

        // A vein far from the current center can only pull the ROI by the
        // new cap per frame.
        let mut last_x = 200;
        for _ in 0..3 {
            let result = pipeline.process_frame(&vein_frame(400, 300, 260.0, 150.0, 15.0));
            assert!(!result.regions.is_empty(), "vein should stay detected");
            let x = result.roi.center().0;
            assert!(
                x - last_x <= 5,
                "per-frame movement {} exceeds the new cap",
                x - last_x
            );
            last_x = x;
        }
    }

    #[test]
    fn test_frame_numbers_increment() {
        let mut pipeline = VeinTrackingPipeline::new(PipelineConfig::default());
        let blank = GrayImage::from_pixel(64, 64, image::Luma([128u8]));
        assert_eq!(pipeline.process_frame(&blank).frame_number, 1);
        assert_eq!(pipeline.process_frame(&blank).frame_number, 2);
    }
}
