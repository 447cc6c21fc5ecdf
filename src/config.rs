// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::warn;

/// Tunable parameters for the candidate generators.
///
/// Immutable per detection call; the owning detector may hot-swap a new
/// value between frames, never mid-frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub canny_threshold_low: f32,
    pub canny_threshold_high: f32,
    /// Inverse accumulator resolution for the Hough circle transform.
    pub hough_dp: u32,
    /// Minimum distance between accepted circle centers, pixels.
    pub hough_min_dist: f32,
    /// Gradient magnitude gate for Hough voting.
    pub hough_param1: f32,
    /// Accumulator vote threshold for a circle peak.
    pub hough_param2: f32,
    pub min_vein_area: f32,
    pub max_vein_area: f32,
    /// Accepted ellipticity band is [1 − tol, 1 + tol].
    pub elliptical_tolerance: f32,
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            canny_threshold_low: 50.0,
            canny_threshold_high: 150.0,
            hough_dp: 1,
            hough_min_dist: 50.0,
            hough_param1: 50.0,
            hough_param2: 30.0,
            min_vein_area: 100.0,
            max_vein_area: 2000.0,
            elliptical_tolerance: 0.3,
            min_aspect_ratio: 0.3,
            max_aspect_ratio: 3.0,
        }
    }
}

impl DetectionSettings {
    /// Clamp out-of-range values instead of failing. Called once when the
    /// settings enter the detector, so generators can trust the ranges.
    pub fn sanitized(mut self) -> Self {
        if self.canny_threshold_low > self.canny_threshold_high {
            warn!(
                low = self.canny_threshold_low,
                high = self.canny_threshold_high,
                "canny thresholds inverted, swapping"
            );
            std::mem::swap(&mut self.canny_threshold_low, &mut self.canny_threshold_high);
        }
        self.hough_dp = self.hough_dp.max(1);
        self.hough_min_dist = self.hough_min_dist.max(1.0);
        self.min_vein_area = self.min_vein_area.max(0.0);
        self.max_vein_area = self.max_vein_area.max(self.min_vein_area);
        self.elliptical_tolerance = self.elliptical_tolerance.clamp(0.0, 1.0);
        if self.min_aspect_ratio > self.max_aspect_ratio {
            std::mem::swap(&mut self.min_aspect_ratio, &mut self.max_aspect_ratio);
        }
        self
    }
}

/// Parameters for the ROI motion tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    pub roi_width: i32,
    pub roi_height: i32,
    /// Maximum ROI displacement per frame, pixels.
    pub max_movement_speed: f32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            roi_width: 200,
            roi_height: 200,
            max_movement_speed: 50.0,
        }
    }
}

/// Top-level configuration for one detection + tracking pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detection: DetectionSettings,
    pub tracker: TrackerSettings,
}

impl PipelineConfig {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
        let config: PipelineConfig =
            serde_yaml::from_str(&contents).with_context(|| format!("parsing config {path}"))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_detection_settings() {
        let s = DetectionSettings::default();
        assert_eq!(s.canny_threshold_low, 50.0);
        assert_eq!(s.canny_threshold_high, 150.0);
        assert_eq!(s.hough_param2, 30.0);
        assert_eq!(s.min_vein_area, 100.0);
        assert_eq!(s.max_vein_area, 2000.0);
        assert_eq!(s.elliptical_tolerance, 0.3);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "detection:\n  min_vein_area: 50\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.detection.min_vein_area, 50.0);
        assert_eq!(config.detection.max_vein_area, 2000.0);
        assert_eq!(config.tracker.roi_width, 200);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let yaml = "detection:\n  no_such_knob: 3\ntracker:\n  roi_width: 128\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tracker.roi_width, 128);
    }

    #[test]
    fn test_sanitize_swaps_inverted_thresholds() {
        let s = DetectionSettings {
            canny_threshold_low: 200.0,
            canny_threshold_high: 100.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(s.canny_threshold_low, 100.0);
        assert_eq!(s.canny_threshold_high, 200.0);
    }
}
