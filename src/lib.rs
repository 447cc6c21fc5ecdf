// src/lib.rs

//! Vein detection and ROI tracking for ultrasound video frames.
//!
//! Locates tubular low-echogenicity structures in sequential frames and
//! maintains a moving region-of-interest window that follows the most
//! plausible vein. Three classic-CV candidate generators (Hough circles,
//! contour ellipse fits, connected-component shape stats) run over a
//! shared edge map; their output is deduplicated and ranked, and the
//! fused centers drive a speed-limited, temporally-smoothed ROI tracker.
//!
//! The crate is the per-frame core only: video demuxing, storage and any
//! API layer are external. Feed [`VeinTrackingPipeline::process_frame`]
//! grayscale frames in presentation order and consume the returned
//! regions and ROI.

pub mod config;
pub mod detection;
pub mod pipeline;
pub mod preprocessing;
pub mod roi_tracker;
pub mod types;

pub use config::{DetectionSettings, PipelineConfig, TrackerSettings};
pub use detection::VeinDetector;
pub use pipeline::{FrameResult, VeinTrackingPipeline};
pub use roi_tracker::RoiTracker;
pub use types::{MovementRecord, MovementType, RoiState, RoiStatistics, VeinRegion};
