// src/roi_tracker.rs
//
// ROI motion tracker: follows the most plausible vein center across
// frames with speed limiting, temporal smoothing and drift/jump
// classification. One instance per logical video/task; all state is
// owned here and bounded (movement history 5, position history 10).

use std::collections::VecDeque;
use tracing::{debug, info};

use crate::config::TrackerSettings;
use crate::types::{MovementRecord, MovementType, RoiState, RoiStatistics};

const MOVEMENT_HISTORY_LEN: usize = 5;
const POSITION_HISTORY_LEN: usize = 10;

/// Displacement magnitudes below these classify as stable / drift;
/// everything larger is a jump.
const STABLE_BELOW: f32 = 3.0;
const DRIFT_BELOW: f32 = 20.0;

/// Hint overlap score is `max(0, 1 - distance / HINT_DISTANCE_SCALE)`.
const HINT_DISTANCE_SCALE: f32 = 100.0;

pub struct RoiTracker {
    settings: TrackerSettings,
    current_roi: Option<RoiState>,
    movement_history: VecDeque<MovementRecord>,
    position_history: VecDeque<(i32, i32)>,
    total_movements: u64,
    stable_frames: u64,
    drift_frames: u64,
}

impl RoiTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            settings,
            current_roi: None,
            movement_history: VecDeque::with_capacity(MOVEMENT_HISTORY_LEN),
            position_history: VecDeque::with_capacity(POSITION_HISTORY_LEN),
            total_movements: 0,
            stable_frames: 0,
            drift_frames: 0,
        }
    }

    pub fn current_roi(&self) -> Option<RoiState> {
        self.current_roi
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Swap in new tracker settings between frames. The speed cap applies
    /// from the next update; the window size applies on the next
    /// initialize or reset, since the current ROI is never resized in
    /// place.
    pub fn update_settings(&mut self, settings: TrackerSettings) {
        self.settings = settings;
        info!(settings = ?self.settings, "tracker settings updated");
    }

    pub fn is_initialized(&self) -> bool {
        self.current_roi.is_some()
    }

    /// Place a fixed-size window around `center`, clamped into the frame.
    /// A caller-supplied center outside the frame is pulled back inside
    /// first, so the window never ends up with a negative size.
    pub fn initialize(&mut self, center: (i32, i32), frame_w: i32, frame_h: i32) -> RoiState {
        let center = (
            center.0.clamp(0, (frame_w - 1).max(0)),
            center.1.clamp(0, (frame_h - 1).max(0)),
        );
        let half_w = self.settings.roi_width / 2;
        let half_h = self.settings.roi_height / 2;

        let x = (center.0 - half_w).max(0);
        let y = (center.1 - half_h).max(0);
        let width = self.settings.roi_width.min(frame_w - x);
        let height = self.settings.roi_height.min(frame_h - y);

        let roi = RoiState::new(x, y, width, height);
        self.current_roi = Some(roi);
        self.push_position(center);
        info!(?roi, "ROI initialized");
        roi
    }

    /// Clear histories and counters, then re-initialize around `center`.
    pub fn reset(&mut self, center: (i32, i32), frame_w: i32, frame_h: i32) -> RoiState {
        self.current_roi = None;
        self.movement_history.clear();
        self.position_history.clear();
        self.total_movements = 0;
        self.stable_frames = 0;
        self.drift_frames = 0;
        self.initialize(center, frame_w, frame_h)
    }

    /// Advance the ROI toward the most plausible vein center.
    ///
    /// No evidence means no movement: an empty `vein_centers` returns the
    /// unchanged ROI without touching the histories. The returned ROI is
    /// not clamped against the frame; the caller owns that decision.
    pub fn update(
        &mut self,
        frame_w: i32,
        frame_h: i32,
        vein_centers: &[(i32, i32)],
        hints: Option<&[(i32, i32)]>,
    ) -> RoiState {
        let Some(roi) = self.current_roi else {
            // First call without explicit initialization: start centered.
            return self.initialize((frame_w / 2, frame_h / 2), frame_w, frame_h);
        };
        if vein_centers.is_empty() {
            return roi;
        }

        let target = self.select_target(vein_centers, hints);
        let current = roi.center();
        let (dx, dy) = (target.0 - current.0, target.1 - current.1);

        let (dx, dy) = self.limit_movement(dx, dy);
        let (dx, dy) = self.smooth_movement(dx, dy);

        let record = MovementRecord {
            dx,
            dy,
            confidence: self.movement_confidence(vein_centers),
            movement_type: classify_movement(dx, dy),
        };
        debug!(
            dx,
            dy,
            confidence = record.confidence,
            kind = record.movement_type.as_str(),
            "ROI movement"
        );

        let new_roi = RoiState::new(roi.x + dx, roi.y + dy, roi.width, roi.height);
        self.current_roi = Some(new_roi);

        self.push_movement(record);
        self.push_position(target);
        self.total_movements += 1;
        match record.movement_type {
            MovementType::Stable => self.stable_frames += 1,
            MovementType::Drift => self.drift_frames += 1,
            MovementType::Jump => {}
        }

        new_roi
    }

    /// Clamp the current ROI into the frame and return it. Call-site
    /// companion to `update`, which deliberately leaves the ROI unbounded.
    pub fn clamp_to_frame(&mut self, frame_w: i32, frame_h: i32) -> Option<RoiState> {
        let clamped = self.current_roi?.clamped(frame_w, frame_h);
        self.current_roi = Some(clamped);
        Some(clamped)
    }

    /// Linear extrapolation from recent movements. None below 2 records;
    /// too little history to call it a trend.
    pub fn predict_next_position(&self, lookahead_frames: u32) -> Option<(i32, i32)> {
        if self.movement_history.len() < 2 {
            return None;
        }
        let n = self.movement_history.len().min(5);
        let recent = self.movement_history.iter().rev().take(n);
        let (mut sum_dx, mut sum_dy) = (0.0f32, 0.0f32);
        for m in recent {
            sum_dx += m.dx as f32;
            sum_dy += m.dy as f32;
        }
        let avg_dx = sum_dx / n as f32;
        let avg_dy = sum_dy / n as f32;

        let center = self.current_center();
        Some((
            (center.0 as f32 + avg_dx * lookahead_frames as f32) as i32,
            (center.1 as f32 + avg_dy * lookahead_frames as f32) as i32,
        ))
    }

    pub fn get_statistics(&self) -> RoiStatistics {
        let total = self.total_movements.max(1);
        RoiStatistics {
            total_movements: self.total_movements,
            stable_frames: self.stable_frames,
            drift_frames: self.drift_frames,
            stability_rate: self.stable_frames as f32 / total as f32,
            drift_rate: self.drift_frames as f32 / total as f32,
            current_position: self.current_center(),
            current_roi: self.current_roi,
        }
    }

    fn current_center(&self) -> (i32, i32) {
        self.current_roi.map(|r| r.center()).unwrap_or((0, 0))
    }

    /// Pick the candidate to follow. A single candidate is followed
    /// directly; otherwise the nearest to the current center wins, unless
    /// prior-frame hints are available, in which case temporal continuity
    /// (proximity to any hint) overrides raw nearest-distance.
    fn select_target(
        &self,
        vein_centers: &[(i32, i32)],
        hints: Option<&[(i32, i32)]>,
    ) -> (i32, i32) {
        if vein_centers.len() == 1 {
            return vein_centers[0];
        }

        let current = self.current_center();
        let mut target_idx = nearest_index(vein_centers, current);

        if let Some(hints) = hints {
            if !hints.is_empty() {
                let mut best_overlap = -1.0f32;
                for (i, center) in vein_centers.iter().enumerate() {
                    let overlap = hint_overlap(*center, hints);
                    if overlap > best_overlap {
                        best_overlap = overlap;
                        target_idx = i;
                    }
                }
            }
        }
        vein_centers[target_idx]
    }

    /// Scale the displacement down to `max_movement_speed` so a single
    /// outlier frame cannot teleport the ROI.
    fn limit_movement(&self, dx: i32, dy: i32) -> (i32, i32) {
        let distance = ((dx * dx + dy * dy) as f32).sqrt();
        if distance > self.settings.max_movement_speed {
            let scale = self.settings.max_movement_speed / distance;
            ((dx as f32 * scale) as i32, (dy as f32 * scale) as i32)
        } else {
            (dx, dy)
        }
    }

    /// Blend with the mean of the last 3 recorded displacements,
    /// 0.7 current / 0.3 history. Skipped below 2 history entries.
    fn smooth_movement(&self, dx: i32, dy: i32) -> (i32, i32) {
        if self.movement_history.len() < 2 {
            return (dx, dy);
        }
        let n = self.movement_history.len().min(3);
        let recent = self.movement_history.iter().rev().take(n);
        let (mut sum_dx, mut sum_dy) = (0.0f32, 0.0f32);
        for m in recent {
            sum_dx += m.dx as f32;
            sum_dy += m.dy as f32;
        }
        let avg_dx = sum_dx / n as f32;
        let avg_dy = sum_dy / n as f32;

        (
            (dx as f32 * 0.7 + avg_dx * 0.3) as i32,
            (dy as f32 * 0.7 + avg_dy * 0.3) as i32,
        )
    }

    /// Weighted confidence for this movement: candidate count, positional
    /// consistency across candidates, and history smoothness.
    fn movement_confidence(&self, vein_centers: &[(i32, i32)]) -> f32 {
        if vein_centers.is_empty() {
            return 0.0;
        }

        let count_factor = (vein_centers.len() as f32 / 3.0).min(1.0);

        let consistency_factor = if vein_centers.len() > 1 {
            let n = vein_centers.len() as f32;
            let mean_x = vein_centers.iter().map(|c| c.0 as f32).sum::<f32>() / n;
            let mean_y = vein_centers.iter().map(|c| c.1 as f32).sum::<f32>() / n;
            let var_x = vein_centers
                .iter()
                .map(|c| (c.0 as f32 - mean_x).powi(2))
                .sum::<f32>()
                / n;
            let var_y = vein_centers
                .iter()
                .map(|c| (c.1 as f32 - mean_y).powi(2))
                .sum::<f32>()
                / n;
            let variance = (var_x + var_y) / 2.0;
            (1.0 - variance / 1000.0).max(0.0)
        } else {
            0.8
        };

        let smoothness_factor = if self.movement_history.len() >= 2 {
            let newest = self.movement_history[self.movement_history.len() - 1];
            let previous = self.movement_history[self.movement_history.len() - 2];
            if (newest.dx - previous.dx).abs() < 5 && (newest.dy - previous.dy).abs() < 5 {
                1.0
            } else {
                0.8
            }
        } else {
            0.8
        };

        (count_factor * 0.4 + consistency_factor * 0.4 + smoothness_factor * 0.2).min(1.0)
    }

    fn push_movement(&mut self, record: MovementRecord) {
        if self.movement_history.len() == MOVEMENT_HISTORY_LEN {
            self.movement_history.pop_front();
        }
        self.movement_history.push_back(record);
    }

    fn push_position(&mut self, position: (i32, i32)) {
        if self.position_history.len() == POSITION_HISTORY_LEN {
            self.position_history.pop_front();
        }
        self.position_history.push_back(position);
    }
}

fn classify_movement(dx: i32, dy: i32) -> MovementType {
    let distance = ((dx * dx + dy * dy) as f32).sqrt();
    if distance < STABLE_BELOW {
        MovementType::Stable
    } else if distance < DRIFT_BELOW {
        MovementType::Drift
    } else {
        MovementType::Jump
    }
}

fn nearest_index(centers: &[(i32, i32)], to: (i32, i32)) -> usize {
    let mut best = 0;
    let mut best_dist = i64::MAX;
    for (i, c) in centers.iter().enumerate() {
        let dx = (c.0 - to.0) as i64;
        let dy = (c.1 - to.1) as i64;
        let dist = dx * dx + dy * dy;
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

/// Proximity-based overlap with the closest hint, in [0, 1].
fn hint_overlap(center: (i32, i32), hints: &[(i32, i32)]) -> f32 {
    let mut max_overlap = 0.0f32;
    for hint in hints {
        let dx = (center.0 - hint.0) as f32;
        let dy = (center.1 - hint.1) as f32;
        let distance = (dx * dx + dy * dy).sqrt();
        max_overlap = max_overlap.max((1.0 - distance / HINT_DISTANCE_SCALE).max(0.0));
    }
    max_overlap
}
