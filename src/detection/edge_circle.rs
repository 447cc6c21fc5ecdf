// src/detection/edge_circle.rs
//
// Gradient-voting Hough circle transform over the edge map. Edge pixels
// vote along their gradient line at every radius in the search window;
// circle centers accumulate votes from the whole boundary and show up as
// accumulator peaks. Peaks are thinned with a min-distance pass and the
// radius is recovered from the supporting edge distances.

use image::GrayImage;
use imageproc::gradients::{horizontal_scharr, vertical_scharr};
use tracing::trace;

use crate::config::DetectionSettings;
use crate::detection::types::Candidate;

/// Fixed radius search window, pixels. Vein cross-sections outside this
/// range are handled by the other generators.
pub const MIN_RADIUS: f32 = 5.0;
pub const MAX_RADIUS: f32 = 50.0;

/// Circles are structurally strong evidence but unverified by shape fit.
const CIRCLE_CONFIDENCE: f32 = 0.8;

pub struct EdgeCircleDetector;

impl EdgeCircleDetector {
    /// Detect circular candidates. Deterministic and side-effect-free;
    /// returns an empty list rather than failing on degenerate input.
    pub fn generate(
        enhanced: &GrayImage,
        edges: &GrayImage,
        settings: &DetectionSettings,
    ) -> Vec<Candidate> {
        let (w, h) = edges.dimensions();
        if w < 4 || h < 4 {
            return Vec::new();
        }

        let gx = horizontal_scharr(enhanced);
        let gy = vertical_scharr(enhanced);

        let dp = settings.hough_dp.max(1);
        let acc_w = w.div_ceil(dp) as usize;
        let acc_h = h.div_ceil(dp) as usize;
        let mut accum = vec![0.0f32; acc_w * acc_h];

        // Vote along +/- gradient directions through the full radius window.
        let grad_gate = settings.hough_param1;
        for y in 0..h {
            for x in 0..w {
                if edges.get_pixel(x, y)[0] == 0 {
                    continue;
                }
                let gxv = gx.get_pixel(x, y)[0] as f32;
                let gyv = gy.get_pixel(x, y)[0] as f32;
                let mag = (gxv * gxv + gyv * gyv).sqrt();
                if mag < grad_gate {
                    continue;
                }
                let dx = gxv / mag;
                let dy = gyv / mag;

                for sign in [-1.0f32, 1.0] {
                    let mut r = MIN_RADIUS;
                    while r <= MAX_RADIUS {
                        let vx = (x as f32 + sign * dx * r) / dp as f32;
                        let vy = (y as f32 + sign * dy * r) / dp as f32;
                        let ax = vx.round();
                        let ay = vy.round();
                        if ax >= 0.0 && ay >= 0.0 && (ax as usize) < acc_w && (ay as usize) < acc_h
                        {
                            accum[ay as usize * acc_w + ax as usize] += 1.0;
                        }
                        r += 1.0;
                    }
                }
            }
        }

        // Local maxima above the vote threshold.
        let mut peaks: Vec<(u32, u32, f32)> = Vec::new();
        for ay in 1..acc_h.saturating_sub(1) {
            for ax in 1..acc_w.saturating_sub(1) {
                let votes = accum[ay * acc_w + ax];
                if votes < settings.hough_param2 {
                    continue;
                }
                let mut is_max = true;
                'nbrs: for ny in ay - 1..=ay + 1 {
                    for nx in ax - 1..=ax + 1 {
                        if (nx, ny) != (ax, ay) && accum[ny * acc_w + nx] > votes {
                            is_max = false;
                            break 'nbrs;
                        }
                    }
                }
                if is_max {
                    peaks.push(((ax as u32 * dp), (ay as u32 * dp), votes));
                }
            }
        }
        peaks.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        // Min-distance thinning between centers, strongest first.
        let min_dist_sq = settings.hough_min_dist * settings.hough_min_dist;
        let mut centers: Vec<(u32, u32)> = Vec::new();
        for &(px, py, _) in &peaks {
            let far_enough = centers.iter().all(|&(kx, ky)| {
                let dx = px as f32 - kx as f32;
                let dy = py as f32 - ky as f32;
                dx * dx + dy * dy >= min_dist_sq
            });
            if far_enough {
                centers.push((px, py));
            }
        }

        let mut candidates = Vec::with_capacity(centers.len());
        for (cx, cy) in centers {
            if let Some(radius) = estimate_radius(edges, cx, cy) {
                trace!(cx, cy, radius, "hough circle candidate");
                candidates.push(Candidate::circle(
                    (cx as i32, cy as i32),
                    radius,
                    CIRCLE_CONFIDENCE,
                ));
            }
        }
        candidates
    }
}

/// Mode of the rounded distances from the center to nearby edge pixels.
fn estimate_radius(edges: &GrayImage, cx: u32, cy: u32) -> Option<f32> {
    let (w, h) = edges.dimensions();
    let bins = (MAX_RADIUS - MIN_RADIUS) as usize + 1;
    let mut hist = vec![0u32; bins];

    let x0 = cx.saturating_sub(MAX_RADIUS as u32 + 1);
    let y0 = cy.saturating_sub(MAX_RADIUS as u32 + 1);
    let x1 = (cx + MAX_RADIUS as u32 + 1).min(w - 1);
    let y1 = (cy + MAX_RADIUS as u32 + 1).min(h - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            if edges.get_pixel(x, y)[0] == 0 {
                continue;
            }
            let dx = x as f32 - cx as f32;
            let dy = y as f32 - cy as f32;
            let dist = (dx * dx + dy * dy).sqrt().round();
            if (MIN_RADIUS..=MAX_RADIUS).contains(&dist) {
                hist[(dist - MIN_RADIUS) as usize] += 1;
            }
        }
    }

    let (best_bin, &support) = hist
        .iter()
        .enumerate()
        .max_by_key(|(_, &count)| count)?;
    // A real circle boundary contributes many pixels at one distance.
    if support < 8 {
        return None;
    }
    Some(MIN_RADIUS + best_bin as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing;

    /// Dark disk on a bright background, like a vein lumen cross-section.
    fn disk_image(w: u32, h: u32, cx: f32, cy: f32, radius: f32) -> GrayImage {
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
    fn test_finds_disk_center() {
        let settings = DetectionSettings::default();
        let img = disk_image(120, 120, 60.0, 60.0, 18.0);
        let edges = preprocessing::edge_map(&img, &settings);

        let candidates = EdgeCircleDetector::generate(&img, &edges, &settings);
        assert!(!candidates.is_empty(), "should detect the disk");

        let best = &candidates[0];
        let err = (((best.center.0 - 60).pow(2) + (best.center.1 - 60).pow(2)) as f32).sqrt();
        assert!(err < 6.0, "center {:?} too far from (60, 60)", best.center);
        let r = best.radius.unwrap();
        assert!((r - 18.0).abs() < 5.0, "radius {r} too far from 18");
        assert_eq!(best.confidence, 0.8);
    }

    #[test]
    fn test_blank_image_yields_nothing() {
        let settings = DetectionSettings::default();
        let img = GrayImage::from_pixel(80, 80, image::Luma([128u8]));
        let edges = preprocessing::edge_map(&img, &settings);
        let candidates = EdgeCircleDetector::generate(&img, &edges, &settings);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_tiny_image_is_safe() {
        let settings = DetectionSettings::default();
        let img = GrayImage::new(2, 2);
        let edges = GrayImage::new(2, 2);
        assert!(EdgeCircleDetector::generate(&img, &edges, &settings).is_empty());
    }
}
