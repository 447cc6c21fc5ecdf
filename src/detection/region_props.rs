// src/detection/region_props.rs
//
// Connected-component shape statistics over the edge map, in the style
// of skimage regionprops: area, centroid, eccentricity from second
// moments, bbox aspect ratio, and intensity contrast from the enhanced
// frame. Filters reject near-line and near-point blobs; survivors are
// scored by size and contrast.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::config::DetectionSettings;
use crate::detection::types::{Candidate, CandidateSource};

/// Regions with eccentricity above this are too line-like to be a vein
/// cross-section.
const MAX_ECCENTRICITY: f32 = 0.9;

/// Per-component accumulators, filled in one pass over the label image.
#[derive(Debug, Clone)]
struct ComponentStats {
    count: u32,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_yy: f64,
    sum_xy: f64,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    min_intensity: u8,
    max_intensity: u8,
    boundary: u32,
}

impl ComponentStats {
    fn new() -> Self {
        Self {
            count: 0,
            sum_x: 0.0,
            sum_y: 0.0,
            sum_xx: 0.0,
            sum_yy: 0.0,
            sum_xy: 0.0,
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            min_intensity: u8::MAX,
            max_intensity: 0,
            boundary: 0,
        }
    }
}

pub struct RegionPropsDetector;

impl RegionPropsDetector {
    pub fn generate(
        enhanced: &GrayImage,
        edges: &GrayImage,
        settings: &DetectionSettings,
    ) -> Vec<Candidate> {
        let (w, h) = edges.dimensions();
        if w == 0 || h == 0 {
            return Vec::new();
        }
        let labels = connected_components(edges, Connectivity::Eight, Luma([0u8]));

        let mut stats: Vec<ComponentStats> = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let label = labels.get_pixel(x, y)[0] as usize;
                if label == 0 {
                    continue;
                }
                if label > stats.len() {
                    stats.resize(label, ComponentStats::new());
                }
                let s = &mut stats[label - 1];
                s.count += 1;
                s.sum_x += x as f64;
                s.sum_y += y as f64;
                s.sum_xx += (x as f64) * (x as f64);
                s.sum_yy += (y as f64) * (y as f64);
                s.sum_xy += (x as f64) * (y as f64);
                s.min_x = s.min_x.min(x);
                s.min_y = s.min_y.min(y);
                s.max_x = s.max_x.max(x);
                s.max_y = s.max_y.max(y);
                let intensity = enhanced.get_pixel(x, y)[0];
                s.min_intensity = s.min_intensity.min(intensity);
                s.max_intensity = s.max_intensity.max(intensity);

                // Boundary pixel: any 4-neighbor outside the component.
                let label_at = |nx: i64, ny: i64| -> u32 {
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        0
                    } else {
                        labels.get_pixel(nx as u32, ny as u32)[0]
                    }
                };
                let (xi, yi) = (x as i64, y as i64);
                if label_at(xi - 1, yi) != label as u32
                    || label_at(xi + 1, yi) != label as u32
                    || label_at(xi, yi - 1) != label as u32
                    || label_at(xi, yi + 1) != label as u32
                {
                    s.boundary += 1;
                }
            }
        }

        stats
            .iter()
            .filter_map(|s| component_candidate(s, settings))
            .collect()
    }
}

fn component_candidate(s: &ComponentStats, settings: &DetectionSettings) -> Option<Candidate> {
    let area = s.count as f32;
    if area < settings.min_vein_area || area > settings.max_vein_area {
        return None;
    }

    let width = s.max_x - s.min_x + 1;
    let height = s.max_y - s.min_y + 1;
    if width == 0 || height == 0 {
        return None;
    }
    let aspect = width.max(height) as f32 / width.min(height) as f32;
    if aspect < settings.min_aspect_ratio || aspect > settings.max_aspect_ratio {
        return None;
    }

    let eccentricity = component_eccentricity(s)?;
    if eccentricity > MAX_ECCENTRICITY {
        return None;
    }

    let contrast = if s.max_intensity > s.min_intensity {
        (s.max_intensity - s.min_intensity) as f32 / 255.0
    } else {
        0.0
    };
    // Favors larger, higher-contrast regions over faint specks.
    let confidence = (0.5 + 0.3 * (area / 1000.0).min(1.0) + 0.2 * contrast).min(1.0);

    let n = s.count as f64;
    let cx = s.sum_x / n;
    let cy = s.sum_y / n;
    Some(Candidate {
        center: (cx.round() as i32, cy.round() as i32),
        confidence,
        source: CandidateSource::Region,
        radius: None,
        axes: None,
        ellipticity: None,
        area: Some(area),
        perimeter: Some(s.boundary as f32),
        bbox: Some((s.min_x as i32, s.min_y as i32, width as i32, height as i32)),
    })
}

/// Eccentricity from the central second moments, `sqrt(1 - λ2/λ1)`.
/// None for degenerate (single-point or collinear) components.
fn component_eccentricity(s: &ComponentStats) -> Option<f32> {
    let n = s.count as f64;
    let cx = s.sum_x / n;
    let cy = s.sum_y / n;
    let mu20 = s.sum_xx / n - cx * cx;
    let mu02 = s.sum_yy / n - cy * cy;
    let mu11 = s.sum_xy / n - cx * cy;

    let trace_half = (mu20 + mu02) / 2.0;
    let det_term = (((mu20 - mu02) / 2.0).powi(2) + mu11 * mu11).sqrt();
    let lambda1 = trace_half + det_term;
    let lambda2 = trace_half - det_term;
    if lambda1 <= f64::EPSILON {
        return None;
    }
    Some((1.0 - (lambda2 / lambda1).max(0.0)).sqrt() as f32)
}
