// src/detection/ellipse_fit.rs
//
// Contour-based ellipse fitting. External contours of the edge map are
// fitted with a moment-based ellipse (centroid + second central moments
// of the boundary points); near-circular fits inside the area band
// become candidates. Degenerate fits are skipped per contour, never
// fatal.

use image::GrayImage;
use imageproc::contours::{find_contours, Contour};
use imageproc::point::Point;

use crate::config::DetectionSettings;
use crate::detection::types::{Candidate, CandidateSource};

/// Shape-verified fits are trusted slightly less than a perfect fill.
const ELLIPSE_CONFIDENCE_SCALE: f32 = 0.9;

pub struct EllipseFitDetector;

impl EllipseFitDetector {
    pub fn generate(edges: &GrayImage, settings: &DetectionSettings) -> Vec<Candidate> {
        let contours: Vec<Contour<i32>> = find_contours(edges);

        let mut candidates = Vec::new();
        for contour in contours.iter().filter(|c| c.parent.is_none()) {
            if contour.points.len() < 5 {
                continue;
            }
            let area = contour_area(&contour.points);
            if area < settings.min_vein_area || area > settings.max_vein_area {
                continue;
            }
            if let Some(candidate) = fit_candidate(&contour.points, area, settings) {
                candidates.push(candidate);
            }
        }
        candidates
    }
}

/// Fit an ellipse to the boundary points and build a candidate, or None
/// when the fit is degenerate or fails the ellipticity band.
fn fit_candidate(points: &[Point<i32>], area: f32, settings: &DetectionSettings) -> Option<Candidate> {
    let (center, semi_major, semi_minor) = moment_ellipse(points)?;

    let ellipticity = semi_minor / semi_major;
    let tol = settings.elliptical_tolerance;
    if ellipticity < 1.0 - tol || ellipticity > 1.0 + tol {
        return None;
    }

    let ellipse_area = std::f32::consts::PI * semi_major * semi_minor;
    if ellipse_area <= 0.0 {
        return None;
    }
    // Reward contours that fill their fitted ellipse tightly; spurious
    // irregular fits leave most of the ellipse empty.
    let confidence = (area / ellipse_area).min(1.0) * ELLIPSE_CONFIDENCE_SCALE;

    let (min_x, min_y, max_x, max_y) = bounds(points);
    Some(Candidate {
        center: (center.0.round() as i32, center.1.round() as i32),
        confidence,
        source: CandidateSource::Ellipse,
        radius: None,
        axes: Some((2.0 * semi_major, 2.0 * semi_minor)),
        ellipticity: Some(ellipticity),
        area: Some(area),
        perimeter: None,
        bbox: Some((min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)),
    })
}

/// Centroid and semi-axes from the second central moments of the boundary
/// points. For points uniformly sampled on an ellipse the semi-axes are
/// `sqrt(2λ)` for each eigenvalue λ of the covariance matrix.
fn moment_ellipse(points: &[Point<i32>]) -> Option<((f32, f32), f32, f32)> {
    let n = points.len() as f32;
    let mut mx = 0.0f32;
    let mut my = 0.0f32;
    for p in points {
        mx += p.x as f32;
        my += p.y as f32;
    }
    mx /= n;
    my /= n;

    let mut mu20 = 0.0f32;
    let mut mu02 = 0.0f32;
    let mut mu11 = 0.0f32;
    for p in points {
        let dx = p.x as f32 - mx;
        let dy = p.y as f32 - my;
        mu20 += dx * dx;
        mu02 += dy * dy;
        mu11 += dx * dy;
    }
    mu20 /= n;
    mu02 /= n;
    mu11 /= n;

    let trace_half = (mu20 + mu02) / 2.0;
    let det_term = (((mu20 - mu02) / 2.0).powi(2) + mu11 * mu11).sqrt();
    let lambda1 = trace_half + det_term;
    let lambda2 = trace_half - det_term;
    if lambda2 <= f32::EPSILON {
        return None;
    }

    Some(((mx, my), (2.0 * lambda1).sqrt(), (2.0 * lambda2).sqrt()))
}

/// Shoelace area of a closed boundary.
fn contour_area(points: &[Point<i32>]) -> f32 {
    let mut sum = 0i64;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        sum += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (sum.abs() as f32) / 2.0
}

fn bounds(points: &[Point<i32>]) -> (i32, i32, i32, i32) {
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    (min_x, min_y, max_x, max_y)
}
