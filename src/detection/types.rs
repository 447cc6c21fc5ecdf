// src/detection/types.rs

use crate::types::VeinRegion;

/// Fallback equivalent radius when a generator reports neither a radius
/// nor axis lengths (connected-component candidates).
pub const DEFAULT_RADIUS: f32 = 10.0;

/// Which generator produced a candidate. Diagnostic only; fusion treats
/// all sources uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Circle,
    Ellipse,
    Region,
}

/// A raw detection candidate from one generator, before fusion.
///
/// Only `center` and `confidence` are always present; the remaining
/// descriptors are backfilled during conversion to [`VeinRegion`].
#[derive(Debug, Clone)]
pub struct Candidate {
    pub center: (i32, i32),
    pub confidence: f32,
    pub source: CandidateSource,
    pub radius: Option<f32>,
    /// Full (major, minor) axis lengths when elliptical.
    pub axes: Option<(f32, f32)>,
    pub ellipticity: Option<f32>,
    pub area: Option<f32>,
    pub perimeter: Option<f32>,
    pub bbox: Option<(i32, i32, i32, i32)>,
}

impl Candidate {
    pub fn circle(center: (i32, i32), radius: f32, confidence: f32) -> Self {
        Self {
            center,
            confidence,
            source: CandidateSource::Circle,
            radius: Some(radius),
            axes: None,
            ellipticity: None,
            area: None,
            perimeter: None,
            bbox: None,
        }
    }

    /// Radius used for overlap estimation: axis-based when elliptical,
    /// otherwise the reported radius, otherwise [`DEFAULT_RADIUS`].
    pub fn equivalent_radius(&self) -> f32 {
        if let Some((major, _)) = self.axes {
            return major / 2.0;
        }
        self.radius.unwrap_or(DEFAULT_RADIUS)
    }

    /// Convert into a [`VeinRegion`], backfilling missing descriptors:
    /// area defaults to `πr²`, perimeter to `2πr`, bbox to the square of
    /// side `2r` around the center.
    pub fn into_region(self) -> VeinRegion {
        let radius = self.equivalent_radius();
        let r = radius.round() as i32;
        let (cx, cy) = self.center;
        VeinRegion {
            center: self.center,
            radius,
            area: self
                .area
                .unwrap_or(std::f32::consts::PI * radius * radius),
            perimeter: self
                .perimeter
                .unwrap_or(2.0 * std::f32::consts::PI * radius),
            ellipticity: self.ellipticity.unwrap_or(1.0),
            confidence: self.confidence,
            bbox: self.bbox.unwrap_or((cx - r, cy - r, 2 * r, 2 * r)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_radius_prefers_axes() {
        let mut cand = Candidate::circle((0, 0), 7.0, 0.8);
        assert_eq!(cand.equivalent_radius(), 7.0);
        cand.axes = Some((24.0, 16.0));
        assert_eq!(cand.equivalent_radius(), 12.0);
    }

    #[test]
    fn test_into_region_backfills_geometry() {
        let region = Candidate::circle((50, 60), 10.0, 0.8).into_region();
        assert!((region.area - std::f32::consts::PI * 100.0).abs() < 1e-3);
        assert!((region.perimeter - std::f32::consts::PI * 20.0).abs() < 1e-3);
        assert_eq!(region.ellipticity, 1.0);
        assert_eq!(region.bbox, (40, 50, 20, 20));
    }
}
