// src/detection/fusion.rs
//
// Overlap-based dedup and ranking of the concatenated candidate lists.
// Greedy non-maximum suppression in confidence order: a single pass,
// O(n²) worst case, fine for the tens of candidates a frame produces.
// The stable sort keeps generator order for equal confidence, so the
// result is deterministic.

use tracing::trace;

use crate::detection::types::Candidate;
use crate::types::VeinRegion;

/// Candidates overlapping an accepted one by more than this are dropped.
pub const OVERLAP_THRESHOLD: f32 = 0.3;

/// Cheap overlap proxy for two roughly-circular regions: how far one
/// center sits inside the smaller radius. Depends only on center
/// distance and size, not full geometric intersection.
pub fn overlap_ratio(a: &Candidate, b: &Candidate) -> f32 {
    let dx = (a.center.0 - b.center.0) as f32;
    let dy = (a.center.1 - b.center.1) as f32;
    let distance = (dx * dx + dy * dy).sqrt();
    let min_radius = a.equivalent_radius().min(b.equivalent_radius());
    if min_radius <= 0.0 {
        return 0.0;
    }
    ((min_radius - distance) / min_radius).max(0.0)
}

/// Merge candidate lists into a confidence-ranked, deduplicated list of
/// vein regions.
pub fn fuse(mut candidates: Vec<Candidate>, overlap_threshold: f32) -> Vec<VeinRegion> {
    if candidates.is_empty() {
        return Vec::new();
    }

    // Stable: equal confidence keeps generator order.
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut accepted: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let overlapping = accepted
            .iter()
            .any(|kept| overlap_ratio(&candidate, kept) > overlap_threshold);
        if overlapping {
            trace!(center = ?candidate.center, source = ?candidate.source, "suppressed overlap");
            continue;
        }
        accepted.push(candidate);
    }

    accepted.into_iter().map(Candidate::into_region).collect()
}
