// src/preprocessing.rs

use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;

use crate::config::DetectionSettings;

const CLAHE_CLIP_LIMIT: f32 = 2.0;
const CLAHE_TILES: u32 = 8;

/// Normalize an arbitrary frame to grayscale for detection.
pub fn to_grayscale(frame: &DynamicImage) -> GrayImage {
    frame.to_luma8()
}

/// Denoise and locally enhance contrast before edge extraction.
///
/// Ultrasound frames are speckle-heavy; a light Gaussian blur followed by
/// CLAHE keeps the low-echogenicity vein lumens separable from the
/// surrounding tissue without amplifying the speckle noise.
pub fn enhance(frame: &GrayImage) -> GrayImage {
    let blurred = gaussian_blur_f32(frame, 1.1);
    clahe(&blurred, CLAHE_CLIP_LIMIT, CLAHE_TILES, CLAHE_TILES)
}

/// Canny edge map with a 3x3 morphological close to bridge small gaps
/// in vessel wall edges.
pub fn edge_map(enhanced: &GrayImage, settings: &DetectionSettings) -> GrayImage {
    let edges = canny(
        enhanced,
        settings.canny_threshold_low,
        settings.canny_threshold_high,
    );
    close(&edges, Norm::LInf, 1)
}

/// Contrast-limited adaptive histogram equalization.
///
/// Per-tile histograms are clipped at `clip_limit` times the uniform bin
/// height, the excess is redistributed, and per-pixel lookups are
/// bilinearly interpolated between the four neighboring tile mappings.
pub fn clahe(image: &GrayImage, clip_limit: f32, tiles_x: u32, tiles_y: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }
    let tiles_x = tiles_x.clamp(1, w);
    let tiles_y = tiles_y.clamp(1, h);
    let tile_w = w.div_ceil(tiles_x);
    let tile_h = h.div_ceil(tiles_y);

    // One 256-entry lookup table per tile.
    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[image.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let npix = (x1 - x0) * (y1 - y0);
            let limit = ((clip_limit * npix as f32 / 256.0) as u32).max(1);

            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > limit {
                    excess += *bin - limit;
                    *bin = limit;
                }
            }
            let bonus = excess / 256;
            for bin in hist.iter_mut() {
                *bin += bonus;
            }

            let lut = &mut luts[(ty * tiles_x + tx) as usize];
            let mut cum = 0u32;
            for (value, bin) in hist.iter().enumerate() {
                cum += bin;
                lut[value] = ((cum * 255) / npix.max(1)).min(255) as u8;
            }
        }
    }

    let mut out = GrayImage::new(w, h);
    let lut_at = |tx: i64, ty: i64, value: u8| -> f32 {
        let tx = tx.clamp(0, tiles_x as i64 - 1) as u32;
        let ty = ty.clamp(0, tiles_y as i64 - 1) as u32;
        luts[(ty * tiles_x + tx) as usize][value as usize] as f32
    };
    for y in 0..h {
        for x in 0..w {
            let value = image.get_pixel(x, y)[0];

            // Position relative to tile centers.
            let fx = (x as f32 - tile_w as f32 / 2.0) / tile_w as f32;
            let fy = (y as f32 - tile_h as f32 / 2.0) / tile_h as f32;
            let tx0 = fx.floor() as i64;
            let ty0 = fy.floor() as i64;
            let ax = fx - tx0 as f32;
            let ay = fy - ty0 as f32;

            let top = lut_at(tx0, ty0, value) * (1.0 - ax) + lut_at(tx0 + 1, ty0, value) * ax;
            let bottom =
                lut_at(tx0, ty0 + 1, value) * (1.0 - ax) + lut_at(tx0 + 1, ty0 + 1, value) * ax;
            let mapped = top * (1.0 - ay) + bottom * ay;
            out.put_pixel(x, y, image::Luma([mapped.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}
