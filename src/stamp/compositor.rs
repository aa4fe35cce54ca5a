//! Raster compositor
//!
//! Resamples the stamp to the placement rectangle and alpha-blends it
//! onto a copy of the document raster. Pure and single-pass; the input
//! document buffer is never mutated.

use crate::error::{Error, Result};
use crate::stamp::{BlendMode, PlacementResult};
use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Composite the stamp onto the document at the given placement rectangle.
///
/// Opacity convention: `opacity_percent` is how visible the stamp is,
/// 0 invisible, 100 fully opaque. Callers holding an inverted
/// "transparency" value must pass `100 - transparency`. Values outside
/// [0, 100] are clamped.
///
/// The effective per-pixel alpha is the stamp pixel's own alpha scaled
/// by the opacity. Destination pixels outside the document bounds are
/// skipped without error, so placements that extend past the canvas
/// (never clamped by `compute_placement`) simply crop.
///
/// Resampling is bilinear (`FilterType::Triangle`), deterministic for a
/// fixed input.
pub fn composite(
    document: &RgbaImage,
    stamp: &RgbaImage,
    placement: &PlacementResult,
    opacity_percent: f32,
    blend_mode: BlendMode,
) -> Result<RgbaImage> {
    if document.width() == 0 || document.height() == 0 {
        return Err(Error::InvalidRaster {
            reason: format!(
                "document raster is {}x{}",
                document.width(),
                document.height()
            ),
        });
    }
    if stamp.width() == 0 || stamp.height() == 0 {
        return Err(Error::InvalidRaster {
            reason: format!("stamp raster is {}x{}", stamp.width(), stamp.height()),
        });
    }

    let opacity = opacity_percent.clamp(0.0, 100.0) / 100.0;
    let mut out = document.clone();
    if opacity == 0.0 {
        return Ok(out);
    }

    let target_w = (placement.width.round() as i64).max(1) as u32;
    let target_h = (placement.height.round() as i64).max(1) as u32;
    let resampled = if (target_w, target_h) == stamp.dimensions() {
        stamp.clone()
    } else {
        imageops::resize(stamp, target_w, target_h, FilterType::Triangle)
    };

    let origin_x = placement.x.round() as i64;
    let origin_y = placement.y.round() as i64;
    let doc_w = out.width() as i64;
    let doc_h = out.height() as i64;

    for (i, j, src) in resampled.enumerate_pixels() {
        let dx = origin_x + i as i64;
        let dy = origin_y + j as i64;
        if dx < 0 || dy < 0 || dx >= doc_w || dy >= doc_h {
            continue;
        }

        let alpha = (src[3] as f32 / 255.0) * opacity;
        if alpha == 0.0 {
            continue;
        }

        let dst = out.get_pixel_mut(dx as u32, dy as u32);
        for c in 0..3 {
            let s = src[c] as f32 / 255.0;
            let d = dst[c] as f32 / 255.0;
            let blended = blend_mode.apply(s, d);
            let mixed = d + (blended - d) * alpha;
            dst[c] = (mixed * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        let da = dst[3] as f32 / 255.0;
        let out_a = da + (1.0 - da) * alpha;
        dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    Ok(out)
}
