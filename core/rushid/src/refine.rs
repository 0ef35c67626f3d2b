//! Single-pass head-size correction applied after the geometry engine.
//!
//! The refiner measures how tall the face will be in the resized output and,
//! when that falls outside the tuning band, re-crops exactly once with a
//! multiplier scaled by `measured / target`. A second measurement that is
//! still out of band is reported but never corrected again.

use crate::geometry::{edge_reach, CropBox, CropPlan, CropTuning, FaceBox};

/// Result of the head-ratio refinement step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Refinement {
    /// Crop to hand to the compositor.
    pub crop: CropBox,
    /// Head-height percent measured on the geometry engine's crop.
    pub initial_percent: f64,
    /// Head-height percent measured on `crop`.
    pub final_percent: f64,
    /// The corrective multiplier, when a re-crop happened.
    pub corrected_multiplier: Option<f64>,
}

impl Refinement {
    /// True when the corrective pass ran.
    pub fn corrected(&self) -> bool {
        self.corrected_multiplier.is_some()
    }
}

/// Face height rescaled into a `output_size`-pixel square, as a percentage of that square.
pub fn head_height_percent(face_height: u32, crop_side: i64, output_size: u32) -> f64 {
    let size = output_size as f64;
    let head = face_height as f64 * (size / crop_side as f64);
    head / size * 100.0
}

fn clamp(value: i64, min: i64, max: i64) -> i64 {
    value.min(max).max(min)
}

/// Clamp each edge into the image independently, without translating first.
fn clamp_edges(crop: CropBox, width: u32, height: u32) -> CropBox {
    let (w, h) = (width as i64, height as i64);
    let left = clamp(crop.left, 0, w - 1);
    let right = clamp(crop.right, left + 1, w);
    let top = clamp(crop.top, 0, h - 1);
    let bottom = clamp(crop.bottom, top + 1, h);
    CropBox {
        left,
        top,
        right,
        bottom,
    }
}

/// Trim the longer axis of a clamped box to the shorter one, centred on `center`
/// and kept inside the clamped span.
fn square_up(crop: CropBox, center: (f64, f64)) -> CropBox {
    let side = crop.width().min(crop.height());
    let trim = |lo: i64, hi: i64, c: f64| {
        let start = (c - side as f64 / 2.0).round() as i64;
        let start = clamp(start, lo, hi - side);
        (start, start + side)
    };

    if crop.width() > side {
        let (left, right) = trim(crop.left, crop.right, center.0);
        CropBox {
            left,
            right,
            ..crop
        }
    } else if crop.height() > side {
        let (top, bottom) = trim(crop.top, crop.bottom, center.1);
        CropBox {
            top,
            bottom,
            ..crop
        }
    } else {
        crop
    }
}

/// Measure the head-height percent of `plan.crop` and correct it at most once.
pub fn refine(
    face: &FaceBox,
    plan: &CropPlan,
    width: u32,
    height: u32,
    output_size: u32,
    tuning: &CropTuning,
) -> Refinement {
    let initial_percent = head_height_percent(face.height, plan.crop.height(), output_size);

    if tuning.in_band(initial_percent) {
        log::debug!("head height {initial_percent:.1}% is within band; no correction");
        return Refinement {
            crop: plan.crop,
            initial_percent,
            final_percent: initial_percent,
            corrected_multiplier: None,
        };
    }

    let multiplier = tuning.size_multiplier * (initial_percent / tuning.target_head_percent);
    let side = (multiplier * face.width as f64)
        .round()
        .min(edge_reach(width, height)) as i64;
    let (cx, cy) = plan.center;
    let clamped = clamp_edges(CropBox::square_around(cx, cy, side), width, height);
    let crop = square_up(clamped, plan.center);
    let final_percent = head_height_percent(face.height, crop.height(), output_size);

    log::debug!(
        "head height {initial_percent:.1}% outside [{}, {}]; re-cropped with k={multiplier:.2} to {final_percent:.1}%",
        tuning.min_head_percent,
        tuning.max_head_percent
    );
    if !tuning.in_band(final_percent) {
        log::info!(
            "head height still {final_percent:.1}% after one correction; accepting residual"
        );
    }

    Refinement {
        crop,
        initial_percent,
        final_percent,
        corrected_multiplier: Some(multiplier),
    }
}
