use serde::{Deserialize, Serialize};

use crate::error::RushIdError;

/// Axis-aligned face rectangle in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    /// Left edge (may be negative for landmark meshes that leave the frame).
    pub x: i64,
    /// Top edge.
    pub y: i64,
    /// Width in pixels, always > 0.
    pub width: u32,
    /// Height in pixels, always > 0.
    pub height: u32,
}

impl FaceBox {
    /// Build a face box, rejecting zero-area rectangles.
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Area in square pixels, used to pick the largest of several faces.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Midpoint between the eyes in source-image pixel coordinates.
///
/// Carried through the pipeline for reporting only; the crop math is driven
/// by the [`FaceBox`] alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeCenter {
    /// Horizontal position (pixels).
    pub x: f64,
    /// Vertical position (pixels).
    pub y: f64,
}

/// Crop rectangle `(left, top, right, bottom)` with exclusive right/bottom edges.
///
/// Intermediate boxes may extend past the image; a box accepted as final is
/// square and lies inside `[0, width] × [0, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    /// Left edge (inclusive).
    pub left: i64,
    /// Top edge (inclusive).
    pub top: i64,
    /// Right edge (exclusive).
    pub right: i64,
    /// Bottom edge (exclusive).
    pub bottom: i64,
}

impl CropBox {
    /// Square of side `side` whose centre is as close to `(cx, cy)` as whole pixels allow.
    pub fn square_around(cx: f64, cy: f64, side: i64) -> Self {
        let left = (cx - side as f64 / 2.0).round() as i64;
        let top = (cy - side as f64 / 2.0).round() as i64;
        Self {
            left,
            top,
            right: left + side,
            bottom: top + side,
        }
    }

    /// Horizontal extent.
    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    /// Vertical extent.
    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    /// True when the box is an exact square with positive extent.
    pub fn is_square(&self) -> bool {
        self.width() > 0 && self.width() == self.height()
    }

    /// True when the box lies fully inside a `width × height` image.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.left >= 0
            && self.top >= 0
            && self.right <= width as i64
            && self.bottom <= height as i64
            && self.left < self.right
            && self.top < self.bottom
    }

    /// `(x, y, width, height)` for `crop_imm`. Only meaningful for in-bounds boxes.
    pub fn region(&self) -> (u32, u32, u32, u32) {
        (
            self.left.max(0) as u32,
            self.top.max(0) as u32,
            self.width().max(0) as u32,
            self.height().max(0) as u32,
        )
    }
}

/// Upper bound accepted for [`CropTuning::size_multiplier`].
pub const MAX_SIZE_MULTIPLIER: f64 = 100.0;

/// Upper bound accepted for the magnitude of [`CropTuning::down_shift`].
pub const MAX_DOWN_SHIFT: f64 = 10.0;

/// Tunable constants for the crop geometry engine and the head-ratio refiner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropTuning {
    /// Crop side as a multiple of the face width (`k`). Smaller values make the head larger.
    pub size_multiplier: f64,
    /// Fraction of the face height by which the crop centre sits below the face centre.
    pub down_shift: f64,
    /// Head height, as a percentage of the output side, the refiner aims for.
    pub target_head_percent: f64,
    /// Lower edge of the accepted head-height band.
    pub min_head_percent: f64,
    /// Upper edge of the accepted head-height band.
    pub max_head_percent: f64,
}

impl Default for CropTuning {
    fn default() -> Self {
        Self {
            size_multiplier: 2.2,
            down_shift: 0.40,
            target_head_percent: 65.0,
            min_head_percent: 60.0,
            max_head_percent: 70.0,
        }
    }
}

impl CropTuning {
    /// Reject non-finite or inconsistent values before any pixel work starts.
    pub fn validate(&self) -> Result<(), RushIdError> {
        let values = [
            self.size_multiplier,
            self.down_shift,
            self.target_head_percent,
            self.min_head_percent,
            self.max_head_percent,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(RushIdError::InvalidTuning(
                "all tuning values must be finite".into(),
            ));
        }
        if !(self.size_multiplier > 0.0 && self.size_multiplier <= MAX_SIZE_MULTIPLIER) {
            return Err(RushIdError::InvalidTuning(format!(
                "size multiplier must be within (0, {MAX_SIZE_MULTIPLIER}], got {}",
                self.size_multiplier
            )));
        }
        if self.down_shift.abs() > MAX_DOWN_SHIFT {
            return Err(RushIdError::InvalidTuning(format!(
                "down shift must be within [-{MAX_DOWN_SHIFT}, {MAX_DOWN_SHIFT}], got {}",
                self.down_shift
            )));
        }
        if !(0.0 < self.min_head_percent
            && self.min_head_percent <= self.target_head_percent
            && self.target_head_percent <= self.max_head_percent)
        {
            return Err(RushIdError::InvalidTuning(format!(
                "head band must satisfy 0 < min <= target <= max, got {} / {} / {}",
                self.min_head_percent, self.target_head_percent, self.max_head_percent
            )));
        }
        Ok(())
    }

    /// Whether a measured head-height percentage is inside the accepted band.
    pub fn in_band(&self, percent: f64) -> bool {
        (self.min_head_percent..=self.max_head_percent).contains(&percent)
    }
}

/// How [`plan_crop`] arrived at its final box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The ideal square already fit inside the image.
    Ideal,
    /// The ideal square was slid back into frame without changing size.
    Translated,
    /// The square was larger than the image and was pinned to its edges.
    Shrunk,
    /// Clamping could not produce a square; a centred square of the shorter side was used.
    CenterFallback,
}

/// Output of the crop geometry engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropPlan {
    /// Ideal square before any bounds correction (may extend past the image).
    pub ideal: CropBox,
    /// Final in-bounds square.
    pub crop: CropBox,
    /// Ideal crop centre `(cx, cy)`; the refiner re-crops around it.
    pub center: (f64, f64),
    /// Ideal side length `round(k × faceWidth)`.
    pub side: i64,
    /// Which correction path produced `crop`.
    pub resolution: Resolution,
}

/// Ideal crop centre: face centre, moved down by `down_shift × faceHeight`.
pub fn ideal_center(face: &FaceBox, down_shift: f64) -> (f64, f64) {
    let width = face.width as f64;
    let height = face.height as f64;
    let cx = face.x as f64 + width / 2.0;
    let cy = face.y as f64 + height / 2.0 + height * down_shift;
    (cx, cy)
}

/// Centred square of side `min(width, height)`. Always valid for a non-empty image.
pub fn center_square(width: u32, height: u32) -> CropBox {
    let side = width.min(height) as i64;
    let left = (width as i64 - side) / 2;
    let top = (height as i64 - side) / 2;
    CropBox {
        left,
        top,
        right: left + side,
        bottom: top + side,
    }
}

fn clamp(value: i64, min: i64, max: i64) -> i64 {
    // max-after-min so an inverted range resolves to `min`
    value.min(max).max(min)
}

/// Slide one axis so the overhanging edge sits flush with the boundary,
/// then pin the span to `[0, limit]` if the side exceeds the limit.
fn fit_axis(start: i64, side: i64, limit: i64) -> (i64, i64) {
    let end = start + side;
    let mut shift = 0;
    if start < 0 {
        shift = -start;
    }
    if end > limit {
        shift = limit - end;
    }

    let mut start = clamp(start + shift, 0, limit - side);
    let mut end = start + side;

    // Translation alone cannot help when the square is larger than the image.
    if end > limit {
        end = limit;
        start = end - side;
    }

    let start = clamp(start, 0, limit - 1);
    let end = clamp(end, start + 1, limit);
    (start, end)
}

/// Largest centre offset or side the engine works with for a `width × height`
/// image. Anything further out resolves to the same clamped crop, and edge
/// arithmetic stays far from `i64` overflow.
pub(crate) fn edge_reach(width: u32, height: u32) -> f64 {
    4.0 * (width as f64 + height as f64)
}

/// Compute the final square crop for `face` inside a `width × height` image.
///
/// Bounds correction translates before it shrinks; whenever the result is not
/// an exact positive square the engine falls back to [`center_square`], so
/// this function never fails.
pub fn plan_crop(face: &FaceBox, width: u32, height: u32, tuning: &CropTuning) -> CropPlan {
    let reach = edge_reach(width, height);
    let (cx, cy) = ideal_center(face, tuning.down_shift);
    let (cx, cy) = (cx.clamp(-reach, reach), cy.clamp(-reach, reach));
    let side = (tuning.size_multiplier * face.width as f64)
        .round()
        .min(reach) as i64;
    let ideal = CropBox::square_around(cx, cy, side);

    let fallback = |ideal| CropPlan {
        ideal,
        crop: center_square(width, height),
        center: (cx, cy),
        side,
        resolution: Resolution::CenterFallback,
    };

    if side <= 0 {
        log::warn!("degenerate crop side {side} for face {face:?}; using centre square");
        return fallback(ideal);
    }

    let (left, right) = fit_axis(ideal.left, side, width as i64);
    let (top, bottom) = fit_axis(ideal.top, side, height as i64);
    let crop = CropBox {
        left,
        top,
        right,
        bottom,
    };

    if !crop.is_square() || !crop.is_within(width, height) {
        log::warn!(
            "crop {crop:?} is not a square inside {width}x{height} after clamping; using centre square"
        );
        return fallback(ideal);
    }

    let resolution = if crop == ideal {
        Resolution::Ideal
    } else if crop.width() == side {
        Resolution::Translated
    } else {
        Resolution::Shrunk
    };

    CropPlan {
        ideal,
        crop,
        center: (cx, cy),
        side,
        resolution,
    }
}

/// Distance from the crop top to the face top, as a percentage of the crop side.
pub fn top_margin_percent(face: &FaceBox, crop: &CropBox) -> f64 {
    (face.y - crop.top) as f64 / crop.height() as f64 * 100.0
}
