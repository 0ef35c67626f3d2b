//! Ordered face-location chain with content-based fallbacks.
//!
//! Detector strategies run in priority order and the first `Found` wins.
//! When none succeed, the bounding box of non-near-white pixels stands in
//! for the face; an image with no such pixels is reported as blank.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::RushIdError;
use crate::face_detector::{Detection, DetectionResult, DetectionStrategy};
use crate::geometry::{CropBox, EyeCenter, FaceBox};

/// Constants for the content-based fallbacks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorTuning {
    /// A pixel is content when any colour channel is below this value.
    pub near_white_threshold: u8,
    /// Synthetic eye line, as a fraction of the content box height from its top.
    pub eye_line_ratio: f64,
    /// Side of the blank-image crop as a fraction of the shorter image side.
    pub blank_crop_ratio: f64,
}

impl LocatorTuning {
    /// Reject ratios that would place the synthetic eye line or the blank crop outside the image.
    pub fn validate(&self) -> Result<(), RushIdError> {
        if !(self.eye_line_ratio.is_finite() && (0.0..=1.0).contains(&self.eye_line_ratio)) {
            return Err(RushIdError::InvalidTuning(format!(
                "eye line ratio must be within [0, 1], got {}",
                self.eye_line_ratio
            )));
        }
        if !(self.blank_crop_ratio.is_finite()
            && self.blank_crop_ratio > 0.0
            && self.blank_crop_ratio <= 1.0)
        {
            return Err(RushIdError::InvalidTuning(format!(
                "blank crop ratio must be within (0, 1], got {}",
                self.blank_crop_ratio
            )));
        }
        Ok(())
    }
}

impl Default for LocatorTuning {
    fn default() -> Self {
        Self {
            near_white_threshold: 250,
            eye_line_ratio: 0.35,
            blank_crop_ratio: 0.80,
        }
    }
}

/// Tight bounding box of content pixels, ignoring alpha.
pub fn content_bounds(image: &DynamicImage, threshold: u8) -> Option<FaceBox> {
    let rgb = image.to_rgb8();
    let mut extent: Option<(u32, u32, u32, u32)> = None;

    for (x, y, pixel) in rgb.enumerate_pixels() {
        if !pixel.0.iter().any(|&c| c < threshold) {
            continue;
        }
        extent = Some(match extent {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    let (x0, y0, x1, y1) = extent?;
    FaceBox::new(x0 as i64, y0 as i64, x1 - x0 + 1, y1 - y0 + 1)
}

/// Fallback strategy: treat the content bounding box as the face.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentStrategy {
    tuning: LocatorTuning,
}

impl ContentStrategy {
    /// Content fallback with the given thresholds.
    pub fn new(tuning: LocatorTuning) -> Self {
        Self { tuning }
    }
}

impl DetectionStrategy for ContentStrategy {
    fn name(&self) -> &str {
        "content"
    }

    fn detect(&self, image: &DynamicImage) -> DetectionResult {
        match content_bounds(image, self.tuning.near_white_threshold) {
            Some(face_box) => DetectionResult::Found(Detection {
                face_box,
                eye_center: EyeCenter {
                    x: face_box.x as f64 + face_box.width as f64 / 2.0,
                    y: face_box.y as f64 + face_box.height as f64 * self.tuning.eye_line_ratio,
                },
            }),
            None => DetectionResult::NotFound,
        }
    }
}

/// Outcome of running the whole chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Located {
    /// A strategy found a face (or a content box).
    Face {
        /// The winning detection.
        detection: Detection,
        /// Name of the strategy that produced it.
        source: String,
    },
    /// No strategy found anything, not even content pixels.
    Blank,
}

/// Detector strategies in priority order, terminated by the content fallback.
pub struct LocatorChain {
    strategies: Vec<Box<dyn DetectionStrategy>>,
    content: ContentStrategy,
}

impl LocatorChain {
    /// Build a chain; `strategies` run first, in order.
    pub fn new(strategies: Vec<Box<dyn DetectionStrategy>>, tuning: LocatorTuning) -> Self {
        Self {
            strategies,
            content: ContentStrategy::new(tuning),
        }
    }

    /// Append a strategy after the existing ones (still ahead of the content fallback).
    pub fn push(&mut self, strategy: Box<dyn DetectionStrategy>) {
        self.strategies.push(strategy);
    }

    /// Replace the content-fallback thresholds.
    pub fn set_tuning(&mut self, tuning: LocatorTuning) {
        self.content = ContentStrategy::new(tuning);
    }

    /// Names of the detector strategies, in the order they run.
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run strategies until one succeeds.
    pub fn locate(&self, image: &DynamicImage) -> Located {
        for strategy in &self.strategies {
            if let Some(located) = try_strategy(strategy.as_ref(), image) {
                return located;
            }
        }
        try_strategy(&self.content, image).unwrap_or(Located::Blank)
    }
}

fn try_strategy(strategy: &dyn DetectionStrategy, image: &DynamicImage) -> Option<Located> {
    match strategy.detect(image) {
        DetectionResult::Found(detection) => {
            log::debug!(
                "{} strategy located face {:?}",
                strategy.name(),
                detection.face_box
            );
            Some(Located::Face {
                detection,
                source: strategy.name().to_string(),
            })
        }
        DetectionResult::NotFound => {
            log::debug!("{} strategy found nothing", strategy.name());
            None
        }
    }
}

/// Centred square of `ratio × min(width, height)` used for blank images.
pub fn blank_crop(width: u32, height: u32, ratio: f64) -> CropBox {
    let side = ((width.min(height) as f64 * ratio) as i64).max(1);
    let left = (width as f64 / 2.0 - side as f64 / 2.0) as i64;
    let top = (height as f64 / 2.0 - side as f64 / 2.0) as i64;
    CropBox {
        left,
        top,
        right: left + side,
        bottom: top + side,
    }
}
