//! Square, head-centred identification photos from background-removed portraits.
//!
//! A face is located (detector strategies first, then the bounding box of
//! non-white content), a square crop is planned around it with a fixed size
//! multiplier and downward shift, the head height is corrected once if it
//! falls outside the target band, and the crop is composited onto white and
//! resized to the output size.
//!
//! # Example
//!
//! ```no_run
//! use rushid::IdCropper;
//!
//! let photo = IdCropper::open("portrait.png")
//!     .unwrap()
//!     .output_size(600)
//!     .write_to("id.jpg")
//!     .unwrap();
//! println!("head height {:.1}%", photo.report.head_height_percent().unwrap_or(0.0));
//! ```
#![warn(missing_docs)]

mod artifact;
mod compose;
mod error;
/// Face detection traits, detection results and the detector strategies.
pub mod face_detector;
/// Crop geometry engine: face/crop types and bounds correction.
pub mod geometry;
/// Locator chain and content-based fallbacks.
pub mod locate;
/// Single-pass head-height correction.
pub mod refine;
#[cfg(feature = "rustface")]
/// SeetaFace-based face detector backend.
pub mod rustface_backend;

use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Temporary-artifact integrity record and digest helper.
pub use artifact::{sha256_hex, ArtifactRecord};
/// Encoded output format.
pub use compose::OutputFormat;
/// Error type returned by rushid operations.
pub use error::RushIdError;
/// Detector seams and strategies.
pub use face_detector::{
    CascadeStrategy, Detection, DetectionResult, DetectionStrategy, FaceBounds, FaceDetector,
    LandmarkDetector, LandmarkStrategy,
};
/// Geometry types and tuning.
pub use geometry::{CropBox, CropPlan, CropTuning, EyeCenter, FaceBox, Resolution};
/// Locator chain types.
pub use locate::{Located, LocatorChain, LocatorTuning};
/// Refiner output.
pub use refine::Refinement;
#[cfg(feature = "rustface")]
/// Built-in detector that loads a SeetaFace model file.
pub use rustface_backend::RustfaceDetector;

use geometry::{plan_crop, top_margin_percent};
use locate::blank_crop;
use refine::refine;

/// Default output side length in pixels.
pub const DEFAULT_OUTPUT_SIZE: u32 = 600;

/// Default JPEG quality (0.0–1.0).
pub const DEFAULT_QUALITY: f32 = 0.95;

/// Options for a single crop invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropOptions {
    /// Output side length in pixels.
    pub output_size: u32,
    /// Keep the source alpha channel (forces PNG output).
    pub preserve_alpha: bool,
    /// JPEG quality from 0.0 to 1.0.
    pub quality: f32,
    /// Output format; inferred from the destination extension when `None`.
    pub format: Option<OutputFormat>,
    /// Also write a kept temporary copy and return its [`ArtifactRecord`].
    pub write_artifact: bool,
    /// Crop geometry and refiner constants.
    pub tuning: CropTuning,
    /// Content-fallback constants.
    pub locator: LocatorTuning,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self {
            output_size: DEFAULT_OUTPUT_SIZE,
            preserve_alpha: false,
            quality: DEFAULT_QUALITY,
            format: None,
            write_artifact: false,
            tuning: CropTuning::default(),
            locator: LocatorTuning::default(),
        }
    }
}

impl CropOptions {
    /// Check every option before any pixel work starts.
    pub fn validate(&self) -> Result<(), RushIdError> {
        if self.output_size == 0 {
            return Err(RushIdError::InvalidOutputSize);
        }
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(RushIdError::InvalidQuality(self.quality));
        }
        self.tuning.validate()?;
        self.locator.validate()
    }
}

/// Which path through the pipeline produced the output.
#[derive(Debug, Clone, PartialEq)]
pub enum CropPath {
    /// A face (or content box) was located and the geometry engine ran.
    Face {
        /// Strategy that located the face.
        source: String,
        /// Face box and eye centre.
        detection: Detection,
        /// Geometry engine output.
        plan: CropPlan,
        /// Refiner output.
        refinement: Refinement,
    },
    /// No content at all: fixed-ratio centre crop, geometry and refiner bypassed.
    Blank,
}

/// Diagnostics for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CropReport {
    /// Source image width.
    pub source_width: u32,
    /// Source image height.
    pub source_height: u32,
    /// How the crop was obtained.
    pub path: CropPath,
    /// Square crop actually resized into the output.
    pub final_crop: CropBox,
}

impl CropReport {
    /// Final head-height percent, when a face drove the crop.
    pub fn head_height_percent(&self) -> Option<f64> {
        match &self.path {
            CropPath::Face { refinement, .. } => Some(refinement.final_percent),
            CropPath::Blank => None,
        }
    }
}

/// Result of a crop invocation.
#[derive(Debug, Clone)]
pub struct CroppedPhoto {
    /// Encoded image bytes.
    pub data: Vec<u8>,
    /// Format of `data`.
    pub format: OutputFormat,
    /// Output width in pixels (equals the configured size).
    pub width: u32,
    /// Output height in pixels (equals the configured size).
    pub height: u32,
    /// Decoded output pixels.
    pub image: DynamicImage,
    /// How the crop was chosen.
    pub report: CropReport,
    /// Temporary copy record, when requested.
    pub artifact: Option<ArtifactRecord>,
}

/// Builder for cropping one portrait into an ID photo.
///
/// Decodes the input on construction, then locates the face, plans and
/// refines the crop, and encodes the result.
pub struct IdCropper {
    image: DynamicImage,
    options: CropOptions,
    chain: LocatorChain,
}

impl IdCropper {
    /// Create a cropper from encoded image bytes (PNG, JPEG or WebP).
    pub fn new(input: &[u8]) -> Result<Self, RushIdError> {
        let image = compose::decode_image(input)?;
        let options = CropOptions::default();
        Ok(Self {
            image,
            chain: LocatorChain::new(Vec::new(), options.locator),
            options,
        })
    }

    /// Read and decode an image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RushIdError> {
        let path = path.as_ref();
        log::debug!("reading input: {}", path.display());
        let bytes = std::fs::read(path)
            .map_err(|e| RushIdError::InputReadError(format!("{}: {e}", path.display())))?;
        Self::new(&bytes)
    }

    /// Replace all options at once. Strategies added with [`Self::strategy`] are kept.
    pub fn options(mut self, options: CropOptions) -> Self {
        self.chain.set_tuning(options.locator);
        self.options = options;
        self
    }

    /// Set the output side length in pixels (default: 600).
    pub fn output_size(mut self, size: u32) -> Self {
        self.options.output_size = size;
        self
    }

    /// Keep the alpha channel of 4-channel sources (default: false).
    pub fn preserve_alpha(mut self, enable: bool) -> Self {
        self.options.preserve_alpha = enable;
        self
    }

    /// Set the JPEG quality from 0.0 to 1.0 (default: 0.95).
    pub fn quality(mut self, quality: f32) -> Self {
        self.options.quality = quality;
        self
    }

    /// Force an output format instead of inferring it from the destination.
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.options.format = Some(format);
        self
    }

    /// Request a kept temporary copy plus [`ArtifactRecord`] (default: false).
    pub fn write_artifact(mut self, enable: bool) -> Self {
        self.options.write_artifact = enable;
        self
    }

    /// Override the crop geometry and refiner constants.
    pub fn tuning(mut self, tuning: CropTuning) -> Self {
        self.options.tuning = tuning;
        self
    }

    /// Override the content-fallback constants.
    pub fn locator_tuning(mut self, tuning: LocatorTuning) -> Self {
        self.chain.set_tuning(tuning);
        self.options.locator = tuning;
        self
    }

    /// Append a detection strategy. Strategies run in the order they were added,
    /// before the content fallback.
    ///
    /// ```no_run
    /// use rushid::{CascadeStrategy, FaceBounds, FaceDetector, IdCropper};
    ///
    /// struct MyDetector;
    /// impl FaceDetector for MyDetector {
    ///     fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<FaceBounds> {
    ///         vec![]
    ///     }
    /// }
    ///
    /// let photo = IdCropper::open("portrait.png").unwrap()
    ///     .strategy(Box::new(CascadeStrategy::new(Box::new(MyDetector))))
    ///     .process().unwrap();
    /// ```
    pub fn strategy(mut self, strategy: Box<dyn DetectionStrategy>) -> Self {
        self.chain.push(strategy);
        self
    }

    /// Crop and encode in memory. Uses the configured format, or JPEG.
    pub fn process(&self) -> Result<CroppedPhoto, RushIdError> {
        let requested = self.options.format.unwrap_or_default();
        self.run(requested)
    }

    /// Crop, encode and write to `destination`.
    ///
    /// The format comes from the options, or else from the destination
    /// extension. With `write_artifact` the encoded bytes are also written to
    /// a kept temporary file first and described in [`CroppedPhoto::artifact`].
    pub fn write_to(&self, destination: impl AsRef<Path>) -> Result<CroppedPhoto, RushIdError> {
        let destination = destination.as_ref();
        let requested = self
            .options
            .format
            .unwrap_or_else(|| OutputFormat::from_path(destination));
        let mut photo = self.run(requested)?;

        if self.options.write_artifact {
            photo.artifact = Some(artifact::write_temp_artifact(&photo.data, photo.format)?);
        }
        artifact::write_output(destination, &photo.data)?;
        Ok(photo)
    }

    fn run(&self, requested: OutputFormat) -> Result<CroppedPhoto, RushIdError> {
        self.options.validate()?;

        let image = &self.image;
        let (width, height) = (image.width(), image.height());
        let size = self.options.output_size;
        let tuning = &self.options.tuning;
        log::debug!(
            "input {width}x{height}, {:?}, alpha: {}",
            image.color(),
            image.color().has_alpha()
        );

        let (final_crop, path) = match self.chain.locate(image) {
            Located::Face { detection, source } => {
                let face = detection.face_box;
                let plan = plan_crop(&face, width, height, tuning);
                log::debug!(
                    "face {face:?} via {source}; ideal {:?} -> {:?} ({:?})",
                    plan.ideal,
                    plan.crop,
                    plan.resolution
                );
                let refinement = refine(&face, &plan, width, height, size, tuning);
                log::debug!(
                    "crop {:?}, head height {:.1}% (target {}%), top margin {:.1}%",
                    refinement.crop,
                    refinement.final_percent,
                    tuning.target_head_percent,
                    top_margin_percent(&face, &refinement.crop)
                );
                (
                    refinement.crop,
                    CropPath::Face {
                        source,
                        detection,
                        plan,
                        refinement,
                    },
                )
            }
            Located::Blank => {
                let crop = blank_crop(width, height, self.options.locator.blank_crop_ratio);
                log::warn!("no content pixels found; using centre crop {crop:?}");
                (crop, CropPath::Blank)
            }
        };

        let rendered = compose::render(image, &final_crop, size, self.options.preserve_alpha)?;
        let format = if rendered.color().has_alpha() && requested != OutputFormat::Png {
            log::info!("alpha preserved; writing PNG instead of {requested:?}");
            OutputFormat::Png
        } else {
            requested
        };
        let data = compose::encode_image(&rendered, format, self.options.quality)?;

        Ok(CroppedPhoto {
            data,
            format,
            width: rendered.width(),
            height: rendered.height(),
            image: rendered,
            report: CropReport {
                source_width: width,
                source_height: height,
                path,
                final_crop,
            },
            artifact: None,
        })
    }
}

/// Crop `source` into a square ID photo at `destination`.
///
/// Only the content-based fallbacks are used for locating the face; add
/// detector strategies through [`IdCropper::strategy`] for real detection.
pub fn crop(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    options: &CropOptions,
) -> Result<CroppedPhoto, RushIdError> {
    IdCropper::open(source)?
        .options(options.clone())
        .write_to(destination)
}
