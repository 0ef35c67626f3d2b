use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::RushIdError;
use crate::face_detector::{FaceBounds, FaceDetector};

/// Smallest face, in pixels, the cascade will report. Matches the 60px floor
/// used for portrait inputs.
const MIN_FACE_SIZE: u32 = 60;

/// Face detector backed by the `rustface` crate (SeetaFace funnel cascade).
///
/// The model (`seeta_fd_frontal_v1.0.bin`) is loaded from disk once; a fresh
/// detector is created from it on every call.
pub struct RustfaceDetector {
    model: rustface::Model,
    min_face_size: u32,
}

impl RustfaceDetector {
    /// Load a SeetaFace model file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RushIdError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| RushIdError::ModelLoad(format!("{}: {e}", path.display())))?;
        let model = rustface::read_model(BufReader::new(file))
            .map_err(|e| RushIdError::ModelLoad(format!("{}: {e}", path.display())))?;
        log::debug!("loaded SeetaFace model from {}", path.display());
        Ok(Self {
            model,
            min_face_size: MIN_FACE_SIZE,
        })
    }

    /// Override the minimum face size (clamped to the cascade's 20px floor).
    pub fn min_face_size(mut self, pixels: u32) -> Self {
        self.min_face_size = pixels.max(20);
        self
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<FaceBounds> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(gray, width, height));

        faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBounds {
                    x: bbox.x() as f64,
                    y: bbox.y() as f64,
                    width: bbox.width() as f64,
                    height: bbox.height() as f64,
                    confidence: face.score(),
                }
            })
            .collect()
    }
}
