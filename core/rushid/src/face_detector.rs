use image::{DynamicImage, RgbImage};

use crate::geometry::{EyeCenter, FaceBox};

/// Fraction of the face height, from its top, where the eye line is assumed
/// when a detector reports no eye positions.
pub const DEFAULT_EYE_LINE_RATIO: f64 = 0.35;

/// Bounding box of a detected face within an image.
#[derive(Debug, Clone)]
pub struct FaceBounds {
    /// X coordinate of the top-left corner (pixels).
    pub x: f64,
    /// Y coordinate of the top-left corner (pixels).
    pub y: f64,
    /// Width of the bounding box (pixels).
    pub width: f64,
    /// Height of the bounding box (pixels).
    pub height: f64,
    /// Detection confidence score.
    pub confidence: f64,
}

/// Pluggable coarse face detection backend.
///
/// Implement this trait to provide a cascade-style detector (SeetaFace, Haar,
/// ONNX, ...) and wrap it in a [`CascadeStrategy`].
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a row-major grayscale buffer of `width` × `height` bytes.
    fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<FaceBounds>;
}

/// Pluggable dense landmark backend (face mesh).
///
/// Returns every landmark of the first face in pixel coordinates, or `None`
/// when no face was found.
pub trait LandmarkDetector: Send + Sync {
    /// Predict the landmark mesh for the RGB image.
    fn landmarks(&self, rgb: &RgbImage) -> Option<Vec<(f64, f64)>>;
}

/// A face location produced by one detection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Face rectangle driving the crop geometry.
    pub face_box: FaceBox,
    /// Eye midpoint, kept for diagnostics.
    pub eye_center: EyeCenter,
}

/// Outcome of a single detection strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionResult {
    /// A face was located.
    Found(Detection),
    /// The strategy found nothing; the next strategy in the chain runs.
    NotFound,
}

/// One step of the locator chain.
pub trait DetectionStrategy: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// Try to locate a face in `image`.
    fn detect(&self, image: &DynamicImage) -> DetectionResult;
}

/// Coarse strategy: any [`FaceDetector`], keeping the largest face.
pub struct CascadeStrategy {
    detector: Box<dyn FaceDetector>,
    eye_line_ratio: f64,
}

impl CascadeStrategy {
    /// Wrap a face detector.
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self {
            detector,
            eye_line_ratio: DEFAULT_EYE_LINE_RATIO,
        }
    }

    /// Override where the estimated eye line sits within the face box.
    pub fn eye_line_ratio(mut self, ratio: f64) -> Self {
        self.eye_line_ratio = ratio;
        self
    }
}

/// Pick the largest face by area; ties keep the first reported.
fn largest_face(faces: &[FaceBounds]) -> Option<FaceBox> {
    faces
        .iter()
        .filter_map(|f| {
            FaceBox::new(
                f.x as i64,
                f.y as i64,
                f.width.max(0.0) as u32,
                f.height.max(0.0) as u32,
            )
        })
        .fold(None, |best: Option<FaceBox>, face| match best {
            Some(b) if b.area() >= face.area() => Some(b),
            _ => Some(face),
        })
}

impl DetectionStrategy for CascadeStrategy {
    fn name(&self) -> &str {
        "cascade"
    }

    fn detect(&self, image: &DynamicImage) -> DetectionResult {
        let gray = image::imageops::grayscale(image);
        let faces = self.detector.detect(gray.as_raw(), gray.width(), gray.height());
        log::debug!("cascade detector reported {} face(s)", faces.len());

        match largest_face(&faces) {
            Some(face_box) => DetectionResult::Found(Detection {
                face_box,
                eye_center: EyeCenter {
                    x: face_box.x as f64 + face_box.width as f64 / 2.0,
                    y: face_box.y as f64 + face_box.height as f64 * self.eye_line_ratio,
                },
            }),
            None => DetectionResult::NotFound,
        }
    }
}

/// Corner landmark indices of each eye within a face mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeLandmarks {
    /// Outer and inner corner of the left eye.
    pub left: (usize, usize),
    /// Inner and outer corner of the right eye.
    pub right: (usize, usize),
}

impl Default for EyeLandmarks {
    /// Corner indices of the 468-point MediaPipe face mesh.
    fn default() -> Self {
        Self {
            left: (33, 133),
            right: (362, 263),
        }
    }
}

/// Fine-grained strategy: face box from the extents of a landmark mesh.
pub struct LandmarkStrategy {
    detector: Box<dyn LandmarkDetector>,
    eyes: EyeLandmarks,
}

impl LandmarkStrategy {
    /// Wrap a landmark detector using the default mesh eye indices.
    pub fn new(detector: Box<dyn LandmarkDetector>) -> Self {
        Self {
            detector,
            eyes: EyeLandmarks::default(),
        }
    }

    /// Use different eye-corner indices (for non-MediaPipe meshes).
    pub fn eye_landmarks(mut self, eyes: EyeLandmarks) -> Self {
        self.eyes = eyes;
        self
    }
}

fn mesh_detection(points: &[(f64, f64)], eyes: &EyeLandmarks) -> Option<Detection> {
    let corner = |i: usize| points.get(i).copied();
    let midpoint = |(a, b): (usize, usize)| {
        let (pa, pb) = (corner(a)?, corner(b)?);
        Some(((pa.0 + pb.0) / 2.0, (pa.1 + pb.1) / 2.0))
    };
    let left = midpoint(eyes.left)?;
    let right = midpoint(eyes.right)?;

    let (min_x, max_x, min_y, max_y) = points.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
        |(x0, x1, y0, y1), &(x, y)| (x0.min(x), x1.max(x), y0.min(y), y1.max(y)),
    );
    let face_box = FaceBox::new(
        min_x as i64,
        min_y as i64,
        (max_x - min_x).max(0.0) as u32,
        (max_y - min_y).max(0.0) as u32,
    )?;

    Some(Detection {
        face_box,
        eye_center: EyeCenter {
            x: (left.0 + right.0) / 2.0,
            y: (left.1 + right.1) / 2.0,
        },
    })
}

impl DetectionStrategy for LandmarkStrategy {
    fn name(&self) -> &str {
        "landmarks"
    }

    fn detect(&self, image: &DynamicImage) -> DetectionResult {
        let rgb = image.to_rgb8();
        let Some(points) = self.detector.landmarks(&rgb) else {
            return DetectionResult::NotFound;
        };
        log::debug!("landmark detector returned {} point(s)", points.len());

        match mesh_detection(&points, &self.eyes) {
            Some(detection) => DetectionResult::Found(detection),
            None => {
                log::debug!("landmark mesh unusable (missing eye corners or empty extent)");
                DetectionResult::NotFound
            }
        }
    }
}
