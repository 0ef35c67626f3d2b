use std::path::Path;

use image::{DynamicImage, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use rushid::{
    crop, sha256_hex, CascadeStrategy, CropBox, CropOptions, CropPath, CropTuning, FaceBounds,
    FaceDetector, IdCropper, LandmarkDetector, LandmarkStrategy, OutputFormat, Resolution,
    RushIdError,
};
use tempfile::tempdir;

fn write_png(path: &Path, image: &DynamicImage) {
    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(
            image.as_bytes(),
            image.width(),
            image.height(),
            image.color().into(),
        )
        .unwrap();
    std::fs::write(path, buffer).unwrap();
}

/// White RGB canvas with a dark block standing in for the subject.
fn subject(width: u32, height: u32, block: (u32, u32, u32, u32)) -> DynamicImage {
    let (bx, by, bw, bh) = block;
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        if (bx..bx + bw).contains(&x) && (by..by + bh).contains(&y) {
            Rgb([70, 50, 40])
        } else {
            Rgb([255, 255, 255])
        }
    }))
}

/// Mock cascade detector for integration tests.
struct MockDetector {
    faces: Vec<FaceBounds>,
}

impl MockDetector {
    fn with_faces(faces: &[(f64, f64, f64, f64)]) -> Self {
        Self {
            faces: faces
                .iter()
                .map(|&(x, y, width, height)| FaceBounds {
                    x,
                    y,
                    width,
                    height,
                    confidence: 10.0,
                })
                .collect(),
        }
    }
}

impl FaceDetector for MockDetector {
    fn detect(&self, _gray: &[u8], _width: u32, _height: u32) -> Vec<FaceBounds> {
        self.faces.clone()
    }
}

struct NoMesh;

impl LandmarkDetector for NoMesh {
    fn landmarks(&self, _rgb: &RgbImage) -> Option<Vec<(f64, f64)>> {
        None
    }
}

fn cascade(faces: &[(f64, f64, f64, f64)]) -> Box<CascadeStrategy> {
    Box::new(CascadeStrategy::new(Box::new(MockDetector::with_faces(faces))))
}

#[test]
fn crop_writes_square_jpeg_of_default_size() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("portrait.png");
    let output = dir.path().join("out/id.jpg");
    write_png(&input, &subject(900, 1200, (350, 300, 200, 260)));

    let photo = crop(&input, &output, &CropOptions::default()).unwrap();

    assert_eq!((photo.width, photo.height), (600, 600));
    assert_eq!(photo.format, OutputFormat::Jpeg);
    let written = std::fs::read(&output).unwrap();
    assert_eq!(written, photo.data);
    assert_eq!(&written[0..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(&written).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (600, 600));
}

#[test]
fn unreadable_source_is_the_only_surfaced_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("broken.png");
    std::fs::write(&input, b"definitely not a png").unwrap();
    let result = crop(&input, dir.path().join("out.jpg"), &CropOptions::default());
    assert!(matches!(result, Err(RushIdError::InputReadError(_))));
    assert!(!dir.path().join("out.jpg").exists());
}

#[test]
fn blank_input_uses_centre_crop_and_still_writes_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("blank.png");
    let output = dir.path().join("blank.jpg");
    write_png(
        &input,
        &DynamicImage::ImageRgb8(RgbImage::from_pixel(500, 500, Rgb([255, 255, 255]))),
    );

    let photo = IdCropper::open(&input)
        .unwrap()
        .strategy(cascade(&[]))
        .write_to(&output)
        .unwrap();

    assert_eq!(photo.report.path, CropPath::Blank);
    assert_eq!(
        photo.report.final_crop,
        CropBox {
            left: 50,
            top: 50,
            right: 450,
            bottom: 450
        }
    );
    assert_eq!((photo.width, photo.height), (600, 600));
    assert!(output.exists());
}

#[test]
fn tiny_blank_image_is_still_total() {
    let photo = IdCropper::new(&encode(&DynamicImage::ImageRgb8(RgbImage::from_pixel(
        1,
        1,
        Rgb([255, 255, 255]),
    ))))
    .unwrap()
    .output_size(16)
    .process()
    .unwrap();
    assert_eq!((photo.width, photo.height), (16, 16));
}

fn encode(image: &DynamicImage) -> Vec<u8> {
    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(
            image.as_bytes(),
            image.width(),
            image.height(),
            image.color().into(),
        )
        .unwrap();
    buffer
}

#[test]
fn largest_detected_face_drives_the_crop() {
    let png = encode(&subject(1000, 1000, (0, 0, 5, 5)));
    let photo = IdCropper::new(&png)
        .unwrap()
        .strategy(cascade(&[(600.0, 600.0, 50.0, 50.0), (100.0, 100.0, 200.0, 200.0)]))
        .output_size(100)
        .process()
        .unwrap();

    let CropPath::Face {
        source,
        detection,
        plan,
        ..
    } = &photo.report.path
    else {
        panic!("expected a face path");
    };
    assert_eq!(source, "cascade");
    assert_eq!(detection.face_box.width, 200);
    assert_eq!(plan.center, (200.0, 280.0));
    assert_eq!(plan.side, 440);
    assert_eq!(plan.resolution, Resolution::Translated);
}

#[test]
fn landmark_strategy_falls_through_to_cascade() {
    let png = encode(&subject(800, 800, (0, 0, 5, 5)));
    let photo = IdCropper::new(&png)
        .unwrap()
        .strategy(Box::new(LandmarkStrategy::new(Box::new(NoMesh))))
        .strategy(cascade(&[(0.0, 0.0, 150.0, 150.0)]))
        .output_size(64)
        .process()
        .unwrap();

    let CropPath::Face { source, plan, .. } = &photo.report.path else {
        panic!("expected a face path");
    };
    assert_eq!(source, "cascade");
    assert_eq!(
        plan.crop,
        CropBox {
            left: 0,
            top: 0,
            right: 330,
            bottom: 330
        }
    );
}

#[test]
fn refiner_runs_at_most_once() {
    // 100px face in a 120px image: the correction is clamped and stays out of band.
    let png = encode(&subject(120, 120, (10, 10, 100, 100)));
    let tuning = CropTuning {
        size_multiplier: 1.0,
        ..CropTuning::default()
    };
    let photo = IdCropper::new(&png)
        .unwrap()
        .tuning(tuning)
        .output_size(60)
        .process()
        .unwrap();

    let CropPath::Face { refinement, .. } = &photo.report.path else {
        panic!("expected a face path");
    };
    assert!(refinement.corrected());
    assert!(!tuning.in_band(refinement.final_percent));
    assert_eq!(photo.report.final_crop, refinement.crop);
    assert!(photo.report.final_crop.is_square());
}

#[test]
fn head_height_lands_in_band_for_typical_face() {
    let png = encode(&subject(1200, 1600, (500, 500, 200, 200)));
    let photo = IdCropper::new(&png)
        .unwrap()
        .output_size(300)
        .process()
        .unwrap();
    let percent = photo.report.head_height_percent().unwrap();
    assert!((60.0..=70.0).contains(&percent), "head height {percent}");
}

#[test]
fn final_crop_is_always_an_in_bounds_square() {
    let cases = [
        (640, 480, (0, 0, 80, 120)),
        (480, 640, (400, 560, 80, 80)),
        (300, 1000, (20, 400, 260, 300)),
        (1000, 300, (10, 10, 980, 280)),
        (50, 50, (20, 20, 5, 5)),
    ];
    for (w, h, block) in cases {
        let photo = IdCropper::new(&encode(&subject(w, h, block)))
            .unwrap()
            .output_size(32)
            .process()
            .unwrap();
        let crop = photo.report.final_crop;
        assert!(crop.is_square(), "{w}x{h} {block:?}: {crop:?}");
        assert!(crop.is_within(w, h), "{w}x{h} {block:?}: {crop:?}");
        assert_eq!((photo.width, photo.height), (32, 32));
    }
}

#[test]
fn half_transparent_dark_pixels_composite_over_white() {
    // Uniform image so the area filter cannot change the composited value.
    let rgba = RgbaImage::from_pixel(64, 64, Rgba([40, 40, 40, 128]));
    let photo = IdCropper::new(&encode(&DynamicImage::ImageRgba8(rgba)))
        .unwrap()
        .output_size(32)
        .format(OutputFormat::Png)
        .process()
        .unwrap();

    let rgb = photo.image.to_rgb8();
    let expected = (40.0f32 * (128.0 / 255.0) + 255.0 * (127.0 / 255.0)).round() as u8;
    assert!(rgb.pixels().all(|p| p.0 == [expected; 3]));

    let decoded = image::load_from_memory(&photo.data).unwrap().to_rgb8();
    assert_eq!(decoded.get_pixel(0, 0).0, [expected; 3]);
}

#[test]
fn preserve_alpha_writes_png_even_for_jpg_destination() {
    let dir = tempdir().unwrap();
    let mut rgba = RgbaImage::from_pixel(300, 300, Rgba([0, 0, 0, 0]));
    for y in 100..200 {
        for x in 100..180 {
            rgba.put_pixel(x, y, Rgba([30, 30, 30, 255]));
        }
    }
    let output = dir.path().join("keep.jpg");
    let photo = IdCropper::new(&encode(&DynamicImage::ImageRgba8(rgba)))
        .unwrap()
        .strategy(cascade(&[(100.0, 100.0, 80.0, 100.0)]))
        .preserve_alpha(true)
        .output_size(90)
        .write_to(&output)
        .unwrap();

    assert_eq!(photo.format, OutputFormat::Png);
    let decoded = image::load_from_memory(&std::fs::read(&output).unwrap()).unwrap();
    assert!(decoded.color().has_alpha());
    assert_eq!((decoded.width(), decoded.height()), (90, 90));
}

#[test]
fn artifact_record_hashes_encoded_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("portrait.png");
    let output = dir.path().join("id.jpg");
    write_png(&input, &subject(600, 800, (220, 200, 160, 200)));

    let options = CropOptions {
        output_size: 200,
        write_artifact: true,
        ..CropOptions::default()
    };
    let photo = crop(&input, &output, &options).unwrap();
    let record = photo.artifact.expect("artifact requested");

    let temp_bytes = std::fs::read(&record.out_path).unwrap();
    assert_eq!(temp_bytes, photo.data);
    assert_eq!(record.bytes, photo.data.len());
    assert_eq!(record.sha256, sha256_hex(&std::fs::read(&output).unwrap()));
    std::fs::remove_file(&record.out_path).unwrap();
}

#[test]
fn png_destination_selects_png() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("portrait.png");
    let output = dir.path().join("id.png");
    write_png(&input, &subject(400, 400, (150, 120, 100, 110)));

    let photo = crop(&input, &output, &CropOptions::default()).unwrap();
    assert_eq!(photo.format, OutputFormat::Png);
    assert_eq!(&std::fs::read(&output).unwrap()[1..4], b"PNG");
}
