//! Print how a portrait would be cropped, without writing anything.
//!
//! Usage:
//!   cargo run --example inspect_crop -- portrait.png [model.bin]
//!
//! Passing a SeetaFace model enables the cascade detector (requires the
//! `rustface` feature); otherwise only the content fallback runs.

use rushid::{CropPath, IdCropper};

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(input) = args.next() else {
        eprintln!("usage: inspect_crop <portrait> [model]");
        std::process::exit(2);
    };

    #[cfg_attr(not(feature = "rustface"), allow(unused_mut))]
    let mut cropper = IdCropper::open(&input).expect("failed to read input");

    #[cfg(feature = "rustface")]
    if let Some(model) = args.next() {
        let detector = rushid::RustfaceDetector::from_path(&model).expect("failed to load model");
        cropper = cropper.strategy(Box::new(rushid::CascadeStrategy::new(Box::new(detector))));
    }

    let photo = cropper.process().expect("crop failed");
    let report = &photo.report;
    println!(
        "=== {input} ({}x{}) ===",
        report.source_width, report.source_height
    );

    match &report.path {
        CropPath::Face {
            source,
            detection,
            plan,
            refinement,
        } => {
            let face = detection.face_box;
            println!(
                "  face via {source}: ({}, {}, {}x{}), eyes at ({:.1}, {:.1})",
                face.x,
                face.y,
                face.width,
                face.height,
                detection.eye_center.x,
                detection.eye_center.y
            );
            println!("  ideal crop:  {:?} (side {})", plan.ideal, plan.side);
            println!("  fitted crop: {:?} ({:?})", plan.crop, plan.resolution);
            match refinement.corrected_multiplier {
                Some(k) => println!(
                    "  head height {:.1}% -> {:.1}% (multiplier {k:.3})",
                    refinement.initial_percent, refinement.final_percent
                ),
                None => println!("  head height {:.1}%", refinement.final_percent),
            }
        }
        CropPath::Blank => println!("  no content found; centre crop"),
    }
    println!(
        "  final crop:  {:?} -> {}x{} {:?}",
        report.final_crop, photo.width, photo.height, photo.format
    );
}
