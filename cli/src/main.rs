mod args;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use rushid::{CropOptions, CropPath, IdCropper};

use crate::args::CropArgs;

/// Initialise `env_logger`, honouring `RUST_LOG` when set.
fn init_logging(default_filter: LevelFilter) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    if builder.try_init().is_err() {
        // Logger already initialised; nothing to do.
    }
}

/// Library defaults, except that the CLI emits the artifact record unless told not to.
fn cli_defaults() -> CropOptions {
    CropOptions {
        write_artifact: true,
        ..CropOptions::default()
    }
}

/// Load a JSON settings file over [`cli_defaults`]; top-level keys it omits keep their defaults.
fn load_settings(path: Option<&PathBuf>) -> Result<CropOptions> {
    let Some(path) = path else {
        return Ok(cli_defaults());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings {}", path.display()))?;
    let overrides: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse settings JSON {}", path.display()))?;

    let mut merged = match serde_json::to_value(cli_defaults())? {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    merged.extend(overrides);
    serde_json::from_value(serde_json::Value::Object(merged))
        .with_context(|| format!("invalid settings in {}", path.display()))
}

fn apply_cli_overrides(options: &mut CropOptions, args: &CropArgs) {
    if let Some(size) = args.size {
        options.output_size = size;
    }
    if let Some(quality) = args.quality {
        options.quality = quality;
    }
    if args.preserve_alpha {
        options.preserve_alpha = true;
    }
    if args.no_artifact {
        options.write_artifact = false;
    }
}

#[cfg(feature = "rustface")]
fn with_detectors(cropper: IdCropper, args: &CropArgs) -> Result<IdCropper> {
    let Some(model) = args.model.as_ref() else {
        return Ok(cropper);
    };
    let detector = rushid::RustfaceDetector::from_path(model)
        .with_context(|| format!("failed to load face model {}", model.display()))?;
    Ok(cropper.strategy(Box::new(rushid::CascadeStrategy::new(Box::new(detector)))))
}

#[cfg(not(feature = "rustface"))]
fn with_detectors(cropper: IdCropper, args: &CropArgs) -> Result<IdCropper> {
    if args.model.is_some() {
        log::warn!("built without the `rustface` feature; ignoring --model");
    }
    Ok(cropper)
}

fn main() -> Result<()> {
    let args = CropArgs::parse();
    init_logging(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    let mut options = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut options, &args);

    let cropper = IdCropper::open(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?
        .options(options);
    let cropper = with_detectors(cropper, &args)?;

    let photo = cropper
        .write_to(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    if let Some(record) = photo.artifact.as_ref() {
        println!("{}", serde_json::to_string(record)?);
    }

    match &photo.report.path {
        CropPath::Face {
            source, refinement, ..
        } => info!(
            "{} -> {} ({}x{}, located by {source}, head height {:.1}%)",
            args.input.display(),
            args.output.display(),
            photo.width,
            photo.height,
            refinement.final_percent
        ),
        CropPath::Blank => info!(
            "{} -> {} ({}x{}, blank input, centre crop)",
            args.input.display(),
            args.output.display(),
            photo.width,
            photo.height
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn settings_file_is_overridden_by_flags() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"output_size": 300, "quality": 0.5}"#).unwrap();

        let args =
            CropArgs::try_parse_from(["rushid", "in.png", "out.jpg", "--size", "200"]).unwrap();
        let mut options = load_settings(Some(&path)).unwrap();
        apply_cli_overrides(&mut options, &args);

        assert_eq!(options.output_size, 200);
        assert_eq!(options.quality, 0.5);
        assert!(options.write_artifact);
    }

    #[test]
    fn missing_settings_file_is_an_error() {
        assert!(load_settings(Some(&PathBuf::from("/nonexistent/settings.json"))).is_err());
    }

    #[test]
    fn no_settings_file_gives_cli_defaults() {
        let options = load_settings(None).unwrap();
        assert!(options.write_artifact);
        assert_eq!(
            options,
            CropOptions {
                write_artifact: true,
                ..CropOptions::default()
            }
        );
    }

    #[test]
    fn settings_file_can_disable_artifact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"write_artifact": false}"#).unwrap();

        let args = CropArgs::try_parse_from(["rushid", "in.png", "out.jpg"]).unwrap();
        let mut options = load_settings(Some(&path)).unwrap();
        apply_cli_overrides(&mut options, &args);

        assert!(!options.write_artifact);
    }

    #[test]
    fn no_artifact_flag_overrides_settings_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"write_artifact": true}"#).unwrap();

        let args =
            CropArgs::try_parse_from(["rushid", "in.png", "out.jpg", "--no-artifact"]).unwrap();
        let mut options = load_settings(Some(&path)).unwrap();
        apply_cli_overrides(&mut options, &args);

        assert!(!options.write_artifact);
    }
}
