//! Command-line argument definitions for the `rushid` binary.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Crop a background-removed portrait into a square, head-centred ID photo.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct CropArgs {
    /// Source image (PNG, JPEG or WebP), ideally with the background removed.
    pub input: PathBuf,

    /// Destination image. `.png` writes PNG; any other extension writes JPEG.
    pub output: PathBuf,

    /// Output side length in pixels.
    #[arg(long)]
    pub size: Option<u32>,

    /// Preserve the alpha channel and write PNG.
    #[arg(long, action = ArgAction::SetTrue)]
    pub preserve_alpha: bool,

    /// JPEG quality from 0.0 to 1.0.
    #[arg(long)]
    pub quality: Option<f32>,

    /// Optional settings JSON with crop options; flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// SeetaFace model file enabling the cascade face detector.
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Skip the temporary copy and the JSON integrity record on stdout,
    /// whatever `write_artifact` says in the settings file.
    #[arg(long = "no-artifact", action = ArgAction::SetTrue)]
    pub no_artifact: bool,

    /// Log debug diagnostics (overridden by `RUST_LOG`).
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub verbose: bool,
}
