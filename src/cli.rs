use clap::Parser;
use std::path::PathBuf;

use crate::deskew::TiltParams;

#[derive(Parser, Debug)]
#[command(name = "untilt")]
#[command(version, about = "Straighten tilted document photos by aligning the dominant document edge with the image axes")]
pub struct Cli {
    /// Input image path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output path [default: input_corrected.png]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Save a diagnostic copy of the input with the dominant edge drawn on it
    #[arg(long)]
    pub overlay: Option<PathBuf>,

    /// Fail on degraded input instead of passing it through unchanged
    #[arg(long)]
    pub strict: bool,

    /// Show detection details
    #[arg(long)]
    pub verbose: bool,

    /// Minimum accumulator votes for a Hough line
    #[arg(long, default_value = "80")]
    pub vote_threshold: u32,

    /// Distance from the frame within which detected segments are discarded
    #[arg(long, default_value = "10")]
    pub border_margin: u32,
}

impl Cli {
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = self.input.file_stem().unwrap_or_default().to_string_lossy();
            let parent = self.input.parent().unwrap_or(std::path::Path::new("."));
            parent.join(format!("{}_corrected.png", stem))
        })
    }

    pub fn tilt_params(&self) -> TiltParams {
        TiltParams {
            hough_vote_threshold: self.vote_threshold,
            border_margin: self.border_margin,
            ..TiltParams::default()
        }
    }
}
