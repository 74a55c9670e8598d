use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use image::{DynamicImage, ImageReader};

use untilt::{detect_tilt, draw_segment_overlay, rotate_about_center, Cli, TiltError};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let params = cli.tilt_params();

    let img = load_image(&cli.input)?;

    if cli.verbose {
        let (width, height) = (img.width(), img.height());
        eprintln!("Loaded image: {:?} ({}x{})", cli.input, width, height);
        eprintln!("Hough vote threshold: {}", params.hough_vote_threshold);
        eprintln!("Border margin: {} px", params.border_margin);
        eprintln!(
            "Minimum edge length: {:.1} px",
            params.min_length_fraction * f64::from(width.min(height))
        );
        eprintln!();
    }

    let output_path = cli.output_path();

    // Degraded input (no lines, nothing left after filtering) is a hard
    // error in strict mode; otherwise the image passes through unchanged.
    let tilt = match detect_tilt(&img, &params) {
        Ok(tilt) => tilt,
        Err(err) => {
            if cli.strict {
                return Err(err).context("Tilt detection failed");
            }
            eprintln!("{err}; saving the image unchanged");
            img.save(&output_path)
                .with_context(|| format!("Failed to save output: {:?}", output_path))?;
            eprintln!("Saved: {:?}", output_path);
            return Ok(());
        }
    };

    if cli.verbose {
        eprintln!("Hough lines: {}", tilt.line_count);
        eprintln!("Candidates after filtering: {}", tilt.candidate_count);
        eprintln!(
            "Dominant edge: ({}, {}) -> ({}, {}), length {:.1} px",
            tilt.segment.x1,
            tilt.segment.y1,
            tilt.segment.x2,
            tilt.segment.y2,
            tilt.segment.length()
        );
        eprintln!();
    }

    eprintln!(
        "Detected tilt: {:.2}° (raw edge angle {:.2}°)",
        tilt.correction, tilt.raw_angle
    );

    if let Some(overlay_path) = &cli.overlay {
        let overlay = draw_segment_overlay(&img, &tilt.segment);
        overlay
            .save(overlay_path)
            .with_context(|| format!("Failed to save overlay: {:?}", overlay_path))?;
        eprintln!("Saved overlay: {:?}", overlay_path);
    }

    let tolerance = 0.05; // degrees
    if tilt.correction.abs() < tolerance {
        eprintln!(
            "Image is already level (within {:.2}° tolerance)",
            tolerance
        );
        img.save(&output_path)
            .with_context(|| format!("Failed to save output: {:?}", output_path))?;
        eprintln!("Saved (unchanged): {:?}", output_path);
        return Ok(());
    }

    let corrected = rotate_about_center(&img, -tilt.correction);

    corrected
        .save(&output_path)
        .with_context(|| format!("Failed to save output: {:?}", output_path))?;

    eprintln!();
    eprintln!("Saved corrected image: {:?}", output_path);
    eprintln!(
        "Dimensions: {}x{} -> {}x{}",
        img.width(),
        img.height(),
        corrected.width(),
        corrected.height()
    );

    Ok(())
}

fn load_image(path: &Path) -> Result<DynamicImage, TiltError> {
    let reader = ImageReader::open(path).map_err(|e| TiltError::ImageNotFound {
        path: path.to_path_buf(),
        source: image::ImageError::IoError(e),
    })?;
    reader.decode().map_err(|e| TiltError::ImageNotFound {
        path: path.to_path_buf(),
        source: e,
    })
}
