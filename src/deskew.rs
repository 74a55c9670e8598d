use std::cmp::Ordering;

use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};
use thiserror::Error;

use crate::geometry::{nearest_axis_correction, LineSegment};
use crate::transform::rotate_about_center;

/// Side length of the square smoothing kernel applied before edge detection.
const BLUR_KERNEL_SIZE: u32 = 5;

const EPSILON: f32 = 1e-6;

/// Tuning parameters for the tilt detection pipeline.
///
/// The defaults are stable for document photographs taken under reasonably
/// controlled lighting; no adaptive thresholding is performed.
#[derive(Debug, Clone)]
pub struct TiltParams {
    /// Segments with an endpoint closer than this to any image border are
    /// discarded as frame artifacts. Default: 10 px.
    pub border_margin: u32,
    /// Candidates shorter than this fraction of the smaller image dimension
    /// are discarded as text strokes or minor artifacts. Default: 0.25.
    pub min_length_fraction: f64,
    /// Canny hysteresis low threshold. Default: 50.
    pub canny_low: f32,
    /// Canny hysteresis high threshold. Default: 150.
    pub canny_high: f32,
    /// Minimum accumulator votes for a Hough line. Default: 80.
    pub hough_vote_threshold: u32,
    /// Minimum length of a carved segment, in pixels. Default: 50.
    pub hough_min_length: f64,
    /// Largest gap between collinear edge points merged into one segment.
    /// Default: 10 px.
    pub hough_max_gap: u32,
    /// Non-maximum suppression radius in Hough accumulator space.
    /// Default: 8.
    pub hough_suppression_radius: u32,
}

impl Default for TiltParams {
    fn default() -> Self {
        Self {
            border_margin: 10,
            min_length_fraction: 0.25,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_vote_threshold: 80,
            hough_min_length: 50.0,
            hough_max_gap: 10,
            hough_suppression_radius: 8,
        }
    }
}

/// Degraded-input conditions surfaced in strict mode.
#[derive(Debug, Error)]
pub enum TiltError {
    #[error("no line segments detected in the image")]
    NoLinesDetected,
    #[error("no valid line segments after filtering ({rejected} candidates rejected)")]
    NoValidLinesAfterFiltering { rejected: usize },
    #[error("image not found or undecodable: {path}")]
    ImageNotFound {
        path: std::path::PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Result of the tilt detection pipeline.
#[derive(Debug, Clone)]
pub struct DetectedTilt {
    /// The dominant edge: the longest segment surviving filtering.
    pub segment: LineSegment,
    /// Orientation of the dominant edge in degrees.
    pub raw_angle: f64,
    /// Tilt relative to the nearest axis; rotating the image by the negative
    /// of this cancels the tilt.
    pub correction: f64,
    /// Number of Hough lines found in the edge map.
    pub line_count: usize,
    /// Number of segments surviving the border and length filters.
    pub candidate_count: usize,
}

/// Detect the tilt of the dominant document edge.
///
/// Runs grayscale conversion, Gaussian smoothing, Canny edge detection and
/// Hough line extraction, carves the detected lines into concrete segments,
/// filters out border artifacts and short strokes, and measures the longest
/// survivor. Deterministic for identical input and parameters.
pub fn detect_tilt(image: &DynamicImage, params: &TiltParams) -> Result<DetectedTilt, TiltError> {
    let gray = image.to_luma8();
    let blurred = gaussian_blur_f32(&gray, blur_sigma(BLUR_KERNEL_SIZE));
    let edges = canny(&blurred, params.canny_low, params.canny_high);

    let options = LineDetectionOptions {
        vote_threshold: params.hough_vote_threshold,
        suppression_radius: params.hough_suppression_radius,
    };
    let polar_lines = detect_lines(&edges, options);

    let mut segments = Vec::new();
    for line in &polar_lines {
        carve_segments(&edges, line, params, &mut segments);
    }
    if segments.is_empty() {
        return Err(TiltError::NoLinesDetected);
    }

    let (width, height) = gray.dimensions();
    let candidates = filter_segments(&segments, width, height, params);

    let dominant = match candidates
        .iter()
        .copied()
        .max_by(|a, b| a.length().partial_cmp(&b.length()).unwrap_or(Ordering::Equal))
    {
        Some(segment) => segment,
        None => {
            return Err(TiltError::NoValidLinesAfterFiltering {
                rejected: segments.len(),
            })
        }
    };

    let raw_angle = dominant.angle_degrees();
    Ok(DetectedTilt {
        segment: dominant,
        raw_angle,
        correction: nearest_axis_correction(raw_angle),
        line_count: polar_lines.len(),
        candidate_count: candidates.len(),
    })
}

/// Correct the tilt of a document photograph, lenient policy.
///
/// Any degraded condition (no edges, no segments, nothing left after
/// filtering) returns the input image unchanged rather than failing, which is
/// the right default when embedded in a larger pipeline. The input is taken
/// by value so the degraded paths can hand it back without a copy.
pub fn correct_tilt(image: DynamicImage, params: &TiltParams) -> DynamicImage {
    match detect_tilt(&image, params) {
        Ok(tilt) => rotate_about_center(&image, -tilt.correction),
        Err(_) => image,
    }
}

/// Correct the tilt of a document photograph, strict policy.
///
/// Degraded conditions surface as [`TiltError`] so an operator inspecting a
/// single image is alerted instead of silently receiving the original.
pub fn correct_tilt_strict(
    image: &DynamicImage,
    params: &TiltParams,
) -> Result<DynamicImage, TiltError> {
    let tilt = detect_tilt(image, params)?;
    Ok(rotate_about_center(image, -tilt.correction))
}

/// Gaussian sigma implied by a square kernel of the given side length.
fn blur_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Intersections of a polar line with the image frame.
fn frame_intersections(line: &PolarLine, width: u32, height: u32) -> Vec<(f32, f32)> {
    let theta = (line.angle_in_degrees as f32).to_radians();
    let (sin_t, cos_t) = theta.sin_cos();
    let r = line.r;
    let w = width as f32;
    let h = height as f32;
    let mut points = Vec::with_capacity(4);

    if sin_t.abs() > EPSILON {
        // x = 0
        let y = r / sin_t;
        if (0.0..h).contains(&y) {
            points.push((0.0, y));
        }
        // x = width - 1
        let x = w - 1.0;
        let y = (r - x * cos_t) / sin_t;
        if (0.0..h).contains(&y) {
            points.push((x, y));
        }
    }
    if cos_t.abs() > EPSILON {
        // y = 0
        let x = r / cos_t;
        if (0.0..w).contains(&x) {
            points.push((x, 0.0));
        }
        // y = height - 1
        let y = h - 1.0;
        let x = (r - y * sin_t) / cos_t;
        if (0.0..w).contains(&x) {
            points.push((x, y));
        }
    }
    points
}

fn most_distant_pair(points: &[(f32, f32)]) -> ((f32, f32), (f32, f32)) {
    debug_assert!(points.len() >= 2);
    let mut max_dist_sq = 0.0f32;
    let mut best = (points[0], points[1]);

    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let dx = points[j].0 - points[i].0;
            let dy = points[j].1 - points[i].1;
            let dist_sq = dx * dx + dy * dy;
            if dist_sq > max_dist_sq {
                max_dist_sq = dist_sq;
                best = (points[i], points[j]);
            }
        }
    }

    best
}

/// Carve concrete segments out of one Hough line.
///
/// The line is clipped to the frame and walked in unit steps sampling the
/// edge map. Maximal runs of edge hits whose internal gaps stay within
/// `hough_max_gap` and whose span reaches `hough_min_length` become
/// segments.
fn carve_segments(
    edges: &GrayImage,
    line: &PolarLine,
    params: &TiltParams,
    out: &mut Vec<LineSegment>,
) {
    let (width, height) = edges.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let points = frame_intersections(line, width, height);
    if points.len() < 2 {
        return;
    }
    let (p0, p1) = most_distant_pair(&points);

    let dx = p1.0 - p0.0;
    let dy = p1.1 - p0.1;
    if dx.abs() < EPSILON && dy.abs() < EPSILON {
        return;
    }
    let steps = (dx.abs().max(dy.abs()).ceil() as usize).max(1);

    // Edge hits along the walk, keyed by step index so gaps are measured in
    // pixels.
    let mut hits: Vec<(usize, f32, f32)> = Vec::new();
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = p0.0 + dx * t;
        let y = p0.1 + dy * t;
        if x < -0.5 || y < -0.5 {
            continue;
        }
        let xi = x.round() as u32;
        let yi = y.round() as u32;
        if xi < width && yi < height && edges.get_pixel(xi, yi)[0] > 0 {
            hits.push((i, x, y));
        }
    }
    if hits.is_empty() {
        return;
    }

    let max_gap = params.hough_max_gap as usize;
    let mut run_start = 0usize;
    for k in 1..=hits.len() {
        let broken = k == hits.len() || hits[k].0 - hits[k - 1].0 > max_gap + 1;
        if !broken {
            continue;
        }
        let start = hits[run_start];
        let end = hits[k - 1];
        let span = (end.1 - start.1).hypot(end.2 - start.2);
        if f64::from(span) >= params.hough_min_length {
            let segment = LineSegment::new(
                start.1.round() as i32,
                start.2.round() as i32,
                end.1.round() as i32,
                end.2.round() as i32,
            );
            if !out.contains(&segment) {
                out.push(segment);
            }
        }
        run_start = k;
    }
}

/// Drop segments that touch the frame or are too short to be a document edge.
fn filter_segments(
    segments: &[LineSegment],
    width: u32,
    height: u32,
    params: &TiltParams,
) -> Vec<LineSegment> {
    let min_length = params.min_length_fraction * f64::from(width.min(height));
    segments
        .iter()
        .copied()
        .filter(|s| !touches_border(s, width, height, params.border_margin))
        .filter(|s| s.length() >= min_length)
        .collect()
}

fn touches_border(segment: &LineSegment, width: u32, height: u32, margin: u32) -> bool {
    let w = width as i32;
    let h = height as i32;
    let m = margin as i32;
    segment.x1 < m
        || segment.x1 > w - m
        || segment.y1 < m
        || segment.y1 > h - m
        || segment.x2 < m
        || segment.x2 > w - m
        || segment.y2 < m
        || segment.y2 > h - m
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use imageproc::drawing::draw_line_segment_mut;

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
    }

    /// Sweep the 1 px line primitive across the segment normal for a stroke
    /// wide enough to survive smoothing.
    fn draw_stroke(image: &mut DynamicImage, start: (f32, f32), end: (f32, f32)) {
        let rgb = match image {
            DynamicImage::ImageRgb8(buf) => buf,
            _ => panic!("test images are RGB"),
        };
        let dx = end.0 - start.0;
        let dy = end.1 - start.1;
        let len = dx.hypot(dy).max(1e-6);
        let (nx, ny) = (-dy / len, dx / len);
        for offset in [-2.0f32, -1.0, 0.0, 1.0, 2.0] {
            draw_line_segment_mut(
                rgb,
                (start.0 + nx * offset, start.1 + ny * offset),
                (end.0 + nx * offset, end.1 + ny * offset),
                Rgb([0, 0, 0]),
            );
        }
    }

    #[test]
    fn uniform_image_yields_no_lines() {
        let image = blank(200, 200);
        match detect_tilt(&image, &TiltParams::default()) {
            Err(TiltError::NoLinesDetected) => {}
            other => panic!("expected NoLinesDetected, got {other:?}"),
        }
    }

    #[test]
    fn lenient_mode_passes_degraded_input_through() {
        let image = blank(120, 90);
        let original = image.clone();
        let result = correct_tilt(image, &TiltParams::default());
        assert_eq!((result.width(), result.height()), (120, 90));
        assert_eq!(result.to_rgb8().as_raw(), original.to_rgb8().as_raw());
    }

    #[test]
    fn strict_mode_fails_on_degraded_input() {
        let image = blank(120, 90);
        assert!(correct_tilt_strict(&image, &TiltParams::default()).is_err());
    }

    #[test]
    fn horizontal_edge_needs_no_correction() {
        let mut image = blank(400, 300);
        draw_stroke(&mut image, (60.0, 150.0), (340.0, 150.0));

        let tilt = detect_tilt(&image, &TiltParams::default()).unwrap();
        assert!(tilt.candidate_count >= 1);
        assert!(tilt.segment.length() >= 200.0);
        assert!(
            tilt.correction.abs() <= 1.5,
            "expected near-zero correction, got {}",
            tilt.correction
        );
    }

    #[test]
    fn border_hugging_segment_is_rejected() {
        let mut image = blank(300, 300);
        // Long edge inside the border margin; a frame artifact, not a
        // document edge.
        draw_stroke(&mut image, (0.0, 5.0), (299.0, 5.0));

        match detect_tilt(&image, &TiltParams::default()) {
            Err(TiltError::NoValidLinesAfterFiltering { rejected }) => {
                assert!(rejected >= 1);
            }
            other => panic!("expected NoValidLinesAfterFiltering, got {other:?}"),
        }
    }

    #[test]
    fn short_collinear_dashes_are_rejected() {
        let mut image = blank(400, 400);
        // Two dashes on one line: enough combined votes for the accumulator,
        // but the 21 px gap splits them into runs below the quarter-dimension
        // length floor (100 px here).
        draw_stroke(&mut image, (100.0, 200.0), (160.0, 200.0));
        draw_stroke(&mut image, (181.0, 200.0), (241.0, 200.0));

        match detect_tilt(&image, &TiltParams::default()) {
            Err(TiltError::NoValidLinesAfterFiltering { .. }) => {}
            other => panic!("expected NoValidLinesAfterFiltering, got {other:?}"),
        }
    }

    #[test]
    fn tilted_edge_is_corrected_to_horizontal() {
        let mut image = blank(400, 300);
        // dy/dx = 44/250, just under 10 degrees.
        draw_stroke(&mut image, (70.0, 90.0), (320.0, 134.0));

        let params = TiltParams::default();
        let tilt = detect_tilt(&image, &params).unwrap();
        assert!(
            (tilt.correction - 10.0).abs() <= 1.5,
            "expected ~10 degree tilt, got {}",
            tilt.correction
        );

        let corrected = correct_tilt(image, &params);
        assert_eq!((corrected.width(), corrected.height()), (400, 300));

        let residual = detect_tilt(&corrected, &params).unwrap();
        assert!(
            residual.correction.abs() <= 2.0,
            "expected residual tilt within detector resolution, got {}",
            residual.correction
        );
    }

    #[test]
    fn near_vertical_edge_folds_to_vertical_axis() {
        let mut image = blank(300, 400);
        // Roughly 83 degrees; the short side of a card standing upright.
        draw_stroke(&mut image, (150.0, 60.0), (185.0, 340.0));

        let params = TiltParams::default();
        let tilt = detect_tilt(&image, &params).unwrap();
        assert!(
            tilt.raw_angle.abs() > 45.0,
            "expected a near-vertical raw angle, got {}",
            tilt.raw_angle
        );
        assert!(
            (tilt.correction.abs() - 7.1).abs() <= 1.5,
            "expected ~7 degree fold-relative tilt, got {}",
            tilt.correction
        );

        let corrected = correct_tilt(image, &params);
        assert_eq!((corrected.width(), corrected.height()), (300, 400));

        let residual = detect_tilt(&corrected, &params).unwrap();
        assert!(
            residual.correction.abs() <= 2.0,
            "expected the edge aligned with the vertical axis, got {}",
            residual.correction
        );
    }

    #[test]
    fn default_params_match_documented_values() {
        let params = TiltParams::default();
        assert_eq!(params.border_margin, 10);
        assert!((params.min_length_fraction - 0.25).abs() < 1e-12);
        assert_eq!(params.canny_low, 50.0);
        assert_eq!(params.canny_high, 150.0);
        assert_eq!(params.hough_vote_threshold, 80);
        assert_eq!(params.hough_min_length, 50.0);
        assert_eq!(params.hough_max_gap, 10);
    }

    #[test]
    fn blur_sigma_for_five_by_five_kernel() {
        assert!((blur_sigma(5) - 1.1).abs() < 1e-6);
    }
}
