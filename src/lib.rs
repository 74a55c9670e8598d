pub mod cli;
pub mod deskew;
pub mod geometry;
pub mod transform;

pub use cli::Cli;
pub use deskew::{
    correct_tilt, correct_tilt_strict, detect_tilt, DetectedTilt, TiltError, TiltParams,
};
pub use geometry::{nearest_axis_correction, LineSegment};
pub use transform::{draw_segment_overlay, rotate_about_center};
