use nalgebra::Matrix3;

/// A straight line segment with integer pixel endpoints, as produced by the
/// line extractor. Endpoint order is whatever the detector emitted; direction
/// is not canonicalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LineSegment {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Euclidean distance between the endpoints.
    pub fn length(&self) -> f64 {
        f64::from(self.x2 - self.x1).hypot(f64::from(self.y2 - self.y1))
    }

    /// Orientation of the segment in degrees, in (-180, 180].
    ///
    /// Measured in image coordinates (y grows downward), so a segment that
    /// descends to the right has a positive angle.
    pub fn angle_degrees(&self) -> f64 {
        f64::from(self.y2 - self.y1)
            .atan2(f64::from(self.x2 - self.x1))
            .to_degrees()
    }
}

/// Fold a raw segment orientation onto the tilt relative to the nearest axis.
///
/// A dominant edge can be either the document's long side (near-horizontal)
/// or its short side (near-vertical); both should be corrected toward the
/// nearest axis rather than forced to one orientation. Segments steeper than
/// 45° are treated as near-vertical and shifted by 90°; exactly 45° counts as
/// near-horizontal and passes through unchanged.
pub fn nearest_axis_correction(angle_degrees: f64) -> f64 {
    if angle_degrees.abs() > 45.0 {
        if angle_degrees > 0.0 {
            angle_degrees - 90.0
        } else {
            angle_degrees + 90.0
        }
    } else {
        angle_degrees
    }
}

/// Build the 3x3 homogeneous rotation by `angle_degrees` about `center`,
/// in pixel coordinates (unit scale).
///
/// Composed as translate-to-origin, rotate, translate-back, so the center
/// point is a fixed point of the transform.
pub fn rotation_about(center: (f64, f64), angle_degrees: f64) -> Matrix3<f64> {
    let theta = angle_degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    let (cx, cy) = center;

    let translate_to_origin = Matrix3::new(
        1.0, 0.0, -cx,
        0.0, 1.0, -cy,
        0.0, 0.0, 1.0,
    );

    let rotate = Matrix3::new(
        cos, -sin, 0.0,
        sin, cos, 0.0,
        0.0, 0.0, 1.0,
    );

    let translate_back = Matrix3::new(
        1.0, 0.0, cx,
        0.0, 1.0, cy,
        0.0, 0.0, 1.0,
    );

    translate_back * rotate * translate_to_origin
}

/// Transform a point using a homogeneous 3x3 matrix.
pub fn transform_point(matrix: &Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
    let p = nalgebra::Vector3::new(x, y, 1.0);
    let result = matrix * p;
    (result.x / result.z, result.y / result.z)
}
