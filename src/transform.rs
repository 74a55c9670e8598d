use image::{DynamicImage, ImageBuffer, Pixel, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use nalgebra::Matrix3;

use crate::geometry::{rotation_about, transform_point, LineSegment};

const OVERLAY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const OVERLAY_THICKNESS: i32 = 3;

/// Cubic interpolation kernel (Catmull-Rom)
fn cubic_weight(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;

    [
        -0.5 * t3 + t2 - 0.5 * t,
        1.5 * t3 - 2.5 * t2 + 1.0,
        -1.5 * t3 + 2.0 * t2 + 0.5 * t,
        0.5 * t3 - 0.5 * t2,
    ]
}

/// Bicubic sample at (x, y), accumulated per channel into `acc`.
///
/// The 4x4 tap neighborhood is clamped to the frame, so samples beyond the
/// border replicate the outermost pixels instead of bleeding in a fill color.
fn bicubic_gather<P>(img: &ImageBuffer<P, Vec<u8>>, x: f64, y: f64, acc: &mut [f64])
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = img.dimensions();
    let x_floor = x.floor() as i64;
    let y_floor = y.floor() as i64;
    let wx = cubic_weight(x - x.floor());
    let wy = cubic_weight(y - y.floor());

    for v in acc.iter_mut() {
        *v = 0.0;
    }

    for j in 0..4 {
        for i in 0..4 {
            let px = (x_floor + i as i64 - 1).clamp(0, i64::from(width) - 1) as u32;
            let py = (y_floor + j as i64 - 1).clamp(0, i64::from(height) - 1) as u32;
            let weight = wx[i] * wy[j];

            let channels = img.get_pixel(px, py).channels();
            for (c, v) in acc.iter_mut().enumerate() {
                *v += f64::from(channels[c]) * weight;
            }
        }
    }
}

/// Warp a buffer through the inverse transform into an equally sized output.
fn warp_into<P>(img: &ImageBuffer<P, Vec<u8>>, inverse: &Matrix3<f64>) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = img.dimensions();
    let channels = usize::from(P::CHANNEL_COUNT);
    let mut output = ImageBuffer::new(width, height);

    for out_y in 0..height {
        for out_x in 0..width {
            let (src_x, src_y) = transform_point(inverse, f64::from(out_x), f64::from(out_y));

            let mut acc = [0.0f64; 4];
            bicubic_gather(img, src_x, src_y, &mut acc[..channels]);

            let mut bytes = [0u8; 4];
            for c in 0..channels {
                bytes[c] = acc[c].clamp(0.0, 255.0).round() as u8;
            }
            output.put_pixel(out_x, out_y, *P::from_slice(&bytes[..channels]));
        }
    }

    output
}

/// Rotate an image by `angle_degrees` about its center, preserving the canvas
/// size and channel layout.
///
/// Resampling is bicubic with replicated borders, so rotation never
/// introduces dark corners. The rotation center is the integer pixel
/// `(width / 2, height / 2)`. 8-bit layouts are warped as-is; anything else
/// is converted to RGBA first.
pub fn rotate_about_center(image: &DynamicImage, angle_degrees: f64) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return image.clone();
    }

    let center = (f64::from(width / 2), f64::from(height / 2));
    let forward = rotation_about(center, angle_degrees);
    let inverse = match forward.try_inverse() {
        Some(inv) => inv,
        None => return image.clone(),
    };

    match image {
        DynamicImage::ImageLuma8(buf) => DynamicImage::ImageLuma8(warp_into(buf, &inverse)),
        DynamicImage::ImageLumaA8(buf) => DynamicImage::ImageLumaA8(warp_into(buf, &inverse)),
        DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(warp_into(buf, &inverse)),
        DynamicImage::ImageRgba8(buf) => DynamicImage::ImageRgba8(warp_into(buf, &inverse)),
        other => DynamicImage::ImageRgba8(warp_into(&other.to_rgba8(), &inverse)),
    }
}

/// Render the detected dominant edge on an RGB copy of the original image
/// for diagnostic display.
pub fn draw_segment_overlay(image: &DynamicImage, segment: &LineSegment) -> RgbImage {
    let mut canvas = image.to_rgb8();

    let dx = f64::from(segment.x2 - segment.x1);
    let dy = f64::from(segment.y2 - segment.y1);
    let len = dx.hypot(dy);
    if len < f64::EPSILON {
        return canvas;
    }
    let (nx, ny) = (-dy / len, dx / len);

    // The drawing primitive is 1 px wide; sweep it across the segment normal
    // to reach the full overlay thickness.
    let reach = OVERLAY_THICKNESS / 2;
    for offset in -reach..=reach {
        let ox = (nx * f64::from(offset)) as f32;
        let oy = (ny * f64::from(offset)) as f32;
        draw_line_segment_mut(
            &mut canvas,
            (segment.x1 as f32 + ox, segment.y1 as f32 + oy),
            (segment.x2 as f32 + ox, segment.y2 as f32 + oy),
            OVERLAY_COLOR,
        );
    }

    canvas
}
