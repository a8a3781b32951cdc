//! Centroid overlay for debugging detections.

use crate::core::Centroid;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

pub const DEFAULT_RADIUS: i32 = 5;
pub const DEFAULT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Copy of `frame` with a filled disk at every centroid. The input frame is
/// left untouched.
pub fn draw_centroids(frame: &RgbImage, centroids: &[Centroid]) -> RgbImage {
    draw_centroids_with(frame, centroids, DEFAULT_RADIUS, DEFAULT_COLOR)
}

pub fn draw_centroids_with(
    frame: &RgbImage,
    centroids: &[Centroid],
    radius: i32,
    color: Rgb<u8>,
) -> RgbImage {
    let mut out = frame.clone();
    for c in centroids.iter().filter(|c| c.row.is_finite() && c.col.is_finite()) {
        let center = (c.col.round() as i32, c.row.round() as i32);
        draw_filled_circle_mut(&mut out, center, radius, color);
    }
    out
}
