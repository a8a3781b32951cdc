//! Contrast-limited adaptive histogram equalization (CLAHE).
//!
//! The image is split into a grid of tiles; each tile gets a clipped-histogram
//! lookup table and every pixel is mapped through a bilinear blend of the four
//! nearest tile tables.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

const BINS: usize = 256;

/// Parameters for [`equalize_adaptive`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaheParams {
    /// Tile columns across the image.
    pub tiles_x: usize,
    /// Tile rows down the image.
    pub tiles_y: usize,
    /// Per-bin clip as a fraction of the tile pixel count; `<= 0` disables clipping.
    pub clip_limit: f64,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            tiles_x: 8,
            tiles_y: 8,
            clip_limit: 0.01,
        }
    }
}

/// Equalize `img` tile by tile. Returns a new image of the same size.
pub fn equalize_adaptive(img: &GrayImage, params: &ClaheParams) -> GrayImage {
    let w = img.width() as usize;
    let h = img.height() as usize;
    if w == 0 || h == 0 {
        return img.clone();
    }

    let tile_w = w.div_ceil(params.tiles_x.clamp(1, w));
    let tile_h = h.div_ceil(params.tiles_y.clamp(1, h));
    let tiles_x = w.div_ceil(tile_w);
    let tiles_y = h.div_ceil(tile_h);
    let data = img.as_raw();

    let mut luts = Vec::with_capacity(tiles_x * tiles_y);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let tile = TileRect {
                x0,
                x1: (x0 + tile_w).min(w),
                y0,
                y1: (y0 + tile_h).min(h),
            };
            luts.push(tile_lut(data, w, tile, params.clip_limit));
        }
    }

    let mut out = GrayImage::new(w as u32, h as u32);
    for y in 0..h {
        let (ty0, ty1, wy) = blend_neighbours(y, tile_h, tiles_y);
        for x in 0..w {
            let (tx0, tx1, wx) = blend_neighbours(x, tile_w, tiles_x);
            let v = data[y * w + x] as usize;

            let top = lerp(luts[ty0 * tiles_x + tx0][v], luts[ty0 * tiles_x + tx1][v], wx);
            let bottom = lerp(luts[ty1 * tiles_x + tx0][v], luts[ty1 * tiles_x + tx1][v], wx);
            let value = lerp(top, bottom, wy);

            out.put_pixel(x as u32, y as u32, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

#[derive(Clone, Copy)]
struct TileRect {
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
}

fn tile_lut(data: &[u8], stride: usize, tile: TileRect, clip_limit: f64) -> [f32; BINS] {
    let mut hist = [0u32; BINS];
    for y in tile.y0..tile.y1 {
        for &v in &data[y * stride + tile.x0..y * stride + tile.x1] {
            hist[v as usize] += 1;
        }
    }
    let n = ((tile.x1 - tile.x0) * (tile.y1 - tile.y0)) as u32;

    if clip_limit > 0.0 {
        let clip = ((clip_limit * n as f64) as u32).max(1);
        let mut excess = 0u32;
        for count in hist.iter_mut() {
            if *count > clip {
                excess += *count - clip;
                *count = clip;
            }
        }
        let bonus = excess / BINS as u32;
        let remainder = (excess % BINS as u32) as usize;
        for count in hist.iter_mut() {
            *count += bonus;
        }
        if remainder > 0 {
            let step = (BINS / remainder).max(1);
            for bin in (0..BINS).step_by(step).take(remainder) {
                hist[bin] += 1;
            }
        }
    }

    let scale = 255.0 / n.max(1) as f32;
    let mut lut = [0f32; BINS];
    let mut cdf = 0u32;
    for (bin, &count) in hist.iter().enumerate() {
        cdf += count;
        lut[bin] = (cdf as f32 * scale).min(255.0);
    }
    lut
}

/// Tiles whose centers bracket `pos` and the weight of the second one.
fn blend_neighbours(pos: usize, tile: usize, count: usize) -> (usize, usize, f32) {
    let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
    if f <= 0.0 {
        return (0, 0, 0.0);
    }
    let i0 = f.floor() as usize;
    if i0 + 1 >= count {
        return (count - 1, count - 1, 0.0);
    }
    (i0, i0 + 1, f - i0 as f32)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}
