use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashMap;

/// Row-major boolean grid; `true` marks a candidate surface pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl Mask {
    /// All-background mask.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![false; width * height],
        }
    }

    /// Build a mask from a `(row, col) -> bool` predicate.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                data.push(f(row, col));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Non-zero pixels become foreground.
    pub fn from_gray(img: &GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw().iter().map(|&v| v != 0).collect(),
        }
    }

    /// Foreground as 255, background as 0.
    pub fn to_gray(&self) -> GrayImage {
        let raw = self.data.iter().map(|&m| if m { 255 } else { 0 }).collect();
        // Length always matches width * height.
        GrayImage::from_raw(self.width as u32, self.height as u32, raw)
            .unwrap_or_else(|| GrayImage::new(self.width as u32, self.height as u32))
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn data(&self) -> &[bool] {
        &self.data
    }

    /// Out-of-range coordinates read as background.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        row < self.height && col < self.width && self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        if row < self.height && col < self.width {
            self.data[row * self.width + col] = value;
        }
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&m| m).count()
    }

    pub fn has_foreground(&self) -> bool {
        self.data.iter().any(|&m| m)
    }

    pub fn invert(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&m| !m).collect(),
        }
    }

    /// Pixel-wise OR; `None` if the shapes differ.
    pub fn union(&self, other: &Mask) -> Option<Self> {
        if self.width != other.width || self.height != other.height {
            return None;
        }
        Some(Self {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| a || b)
                .collect(),
        })
    }

    /// 8-connected component labelling.
    pub fn label(&self) -> LabelMap {
        if self.width == 0 || self.height == 0 {
            return LabelMap {
                width: self.width,
                height: self.height,
                labels: Vec::new(),
            };
        }
        let labelled = connected_components(&self.to_gray(), Connectivity::Eight, Luma([0u8]));
        LabelMap {
            width: self.width,
            height: self.height,
            labels: labelled.into_raw(),
        }
    }
}

/// Connected-component ids co-indexed with a [`Mask`]; 0 is background.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelMap {
    width: usize,
    height: usize,
    labels: Vec<u32>,
}

impl LabelMap {
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u32 {
        if row < self.height && col < self.width {
            self.labels[row * self.width + col]
        } else {
            0
        }
    }

    /// Per-label statistics, ordered by the raster position of each
    /// component's first pixel.
    pub fn regions(&self) -> Vec<Region> {
        let mut slots: HashMap<u32, usize> = HashMap::new();
        let mut regions: Vec<Region> = Vec::new();

        for (idx, &label) in self.labels.iter().enumerate() {
            if label == 0 {
                continue;
            }
            let row = idx / self.width;
            let col = idx % self.width;
            let slot = *slots.entry(label).or_insert_with(|| {
                regions.push(Region {
                    label,
                    area: 0,
                    min_row: row,
                    max_row: row,
                    min_col: col,
                    max_col: col,
                });
                regions.len() - 1
            });
            let r = &mut regions[slot];
            r.area += 1;
            r.min_row = r.min_row.min(row);
            r.max_row = r.max_row.max(row);
            r.min_col = r.min_col.min(col);
            r.max_col = r.max_col.max(col);
        }

        regions
    }

    /// Mask of the pixels whose label satisfies `keep` (never called for 0).
    pub fn select(&self, mut keep: impl FnMut(u32) -> bool) -> Mask {
        let mut cache: HashMap<u32, bool> = HashMap::new();
        let data = self
            .labels
            .iter()
            .map(|&l| l != 0 && *cache.entry(l).or_insert_with(|| keep(l)))
            .collect();
        Mask {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// Statistics of one connected component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub label: u32,
    /// Pixel count.
    pub area: usize,
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
}

impl Region {
    #[inline]
    pub fn rows(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    #[inline]
    pub fn bbox_area(&self) -> usize {
        self.rows() * self.cols()
    }

    /// Area over bounding-box area, in (0, 1].
    #[inline]
    pub fn extent(&self) -> f64 {
        self.area as f64 / self.bbox_area() as f64
    }

    /// Bounding-box rows over columns.
    #[inline]
    pub fn aspect_ratio(&self) -> f64 {
        self.rows() as f64 / self.cols() as f64
    }

    pub fn touches_border(&self, width: usize, height: usize) -> bool {
        self.min_row == 0 || self.min_col == 0 || self.max_row + 1 >= height || self.max_col + 1 >= width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(mask: &mut Mask, rows: std::ops::Range<usize>, cols: std::ops::Range<usize>) {
        for r in rows {
            for c in cols.clone() {
                mask.set(r, c, true);
            }
        }
    }

    #[test]
    fn diagonal_neighbours_share_a_label() {
        let mut mask = Mask::new(5, 5);
        mask.set(1, 1, true);
        mask.set(2, 2, true);
        mask.set(4, 0, true);
        let labels = mask.label();
        assert_eq!(labels.get(1, 1), labels.get(2, 2));
        assert_ne!(labels.get(1, 1), labels.get(4, 0));
        assert_eq!(labels.get(0, 0), 0);
        assert_eq!(labels.regions().len(), 2);
    }

    #[test]
    fn region_statistics() {
        let mut mask = Mask::new(20, 20);
        rect(&mut mask, 2..6, 3..11);
        mask.set(2, 3, false);
        let regions = mask.label().regions();
        assert_eq!(regions.len(), 1);
        let r = regions[0];
        assert_eq!(r.area, 31);
        assert_eq!((r.min_row, r.max_row, r.min_col, r.max_col), (2, 5, 3, 10));
        assert_eq!(r.rows(), 4);
        assert_eq!(r.cols(), 8);
        assert!((r.extent() - 31.0 / 32.0).abs() < 1e-12);
        assert!((r.aspect_ratio() - 0.5).abs() < 1e-12);
        assert!(!r.touches_border(20, 20));
    }

    #[test]
    fn regions_follow_raster_order() {
        let mut mask = Mask::new(30, 30);
        rect(&mut mask, 20..25, 2..6);
        rect(&mut mask, 3..8, 20..24);
        let regions = mask.label().regions();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].min_row, 3);
        assert_eq!(regions[1].min_row, 20);
    }

    #[test]
    fn select_keeps_requested_labels() {
        let mut mask = Mask::new(12, 12);
        rect(&mut mask, 1..3, 1..3);
        rect(&mut mask, 7..11, 7..11);
        let labels = mask.label();
        let big = labels
            .regions()
            .into_iter()
            .find(|r| r.area == 16)
            .expect("big region");
        let only_big = labels.select(|l| l == big.label);
        assert_eq!(only_big.count(), 16);
        assert!(only_big.get(8, 8));
        assert!(!only_big.get(1, 1));
    }

    #[test]
    fn gray_conversion_round_trips() {
        let mask = Mask::from_fn(7, 4, |r, c| (r + c) % 3 == 0);
        let gray = mask.to_gray();
        assert_eq!(gray.dimensions(), (7, 4));
        assert_eq!(gray.get_pixel(3, 0)[0], 255);
        assert_eq!(gray.get_pixel(1, 0)[0], 0);
        assert_eq!(Mask::from_gray(&gray), mask);
    }

    #[test]
    fn invert_and_union() {
        let a = Mask::from_fn(4, 4, |r, _| r < 2);
        let b = a.invert();
        assert_eq!(b.count(), 8);
        assert_eq!(a.union(&b).map(|m| m.count()), Some(16));
        assert!(a.union(&Mask::new(3, 3)).is_none());
    }

    #[test]
    fn out_of_range_reads_background() {
        let mask = Mask::from_fn(3, 3, |_, _| true);
        assert!(!mask.get(3, 0));
        assert!(!mask.get(0, 3));
        assert_eq!(mask.label().get(5, 5), 0);
    }
}
