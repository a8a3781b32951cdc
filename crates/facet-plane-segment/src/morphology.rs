//! Binary morphology and component cleanup on [`Mask`].

use crate::Mask;
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use std::collections::HashSet;

/// Dilation with a square (Chebyshev) neighborhood of the given radius.
pub fn dilate(mask: &Mask, radius: u8) -> Mask {
    if radius == 0 || !mask.has_foreground() {
        return mask.clone();
    }
    Mask::from_gray(&morphology::dilate(&mask.to_gray(), Norm::LInf, radius))
}

/// Closing (dilate then erode) with a Euclidean disk of the given radius.
pub fn close(mask: &Mask, radius: u8) -> Mask {
    if radius == 0 || !mask.has_foreground() {
        return mask.clone();
    }
    Mask::from_gray(&morphology::close(&mask.to_gray(), Norm::L2, radius))
}

/// Drop 8-connected components with fewer than `min_size` pixels.
pub fn remove_small_objects(mask: &Mask, min_size: usize) -> Mask {
    if min_size <= 1 {
        return mask.clone();
    }
    let labels = mask.label();
    let keep: HashSet<u32> = labels
        .regions()
        .into_iter()
        .filter(|r| r.area >= min_size)
        .map(|r| r.label)
        .collect();
    labels.select(|l| keep.contains(&l))
}

/// Drop every 8-connected component that touches the image border.
pub fn clear_border(mask: &Mask) -> Mask {
    let (w, h) = (mask.width(), mask.height());
    let labels = mask.label();
    let touching: HashSet<u32> = labels
        .regions()
        .into_iter()
        .filter(|r| r.touches_border(w, h))
        .map(|r| r.label)
        .collect();
    labels.select(|l| !touching.contains(&l))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(width: usize, height: usize, r0: usize, c0: usize, side: usize) -> Mask {
        Mask::from_fn(width, height, |r, c| {
            (r0..r0 + side).contains(&r) && (c0..c0 + side).contains(&c)
        })
    }

    #[test]
    fn dilate_grows_a_pixel_into_a_square() {
        let mut mask = Mask::new(9, 9);
        mask.set(4, 4, true);
        let grown = dilate(&mask, 2);
        assert_eq!(grown.count(), 25);
        assert!(grown.get(2, 2));
        assert!(grown.get(6, 6));
        assert!(!grown.get(1, 4));
    }

    #[test]
    fn close_fills_a_narrow_gap() {
        let mut mask = square(40, 20, 5, 5, 10);
        let right = square(40, 20, 5, 17, 10);
        mask = mask.union(&right).expect("same shape");
        assert_eq!(mask.label().regions().len(), 2);
        let closed = close(&mask, 4);
        assert_eq!(closed.label().regions().len(), 1);
        assert!(closed.get(10, 16));
    }

    #[test]
    fn close_keeps_a_lone_square() {
        let mask = square(50, 50, 10, 10, 20);
        assert_eq!(close(&mask, 5), mask);
    }

    #[test]
    fn removes_only_small_components() {
        let mut mask = square(30, 30, 2, 2, 10);
        mask.set(25, 25, true);
        mask.set(25, 26, true);
        let cleaned = remove_small_objects(&mask, 5);
        assert_eq!(cleaned.count(), 100);
        assert!(!cleaned.get(25, 25));
    }

    #[test]
    fn clears_border_components() {
        let mut mask = square(30, 30, 0, 5, 4);
        let inner = square(30, 30, 12, 12, 6);
        mask = mask.union(&inner).expect("same shape");
        mask.set(29, 29, true);
        let cleared = clear_border(&mask);
        assert_eq!(cleared, inner);
    }

    #[test]
    fn zero_radius_is_identity() {
        let mask = square(10, 10, 2, 2, 3);
        assert_eq!(dilate(&mask, 0), mask);
        assert_eq!(close(&mask, 0), mask);
    }
}
