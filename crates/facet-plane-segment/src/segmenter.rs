use crate::contrast::{equalize_adaptive, ClaheParams};
use crate::morphology::{clear_border, dilate, remove_small_objects};
use crate::Mask;
use image::{GrayImage, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Parameters for [`FrameSegmenter`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterParams {
    /// Local contrast normalization; `None` skips it.
    pub contrast: Option<ClaheParams>,
    /// Gaussian sigma applied before the edge detector (which adds its own
    /// light smoothing). `<= 0` disables it.
    pub edge_sigma: f32,
    /// Canny hysteresis thresholds on the Sobel gradient magnitude.
    pub canny_low: f32,
    pub canny_high: f32,
    /// Chebyshev radius used to thicken edges and close small gaps.
    pub dilate_radius: u8,
    /// Candidate components smaller than this are treated as noise.
    pub min_object_size: usize,
    /// Drop candidate components cut by the frame border.
    pub clear_border: bool,
}

impl Default for SegmenterParams {
    fn default() -> Self {
        Self {
            contrast: Some(ClaheParams::default()),
            edge_sigma: 2.0,
            canny_low: 20.0,
            canny_high: 50.0,
            dilate_radius: 2,
            min_object_size: 150,
            clear_border: true,
        }
    }
}

/// Frame to candidate-surface mask.
///
/// Flat areas enclosed by edges become foreground; edges, noise specks and
/// anything touching the border do not.
#[derive(Clone, Debug, Default)]
pub struct FrameSegmenter {
    params: SegmenterParams,
}

impl FrameSegmenter {
    pub fn new(params: SegmenterParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SegmenterParams {
        &self.params
    }

    /// Segment an RGB frame. `None` means no candidate pixel survived.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(width = frame.width(), height = frame.height()))
    )]
    pub fn segment(&self, frame: &RgbImage) -> Option<Mask> {
        self.segment_luma(&image::imageops::grayscale(frame))
    }

    /// Same as [`segment`](Self::segment) for an already single-channel frame.
    pub fn segment_luma(&self, luma: &GrayImage) -> Option<Mask> {
        let p = &self.params;

        let normalized = match &p.contrast {
            Some(clahe) => equalize_adaptive(luma, clahe),
            None => luma.clone(),
        };
        let smoothed = if p.edge_sigma > 0.0 {
            gaussian_blur_f32(&normalized, p.edge_sigma)
        } else {
            normalized
        };

        let (low, high) = (p.canny_low.min(p.canny_high), p.canny_high.max(p.canny_low));
        let edges = dilate(&Mask::from_gray(&canny(&smoothed, low, high)), p.dilate_radius);

        let mut candidates = remove_small_objects(&edges.invert(), p.min_object_size);
        if p.clear_border {
            candidates = clear_border(&candidates);
        }

        let remaining = candidates.count();
        debug!(
            "segmentation: {} edge px, {} candidate px",
            edges.count(),
            remaining
        );
        if remaining == 0 {
            return None;
        }
        Some(candidates)
    }
}
