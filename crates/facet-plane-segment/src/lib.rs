//! Image-side stages of facet-plane.
//!
//! Turns an RGB frame into a set of facet centroids:
//! 1. [`FrameSegmenter`]: luma, adaptive equalization, Canny edges, dilation,
//!    inversion, small-object and border removal.
//! 2. [`RegionFilter`]: keeps compact, roughly square regions, merges them,
//!    closes the merged mask and keeps its largest cluster.
//! 3. [`CentroidExtractor`]: traces contours of the cluster and averages each
//!    contour's points.
//!
//! Every stage returns a freshly allocated result; `None` means "nothing
//! found in this frame".

mod centroids;
mod contrast;
mod mask;
mod morphology;
mod region_filter;
mod segmenter;

pub use centroids::{CentroidExtractor, CentroidParams};
pub use contrast::{equalize_adaptive, ClaheParams};
pub use mask::{LabelMap, Mask, Region};
pub use morphology::{clear_border, close, dilate, remove_small_objects};
pub use region_filter::{largest_component, RegionFilter, RegionFilterParams};
pub use segmenter::{FrameSegmenter, SegmenterParams};
