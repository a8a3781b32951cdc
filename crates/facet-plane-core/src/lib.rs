//! Geometric core for dominant-plane estimation.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any image type: it takes 2-D centroids produced by an image-side
//! stage, lifts them through a calibrated camera model, and fits a plane to
//! the resulting 3-D points with a residual-scored RANSAC.

mod camera;
mod centroid;
mod logger;
mod plane;
mod ransac;

pub use camera::{unproject, CameraModel, CameraModelError};
pub use centroid::Centroid;
pub use plane::{fit_plane_least_squares, Plane};
pub use ransac::{
    ransac_trial_count, PlaneEstimate, PlaneEstimator, RansacParams, DEFAULT_SUCCESS_PROBABILITY,
    MINIMAL_SAMPLE_SIZE,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
