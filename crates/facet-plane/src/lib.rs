//! High-level facade for the `facet-plane-*` workspace.
//!
//! This crate provides:
//! - re-exports of the geometric core and the image-side stages
//! - [`detect::PlaneDetector`], the end-to-end pipeline from an RGB frame to
//!   a dominant-plane estimate
//! - [`overlay`], a debug rendering of detected centroids
//!
//! ## Quickstart
//!
//! ```no_run
//! use facet_plane::detect::{DetectorParams, PlaneDetector};
//! use facet_plane::core::CameraModel;
//! use image::ImageReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let frame = ImageReader::open("cube.png")?.decode()?.to_rgb8();
//! let camera = CameraModel::pinhole(800.0, 800.0, 320.0, 240.0)?;
//! let detector = PlaneDetector::new(DetectorParams::default(), camera);
//!
//! match detector.detect(&frame) {
//!     Ok(found) => println!("normal: {:?}", found.estimate.plane.normal),
//!     Err(err) => println!("no plane: {err}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `facet_plane::core`: centroids, planes, camera model, RANSAC.
//! - `facet_plane::segment`: masks, segmentation, region filtering, contours.
//! - `facet_plane::detect`: the end-to-end pipeline and its error type.
//! - `facet_plane::overlay`: centroid visualization.

pub use facet_plane_core as core;
pub use facet_plane_segment as segment;

pub use facet_plane_core::{CameraModel, Centroid, Plane, PlaneEstimate};

pub mod detect;
pub mod overlay;

pub use detect::{
    detect_plane, DetectError, DetectorParams, PlaneDetection, PlaneDetector, Stage,
    SurfaceCentroids,
};
