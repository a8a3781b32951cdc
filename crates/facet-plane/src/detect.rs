//! End-to-end pipeline: frame → surface mask → centroids → 3-D points → plane.

use crate::core::{
    CameraModel, CameraModelError, Centroid, PlaneEstimate, PlaneEstimator, RansacParams,
};
use crate::segment::{
    CentroidExtractor, CentroidParams, FrameSegmenter, Mask, RegionFilter, RegionFilterParams,
    SegmenterParams,
};
use image::RgbImage;
use log::{debug, warn};
use nalgebra::{Matrix3, Point3};
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Pipeline stage that can come back empty-handed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Segmentation,
    RegionFilter,
    Centroids,
    PlaneFit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Segmentation => "segmentation",
            Stage::RegionFilter => "region filter",
            Stage::Centroids => "centroid extraction",
            Stage::PlaneFit => "plane fit",
        };
        f.write_str(name)
    }
}

/// Errors produced by the end-to-end pipeline.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    /// A stage found nothing; later stages were not run.
    #[error("nothing found at the {stage} stage")]
    NotFound { stage: Stage },

    #[error("invalid camera model: {0}")]
    InvalidCameraModel(#[from] CameraModelError),
}

impl DetectError {
    /// The stage that came back empty, if this is a not-found outcome.
    pub fn not_found_stage(&self) -> Option<Stage> {
        match self {
            DetectError::NotFound { stage } => Some(*stage),
            DetectError::InvalidCameraModel(_) => None,
        }
    }
}

fn not_found(stage: Stage) -> DetectError {
    warn!("no result at the {stage} stage");
    DetectError::NotFound { stage }
}

/// Parameters of every stage, loadable from one JSON document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub segment: SegmenterParams,
    pub region: RegionFilterParams,
    pub centroid: CentroidParams,
    pub ransac: RansacParams,
}

/// Everything the pipeline derived from one frame.
#[derive(Clone, Debug)]
pub struct PlaneDetection {
    /// Consolidated facet cluster the centroids were traced on.
    pub mask: Mask,
    pub centroids: Vec<Centroid>,
    /// `centroids` lifted through the camera inverse, same order.
    pub points: Vec<Point3<f64>>,
    pub estimate: PlaneEstimate,
}

/// Facet surface of one frame before any 3-D reasoning.
#[derive(Clone, Debug)]
pub struct SurfaceCentroids {
    pub mask: Mask,
    pub centroids: Vec<Centroid>,
}

/// Stage-by-stage dominant-plane detector.
///
/// Holds only immutable configuration and the camera model, so one instance
/// serves any number of frames.
#[derive(Clone, Debug)]
pub struct PlaneDetector {
    camera: CameraModel,
    segmenter: FrameSegmenter,
    region_filter: RegionFilter,
    extractor: CentroidExtractor,
    estimator: PlaneEstimator,
}

impl PlaneDetector {
    pub fn new(params: DetectorParams, camera: CameraModel) -> Self {
        Self {
            camera,
            segmenter: FrameSegmenter::new(params.segment),
            region_filter: RegionFilter::new(params.region),
            extractor: CentroidExtractor::new(params.centroid),
            estimator: PlaneEstimator::new(params.ransac),
        }
    }

    /// Build from a raw intrinsic matrix, validating it first.
    pub fn from_intrinsics(params: DetectorParams, k: Matrix3<f64>) -> Result<Self, DetectError> {
        Ok(Self::new(params, CameraModel::from_intrinsics(k)?))
    }

    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    /// Segment, filter and trace: the image-side half of the pipeline.
    pub fn locate(&self, frame: &RgbImage) -> Result<SurfaceCentroids, DetectError> {
        let candidates = self
            .segmenter
            .segment(frame)
            .ok_or_else(|| not_found(Stage::Segmentation))?;
        let mask = self
            .region_filter
            .filter(&candidates)
            .ok_or_else(|| not_found(Stage::RegionFilter))?;
        let centroids = self.extractor.extract(&mask);
        if centroids.is_empty() {
            return Err(not_found(Stage::Centroids));
        }
        Ok(SurfaceCentroids { mask, centroids })
    }

    /// Unproject `centroids` and fit the dominant plane to them.
    pub fn fit(
        &self,
        centroids: &[Centroid],
    ) -> Result<(Vec<Point3<f64>>, PlaneEstimate), DetectError> {
        let points = self.camera.unproject(centroids);
        let estimate = self
            .estimator
            .estimate(&points)
            .ok_or_else(|| not_found(Stage::PlaneFit))?;
        Ok((points, estimate))
    }

    /// Run the full pipeline on one frame.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(width = frame.width(), height = frame.height()))
    )]
    pub fn detect(&self, frame: &RgbImage) -> Result<PlaneDetection, DetectError> {
        let SurfaceCentroids { mask, centroids } = self.locate(frame)?;
        debug!("{} centroids located", centroids.len());
        let (points, estimate) = self.fit(&centroids)?;
        Ok(PlaneDetection {
            mask,
            centroids,
            points,
            estimate,
        })
    }
}

/// One-shot helper taking the camera inverse directly.
///
/// The matrix is validated before any image work is done.
pub fn detect_plane(
    frame: &RgbImage,
    camera_inverse: &Matrix3<f64>,
    params: &DetectorParams,
) -> Result<PlaneDetection, DetectError> {
    let camera = CameraModel::from_inverse(*camera_inverse)?;
    PlaneDetector::new(params.clone(), camera).detect(frame)
}
