use crate::Mask;
use facet_plane_core::Centroid;
use imageproc::contours::find_contours;
use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentroidParams {
    /// Contours with fewer boundary points are skipped.
    pub min_contour_points: usize,
}

impl Default for CentroidParams {
    fn default() -> Self {
        Self {
            min_contour_points: 1,
        }
    }
}

/// One centroid per traced contour of a surface mask.
#[derive(Clone, Debug, Default)]
pub struct CentroidExtractor {
    params: CentroidParams,
}

impl CentroidExtractor {
    pub fn new(params: CentroidParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CentroidParams {
        &self.params
    }

    /// Trace outer and hole borders of `mask` and average each border's
    /// points. Output follows contour discovery (raster) order.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, mask)))]
    pub fn extract(&self, mask: &Mask) -> Vec<Centroid> {
        if !mask.has_foreground() {
            return Vec::new();
        }
        let min_points = self.params.min_contour_points.max(1);

        let contours = find_contours::<i32>(&mask.to_gray());
        let total = contours.len();
        let centroids: Vec<Centroid> = contours
            .into_iter()
            .filter(|c| c.points.len() >= min_points)
            .map(|c| {
                let n = c.points.len() as f64;
                let (sum_row, sum_col) = c
                    .points
                    .iter()
                    .fold((0.0, 0.0), |(r, col), p| (r + p.y as f64, col + p.x as f64));
                Centroid::new(sum_row / n, sum_col / n)
            })
            .collect();

        debug!("centroids: {} from {} contours", centroids.len(), total);
        centroids
    }
}
