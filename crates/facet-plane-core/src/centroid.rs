use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Mean of a contour's points, in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub row: f64,
    pub col: f64,
}

impl Centroid {
    pub fn new(row: f64, col: f64) -> Self {
        Self { row, col }
    }

    /// Homogeneous pixel vector `(col, row, 1)`.
    #[inline]
    pub fn homogeneous(&self) -> Vector3<f64> {
        Vector3::new(self.col, self.row, 1.0)
    }
}
