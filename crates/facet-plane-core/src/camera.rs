use crate::Centroid;
use nalgebra::{Matrix3, Point3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

const SINGULAR_EPS: f64 = 1e-12;
const INVERSE_TOL: f64 = 1e-6;

/// Errors raised when a camera matrix cannot be used for unprojection.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq)]
pub enum CameraModelError {
    #[error("camera matrix contains non-finite entries")]
    NonFinite,
    #[error("camera matrix is singular (det={det})")]
    Singular { det: f64 },
    #[error("supplied inverse does not invert the intrinsics (max deviation {max_deviation})")]
    InverseMismatch { max_deviation: f64 },
}

/// Calibrated pinhole camera: intrinsic matrix `K` and its inverse.
///
/// Validated on construction and immutable afterwards, so one instance can be
/// shared by every frame of a detection session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CameraModelFile", into = "CameraModelFile")]
pub struct CameraModel {
    k: Matrix3<f64>,
    k_inv: Matrix3<f64>,
}

/// Row-major on-disk form of [`CameraModel`]. `inverse` is computed when absent.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct CameraModelFile {
    intrinsics: [[f64; 3]; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inverse: Option<[[f64; 3]; 3]>,
}

impl CameraModel {
    /// Build from `K`, computing the inverse.
    pub fn from_intrinsics(k: Matrix3<f64>) -> Result<Self, CameraModelError> {
        validate_matrix(&k)?;
        let k_inv = k.try_inverse().ok_or(CameraModelError::Singular {
            det: k.determinant(),
        })?;
        Ok(Self { k, k_inv })
    }

    /// Build from an externally supplied `K` / `K^-1` pair.
    pub fn with_inverse(k: Matrix3<f64>, k_inv: Matrix3<f64>) -> Result<Self, CameraModelError> {
        validate_matrix(&k)?;
        validate_matrix(&k_inv)?;
        let max_deviation = (k * k_inv - Matrix3::identity()).amax();
        if max_deviation > INVERSE_TOL {
            return Err(CameraModelError::InverseMismatch { max_deviation });
        }
        Ok(Self { k, k_inv })
    }

    /// Build from `K^-1` alone, recovering `K`.
    pub fn from_inverse(k_inv: Matrix3<f64>) -> Result<Self, CameraModelError> {
        let inverse = Self::from_intrinsics(k_inv)?;
        Ok(Self {
            k: inverse.k_inv,
            k_inv,
        })
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Result<Self, CameraModelError> {
        Self::from_intrinsics(matrix_from_rows(rows))
    }

    /// Classic pinhole intrinsics without skew.
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraModelError> {
        Self::from_intrinsics(Matrix3::new(
            fx, 0.0, cx, //
            0.0, fy, cy, //
            0.0, 0.0, 1.0,
        ))
    }

    pub fn identity() -> Self {
        Self {
            k: Matrix3::identity(),
            k_inv: Matrix3::identity(),
        }
    }

    #[inline]
    pub fn intrinsics(&self) -> &Matrix3<f64> {
        &self.k
    }

    #[inline]
    pub fn inverse(&self) -> &Matrix3<f64> {
        &self.k_inv
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        rows_from_matrix(&self.k)
    }

    /// Same as the free [`unproject`] with the stored inverse. The model is
    /// already validated, so this cannot fail.
    pub fn unproject(&self, centroids: &[Centroid]) -> Vec<Point3<f64>> {
        centroids.iter().map(|c| lift(&self.k_inv, c)).collect()
    }
}

impl Default for CameraModel {
    fn default() -> Self {
        Self::identity()
    }
}

impl TryFrom<CameraModelFile> for CameraModel {
    type Error = CameraModelError;

    fn try_from(file: CameraModelFile) -> Result<Self, Self::Error> {
        let k = matrix_from_rows(file.intrinsics);
        match file.inverse {
            Some(inv) => Self::with_inverse(k, matrix_from_rows(inv)),
            None => Self::from_intrinsics(k),
        }
    }
}

impl From<CameraModel> for CameraModelFile {
    fn from(model: CameraModel) -> Self {
        Self {
            intrinsics: rows_from_matrix(&model.k),
            inverse: Some(rows_from_matrix(&model.k_inv)),
        }
    }
}

/// Map pixel centroids to 3-D points: the row vector `(col, row, 1)`
/// right-multiplied by the camera inverse.
///
/// The output is one-to-one with the input and keeps its order. The matrix is
/// checked once on entry. `z` comes out of the product, so for a pinhole
/// camera it varies with the pixel position; metric scale is left to the
/// plane fit.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(centroids, camera_inverse), fields(n = centroids.len()))
)]
pub fn unproject(
    centroids: &[Centroid],
    camera_inverse: &Matrix3<f64>,
) -> Result<Vec<Point3<f64>>, CameraModelError> {
    validate_matrix(camera_inverse)?;
    Ok(centroids.iter().map(|c| lift(camera_inverse, c)).collect())
}

/// `(col, row, 1) * K^-1`, written as `K^-T * (col, row, 1)^T`.
#[inline]
fn lift(k_inv: &Matrix3<f64>, c: &Centroid) -> Point3<f64> {
    Point3::from(k_inv.tr_mul(&c.homogeneous()))
}

fn validate_matrix(m: &Matrix3<f64>) -> Result<(), CameraModelError> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(CameraModelError::NonFinite);
    }
    let det = m.determinant();
    if det.abs() < SINGULAR_EPS {
        return Err(CameraModelError::Singular { det });
    }
    Ok(())
}

fn matrix_from_rows(rows: [[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::from_row_slice(&[
        rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
        rows[2][1], rows[2][2],
    ])
}

fn rows_from_matrix(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_unprojection_swaps_to_col_row() {
        let pts = CameraModel::identity().unproject(&[Centroid::new(10.0, 20.0)]);
        assert_eq!(pts.len(), 1);
        assert_relative_eq!(pts[0].x, 20.0);
        assert_relative_eq!(pts[0].y, 10.0);
        assert_relative_eq!(pts[0].z, 1.0);
    }

    #[test]
    fn pinhole_depth_depends_on_pixel_position() {
        let cam = CameraModel::pinhole(800.0, 600.0, 320.0, 240.0).expect("valid intrinsics");
        let pts = cam.unproject(&[Centroid::new(240.0, 320.0), Centroid::new(840.0, 1120.0)]);
        assert_relative_eq!(pts[0].x, 0.4, epsilon = 1e-12);
        assert_relative_eq!(pts[0].y, 0.4, epsilon = 1e-12);
        assert_relative_eq!(pts[0].z, 1.0 - 128.0 - 96.0, epsilon = 1e-9);
        assert_relative_eq!(pts[1].x, 1.4, epsilon = 1e-12);
        assert_relative_eq!(pts[1].y, 1.4, epsilon = 1e-12);
        assert_relative_eq!(pts[1].z, 1.0 - 448.0 - 336.0, epsilon = 1e-9);
    }

    #[test]
    fn unprojection_is_a_row_vector_product() {
        let k_inv = Matrix3::new(
            0.5, 0.1, -2.0, //
            0.2, 0.25, 3.0, //
            0.01, -0.02, 1.0,
        );
        let c = Centroid::new(7.0, 11.0);
        let pts = unproject(&[c], &k_inv).expect("valid inverse");
        let expected = nalgebra::RowVector3::new(11.0, 7.0, 1.0) * k_inv;
        assert_relative_eq!(pts[0].x, expected[0], epsilon = 1e-12);
        assert_relative_eq!(pts[0].y, expected[1], epsilon = 1e-12);
        assert_relative_eq!(pts[0].z, expected[2], epsilon = 1e-12);
        assert!((pts[0].x - (k_inv * c.homogeneous()).x).abs() > 1.0);
    }

    #[test]
    fn unproject_preserves_count_and_order() {
        let cam = CameraModel::pinhole(500.0, 500.0, 100.0, 50.0).expect("valid intrinsics");
        let centroids: Vec<Centroid> = (0..7)
            .map(|k| Centroid::new(k as f64 * 3.0, 100.0 - k as f64 * 11.0))
            .collect();
        let pts = unproject(&centroids, cam.inverse()).expect("valid inverse");
        assert_eq!(pts.len(), centroids.len());
        for (p, c) in pts.iter().zip(&centroids) {
            assert_relative_eq!(p.x, c.col / 500.0, epsilon = 1e-12);
            assert_relative_eq!(p.y, c.row / 500.0, epsilon = 1e-12);
            assert_relative_eq!(p.z, 1.0 - 0.2 * c.col - 0.1 * c.row, epsilon = 1e-9);
        }
    }

    #[test]
    fn unproject_empty_input_is_empty() {
        let pts = unproject(&[], &Matrix3::identity()).expect("identity is valid");
        assert!(pts.is_empty());
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let k = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0);
        assert!(matches!(
            CameraModel::from_intrinsics(k),
            Err(CameraModelError::Singular { .. })
        ));
        assert!(matches!(
            unproject(&[Centroid::new(1.0, 1.0)], &k),
            Err(CameraModelError::Singular { .. })
        ));
    }

    #[test]
    fn non_finite_matrix_is_rejected() {
        let mut k = Matrix3::identity();
        k[(0, 2)] = f64::NAN;
        assert_eq!(
            CameraModel::from_intrinsics(k),
            Err(CameraModelError::NonFinite)
        );
    }

    #[test]
    fn mismatched_inverse_is_rejected() {
        let k = Matrix3::new(2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0);
        assert!(matches!(
            CameraModel::with_inverse(k, Matrix3::identity()),
            Err(CameraModelError::InverseMismatch { .. })
        ));
        let inv = k.try_inverse().expect("invertible");
        assert!(CameraModel::with_inverse(k, inv).is_ok());
    }

    #[test]
    fn from_inverse_recovers_intrinsics() {
        let cam = CameraModel::pinhole(640.0, 480.0, 320.0, 240.0).expect("valid intrinsics");
        let back = CameraModel::from_inverse(*cam.inverse()).expect("valid inverse");
        assert_relative_eq!(*back.intrinsics(), *cam.intrinsics(), epsilon = 1e-9);
        assert!(CameraModel::from_inverse(Matrix3::zeros()).is_err());
    }

    #[test]
    fn json_without_inverse_computes_it() {
        let raw = r#"{"intrinsics": [[400.0, 0.0, 200.0], [0.0, 400.0, 150.0], [0.0, 0.0, 1.0]]}"#;
        let cam: CameraModel = serde_json::from_str(raw).expect("parse camera");
        let product = cam.intrinsics() * cam.inverse();
        assert_relative_eq!(product, Matrix3::identity(), epsilon = 1e-12);
        assert_eq!(cam.to_array()[0][2], 200.0);
    }

    #[test]
    fn json_with_singular_intrinsics_fails() {
        let raw = r#"{"intrinsics": [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]}"#;
        assert!(serde_json::from_str::<CameraModel>(raw).is_err());
    }
}
