use nalgebra::{DMatrix, DVector, Point3, Vector3};
use serde::{Deserialize, Serialize};

const PINV_EPS: f64 = 1e-12;

/// Plane `z = a*x + b*y + c` with its unit normal and fit residual.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// `(a, b, c)`.
    pub coefficients: Vector3<f64>,
    /// Unit vector along `(a, b, -1)`.
    pub normal: Vector3<f64>,
    /// Sum of absolute point distances of the point set this plane was scored on.
    pub residual: f64,
}

impl Plane {
    /// Plane from raw coefficients; the residual starts at zero.
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        let raw = Vector3::new(a, b, -1.0);
        Self {
            coefficients: Vector3::new(a, b, c),
            normal: raw / raw.norm(),
            residual: 0.0,
        }
    }

    #[inline]
    pub fn a(&self) -> f64 {
        self.coefficients.x
    }

    #[inline]
    pub fn b(&self) -> f64 {
        self.coefficients.y
    }

    #[inline]
    pub fn c(&self) -> f64 {
        self.coefficients.z
    }

    /// Height of the plane above `(x, y)`.
    #[inline]
    pub fn z_at(&self, x: f64, y: f64) -> f64 {
        self.a() * x + self.b() * y + self.c()
    }

    /// Signed orthogonal distance; positive below the plane (z smaller than the model).
    #[inline]
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        let scale = (self.a() * self.a() + self.b() * self.b() + 1.0).sqrt();
        self.normal.dot(&p.coords) + self.c() / scale
    }

    /// Sum of absolute signed distances over `points`.
    pub fn residual_sum(&self, points: &[Point3<f64>]) -> f64 {
        points.iter().map(|p| self.signed_distance(p).abs()).sum()
    }

    /// Copy of this plane whose residual is re-scored on `points`.
    pub fn scored(mut self, points: &[Point3<f64>]) -> Self {
        self.residual = self.residual_sum(points);
        self
    }
}

/// Least-squares fit of `z ~ a*x + b*y + c` through the pseudo-inverse of the
/// design matrix with rows `[x, y, 1]`.
///
/// Degenerate inputs (collinear points) still produce the minimum-norm
/// solution. Returns `None` for fewer than 3 points or a non-finite solution.
pub fn fit_plane_least_squares(points: &[Point3<f64>]) -> Option<Plane> {
    if points.len() < 3 {
        return None;
    }

    let n = points.len();
    let mut a = DMatrix::<f64>::zeros(n, 3);
    let mut z = DVector::<f64>::zeros(n);
    for (k, p) in points.iter().enumerate() {
        a[(k, 0)] = p.x;
        a[(k, 1)] = p.y;
        a[(k, 2)] = 1.0;
        z[k] = p.z;
    }

    let pinv = a.pseudo_inverse(PINV_EPS).ok()?;
    let coeffs = pinv * z;
    if coeffs.iter().any(|v| !v.is_finite()) {
        return None;
    }

    Some(Plane::new(coeffs[0], coeffs[1], coeffs[2]).scored(points))
}
