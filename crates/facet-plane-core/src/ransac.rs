//! Residual-scored RANSAC plane estimation.
//!
//! Each trial fits an exact plane through a random minimal sample and scores
//! it by the summed absolute distance of *all* points. The lowest score wins;
//! there is no inlier-count criterion during the search. An inlier partition
//! is derived afterwards from the winning plane for callers that want one.

use crate::plane::{fit_plane_least_squares, Plane};
use log::debug;
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Points needed to fit one candidate plane.
pub const MINIMAL_SAMPLE_SIZE: usize = 3;

/// Point sets up to this size use a fixed trial budget; larger sets use it as
/// the assumed worst-case inlier count.
const SMALL_SET_LEN: usize = 9;
const SMALL_SET_TRIALS: usize = 10;

/// Default target probability of drawing at least one all-inlier sample.
pub const DEFAULT_SUCCESS_PROBABILITY: f64 = 0.9999;

/// Parameters of the plane RANSAC.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Target probability of drawing at least one all-inlier sample.
    pub success_probability: f64,
    /// Distance threshold for the inlier partition of the final plane.
    pub inlier_threshold: f64,
    /// Fixed RNG seed; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            success_probability: DEFAULT_SUCCESS_PROBABILITY,
            inlier_threshold: 0.05,
            seed: None,
        }
    }
}

/// Winning plane of a RANSAC run plus the partition it induces.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaneEstimate {
    pub plane: Plane,
    /// Number of trials the run was budgeted.
    pub trials: usize,
    /// `true` for points within `inlier_threshold` of `plane`.
    pub inlier_mask: Vec<bool>,
    pub n_inliers: usize,
}

impl PlaneEstimate {
    pub fn inliers(&self) -> Vec<usize> {
        self.indices_where(true)
    }

    pub fn outliers(&self) -> Vec<usize> {
        self.indices_where(false)
    }

    fn indices_where(&self, inlier: bool) -> Vec<usize> {
        self.inlier_mask
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| (m == inlier).then_some(i))
            .collect()
    }
}

/// Number of RANSAC trials for `n` points.
///
/// `n <= 9` always gets 10 trials. Otherwise the inlier fraction is taken as
/// `u = 9 / n` and the budget is `ceil(ln(1 - p) / ln(1 - u^3)) + 1`.
/// `p` is clamped to `[0, 1)`; a non-finite `p` is replaced by
/// [`DEFAULT_SUCCESS_PROBABILITY`].
pub fn ransac_trial_count(n: usize, success_probability: f64) -> usize {
    if n <= SMALL_SET_LEN {
        return SMALL_SET_TRIALS;
    }
    let p = if success_probability.is_finite() {
        success_probability
    } else {
        DEFAULT_SUCCESS_PROBABILITY
    }
    .clamp(0.0, 1.0 - f64::EPSILON);
    let u = SMALL_SET_LEN as f64 / n as f64;
    let trials = ((1.0 - p).ln() / (1.0 - u.powi(3)).ln()).ceil();
    (trials as usize).saturating_add(1)
}

/// Plane estimator; holds only its immutable parameters.
#[derive(Clone, Debug, Default)]
pub struct PlaneEstimator {
    params: RansacParams,
}

impl PlaneEstimator {
    pub fn new(params: RansacParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RansacParams {
        &self.params
    }

    /// Fit the lowest-residual plane to `points`.
    ///
    /// Returns `None` for fewer than [`MINIMAL_SAMPLE_SIZE`] points or when no
    /// trial produced a finite candidate.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, points), fields(n = points.len()))
    )]
    pub fn estimate(&self, points: &[Point3<f64>]) -> Option<PlaneEstimate> {
        let n = points.len();
        if n < MINIMAL_SAMPLE_SIZE {
            debug!("plane fit needs {MINIMAL_SAMPLE_SIZE} points, got {n}");
            return None;
        }

        let trials = ransac_trial_count(n, self.params.success_probability);
        let mut rng = match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut best: Option<Plane> = None;
        let mut sample = [Point3::origin(); MINIMAL_SAMPLE_SIZE];

        for _ in 0..trials {
            let picked = rand::seq::index::sample(&mut rng, n, MINIMAL_SAMPLE_SIZE);
            for (slot, idx) in sample.iter_mut().zip(picked.iter()) {
                *slot = points[idx];
            }

            let Some(candidate) = fit_plane_least_squares(&sample) else {
                continue;
            };
            let candidate = candidate.scored(points);
            if !candidate.residual.is_finite() {
                continue;
            }
            if best.is_none_or(|b| candidate.residual < b.residual) {
                best = Some(candidate);
            }
        }

        let plane = best?;
        let threshold = self.params.inlier_threshold;
        let inlier_mask: Vec<bool> = points
            .iter()
            .map(|p| plane.signed_distance(p).abs() <= threshold)
            .collect();
        let n_inliers = inlier_mask.iter().filter(|&&m| m).count();

        debug!(
            "plane a={:.4} b={:.4} c={:.4} residual={:.4e} inliers={n_inliers}/{n} trials={trials}",
            plane.a(),
            plane.b(),
            plane.c(),
            plane.residual
        );

        Some(PlaneEstimate {
            plane,
            trials,
            inlier_mask,
            n_inliers,
        })
    }
}
