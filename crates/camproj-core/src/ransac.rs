//! Generic random-sample-consensus loop.
//!
//! Implement [`Estimator`] for a model and call [`ransac`] with the data and
//! [`RansacOptions`]. The loop never panics: when no consensus is found the
//! returned [`RansacResult`] has `model == None`.

use rand::prelude::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};

/// Configuration of the consensus loop.
#[derive(Debug, Clone)]
pub struct RansacOptions {
    /// Hard cap on the number of sampled hypotheses.
    pub max_iters: usize,
    /// Inlier residual threshold (same units as [`Estimator::residual`]).
    pub thresh: f64,
    /// Minimum consensus size for a hypothesis to be accepted.
    pub min_inliers: usize,
    /// Desired probability in `[0, 1)` of drawing at least one all-inlier sample.
    pub confidence: f64,
    /// Seed of the sampling RNG; the same seed and data give the same result.
    pub seed: u64,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            thresh: 3.0,
            min_inliers: 4,
            confidence: 0.995,
            seed: 0x5eed,
        }
    }
}

/// Outcome of a consensus run.
#[derive(Debug, Clone)]
pub struct RansacResult<M> {
    /// Best model, refitted on its consensus set when [`Estimator::refit`] succeeds.
    pub model: Option<M>,
    /// Indices of the data points within `thresh` of `model`.
    pub inliers: Vec<usize>,
    /// Root-mean-square residual over `inliers`.
    pub inlier_rms: f64,
    /// Hypotheses drawn (degenerate samples included).
    pub iters: usize,
}

impl<M> Default for RansacResult<M> {
    fn default() -> Self {
        Self {
            model: None,
            inliers: Vec::new(),
            inlier_rms: f64::INFINITY,
            iters: 0,
        }
    }
}

impl<M> RansacResult<M> {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.model.is_some()
    }
}

/// A model that can be fitted from a minimal sample and scored per datum.
pub trait Estimator {
    type Datum;
    type Model;

    /// Size of a minimal sample.
    const MIN_SAMPLES: usize;

    /// Fit a model from exactly `MIN_SAMPLES` indices; `None` if the fit fails.
    fn fit(data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual of one datum under `model`.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    /// Cheap rejection of samples that cannot yield a valid model.
    fn is_degenerate(_data: &[Self::Datum], _sample: &[usize]) -> bool {
        false
    }

    /// Least-squares fit over a consensus set. Default: no refit.
    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

/// Residuals under `model`, split into inlier indices and their residuals.
fn consensus<E: Estimator>(
    data: &[E::Datum],
    model: &E::Model,
    thresh: f64,
    inliers: &mut Vec<usize>,
    residuals: &mut Vec<f64>,
) {
    inliers.clear();
    residuals.clear();
    for (i, datum) in data.iter().enumerate() {
        let r = E::residual(model, datum);
        if r.is_finite() && r <= thresh {
            inliers.push(i);
            residuals.push(r);
        }
    }
}

fn rms(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::INFINITY;
    }
    let ss: f64 = vals.iter().map(|&v| v * v).sum();
    (ss / (vals.len() as f64)).sqrt()
}

/// Number of iterations needed to reach `confidence` at the observed inlier ratio.
fn required_iterations(
    confidence: f64,
    inlier_ratio: f64,
    min_samples: usize,
    iters_so_far: usize,
    max_iters: usize,
) -> usize {
    if !(0.0..1.0).contains(&confidence) || inlier_ratio <= 0.0 {
        return max_iters;
    }
    let all_inlier_sample = inlier_ratio.powi(min_samples as i32);
    let denom = (1.0 - all_inlier_sample).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }
    let n = ((1.0 - confidence).ln() / denom).ceil();
    if !n.is_finite() {
        return max_iters;
    }
    (n as usize).clamp(iters_so_far, max_iters)
}

fn beats(count: usize, rms: f64, best: &RansacResult<impl Sized>) -> bool {
    best.model.is_none()
        || count > best.inliers.len()
        || (count == best.inliers.len() && rms < best.inlier_rms)
}

/// Run the consensus loop for estimator `E`.
///
/// After the sampling phase the best hypothesis is refitted on its inliers
/// ([`Estimator::refit`]); the refit is kept only if it does not shrink the
/// consensus set.
pub fn ransac<E: Estimator>(data: &[E::Datum], opts: &RansacOptions) -> RansacResult<E::Model> {
    let mut best: RansacResult<E::Model> = RansacResult::default();
    let min_inliers = opts.min_inliers.max(E::MIN_SAMPLES);

    if data.len() < E::MIN_SAMPLES || E::MIN_SAMPLES == 0 {
        return best;
    }

    let all_indices: Vec<usize> = (0..data.len()).collect();
    let mut sample = Vec::with_capacity(E::MIN_SAMPLES);
    let mut rng = StdRng::seed_from_u64(opts.seed);

    let mut inliers = Vec::with_capacity(data.len());
    let mut residuals = Vec::with_capacity(data.len());

    let mut iter_budget = opts.max_iters;
    let mut iters = 0;
    while iters < iter_budget {
        iters += 1;

        sample.clear();
        sample.extend(all_indices.choose_multiple(&mut rng, E::MIN_SAMPLES).copied());

        if E::is_degenerate(data, &sample) {
            continue;
        }
        let Some(model) = E::fit(data, &sample) else {
            continue;
        };

        consensus::<E>(data, &model, opts.thresh, &mut inliers, &mut residuals);
        if inliers.len() < min_inliers {
            continue;
        }

        let score = rms(&residuals);
        if beats(inliers.len(), score, &best) {
            best.model = Some(model);
            best.inliers.clone_from(&inliers);
            best.inlier_rms = score;

            let ratio = inliers.len() as f64 / data.len() as f64;
            iter_budget =
                required_iterations(opts.confidence, ratio, E::MIN_SAMPLES, iters, opts.max_iters);
        }
    }
    best.iters = iters;

    if best.model.is_some() {
        if let Some(refined) = E::refit(data, &best.inliers) {
            consensus::<E>(data, &refined, opts.thresh, &mut inliers, &mut residuals);
            if inliers.len() >= best.inliers.len() {
                best.model = Some(refined);
                best.inlier_rms = rms(&residuals);
                best.inliers.clone_from(&inliers);
            }
        }
    }

    log::debug!(
        "ransac: {} iterations, {} / {} inliers",
        best.iters,
        best.inliers.len(),
        data.len()
    );

    best
}
