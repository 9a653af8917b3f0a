//! Chi-squared scoring of a cosmology model against a supernova dataset.
//!
//! `χ² = Σ ((μ_obs − μ_model)/σ)²` over the observations the model can
//! actually predict. A non-finite predicted distance modulus excludes the
//! observation from the sum and from `n_valid`, so a locally bad redshift
//! does not poison the whole score.

use crate::cosmology::distance::DistanceCalculator;
use crate::cosmology::expansion::CosmologyModel;
use crate::data_loading::SupernovaDataset;
use itertools::izip;

/// Stateless evaluator that owns its distance calculator (and with it the
/// Gauss-Legendre nodes), so scoring many candidates reuses the rule.
pub struct ChiSquaredEvaluator {
    distance: DistanceCalculator,
}

impl Default for ChiSquaredEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChiSquaredEvaluator {
    pub fn new() -> Self {
        ChiSquaredEvaluator {
            distance: DistanceCalculator::new(),
        }
    }

    /// Returns `(χ², n_valid)` where `n_valid` counts the observations with a
    /// finite model prediction.
    pub fn chi_squared(&self, model: &CosmologyModel, data: &SupernovaDataset) -> (f64, usize) {
        let mut chi2 = 0.0;
        let mut n_valid = 0usize;
        for (&z, &mu_obs, &sigma) in izip!(&data.redshift, &data.mu, &data.sigma) {
            let mu_model = self.distance.distance_modulus(model, z);
            if !mu_model.is_finite() {
                continue;
            }
            let r = (mu_obs - mu_model) / sigma;
            chi2 += r * r;
            n_valid += 1;
        }
        (chi2, n_valid)
    }
}
