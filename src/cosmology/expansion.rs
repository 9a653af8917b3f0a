//! Cosmology model variants and the dimensionless Hubble rate E(z) = H(z)/H0.
//!
//! Two families share the single capability "evaluate E(z)":
//! - [`CosmologyModel::LambdaCdm`]: flat ΛCDM in closed form,
//!   `E(z) = sqrt(Ω_m(1+z)³ + (1−Ω_m))`.
//! - [`CosmologyModel::Erasure`]: the interacting dark-energy model, whose
//!   Ω_m(z)/Ω_DE(z) evolution is tabulated once at construction by the
//!   density-evolution solver and interpolated afterwards.
//!
//! Model instances are cheap throwaways: the fitter constructs one per
//! candidate parameter vector and drops it after scoring.

use crate::cosmology::density_evolution::{DensityEvolutionSolver, DensityGrid};

/// Flat ΛCDM parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambdaCdmParams {
    pub omega_m: f64,
    /// Hubble constant, km/s/Mpc
    pub h0: f64,
}

/// Power-law erasure (interacting dark-energy) parameters.
/// The exchange term is `Q ∝ β·H·ρ_m·a^(−α)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErasureParams {
    pub omega_m: f64,
    pub beta: f64,
    pub alpha: f64,
    /// Hubble constant, km/s/Mpc
    pub h0: f64,
}

/// Interacting dark-energy model with its precomputed density grid.
#[derive(Debug, Clone)]
pub struct ErasureModel {
    pub params: ErasureParams,
    grid: DensityGrid,
}

impl ErasureModel {
    /// Solve the density evolution for these parameters. Construction never
    /// fails: an unphysical parameter combination produces a degenerate
    /// instance that scores the sentinel chi-squared downstream.
    pub fn new(params: ErasureParams) -> Self {
        let grid = DensityEvolutionSolver::new(params.beta, params.alpha).solve();
        ErasureModel { params, grid }
    }

    pub fn is_degenerate(&self) -> bool {
        self.grid.failed
    }

    pub fn grid(&self) -> &DensityGrid {
        &self.grid
    }

    fn hubble_rate(&self, z: f64) -> f64 {
        if self.grid.is_empty() {
            // no usable grid at all: closed-form fallback with the
            // construction parameters
            let om = self.params.omega_m;
            return (om * (1.0 + z).powi(3) + (1.0 - om)).sqrt();
        }
        let (om_z, ode_z) = self.grid.densities_at(z);
        (om_z * (1.0 + z).powi(3) + ode_z).sqrt()
    }
}

/// Tagged variant over the capability "evaluate E(z) for z ≥ 0".
#[derive(Debug, Clone)]
pub enum CosmologyModel {
    LambdaCdm(LambdaCdmParams),
    Erasure(ErasureModel),
}

impl CosmologyModel {
    pub fn lambda_cdm(omega_m: f64, h0: f64) -> Self {
        CosmologyModel::LambdaCdm(LambdaCdmParams { omega_m, h0 })
    }

    pub fn erasure(omega_m: f64, beta: f64, alpha: f64, h0: f64) -> Self {
        CosmologyModel::Erasure(ErasureModel::new(ErasureParams {
            omega_m,
            beta,
            alpha,
            h0,
        }))
    }

    /// Dimensionless Hubble rate E(z) = H(z)/H0.
    pub fn hubble_rate(&self, z: f64) -> f64 {
        match self {
            CosmologyModel::LambdaCdm(p) => {
                (p.omega_m * (1.0 + z).powi(3) + (1.0 - p.omega_m)).sqrt()
            }
            CosmologyModel::Erasure(m) => m.hubble_rate(z),
        }
    }

    /// Hubble constant in km/s/Mpc.
    pub fn h0(&self) -> f64 {
        match self {
            CosmologyModel::LambdaCdm(p) => p.h0,
            CosmologyModel::Erasure(m) => m.params.h0,
        }
    }

    /// Number of free parameters of the family.
    pub fn free_parameter_count(&self) -> usize {
        match self {
            CosmologyModel::LambdaCdm(_) => 2,
            CosmologyModel::Erasure(_) => 4,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        match self {
            CosmologyModel::LambdaCdm(_) => false,
            CosmologyModel::Erasure(m) => m.is_degenerate(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            CosmologyModel::LambdaCdm(_) => "LambdaCDM".to_string(),
            CosmologyModel::Erasure(m) => format!(
                "Erasure(beta={:.3}, alpha={:.2})",
                m.params.beta, m.params.alpha
            ),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////
//          TESTS
///////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lambda_cdm_today() {
        // E(0) = 1 by normalization
        let model = CosmologyModel::lambda_cdm(0.3, 70.0);
        assert_relative_eq!(model.hubble_rate(0.0), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_lambda_cdm_closed_form() {
        let model = CosmologyModel::lambda_cdm(0.3, 70.0);
        // E(1) = sqrt(0.3 * 8 + 0.7) = sqrt(3.1)
        assert_relative_eq!(model.hubble_rate(1.0), 3.1_f64.sqrt(), epsilon = 1e-14);
        // matter dominates at high z: E(z) -> sqrt(Om) (1+z)^1.5
        let z: f64 = 1000.0;
        let expected = (0.3 * (1.0 + z).powi(3) + 0.7).sqrt();
        assert_relative_eq!(model.hubble_rate(z), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_lambda_cdm_monotonic() {
        let model = CosmologyModel::lambda_cdm(0.3, 70.0);
        let mut prev = model.hubble_rate(0.0);
        for i in 1..=50 {
            let z = i as f64 * 0.1;
            let e = model.hubble_rate(z);
            assert!(e > prev, "E(z) must increase with z");
            prev = e;
        }
    }

    #[test]
    fn test_erasure_degenerate_still_evaluates() {
        let model = CosmologyModel::erasure(0.3, 0.5, -6.0, 70.0);
        assert!(model.is_degenerate());
        // degenerate grid gives finite but badly wrong E(z)
        let e = model.hubble_rate(0.5);
        assert!(e.is_finite() && e > 0.0);
    }

    #[test]
    fn test_parameter_counts() {
        assert_eq!(
            CosmologyModel::lambda_cdm(0.3, 70.0).free_parameter_count(),
            2
        );
        let erasure = CosmologyModel::erasure(0.3, 0.05, -2.0, 70.0);
        assert_eq!(erasure.free_parameter_count(), 4);
    }
}
