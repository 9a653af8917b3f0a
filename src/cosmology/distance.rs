//! Luminosity distance and distance modulus for an expansion history.
//!
//! The comoving distance is `D_C = (c/H0)·∫₀^z dz'/E(z')`, evaluated with
//! adaptive Gauss-Legendre quadrature; the luminosity distance is
//! `D_L = D_C·(1+z)` and the distance modulus `μ = 5·log10(D_L/Mpc) + 25`.
//!
//! Failure policy: these functions never panic and never return an error
//! type. Any numerical failure (non-convergent integral, non-positive E(z),
//! non-positive distance) yields `f64::NAN`, which the chi-squared evaluator
//! treats as "skip this observation". This keeps the optimizer's objective
//! total and lets a single bad redshift drop out instead of killing a fit.

use crate::cosmology::expansion::CosmologyModel;
use crate::numerical::quadrature::AdaptiveQuadrature;

/// speed of light, km/s
pub const SPEED_OF_LIGHT_KM_S: f64 = 299792.458;

/// below this redshift the integral is ill-conditioned; use the linear
/// Hubble law instead
const SMALL_Z_THRESHOLD: f64 = 1e-5;

const QUAD_EPSABS: f64 = 1e-8;
const QUAD_EPSREL: f64 = 1e-8;
const QUAD_MAX_SUBDIVISIONS: usize = 100;

/// Distance calculator owning its quadrature rule, so the Gauss-Legendre
/// nodes are derived once and reused across the many evaluations a fit
/// performs.
pub struct DistanceCalculator {
    quad: AdaptiveQuadrature,
}

impl Default for DistanceCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceCalculator {
    pub fn new() -> Self {
        DistanceCalculator {
            quad: AdaptiveQuadrature::new(QUAD_EPSABS, QUAD_EPSREL, QUAD_MAX_SUBDIVISIONS),
        }
    }

    /// Luminosity distance in Mpc; NaN on any numerical failure.
    pub fn luminosity_distance(&self, model: &CosmologyModel, z: f64) -> f64 {
        if !z.is_finite() || z <= 0.0 {
            return f64::NAN;
        }
        let h0 = model.h0();
        if z < SMALL_Z_THRESHOLD {
            return SPEED_OF_LIGHT_KM_S / h0 * z;
        }

        // 1/E(z'); a non-positive or non-finite E poisons the integrand with
        // NaN, which the quadrature reports as an error
        let integrand = |zp: f64| {
            let e = model.hubble_rate(zp);
            if e > 0.0 && e.is_finite() { 1.0 / e } else { f64::NAN }
        };

        match self.quad.integrate(integrand, 0.0, z) {
            Ok(integral) => {
                let d_c = SPEED_OF_LIGHT_KM_S / h0 * integral;
                d_c * (1.0 + z)
            }
            Err(_) => f64::NAN,
        }
    }

    /// Distance modulus μ = 5·log10(D_L) + 25; NaN when D_L is non-positive
    /// or invalid.
    pub fn distance_modulus(&self, model: &CosmologyModel, z: f64) -> f64 {
        let d_l = self.luminosity_distance(model, z);
        if !d_l.is_finite() || d_l <= 0.0 {
            return f64::NAN;
        }
        5.0 * d_l.log10() + 25.0
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
    fn test_small_z_linear_hubble_law() {
        let calc = DistanceCalculator::new();
        let model = CosmologyModel::lambda_cdm(0.3, 70.0);
        for &z in &[1e-7, 1e-6, 5e-6] {
            let d = calc.luminosity_distance(&model, z);
            assert_relative_eq!(d, SPEED_OF_LIGHT_KM_S / 70.0 * z, epsilon = 1e-12);
        }
        // just above the threshold the integral must agree with the linear
        // law to first order in z
        let z = 2e-5;
        let d = calc.luminosity_distance(&model, z);
        let linear = SPEED_OF_LIGHT_KM_S / 70.0 * z;
        assert_relative_eq!(d, linear, max_relative = 1e-4);
    }

    #[test]
    fn test_monotonic_in_redshift() {
        let calc = DistanceCalculator::new();
        let model = CosmologyModel::lambda_cdm(0.3, 70.0);
        let mut prev = 0.0;
        for i in 1..=100 {
            let z = i as f64 * 0.05; // up to z = 5
            let d = calc.luminosity_distance(&model, z);
            assert!(d.is_finite());
            assert!(d > prev, "D_L must be strictly increasing, z = {}", z);
            prev = d;
        }
    }

    #[test]
    fn test_lambda_cdm_reference_value() {
        // reference computed independently with high-precision quadrature:
        // flat ΛCDM, Ω_m = 0.3, H0 = 70, z = 0.5:
        //   I = ∫₀^0.5 dz/E(z) = 0.4409843350
        //   D_C = (299792.458/70)·I = 1888.6254 Mpc
        //   D_L = 1.5·D_C = 2832.9381 Mpc
        //   μ = 5·log10(D_L) + 25 = 42.2611854
        let calc = DistanceCalculator::new();
        let model = CosmologyModel::lambda_cdm(0.3, 70.0);
        let mu = calc.distance_modulus(&model, 0.5);
        assert_relative_eq!(mu, 42.2611854, epsilon = 1e-4);
        let d_l = calc.luminosity_distance(&model, 0.5);
        assert_relative_eq!(d_l, 2832.9381, max_relative = 1e-6);
    }

    #[test]
    fn test_invalid_redshift_is_nan() {
        let calc = DistanceCalculator::new();
        let model = CosmologyModel::lambda_cdm(0.3, 70.0);
        assert!(calc.luminosity_distance(&model, -0.1).is_nan());
        assert!(calc.luminosity_distance(&model, 0.0).is_nan());
        assert!(calc.luminosity_distance(&model, f64::NAN).is_nan());
        assert!(calc.distance_modulus(&model, -1.0).is_nan());
    }

    #[test]
    fn test_degenerate_model_distances_stay_finite_or_nan() {
        // a degenerate erasure model must never make the calculator panic
        let calc = DistanceCalculator::new();
        let model = CosmologyModel::erasure(0.3, 0.5, -6.0, 70.0);
        let mu = calc.distance_modulus(&model, 0.5);
        assert!(mu.is_nan() || mu.is_finite());
    }
}
