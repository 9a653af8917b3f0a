//! # Density evolution for the interacting dark-energy model
//!
//! The power-law "erasure" model couples matter and dark energy through an
//! energy-exchange term `Q ∝ β·H·ρ_m·a^(−α)`. In terms of the density
//! fractions as functions of the scale factor a:
//!
//! ```text
//! dΩ_m/da  = −3Ω_m/a − Q_term
//! dΩ_DE/da = +Q_term                  (energy conservation by construction)
//! Q_term   = β·Ω_m·a^(−α) / (a⁴·E),   E = sqrt(Ω_m/a³ + Ω_DE)
//! ```
//!
//! The system is integrated from a = 0.01 (z = 99) to a = 1 (today). Earlier
//! times are excluded: for negative α the interaction term grows without
//! bound as a → 0 and the integration becomes unstable.
//!
//! The derivative is guarded against the failure modes that large |β| and
//! strongly negative α produce (negative densities, overflowing a^(−α),
//! runaway exchange). The guard constants, the initial state and the
//! conservation tolerance are empirical stabilizers; they are kept as
//! configurable values with fixed defaults rather than re-derived.
//!
//! After integration the solution is validated; a solve that diverged,
//! produced negative densities, or broke total-density conservation yields a
//! **degenerate** grid that downstream code can still evaluate without
//! crashing (it scores a huge chi-squared instead of propagating an error).

use crate::numerical::cash_karp::CashKarp45;
use log::debug;
use nalgebra::DVector;

/// Empirical clipping/clamping constants for the density derivative.
#[derive(Debug, Clone, Copy)]
pub struct StabilityGuards {
    /// densities are clipped to [floor, ceiling] before each derivative
    pub density_floor: f64,
    pub density_ceiling: f64,
    /// E² below this is treated as a degenerate stop (zero derivative)
    pub e_squared_floor: f64,
    /// cap on a^(−α) when α < 0 and a < `power_cap_below_a`
    pub power_cap: f64,
    pub power_cap_below_a: f64,
    /// exchange term is clamped to ±(exchange_clamp · Ω_m / a)
    pub exchange_clamp: f64,
}

impl Default for StabilityGuards {
    fn default() -> Self {
        StabilityGuards {
            density_floor: 1e-10,
            density_ceiling: 10.0,
            e_squared_floor: 1e-10,
            power_cap: 1e6,
            power_cap_below_a: 0.01,
            exchange_clamp: 100.0,
        }
    }
}

/// Sampled density-fraction evolution, stored in ascending redshift order.
/// `failed` marks a degenerate solve; the flat placeholder grid it carries is
/// still safe to interpolate.
#[derive(Debug, Clone)]
pub struct DensityGrid {
    pub z: Vec<f64>,
    pub omega_m: Vec<f64>,
    pub omega_de: Vec<f64>,
    pub failed: bool,
}

impl DensityGrid {
    /// Clamped linear interpolation of Ω_m and Ω_DE at redshift z.
    pub fn densities_at(&self, z: f64) -> (f64, f64) {
        (
            interpolate_clamped(&self.z, &self.omega_m, z),
            interpolate_clamped(&self.z, &self.omega_de, z),
        )
    }

    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }
}

/// Linear interpolation over an ascending grid, clamped to the edge values
/// outside the grid range.
fn interpolate_clamped(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    if xs.is_empty() {
        return f64::NAN;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[xs.len() - 1] {
        return ys[ys.len() - 1];
    }
    // first index with xs[idx] > x; idx >= 1 after the edge checks
    let idx = xs.partition_point(|&xi| xi <= x);
    let (x0, x1) = (xs[idx - 1], xs[idx]);
    let (y0, y1) = (ys[idx - 1], ys[idx]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

const A_START: f64 = 0.01; // z = 99
const A_END: f64 = 1.0; // z = 0
const N_SAMPLES: usize = 500;
const RTOL: f64 = 1e-6;
const ATOL: f64 = 1e-8;
const MAX_STEP: f64 = 0.01;
/// density value of the flat placeholder grid stored for degenerate solves
const DEGENERATE_DENSITY: f64 = 0.01;

/// Guarded derivative of (Ω_m, Ω_DE) with respect to the scale factor.
fn density_derivatives(
    beta: f64,
    alpha: f64,
    g: &StabilityGuards,
    a: f64,
    y: &DVector<f64>,
) -> DVector<f64> {
    let om = y[0].clamp(g.density_floor, g.density_ceiling);
    let ode = y[1].clamp(g.density_floor, g.density_ceiling);

    let e_squared = om / (a * a * a) + ode;
    if e_squared < g.e_squared_floor {
        return DVector::zeros(2);
    }
    let e = e_squared.sqrt();

    let a_alpha_term = if alpha < 0.0 && a < g.power_cap_below_a {
        f64::min(a.powf(-alpha), g.power_cap)
    } else {
        a.powf(-alpha)
    };

    let q_raw = (beta * om * a_alpha_term) / (a.powi(4) * e);
    let q_limit = g.exchange_clamp * om / a;
    let q_term = q_raw.clamp(-q_limit, q_limit);

    DVector::from_vec(vec![-(3.0 * om / a) - q_term, q_term])
}

/// Integrates the coupled (Ω_m, Ω_DE) system for one (β, α) pair and
/// validates the result.
pub struct DensityEvolutionSolver {
    beta: f64,
    alpha: f64,
    guards: StabilityGuards,
    /// matter-dominated state at a = 0.01
    initial_omega_m: f64,
    initial_omega_de: f64,
    /// maximum allowed deviation of Ω_m/(1+z)³ + Ω_DE from 1
    conservation_tolerance: f64,
}

impl DensityEvolutionSolver {
    pub fn new(beta: f64, alpha: f64) -> Self {
        DensityEvolutionSolver {
            beta,
            alpha,
            guards: StabilityGuards::default(),
            initial_omega_m: 0.99,
            initial_omega_de: 0.01,
            conservation_tolerance: 0.5,
        }
    }

    pub fn set_guards(&mut self, guards: StabilityGuards) {
        self.guards = guards;
    }

    pub fn set_initial_state(&mut self, omega_m: f64, omega_de: f64) {
        self.initial_omega_m = omega_m;
        self.initial_omega_de = omega_de;
    }

    pub fn set_conservation_tolerance(&mut self, tolerance: f64) {
        self.conservation_tolerance = tolerance;
    }

    /// Log-spaced sample points across [A_START, A_END].
    fn sample_points() -> Vec<f64> {
        let lg0 = A_START.log10();
        let lg1 = A_END.log10();
        (0..N_SAMPLES)
            .map(|i| {
                let frac = i as f64 / (N_SAMPLES - 1) as f64;
                10f64.powf(lg0 + frac * (lg1 - lg0))
            })
            .collect()
    }

    /// Integrate and validate. Never fails outward: an unphysical or
    /// non-convergent solve is reported as a degenerate grid.
    pub fn solve(&self) -> DensityGrid {
        let a_eval = Self::sample_points();

        let beta = self.beta;
        let alpha = self.alpha;
        let guards = self.guards;
        let rhs =
            move |a: f64, y: &DVector<f64>| density_derivatives(beta, alpha, &guards, a, y);

        let y0 = DVector::from_vec(vec![self.initial_omega_m, self.initial_omega_de]);
        let mut solver = CashKarp45::new(Box::new(rhs), A_START, y0, A_END, RTOL, ATOL, MAX_STEP);

        let samples = match solver.solve_at(&a_eval) {
            Some(samples) => samples,
            None => {
                debug!(
                    "density evolution diverged for beta = {}, alpha = {}: {:?}",
                    self.beta, self.alpha, solver.message
                );
                return self.degenerate_grid(&a_eval);
            }
        };

        // grids as functions of redshift, ascending z (reverse of ascending a)
        let mut z: Vec<f64> = a_eval.iter().rev().map(|a| 1.0 / a - 1.0).collect();
        let omega_m: Vec<f64> = samples.iter().rev().map(|y| y[0]).collect();
        let omega_de: Vec<f64> = samples.iter().rev().map(|y| y[1]).collect();
        // z = 0 exactly at a = 1 (guard against residual from the log spacing)
        if let Some(first) = z.first_mut() {
            if first.abs() < 1e-12 {
                *first = 0.0;
            }
        }

        if omega_m.iter().chain(omega_de.iter()).any(|&v| v < 0.0) {
            debug!(
                "negative densities for beta = {}, alpha = {}",
                self.beta, self.alpha
            );
            return self.degenerate_grid(&a_eval);
        }

        // total physical density must stay near critical
        let max_deviation = z
            .iter()
            .zip(omega_m.iter().zip(omega_de.iter()))
            .map(|(&zi, (&om, &ode))| (om / (1.0 + zi).powi(3) + ode - 1.0).abs())
            .fold(0.0, f64::max);
        if max_deviation > self.conservation_tolerance {
            debug!(
                "energy conservation violated (max deviation {:.3}) for beta = {}, alpha = {}",
                max_deviation, self.beta, self.alpha
            );
            return self.degenerate_grid(&a_eval);
        }

        DensityGrid {
            z,
            omega_m,
            omega_de,
            failed: false,
        }
    }

    fn degenerate_grid(&self, a_eval: &[f64]) -> DensityGrid {
        let z: Vec<f64> = a_eval.iter().rev().map(|a| 1.0 / a - 1.0).collect();
        let n = z.len();
        DensityGrid {
            z,
            omega_m: vec![DEGENERATE_DENSITY; n],
            omega_de: vec![DEGENERATE_DENSITY; n],
            failed: true,
        }
    }
}
