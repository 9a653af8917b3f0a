//! # Cash-Karp embedded Runge-Kutta 4(5) IVP solver
//!
//! Solves `dy/dt = f(t, y), y(t0) = y0` with adaptive step size control.
//! The Cash-Karp pair produces a 5th-order solution together with an embedded
//! 4th-order estimate; their difference drives the local error estimate
//!
//! ```text
//! ||e||_rms = sqrt(1/n * sum( e_i / (atol + rtol*max(|y_i|, |y_new_i|)) )^2 )
//! ```
//!
//! A step is accepted when the weighted norm is below one, and the next step
//! size is `h * safety * norm^(-1/5)` with the growth factor clamped to
//! `[MIN_FACTOR, MAX_FACTOR]`. The step size never exceeds `max_step`, and
//! the total number of attempted steps is bounded so a pathological
//! right-hand side cannot hang the caller.
//!
//! The solution is advanced exactly to each requested output point, so the
//! returned samples are solver values rather than interpolants.

use log::warn;
use nalgebra::DVector;

const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const SAFETY: f64 = 0.9;
const MAX_STEPS: usize = 100_000;

pub struct CashKarp45 {
    f: Box<dyn Fn(f64, &DVector<f64>) -> DVector<f64>>,
    t0: f64,
    y0: DVector<f64>,
    t_bound: f64,
    rtol: f64,
    atol: f64,
    max_step: f64,
    pub t: f64,
    pub y: DVector<f64>,
    h: f64,
    pub status: String,
    pub message: Option<String>,
}

impl CashKarp45 {
    pub fn new(
        f: Box<dyn Fn(f64, &DVector<f64>) -> DVector<f64>>,
        t0: f64,
        y0: DVector<f64>,
        t_bound: f64,
        rtol: f64,
        atol: f64,
        max_step: f64,
    ) -> CashKarp45 {
        let h = f64::min(max_step, (t_bound - t0) / 100.0);
        CashKarp45 {
            f,
            t0,
            y0: y0.clone(),
            t_bound,
            rtol,
            atol,
            max_step,
            t: t0,
            y: y0,
            h,
            status: "running".to_string(),
            message: None,
        }
    }

    /// Integrate from t0 to t_bound, recording the solution at each point of
    /// `t_eval` (must be ascending and inside [t0, t_bound]). Returns the
    /// samples, or None when the integration failed; `status`/`message` hold
    /// the reason.
    pub fn solve_at(&mut self, t_eval: &[f64]) -> Option<Vec<DVector<f64>>> {
        let mut samples: Vec<DVector<f64>> = Vec::with_capacity(t_eval.len());
        let mut n_attempts: usize = 0;

        for &t_out in t_eval {
            if t_out < self.t0 || t_out > self.t_bound {
                self.status = "failed".to_string();
                self.message = Some(format!("output point {} outside integration range", t_out));
                return None;
            }
            while self.t < t_out {
                if n_attempts >= MAX_STEPS {
                    self.status = "failed".to_string();
                    self.message = Some("step budget exhausted".to_string());
                    warn!("Cash-Karp: step budget exhausted at t = {}", self.t);
                    return None;
                }
                n_attempts += 1;
                let h_try = self.h.min(self.max_step).min(t_out - self.t);
                if !self.attempt_step(h_try) {
                    self.status = "failed".to_string();
                    return None;
                }
            }
            samples.push(self.y.clone());
        }
        self.status = "finished".to_string();
        Some(samples)
    }

    /// Single trial step of size h; on acceptance advances (t, y) and updates
    /// the proposed step size, on rejection only shrinks it. Returns false
    /// when the step size underflows or the derivative is non-finite.
    fn attempt_step(&mut self, h: f64) -> bool {
        // Butcher tableau coefficients for the Cash-Karp 4(5) pair
        let a: [[f64; 5]; 5] = [
            [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0],
            [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0],
            [3.0 / 10.0, -9.0 / 10.0, 6.0 / 5.0, 0.0, 0.0],
            [-11.0 / 54.0, 5.0 / 2.0, -70.0 / 27.0, 35.0 / 27.0, 0.0],
            [
                1631.0 / 55296.0,
                175.0 / 512.0,
                575.0 / 13824.0,
                44275.0 / 110592.0,
                253.0 / 4096.0,
            ],
        ];
        let c = [0.0, 1.0 / 5.0, 3.0 / 10.0, 3.0 / 5.0, 1.0, 7.0 / 8.0];
        // 5th order weights
        let b5 = [
            37.0 / 378.0,
            0.0,
            250.0 / 621.0,
            125.0 / 594.0,
            0.0,
            512.0 / 1771.0,
        ];
        // embedded 4th order weights
        let b4 = [
            2825.0 / 27648.0,
            0.0,
            18575.0 / 48384.0,
            13525.0 / 55296.0,
            277.0 / 14336.0,
            1.0 / 4.0,
        ];

        if h < f64::EPSILON * self.t.abs().max(1.0) {
            self.message = Some("step size underflow".to_string());
            return false;
        }

        let t = self.t;
        let y = &self.y;
        let f = &self.f;

        let mut k = vec![DVector::zeros(y.len()); 6];
        k[0] = h * f(t, y);
        for i in 1..6 {
            let mut y_temp = y.clone();
            for j in 0..i {
                y_temp += a[i - 1][j] * &k[j];
            }
            k[i] = h * f(t + c[i] * h, &y_temp);
        }

        let mut y5 = y.clone();
        let mut y4 = y.clone();
        for i in 0..6 {
            y5 += b5[i] * &k[i];
            y4 += b4[i] * &k[i];
        }

        if !y5.iter().all(|v| v.is_finite()) || !y4.iter().all(|v| v.is_finite()) {
            self.message = Some("non-finite state produced by derivative".to_string());
            return false;
        }

        // weighted RMS error norm
        let n = y.len();
        let mut err_sq = 0.0;
        for i in 0..n {
            let scale = self.atol + self.rtol * f64::max(y[i].abs(), y5[i].abs());
            let e = (y5[i] - y4[i]) / scale;
            err_sq += e * e;
        }
        let err_norm = (err_sq / n as f64).sqrt();

        if err_norm <= 1.0 {
            self.t = t + h;
            self.y = y5;
            let factor = if err_norm == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            };
            self.h = (h * factor).min(self.max_step);
            true
        } else {
            let factor = (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, 1.0);
            self.h = h * factor;
            true
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
    fn test_exponential_decay() {
        // y' = -y, y(0) = 1, exact y(t) = exp(-t)
        let f = Box::new(|_t: f64, y: &DVector<f64>| -y.clone());
        let y0 = DVector::from_vec(vec![1.0]);
        let mut solver = CashKarp45::new(f, 0.0, y0, 1.0, 1e-8, 1e-10, 0.1);

        let t_eval = vec![0.25, 0.5, 0.75, 1.0];
        let samples = solver.solve_at(&t_eval).unwrap();
        assert_eq!(solver.status, "finished");
        for (t, y) in t_eval.iter().zip(samples.iter()) {
            assert_relative_eq!(y[0], (-t).exp(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_linear_system_2x2() {
        // y1' = -2*y1 + y2, y2' = y1 - 2*y2, y(0) = (1, 0)
        // exact: y1 = (e^(-t) + e^(-3t))/2, y2 = (e^(-t) - e^(-3t))/2
        let f = Box::new(|_t: f64, y: &DVector<f64>| {
            DVector::from_vec(vec![-2.0 * y[0] + y[1], y[0] - 2.0 * y[1]])
        });
        let y0 = DVector::from_vec(vec![1.0, 0.0]);
        let mut solver = CashKarp45::new(f, 0.0, y0, 2.0, 1e-8, 1e-10, 0.1);

        let t_eval = vec![0.5, 1.0, 2.0];
        let samples = solver.solve_at(&t_eval).unwrap();
        for (t, y) in t_eval.iter().zip(samples.iter()) {
            let y1 = 0.5 * ((-t).exp() + (-3.0 * t).exp());
            let y2 = 0.5 * ((-t).exp() - (-3.0 * t).exp());
            assert_relative_eq!(y[0], y1, epsilon = 1e-6);
            assert_relative_eq!(y[1], y2, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_max_step_respected() {
        // with max_step = 1e-3 over [0, 1] at least 1000 steps are needed;
        // the solver must still finish within its step budget
        let f = Box::new(|t: f64, _y: &DVector<f64>| DVector::from_vec(vec![t.cos()]));
        let y0 = DVector::from_vec(vec![0.0]);
        let mut solver = CashKarp45::new(f, 0.0, y0, 1.0, 1e-6, 1e-8, 1e-3);
        let samples = solver.solve_at(&[1.0]).unwrap();
        assert_relative_eq!(samples[0][0], 1.0_f64.sin(), epsilon = 1e-6);
    }

    #[test]
    fn test_non_finite_derivative_fails() {
        let f = Box::new(|t: f64, _y: &DVector<f64>| {
            DVector::from_vec(vec![if t > 0.5 { f64::NAN } else { 1.0 }])
        });
        let y0 = DVector::from_vec(vec![0.0]);
        let mut solver = CashKarp45::new(f, 0.0, y0, 1.0, 1e-6, 1e-8, 0.1);
        assert!(solver.solve_at(&[1.0]).is_none());
        assert_eq!(solver.status, "failed");
    }
}
