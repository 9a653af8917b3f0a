//! Fit results, information criteria and evidence classification.
//!
//! The comparison is always "reference vs candidate" where the reference is
//! the simpler family (fewer free parameters). Positive deltas favor the
//! candidate; the grade thresholds follow the usual information-criterion
//! conventions (Δ > 10 decisive on the AIC/BIC scale, the Δχ² scale is
//! normalized by the parameter-count difference Δk).

use std::fmt;

/// Δχ² > 10·Δk counts as strong evidence, > 2·Δk as weak
const CHI2_STRONG_PER_DOF: f64 = 10.0;
const CHI2_WEAK_PER_DOF: f64 = 2.0;
/// ΔAIC grade boundaries
const AIC_STRONG: f64 = 10.0;
const AIC_MODERATE: f64 = 4.0;
/// ΔBIC grade boundaries
const BIC_STRONG: f64 = 10.0;
const BIC_MODERATE: f64 = 6.0;

/// Best fit of one model family against one dataset.
#[derive(Debug, Clone)]
pub struct FitResult {
    /// parameter name/value pairs, in the family's canonical order
    pub parameters: Vec<(&'static str, f64)>,
    pub chi_squared: f64,
    /// n_valid − k
    pub dof: i64,
    /// observations with a finite model prediction
    pub n_valid: usize,
    /// free parameter count of the family
    pub k: usize,
    pub converged: bool,
}

impl FitResult {
    pub fn reduced_chi_squared(&self) -> f64 {
        if self.dof > 0 {
            self.chi_squared / self.dof as f64
        } else {
            f64::NAN
        }
    }

    /// Akaike information criterion, χ² + 2k.
    pub fn aic(&self) -> f64 {
        self.chi_squared + 2.0 * self.k as f64
    }

    /// Bayesian information criterion, χ² + k·ln(n), with an explicit sample
    /// size. `n` is clamped to 1 so a fit with no valid observations (a
    /// degenerate best fit carries `n_valid = 0`) still yields a finite value.
    pub fn bic_for_sample(&self, n: usize) -> f64 {
        self.chi_squared + self.k as f64 * (n.max(1) as f64).ln()
    }

    /// Bayesian information criterion with this fit's own sample size.
    pub fn bic(&self) -> f64 {
        self.bic_for_sample(self.n_observations())
    }

    /// Sample size entering the BIC penalty.
    pub fn n_observations(&self) -> usize {
        (self.dof + self.k as i64).max(0) as usize
    }
}

/// How strongly a statistic favors the candidate over the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceGrade {
    Strong,
    Moderate,
    Comparable,
    ReferencePreferred,
}

impl fmt::Display for EvidenceGrade {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            EvidenceGrade::Strong => "strong evidence for candidate",
            EvidenceGrade::Moderate => "moderate evidence for candidate",
            EvidenceGrade::Comparable => "comparable",
            EvidenceGrade::ReferencePreferred => "reference preferred",
        };
        write!(f, "{}", s)
    }
}

/// Derived comparison of two fits. Positive deltas favor the candidate.
#[derive(Debug, Clone)]
pub struct ComparisonVerdict {
    pub delta_chi_squared: f64,
    pub delta_aic: f64,
    pub delta_bic: f64,
    pub chi2_grade: EvidenceGrade,
    pub aic_grade: EvidenceGrade,
    pub bic_grade: EvidenceGrade,
}

/// Compare a reference fit (simpler family) against a candidate fit.
/// Pure function of the two results.
pub fn compare(reference: &FitResult, candidate: &FitResult) -> ComparisonVerdict {
    let delta_k = (candidate.k as i64 - reference.k as i64).max(0) as f64;

    let delta_chi_squared = reference.chi_squared - candidate.chi_squared;
    let chi2_grade = if delta_chi_squared > CHI2_STRONG_PER_DOF * delta_k {
        EvidenceGrade::Strong
    } else if delta_chi_squared > CHI2_WEAK_PER_DOF * delta_k {
        EvidenceGrade::Moderate
    } else if delta_chi_squared > 0.0 {
        EvidenceGrade::Comparable
    } else {
        EvidenceGrade::ReferencePreferred
    };

    let delta_aic = reference.aic() - candidate.aic();
    let aic_grade = if delta_aic > AIC_STRONG {
        EvidenceGrade::Strong
    } else if delta_aic > AIC_MODERATE {
        EvidenceGrade::Moderate
    } else if delta_aic > 0.0 {
        EvidenceGrade::Comparable
    } else {
        EvidenceGrade::ReferencePreferred
    };

    // both BICs use the reference's sample size: the candidate may have
    // dropped observations (or, degenerate, all of them), and the penalty
    // must compare the families on the same data
    let n = reference.n_observations();
    let delta_bic = reference.bic_for_sample(n) - candidate.bic_for_sample(n);
    let bic_grade = if delta_bic > BIC_STRONG {
        EvidenceGrade::Strong
    } else if delta_bic > BIC_MODERATE {
        EvidenceGrade::Moderate
    } else if delta_bic > 0.0 {
        EvidenceGrade::Comparable
    } else {
        EvidenceGrade::ReferencePreferred
    };

    ComparisonVerdict {
        delta_chi_squared,
        delta_aic,
        delta_bic,
        chi2_grade,
        aic_grade,
        bic_grade,
    }
}

////////////////////////////////////////////////////////////////////////////////////////
//          TESTS
///////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fit(chi2: f64, k: usize, n: usize) -> FitResult {
        FitResult {
            parameters: vec![],
            chi_squared: chi2,
            dof: n as i64 - k as i64,
            n_valid: n,
            k,
            converged: true,
        }
    }

    #[test]
    fn test_information_criteria_arithmetic() {
        let r = fit(100.0, 2, 50);
        assert_relative_eq!(r.aic(), 104.0, epsilon = 1e-12);
        assert_relative_eq!(r.bic(), 100.0 + 2.0 * 50.0_f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(r.reduced_chi_squared(), 100.0 / 48.0, epsilon = 1e-12);
    }

    #[test]
    fn test_strong_evidence() {
        // candidate improves chi-squared by 25 at the cost of 2 extra
        // parameters: strong on the chi-squared scale (25 > 10*2)
        let reference = fit(125.0, 2, 100);
        let candidate = fit(100.0, 4, 100);
        let verdict = compare(&reference, &candidate);
        assert_relative_eq!(verdict.delta_chi_squared, 25.0, epsilon = 1e-12);
        assert_eq!(verdict.chi2_grade, EvidenceGrade::Strong);
        // delta AIC = 25 - 4 = 21 > 10
        assert_relative_eq!(verdict.delta_aic, 21.0, epsilon = 1e-12);
        assert_eq!(verdict.aic_grade, EvidenceGrade::Strong);
        // delta BIC = 25 - 2 ln(100) ~ 15.79 > 10
        assert_eq!(verdict.bic_grade, EvidenceGrade::Strong);
    }

    #[test]
    fn test_weak_improvement() {
        // 3 units of chi-squared for one extra parameter: moderate on the
        // chi-squared scale (2*dk < 3 < 10*dk) but not on AIC/BIC
        let reference = fit(103.0, 2, 100);
        let candidate = fit(100.0, 3, 100);
        let verdict = compare(&reference, &candidate);
        assert_relative_eq!(verdict.delta_chi_squared, 3.0, epsilon = 1e-12);
        assert_eq!(verdict.chi2_grade, EvidenceGrade::Moderate);
        // delta AIC = 3 - 2 = 1: positive but below the moderate boundary
        assert_eq!(verdict.aic_grade, EvidenceGrade::Comparable);
        // delta BIC = 3 - ln(100) < 0
        assert_eq!(verdict.bic_grade, EvidenceGrade::ReferencePreferred);
    }

    #[test]
    fn test_moderate_chi2_band() {
        // delta chi2 = 9 with delta k = 2 sits between 2*dk and 10*dk
        let reference = fit(109.0, 2, 100);
        let candidate = fit(100.0, 4, 100);
        let verdict = compare(&reference, &candidate);
        assert_eq!(verdict.chi2_grade, EvidenceGrade::Moderate);
        // delta AIC = 9 - 4 = 5: moderate
        assert_eq!(verdict.aic_grade, EvidenceGrade::Moderate);
    }

    #[test]
    fn test_candidate_worse() {
        let reference = fit(99.0, 2, 100);
        let candidate = fit(100.0, 4, 100);
        let verdict = compare(&reference, &candidate);
        assert_relative_eq!(verdict.delta_chi_squared, -1.0, epsilon = 1e-12);
        assert_eq!(verdict.chi2_grade, EvidenceGrade::ReferencePreferred);
        assert_eq!(verdict.aic_grade, EvidenceGrade::ReferencePreferred);
        assert_eq!(verdict.bic_grade, EvidenceGrade::ReferencePreferred);
    }

    #[test]
    fn test_degenerate_candidate_keeps_bic_finite() {
        // a degenerate best fit carries the sentinel chi-squared and zero
        // valid observations (dof = -k); its BIC must not collapse to -inf
        // and hand the candidate a strong grade
        let reference = fit(1500.0, 2, 1700);
        let candidate = fit(1e10, 4, 0);
        assert_eq!(candidate.n_observations(), 0);
        assert!(candidate.bic().is_finite());

        let verdict = compare(&reference, &candidate);
        assert!(verdict.delta_chi_squared.is_finite());
        assert!(verdict.delta_aic.is_finite());
        assert!(verdict.delta_bic.is_finite());
        assert!(verdict.delta_bic < 0.0);
        assert_eq!(verdict.chi2_grade, EvidenceGrade::ReferencePreferred);
        assert_eq!(verdict.aic_grade, EvidenceGrade::ReferencePreferred);
        assert_eq!(verdict.bic_grade, EvidenceGrade::ReferencePreferred);
    }

    #[test]
    fn test_comparable_band() {
        // tiny improvement, smaller than 2*dk but positive
        let reference = fit(100.5, 2, 100);
        let candidate = fit(100.0, 4, 100);
        let verdict = compare(&reference, &candidate);
        assert_eq!(verdict.chi2_grade, EvidenceGrade::Comparable);
    }
}
