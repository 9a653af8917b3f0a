//! Fit both model families against a dataset, compare them and build the
//! textual report.
//!
//! The two fits share nothing: each gets its own optimizer and its own pass
//! over the data. The erasure family's objective substitutes a sentinel
//! chi-squared for degenerate parameter combinations (density evolution
//! diverged or violated conservation), so the optimizer simply steers away
//! from the unphysical region instead of erroring out.

use crate::cosmology::expansion::CosmologyModel;
use crate::data_loading::SupernovaDataset;
use crate::fitting::chi_squared::ChiSquaredEvaluator;
use crate::fitting::differential_evolution::DifferentialEvolution;
use crate::fitting::model_selection::{compare, ComparisonVerdict, EvidenceGrade, FitResult};
use log::info;
use nalgebra::DVector;
use std::fmt;
use tabled::builder::Builder;
use tabled::settings::Style;

/// objective value for degenerate or non-finite candidates
pub const DEGENERATE_CHI_SQUARED: f64 = 1e10;

const LCDM_MAX_ITERATIONS: usize = 100;
const ERASURE_MAX_ITERATIONS: usize = 200;

/// overall verdict thresholds on (Δχ², ΔAIC)
const OVERALL_STRONG_DCHI2: f64 = 20.0;
const OVERALL_STRONG_DAIC: f64 = 4.0;
const OVERALL_COMPARABLE_DCHI2: f64 = 4.0;

/// The two competing model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    LambdaCdm,
    Erasure,
}

impl ModelFamily {
    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::LambdaCdm => "LambdaCDM",
            ModelFamily::Erasure => "Erasure",
        }
    }

    pub fn parameter_names(&self) -> &'static [&'static str] {
        match self {
            ModelFamily::LambdaCdm => &["Omega_m", "H0"],
            ModelFamily::Erasure => &["Omega_m", "beta", "alpha", "H0"],
        }
    }

    /// Box bounds per parameter, in the order of `parameter_names`.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        match self {
            ModelFamily::LambdaCdm => vec![(0.1, 0.5), (60.0, 80.0)],
            ModelFamily::Erasure => {
                vec![(0.1, 0.5), (-0.5, 0.5), (-6.0, 0.0), (60.0, 80.0)]
            }
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_names().len()
    }

    fn max_iterations(&self) -> usize {
        match self {
            ModelFamily::LambdaCdm => LCDM_MAX_ITERATIONS,
            ModelFamily::Erasure => ERASURE_MAX_ITERATIONS,
        }
    }

    /// Instantiate a model at the given parameter vector. The erasure variant
    /// runs the density-evolution solve here.
    pub fn build(&self, x: &DVector<f64>) -> CosmologyModel {
        match self {
            ModelFamily::LambdaCdm => CosmologyModel::lambda_cdm(x[0], x[1]),
            ModelFamily::Erasure => CosmologyModel::erasure(x[0], x[1], x[2], x[3]),
        }
    }
}

/// Score one candidate: the sentinel chi-squared (with zero valid
/// observations) for degenerate or non-finite evaluations, the plain
/// chi-squared otherwise.
pub fn score(
    family: ModelFamily,
    x: &DVector<f64>,
    evaluator: &ChiSquaredEvaluator,
    data: &SupernovaDataset,
) -> (f64, usize) {
    let model = family.build(x);
    if model.is_degenerate() {
        return (DEGENERATE_CHI_SQUARED, 0);
    }
    let (chi2, n_valid) = evaluator.chi_squared(&model, data);
    if chi2.is_finite() && n_valid > 0 {
        (chi2, n_valid)
    } else {
        (DEGENERATE_CHI_SQUARED, 0)
    }
}

/// Fit one family to the dataset with differential evolution.
pub fn fit(family: ModelFamily, data: &SupernovaDataset) -> FitResult {
    info!("fitting {} ({} parameters)", family.name(), family.parameter_count());
    let evaluator = ChiSquaredEvaluator::new();

    let objective = |x: &DVector<f64>| -> f64 { score(family, x, &evaluator, data).0 };

    let optimizer = DifferentialEvolution::new(family.bounds(), family.max_iterations());
    let result = optimizer.minimize(objective);

    // re-evaluate the winner to recover n_valid alongside chi-squared
    let (chi_squared, n_valid) = score(family, &result.x, &evaluator, data);

    let k = family.parameter_count();
    let parameters = family
        .parameter_names()
        .iter()
        .zip(result.x.iter())
        .map(|(&name, &value)| (name, value))
        .collect::<Vec<_>>();

    info!(
        "{}: chi2 = {:.3}, {} generations, {} evaluations, converged = {}",
        family.name(),
        chi_squared,
        result.n_iterations,
        result.n_evaluations,
        result.converged
    );

    FitResult {
        parameters,
        chi_squared,
        dof: n_valid as i64 - k as i64,
        n_valid,
        k,
        converged: result.converged,
    }
}

/// Final classification of the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallVerdict {
    ErasureFavored,
    Comparable,
    LambdaCdmPreferred,
}

impl fmt::Display for OverallVerdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            OverallVerdict::ErasureFavored => "erasure model favored over LambdaCDM",
            OverallVerdict::Comparable => "models are statistically comparable",
            OverallVerdict::LambdaCdmPreferred => "LambdaCDM preferred",
        };
        write!(f, "{}", s)
    }
}

/// Structured outcome of the full comparison; `Display` renders the tables.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub lambda_cdm: FitResult,
    pub erasure: FitResult,
    pub verdict: ComparisonVerdict,
    pub overall: OverallVerdict,
    pub n_observations: usize,
}

/// Fit both families and compare them; LambdaCDM is the reference.
pub fn run_comparison(data: &SupernovaDataset) -> AnalysisReport {
    let lambda_cdm = fit(ModelFamily::LambdaCdm, data);
    let erasure = fit(ModelFamily::Erasure, data);
    let verdict = compare(&lambda_cdm, &erasure);

    let overall = if verdict.delta_chi_squared > OVERALL_STRONG_DCHI2
        && verdict.delta_aic > OVERALL_STRONG_DAIC
    {
        OverallVerdict::ErasureFavored
    } else if verdict.delta_chi_squared > OVERALL_COMPARABLE_DCHI2 {
        OverallVerdict::Comparable
    } else {
        OverallVerdict::LambdaCdmPreferred
    };

    AnalysisReport {
        lambda_cdm,
        erasure,
        verdict,
        overall,
        n_observations: data.len(),
    }
}

fn fit_table(name: &str, fit: &FitResult) -> String {
    let mut builder = Builder::default();
    builder.push_record(["model", name]);
    for (pname, value) in &fit.parameters {
        builder.push_record([pname.to_string(), format!("{:.4}", value)]);
    }
    builder.push_record(["chi2".to_string(), format!("{:.3}", fit.chi_squared)]);
    builder.push_record(["dof".to_string(), fit.dof.to_string()]);
    builder.push_record([
        "chi2/dof".to_string(),
        format!("{:.4}", fit.reduced_chi_squared()),
    ]);
    builder.push_record(["AIC".to_string(), format!("{:.3}", fit.aic())]);
    builder.push_record(["BIC".to_string(), format!("{:.3}", fit.bic())]);
    builder.push_record(["converged".to_string(), fit.converged.to_string()]);
    let mut table = builder.build();
    table.with(Style::modern_rounded());
    table.to_string()
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Observations after quality cuts: {}", self.n_observations)?;
        writeln!(f)?;
        writeln!(f, "{}", fit_table("LambdaCDM", &self.lambda_cdm))?;
        writeln!(f, "{}", fit_table("Erasure", &self.erasure))?;

        let mut builder = Builder::default();
        builder.push_record(["statistic", "delta", "grade"]);
        builder.push_record([
            "chi2".to_string(),
            format!("{:.3}", self.verdict.delta_chi_squared),
            grade_label(self.verdict.chi2_grade).to_string(),
        ]);
        builder.push_record([
            "AIC".to_string(),
            format!("{:.3}", self.verdict.delta_aic),
            grade_label(self.verdict.aic_grade).to_string(),
        ]);
        builder.push_record([
            "BIC".to_string(),
            format!("{:.3}", self.verdict.delta_bic),
            grade_label(self.verdict.bic_grade).to_string(),
        ]);
        let mut table = builder.build();
        table.with(Style::modern_rounded());
        writeln!(f, "{}", table)?;
        writeln!(f)?;
        write!(f, "Verdict: {}", self.overall)
    }
}

fn grade_label(grade: EvidenceGrade) -> &'static str {
    match grade {
        EvidenceGrade::Strong => "strong",
        EvidenceGrade::Moderate => "moderate",
        EvidenceGrade::Comparable => "comparable",
        EvidenceGrade::ReferencePreferred => "reference preferred",
    }
}
