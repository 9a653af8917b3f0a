/// chi-squared scoring of a model against a supernova dataset
pub mod chi_squared;
/// seeded differential evolution over box-constrained parameters
pub mod differential_evolution;
/// fit results, information criteria and evidence classification
pub mod model_selection;
/// fit both model families, compare them and build the report
pub mod pipeline;
