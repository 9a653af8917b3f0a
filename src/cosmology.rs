/// coupled matter/dark-energy density evolution for the interacting model
pub mod density_evolution;
/// luminosity distance and distance modulus from an expansion history
pub mod distance;
/// cosmology model variants and the dimensionless Hubble rate E(z)
pub mod expansion;
