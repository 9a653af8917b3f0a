//! Supernova dataset loading with quality cuts.
//!
//! The input is a whitespace-delimited table (Pantheon+SH0ES style): lines
//! starting with `#` are comments, the first data line is a header naming
//! the columns. Required columns (names configurable via [`ColumnSpec`]):
//! redshift, distance modulus, diagonal uncertainty and a calibrator flag.
//!
//! Quality cuts applied while loading:
//! - calibrator rows are excluded (they set the distance scale, they must
//!   not be fit),
//! - `z > 0.01` (avoids peculiar-velocity contamination),
//! - `0 < σ < 1.0` (excludes unconstrained outliers).
//!
//! Loading errors are fatal: a malformed table yields a [`DataError`] and no
//! partial dataset.

use log::info;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// minimum redshift kept by the quality cut
pub const MIN_REDSHIFT: f64 = 0.01;
/// uncertainties must lie in (0, MAX_SIGMA)
pub const MAX_SIGMA: f64 = 1.0;

/// One supernova: redshift, observed distance modulus, uncertainty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub redshift: f64,
    pub mu: f64,
    pub sigma: f64,
}

/// Read-only dataset of observations that passed the quality cuts, stored as
/// parallel columns.
#[derive(Debug, Clone, Default)]
pub struct SupernovaDataset {
    pub redshift: Vec<f64>,
    pub mu: Vec<f64>,
    pub sigma: Vec<f64>,
}

impl SupernovaDataset {
    pub fn len(&self) -> usize {
        self.redshift.len()
    }

    pub fn is_empty(&self) -> bool {
        self.redshift.is_empty()
    }

    pub fn push(&mut self, obs: Observation) {
        self.redshift.push(obs.redshift);
        self.mu.push(obs.mu);
        self.sigma.push(obs.sigma);
    }

    /// (min, max) redshift of the dataset, None when empty.
    pub fn redshift_range(&self) -> Option<(f64, f64)> {
        let min = self.redshift.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = self
            .redshift
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        if self.is_empty() { None } else { Some((min, max)) }
    }
}

/// Column names for the four required fields.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub redshift: String,
    pub mu: String,
    pub sigma: String,
    pub calibrator: String,
}

impl Default for ColumnSpec {
    /// Pantheon+SH0ES column names.
    fn default() -> Self {
        ColumnSpec {
            redshift: "zHD".to_string(),
            mu: "MU_SH0ES".to_string(),
            sigma: "MU_SH0ES_ERR_DIAG".to_string(),
            calibrator: "IS_CALIBRATOR".to_string(),
        }
    }
}

/// Error types for dataset loading. All of them are fatal.
#[derive(Debug)]
pub enum DataError {
    Io(std::io::Error),
    MissingHeader,
    MissingColumn(String),
    MalformedRow { line: usize, reason: String },
    EmptyAfterCuts,
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataError::Io(e) => write!(f, "I/O error reading dataset: {}", e),
            DataError::MissingHeader => write!(f, "Dataset has no header row"),
            DataError::MissingColumn(name) => {
                write!(f, "Required column '{}' not found in header", name)
            }
            DataError::MalformedRow { line, reason } => {
                write!(f, "Malformed row at line {}: {}", line, reason)
            }
            DataError::EmptyAfterCuts => {
                write!(f, "No observations survived the quality cuts")
            }
        }
    }
}

impl std::error::Error for DataError {}

impl From<std::io::Error> for DataError {
    fn from(e: std::io::Error) -> Self {
        DataError::Io(e)
    }
}

/// Load a dataset from a whitespace-delimited file with the default
/// Pantheon+ column names.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<SupernovaDataset, DataError> {
    let file = File::open(path)?;
    parse_table(BufReader::new(file), &ColumnSpec::default())
}

/// Parse a whitespace-delimited table from any reader, applying the quality
/// cuts. The `csv` reader family cannot split on runs of whitespace, so this
/// is a plain line parser.
pub fn parse_table<R: BufRead>(
    reader: R,
    columns: &ColumnSpec,
) -> Result<SupernovaDataset, DataError> {
    let mut lines = reader.lines().enumerate();

    // header: first non-comment, non-empty line
    let header = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line?;
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                break trimmed.split_whitespace().map(str::to_string).collect::<Vec<_>>();
            }
            None => return Err(DataError::MissingHeader),
        }
    };

    let find = |name: &str| -> Result<usize, DataError> {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))
    };
    let idx_z = find(&columns.redshift)?;
    let idx_mu = find(&columns.mu)?;
    let idx_sigma = find(&columns.sigma)?;
    let idx_calib = find(&columns.calibrator)?;
    let max_idx = idx_z.max(idx_mu).max(idx_sigma).max(idx_calib);

    let mut dataset = SupernovaDataset::default();
    let mut total_rows = 0usize;

    for (i, line) in lines {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        total_rows += 1;
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() <= max_idx {
            return Err(DataError::MalformedRow {
                line: i + 1,
                reason: format!("expected at least {} fields, got {}", max_idx + 1, fields.len()),
            });
        }

        let parse = |idx: usize, what: &str| -> Result<f64, DataError> {
            fields[idx].parse::<f64>().map_err(|_| DataError::MalformedRow {
                line: i + 1,
                reason: format!("cannot parse {} value '{}'", what, fields[idx]),
            })
        };
        let z = parse(idx_z, "redshift")?;
        let mu = parse(idx_mu, "distance modulus")?;
        let sigma = parse(idx_sigma, "uncertainty")?;
        let calibrator = parse(idx_calib, "calibrator flag")?;

        // quality cuts
        if calibrator != 0.0 {
            continue;
        }
        if z <= MIN_REDSHIFT {
            continue;
        }
        if sigma <= 0.0 || sigma >= MAX_SIGMA {
            continue;
        }
        dataset.push(Observation {
            redshift: z,
            mu,
            sigma,
        });
    }

    if dataset.is_empty() {
        return Err(DataError::EmptyAfterCuts);
    }

    info!("Total SNe in file: {}", total_rows);
    info!("After quality cuts: {}", dataset.len());
    if let Some((z_min, z_max)) = dataset.redshift_range() {
        info!("Redshift range: {:.3} - {:.3}", z_min, z_max);
    }

    Ok(dataset)
}
