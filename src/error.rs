use std::{fmt, path::PathBuf};

use thiserror::Error;

/// A single intersection whose weight fell outside `[0 - tol, 1 + tol]`.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightViolation {
    pub lon: f64,
    pub lat: f64,
    pub region: String,
    pub weight: f64,
}

impl fmt::Display for WeightViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell ({}, {}) x region {}: weight {}", self.lon, self.lat, self.region, self.weight)
    }
}

/// Fatal failures of an aggregation run.
///
/// These are raised through `anyhow`, so callers that care about the kind can
/// recover it with `err.downcast_ref::<AggregationError>()`.
#[derive(Error, Debug)]
pub enum AggregationError {
    /// A required input file does not exist.
    #[error("missing input file: {}", path.display())]
    MissingInput { path: PathBuf },

    /// A geometry has no usable area, or was used before reprojection.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// One or more intersection weights fell outside the unit interval.
    #[error("{} intersection weight(s) outside [0, 1]:\n{}", .0.len(), join_lines(.0))]
    InvalidWeights(Vec<WeightViolation>),

    /// Region identifiers too short to carry a country prefix.
    #[error("malformed region identifier(s), no country prefix: {0:?}")]
    MalformedKey(Vec<String>),

    /// A configuration value is out of range or inconsistent with the input.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn join_lines<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(|item| format!("  {item}")).collect::<Vec<_>>().join("\n")
}
