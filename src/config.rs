use std::{fs, path::{Path, PathBuf}};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::MissingPolicy,
    common::{file_stem, require_file_exists},
    data::GridColumns,
    error::AggregationError,
    geom::{check_resolution, Crs},
    weights::WEIGHT_TOLERANCE,
};

/// Settings of one aggregation run.
///
/// Everything except the three paths has a default, so a minimal JSON file
/// only names `input`, `boundaries` and `output_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Model output, `.out` (whitespace-delimited) or `.csv`.
    pub input: PathBuf,
    /// Region boundary shapefile.
    pub boundaries: PathBuf,
    pub output_dir: PathBuf,
    /// Stem of the output table names; defaults to the input file stem.
    #[serde(default)]
    pub name: Option<String>,

    /// Spacing between neighbouring cell centers, in degrees.
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    /// Variables to aggregate; every non-coordinate column when absent.
    #[serde(default)]
    pub variables: Option<Vec<String>>,

    #[serde(default = "default_region_field")]
    pub region_field: String,
    #[serde(default = "default_lon_column")]
    pub lon_column: String,
    #[serde(default = "default_lat_column")]
    pub lat_column: String,
    #[serde(default = "default_year_column")]
    pub year_column: String,

    /// Overrides the CRS read from the boundary `.prj`.
    #[serde(default)]
    pub boundary_crs: Option<Crs>,
    /// CRS of the grid cell centers.
    #[serde(default = "default_source_crs")]
    pub source_crs: Crs,

    #[serde(default)]
    pub missing_policy: MissingPolicy,
    #[serde(default = "default_weight_tolerance")]
    pub weight_tolerance: f64,
    /// Also write the per-cell area and coverage table.
    #[serde(default)]
    pub dump_cells: bool,
}

fn default_resolution() -> f64 { 0.5 }
fn default_region_field() -> String { "NUTS_ID".to_string() }
fn default_lon_column() -> String { "Lon".to_string() }
fn default_lat_column() -> String { "Lat".to_string() }
fn default_year_column() -> String { "Year".to_string() }
fn default_source_crs() -> Crs { Crs::Wgs84 }
fn default_weight_tolerance() -> f64 { WEIGHT_TOLERANCE }

impl RunConfig {
    /// A configuration with default settings for the given paths.
    pub fn new(input: impl Into<PathBuf>, boundaries: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            boundaries: boundaries.into(),
            output_dir: output_dir.into(),
            name: None,
            resolution: default_resolution(),
            variables: None,
            region_field: default_region_field(),
            lon_column: default_lon_column(),
            lat_column: default_lat_column(),
            year_column: default_year_column(),
            boundary_crs: None,
            source_crs: default_source_crs(),
            missing_policy: MissingPolicy::default(),
            weight_tolerance: default_weight_tolerance(),
            dump_cells: false,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("[config] Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("[config] Failed to parse config file: {}", path.display()))
    }

    /// Check value ranges, then that both input files exist.
    pub fn validate(&self) -> Result<()> {
        self.validate_values()?;
        require_file_exists(&self.input)?;
        require_file_exists(&self.boundaries)?;
        Ok(())
    }

    /// Checks that need no filesystem access.
    pub fn validate_values(&self) -> Result<()> {
        check_resolution(self.resolution)?;
        if !(self.weight_tolerance.is_finite() && self.weight_tolerance >= 0.0) {
            bail!(AggregationError::InvalidConfig(format!(
                "weight tolerance must be a non-negative number, got {}", self.weight_tolerance
            )));
        }
        if !self.source_crs.is_geographic() {
            bail!(AggregationError::InvalidConfig(format!(
                "grid cell centers must be geographic, got EPSG:{}", self.source_crs.epsg()
            )));
        }
        if let Some(variables) = &self.variables {
            if variables.is_empty() {
                bail!(AggregationError::InvalidConfig("variable list is empty".to_string()));
            }
        }
        if self.output_name().is_empty() {
            bail!(AggregationError::InvalidConfig("output name is empty".to_string()));
        }
        Ok(())
    }

    /// Stem shared by every output table of this run.
    pub fn output_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => file_stem(&self.input).unwrap_or_default(),
        }
    }

    pub fn grid_columns(&self) -> GridColumns {
        GridColumns {
            lon: self.lon_column.clone(),
            lat: self.lat_column.clone(),
            year: self.year_column.clone(),
        }
    }
}
