use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use anyhow::{bail, Context, Result};
use polars::prelude::{DataFrame, DataType, NamedFrom, Series};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AggregationError;

/// Names of the coordinate and time columns in model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridColumns {
    pub lon: String,
    pub lat: String,
    pub year: String,
}

impl Default for GridColumns {
    fn default() -> Self {
        Self { lon: "Lon".to_string(), lat: "Lat".to_string(), year: "Year".to_string() }
    }
}

impl GridColumns {
    #[inline]
    fn contains(&self, name: &str) -> bool { name == self.lon || name == self.lat || name == self.year }
}

/// Values of one output variable, one per grid row; `None` where missing or non-numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Counts of values excluded from a variable's sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Coercion {
    pub missing: usize,     // empty / null in the input
    pub non_numeric: usize, // present but not parseable as a finite number
}

impl Coercion {
    #[inline] pub fn excluded(&self) -> usize { self.missing + self.non_numeric }
}

/// Per-variable coercion counts for a grid table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoercionReport(pub BTreeMap<String, Coercion>);

impl CoercionReport {
    /// Total number of excluded values across all variables.
    pub fn total(&self) -> usize { self.0.values().map(Coercion::excluded).sum() }

    pub fn get(&self, variable: &str) -> Coercion { self.0.get(variable).copied().unwrap_or_default() }
}

/// Gridded model output: one row per (lon, lat, year), stored column-wise.
/// Rows share cell locations; each distinct (lon, lat) is a location.
#[derive(Debug, Clone)]
pub struct GridTable {
    year: Vec<i32>,
    location: Vec<usize>,         // row -> index into `locations`
    locations: Vec<(f64, f64)>,   // distinct cell centers, in order of first appearance
    variables: Vec<Variable>,
    coercion: CoercionReport,
}

impl GridTable {
    /// Build a grid table from a DataFrame of model output.
    ///
    /// Coordinate and year columns must be fully numeric. Variable columns are coerced
    /// to numbers; anything that does not parse becomes `None` and is counted in the
    /// coercion report. With `variables = None`, every non-coordinate column is used.
    pub fn from_dataframe(df: &DataFrame, columns: &GridColumns, variables: Option<&[String]>) -> Result<Self> {
        let lon = strict_f64(df, &columns.lon)?;
        let lat = strict_f64(df, &columns.lat)?;
        let year = strict_f64(df, &columns.year)?.into_iter()
            .enumerate()
            .map(|(row, year)| {
                if year.fract() != 0.0 || year.abs() > i32::MAX as f64 {
                    bail!("[data::grid] column {:?} row {row}: {year} is not a year", columns.year);
                }
                Ok(year as i32)
            })
            .collect::<Result<Vec<_>>>()?;

        let names = match variables {
            Some(names) => {
                for name in names {
                    if df.column(name).is_err() {
                        bail!(AggregationError::InvalidConfig(format!("variable {name:?} not found in model output")));
                    }
                }
                names.to_vec()
            }
            None => detect_variables(df, columns),
        };
        if names.is_empty() {
            bail!(AggregationError::InvalidConfig("model output has no variable columns".to_string()));
        }

        let mut coercion = CoercionReport::default();
        let variables = names.into_iter()
            .map(|name| -> Result<Variable> {
                let (values, counts) = coerce_f64(df.column(&name)?.as_materialized_series())
                    .with_context(|| format!("[data::grid] failed to coerce variable {name:?}"))?;
                if counts.excluded() > 0 {
                    warn!(variable = %name, missing = counts.missing, non_numeric = counts.non_numeric,
                        "values excluded from weighted sums");
                }
                coercion.0.insert(name.clone(), counts);
                Ok(Variable { name, values })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(lon, lat, year, variables, coercion)
    }

    /// Build a grid table from already-typed columns.
    pub fn new(lon: Vec<f64>, lat: Vec<f64>, year: Vec<i32>, variables: Vec<Variable>, coercion: CoercionReport) -> Result<Self> {
        let rows = lon.len();
        if lat.len() != rows || year.len() != rows || variables.iter().any(|v| v.values.len() != rows) {
            bail!("[data::grid] column lengths differ (expected {rows} rows)");
        }
        if let Some(row) = lon.iter().zip(&lat).position(|(x, y)| !x.is_finite() || !y.is_finite()) {
            bail!("[data::grid] row {row} has a non-finite coordinate");
        }

        let mut index = AHashMap::<(u64, u64), usize>::new();
        let mut locations = Vec::new();
        let location = lon.iter().zip(&lat)
            .map(|(&x, &y)| *index.entry((x.to_bits(), y.to_bits())).or_insert_with(|| {
                locations.push((x, y));
                locations.len() - 1
            }))
            .collect::<Vec<_>>();

        let mut seen = AHashSet::<(usize, i32)>::with_capacity(rows);
        let duplicates = location.iter().zip(&year)
            .filter(|&(&loc, &yr)| !seen.insert((loc, yr)))
            .count();
        if duplicates > 0 {
            warn!(duplicates, "grid rows repeat a (lon, lat, year) combination");
        }

        debug!(rows, locations = locations.len(), variables = variables.len(), "built grid table");
        Ok(Self { year, location, locations, variables, coercion })
    }

    /// Number of (lon, lat, year) rows.
    #[inline] pub fn len(&self) -> usize { self.year.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.year.is_empty() }

    #[inline] pub fn year(&self) -> &[i32] { &self.year }

    /// Location index of every row.
    #[inline] pub fn location(&self) -> &[usize] { &self.location }

    /// Distinct cell centers.
    #[inline] pub fn locations(&self) -> &[(f64, f64)] { &self.locations }

    #[inline] pub fn variables(&self) -> &[Variable] { &self.variables }

    pub fn variable_names(&self) -> Vec<&str> { self.variables.iter().map(|v| v.name.as_str()).collect() }

    #[inline] pub fn coercion(&self) -> &CoercionReport { &self.coercion }
}

/// Every column other than the coordinate and year columns, in input order.
pub fn detect_variables(df: &DataFrame, columns: &GridColumns) -> Vec<String> {
    df.get_column_names().into_iter()
        .map(|name| name.to_string())
        .filter(|name| !columns.contains(name))
        .collect()
}

/// Read a column as f64, failing if any value is missing or not a number.
fn strict_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df.column(name)
        .map_err(|_| AggregationError::InvalidConfig(format!("column {name:?} not found in model output")))?;
    let (values, counts) = coerce_f64(column.as_materialized_series())?;
    if counts.excluded() > 0 {
        bail!("[data::grid] column {name:?} has {} missing or non-numeric value(s)", counts.excluded());
    }
    Ok(values.into_iter().flatten().collect())
}

/// Coerce a series to f64, mapping unparseable and non-finite values to `None`.
fn coerce_f64(series: &Series) -> Result<(Vec<Option<f64>>, Coercion)> {
    let missing = series.null_count();
    let cast = match series.dtype() {
        DataType::String => {
            // Trim first; fixed-width text output pads numbers with spaces.
            let trimmed = series.str()?.into_iter()
                .map(|value| value.map(str::trim))
                .collect::<Vec<_>>();
            Series::new(series.name().clone(), trimmed).cast(&DataType::Float64)?
        }
        _ => series.cast(&DataType::Float64)?,
    };

    let values = cast.f64()?.into_iter()
        .map(|value| value.filter(|v| v.is_finite()))
        .collect::<Vec<_>>();
    let excluded = values.iter().filter(|v| v.is_none()).count();

    Ok((values, Coercion { missing, non_numeric: excluded - missing }))
}
