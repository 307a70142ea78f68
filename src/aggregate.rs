use anyhow::{bail, Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    data::GridTable,
    error::AggregationError,
    types::{country_codes, Level, RegionId, Statistic},
    weights::Intersections,
};

/// Grouping column of country-level output.
pub const COUNTRY_COLUMN: &str = "Country";

/// Weight of each row in the intersection table.
pub const WEIGHT_COLUMN: &str = "intersection_weight";

/// How a missing variable value affects a weighted average.
///
/// Sums are the same under both policies: a missing value contributes nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// The record's weight still counts in the denominator, pulling the average toward zero.
    #[default]
    KeepWeight,
    /// The record is dropped from that variable's average entirely, weight included.
    /// A group whose values are all missing averages to NaN.
    DropRecord,
}

/// One row per (grid row, cell piece): the region, the year, the piece's weight
/// and the originating cell's value for every variable.
#[derive(Debug, Clone)]
pub struct IntersectionTable {
    frame: DataFrame,
    row_region: Vec<usize>, // region index of every frame row
    region_ids: Vec<RegionId>,
    region_column: String,
    year_column: String,
    variables: Vec<String>,
}

impl IntersectionTable {
    /// Expand cell pieces across all grid rows (years) located in their cell.
    pub fn build(
        grid: &GridTable,
        intersections: &Intersections,
        region_ids: &[RegionId],
        region_column: &str,
        year_column: &str,
    ) -> Result<Self> {
        let variables = grid.variable_names().into_iter().map(String::from).collect::<Vec<_>>();
        for reserved in [region_column, year_column, WEIGHT_COLUMN, COUNTRY_COLUMN] {
            if variables.iter().any(|v| v == reserved) {
                bail!(AggregationError::InvalidConfig(format!("variable {reserved:?} collides with a key column")));
            }
        }

        // (grid row, piece index) pairs, in grid row order.
        let (rows, pieces): (Vec<usize>, Vec<usize>) = grid.location().iter().enumerate()
            .flat_map(|(row, &location)| intersections.range_of(location).map(move |piece| (row, piece)))
            .unzip();

        let all_pieces = intersections.pieces();
        let row_region = pieces.iter().map(|&p| all_pieces[p].region).collect::<Vec<_>>();

        let mut columns = vec![
            Column::new(
                region_column.into(),
                row_region.iter().map(|&r| region_ids[r].as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                year_column.into(),
                rows.iter().map(|&row| grid.year()[row]).collect::<Vec<_>>(),
            ),
            Column::new(
                WEIGHT_COLUMN.into(),
                pieces.iter().map(|&p| all_pieces[p].weight).collect::<Vec<_>>(),
            ),
        ];
        columns.extend(grid.variables().iter().map(|variable| Column::new(
            variable.name.as_str().into(),
            rows.iter().map(|&row| variable.values[row]).collect::<Vec<_>>(),
        )));

        let frame = DataFrame::new(columns)
            .context("[aggregate] failed to assemble intersection table")?;
        debug!(rows = frame.height(), variables = variables.len(), "built intersection table");

        Ok(Self {
            frame,
            row_region,
            region_ids: region_ids.to_vec(),
            region_column: region_column.to_string(),
            year_column: year_column.to_string(),
            variables,
        })
    }

    #[inline] pub fn frame(&self) -> &DataFrame { &self.frame }

    #[inline] pub fn height(&self) -> usize { self.frame.height() }

    #[inline] pub fn variables(&self) -> &[String] { &self.variables }

    /// Name of the grouping column for a level.
    pub fn key_column(&self, level: Level) -> &str {
        match level {
            Level::Region => &self.region_column,
            Level::Country => COUNTRY_COLUMN,
        }
    }

    #[inline] pub fn year_column(&self) -> &str { &self.year_column }

    /// The intersection table with a country column derived from each row's region.
    /// Every malformed region identifier is reported at once.
    fn with_country_column(&self) -> Result<DataFrame> {
        let codes = country_codes(&self.region_ids)?;
        let mut frame = self.frame.clone();
        frame.with_column(Column::new(
            COUNTRY_COLUMN.into(),
            self.row_region.iter().map(|&r| codes[r].as_str()).collect::<Vec<_>>(),
        ))?;
        Ok(frame)
    }
}

/// Expression for one variable's statistic within a group.
fn weighted_expr(variable: &str, statistic: Statistic, policy: MissingPolicy) -> Expr {
    // Null values propagate through the product and are skipped by the sum.
    let weighted_sum = (col(variable) * col(WEIGHT_COLUMN)).sum();
    let expr = match (statistic, policy) {
        (Statistic::Sum, _) => weighted_sum,
        (Statistic::Average, MissingPolicy::KeepWeight) => weighted_sum / col(WEIGHT_COLUMN).sum(),
        (Statistic::Average, MissingPolicy::DropRecord) => {
            weighted_sum / col(WEIGHT_COLUMN).filter(col(variable).is_not_null()).sum()
        }
    };
    expr.alias(format!("{}{variable}", statistic.column_prefix()))
}

/// Group the intersection table by (key, year) and compute one statistic per variable.
///
/// Each variable is an independent expression over the same groups, so the output
/// has exactly one row per (key, year) and one column per variable. Rows are sorted
/// by key, then year. The country level is recomputed from the raw intersections,
/// never from region-level results.
pub fn aggregate(table: &IntersectionTable, level: Level, statistic: Statistic, policy: MissingPolicy) -> Result<DataFrame> {
    let frame = match level {
        Level::Region => table.frame.clone(),
        Level::Country => table.with_country_column()?,
    };
    let key = table.key_column(level);
    let year = table.year_column();

    let exprs = table.variables.iter()
        .map(|variable| weighted_expr(variable, statistic, policy))
        .collect::<Vec<_>>();

    let result = frame.lazy()
        .group_by_stable([col(key), col(year)])
        .agg(exprs)
        .sort([key, year], SortMultipleOptions::default())
        .collect()
        .with_context(|| format!("[aggregate] failed to compute {} {} table", level.to_str(), statistic.to_str()))?;

    debug!(level = level.to_str(), statistic = statistic.to_str(), rows = result.height(), "aggregated");
    Ok(result)
}
