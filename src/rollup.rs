use anyhow::{bail, Context, Result};
use polars::prelude::*;
use tracing::debug;

use crate::{aggregate::COUNTRY_COLUMN, error::AggregationError, types::{country_codes, RegionId}};

/// Sum a per-region table up to countries.
///
/// Rows are grouped by the country prefix of `key`, and by `year` when the table
/// has that column. Every other numeric column is summed; text columns are dropped.
/// Only additive quantities (areas, weighted sums) make sense to roll up this way.
pub fn rollup_by_country(df: &DataFrame, key: &str, year: &str) -> Result<DataFrame> {
    let ids = df.column(key)
        .map_err(|_| AggregationError::InvalidConfig(format!("key column {key:?} not found")))?
        .cast(&DataType::String)?;
    let ids = ids.str()?.into_iter()
        .enumerate()
        .map(|(row, id)| match id {
            Some(id) => Ok(RegionId::new(id)),
            None => bail!("[rollup] row {row} has no {key}"),
        })
        .collect::<Result<Vec<_>>>()?;
    let codes = country_codes(&ids)?;

    let has_year = df.column(year).is_ok();
    let mut keys = vec![col(COUNTRY_COLUMN)];
    if has_year {
        keys.push(col(year));
    }

    let values = df.get_columns().iter()
        .filter(|column| column.name().as_str() != key && column.name().as_str() != year)
        .filter(|column| is_numeric(column.dtype()))
        .map(|column| col(column.name().clone()).sum())
        .collect::<Vec<_>>();
    if values.is_empty() {
        bail!(AggregationError::InvalidConfig(format!("no numeric columns to sum besides {key:?}")));
    }

    let mut frame = df.clone();
    frame.with_column(Column::new(COUNTRY_COLUMN.into(), codes))?;

    let mut sort_by = vec![COUNTRY_COLUMN];
    if has_year {
        sort_by.push(year);
    }
    let result = frame.lazy()
        .group_by_stable(keys)
        .agg(values)
        .sort(sort_by, SortMultipleOptions::default())
        .collect()
        .context("[rollup] failed to sum by country")?;

    debug!(regions = df.height(), rows = result.height(), "rolled up to countries");
    Ok(result)
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64 | DataType::Float32
            | DataType::Int64 | DataType::Int32 | DataType::Int16 | DataType::Int8
            | DataType::UInt64 | DataType::UInt32 | DataType::UInt16 | DataType::UInt8
    )
}
