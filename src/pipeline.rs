use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::{Column, DataFrame};
use serde::Serialize;
use tracing::info;

use crate::{
    aggregate::{aggregate, IntersectionTable, MissingPolicy},
    common::ensure_dir_exists,
    config::RunConfig,
    data::{CoercionReport, GridTable, RegionSet},
    error::AggregationError,
    geom::{cell_polygons, Crs, Geometries},
    io::{read_boundaries, read_model_output, write_csv, CsvLocale},
    types::{Level, Statistic},
    weights::{Intersections, WEIGHT_TOLERANCE},
};

/// Subdirectory of the per-cell area tables.
const CELLS_DIR: &str = "cells";

/// Settings of the in-memory part of a run.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub resolution: f64,
    pub source_crs: Crs,
    pub missing_policy: MissingPolicy,
    pub weight_tolerance: f64,
    pub region_column: String,
    pub year_column: String,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            resolution: 0.5,
            source_crs: Crs::Wgs84,
            missing_policy: MissingPolicy::default(),
            weight_tolerance: WEIGHT_TOLERANCE,
            region_column: "NUTS_ID".to_string(),
            year_column: "Year".to_string(),
        }
    }
}

impl From<&RunConfig> for AggregateOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            resolution: config.resolution,
            source_crs: config.source_crs,
            missing_policy: config.missing_policy,
            weight_tolerance: config.weight_tolerance,
            region_column: config.region_field.clone(),
            year_column: config.year_column.clone(),
        }
    }
}

/// One aggregated table and the level/statistic it was computed for.
#[derive(Debug, Clone)]
pub struct AggregateTable {
    pub level: Level,
    pub statistic: Statistic,
    pub frame: DataFrame,
}

impl AggregateTable {
    /// File stem of this table, e.g. `region_weighted_avgs_<name>`.
    pub fn file_name(&self, name: &str) -> String {
        format!("{}_weighted_{}_{name}", self.level.to_str(), self.statistic.to_str())
    }
}

/// Every result of a run, held in memory until written.
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Region averages, country averages, region sums, country sums.
    pub tables: Vec<AggregateTable>,
    /// Per cell location: lon, lat, projected area in km² and covered share.
    pub cells: DataFrame,
    pub locations: usize,
    pub pieces: usize,
    pub unmatched_cells: usize,
    pub intersection_rows: usize,
}

impl Aggregation {
    pub fn table(&self, level: Level, statistic: Statistic) -> Option<&DataFrame> {
        self.tables.iter()
            .find(|table| table.level == level && table.statistic == statistic)
            .map(|table| &table.frame)
    }
}

/// Weight every grid cell against the regions and aggregate all variables at
/// both levels, for both statistics. Nothing is written.
pub fn aggregate_all(grid: &GridTable, regions: &RegionSet, options: &AggregateOptions) -> Result<Aggregation> {
    let cells = Geometries::new(cell_polygons(grid.locations(), options.resolution)?, options.source_crs)
        .to_equal_area()
        .context("[pipeline] failed to project grid cells")?;
    info!(locations = cells.len(), rows = grid.len(), resolution = options.resolution, "built grid cells");

    let regions_projected = regions.to_equal_area()
        .context("[pipeline] failed to project region boundaries")?;

    let intersections = Intersections::compute(&cells, grid.locations(), regions_projected.geoms())?;
    intersections.validate(options.weight_tolerance, grid.locations(), regions.ids())?;
    if intersections.is_empty() && !grid.is_empty() {
        return Err(AggregationError::InvalidGeometry(format!(
            "none of the {} grid cells overlaps any of the {} regions; check the CRS of both inputs",
            grid.locations().len(), regions.len()
        )).into());
    }
    info!(pieces = intersections.len(), unmatched_cells = intersections.unmatched(), "computed intersection weights");

    let table = IntersectionTable::build(
        grid, &intersections, regions.ids(), &options.region_column, &options.year_column,
    )?;

    let tables = Statistic::ALL.into_iter()
        .flat_map(|statistic| Level::ALL.into_iter().map(move |level| (level, statistic)))
        .map(|(level, statistic)| -> Result<AggregateTable> {
            Ok(AggregateTable { level, statistic, frame: aggregate(&table, level, statistic, options.missing_policy)? })
        })
        .collect::<Result<Vec<_>>>()?;
    info!(tables = tables.len(), intersection_rows = table.height(), "aggregated");

    Ok(Aggregation {
        tables,
        cells: cell_table(grid.locations(), &intersections)?,
        locations: grid.locations().len(),
        pieces: intersections.len(),
        unmatched_cells: intersections.unmatched(),
        intersection_rows: table.height(),
    })
}

fn cell_table(locations: &[(f64, f64)], intersections: &Intersections) -> Result<DataFrame> {
    let (lon, lat): (Vec<f64>, Vec<f64>) = locations.iter().copied().unzip();
    Ok(DataFrame::new(vec![
        Column::new("lon".into(), lon),
        Column::new("lat".into(), lat),
        Column::new("area_km2".into(), intersections.cell_areas().iter().map(|a| a / 1e6).collect::<Vec<_>>()),
        Column::new("coverage".into(), intersections.coverage()),
    ])?)
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub rows: usize,
    pub locations: usize,
    pub regions: usize,
    pub pieces: usize,
    pub unmatched_cells: usize,
    pub intersection_rows: usize,
    pub coercion: CoercionReport,
    pub outputs: Vec<PathBuf>,
}

/// Run the whole pipeline: load, weight, aggregate, then write every table.
///
/// Inputs are checked before anything is read, and all tables are computed
/// before the first file is written, so a failed run leaves no partial output.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    config.validate()?;
    let name = config.output_name();

    let df = read_model_output(&config.input)?;
    let grid = GridTable::from_dataframe(&df, &config.grid_columns(), config.variables.as_deref())
        .with_context(|| format!("[pipeline] invalid model output in {}", config.input.display()))?;
    drop(df);
    info!(path = %config.input.display(), rows = grid.len(), variables = ?grid.variable_names(), "loaded model output");

    let regions = read_boundaries(&config.boundaries, &config.region_field, config.boundary_crs)?;

    let mut aggregation = aggregate_all(&grid, &regions, &AggregateOptions::from(config))?;

    let mut outputs = Vec::new();
    for table in &mut aggregation.tables {
        let file_name = table.file_name(&name);
        outputs.extend(write_both_locales(&mut table.frame, &config.output_dir, |locale| {
            locale.path(&config.output_dir, &file_name)
        })?);
    }
    if config.dump_cells {
        let cells_dir = config.output_dir.join(CELLS_DIR);
        outputs.extend(write_both_locales(&mut aggregation.cells, &config.output_dir, |locale| match locale {
            CsvLocale::Standard => cells_dir.join(format!("{name}_cells.csv")),
            CsvLocale::Excel => cells_dir.join(format!("{name}_cells_excel.csv")),
        })?);
    }
    info!(output_dir = %config.output_dir.display(), files = outputs.len(), "wrote results");

    Ok(RunReport {
        rows: grid.len(),
        locations: aggregation.locations,
        regions: regions.len(),
        pieces: aggregation.pieces,
        unmatched_cells: aggregation.unmatched_cells,
        intersection_rows: aggregation.intersection_rows,
        coercion: grid.coercion().clone(),
        outputs,
    })
}

fn write_both_locales(df: &mut DataFrame, output_dir: &Path, path_of: impl Fn(CsvLocale) -> PathBuf) -> Result<Vec<PathBuf>> {
    CsvLocale::ALL.into_iter()
        .map(|locale| -> Result<PathBuf> {
            let path = path_of(locale);
            ensure_dir_exists(path.parent().unwrap_or(output_dir))?;
            write_csv(df, &path, locale)?;
            Ok(path)
        })
        .collect()
}
