use anyhow::{bail, Result};
use tracing::info;

use crate::{
    aggregate::MissingPolicy,
    cli::{AggregateArgs, Cli, Policy},
    config::RunConfig,
    error::AggregationError,
    geom::Crs,
    pipeline,
};

pub fn run(_cli: &Cli, args: &AggregateArgs) -> Result<()> {
    let config = resolve_config(args)?;
    info!(input = %config.input.display(), boundaries = %config.boundaries.display(),
        output_dir = %config.output_dir.display(), "[aggregate] starting run");

    let report = pipeline::run(&config)?;
    info!(files = report.outputs.len(), unmatched_cells = report.unmatched_cells, "[aggregate] done");

    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Start from the JSON config if given, then apply every flag that was set.
fn resolve_config(args: &AggregateArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_json_file(path)?,
        None => {
            let (Some(input), Some(boundaries), Some(output_dir)) = (&args.input, &args.boundaries, &args.output_dir) else {
                bail!(AggregationError::InvalidConfig(
                    "--input, --boundaries and --output-dir are required without --config".to_string()
                ));
            };
            RunConfig::new(input, boundaries, output_dir)
        }
    };

    if let Some(input) = &args.input { config.input = input.clone() }
    if let Some(boundaries) = &args.boundaries { config.boundaries = boundaries.clone() }
    if let Some(output_dir) = &args.output_dir { config.output_dir = output_dir.clone() }
    if let Some(name) = &args.name { config.name = Some(name.clone()) }
    if let Some(resolution) = args.resolution { config.resolution = resolution }
    if let Some(variables) = &args.variables { config.variables = Some(variables.clone()) }
    if let Some(field) = &args.region_field { config.region_field = field.clone() }
    if let Some(column) = &args.lon_column { config.lon_column = column.clone() }
    if let Some(column) = &args.lat_column { config.lat_column = column.clone() }
    if let Some(column) = &args.year_column { config.year_column = column.clone() }
    if let Some(code) = args.boundary_crs { config.boundary_crs = Some(Crs::from_epsg(code)?) }
    if let Some(code) = args.source_crs { config.source_crs = Crs::from_epsg(code)? }
    if let Some(policy) = args.missing_policy {
        config.missing_policy = match policy {
            Policy::KeepWeight => MissingPolicy::KeepWeight,
            Policy::DropRecord => MissingPolicy::DropRecord,
        };
    }
    if let Some(tolerance) = args.weight_tolerance { config.weight_tolerance = tolerance }
    if args.dump_cells { config.dump_cells = true }

    Ok(config)
}
