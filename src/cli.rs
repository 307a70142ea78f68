use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

/// Area-weighted aggregation of gridded model output to regions and countries
#[derive(Parser, Debug)]
#[command(name = "gridagg", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Aggregate model output onto region boundaries
    Aggregate(AggregateArgs),

    /// Convert whitespace-delimited model output (.out) to CSV
    Convert(ConvertArgs),

    /// Sum a per-region table up to countries
    Rollup(RollupArgs),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
pub enum Policy { KeepWeight, DropRecord }

/// Every flag overrides the same field of the JSON config, if one is given.
#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// JSON run configuration
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Model output (.out or .csv)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,

    /// Region boundary shapefile
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub boundaries: Option<PathBuf>,

    /// Output location (directory)
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,

    /// Stem of the output table names (default: input file stem)
    #[arg(long)]
    pub name: Option<String>,

    /// Grid resolution in degrees
    #[arg(short, long)]
    pub resolution: Option<f64>,

    /// Variables to aggregate, comma separated (default: all)
    #[arg(long, value_delimiter = ',')]
    pub variables: Option<Vec<String>>,

    /// Region identifier field of the shapefile
    #[arg(long)]
    pub region_field: Option<String>,

    #[arg(long)]
    pub lon_column: Option<String>,

    #[arg(long)]
    pub lat_column: Option<String>,

    #[arg(long)]
    pub year_column: Option<String>,

    /// EPSG code of the boundaries, overriding the .prj
    #[arg(long)]
    pub boundary_crs: Option<u32>,

    /// EPSG code of the grid cell centers
    #[arg(long)]
    pub source_crs: Option<u32>,

    /// Treatment of missing values in weighted averages
    #[arg(long, value_enum)]
    pub missing_policy: Option<Policy>,

    /// Tolerance on the unit interval for intersection weights
    #[arg(long)]
    pub weight_tolerance: Option<f64>,

    /// Also write per-cell areas and coverage
    #[arg(long)]
    pub dump_cells: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub report: bool,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Whitespace-delimited input file
    #[arg(value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Output CSV file (default: input with .csv extension)
    #[arg(value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RollupArgs {
    /// Per-region CSV table
    #[arg(value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Output CSV file
    #[arg(value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Region identifier column
    #[arg(long, default_value = "NUTS_ID")]
    pub key: String,

    /// Year column, kept as a grouping key when present
    #[arg(long, default_value = "Year")]
    pub year_column: String,

    /// Write with `;` separators and decimal commas
    #[arg(long)]
    pub excel: bool,
}
