use anyhow::Result;
use tracing::info;

use crate::{cli::{Cli, ConvertArgs}, common::require_file_exists, io::convert_out_to_csv};

pub fn run(_cli: &Cli, args: &ConvertArgs) -> Result<()> {
    require_file_exists(&args.input)?;
    let output = args.output.clone().unwrap_or_else(|| args.input.with_extension("csv"));

    let rows = convert_out_to_csv(&args.input, &output)?;
    info!(rows, output = %output.display(), "[convert] done");
    Ok(())
}
