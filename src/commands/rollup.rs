use anyhow::Result;
use tracing::info;

use crate::{
    cli::{Cli, RollupArgs},
    common::require_file_exists,
    io::{read_csv, write_csv, CsvLocale},
    rollup::rollup_by_country,
};

pub fn run(_cli: &Cli, args: &RollupArgs) -> Result<()> {
    require_file_exists(&args.input)?;

    let df = read_csv(&args.input, &[args.key.as_str()])?;
    let mut countries = rollup_by_country(&df, &args.key, &args.year_column)?;

    let locale = if args.excel { CsvLocale::Excel } else { CsvLocale::Standard };
    write_csv(&mut countries, &args.output, locale)?;
    info!(regions = df.height(), countries = countries.height(), output = %args.output.display(), "[rollup] done");
    Ok(())
}
