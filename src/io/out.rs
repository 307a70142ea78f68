//! Whitespace-delimited model output (`.out` files).

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use polars::prelude::{Column, DataFrame};
use tracing::info;

use crate::io::csv::{read_csv_as_text, write_csv, CsvLocale};

/// Read a whitespace-delimited table with a header row. Every column is text.
///
/// Columns may be separated by any run of spaces or tabs. Blank lines are skipped;
/// a line with a different number of fields than the header is an error.
pub fn read_out(path: &Path) -> Result<DataFrame> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("[io::out] Failed to read model output: {}", path.display()))?;
    parse_out(&text).with_context(|| format!("[io::out] Failed to parse {:?}", path))
}

fn parse_out(text: &str) -> Result<DataFrame> {
    let mut lines = text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = lines.next() else { bail!("no header row") };
    let names = header.split_whitespace().collect::<Vec<_>>();

    let mut columns = vec![Vec::<&str>::new(); names.len()];
    for (number, line) in lines {
        let fields = line.split_whitespace().collect::<Vec<_>>();
        if fields.len() != names.len() {
            bail!("line {}: expected {} fields, found {}", number + 1, names.len(), fields.len());
        }
        for (column, field) in columns.iter_mut().zip(fields) {
            column.push(field);
        }
    }

    Ok(DataFrame::new(names.into_iter().zip(columns)
        .map(|(name, values)| Column::new(name.into(), values))
        .collect())?)
}

/// Read model output from either a `.out` file or an already converted `.csv`.
pub fn read_model_output(path: &Path) -> Result<DataFrame> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => read_csv_as_text(path),
        _ => read_out(path),
    }
}

/// Convert a `.out` file into a comma-delimited CSV, returning the number of rows.
pub fn convert_out_to_csv(input: &Path, output: &Path) -> Result<usize> {
    let mut df = read_out(input)?;
    write_csv(&mut df, output, CsvLocale::Standard)?;
    info!(input = %input.display(), output = %output.display(), rows = df.height(), "converted model output");
    Ok(df.height())
}
