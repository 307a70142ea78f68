//! CSV reading operations.

use std::{fs::File, path::Path, sync::Arc};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerReader, prelude::{CsvReadOptions, CsvReader, DataType, Field, Schema}};

/// Reads a CSV file from `path` into a Polars DataFrame, inferring column types
/// except for `text_columns`, which are always read as strings so identifiers
/// like `01` keep their leading zeros.
pub fn read_csv(path: &Path, text_columns: &[&str]) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[io::csv::read] Failed to open CSV file: {}", path.display()))?;
    let schema = Schema::from_iter(text_columns.iter().map(|name| Field::new((*name).into(), DataType::String)));
    let options = CsvReadOptions::default()
        .with_has_header(true)
        .with_schema_overwrite(Some(Arc::new(schema)));
    CsvReader::new(file)
        .with_options(options)
        .finish()
        .with_context(|| format!("[io::csv::read] Failed to read CSV from {:?}", path))
}

/// Reads a comma-delimited file with a header row, keeping every column as text.
///
/// Model output is coerced column by column later, so a stray token in one
/// variable never changes how the others are read.
pub fn read_csv_as_text(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[io::csv::read] Failed to open CSV file: {}", path.display()))?;
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("[io::csv::read] Failed to read CSV from {:?}", path))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use polars::prelude::DataType;

    use super::*;

    #[test]
    fn text_reader_keeps_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.csv");
        fs::write(&path, "Lon,Lat,Year,X\n10.25,50.25,2000,1.5\n10.75,50.25,2000,NA\n").unwrap();

        let df = read_csv_as_text(&path).unwrap();
        assert_eq!(df.shape(), (2, 4));
        assert!(df.dtypes().iter().all(|dtype| *dtype == DataType::String));
    }

    #[test]
    fn inferring_reader_types_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        fs::write(&path, "NUTS_ID,Year,weighted_sum_X\nDE11,2000,1.5\n").unwrap();

        let df = read_csv(&path, &[]).unwrap();
        assert_eq!(df.column("weighted_sum_X").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn text_columns_keep_leading_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("areas.csv");
        fs::write(&path, "ID,area_km2\n0101,1.5\n0202,2.5\n").unwrap();

        let df = read_csv(&path, &["ID"]).unwrap();
        let ids = df.column("ID").unwrap().str().unwrap().into_no_null_iter().collect::<Vec<_>>();
        assert_eq!(ids, vec!["0101", "0202"]);
        assert_eq!(df.column("area_km2").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn missing_file_names_path() {
        let err = read_csv(Path::new("/nonexistent/table.csv"), &[]).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/table.csv"));
    }
}
