//! CSV writing operations.

use std::{fs::File, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerWriter, prelude::CsvWriter};

/// Number formatting convention of a written table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvLocale {
    /// `,` between fields, `.` as decimal mark.
    Standard,
    /// `;` between fields, `,` as decimal mark, as spreadsheets in most of Europe expect.
    Excel,
}

impl CsvLocale {
    pub const ALL: [CsvLocale; 2] = [CsvLocale::Standard, CsvLocale::Excel];

    #[inline]
    pub fn separator(&self) -> u8 {
        match self {
            CsvLocale::Standard => b',',
            CsvLocale::Excel => b';',
        }
    }

    #[inline]
    pub fn decimal_comma(&self) -> bool { matches!(self, CsvLocale::Excel) }

    /// Subdirectory of the output directory holding tables in this locale.
    #[inline]
    pub fn subdir(&self) -> &'static str {
        match self {
            CsvLocale::Standard => "csv",
            CsvLocale::Excel => "excel",
        }
    }

    /// Path of the table `name` under `output_dir`.
    pub fn path(&self, output_dir: &Path, name: &str) -> PathBuf {
        let file = match self {
            CsvLocale::Standard => format!("{name}.csv"),
            CsvLocale::Excel => format!("{name}_excel.csv"),
        };
        output_dir.join(self.subdir()).join(file)
    }
}

/// Write a DataFrame to a CSV file in the given locale.
pub fn write_csv(df: &mut DataFrame, path: &Path, locale: CsvLocale) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("[io::csv::write] Failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(file)
        .include_header(true)
        .with_separator(locale.separator())
        .with_decimal_comma(locale.decimal_comma())
        .finish(df)
        .with_context(|| format!("[io::csv::write] Failed to write CSV to {:?}", path))
}
