//! IO module for format-specific reading and writing operations.
//!
//! Organized by format type rather than domain:
//!
//! - `csv` - delimited tables, in the standard and the spreadsheet locale
//! - `out` - whitespace-delimited model output
//! - `shp` - Shapefile region boundaries

pub mod csv;
pub mod out;
pub mod shp;

pub use csv::{read_csv, read_csv_as_text, write_csv, CsvLocale};
pub use out::{convert_out_to_csv, read_model_output, read_out};
pub use shp::read_boundaries;
