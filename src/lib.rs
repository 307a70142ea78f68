#![doc = "Area-weighted aggregation of gridded model output onto administrative regions"]
pub mod aggregate;
pub mod cli;
pub mod commands;
mod common;
pub mod config;
pub mod data;
pub mod error;
pub mod geom;
pub mod io;
pub mod pipeline;
pub mod rollup;
pub mod types;
pub mod weights;

#[doc(inline)]
pub use aggregate::{aggregate, IntersectionTable, MissingPolicy};

#[doc(inline)]
pub use config::RunConfig;

#[doc(inline)]
pub use error::{AggregationError, WeightViolation};

#[doc(inline)]
pub use pipeline::{aggregate_all, run, AggregateOptions, Aggregation, RunReport};

#[doc(inline)]
pub use types::{Level, RegionId, Statistic};
