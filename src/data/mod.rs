mod grid;
mod regions;

pub use grid::{detect_variables, Coercion, CoercionReport, GridColumns, GridTable, Variable};
pub use regions::RegionSet;
