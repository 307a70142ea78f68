pub mod aggregate;
pub mod convert;
pub mod rollup;
