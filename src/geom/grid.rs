use anyhow::Result;
use geo::{polygon, MultiPolygon, Polygon};

use crate::error::AggregationError;

/// Validate a grid resolution (the spacing between neighbouring cell centers).
pub fn check_resolution(resolution: f64) -> Result<(), AggregationError> {
    if resolution.is_finite() && resolution > 0.0 { return Ok(()) }
    Err(AggregationError::InvalidConfig(format!("grid resolution must be a positive number, got {resolution}")))
}

/// Build the rectangular cell around a center, with corners at (lon ± r/2, lat ± r/2).
#[inline]
pub fn cell_polygon(lon: f64, lat: f64, resolution: f64) -> Polygon<f64> {
    let h = resolution / 2.0;
    polygon![
        (x: lon - h, y: lat - h),
        (x: lon - h, y: lat + h),
        (x: lon + h, y: lat + h),
        (x: lon + h, y: lat - h),
    ]
}

/// Build one cell polygon per center, all at the same resolution.
pub fn cell_polygons(centers: &[(f64, f64)], resolution: f64) -> Result<Vec<MultiPolygon<f64>>> {
    check_resolution(resolution)?;
    Ok(centers.iter()
        .map(|&(lon, lat)| MultiPolygon(vec![cell_polygon(lon, lat, resolution)]))
        .collect())
}
