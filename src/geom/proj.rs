use anyhow::{anyhow, Result};
use geo::{Area, BoundingRect, ChamberlainDuquetteArea, Coord, MapCoords, MultiPolygon};
use proj4rs::transform::transform;
use tracing::debug;

use crate::{error::AggregationError, geom::{Crs, Geometries}};

/// Smallest and largest accepted ratio of projected planar area to spherical area.
/// An equal-area projection keeps this near 1; degrees mistaken for metres land near 1e-10.
const AREA_RATIO_BOUNDS: (f64, f64) = (0.5, 2.0);

/// Generous envelope of EPSG:3035 coordinates over Europe and its surroundings,
/// as ((min x, min y), (max x, max y)) in metres. Lon/lat degrees fall far outside it.
const LAEA_EXTENT: ((f64, f64), (f64, f64)) = ((1.0e6, 0.5e6), (8.5e6, 7.5e6));

impl Geometries {
    /// Reproject every shape into `target`.
    ///
    /// Geometries already tagged with `target` are returned as-is; if that is the
    /// equal-area system, their coordinates must still lie inside its extent. When
    /// leaving a geographic system the projected areas are checked against the
    /// spherical area of the source shapes. Either way a mis-tagged input is caught
    /// here rather than surfacing later as nonsense weights.
    pub fn reproject(&self, target: Crs) -> Result<Geometries> {
        let source = self.crs();
        if source == target {
            if target.is_equal_area() {
                check_projected_extent(self.shapes())?;
            }
            return Ok(self.clone())
        }

        let (from, to) = (source.proj()?, target.proj()?);

        // proj4rs works in radians on the geographic side.
        let projected = self.shapes().iter()
            .map(|shape| shape.try_map_coords(|coord: Coord<f64>| -> Result<Coord<f64>> {
                let mut point = if source.is_geographic() {
                    (coord.x.to_radians(), coord.y.to_radians(), 0.0)
                } else {
                    (coord.x, coord.y, 0.0)
                };
                transform(&from, &to, &mut point)
                    .map_err(|e| anyhow!("EPSG:{} -> EPSG:{} transform failed at ({}, {}): {e:?}",
                        source.epsg(), target.epsg(), coord.x, coord.y))?;
                Ok(if target.is_geographic() {
                    Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
                } else {
                    Coord { x: point.0, y: point.1 }
                })
            }))
            .collect::<Result<Vec<_>>>()?;

        if source.is_geographic() && target.is_equal_area() {
            check_projected_areas(self.shapes(), &projected)?;
        }

        debug!(shapes = projected.len(), from = source.epsg(), to = target.epsg(), "reprojected geometries");
        Ok(Geometries::new(projected, target))
    }

    /// Reproject into the equal-area system used for all area computations.
    #[inline]
    pub fn to_equal_area(&self) -> Result<Geometries> { self.reproject(Crs::EQUAL_AREA) }
}

/// Compare the planar area of each projected shape with the spherical area of its
/// geographic source, rejecting degenerate or implausible results.
fn check_projected_areas(geographic: &[MultiPolygon<f64>], projected: &[MultiPolygon<f64>]) -> Result<()> {
    let (lo, hi) = AREA_RATIO_BOUNDS;
    let bad = geographic.iter().zip(projected).enumerate()
        .filter(|(_, (source, _))| !source.0.is_empty())
        .filter_map(|(i, (source, shape))| {
            let planar = shape.unsigned_area();
            let spherical = source.chamberlain_duquette_unsigned_area();
            let ratio = planar / spherical;
            (!(planar.is_finite() && planar > 0.0 && ratio >= lo && ratio <= hi))
                .then(|| format!("shape {i}: projected area {planar:.3e} m2 vs spherical {spherical:.3e} m2"))
        })
        .collect::<Vec<_>>();

    if bad.is_empty() { return Ok(()) }
    Err(AggregationError::InvalidGeometry(format!(
        "{} shape(s) have implausible area after reprojection: {}",
        bad.len(), bad.join("; ")
    )).into())
}

/// Reject shapes tagged EPSG:3035 whose bounding box leaves its extent,
/// e.g. lon/lat degrees carried under a projected tag.
fn check_projected_extent(shapes: &[MultiPolygon<f64>]) -> Result<()> {
    let ((x0, y0), (x1, y1)) = LAEA_EXTENT;
    let bad = shapes.iter().enumerate()
        .filter_map(|(i, shape)| shape.bounding_rect().map(|rect| (i, rect)))
        .filter(|(_, rect)| !(rect.min().x >= x0 && rect.min().y >= y0 && rect.max().x <= x1 && rect.max().y <= y1))
        .map(|(i, rect)| format!("shape {i}: x {:.3e}..{:.3e}, y {:.3e}..{:.3e}",
            rect.min().x, rect.max().x, rect.min().y, rect.max().y))
        .collect::<Vec<_>>();

    if bad.is_empty() { return Ok(()) }
    Err(AggregationError::InvalidGeometry(format!(
        "{} shape(s) tagged EPSG:{} lie outside its extent (coordinates in degrees?): {}",
        bad.len(), Crs::EQUAL_AREA.epsg(), bad.join("; ")
    )).into())
}

#[cfg(test)]
mod tests {
    use geo::{polygon, BoundingRect, MultiPolygon};

    use super::*;

    fn cell(lon: f64, lat: f64, r: f64) -> MultiPolygon<f64> {
        let h = r / 2.0;
        MultiPolygon(vec![polygon![
            (x: lon - h, y: lat - h), (x: lon - h, y: lat + h), (x: lon + h, y: lat + h), (x: lon + h, y: lat - h),
        ]])
    }

    #[test]
    fn projection_origin_maps_to_false_origin() {
        let geoms = Geometries::new(vec![cell(10.0, 52.0, 0.5)], Crs::Wgs84);
        let projected = geoms.to_equal_area().unwrap();
        assert_eq!(projected.crs(), Crs::LaeaEurope);

        let rect = projected.shapes()[0].bounding_rect().unwrap();
        let center = rect.center();
        assert!((center.x - 4_321_000.0).abs() < 1.0, "x = {}", center.x);
        assert!((center.y - 3_210_000.0).abs() < 500.0, "y = {}", center.y);
    }

    #[test]
    fn half_degree_cell_has_plausible_area() {
        let geoms = Geometries::new(vec![cell(10.0, 50.0, 0.5)], Crs::Wgs84);
        let area = geoms.to_equal_area().unwrap().areas().unwrap()[0];
        // 0.5 x 0.5 degrees at 50N is roughly 55.6 km x 35.8 km.
        assert!(area > 1.9e9 && area < 2.1e9, "area = {area}");
    }

    #[test]
    fn same_crs_is_identity() {
        let geoms = Geometries::new(vec![cell(4_000_000.0, 3_000_000.0, 1000.0)], Crs::LaeaEurope);
        let out = geoms.to_equal_area().unwrap();
        assert_eq!(out.shapes(), geoms.shapes());
    }

    #[test]
    fn degrees_tagged_as_equal_area_are_rejected() {
        let geoms = Geometries::new(vec![cell(10.5, 50.5, 3.0)], Crs::LaeaEurope);
        let err = geoms.to_equal_area().unwrap_err();
        match err.downcast_ref::<AggregationError>() {
            Some(AggregationError::InvalidGeometry(msg)) => assert!(msg.contains("shape 0")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_shapes_skip_the_extent_check() {
        let geoms = Geometries::new(vec![MultiPolygon(vec![]), cell(4_000_000.0, 3_000_000.0, 1000.0)], Crs::LaeaEurope);
        assert!(geoms.to_equal_area().is_ok());
    }

    #[test]
    fn inverse_projection_round_trips() {
        let geoms = Geometries::new(vec![cell(12.0, 48.0, 0.5)], Crs::Wgs84);
        let back = geoms.to_equal_area().unwrap().reproject(Crs::Wgs84).unwrap();
        let rect = back.shapes()[0].bounding_rect().unwrap();
        assert!((rect.min().x - 11.75).abs() < 1e-6);
        assert!((rect.max().y - 48.25).abs() < 1e-6);
    }

    #[test]
    fn metres_mistagged_as_degrees_are_rejected() {
        // Coordinates far outside lon/lat range; the transform either fails or yields nonsense area.
        let geoms = Geometries::new(vec![cell(4_321_000.0, 3_210_000.0, 1000.0)], Crs::Wgs84);
        assert!(geoms.to_equal_area().is_err());
    }
}
