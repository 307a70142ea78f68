//! Shapefile region boundaries.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::{self as shp, dbase::{FieldValue, Record}, Reader, Shape};
use tracing::{info, warn};

use crate::{data::RegionSet, error::AggregationError, geom::Crs, types::RegionId};

/// Load region boundaries from a shapefile, one region per feature.
///
/// The region identifier comes from `field` (character or numeric). The CRS is
/// `crs` when given, otherwise detected from the sibling `.prj` file.
pub fn read_boundaries(path: &Path, field: &str, crs: Option<Crs>) -> Result<RegionSet> {
    let crs = match crs {
        Some(crs) => crs,
        None => detect_crs(path)?,
    };

    let mut reader = Reader::from_path(path)
        .with_context(|| format!("[io::shp] Failed to open shapefile: {}", path.display()))?;

    let mut ids = Vec::new();
    let mut shapes = Vec::new();
    for (i, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result
            .with_context(|| format!("[io::shp] Error reading shape+record {i} of {}", path.display()))?;
        let id = region_id(&record, field)
            .with_context(|| format!("[io::shp] feature {i} of {}", path.display()))?;
        let shape = match shape {
            Shape::Polygon(polygon) => shp_to_geo(&polygon),
            Shape::NullShape => {
                warn!(region = %id, "region has no geometry");
                MultiPolygon(vec![])
            }
            other => bail!("[io::shp] region {id}: found non-Polygon shape {:?}", other.shapetype()),
        };
        ids.push(id);
        shapes.push(shape);
    }

    info!(path = %path.display(), regions = ids.len(), crs = crs.epsg(), "loaded region boundaries");
    RegionSet::new(ids, shapes, crs)
}

/// CRS of a shapefile, from the `.prj` file next to it.
fn detect_crs(path: &Path) -> Result<Crs> {
    let prj = path.with_extension("prj");
    if !prj.exists() {
        bail!(AggregationError::InvalidConfig(format!(
            "no .prj next to {}; set the boundary CRS explicitly", path.display()
        )));
    }
    let wkt = fs::read_to_string(&prj)
        .with_context(|| format!("[io::shp] Failed to read {}", prj.display()))?;
    match Crs::from_prj_wkt(&wkt) {
        Some(crs) => Ok(crs),
        None => bail!(AggregationError::InvalidConfig(format!(
            "unsupported coordinate system in {}", prj.display()
        ))),
    }
}

/// Read the region identifier of a record, accepting text or numeric fields.
fn region_id(record: &Record, field: &str) -> Result<RegionId> {
    match record.get(field) {
        Some(FieldValue::Character(Some(s))) if !s.trim().is_empty() => Ok(RegionId::new(s.trim())),
        Some(FieldValue::Numeric(Some(n))) if n.fract() == 0.0 => Ok(RegionId::new(&format!("{n:.0}"))),
        Some(FieldValue::Numeric(Some(n))) => Ok(RegionId::new(&n.to_string())),
        Some(_) => bail!("empty or unsupported value in field {field:?}"),
        None => bail!(AggregationError::InvalidConfig(format!("region field {field:?} not found"))),
    }
}

/// Convert a shapefile polygon to a multipolygon, grouping each exterior ring
/// (clockwise in shapefiles) with the holes that follow it.
fn shp_to_geo(p: &shp::Polygon) -> MultiPolygon<f64> {
    /// Signed area of a closed ring; negative for clockwise.
    fn signed_area(pts: &[Coord<f64>]) -> f64 {
        pts.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum::<f64>() / 2.0
    }

    let mut polygons = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for ring in p.rings() {
        let mut coords = ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect::<Vec<_>>();
        if coords.len() < 3 { continue }
        if coords.first() != coords.last() {
            coords.push(coords[0]);
        }

        if signed_area(&coords) < 0.0 {
            if let Some(ext) = exterior.take() {
                polygons.push(Polygon::new(ext, std::mem::take(&mut holes)));
            }
            exterior = Some(LineString(coords));
        } else {
            holes.push(LineString(coords));
        }
    }
    if let Some(ext) = exterior {
        polygons.push(Polygon::new(ext, holes));
    }

    MultiPolygon(polygons)
}
