use anyhow::Result;
use geo::{Area, BoundingRect, MultiPolygon, Rect};
use rstar::{RTree, AABB};

use crate::{error::AggregationError, geom::{bbox::BoundingBox, Crs}};

/// A collection of MultiPolygons tagged with the CRS their coordinates are in,
/// indexed by an R-tree over their bounding boxes.
#[derive(Debug, Clone)]
pub struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<BoundingBox>,
    crs: Crs,
}

impl Geometries {
    /// Construct a Geometries object from a vector of MultiPolygons in the given CRS.
    /// Empty shapes are kept (so indices line up with their records) but never indexed.
    pub fn new(shapes: Vec<MultiPolygon<f64>>, crs: Crs) -> Self {
        Self {
            rtree: RTree::bulk_load(
                shapes.iter().enumerate()
                    .filter_map(|(i, shape)| shape.bounding_rect().map(|rect| BoundingBox::new(i, rect)))
                    .collect()
            ),
            shapes,
            crs,
        }
    }

    /// Get the number of MultiPolygons.
    #[inline] pub fn len(&self) -> usize { self.shapes.len() }

    /// Check if there are no MultiPolygons.
    #[inline] pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    /// Get the CRS the coordinates are expressed in.
    #[inline] pub fn crs(&self) -> Crs { self.crs }

    /// Query the R-tree for shape indices whose bounding box intersects `rect`.
    #[inline]
    pub(super) fn query(&self, rect: &Rect<f64>) -> impl Iterator<Item = usize> + '_ {
        let envelope = AABB::from_corners(rect.min().into(), rect.max().into());
        self.rtree.locate_in_envelope_intersecting(&envelope).map(|bb| bb.idx())
    }

    /// Fail unless these geometries are in the equal-area system.
    pub fn require_equal_area(&self) -> Result<(), AggregationError> {
        if self.crs.is_equal_area() { return Ok(()) }
        Err(AggregationError::InvalidGeometry(format!(
            "geometries are in EPSG:{}; reproject to EPSG:{} before measuring area",
            self.crs.epsg(), Crs::EQUAL_AREA.epsg()
        )))
    }

    /// Planar area of each shape in square metres.
    /// Only defined once the shapes are in the equal-area system.
    pub fn areas(&self) -> Result<Vec<f64>> {
        self.require_equal_area()?;
        Ok(self.shapes.iter().map(|shape| shape.unsigned_area()).collect())
    }
}
