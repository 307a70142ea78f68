use anyhow::Result;
use geo::{Area, BooleanOps, BoundingRect, Contains, MultiPolygon, Rect};
use rayon::prelude::*;

use crate::geom::Geometries;

/// The clipped piece of one shape of `self` that falls inside one shape of `other`.
#[derive(Debug, Clone)]
pub struct Overlap {
    pub cell: usize,   // index into the clipped geometries (grid cells)
    pub region: usize, // index into the clipping geometries (regions)
    pub geometry: MultiPolygon<f64>,
    pub area: f64,
}

impl Geometries {
    /// Intersect every shape of `self` with every shape of `regions` it overlaps.
    ///
    /// Candidate pairs come from the R-tree of `regions`; only those are clipped
    /// exactly. A shape lying wholly inside a region is kept as is, so its area is
    /// bit-identical to the shape's own. Pieces with zero area (pure boundary
    /// touches) are dropped, as are shapes that overlap nothing. Output is ordered
    /// by cell, then region index.
    pub fn overlay(&self, regions: &Geometries) -> Result<Vec<Overlap>> {
        self.require_equal_area()?;
        regions.require_equal_area()?;

        let overlaps = self.shapes().par_iter().enumerate()
            .flat_map_iter(|(cell, shape)| {
                let rect = shape.bounding_rect();
                let mut candidates = rect
                    .map(|rect| regions.query(&rect).collect::<Vec<_>>())
                    .unwrap_or_default();
                candidates.sort_unstable();

                candidates.into_iter().filter_map(move |region| {
                    let other = &regions.shapes()[region];
                    let geometry = if rect.is_some_and(|rect| covers_rect(other, &rect)) && other.contains(shape) {
                        shape.clone()
                    } else {
                        shape.intersection(other)
                    };
                    let area = geometry.unsigned_area();
                    (area > 0.0).then_some(Overlap { cell, region, geometry, area })
                })
            })
            .collect();

        Ok(overlaps)
    }
}

/// Whether the bounding box of `shape` covers `rect`.
fn covers_rect(shape: &MultiPolygon<f64>, rect: &Rect<f64>) -> bool {
    shape.bounding_rect().is_some_and(|outer| {
        outer.min().x <= rect.min().x && outer.min().y <= rect.min().y
            && outer.max().x >= rect.max().x && outer.max().y >= rect.max().y
    })
}
