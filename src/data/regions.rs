use anyhow::{ensure, Result};
use geo::MultiPolygon;
use tracing::debug;

use crate::{error::AggregationError, geom::{Crs, Geometries}, types::RegionId};

/// Administrative regions: an identifier and a (multi)polygon per region.
#[derive(Debug, Clone)]
pub struct RegionSet {
    ids: Vec<RegionId>,
    geoms: Geometries,
}

impl RegionSet {
    pub fn new(ids: Vec<RegionId>, shapes: Vec<MultiPolygon<f64>>, crs: Crs) -> Result<Self> {
        ensure!(
            ids.len() == shapes.len(),
            "[data::regions] {} region ids but {} geometries", ids.len(), shapes.len()
        );
        Ok(Self { ids, geoms: Geometries::new(shapes, crs) })
    }

    #[inline] pub fn len(&self) -> usize { self.ids.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    #[inline] pub fn ids(&self) -> &[RegionId] { &self.ids }

    #[inline] pub fn geoms(&self) -> &Geometries { &self.geoms }

    /// Reproject into the equal-area system and check every region kept a positive area.
    pub fn to_equal_area(&self) -> Result<Self> {
        let geoms = self.geoms.to_equal_area()?;

        let degenerate = self.ids.iter().zip(geoms.areas()?)
            .filter(|(_, area)| !(area.is_finite() && *area > 0.0))
            .map(|(id, _)| id.to_string())
            .collect::<Vec<_>>();
        if !degenerate.is_empty() {
            return Err(AggregationError::InvalidGeometry(format!(
                "region(s) without positive area after reprojection: {degenerate:?}"
            )).into());
        }

        debug!(regions = self.len(), crs = geoms.crs().epsg(), "regions ready for overlay");
        Ok(Self { ids: self.ids.clone(), geoms })
    }
}
