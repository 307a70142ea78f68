use std::ops::Range;

use anyhow::{ensure, Result};
use geo::MultiPolygon;
use tracing::debug;

use crate::{error::{AggregationError, WeightViolation}, geom::Geometries, types::RegionId};

/// Default tolerance on the unit interval for intersection weights.
pub const WEIGHT_TOLERANCE: f64 = 1e-10;

/// One piece of a grid cell that falls inside one region.
#[derive(Debug, Clone)]
pub struct CellPiece {
    pub location: usize, // index of the originating cell location
    pub region: usize,   // index of the region
    pub geometry: MultiPolygon<f64>,
    pub cell_area: f64,  // area of the whole originating cell, m2
    pub area: f64,       // area of this piece, m2
    pub weight: f64,     // area / cell_area
}

/// All weighted cell pieces of a run, ordered by location then region.
#[derive(Debug, Clone)]
pub struct Intersections {
    pieces: Vec<CellPiece>,
    cell_areas: Vec<f64>,
    by_location: Vec<Range<usize>>, // location -> range into `pieces`
}

impl Intersections {
    /// Overlay projected grid cells (one shape per location) with projected regions,
    /// and weight each piece by the share of its cell's area it covers.
    ///
    /// Cell areas are measured once per location, so every piece of the same cell
    /// divides by the same number. Cells without positive area abort the run.
    pub fn compute(cells: &Geometries, locations: &[(f64, f64)], regions: &Geometries) -> Result<Self> {
        ensure!(
            cells.len() == locations.len(),
            "[weights] {} cell shapes but {} cell locations", cells.len(), locations.len()
        );
        let cell_areas = cells.areas()?;

        let degenerate = cell_areas.iter().enumerate()
            .filter(|(_, area)| !(area.is_finite() && **area > 0.0))
            .map(|(i, area)| format!("({}, {}) area {area}", locations[i].0, locations[i].1))
            .collect::<Vec<_>>();
        if !degenerate.is_empty() {
            return Err(AggregationError::InvalidGeometry(format!(
                "grid cell(s) without positive area: {}", degenerate.join(", ")
            )).into());
        }

        let pieces = cells.overlay(regions)?.into_iter()
            .map(|overlap| {
                let cell_area = cell_areas[overlap.cell];
                CellPiece {
                    location: overlap.cell,
                    region: overlap.region,
                    weight: overlap.area / cell_area,
                    area: overlap.area,
                    geometry: overlap.geometry,
                    cell_area,
                }
            })
            .collect::<Vec<_>>();

        let intersections = Self::from_pieces(pieces, cell_areas)?;
        debug!(pieces = intersections.len(), unmatched = intersections.unmatched(), "weighted cell pieces");
        Ok(intersections)
    }

    /// Assemble from pieces already sorted by location.
    pub fn from_pieces(pieces: Vec<CellPiece>, cell_areas: Vec<f64>) -> Result<Self> {
        ensure!(
            pieces.windows(2).all(|w| w[0].location <= w[1].location),
            "[weights] cell pieces must be ordered by location"
        );
        ensure!(
            pieces.iter().all(|piece| piece.location < cell_areas.len()),
            "[weights] cell piece refers to an unknown location"
        );

        let mut by_location = vec![0..0; cell_areas.len()];
        let mut start = 0;
        while start < pieces.len() {
            let location = pieces[start].location;
            let end = start + pieces[start..].iter().take_while(|p| p.location == location).count();
            by_location[location] = start..end;
            start = end;
        }

        Ok(Self { pieces, cell_areas, by_location })
    }

    #[inline] pub fn len(&self) -> usize { self.pieces.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.pieces.is_empty() }

    #[inline] pub fn pieces(&self) -> &[CellPiece] { &self.pieces }

    /// Projected area of every cell location, m2.
    #[inline] pub fn cell_areas(&self) -> &[f64] { &self.cell_areas }

    /// Indices into `pieces()` of the pieces cut from the cell at `location`.
    #[inline]
    pub fn range_of(&self, location: usize) -> Range<usize> { self.by_location[location].clone() }

    /// Pieces cut from the cell at `location`.
    #[inline]
    pub fn pieces_of(&self, location: usize) -> &[CellPiece] { &self.pieces[self.range_of(location)] }

    /// Sum of weights per location: 1 for a cell fully inside the regions, less on coasts and borders.
    pub fn coverage(&self) -> Vec<f64> {
        (0..self.cell_areas.len())
            .map(|location| self.pieces_of(location).iter().map(|p| p.weight).sum())
            .collect()
    }

    /// Number of cell locations that overlap no region at all.
    pub fn unmatched(&self) -> usize {
        self.by_location.iter().filter(|range| range.is_empty()).count()
    }

    /// Check every weight lies in `[0 - tolerance, 1 + tolerance]`, reporting all offenders.
    pub fn validate(&self, tolerance: f64, locations: &[(f64, f64)], region_ids: &[RegionId]) -> Result<()> {
        ensure!(
            locations.len() == self.cell_areas.len(),
            "[weights] {} cell locations given for {} weighted cells", locations.len(), self.cell_areas.len()
        );
        ensure!(
            self.pieces.iter().all(|piece| piece.region < region_ids.len()),
            "[weights] cell piece refers to a region beyond the {} ids given", region_ids.len()
        );
        let violations = self.pieces.iter()
            .filter(|piece| !(piece.weight >= -tolerance && piece.weight <= 1.0 + tolerance))
            .map(|piece| WeightViolation {
                lon: locations[piece.location].0,
                lat: locations[piece.location].1,
                region: region_ids[piece.region].to_string(),
                weight: piece.weight,
            })
            .collect::<Vec<_>>();

        if violations.is_empty() { return Ok(()) }
        Err(AggregationError::InvalidWeights(violations).into())
    }
}
