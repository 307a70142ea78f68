mod bbox;
mod crs;
mod geom;
mod grid;
mod overlay;
mod proj;

pub use crs::Crs;
pub use geom::Geometries;
pub use grid::{cell_polygon, cell_polygons, check_resolution};
pub use overlay::Overlap;
