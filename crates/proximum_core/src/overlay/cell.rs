use std::str::FromStr;

use h3o::{CellIndex, LatLng};
use serde::Serialize;

use super::{GeometryError, MapPoint};

/// Polygon outline of one H3 cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellBoundary {
    #[serde(with = "crate::node::hex_cell")]
    pub cell: CellIndex,
    pub resolution: u8,
    pub center: MapPoint,
    /// Vertices in boundary order, not closed (first != last).
    pub vertices: Vec<MapPoint>,
}

pub fn cell_boundary(cell: CellIndex) -> CellBoundary {
    CellBoundary {
        cell,
        resolution: u8::from(cell.resolution()),
        center: LatLng::from(cell).into(),
        vertices: cell.boundary().iter().copied().map(MapPoint::from).collect(),
    }
}

/// Boundary of a cell given as a hex string (`"8a1fb46622dffff"`).
pub fn cell_boundary_hex(hex: &str) -> Result<CellBoundary, GeometryError> {
    let cell = CellIndex::from_str(hex.trim())
        .map_err(|_| GeometryError::InvalidCell(hex.to_string()))?;
    Ok(cell_boundary(cell))
}
