//! Overlay geometry: render primitives derived from per-node engine output.
//!
//! Everything here is pure and recomputed per render:
//!
//! - **Ellipse**: 1-standard-deviation confidence ellipse of the refinement estimate
//! - **Arc**: great-circle polyline between two geographic points
//! - **Cell boundary**: polygon of an H3 cell
//! - **NodeOverlay**: the per-node bundle a map layer draws
//!
//! Output coordinates are `(lat, lng)` in degrees; node positions arrive in radians.

mod arc;
mod cell;
mod ellipse;

use serde::Serialize;
use thiserror::Error;

use crate::node::{Ecef, Node, Wgs84};

pub use arc::{great_circle_arc, ArcGeometry, DEFAULT_ARC_SEGMENTS};
pub use cell::{cell_boundary, cell_boundary_hex, CellBoundary};
pub use ellipse::{ellipse_for, EllipseGeometry};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("invalid H3 cell index `{0}`")]
    InvalidCell(String),
    #[error("coordinate is not finite")]
    InvalidCoordinate,
    #[error("an arc needs at least one segment")]
    ZeroSegments,
    #[error("great-circle arc between antipodal points is undefined")]
    AntipodalEndpoints,
}

/// A map coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapPoint {
    pub lat: f64,
    pub lng: f64,
}

impl From<Wgs84> for MapPoint {
    fn from(position: Wgs84) -> Self {
        let (lat, lng) = position.lat_lng_degrees();
        Self { lat, lng }
    }
}

impl From<h3o::LatLng> for MapPoint {
    fn from(coord: h3o::LatLng) -> Self {
        Self {
            lat: coord.lat(),
            lng: coord.lng(),
        }
    }
}

/// Markers for the three positions of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeMarkers {
    pub true_position: MapPoint,
    pub asserted: MapPoint,
    pub estimated: MapPoint,
}

/// Everything drawn for one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeOverlay {
    pub id: usize,
    /// Polygon of the cell the node asserted.
    pub asserted_cell: CellBoundary,
    pub ellipse: EllipseGeometry,
    /// Straight polyline asserted → true → estimated.
    pub displacement: [MapPoint; 3],
    /// Great-circle arc from the true to the estimated position.
    pub estimate_arc: ArcGeometry,
    pub markers: NodeMarkers,
    pub asserted_error_km: f64,
    pub estimate_error_km: f64,
}

impl NodeOverlay {
    pub fn from_node(node: &Node) -> Result<Self, GeometryError> {
        Self::with_segments(node, DEFAULT_ARC_SEGMENTS)
    }

    pub fn with_segments(node: &Node, segments: usize) -> Result<Self, GeometryError> {
        let markers = NodeMarkers {
            true_position: node.true_position.wgs84.into(),
            asserted: node.asserted_position.wgs84.into(),
            estimated: node.kf_position.wgs84.into(),
        };
        Ok(Self {
            id: node.id,
            asserted_cell: cell_boundary(node.asserted_position.index),
            ellipse: ellipse_for(node),
            displacement: [markers.asserted, markers.true_position, markers.estimated],
            estimate_arc: great_circle_arc(
                node.true_position.wgs84,
                node.kf_position.wgs84,
                segments,
            )?,
            markers,
            asserted_error_km: position_error_km(
                node.true_position.ecef,
                node.asserted_position.ecef,
            ),
            estimate_error_km: position_error_km(node.true_position.ecef, node.kf_position.ecef),
        })
    }
}

/// Overlays for every node, in input order.
pub fn node_overlays(nodes: &[Node], segments: usize) -> Result<Vec<NodeOverlay>, GeometryError> {
    nodes
        .iter()
        .map(|node| NodeOverlay::with_segments(node, segments))
        .collect()
}

/// Arcs from the first node's true position to every other node's.
pub fn network_links(nodes: &[Node], segments: usize) -> Result<Vec<ArcGeometry>, GeometryError> {
    let Some((hub, rest)) = nodes.split_first() else {
        return Ok(Vec::new());
    };
    rest.iter()
        .map(|node| {
            great_circle_arc(hub.true_position.wgs84, node.true_position.wgs84, segments)
        })
        .collect()
}

/// Straight-line ECEF distance in kilometers.
pub fn position_error_km(a: Ecef, b: Ecef) -> f64 {
    let squared: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    squared.sqrt() / 1000.0
}
