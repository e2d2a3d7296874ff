use serde::Serialize;

use super::MapPoint;
use crate::node::Node;

/// One-standard-deviation confidence ellipse.
///
/// `radii` are `(major, minor)` in meters; `tilt_deg` is the major axis angle
/// counter-clockwise from east.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EllipseGeometry {
    pub center: MapPoint,
    pub radii: (f64, f64),
    pub tilt_deg: f64,
}

/// Ellipse around the node's refinement estimate.
pub fn ellipse_for(node: &Node) -> EllipseGeometry {
    let uncertainty = &node.uncertainty;
    let [east, north] = uncertainty.major_axis;
    EllipseGeometry {
        center: node.kf_position.wgs84.into(),
        radii: (
            uncertainty.major_variance.sqrt(),
            uncertainty.minor_variance.sqrt(),
        ),
        tilt_deg: north.atan2(east).to_degrees(),
    }
}
