use std::f64::consts::PI;

use serde::Serialize;

use super::{GeometryError, MapPoint};
use crate::node::Wgs84;

/// Segments per arc used by the map layer.
pub const DEFAULT_ARC_SEGMENTS: usize = 100;

const EARTH_RADIUS_KM: f64 = 6371.0;
const ANTIPODAL_TOLERANCE_RAD: f64 = 1e-9;

/// Discretized great-circle path, endpoints included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArcGeometry {
    pub points: Vec<MapPoint>,
    /// Central angle between the endpoints, radians.
    pub central_angle: f64,
}

impl ArcGeometry {
    pub fn segments(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Length on a spherical earth.
    pub fn length_km(&self) -> f64 {
        self.central_angle * EARTH_RADIUS_KM
    }
}

/// Interpolates `segments + 1` points along the great circle from `from` to `to`.
///
/// Paths crossing the antimeridian are not split and paths near a pole are
/// not special-cased; renderers draw them as given.
pub fn great_circle_arc(
    from: Wgs84,
    to: Wgs84,
    segments: usize,
) -> Result<ArcGeometry, GeometryError> {
    if segments == 0 {
        return Err(GeometryError::ZeroSegments);
    }
    let a = unit_vector(from)?;
    let b = unit_vector(to)?;

    let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    let cross = [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ];
    // atan2 keeps precision near 0 and π where acos does not.
    let omega = (cross[0].hypot(cross[1]).hypot(cross[2])).atan2(dot);
    if PI - omega < ANTIPODAL_TOLERANCE_RAD {
        return Err(GeometryError::AntipodalEndpoints);
    }

    let sin_omega = omega.sin();
    let points = (0..=segments)
        .map(|i| {
            let t = i as f64 / segments as f64;
            if sin_omega.abs() < f64::EPSILON {
                return to_map_point(a);
            }
            let wa = ((1.0 - t) * omega).sin() / sin_omega;
            let wb = (t * omega).sin() / sin_omega;
            to_map_point([
                wa * a[0] + wb * b[0],
                wa * a[1] + wb * b[1],
                wa * a[2] + wb * b[2],
            ])
        })
        .collect();

    Ok(ArcGeometry {
        points,
        central_angle: omega,
    })
}

fn unit_vector(position: Wgs84) -> Result<[f64; 3], GeometryError> {
    if !position.latitude.is_finite() || !position.longitude.is_finite() {
        return Err(GeometryError::InvalidCoordinate);
    }
    let (sin_lat, cos_lat) = position.latitude.sin_cos();
    let (sin_lng, cos_lng) = position.longitude.sin_cos();
    Ok([cos_lat * cos_lng, cos_lat * sin_lng, sin_lat])
}

fn to_map_point(v: [f64; 3]) -> MapPoint {
    let lat = v[2].atan2(v[0].hypot(v[1]));
    let lng = v[1].atan2(v[0]);
    MapPoint {
        lat: lat.to_degrees(),
        lng: lng.to_degrees(),
    }
}
