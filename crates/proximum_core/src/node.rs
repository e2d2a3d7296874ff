//! Per-node engine output.
//!
//! Mirrors the engine's JSON: H3 indices as hex strings, ECEF positions as
//! `[x, y, z]` meters, WGS84 positions in radians. Legacy `beta` / `tau`
//! names are accepted for the per-node message speed and latency.

use h3o::CellIndex;
use serde::{Deserialize, Serialize};

/// Geographic position: latitude and longitude in radians, altitude in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wgs84 {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

impl Wgs84 {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude.to_radians(), longitude.to_radians(), 0.0)
    }

    /// `(latitude, longitude)` in degrees.
    pub fn lat_lng_degrees(&self) -> (f64, f64) {
        (self.latitude.to_degrees(), self.longitude.to_degrees())
    }

    /// Earth-centered, earth-fixed coordinates on the WGS84 ellipsoid.
    pub fn to_ecef(&self) -> Ecef {
        let (sin_lat, cos_lat) = self.latitude.sin_cos();
        let (sin_lng, cos_lng) = self.longitude.sin_cos();
        let e2 = WGS84_FLATTENING * (2.0 - WGS84_FLATTENING);
        let n = WGS84_SEMI_MAJOR_AXIS_M / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        [
            (n + self.altitude) * cos_lat * cos_lng,
            (n + self.altitude) * cos_lat * sin_lng,
            (n * (1.0 - e2) + self.altitude) * sin_lat,
        ]
    }
}

const WGS84_SEMI_MAJOR_AXIS_M: f64 = 6_378_137.0;
const WGS84_FLATTENING: f64 = 1.0 / 298.257_223_563;

/// Earth-centered, earth-fixed position in meters.
pub type Ecef = [f64; 3];

/// One estimate (or ground truth) of a node's location in every representation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(with = "hex_cell")]
    pub index: CellIndex,
    pub ecef: Ecef,
    pub wgs84: Wgs84,
}

/// Horizontal (east-north) uncertainty of the refinement estimate.
///
/// Variances are in m²; the axis vectors hold east/north components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uncertainty {
    pub major_axis: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor_axis: Option<[f64; 2]>,
    pub major_variance: f64,
    pub minor_variance: f64,
}

impl Uncertainty {
    /// The minor axis, derived orthogonal to the major one when the engine omits it.
    pub fn resolved_minor_axis(&self) -> [f64; 2] {
        self.minor_axis
            .unwrap_or([-self.major_axis[1], self.major_axis[0]])
    }
}

/// Engine state of one network node after the latest completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NodeRecord", into = "NodeRecord")]
pub struct Node {
    pub id: usize,
    pub true_position: Position,
    pub true_message_speed: f64,
    pub true_latency: f64,
    pub asserted_position: Position,
    pub ls_position: Position,
    pub kf_position: Position,
    pub kf_estimated_message_speed: f64,
    pub kf_estimated_latency: f64,
    pub uncertainty: Uncertainty,
}

/// Serializes an H3 index as its lowercase hex string.
pub mod hex_cell {
    use std::str::FromStr;

    use h3o::CellIndex;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(cell: &CellIndex, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{cell:x}"))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<CellIndex, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        CellIndex::from_str(text.trim()).map_err(D::Error::custom)
    }
}

/// Flat engine wire form of [`Node`].
#[derive(Serialize, Deserialize)]
struct NodeRecord {
    id: usize,
    #[serde(with = "hex_cell")]
    true_index: CellIndex,
    true_position: Ecef,
    true_wgs84: Wgs84,
    #[serde(alias = "true_beta")]
    true_message_speed: f64,
    #[serde(alias = "true_tau")]
    true_latency: f64,
    #[serde(with = "hex_cell")]
    asserted_index: CellIndex,
    asserted_position: Ecef,
    asserted_wgs84: Wgs84,
    #[serde(with = "hex_cell")]
    ls_estimated_index: CellIndex,
    ls_estimated_position: Ecef,
    ls_estimated_wgs84: Wgs84,
    #[serde(with = "hex_cell")]
    kf_estimated_index: CellIndex,
    kf_estimated_position: Ecef,
    kf_estimated_wgs84: Wgs84,
    #[serde(alias = "kf_estimated_beta")]
    kf_estimated_message_speed: f64,
    #[serde(alias = "kf_estimated_tau")]
    kf_estimated_latency: f64,
    kf_en_variance_semimajor_axis: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kf_en_variance_semiminor_axis: Option<[f64; 2]>,
    kf_en_variance_semimajor_axis_length: f64,
    kf_en_variance_semiminor_axis_length: f64,
}

impl From<NodeRecord> for Node {
    fn from(record: NodeRecord) -> Self {
        Node {
            id: record.id,
            true_position: Position {
                index: record.true_index,
                ecef: record.true_position,
                wgs84: record.true_wgs84,
            },
            true_message_speed: record.true_message_speed,
            true_latency: record.true_latency,
            asserted_position: Position {
                index: record.asserted_index,
                ecef: record.asserted_position,
                wgs84: record.asserted_wgs84,
            },
            ls_position: Position {
                index: record.ls_estimated_index,
                ecef: record.ls_estimated_position,
                wgs84: record.ls_estimated_wgs84,
            },
            kf_position: Position {
                index: record.kf_estimated_index,
                ecef: record.kf_estimated_position,
                wgs84: record.kf_estimated_wgs84,
            },
            kf_estimated_message_speed: record.kf_estimated_message_speed,
            kf_estimated_latency: record.kf_estimated_latency,
            uncertainty: Uncertainty {
                major_axis: record.kf_en_variance_semimajor_axis,
                minor_axis: record.kf_en_variance_semiminor_axis,
                major_variance: record.kf_en_variance_semimajor_axis_length,
                minor_variance: record.kf_en_variance_semiminor_axis_length,
            },
        }
    }
}

impl From<Node> for NodeRecord {
    fn from(node: Node) -> Self {
        NodeRecord {
            id: node.id,
            true_index: node.true_position.index,
            true_position: node.true_position.ecef,
            true_wgs84: node.true_position.wgs84,
            true_message_speed: node.true_message_speed,
            true_latency: node.true_latency,
            asserted_index: node.asserted_position.index,
            asserted_position: node.asserted_position.ecef,
            asserted_wgs84: node.asserted_position.wgs84,
            ls_estimated_index: node.ls_position.index,
            ls_estimated_position: node.ls_position.ecef,
            ls_estimated_wgs84: node.ls_position.wgs84,
            kf_estimated_index: node.kf_position.index,
            kf_estimated_position: node.kf_position.ecef,
            kf_estimated_wgs84: node.kf_position.wgs84,
            kf_estimated_message_speed: node.kf_estimated_message_speed,
            kf_estimated_latency: node.kf_estimated_latency,
            kf_en_variance_semimajor_axis: node.uncertainty.major_axis,
            kf_en_variance_semiminor_axis: node.uncertainty.minor_axis,
            kf_en_variance_semimajor_axis_length: node.uncertainty.major_variance,
            kf_en_variance_semiminor_axis_length: node.uncertainty.minor_variance,
        }
    }
}
