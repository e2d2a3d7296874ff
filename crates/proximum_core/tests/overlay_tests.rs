use proximum_core::engine::ChunkResult;
use proximum_core::node::Wgs84;
use proximum_core::overlay::{
    cell_boundary_hex, ellipse_for, great_circle_arc, network_links, node_overlays,
    position_error_km, GeometryError, NodeOverlay, DEFAULT_ARC_SEGMENTS,
};
use proximum_core::test_helpers::{sample_node, synthetic_chunk, synthetic_nodes};

#[test]
fn ellipse_radii_are_standard_deviations() {
    let mut node = sample_node(0);
    node.uncertainty.major_axis = [1.0, 1.0];
    node.uncertainty.major_variance = 900.0;
    node.uncertainty.minor_variance = 400.0;

    let ellipse = ellipse_for(&node);
    assert_eq!(ellipse.radii, (30.0, 20.0));
    assert!((ellipse.tilt_deg - 45.0).abs() < 1e-12);
}

#[test]
fn overlays_follow_node_order() {
    let nodes = synthetic_nodes(6, 11);
    let overlays = node_overlays(&nodes, 16).expect("overlays");

    assert_eq!(overlays.len(), 6);
    for (node, overlay) in nodes.iter().zip(&overlays) {
        assert_eq!(overlay.id, node.id);
        assert_eq!(overlay.estimate_arc.segments(), 16);
        assert_eq!(overlay.asserted_cell.cell, node.asserted_position.index);
    }
}

#[test]
fn error_distances_match_ecef_separation() {
    let node = sample_node(4);
    let overlay = NodeOverlay::from_node(&node).expect("overlay");
    assert_eq!(
        overlay.estimate_error_km,
        position_error_km(node.true_position.ecef, node.kf_position.ecef)
    );
    // 0.002 degrees of latitude is about 222 m.
    assert!((overlay.asserted_error_km - 0.222).abs() < 0.005);
}

#[test]
fn arc_length_agrees_with_ecef_distance_for_short_hops() {
    let node = sample_node(0);
    let arc = great_circle_arc(
        node.true_position.wgs84,
        node.asserted_position.wgs84,
        DEFAULT_ARC_SEGMENTS,
    )
    .expect("arc");
    let chord_km = position_error_km(node.true_position.ecef, node.asserted_position.ecef);
    assert!((arc.length_km() - chord_km).abs() < 0.002);
}

#[test]
fn antipodal_arc_is_an_error_not_a_guess() {
    let result = great_circle_arc(
        Wgs84::from_degrees(45.0, 10.0),
        Wgs84::from_degrees(-45.0, -170.0),
        DEFAULT_ARC_SEGMENTS,
    );
    assert_eq!(result, Err(GeometryError::AntipodalEndpoints));
}

#[test]
fn overlays_build_from_recorded_chunk_json() {
    let text = serde_json::to_string(&synthetic_chunk(3, 5, 21)).expect("chunk json");
    let chunk = ChunkResult::from_json(&text).expect("chunk parses");

    let overlays = node_overlays(&chunk.nodes, DEFAULT_ARC_SEGMENTS).expect("overlays");
    let links = network_links(&chunk.nodes, DEFAULT_ARC_SEGMENTS).expect("links");

    assert_eq!(overlays.len(), 3);
    assert_eq!(links.len(), 2);
    assert_eq!(chunk.stats.epochs(), 5);
}

#[test]
fn boundary_lookup_by_hex_reports_bad_input() {
    let node = sample_node(0);
    let hex = format!("{:x}", node.asserted_position.index);
    let boundary = cell_boundary_hex(&hex).expect("valid cell");
    assert_eq!(boundary.resolution, 9);
    assert!(matches!(
        cell_boundary_hex("ffffffffffffffff"),
        Err(GeometryError::InvalidCell(_))
    ));
}
