mod support;

use proximum_core::config::{
    normalize, ConfigNormalizer, FieldErrorKind, FormFields, SimulationConfig,
};
use proptest::prelude::*;
use support::form_with;

const KM: f64 = 1000.0;
const MS: f64 = 0.001;
const C: f64 = 1.0;

type VarianceOf = fn(&SimulationConfig) -> f64;

/// Every stddev field, its display-to-SI factor and the variance it feeds.
fn stddev_fields() -> [(&'static str, f64, VarianceOf); 7] {
    [
        ("assertedPositionStddev", KM, |c: &SimulationConfig| c.asserted_position_variance),
        ("betaStddev", C, |c: &SimulationConfig| c.message_speed_variance),
        ("tauStddev", MS, |c: &SimulationConfig| c.latency_variance),
        ("modelPositionStddev", KM, |c: &SimulationConfig| c.kf_model_position_variance),
        ("modelBetaStddev", C, |c: &SimulationConfig| c.kf_model_message_speed_variance),
        ("modelTauStddev", MS, |c: &SimulationConfig| c.kf_model_latency_variance),
        ("modelTofObservationStddev", MS, |c: &SimulationConfig| {
            c.kf_model_tof_observation_variance
        }),
    ]
}

fn expected_variance(stddev: f64, factor: f64) -> f64 {
    let scaled = stddev * factor;
    scaled * scaled
}

#[test]
fn every_invalid_field_is_reported_at_once() {
    let mut form = FormFields::default()
        .with("nEpochs", "many")
        .with("betaStddev", "-0.5")
        .with("tauRange", "30,2")
        .with("messageDistanceMax", "50");
    form.remove("modelTau");

    let errors = normalize(&form).expect_err("several invalid fields");

    assert_eq!(errors.len(), 5);
    assert_eq!(errors.for_field("nEpochs"), Some(FieldErrorKind::NotANumber));
    assert_eq!(errors.for_field("betaStddev"), Some(FieldErrorKind::OutOfRange));
    assert_eq!(errors.for_field("tauRange"), Some(FieldErrorKind::InvertedRange));
    assert_eq!(
        errors.for_field("messageDistanceMax"),
        Some(FieldErrorKind::OutOfRange)
    );
    assert_eq!(errors.for_field("modelTau"), Some(FieldErrorKind::Missing));

    let message = errors.to_string();
    assert!(message.starts_with("5 invalid field(s)"));
    assert!(message.contains("tauRange: min exceeds max"));
}

#[test]
fn normalization_is_idempotent() {
    let form = form_with(40, 250);
    let first = normalize(&form).expect("valid form");
    let second = normalize(&form).expect("valid form");
    assert_eq!(first, second);
}

#[test]
fn legacy_names_normalize_like_canonical_ones() {
    let canonical = normalize(&FormFields::default()).expect("default form");

    let legacy: FormFields = FormFields::default()
        .iter()
        .map(|(name, value)| {
            let name = match name {
                "nNodes" => "n_nodes",
                "betaRange" => "messageSpeedRange",
                "betaStddev" => "channelSpeedStddev",
                "tauRange" => "latencyRange",
                "modelBeta" => "modelMessageSpeed",
                "modelTau" => "modelLatency",
                "leastSquaresIterations" => "ls_iterations",
                other => other,
            };
            (name.to_string(), value.to_string())
        })
        .collect();

    assert_eq!(normalize(&legacy).expect("legacy form"), canonical);
}

#[test]
fn canonical_name_wins_over_alias() {
    let form = FormFields::default().with("latencyRange", "50,60");
    let config = normalize(&form).expect("valid form");
    assert_eq!(config.latency_min, 0.002);
    assert_eq!(config.latency_max, 0.03);
}

#[test]
fn unknown_fields_are_ignored() {
    let form = FormFields::default().with("mapStyle", "satellite");
    assert_eq!(
        normalize(&form).expect("valid form"),
        normalize(&FormFields::default()).expect("default form")
    );
}

#[test]
fn model_parameters_feed_both_estimators() {
    let form = FormFields::default()
        .with("modelBeta", "0.6")
        .with("modelTau", "20");
    let config = normalize(&form).expect("valid form");
    assert_eq!(config.ls_model_message_speed, 0.6);
    assert_eq!(config.kf_model_message_speed, 0.6);
    assert_eq!(config.ls_model_latency, config.kf_model_latency);
    assert_eq!(config.kf_model_latency, 20.0 * 0.001);
}

#[test]
fn node_floor_follows_measurement_count() {
    let normalizer = ConfigNormalizer::new(30);
    assert_eq!(normalizer.min_nodes(), 31);

    let errors = normalizer
        .normalize(&form_with(30, 10))
        .expect_err("too few nodes for 30 measurements");
    assert_eq!(errors.for_field("nNodes"), Some(FieldErrorKind::OutOfRange));
    assert!(normalizer.normalize(&form_with(31, 10)).is_ok());
}

#[test]
fn saved_json_form_accepts_numbers_and_pairs() {
    let form: FormFields = serde_json::from_str(
        r#"{
            "nNodes": 50,
            "nEpochs": "20",
            "h3Resolution": 7,
            "assertedPositionStddev": 1000,
            "betaRange": [0.2, 0.8],
            "betaStddev": 0.001,
            "tauRange": "[2, 30]",
            "tauStddev": 1,
            "messageDistanceMax": 13000,
            "modelPositionStddev": 10,
            "modelBeta": 0.5,
            "modelBetaStddev": 0.001,
            "modelTau": 15,
            "modelTauStddev": 0.01,
            "modelTofObservationStddev": 1,
            "leastSquaresIterations": 1
        }"#,
    )
    .expect("form json");

    let config = normalize(&form).expect("valid form");
    assert_eq!(config.n_nodes, 50);
    assert_eq!(config.n_epochs, 20);
    assert_eq!((config.message_speed_min, config.message_speed_max), (0.2, 0.8));
    assert_eq!(config.latency_max, 0.03);
}

#[test]
fn config_serializes_with_engine_names() {
    let config = normalize(&FormFields::default()).expect("default form");
    let json = serde_json::to_value(&config).expect("config json");

    assert_eq!(json["beta_min"], serde_json::json!(0.2));
    assert_eq!(json["tau_max"], serde_json::json!(0.03));
    assert_eq!(json["ls_tolerance"], serde_json::json!(1.0));
    assert!(json.get("kf_model_tof_observation_variance").is_some());

    let back: SimulationConfig = serde_json::from_value(json).expect("config round trip");
    assert_eq!(back, config);
}

#[test]
fn every_stddev_field_becomes_an_si_variance() {
    for (field, factor, variance) in stddev_fields() {
        for stddev in [0.0, 2.5] {
            let form = FormFields::default().with(field, stddev.to_string());
            let config = normalize(&form).expect("valid form");
            assert_eq!(
                variance(&config),
                expected_variance(stddev, factor),
                "{field} = {stddev}"
            );
        }
    }

    let config =
        normalize(&FormFields::default().with("modelPositionStddev", "3")).expect("valid form");
    assert_eq!(config.kf_model_position_variance, 9.0e6);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn variance_is_the_squared_si_stddev(stddev in 0.0f64..10_000.0) {
        for (field, factor, variance) in stddev_fields() {
            let form = FormFields::default().with(field, stddev.to_string());
            let config = normalize(&form).expect("non-negative stddev is valid");
            prop_assert_eq!(variance(&config), expected_variance(stddev, factor));
        }
    }
}
