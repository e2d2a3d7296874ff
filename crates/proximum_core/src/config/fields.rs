//! Form field schema: canonical names, legacy aliases, display units and bounds.
//!
//! Bounds are expressed in display units and checked before conversion.

/// Display unit of a form field and its fixed factor to SI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unit {
    /// Plain count or index, no conversion.
    Count,
    /// Kilometers, converted to meters.
    Kilometers,
    /// Milliseconds, converted to seconds.
    Milliseconds,
    /// Fraction of the speed of light, dimensionless.
    LightFraction,
}

impl Unit {
    pub(crate) fn to_si(self, value: f64) -> f64 {
        match self {
            Unit::Count | Unit::LightFraction => value,
            Unit::Kilometers => value * 1000.0,
            Unit::Milliseconds => value * 0.001,
        }
    }

    /// Converts a display-unit standard deviation into an SI variance.
    pub(crate) fn stddev_to_variance(self, stddev: f64) -> f64 {
        let scaled = self.to_si(stddev);
        scaled * scaled
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub unit: Unit,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FieldSpec {
    const fn new(name: &'static str, aliases: &'static [&'static str], unit: Unit) -> Self {
        Self {
            name,
            aliases,
            unit,
            min: None,
            max: None,
        }
    }

    const fn bounded(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    const fn at_least(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub(crate) fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub(crate) fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    /// Canonical name first, then legacy aliases in lookup order.
    pub(crate) fn keys(&self) -> impl Iterator<Item = &'static str> {
        let aliases: &'static [&'static str] = self.aliases;
        std::iter::once(self.name).chain(aliases.iter().copied())
    }
}

pub(crate) const N_NODES: FieldSpec =
    FieldSpec::new("nNodes", &["n_nodes", "numNodes"], Unit::Count);
pub(crate) const N_EPOCHS: FieldSpec =
    FieldSpec::new("nEpochs", &["n_epochs"], Unit::Count).bounded(1.0, 10_000.0);
pub(crate) const H3_RESOLUTION: FieldSpec =
    FieldSpec::new("h3Resolution", &["h3_resolution"], Unit::Count).bounded(0.0, 15.0);
pub(crate) const ASSERTED_POSITION_STDDEV: FieldSpec = FieldSpec::new(
    "assertedPositionStddev",
    &["asserted_position_stddev"],
    Unit::Kilometers,
)
.bounded(0.0, 10_000.0);
pub(crate) const BETA_RANGE: FieldSpec = FieldSpec::new(
    "betaRange",
    &["messageSpeedRange", "channelSpeedRange", "beta_range"],
    Unit::LightFraction,
)
.bounded(0.0, 1.0);
pub(crate) const BETA_STDDEV: FieldSpec = FieldSpec::new(
    "betaStddev",
    &["messageSpeedStddev", "channelSpeedStddev", "beta_stddev"],
    Unit::LightFraction,
)
.at_least(0.0);
pub(crate) const TAU_RANGE: FieldSpec =
    FieldSpec::new("tauRange", &["latencyRange", "tau_range"], Unit::Milliseconds)
        .bounded(0.0, 100.0);
pub(crate) const TAU_STDDEV: FieldSpec =
    FieldSpec::new("tauStddev", &["latencyStddev", "tau_stddev"], Unit::Milliseconds)
        .at_least(0.0);
pub(crate) const MESSAGE_DISTANCE_MAX: FieldSpec = FieldSpec::new(
    "messageDistanceMax",
    &["message_distance_max"],
    Unit::Kilometers,
)
.bounded(100.0, 13_000.0);
pub(crate) const MODEL_POSITION_STDDEV: FieldSpec = FieldSpec::new(
    "modelPositionStddev",
    &["model_position_stddev"],
    Unit::Kilometers,
)
.at_least(0.0);
pub(crate) const MODEL_BETA: FieldSpec = FieldSpec::new(
    "modelBeta",
    &["modelMessageSpeed", "modelChannelSpeed", "model_beta"],
    Unit::LightFraction,
)
.bounded(0.0, 1.0);
pub(crate) const MODEL_BETA_STDDEV: FieldSpec = FieldSpec::new(
    "modelBetaStddev",
    &["modelMessageSpeedStddev", "modelChannelSpeedStddev"],
    Unit::LightFraction,
)
.at_least(0.0);
pub(crate) const MODEL_TAU: FieldSpec =
    FieldSpec::new("modelTau", &["modelLatency", "model_tau"], Unit::Milliseconds)
        .bounded(0.0, 100_000.0);
pub(crate) const MODEL_TAU_STDDEV: FieldSpec =
    FieldSpec::new("modelTauStddev", &["modelLatencyStddev"], Unit::Milliseconds).at_least(0.0);
pub(crate) const MODEL_TOF_OBSERVATION_STDDEV: FieldSpec = FieldSpec::new(
    "modelTofObservationStddev",
    &["model_tof_observation_stddev"],
    Unit::Milliseconds,
)
.at_least(0.0);
pub(crate) const LEAST_SQUARES_ITERATIONS: FieldSpec =
    FieldSpec::new("leastSquaresIterations", &["ls_iterations"], Unit::Count).at_least(1.0);

/// Every field the normalizer reads, in form order.
pub(crate) const ALL_FIELDS: [FieldSpec; 16] = [
    N_NODES,
    N_EPOCHS,
    H3_RESOLUTION,
    ASSERTED_POSITION_STDDEV,
    BETA_RANGE,
    BETA_STDDEV,
    TAU_RANGE,
    TAU_STDDEV,
    MESSAGE_DISTANCE_MAX,
    MODEL_POSITION_STDDEV,
    MODEL_BETA,
    MODEL_BETA_STDDEV,
    MODEL_TAU,
    MODEL_TAU_STDDEV,
    MODEL_TOF_OBSERVATION_STDDEV,
    LEAST_SQUARES_ITERATIONS,
];

/// Whether `key` names a known field, canonically or through an alias.
pub(crate) fn is_known_key(key: &str) -> bool {
    ALL_FIELDS.iter().any(|spec| spec.keys().any(|name| name == key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_conversions_use_fixed_factors() {
        assert_eq!(Unit::Kilometers.to_si(13.0), 13_000.0);
        assert_eq!(Unit::Milliseconds.to_si(15.0), 15.0 * 0.001);
        assert_eq!(Unit::LightFraction.to_si(0.5), 0.5);
        assert_eq!(Unit::Kilometers.stddev_to_variance(10.0), 100_000_000.0);
    }

    #[test]
    fn aliases_are_unique_across_fields() {
        let mut seen = std::collections::HashSet::new();
        for spec in ALL_FIELDS {
            for key in spec.keys() {
                assert!(seen.insert(key), "duplicate form key {key}");
            }
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(N_EPOCHS.contains(1.0));
        assert!(N_EPOCHS.contains(10_000.0));
        assert!(!N_EPOCHS.contains(0.0));
        assert!(BETA_STDDEV.contains(0.0));
        assert!(!BETA_STDDEV.contains(-0.1));
    }
}
