//! Form normalization: display-unit form fields into one canonical SI configuration.
//!
//! This module provides:
//!
//! - **FormFields**: the raw parameter form (km, ms, fractions of c, standard deviations)
//! - **SimulationConfig**: the canonical configuration (m, s, variances) handed to the engine
//! - **ConfigNormalizer**: the single adapter between the two, including legacy field names
//!
//! Normalization never partially succeeds: every rejected field is reported together.

mod error;
mod fields;
mod form;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use error::{FieldError, FieldErrorKind, ValidationErrors};
pub use form::FormFields;

use fields::{FieldSpec, Unit};

/// Measurements per node update compiled into the reference engine.
pub const DEFAULT_N_MEASUREMENTS: usize = 10;

/// Least-squares convergence tolerance; not exposed on the form.
pub const LS_TOLERANCE: f64 = 1.0;

/// Canonical simulation configuration in SI units.
///
/// All noise terms are variances derived from form standard deviations.
/// Serializes with the engine's wire names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub n_nodes: usize,
    pub n_epochs: usize,
    pub h3_resolution: u8,
    /// m²
    pub asserted_position_variance: f64,
    /// Fraction of c.
    #[serde(rename = "beta_min")]
    pub message_speed_min: f64,
    #[serde(rename = "beta_max")]
    pub message_speed_max: f64,
    #[serde(rename = "beta_variance")]
    pub message_speed_variance: f64,
    /// s
    #[serde(rename = "tau_min")]
    pub latency_min: f64,
    #[serde(rename = "tau_max")]
    pub latency_max: f64,
    /// s²
    #[serde(rename = "tau_variance")]
    pub latency_variance: f64,
    /// m
    pub message_distance_max: f64,
    #[serde(rename = "ls_model_beta")]
    pub ls_model_message_speed: f64,
    #[serde(rename = "ls_model_tau")]
    pub ls_model_latency: f64,
    pub ls_tolerance: f64,
    pub ls_iterations: usize,
    /// m²
    pub kf_model_position_variance: f64,
    #[serde(rename = "kf_model_beta")]
    pub kf_model_message_speed: f64,
    #[serde(rename = "kf_model_beta_variance")]
    pub kf_model_message_speed_variance: f64,
    #[serde(rename = "kf_model_tau")]
    pub kf_model_latency: f64,
    #[serde(rename = "kf_model_tau_variance")]
    pub kf_model_latency_variance: f64,
    /// s²
    pub kf_model_tof_observation_variance: f64,
}

/// Converts forms into [`SimulationConfig`] for an engine built with a given
/// number of measurements per update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigNormalizer {
    n_measurements: usize,
}

impl Default for ConfigNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_N_MEASUREMENTS)
    }
}

impl ConfigNormalizer {
    pub fn new(n_measurements: usize) -> Self {
        Self { n_measurements }
    }

    pub fn n_measurements(&self) -> usize {
        self.n_measurements
    }

    /// Smallest node count the engine accepts: each node needs
    /// `n_measurements` distinct peers.
    pub fn min_nodes(&self) -> usize {
        self.n_measurements + 1
    }

    pub fn normalize(&self, form: &FormFields) -> Result<SimulationConfig, ValidationErrors> {
        for (key, _) in form.iter() {
            if !fields::is_known_key(key) {
                debug!(field = key, "ignoring unknown form field");
            }
        }

        let mut reader = FieldReader::new(form);
        let n_nodes = reader.count(fields::N_NODES.with_min(self.min_nodes() as f64));
        let n_epochs = reader.count(fields::N_EPOCHS);
        let h3_resolution = reader.count(fields::H3_RESOLUTION);
        let asserted_position_variance = reader.variance(fields::ASSERTED_POSITION_STDDEV);
        let message_speed = reader.range(fields::BETA_RANGE);
        let message_speed_variance = reader.variance(fields::BETA_STDDEV);
        let latency = reader.range(fields::TAU_RANGE);
        let latency_variance = reader.variance(fields::TAU_STDDEV);
        let message_distance_max = reader.scalar(fields::MESSAGE_DISTANCE_MAX);
        let kf_model_position_variance = reader.variance(fields::MODEL_POSITION_STDDEV);
        let model_message_speed = reader.scalar(fields::MODEL_BETA);
        let kf_model_message_speed_variance = reader.variance(fields::MODEL_BETA_STDDEV);
        let model_latency = reader.scalar(fields::MODEL_TAU);
        let kf_model_latency_variance = reader.variance(fields::MODEL_TAU_STDDEV);
        let kf_model_tof_observation_variance =
            reader.variance(fields::MODEL_TOF_OBSERVATION_STDDEV);
        let ls_iterations = reader.count(fields::LEAST_SQUARES_ITERATIONS);

        let (
            Some(n_nodes),
            Some(n_epochs),
            Some(h3_resolution),
            Some(asserted_position_variance),
            Some((message_speed_min, message_speed_max)),
            Some(message_speed_variance),
            Some((latency_min, latency_max)),
            Some(latency_variance),
            Some(message_distance_max),
            Some(kf_model_position_variance),
            Some(model_message_speed),
            Some(kf_model_message_speed_variance),
            Some(model_latency),
            Some(kf_model_latency_variance),
            Some(kf_model_tof_observation_variance),
            Some(ls_iterations),
        ) = (
            n_nodes,
            n_epochs,
            h3_resolution,
            asserted_position_variance,
            message_speed,
            message_speed_variance,
            latency,
            latency_variance,
            message_distance_max,
            kf_model_position_variance,
            model_message_speed,
            kf_model_message_speed_variance,
            model_latency,
            kf_model_latency_variance,
            kf_model_tof_observation_variance,
            ls_iterations,
        )
        else {
            return Err(reader.into_errors());
        };

        Ok(SimulationConfig {
            n_nodes,
            n_epochs,
            // Bounded to 0..=15 by the field schema.
            h3_resolution: h3_resolution as u8,
            asserted_position_variance,
            message_speed_min,
            message_speed_max,
            message_speed_variance,
            latency_min,
            latency_max,
            latency_variance,
            message_distance_max,
            ls_model_message_speed: model_message_speed,
            ls_model_latency: model_latency,
            ls_tolerance: LS_TOLERANCE,
            ls_iterations,
            kf_model_position_variance,
            kf_model_message_speed: model_message_speed,
            kf_model_message_speed_variance,
            kf_model_latency: model_latency,
            kf_model_latency_variance,
            kf_model_tof_observation_variance,
        })
    }
}

/// Normalizes `form` for an engine with [`DEFAULT_N_MEASUREMENTS`].
pub fn normalize(form: &FormFields) -> Result<SimulationConfig, ValidationErrors> {
    ConfigNormalizer::default().normalize(form)
}

/// Reads typed values out of a form, collecting one error per failed field.
struct FieldReader<'a> {
    form: &'a FormFields,
    errors: Vec<FieldError>,
}

impl<'a> FieldReader<'a> {
    fn new(form: &'a FormFields) -> Self {
        Self {
            form,
            errors: Vec::new(),
        }
    }

    fn into_errors(self) -> ValidationErrors {
        ValidationErrors::new(self.errors)
    }

    fn fail(&mut self, spec: FieldSpec, kind: FieldErrorKind) {
        self.errors.push(FieldError::new(spec.name, kind));
    }

    fn raw(&mut self, spec: FieldSpec) -> Option<&'a str> {
        let form = self.form;
        let value = spec.keys().find_map(|key| form.get(key));
        if value.is_none() {
            self.fail(spec, FieldErrorKind::Missing);
        }
        value
    }

    fn parse_number(text: &str) -> Result<f64, FieldErrorKind> {
        text.trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or(FieldErrorKind::NotANumber)
    }

    fn checked(spec: FieldSpec, text: &str) -> Result<f64, FieldErrorKind> {
        let value = Self::parse_number(text)?;
        if spec.contains(value) {
            Ok(value)
        } else {
            Err(FieldErrorKind::OutOfRange)
        }
    }

    fn record<T>(&mut self, spec: FieldSpec, result: Result<T, FieldErrorKind>) -> Option<T> {
        result.map_err(|kind| self.fail(spec, kind)).ok()
    }

    /// Whole number, in display units.
    fn count(&mut self, spec: FieldSpec) -> Option<usize> {
        let text = self.raw(spec)?;
        let result = Self::parse_number(text).and_then(|value| {
            if value.fract() != 0.0 {
                return Err(FieldErrorKind::NotANumber);
            }
            // `usize::MAX as f64` rounds up to 2^64, itself out of range.
            if !spec.contains(value) || value < 0.0 || value >= usize::MAX as f64 {
                return Err(FieldErrorKind::OutOfRange);
            }
            Ok(value as usize)
        });
        self.record(spec, result)
    }

    /// Plain number converted to SI.
    fn scalar(&mut self, spec: FieldSpec) -> Option<f64> {
        let text = self.raw(spec)?;
        let result = Self::checked(spec, text).map(|value| spec.unit.to_si(value));
        self.record(spec, result)
    }

    /// `[min, max]` pair converted to SI.
    fn range(&mut self, spec: FieldSpec) -> Option<(f64, f64)> {
        let text = self.raw(spec)?;
        let result = form::split_range(text)
            .ok_or(FieldErrorKind::NotANumber)
            .and_then(|(min, max)| {
                let min = Self::parse_number(min);
                let max = Self::parse_number(max);
                let (min, max) = (min?, max?);
                if !spec.contains(min) || !spec.contains(max) {
                    return Err(FieldErrorKind::OutOfRange);
                }
                if min > max {
                    return Err(FieldErrorKind::InvertedRange);
                }
                Ok((spec.unit.to_si(min), spec.unit.to_si(max)))
            });
        self.record(spec, result)
    }

    /// Standard deviation squared into an SI variance.
    fn variance(&mut self, spec: FieldSpec) -> Option<f64> {
        debug_assert!(spec.min.is_some_and(|min| min >= 0.0));
        let text = self.raw(spec)?;
        let result = Self::checked(spec, text).map(|stddev| spec.unit.stddev_to_variance(stddev));
        self.record(spec, result)
    }
}

/// Display unit label of a form field (canonical or legacy name), `""` for counts.
pub fn field_unit_label(field: &str) -> Option<&'static str> {
    fields::ALL_FIELDS
        .iter()
        .find(|spec| spec.keys().any(|key| key == field))
        .map(|spec| match spec.unit {
            Unit::Count => "",
            Unit::Kilometers => "km",
            Unit::Milliseconds => "ms",
            Unit::LightFraction => "c",
        })
}
