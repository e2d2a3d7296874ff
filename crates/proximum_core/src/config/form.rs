use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Raw parameter form: field name to display-unit string.
///
/// Range fields hold both ends in one value, `"min,max"`; brackets and
/// whitespace around the pair are tolerated. `Default` yields the stock form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormFields(BTreeMap<String, String>);

impl FormFields {
    /// A form with no fields set.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Builder form of [`FormFields::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set_range(&mut self, name: impl Into<String>, min: f64, max: f64) -> &mut Self {
        self.set(name, format!("{min},{max}"))
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for FormFields {
    fn default() -> Self {
        [
            ("nNodes", "100"),
            ("nEpochs", "100"),
            ("h3Resolution", "7"),
            ("assertedPositionStddev", "1000"),
            ("betaRange", "0.2,0.8"),
            ("betaStddev", "0.001"),
            ("tauRange", "2,30"),
            ("tauStddev", "1"),
            ("messageDistanceMax", "13000"),
            ("modelPositionStddev", "10"),
            ("modelBeta", "0.5"),
            ("modelBetaStddev", "0.001"),
            ("modelTau", "15"),
            ("modelTauStddev", "0.01"),
            ("modelTofObservationStddev", "1"),
            ("leastSquaresIterations", "1"),
        ]
        .into_iter()
        .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// Form values as they appear in saved JSON forms: strings, bare numbers,
/// or two-element arrays for ranges.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Scalar(RawScalar),
    Pair(Vec<RawScalar>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Text(String),
    Number(f64),
}

impl RawScalar {
    fn into_text(self) -> String {
        match self {
            RawScalar::Text(text) => text,
            RawScalar::Number(number) => number.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for FormFields {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, RawValue>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(name, value)| {
                let text = match value {
                    RawValue::Scalar(scalar) => scalar.into_text(),
                    RawValue::Pair(items) => items
                        .into_iter()
                        .map(RawScalar::into_text)
                        .collect::<Vec<_>>()
                        .join(","),
                };
                (name, text)
            })
            .collect())
    }
}

/// Splits a `"min,max"` range value into its two ends.
pub(crate) fn split_range(value: &str) -> Option<(&str, &str)> {
    let inner = value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    let (min, max) = inner.split_once(',')?;
    if max.contains(',') {
        return None;
    }
    Some((min.trim(), max.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_range_accepts_brackets_and_spaces() {
        assert_eq!(split_range("0.2,0.8"), Some(("0.2", "0.8")));
        assert_eq!(split_range(" [2, 30] "), Some(("2", "30")));
        assert_eq!(split_range("2"), None);
        assert_eq!(split_range("1,2,3"), None);
    }

    #[test]
    fn deserializes_numbers_and_pairs() {
        let form: FormFields = serde_json::from_str(
            r#"{"nNodes": 50, "betaRange": [0.1, "0.9"], "tauStddev": "2"}"#,
        )
        .expect("valid form json");
        assert_eq!(form.get("nNodes"), Some("50"));
        assert_eq!(form.get("betaRange"), Some("0.1,0.9"));
        assert_eq!(form.get("tauStddev"), Some("2"));
    }

    #[test]
    fn default_form_has_every_field() {
        let form = FormFields::default();
        assert_eq!(form.len(), 16);
        assert_eq!(form.get("messageDistanceMax"), Some("13000"));
    }
}
