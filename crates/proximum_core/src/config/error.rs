use std::fmt;

use thiserror::Error;

/// Why a single form field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    NotANumber,
    OutOfRange,
    InvertedRange,
    Missing,
}

impl FieldErrorKind {
    pub fn message(self) -> &'static str {
        match self {
            FieldErrorKind::NotANumber => "not a number",
            FieldErrorKind::OutOfRange => "out of range",
            FieldErrorKind::InvertedRange => "min exceeds max",
            FieldErrorKind::Missing => "missing",
        }
    }
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A rejected form field, keyed by its canonical form name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {kind}")]
pub struct FieldError {
    pub field: &'static str,
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn new(field: &'static str, kind: FieldErrorKind) -> Self {
        Self { field, kind }
    }
}

/// Every field error found in one normalization pass, in form order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub(crate) fn new(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The error reported for `field`, if any.
    pub fn for_field(&self, field: &str) -> Option<FieldErrorKind> {
        self.0
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.kind)
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invalid field(s)", self.0.len())?;
        for (index, error) in self.0.iter().enumerate() {
            let separator = if index == 0 { ": " } else { "; " };
            write!(f, "{separator}{error}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_field() {
        let errors = ValidationErrors::new(vec![
            FieldError::new("nNodes", FieldErrorKind::NotANumber),
            FieldError::new("tauRange", FieldErrorKind::InvertedRange),
        ]);
        assert_eq!(
            errors.to_string(),
            "2 invalid field(s): nNodes: not a number; tauRange: min exceeds max"
        );
        assert_eq!(errors.for_field("tauRange"), Some(FieldErrorKind::InvertedRange));
        assert_eq!(errors.for_field("nEpochs"), None);
    }
}
