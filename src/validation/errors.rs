//! Validation error types
//!
//! A `ValidationError` carries every failure found by one validation pass,
//! in walk order. In stop-on-first-error mode it holds exactly one.

use std::fmt;

/// One field-level failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Field path, qualified by the enclosing documents (e.g. "address.city", "items.2.sku")
    pub path: String,
    /// Validator kind that failed ("required", "type", "minLength", ...)
    pub kind: String,
    /// Human-readable message
    pub message: String,
}

impl ValidationFailure {
    pub fn new(path: impl Into<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Field is absent but required
    pub fn required(path: &str) -> Self {
        Self::new(path, "required", format!("\"{}\" is required", path))
    }

    /// Nesting exceeded the configured validation depth
    pub fn max_depth(path: &str, limit: usize) -> Self {
        Self::new(
            path,
            "maxDepth",
            format!("\"{}\" is nested deeper than {} levels", path, limit),
        )
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}' [{}]: {}", self.path, self.kind, self.message)
    }
}

/// One or more validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ValidationError {
    failures: Vec<ValidationFailure>,
}

impl ValidationError {
    pub(crate) fn new(failures: Vec<ValidationFailure>) -> Self {
        Self { failures }
    }

    /// All failures, in the order they were found
    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    /// The first failure found
    pub fn first(&self) -> Option<&ValidationFailure> {
        self.failures.first()
    }

    /// Failures whose path equals `path`
    pub fn for_path<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ValidationFailure> + 'a {
        self.failures.iter().filter(move |f| f.path == path)
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn code(&self) -> &'static str {
        "AERO_VALIDATION_FAILED"
    }

    pub fn into_failures(self) -> Vec<ValidationFailure> {
        self.failures
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} error(s)", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}
