//! Schema error types
//!
//! Error codes:
//! - AERO_CLASS_* (composition, fatal for the class being registered)
//! - AERO_CAST_FAILED (value could not be coerced to a field's type)

use thiserror::Error;

use super::module::Phase;

/// Result type for class composition
pub type CompositionResult<T> = Result<T, CompositionError>;

/// Class composition failures. No Schema is published when one occurs.
#[derive(Debug, Clone, Error)]
pub enum CompositionError {
    /// Class name already registered
    #[error("Class '{0}' is already registered")]
    DuplicateClass(String),

    /// Class name missing or malformed
    #[error("Invalid class name '{0}'")]
    InvalidClassName(String),

    /// Declared parent not registered
    #[error("Class '{class}' extends unknown class '{parent}'")]
    UnknownParent { class: String, parent: String },

    /// Class to extend not registered
    #[error("Cannot extend unknown class '{0}'")]
    UnknownClass(String),

    /// Parent chain exceeds the configured bound
    #[error("Class '{class}' inheritance depth {depth} exceeds limit {limit}")]
    InheritanceTooDeep {
        class: String,
        depth: usize,
        limit: usize,
    },

    /// Parent chain loops back on itself
    #[error("Inheritance cycle detected at class '{0}'")]
    InheritanceCycle(String),

    /// Declaration tries to redefine a framework field
    #[error("Class '{class}' may not declare reserved field '{field}'")]
    ReservedField { class: String, field: String },

    /// Same field declared twice in one declaration
    #[error("Class '{class}' declares field '{field}' more than once")]
    DuplicateField { class: String, field: String },

    /// Validator kind not present in the validator registry
    #[error("Class '{class}' field '{field}' uses unregistered validator '{kind}'")]
    UnknownValidator {
        class: String,
        field: String,
        kind: String,
    },

    /// Validator kind registered twice
    #[error("Validator '{0}' is already registered")]
    DuplicateValidator(String),

    /// Object/List field references a class that does not exist
    #[error("Class '{class}' field '{field}' references unknown class '{referenced}'")]
    UnresolvedClass {
        class: String,
        field: String,
        referenced: String,
    },

    /// Declaration is structurally invalid
    #[error("Invalid definition for class '{class}': {reason}")]
    InvalidDefinition { class: String, reason: String },

    /// Two modules registered under one name
    #[error("Module '{0}' is already registered")]
    DuplicateModule(String),

    /// Module registered after classes were composed
    #[error("Module '{0}' registered after class composition started")]
    ModulesSealed(String),

    /// A module hook failed
    #[error("Module '{module}' failed in {phase} for class '{class}': {reason}")]
    Phase {
        module: String,
        phase: Phase,
        class: String,
        reason: String,
    },

    /// Declaration file could not be read
    #[error("Failed to read class definition '{path}': {reason}")]
    Io { path: String, reason: String },

    /// Declaration file is not a valid class definition
    #[error("Malformed class definition '{path}': {reason}")]
    Json { path: String, reason: String },

    /// Class registry lock poisoned
    #[error("Class registry unavailable: {0}")]
    Internal(String),
}

impl CompositionError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CompositionError::DuplicateClass(_) => "AERO_CLASS_DUPLICATE",
            CompositionError::InvalidClassName(_) => "AERO_CLASS_INVALID_NAME",
            CompositionError::UnknownParent { .. } => "AERO_CLASS_UNKNOWN_PARENT",
            CompositionError::UnknownClass(_) => "AERO_CLASS_UNKNOWN",
            CompositionError::InheritanceTooDeep { .. } => "AERO_CLASS_TOO_DEEP",
            CompositionError::InheritanceCycle(_) => "AERO_CLASS_CYCLE",
            CompositionError::ReservedField { .. } => "AERO_CLASS_RESERVED_FIELD",
            CompositionError::DuplicateField { .. } => "AERO_CLASS_DUPLICATE_FIELD",
            CompositionError::UnknownValidator { .. } => "AERO_CLASS_UNKNOWN_VALIDATOR",
            CompositionError::DuplicateValidator(_) => "AERO_VALIDATOR_DUPLICATE",
            CompositionError::UnresolvedClass { .. } => "AERO_CLASS_UNRESOLVED_REFERENCE",
            CompositionError::InvalidDefinition { .. } => "AERO_CLASS_INVALID_DEFINITION",
            CompositionError::DuplicateModule(_) => "AERO_MODULE_DUPLICATE",
            CompositionError::ModulesSealed(_) => "AERO_MODULE_SEALED",
            CompositionError::Phase { .. } => "AERO_MODULE_PHASE_FAILED",
            CompositionError::Io { .. } => "AERO_CLASS_IO",
            CompositionError::Json { .. } => "AERO_CLASS_MALFORMED",
            CompositionError::Internal(_) => "AERO_CLASS_INTERNAL",
        }
    }

    /// Shorthand for a structural definition error
    pub fn invalid(class: impl Into<String>, reason: impl Into<String>) -> Self {
        CompositionError::InvalidDefinition {
            class: class.into(),
            reason: reason.into(),
        }
    }
}

/// A value could not be coerced to a field's type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot cast {actual} to {expected} for field '{path}'")]
pub struct CastError {
    /// Field path, list elements as `field.<index>`
    pub path: String,
    /// Target type name
    pub expected: String,
    /// Kind of the offending input
    pub actual: String,
    /// Position of the failing element when casting a list
    pub index: Option<usize>,
}

impl CastError {
    pub fn new(path: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
            index: None,
        }
    }

    /// Marks the error as raised by element `index` of the outermost list
    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Qualifies the path with an outer field name
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.path = format!("{}.{}", prefix, self.path);
        self
    }

    pub fn code(&self) -> &'static str {
        "AERO_CAST_FAILED"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_error_display() {
        let err = CastError::new("scores.2", "Number", "string").at_index(2);
        let display = err.to_string();
        assert!(display.contains("scores.2"));
        assert!(display.contains("Number"));
        assert_eq!(err.index, Some(2));
    }

    #[test]
    fn test_cast_error_reports_outermost_index() {
        let err = CastError::new("a.4.1", "Number", "string").at_index(1).at_index(4);
        assert_eq!(err.index, Some(4));
    }

    #[test]
    fn test_cast_error_prefixed() {
        let err = CastError::new("city", "String", "list").prefixed("address");
        assert_eq!(err.path, "address.city");
    }

    #[test]
    fn test_composition_codes() {
        assert_eq!(
            CompositionError::DuplicateClass("User".into()).code(),
            "AERO_CLASS_DUPLICATE"
        );
        let err = CompositionError::invalid("User", "bad");
        assert_eq!(err.code(), "AERO_CLASS_INVALID_DEFINITION");
        assert!(err.to_string().contains("User"));
    }
}
