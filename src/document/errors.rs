//! Document error types
//!
//! Error codes:
//! - AERO_CAST_FAILED
//! - AERO_DOCUMENT_* (field access, methods)
//! - AERO_NO_COLLECTION (storage boundary)

use thiserror::Error;

use crate::schema::CastError;

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Document operation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    /// Value could not be cast to the field's type
    #[error(transparent)]
    Cast(#[from] CastError),

    /// No such field on the class or its ancestors
    #[error("Class '{class}' has no field '{field}'")]
    UnknownField { class: String, field: String },

    /// Class not registered
    #[error("Unknown class '{0}'")]
    UnknownClass(String),

    /// No such method on the class or its ancestors
    #[error("Class '{class}' has no method '{method}'")]
    UnknownMethod { class: String, method: String },

    /// Dotted path crosses a value that is not a document or list
    #[error("Path '{0}' does not lead into a nested document")]
    NotADocument(String),

    /// Persistence attempted on a class with no bound collection
    #[error("Class '{0}' is not bound to a collection")]
    NoCollection(String),

    /// A method or event handler failed
    #[error("{0}")]
    Method(String),
}

impl DocumentError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            DocumentError::Cast(e) => e.code(),
            DocumentError::UnknownField { .. } => "AERO_DOCUMENT_UNKNOWN_FIELD",
            DocumentError::UnknownClass(_) => "AERO_DOCUMENT_UNKNOWN_CLASS",
            DocumentError::UnknownMethod { .. } => "AERO_DOCUMENT_UNKNOWN_METHOD",
            DocumentError::NotADocument(_) => "AERO_DOCUMENT_NOT_NESTED",
            DocumentError::NoCollection(_) => "AERO_NO_COLLECTION",
            DocumentError::Method(_) => "AERO_DOCUMENT_METHOD_FAILED",
        }
    }

    /// Qualifies field paths with the name of the enclosing field
    pub fn prefixed(self, prefix: &str) -> Self {
        match self {
            DocumentError::Cast(e) => DocumentError::Cast(e.prefixed(prefix)),
            DocumentError::UnknownField { class, field } => DocumentError::UnknownField {
                class,
                field: format!("{}.{}", prefix, field),
            },
            DocumentError::NotADocument(path) => {
                DocumentError::NotADocument(format!("{}.{}", prefix, path))
            }
            other => other,
        }
    }

    /// Failure raised by user code in a method or event handler
    pub fn method(reason: impl Into<String>) -> Self {
        DocumentError::Method(reason.into())
    }
}
