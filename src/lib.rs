//! aerodoc - Deterministic document class composition, casting and validation
//!
//! Classes are declared once, composed into immutable schemas through an
//! ordered module pipeline, and instantiated as documents that cast every
//! write, track pending changes and validate recursively.

pub mod config;
pub mod document;
pub mod schema;
pub mod validation;

pub use config::{ConfigError, EngineConfig};
pub use document::{Document, DocumentError, DocumentResult};
pub use schema::{
    CastError, ClassDefinition, ClassLoader, ClassRegistry, CompositionError, CompositionResult, FieldSpec,
    FieldValue, Schema, TypeSpec, ValidatorSpec,
};
pub use validation::{ValidateOptions, ValidationEngine, ValidationError, ValidatorRegistry};
