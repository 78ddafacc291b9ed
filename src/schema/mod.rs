//! Schema subsystem
//!
//! Class declarations are composed into immutable `Schema`s by the
//! `ClassRegistry`, which runs every registered module through a fixed
//! phase pipeline and merges each class with its parent.
//!
//! # Invariants
//!
//! - Every class has exactly one `_id` field (String, default null)
//! - Every subclass carries `_type`, defaulting to its own name
//! - A child field replaces the parent field of the same name
//! - Parent chains are finite and bounded
//! - No Schema is published when any phase fails

mod class;
mod definition;
mod errors;
mod loader;
mod module;
pub mod modules;
mod registry;
mod types;
mod value;

pub use class::{Schema, SchemaBuilder};
pub use definition::{ClassDefinition, EventHandler, FieldSpec, Method, TypeSpec, ValidatorSpec};
pub use errors::{CastError, CompositionError, CompositionResult};
pub use loader::ClassLoader;
pub use module::{CompositionContext, Module, Phase};
pub use registry::ClassRegistry;
pub use types::{
    ClassRef, DefaultFactory, FieldDefault, FieldDefinition, TypeDescriptor, ID_FIELD, TYPE_FIELD,
};
pub use value::FieldValue;
