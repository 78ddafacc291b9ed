//! Validation subsystem
//!
//! - `ValidatorRegistry`: validator kinds, populated before composition
//! - `ValidationEngine`: recursive document validation cascade
//! - `ExecutionContext`: trusted-context predicate gating non-simulated passes

mod builtins;
mod context;
mod engine;
mod errors;
mod registry;

pub use context::{ExecutionContext, TrustedContext, UntrustedContext};
pub use engine::{ValidateOptions, ValidationEngine, LIST_WILDCARD};
pub use errors::{ValidationError, ValidationFailure};
pub use registry::{
    ComputedParam, ErrorResolver, ValidatorCall, ValidatorDefinition, ValidatorFn, ValidatorParam,
    ValidatorRegistry,
};
