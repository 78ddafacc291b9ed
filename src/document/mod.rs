//! Document subsystem
//!
//! Runtime instances of composed classes: casting on write, dirty
//! tracking, dotted-path access and the persisted shape handed to the
//! storage layer.

mod errors;
mod instance;
mod path;

pub use errors::{DocumentError, DocumentResult};
pub use instance::Document;
