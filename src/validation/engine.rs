//! Validation cascade
//!
//! Walks a document field by field in schema order, runs the type-level
//! check and every bound validator, then descends into nested documents
//! (Object fields) and class-typed list elements with a qualified path
//! prefix. The walk never mutates the document.
//!
//! Two error modes:
//! - stop on first error: the first failure anywhere aborts the walk
//! - collect: every failure is gathered and reported once at the end

use std::sync::Arc;

use tracing::debug;

use super::context::{ExecutionContext, TrustedContext};
use super::errors::{ValidationError, ValidationFailure};
use crate::config::EngineConfig;
use crate::document::Document;
use crate::schema::{FieldValue, TypeDescriptor};

/// Wildcard segment matching every element of a list
pub const LIST_WILDCARD: &str = "$";

/// Per-call validation options
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    /// Fields to validate, schema order when `None`. Entries may be
    /// nested-field patterns such as `address.city` or `items.$.sku`.
    pub fields: Option<Vec<String>>,
    /// Overrides the engine's configured error mode
    pub stop_on_first_error: Option<bool>,
    /// When false, the pass only runs inside a trusted execution context
    pub simulation: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            fields: None,
            stop_on_first_error: None,
            simulation: true,
        }
    }
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn stop_on_first_error(mut self, stop: bool) -> Self {
        self.stop_on_first_error = Some(stop);
        self
    }

    pub fn simulation(mut self, simulation: bool) -> Self {
        self.simulation = simulation;
        self
    }
}

/// Recursive document validator
#[derive(Clone)]
pub struct ValidationEngine {
    config: EngineConfig,
    context: Arc<dyn ExecutionContext>,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("config", &self.config)
            .finish()
    }
}

impl ValidationEngine {
    /// Creates an engine running in a trusted context
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            context: Arc::new(TrustedContext),
        }
    }

    /// Replaces the execution-context predicate
    pub fn with_context(mut self, context: impl ExecutionContext + 'static) -> Self {
        self.context = Arc::new(context);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates `doc` and its nested documents.
    ///
    /// Returns `Ok(())` when nothing failed or when the pass is gated off
    /// (`simulation == false` outside a trusted context).
    pub fn validate(&self, doc: &Document, options: ValidateOptions) -> Result<(), ValidationError> {
        if !options.simulation && !self.context.is_trusted() {
            debug!(class = %doc.schema().name(), "Skipping validation outside trusted context");
            return Ok(());
        }

        let mut walk = Walk {
            stop: options
                .stop_on_first_error
                .unwrap_or(self.config.stop_on_first_error),
            max_depth: self.config.max_validation_depth,
            failures: Vec::new(),
        };

        // Halt only signals that the walk stopped early; the failure is
        // already recorded.
        let _ = match &options.fields {
            Some(fields) => walk.document(doc, fields, "", 0),
            None => walk.document(doc, doc.schema().field_names(), "", 0),
        };

        if walk.failures.is_empty() {
            Ok(())
        } else {
            debug!(
                class = %doc.schema().name(),
                failures = walk.failures.len(),
                "Validation failed"
            );
            Err(ValidationError::new(walk.failures))
        }
    }
}

/// Early exit marker for stop-on-first-error mode
struct Halt;

struct Walk {
    stop: bool,
    max_depth: usize,
    failures: Vec<ValidationFailure>,
}

impl Walk {
    fn report(&mut self, failures: Vec<ValidationFailure>) -> Result<(), Halt> {
        for failure in failures {
            self.failures.push(failure);
            if self.stop {
                return Err(Halt);
            }
        }
        Ok(())
    }

    fn document(&mut self, doc: &Document, fields: &[String], prefix: &str, depth: usize) -> Result<(), Halt> {
        if depth > self.max_depth {
            let path = prefix.trim_end_matches('.');
            return self.report(vec![ValidationFailure::max_depth(path, self.max_depth)]);
        }
        debug!(class = %doc.schema().name(), prefix = %prefix, depth, "Validating document");

        for name in fields {
            self.field(doc, name, prefix, depth)?;
        }
        Ok(())
    }

    fn field(&mut self, doc: &Document, name: &str, prefix: &str, depth: usize) -> Result<(), Halt> {
        if let Some((head, rest)) = name.split_once('.') {
            return self.pattern(doc, head, rest, prefix, depth);
        }

        let schema = doc.schema();
        let Some(field) = schema.field(name) else {
            return Ok(());
        };
        if field.transient {
            return Ok(());
        }

        let path = format!("{}{}", prefix, name);
        let value = match doc.resolve(name) {
            Some(value) if !value.is_null() => value,
            _ if field.optional => return Ok(()),
            _ => return self.report(vec![ValidationFailure::required(&path)]),
        };

        if let Some(ty) = &field.field_type {
            self.report(ty.validate(&path, value))?;
        }
        for validator in schema.validators_for(name) {
            self.report(validator.run(doc, &path, Some(value)))?;
        }

        match (&field.field_type, value) {
            (Some(TypeDescriptor::Object(_)), FieldValue::Document(sub)) => {
                self.nested(sub, &format!("{}.", path), depth + 1)?;
            }
            (Some(TypeDescriptor::List(element)), FieldValue::List(items))
                if element.class_ref().is_some() =>
            {
                for (i, item) in items.iter().enumerate() {
                    if let FieldValue::Document(sub) = item {
                        self.nested(sub, &format!("{}.{}.", path, i), depth + 1)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn nested(&mut self, doc: &Document, prefix: &str, depth: usize) -> Result<(), Halt> {
        self.document(doc, doc.schema().field_names(), prefix, depth)
    }

    /// Resolves `head.rest` against the document and validates every
    /// concrete target it reaches.
    fn pattern(&mut self, doc: &Document, head: &str, rest: &str, prefix: &str, depth: usize) -> Result<(), Halt> {
        let Some(value) = doc.resolve(head) else {
            return Ok(());
        };
        let ty = doc.schema().field(head).and_then(|f| f.field_type.as_ref());
        self.descend(value, ty, rest, &format!("{}{}.", prefix, head), depth)
    }

    /// `ty` is the declared type of `value`, when there is one.
    fn descend(
        &mut self,
        value: &FieldValue,
        ty: Option<&TypeDescriptor>,
        rest: &str,
        prefix: &str,
        depth: usize,
    ) -> Result<(), Halt> {
        match value {
            FieldValue::Document(sub) => {
                self.document(sub, &[rest.to_string()], prefix, depth + 1)
            }
            FieldValue::List(items) => {
                let (segment, tail) = match rest.split_once('.') {
                    Some((segment, tail)) => (segment, Some(tail)),
                    None => (rest, None),
                };
                let element = match ty {
                    Some(TypeDescriptor::List(element)) => Some(element.as_ref()),
                    _ => None,
                };
                let indices: Vec<usize> = if segment == LIST_WILDCARD {
                    (0..items.len()).collect()
                } else {
                    segment.parse().ok().into_iter().collect()
                };

                for i in indices {
                    let Some(item) = items.get(i) else {
                        continue;
                    };
                    let item_prefix = format!("{}{}.", prefix, i);
                    match (tail, item) {
                        (Some(tail), _) => self.descend(item, element, tail, &item_prefix, depth)?,
                        (None, FieldValue::Document(sub)) => self.nested(sub, &item_prefix, depth + 1)?,
                        (None, item) => {
                            let Some(element) = element else {
                                continue;
                            };
                            let path = format!("{}{}", prefix, i);
                            if item.is_null() {
                                self.report(vec![ValidationFailure::required(&path)])?;
                            } else {
                                self.report(element.validate(&path, item))?;
                            }
                        }
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
