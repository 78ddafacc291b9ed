//! Validator registry
//!
//! Maps a validator kind name to its validation function. Populated before
//! any class is composed; composition resolves every declared validator
//! kind against it and fails on unknown kinds.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::builtins;
use super::errors::ValidationFailure;
use crate::document::Document;
use crate::schema::{CompositionError, CompositionResult, FieldValue};

/// Validation function: returns zero or more failures for one field
pub type ValidatorFn = Arc<dyn Fn(&ValidatorCall<'_>) -> Vec<ValidationFailure> + Send + Sync>;

/// Replaces the message of a failure produced by a validator
pub type ErrorResolver = Arc<dyn Fn(&ValidatorCall<'_>, &ValidationFailure) -> String + Send + Sync>;

/// Parameter computed from the document at validation time
pub type ComputedParam = Arc<dyn Fn(&Document) -> FieldValue + Send + Sync>;

/// Validator parameter, static or resolved per validation call
#[derive(Clone)]
pub enum ValidatorParam {
    Static(FieldValue),
    Computed(ComputedParam),
}

impl ValidatorParam {
    pub fn resolve(&self, doc: &Document) -> FieldValue {
        match self {
            ValidatorParam::Static(v) => v.clone(),
            ValidatorParam::Computed(f) => f(doc),
        }
    }
}

impl fmt::Debug for ValidatorParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorParam::Static(v) => f.debug_tuple("Static").field(v).finish(),
            ValidatorParam::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Arguments handed to a validation function
pub struct ValidatorCall<'a> {
    /// Document owning the field
    pub doc: &'a Document,
    /// Fully qualified path for error reporting
    pub path: &'a str,
    /// Field name within `doc`
    pub field: &'a str,
    /// Resolved value, `None` when absent
    pub value: Option<&'a FieldValue>,
    /// Resolved parameter
    pub param: Option<&'a FieldValue>,
    /// Message template declared with the validator
    pub message: Option<&'a str>,
    pub kind: &'a str,
}

impl<'a> ValidatorCall<'a> {
    /// Builds a failure for this call. A declared message template wins
    /// over `default_message`; `{field}` and `{param}` are substituted.
    pub fn fail(&self, default_message: impl Into<String>) -> ValidationFailure {
        let message = match self.message {
            Some(template) => self.render(template),
            None => default_message.into(),
        };
        ValidationFailure::new(self.path, self.kind, message)
    }

    fn render(&self, template: &str) -> String {
        let param = self.param.map(|p| p.to_string()).unwrap_or_default();
        template.replace("{field}", self.path).replace("{param}", &param)
    }

    /// Present, non-null value
    pub fn present(&self) -> Option<&'a FieldValue> {
        self.value.filter(|v| !v.is_null())
    }
}

/// A validator bound to one field of a class
#[derive(Clone)]
pub struct ValidatorDefinition {
    pub field: String,
    pub kind: String,
    pub param: Option<ValidatorParam>,
    pub message: Option<String>,
    pub resolve_error: Option<ErrorResolver>,
    func: ValidatorFn,
}

impl ValidatorDefinition {
    pub(crate) fn new(
        field: impl Into<String>,
        kind: impl Into<String>,
        func: ValidatorFn,
    ) -> Self {
        Self {
            field: field.into(),
            kind: kind.into(),
            param: None,
            message: None,
            resolve_error: None,
            func,
        }
    }

    /// Runs the validator against `value` of `field` on `doc`
    pub fn run(&self, doc: &Document, path: &str, value: Option<&FieldValue>) -> Vec<ValidationFailure> {
        let param = self.param.as_ref().map(|p| p.resolve(doc));
        let call = ValidatorCall {
            doc,
            path,
            field: &self.field,
            value,
            param: param.as_ref(),
            message: self.message.as_deref(),
            kind: &self.kind,
        };
        let mut failures = (self.func)(&call);
        if let Some(resolver) = &self.resolve_error {
            for failure in &mut failures {
                failure.message = resolver(&call, failure);
            }
        }
        failures
    }
}

impl fmt::Debug for ValidatorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorDefinition")
            .field("field", &self.field)
            .field("kind", &self.kind)
            .field("param", &self.param)
            .field("message", &self.message)
            .finish()
    }
}

/// Registry of validator kinds
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, ValidatorFn>,
}

impl ValidatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in validator kinds
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::install(&mut registry);
        registry
    }

    /// Register a validator kind
    pub fn register<F>(&mut self, kind: impl Into<String>, func: F) -> CompositionResult<()>
    where
        F: Fn(&ValidatorCall<'_>) -> Vec<ValidationFailure> + Send + Sync + 'static,
    {
        let kind = kind.into();
        if self.validators.contains_key(&kind) {
            return Err(CompositionError::DuplicateValidator(kind));
        }
        self.validators.insert(kind, Arc::new(func));
        Ok(())
    }

    /// Get a validator by kind
    pub fn get(&self, kind: &str) -> Option<ValidatorFn> {
        self.validators.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.validators.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
