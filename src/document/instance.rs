//! Document instances
//!
//! A `Document` keeps two layers of state per field:
//! - `values`: last known persisted state
//! - `modified`: pending changes since the last commit
//!
//! Reads resolve `modified`, then `values`, then the field default.
//! Defaults are evaluated once per instance, when it is created.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::errors::{DocumentError, DocumentResult};
use super::path::{lookup, split_first};
use crate::schema::{
    CastError, EventHandler, FieldDefinition, FieldValue, Schema, TypeDescriptor, ID_FIELD, TYPE_FIELD,
};
use crate::validation::{ValidateOptions, ValidationEngine, ValidationError};

/// Instance of a composed class
#[derive(Clone)]
pub struct Document {
    schema: Arc<Schema>,
    values: BTreeMap<String, FieldValue>,
    modified: BTreeMap<String, FieldValue>,
    defaults: BTreeMap<String, FieldValue>,
}

impl Document {
    /// Creates an empty instance
    pub fn new(schema: Arc<Schema>) -> Self {
        let defaults = schema
            .fields()
            .filter_map(|field| Some((field.name.clone(), field.default_value()?)))
            .collect();
        Self {
            schema,
            values: BTreeMap::new(),
            modified: BTreeMap::new(),
            defaults,
        }
    }

    /// Creates an instance and sets every attribute, in order
    pub fn with_attributes<I, K, V>(schema: Arc<Schema>, attributes: I) -> DocumentResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        let mut doc = Self::new(schema);
        doc.set_many(attributes)?;
        Ok(doc)
    }

    /// Builds a nested instance from a plain mapping. Keys that name no
    /// field are ignored.
    pub(crate) fn from_mapping(schema: Arc<Schema>, attributes: Vec<(String, FieldValue)>) -> Result<Self, CastError> {
        let mut doc = Self::new(schema);
        for (name, value) in attributes {
            if !doc.schema.has_field(&name) {
                debug!(class = %doc.schema.name(), field = %name, "Ignoring unknown attribute");
                continue;
            }
            match doc.set(&name, value) {
                Ok(()) => {}
                Err(DocumentError::Cast(e)) => return Err(e),
                Err(e) => debug!(class = %doc.schema.name(), field = %name, error = %e, "Attribute not applied"),
            }
        }
        Ok(doc)
    }

    /// Rebuilds a persisted instance: attributes are cast into `values`
    /// and nothing is left modified.
    pub(crate) fn hydrate(schema: Arc<Schema>, attributes: Vec<(String, FieldValue)>) -> DocumentResult<Self> {
        let mut doc = Self::new(schema);
        for (name, value) in attributes {
            let Some(field) = doc.schema.field(&name) else {
                debug!(class = %doc.schema.name(), field = %name, "Ignoring unknown persisted attribute");
                continue;
            };
            let value = field.cast(value, &name)?;
            doc.values.insert(name, value);
        }
        doc.commit();
        Ok(doc)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn class_name(&self) -> &str {
        self.schema.name()
    }

    /// Current value of a top-level field: pending change, else persisted
    /// value, else default.
    pub fn resolve(&self, name: &str) -> Option<&FieldValue> {
        self.modified
            .get(name)
            .or_else(|| self.values.get(name))
            .or_else(|| self.defaults.get(name))
    }

    /// Reads a field or dotted path.
    ///
    /// `_id` reads as `None` until it holds a value.
    pub fn get(&self, path: &str) -> Option<FieldValue> {
        match split_first(path) {
            (head, Some(rest)) => lookup(self.resolve(head)?, rest).cloned(),
            (ID_FIELD, None) => self.resolve(ID_FIELD).filter(|v| !v.is_null()).cloned(),
            (name, None) => self.resolve(name).cloned(),
        }
    }

    /// Reads several fields; fields without a value are left out
    pub fn get_many(&self, names: &[&str]) -> Vec<(String, FieldValue)> {
        names
            .iter()
            .filter_map(|name| Some((name.to_string(), self.get(name)?)))
            .collect()
    }

    /// Reads every field, in schema order
    pub fn get_all(&self) -> Vec<(String, FieldValue)> {
        self.schema
            .field_names()
            .iter()
            .filter_map(|name| Some((name.clone(), self.get(name)?)))
            .collect()
    }

    pub fn id(&self) -> Option<&str> {
        self.resolve(ID_FIELD).and_then(FieldValue::as_str)
    }

    /// Sets a field or dotted path.
    ///
    /// The value is cast through the field's type. Setting the value a
    /// field already holds is a no-op when that value is truthy. `_id`
    /// cannot change once it holds a truthy value. Immutable fields,
    /// and paths below them, cannot change once persisted.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> DocumentResult<()> {
        let value = value.into();
        if let (head, Some(rest)) = split_first(name) {
            return self.set_nested(head, rest, value);
        }

        let schema = Arc::clone(&self.schema);
        let field = schema.field(name).ok_or_else(|| DocumentError::UnknownField {
            class: schema.name().to_string(),
            field: name.to_string(),
        })?;

        if name == ID_FIELD && self.resolve(ID_FIELD).map_or(false, FieldValue::is_truthy) {
            warn!(class = %schema.name(), "Refusing to change _id once set");
            return Ok(());
        }
        if name == TYPE_FIELD && value.as_str() != Some(schema.name()) {
            warn!(class = %schema.name(), "Refusing to change _type");
            return Ok(());
        }
        if self.is_locked(field, name) {
            warn!(class = %schema.name(), field = %name, "Refusing to change persisted immutable field");
            return Ok(());
        }

        let value = field.cast(value, name)?;
        if let Some(current) = self.resolve(name) {
            if current.is_truthy() && current.strict_eq(&value) {
                return Ok(());
            }
        }
        self.modified.insert(name.to_string(), value);
        Ok(())
    }

    /// Sets each attribute in order, stopping at the first failure
    pub fn set_many<I, K, V>(&mut self, attributes: I) -> DocumentResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        for (name, value) in attributes {
            self.set(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// Sets `rest` below the document or list held by `head`. The outer
    /// field is recorded as modified with an updated copy.
    fn set_nested(&mut self, head: &str, rest: &str, value: FieldValue) -> DocumentResult<()> {
        let schema = Arc::clone(&self.schema);
        let field = schema.field(head).ok_or_else(|| DocumentError::UnknownField {
            class: schema.name().to_string(),
            field: head.to_string(),
        })?;
        if self.is_locked(field, head) {
            warn!(class = %schema.name(), field = %head, path = %rest, "Refusing to change persisted immutable field");
            return Ok(());
        }

        let updated = match self.resolve(head).cloned() {
            Some(FieldValue::Document(mut sub)) => {
                sub.set(rest, value).map_err(|e| e.prefixed(head))?;
                FieldValue::Document(sub)
            }
            Some(FieldValue::List(mut items)) => {
                let (segment, tail) = split_first(rest);
                let path = format!("{}.{}", head, segment);
                let slot = segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(|| DocumentError::NotADocument(path.clone()))?;
                match (tail, slot) {
                    (Some(tail), FieldValue::Document(sub)) => {
                        sub.set(tail, value).map_err(|e| e.prefixed(&path))?;
                    }
                    (Some(_), _) => return Err(DocumentError::NotADocument(path)),
                    (None, slot) => {
                        *slot = match &field.field_type {
                            Some(TypeDescriptor::List(element)) => element.cast(value, &path)?,
                            _ => value,
                        };
                    }
                }
                FieldValue::List(items)
            }
            _ => return Err(DocumentError::NotADocument(head.to_string())),
        };

        self.modified.insert(head.to_string(), updated);
        Ok(())
    }

    fn is_locked(&self, field: &FieldDefinition, name: &str) -> bool {
        field.immutable && self.values.get(name).map_or(false, |v| !v.is_null())
    }

    /// Pending changes. With `want_old`, the value each changed field had
    /// before: persisted value, else default, else null.
    pub fn modified(&self, want_old: bool) -> BTreeMap<String, FieldValue> {
        if !want_old {
            return self.modified.clone();
        }
        self.modified
            .keys()
            .map(|name| {
                let old = self
                    .values
                    .get(name)
                    .or_else(|| self.defaults.get(name))
                    .cloned()
                    .unwrap_or(FieldValue::Null);
                (name.clone(), old)
            })
            .collect()
    }

    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty()
    }

    pub fn is_field_modified(&self, name: &str) -> bool {
        self.modified.contains_key(name)
    }

    /// Last known persisted state
    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    /// Folds pending changes into the persisted state, nested documents
    /// included. Called once the storage layer has written the document.
    pub fn commit(&mut self) {
        let modified = std::mem::take(&mut self.modified);
        self.values.extend(modified);
        for value in self.values.values_mut() {
            commit_value(value);
        }
    }

    /// Persisted shape: field name to canonical value, in schema order.
    /// Transient fields and an unset `_id` are left out.
    pub fn to_persisted(&self) -> Value {
        let mut map = Map::new();
        for field in self.schema.fields() {
            if field.transient {
                continue;
            }
            let Some(value) = self.resolve(&field.name) else {
                continue;
            };
            if field.name == ID_FIELD && value.is_null() {
                continue;
            }
            map.insert(field.name.clone(), value.to_json());
        }
        Value::Object(map)
    }

    /// Gives an unsaved document a random `_id`; returns the id
    pub fn assign_id(&mut self) -> DocumentResult<String> {
        if let Some(id) = self.id().filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }
        let id = Uuid::new_v4().simple().to_string();
        self.set(ID_FIELD, id.as_str())?;
        Ok(id)
    }

    /// Bound collection, for the storage layer
    pub fn collection(&self) -> DocumentResult<&str> {
        self.schema.bound_collection()
    }

    /// Runs the handlers registered for `event`, parent handlers first
    pub fn emit(&mut self, event: &str) -> DocumentResult<()> {
        let handlers: Vec<EventHandler> = self.schema.handlers(event).to_vec();
        debug!(class = %self.schema.name(), event = %event, handlers = handlers.len(), "Emitting event");
        for handler in handlers {
            handler(self)?;
        }
        Ok(())
    }

    /// Calls a class method
    pub fn call(&mut self, method: &str, args: &[FieldValue]) -> DocumentResult<FieldValue> {
        let func = self
            .schema
            .method(method)
            .cloned()
            .ok_or_else(|| DocumentError::UnknownMethod {
                class: self.schema.name().to_string(),
                method: method.to_string(),
            })?;
        func(self, args)
    }

    /// Validates with a default engine
    pub fn validate(&self, options: ValidateOptions) -> Result<(), ValidationError> {
        ValidationEngine::default().validate(self, options)
    }
}

fn commit_value(value: &mut FieldValue) {
    match value {
        FieldValue::Document(doc) => doc.commit(),
        FieldValue::List(items) => items.iter_mut().for_each(commit_value),
        _ => {}
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.values == other.values
            && self.modified == other.modified
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("class", &self.schema.name())
            .field("values", &self.values)
            .field("modified", &self.modified)
            .finish()
    }
}
