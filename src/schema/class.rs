//! Effective class schema
//!
//! A `Schema` is published once by the `ClassRegistry` and never mutated
//! afterwards. It holds the class's own field declarations plus the
//! effective (merged) view of everything else, and a shared reference to
//! its parent's Schema. Field lookups walk the parent chain.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::definition::{EventHandler, Method};
use super::types::FieldDefinition;
use crate::document::DocumentError;
use crate::validation::ValidatorDefinition;

/// Type-erased module fragment
pub(crate) type SharedFragment = Arc<dyn Any + Send + Sync>;

/// A module's fragments for one class: what the class declared itself and
/// the result of merging that with the parent's merged fragment.
#[derive(Clone)]
pub(crate) struct Fragments {
    pub(crate) own: SharedFragment,
    pub(crate) merged: SharedFragment,
}

/// Effective schema of one class
pub struct Schema {
    name: String,
    parent: Option<Arc<Schema>>,
    depth: usize,
    collection: Option<String>,
    fields: Vec<FieldDefinition>,
    field_order: Vec<String>,
    validators: Vec<(String, Vec<ValidatorDefinition>)>,
    behaviors: Vec<(String, Value)>,
    events: Vec<(String, Vec<EventHandler>)>,
    methods: Vec<(String, Method)>,
    fragments: HashMap<String, Fragments>,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Schema>> {
        self.parent.as_ref()
    }

    /// Number of ancestors (0 for a root class)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Ancestor chain, nearest first
    pub fn ancestors(&self) -> impl Iterator<Item = &Schema> {
        std::iter::successors(self.parent.as_deref(), |s| s.parent.as_deref())
    }

    /// True if this class is `name` or descends from it
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name || self.ancestors().any(|s| s.name == name)
    }

    /// Resolves a field by name, child declarations first
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.parent.as_deref().and_then(|p| p.field(name)))
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Fields declared by this class (including `_id` on a root class and
    /// `_type` on a subclass)
    pub fn own_fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Effective field names: ancestors first, then own, each in
    /// declaration order. An override keeps the position of the field it
    /// replaces.
    pub fn field_names(&self) -> &[String] {
        &self.field_order
    }

    /// Effective field definitions, in `field_names` order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.field_order.iter().filter_map(move |name| self.field(name))
    }

    /// Effective validators bound to `field`
    pub fn validators_for(&self, field: &str) -> &[ValidatorDefinition] {
        self.validators
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn validators(&self) -> &[(String, Vec<ValidatorDefinition>)] {
        &self.validators
    }

    /// Options of an effective behavior
    pub fn behavior(&self, name: &str) -> Option<&Value> {
        self.behaviors.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn behaviors(&self) -> &[(String, Value)] {
        &self.behaviors
    }

    /// Handlers for `event`, parent handlers first
    pub fn handlers(&self, event: &str) -> &[EventHandler] {
        self.events
            .iter()
            .find(|(n, _)| n == event)
            .map(|(_, h)| h.as_slice())
            .unwrap_or(&[])
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|(n, _)| n.as_str())
    }

    /// Bound collection, inherited from the nearest ancestor declaring one
    pub fn collection(&self) -> Option<&str> {
        self.collection
            .as_deref()
            .or_else(|| self.parent.as_deref().and_then(Schema::collection))
    }

    /// Bound collection for the storage boundary
    pub fn bound_collection(&self) -> Result<&str, DocumentError> {
        self.collection()
            .ok_or_else(|| DocumentError::NoCollection(self.name.clone()))
    }

    /// Merged fragment a module produced for this class
    pub fn extension<T: Any + Send + Sync>(&self, module: &str) -> Option<&T> {
        self.fragments.get(module)?.merged.downcast_ref::<T>()
    }

    /// Fragment a module parsed from this class's own declaration
    pub fn own_extension<T: Any + Send + Sync>(&self, module: &str) -> Option<&T> {
        self.fragments.get(module)?.own.downcast_ref::<T>()
    }

    pub(crate) fn fragments(&self, module: &str) -> Option<&Fragments> {
        self.fragments.get(module)
    }

    pub(crate) fn own_collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("collection", &self.collection)
            .field("fields", &self.field_order)
            .field("behaviors", &self.behaviors.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("events", &self.events.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("methods", &self.methods.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

/// Mutable schema under composition. Modules write their observable
/// surface here during `init_schema`, `apply_definition` and `init_class`.
pub struct SchemaBuilder {
    name: String,
    parent: Option<Arc<Schema>>,
    depth: usize,
    pub(crate) collection: Option<String>,
    pub(crate) fields: Vec<FieldDefinition>,
    pub(crate) field_order: Vec<String>,
    pub(crate) validators: Vec<(String, Vec<ValidatorDefinition>)>,
    pub(crate) behaviors: Vec<(String, Value)>,
    pub(crate) events: Vec<(String, Vec<EventHandler>)>,
    pub(crate) methods: Vec<(String, Method)>,
    pub(crate) fragments: HashMap<String, Fragments>,
}

impl SchemaBuilder {
    pub(crate) fn new(name: impl Into<String>, parent: Option<Arc<Schema>>) -> Self {
        let depth = parent.as_ref().map_or(0, |p| p.depth + 1);
        Self {
            name: name.into(),
            parent,
            depth,
            collection: None,
            fields: Vec::new(),
            field_order: Vec::new(),
            validators: Vec::new(),
            behaviors: Vec::new(),
            events: Vec::new(),
            methods: Vec::new(),
            fragments: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Schema>> {
        self.parent.as_ref()
    }

    /// Fields installed so far on this class
    pub fn own_fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Resolves a field on this class or its ancestors
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.parent.as_deref().and_then(|p| p.field(name)))
    }

    pub(crate) fn finish(self) -> Schema {
        Schema {
            name: self.name,
            parent: self.parent,
            depth: self.depth,
            collection: self.collection,
            fields: self.fields,
            field_order: self.field_order,
            validators: self.validators,
            behaviors: self.behaviors,
            events: self.events,
            methods: self.methods,
            fragments: self.fragments,
        }
    }
}
