//! Class registry
//!
//! Composes class declarations into published `Schema`s by running every
//! registered module through the fixed phase sequence:
//!
//! 1. initSchema
//! 2. initDefinition
//! 3. parseDefinition
//! 4. mergeDefinitions (only when the class has a parent)
//! 5. applyDefinition
//! 6. initClass
//!
//! Each phase runs across all modules, in registration order, before the
//! next phase starts. Any failure aborts composition; nothing is published
//! until every phase has succeeded.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, info};

use super::class::{Fragments, Schema, SchemaBuilder, SharedFragment};
use super::definition::ClassDefinition;
use super::errors::{CastError, CompositionError, CompositionResult};
use super::module::{AnyFragment, CompositionContext, ErasedModule, Module, Phase};
use super::modules::{BehaviorsModule, EventsModule, FieldsModule, MethodsModule, ValidatorsModule};
use super::types::TYPE_FIELD;
use super::value::FieldValue;
use crate::config::EngineConfig;
use crate::document::{Document, DocumentError, DocumentResult};
use crate::validation::ValidatorRegistry;

/// Published classes by name
pub(crate) type ClassTable = RwLock<HashMap<String, Arc<Schema>>>;

/// Composes and owns class schemas
pub struct ClassRegistry {
    modules: Vec<Box<dyn ErasedModule>>,
    classes: Arc<ClassTable>,
    validators: Arc<ValidatorRegistry>,
    config: EngineConfig,
}

impl ClassRegistry {
    /// Creates a registry with the built-in modules and default config
    pub fn new(validators: Arc<ValidatorRegistry>) -> Self {
        Self::with_config(validators, EngineConfig::default())
    }

    pub fn with_config(validators: Arc<ValidatorRegistry>, config: EngineConfig) -> Self {
        let modules: Vec<Box<dyn ErasedModule>> = vec![
            Box::new(FieldsModule),
            Box::new(ValidatorsModule),
            Box::new(BehaviorsModule),
            Box::new(EventsModule),
            Box::new(MethodsModule),
        ];
        Self {
            modules,
            classes: Arc::new(RwLock::new(HashMap::new())),
            validators,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn validators(&self) -> &Arc<ValidatorRegistry> {
        &self.validators
    }

    /// Registers a custom module after the built-in ones.
    ///
    /// Must happen before the first class is composed.
    pub fn register_module<M: Module>(&mut self, module: M) -> CompositionResult<()> {
        let name = Module::name(&module).to_string();
        if self.modules.iter().any(|m| m.module_name() == name) {
            return Err(CompositionError::DuplicateModule(name));
        }
        if !self.read_table()?.is_empty() {
            return Err(CompositionError::ModulesSealed(name));
        }
        debug!(module = %name, "Registered composition module");
        self.modules.push(Box::new(module));
        Ok(())
    }

    /// Registered module names, in execution order
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.module_name()).collect()
    }

    /// Composes and publishes a new class.
    ///
    /// Classes its fields reference must already be published. Use
    /// `create_classes` for classes that reference each other.
    pub fn create_class(&self, definition: ClassDefinition) -> CompositionResult<Arc<Schema>> {
        self.publish(definition, &HashSet::new())
    }

    /// Composes and publishes a batch of classes, in order.
    ///
    /// Fields may reference any class of the batch, including classes
    /// published after them, so mutually referencing classes can be
    /// declared. Parents must precede their subclasses. Stops at the first
    /// failure; classes published before it stay published.
    pub fn create_classes<I>(&self, definitions: I) -> CompositionResult<Vec<Arc<Schema>>>
    where
        I: IntoIterator<Item = ClassDefinition>,
    {
        let definitions: Vec<ClassDefinition> = definitions.into_iter().collect();
        let batch: HashSet<String> = definitions.iter().map(|d| d.name.clone()).collect();
        debug!(classes = batch.len(), "Composing class batch");
        definitions
            .into_iter()
            .map(|definition| self.publish(definition, &batch))
            .collect()
    }

    fn publish(&self, definition: ClassDefinition, batch: &HashSet<String>) -> CompositionResult<Arc<Schema>> {
        let name = definition.name.clone();
        validate_class_name(&name)?;
        if self.contains(&name) {
            return Err(CompositionError::DuplicateClass(name));
        }

        let parent = match &definition.parent {
            Some(parent_name) => Some(self.get(parent_name).ok_or_else(|| {
                CompositionError::UnknownParent {
                    class: name.clone(),
                    parent: parent_name.clone(),
                }
            })?),
            None => None,
        };

        let depth = parent.as_ref().map_or(0, |p| p.depth() + 1);
        if depth > self.config.max_inheritance_depth {
            return Err(CompositionError::InheritanceTooDeep {
                class: name,
                depth,
                limit: self.config.max_inheritance_depth,
            });
        }

        let schema = Arc::new(self.compose(&definition, parent.as_ref(), None, batch)?);

        let mut table = self.write_table()?;
        if table.contains_key(&name) {
            return Err(CompositionError::DuplicateClass(name));
        }
        table.insert(name.clone(), Arc::clone(&schema));
        drop(table);

        info!(
            class = %name,
            parent = ?definition.parent,
            fields = schema.field_names().len(),
            "Class published"
        );
        Ok(schema)
    }

    /// Merges a further declaration into an existing class and republishes
    /// it. Subclasses composed earlier keep the Schema they were built on.
    pub fn extend_class(&self, name: &str, mut definition: ClassDefinition) -> CompositionResult<Arc<Schema>> {
        let existing = self
            .get(name)
            .ok_or_else(|| CompositionError::UnknownClass(name.to_string()))?;

        let parent = existing.parent().cloned();
        if let Some(declared) = &definition.parent {
            if parent.as_ref().map(|p| p.name()) != Some(declared.as_str()) {
                return Err(CompositionError::invalid(
                    name,
                    format!("extension cannot change the parent to '{}'", declared),
                ));
            }
        }
        definition.name = name.to_string();

        let schema = Arc::new(self.compose(&definition, parent.as_ref(), Some(&*existing), &HashSet::new())?);
        self.write_table()?
            .insert(name.to_string(), Arc::clone(&schema));

        info!(class = %name, fields = schema.field_names().len(), "Class extended");
        Ok(schema)
    }

    /// Looks up a published class
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.classes.read().ok()?.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes
            .read()
            .map(|t| t.contains_key(name))
            .unwrap_or(false)
    }

    /// Published class names, sorted
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .classes
            .read()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Rebuilds a persisted document.
    ///
    /// A `_type` naming a subclass of `class` selects that subclass. Values
    /// are cast into the document's persisted state; nothing is modified.
    pub fn hydrate(&self, class: &str, attributes: &Value) -> DocumentResult<Document> {
        let schema = self
            .get(class)
            .ok_or_else(|| DocumentError::UnknownClass(class.to_string()))?;

        let entries = match FieldValue::from(attributes.clone()) {
            FieldValue::Map(entries) => entries,
            other => return Err(CastError::new(class, class, other.kind_name()).into()),
        };

        let target = match entries
            .iter()
            .find(|(k, _)| k == TYPE_FIELD)
            .and_then(|(_, v)| v.as_str())
        {
            Some(type_name) if type_name != class => self
                .get(type_name)
                .filter(|s| s.is_a(class))
                .ok_or_else(|| DocumentError::UnknownClass(type_name.to_string()))?,
            _ => schema,
        };

        Document::hydrate(target, entries)
    }

    fn compose(
        &self,
        definition: &ClassDefinition,
        parent: Option<&Arc<Schema>>,
        existing: Option<&Schema>,
        batch: &HashSet<String>,
    ) -> CompositionResult<Schema> {
        let weak = Arc::downgrade(&self.classes);
        let ctx = CompositionContext {
            class_name: &definition.name,
            parent,
            validators: &self.validators,
            classes: &weak,
            batch,
        };

        let mut builder = SchemaBuilder::new(definition.name.clone(), parent.cloned());
        builder.collection = definition
            .collection
            .clone()
            .or_else(|| existing.and_then(|e| e.own_collection().map(str::to_string)));

        self.trace(&ctx, Phase::InitSchema);
        for module in &self.modules {
            module.init_schema(&ctx, &mut builder)?;
        }

        self.trace(&ctx, Phase::InitDefinition);
        let fragments = self
            .modules
            .iter()
            .map(|m| m.init_definition(&ctx, &builder))
            .collect::<CompositionResult<Vec<AnyFragment>>>()?;

        self.trace(&ctx, Phase::ParseDefinition);
        let mut fragments = self
            .modules
            .iter()
            .zip(fragments)
            .map(|(m, fragment)| m.parse_definition(&ctx, definition, fragment))
            .collect::<CompositionResult<Vec<AnyFragment>>>()?;

        // Extension: the class's own declaration grows by the new one
        if let Some(existing) = existing {
            fragments = self
                .modules
                .iter()
                .zip(fragments)
                .map(|(m, parsed)| match existing.fragments(m.module_name()) {
                    Some(previous) => m.merge_definitions(&ctx, &*previous.own, &*parsed),
                    None => Ok(parsed),
                })
                .collect::<CompositionResult<Vec<AnyFragment>>>()?;
        }
        let own: Vec<SharedFragment> = fragments.into_iter().map(SharedFragment::from).collect();

        self.trace(&ctx, Phase::MergeDefinitions);
        let merged = self
            .modules
            .iter()
            .zip(&own)
            .map(|(m, own)| {
                match parent.and_then(|p| p.fragments(m.module_name())) {
                    Some(inherited) => m
                        .merge_definitions(&ctx, &*inherited.merged, &**own)
                        .map(SharedFragment::from),
                    None => Ok(Arc::clone(own)),
                }
            })
            .collect::<CompositionResult<Vec<SharedFragment>>>()?;

        self.trace(&ctx, Phase::ApplyDefinition);
        for ((module, own), merged) in self.modules.iter().zip(own).zip(merged) {
            module.apply_definition(&ctx, &mut builder, &*own, &*merged)?;
            builder
                .fragments
                .insert(module.module_name().to_string(), Fragments { own, merged });
        }

        self.trace(&ctx, Phase::InitClass);
        for module in &self.modules {
            module.init_class(&ctx, &mut builder)?;
        }

        Ok(builder.finish())
    }

    fn trace(&self, ctx: &CompositionContext<'_>, phase: Phase) {
        debug!(class = %ctx.class_name, phase = %phase, modules = self.modules.len(), "Running composition phase");
    }

    fn read_table(&self) -> CompositionResult<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Schema>>>> {
        self.classes
            .read()
            .map_err(|e| CompositionError::Internal(e.to_string()))
    }

    fn write_table(&self) -> CompositionResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Schema>>>> {
        self.classes
            .write()
            .map_err(|e| CompositionError::Internal(e.to_string()))
    }
}

impl std::fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("modules", &self.module_names())
            .field("classes", &self.class_names())
            .field("config", &self.config)
            .finish()
    }
}

fn validate_class_name(name: &str) -> CompositionResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(CompositionError::InvalidClassName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, TypeSpec, ID_FIELD};

    fn registry() -> ClassRegistry {
        ClassRegistry::new(Arc::new(ValidatorRegistry::with_builtins()))
    }

    #[test]
    fn test_builtin_module_order() {
        assert_eq!(
            registry().module_names(),
            vec!["fields", "validators", "behaviors", "events", "methods"]
        );
    }

    #[test]
    fn test_create_root_class() {
        let registry = registry();
        let schema = registry
            .create_class(ClassDefinition::new("Note").field("title", FieldSpec::typed(TypeSpec::String)))
            .unwrap();
        assert_eq!(schema.field_names(), &[ID_FIELD.to_string(), "title".to_string()]);
        assert!(schema.field(TYPE_FIELD).is_none());
        assert!(registry.contains("Note"));
    }

    #[test]
    fn test_invalid_class_names() {
        let registry = registry();
        for name in ["", "1abc", "a-b", "a.b"] {
            let err = registry.create_class(ClassDefinition::new(name)).unwrap_err();
            assert_eq!(err.code(), "AERO_CLASS_INVALID_NAME");
        }
    }

    #[test]
    fn test_inheritance_depth_bound() {
        let registry = ClassRegistry::with_config(
            Arc::new(ValidatorRegistry::with_builtins()),
            EngineConfig {
                max_inheritance_depth: 1,
                ..EngineConfig::default()
            },
        );
        registry.create_class(ClassDefinition::new("A")).unwrap();
        registry.create_class(ClassDefinition::new("B").extends("A")).unwrap();
        let err = registry
            .create_class(ClassDefinition::new("C").extends("B"))
            .unwrap_err();
        assert!(matches!(err, CompositionError::InheritanceTooDeep { depth: 2, limit: 1, .. }));
        assert!(!registry.contains("C"));
    }

    #[test]
    fn test_hydrate_rejects_non_mapping() {
        let registry = registry();
        registry.create_class(ClassDefinition::new("Note")).unwrap();
        let err = registry.hydrate("Note", &serde_json::json!([1, 2])).unwrap_err();
        assert_eq!(err.code(), "AERO_CAST_FAILED");
        let err = registry.hydrate("Missing", &serde_json::json!({})).unwrap_err();
        assert_eq!(err.code(), "AERO_DOCUMENT_UNKNOWN_CLASS");
    }
}
