//! Class declarations
//!
//! A `ClassDefinition` is the raw, module-agnostic input to composition.
//! It can be built in code or deserialized from JSON:
//!
//! ```json
//! {
//!   "name": "User",
//!   "parent": "Person",
//!   "collection": "users",
//!   "fields": {
//!     "email": "String",
//!     "tags": ["String"],
//!     "address": { "type": "Address", "optional": true },
//!     "visits": { "type": "Number", "default": 0 }
//!   },
//!   "validators": {
//!     "email": [{ "type": "email" }, { "type": "maxLength", "param": 120 }]
//!   },
//!   "behaviors": { "timestamp": {} }
//! }
//! ```
//!
//! Keys the built-in modules do not consume are kept in `extra` for
//! custom modules.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;

use super::registry::ClassTable;
use super::types::{ClassRef, FieldDefault, TypeDescriptor};
use super::value::FieldValue;
use crate::document::{Document, DocumentResult};
use crate::validation::{ErrorResolver, ValidationFailure, ValidatorCall, ValidatorParam};

/// Lifecycle event handler
pub type EventHandler = Arc<dyn Fn(&mut Document) -> DocumentResult<()> + Send + Sync>;

/// Class method
pub type Method = Arc<dyn Fn(&mut Document, &[FieldValue]) -> DocumentResult<FieldValue> + Send + Sync>;

/// Declared field type, class references unresolved
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawTypeSpec")]
pub enum TypeSpec {
    Boolean,
    Date,
    Number,
    String,
    /// Nested instance of the named class
    Class(String),
    List(Box<TypeSpec>),
}

impl TypeSpec {
    pub fn class(name: impl Into<String>) -> Self {
        TypeSpec::Class(name.into())
    }

    pub fn list(element: TypeSpec) -> Self {
        TypeSpec::List(Box::new(element))
    }

    /// Parses a type name; anything other than a primitive names a class
    pub fn parse(name: &str) -> Result<Self, String> {
        let name = name.trim();
        match name {
            "" => Err("type name is empty".to_string()),
            "Boolean" => Ok(TypeSpec::Boolean),
            "Date" => Ok(TypeSpec::Date),
            "Number" => Ok(TypeSpec::Number),
            "String" => Ok(TypeSpec::String),
            other => Ok(TypeSpec::Class(other.to_string())),
        }
    }

    /// Referenced class, looking through lists
    pub fn class_name(&self) -> Option<&str> {
        match self {
            TypeSpec::Class(name) => Some(name),
            TypeSpec::List(element) => element.class_name(),
            _ => None,
        }
    }

    pub(crate) fn resolve(&self, classes: &Weak<ClassTable>) -> TypeDescriptor {
        match self {
            TypeSpec::Boolean => TypeDescriptor::Boolean,
            TypeSpec::Date => TypeDescriptor::Date,
            TypeSpec::Number => TypeDescriptor::Number,
            TypeSpec::String => TypeDescriptor::String,
            TypeSpec::Class(name) => TypeDescriptor::Object(ClassRef::new(name.clone(), classes.clone())),
            TypeSpec::List(element) => TypeDescriptor::List(Box::new(element.resolve(classes))),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTypeSpec {
    Name(String),
    List(Vec<RawTypeSpec>),
}

impl TryFrom<RawTypeSpec> for TypeSpec {
    type Error = String;

    fn try_from(raw: RawTypeSpec) -> Result<Self, Self::Error> {
        match raw {
            RawTypeSpec::Name(name) => TypeSpec::parse(&name),
            RawTypeSpec::List(mut items) => {
                if items.len() != 1 {
                    return Err(format!(
                        "list type takes exactly one element type, got {}",
                        items.len()
                    ));
                }
                let element = items.remove(0);
                Ok(TypeSpec::list(TypeSpec::try_from(element)?))
            }
        }
    }
}

/// Declared field
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawFieldSpec")]
pub struct FieldSpec {
    /// `None` declares an untyped field
    pub type_spec: Option<TypeSpec>,
    pub default: Option<FieldDefault>,
    pub optional: bool,
    pub transient: bool,
    pub immutable: bool,
}

impl FieldSpec {
    pub fn typed(type_spec: TypeSpec) -> Self {
        Self {
            type_spec: Some(type_spec),
            ..Self::untyped()
        }
    }

    pub fn untyped() -> Self {
        Self {
            type_spec: None,
            default: None,
            optional: false,
            transient: false,
            immutable: false,
        }
    }

    pub fn default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    /// Default produced by `factory` for every new instance
    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> FieldValue + Send + Sync + 'static,
    {
        self.default = Some(FieldDefault::Factory(Arc::new(factory)));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFieldSpec {
    Short(TypeSpec),
    Full {
        #[serde(rename = "type", default)]
        type_spec: Option<TypeSpec>,
        #[serde(default)]
        default: Option<Value>,
        #[serde(default)]
        optional: bool,
        #[serde(default)]
        transient: bool,
        #[serde(default)]
        immutable: bool,
    },
}

impl From<RawFieldSpec> for FieldSpec {
    fn from(raw: RawFieldSpec) -> Self {
        match raw {
            RawFieldSpec::Short(type_spec) => FieldSpec::typed(type_spec),
            RawFieldSpec::Full {
                type_spec,
                default,
                optional,
                transient,
                immutable,
            } => FieldSpec {
                type_spec,
                default: default.map(|v| FieldDefault::Value(FieldValue::from(v))),
                optional,
                transient,
                immutable,
            },
        }
    }
}

/// Declared validator
#[derive(Clone, Deserialize)]
pub struct ValidatorSpec {
    /// Registered validator kind
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "static_param")]
    pub param: Option<ValidatorParam>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(skip)]
    pub resolve_error: Option<ErrorResolver>,
}

impl ValidatorSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            param: None,
            message: None,
            resolve_error: None,
        }
    }

    pub fn param(mut self, param: impl Into<FieldValue>) -> Self {
        self.param = Some(ValidatorParam::Static(param.into()));
        self
    }

    /// Parameter computed from the document on every validation
    pub fn param_with<F>(mut self, param: F) -> Self
    where
        F: Fn(&Document) -> FieldValue + Send + Sync + 'static,
    {
        self.param = Some(ValidatorParam::Computed(Arc::new(param)));
        self
    }

    /// Message template; `{field}` and `{param}` are substituted
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Replaces the message of every failure this validator reports
    pub fn resolve_error<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&ValidatorCall<'_>, &ValidationFailure) -> String + Send + Sync + 'static,
    {
        self.resolve_error = Some(Arc::new(resolver));
        self
    }
}

impl fmt::Debug for ValidatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorSpec")
            .field("kind", &self.kind)
            .field("param", &self.param)
            .field("message", &self.message)
            .field("resolve_error", &self.resolve_error.is_some())
            .finish()
    }
}

fn static_param<'de, D>(deserializer: D) -> Result<Option<ValidatorParam>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(|v| ValidatorParam::Static(FieldValue::from(v))))
}

/// `"email"`, `{"type": "email"}` or a list of either
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValidators {
    Kind(String),
    // Before `One`: a derived struct also deserializes from a sequence
    Many(Vec<RawValidator>),
    One(ValidatorSpec),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValidator {
    Kind(String),
    Full(ValidatorSpec),
}

impl From<RawValidator> for ValidatorSpec {
    fn from(raw: RawValidator) -> Self {
        match raw {
            RawValidator::Kind(kind) => ValidatorSpec::new(kind),
            RawValidator::Full(spec) => spec,
        }
    }
}

impl From<RawValidators> for Vec<ValidatorSpec> {
    fn from(raw: RawValidators) -> Self {
        match raw {
            RawValidators::Kind(kind) => vec![ValidatorSpec::new(kind)],
            RawValidators::One(spec) => vec![spec],
            RawValidators::Many(items) => items.into_iter().map(ValidatorSpec::from).collect(),
        }
    }
}

/// Raw class declaration
#[derive(Clone, Default, Deserialize)]
pub struct ClassDefinition {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Storage binding handed to the persistence layer
    #[serde(default)]
    pub collection: Option<String>,
    /// Fields in declaration order
    #[serde(default, deserialize_with = "ordered_map")]
    pub fields: Vec<(String, FieldSpec)>,
    #[serde(default, deserialize_with = "ordered_validators")]
    pub validators: Vec<(String, Vec<ValidatorSpec>)>,
    /// Behavior name to option map
    #[serde(default, deserialize_with = "ordered_map")]
    pub behaviors: Vec<(String, Value)>,
    #[serde(skip)]
    pub events: Vec<(String, EventHandler)>,
    #[serde(skip)]
    pub methods: Vec<(String, Method)>,
    /// Declaration keys left for custom modules
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ClassDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.push((name.into(), spec));
        self
    }

    /// Binds a validator to `field`; repeated calls accumulate in order
    pub fn validator(mut self, field: impl Into<String>, spec: ValidatorSpec) -> Self {
        let field = field.into();
        match self.validators.iter_mut().find(|(name, _)| *name == field) {
            Some((_, specs)) => specs.push(spec),
            None => self.validators.push((field, vec![spec])),
        }
        self
    }

    pub fn behavior(mut self, name: impl Into<String>, options: Value) -> Self {
        self.behaviors.push((name.into(), options));
        self
    }

    /// Adds a handler for `event`
    pub fn on<F>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Document) -> DocumentResult<()> + Send + Sync + 'static,
    {
        self.events.push((event.into(), Arc::new(handler)));
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&mut Document, &[FieldValue]) -> DocumentResult<FieldValue> + Send + Sync + 'static,
    {
        self.methods.push((name.into(), Arc::new(method)));
        self
    }

    /// Raw value of a declaration key not consumed by the built-in modules
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl fmt::Debug for ClassDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDefinition")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("collection", &self.collection)
            .field("fields", &self.fields)
            .field("validators", &self.validators)
            .field("behaviors", &self.behaviors)
            .field("events", &self.events.iter().map(|(e, _)| e).collect::<Vec<_>>())
            .field("methods", &self.methods.iter().map(|(m, _)| m).collect::<Vec<_>>())
            .field("extra", &self.extra)
            .finish()
    }
}

/// JSON object as an ordered list of entries
struct OrderedVisitor<V>(PhantomData<V>);

impl<'de, V> Visitor<'de> for OrderedVisitor<V>
where
    V: Deserialize<'de>,
{
    type Value = Vec<(String, V)>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries: Vec<(String, V)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(de::Error::custom(format!("duplicate key '{}'", key)));
            }
            entries.push((key, value));
        }
        Ok(entries)
    }
}

fn ordered_map<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    deserializer.deserialize_map(OrderedVisitor(PhantomData))
}

fn ordered_validators<'de, D>(deserializer: D) -> Result<Vec<(String, Vec<ValidatorSpec>)>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<(String, RawValidators)> = ordered_map(deserializer)?;
    Ok(raw.into_iter().map(|(field, specs)| (field, specs.into())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_spec_parsing() {
        let spec: TypeSpec = serde_json::from_value(json!("Number")).unwrap();
        assert_eq!(spec, TypeSpec::Number);
        let spec: TypeSpec = serde_json::from_value(json!(["Address"])).unwrap();
        assert_eq!(spec, TypeSpec::list(TypeSpec::class("Address")));
        assert_eq!(spec.class_name(), Some("Address"));
        assert!(serde_json::from_value::<TypeSpec>(json!(["A", "B"])).is_err());
        assert!(serde_json::from_value::<TypeSpec>(json!("")).is_err());
    }

    #[test]
    fn test_field_spec_forms() {
        let short: FieldSpec = serde_json::from_value(json!("String")).unwrap();
        assert_eq!(short.type_spec, Some(TypeSpec::String));
        assert!(!short.optional);

        let full: FieldSpec = serde_json::from_value(json!({
            "type": ["Number"],
            "default": [1, 2],
            "optional": true,
            "transient": true
        }))
        .unwrap();
        assert_eq!(full.type_spec, Some(TypeSpec::list(TypeSpec::Number)));
        assert!(full.optional && full.transient && !full.immutable);
        assert!(matches!(full.default, Some(FieldDefault::Value(FieldValue::List(_)))));

        let untyped: FieldSpec = serde_json::from_value(json!({})).unwrap();
        assert_eq!(untyped.type_spec, None);
    }

    #[test]
    fn test_definition_preserves_field_order() {
        let def: ClassDefinition = serde_json::from_value(json!({
            "name": "User",
            "parent": "Person",
            "fields": { "zeta": "String", "alpha": "Number", "mid": ["Date"] },
            "validators": {
                "zeta": "required",
                "alpha": [{ "type": "gte", "param": 0 }, "number"]
            },
            "indexes": { "zeta": { "unique": true } }
        }))
        .unwrap();

        let names: Vec<&str> = def.fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(def.parent.as_deref(), Some("Person"));
        assert_eq!(def.validators[0].1[0].kind, "required");
        assert_eq!(def.validators[1].1.len(), 2);
        assert!(def.extra("indexes").is_some());
    }

    #[test]
    fn test_duplicate_field_key_rejected() {
        let raw = r#"{ "name": "A", "fields": { "x": "String", "x": "Number" } }"#;
        assert!(serde_json::from_str::<ClassDefinition>(raw).is_err());
    }

    #[test]
    fn test_builder_accumulates_validators() {
        let def = ClassDefinition::new("A")
            .field("x", FieldSpec::typed(TypeSpec::String))
            .validator("x", ValidatorSpec::new("required"))
            .validator("x", ValidatorSpec::new("minLength").param(2));
        assert_eq!(def.validators.len(), 1);
        assert_eq!(def.validators[0].1.len(), 2);
    }
}
