//! Field type definitions
//!
//! Supported kinds:
//! - Boolean, Number, String, Date: primitives with permissive casting
//! - Object(class): nested instance of a registered class
//! - List(element): ordered sequence, each element cast independently
//!
//! Object and List-of-class types reference their class by name. The
//! reference is resolved on use through a weak handle to the class table,
//! so a class may refer to itself or to a class it is declared alongside.

use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

use super::class::Schema;
use super::errors::CastError;
use super::registry::ClassTable;
use super::value::FieldValue;
use crate::document::Document;
use crate::validation::ValidationFailure;

/// Name of the identifier field every class carries
pub const ID_FIELD: &str = "_id";

/// Name of the discriminator field every subclass carries
pub const TYPE_FIELD: &str = "_type";

/// Non-owning reference to a class by name
#[derive(Clone)]
pub struct ClassRef {
    name: String,
    classes: Weak<ClassTable>,
}

impl ClassRef {
    pub(crate) fn new(name: impl Into<String>, classes: Weak<ClassTable>) -> Self {
        Self {
            name: name.into(),
            classes,
        }
    }

    /// Referenced class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks the class up in its registry. `None` when the class is not
    /// registered (yet) or the registry is gone.
    pub fn resolve(&self) -> Option<Arc<Schema>> {
        Self::lookup(&self.classes, &self.name)
    }

    pub(crate) fn lookup(classes: &Weak<ClassTable>, name: &str) -> Option<Arc<Schema>> {
        let table = classes.upgrade()?;
        let guard = table.read().ok()?;
        guard.get(name).cloned()
    }

    pub(crate) fn table(&self) -> &Weak<ClassTable> {
        &self.classes
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClassRef").field(&self.name).finish()
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Caster and type-level validator for one field kind
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Boolean,
    Date,
    Number,
    String,
    Object(ClassRef),
    List(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> String {
        match self {
            TypeDescriptor::Boolean => "Boolean".into(),
            TypeDescriptor::Date => "Date".into(),
            TypeDescriptor::Number => "Number".into(),
            TypeDescriptor::String => "String".into(),
            TypeDescriptor::Object(class) => class.name().to_string(),
            TypeDescriptor::List(element) => format!("[{}]", element.type_name()),
        }
    }

    /// Class referenced by an Object type or a List of Object
    pub fn class_ref(&self) -> Option<&ClassRef> {
        match self {
            TypeDescriptor::Object(class) => Some(class),
            TypeDescriptor::List(element) => element.class_ref(),
            _ => None,
        }
    }

    /// Converts `raw` to this type's canonical representation.
    ///
    /// Null passes through untouched. `path` names the field in errors.
    pub fn cast(&self, raw: FieldValue, path: &str) -> Result<FieldValue, CastError> {
        if raw.is_null() {
            return Ok(raw);
        }

        match self {
            TypeDescriptor::Boolean => cast_boolean(raw, path),
            TypeDescriptor::Number => cast_number(raw, path),
            TypeDescriptor::String => cast_string(raw, path),
            TypeDescriptor::Date => cast_date(raw, path),
            TypeDescriptor::Object(class) => cast_object(class, raw, path),
            TypeDescriptor::List(element) => {
                let items = match raw {
                    FieldValue::List(items) => items,
                    other => return Err(self.mismatch(path, &other)),
                };
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| {
                        element
                            .cast(item, &format!("{}.{}", path, i))
                            .map_err(|e| e.at_index(i))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(FieldValue::List)
            }
        }
    }

    /// Type-level validation of a present value. Returns one failure per
    /// offending value (list elements are checked individually).
    pub fn validate(&self, path: &str, value: &FieldValue) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();
        self.validate_into(path, value, &mut failures);
        failures
    }

    fn validate_into(&self, path: &str, value: &FieldValue, failures: &mut Vec<ValidationFailure>) {
        let matches = match (self, value) {
            (TypeDescriptor::Boolean, FieldValue::Bool(_)) => true,
            (TypeDescriptor::Number, FieldValue::Number(n)) => !n.is_nan(),
            (TypeDescriptor::String, FieldValue::String(_)) => true,
            (TypeDescriptor::Date, FieldValue::Date(_)) => true,
            (TypeDescriptor::Object(class), FieldValue::Document(doc)) => {
                doc.schema().is_a(class.name())
            }
            (TypeDescriptor::List(element), FieldValue::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}.{}", path, i);
                    if item.is_null() {
                        failures.push(ValidationFailure::new(
                            &item_path,
                            "required",
                            format!("\"{}\" is required", item_path),
                        ));
                    } else {
                        element.validate_into(&item_path, item, failures);
                    }
                }
                true
            }
            _ => false,
        };

        if !matches {
            failures.push(ValidationFailure::new(
                path,
                "type",
                format!("\"{}\" has to be {}", path, self.article_name()),
            ));
        }
    }

    fn article_name(&self) -> String {
        match self {
            TypeDescriptor::Boolean => "a boolean".into(),
            TypeDescriptor::Date => "a date".into(),
            TypeDescriptor::Number => "a number".into(),
            TypeDescriptor::String => "a string".into(),
            TypeDescriptor::Object(class) => format!("an instance of {}", class.name()),
            TypeDescriptor::List(element) => format!("a list of {}", element.type_name()),
        }
    }

    fn mismatch(&self, path: &str, actual: &FieldValue) -> CastError {
        CastError::new(path, self.type_name(), actual.kind_name())
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

fn cast_boolean(raw: FieldValue, path: &str) -> Result<FieldValue, CastError> {
    match raw {
        FieldValue::Bool(_) => Ok(raw),
        FieldValue::Number(n) => Ok(FieldValue::Bool(n != 0.0 && !n.is_nan())),
        FieldValue::String(ref s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(FieldValue::Bool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(FieldValue::Bool(false)),
            _ => Err(CastError::new(path, "Boolean", raw.kind_name())),
        },
        other => Err(CastError::new(path, "Boolean", other.kind_name())),
    }
}

fn cast_number(raw: FieldValue, path: &str) -> Result<FieldValue, CastError> {
    match raw {
        FieldValue::Number(n) if !n.is_nan() => Ok(raw),
        FieldValue::Bool(b) => Ok(FieldValue::Number(if b { 1.0 } else { 0.0 })),
        FieldValue::Date(d) => Ok(FieldValue::Number(d.timestamp_millis() as f64)),
        FieldValue::String(ref s) => match s.trim().parse::<f64>() {
            Ok(n) if !n.is_nan() => Ok(FieldValue::Number(n)),
            _ => Err(CastError::new(path, "Number", raw.kind_name())),
        },
        other => Err(CastError::new(path, "Number", other.kind_name())),
    }
}

fn cast_string(raw: FieldValue, path: &str) -> Result<FieldValue, CastError> {
    match raw {
        FieldValue::String(_) => Ok(raw),
        FieldValue::Number(n) => Ok(FieldValue::String(format_number(n))),
        FieldValue::Bool(b) => Ok(FieldValue::String(b.to_string())),
        FieldValue::Date(d) => Ok(FieldValue::String(d.to_rfc3339())),
        other => Err(CastError::new(path, "String", other.kind_name())),
    }
}

fn cast_date(raw: FieldValue, path: &str) -> Result<FieldValue, CastError> {
    match raw {
        FieldValue::Date(_) => Ok(raw),
        FieldValue::Number(n) if n.is_finite() => Utc
            .timestamp_millis_opt(n as i64)
            .single()
            .map(FieldValue::Date)
            .ok_or_else(|| CastError::new(path, "Date", "number")),
        FieldValue::String(ref s) => parse_date(s)
            .map(FieldValue::Date)
            .ok_or_else(|| CastError::new(path, "Date", raw.kind_name())),
        other => Err(CastError::new(path, "Date", other.kind_name())),
    }
}

fn cast_object(class: &ClassRef, raw: FieldValue, path: &str) -> Result<FieldValue, CastError> {
    match raw {
        FieldValue::Document(ref doc) => {
            if doc.schema().is_a(class.name()) {
                Ok(raw)
            } else {
                Err(CastError::new(path, class.name(), doc.schema().name()))
            }
        }
        FieldValue::Map(attrs) => {
            let target = class
                .resolve()
                .ok_or_else(|| CastError::new(path, class.name(), "unresolved class"))?;
            let schema = polymorphic_target(class, target, &attrs, path)?;
            let doc = Document::from_mapping(schema, attrs).map_err(|e| e.prefixed(path))?;
            Ok(FieldValue::Document(Box::new(doc)))
        }
        other => Err(CastError::new(path, class.name(), other.kind_name())),
    }
}

/// Picks the subclass named by a mapping's `_type`, if any
fn polymorphic_target(
    class: &ClassRef,
    target: Arc<Schema>,
    attrs: &[(String, FieldValue)],
    path: &str,
) -> Result<Arc<Schema>, CastError> {
    let type_name = attrs
        .iter()
        .find(|(k, _)| k == TYPE_FIELD)
        .and_then(|(_, v)| v.as_str());

    match type_name {
        Some(name) if name != target.name() => {
            let sub = ClassRef::lookup(class.table(), name)
                .filter(|s| s.is_a(target.name()))
                .ok_or_else(|| CastError::new(path, target.name(), name))?;
            Ok(sub)
        }
        _ => Ok(target),
    }
}

/// Parses RFC 3339 or plain `YYYY-MM-DD[THH:MM:SS]` literals as UTC
pub(crate) fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&n));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| Utc.from_utc_datetime(&n))
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

/// Zero-argument default factory, evaluated per instance
pub type DefaultFactory = Arc<dyn Fn() -> FieldValue + Send + Sync>;

/// Field default: a static value or a per-instance factory
#[derive(Clone)]
pub enum FieldDefault {
    Value(FieldValue),
    Factory(DefaultFactory),
}

impl FieldDefault {
    /// Produces the raw (uncast) default
    pub fn produce(&self) -> FieldValue {
        match self {
            FieldDefault::Value(v) => v.clone(),
            FieldDefault::Factory(f) => f(),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::Value(v) => f.debug_tuple("Value").field(v).finish(),
            FieldDefault::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// One declared field
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    /// Untyped fields pass values through uncast
    pub field_type: Option<TypeDescriptor>,
    pub default: Option<FieldDefault>,
    /// Absent values skip validation
    pub optional: bool,
    /// Never validated, never persisted
    pub transient: bool,
    /// Cannot change once persisted
    pub immutable: bool,
}

impl FieldDefinition {
    /// Creates a required field with no default
    pub fn new(name: impl Into<String>, field_type: Option<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            field_type,
            default: None,
            optional: false,
            transient: false,
            immutable: false,
        }
    }

    /// `_id`: String, default null, optional
    pub(crate) fn id_field() -> Self {
        Self {
            default: Some(FieldDefault::Value(FieldValue::Null)),
            optional: true,
            ..Self::new(ID_FIELD, Some(TypeDescriptor::String))
        }
    }

    /// `_type`: String, defaults to the owning class name
    pub(crate) fn type_field(class_name: &str) -> Self {
        Self {
            default: Some(FieldDefault::Value(FieldValue::from(class_name))),
            optional: true,
            immutable: true,
            ..Self::new(TYPE_FIELD, Some(TypeDescriptor::String))
        }
    }

    /// Casts through this field's type (identity for untyped fields)
    pub fn cast(&self, raw: FieldValue, path: &str) -> Result<FieldValue, CastError> {
        match &self.field_type {
            Some(ty) => ty.cast(raw, path),
            None => Ok(raw),
        }
    }

    /// Resolves and casts the default. A default that fails to cast is
    /// treated as absent.
    pub fn default_value(&self) -> Option<FieldValue> {
        let raw = self.default.as_ref()?.produce();
        match self.cast(raw, &self.name) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(field = %self.name, error = %e, "Default value does not cast to field type");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(TypeDescriptor::Boolean.type_name(), "Boolean");
        assert_eq!(TypeDescriptor::Date.type_name(), "Date");
        assert_eq!(
            TypeDescriptor::List(Box::new(TypeDescriptor::Number)).type_name(),
            "[Number]"
        );
    }

    #[test]
    fn test_null_passes_through() {
        for ty in [
            TypeDescriptor::Boolean,
            TypeDescriptor::Number,
            TypeDescriptor::String,
            TypeDescriptor::Date,
        ] {
            assert_eq!(ty.cast(FieldValue::Null, "f").unwrap(), FieldValue::Null);
        }
    }

    #[test]
    fn test_number_cast() {
        let ty = TypeDescriptor::Number;
        assert_eq!(ty.cast("12.5".into(), "n").unwrap(), FieldValue::Number(12.5));
        assert_eq!(ty.cast(" 3 ".into(), "n").unwrap(), FieldValue::Number(3.0));
        assert_eq!(ty.cast(true.into(), "n").unwrap(), FieldValue::Number(1.0));
        let err = ty.cast("abc".into(), "n").unwrap_err();
        assert_eq!(err.expected, "Number");
        assert_eq!(err.actual, "string");
        assert!(ty.cast("".into(), "n").is_err());
    }

    #[test]
    fn test_boolean_cast() {
        let ty = TypeDescriptor::Boolean;
        assert_eq!(ty.cast("true".into(), "b").unwrap(), FieldValue::Bool(true));
        assert_eq!(ty.cast("0".into(), "b").unwrap(), FieldValue::Bool(false));
        assert_eq!(ty.cast(2.into(), "b").unwrap(), FieldValue::Bool(true));
        assert!(ty.cast("maybe".into(), "b").is_err());
        assert!(ty.cast(FieldValue::List(vec![]), "b").is_err());
    }

    #[test]
    fn test_string_cast() {
        let ty = TypeDescriptor::String;
        assert_eq!(ty.cast(3.into(), "s").unwrap(), FieldValue::from("3"));
        assert_eq!(ty.cast(1.5.into(), "s").unwrap(), FieldValue::from("1.5"));
        assert_eq!(ty.cast(false.into(), "s").unwrap(), FieldValue::from("false"));
        assert!(ty.cast(FieldValue::Map(vec![]), "s").is_err());
    }

    #[test]
    fn test_date_cast() {
        let ty = TypeDescriptor::Date;
        let parsed = ty.cast("2024-03-01".into(), "d").unwrap();
        let date = parsed.as_date().unwrap();
        assert_eq!(date.to_rfc3339(), "2024-03-01T00:00:00+00:00");

        let rfc = ty.cast("2024-03-01T10:00:00+02:00".into(), "d").unwrap();
        assert_eq!(rfc.as_date().unwrap().to_rfc3339(), "2024-03-01T08:00:00+00:00");

        let millis = ty.cast(0.into(), "d").unwrap();
        assert_eq!(millis.as_date().unwrap().timestamp(), 0);

        assert!(ty.cast("not a date".into(), "d").is_err());
    }

    #[test]
    fn test_list_cast_reports_failing_element() {
        let ty = TypeDescriptor::List(Box::new(TypeDescriptor::Number));
        let err = ty
            .cast(FieldValue::from(vec![FieldValue::from("1"), 2.into(), "x".into()]), "scores")
            .unwrap_err();
        assert_eq!(err.index, Some(2));
        assert_eq!(err.path, "scores.2");

        let ok = ty
            .cast(FieldValue::from(vec![FieldValue::from("1"), 2.into(), "3".into()]), "scores")
            .unwrap();
        assert_eq!(ok, FieldValue::from(vec![1, 2, 3]));
    }

    #[test]
    fn test_list_cast_rejects_scalar() {
        let ty = TypeDescriptor::List(Box::new(TypeDescriptor::String));
        let err = ty.cast("a".into(), "tags").unwrap_err();
        assert_eq!(err.expected, "[String]");
        assert_eq!(err.index, None);
    }

    #[test]
    fn test_type_level_validate() {
        assert!(TypeDescriptor::Number.validate("n", &3.into()).is_empty());
        let failures = TypeDescriptor::Number.validate("n", &"3".into());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, "type");

        let list = TypeDescriptor::List(Box::new(TypeDescriptor::String));
        let failures = list.validate(
            "tags",
            &FieldValue::List(vec!["a".into(), 1.into(), FieldValue::Null]),
        );
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].path, "tags.1");
        assert_eq!(failures[1].path, "tags.2");
        assert_eq!(failures[1].kind, "required");
    }

    #[test]
    fn test_id_field_shape() {
        let id = FieldDefinition::id_field();
        assert_eq!(id.name, ID_FIELD);
        assert_eq!(id.field_type, Some(TypeDescriptor::String));
        assert_eq!(id.default_value(), Some(FieldValue::Null));
        assert!(id.optional);
    }

    #[test]
    fn test_default_factory_evaluated_per_call() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let field = FieldDefinition {
            default: Some(FieldDefault::Factory(Arc::new(move || {
                FieldValue::from(c.fetch_add(1, Ordering::SeqCst) as i64)
            }))),
            ..FieldDefinition::new("seq", Some(TypeDescriptor::Number))
        };
        assert_eq!(field.default_value(), Some(FieldValue::Number(0.0)));
        assert_eq!(field.default_value(), Some(FieldValue::Number(1.0)));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_default_cast_through_type() {
        let field = FieldDefinition {
            default: Some(FieldDefault::Value("7".into())),
            ..FieldDefinition::new("n", Some(TypeDescriptor::Number))
        };
        assert_eq!(field.default_value(), Some(FieldValue::Number(7.0)));

        let bad = FieldDefinition {
            default: Some(FieldDefault::Value("x".into())),
            ..FieldDefinition::new("n", Some(TypeDescriptor::Number))
        };
        assert_eq!(bad.default_value(), None);
    }
}
