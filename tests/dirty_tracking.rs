//! Dirty Tracking Tests
//!
//! Invariants of document state:
//! - Reads resolve pending change, then persisted value, then default
//! - `_id` never changes once it holds a truthy value
//! - Persisted immutable fields refuse whole and dotted writes
//! - Setting the value a field already holds is a no-op only when truthy
//! - `modified(true)` reports the value a field had before the change
//! - Hydration selects the subclass named by `_type`

use std::sync::Arc;

use aerodoc::schema::{ClassDefinition, ClassRegistry, FieldSpec, FieldValue, TypeSpec, ID_FIELD};
use aerodoc::validation::ValidatorRegistry;
use aerodoc::{Document, DocumentError};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn registry() -> ClassRegistry {
    let registry = ClassRegistry::new(Arc::new(ValidatorRegistry::with_builtins()));
    registry
        .create_class(ClassDefinition::new("Address").field("city", FieldSpec::typed(TypeSpec::String)))
        .unwrap();
    registry
        .create_class(
            ClassDefinition::new("Person")
                .collection("people")
                .field("name", FieldSpec::typed(TypeSpec::String))
                .field("age", FieldSpec::typed(TypeSpec::Number).default(0))
                .field("active", FieldSpec::typed(TypeSpec::Boolean).default(false))
                .field("status", FieldSpec::typed(TypeSpec::String).default("draft"))
                .field("ssn", FieldSpec::typed(TypeSpec::String).optional().immutable())
                .field("session", FieldSpec::untyped().transient())
                .field("address", FieldSpec::typed(TypeSpec::class("Address")).optional())
                .field("birthplace", FieldSpec::typed(TypeSpec::class("Address")).optional().immutable()),
        )
        .unwrap();
    registry
        .create_class(ClassDefinition::new("Employee").extends("Person").field("badge", FieldSpec::typed(TypeSpec::Number)))
        .unwrap();
    registry
}

fn person(registry: &ClassRegistry) -> Document {
    Document::new(registry.get("Person").unwrap())
}

// =============================================================================
// Read Precedence Tests
// =============================================================================

#[test]
fn test_read_precedence() {
    let registry = registry();
    let mut doc = registry
        .hydrate("Person", &json!({ "_id": "p1", "name": "Ann" }))
        .unwrap();

    assert_eq!(doc.get("status"), Some(FieldValue::from("draft")));
    assert_eq!(doc.get("name"), Some(FieldValue::from("Ann")));

    doc.set("name", "Bea").unwrap();
    assert_eq!(doc.get("name"), Some(FieldValue::from("Bea")));
    assert_eq!(doc.values().get("name"), Some(&FieldValue::from("Ann")));
}

#[test]
fn test_unset_id_reads_as_none() {
    let registry = registry();
    let doc = person(&registry);
    assert_eq!(doc.get(ID_FIELD), None);
    assert_eq!(doc.id(), None);
}

#[test]
fn test_set_unknown_field_fails() {
    let registry = registry();
    let mut doc = person(&registry);
    let err = doc.set("nickname", "Annie").unwrap_err();
    assert_eq!(err.code(), "AERO_DOCUMENT_UNKNOWN_FIELD");
    assert!(!doc.is_modified());
}

// =============================================================================
// Identifier Tests
// =============================================================================

/// Once `_id` holds a value, later sets are ignored.
#[test]
fn test_id_immutable_once_set() {
    let registry = registry();
    let mut doc = person(&registry);

    doc.set(ID_FIELD, "a").unwrap();
    assert_eq!(doc.id(), Some("a"));
    doc.set(ID_FIELD, "b").unwrap();
    assert_eq!(doc.id(), Some("a"));

    let mut stored = registry.hydrate("Person", &json!({ "_id": "p1" })).unwrap();
    stored.set(ID_FIELD, "p2").unwrap();
    assert_eq!(stored.id(), Some("p1"));
    assert!(!stored.is_modified());
}

/// An empty `_id` does not lock the field.
#[test]
fn test_empty_id_does_not_lock() {
    let registry = registry();
    let mut doc = person(&registry);

    doc.set(ID_FIELD, "").unwrap();
    doc.set(ID_FIELD, "a").unwrap();
    assert_eq!(doc.id(), Some("a"));

    let mut blank = person(&registry);
    blank.set(ID_FIELD, "").unwrap();
    let id = blank.assign_id().unwrap();
    assert_eq!(id.len(), 32);
    assert_eq!(blank.id(), Some(id.as_str()));
}

#[test]
fn test_assign_id() {
    let registry = registry();
    let mut doc = person(&registry);
    let id = doc.assign_id().unwrap();
    assert_eq!(id.len(), 32);
    assert_eq!(doc.id(), Some(id.as_str()));
    assert_eq!(doc.assign_id().unwrap(), id);
}

// =============================================================================
// Set Suppression Tests
// =============================================================================

/// Re-setting a truthy value is a no-op.
#[test]
fn test_idempotent_set_is_noop() {
    let registry = registry();
    let mut doc = registry
        .hydrate("Person", &json!({ "name": "Ann", "age": 30 }))
        .unwrap();

    doc.set("name", "Ann").unwrap();
    doc.set("age", "30").unwrap();
    assert!(!doc.is_modified());
    assert!(doc.modified(false).is_empty());
}

/// Re-setting a falsy value is always recorded.
#[test]
fn test_falsy_values_always_recorded() {
    let registry = registry();
    let mut doc = registry
        .hydrate("Person", &json!({ "age": 0, "active": false }))
        .unwrap();

    doc.set("age", 0).unwrap();
    doc.set("active", false).unwrap();
    assert!(doc.is_field_modified("age"));
    assert!(doc.is_field_modified("active"));
}

/// Defaults take part in the comparison.
#[test]
fn test_default_value_suppresses_identical_set() {
    let registry = registry();
    let mut doc = person(&registry);
    doc.set("status", "draft").unwrap();
    assert!(!doc.is_field_modified("status"));
}

// =============================================================================
// Modified Tracking Tests
// =============================================================================

#[test]
fn test_modified_reports_old_values() {
    let registry = registry();
    let mut doc = registry.hydrate("Person", &json!({ "name": "Ann" })).unwrap();
    doc.set("name", "Bea").unwrap();
    doc.set("status", "live").unwrap();
    doc.set("ssn", "123").unwrap();

    let new = doc.modified(false);
    assert_eq!(new.get("status"), Some(&FieldValue::from("live")));

    let old = doc.modified(true);
    assert_eq!(old.get("name"), Some(&FieldValue::from("Ann")));
    assert_eq!(old.get("status"), Some(&FieldValue::from("draft")));
    assert_eq!(old.get("ssn"), Some(&FieldValue::Null));
    assert_eq!(old.len(), 3);
}

#[test]
fn test_commit_folds_changes() {
    let registry = registry();
    let mut doc = person(&registry);
    doc.set("name", "Ann").unwrap();
    doc.commit();

    assert!(!doc.is_modified());
    assert_eq!(doc.values().get("name"), Some(&FieldValue::from("Ann")));
    assert_eq!(doc.get("name"), Some(FieldValue::from("Ann")));
}

/// A nested write records the outer field as modified.
#[test]
fn test_nested_set_marks_outer_field() {
    let registry = registry();
    let mut doc = registry
        .hydrate("Person", &json!({ "address": { "city": "Oslo" } }))
        .unwrap();

    doc.set("address.city", "Bergen").unwrap();
    assert!(doc.is_field_modified("address"));
    assert_eq!(doc.get("address.city"), Some(FieldValue::from("Bergen")));

    let err = doc.set("name.first", "x").unwrap_err();
    assert!(matches!(err, DocumentError::NotADocument(_)));
}

// =============================================================================
// Immutable Field Tests
// =============================================================================

#[test]
fn test_immutable_field_locked_once_persisted() {
    let registry = registry();
    let mut fresh = person(&registry);
    fresh.set("ssn", "111").unwrap();
    fresh.set("ssn", "222").unwrap();
    assert_eq!(fresh.get("ssn"), Some(FieldValue::from("222")));

    fresh.commit();
    fresh.set("ssn", "333").unwrap();
    assert_eq!(fresh.get("ssn"), Some(FieldValue::from("222")));
    assert!(!fresh.is_modified());
}

/// Dotted writes below a persisted immutable field are refused too.
#[test]
fn test_immutable_field_locks_nested_paths() {
    let registry = registry();
    let mut doc = registry
        .hydrate("Person", &json!({ "birthplace": { "city": "Oslo" } }))
        .unwrap();

    doc.set("birthplace", FieldValue::from(json!({ "city": "Bergen" }))).unwrap();
    doc.set("birthplace.city", "Bergen").unwrap();
    assert_eq!(doc.get("birthplace.city"), Some(FieldValue::from("Oslo")));
    assert!(!doc.is_field_modified("birthplace"));

    let mut fresh = person(&registry);
    fresh.set("birthplace", FieldValue::from(json!({ "city": "Oslo" }))).unwrap();
    fresh.set("birthplace.city", "Bergen").unwrap();
    assert_eq!(fresh.get("birthplace.city"), Some(FieldValue::from("Bergen")));
}

// =============================================================================
// Hydration Tests
// =============================================================================

/// `_type` selects the subclass.
#[test]
fn test_hydrate_polymorphic() {
    let registry = registry();
    let doc = registry
        .hydrate("Person", &json!({ "_id": "e1", "_type": "Employee", "name": "Cy", "badge": "7" }))
        .unwrap();

    assert_eq!(doc.class_name(), "Employee");
    assert_eq!(doc.get("badge"), Some(FieldValue::Number(7.0)));
    assert!(!doc.is_modified());

    let plain = registry.hydrate("Person", &json!({ "name": "Di" })).unwrap();
    assert_eq!(plain.class_name(), "Person");
}

#[test]
fn test_hydrate_rejects_bad_input() {
    let registry = registry();

    let err = registry.hydrate("Employee", &json!({ "_type": "Person" })).unwrap_err();
    assert!(matches!(err, DocumentError::UnknownClass(ref n) if n == "Person"));

    let err = registry.hydrate("Ghost", &json!({})).unwrap_err();
    assert_eq!(err.code(), "AERO_DOCUMENT_UNKNOWN_CLASS");

    let err = registry.hydrate("Person", &json!([1, 2])).unwrap_err();
    assert_eq!(err.code(), "AERO_CAST_FAILED");

    let err = registry.hydrate("Person", &json!({ "age": "old" })).unwrap_err();
    assert!(matches!(err, DocumentError::Cast(ref e) if e.path == "age"));
}

// =============================================================================
// Persisted Shape Tests
// =============================================================================

#[test]
fn test_persisted_shape() {
    let registry = registry();
    let mut doc = person(&registry);
    doc.set("name", "Ann").unwrap();
    doc.set("session", "tok").unwrap();

    let persisted = doc.to_persisted();
    assert_eq!(persisted["name"], json!("Ann"));
    assert_eq!(persisted["age"], json!(0));
    assert!(persisted.get("session").is_none());
    assert!(persisted.get(ID_FIELD).is_none());
    assert_eq!(doc.get("session"), Some(FieldValue::from("tok")));
}

#[test]
fn test_collection_binding() {
    let registry = registry();
    assert_eq!(person(&registry).collection().unwrap(), "people");

    let employee = Document::new(registry.get("Employee").unwrap());
    assert_eq!(employee.collection().unwrap(), "people");

    let address = Document::new(registry.get("Address").unwrap());
    let err = address.collection().unwrap_err();
    assert_eq!(err.code(), "AERO_NO_COLLECTION");
}

#[test]
fn test_bulk_reads_and_writes() {
    let registry = registry();
    let doc = Document::with_attributes(
        registry.get("Person").unwrap(),
        [("name", FieldValue::from("Ann")), ("age", FieldValue::from("41"))],
    )
    .unwrap();

    let picked = doc.get_many(&["name", "age"]);
    assert_eq!(
        picked,
        vec![
            ("name".to_string(), FieldValue::from("Ann")),
            ("age".to_string(), FieldValue::Number(41.0)),
        ]
    );
    assert!(doc.get_all().iter().any(|(k, v)| k == "status" && *v == FieldValue::from("draft")));
}
