//! Built-in composition modules
//!
//! Registered by every `ClassRegistry`, in this order:
//! fields, validators, behaviors, events, methods.

mod behaviors;
mod events;
mod fields;
mod methods;
mod validators;

pub use behaviors::{BehaviorsModule, BEHAVIORS_MODULE};
pub use events::{EventsModule, EVENTS_MODULE};
pub use fields::{FieldsModule, FIELDS_MODULE};
pub use methods::{MethodsModule, METHODS_MODULE};
pub use validators::{ValidatorsModule, VALIDATORS_MODULE};

/// Parent entries in order, each own entry replacing the parent entry
/// with the same key in place or appended after them.
pub(crate) fn merge_keyed<V: Clone>(parent: &[(String, V)], own: &[(String, V)]) -> Vec<(String, V)> {
    let mut merged = parent.to_vec();
    for (key, value) in own {
        upsert(&mut merged, key, value.clone());
    }
    merged
}

/// Replaces the entry for `key` or appends a new one
pub(crate) fn upsert<V>(entries: &mut Vec<(String, V)>, key: &str, value: V) {
    match entries.iter_mut().find(|(k, _)| k == key) {
        Some((_, slot)) => *slot = value,
        None => entries.push((key.to_string(), value)),
    }
}
