//! Dotted field paths
//!
//! `address.city` reads `city` of the document held by `address`;
//! `lines.2.sku` reads `sku` of the third element of `lines`.

use crate::schema::FieldValue;

/// Splits `a.b.c` into `("a", Some("b.c"))`
pub(crate) fn split_first(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

/// Resolves `path` below `value`
pub(crate) fn lookup<'a>(value: &'a FieldValue, path: &str) -> Option<&'a FieldValue> {
    let (segment, rest) = split_first(path);
    let next = match value {
        FieldValue::Document(doc) => doc.resolve(segment)?,
        FieldValue::List(items) => items.get(segment.parse::<usize>().ok()?)?,
        FieldValue::Map(entries) => entries.iter().find(|(k, _)| k == segment).map(|(_, v)| v)?,
        _ => return None,
    };
    match rest {
        Some(rest) => lookup(next, rest),
        None => Some(next),
    }
}
