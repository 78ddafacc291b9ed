//! Built-in validator kinds
//!
//! Every kind except `required` ignores absent values; a missing required
//! field is reported once by the type-level check instead.

use std::sync::OnceLock;

use regex::Regex;

use super::errors::ValidationFailure;
use super::registry::{ValidatorCall, ValidatorRegistry};
use crate::schema::FieldValue;

type Builtin = fn(&ValidatorCall<'_>) -> Vec<ValidationFailure>;

const BUILTINS: &[(&str, Builtin)] = &[
    ("required", required),
    ("string", string),
    ("number", number),
    ("boolean", boolean),
    ("date", date),
    ("minLength", min_length),
    ("maxLength", max_length),
    ("length", length),
    ("gte", gte),
    ("lte", lte),
    ("gt", gt),
    ("lt", lt),
    ("regexp", regexp),
    ("email", email),
    ("choice", choice),
    ("equalTo", equal_to),
];

pub(crate) fn install(registry: &mut ValidatorRegistry) {
    for (kind, func) in BUILTINS {
        // Fresh registry: kinds are unique
        let _ = registry.register(*kind, *func);
    }
}

fn pass() -> Vec<ValidationFailure> {
    Vec::new()
}

fn check(call: &ValidatorCall<'_>, ok: bool, default_message: impl FnOnce() -> String) -> Vec<ValidationFailure> {
    if ok {
        pass()
    } else {
        vec![call.fail(default_message())]
    }
}

fn required(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    check(call, call.present().is_some(), || {
        format!("\"{}\" is required", call.path)
    })
}

fn string(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    match call.present() {
        Some(v) => check(call, matches!(v, FieldValue::String(_)), || {
            format!("\"{}\" has to be a string", call.path)
        }),
        None => pass(),
    }
}

fn number(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    match call.present() {
        Some(v) => check(call, matches!(v, FieldValue::Number(n) if !n.is_nan()), || {
            format!("\"{}\" has to be a number", call.path)
        }),
        None => pass(),
    }
}

fn boolean(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    match call.present() {
        Some(v) => check(call, matches!(v, FieldValue::Bool(_)), || {
            format!("\"{}\" has to be a boolean", call.path)
        }),
        None => pass(),
    }
}

fn date(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    match call.present() {
        Some(v) => check(call, matches!(v, FieldValue::Date(_)), || {
            format!("\"{}\" has to be a date", call.path)
        }),
        None => pass(),
    }
}

/// Character count of strings, element count of lists
fn measure(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::String(s) => Some(s.chars().count() as f64),
        FieldValue::List(items) => Some(items.len() as f64),
        _ => None,
    }
}

/// Numbers as-is, dates as epoch milliseconds. Parameters always go
/// through this; measured values go through `extract`.
fn magnitude(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(n) => Some(*n),
        FieldValue::Date(d) => Some(d.timestamp_millis() as f64),
        _ => None,
    }
}

fn compare_with(
    call: &ValidatorCall<'_>,
    extract: fn(&FieldValue) -> Option<f64>,
    ok: fn(f64, f64) -> bool,
    describe: &str,
) -> Vec<ValidationFailure> {
    let Some(value) = call.present() else {
        return pass();
    };
    let Some(param) = call.param.and_then(magnitude) else {
        return vec![call.fail(format!(
            "\"{}\" validator {} has no usable parameter",
            call.path, call.kind
        ))];
    };
    match extract(value) {
        Some(actual) => check(call, ok(actual, param), || {
            format!("\"{}\" {} {}", call.path, describe, fmt_num(param))
        }),
        None => vec![call.fail(format!(
            "\"{}\" cannot be checked by {}",
            call.path, call.kind
        ))],
    }
}

fn min_length(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    compare_with(call, measure, |a, p| a >= p, "length has to be at least")
}

fn max_length(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    compare_with(call, measure, |a, p| a <= p, "length cannot exceed")
}

fn length(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    compare_with(call, measure, |a, p| a == p, "length has to be exactly")
}

fn gte(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    compare_with(call, magnitude, |a, p| a >= p, "has to be greater than or equal to")
}

fn lte(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    compare_with(call, magnitude, |a, p| a <= p, "has to be less than or equal to")
}

fn gt(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    compare_with(call, magnitude, |a, p| a > p, "has to be greater than")
}

fn lt(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    compare_with(call, magnitude, |a, p| a < p, "has to be less than")
}

fn regexp(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    let Some(value) = call.present() else {
        return pass();
    };
    let Some(pattern) = call.param.and_then(FieldValue::as_str) else {
        return vec![call.fail(format!("\"{}\" regexp validator has no pattern", call.path))];
    };
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            return vec![call.fail(format!(
                "\"{}\" regexp validator pattern is invalid: {}",
                call.path, e
            ))]
        }
    };
    let ok = value.as_str().map_or(false, |s| re.is_match(s));
    check(call, ok, || {
        format!("\"{}\" does not match the pattern {}", call.path, pattern)
    })
}

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").ok())
        .as_ref()
}

fn matches_email(value: &FieldValue) -> bool {
    match (value.as_str(), email_pattern()) {
        (Some(s), Some(re)) => re.is_match(s),
        _ => false,
    }
}

fn email(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    match call.present() {
        Some(v) => check(call, matches_email(v), || {
            format!("\"{}\" has to be a valid email address", call.path)
        }),
        None => pass(),
    }
}

fn choice(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    let Some(value) = call.present() else {
        return pass();
    };
    let options = call.param.and_then(FieldValue::as_list).unwrap_or(&[]);
    check(call, options.iter().any(|o| o == value), || {
        let listed: Vec<String> = options.iter().map(|o| o.to_string()).collect();
        format!("\"{}\" has to be one of: {}", call.path, listed.join(", "))
    })
}

fn equal_to(call: &ValidatorCall<'_>) -> Vec<ValidationFailure> {
    let Some(other) = call.param.and_then(FieldValue::as_str) else {
        return vec![call.fail(format!("\"{}\" equalTo validator has no field name", call.path))];
    };
    let expected = call.doc.get(other).filter(|v| !v.is_null());
    check(call, call.present().cloned() == expected, || {
        format!("\"{}\" has to be equal to \"{}\"", call.path, other)
    })
}

fn fmt_num(n: f64) -> String {
    FieldValue::Number(n).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::schema::{ClassDefinition, ClassRegistry, FieldSpec, TypeSpec};
    use std::sync::Arc;

    fn blank_doc() -> Document {
        let registry = ClassRegistry::new(Arc::new(ValidatorRegistry::with_builtins()));
        let schema = registry
            .create_class(
                ClassDefinition::new("Probe")
                    .field("a", FieldSpec::typed(TypeSpec::String))
                    .field("b", FieldSpec::typed(TypeSpec::String)),
            )
            .unwrap();
        Document::new(schema)
    }

    fn run(func: Builtin, value: Option<&FieldValue>, param: Option<&FieldValue>) -> Vec<ValidationFailure> {
        let doc = blank_doc();
        let call = ValidatorCall {
            doc: &doc,
            path: "f",
            field: "f",
            value,
            param,
            message: None,
            kind: "test",
        };
        func(&call)
    }

    #[test]
    fn test_required() {
        assert!(run(required, Some(&"x".into()), None).is_empty());
        assert_eq!(run(required, None, None).len(), 1);
        assert_eq!(run(required, Some(&FieldValue::Null), None).len(), 1);
    }

    #[test]
    fn test_length_bounds() {
        let value = FieldValue::from("abc");
        assert!(run(min_length, Some(&value), Some(&3.into())).is_empty());
        assert_eq!(run(min_length, Some(&value), Some(&4.into())).len(), 1);
        assert!(run(max_length, Some(&value), Some(&3.into())).is_empty());
        assert_eq!(run(max_length, Some(&value), Some(&2.into())).len(), 1);

        let list = FieldValue::from(vec![1, 2]);
        assert!(run(length, Some(&list), Some(&2.into())).is_empty());
    }

    #[test]
    fn test_absent_values_skipped() {
        assert!(run(min_length, None, Some(&4.into())).is_empty());
        assert!(run(email, None, None).is_empty());
        assert!(run(gte, Some(&FieldValue::Null), Some(&1.into())).is_empty());
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(run(gte, Some(&5.into()), Some(&5.into())).is_empty());
        assert_eq!(run(gt, Some(&5.into()), Some(&5.into())).len(), 1);
        assert!(run(lt, Some(&4.into()), Some(&5.into())).is_empty());
        assert_eq!(run(lte, Some(&6.into()), Some(&5.into())).len(), 1);
    }

    #[test]
    fn test_regexp_and_email() {
        assert!(run(regexp, Some(&"abc123".into()), Some(&"^[a-z]+\\d+$".into())).is_empty());
        assert_eq!(run(regexp, Some(&"123".into()), Some(&"^[a-z]+$".into())).len(), 1);
        assert_eq!(run(regexp, Some(&"x".into()), Some(&"(".into())).len(), 1);
        assert!(run(email, Some(&"a@example.com".into()), None).is_empty());
        assert_eq!(run(email, Some(&"not-an-email".into()), None).len(), 1);
    }

    #[test]
    fn test_choice() {
        let options = FieldValue::from(vec!["red", "green"]);
        assert!(run(choice, Some(&"red".into()), Some(&options)).is_empty());
        let failures = run(choice, Some(&"blue".into()), Some(&options));
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("red, green"));
    }

    #[test]
    fn test_message_template() {
        let doc = blank_doc();
        let call = ValidatorCall {
            doc: &doc,
            path: "name",
            field: "name",
            value: Some(&FieldValue::from("ab")),
            param: Some(&FieldValue::from(3)),
            message: Some("{field} needs {param} characters"),
            kind: "minLength",
        };
        let failures = min_length(&call);
        assert_eq!(failures[0].message, "name needs 3 characters");
        assert_eq!(failures[0].kind, "minLength");
    }
}
