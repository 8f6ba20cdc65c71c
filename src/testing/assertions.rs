//! Composable response checks. Each returns a [`Verdict`]; a failure carries
//! every violation found, not just the first.

use serde_json::{Map, Value};

use crate::error::{ContractViolation, Violations};
use crate::http::CapturedResponse;

use super::schema::Schema;

pub type Verdict = Result<(), Violations>;

const MAX_RENDERED_VALUE: usize = 160;

pub fn expect_status(response: &CapturedResponse, expected: u16) -> Verdict {
    if response.status == expected {
        return Ok(());
    }
    Err(ContractViolation::new("status", expected.to_string(), response.status_line()).into())
}

/// Inclusive range check, e.g. `400..=499` for "any client error".
pub fn expect_status_in_range(response: &CapturedResponse, min: u16, max: u16) -> Verdict {
    if (min..=max).contains(&response.status) {
        return Ok(());
    }
    Err(ContractViolation::new(
        "status",
        format!("{min}..={max}"),
        response.status_line(),
    )
    .into())
}

pub fn expect_header_contains(response: &CapturedResponse, name: &str, needle: &str) -> Verdict {
    match response.header(name) {
        Some(value) if value.contains(needle) => Ok(()),
        Some(value) => Err(ContractViolation::new(
            format!("header {}", name.to_ascii_lowercase()),
            format!("containing {needle:?}"),
            format!("{value:?}"),
        )
        .into()),
        None => Err(ContractViolation::new(
            format!("header {}", name.to_ascii_lowercase()),
            format!("containing {needle:?}"),
            "absent",
        )
        .into()),
    }
}

/// Every listed field must be present; all missing ones are named together.
pub fn expect_has_fields(body: &Value, fields: &[&str]) -> Verdict {
    let object = require_object(body)?;
    let missing: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|field| !object.contains_key(*field))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    Err(ContractViolation::new(
        "fields",
        format!("present: {}", fields.join(", ")),
        format!("missing: {}", missing.join(", ")),
    )
    .into())
}

/// The object must carry exactly `fields`: missing and unexpected keys are
/// both reported.
pub fn expect_exact_fields(body: &Value, fields: &[&str]) -> Verdict {
    let object = require_object(body)?;
    let mut violations = expect_has_fields(body, fields)
        .err()
        .map(Violations::into_inner)
        .unwrap_or_default();

    let unexpected: Vec<&str> = object
        .keys()
        .map(String::as_str)
        .filter(|key| !fields.contains(key))
        .collect();
    if !unexpected.is_empty() {
        violations.push(ContractViolation::new(
            "fields",
            format!("only: {}", fields.join(", ")),
            format!("unexpected: {}", unexpected.join(", ")),
        ));
    }

    collect(violations)
}

/// Type-check every field of `schema`; missing required fields are reported
/// with actual type `missing`.
pub fn expect_field_types(body: &Value, schema: &Schema) -> Verdict {
    let object = require_object(body)?;
    collect(schema.type_violations(object, true))
}

/// Every key of `expected` must be present in `actual` with an equal value.
/// Nested objects are matched as subsets too; extra keys are ignored.
pub fn expect_subset_match(actual: &Value, expected: &Value) -> Verdict {
    let mut violations = Vec::new();
    subset_diff("", actual, expected, &mut violations);
    collect(violations)
}

/// Full structural equality, reporting each differing path.
pub fn expect_deep_equal(actual: &Value, expected: &Value) -> Verdict {
    let mut violations = Vec::new();
    deep_diff("", actual, expected, &mut violations);
    collect(violations)
}

pub fn expect_json_array(body: &Value) -> Result<&[Value], Violations> {
    body.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| ContractViolation::new("body", "array", describe(body)).into())
}

/// A list response that must carry at least one item, so per-item checks
/// are not vacuous.
pub fn expect_non_empty(items: &[Value]) -> Verdict {
    if items.is_empty() {
        return Err(ContractViolation::new("items", "non-empty", "0").into());
    }
    Ok(())
}

/// Apply `check` to every item, prefixing violations with the item index.
pub fn expect_each<F>(items: &[Value], check: F) -> Verdict
where
    F: Fn(&Value) -> Verdict,
{
    let violations = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            check(item).err().map(|failure| {
                failure
                    .into_inner()
                    .into_iter()
                    .map(move |violation| violation.nested_under(&format!("[{index}]")))
            })
        })
        .flatten()
        .collect();
    collect(violations)
}

/// Merge several verdicts into one, keeping every violation.
pub fn all<I>(verdicts: I) -> Verdict
where
    I: IntoIterator<Item = Verdict>,
{
    collect(
        verdicts
            .into_iter()
            .filter_map(Result::err)
            .flat_map(Violations::into_inner)
            .collect(),
    )
}

pub(crate) fn collect(violations: Vec<ContractViolation>) -> Verdict {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(Violations(violations))
    }
}

/// JSON type name of a value as it appears in diagnostics.
pub fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn render_value(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() <= MAX_RENDERED_VALUE {
        return rendered;
    }
    let truncated: String = rendered.chars().take(MAX_RENDERED_VALUE).collect();
    format!("{truncated}…")
}

fn require_object(body: &Value) -> Result<&Map<String, Value>, Violations> {
    body.as_object()
        .ok_or_else(|| ContractViolation::new("body", "object", describe(body)).into())
}

fn path_or_root(path: &str) -> String {
    if path.is_empty() {
        "body".to_string()
    } else {
        path.to_string()
    }
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Numbers compare by value so `7` equals `7.0`.
fn scalars_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => actual == expected,
    }
}

fn subset_diff(path: &str, actual: &Value, expected: &Value, out: &mut Vec<ContractViolation>) {
    match (actual, expected) {
        (Value::Object(actual_map), Value::Object(expected_map)) => {
            for (key, expected_value) in expected_map {
                let child = child_path(path, key);
                match actual_map.get(key) {
                    Some(actual_value) => subset_diff(&child, actual_value, expected_value, out),
                    None => out.push(ContractViolation::new(
                        child,
                        render_value(expected_value),
                        "missing",
                    )),
                }
            }
        }
        (Value::Array(actual_items), Value::Array(expected_items)) => {
            if actual_items.len() != expected_items.len() {
                out.push(length_violation(path, actual_items.len(), expected_items.len()));
                return;
            }
            for (index, (a, e)) in actual_items.iter().zip(expected_items).enumerate() {
                subset_diff(&format!("{path}[{index}]"), a, e, out);
            }
        }
        _ => {
            if !scalars_equal(actual, expected) {
                out.push(ContractViolation::new(
                    path_or_root(path),
                    render_value(expected),
                    render_value(actual),
                ));
            }
        }
    }
}

fn deep_diff(path: &str, actual: &Value, expected: &Value, out: &mut Vec<ContractViolation>) {
    match (actual, expected) {
        (Value::Object(actual_map), Value::Object(expected_map)) => {
            for (key, expected_value) in expected_map {
                let child = child_path(path, key);
                match actual_map.get(key) {
                    Some(actual_value) => deep_diff(&child, actual_value, expected_value, out),
                    None => out.push(ContractViolation::new(
                        child,
                        render_value(expected_value),
                        "missing",
                    )),
                }
            }
            for (key, actual_value) in actual_map {
                if !expected_map.contains_key(key) {
                    out.push(ContractViolation::new(
                        child_path(path, key),
                        "absent",
                        render_value(actual_value),
                    ));
                }
            }
        }
        (Value::Array(actual_items), Value::Array(expected_items)) => {
            if actual_items.len() != expected_items.len() {
                out.push(length_violation(path, actual_items.len(), expected_items.len()));
                return;
            }
            for (index, (a, e)) in actual_items.iter().zip(expected_items).enumerate() {
                deep_diff(&format!("{path}[{index}]"), a, e, out);
            }
        }
        _ => {
            if !scalars_equal(actual, expected) {
                out.push(ContractViolation::new(
                    path_or_root(path),
                    render_value(expected),
                    render_value(actual),
                ));
            }
        }
    }
}

fn length_violation(path: &str, actual: usize, expected: usize) -> ContractViolation {
    ContractViolation::new(
        format!("{} length", path_or_root(path)),
        expected.to_string(),
        actual.to_string(),
    )
}
