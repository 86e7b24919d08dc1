use std::collections::HashMap;

use axum::{
    Json,
    extract::{
        Path, Query,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use serde_json::Value;

use crate::{
    error::AppError,
    models::{ID, VERSION},
    query::Projection,
    store::Document,
};

/// Unwraps a JSON body into a document. Anything that is not a JSON object
/// is rejected along with the decoder's message.
pub fn get_document(body: Result<Json<Value>, JsonRejection>) -> Result<Document, AppError> {
    let Json(value) = body.map_err(|rejection| AppError::Payload(rejection.body_text()))?;

    match value {
        Value::Object(document) => Ok(document),
        other => Err(AppError::Payload(format!(
            "Expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

/// A path id that axum could not even decode is as malformed as any other.
pub fn get_id(path: Result<Path<String>, PathRejection>) -> Result<String, AppError> {
    let Path(id) = path.map_err(|_| AppError::InvalidIdentifier)?;
    Ok(id)
}

pub fn get_params(
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<HashMap<String, String>, AppError> {
    let Query(params) = query.map_err(|rejection| AppError::MalformedQuery(rejection.body_text()))?;
    Ok(params)
}

/// A single record as returned by get, update and delete.
pub fn shown(mut document: Document) -> Value {
    Projection::default().apply(&mut document);
    Value::Object(document)
}

/// Keys the client may never set directly.
pub fn strip_reserved(document: &mut Document) {
    document.remove(ID);
    document.remove(VERSION);
}

/// Overlays `patch` on top of `stored`, leaving unmentioned fields alone.
pub fn merge(stored: &Document, patch: &Document) -> Document {
    let mut merged = stored.clone();

    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }

    merged
}

/// The subset of `record` whose keys appear in `patch`.
pub fn pick(record: &Document, patch: &Document) -> Document {
    record
        .iter()
        .filter(|(key, _)| patch.contains_key(*key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// Longest leading integer, `parseInt` style: `"10abc"` is 10, `"abc"` is nothing.
/// Values past the `i64` range saturate.
pub fn leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let digits_start = usize::from(trimmed.starts_with(['+', '-']));

    let digits = trimmed[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();

    if digits == 0 {
        return None;
    }

    let saturated = if trimmed.starts_with('-') { i64::MIN } else { i64::MAX };

    Some(trimmed[..digits_start + digits].parse().unwrap_or(saturated))
}

/// Longest leading decimal, `parseFloat` style: `"12.5kg"` is 12.5.
pub fn leading_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start();
    let bytes = trimmed.as_bytes();

    let mut end = usize::from(trimmed.starts_with(['+', '-']));
    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent_end = end + 1;
        if matches!(bytes.get(exponent_end), Some(b'+' | b'-')) {
            exponent_end += 1;
        }

        let exponent_digits = count_digits(&bytes[exponent_end.min(bytes.len())..]);
        if exponent_digits > 0 {
            end = exponent_end + exponent_digits;
        }
    }

    trimmed[..end].parse().ok().filter(|n: &f64| n.is_finite())
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}
