//! Transformers: typed value conversions run during prevalidation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::TransformError;
use crate::types::Primitive;
use crate::value::Value;

/// Converts a value of the `input` type into one of the `output` type.
///
/// Returning `Err(message)` aborts prevalidation; the pipeline attaches the
/// path.
#[async_trait]
pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    fn input(&self) -> Primitive;

    fn output(&self) -> Primitive;

    async fn transform(&self, value: Value) -> Result<Value, String>;
}

pub type TransformerRef = Arc<dyn Transformer>;

/// Apply a node's transformers in declaration order.
///
/// A transformer only runs when the current value has its input type, so
/// already-converted values pass through untouched.
///
/// # Errors
///
/// Returns `TransformError` at `path` if a transformer fails or produces a
/// value that is not of its declared output type.
pub async fn apply(
    transformers: &[TransformerRef],
    mut value: Value,
    path: &str,
) -> Result<Value, TransformError> {
    for transformer in transformers {
        if !transformer.input().matches(&value) {
            continue;
        }
        value = transformer
            .transform(value)
            .await
            .map_err(|message| TransformError::new(path, message))?;
        if !transformer.output().matches(&value) {
            return Err(TransformError::new(
                path,
                format!(
                    "Transformer {} produced {}, expected {}",
                    transformer.name(),
                    value.type_name(),
                    transformer.output().display_name()
                ),
            ));
        }
    }
    Ok(value)
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// `"2023-01-01"` → `Date`.
#[derive(Debug, Clone, Copy)]
pub struct StringToDate;

#[async_trait]
impl Transformer for StringToDate {
    fn name(&self) -> &str {
        "stringToDate"
    }

    fn input(&self) -> Primitive {
        Primitive::String
    }

    fn output(&self) -> Primitive {
        Primitive::Date
    }

    async fn transform(&self, value: Value) -> Result<Value, String> {
        let s = value.as_str().unwrap_or_default();
        parse_date(s)
            .map(Value::Date)
            .ok_or_else(|| format!("Cannot convert \"{}\" to Date", s))
    }
}

/// `"42"` → `42`.
#[derive(Debug, Clone, Copy)]
pub struct StringToNumber;

#[async_trait]
impl Transformer for StringToNumber {
    fn name(&self) -> &str {
        "stringToNumber"
    }

    fn input(&self) -> Primitive {
        Primitive::String
    }

    fn output(&self) -> Primitive {
        Primitive::Number
    }

    async fn transform(&self, value: Value) -> Result<Value, String> {
        let s = value.as_str().unwrap_or_default();
        s.trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::Number)
            .ok_or_else(|| format!("Cannot convert \"{}\" to Number", s))
    }
}

/// `42` → `"42"`.
#[derive(Debug, Clone, Copy)]
pub struct NumberToString;

#[async_trait]
impl Transformer for NumberToString {
    fn name(&self) -> &str {
        "numberToString"
    }

    fn input(&self) -> Primitive {
        Primitive::Number
    }

    fn output(&self) -> Primitive {
        Primitive::String
    }

    async fn transform(&self, value: Value) -> Result<Value, String> {
        Ok(Value::String(value.to_string()))
    }
}

/// Strips leading and trailing whitespace.
#[derive(Debug, Clone, Copy)]
pub struct Trim;

#[async_trait]
impl Transformer for Trim {
    fn name(&self) -> &str {
        "trim"
    }

    fn input(&self) -> Primitive {
        Primitive::String
    }

    fn output(&self) -> Primitive {
        Primitive::String
    }

    async fn transform(&self, value: Value) -> Result<Value, String> {
        Ok(Value::String(
            value.as_str().unwrap_or_default().trim().to_string(),
        ))
    }
}

pub fn string_to_date() -> StringToDate {
    StringToDate
}

pub fn string_to_number() -> StringToNumber {
    StringToNumber
}

pub fn number_to_string() -> NumberToString {
    NumberToString
}

pub fn trim() -> Trim {
    Trim
}

/// Look up a built-in transformer by the name used in schema documents.
pub fn builtin(name: &str) -> Option<TransformerRef> {
    match name {
        "stringToDate" => Some(Arc::new(StringToDate)),
        "stringToNumber" => Some(Arc::new(StringToNumber)),
        "numberToString" => Some(Arc::new(NumberToString)),
        "trim" => Some(Arc::new(Trim)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn string_to_date_accepts_plain_dates() {
        let out = apply(&[builtin("stringToDate").unwrap()], Value::from("2023-01-01"), "d")
            .await
            .unwrap();
        assert_eq!(
            out,
            Value::Date(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn string_to_date_accepts_rfc3339() {
        let out = StringToDate
            .transform(Value::from("2023-06-01T12:30:00+02:00"))
            .await
            .unwrap();
        assert_eq!(
            out,
            Value::Date(Utc.with_ymd_and_hms(2023, 6, 1, 10, 30, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn failure_carries_path() {
        let err = apply(&[builtin("stringToDate").unwrap()], Value::from("soon"), "born")
            .await
            .unwrap_err();
        assert_eq!(err.path, "born");
        assert_eq!(err.message, "Cannot convert \"soon\" to Date");
    }

    #[tokio::test]
    async fn skips_values_of_other_types() {
        let date = Value::Date(Utc.with_ymd_and_hms(2020, 5, 5, 0, 0, 0).unwrap());
        let out = apply(&[builtin("stringToDate").unwrap()], date.clone(), "d")
            .await
            .unwrap();
        assert_eq!(out, date);
    }

    #[tokio::test]
    async fn chains_in_order() {
        let chain = vec![builtin("trim").unwrap(), builtin("stringToNumber").unwrap()];
        let out = apply(&chain, Value::from("  42 "), "n").await.unwrap();
        assert_eq!(out, Value::Number(42.0));
    }

    struct Liar;

    #[async_trait]
    impl Transformer for Liar {
        fn name(&self) -> &str {
            "liar"
        }
        fn input(&self) -> Primitive {
            Primitive::String
        }
        fn output(&self) -> Primitive {
            Primitive::Number
        }
        async fn transform(&self, value: Value) -> Result<Value, String> {
            Ok(value)
        }
    }

    #[tokio::test]
    async fn output_type_is_enforced() {
        let err = apply(&[Arc::new(Liar) as TransformerRef], Value::from("x"), "p")
            .await
            .unwrap_err();
        assert_eq!(err.message, "Transformer liar produced String, expected Number");
    }

    #[test]
    fn unknown_builtin() {
        assert!(builtin("toUpper").is_none());
    }
}
