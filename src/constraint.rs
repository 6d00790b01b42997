//! Constraints: predicates checked after a node's type check passes.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::error::ValidationError;
use crate::value::Value;

/// A predicate plus the message reported when it fails.
///
/// Constraints never rewrite the value. A constraint that does not apply to
/// the value's type should pass.
#[async_trait]
pub trait Constraint: Send + Sync {
    async fn check(&self, value: &Value) -> bool;

    fn message(&self, value: &Value) -> String;
}

pub type ConstraintRef = Arc<dyn Constraint>;

/// Run every constraint in declaration order and collect all failures.
pub async fn evaluate(
    value: &Value,
    constraints: &[ConstraintRef],
    path: &str,
    expected: &str,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for constraint in constraints {
        if !constraint.check(value).await {
            errors.push(ValidationError::new(
                path,
                constraint.message(value),
                expected,
                value.type_name(),
                Some(value.clone()),
            ));
        }
    }
    errors
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Date(d) => Some(d.timestamp_millis() as f64),
        _ => None,
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn fmt_bound(n: f64) -> String {
    Value::Number(n).to_string()
}

/// Lower bound for numbers (dates compare by epoch milliseconds).
#[derive(Debug, Clone)]
pub struct Min(pub f64);

#[async_trait]
impl Constraint for Min {
    async fn check(&self, value: &Value) -> bool {
        numeric(value).map_or(true, |n| n >= self.0)
    }

    fn message(&self, _value: &Value) -> String {
        format!("Must be greater than or equal to {}", fmt_bound(self.0))
    }
}

/// Upper bound for numbers (dates compare by epoch milliseconds).
#[derive(Debug, Clone)]
pub struct Max(pub f64);

#[async_trait]
impl Constraint for Max {
    async fn check(&self, value: &Value) -> bool {
        numeric(value).map_or(true, |n| n <= self.0)
    }

    fn message(&self, _value: &Value) -> String {
        format!("Must be less than or equal to {}", fmt_bound(self.0))
    }
}

/// Minimum length of a string (in chars) or an array.
#[derive(Debug, Clone)]
pub struct MinLength(pub usize);

#[async_trait]
impl Constraint for MinLength {
    async fn check(&self, value: &Value) -> bool {
        length(value).map_or(true, |len| len >= self.0)
    }

    fn message(&self, _value: &Value) -> String {
        format!("Length must be at least {}", self.0)
    }
}

/// Maximum length of a string (in chars) or an array.
#[derive(Debug, Clone)]
pub struct MaxLength(pub usize);

#[async_trait]
impl Constraint for MaxLength {
    async fn check(&self, value: &Value) -> bool {
        length(value).map_or(true, |len| len <= self.0)
    }

    fn message(&self, _value: &Value) -> String {
        format!("Length must be at most {}", self.0)
    }
}

/// String must match a regular expression.
#[derive(Debug, Clone)]
pub struct Pattern(pub Regex);

#[async_trait]
impl Constraint for Pattern {
    async fn check(&self, value: &Value) -> bool {
        value.as_str().map_or(true, |s| self.0.is_match(s))
    }

    fn message(&self, _value: &Value) -> String {
        format!("Must match pattern {}", self.0.as_str())
    }
}

/// Value must equal one of the listed values.
#[derive(Debug, Clone)]
pub struct OneOf(pub Vec<Value>);

#[async_trait]
impl Constraint for OneOf {
    async fn check(&self, value: &Value) -> bool {
        self.0.contains(value)
    }

    fn message(&self, _value: &Value) -> String {
        let allowed: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        format!("Must be one of: {}", allowed.join(", "))
    }
}

/// Number must have no fractional part.
#[derive(Debug, Clone)]
pub struct Integer;

#[async_trait]
impl Constraint for Integer {
    async fn check(&self, value: &Value) -> bool {
        value.as_f64().map_or(true, |n| n.fract() == 0.0)
    }

    fn message(&self, _value: &Value) -> String {
        "Must be an integer".to_string()
    }
}

type CheckFn = dyn Fn(&Value) -> bool + Send + Sync;
type MessageFn = dyn Fn(&Value) -> String + Send + Sync;

/// User-supplied synchronous predicate.
pub struct Predicate {
    check: Box<CheckFn>,
    message: Box<MessageFn>,
}

#[async_trait]
impl Constraint for Predicate {
    async fn check(&self, value: &Value) -> bool {
        (self.check)(value)
    }

    fn message(&self, value: &Value) -> String {
        (self.message)(value)
    }
}

pub fn min(n: f64) -> Min {
    Min(n)
}

pub fn max(n: f64) -> Max {
    Max(n)
}

pub fn min_length(n: usize) -> MinLength {
    MinLength(n)
}

pub fn max_length(n: usize) -> MaxLength {
    MaxLength(n)
}

/// # Errors
///
/// Returns `regex::Error` if `pattern` is not a valid regular expression.
pub fn pattern(pattern: &str) -> Result<Pattern, regex::Error> {
    Regex::new(pattern).map(Pattern)
}

pub fn one_of(values: impl IntoIterator<Item = Value>) -> OneOf {
    OneOf(values.into_iter().collect())
}

pub fn integer() -> Integer {
    Integer
}

pub fn predicate<C, M>(check: C, message: M) -> Predicate
where
    C: Fn(&Value) -> bool + Send + Sync + 'static,
    M: Fn(&Value) -> String + Send + Sync + 'static,
{
    Predicate {
        check: Box::new(check),
        message: Box::new(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_every_failure_in_order() {
        let constraints: Vec<ConstraintRef> =
            vec![Arc::new(min(20.0)) as _, Arc::new(max(18.0)) as _];
        let errors = evaluate(&Value::Number(19.0), &constraints, "age", "Number").await;

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "Must be greater than or equal to 20");
        assert_eq!(errors[1].message, "Must be less than or equal to 18");
        assert!(errors.iter().all(|e| e.path == "age" && e.expected == "Number"));
    }

    #[tokio::test]
    async fn passing_constraints_yield_nothing() {
        let constraints: Vec<ConstraintRef> =
            vec![Arc::new(min(0.0)) as _, Arc::new(integer()) as _];
        assert!(evaluate(&Value::Number(3.0), &constraints, "n", "Number")
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn length_applies_to_strings_and_arrays() {
        assert!(min_length(2).check(&Value::from("ab")).await);
        assert!(!min_length(3).check(&Value::from("ab")).await);
        assert!(!max_length(1).check(&Value::Array(vec![Value::Null, Value::Null])).await);
        // Not applicable to numbers
        assert!(max_length(1).check(&Value::Number(100.0)).await);
    }

    #[tokio::test]
    async fn pattern_and_one_of() {
        let p = pattern(r"^\d{3}$").unwrap();
        assert!(p.check(&Value::from("123")).await);
        assert!(!p.check(&Value::from("12a")).await);
        assert!(pattern("(").is_err());

        let roles = one_of([Value::from("admin"), Value::from("user")]);
        assert!(roles.check(&Value::from("user")).await);
        assert!(!roles.check(&Value::from("root")).await);
        assert_eq!(roles.message(&Value::Null), "Must be one of: admin, user");
    }

    #[tokio::test]
    async fn predicate_uses_closures() {
        let even = predicate(
            |v| v.as_f64().map_or(false, |n| n % 2.0 == 0.0),
            |v| format!("{} is odd", v),
        );
        assert!(even.check(&Value::Number(4.0)).await);
        assert!(!even.check(&Value::Number(3.0)).await);
        assert_eq!(even.message(&Value::Number(3.0)), "3 is odd");
    }
}
