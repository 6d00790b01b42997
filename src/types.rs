//! Core types shared by the validator, plugins and sessions.

use serde::Serialize;

use crate::error::ValidationError;
use crate::value::Value;

/// Built-in type tags. These can never be overridden by plugins.
pub const BUILTIN_TYPES: &[&str] = &["string", "number", "boolean", "date", "object", "array"];

/// Returns true if `name` is one of the built-in type tags.
pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

/// Built-in atomic (and object) type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Number,
    Boolean,
    Date,
    Object,
}

impl Primitive {
    /// Parse a tag name as written in schema documents.
    ///
    /// `"array"` is not a primitive; it needs an item schema.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Primitive::String),
            "number" => Some(Primitive::Number),
            "boolean" => Some(Primitive::Boolean),
            "date" => Some(Primitive::Date),
            "object" => Some(Primitive::Object),
            _ => None,
        }
    }

    /// Tag name as written in schema documents.
    pub fn tag(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
            Primitive::Date => "date",
            Primitive::Object => "object",
        }
    }

    /// Display name used for `expected` in errors.
    pub fn display_name(&self) -> &'static str {
        match self {
            Primitive::String => "String",
            Primitive::Number => "Number",
            Primitive::Boolean => "Boolean",
            Primitive::Date => "Date",
            Primitive::Object => "Object",
        }
    }

    /// Check the runtime type of `value` against this tag.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Primitive::String, Value::String(_)) => true,
            (Primitive::Number, Value::Number(n)) => !n.is_nan(),
            (Primitive::Boolean, Value::Bool(_)) => true,
            (Primitive::Date, Value::Date(_)) => true,
            (Primitive::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

/// Outcome of one validation call.
///
/// `data` is present iff `valid`; a failed result always carries at least
/// one error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ValidationResult {
    pub fn success(data: Value) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            data: Some(data),
        }
    }

    pub fn failure(errors: Vec<ValidationError>) -> Self {
        debug_assert!(!errors.is_empty());
        Self {
            valid: false,
            errors,
            data: None,
        }
    }

    /// Build from collected errors and the rebuilt data tree.
    pub(crate) fn from_parts(errors: Vec<ValidationError>, data: Value) -> Self {
        if errors.is_empty() {
            Self::success(data)
        } else {
            Self::failure(errors)
        }
    }

    /// First error, as consumed by transports that report a single fault.
    pub fn first_error(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    /// Convert into a `Result` carrying the data or the errors.
    pub fn into_result(self) -> Result<Value, Vec<ValidationError>> {
        match self.data {
            Some(data) if self.valid => Ok(data),
            _ => Err(self.errors),
        }
    }
}

/// A problem reported by a plugin type. The engine fills in the path and
/// the received type name.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeIssue {
    pub message: String,
    pub expected: Option<String>,
}

impl TypeIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
        }
    }

    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

/// What a plugin type's `validate` returns.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeOutcome {
    /// Value accepted as-is.
    Valid,
    /// Value accepted and replaced by a canonical representation.
    Canonical(Value),
    /// Value rejected.
    Invalid(Vec<TypeIssue>),
}

impl TypeOutcome {
    /// Shorthand for a rejection with one issue.
    pub fn invalid(message: impl Into<String>) -> Self {
        TypeOutcome::Invalid(vec![TypeIssue::new(message)])
    }
}

impl From<bool> for TypeOutcome {
    fn from(valid: bool) -> Self {
        if valid {
            TypeOutcome::Valid
        } else {
            TypeOutcome::Invalid(Vec::new())
        }
    }
}
