//! Conditional resolution: discriminated unions and `$when` rules.
//!
//! Determines the effective schema for a node from the data being validated.
//! `$when` rules read a field of the *context* (the object enclosing the
//! node), while a discriminant is read off the node's *own* value:
//!
//! ```
//! use shape_guard::resolver::{Action, Condition, WhenRule};
//! use shape_guard::schema::{object, string};
//!
//! let account = object()
//!     .property("role", string())
//!     .property(
//!         "email",
//!         string()
//!             .optional()
//!             .when(WhenRule::new("role", Condition::eq("admin"), Action::Require)),
//!     );
//! # let _ = account;
//! ```

use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::constraint::ConstraintRef;
use crate::error::ValidationError;
use crate::schema::{SchemaNode, TypeTag};
use crate::value::{join_path, Value};

/// Selects a schema variant from the value of one property.
#[derive(Clone)]
pub struct Discriminant {
    property: String,
    mapping: Vec<(String, SchemaNode)>,
    default: Option<Box<SchemaNode>>,
}

impl Discriminant {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            mapping: Vec::new(),
            default: None,
        }
    }

    /// Map a discriminant value (as a string key) to a schema.
    pub fn variant(mut self, key: impl Into<String>, schema: SchemaNode) -> Self {
        let key = key.into();
        match self.mapping.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = schema,
            None => self.mapping.push((key, schema)),
        }
        self
    }

    /// Schema used when the discriminant value has no mapping.
    pub fn default_schema(mut self, schema: SchemaNode) -> Self {
        self.default = Some(Box::new(schema));
        self
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn keys(&self) -> Vec<&str> {
        self.mapping.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn variants(&self) -> &[(String, SchemaNode)] {
        &self.mapping
    }

    pub fn fallback(&self) -> Option<&SchemaNode> {
        self.default.as_deref()
    }

    fn lookup(&self, key: &str) -> Option<&SchemaNode> {
        self.mapping
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, schema)| schema)
            .or(self.default.as_deref())
    }
}

impl fmt::Debug for Discriminant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discriminant")
            .field("property", &self.property)
            .field("keys", &self.keys())
            .field("default", &self.default.is_some())
            .finish()
    }
}

type PredicateFn = dyn Fn(&Value, &Value) -> bool + Send + Sync;

/// Condition evaluated against one field of the context object.
#[derive(Clone)]
pub enum Condition {
    Equals(Value),
    In(Vec<Value>),
    Not(Box<Condition>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
    /// Field is a string matching the pattern.
    Matches(Regex),
    /// Field is a number within the inclusive bounds.
    Range { min: Option<f64>, max: Option<f64> },
    /// Field is present and not null.
    Exists,
    /// Receives the field value (null when absent) and the whole context.
    Predicate(Arc<PredicateFn>),
}

impl Condition {
    pub fn eq(value: impl Into<Value>) -> Self {
        Condition::Equals(value.into())
    }

    pub fn one_of(values: impl IntoIterator<Item = Value>) -> Self {
        Condition::In(values.into_iter().collect())
    }

    pub fn not(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Condition::Range { min, max }
    }

    /// # Errors
    ///
    /// Returns `regex::Error` if `pattern` is not a valid regular expression.
    pub fn matches(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Condition::Matches)
    }

    pub fn predicate<F>(check: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        Condition::Predicate(Arc::new(check))
    }

    /// Evaluate against `field` (the referenced property, if present) and
    /// the full context object.
    pub fn evaluate(&self, field: Option<&Value>, context: &Value) -> bool {
        let current = field.unwrap_or(&Value::Null);
        match self {
            Condition::Equals(expected) => current == expected,
            Condition::In(options) => options.contains(current),
            Condition::Not(inner) => !inner.evaluate(field, context),
            Condition::All(conditions) => conditions.iter().all(|c| c.evaluate(field, context)),
            Condition::Any(conditions) => conditions.iter().any(|c| c.evaluate(field, context)),
            Condition::Matches(regex) => current.as_str().is_some_and(|s| regex.is_match(s)),
            Condition::Range { min, max } => current.as_f64().is_some_and(|n| {
                min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi)
            }),
            Condition::Exists => !current.is_null(),
            Condition::Predicate(check) => check(current, context),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Equals(v) => write!(f, "Equals({:?})", v),
            Condition::In(vs) => write!(f, "In({:?})", vs),
            Condition::Not(c) => write!(f, "Not({:?})", c),
            Condition::All(cs) => write!(f, "All({:?})", cs),
            Condition::Any(cs) => write!(f, "Any({:?})", cs),
            Condition::Matches(r) => write!(f, "Matches({})", r.as_str()),
            Condition::Range { min, max } => write!(f, "Range({:?}..={:?})", min, max),
            Condition::Exists => write!(f, "Exists"),
            Condition::Predicate(_) => write!(f, "Predicate"),
        }
    }
}

/// Change applied to a schema node when a rule fires.
#[derive(Clone)]
pub enum Action {
    /// Clear optionality.
    Require,
    /// Set optionality.
    MakeOptional,
    /// Replace the declared type tag.
    ReplaceType(TypeTag),
    /// Append constraints after the declared ones.
    AddConstraints(Vec<ConstraintRef>),
    /// Replace the whole node.
    Replace(Box<SchemaNode>),
}

impl Action {
    fn apply(&self, node: &mut SchemaNode, pending: &mut VecDeque<WhenRule>) {
        match self {
            Action::Require => node.optional = false,
            Action::MakeOptional => node.optional = true,
            Action::ReplaceType(kind) => node.kind = kind.clone(),
            Action::AddConstraints(extra) => node.constraints.extend(extra.iter().cloned()),
            Action::Replace(replacement) => {
                *node = (**replacement).clone();
                // The replacement's own rules run after the remaining ones.
                pending.extend(node.when.drain(..));
            }
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Require => write!(f, "Require"),
            Action::MakeOptional => write!(f, "MakeOptional"),
            Action::ReplaceType(kind) => write!(f, "ReplaceType({:?})", kind),
            Action::AddConstraints(c) => write!(f, "AddConstraints({})", c.len()),
            Action::Replace(node) => write!(f, "Replace({:?})", node.kind()),
        }
    }
}

/// `$when` rule: if `condition` holds for `field`, apply `then`, otherwise
/// `otherwise` (when set).
#[derive(Clone, Debug)]
pub struct WhenRule {
    field: String,
    condition: Condition,
    then: Action,
    otherwise: Option<Action>,
}

impl WhenRule {
    /// `field` is a dotted path into the context object.
    pub fn new(field: impl Into<String>, condition: Condition, then: Action) -> Self {
        Self {
            field: field.into(),
            condition,
            then,
            otherwise: None,
        }
    }

    pub fn otherwise(mut self, action: Action) -> Self {
        self.otherwise = Some(action);
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn then_action(&self) -> &Action {
        &self.then
    }

    pub fn else_action(&self) -> Option<&Action> {
        self.otherwise.as_ref()
    }

    fn select(&self, context: &Value) -> Option<&Action> {
        let field = context.at_path(&self.field);
        if self.condition.evaluate(field, context) {
            Some(&self.then)
        } else {
            self.otherwise.as_ref()
        }
    }
}

/// Effective schema for one node.
pub struct Resolution<'a> {
    pub schema: Cow<'a, SchemaNode>,
    pub errors: Vec<ValidationError>,
    /// Discriminant properties consulted on the way. They count as declared
    /// for unknown-property policies.
    pub discriminant_keys: Vec<String>,
}

/// Apply `$when` rules against `context`, in declaration order.
///
/// The returned node carries no rules, so applying again is a no-op.
pub fn apply_when<'a>(schema: Cow<'a, SchemaNode>, context: &Value) -> Cow<'a, SchemaNode> {
    if schema.when.is_empty() {
        return schema;
    }
    let mut node = schema.into_owned();
    let mut pending: VecDeque<WhenRule> = node.when.drain(..).collect();
    while let Some(rule) = pending.pop_front() {
        if let Some(action) = rule.select(context) {
            action.apply(&mut node, &mut pending);
        }
    }
    Cow::Owned(node)
}

/// Follow discriminant mappings using the node's own `value`.
///
/// Mapped schemas may themselves be discriminated; their `$when` rules are
/// evaluated against `value` as well.
///
/// # Errors
///
/// Returns one error at `<path>.<property>` if a discriminant value has no
/// mapping and no default.
pub fn resolve_discriminant<'a>(
    schema: Cow<'a, SchemaNode>,
    value: &Value,
    path: &str,
) -> Result<(Cow<'a, SchemaNode>, Vec<String>), Vec<ValidationError>> {
    let mut current = schema;
    let mut keys = Vec::new();

    while current.discriminant.is_some() {
        let next = {
            let Some(config) = current.discriminant.as_ref() else {
                break;
            };
            let found = value.get(&config.property).unwrap_or(&Value::Null);
            let key = found.to_key();
            if config.lookup(&key).is_none() {
                tracing::debug!(path, property = %config.property, key = %key, "unknown discriminant");
                return Err(vec![ValidationError::new(
                    join_path(path, &config.property),
                    format!("Unknown discriminant value: {}", key),
                    config.keys().join(", "),
                    found.type_name(),
                    Some(found.clone()),
                )]);
            }
            if !keys.contains(&config.property) {
                keys.push(config.property.clone());
            }
            key
        };

        let (mapped, found) = match current {
            Cow::Borrowed(node) => {
                match node.discriminant.as_ref().and_then(|c| c.lookup(&next)) {
                    Some(mapped) => (Cow::Borrowed(mapped), true),
                    None => (Cow::Borrowed(node), false),
                }
            }
            Cow::Owned(node) => {
                let mapped = node
                    .discriminant
                    .as_ref()
                    .and_then(|c| c.lookup(&next))
                    .cloned();
                match mapped {
                    Some(mapped) => (Cow::Owned(mapped), true),
                    None => (Cow::Owned(node), false),
                }
            }
        };
        if !found {
            current = mapped;
            break;
        }
        current = apply_when(mapped, value);
    }

    Ok((current, keys))
}

/// Resolve the effective schema for `value`.
///
/// `$when` rules read from `context` (the enclosing object); the
/// discriminant is read from `value` itself.
pub fn resolve<'a>(
    schema: &'a SchemaNode,
    context: &Value,
    value: &Value,
    path: &str,
) -> Resolution<'a> {
    let applied = apply_when(Cow::Borrowed(schema), context);
    match resolve_discriminant(applied, value, path) {
        Ok((schema, discriminant_keys)) => Resolution {
            schema,
            errors: Vec::new(),
            discriminant_keys,
        },
        Err(errors) => Resolution {
            schema: Cow::Borrowed(schema),
            errors,
            discriminant_keys: Vec::new(),
        },
    }
}
