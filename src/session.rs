//! Validation sessions: a fixed plugin set and policy flags.
//!
//! ```
//! use shape_guard::schema::{number, object, string};
//! use shape_guard::{configure, SessionOptions, Value};
//! use serde_json::json;
//!
//! let session = configure(SessionOptions::new().strip_unknown_properties(true)).unwrap();
//! let validator = session.validate(object().property("name", string()).property("age", number()));
//!
//! let result = validator.validate_blocking(&Value::from(json!({
//!     "name": "Ada",
//!     "age": 36,
//!     "extra": true
//! })));
//! assert!(result.valid);
//! assert!(result.data.unwrap().get("extra").is_none());
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::Instrument;

use crate::error::{ConfigError, TransformError, ValidationError};
use crate::plugin::{any_plugin, Plugin, ANY_TYPE};
use crate::prevalidate::prevalidate;
use crate::registry::Registry;
use crate::schema::SchemaNode;
use crate::types::ValidationResult;
use crate::validator::validate_node;
use crate::value::Value;

/// Options for [`configure`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub plugins: Vec<Plugin>,
    /// Drop undeclared object keys from the output data.
    pub strip_unknown_properties: bool,
    /// Report one error per undeclared object key.
    pub error_unknown_properties: bool,
    /// Append the `any` type unless a plugin already provides it.
    pub default_types: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
            strip_unknown_properties: false,
            error_unknown_properties: false,
            default_types: true,
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn plugins(mut self, plugins: impl IntoIterator<Item = Plugin>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    pub fn strip_unknown_properties(mut self, strip: bool) -> Self {
        self.strip_unknown_properties = strip;
        self
    }

    pub fn error_unknown_properties(mut self, error: bool) -> Self {
        self.error_unknown_properties = error;
        self
    }

    pub fn default_types(mut self, enabled: bool) -> Self {
        self.default_types = enabled;
        self
    }
}

/// Build a session from options.
///
/// # Errors
///
/// Returns `ConfigError` if the plugin set violates the registration
/// contract (see [`Registry::register`]).
pub fn configure(options: SessionOptions) -> Result<Session, ConfigError> {
    let SessionOptions {
        mut plugins,
        strip_unknown_properties,
        error_unknown_properties,
        default_types,
    } = options;

    if default_types && !plugins.iter().any(|p| p.provides(ANY_TYPE)) {
        plugins.push(any_plugin());
    }
    let registry = Registry::register(&plugins)?;

    tracing::debug!(
        plugins = plugins.len(),
        types = registry.len(),
        strip_unknown_properties,
        error_unknown_properties,
        "session configured"
    );

    Ok(Session {
        inner: Arc::new(Inner {
            plugins,
            registry,
            strip_unknown_properties,
            error_unknown_properties,
        }),
    })
}

struct Inner {
    plugins: Vec<Plugin>,
    registry: Registry,
    strip_unknown_properties: bool,
    error_unknown_properties: bool,
}

/// A configured validation engine. Cheap to clone; safe to share across
/// threads and concurrent calls.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Bind `schema` to this session.
    pub fn validate(&self, schema: impl Into<Arc<SchemaNode>>) -> BoundValidator {
        BoundValidator {
            session: self.clone(),
            schema: schema.into(),
        }
    }

    /// Run structural validation only, without prevalidation.
    ///
    /// Composite plugin types use this to validate nested values.
    pub async fn check(&self, schema: &SchemaNode, value: &Value) -> ValidationResult {
        let outcome = validate_node(self, schema, value, String::new(), None).await;
        ValidationResult::from_parts(outcome.errors, outcome.data)
    }

    pub fn plugins(&self) -> &[Plugin] {
        &self.inner.plugins
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn strip_unknown_properties(&self) -> bool {
        self.inner.strip_unknown_properties
    }

    pub fn error_unknown_properties(&self) -> bool {
        self.inner.error_unknown_properties
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.inner.plugins.iter().map(|p| p.name.as_str()).collect();
        f.debug_struct("Session")
            .field("plugins", &names)
            .field("types", &self.inner.registry.type_names())
            .field("strip_unknown_properties", &self.inner.strip_unknown_properties)
            .field("error_unknown_properties", &self.inner.error_unknown_properties)
            .finish()
    }
}

/// A schema bound to a session. Reusable for any number of values.
#[derive(Clone, Debug)]
pub struct BoundValidator {
    session: Session,
    schema: Arc<SchemaNode>,
}

impl BoundValidator {
    pub fn schema(&self) -> &SchemaNode {
        &self.schema
    }

    /// Prevalidate, then validate. Never fails: data errors are in the result.
    pub async fn validate(&self, value: &Value) -> ValidationResult {
        let span = tracing::debug_span!("validate", schema = self.schema.display_name());
        self.run(value).instrument(span).await
    }

    /// Blocking form of [`validate`](Self::validate).
    pub fn validate_blocking(&self, value: &Value) -> ValidationResult {
        futures::executor::block_on(self.validate(value))
    }

    async fn run(&self, value: &Value) -> ValidationResult {
        let prepared = match prevalidate(
            &self.schema,
            value.clone(),
            String::new(),
            self.session.plugins(),
        )
        .await
        {
            Ok(prepared) => prepared,
            Err(err) => {
                tracing::debug!(path = %err.path, message = %err.message, "prevalidation aborted");
                return ValidationResult::failure(vec![self.transform_failure(err, value)]);
            }
        };

        let outcome = validate_node(&self.session, &self.schema, &prepared, String::new(), None).await;
        ValidationResult::from_parts(outcome.errors, outcome.data)
    }

    /// Back-fill `expected`/`received` from the schema and the original
    /// value at the node the error is anchored to.
    fn transform_failure(&self, err: TransformError, original: &Value) -> ValidationError {
        let expected = self
            .schema
            .at_segments(&err.segments)
            .map_or("unknown", |node| node.display_name())
            .to_string();
        let found = original.at_segments(&err.segments);
        ValidationError::new(
            err.path,
            err.message,
            expected,
            found.map_or("missing", |v| v.type_name()),
            found.cloned(),
        )
    }
}
