//! Plugins: custom type descriptors and prevalidation rewrites.
//!
//! A plugin bundles named [`TypeDescriptor`]s and ordered [`Prevalidator`]s.
//! Descriptors are created once and instantiated per validated node, so a
//! [`TypeValidator`] must not keep mutable state across calls.
//!
//! # Example
//!
//! ```
//! use shape_guard::{Plugin, TypeHandle, TypeOutcome, Value};
//!
//! let slug = TypeHandle::from_fn("slug", |value: &Value| {
//!     match value.as_str() {
//!         Some(s) => (!s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c == '-')).into(),
//!         None => TypeOutcome::invalid("Expected a slug string"),
//!     }
//! });
//!
//! let plugin = Plugin::new("content").version("1.0.0").with_type(slug);
//! assert_eq!(plugin.types[0].name(), "slug");
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransformError;
use crate::schema::SchemaNode;
use crate::session::Session;
use crate::types::TypeOutcome;
use crate::value::Value;

/// Name of the type supplied by [`any_plugin`].
pub const ANY_TYPE: &str = "any";

/// A named capability that produces validators for one custom type.
pub trait TypeDescriptor: Send + Sync {
    fn name(&self) -> &str;

    /// Create a validator for one node. Must be cheap and side-effect free.
    fn instantiate(&self) -> Box<dyn TypeValidator>;
}

/// Validator instance produced by a [`TypeDescriptor`].
#[async_trait]
pub trait TypeValidator: Send + Sync {
    async fn validate(&self, value: &Value, session: &Session) -> TypeOutcome;
}

/// Rewrite step run over the value tree before structural validation.
#[async_trait]
pub trait Prevalidator: Send + Sync {
    /// Receives the current (possibly already rewritten) value at `path`.
    async fn rewrite(
        &self,
        value: Value,
        schema: &SchemaNode,
        path: &str,
    ) -> Result<Value, TransformError>;
}

pub type PrevalidatorRef = Arc<dyn Prevalidator>;

/// Reference to a custom type from a schema node.
///
/// Either a concrete descriptor or a bare name bound lazily to whatever the
/// session registered under that name.
#[derive(Clone)]
pub struct TypeHandle {
    inner: HandleInner,
}

#[derive(Clone)]
enum HandleInner {
    Bound(Arc<dyn TypeDescriptor>),
    Named(Arc<str>),
}

impl TypeHandle {
    pub fn new(descriptor: impl TypeDescriptor + 'static) -> Self {
        Self::from_arc(Arc::new(descriptor))
    }

    pub fn from_arc(descriptor: Arc<dyn TypeDescriptor>) -> Self {
        Self {
            inner: HandleInner::Bound(descriptor),
        }
    }

    /// Reference a registered type by name only.
    pub fn named(name: &str) -> Self {
        Self {
            inner: HandleInner::Named(Arc::from(name)),
        }
    }

    /// Build a type from a synchronous check.
    pub fn from_fn<F>(name: &str, check: F) -> Self
    where
        F: Fn(&Value) -> TypeOutcome + Send + Sync + 'static,
    {
        Self::new(FnDescriptor {
            name: name.to_string(),
            check: Arc::new(check),
        })
    }

    pub fn name(&self) -> &str {
        match &self.inner {
            HandleInner::Bound(d) => d.name(),
            HandleInner::Named(name) => name,
        }
    }

    pub fn descriptor(&self) -> Option<&Arc<dyn TypeDescriptor>> {
        match &self.inner {
            HandleInner::Bound(d) => Some(d),
            HandleInner::Named(_) => None,
        }
    }

    /// True if both handles point at the same descriptor instance.
    pub fn same_identity(&self, other: &TypeHandle) -> bool {
        match (self.descriptor(), other.descriptor()) {
            (Some(a), Some(b)) => {
                std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
            }
            _ => false,
        }
    }

    /// Same logical type: identity first, then name.
    pub fn same_type(&self, other: &TypeHandle) -> bool {
        self.same_identity(other) || self.name() == other.name()
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            HandleInner::Bound(d) => write!(f, "TypeHandle({})", d.name()),
            HandleInner::Named(name) => write!(f, "TypeHandle(named {})", name),
        }
    }
}

type CheckFn = dyn Fn(&Value) -> TypeOutcome + Send + Sync;

struct FnDescriptor {
    name: String,
    check: Arc<CheckFn>,
}

impl TypeDescriptor for FnDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn instantiate(&self) -> Box<dyn TypeValidator> {
        Box::new(FnValidator {
            check: Arc::clone(&self.check),
        })
    }
}

struct FnValidator {
    check: Arc<CheckFn>,
}

#[async_trait]
impl TypeValidator for FnValidator {
    async fn validate(&self, value: &Value, _session: &Session) -> TypeOutcome {
        (self.check)(value)
    }
}

type RewriteFn = dyn Fn(Value, &SchemaNode, &str) -> Result<Value, TransformError> + Send + Sync;

struct FnPrevalidator {
    rewrite: Box<RewriteFn>,
}

#[async_trait]
impl Prevalidator for FnPrevalidator {
    async fn rewrite(
        &self,
        value: Value,
        schema: &SchemaNode,
        path: &str,
    ) -> Result<Value, TransformError> {
        (self.rewrite)(value, schema, path)
    }
}

/// Wrap a synchronous rewrite function as a [`Prevalidator`].
pub fn prevalidator_fn<F>(rewrite: F) -> PrevalidatorRef
where
    F: Fn(Value, &SchemaNode, &str) -> Result<Value, TransformError> + Send + Sync + 'static,
{
    Arc::new(FnPrevalidator {
        rewrite: Box::new(rewrite),
    })
}

/// A named bundle of custom types and prevalidation rewrites.
#[derive(Clone)]
pub struct Plugin {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub types: Vec<TypeHandle>,
    pub prevalidate: Vec<PrevalidatorRef>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            version: None,
            types: Vec::new(),
            prevalidate: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_type(mut self, handle: TypeHandle) -> Self {
        self.types.push(handle);
        self
    }

    pub fn with_prevalidator(mut self, prevalidator: PrevalidatorRef) -> Self {
        self.prevalidate.push(prevalidator);
        self
    }

    /// True if this plugin declares a type named `name`.
    pub fn provides(&self, name: &str) -> bool {
        self.types.iter().any(|t| t.name() == name)
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("types", &self.types)
            .field("prevalidate", &self.prevalidate.len())
            .finish()
    }
}

/// Plugin supplying the `any` type, which accepts every value.
pub fn any_plugin() -> Plugin {
    Plugin::new("default")
        .description("Types available in every session")
        .with_type(TypeHandle::from_fn(ANY_TYPE, |_| TypeOutcome::Valid))
}
