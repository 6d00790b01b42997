//! shape-guard
//!
//! Runtime validation of dynamic values against declarative schemas.
//!
//! A [`Session`] is configured once with a set of [`Plugin`]s and the
//! unknown-property policies. Binding a [`SchemaNode`] to it yields a
//! reusable validator that runs the prevalidation pipeline (transformers and
//! plugin rewrites), resolves discriminants and `$when` rules, and checks the
//! value tree, collecting every fault with a dotted path.
//!
//! # Example
//!
//! ```
//! use shape_guard::constraint::{max, min};
//! use shape_guard::resolver::{Action, Condition, WhenRule};
//! use shape_guard::schema::{number, object, string};
//! use shape_guard::{configure, SessionOptions, Value};
//! use serde_json::json;
//!
//! let account = object()
//!     .property("role", string())
//!     .property("age", number().constraint(min(18.0)).constraint(max(130.0)))
//!     .property(
//!         "email",
//!         string()
//!             .optional()
//!             .when(WhenRule::new("role", Condition::eq("admin"), Action::Require)),
//!     );
//!
//! let session = configure(SessionOptions::new()).unwrap();
//! let validator = session.validate(account);
//!
//! let result = validator.validate_blocking(&Value::from(json!({ "role": "admin", "age": 40 })));
//! assert!(!result.valid);
//! assert_eq!(result.errors[0].path, "email");
//! assert_eq!(result.errors[0].message, "Missing required property");
//! ```
//!
//! # Error Paths
//!
//! | Location | Path |
//! |----------|------|
//! | Root value | `""` |
//! | Object property | `buyer.email` |
//! | Array element | `items.3.sku` |
//! | Unknown discriminant | `<node>.<discriminant property>` |

pub mod constraint;
mod error;
mod linter;
mod loader;
pub mod plugin;
mod prevalidate;
pub mod registry;
pub mod resolver;
pub mod schema;
mod session;
pub mod transform;
mod types;
mod validator;
mod value;

pub use error::{ConfigError, LoadError, TransformError, ValidationError};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{
    is_url, load_json, load_schema, load_schema_auto, load_schema_str, load_value, parse_document,
};
pub use plugin::{
    any_plugin, prevalidator_fn, Plugin, Prevalidator, TypeDescriptor, TypeHandle, TypeValidator,
    ANY_TYPE,
};
pub use prevalidate::prevalidate;
pub use schema::{SchemaNode, TypeTag};
pub use session::{configure, BoundValidator, Session, SessionOptions};
pub use types::{is_builtin_type, Primitive, TypeIssue, TypeOutcome, ValidationResult, BUILTIN_TYPES};
pub use validator::{validate_node, NodeOutcome};
pub use value::{join_path, Map, Native, PathSegment, Value};

#[cfg(feature = "remote")]
pub use loader::load_schema_url;
