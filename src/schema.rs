//! Schema nodes: recursive descriptions of expected value shapes.
//!
//! Nodes are built with the free functions in this module and chained
//! modifiers, then shared read-only across validation calls:
//!
//! ```
//! use shape_guard::schema::{array_of, number, object, string};
//!
//! let user = object()
//!     .property("name", string())
//!     .property("age", number().optional())
//!     .property("tags", array_of(string()).optional());
//!
//! assert_eq!(user.property_schema("age").map(|s| s.is_optional()), Some(true));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::constraint::{Constraint, ConstraintRef};
use crate::plugin::TypeHandle;
use crate::resolver::{Discriminant, WhenRule};
use crate::transform::{Transformer, TransformerRef};
use crate::types::Primitive;
use crate::value::PathSegment;

/// The type tag of a schema node.
#[derive(Clone)]
pub enum TypeTag {
    Primitive(Primitive),
    ArrayOf(Box<SchemaNode>),
    Custom(TypeHandle),
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Primitive(p) => write!(f, "{}", p.tag()),
            TypeTag::ArrayOf(item) => write!(f, "array<{:?}>", item.kind),
            TypeTag::Custom(handle) => write!(f, "custom<{}>", handle.name()),
        }
    }
}

/// Recursive description of an expected shape.
#[derive(Clone)]
pub struct SchemaNode {
    pub(crate) kind: TypeTag,
    pub(crate) optional: bool,
    pub(crate) read_only: bool,
    /// `None` means a free-form object: unknown-property policies do not apply.
    pub(crate) properties: Option<Vec<(String, SchemaNode)>>,
    pub(crate) constraints: Vec<ConstraintRef>,
    pub(crate) transformers: Vec<TransformerRef>,
    pub(crate) discriminant: Option<Discriminant>,
    pub(crate) when: Vec<WhenRule>,
}

pub fn string() -> SchemaNode {
    SchemaNode::new(TypeTag::Primitive(Primitive::String))
}

pub fn number() -> SchemaNode {
    SchemaNode::new(TypeTag::Primitive(Primitive::Number))
}

pub fn boolean() -> SchemaNode {
    SchemaNode::new(TypeTag::Primitive(Primitive::Boolean))
}

pub fn date() -> SchemaNode {
    SchemaNode::new(TypeTag::Primitive(Primitive::Date))
}

/// A free-form object; declaring a property makes it a structured one.
pub fn object() -> SchemaNode {
    SchemaNode::new(TypeTag::Primitive(Primitive::Object))
}

pub fn array_of(item: SchemaNode) -> SchemaNode {
    SchemaNode::new(TypeTag::ArrayOf(Box::new(item)))
}

pub fn custom(handle: TypeHandle) -> SchemaNode {
    SchemaNode::new(TypeTag::Custom(handle))
}

impl SchemaNode {
    pub fn new(kind: TypeTag) -> Self {
        Self {
            kind,
            optional: false,
            read_only: false,
            properties: None,
            constraints: Vec::new(),
            transformers: Vec::new(),
            discriminant: None,
            when: Vec::new(),
        }
    }

    // --- Builder ---

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.optional = false;
        self
    }

    /// Marks the node read-only. Has no effect on validation.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Declare (or replace) a property. Declaration order is kept.
    pub fn property(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        let name = name.into();
        let props = self.properties.get_or_insert_with(Vec::new);
        match props.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = node,
            None => props.push((name, node)),
        }
        self
    }

    /// Declare an object with no properties, so every key counts as unknown.
    pub fn closed(mut self) -> Self {
        self.properties.get_or_insert_with(Vec::new);
        self
    }

    pub fn constraint(mut self, constraint: impl Constraint + 'static) -> Self {
        self.constraints.push(Arc::new(constraint));
        self
    }

    pub fn constraint_ref(mut self, constraint: ConstraintRef) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn transform(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformers.push(Arc::new(transformer));
        self
    }

    pub fn transform_ref(mut self, transformer: TransformerRef) -> Self {
        self.transformers.push(transformer);
        self
    }

    pub fn discriminant(mut self, discriminant: Discriminant) -> Self {
        self.discriminant = Some(discriminant);
        self
    }

    pub fn when(mut self, rule: WhenRule) -> Self {
        self.when.push(rule);
        self
    }

    // --- Accessors ---

    pub fn kind(&self) -> &TypeTag {
        &self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Declared properties in declaration order; `None` for non-structured nodes.
    pub fn properties(&self) -> Option<&[(String, SchemaNode)]> {
        self.properties.as_deref()
    }

    pub fn property_schema(&self, name: &str) -> Option<&SchemaNode> {
        self.properties
            .as_ref()?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    pub fn constraints(&self) -> &[ConstraintRef] {
        &self.constraints
    }

    pub fn transformers(&self) -> &[TransformerRef] {
        &self.transformers
    }

    pub fn discriminant_config(&self) -> Option<&Discriminant> {
        self.discriminant.as_ref()
    }

    pub fn when_rules(&self) -> &[WhenRule] {
        &self.when
    }

    /// True if the effective schema depends on the data being validated.
    pub fn has_conditionals(&self) -> bool {
        self.discriminant.is_some() || !self.when.is_empty()
    }

    /// Name used for `expected` in errors.
    pub fn display_name(&self) -> &str {
        match &self.kind {
            TypeTag::Primitive(p) => p.display_name(),
            TypeTag::ArrayOf(_) => "Array",
            TypeTag::Custom(handle) => handle.name(),
        }
    }

    /// Walk typed path segments through declared properties and array items.
    pub fn at_segments(&self, segments: &[PathSegment]) -> Option<&SchemaNode> {
        segments
            .iter()
            .try_fold(self, |current, segment| match (segment, &current.kind) {
                (PathSegment::Index(_), TypeTag::ArrayOf(item)) => Some(&**item),
                (PathSegment::Key(key), _) => current.property_schema(key),
                _ => None,
            })
    }
}

impl fmt::Debug for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("SchemaNode");
        out.field("kind", &self.kind)
            .field("optional", &self.optional)
            .field("read_only", &self.read_only);
        if let Some(props) = &self.properties {
            out.field("properties", props);
        }
        out.field("constraints", &self.constraints.len())
            .field("transformers", &self.transformers.len())
            .field("discriminant", &self.discriminant)
            .field("when", &self.when.len())
            .finish()
    }
}
