//! Prevalidation pipeline: rewrites a value tree before structural checks.

use futures::future::{BoxFuture, FutureExt};

use crate::error::TransformError;
use crate::plugin::Plugin;
use crate::schema::{SchemaNode, TypeTag};
use crate::transform;
use crate::types::Primitive;
use crate::value::{join_path, PathSegment, Value};

/// Rewrite `value` against `schema`, then recurse into array items and
/// declared object properties.
///
/// At each node the node's own transformers run first, then every plugin's
/// rewrite functions in declaration order, each seeing the previous output.
/// Undeclared object properties pass through untouched; absent declared
/// properties are not visited.
///
/// # Errors
///
/// Returns the first `TransformError`, anchored at the segments of the node
/// it came from; the rest of the tree is not visited.
pub fn prevalidate<'a>(
    schema: &'a SchemaNode,
    value: Value,
    path: String,
    plugins: &'a [Plugin],
) -> BoxFuture<'a, Result<Value, TransformError>> {
    walk(schema, value, path, Vec::new(), plugins)
}

fn walk<'a>(
    schema: &'a SchemaNode,
    value: Value,
    path: String,
    segments: Vec<PathSegment>,
    plugins: &'a [Plugin],
) -> BoxFuture<'a, Result<Value, TransformError>> {
    async move {
        let mut value = if value.is_null() {
            value
        } else {
            transform::apply(schema.transformers(), value, &path)
                .await
                .map_err(|e| e.anchored(&segments))?
        };

        for plugin in plugins {
            for rewrite in &plugin.prevalidate {
                value = rewrite
                    .rewrite(value, schema, &path)
                    .await
                    .map_err(|e| e.anchored(&segments))?;
            }
        }

        match (schema.kind(), value) {
            (TypeTag::ArrayOf(item), Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, element) in items.into_iter().enumerate() {
                    let element_path = join_path(&path, &index.to_string());
                    let mut element_segments = segments.clone();
                    element_segments.push(PathSegment::Index(index));
                    out.push(walk(item, element, element_path, element_segments, plugins).await?);
                }
                Ok(Value::Array(out))
            }
            (TypeTag::Primitive(Primitive::Object), Value::Object(mut map)) => {
                for (name, property) in schema.properties().unwrap_or_default() {
                    if let Some(current) = map.remove(name) {
                        let property_path = join_path(&path, name);
                        let mut property_segments = segments.clone();
                        property_segments.push(PathSegment::Key(name.clone()));
                        let rewritten =
                            walk(property, current, property_path, property_segments, plugins)
                                .await?;
                        map.insert(name.clone(), rewritten);
                    }
                }
                Ok(Value::Object(map))
            }
            (_, other) => Ok(other),
        }
    }
    .boxed()
}
