//! Core validator: walks a value against its effective schema.

use std::borrow::Cow;

use futures::future::{BoxFuture, FutureExt};

use crate::constraint;
use crate::error::ValidationError;
use crate::registry::ResolvedType;
use crate::resolver::{apply_when, resolve_discriminant};
use crate::schema::SchemaNode;
use crate::session::Session;
use crate::types::{Primitive, TypeOutcome};
use crate::value::{join_path, Map, Value};

/// Errors collected for one node plus the rebuilt data for that node.
///
/// `data` is only meaningful when `errors` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutcome {
    pub errors: Vec<ValidationError>,
    pub data: Value,
}

impl NodeOutcome {
    fn ok(data: Value) -> Self {
        Self {
            errors: Vec::new(),
            data,
        }
    }

    fn failed(errors: Vec<ValidationError>, data: Value) -> Self {
        Self { errors, data }
    }
}

fn shape_error(path: &str, expected: &str, value: &Value) -> ValidationError {
    ValidationError::new(
        path,
        format!(
            "Expected type {}, but received {}",
            expected,
            value.type_name()
        ),
        expected,
        value.type_name(),
        Some(value.clone()),
    )
}

/// Validate `value` against `schema` at `path`.
///
/// `context` is the object enclosing `value`; `$when` rules read from it.
/// At the root there is no enclosing object and rules read from `value`.
/// Siblings are always visited, so every fault in the tree is reported.
pub fn validate_node<'a>(
    session: &'a Session,
    schema: &'a SchemaNode,
    value: &'a Value,
    path: String,
    context: Option<&'a Value>,
) -> BoxFuture<'a, NodeOutcome> {
    async move {
        tracing::trace!(path = %path, expected = schema.display_name(), "visit");

        let mut schema = Cow::Borrowed(schema);
        let mut implicit = Vec::new();
        if schema.has_conditionals() {
            schema = apply_when(schema, context.unwrap_or(value));
            if value.is_null() && schema.is_optional() {
                return NodeOutcome::ok(Value::Null);
            }
            match resolve_discriminant(schema, value, &path) {
                Ok((resolved, keys)) => {
                    schema = resolved;
                    implicit = keys;
                }
                Err(errors) => return NodeOutcome::failed(errors, value.clone()),
            }
        }

        if value.is_null() && schema.is_optional() {
            return NodeOutcome::ok(Value::Null);
        }

        match session.registry().resolve(schema.kind()) {
            ResolvedType::ArrayOf(item) => {
                validate_array(session, &schema, item, value, &path, context).await
            }
            ResolvedType::Custom(descriptor) => {
                let validator = descriptor.instantiate();
                let outcome = validator.validate(value, session).await;
                let data = match outcome {
                    TypeOutcome::Valid => value.clone(),
                    TypeOutcome::Canonical(canonical) => canonical,
                    TypeOutcome::Invalid(issues) => {
                        let name = descriptor.name();
                        let errors = if issues.is_empty() {
                            vec![shape_error(&path, name, value)]
                        } else {
                            issues
                                .into_iter()
                                .map(|issue| {
                                    ValidationError::new(
                                        path.as_str(),
                                        issue.message,
                                        issue.expected.unwrap_or_else(|| name.to_string()),
                                        value.type_name(),
                                        Some(value.clone()),
                                    )
                                })
                                .collect()
                        };
                        return NodeOutcome::failed(errors, value.clone());
                    }
                };
                let errors =
                    constraint::evaluate(&data, schema.constraints(), &path, schema.display_name())
                        .await;
                NodeOutcome::failed(errors, data)
            }
            ResolvedType::Unresolved => {
                tracing::debug!(
                    path = %path,
                    type_name = schema.display_name(),
                    "custom type not registered, treating as valid"
                );
                let errors = constraint::evaluate(
                    value,
                    schema.constraints(),
                    &path,
                    schema.display_name(),
                )
                .await;
                NodeOutcome::failed(errors, value.clone())
            }
            ResolvedType::Builtin(primitive) => {
                if !primitive.matches(value) {
                    return NodeOutcome::failed(
                        vec![shape_error(&path, primitive.display_name(), value)],
                        value.clone(),
                    );
                }
                let mut errors =
                    constraint::evaluate(value, schema.constraints(), &path, primitive.display_name())
                        .await;
                match (primitive, value) {
                    (Primitive::Object, Value::Object(map)) => {
                        let outcome =
                            validate_object(session, &schema, map, value, &path, &implicit).await;
                        errors.extend(outcome.errors);
                        NodeOutcome::failed(errors, outcome.data)
                    }
                    _ => NodeOutcome::failed(errors, value.clone()),
                }
            }
        }
    }
    .boxed()
}

async fn validate_array(
    session: &Session,
    schema: &SchemaNode,
    item: &SchemaNode,
    value: &Value,
    path: &str,
    context: Option<&Value>,
) -> NodeOutcome {
    let Value::Array(elements) = value else {
        return NodeOutcome::failed(vec![shape_error(path, "Array", value)], value.clone());
    };

    let mut errors = constraint::evaluate(value, schema.constraints(), path, "Array").await;
    let mut data = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        let element_path = join_path(path, &index.to_string());
        let outcome = validate_node(session, item, element, element_path, context).await;
        errors.extend(outcome.errors);
        data.push(outcome.data);
    }
    NodeOutcome::failed(errors, Value::Array(data))
}

async fn validate_object(
    session: &Session,
    schema: &SchemaNode,
    map: &Map,
    value: &Value,
    path: &str,
    implicit: &[String],
) -> NodeOutcome {
    let Some(properties) = schema.properties() else {
        return NodeOutcome::ok(value.clone());
    };

    let strip = session.strip_unknown_properties();
    let mut errors = Vec::new();
    let mut data: Map = if strip {
        map.iter()
            .filter(|(key, _)| implicit.contains(*key))
            .map(|(key, v)| (key.clone(), v.clone()))
            .collect()
    } else {
        map.clone()
    };

    for (name, property) in properties {
        let property_path = join_path(path, name);
        let property = apply_when(Cow::Borrowed(property), value);

        match map.get(name) {
            None | Some(Value::Null) if !property.is_optional() => {
                let received = if map.contains_key(name) { "null" } else { "missing" };
                errors.push(ValidationError::new(
                    property_path,
                    "Missing required property",
                    property.display_name(),
                    received,
                    map.get(name).cloned(),
                ));
            }
            None => {}
            Some(Value::Null) => {
                data.insert(name.clone(), Value::Null);
            }
            Some(current) => {
                let outcome =
                    validate_node(session, &property, current, property_path, Some(value)).await;
                errors.extend(outcome.errors);
                data.insert(name.clone(), outcome.data);
            }
        }
    }

    if session.error_unknown_properties() {
        for key in map.keys() {
            let declared = properties.iter().any(|(name, _)| name == key);
            if !declared && !implicit.contains(key) {
                errors.push(ValidationError::new(
                    join_path(path, key),
                    format!("Unexpected property found: {}", key),
                    "none",
                    map[key].type_name(),
                    Some(map[key].clone()),
                ));
            }
        }
    }

    NodeOutcome::failed(errors, Value::Object(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{max, min, ConstraintRef};
    use crate::plugin::{Plugin, TypeHandle};
    use crate::resolver::{Action, Condition, Discriminant, WhenRule};
    use crate::schema::{array_of, custom, number, object, string};
    use crate::session::{configure, SessionOptions};
    use crate::types::TypeIssue;
    use serde_json::json;

    fn session() -> Session {
        configure(SessionOptions::new()).unwrap()
    }

    async fn run(session: &Session, schema: &SchemaNode, value: serde_json::Value) -> NodeOutcome {
        let value = Value::from(value);
        validate_node(session, schema, &value, String::new(), None).await
    }

    // === Shape Tests ===

    #[tokio::test]
    async fn shape_mismatch_reports_display_names() {
        let schema = object().property("name", string());
        let out = run(&session(), &schema, json!({ "name": 5 })).await;
        assert_eq!(out.errors.len(), 1);
        let err = &out.errors[0];
        assert_eq!(err.path, "name");
        assert_eq!(err.message, "Expected type String, but received Number");
        assert_eq!(err.expected, "String");
        assert_eq!(err.received, "Number");
    }

    #[tokio::test]
    async fn non_array_for_array_schema() {
        let schema = object().property("tags", array_of(string()));
        let out = run(&session(), &schema, json!({ "tags": "a" })).await;
        assert_eq!(out.errors[0].message, "Expected type Array, but received String");
        assert_eq!(out.errors[0].expected, "Array");
    }

    #[tokio::test]
    async fn siblings_are_all_visited() {
        let schema = object()
            .property("a", string())
            .property("b", number())
            .property("items", array_of(number()));
        let out = run(&session(), &schema, json!({ "a": 1, "b": "x", "items": [1, "2", "3"] })).await;
        let paths: Vec<_> = out.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b", "items.1", "items.2"]);
    }

    // === Required Tests ===

    #[tokio::test]
    async fn missing_and_null_required() {
        let schema = object().property("a", string()).property("b", string());
        let out = run(&session(), &schema, json!({ "b": null })).await;
        assert_eq!(out.errors.len(), 2);
        assert!(out.errors.iter().all(|e| e.message == "Missing required property"));
        assert_eq!(out.errors[0].received, "missing");
        assert_eq!(out.errors[1].received, "null");
    }

    #[tokio::test]
    async fn optional_null_is_kept() {
        let schema = object().property("a", string().optional());
        let out = run(&session(), &schema, json!({ "a": null })).await;
        assert!(out.errors.is_empty());
        assert_eq!(out.data, Value::from(json!({ "a": null })));
    }

    // === Constraint Tests ===

    #[tokio::test]
    async fn constraints_skip_on_shape_error() {
        let schema = object().property("n", number().constraint(min(20.0)).constraint(max(18.0)));
        let out = run(&session(), &schema, json!({ "n": "x" })).await;
        assert_eq!(out.errors.len(), 1);

        let out = run(&session(), &schema, json!({ "n": 19 })).await;
        assert_eq!(out.errors.len(), 2);
    }

    // === Custom Type Tests ===

    #[tokio::test]
    async fn custom_issues_are_anchored_at_node() {
        let even = TypeHandle::from_fn("even", |v| match v.as_f64() {
            Some(n) if n % 2.0 == 0.0 => TypeOutcome::Valid,
            _ => TypeOutcome::Invalid(vec![TypeIssue::new("Must be even").expected("EvenNumber")]),
        });
        let session = configure(
            SessionOptions::new().plugin(Plugin::new("nums").with_type(even.clone())),
        )
        .unwrap();
        let schema = object().property("n", custom(even));
        let out = run(&session, &schema, json!({ "n": 3 })).await;
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].path, "n");
        assert_eq!(out.errors[0].expected, "EvenNumber");
        assert_eq!(out.errors[0].received, "Number");
    }

    #[tokio::test]
    async fn false_outcome_becomes_shape_error() {
        let never = TypeHandle::from_fn("never", |_| false.into());
        let session =
            configure(SessionOptions::new().plugin(Plugin::new("n").with_type(never.clone())))
                .unwrap();
        let out = run(&session, &custom(never), json!("x")).await;
        assert_eq!(out.errors[0].message, "Expected type never, but received String");
    }

    #[tokio::test]
    async fn unregistered_custom_type_is_valid() {
        let schema = custom(TypeHandle::named("unknown"));
        let out = run(&session(), &schema, json!({ "anything": 1 })).await;
        assert!(out.errors.is_empty());
    }

    // === Conditional Tests ===

    #[tokio::test]
    async fn unknown_discriminant_stops_subtree() {
        let schema = object().property(
            "shape",
            object().discriminant(
                Discriminant::new("type").variant("circle", object().property("radius", number())),
            ),
        );
        let out = run(&session(), &schema, json!({ "shape": { "type": "triangle", "radius": "x" } })).await;
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].path, "shape.type");
    }

    #[tokio::test]
    async fn when_rules_see_enclosing_object() {
        let schema = object().property("role", string()).property(
            "email",
            string()
                .optional()
                .when(WhenRule::new("role", Condition::eq("admin"), Action::Require)),
        );
        let out = run(&session(), &schema, json!({ "role": "admin" })).await;
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].path, "email");

        let out = run(&session(), &schema, json!({ "role": "user" })).await;
        assert!(out.errors.is_empty());
    }

    #[tokio::test]
    async fn array_elements_share_enclosing_context() {
        let schema = object().property("strict", string()).property(
            "items",
            array_of(number().when(WhenRule::new(
                "strict",
                Condition::eq("yes"),
                Action::AddConstraints(vec![std::sync::Arc::new(min(10.0)) as ConstraintRef]),
            ))),
        );
        let out = run(&session(), &schema, json!({ "strict": "yes", "items": [5, 50] })).await;
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].path, "items.0");
    }
}
