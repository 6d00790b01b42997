//! Schema documents: loading from files, strings, and HTTP URLs.
//!
//! A document is a JSON object describing one schema node:
//!
//! ```json
//! {
//!   "type": "object",
//!   "properties": {
//!     "age": { "type": "number", "constraints": [{ "min": 0 }] },
//!     "born": { "type": "date", "transform": ["stringToDate"] },
//!     "tags": { "type": "array", "items": { "type": "string" }, "optional": true }
//!   }
//! }
//! ```
//!
//! Type names other than the built-ins become name-only references to
//! plugin types. Errors carry the JSON Pointer of the offending node.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map as JsonMap, Value as Json};

use crate::constraint::{self, ConstraintRef};
use crate::error::LoadError;
use crate::plugin::TypeHandle;
use crate::resolver::{Action, Condition, Discriminant, WhenRule};
use crate::schema::{SchemaNode, TypeTag};
use crate::transform;
use crate::types::Primitive;
use crate::value::Value;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const NODE_KEYS: &[&str] = &[
    "type",
    "optional",
    "readOnly",
    "properties",
    "items",
    "constraints",
    "transform",
    "discriminant",
    "$when",
    "description",
    "title",
];

/// Read a JSON file without interpreting it.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Json, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a payload file as a [`Value`].
///
/// # Errors
///
/// Same as [`load_json`].
pub fn load_value(path: &Path) -> Result<Value, LoadError> {
    load_json(path).map(Value::from)
}

/// Load a schema document from a file path.
///
/// # Errors
///
/// Returns an I/O or JSON error from [`load_json`], or
/// `LoadError::InvalidDocument` if the JSON is not a valid schema document.
pub fn load_schema(path: &Path) -> Result<SchemaNode, LoadError> {
    parse_document(&load_json(path)?)
}

/// Load a schema document from a JSON string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` or `LoadError::InvalidDocument`.
pub fn load_schema_str(content: &str) -> Result<SchemaNode, LoadError> {
    let doc: Json =
        serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })?;
    parse_document(&doc)
}

/// Load a schema document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the response
/// isn't JSON, or `LoadError::InvalidDocument`.
#[cfg(feature = "remote")]
pub fn load_schema_url(url: &str) -> Result<SchemaNode, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    let doc: Json = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.json())
        .map_err(network)?;

    parse_document(&doc)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load from a URL or a file path, whichever `source` looks like.
///
/// # Errors
///
/// Returns `LoadError::RemoteDisabled` for URLs when built without the
/// `remote` feature; otherwise the errors of the underlying loader.
pub fn load_schema_auto(source: &str) -> Result<SchemaNode, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_schema_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::RemoteDisabled {
                url: source.to_string(),
            })
        }
    } else {
        load_schema(Path::new(source))
    }
}

/// Build a schema node from a parsed document.
///
/// # Errors
///
/// Returns `LoadError::InvalidDocument` with the JSON Pointer of the first
/// invalid node.
pub fn parse_document(doc: &Json) -> Result<SchemaNode, LoadError> {
    parse_node(doc, "")
}

/// Append `segment` to a JSON Pointer, escaping `~` and `/`.
pub(crate) fn pointer(parent: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        parent,
        segment.replace('~', "~0").replace('/', "~1")
    )
}

fn as_object<'a>(value: &'a Json, path: &str, what: &str) -> Result<&'a JsonMap<String, Json>, LoadError> {
    value
        .as_object()
        .ok_or_else(|| LoadError::document(path, format!("{} must be an object", what)))
}

fn as_array<'a>(value: &'a Json, path: &str, what: &str) -> Result<&'a Vec<Json>, LoadError> {
    value
        .as_array()
        .ok_or_else(|| LoadError::document(path, format!("{} must be an array", what)))
}

fn as_number(value: &Json, path: &str, what: &str) -> Result<f64, LoadError> {
    value
        .as_f64()
        .ok_or_else(|| LoadError::document(path, format!("{} must be a number", what)))
}

fn as_length(value: &Json, path: &str, what: &str) -> Result<usize, LoadError> {
    value
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| LoadError::document(path, format!("{} must be a non-negative integer", what)))
}

fn parse_node(doc: &Json, path: &str) -> Result<SchemaNode, LoadError> {
    let map = as_object(doc, path, "schema node")?;

    if let Some(key) = map.keys().find(|k| !NODE_KEYS.contains(&k.as_str())) {
        return Err(LoadError::document(
            &pointer(path, key),
            format!("unknown schema keyword: {}", key),
        ));
    }

    let type_name = map
        .get("type")
        .ok_or_else(|| LoadError::document(path, "missing \"type\""))?
        .as_str()
        .ok_or_else(|| LoadError::document(&pointer(path, "type"), "type must be a string"))?;

    let kind = parse_type(type_name, map.get("items"), path)?;
    let mut node = SchemaNode::new(kind);

    if flag(map, "optional", path)? {
        node = node.optional();
    }
    if flag(map, "readOnly", path)? {
        node = node.read_only();
    }

    if let Some(props) = map.get("properties") {
        let props_path = pointer(path, "properties");
        let props = as_object(props, &props_path, "properties")?;
        node = node.closed();
        for (name, sub) in props {
            node = node.property(name.clone(), parse_node(sub, &pointer(&props_path, name))?);
        }
    }

    if let Some(constraints) = map.get("constraints") {
        for constraint in parse_constraints(constraints, &pointer(path, "constraints"))? {
            node = node.constraint_ref(constraint);
        }
    }

    if let Some(names) = map.get("transform") {
        let transform_path = pointer(path, "transform");
        for (index, name) in as_array(names, &transform_path, "transform")?.iter().enumerate() {
            let item_path = pointer(&transform_path, &index.to_string());
            let name = name
                .as_str()
                .ok_or_else(|| LoadError::document(&item_path, "transformer name must be a string"))?;
            let transformer = transform::builtin(name).ok_or_else(|| {
                LoadError::document(&item_path, format!("unknown transformer: {}", name))
            })?;
            node = node.transform_ref(transformer);
        }
    }

    if let Some(discriminant) = map.get("discriminant") {
        node = node.discriminant(parse_discriminant(discriminant, &pointer(path, "discriminant"))?);
    }

    if let Some(rules) = map.get("$when") {
        let when_path = pointer(path, "$when");
        for (index, rule) in as_array(rules, &when_path, "$when")?.iter().enumerate() {
            node = node.when(parse_rule(rule, &pointer(&when_path, &index.to_string()))?);
        }
    }

    Ok(node)
}

fn flag(map: &JsonMap<String, Json>, key: &str, path: &str) -> Result<bool, LoadError> {
    match map.get(key) {
        None => Ok(false),
        Some(Json::Bool(b)) => Ok(*b),
        Some(_) => Err(LoadError::document(
            &pointer(path, key),
            format!("{} must be a boolean", key),
        )),
    }
}

fn parse_type(name: &str, items: Option<&Json>, path: &str) -> Result<TypeTag, LoadError> {
    if name == "array" {
        let items = items.ok_or_else(|| LoadError::document(path, "array type requires \"items\""))?;
        let item = parse_node(items, &pointer(path, "items"))?;
        return Ok(TypeTag::ArrayOf(Box::new(item)));
    }
    if items.is_some() {
        return Err(LoadError::document(
            &pointer(path, "items"),
            "\"items\" is only allowed on array types",
        ));
    }
    match Primitive::parse(name) {
        Some(primitive) => Ok(TypeTag::Primitive(primitive)),
        None if name.is_empty() => Err(LoadError::document(&pointer(path, "type"), "empty type name")),
        None => Ok(TypeTag::Custom(TypeHandle::named(name))),
    }
}

fn parse_constraints(doc: &Json, path: &str) -> Result<Vec<ConstraintRef>, LoadError> {
    let mut out = Vec::new();
    for (index, entry) in as_array(doc, path, "constraints")?.iter().enumerate() {
        let entry_path = pointer(path, &index.to_string());
        let map = as_object(entry, &entry_path, "constraint")?;
        let mut entries = map.iter();
        let (Some((name, arg)), None) = (entries.next(), entries.next()) else {
            return Err(LoadError::document(&entry_path, "constraint must have exactly one key"));
        };
        let arg_path = pointer(&entry_path, name);
        let constraint: ConstraintRef = match name.as_str() {
            "min" => Arc::new(constraint::min(as_number(arg, &arg_path, "min")?)),
            "max" => Arc::new(constraint::max(as_number(arg, &arg_path, "max")?)),
            "minLength" => Arc::new(constraint::min_length(as_length(arg, &arg_path, "minLength")?)),
            "maxLength" => Arc::new(constraint::max_length(as_length(arg, &arg_path, "maxLength")?)),
            "pattern" => {
                let pattern = arg
                    .as_str()
                    .ok_or_else(|| LoadError::document(&arg_path, "pattern must be a string"))?;
                let compiled = constraint::pattern(pattern)
                    .map_err(|e| LoadError::document(&arg_path, e.to_string()))?;
                Arc::new(compiled)
            }
            "oneOf" => {
                let values = as_array(arg, &arg_path, "oneOf")?;
                Arc::new(constraint::one_of(values.iter().cloned().map(Value::from)))
            }
            "integer" => Arc::new(constraint::integer()),
            other => {
                return Err(LoadError::document(
                    &arg_path,
                    format!("unknown constraint: {}", other),
                ))
            }
        };
        out.push(constraint);
    }
    Ok(out)
}

fn parse_discriminant(doc: &Json, path: &str) -> Result<Discriminant, LoadError> {
    let map = as_object(doc, path, "discriminant")?;
    let property = map
        .get("property")
        .and_then(Json::as_str)
        .ok_or_else(|| LoadError::document(path, "discriminant requires a \"property\" string"))?;

    let mut discriminant = Discriminant::new(property);
    if let Some(mapping) = map.get("mapping") {
        let mapping_path = pointer(path, "mapping");
        for (key, variant) in as_object(mapping, &mapping_path, "mapping")? {
            discriminant =
                discriminant.variant(key.clone(), parse_node(variant, &pointer(&mapping_path, key))?);
        }
    }
    if let Some(default) = map.get("default") {
        discriminant = discriminant.default_schema(parse_node(default, &pointer(path, "default"))?);
    }
    Ok(discriminant)
}

fn parse_rule(doc: &Json, path: &str) -> Result<WhenRule, LoadError> {
    let map = as_object(doc, path, "$when rule")?;
    let field = map
        .get("field")
        .and_then(Json::as_str)
        .ok_or_else(|| LoadError::document(path, "rule requires a \"field\" string"))?;
    let condition = map
        .get("is")
        .ok_or_else(|| LoadError::document(path, "rule requires \"is\""))?;
    let then = map
        .get("then")
        .ok_or_else(|| LoadError::document(path, "rule requires \"then\""))?;

    let mut rule = WhenRule::new(
        field,
        parse_condition(condition, &pointer(path, "is"))?,
        parse_action(then, &pointer(path, "then"))?,
    );
    if let Some(otherwise) = map.get("else") {
        rule = rule.otherwise(parse_action(otherwise, &pointer(path, "else"))?);
    }
    Ok(rule)
}

fn parse_condition(doc: &Json, path: &str) -> Result<Condition, LoadError> {
    let map = as_object(doc, path, "condition")?;
    let mut entries = map.iter();
    let (Some((name, arg)), None) = (entries.next(), entries.next()) else {
        return Err(LoadError::document(path, "condition must have exactly one key"));
    };
    let arg_path = pointer(path, name);

    let nested = |items: &Json| -> Result<Vec<Condition>, LoadError> {
        as_array(items, &arg_path, name)?
            .iter()
            .enumerate()
            .map(|(i, c)| parse_condition(c, &pointer(&arg_path, &i.to_string())))
            .collect()
    };

    match name.as_str() {
        "eq" => Ok(Condition::Equals(Value::from(arg.clone()))),
        "in" => Ok(Condition::one_of(
            as_array(arg, &arg_path, "in")?.iter().cloned().map(Value::from),
        )),
        "not" => Ok(Condition::not(parse_condition(arg, &arg_path)?)),
        "all" => Ok(Condition::All(nested(arg)?)),
        "any" => Ok(Condition::Any(nested(arg)?)),
        "matches" => {
            let pattern = arg
                .as_str()
                .ok_or_else(|| LoadError::document(&arg_path, "matches must be a string"))?;
            Condition::matches(pattern).map_err(|e| LoadError::document(&arg_path, e.to_string()))
        }
        "range" => {
            let bounds = as_object(arg, &arg_path, "range")?;
            let bound = |key: &str| -> Result<Option<f64>, LoadError> {
                bounds
                    .get(key)
                    .map(|v| as_number(v, &pointer(&arg_path, key), key))
                    .transpose()
            };
            Ok(Condition::range(bound("min")?, bound("max")?))
        }
        "exists" => match arg {
            Json::Bool(true) => Ok(Condition::Exists),
            Json::Bool(false) => Ok(Condition::not(Condition::Exists)),
            _ => Err(LoadError::document(&arg_path, "exists must be a boolean")),
        },
        other => Err(LoadError::document(
            &arg_path,
            format!("unknown condition: {}", other),
        )),
    }
}

fn parse_action(doc: &Json, path: &str) -> Result<Action, LoadError> {
    match doc {
        Json::String(s) if s == "required" => Ok(Action::Require),
        Json::String(s) if s == "optional" => Ok(Action::MakeOptional),
        Json::Object(map) if map.len() == 1 => {
            let Some((name, arg)) = map.iter().next() else {
                return Err(LoadError::document(path, "empty action"));
            };
            let arg_path = pointer(path, name);
            match name.as_str() {
                "type" => {
                    let type_name = arg
                        .as_str()
                        .ok_or_else(|| LoadError::document(&arg_path, "type must be a string"))?;
                    if type_name == "array" {
                        return Err(LoadError::document(
                            &arg_path,
                            "array types need items; use a \"schema\" action",
                        ));
                    }
                    Ok(Action::ReplaceType(parse_type(type_name, None, path)?))
                }
                "constraints" => Ok(Action::AddConstraints(parse_constraints(arg, &arg_path)?)),
                "schema" => Ok(Action::Replace(Box::new(parse_node(arg, &arg_path)?))),
                other => Err(LoadError::document(
                    &arg_path,
                    format!("unknown action: {}", other),
                )),
            }
        }
        _ => Err(LoadError::document(
            path,
            "action must be \"required\", \"optional\", or a single-key object",
        )),
    }
}
