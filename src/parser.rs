//! JSON → schema graph.
//!
//! First pass of loading a document: every object becomes a node and every
//! `$ref` stays an unbound string. Binding happens in the resolver.

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::error::SchemaError;
use crate::loader::DocumentLoader;
use crate::pointer::escape_component;
use crate::schema::{AdditionalProperties, ExclusiveLimit, Items, SchemaDocument, SchemaId, SchemaNode};
use crate::types::{is_known_keyword, json_type_name, TypeFlags};

impl SchemaDocument {
    /// Parse JSON text and bind same-document references.
    ///
    /// Unresolved references do not fail the parse; they are listed by
    /// [`SchemaDocument::unresolved_references`].
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::MalformedDocument` if the text isn't JSON, or
    /// `SchemaError::InvalidKeyword` if a modeled keyword has the wrong shape.
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let value = parse_text(text)?;
        Self::from_value(&value)
    }

    /// Like [`SchemaDocument::from_json`], fetching external documents
    /// through `loader`.
    pub fn from_json_with_loader(
        text: &str,
        loader: &dyn DocumentLoader,
    ) -> Result<Self, SchemaError> {
        let value = parse_text(text)?;
        Self::from_value_with_loader(&value, loader)
    }

    /// Build from an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let mut document = build_document(value)?;
        document.resolve_references();
        Ok(document)
    }

    pub fn from_value_with_loader(
        value: &Value,
        loader: &dyn DocumentLoader,
    ) -> Result<Self, SchemaError> {
        let mut document = build_document(value)?;
        document.resolve_references_with(loader);
        Ok(document)
    }
}

fn parse_text(text: &str) -> Result<Value, SchemaError> {
    serde_json::from_str(text).map_err(|source| SchemaError::MalformedDocument { source })
}

fn build_document(value: &Value) -> Result<SchemaDocument, SchemaError> {
    let map = expect_object(value, "#", "document", "schema object")?;
    let mut document = SchemaDocument::empty();
    let root = build_node(&mut document, map, "#", true)?;
    document.set_root(root);
    debug!(nodes = document.len(), "parsed schema document");
    Ok(document)
}

/// Build one node (and its owned subtree) into `document`.
///
/// `path` is the node's location, used in error messages. A root node
/// swallows its `$schema` header.
pub(crate) fn build_node(
    document: &mut SchemaDocument,
    map: &Map<String, Value>,
    path: &str,
    is_root: bool,
) -> Result<SchemaId, SchemaError> {
    let mut node = SchemaNode::new();
    let mut extension = IndexMap::new();

    for (key, value) in map {
        let key_path = format!("{}/{}", path, escape_component(key));
        match key.as_str() {
            "$schema" => {
                let uri = expect_string(value, path, key)?;
                if !is_root {
                    node.schema_uri = Some(uri);
                }
            }
            "$ref" => node.set_reference(expect_string(value, path, key)?),
            "title" => node.title = Some(expect_string(value, path, key)?),
            "description" => node.description = Some(expect_string(value, path, key)?),
            "format" => node.format = Some(expect_string(value, path, key)?),
            "pattern" => node.pattern = Some(expect_string(value, path, key)?),
            "type" => node.type_flags = parse_type(value, path)?,
            "default" => node.default = Some(value.clone()),
            "multipleOf" => node.multiple_of = Some(expect_number(value, path, key)?),
            "maximum" => node.maximum = Some(expect_number(value, path, key)?),
            "minimum" => node.minimum = Some(expect_number(value, path, key)?),
            "exclusiveMaximum" => {
                node.exclusive_maximum = Some(parse_exclusive(value, path, key)?)
            }
            "exclusiveMinimum" => {
                node.exclusive_minimum = Some(parse_exclusive(value, path, key)?)
            }
            "maxLength" => node.max_length = Some(expect_count(value, path, key)?),
            "minLength" => node.min_length = Some(expect_count(value, path, key)?),
            "maxItems" => node.max_items = Some(expect_count(value, path, key)?),
            "minItems" => node.min_items = Some(expect_count(value, path, key)?),
            "maxProperties" => node.max_properties = Some(expect_count(value, path, key)?),
            "minProperties" => node.min_properties = Some(expect_count(value, path, key)?),
            "uniqueItems" => node.unique_items = Some(expect_bool(value, path, key)?),
            "enum" => node.enumeration = Some(expect_array(value, path, key)?.clone()),
            "required" => {
                for name in expect_array(value, path, key)? {
                    let name = name
                        .as_str()
                        .ok_or_else(|| invalid(path, key, "array of strings", name))?;
                    node.required.insert(name.to_string());
                }
            }
            "additionalProperties" => {
                node.additional_properties = Some(match value {
                    Value::Bool(allowed) => AdditionalProperties::Allowed(*allowed),
                    Value::Object(child) => {
                        AdditionalProperties::Schema(build_node(document, child, &key_path, false)?)
                    }
                    other => return Err(invalid(path, key, "boolean or schema", other)),
                });
            }
            "properties" => node.properties = build_named(document, value, &key_path, key)?,
            "definitions" => node.definitions = build_named(document, value, &key_path, key)?,
            "items" => {
                node.items = Some(match value {
                    Value::Object(child) => {
                        Items::Schema(build_node(document, child, &key_path, false)?)
                    }
                    Value::Array(_) => Items::Tuple(build_list(document, value, &key_path, key)?),
                    other => return Err(invalid(path, key, "schema or array of schemas", other)),
                });
            }
            "allOf" => node.all_of = build_list(document, value, &key_path, key)?,
            "anyOf" => node.any_of = build_list(document, value, &key_path, key)?,
            "oneOf" => node.one_of = build_list(document, value, &key_path, key)?,
            _ => {
                debug_assert!(!is_known_keyword(key));
                extension.insert(key.clone(), value.clone());
            }
        }
    }

    node.set_extension_data(extension);
    Ok(document.add_node(node))
}

fn build_named(
    document: &mut SchemaDocument,
    value: &Value,
    path: &str,
    keyword: &str,
) -> Result<IndexMap<String, SchemaId>, SchemaError> {
    let map = expect_object(value, path, keyword, "object of schemas")?;
    let mut out = IndexMap::with_capacity(map.len());
    for (name, child) in map {
        let child_path = format!("{}/{}", path, escape_component(name));
        let child = expect_object(child, &child_path, name, "schema object")?;
        out.insert(name.clone(), build_node(document, child, &child_path, false)?);
    }
    Ok(out)
}

fn build_list(
    document: &mut SchemaDocument,
    value: &Value,
    path: &str,
    keyword: &str,
) -> Result<Vec<SchemaId>, SchemaError> {
    let items = expect_array(value, path, keyword)?;
    let mut out = Vec::with_capacity(items.len());
    for (i, child) in items.iter().enumerate() {
        let child_path = format!("{}/{}", path, i);
        let child = expect_object(child, &child_path, keyword, "schema object")?;
        out.push(build_node(document, child, &child_path, false)?);
    }
    Ok(out)
}

fn parse_type(value: &Value, path: &str) -> Result<TypeFlags, SchemaError> {
    let expected = "JSON type name or array of names";
    let name_to_flag = |name: &Value| {
        name.as_str()
            .and_then(TypeFlags::from_type_name)
            .ok_or_else(|| invalid(path, "type", expected, name))
    };
    match value {
        Value::String(_) => name_to_flag(value),
        Value::Array(names) => names
            .iter()
            .try_fold(TypeFlags::empty(), |flags, name| -> Result<TypeFlags, SchemaError> {
                Ok(flags | name_to_flag(name)?)
            }),
        other => Err(invalid(path, "type", expected, other)),
    }
}

fn parse_exclusive(value: &Value, path: &str, keyword: &str) -> Result<ExclusiveLimit, SchemaError> {
    match value {
        Value::Bool(flag) => Ok(ExclusiveLimit::Flag(*flag)),
        Value::Number(n) => Ok(ExclusiveLimit::Value(n.clone())),
        other => Err(invalid(path, keyword, "boolean or number", other)),
    }
}

fn invalid(path: &str, keyword: &str, expected: &'static str, actual: &Value) -> SchemaError {
    let actual = match actual {
        Value::String(s) => format!("string \"{}\"", s),
        other => json_type_name(other).to_string(),
    };
    SchemaError::InvalidKeyword {
        path: path.to_string(),
        keyword: keyword.to_string(),
        expected,
        actual,
    }
}

fn expect_object<'v>(
    value: &'v Value,
    path: &str,
    keyword: &str,
    expected: &'static str,
) -> Result<&'v Map<String, Value>, SchemaError> {
    value.as_object().ok_or_else(|| invalid(path, keyword, expected, value))
}

fn expect_array<'v>(value: &'v Value, path: &str, keyword: &str) -> Result<&'v Vec<Value>, SchemaError> {
    value.as_array().ok_or_else(|| invalid(path, keyword, "array", value))
}

fn expect_string(value: &Value, path: &str, keyword: &str) -> Result<String, SchemaError> {
    value
        .as_str()
        .map(String::from)
        .ok_or_else(|| invalid(path, keyword, "string", value))
}

fn expect_number(value: &Value, path: &str, keyword: &str) -> Result<Number, SchemaError> {
    match value {
        Value::Number(n) => Ok(n.clone()),
        other => Err(invalid(path, keyword, "number", other)),
    }
}

fn expect_count(value: &Value, path: &str, keyword: &str) -> Result<u64, SchemaError> {
    value
        .as_u64()
        .ok_or_else(|| invalid(path, keyword, "non-negative integer", value))
}

fn expect_bool(value: &Value, path: &str, keyword: &str) -> Result<bool, SchemaError> {
    value
        .as_bool()
        .ok_or_else(|| invalid(path, keyword, "boolean", value))
}
