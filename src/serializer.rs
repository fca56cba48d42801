//! Schema graph → JSON.
//!
//! Keywords are written in one fixed order (see [`crate::KNOWN_KEYWORDS`]),
//! followed by extension data in its original order. References are
//! written as their `$ref` string, never expanded.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::pointer::escape_component;
use crate::schema::{AdditionalProperties, ExclusiveLimit, Items, SchemaDocument, SchemaId};
use crate::types::DRAFT_04_SCHEMA_URI;

impl SchemaDocument {
    /// Serialize the document as indented JSON text.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::CyclicDefinitionOverflow` if an owned keyword
    /// edge leads back to one of its ancestors.
    pub fn to_json(&self) -> Result<String, SchemaError> {
        let value = self.to_value()?;
        serde_json::to_string_pretty(&value)
            .map_err(|source| SchemaError::MalformedDocument { source })
    }

    /// Serialize the document to a JSON value, dialect header first.
    pub fn to_value(&self) -> Result<Value, SchemaError> {
        let mut writer = Writer {
            document: self,
            ancestors: HashSet::new(),
        };
        writer.write(self.root(), "#", true)
    }

    /// Serialize one node as a standalone schema (no dialect header).
    pub fn node_to_value(&self, id: SchemaId) -> Result<Value, SchemaError> {
        let mut writer = Writer {
            document: self,
            ancestors: HashSet::new(),
        };
        writer.write(id, "#", false)
    }
}

struct Writer<'a> {
    document: &'a SchemaDocument,
    /// Nodes on the current path from the root.
    ancestors: HashSet<SchemaId>,
}

impl Writer<'_> {
    fn write(&mut self, id: SchemaId, path: &str, is_root: bool) -> Result<Value, SchemaError> {
        if !self.ancestors.insert(id) {
            return Err(SchemaError::CyclicDefinitionOverflow {
                path: path.to_string(),
            });
        }
        let result = self.write_fields(id, path, is_root);
        self.ancestors.remove(&id);
        result
    }

    fn write_fields(&mut self, id: SchemaId, path: &str, is_root: bool) -> Result<Value, SchemaError> {
        let document = self.document;
        let node = &document[id];
        let mut out = Map::new();

        if is_root {
            out.insert("$schema".into(), Value::String(DRAFT_04_SCHEMA_URI.into()));
        } else if let Some(uri) = &node.schema_uri {
            out.insert("$schema".into(), Value::String(uri.clone()));
        }
        if let Some(reference) = node.reference() {
            out.insert("$ref".into(), Value::String(reference.to_string()));
        }
        insert_string(&mut out, "title", &node.title);
        insert_string(&mut out, "description", &node.description);
        if let Some(types) = node.type_flags.to_keyword() {
            out.insert("type".into(), types);
        }
        insert_string(&mut out, "format", &node.format);
        if let Some(default) = &node.default {
            out.insert("default".into(), default.clone());
        }
        insert_number(&mut out, "multipleOf", &node.multiple_of);
        insert_number(&mut out, "maximum", &node.maximum);
        insert_exclusive(&mut out, "exclusiveMaximum", &node.exclusive_maximum);
        insert_number(&mut out, "minimum", &node.minimum);
        insert_exclusive(&mut out, "exclusiveMinimum", &node.exclusive_minimum);
        insert_count(&mut out, "maxLength", node.max_length);
        insert_count(&mut out, "minLength", node.min_length);
        insert_string(&mut out, "pattern", &node.pattern);
        insert_count(&mut out, "maxItems", node.max_items);
        insert_count(&mut out, "minItems", node.min_items);
        if let Some(unique) = node.unique_items {
            out.insert("uniqueItems".into(), Value::Bool(unique));
        }
        insert_count(&mut out, "maxProperties", node.max_properties);
        insert_count(&mut out, "minProperties", node.min_properties);
        if let Some(values) = &node.enumeration {
            out.insert("enum".into(), Value::Array(values.clone()));
        }

        match node.additional_properties {
            Some(AdditionalProperties::Allowed(allowed)) => {
                out.insert("additionalProperties".into(), Value::Bool(allowed));
            }
            Some(AdditionalProperties::Schema(child)) => {
                let child_path = format!("{}/additionalProperties", path);
                out.insert("additionalProperties".into(), self.write(child, &child_path, false)?);
            }
            None => {}
        }

        if !node.required.is_empty() {
            let names = node.required.iter().cloned().map(Value::String).collect();
            out.insert("required".into(), Value::Array(names));
        }

        if !node.properties.is_empty() {
            let properties = self.write_named(&node.properties, &format!("{}/properties", path))?;
            out.insert("properties".into(), properties);
        }

        match &node.items {
            Some(Items::Schema(child)) => {
                let child_path = format!("{}/items", path);
                out.insert("items".into(), self.write(*child, &child_path, false)?);
            }
            Some(Items::Tuple(children)) => {
                let items = self.write_list(children, &format!("{}/items", path))?;
                out.insert("items".into(), items);
            }
            None => {}
        }

        if !node.definitions.is_empty() {
            let definitions = self.write_named(&node.definitions, &format!("{}/definitions", path))?;
            out.insert("definitions".into(), definitions);
        }

        for (keyword, children) in [
            ("allOf", &node.all_of),
            ("anyOf", &node.any_of),
            ("oneOf", &node.one_of),
        ] {
            if !children.is_empty() {
                let list = self.write_list(children, &format!("{}/{}", path, keyword))?;
                out.insert(keyword.into(), list);
            }
        }

        if let Some(extension) = node.extension_data() {
            for (key, value) in extension {
                let rel = format!("/{}", escape_component(key));
                let written = self.write_extension(id, &rel, value, path)?;
                out.insert(key.clone(), written);
            }
        }

        Ok(Value::Object(out))
    }

    fn write_named(
        &mut self,
        children: &indexmap::IndexMap<String, SchemaId>,
        path: &str,
    ) -> Result<Value, SchemaError> {
        let mut out = Map::new();
        for (name, child) in children {
            let child_path = format!("{}/{}", path, escape_component(name));
            out.insert(name.clone(), self.write(*child, &child_path, false)?);
        }
        Ok(Value::Object(out))
    }

    fn write_list(&mut self, children: &[SchemaId], path: &str) -> Result<Value, SchemaError> {
        let mut out = Vec::with_capacity(children.len());
        for (i, child) in children.iter().enumerate() {
            out.push(self.write(*child, &format!("{}/{}", path, i), false)?);
        }
        Ok(Value::Array(out))
    }

    /// Extension values are copied verbatim except where a reference has
    /// promoted a sub-value to a node; those are written from the graph.
    fn write_extension(
        &mut self,
        owner: SchemaId,
        rel: &str,
        value: &Value,
        owner_path: &str,
    ) -> Result<Value, SchemaError> {
        let document = self.document;
        if document.promoted.is_empty() {
            return Ok(value.clone());
        }
        if let Some(promoted) = document.promoted_at(owner, rel) {
            return self.write(promoted, &format!("{}{}", owner_path, rel), false);
        }
        match value {
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, child) in map {
                    let child_rel = format!("{}/{}", rel, escape_component(key));
                    out.insert(key.clone(), self.write_extension(owner, &child_rel, child, owner_path)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, child) in items.iter().enumerate() {
                    let child_rel = format!("{}/{}", rel, i);
                    out.push(self.write_extension(owner, &child_rel, child, owner_path)?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other.clone()),
        }
    }
}

fn insert_string(out: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        out.insert(key.into(), Value::String(value.clone()));
    }
}

fn insert_number(out: &mut Map<String, Value>, key: &str, value: &Option<serde_json::Number>) {
    if let Some(value) = value {
        out.insert(key.into(), Value::Number(value.clone()));
    }
}

fn insert_count(out: &mut Map<String, Value>, key: &str, value: Option<u64>) {
    if let Some(value) = value {
        out.insert(key.into(), Value::from(value));
    }
}

fn insert_exclusive(out: &mut Map<String, Value>, key: &str, value: &Option<ExclusiveLimit>) {
    match value {
        Some(ExclusiveLimit::Flag(flag)) => {
            out.insert(key.into(), Value::Bool(*flag));
        }
        Some(ExclusiveLimit::Value(n)) => {
            out.insert(key.into(), Value::Number(n.clone()));
        }
        None => {}
    }
}
