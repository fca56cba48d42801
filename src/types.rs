//! Core types shared by the document model and the generator.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Dialect header written as the first keyword of every document root.
pub const DRAFT_04_SCHEMA_URI: &str = "http://json-schema.org/draft-04/schema#";

/// Keywords modeled by [`crate::SchemaNode`], in serialization order.
///
/// None of these may appear in extension data.
pub const KNOWN_KEYWORDS: &[&str] = &[
    "$schema",
    "$ref",
    "title",
    "description",
    "type",
    "format",
    "default",
    "multipleOf",
    "maximum",
    "exclusiveMaximum",
    "minimum",
    "exclusiveMinimum",
    "maxLength",
    "minLength",
    "pattern",
    "maxItems",
    "minItems",
    "uniqueItems",
    "maxProperties",
    "minProperties",
    "enum",
    "additionalProperties",
    "required",
    "properties",
    "items",
    "definitions",
    "allOf",
    "anyOf",
    "oneOf",
];

/// Returns true if `key` is a keyword the model owns.
pub fn is_known_keyword(key: &str) -> bool {
    KNOWN_KEYWORDS.contains(&key)
}

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

bitflags! {
    /// Union of primitive JSON kinds a schema permits.
    ///
    /// The empty set means "any" and omits the `type` keyword entirely.
    /// Bit order is the order type arrays are written in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u8 {
        const ARRAY = 1;
        const BOOLEAN = 1 << 1;
        const INTEGER = 1 << 2;
        const NULL = 1 << 3;
        const NUMBER = 1 << 4;
        const OBJECT = 1 << 5;
        const STRING = 1 << 6;
    }
}

const TYPE_NAMES: &[(TypeFlags, &str)] = &[
    (TypeFlags::ARRAY, "array"),
    (TypeFlags::BOOLEAN, "boolean"),
    (TypeFlags::INTEGER, "integer"),
    (TypeFlags::NULL, "null"),
    (TypeFlags::NUMBER, "number"),
    (TypeFlags::OBJECT, "object"),
    (TypeFlags::STRING, "string"),
];

impl Default for TypeFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl TypeFlags {
    /// No constraint on the value kind.
    pub fn any() -> Self {
        Self::empty()
    }

    pub fn is_any(&self) -> bool {
        self.is_empty()
    }

    pub fn is_nullable(&self) -> bool {
        self.contains(Self::NULL)
    }

    /// Parse a single `type` keyword name (e.g. `"integer"`).
    pub fn from_type_name(name: &str) -> Option<Self> {
        TYPE_NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(flag, _)| *flag)
    }

    /// Keyword names of the set bits, in canonical order.
    pub fn names(&self) -> Vec<&'static str> {
        TYPE_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }

    /// JSON form of the `type` keyword: a string for one bit, an array for
    /// several, `None` for "any".
    pub fn to_keyword(&self) -> Option<Value> {
        let names = self.names();
        match names.as_slice() {
            [] => None,
            [single] => Some(Value::String((*single).to_string())),
            many => Some(Value::Array(
                many.iter().map(|n| Value::String((*n).to_string())).collect(),
            )),
        }
    }
}

/// How a dialect expresses that a schema also accepts `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullHandling {
    /// `null` is a bit in the `type` flags.
    #[default]
    Flags,
    /// `null` is a branch of an `anyOf`/`oneOf` union (flags still count).
    Union,
}

/// How enum constants are written into `enum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumHandling {
    /// Constant names as strings.
    Name,
    /// Underlying integer values.
    #[default]
    Integer,
}

/// Options for schema generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Default enum conversion; an enum type may override it.
    pub enum_handling: EnumHandling,
    /// When true, strings, arrays, dictionaries, objects and dynamic members
    /// accept `null` unless the member says otherwise.
    pub nullable_reference_types: bool,
    /// Copy member descriptions onto property schemas.
    pub include_property_descriptions: bool,
    /// How nullable primitives are expressed.
    pub null_handling: NullHandling,
    /// Fail on unclassifiable types instead of falling back to "any".
    pub strict: bool,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            enum_handling: EnumHandling::Integer,
            nullable_reference_types: true,
            include_property_descriptions: true,
            null_handling: NullHandling::Flags,
            strict: false,
        }
    }
}

impl GeneratorSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enum_handling(mut self, handling: EnumHandling) -> Self {
        self.enum_handling = handling;
        self
    }

    pub fn nullable_reference_types(mut self, nullable: bool) -> Self {
        self.nullable_reference_types = nullable;
        self
    }

    pub fn include_property_descriptions(mut self, include: bool) -> Self {
        self.include_property_descriptions = include;
        self
    }

    pub fn null_handling(mut self, handling: NullHandling) -> Self {
        self.null_handling = handling;
        self
    }

    /// Set strict mode (unsupported shapes are errors).
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
