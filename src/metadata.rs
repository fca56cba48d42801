//! Structural type descriptions consumed by the generator.
//!
//! This is the boundary with whatever inspects the host type system: a
//! [`TypeRegistry`] hands out [`ObjectType`]s by identity, and members
//! describe their values with [`TypeShape`]. A [`TypeCatalog`] is the
//! serde-loadable registry used by the CLI and tests.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::SchemaError;
use crate::types::EnumHandling;

/// Scalar kinds that may be declared nullable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Integer,
    Number,
    Boolean,
}

/// What a member's value looks like.
///
/// JSON form: `{"kind": "array", "of": {"kind": "object", "of": "MySubtype"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum TypeShape {
    Integer,
    Number,
    Boolean,
    /// A primitive that also admits `null` (`int?`, `Option<i32>`).
    Nullable(Primitive),
    String,
    Enum(EnumType),
    /// Arrays, lists, collections.
    Array(Box<TypeShape>),
    /// String-keyed maps; the shape is the value type.
    Dictionary(Box<TypeShape>),
    /// A composite type, by identity.
    Object(String),
    /// Untyped JSON (`serde_json::Value`, `JObject`).
    Dynamic,
    /// Something the introspection side could not classify.
    Unknown(String),
}

impl TypeShape {
    pub fn array(element: TypeShape) -> Self {
        TypeShape::Array(Box::new(element))
    }

    pub fn dictionary(value: TypeShape) -> Self {
        TypeShape::Dictionary(Box::new(value))
    }

    pub fn object(identity: impl Into<String>) -> Self {
        TypeShape::Object(identity.into())
    }
}

/// An enumeration with its constants in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub variants: Vec<EnumVariant>,
    /// Per-type override of [`crate::GeneratorSettings`]'s enum handling
    /// (e.g. a type serialized through a string converter).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handling: Option<EnumHandling>,
}

impl EnumType {
    /// Enum whose constants take values 0, 1, 2, ... in order.
    pub fn sequential<I, S>(name: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            variants: names
                .into_iter()
                .enumerate()
                .map(|(i, n)| EnumVariant {
                    name: n.into(),
                    value: i as i64,
                })
                .collect(),
            handling: None,
        }
    }

    pub fn handling(mut self, handling: EnumHandling) -> Self {
        self.handling = Some(handling);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    pub value: i64,
}

/// Annotations attached to a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Inclusive numeric bounds.
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<Number>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<Number>,
    },
    /// Regular expression; on dictionaries it applies to the values.
    Pattern { pattern: String },
    /// The member must be present (independent of nullability).
    Required,
    /// String length, or item count for arrays.
    Length {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<u64>,
    },
    Format { format: String },
}

impl Constraint {
    pub fn range(minimum: impl Into<Number>, maximum: impl Into<Number>) -> Self {
        Constraint::Range {
            minimum: Some(minimum.into()),
            maximum: Some(maximum.into()),
        }
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Constraint::Pattern {
            pattern: pattern.into(),
        }
    }

    pub fn format(format: impl Into<String>) -> Self {
        Constraint::Format {
            format: format.into(),
        }
    }
}

/// One field or property of a composite type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub shape: TypeShape,
    /// Declared nullability. `None` defers to the shape and settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// JSON property name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extension_data: IndexMap<String, Value>,
}

impl Member {
    pub fn new(name: impl Into<String>, shape: TypeShape) -> Self {
        Self {
            name: name.into(),
            shape,
            nullable: None,
            rename: None,
            description: None,
            constraints: Vec::new(),
            extension_data: IndexMap::new(),
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn required(self) -> Self {
        self.constraint(Constraint::Required)
    }

    pub fn extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extension_data.insert(key.into(), value);
        self
    }

    /// Key used in `properties` and `required`.
    pub fn json_name(&self) -> &str {
        match self.rename.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.name,
        }
    }

    pub fn is_required(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::Required))
    }
}

/// A composite type with a stable identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    /// Stable identity used for deduplication (e.g. a fully qualified name).
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extension_data: IndexMap<String, Value>,
}

impl ObjectType {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            display_name: None,
            description: None,
            members: Vec::new(),
            extension_data: IndexMap::new(),
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extension_data.insert(key.into(), value);
        self
    }

    /// The display name, unless it is missing or empty.
    pub fn non_empty_display_name(&self) -> Option<&str> {
        self.display_name.as_deref().filter(|name| !name.is_empty())
    }

    /// Display name, falling back to the identity.
    pub fn title(&self) -> &str {
        self.non_empty_display_name().unwrap_or(&self.identity)
    }
}

/// Source of composite type descriptions.
pub trait TypeRegistry {
    fn object(&self, identity: &str) -> Option<&ObjectType>;
}

/// In-memory registry, (de)serialized as a JSON array of object types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ObjectType>", into = "Vec<ObjectType>")]
pub struct TypeCatalog {
    types: IndexMap<String, ObjectType>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from JSON text.
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(text).map_err(|source| SchemaError::MalformedDocument { source })
    }

    /// Add a type, replacing any earlier one with the same identity.
    pub fn insert(&mut self, object: ObjectType) -> Option<ObjectType> {
        self.types.insert(object.identity.clone(), object)
    }

    pub fn with(mut self, object: ObjectType) -> Self {
        self.insert(object);
        self
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectType> {
        self.types.values()
    }
}

impl TypeRegistry for TypeCatalog {
    fn object(&self, identity: &str) -> Option<&ObjectType> {
        self.types.get(identity)
    }
}

impl From<Vec<ObjectType>> for TypeCatalog {
    fn from(types: Vec<ObjectType>) -> Self {
        let mut catalog = Self::new();
        for object in types {
            catalog.insert(object);
        }
        catalog
    }
}

impl From<TypeCatalog> for Vec<ObjectType> {
    fn from(catalog: TypeCatalog) -> Self {
        catalog.types.into_values().collect()
    }
}
