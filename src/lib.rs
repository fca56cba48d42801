//! JSON Schema document model
//!
//! Parse, navigate, mutate, and re-serialize JSON Schema documents, and
//! generate schemas from structural type descriptions.
//!
//! A document is an arena of [`SchemaNode`]s. `$ref` strings are bound to
//! node handles in a second pass, so forward references, cycles and
//! references into arbitrary containers (`#/components/Id`) all work.
//! Keys the model doesn't know are kept as extension data and written back
//! next to the modeled keywords.
//!
//! # Example
//!
//! ```
//! use json_schema_model::{SchemaDocument, TypeFlags};
//!
//! let doc = SchemaDocument::from_json(r##"{
//!     "type": "object",
//!     "properties": { "id": { "$ref": "#/components/Id" } },
//!     "components": { "Id": { "type": "integer" } }
//! }"##).unwrap();
//!
//! let id = doc.property(doc.root(), "id").unwrap();
//! let target = doc.actual_schema(id);
//! assert_eq!(doc[target].type_flags, TypeFlags::INTEGER);
//! assert!(doc.unresolved_references().is_empty());
//! ```
//!
//! # Keyword order
//!
//! Serialization writes the dialect header first, then modeled keywords in
//! a fixed order, then extension data in insertion order:
//!
//! | Group | Keywords |
//! |-------|----------|
//! | Header | `$schema`, `$ref` |
//! | Annotations | `title`, `description`, `type`, `format`, `default` |
//! | Numbers | `multipleOf`, `maximum`, `exclusiveMaximum`, `minimum`, `exclusiveMinimum` |
//! | Strings | `maxLength`, `minLength`, `pattern` |
//! | Arrays | `maxItems`, `minItems`, `uniqueItems` |
//! | Objects | `maxProperties`, `minProperties`, `enum`, `additionalProperties`, `required`, `properties` |
//! | Children | `items`, `definitions`, `allOf`, `anyOf`, `oneOf` |

mod dereference;
mod error;
mod generator;
mod loader;
mod metadata;
mod parser;
mod pointer;
mod resolver;
mod schema;
mod serializer;
mod types;

pub use error::{SchemaError, UnresolvedReference};
pub use generator::{generate_schema, SchemaGenerator};
pub use loader::{
    is_url, load_document, load_value, load_value_auto, load_value_str, read_text, AutoLoader,
    DocumentLoader, FileLoader,
};
pub use metadata::{
    Constraint, EnumType, EnumVariant, Member, ObjectType, Primitive, TypeCatalog, TypeRegistry,
    TypeShape,
};
pub use pointer::{escape_component, fragment_reference, parse_reference, unescape_component, ParsedReference};
pub use resolver::ReferenceInfo;
pub use schema::{AdditionalProperties, ExclusiveLimit, Items, SchemaDocument, SchemaId, SchemaNode};
pub use types::{
    is_known_keyword, EnumHandling, GeneratorSettings, NullHandling, TypeFlags,
    DRAFT_04_SCHEMA_URI, KNOWN_KEYWORDS,
};

#[cfg(feature = "remote")]
pub use loader::{load_value_url, UrlLoader};
