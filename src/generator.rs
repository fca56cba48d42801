//! Type metadata → schema document.
//!
//! Composite types are registered once in the root `definitions` table,
//! keyed by display name, and every occurrence becomes a reference node
//! bound to that entry. The root type itself is referenced as `#`.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::SchemaError;
use crate::metadata::{Constraint, EnumType, Member, ObjectType, Primitive, TypeRegistry, TypeShape};
use crate::pointer::{escape_component, fragment_reference};
use crate::schema::{AdditionalProperties, Items, SchemaDocument, SchemaId, SchemaNode};
use crate::types::{EnumHandling, GeneratorSettings, NullHandling, TypeFlags};

/// Generate the schema of the composite type `identity`.
///
/// # Example
///
/// ```
/// use json_schema_model::{generate_schema, GeneratorSettings, Member, ObjectType, TypeCatalog, TypeShape};
///
/// let catalog = TypeCatalog::new().with(
///     ObjectType::new("Pet").member(Member::new("Name", TypeShape::String).required()),
/// );
/// let doc = generate_schema(&catalog, "Pet", GeneratorSettings::default()).unwrap();
/// assert!(doc.root_node().is_required("Name"));
/// ```
pub fn generate_schema<R: TypeRegistry + ?Sized>(
    registry: &R,
    identity: &str,
    settings: GeneratorSettings,
) -> Result<SchemaDocument, SchemaError> {
    SchemaGenerator::new(registry, settings).generate(identity)
}

struct Registered {
    pointer: String,
    node: SchemaId,
}

/// One generation pass over a registry.
pub struct SchemaGenerator<'r, R: TypeRegistry + ?Sized> {
    registry: &'r R,
    settings: GeneratorSettings,
    document: SchemaDocument,
    registered: HashMap<String, Registered>,
}

impl<'r, R: TypeRegistry + ?Sized> SchemaGenerator<'r, R> {
    pub fn new(registry: &'r R, settings: GeneratorSettings) -> Self {
        Self {
            registry,
            settings,
            document: SchemaDocument::new(),
            registered: HashMap::new(),
        }
    }

    /// Generate a document whose root is the composite type `identity`.
    ///
    /// # Errors
    ///
    /// `SchemaError::UnsupportedTypeShape` in strict mode when a type can't
    /// be classified; `SchemaError::ReservedKeyword` when extension data
    /// uses a schema keyword.
    pub fn generate(mut self, identity: &str) -> Result<SchemaDocument, SchemaError> {
        let registry = self.registry;
        let root = self.document.root();
        match registry.object(identity) {
            Some(object) => {
                self.registered.insert(
                    identity.to_string(),
                    Registered {
                        pointer: "#".to_string(),
                        node: root,
                    },
                );
                self.document[root].title = Some(object.title().to_string());
                self.fill_object(root, object, "#")?;
            }
            None => self.unsupported(identity, "#")?,
        }
        Ok(self.finish())
    }

    /// Generate a document for any shape. Non-object shapes become the
    /// root schema directly; definitions they need stay on the root.
    pub fn generate_shape(mut self, shape: &TypeShape) -> Result<SchemaDocument, SchemaError> {
        if let TypeShape::Object(identity) = shape {
            return self.generate(identity);
        }

        let nullable = self.default_nullable(shape);
        let (built, _) = self.shape_schema(shape, nullable, "#")?;
        let root = self.document.root();
        let definitions = std::mem::take(&mut self.document[root].definitions);
        let mut node = self.document[built].clone();
        node.definitions = definitions;
        self.document[root] = node;
        Ok(self.finish())
    }

    fn finish(self) -> SchemaDocument {
        debug!(
            definitions = self.document.root_node().definitions.len(),
            nodes = self.document.len(),
            "generated schema document"
        );
        self.document
    }

    fn unsupported(&self, type_name: &str, path: &str) -> Result<(), SchemaError> {
        if self.settings.strict {
            return Err(SchemaError::UnsupportedTypeShape {
                type_name: type_name.to_string(),
                path: path.to_string(),
            });
        }
        warn!(type_name = %type_name, path = %path, "unsupported type shape, using any");
        Ok(())
    }

    fn fill_object(&mut self, id: SchemaId, object: &ObjectType, path: &str) -> Result<(), SchemaError> {
        let node = &mut self.document[id];
        node.type_flags = TypeFlags::OBJECT;
        node.description = object.description.clone();
        for (key, value) in &object.extension_data {
            node.insert_extension(key.clone(), value.clone())?;
        }

        for member in &object.members {
            let name = member.json_name().to_string();
            let member_path = format!("{}/properties/{}", path, escape_component(&name));
            let child = self.member_schema(member, &member_path)?;
            let node = &mut self.document[id];
            node.properties.insert(name.clone(), child);
            if member.is_required() {
                node.required.insert(name);
            }
        }
        Ok(())
    }

    fn member_schema(&mut self, member: &Member, path: &str) -> Result<SchemaId, SchemaError> {
        let nullable = member
            .nullable
            .unwrap_or_else(|| self.default_nullable(&member.shape));
        let (outer, inner) = self.shape_schema(&member.shape, nullable, path)?;

        for constraint in &member.constraints {
            self.apply_constraint(inner, constraint);
        }

        let node = &mut self.document[outer];
        if self.settings.include_property_descriptions {
            if let Some(description) = &member.description {
                node.description = Some(description.clone());
            }
        }
        for (key, value) in &member.extension_data {
            node.insert_extension(key.clone(), value.clone())?;
        }
        Ok(outer)
    }

    fn default_nullable(&self, shape: &TypeShape) -> bool {
        match shape {
            TypeShape::Integer | TypeShape::Number | TypeShape::Boolean | TypeShape::Enum(_) => false,
            TypeShape::Nullable(_) => true,
            TypeShape::String
            | TypeShape::Array(_)
            | TypeShape::Dictionary(_)
            | TypeShape::Object(_)
            | TypeShape::Dynamic
            | TypeShape::Unknown(_) => self.settings.nullable_reference_types,
        }
    }

    /// Returns the node to attach and the node constraints apply to; they
    /// differ when a nullable value is wrapped in a union.
    fn shape_schema(
        &mut self,
        shape: &TypeShape,
        nullable: bool,
        path: &str,
    ) -> Result<(SchemaId, SchemaId), SchemaError> {
        let node = match shape {
            TypeShape::Integer => SchemaNode::with_type(TypeFlags::INTEGER),
            TypeShape::Number => SchemaNode::with_type(TypeFlags::NUMBER),
            TypeShape::Boolean => SchemaNode::with_type(TypeFlags::BOOLEAN),
            TypeShape::Nullable(primitive) => SchemaNode::with_type(primitive_flags(*primitive)),
            TypeShape::String => SchemaNode::with_type(TypeFlags::STRING),
            TypeShape::Enum(enum_type) => self.enum_node(enum_type),
            TypeShape::Array(element) => {
                let item = self.element_schema(element, &format!("{}/items", path))?;
                let mut node = SchemaNode::with_type(TypeFlags::ARRAY);
                node.items = Some(Items::Schema(item));
                node
            }
            TypeShape::Dictionary(value) => {
                let value = self.element_schema(value, &format!("{}/additionalProperties", path))?;
                let mut node = SchemaNode::with_type(TypeFlags::OBJECT);
                node.additional_properties = Some(AdditionalProperties::Schema(value));
                node
            }
            TypeShape::Object(identity) => return self.object_reference(identity, nullable, path),
            TypeShape::Dynamic => {
                let id = self.document.add_node(SchemaNode::new());
                return Ok((id, id));
            }
            TypeShape::Unknown(name) => {
                self.unsupported(name, path)?;
                let id = self.document.add_node(SchemaNode::new());
                return Ok((id, id));
            }
        };
        Ok(self.typed(node, nullable))
    }

    /// Array items and dictionary values: nullable only when declared so.
    fn element_schema(&mut self, shape: &TypeShape, path: &str) -> Result<SchemaId, SchemaError> {
        let nullable = matches!(shape, TypeShape::Nullable(_));
        let (outer, _) = self.shape_schema(shape, nullable, path)?;
        Ok(outer)
    }

    fn typed(&mut self, mut node: SchemaNode, nullable: bool) -> (SchemaId, SchemaId) {
        if !nullable {
            let id = self.document.add_node(node);
            return (id, id);
        }
        match self.settings.null_handling {
            NullHandling::Flags => {
                node.type_flags |= TypeFlags::NULL;
                let id = self.document.add_node(node);
                (id, id)
            }
            NullHandling::Union => {
                let inner = self.document.add_node(node);
                (self.null_union(inner), inner)
            }
        }
    }

    /// `{"oneOf": [{"type": "null"}, inner]}`
    fn null_union(&mut self, inner: SchemaId) -> SchemaId {
        let null = self.document.add_node(SchemaNode::with_type(TypeFlags::NULL));
        let mut union = SchemaNode::new();
        union.one_of = vec![null, inner];
        self.document.add_node(union)
    }

    fn enum_node(&self, enum_type: &EnumType) -> SchemaNode {
        let handling = enum_type.handling.unwrap_or(self.settings.enum_handling);
        let (type_flags, values) = match handling {
            EnumHandling::Name => (
                TypeFlags::STRING,
                enum_type
                    .variants
                    .iter()
                    .map(|v| Value::String(v.name.clone()))
                    .collect(),
            ),
            EnumHandling::Integer => (
                TypeFlags::INTEGER,
                enum_type.variants.iter().map(|v| Value::from(v.value)).collect(),
            ),
        };
        let mut node = SchemaNode::with_type(type_flags);
        node.enumeration = Some(values);
        node
    }

    fn object_reference(
        &mut self,
        identity: &str,
        nullable: bool,
        path: &str,
    ) -> Result<(SchemaId, SchemaId), SchemaError> {
        let registry = self.registry;
        let Some(object) = registry.object(identity) else {
            self.unsupported(identity, path)?;
            let id = self.document.add_node(SchemaNode::new());
            return Ok((id, id));
        };

        let (pointer, target) = match self.registered.get(identity) {
            Some(registered) => (registered.pointer.clone(), registered.node),
            None => self.register(object)?,
        };
        let reference = self.document.add_node(SchemaNode::new());
        self.document.bind_reference(reference, pointer, target);

        // A reference node has no type of its own to add null to.
        if nullable {
            Ok((self.null_union(reference), reference))
        } else {
            Ok((reference, reference))
        }
    }

    fn register(&mut self, object: &ObjectType) -> Result<(String, SchemaId), SchemaError> {
        let key = self.definition_key(object);
        let pointer = fragment_reference(&["definitions", key.as_str()]);
        let id = self.document.add_node(SchemaNode::new());
        self.document.root_node_mut().definitions.insert(key.clone(), id);
        self.registered.insert(
            object.identity.clone(),
            Registered {
                pointer: pointer.clone(),
                node: id,
            },
        );
        debug!(identity = %object.identity, key = %key, "registered definition");

        self.document[id].title = object.non_empty_display_name().map(str::to_string);
        self.fill_object(id, object, &pointer)?;
        Ok((pointer, id))
    }

    fn definition_key(&self, object: &ObjectType) -> String {
        let stripped: String = object
            .display_name
            .as_deref()
            .unwrap_or("")
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        let base = if stripped.is_empty() {
            object.identity.clone()
        } else {
            stripped
        };

        let definitions = &self.document.root_node().definitions;
        let mut key = base.clone();
        let mut suffix = 2;
        while definitions.contains_key(&key) {
            key = format!("{}{}", base, suffix);
            suffix += 1;
        }
        key
    }

    fn apply_constraint(&mut self, target: SchemaId, constraint: &Constraint) {
        match constraint {
            Constraint::Range { minimum, maximum } => {
                let node = &mut self.document[target];
                if minimum.is_some() {
                    node.minimum = minimum.clone();
                }
                if maximum.is_some() {
                    node.maximum = maximum.clone();
                }
            }
            Constraint::Pattern { pattern } => {
                // Dictionaries constrain their values, not the map itself.
                let target = match self.document[target].additional_properties {
                    Some(AdditionalProperties::Schema(value)) => value,
                    _ => target,
                };
                match self.value_node(target) {
                    Some(target) => self.document[target].pattern = Some(pattern.clone()),
                    None => warn!(pattern = %pattern, "pattern on a type reference is not emitted"),
                }
            }
            Constraint::Length { min, max } => {
                let node = &mut self.document[target];
                if node.type_flags.contains(TypeFlags::ARRAY) {
                    node.min_items = min.or(node.min_items);
                    node.max_items = max.or(node.max_items);
                } else {
                    node.min_length = min.or(node.min_length);
                    node.max_length = max.or(node.max_length);
                }
            }
            Constraint::Format { format } => {
                self.document[target].format = Some(format.clone());
            }
            Constraint::Required => {}
        }
    }

    /// The node that carries a value's own keywords: the non-null branch of
    /// a union wrapper. `None` for references, whose definition is shared.
    fn value_node(&self, id: SchemaId) -> Option<SchemaId> {
        let id = match self.document[id].one_of.as_slice() {
            [null, inner] if self.document[*null].type_flags == TypeFlags::NULL => *inner,
            _ => id,
        };
        (!self.document[id].is_reference()).then_some(id)
    }
}

fn primitive_flags(primitive: Primitive) -> TypeFlags {
    match primitive {
        Primitive::Integer => TypeFlags::INTEGER,
        Primitive::Number => TypeFlags::NUMBER,
        Primitive::Boolean => TypeFlags::BOOLEAN,
    }
}
