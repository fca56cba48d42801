//! The schema document model.
//!
//! A [`SchemaDocument`] is an arena of [`SchemaNode`]s addressed by
//! [`SchemaId`]. Keyword children (`properties`, `items`, `allOf`, ...) are
//! owned edges; `$ref` targets are plain ids bound by the resolver, so
//! reference cycles never become ownership cycles.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use indexmap::{IndexMap, IndexSet};
use serde_json::{Number, Value};

use crate::error::{SchemaError, UnresolvedReference};
use crate::types::{is_known_keyword, TypeFlags};

/// Handle of a node inside one [`SchemaDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) usize);

impl SchemaId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// `items`: one schema for every element, or one per position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Items {
    Schema(SchemaId),
    Tuple(Vec<SchemaId>),
}

/// `additionalProperties`: a flag or the schema of dictionary values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(SchemaId),
}

/// `exclusiveMinimum`/`exclusiveMaximum`: a bound (newer drafts) or a flag
/// modifying `minimum`/`maximum` (draft-04).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusiveLimit {
    Flag(bool),
    Value(Number),
}

/// One JSON Schema object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaNode {
    /// `$schema` on a nested node. The document root always writes the
    /// dialect header instead.
    pub schema_uri: Option<String>,
    reference: Option<String>,
    reference_target: Option<SchemaId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub type_flags: TypeFlags,
    pub format: Option<String>,
    pub default: Option<Value>,
    pub multiple_of: Option<Number>,
    pub maximum: Option<Number>,
    pub exclusive_maximum: Option<ExclusiveLimit>,
    pub minimum: Option<Number>,
    pub exclusive_minimum: Option<ExclusiveLimit>,
    pub max_length: Option<u64>,
    pub min_length: Option<u64>,
    pub pattern: Option<String>,
    pub max_items: Option<u64>,
    pub min_items: Option<u64>,
    pub unique_items: Option<bool>,
    pub max_properties: Option<u64>,
    pub min_properties: Option<u64>,
    pub enumeration: Option<Vec<Value>>,
    pub additional_properties: Option<AdditionalProperties>,
    pub required: IndexSet<String>,
    pub properties: IndexMap<String, SchemaId>,
    pub items: Option<Items>,
    pub definitions: IndexMap<String, SchemaId>,
    pub all_of: Vec<SchemaId>,
    pub any_of: Vec<SchemaId>,
    pub one_of: Vec<SchemaId>,
    extension_data: Option<IndexMap<String, Value>>,
}

impl SchemaNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// A node permitting exactly the given kinds.
    pub fn with_type(type_flags: TypeFlags) -> Self {
        Self {
            type_flags,
            ..Self::default()
        }
    }

    /// A reference node pointing at `pointer` (unbound until resolved).
    pub fn with_reference(pointer: impl Into<String>) -> Self {
        Self {
            reference: Some(pointer.into()),
            ..Self::default()
        }
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Point this node elsewhere. The old binding is dropped until the
    /// document is resolved again.
    pub fn set_reference(&mut self, pointer: impl Into<String>) {
        self.reference = Some(pointer.into());
        self.reference_target = None;
    }

    pub fn clear_reference(&mut self) {
        self.reference = None;
        self.reference_target = None;
    }

    pub(crate) fn reference_target(&self) -> Option<SchemaId> {
        self.reference_target
    }

    pub(crate) fn bind_reference(&mut self, target: Option<SchemaId>) {
        self.reference_target = target;
    }

    /// Unknown keys captured from the source, or `None` when there were none.
    pub fn extension_data(&self) -> Option<&IndexMap<String, Value>> {
        self.extension_data.as_ref()
    }

    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extension_data.as_ref().and_then(|data| data.get(key))
    }

    /// Add or replace an extension entry.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::ReservedKeyword` if `key` is a modeled keyword.
    pub fn insert_extension(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, SchemaError> {
        let key = key.into();
        if is_known_keyword(&key) {
            return Err(SchemaError::ReservedKeyword { key });
        }
        Ok(self
            .extension_data
            .get_or_insert_with(IndexMap::new)
            .insert(key, value))
    }

    /// Remove an extension entry; the map goes back to absent once empty.
    pub fn remove_extension(&mut self, key: &str) -> Option<Value> {
        let data = self.extension_data.as_mut()?;
        let removed = data.shift_remove(key);
        if data.is_empty() {
            self.extension_data = None;
        }
        removed
    }

    /// Parser entry point: the caller has already filtered known keywords.
    pub(crate) fn set_extension_data(&mut self, data: IndexMap<String, Value>) {
        self.extension_data = if data.is_empty() { None } else { Some(data) };
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    /// Permissive unless `additionalProperties` is `false`.
    pub fn allows_additional_properties(&self) -> bool {
        !matches!(
            self.additional_properties,
            Some(AdditionalProperties::Allowed(false))
        )
    }

    /// Owned children with the JSON Pointer suffix leading to each, in
    /// serialization order.
    pub(crate) fn children(&self) -> Vec<(String, SchemaId)> {
        use crate::pointer::escape_component;

        let mut out = Vec::new();
        if let Some(AdditionalProperties::Schema(id)) = self.additional_properties {
            out.push(("/additionalProperties".to_string(), id));
        }
        for (name, id) in &self.properties {
            out.push((format!("/properties/{}", escape_component(name)), *id));
        }
        match &self.items {
            Some(Items::Schema(id)) => out.push(("/items".to_string(), *id)),
            Some(Items::Tuple(ids)) => {
                for (i, id) in ids.iter().enumerate() {
                    out.push((format!("/items/{}", i), *id));
                }
            }
            None => {}
        }
        for (name, id) in &self.definitions {
            out.push((format!("/definitions/{}", escape_component(name)), *id));
        }
        for (keyword, ids) in [
            ("allOf", &self.all_of),
            ("anyOf", &self.any_of),
            ("oneOf", &self.one_of),
        ] {
            for (i, id) in ids.iter().enumerate() {
                out.push((format!("/{}/{}", keyword, i), *id));
            }
        }
        out
    }
}

/// An arena-backed JSON Schema document.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    nodes: Vec<SchemaNode>,
    root: SchemaId,
    /// Extension-data objects turned into nodes by a reference, keyed by
    /// owner and the pointer below the owner's extension data.
    pub(crate) promoted: IndexMap<(SchemaId, String), SchemaId>,
    /// Roots of externally loaded documents, by location.
    pub(crate) externals: IndexMap<String, SchemaId>,
    pub(crate) unresolved: Vec<UnresolvedReference>,
}

impl Default for SchemaDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaDocument {
    /// A document whose root is an empty schema.
    pub fn new() -> Self {
        Self::with_root(SchemaNode::default())
    }

    pub fn with_root(root: SchemaNode) -> Self {
        Self {
            nodes: vec![root],
            root: SchemaId(0),
            promoted: IndexMap::new(),
            externals: IndexMap::new(),
            unresolved: Vec::new(),
        }
    }

    /// A document with no nodes; the parser sets the root once built.
    pub(crate) fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            root: SchemaId(0),
            promoted: IndexMap::new(),
            externals: IndexMap::new(),
            unresolved: Vec::new(),
        }
    }

    pub(crate) fn set_root(&mut self, root: SchemaId) {
        self.root = root;
    }

    pub fn root(&self) -> SchemaId {
        self.root
    }

    pub fn root_node(&self) -> &SchemaNode {
        &self[self.root]
    }

    pub fn root_node_mut(&mut self) -> &mut SchemaNode {
        let root = self.root;
        &mut self[root]
    }

    pub fn get(&self, id: SchemaId) -> Option<&SchemaNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: SchemaId) -> Option<&mut SchemaNode> {
        self.nodes.get_mut(id.0)
    }

    /// Number of nodes in the arena, including unreachable ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Move a node into the arena. It is not attached to anything until a
    /// keyword of another node refers to the returned id.
    pub fn add_node(&mut self, node: SchemaNode) -> SchemaId {
        self.nodes.push(node);
        SchemaId(self.nodes.len() - 1)
    }

    /// Child schema of `properties[name]`.
    pub fn property(&self, id: SchemaId, name: &str) -> Option<SchemaId> {
        self.get(id)?.properties.get(name).copied()
    }

    /// Entry of the root's `definitions` table.
    pub fn definition(&self, name: &str) -> Option<SchemaId> {
        self.root_node().definitions.get(name).copied()
    }

    /// Node a reference node is bound to, if resolution succeeded.
    pub fn reference_target(&self, id: SchemaId) -> Option<SchemaId> {
        self.get(id)?.reference_target()
    }

    /// Point `id` at `target` without going through pointer resolution.
    pub fn bind_reference(&mut self, id: SchemaId, pointer: impl Into<String>, target: SchemaId) {
        let node = &mut self[id];
        node.set_reference(pointer);
        node.bind_reference(Some(target));
    }

    /// References that failed during the last resolution pass.
    pub fn unresolved_references(&self) -> &[UnresolvedReference] {
        &self.unresolved
    }

    /// Externally loaded documents, by location.
    pub fn external_documents(&self) -> impl Iterator<Item = (&str, SchemaId)> {
        self.externals.iter().map(|(location, id)| (location.as_str(), *id))
    }

    /// Names in `required` with no matching entry in `properties`.
    ///
    /// This is informational; such names are legal and never fail parsing.
    pub fn missing_required(&self, id: SchemaId) -> Vec<&str> {
        let Some(node) = self.get(id) else {
            return Vec::new();
        };
        node.required
            .iter()
            .filter(|name| !node.properties.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Every promoted extension-data node owned by `owner`.
    pub(crate) fn promoted_children(&self, owner: SchemaId) -> Vec<(String, SchemaId)> {
        self.promoted
            .iter()
            .filter(|((o, _), _)| *o == owner)
            .map(|((_, rel), id)| (rel.clone(), *id))
            .collect()
    }

    /// Promoted node standing in for `owner`'s extension value at `rel`.
    pub(crate) fn promoted_at(&self, owner: SchemaId, rel: &str) -> Option<SchemaId> {
        self.promoted.get(&(owner, rel.to_string())).copied()
    }

    /// Map of node id → JSON Pointer location for everything reachable
    /// from the root and from loaded external documents.
    pub fn locations(&self) -> HashMap<SchemaId, String> {
        let mut out = HashMap::new();
        for (id, location) in self.walk(self.root, "#") {
            out.entry(id).or_insert(location);
        }
        for (location, root) in &self.externals {
            for (id, path) in self.walk(*root, &format!("{}#", location)) {
                out.entry(id).or_insert(path);
            }
        }
        out
    }

    /// Depth-first walk over owned edges and promoted extension data,
    /// yielding each node once with its location.
    pub(crate) fn walk(&self, start: SchemaId, base: &str) -> Vec<(SchemaId, String)> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![(start, base.to_string())];
        while let Some((id, location)) = stack.pop() {
            if !seen.insert(id) || self.get(id).is_none() {
                continue;
            }
            let mut children = self[id].children();
            children.extend(self.promoted_children(id));
            for (suffix, child) in children.into_iter().rev() {
                stack.push((child, format!("{}{}", location, suffix)));
            }
            out.push((id, location));
        }
        out
    }
}

impl Index<SchemaId> for SchemaDocument {
    type Output = SchemaNode;

    fn index(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0]
    }
}

impl IndexMut<SchemaId> for SchemaDocument {
    fn index_mut(&mut self, id: SchemaId) -> &mut SchemaNode {
        &mut self.nodes[id.0]
    }
}
