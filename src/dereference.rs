//! Queries that look through references and nullable wrappers.

use std::collections::HashSet;

use crate::schema::{SchemaDocument, SchemaId};
use crate::types::{NullHandling, TypeFlags};

impl SchemaDocument {
    /// Follow bound references from `id` to the first node that is not a
    /// reference.
    ///
    /// A reference cycle stops at the last distinct node reached, and an
    /// unbound reference is its own actual schema.
    pub fn actual_schema(&self, id: SchemaId) -> SchemaId {
        let mut visited = HashSet::new();
        let mut current = id;
        while visited.insert(current) {
            match self.reference_target(current) {
                Some(next) if !visited.contains(&next) => current = next,
                _ => break,
            }
        }
        current
    }

    /// Actual schema, additionally unwrapping a two-branch
    /// `oneOf`/`anyOf` whose other branch is a null marker.
    pub fn actual_type_schema(&self, id: SchemaId) -> SchemaId {
        let actual = self.actual_schema(id);
        match self.non_null_branch(actual) {
            Some(branch) => self.actual_schema(branch),
            None => actual,
        }
    }

    /// Whether the node (after following references) accepts `null`.
    ///
    /// Any-type schemas are nullable, and so is a typeless union with a
    /// null-marker branch. Under [`NullHandling::Union`] a null-marker
    /// branch counts even when the node declares types of its own.
    pub fn is_nullable(&self, id: SchemaId, handling: NullHandling) -> bool {
        let actual = self.actual_schema(id);
        let node = &self[actual];
        if node.type_flags.contains(TypeFlags::NULL) || self.is_any_type(actual) {
            return true;
        }
        let has_null_branch = node
            .one_of
            .iter()
            .chain(node.any_of.iter())
            .any(|branch| self.is_null_marker(*branch));
        match handling {
            NullHandling::Flags => has_null_branch && node.type_flags.is_any(),
            NullHandling::Union => has_null_branch,
        }
    }

    /// A node that constrains nothing about the instance's kind.
    pub fn is_any_type(&self, id: SchemaId) -> bool {
        let node = &self[id];
        node.type_flags.is_any()
            && !node.is_reference()
            && node.properties.is_empty()
            && node.items.is_none()
            && node.all_of.is_empty()
            && node.any_of.is_empty()
            && node.one_of.is_empty()
            && node.enumeration.is_none()
    }

    /// A branch whose actual schema is exactly `{"type": "null"}` in kind.
    pub fn is_null_marker(&self, id: SchemaId) -> bool {
        self[self.actual_schema(id)].type_flags == TypeFlags::NULL
    }

    /// The non-null branch of a nullable wrapper, if `id` is one.
    fn non_null_branch(&self, id: SchemaId) -> Option<SchemaId> {
        let node = &self[id];
        let branches = if node.one_of.len() == 2 {
            &node.one_of
        } else if node.any_of.len() == 2 {
            &node.any_of
        } else {
            return None;
        };
        match (self.is_null_marker(branches[0]), self.is_null_marker(branches[1])) {
            (true, false) => Some(branches[1]),
            (false, true) => Some(branches[0]),
            _ => None,
        }
    }
}
