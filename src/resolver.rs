//! Reference resolution: binds every `$ref` string to a node handle.
//!
//! Runs after the parser has built the whole graph, so forward references
//! are ordinary lookups. Pointers are walked generically: schema keywords
//! (`properties`, `definitions`, `items`, `allOf`, ...) lead through owned
//! children, any other segment leads into extension data, where any key of
//! the raw JSON may be named. A raw extension object reached this way is
//! promoted to a node the first time, and the same node is returned for
//! every later reference to that path, also after an enclosing object has
//! been promoted itself.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{SchemaError, UnresolvedReference};
use crate::loader::DocumentLoader;
use crate::parser::build_node;
use crate::pointer::{escape_component, parse_reference, unescape_component};
use crate::schema::{AdditionalProperties, Items, SchemaDocument, SchemaId, SchemaNode};
use crate::types::{is_known_keyword, json_type_name};

/// One reference node and where it currently points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceInfo {
    /// Location of the reference node (`#/properties/a`, `other.json#/b`).
    pub location: String,
    /// The `$ref` string.
    pub pointer: String,
    pub node: SchemaId,
    /// Bound target, `None` if resolution failed or has not run.
    pub target: Option<SchemaId>,
}

impl SchemaDocument {
    /// Bind every reference in the document (and in external documents
    /// already loaded). External references that are not loaded yet are
    /// reported as unresolved.
    ///
    /// Failures are isolated per reference and returned; the same list is
    /// available afterwards from [`SchemaDocument::unresolved_references`].
    pub fn resolve_references(&mut self) -> &[UnresolvedReference] {
        Resolver::new(self, None).run();
        &self.unresolved
    }

    /// Like [`SchemaDocument::resolve_references`], loading external
    /// documents through `loader`.
    pub fn resolve_references_with(&mut self, loader: &dyn DocumentLoader) -> &[UnresolvedReference] {
        Resolver::new(self, Some(loader)).run();
        &self.unresolved
    }

    /// Resolve a same-document pointer such as `#/components/Id` against
    /// the root. Resolving the same pointer twice yields the same node.
    pub fn resolve_pointer(&mut self, pointer: &str) -> Result<SchemaId, UnresolvedReference> {
        let root = self.root();
        let mut resolver = Resolver::new(self, None);
        let result = resolver.bind(pointer, root);
        let follow_up = resolver.drain();
        self.unresolved.extend(follow_up);
        result.map_err(|reason| UnresolvedReference {
            pointer: pointer.to_string(),
            location: "#".to_string(),
            reason,
        })
    }

    /// All reference nodes reachable from the root and from loaded
    /// external documents, in document order.
    pub fn references(&self) -> Vec<ReferenceInfo> {
        let mut out = Vec::new();
        let mut scopes = vec![(self.root(), "#".to_string())];
        scopes.extend(
            self.externals
                .iter()
                .map(|(location, id)| (*id, format!("{}#", location))),
        );
        for (start, base) in scopes {
            for (id, location) in self.walk(start, &base) {
                if let Some(pointer) = self[id].reference() {
                    out.push(ReferenceInfo {
                        location,
                        pointer: pointer.to_string(),
                        node: id,
                        target: self[id].reference_target(),
                    });
                }
            }
        }
        out
    }
}

struct Pending {
    node: SchemaId,
    /// Root of the document the reference lives in.
    scope: SchemaId,
    location: String,
}

struct Resolver<'d, 'l> {
    document: &'d mut SchemaDocument,
    loader: Option<&'l dyn DocumentLoader>,
    pending: VecDeque<Pending>,
    failed_loads: HashMap<String, String>,
    bound: usize,
}

impl<'d, 'l> Resolver<'d, 'l> {
    fn new(document: &'d mut SchemaDocument, loader: Option<&'l dyn DocumentLoader>) -> Self {
        Self {
            document,
            loader,
            pending: VecDeque::new(),
            failed_loads: HashMap::new(),
            bound: 0,
        }
    }

    fn run(mut self) {
        let root = self.document.root();
        self.enqueue(root, root, "#");
        let externals: Vec<(String, SchemaId)> = self
            .document
            .externals
            .iter()
            .map(|(location, id)| (location.clone(), *id))
            .collect();
        for (location, id) in externals {
            self.enqueue(id, id, &format!("{}#", location));
        }

        let errors = self.drain();
        debug!(
            bound = self.bound,
            unresolved = errors.len(),
            externals = self.document.externals.len(),
            "resolved schema references"
        );
        self.document.unresolved = errors;
    }

    /// Queue every reference node in the subtree at `start`.
    fn enqueue(&mut self, start: SchemaId, scope: SchemaId, base: &str) {
        for (id, location) in self.document.walk(start, base) {
            if self.document[id].is_reference() {
                self.pending.push_back(Pending {
                    node: id,
                    scope,
                    location,
                });
            }
        }
    }

    /// Bind queued references until none are left (promotions and external
    /// loads may queue more).
    fn drain(&mut self) -> Vec<UnresolvedReference> {
        let mut errors = Vec::new();
        while let Some(pending) = self.pending.pop_front() {
            let Some(pointer) = self.document[pending.node].reference().map(str::to_string) else {
                continue;
            };
            match self.bind(&pointer, pending.scope) {
                Ok(target) => {
                    self.document[pending.node].bind_reference(Some(target));
                    self.bound += 1;
                }
                Err(reason) => {
                    warn!(pointer = %pointer, location = %pending.location, reason = %reason, "unresolved reference");
                    self.document[pending.node].bind_reference(None);
                    errors.push(UnresolvedReference {
                        pointer,
                        location: pending.location,
                        reason,
                    });
                }
            }
        }
        errors
    }

    fn bind(&mut self, pointer: &str, scope: SchemaId) -> Result<SchemaId, String> {
        let parsed = parse_reference(pointer)?;
        let base = match &parsed.document {
            None => scope,
            Some(location) => self.external_root(location)?,
        };
        self.traverse(base, &parsed.segments, pointer)
    }

    fn external_root(&mut self, location: &str) -> Result<SchemaId, String> {
        if let Some(id) = self.document.externals.get(location) {
            return Ok(*id);
        }
        if let Some(reason) = self.failed_loads.get(location) {
            return Err(reason.clone());
        }
        let Some(loader) = self.loader else {
            return Err(format!(
                "external document \"{}\" requires a document loader",
                location
            ));
        };

        let base = format!("{}#", location);
        let loaded = match loader.load(location) {
            Ok(Value::Object(map)) => build_node(self.document, &map, &base, true),
            Ok(other) => Err(SchemaError::InvalidKeyword {
                path: base.clone(),
                keyword: "document".to_string(),
                expected: "schema object",
                actual: json_type_name(&other).to_string(),
            }),
            Err(e) => Err(e),
        };

        match loaded {
            Ok(id) => {
                debug!(location = %location, "loaded external schema document");
                self.document.externals.insert(location.to_string(), id);
                self.enqueue(id, id, &base);
                Ok(id)
            }
            Err(e) => {
                let reason = e.to_string();
                self.failed_loads.insert(location.to_string(), reason.clone());
                Err(reason)
            }
        }
    }

    fn traverse(&mut self, base: SchemaId, segments: &[String], pointer: &str) -> Result<SchemaId, String> {
        let mut current = base;
        let mut rest = segments;

        while let Some((segment, tail)) = rest.split_first() {
            if !is_known_keyword(segment) {
                let (next, consumed) = self.traverse_extension(current, base, rest, pointer)?;
                current = next;
                rest = &rest[consumed..];
                continue;
            }

            let node = &self.document[current];
            let (next, consumed) = match segment.as_str() {
                "properties" => (named(&node.properties, segment, tail)?, 2),
                "definitions" => (named(&node.definitions, segment, tail)?, 2),
                "items" => match &node.items {
                    Some(Items::Schema(id)) => (*id, 1),
                    Some(Items::Tuple(ids)) => (indexed(ids, segment, tail)?, 2),
                    None => return Err("schema has no \"items\"".to_string()),
                },
                "additionalProperties" => match node.additional_properties {
                    Some(AdditionalProperties::Schema(id)) => (id, 1),
                    _ => return Err("\"additionalProperties\" is not a schema".to_string()),
                },
                "allOf" => (indexed(&node.all_of, segment, tail)?, 2),
                "anyOf" => (indexed(&node.any_of, segment, tail)?, 2),
                "oneOf" => (indexed(&node.one_of, segment, tail)?, 2),
                other => return Err(format!("keyword \"{}\" does not hold a schema", other)),
            };
            current = next;
            rest = &rest[consumed..];
        }

        Ok(current)
    }

    /// Walk into `owner`'s extension data. The raw JSON is followed for as
    /// long as it holds each segment, whatever the key is called; the walk
    /// hands over to an already promoted node as soon as one covers the
    /// path so far. Returns the node and how many segments were used.
    fn traverse_extension(
        &mut self,
        owner: SchemaId,
        scope: SchemaId,
        segments: &[String],
        pointer: &str,
    ) -> Result<(SchemaId, usize), String> {
        let document = &*self.document;
        let first = &segments[0];
        let mut value = document[owner]
            .extension(first)
            .ok_or_else(|| format!("no \"{}\" in schema", first))?;
        if let Some(promoted) = document.promoted_at(owner, &relative_pointer(segments)) {
            return Ok((promoted, segments.len()));
        }

        let mut rel = format!("/{}", escape_component(first));
        let mut consumed = 1;
        loop {
            if let Some(promoted) = document.promoted_at(owner, &rel) {
                return Ok((promoted, consumed));
            }
            let Some(segment) = segments.get(consumed) else {
                break;
            };
            value = match value {
                Value::Object(map) => map.get(segment.as_str()),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(|| format!("no \"{}\" in extension data", segment))?;
            rel.push('/');
            rel.push_str(&escape_component(segment));
            consumed += 1;
        }

        let Value::Object(map) = value else {
            return Err(format!(
                "target is {}, not a schema object",
                json_type_name(value)
            ));
        };
        let map = map.clone();
        let id = build_node(self.document, &map, pointer, false).map_err(|e| e.to_string())?;
        debug!(pointer = %pointer, "promoted extension data to schema");
        self.adopt_promoted(owner, &rel, id);
        self.document.promoted.insert((owner, rel), id);
        self.enqueue(id, scope, pointer);
        Ok((id, consumed))
    }

    /// Move nodes promoted earlier below `rel` into the freshly promoted
    /// `node`, so a path keeps resolving to the node it resolved to before.
    fn adopt_promoted(&mut self, owner: SchemaId, rel: &str, node: SchemaId) {
        let prefix = format!("{}/", rel);
        let nested: Vec<(String, SchemaId)> = self
            .document
            .promoted
            .iter()
            .filter(|((o, r), _)| *o == owner && r.starts_with(&prefix))
            .map(|((_, r), id)| (r.clone(), *id))
            .collect();

        for (nested_rel, existing) in nested {
            let segments: Vec<String> = nested_rel[prefix.len()..]
                .split('/')
                .map(unescape_component)
                .collect();
            if self.attach(node, &segments, existing) {
                self.document.promoted.shift_remove(&(owner, nested_rel));
            } else {
                debug!(rel = %nested_rel, "promoted node kept outside its container");
            }
        }
    }

    /// Put `existing` at `segments` below `start`: in place of an owned
    /// child, or as a promotion of some node's extension data.
    fn attach(&mut self, start: SchemaId, segments: &[String], existing: SchemaId) -> bool {
        let mut current = start;
        let mut rest = segments;
        while let Some((segment, tail)) = rest.split_first() {
            if !is_known_keyword(segment) {
                self.document
                    .promoted
                    .insert((current, relative_pointer(rest)), existing);
                return true;
            }
            let Some((slot, consumed)) = child_slot(&mut self.document[current], segment, tail.first())
            else {
                return false;
            };
            if consumed == rest.len() {
                *slot = existing;
                return true;
            }
            current = *slot;
            rest = &rest[consumed..];
        }
        false
    }
}

/// `/a/b~1c` form of unescaped segments, as used for promotion keys.
fn relative_pointer(segments: &[String]) -> String {
    segments
        .iter()
        .map(|segment| format!("/{}", escape_component(segment)))
        .collect()
}

/// Mutable handle on the owned child a keyword segment leads to, with the
/// number of segments it takes.
fn child_slot<'n>(
    node: &'n mut SchemaNode,
    keyword: &str,
    next: Option<&String>,
) -> Option<(&'n mut SchemaId, usize)> {
    let index = || next.and_then(|n| n.parse::<usize>().ok());
    match keyword {
        "properties" => node.properties.get_mut(next?.as_str()).map(|id| (id, 2)),
        "definitions" => node.definitions.get_mut(next?.as_str()).map(|id| (id, 2)),
        "items" => match &mut node.items {
            Some(Items::Schema(id)) => Some((id, 1)),
            Some(Items::Tuple(ids)) => ids.get_mut(index()?).map(|id| (id, 2)),
            None => None,
        },
        "additionalProperties" => match &mut node.additional_properties {
            Some(AdditionalProperties::Schema(id)) => Some((id, 1)),
            _ => None,
        },
        "allOf" => node.all_of.get_mut(index()?).map(|id| (id, 2)),
        "anyOf" => node.any_of.get_mut(index()?).map(|id| (id, 2)),
        "oneOf" => node.one_of.get_mut(index()?).map(|id| (id, 2)),
        _ => None,
    }
}

fn named(
    children: &indexmap::IndexMap<String, SchemaId>,
    keyword: &str,
    tail: &[String],
) -> Result<SchemaId, String> {
    let name = tail
        .first()
        .ok_or_else(|| format!("pointer ends at \"{}\"", keyword))?;
    children
        .get(name)
        .copied()
        .ok_or_else(|| format!("no \"{}\" in \"{}\"", name, keyword))
}

fn indexed(children: &[SchemaId], keyword: &str, tail: &[String]) -> Result<SchemaId, String> {
    let index = tail
        .first()
        .ok_or_else(|| format!("pointer ends at \"{}\"", keyword))?;
    index
        .parse::<usize>()
        .ok()
        .and_then(|i| children.get(i).copied())
        .ok_or_else(|| format!("no index {} in \"{}\"", index, keyword))
}
