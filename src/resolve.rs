//! `$ref` resolution
//!
//! Expands every local reference in a parsed tree. A reference that is met
//! again while its own expansion is still in progress is replaced by a
//! [`SchemaKind::Recursive`] sentinel, so self-referential schemas (linked
//! lists, trees) resolve to a finite tree without a depth cutoff.
//!
//! The sentinel records how many reference frames up the re-entered target
//! sits, not how the reference was spelled: `#/definitions/Node` and
//! `#/$defs/ListNode` describing the same recursion resolve to equal trees.
//!
//! Expansions are shared. A target whose expansion does not depend on the
//! frames around it is expanded once and every later `$ref` to it points at
//! the same [`Arc`], so a definition reached along many paths costs one
//! expansion rather than one per path.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::error::{EvolutionError, Result};
use crate::schema::{
    json_type_name, parse_node, pointer_child, AdditionalProperties, Conditional, Items, SchemaKind,
    SchemaTree,
};

/// Reference targets available to the resolver
///
/// Backed by the raw document so any local JSON pointer works, not only
/// `#/definitions/*` and `#/$defs/*`.
#[derive(Debug, Clone)]
pub struct Definitions {
    document: Value,
}

impl Definitions {
    /// Build the definitions view of a schema document
    pub fn from_document(document: &Value) -> Result<Self> {
        if let Value::Object(map) = document {
            for keyword in ["definitions", "$defs"] {
                match map.get(keyword) {
                    None | Some(Value::Object(_)) => {}
                    Some(other) => {
                        return Err(EvolutionError::unresolved(
                            format!("#/{}", keyword),
                            format!("malformed definitions map: expected object, found {}", json_type_name(other)),
                        ));
                    }
                }
            }
        }
        Ok(Self {
            document: document.clone(),
        })
    }

    /// Parse the target of `reference`
    pub fn lookup(&self, reference: &str) -> Result<SchemaTree> {
        let (_, value) = self.locate(reference)?;
        parse_node(value, reference)
    }

    /// Canonical JSON pointer and raw value of a reference target
    ///
    /// Different spellings of the same target (`#/$defs/a%20b`, an anchor)
    /// yield the same pointer.
    fn locate(&self, reference: &str) -> Result<(String, &Value)> {
        let Some(fragment) = reference.strip_prefix('#') else {
            return Err(EvolutionError::unresolved(
                reference,
                "only local references (starting with '#') are supported",
            ));
        };

        let target = if fragment.is_empty() {
            Some((String::new(), &self.document))
        } else if fragment.starts_with('/') {
            let pointer = percent_decode(fragment);
            self.document.pointer(&pointer).map(|value| (pointer, value))
        } else {
            find_anchor(&self.document, fragment, String::new())
        };

        target.ok_or_else(|| EvolutionError::unresolved(reference, "target does not exist"))
    }
}

/// Parse a whole document and resolve it against its own definitions
pub fn resolve_document(document: &Value) -> Result<SchemaTree> {
    let definitions = Definitions::from_document(document)?;
    let tree = SchemaTree::from_json(document)?;

    // the document itself is the outermost frame, so `$ref: "#"` re-enters it
    let mut resolver = Resolver::new(&definitions, vec![vec![String::new()]]);
    let root_reference = match &tree.kind {
        SchemaKind::Ref(reference) => Some(reference.clone()),
        _ => None,
    };
    let tree = match root_reference {
        Some(reference) => match resolver.follow(&reference)? {
            Followed::Reentry(_) => {
                return Err(EvolutionError::unresolved(
                    reference,
                    "reference cycle without schema content",
                ));
            }
            Followed::Target { keys, tree } => {
                resolver.visiting[0].extend(keys);
                tree
            }
        },
        None => tree,
    };
    resolver.resolve_node(tree)
}

/// Resolve every `$ref` in `tree` against `definitions`
pub fn resolve(tree: &SchemaTree, definitions: &Definitions) -> Result<SchemaTree> {
    let mut resolver = Resolver::new(definitions, Vec::new());
    match &tree.kind {
        SchemaKind::Ref(reference) => {
            let resolved = resolver.resolve_reference(reference)?;
            Ok(Arc::try_unwrap(resolved).unwrap_or_else(|shared| (*shared).clone()))
        }
        _ => resolver.resolve_node(tree.clone()),
    }
}

/// Outcome of following a chain of `$ref`-only schemas
enum Followed {
    /// The chain leads back into the frame at this index
    Reentry(usize),
    /// Pointers passed through and the first schema with content
    Target { keys: Vec<String>, tree: SchemaTree },
}

/// A finished expansion and every pointer it touched
struct Expansion {
    tree: Arc<SchemaTree>,
    closure: BTreeSet<String>,
}

struct Resolver<'a> {
    definitions: &'a Definitions,
    /// Reference frames being expanded, innermost last; a frame holds every
    /// pointer of an alias chain (`A: {$ref: B}`) so aliases add no depth
    visiting: Vec<Vec<String>>,
    /// Expansions that can be reused wherever their closure is off the stack
    expanded: HashMap<String, Expansion>,
    /// Pointers touched since the enclosing expansion started
    touched: BTreeSet<String>,
    /// Outermost frame re-entered since the enclosing expansion started
    reentered: Option<usize>,
}

impl<'a> Resolver<'a> {
    fn new(definitions: &'a Definitions, visiting: Vec<Vec<String>>) -> Self {
        Self {
            definitions,
            visiting,
            expanded: HashMap::new(),
            touched: BTreeSet::new(),
            reentered: None,
        }
    }

    fn frame_of(&self, key: &str) -> Option<usize> {
        self.visiting.iter().position(|frame| frame.iter().any(|k| k == key))
    }

    fn follow(&self, reference: &str) -> Result<Followed> {
        let mut keys: Vec<String> = Vec::new();
        let mut current = reference.to_string();
        loop {
            let (key, value) = self.definitions.locate(&current)?;
            if let Some(frame) = self.frame_of(&key) {
                return Ok(Followed::Reentry(frame));
            }
            if keys.contains(&key) {
                return Err(EvolutionError::unresolved(
                    reference,
                    "reference cycle without schema content",
                ));
            }
            keys.push(key);
            let tree = parse_node(value, &current)?;
            match tree.kind {
                SchemaKind::Ref(next) => current = next,
                _ => return Ok(Followed::Target { keys, tree }),
            }
        }
    }

    fn resolve_reference(&mut self, reference: &str) -> Result<Arc<SchemaTree>> {
        let (key, _) = self.definitions.locate(reference)?;

        if let Some(hit) = self.expanded.get(&key) {
            if hit.closure.iter().all(|k| self.frame_of(k).is_none()) {
                let tree = Arc::clone(&hit.tree);
                let closure = hit.closure.clone();
                self.touched.extend(closure);
                return Ok(tree);
            }
        }

        let (keys, target) = match self.follow(reference)? {
            Followed::Reentry(frame) => return Ok(self.sentinel(frame, reference)),
            Followed::Target { keys, tree } => (keys, tree),
        };

        let index = self.visiting.len();
        self.visiting.push(keys.clone());
        let outer_touched = std::mem::take(&mut self.touched);
        let outer_reentered = self.reentered.take();

        let resolved = self.resolve_node(target);

        self.visiting.pop();
        let inner_reentered = self.reentered;
        let mut closure = std::mem::replace(&mut self.touched, outer_touched);
        closure.extend(keys);
        self.touched.extend(closure.iter().cloned());
        self.reentered = match (outer_reentered, inner_reentered) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let mut resolved = resolved?;
        resolved.reference = Some(reference.to_string());
        let resolved = Arc::new(resolved);

        // sentinels reaching outside this frame tie the expansion to its context
        if inner_reentered.map(|frame| frame >= index).unwrap_or(true) {
            self.expanded.insert(
                key,
                Expansion {
                    tree: Arc::clone(&resolved),
                    closure,
                },
            );
        }
        Ok(resolved)
    }

    fn sentinel(&mut self, frame: usize, reference: &str) -> Arc<SchemaTree> {
        let depth = self.visiting.len() - 1 - frame;
        trace!(reference = %reference, depth, "recursive reference, substituting sentinel");
        self.reentered = Some(self.reentered.map_or(frame, |outer| outer.min(frame)));
        self.touched.extend(self.visiting[frame].iter().cloned());

        let mut sentinel = SchemaTree::new(SchemaKind::Recursive(depth));
        sentinel.reference = Some(reference.to_string());
        Arc::new(sentinel)
    }

    fn resolve_child(&mut self, child: &Arc<SchemaTree>) -> Result<Arc<SchemaTree>> {
        match &child.kind {
            SchemaKind::Ref(reference) => self.resolve_reference(reference),
            _ => self.resolve_node((**child).clone()).map(Arc::new),
        }
    }

    fn resolve_node(&mut self, mut tree: SchemaTree) -> Result<SchemaTree> {
        tree.properties = std::mem::take(&mut tree.properties)
            .into_iter()
            .map(|(name, child)| Ok::<_, EvolutionError>((name, self.resolve_child(&child)?)))
            .collect::<Result<Vec<_>>>()?;

        if let AdditionalProperties::Schema(schema) = &tree.additional_properties {
            tree.additional_properties = AdditionalProperties::Schema(self.resolve_child(schema)?);
        }

        tree.items = match tree.items.take() {
            Some(Items::List(schema)) => Some(Items::List(self.resolve_child(&schema)?)),
            Some(Items::Tuple { prefix, rest }) => Some(Items::Tuple {
                prefix: self.resolve_all(&prefix)?,
                rest: self.resolve_optional(rest.as_ref())?,
            }),
            None => None,
        };

        let composition = std::mem::take(&mut tree.composition);
        for (kind, variants) in composition {
            tree.composition.insert(kind, self.resolve_all(&variants)?);
        }

        if let Some(cond) = tree.conditional.take() {
            tree.conditional = Some(Conditional {
                condition: self.resolve_child(&cond.condition)?,
                then_branch: self.resolve_optional(cond.then_branch.as_ref())?,
                else_branch: self.resolve_optional(cond.else_branch.as_ref())?,
            });
        }

        Ok(tree)
    }

    fn resolve_all(&mut self, trees: &[Arc<SchemaTree>]) -> Result<Vec<Arc<SchemaTree>>> {
        trees.iter().map(|t| self.resolve_child(t)).collect()
    }

    fn resolve_optional(&mut self, tree: Option<&Arc<SchemaTree>>) -> Result<Option<Arc<SchemaTree>>> {
        tree.map(|t| self.resolve_child(t)).transpose()
    }
}

/// Find a subschema declaring `$anchor: name` or the older `$id: "#name"`,
/// with its JSON pointer
fn find_anchor<'v>(value: &'v Value, name: &str, pointer: String) -> Option<(String, &'v Value)> {
    match value {
        Value::Object(map) => {
            let anchored = map.get("$anchor").and_then(Value::as_str) == Some(name)
                || map
                    .get("$id")
                    .and_then(Value::as_str)
                    .and_then(|id| id.strip_prefix('#'))
                    == Some(name);
            if anchored {
                return Some((pointer, value));
            }
            map.iter()
                .find_map(|(key, child)| find_anchor(child, name, pointer_child(&pointer, key)))
        }
        Value::Array(values) => values
            .iter()
            .enumerate()
            .find_map(|(i, child)| find_anchor(child, name, pointer_child(&pointer, &i.to_string()))),
        _ => None,
    }
}

/// Decode `%XX` escapes in a URI fragment
fn percent_decode(fragment: &str) -> String {
    let bytes = fragment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
