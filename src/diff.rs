//! Structural schema diffing
//!
//! Walks two resolved trees in lock-step and records every divergence as a
//! [`NodeDelta`]. No compatibility judgment happens here; see `classify`.
//!
//! Output order is fixed: a node's own deltas (type, constraints, closed
//! values) come before its children, properties are visited in sorted-name
//! order, and composition variants are aligned by position.
//!
//! A pair of shared subtrees (the same resolved `$ref` targets on both sides)
//! is compared once. Its deltas are reported at the first path that reaches
//! it, which keeps the walk linear in the number of distinct nodes.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{
    same_value, AdditionalProperties, Bound, Conditional, Constraint, Items, SchemaKind, SchemaTree,
};

/// Change taxonomy shared by deltas and classified changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    FieldAdded,
    FieldRemoved,
    TypeChanged,
    RequiredAdded,
    RequiredRemoved,
    ConstraintTightened,
    ConstraintLoosened,
    ConstraintAdded,
    ConstraintRemoved,
    EnumNarrowed,
    EnumWidened,
    AdditionalPropertiesChanged,
    CompositionChanged,
}

/// Kind of divergence, with the context the classifier needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaKind {
    FieldAdded { required: bool, has_default: bool },
    FieldRemoved { was_required: bool },
    TypeChanged,
    RequiredAdded,
    RequiredRemoved,
    ConstraintTightened(Constraint),
    ConstraintLoosened(Constraint),
    ConstraintAdded(Constraint),
    ConstraintRemoved(Constraint),
    EnumNarrowed,
    EnumWidened,
    /// `restricting` is true when fewer undeclared properties are accepted
    AdditionalPropertiesChanged { restricting: bool },
    CompositionChanged,
}

impl DeltaKind {
    pub fn change_type(&self) -> ChangeType {
        match self {
            DeltaKind::FieldAdded { .. } => ChangeType::FieldAdded,
            DeltaKind::FieldRemoved { .. } => ChangeType::FieldRemoved,
            DeltaKind::TypeChanged => ChangeType::TypeChanged,
            DeltaKind::RequiredAdded => ChangeType::RequiredAdded,
            DeltaKind::RequiredRemoved => ChangeType::RequiredRemoved,
            DeltaKind::ConstraintTightened(_) => ChangeType::ConstraintTightened,
            DeltaKind::ConstraintLoosened(_) => ChangeType::ConstraintLoosened,
            DeltaKind::ConstraintAdded(_) => ChangeType::ConstraintAdded,
            DeltaKind::ConstraintRemoved(_) => ChangeType::ConstraintRemoved,
            DeltaKind::EnumNarrowed => ChangeType::EnumNarrowed,
            DeltaKind::EnumWidened => ChangeType::EnumWidened,
            DeltaKind::AdditionalPropertiesChanged { .. } => ChangeType::AdditionalPropertiesChanged,
            DeltaKind::CompositionChanged => ChangeType::CompositionChanged,
        }
    }

    /// The constraint involved, for constraint deltas
    pub fn constraint(&self) -> Option<Constraint> {
        match self {
            DeltaKind::ConstraintTightened(c)
            | DeltaKind::ConstraintLoosened(c)
            | DeltaKind::ConstraintAdded(c)
            | DeltaKind::ConstraintRemoved(c) => Some(*c),
            _ => None,
        }
    }
}

/// A raw divergence between two trees
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDelta {
    /// Segments from the root to the node the delta is about
    pub path: Vec<String>,
    /// Keyword at that node, for keyword-level deltas (`minimum`, `enum`, ...)
    pub keyword: Option<String>,
    pub kind: DeltaKind,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl NodeDelta {
    /// Dotted path of the node, `$` for the root
    pub fn location(&self) -> String {
        join_path(&self.path)
    }

    /// Dotted path including the keyword
    pub fn field(&self) -> String {
        match &self.keyword {
            Some(keyword) if self.path.is_empty() => keyword.clone(),
            Some(keyword) => format!("{}.{}", join_path(&self.path), keyword),
            None => join_path(&self.path),
        }
    }
}

fn join_path(path: &[String]) -> String {
    if path.is_empty() {
        "$".to_string()
    } else {
        path.join(".")
    }
}

/// Compare two resolved trees
pub fn diff(old: &SchemaTree, new: &SchemaTree) -> Vec<NodeDelta> {
    let mut differ = Differ {
        deltas: Vec::new(),
        compared: HashSet::new(),
        anything: Arc::new(SchemaTree::any()),
    };
    differ.walk(old, new, &mut Vec::new());
    differ.deltas
}

struct Differ {
    deltas: Vec<NodeDelta>,
    /// Node pairs already walked
    compared: HashSet<(*const SchemaTree, *const SchemaTree)>,
    /// Stand-in for an absent `items` schema
    anything: Arc<SchemaTree>,
}

impl Differ {
    fn emit(
        &mut self,
        path: &[String],
        keyword: Option<&str>,
        kind: DeltaKind,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) {
        self.deltas.push(NodeDelta {
            path: path.to_vec(),
            keyword: keyword.map(str::to_string),
            kind,
            old_value,
            new_value,
        });
    }

    fn walk(&mut self, old: &SchemaTree, new: &SchemaTree, path: &mut Vec<String>) {
        let never = old.kind == SchemaKind::Never || new.kind == SchemaKind::Never;
        if (old.is_unconstrained() || new.is_unconstrained()) && !never {
            // `true`/`{}` accepts whatever the other side describes
            return;
        }
        if old.kind != new.kind && !admits(&old.kind, &new.kind) {
            // nested comparisons are meaningless once the type differs
            self.emit(
                path,
                None,
                DeltaKind::TypeChanged,
                Some(Value::String(old.kind.to_string())),
                Some(Value::String(new.kind.to_string())),
            );
            return;
        }

        self.constraints(old, new, path);
        self.closed_values(old, new, path);
        self.properties(old, new, path);
        self.additional_properties(old, new, path);
        self.items(old, new, path);
        self.composition(old, new, path);
        self.conditional(old, new, path);
    }

    fn constraints(&mut self, old: &SchemaTree, new: &SchemaTree, path: &[String]) {
        let keys: BTreeSet<Constraint> = old
            .constraints
            .keys()
            .chain(new.constraints.keys())
            .copied()
            .collect();

        for constraint in keys {
            let before = old.constraints.get(&constraint);
            let after = new.constraints.get(&constraint);
            let kinds = match (before, after) {
                (Some(_), None) => vec![DeltaKind::ConstraintRemoved(constraint)],
                (None, Some(_)) => vec![DeltaKind::ConstraintAdded(constraint)],
                (Some(o), Some(n)) => compare_bound(constraint, o, n),
                (None, None) => Vec::new(),
            };
            for kind in kinds {
                self.emit(
                    path,
                    Some(constraint.keyword()),
                    kind,
                    before.cloned(),
                    after.cloned(),
                );
            }
        }
    }

    fn closed_values(&mut self, old: &SchemaTree, new: &SchemaTree, path: &[String]) {
        let keyword = if old.enum_values.is_none()
            && new.enum_values.is_none()
            && (old.const_value.is_some() || new.const_value.is_some())
        {
            "const"
        } else {
            "enum"
        };

        let (narrowed, widened) = match (old.closed_values(), new.closed_values()) {
            (None, None) => return,
            (None, Some(_)) => (true, false),
            (Some(_), None) => (false, true),
            (Some(before), Some(after)) => (
                before.iter().any(|v| !contains(&after, v)),
                after.iter().any(|v| !contains(&before, v)),
            ),
        };
        let as_value = |tree: &SchemaTree| tree.closed_values().map(Value::Array);

        if narrowed {
            self.emit(path, Some(keyword), DeltaKind::EnumNarrowed, as_value(old), as_value(new));
        }
        if widened {
            self.emit(path, Some(keyword), DeltaKind::EnumWidened, as_value(old), as_value(new));
        }
    }

    fn properties(&mut self, old: &SchemaTree, new: &SchemaTree, path: &mut Vec<String>) {
        let names: BTreeSet<&str> = old
            .properties
            .iter()
            .chain(new.properties.iter())
            .map(|(name, _)| name.as_str())
            .chain(old.required.iter().map(String::as_str))
            .chain(new.required.iter().map(String::as_str))
            .collect();

        for name in names {
            let was_required = old.required.contains(name);
            let is_required = new.required.contains(name);
            path.push("properties".to_string());
            path.push(name.to_string());

            match (property(old, name), property(new, name)) {
                (Some(before), None) => {
                    self.emit(
                        path,
                        None,
                        DeltaKind::FieldRemoved { was_required },
                        Some(before.to_json()),
                        None,
                    );
                }
                (None, Some(after)) => {
                    self.emit(
                        path,
                        None,
                        DeltaKind::FieldAdded {
                            required: is_required && !was_required,
                            has_default: after.default.is_some(),
                        },
                        None,
                        Some(after.to_json()),
                    );
                }
                (Some(before), Some(after)) => {
                    self.required(was_required, is_required, path);
                    self.walk_shared(before, after, path);
                }
                (None, None) => self.required(was_required, is_required, path),
            }

            path.pop();
            path.pop();
        }
    }

    fn required(&mut self, was_required: bool, is_required: bool, path: &[String]) {
        let kind = match (was_required, is_required) {
            (false, true) => DeltaKind::RequiredAdded,
            (true, false) => DeltaKind::RequiredRemoved,
            _ => return,
        };
        self.emit(
            path,
            None,
            kind,
            Some(Value::Bool(was_required)),
            Some(Value::Bool(is_required)),
        );
    }

    fn additional_properties(&mut self, old: &SchemaTree, new: &SchemaTree, path: &mut Vec<String>) {
        match (&old.additional_properties, &new.additional_properties) {
            (AdditionalProperties::Schema(before), AdditionalProperties::Schema(after)) => {
                self.walk_at(before, after, path, &["*"]);
            }
            (before, after) if before != after => {
                let restricting = restrictiveness(after) > restrictiveness(before);
                self.emit(
                    path,
                    Some("additionalProperties"),
                    DeltaKind::AdditionalPropertiesChanged { restricting },
                    Some(before.to_json()),
                    Some(after.to_json()),
                );
            }
            _ => {}
        }
    }

    fn items(&mut self, old: &SchemaTree, new: &SchemaTree, path: &mut Vec<String>) {
        let anything = Arc::clone(&self.anything);
        match (&old.items, &new.items) {
            (None, None) => {}
            (Some(Items::List(before)), Some(Items::List(after))) => {
                self.walk_at(before, after, path, &["items"]);
            }
            (None, Some(Items::List(after))) => self.walk_at(&anything, after, path, &["items"]),
            (Some(Items::List(before)), None) => self.walk_at(before, &anything, path, &["items"]),
            (Some(Items::List(_)), Some(Items::Tuple { .. }))
            | (Some(Items::Tuple { .. }), Some(Items::List(_))) => {
                let label = |items: &Option<Items>| match items {
                    Some(Items::Tuple { .. }) => Value::String("tuple".to_string()),
                    _ => Value::String("list".to_string()),
                };
                path.push("items".to_string());
                self.emit(path, None, DeltaKind::TypeChanged, Some(label(&old.items)), Some(label(&new.items)));
                path.pop();
            }
            (before, after) => {
                let (old_prefix, old_rest) = tuple_parts(before);
                let (new_prefix, new_rest) = tuple_parts(after);
                self.tuple(old_prefix, new_prefix, path);
                match (old_rest, new_rest) {
                    (None, None) => {}
                    (o, n) => self.walk_at(o.unwrap_or(&anything), n.unwrap_or(&anything), path, &["items"]),
                }
            }
        }
    }

    fn tuple(&mut self, old: &[Arc<SchemaTree>], new: &[Arc<SchemaTree>], path: &mut Vec<String>) {
        for index in 0..old.len().max(new.len()) {
            path.push("prefixItems".to_string());
            path.push(index.to_string());
            match (old.get(index), new.get(index)) {
                (Some(before), Some(after)) => self.walk_shared(before, after, path),
                (Some(before), None) => self.emit(
                    path,
                    None,
                    DeltaKind::FieldRemoved { was_required: false },
                    Some(before.to_json()),
                    None,
                ),
                (None, Some(after)) => self.emit(
                    path,
                    None,
                    DeltaKind::FieldAdded {
                        required: false,
                        has_default: after.default.is_some(),
                    },
                    None,
                    Some(after.to_json()),
                ),
                (None, None) => {}
            }
            path.pop();
            path.pop();
        }
    }

    fn composition(&mut self, old: &SchemaTree, new: &SchemaTree, path: &mut Vec<String>) {
        let keys: BTreeSet<_> = old.composition.keys().chain(new.composition.keys()).copied().collect();
        let as_value = |variants: Option<&Vec<Arc<SchemaTree>>>| {
            variants.map(|vs| Value::Array(vs.iter().map(|v| v.to_json()).collect()))
        };

        for kind in keys {
            let before = old.composition.get(&kind);
            let after = new.composition.get(&kind);
            let changed = match (before, after) {
                (Some(b), Some(a)) => b.len() != a.len() || is_reordering(b, a),
                _ => true,
            };
            if changed {
                self.emit(
                    path,
                    Some(kind.keyword()),
                    DeltaKind::CompositionChanged,
                    as_value(before),
                    as_value(after),
                );
            }

            if let (Some(before), Some(after)) = (before, after) {
                for (index, (b, a)) in before.iter().zip(after.iter()).enumerate() {
                    let index = index.to_string();
                    self.walk_at(b, a, path, &[kind.keyword(), index.as_str()]);
                }
            }
        }
    }

    fn conditional(&mut self, old: &SchemaTree, new: &SchemaTree, path: &mut Vec<String>) {
        let (before, after) = match (&old.conditional, &new.conditional) {
            (None, None) => return,
            (Some(b), Some(a)) => (b, a),
            (before, after) => {
                let as_value = |c: &Option<Conditional>| {
                    c.as_ref().map(|c| c.condition.to_json())
                };
                self.emit(path, Some("if"), DeltaKind::CompositionChanged, as_value(before), as_value(after));
                return;
            }
        };

        self.walk_at(&before.condition, &after.condition, path, &["if"]);
        for (keyword, b, a) in [
            ("then", &before.then_branch, &after.then_branch),
            ("else", &before.else_branch, &after.else_branch),
        ] {
            match (b, a) {
                (None, None) => {}
                (Some(b), Some(a)) => self.walk_at(b, a, path, &[keyword]),
                (b, a) => self.emit(
                    path,
                    Some(keyword),
                    DeltaKind::CompositionChanged,
                    b.as_ref().map(|t| t.to_json()),
                    a.as_ref().map(|t| t.to_json()),
                ),
            }
        }
    }

    fn walk_shared(&mut self, old: &Arc<SchemaTree>, new: &Arc<SchemaTree>, path: &mut Vec<String>) {
        if self.compared.insert((Arc::as_ptr(old), Arc::as_ptr(new))) {
            self.walk(old, new, path);
        }
    }

    fn walk_at(
        &mut self,
        old: &Arc<SchemaTree>,
        new: &Arc<SchemaTree>,
        path: &mut Vec<String>,
        segments: &[&str],
    ) {
        path.extend(segments.iter().map(|s| s.to_string()));
        self.walk_shared(old, new, path);
        path.truncate(path.len() - segments.len());
    }
}

/// `any` conflicts with no kind except `never`; only its keywords are compared
fn admits(old: &SchemaKind, new: &SchemaKind) -> bool {
    match (old, new) {
        (SchemaKind::Any, other) | (other, SchemaKind::Any) => *other != SchemaKind::Never,
        _ => false,
    }
}

fn property<'t>(tree: &'t SchemaTree, name: &str) -> Option<&'t Arc<SchemaTree>> {
    tree.properties.iter().find(|(n, _)| n == name).map(|(_, t)| t)
}

fn contains(values: &[Value], value: &Value) -> bool {
    values.iter().any(|v| same_value(v, value))
}

/// Higher is stricter
fn restrictiveness(additional: &AdditionalProperties) -> u8 {
    match additional {
        AdditionalProperties::Allowed => 0,
        AdditionalProperties::Schema(_) => 1,
        AdditionalProperties::Forbidden => 2,
    }
}

fn tuple_parts(items: &Option<Items>) -> (&[Arc<SchemaTree>], Option<&Arc<SchemaTree>>) {
    match items {
        Some(Items::Tuple { prefix, rest }) => (prefix.as_slice(), rest.as_ref()),
        _ => (&[], None),
    }
}

/// Same variants, different order
fn is_reordering(before: &[Arc<SchemaTree>], after: &[Arc<SchemaTree>]) -> bool {
    let rendered = |variants: &[Arc<SchemaTree>]| -> Vec<String> {
        variants.iter().map(|v| v.to_json().to_string()).collect()
    };
    let (mut before, mut after) = (rendered(before), rendered(after));
    if before == after {
        return false;
    }
    before.sort();
    after.sort();
    before == after
}

fn compare_bound(constraint: Constraint, old: &Value, new: &Value) -> Vec<DeltaKind> {
    let tightened = DeltaKind::ConstraintTightened(constraint);
    let loosened = DeltaKind::ConstraintLoosened(constraint);

    if let (Some(o), Some(n)) = (old.as_f64(), new.as_f64()) {
        if o == n {
            return Vec::new();
        }
        return match constraint.bound() {
            Bound::Lower if n > o => vec![tightened],
            Bound::Lower => vec![loosened],
            Bound::Upper if n < o => vec![tightened],
            Bound::Upper => vec![loosened],
            Bound::Divisor if is_multiple(n, o) => vec![tightened],
            Bound::Divisor if is_multiple(o, n) => vec![loosened],
            // unrelated divisors lose some values and gain others
            _ => vec![tightened, loosened],
        };
    }

    if old == new {
        return Vec::new();
    }
    match (constraint.bound(), new.as_bool()) {
        (Bound::Flag, Some(true)) => vec![tightened],
        (Bound::Flag, Some(false)) => vec![loosened],
        // pattern/format containment is undecidable here
        _ => vec![tightened, loosened],
    }
}

fn is_multiple(value: f64, divisor: f64) -> bool {
    let ratio = value / divisor;
    (ratio - ratio.round()).abs() < 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> SchemaTree {
        crate::resolve::resolve_document(&value).unwrap()
    }

    fn kinds(deltas: &[NodeDelta]) -> Vec<ChangeType> {
        deltas.iter().map(|d| d.kind.change_type()).collect()
    }

    #[test]
    fn test_identical_trees() {
        let schema = tree(json!({
            "type": "object",
            "properties": { "a": { "type": "string", "pattern": "^x" } },
            "oneOf": [{ "required": ["a"] }, { "properties": { "b": { "type": "null" } } }]
        }));
        assert!(diff(&schema, &schema).is_empty());
    }

    #[test]
    fn test_type_change_stops_descent() {
        let old = tree(json!({ "type": "object", "properties": { "a": { "type": "object", "properties": { "x": { "type": "string" } } } } }));
        let new = tree(json!({ "type": "object", "properties": { "a": { "type": "array", "items": { "type": "string" } } } }));
        let deltas = diff(&old, &new);
        assert_eq!(kinds(&deltas), vec![ChangeType::TypeChanged]);
        assert_eq!(deltas[0].field(), "properties.a");
        assert_eq!(deltas[0].old_value, Some(json!("object")));
        assert_eq!(deltas[0].new_value, Some(json!("array")));
    }

    #[test]
    fn test_properties_sorted_by_name() {
        let old = tree(json!({ "type": "object", "properties": { "zeta": {}, "alpha": {} } }));
        let new = tree(json!({ "type": "object", "properties": { "mid": {} } }));
        let fields: Vec<String> = diff(&old, &new).iter().map(NodeDelta::field).collect();
        assert_eq!(fields, vec!["properties.alpha", "properties.mid", "properties.zeta"]);
    }

    #[test]
    fn test_required_diffed_independently() {
        let old = tree(json!({ "type": "object", "properties": { "a": { "type": "string" } } }));
        let new = tree(json!({ "type": "object", "properties": { "a": { "type": "string" } }, "required": ["a"] }));
        let deltas = diff(&old, &new);
        assert_eq!(kinds(&deltas), vec![ChangeType::RequiredAdded]);
        assert_eq!(deltas[0].location(), "properties.a");

        let reversed = diff(&new, &old);
        assert_eq!(kinds(&reversed), vec![ChangeType::RequiredRemoved]);
    }

    #[test]
    fn test_added_field_carries_required_flag() {
        let old = tree(json!({ "type": "object", "properties": {} }));
        let new = tree(json!({
            "type": "object",
            "properties": { "id": { "type": "string" }, "tag": { "type": "string", "default": "x" } },
            "required": ["id", "tag"]
        }));
        let deltas = diff(&old, &new);
        assert_eq!(
            deltas[0].kind,
            DeltaKind::FieldAdded { required: true, has_default: false }
        );
        assert_eq!(
            deltas[1].kind,
            DeltaKind::FieldAdded { required: true, has_default: true }
        );
    }

    #[test]
    fn test_constraint_directions() {
        let old = tree(json!({ "type": "string", "minLength": 2, "maxLength": 10 }));
        let new = tree(json!({ "type": "string", "minLength": 1, "maxLength": 5, "format": "email" }));
        let deltas = diff(&old, &new);
        let summary: Vec<(ChangeType, String)> = deltas
            .iter()
            .map(|d| (d.kind.change_type(), d.field()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ChangeType::ConstraintLoosened, "minLength".to_string()),
                (ChangeType::ConstraintTightened, "maxLength".to_string()),
                (ChangeType::ConstraintAdded, "format".to_string()),
            ]
        );
    }

    #[test]
    fn test_numeric_equality_ignores_representation() {
        let old = tree(json!({ "type": "number", "minimum": 1 }));
        let new = tree(json!({ "type": "number", "minimum": 1.0 }));
        assert!(diff(&old, &new).is_empty());
    }

    #[test]
    fn test_multiple_of() {
        let base = tree(json!({ "type": "integer", "multipleOf": 2 }));
        let stricter = tree(json!({ "type": "integer", "multipleOf": 4 }));
        let unrelated = tree(json!({ "type": "integer", "multipleOf": 3 }));
        assert_eq!(kinds(&diff(&base, &stricter)), vec![ChangeType::ConstraintTightened]);
        assert_eq!(kinds(&diff(&stricter, &base)), vec![ChangeType::ConstraintLoosened]);
        assert_eq!(
            kinds(&diff(&base, &unrelated)),
            vec![ChangeType::ConstraintTightened, ChangeType::ConstraintLoosened]
        );
    }

    #[test]
    fn test_enum_partial_overlap_emits_both() {
        let old = tree(json!({ "enum": ["A", "B"] }));
        let new = tree(json!({ "enum": ["B", "C"] }));
        assert_eq!(
            kinds(&diff(&old, &new)),
            vec![ChangeType::EnumNarrowed, ChangeType::EnumWidened]
        );

        let reordered = tree(json!({ "enum": ["B", "A"] }));
        assert!(diff(&old, &reordered).is_empty());
    }

    #[test]
    fn test_const_as_single_value_enum() {
        let old = tree(json!({ "const": "v1" }));
        let new = tree(json!({ "enum": ["v1", "v2"] }));
        let deltas = diff(&old, &new);
        assert_eq!(kinds(&deltas), vec![ChangeType::EnumWidened]);
        assert_eq!(deltas[0].field(), "enum");
    }

    #[test]
    fn test_additional_properties() {
        let open = tree(json!({ "type": "object" }));
        let closed = tree(json!({ "type": "object", "additionalProperties": false }));
        let deltas = diff(&open, &closed);
        assert_eq!(deltas[0].kind, DeltaKind::AdditionalPropertiesChanged { restricting: true });
        assert_eq!(
            diff(&closed, &open)[0].kind,
            DeltaKind::AdditionalPropertiesChanged { restricting: false }
        );

        let map_old = tree(json!({ "type": "object", "additionalProperties": { "type": "integer", "minimum": 0 } }));
        let map_new = tree(json!({ "type": "object", "additionalProperties": { "type": "integer", "minimum": 1 } }));
        let deltas = diff(&map_old, &map_new);
        assert_eq!(deltas[0].field(), "*.minimum");
    }

    #[test]
    fn test_composition_by_position() {
        let old = tree(json!({ "oneOf": [{ "type": "string" }, { "type": "integer" }] }));
        let grown = tree(json!({ "oneOf": [{ "type": "string" }, { "type": "integer" }, { "type": "null" }] }));
        let deltas = diff(&old, &grown);
        assert_eq!(kinds(&deltas), vec![ChangeType::CompositionChanged]);
        assert_eq!(deltas[0].field(), "oneOf");

        let reordered = tree(json!({ "oneOf": [{ "type": "integer" }, { "type": "string" }] }));
        let deltas = diff(&old, &reordered);
        assert_eq!(
            kinds(&deltas),
            vec![ChangeType::CompositionChanged, ChangeType::TypeChanged, ChangeType::TypeChanged]
        );
        assert_eq!(deltas[1].field(), "oneOf.0");
    }

    #[test]
    fn test_tuple_positions() {
        let old = tree(json!({ "type": "array", "prefixItems": [{ "type": "string" }] }));
        let new = tree(json!({ "type": "array", "prefixItems": [{ "type": "string" }, { "type": "integer" }] }));
        let deltas = diff(&old, &new);
        assert_eq!(kinds(&deltas), vec![ChangeType::FieldAdded]);
        assert_eq!(deltas[0].field(), "prefixItems.1");

        let list = tree(json!({ "type": "array", "items": { "type": "string" } }));
        let deltas = diff(&list, &old);
        assert_eq!(kinds(&deltas), vec![ChangeType::TypeChanged]);
        assert_eq!(deltas[0].field(), "items");
    }

    #[test]
    fn test_items_recurse() {
        let old = tree(json!({ "type": "array", "items": { "type": "string", "maxLength": 3 } }));
        let new = tree(json!({ "type": "array", "items": { "type": "string", "maxLength": 8 } }));
        let deltas = diff(&old, &new);
        assert_eq!(kinds(&deltas), vec![ChangeType::ConstraintLoosened]);
        assert_eq!(deltas[0].field(), "items.maxLength");
    }

    #[test]
    fn test_conditional_branches() {
        let old = tree(json!({
            "type": "object",
            "if": { "properties": { "kind": { "const": "a" } } },
            "then": { "required": ["x"] }
        }));
        let new = tree(json!({
            "type": "object",
            "if": { "properties": { "kind": { "const": "a" } } },
            "then": { "required": ["x"] },
            "else": { "required": ["y"] }
        }));
        let deltas = diff(&old, &new);
        assert_eq!(kinds(&deltas), vec![ChangeType::CompositionChanged]);
        assert_eq!(deltas[0].field(), "else");
    }

    #[test]
    fn test_any_against_never() {
        assert!(diff(&tree(json!(true)), &tree(json!({}))).is_empty());
        let deltas = diff(&tree(json!(true)), &tree(json!(false)));
        assert_eq!(kinds(&deltas), vec![ChangeType::TypeChanged]);
        assert_eq!(deltas[0].location(), "$");
    }

    #[test]
    fn test_any_admits_concrete_kinds() {
        let anything = tree(json!({}));
        let string = tree(json!({ "type": "string" }));
        assert!(diff(&anything, &string).is_empty());
        assert!(diff(&string, &anything).is_empty());

        let bounded = tree(json!({ "type": "string", "maxLength": 5 }));
        assert!(diff(&tree(json!(true)), &bounded).is_empty());
        assert!(diff(&bounded, &anything).is_empty());

        // an untyped node with keywords is compared keyword by keyword
        let loose = tree(json!({ "maxLength": 10 }));
        let deltas = diff(&loose, &bounded);
        assert_eq!(kinds(&deltas), vec![ChangeType::ConstraintTightened]);
        assert_eq!(deltas[0].field(), "maxLength");

        assert_eq!(kinds(&diff(&anything, &tree(json!(false)))), vec![ChangeType::TypeChanged]);

        let list = tree(json!({ "type": "array" }));
        let typed = tree(json!({ "type": "array", "items": { "type": "integer" } }));
        assert!(diff(&list, &typed).is_empty());
        assert!(diff(&typed, &list).is_empty());
    }

    #[test]
    fn test_closed_values_compare_numerically() {
        let ints = tree(json!({ "enum": [1, 2] }));
        let floats = tree(json!({ "enum": [1.0, 2.0] }));
        assert!(diff(&ints, &floats).is_empty());
        assert!(diff(&tree(json!({ "const": 5 })), &tree(json!({ "const": 5.0 }))).is_empty());

        let shifted = tree(json!({ "enum": [1.5, 2] }));
        assert_eq!(
            kinds(&diff(&ints, &shifted)),
            vec![ChangeType::EnumNarrowed, ChangeType::EnumWidened]
        );
    }

    #[test]
    fn test_recursion_spelling_is_not_a_change() {
        let old = tree(json!({
            "$ref": "#/definitions/Node",
            "definitions": {
                "Node": { "type": "object", "properties": { "next": { "$ref": "#/definitions/Node" } } }
            }
        }));
        let new = tree(json!({
            "$ref": "#/$defs/ListNode",
            "$defs": {
                "ListNode": { "type": "object", "properties": { "next": { "$ref": "#/$defs/ListNode" } } }
            }
        }));
        assert!(diff(&old, &new).is_empty());
    }

    #[test]
    fn test_shared_target_reported_once() {
        let schema = |max: u64| {
            tree(json!({
                "type": "object",
                "properties": {
                    "billing": { "$ref": "#/$defs/Address" },
                    "shipping": { "$ref": "#/$defs/Address" }
                },
                "$defs": { "Address": { "type": "string", "maxLength": max } }
            }))
        };
        let deltas = diff(&schema(3), &schema(5));
        assert_eq!(kinds(&deltas), vec![ChangeType::ConstraintLoosened]);
        assert_eq!(deltas[0].field(), "properties.billing.maxLength");
    }
}
