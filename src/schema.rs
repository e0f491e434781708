//! Normalized JSON Schema trees
//!
//! Parses any of the supported drafts (04, 06, 07, 2019-09, 2020-12) into a
//! single draft-agnostic [`SchemaTree`]. Draft differences are folded away here
//! so the differ never has to know which dialect a document was written in:
//!
//! - draft-04 boolean `exclusiveMinimum`/`exclusiveMaximum` become numeric bounds
//! - array-form `items` + `additionalItems` become `prefixItems` + trailing items
//! - `type: [a, b]` becomes an `anyOf` of single-typed variants
//! - `additionalProperties: true` and `additionalProperties: {}` are the default
//! - `uniqueItems: false` is dropped
//!
//! Child nodes are reference counted so that the resolver can share one
//! expansion of a `$ref` target between every place that points at it.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EvolutionError, Result};

/// Composition keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompositionKind {
    #[serde(rename = "allOf")]
    AllOf,
    #[serde(rename = "anyOf")]
    AnyOf,
    #[serde(rename = "oneOf")]
    OneOf,
}

impl CompositionKind {
    pub const ALL: [CompositionKind; 3] = [
        CompositionKind::AllOf,
        CompositionKind::AnyOf,
        CompositionKind::OneOf,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            CompositionKind::AllOf => "allOf",
            CompositionKind::AnyOf => "anyOf",
            CompositionKind::OneOf => "oneOf",
        }
    }

    fn as_kind(&self) -> SchemaKind {
        match self {
            CompositionKind::AllOf => SchemaKind::AllOf,
            CompositionKind::AnyOf => SchemaKind::AnyOf,
            CompositionKind::OneOf => SchemaKind::OneOf,
        }
    }
}

/// What a schema node describes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    /// `true` or `{}`: accepts anything
    Any,
    /// `false`: accepts nothing
    Never,
    Null,
    Boolean,
    String,
    Number,
    Integer,
    Array,
    Object,
    OneOf,
    AnyOf,
    AllOf,
    /// Unresolved `$ref`; only present between parsing and resolution
    Ref(String),
    /// Re-entry into a reference that is already being expanded, counted in
    /// reference frames outward from the innermost one (0 is the nearest)
    Recursive(usize),
}

impl SchemaKind {
    /// Map a JSON Schema `type` name to a kind
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "null" => Some(SchemaKind::Null),
            "boolean" => Some(SchemaKind::Boolean),
            "string" => Some(SchemaKind::String),
            "number" => Some(SchemaKind::Number),
            "integer" => Some(SchemaKind::Integer),
            "array" => Some(SchemaKind::Array),
            "object" => Some(SchemaKind::Object),
            _ => None,
        }
    }

    /// The JSON Schema `type` name, for kinds that have one
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            SchemaKind::Null => Some("null"),
            SchemaKind::Boolean => Some("boolean"),
            SchemaKind::String => Some("string"),
            SchemaKind::Number => Some("number"),
            SchemaKind::Integer => Some("integer"),
            SchemaKind::Array => Some("array"),
            SchemaKind::Object => Some("object"),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SchemaKind::Number | SchemaKind::Integer)
    }

    fn rank(&self) -> u8 {
        match self {
            SchemaKind::Any => 0,
            SchemaKind::Never => 1,
            SchemaKind::Null => 2,
            SchemaKind::Boolean => 3,
            SchemaKind::String => 4,
            SchemaKind::Number => 5,
            SchemaKind::Integer => 6,
            SchemaKind::Array => 7,
            SchemaKind::Object => 8,
            SchemaKind::OneOf => 9,
            SchemaKind::AnyOf => 10,
            SchemaKind::AllOf => 11,
            SchemaKind::Ref(_) => 12,
            SchemaKind::Recursive(_) => 13,
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaKind::Any => write!(f, "any"),
            SchemaKind::Never => write!(f, "never"),
            SchemaKind::OneOf => write!(f, "oneOf"),
            SchemaKind::AnyOf => write!(f, "anyOf"),
            SchemaKind::AllOf => write!(f, "allOf"),
            SchemaKind::Ref(target) => write!(f, "$ref({})", target),
            SchemaKind::Recursive(depth) => write!(f, "recursive(^{})", depth),
            other => write!(f, "{}", other.type_name().unwrap_or("unknown")),
        }
    }
}

/// How a constraint's value relates to strictness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Raising the value is stricter (`minLength`, `minimum`, ...)
    Lower,
    /// Lowering the value is stricter (`maxLength`, `maximum`, ...)
    Upper,
    /// `multipleOf`: a multiple of the old divisor is stricter
    Divisor,
    /// Boolean switch where `true` is stricter (`uniqueItems`)
    Flag,
    /// No ordering between values (`pattern`, `format`)
    Opaque,
}

/// A recognized validation keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Constraint {
    MinLength,
    MaxLength,
    Pattern,
    Format,
    Minimum,
    Maximum,
    ExclusiveMinimum,
    ExclusiveMaximum,
    MultipleOf,
    MinItems,
    MaxItems,
    UniqueItems,
    MinProperties,
    MaxProperties,
}

impl Constraint {
    pub const ALL: [Constraint; 14] = [
        Constraint::MinLength,
        Constraint::MaxLength,
        Constraint::Pattern,
        Constraint::Format,
        Constraint::Minimum,
        Constraint::Maximum,
        Constraint::ExclusiveMinimum,
        Constraint::ExclusiveMaximum,
        Constraint::MultipleOf,
        Constraint::MinItems,
        Constraint::MaxItems,
        Constraint::UniqueItems,
        Constraint::MinProperties,
        Constraint::MaxProperties,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Constraint::MinLength => "minLength",
            Constraint::MaxLength => "maxLength",
            Constraint::Pattern => "pattern",
            Constraint::Format => "format",
            Constraint::Minimum => "minimum",
            Constraint::Maximum => "maximum",
            Constraint::ExclusiveMinimum => "exclusiveMinimum",
            Constraint::ExclusiveMaximum => "exclusiveMaximum",
            Constraint::MultipleOf => "multipleOf",
            Constraint::MinItems => "minItems",
            Constraint::MaxItems => "maxItems",
            Constraint::UniqueItems => "uniqueItems",
            Constraint::MinProperties => "minProperties",
            Constraint::MaxProperties => "maxProperties",
        }
    }

    pub fn bound(&self) -> Bound {
        match self {
            Constraint::MinLength
            | Constraint::Minimum
            | Constraint::ExclusiveMinimum
            | Constraint::MinItems
            | Constraint::MinProperties => Bound::Lower,
            Constraint::MaxLength
            | Constraint::Maximum
            | Constraint::ExclusiveMaximum
            | Constraint::MaxItems
            | Constraint::MaxProperties => Bound::Upper,
            Constraint::MultipleOf => Bound::Divisor,
            Constraint::UniqueItems => Bound::Flag,
            Constraint::Pattern | Constraint::Format => Bound::Opaque,
        }
    }

    /// Whether this keyword constrains instances of `kind`
    pub fn applies_to(&self, kind: &SchemaKind) -> bool {
        match self {
            Constraint::MinLength
            | Constraint::MaxLength
            | Constraint::Pattern
            | Constraint::Format => matches!(kind, SchemaKind::String | SchemaKind::Any),
            Constraint::Minimum
            | Constraint::Maximum
            | Constraint::ExclusiveMinimum
            | Constraint::ExclusiveMaximum
            | Constraint::MultipleOf => kind.is_numeric() || *kind == SchemaKind::Any,
            Constraint::MinItems | Constraint::MaxItems | Constraint::UniqueItems => {
                matches!(kind, SchemaKind::Array | SchemaKind::Any)
            }
            Constraint::MinProperties | Constraint::MaxProperties => {
                matches!(kind, SchemaKind::Object | SchemaKind::Any)
            }
        }
    }

    /// Format annotations are advisory in most validators
    pub fn is_cosmetic(&self) -> bool {
        matches!(self, Constraint::Format)
    }

    fn validate(&self, value: &Value, path: &str) -> Result<()> {
        let ok = match self.bound() {
            Bound::Lower | Bound::Upper => value.is_number(),
            Bound::Divisor => value.as_f64().map(|d| d > 0.0).unwrap_or(false),
            Bound::Flag => value.is_boolean(),
            Bound::Opaque => value.is_string(),
        };
        if ok {
            Ok(())
        } else {
            Err(EvolutionError::invalid(
                path,
                format!("`{}` has malformed value {}", self.keyword(), value),
            ))
        }
    }
}

/// Array item schemas
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    /// Every element matches one schema
    List(Arc<SchemaTree>),
    /// Positional schemas, then an optional schema for the remaining elements
    Tuple {
        prefix: Vec<Arc<SchemaTree>>,
        rest: Option<Arc<SchemaTree>>,
    },
}

/// `additionalProperties`
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AdditionalProperties {
    #[default]
    Allowed,
    Forbidden,
    Schema(Arc<SchemaTree>),
}

impl AdditionalProperties {
    pub fn label(&self) -> &'static str {
        match self {
            AdditionalProperties::Allowed => "true",
            AdditionalProperties::Forbidden => "false",
            AdditionalProperties::Schema(_) => "schema",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AdditionalProperties::Allowed => Value::Bool(true),
            AdditionalProperties::Forbidden => Value::Bool(false),
            AdditionalProperties::Schema(tree) => child_json(tree),
        }
    }
}

/// `if` / `then` / `else`
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub condition: Arc<SchemaTree>,
    pub then_branch: Option<Arc<SchemaTree>>,
    pub else_branch: Option<Arc<SchemaTree>>,
}

/// A normalized schema node
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaTree {
    pub kind: SchemaKind,
    pub constraints: BTreeMap<Constraint, Value>,
    /// Declaration order is preserved
    pub properties: Vec<(String, Arc<SchemaTree>)>,
    pub required: BTreeSet<String>,
    pub additional_properties: AdditionalProperties,
    pub items: Option<Items>,
    pub enum_values: Option<Vec<Value>>,
    pub const_value: Option<Value>,
    pub composition: BTreeMap<CompositionKind, Vec<Arc<SchemaTree>>>,
    pub conditional: Option<Conditional>,
    pub default: Option<Value>,
    /// `$ref` this node was expanded from, or the one a recursion sentinel re-enters
    pub reference: Option<String>,
}

impl SchemaTree {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            constraints: BTreeMap::new(),
            properties: Vec::new(),
            required: BTreeSet::new(),
            additional_properties: AdditionalProperties::Allowed,
            items: None,
            enum_values: None,
            const_value: None,
            composition: BTreeMap::new(),
            conditional: None,
            default: None,
            reference: None,
        }
    }

    pub fn any() -> Self {
        Self::new(SchemaKind::Any)
    }

    pub fn never() -> Self {
        Self::new(SchemaKind::Never)
    }

    /// Parse a schema document (or fragment)
    pub fn from_json(value: &Value) -> Result<Self> {
        parse_node(value, "#")
    }

    /// Look up a declared property
    pub fn property(&self, name: &str) -> Option<&SchemaTree> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, tree)| tree.as_ref())
    }

    /// `true`/`{}` with nothing else attached
    pub fn is_unconstrained(&self) -> bool {
        self.kind == SchemaKind::Any
            && self.constraints.is_empty()
            && self.properties.is_empty()
            && self.required.is_empty()
            && self.additional_properties == AdditionalProperties::Allowed
            && self.items.is_none()
            && self.enum_values.is_none()
            && self.const_value.is_none()
            && self.composition.is_empty()
            && self.conditional.is_none()
    }

    /// Closed value set from `const` or `enum`, `const` taking precedence
    pub fn closed_values(&self) -> Option<Vec<Value>> {
        match (&self.const_value, &self.enum_values) {
            (Some(value), _) => Some(vec![value.clone()]),
            (None, Some(values)) => Some(values.clone()),
            (None, None) => None,
        }
    }

    /// Direct child schemas, in rendering order
    pub fn children(&self) -> Vec<&Arc<SchemaTree>> {
        let mut children: Vec<&Arc<SchemaTree>> = self.properties.iter().map(|(_, t)| t).collect();
        if let AdditionalProperties::Schema(tree) = &self.additional_properties {
            children.push(tree);
        }
        match &self.items {
            Some(Items::List(tree)) => children.push(tree),
            Some(Items::Tuple { prefix, rest }) => {
                children.extend(prefix.iter());
                children.extend(rest.iter());
            }
            None => {}
        }
        children.extend(self.composition.values().flatten());
        if let Some(cond) = &self.conditional {
            children.push(&cond.condition);
            children.extend(cond.then_branch.iter());
            children.extend(cond.else_branch.iter());
        }
        children
    }

    /// Number of distinct nodes; a shared reference target counts once
    pub fn node_count(&self) -> usize {
        let mut seen = HashSet::new();
        1 + self
            .children()
            .into_iter()
            .map(|child| count_distinct(child, &mut seen))
            .sum::<usize>()
    }

    /// Render back to canonical JSON Schema (2020-12 vocabulary)
    ///
    /// Children expanded from a `$ref` render as that `$ref`, so the output
    /// stays as small as the source document.
    pub fn to_json(&self) -> Value {
        match &self.kind {
            SchemaKind::Never => return Value::Bool(false),
            SchemaKind::Any if self.is_unconstrained() => return Value::Object(Map::new()),
            SchemaKind::Ref(target) => return ref_json(target),
            SchemaKind::Recursive(_) => return ref_json(self.reference.as_deref().unwrap_or("#")),
            _ => {}
        }

        let mut map = Map::new();
        if let Some(name) = self.kind.type_name() {
            map.insert("type".to_string(), Value::String(name.to_string()));
        }
        for (constraint, value) in &self.constraints {
            map.insert(constraint.keyword().to_string(), value.clone());
        }
        if !self.properties.is_empty() {
            let props: Map<String, Value> = self
                .properties
                .iter()
                .map(|(name, tree)| (name.clone(), child_json(tree)))
                .collect();
            map.insert("properties".to_string(), Value::Object(props));
        }
        if !self.required.is_empty() {
            let required = self.required.iter().cloned().map(Value::String).collect();
            map.insert("required".to_string(), Value::Array(required));
        }
        if self.additional_properties != AdditionalProperties::Allowed {
            map.insert(
                "additionalProperties".to_string(),
                self.additional_properties.to_json(),
            );
        }
        match &self.items {
            Some(Items::List(tree)) => {
                map.insert("items".to_string(), child_json(tree));
            }
            Some(Items::Tuple { prefix, rest }) => {
                let prefix = prefix.iter().map(|t| child_json(t)).collect();
                map.insert("prefixItems".to_string(), Value::Array(prefix));
                if let Some(rest) = rest {
                    map.insert("items".to_string(), child_json(rest));
                }
            }
            None => {}
        }
        if let Some(values) = &self.enum_values {
            map.insert("enum".to_string(), Value::Array(values.clone()));
        }
        if let Some(value) = &self.const_value {
            map.insert("const".to_string(), value.clone());
        }
        for (kind, variants) in &self.composition {
            let variants = variants.iter().map(|t| child_json(t)).collect();
            map.insert(kind.keyword().to_string(), Value::Array(variants));
        }
        if let Some(cond) = &self.conditional {
            map.insert("if".to_string(), child_json(&cond.condition));
            if let Some(then_branch) = &cond.then_branch {
                map.insert("then".to_string(), child_json(then_branch));
            }
            if let Some(else_branch) = &cond.else_branch {
                map.insert("else".to_string(), child_json(else_branch));
            }
        }
        if let Some(default) = &self.default {
            map.insert("default".to_string(), default.clone());
        }
        Value::Object(map)
    }
}

fn count_distinct(node: &Arc<SchemaTree>, seen: &mut HashSet<*const SchemaTree>) -> usize {
    if !seen.insert(Arc::as_ptr(node)) {
        return 0;
    }
    1 + node
        .children()
        .into_iter()
        .map(|child| count_distinct(child, seen))
        .sum::<usize>()
}

fn ref_json(target: &str) -> Value {
    let mut map = Map::new();
    map.insert("$ref".to_string(), Value::String(target.to_string()));
    Value::Object(map)
}

fn child_json(tree: &SchemaTree) -> Value {
    match &tree.reference {
        Some(target) => ref_json(target),
        None => tree.to_json(),
    }
}

/// JSON equality that compares numbers by value, so `1` equals `1.0`
pub(crate) fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => x.as_f64() == y.as_f64(),
            },
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_value(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).map(|y| same_value(x, y)).unwrap_or(false))
        }
        _ => a == b,
    }
}

/// Name of a JSON value's type, for error messages
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Append a segment to a JSON pointer, escaping `~` and `/`
pub(crate) fn pointer_child(pointer: &str, segment: &str) -> String {
    let escaped = segment.replace('~', "~0").replace('/', "~1");
    format!("{}/{}", pointer, escaped)
}

const OBJECT_KEYWORDS: [&str; 6] = [
    "properties",
    "required",
    "additionalProperties",
    "patternProperties",
    "minProperties",
    "maxProperties",
];

const ARRAY_KEYWORDS: [&str; 6] = [
    "items",
    "prefixItems",
    "additionalItems",
    "minItems",
    "maxItems",
    "uniqueItems",
];

pub(crate) fn parse_node(value: &Value, path: &str) -> Result<SchemaTree> {
    match value {
        Value::Bool(true) => Ok(SchemaTree::any()),
        Value::Bool(false) => Ok(SchemaTree::never()),
        Value::Object(map) => parse_object(map, path),
        other => Err(EvolutionError::invalid(
            path,
            format!("expected an object or boolean schema, found {}", json_type_name(other)),
        )),
    }
}

fn parse_object(map: &Map<String, Value>, path: &str) -> Result<SchemaTree> {
    if let Some(reference) = map.get("$ref") {
        let target = reference.as_str().ok_or_else(|| {
            EvolutionError::invalid(path, "`$ref` must be a string")
        })?;
        return Ok(SchemaTree::new(SchemaKind::Ref(target.to_string())));
    }

    let mut types = parse_types(map.get("type"), path)?;
    match types.len() {
        0 => {
            let kind = infer_kind(map);
            parse_body(map, path, kind)
        }
        1 => parse_body(map, path, types.remove(0)),
        _ => {
            // (T1 | T2) & rest == (T1 & rest) | (T2 & rest)
            let variants = types
                .into_iter()
                .map(|kind| parse_body(map, path, kind).map(Arc::new))
                .collect::<Result<Vec<_>>>()?;
            let mut union = SchemaTree::new(SchemaKind::AnyOf);
            union.default = map.get("default").cloned();
            union.composition.insert(CompositionKind::AnyOf, variants);
            Ok(union)
        }
    }
}

fn parse_types(value: Option<&Value>, path: &str) -> Result<Vec<SchemaKind>> {
    let names: Vec<&Value> = match value {
        None => return Ok(Vec::new()),
        Some(Value::Array(names)) if names.is_empty() => {
            return Err(EvolutionError::invalid(path, "`type` array is empty"));
        }
        Some(Value::Array(names)) => names.iter().collect(),
        Some(single) => vec![single],
    };

    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        let name = name
            .as_str()
            .ok_or_else(|| EvolutionError::invalid(path, format!("`type` entry {} is not a string", name)))?;
        let kind = SchemaKind::from_type_name(name)
            .ok_or_else(|| EvolutionError::invalid(path, format!("unrecognized type '{}'", name)))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds.sort_by_key(SchemaKind::rank);
    Ok(kinds)
}

fn infer_kind(map: &Map<String, Value>) -> SchemaKind {
    if OBJECT_KEYWORDS.iter().any(|k| map.contains_key(*k)) {
        return SchemaKind::Object;
    }
    if ARRAY_KEYWORDS.iter().any(|k| map.contains_key(*k)) {
        return SchemaKind::Array;
    }
    CompositionKind::ALL
        .iter()
        .find(|c| map.contains_key(c.keyword()))
        .map(CompositionKind::as_kind)
        .unwrap_or(SchemaKind::Any)
}

fn parse_body(map: &Map<String, Value>, path: &str, kind: SchemaKind) -> Result<SchemaTree> {
    let mut tree = SchemaTree::new(kind);
    tree.constraints = parse_constraints(map, path, &tree.kind)?;

    if tree.kind == SchemaKind::Object {
        parse_object_shape(map, path, &mut tree)?;
    }
    if tree.kind == SchemaKind::Array {
        tree.items = parse_items(map, path)?;
    }

    if let Some(values) = map.get("enum") {
        let values = values.as_array().ok_or_else(|| {
            EvolutionError::invalid(path, format!("`enum` must be an array, found {}", json_type_name(values)))
        })?;
        tree.enum_values = Some(values.clone());
    }
    tree.const_value = map.get("const").cloned();
    tree.default = map.get("default").cloned();

    for kind in CompositionKind::ALL {
        let Some(value) = map.get(kind.keyword()) else {
            continue;
        };
        let variants = value.as_array().ok_or_else(|| {
            EvolutionError::invalid(path, format!("`{}` must be an array", kind.keyword()))
        })?;
        if variants.is_empty() {
            return Err(EvolutionError::invalid(
                path,
                format!("`{}` must not be empty", kind.keyword()),
            ));
        }
        let variant_path = pointer_child(path, kind.keyword());
        let variants = variants
            .iter()
            .enumerate()
            .map(|(i, v)| parse_node(v, &pointer_child(&variant_path, &i.to_string())).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        tree.composition.insert(kind, variants);
    }

    if let Some(condition) = map.get("if") {
        let branch = |keyword: &str| -> Result<Option<Arc<SchemaTree>>> {
            map.get(keyword)
                .map(|v| parse_node(v, &pointer_child(path, keyword)).map(Arc::new))
                .transpose()
        };
        tree.conditional = Some(Conditional {
            condition: Arc::new(parse_node(condition, &pointer_child(path, "if"))?),
            then_branch: branch("then")?,
            else_branch: branch("else")?,
        });
    }

    Ok(tree)
}

fn parse_constraints(
    map: &Map<String, Value>,
    path: &str,
    kind: &SchemaKind,
) -> Result<BTreeMap<Constraint, Value>> {
    let mut constraints = BTreeMap::new();
    for constraint in Constraint::ALL {
        if !constraint.applies_to(kind) {
            continue;
        }
        let Some(value) = map.get(constraint.keyword()) else {
            continue;
        };
        match (constraint, value) {
            // draft-04: boolean exclusive flags modify minimum/maximum
            (Constraint::ExclusiveMinimum | Constraint::ExclusiveMaximum, Value::Bool(_)) => {}
            (Constraint::UniqueItems, Value::Bool(false)) => {}
            _ => {
                constraint.validate(value, path)?;
                constraints.insert(constraint, value.clone());
            }
        }
    }

    for (exclusive, inclusive) in [
        (Constraint::ExclusiveMinimum, Constraint::Minimum),
        (Constraint::ExclusiveMaximum, Constraint::Maximum),
    ] {
        if !exclusive.applies_to(kind) {
            continue;
        }
        if let Some(Value::Bool(true)) = map.get(exclusive.keyword()) {
            let bound = constraints.remove(&inclusive).ok_or_else(|| {
                EvolutionError::invalid(
                    path,
                    format!("`{}: true` without `{}`", exclusive.keyword(), inclusive.keyword()),
                )
            })?;
            constraints.insert(exclusive, bound);
        }
    }

    Ok(constraints)
}

fn parse_object_shape(map: &Map<String, Value>, path: &str, tree: &mut SchemaTree) -> Result<()> {
    if let Some(props) = map.get("properties") {
        let props = props
            .as_object()
            .ok_or_else(|| EvolutionError::invalid(path, "`properties` must be an object"))?;
        let props_path = pointer_child(path, "properties");
        for (name, schema) in props {
            let child = parse_node(schema, &pointer_child(&props_path, name))?;
            tree.properties.push((name.clone(), Arc::new(child)));
        }
    }

    if let Some(required) = map.get("required") {
        let required = required
            .as_array()
            .ok_or_else(|| EvolutionError::invalid(path, "`required` must be an array"))?;
        for name in required {
            let name = name.as_str().ok_or_else(|| {
                EvolutionError::invalid(path, format!("`required` entry {} is not a string", name))
            })?;
            tree.required.insert(name.to_string());
        }
    }

    tree.additional_properties = match map.get("additionalProperties") {
        None | Some(Value::Bool(true)) => AdditionalProperties::Allowed,
        Some(Value::Bool(false)) => AdditionalProperties::Forbidden,
        Some(schema) => {
            let parsed = parse_node(schema, &pointer_child(path, "additionalProperties"))?;
            if parsed.is_unconstrained() {
                AdditionalProperties::Allowed
            } else {
                AdditionalProperties::Schema(Arc::new(parsed))
            }
        }
    };
    Ok(())
}

fn parse_items(map: &Map<String, Value>, path: &str) -> Result<Option<Items>> {
    let schema_at = |keyword: &str| -> Result<Option<Arc<SchemaTree>>> {
        map.get(keyword)
            .map(|v| parse_node(v, &pointer_child(path, keyword)).map(Arc::new))
            .transpose()
    };
    let tuple = |values: &Vec<Value>, keyword: &str| -> Result<Vec<Arc<SchemaTree>>> {
        let base = pointer_child(path, keyword);
        values
            .iter()
            .enumerate()
            .map(|(i, v)| parse_node(v, &pointer_child(&base, &i.to_string())).map(Arc::new))
            .collect()
    };

    // 2020-12
    if let Some(prefix) = map.get("prefixItems") {
        let prefix = prefix
            .as_array()
            .ok_or_else(|| EvolutionError::invalid(path, "`prefixItems` must be an array"))?;
        return Ok(Some(Items::Tuple {
            prefix: tuple(prefix, "prefixItems")?,
            rest: schema_at("items")?,
        }));
    }

    match map.get("items") {
        // draft-04 .. 2019-09 tuple form
        Some(Value::Array(prefix)) => Ok(Some(Items::Tuple {
            prefix: tuple(prefix, "items")?,
            rest: schema_at("additionalItems")?,
        })),
        Some(_) => Ok(schema_at("items")?.map(Items::List)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean_schemas() {
        assert_eq!(SchemaTree::from_json(&json!(true)).unwrap().kind, SchemaKind::Any);
        assert_eq!(SchemaTree::from_json(&json!(false)).unwrap().kind, SchemaKind::Never);
        assert!(SchemaTree::from_json(&json!({})).unwrap().is_unconstrained());
    }

    #[test]
    fn test_non_schema_value_rejected() {
        let err = SchemaTree::from_json(&json!(42)).unwrap_err();
        assert!(matches!(err, EvolutionError::InvalidSchema { .. }));

        let err = SchemaTree::from_json(&json!({ "type": "strnig" })).unwrap_err();
        assert!(err.to_string().contains("strnig"));
    }

    #[test]
    fn test_object_shape() {
        let tree = SchemaTree::from_json(&json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "minLength": 1 },
                "age": { "type": "integer" }
            },
            "required": ["name"],
            "additionalProperties": false
        }))
        .unwrap();

        assert_eq!(tree.kind, SchemaKind::Object);
        assert_eq!(tree.properties.len(), 2);
        assert!(tree.required.contains("name"));
        assert_eq!(tree.additional_properties, AdditionalProperties::Forbidden);
        let name = tree.property("name").unwrap();
        assert_eq!(name.constraints.get(&Constraint::MinLength), Some(&json!(1)));
    }

    #[test]
    fn test_constraints_scoped_by_kind() {
        let tree = SchemaTree::from_json(&json!({ "type": "integer", "minLength": 3, "minimum": 1 })).unwrap();
        assert!(!tree.constraints.contains_key(&Constraint::MinLength));
        assert!(tree.constraints.contains_key(&Constraint::Minimum));
    }

    #[test]
    fn test_draft04_exclusive_minimum() {
        let draft04 = SchemaTree::from_json(&json!({
            "type": "number", "minimum": 5, "exclusiveMinimum": true
        }))
        .unwrap();
        let draft06 = SchemaTree::from_json(&json!({
            "type": "number", "exclusiveMinimum": 5
        }))
        .unwrap();
        assert_eq!(draft04, draft06);

        let inclusive = SchemaTree::from_json(&json!({
            "type": "number", "minimum": 5, "exclusiveMinimum": false
        }))
        .unwrap();
        assert_eq!(inclusive.constraints.get(&Constraint::Minimum), Some(&json!(5)));
        assert!(!inclusive.constraints.contains_key(&Constraint::ExclusiveMinimum));
    }

    #[test]
    fn test_tuple_forms_normalize() {
        let legacy = SchemaTree::from_json(&json!({
            "type": "array",
            "items": [{ "type": "string" }, { "type": "integer" }],
            "additionalItems": false
        }))
        .unwrap();
        let modern = SchemaTree::from_json(&json!({
            "type": "array",
            "prefixItems": [{ "type": "string" }, { "type": "integer" }],
            "items": false
        }))
        .unwrap();
        assert_eq!(legacy, modern);
    }

    #[test]
    fn test_type_array_becomes_any_of() {
        let tree = SchemaTree::from_json(&json!({ "type": ["string", "null"], "maxLength": 4 })).unwrap();
        assert_eq!(tree.kind, SchemaKind::AnyOf);
        let variants = &tree.composition[&CompositionKind::AnyOf];
        assert_eq!(variants[0].kind, SchemaKind::Null);
        assert_eq!(variants[1].kind, SchemaKind::String);
        assert!(variants[1].constraints.contains_key(&Constraint::MaxLength));
    }

    #[test]
    fn test_kind_inference() {
        let tree = SchemaTree::from_json(&json!({ "properties": { "a": {} } })).unwrap();
        assert_eq!(tree.kind, SchemaKind::Object);

        let tree = SchemaTree::from_json(&json!({ "oneOf": [{ "type": "string" }, { "type": "null" }] })).unwrap();
        assert_eq!(tree.kind, SchemaKind::OneOf);

        let tree = SchemaTree::from_json(&json!({ "enum": ["A", "B"] })).unwrap();
        assert_eq!(tree.kind, SchemaKind::Any);
        assert_eq!(tree.closed_values().unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_keywords() {
        assert!(SchemaTree::from_json(&json!({ "enum": "A" })).is_err());
        assert!(SchemaTree::from_json(&json!({ "type": "string", "minLength": "3" })).is_err());
        assert!(SchemaTree::from_json(&json!({ "type": "number", "multipleOf": 0 })).is_err());
        assert!(SchemaTree::from_json(&json!({ "$ref": 7 })).is_err());
    }

    #[test]
    fn test_render_round_trip() {
        let source = json!({
            "type": "object",
            "properties": {
                "tags": { "type": "array", "items": { "type": "string" }, "uniqueItems": true },
                "kind": { "enum": ["a", "b"] }
            },
            "required": ["tags"],
            "additionalProperties": { "type": "integer" }
        });
        let tree = SchemaTree::from_json(&source).unwrap();
        let reparsed = SchemaTree::from_json(&tree.to_json()).unwrap();
        assert_eq!(tree, reparsed);
    }

    #[test]
    fn test_same_value_is_numeric() {
        assert!(same_value(&json!(1), &json!(1.0)));
        assert!(same_value(&json!([1, { "n": 2 }]), &json!([1.0, { "n": 2.0 }])));
        assert!(same_value(&json!(u64::MAX), &json!(u64::MAX)));
        assert!(!same_value(&json!(-1), &json!(1.0)));
        assert!(!same_value(&json!(1), &json!("1")));
        assert!(!same_value(&json!({ "n": 1 }), &json!({ "m": 1 })));
    }
}
