//! Compatibility classification
//!
//! Turns raw deltas into [`SchemaChange`]s under a [`CompatibilityMode`].
//!
//! BACKWARD means the new schema must accept data written under the old one,
//! so anything that makes the new schema stricter breaks it. FORWARD is the
//! mirror image: the old schema must accept data written under the new one,
//! so loosening breaks it. FULL is breaking when either direction is. NONE
//! never blocks, but changes are still reported.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::{ChangeType, DeltaKind, NodeDelta};
use crate::error::EvolutionError;
use crate::schema::{same_value, Bound};

/// Registry compatibility contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompatibilityMode {
    #[default]
    Backward,
    Forward,
    Full,
    None,
}

impl CompatibilityMode {
    pub const ALL: [CompatibilityMode; 4] = [
        CompatibilityMode::Backward,
        CompatibilityMode::Forward,
        CompatibilityMode::Full,
        CompatibilityMode::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityMode::Backward => "BACKWARD",
            CompatibilityMode::Forward => "FORWARD",
            CompatibilityMode::Full => "FULL",
            CompatibilityMode::None => "NONE",
        }
    }
}

impl fmt::Display for CompatibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompatibilityMode {
    type Err = EvolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CompatibilityMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EvolutionError::InvalidMode(s.to_string()))
    }
}

/// Severity of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Impact {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Impact::Low => "LOW",
            Impact::Medium => "MEDIUM",
            Impact::High => "HIGH",
            Impact::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// A classified difference between two schema versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// Dotted path including the keyword (e.g., "properties.age.minimum")
    pub field: String,
    /// Dotted path of the schema node the change belongs to
    pub location: String,
    /// Keyword the change is about, when keyword-level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub description: String,
    pub breaking: bool,
    pub impact: Impact,
    /// For added and removed fields: required in the schema that has the field
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// Whether the new schema may reject data valid under the old one
pub fn breaks_backward(kind: &DeltaKind) -> bool {
    match kind {
        DeltaKind::FieldAdded { required, has_default } => *required && !*has_default,
        DeltaKind::AdditionalPropertiesChanged { restricting } => *restricting,
        DeltaKind::RequiredAdded
        | DeltaKind::TypeChanged
        | DeltaKind::ConstraintTightened(_)
        | DeltaKind::ConstraintAdded(_)
        | DeltaKind::EnumNarrowed
        | DeltaKind::CompositionChanged => true,
        DeltaKind::FieldRemoved { .. }
        | DeltaKind::RequiredRemoved
        | DeltaKind::ConstraintLoosened(_)
        | DeltaKind::ConstraintRemoved(_)
        | DeltaKind::EnumWidened => false,
    }
}

/// Whether the old schema may reject data valid under the new one
pub fn breaks_forward(kind: &DeltaKind) -> bool {
    match kind {
        DeltaKind::FieldRemoved { .. }
        | DeltaKind::TypeChanged
        | DeltaKind::ConstraintLoosened(_)
        | DeltaKind::ConstraintRemoved(_)
        | DeltaKind::EnumWidened
        | DeltaKind::CompositionChanged => true,
        DeltaKind::FieldAdded { .. }
        | DeltaKind::RequiredAdded
        | DeltaKind::RequiredRemoved
        | DeltaKind::ConstraintTightened(_)
        | DeltaKind::ConstraintAdded(_)
        | DeltaKind::EnumNarrowed
        | DeltaKind::AdditionalPropertiesChanged { .. } => false,
    }
}

pub fn is_breaking(kind: &DeltaKind, mode: CompatibilityMode) -> bool {
    match mode {
        CompatibilityMode::Backward => breaks_backward(kind),
        CompatibilityMode::Forward => breaks_forward(kind),
        CompatibilityMode::Full => breaks_backward(kind) || breaks_forward(kind),
        CompatibilityMode::None => false,
    }
}

fn impact(kind: &DeltaKind, mode: CompatibilityMode) -> Impact {
    match kind {
        DeltaKind::TypeChanged | DeltaKind::FieldRemoved { was_required: true } => Impact::Critical,
        DeltaKind::RequiredAdded | DeltaKind::ConstraintTightened(_) | DeltaKind::EnumNarrowed => {
            Impact::High
        }
        _ if is_breaking(kind, mode) => Impact::High,
        DeltaKind::ConstraintLoosened(_) | DeltaKind::EnumWidened | DeltaKind::CompositionChanged
            if is_breaking(kind, CompatibilityMode::Full) =>
        {
            Impact::Medium
        }
        _ => Impact::Low,
    }
}

/// Classify a single delta
pub fn classify(delta: &NodeDelta, mode: CompatibilityMode) -> SchemaChange {
    SchemaChange {
        change_type: delta.kind.change_type(),
        field: delta.field(),
        location: delta.location(),
        keyword: delta.keyword.clone(),
        description: describe(delta),
        breaking: is_breaking(&delta.kind, mode),
        impact: impact(&delta.kind, mode),
        required: matches!(
            delta.kind,
            DeltaKind::FieldAdded { required: true, .. } | DeltaKind::FieldRemoved { was_required: true }
        ),
        old_value: delta.old_value.clone(),
        new_value: delta.new_value.clone(),
    }
}

/// Classify deltas, keeping detection order
pub fn classify_all(deltas: &[NodeDelta], mode: CompatibilityMode) -> Vec<SchemaChange> {
    deltas.iter().map(|delta| classify(delta, mode)).collect()
}

fn describe(delta: &NodeDelta) -> String {
    let at = delta.location();
    let keyword = delta.keyword.as_deref().unwrap_or("");
    let old = render(delta.old_value.as_ref());
    let new = render(delta.new_value.as_ref());

    match &delta.kind {
        DeltaKind::FieldAdded { required: true, has_default: false } => {
            format!("Required field '{}' was added without a default", at)
        }
        DeltaKind::FieldAdded { required: true, has_default: true } => {
            format!("Required field '{}' was added with a default value", at)
        }
        DeltaKind::FieldAdded { .. } => format!("Optional field '{}' was added", at),
        DeltaKind::FieldRemoved { was_required: true } => {
            format!("Required field '{}' was removed", at)
        }
        DeltaKind::FieldRemoved { .. } => format!("Field '{}' was removed", at),
        DeltaKind::TypeChanged => format!("Type of '{}' changed from {} to {}", at, old, new),
        DeltaKind::RequiredAdded => format!("Field '{}' is now required", at),
        DeltaKind::RequiredRemoved => format!("Field '{}' is no longer required", at),
        DeltaKind::ConstraintTightened(c) if c.bound() == Bound::Opaque => format!(
            "`{}` of '{}' changed from {} to {}; previously valid values may be rejected",
            keyword, at, old, new
        ),
        DeltaKind::ConstraintLoosened(c) if c.bound() == Bound::Opaque => format!(
            "`{}` of '{}' changed from {} to {}; previously invalid values may be accepted",
            keyword, at, old, new
        ),
        DeltaKind::ConstraintTightened(_) => {
            format!("`{}` of '{}' tightened from {} to {}", keyword, at, old, new)
        }
        DeltaKind::ConstraintLoosened(_) => {
            format!("`{}` of '{}' loosened from {} to {}", keyword, at, old, new)
        }
        DeltaKind::ConstraintAdded(_) => format!("`{}` constraint {} added to '{}'", keyword, new, at),
        DeltaKind::ConstraintRemoved(_) => {
            format!("`{}` constraint {} removed from '{}'", keyword, old, at)
        }
        DeltaKind::EnumNarrowed => match value_difference(&delta.old_value, &delta.new_value) {
            Some(removed) if !removed.is_empty() => {
                format!("Allowed values of '{}' narrowed; removed {}", at, removed.join(", "))
            }
            _ => format!("Allowed values of '{}' restricted to {}", at, new),
        },
        DeltaKind::EnumWidened => match value_difference(&delta.new_value, &delta.old_value) {
            Some(added) if !added.is_empty() => {
                format!("Allowed values of '{}' widened; added {}", at, added.join(", "))
            }
            _ => format!("Allowed values of '{}' are no longer restricted", at),
        },
        DeltaKind::AdditionalPropertiesChanged { restricting: true } => format!(
            "'{}' accepts fewer undeclared properties (additionalProperties {} -> {})",
            at,
            short(delta.old_value.as_ref()),
            short(delta.new_value.as_ref())
        ),
        DeltaKind::AdditionalPropertiesChanged { restricting: false } => format!(
            "'{}' accepts more undeclared properties (additionalProperties {} -> {})",
            at,
            short(delta.old_value.as_ref()),
            short(delta.new_value.as_ref())
        ),
        DeltaKind::CompositionChanged => {
            match (variant_count(&delta.old_value), variant_count(&delta.new_value)) {
                (Some(o), Some(n)) if o != n => {
                    format!("`{}` of '{}' changed from {} to {} variants", keyword, at, o, n)
                }
                (Some(_), Some(_)) => format!("`{}` variants of '{}' were reordered", keyword, at),
                (None, Some(_)) => format!("`{}` was introduced on '{}'", keyword, at),
                (Some(_), None) => format!("`{}` was removed from '{}'", keyword, at),
                (None, None) => format!("`{}` of '{}' changed", keyword, at),
            }
        }
    }
}

fn render(value: Option<&Value>) -> String {
    value.map(Value::to_string).unwrap_or_else(|| "(none)".to_string())
}

/// `true`/`false` as-is, schemas as "schema"
fn short(value: Option<&Value>) -> String {
    match value {
        Some(Value::Bool(b)) => b.to_string(),
        Some(_) => "schema".to_string(),
        None => "(none)".to_string(),
    }
}

/// Values in `from` that are missing from `to`
fn value_difference(from: &Option<Value>, to: &Option<Value>) -> Option<Vec<String>> {
    let from = from.as_ref()?.as_array()?;
    let to = to.as_ref().and_then(Value::as_array);
    Some(
        from.iter()
            .filter(|v| to.map(|t| !t.iter().any(|x| same_value(x, v))).unwrap_or(true))
            .map(Value::to_string)
            .collect(),
    )
}

fn variant_count(value: &Option<Value>) -> Option<usize> {
    match value {
        Some(Value::Array(variants)) => Some(variants.len()),
        Some(_) => Some(1),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Constraint;
    use serde_json::json;

    fn delta(kind: DeltaKind) -> NodeDelta {
        NodeDelta {
            path: vec!["properties".to_string(), "age".to_string()],
            keyword: kind.constraint().map(|c| c.keyword().to_string()),
            kind,
            old_value: Some(json!(0)),
            new_value: Some(json!(18)),
        }
    }

    fn all_kinds() -> Vec<DeltaKind> {
        vec![
            DeltaKind::FieldAdded { required: false, has_default: false },
            DeltaKind::FieldAdded { required: true, has_default: false },
            DeltaKind::FieldAdded { required: true, has_default: true },
            DeltaKind::FieldRemoved { was_required: false },
            DeltaKind::FieldRemoved { was_required: true },
            DeltaKind::TypeChanged,
            DeltaKind::RequiredAdded,
            DeltaKind::RequiredRemoved,
            DeltaKind::ConstraintTightened(Constraint::Minimum),
            DeltaKind::ConstraintLoosened(Constraint::Minimum),
            DeltaKind::ConstraintAdded(Constraint::Minimum),
            DeltaKind::ConstraintRemoved(Constraint::Minimum),
            DeltaKind::EnumNarrowed,
            DeltaKind::EnumWidened,
            DeltaKind::AdditionalPropertiesChanged { restricting: true },
            DeltaKind::AdditionalPropertiesChanged { restricting: false },
            DeltaKind::CompositionChanged,
        ]
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("backward".parse::<CompatibilityMode>().unwrap(), CompatibilityMode::Backward);
        assert_eq!(" FULL ".parse::<CompatibilityMode>().unwrap(), CompatibilityMode::Full);
        assert!(matches!(
            "TRANSITIVE".parse::<CompatibilityMode>(),
            Err(EvolutionError::InvalidMode(_))
        ));
        assert_eq!(serde_json::to_string(&CompatibilityMode::Forward).unwrap(), "\"FORWARD\"");
    }

    #[test]
    fn test_breaking_table() {
        use CompatibilityMode::*;
        let expectations: Vec<(DeltaKind, [bool; 4])> = vec![
            (DeltaKind::FieldAdded { required: false, has_default: false }, [false, false, false, false]),
            (DeltaKind::FieldAdded { required: true, has_default: false }, [true, false, true, false]),
            (DeltaKind::FieldRemoved { was_required: false }, [false, true, true, false]),
            (DeltaKind::RequiredAdded, [true, false, true, false]),
            (DeltaKind::RequiredRemoved, [false, false, false, false]),
            (DeltaKind::TypeChanged, [true, true, true, false]),
            (DeltaKind::ConstraintTightened(Constraint::Minimum), [true, false, true, false]),
            (DeltaKind::ConstraintLoosened(Constraint::Minimum), [false, true, true, false]),
            (DeltaKind::ConstraintAdded(Constraint::Minimum), [true, false, true, false]),
            (DeltaKind::ConstraintRemoved(Constraint::Minimum), [false, true, true, false]),
            (DeltaKind::EnumNarrowed, [true, false, true, false]),
            (DeltaKind::EnumWidened, [false, true, true, false]),
            (DeltaKind::AdditionalPropertiesChanged { restricting: true }, [true, false, true, false]),
            (DeltaKind::AdditionalPropertiesChanged { restricting: false }, [false, false, false, false]),
            (DeltaKind::CompositionChanged, [true, true, true, false]),
        ];
        for (kind, expected) in expectations {
            let actual = [
                is_breaking(&kind, Backward),
                is_breaking(&kind, Forward),
                is_breaking(&kind, Full),
                is_breaking(&kind, None),
            ];
            assert_eq!(actual, expected, "{:?}", kind);
        }
    }

    #[test]
    fn test_full_is_union_of_directions() {
        for kind in all_kinds() {
            let full = is_breaking(&kind, CompatibilityMode::Full);
            assert_eq!(
                full,
                is_breaking(&kind, CompatibilityMode::Backward)
                    || is_breaking(&kind, CompatibilityMode::Forward)
            );
            assert!(!is_breaking(&kind, CompatibilityMode::None));
        }
    }

    #[test]
    fn test_impact_levels() {
        let tightened = DeltaKind::ConstraintTightened(Constraint::Minimum);
        assert_eq!(impact(&tightened, CompatibilityMode::Forward), Impact::High);
        assert_eq!(impact(&DeltaKind::TypeChanged, CompatibilityMode::None), Impact::Critical);
        assert_eq!(
            impact(&DeltaKind::FieldRemoved { was_required: true }, CompatibilityMode::Backward),
            Impact::Critical
        );
        assert_eq!(
            impact(&DeltaKind::FieldRemoved { was_required: false }, CompatibilityMode::Backward),
            Impact::Low
        );
        assert_eq!(impact(&DeltaKind::EnumWidened, CompatibilityMode::Backward), Impact::Medium);
        assert_eq!(impact(&DeltaKind::EnumWidened, CompatibilityMode::Forward), Impact::High);
        assert_eq!(impact(&DeltaKind::CompositionChanged, CompatibilityMode::None), Impact::Medium);
        assert_eq!(impact(&DeltaKind::RequiredRemoved, CompatibilityMode::Full), Impact::Low);
    }

    #[test]
    fn test_classify_constraint_change() {
        let change = classify(
            &delta(DeltaKind::ConstraintTightened(Constraint::Minimum)),
            CompatibilityMode::Backward,
        );
        assert_eq!(change.change_type, ChangeType::ConstraintTightened);
        assert_eq!(change.field, "properties.age.minimum");
        assert_eq!(change.location, "properties.age");
        assert!(change.breaking);
        assert_eq!(change.impact, Impact::High);
        assert_eq!(change.description, "`minimum` of 'properties.age' tightened from 0 to 18");
    }

    #[test]
    fn test_enum_descriptions_list_values() {
        let narrowed = NodeDelta {
            path: vec!["properties".to_string(), "status".to_string()],
            keyword: Some("enum".to_string()),
            kind: DeltaKind::EnumNarrowed,
            old_value: Some(json!(["A", "B", "C"])),
            new_value: Some(json!(["A", "B"])),
        };
        let change = classify(&narrowed, CompatibilityMode::Backward);
        assert_eq!(change.description, "Allowed values of 'properties.status' narrowed; removed \"C\"");
    }

    #[test]
    fn test_required_flag_carried() {
        let removed = classify(&delta(DeltaKind::FieldRemoved { was_required: true }), CompatibilityMode::None);
        assert!(removed.required);
        let added = classify(
            &delta(DeltaKind::FieldAdded { required: true, has_default: true }),
            CompatibilityMode::Backward,
        );
        assert!(added.required);
        assert!(!classify(&delta(DeltaKind::RequiredAdded), CompatibilityMode::Backward).required);
    }

    #[test]
    fn test_change_serializes_camel_case() {
        let change = classify(&delta(DeltaKind::TypeChanged), CompatibilityMode::Full);
        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(value["type"], json!("type_changed"));
        assert_eq!(value["impact"], json!("CRITICAL"));
        assert_eq!(value["oldValue"], json!(0));
    }
}
