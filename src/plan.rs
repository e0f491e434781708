//! Migration planning
//!
//! Builds an ordered list of [`MigrationStep`]s from classified changes.
//! Changes are grouped by location, groups are ordered by their worst impact,
//! and inside a group structural steps come before constraint steps, which
//! come before cosmetic (enum, format) steps.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classify::{Impact, SchemaChange};
use crate::diff::ChangeType;
use crate::schema::{Constraint, SchemaKind};

/// One actionable migration step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationStep {
    /// Short imperative label
    pub action: String,
    pub description: String,
    /// Illustrative JSON Schema snippet, only when derivable from the change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Location the step applies to
    pub field: String,
    pub impact: Impact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Structural,
    Constraint,
    Cosmetic,
}

fn stage(change: &SchemaChange) -> Stage {
    match change.change_type {
        ChangeType::EnumNarrowed | ChangeType::EnumWidened => Stage::Cosmetic,
        ChangeType::ConstraintTightened
        | ChangeType::ConstraintLoosened
        | ChangeType::ConstraintAdded
        | ChangeType::ConstraintRemoved => {
            let cosmetic = change
                .keyword
                .as_deref()
                .and_then(|kw| Constraint::ALL.into_iter().find(|c| c.keyword() == kw))
                .map(|c| c.is_cosmetic())
                .unwrap_or(false);
            if cosmetic {
                Stage::Cosmetic
            } else {
                Stage::Constraint
            }
        }
        _ => Stage::Structural,
    }
}

/// Step under construction; the snippet stays structured until rendering
struct Draft {
    action: String,
    description: String,
    code: Option<Value>,
    field: String,
    impact: Impact,
}

impl Draft {
    fn absorb(&mut self, other: Draft) {
        self.description = format!("{} Also: {}", self.description, other.description);
        self.impact = self.impact.max(other.impact);
        self.code = match (self.code.take(), other.code) {
            (Some(Value::Object(mut mine)), Some(Value::Object(theirs))) => {
                mine.extend(theirs);
                Some(Value::Object(mine))
            }
            (Some(mine), _) => Some(mine),
            (None, theirs) => theirs,
        };
    }

    fn finish(self) -> MigrationStep {
        MigrationStep {
            action: self.action,
            description: self.description,
            code: self.code.and_then(|v| serde_json::to_string_pretty(&v).ok()),
            field: self.field,
            impact: self.impact,
        }
    }
}

struct Group<'a> {
    first: usize,
    changes: Vec<&'a SchemaChange>,
}

impl Group<'_> {
    fn max_impact(&self) -> Impact {
        self.changes
            .iter()
            .map(|c| c.impact)
            .max()
            .unwrap_or(Impact::Low)
    }
}

/// Build the migration path for a change list
pub fn plan(changes: &[SchemaChange]) -> Vec<MigrationStep> {
    let mut groups: Vec<Group> = Vec::new();
    let mut by_location: HashMap<&str, usize> = HashMap::new();

    for (index, change) in changes.iter().enumerate() {
        if !change.breaking && change.impact < Impact::Medium {
            continue;
        }
        let slot = *by_location.entry(change.location.as_str()).or_insert_with(|| {
            groups.push(Group {
                first: index,
                changes: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].changes.push(change);
    }

    groups.sort_by(|a, b| {
        b.max_impact()
            .cmp(&a.max_impact())
            .then(a.first.cmp(&b.first))
    });

    groups.into_iter().flat_map(group_steps).collect()
}

fn group_steps(group: Group<'_>) -> Vec<MigrationStep> {
    let mut changes = group.changes;
    // stable: detection order is kept within a stage
    changes.sort_by_key(|c| stage(c));

    let mut drafts: Vec<Draft> = Vec::new();
    let mut structural = 0;
    for change in changes {
        let draft = draft_for(change);
        match stage(change) {
            Stage::Structural => {
                drafts.push(draft);
                structural += 1;
            }
            Stage::Constraint if structural > 0 => drafts[0].absorb(draft),
            _ => drafts.push(draft),
        }
    }

    drafts.into_iter().map(Draft::finish).collect()
}

fn draft_for(change: &SchemaChange) -> Draft {
    let at = change.location.as_str();
    let keyword = change.keyword.as_deref().unwrap_or("");
    let draft = |action: &str, description: String, code: Option<Value>| Draft {
        action: action.to_string(),
        description,
        code,
        field: change.location.clone(),
        impact: change.impact,
    };

    match change.change_type {
        ChangeType::TypeChanged => {
            let old = type_label(&change.old_value);
            let new = type_label(&change.new_value);
            let description = match (old, new) {
                (Some(old), Some(new)) => format!(
                    "Accept both {} and {} at '{}' while producers and consumers migrate, then drop {} in a later version.",
                    old, new, at, old
                ),
                _ => format!(
                    "Introduce a transitional version of '{}' that accepts both the old and the new shape, then remove the old shape in a later version.",
                    at
                ),
            };
            let code = match (old, new) {
                (Some(old), Some(new)) => Some(serde_json::json!({
                    "anyOf": [{ "type": old }, { "type": new }]
                })),
                _ => None,
            };
            draft("Introduce a transitional union type", description, code)
        }
        ChangeType::FieldRemoved => {
            let description = if change.required {
                format!(
                    "Phase 1: make '{}' optional and mark it deprecated so consumers stop relying on it. Phase 2: remove it in a later version.",
                    at
                )
            } else {
                format!(
                    "Phase 1: mark '{}' deprecated so consumers stop reading it. Phase 2: remove it in a later version.",
                    at
                )
            };
            let code = match &change.old_value {
                Some(Value::Object(schema)) => {
                    let mut schema = schema.clone();
                    schema.insert("deprecated".to_string(), Value::Bool(true));
                    Some(Value::Object(schema))
                }
                _ => None,
            };
            draft("Deprecate field before removing it", description, code)
        }
        ChangeType::RequiredAdded => draft(
            "Phase in required field",
            format!(
                "Phase 1: keep '{}' optional and backfill it in existing data. Phase 2: add it to `required` once every producer sends it.",
                at
            ),
            None,
        ),
        ChangeType::FieldAdded => draft(
            "Backfill new required field",
            format!(
                "'{}' is required but has no default. Backfill existing data or give it a default before enforcing it.",
                at
            ),
            None,
        ),
        ChangeType::RequiredRemoved => draft(
            "Handle optional field",
            format!("Consumers must tolerate '{}' being absent.", at),
            None,
        ),
        ChangeType::ConstraintTightened | ChangeType::ConstraintAdded => draft(
            "Validate existing data against tightened constraint",
            format!(
                "{}. Check stored data against the new `{}` before enforcing it.",
                change.description, keyword
            ),
            keyword_snippet(keyword, &change.new_value),
        ),
        ChangeType::ConstraintLoosened | ChangeType::ConstraintRemoved => draft(
            "Relax consumers for loosened constraint",
            format!(
                "{}. Consumers that still enforce the old `{}` must accept the wider range.",
                change.description, keyword
            ),
            keyword_snippet(keyword, &change.new_value),
        ),
        ChangeType::EnumNarrowed => draft(
            "Migrate removed enum values",
            format!(
                "{}. Rewrite stored data that uses the removed values before deploying.",
                change.description
            ),
            keyword_snippet(keyword, &change.new_value),
        ),
        ChangeType::EnumWidened => draft(
            "Teach consumers new enum values",
            format!(
                "{}. Consumers must handle the new values before producers emit them.",
                change.description
            ),
            keyword_snippet(keyword, &change.new_value),
        ),
        ChangeType::AdditionalPropertiesChanged => draft(
            "Audit undeclared properties",
            format!(
                "{}. Find data that relies on undeclared properties and declare them explicitly.",
                change.description
            ),
            keyword_snippet("additionalProperties", &change.new_value),
        ),
        ChangeType::CompositionChanged => draft(
            "Coordinate composition change",
            format!(
                "{}. Roll out the new variants to consumers before producers start using them.",
                change.description
            ),
            keyword_snippet(keyword, &change.new_value),
        ),
    }
}

/// A plain JSON type name, when the delta value is one
fn type_label(value: &Option<Value>) -> Option<&str> {
    let label = value.as_ref()?.as_str()?;
    SchemaKind::from_type_name(label).map(|_| label)
}

fn keyword_snippet(keyword: &str, value: &Option<Value>) -> Option<Value> {
    if keyword.is_empty() {
        return None;
    }
    let value = value.as_ref()?;
    let mut snippet = Map::new();
    snippet.insert(keyword.to_string(), value.clone());
    Some(Value::Object(snippet))
}
