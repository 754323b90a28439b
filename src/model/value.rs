use crate::model::{generate_id, FeatureAssignment, Id, SubjectKind, ValueKind};
use serde::{Deserialize, Serialize};

/// Physical representation of one feature value, closed over the three
/// value kinds. The definition's `value_kind` is the discriminant; a body
/// of the wrong variant is rejected at write time, never re-checked ad
/// hoc downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ValueBody {
    Table {
        #[serde(skip_serializing_if = "Option::is_none")]
        table_value_id: Option<Id>,
    },
    Text {
        /// Raw code string, separate from the text itself.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        number: Option<f64>,
    },
}

impl ValueBody {
    /// An unpopulated body of the given kind, used when propagation finds
    /// no default to apply.
    pub fn empty(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Table => ValueBody::Table {
                table_value_id: None,
            },
            ValueKind::Text => ValueBody::Text {
                code: None,
                text: None,
            },
            ValueKind::Number => ValueBody::Number {
                code: None,
                number: None,
            },
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ValueBody::Table { .. } => ValueKind::Table,
            ValueBody::Text { .. } => ValueKind::Text,
            ValueBody::Number { .. } => ValueKind::Number,
        }
    }

    pub fn table_value_id(&self) -> Option<&Id> {
        match self {
            ValueBody::Table { table_value_id } => table_value_id.as_ref(),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<f64> {
        match self {
            ValueBody::Number { number, .. } => *number,
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ValueBody::Text { text, .. } => text.as_deref(),
            _ => None,
        }
    }
}

/// The concrete value of one feature for one subject entity.
///
/// Uniqueness: (scope_id, subject_kind + subject_id, feature_id) - one
/// value per feature per subject. `feature_id` and `scope_id` are
/// denormalized from the assignment for fast dispatch; `sequence` is
/// copied when the value is created or re-bound to an assignment and is
/// kept as-is when a lot value is detached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureValue {
    pub id: Id,
    pub subject_kind: SubjectKind,
    pub subject_id: Id,
    /// Origin assignment; detached (None) for lot values whose assignment
    /// was deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<Id>,
    pub feature_id: Id,
    pub scope_id: Id,
    #[serde(default)]
    pub sequence: i32,
    pub body: ValueBody,
}

impl FeatureValue {
    /// A value freshly materialized from an assignment by the propagation
    /// engine.
    pub fn from_assignment(
        subject_kind: SubjectKind,
        subject_id: Id,
        assignment: &FeatureAssignment,
        body: ValueBody,
    ) -> Self {
        Self {
            id: generate_id(),
            subject_kind,
            subject_id,
            assignment_id: Some(assignment.id.clone()),
            feature_id: assignment.feature_id.clone(),
            scope_id: assignment.scope_id.clone(),
            sequence: assignment.sequence,
            body,
        }
    }
}

/// Direct user creation of a feature value, outside propagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeatureValue {
    pub subject_kind: SubjectKind,
    pub subject_id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<Id>,
    pub feature_id: Id,
    pub body: ValueBody,
}

/// What the uniform accessor renders for one value: the projections the
/// three storage shapes collapse into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedValue {
    pub id: Id,
    pub feature_id: Id,
    pub code: String,
    pub value: String,
    pub display_name: String,
}
