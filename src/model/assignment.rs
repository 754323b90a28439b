use crate::model::{double_option, generate_id, FeatureDefinition, Id};
use serde::{Deserialize, Serialize};

/// Binds a feature definition to a product template, carrying the
/// per-template defaults, numeric bounds and an optional restriction of
/// the legal table values.
///
/// Uniqueness: (scope_id, template_id, feature_id) - a feature appears at
/// most once per template. The scope is copied from the definition at
/// create time (a definition never changes scope). Deleting the template
/// cascades to the assignment and onwards per the deletion policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAssignment {
    pub id: Id,
    pub template_id: Id,
    pub feature_id: Id,
    pub scope_id: Id,
    /// Display order, denormalized onto values created from this
    /// assignment.
    #[serde(default)]
    pub sequence: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_table_value_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_text_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_number_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_number_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_number_value: Option<f64>,
    /// If non-empty, values of this template are only allowed from this
    /// list; empty means any table value of the feature is legal.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filtered_table_value_ids: Vec<Id>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewFeatureAssignment {
    pub feature_id: Id,
    #[serde(default)]
    pub sequence: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_table_value_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_text_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_number_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_number_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_number_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filtered_table_value_ids: Vec<Id>,
}

impl NewFeatureAssignment {
    pub fn into_assignment(self, template_id: Id, feature: &FeatureDefinition) -> FeatureAssignment {
        FeatureAssignment {
            id: generate_id(),
            template_id,
            feature_id: feature.id.clone(),
            scope_id: feature.scope_id.clone(),
            sequence: self.sequence,
            default_table_value_id: self.default_table_value_id,
            default_text_value: self.default_text_value,
            default_number_value: self.default_number_value,
            min_number_value: self.min_number_value,
            max_number_value: self.max_number_value,
            filtered_table_value_ids: self.filtered_table_value_ids,
        }
    }
}

/// Partial update for an assignment. The bound-ordering invariants are
/// re-checked on the merged record before it is persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureAssignmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub default_table_value_id: Option<Option<Id>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub default_text_value: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub default_number_value: Option<Option<f64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub min_number_value: Option<Option<f64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub max_number_value: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_table_value_ids: Option<Vec<Id>>,
}

impl FeatureAssignment {
    pub fn apply_update(&mut self, update: FeatureAssignmentUpdate) {
        if let Some(sequence) = update.sequence {
            self.sequence = sequence;
        }
        if let Some(v) = update.default_table_value_id {
            self.default_table_value_id = v;
        }
        if let Some(v) = update.default_text_value {
            self.default_text_value = v;
        }
        if let Some(v) = update.default_number_value {
            self.default_number_value = v;
        }
        if let Some(v) = update.min_number_value {
            self.min_number_value = v;
        }
        if let Some(v) = update.max_number_value {
            self.max_number_value = v;
        }
        if let Some(v) = update.filtered_table_value_ids {
            self.filtered_table_value_ids = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounded_assignment() -> FeatureAssignment {
        FeatureAssignment {
            id: "a-1".to_string(),
            template_id: "t-1".to_string(),
            feature_id: "f-1".to_string(),
            scope_id: "acme".to_string(),
            sequence: 1,
            default_table_value_id: None,
            default_text_value: None,
            default_number_value: Some(12.5),
            min_number_value: Some(0.0),
            max_number_value: Some(100.0),
            filtered_table_value_ids: Vec::new(),
        }
    }

    #[test]
    fn update_null_clears_a_bound_and_absent_leaves_it() {
        let update: FeatureAssignmentUpdate =
            serde_json::from_str(r#"{"max_number_value": null}"#).unwrap();
        assert_eq!(update.max_number_value, Some(None));
        assert_eq!(update.min_number_value, None);

        let mut assignment = bounded_assignment();
        assignment.apply_update(update);
        assert_eq!(assignment.max_number_value, None);
        assert_eq!(assignment.min_number_value, Some(0.0));
        assert_eq!(assignment.default_number_value, Some(12.5));
    }

    #[test]
    fn update_null_clears_a_default() {
        let update: FeatureAssignmentUpdate =
            serde_json::from_str(r#"{"default_number_value": null, "sequence": 4}"#).unwrap();
        let mut assignment = bounded_assignment();
        assignment.apply_update(update);
        assert_eq!(assignment.default_number_value, None);
        assert_eq!(assignment.sequence, 4);
    }
}
