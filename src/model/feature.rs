use crate::model::{double_option, generate_id, Id, ValueKind};
use serde::{Deserialize, Serialize};

/// A named attribute type shared across an organizational scope.
///
/// Uniqueness: (scope_id, code, name) within the scope. Once any feature
/// value of either subject kind references the definition, `value_kind`
/// and `is_lot_feature` are frozen (see logic::validate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefinition {
    pub id: Id,
    pub scope_id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub name: String,
    pub value_kind: ValueKind,
    /// Decimal precision used to render and compare number-kind values.
    pub num_decimals: u32,
    /// Lot-scoped features are propagated to production lots instead of
    /// product variants.
    #[serde(default)]
    pub is_lot_feature: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeatureDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub name: String,
    pub value_kind: ValueKind,
    #[serde(default = "default_num_decimals")]
    pub num_decimals: u32,
    #[serde(default)]
    pub is_lot_feature: bool,
}

fn default_num_decimals() -> u32 {
    2
}

impl NewFeatureDefinition {
    pub fn into_definition(self, scope_id: Id) -> FeatureDefinition {
        FeatureDefinition {
            id: generate_id(),
            scope_id,
            code: self.code,
            name: self.name,
            value_kind: self.value_kind,
            num_decimals: self.num_decimals,
            is_lot_feature: self.is_lot_feature,
        }
    }
}

/// Partial update for a feature definition. Kind and lot-flag changes go
/// through the reclassification guards before they are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefinitionUpdate {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub code: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_kind: Option<ValueKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_decimals: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_lot_feature: Option<bool>,
}

impl FeatureDefinition {
    pub fn apply_update(&mut self, update: FeatureDefinitionUpdate) {
        if let Some(code) = update.code {
            self.code = code;
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(value_kind) = update.value_kind {
            self.value_kind = value_kind;
        }
        if let Some(num_decimals) = update.num_decimals {
            self.num_decimals = num_decimals;
        }
        if let Some(is_lot_feature) = update.is_lot_feature {
            self.is_lot_feature = is_lot_feature;
        }
    }
}

/// One legal discrete option for a table-kind feature.
///
/// Uniqueness: (scope_id, feature_id, code, name). The scope is copied
/// from the owning definition at create time; a table value never changes
/// owner, so the copy is never resynchronized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableValue {
    pub id: Id,
    pub feature_id: Id,
    pub scope_id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTableValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub name: String,
}

impl NewTableValue {
    pub fn into_table_value(self, feature: &FeatureDefinition) -> TableValue {
        TableValue {
            id: generate_id(),
            feature_id: feature.id.clone(),
            scope_id: feature.scope_id.clone(),
            code: self.code,
            name: self.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_distinguishes_null_code_from_absent() {
        let clear: FeatureDefinitionUpdate = serde_json::from_str(r#"{"code": null}"#).unwrap();
        assert_eq!(clear.code, Some(None));

        let untouched: FeatureDefinitionUpdate =
            serde_json::from_str(r#"{"name": "Width"}"#).unwrap();
        assert_eq!(untouched.code, None);

        let mut feature = NewFeatureDefinition {
            code: Some("LEN".to_string()),
            name: "Length".to_string(),
            value_kind: ValueKind::Number,
            num_decimals: 2,
            is_lot_feature: false,
        }
        .into_definition("acme".to_string());
        feature.apply_update(untouched);
        assert_eq!(feature.code.as_deref(), Some("LEN"));
        feature.apply_update(clear);
        assert_eq!(feature.code, None);
    }
}
