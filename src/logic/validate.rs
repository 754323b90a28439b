use crate::logic::numeric::{float_compare, format_number};
use crate::model::{
    FeatureAssignment, FeatureDefinition, FeatureError, FeatureResult, Id, Locale, SubjectKind,
    ValueKind,
};
use crate::store::traits::ValueStore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Non-fatal advisory produced while a caller is still composing a record
/// interactively. Never blocks persistence; the blocking check still runs
/// at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundsWarning {
    pub title: String,
    pub message: String,
}

impl BoundsWarning {
    fn out_of_limits(message: impl Into<String>) -> Self {
        Self {
            title: "Value out of limits!".to_string(),
            message: message.into(),
        }
    }
}

pub struct FeatureValidator;

impl FeatureValidator {
    /// Blocking invariant check on an assignment's numeric bounds:
    /// min <= max, and the default inside [min, max], compared at the
    /// definition's declared precision.
    pub fn check_assignment_bounds(
        assignment: &FeatureAssignment,
        feature: &FeatureDefinition,
    ) -> FeatureResult<()> {
        let digits = feature.num_decimals;
        if let (Some(min), Some(max)) = (assignment.min_number_value, assignment.max_number_value) {
            if float_compare(min, max, digits) == Ordering::Greater {
                return Err(FeatureError::validation(
                    "minimum value can not be greater than maximum value",
                ));
            }
        }
        if let Some(default) = assignment.default_number_value {
            if let Some(min) = assignment.min_number_value {
                if float_compare(min, default, digits) == Ordering::Greater {
                    return Err(FeatureError::validation(
                        "default value must not be lower than minimum value",
                    ));
                }
            }
            if let Some(max) = assignment.max_number_value {
                if float_compare(default, max, digits) == Ordering::Greater {
                    return Err(FeatureError::validation(
                        "default value must not be greater than maximum value",
                    ));
                }
            }
        }
        Ok(())
    }

    /// The same bound checks as `check_assignment_bounds`, as a soft
    /// signal for live form feedback. Only meaningful for number-kind
    /// features.
    pub fn assignment_bounds_warning(
        assignment: &FeatureAssignment,
        feature: &FeatureDefinition,
    ) -> Option<BoundsWarning> {
        if feature.value_kind != ValueKind::Number {
            return None;
        }
        match Self::check_assignment_bounds(assignment, feature) {
            Ok(()) => None,
            Err(e) => Some(BoundsWarning::out_of_limits(match e {
                FeatureError::Validation(msg) => msg,
                other => other.to_string(),
            })),
        }
    }

    /// Blocking bound check for a concrete number value. Only enforced
    /// for the bounds the assignment actually defines; the comparison is
    /// precision-aware and the formatted bound goes into the message.
    pub fn check_number_limits(
        number: f64,
        assignment: &FeatureAssignment,
        feature: &FeatureDefinition,
        locale: &Locale,
    ) -> FeatureResult<()> {
        let digits = feature.num_decimals;
        if let Some(min) = assignment.min_number_value {
            if float_compare(min, number, digits) == Ordering::Greater {
                return Err(FeatureError::validation(format!(
                    "value must not be lower than minimum value ({})",
                    format_number(min, digits, locale)
                )));
            }
        }
        if let Some(max) = assignment.max_number_value {
            if float_compare(number, max, digits) == Ordering::Greater {
                return Err(FeatureError::validation(format!(
                    "value must not be greater than maximum value ({})",
                    format_number(max, digits, locale)
                )));
            }
        }
        Ok(())
    }

    /// Soft variant of `check_number_limits` for interactive feedback on
    /// an existing value.
    pub fn number_limits_warning(
        number: f64,
        assignment: &FeatureAssignment,
        feature: &FeatureDefinition,
        locale: &Locale,
    ) -> Option<BoundsWarning> {
        match Self::check_number_limits(number, assignment, feature, locale) {
            Ok(()) => None,
            Err(e) => Some(BoundsWarning::out_of_limits(match e {
                FeatureError::Validation(msg) => msg,
                other => other.to_string(),
            })),
        }
    }

    /// A definition's value kind is frozen once any value of either
    /// subject kind references it.
    pub async fn ensure_kind_change_allowed<S: ValueStore>(
        store: &S,
        feature_id: &Id,
    ) -> FeatureResult<()> {
        let values = store.list_values_for_feature(feature_id).await?;
        if !values.is_empty() {
            return Err(FeatureError::validation(
                "this feature already has values, its value kind can not be changed",
            ));
        }
        Ok(())
    }

    /// The lot-vs-product classification is frozen the same way, so
    /// historical data typed against the other subject kind is never
    /// silently orphaned.
    pub async fn ensure_lot_flag_change_allowed<S: ValueStore>(
        store: &S,
        feature_id: &Id,
    ) -> FeatureResult<()> {
        let values = store.list_values_for_feature(feature_id).await?;
        if values.iter().any(|v| v.subject_kind == SubjectKind::Product) {
            return Err(FeatureError::validation(
                "this feature has been already used in products, it can not be switched to lot",
            ));
        }
        if values.iter().any(|v| v.subject_kind == SubjectKind::Lot) {
            return Err(FeatureError::validation(
                "this feature has been already used in lots, it can not be switched to product",
            ));
        }
        Ok(())
    }
}
