use crate::model::{
    FeatureAssignment, FeatureDefinition, FeatureError, FeatureResult, FeatureValue, Id,
    SubjectKind, ValueBody, ValueKind,
};
use crate::store::traits::Store;
use log::debug;

/// Materializes feature values on subject entities from their template's
/// assignments.
///
/// Variants are filled incrementally: only assignments with no value yet
/// on the variant produce a new record, existing values are never touched.
/// Lots are refreshed wholesale: every lot value is dropped and rebuilt
/// from the lot-flagged assignments of the product's template. Both paths
/// are idempotent and abort on the first storage failure.
pub struct Propagator<'a, S> {
    store: &'a S,
}

impl<'a, S: Store> Propagator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Fill in missing values on every variant of the template. Returns
    /// the number of values created.
    pub async fn propagate_template(&self, template_id: &Id) -> FeatureResult<usize> {
        let assignments = self
            .store
            .list_assignments_for_template(template_id)
            .await?;
        let variants = self.store.list_variants_for_template(template_id).await?;
        let mut created = 0;
        for variant in &variants {
            created += self.fill_variant(&variant.id, &assignments).await?;
        }
        debug!(
            "propagated template {}: {} values over {} variants",
            template_id,
            created,
            variants.len()
        );
        Ok(created)
    }

    /// Fill in missing values on one variant.
    pub async fn propagate_variant(&self, variant_id: &Id) -> FeatureResult<usize> {
        let variant = self
            .store
            .get_variant(variant_id)
            .await?
            .ok_or_else(|| FeatureError::not_found("variant", variant_id))?;
        let assignments = self
            .store
            .list_assignments_for_template(&variant.template_id)
            .await?;
        self.fill_variant(&variant.id, &assignments).await
    }

    async fn fill_variant(
        &self,
        variant_id: &Id,
        assignments: &[FeatureAssignment],
    ) -> FeatureResult<usize> {
        let existing = self
            .store
            .list_values_for_subject(SubjectKind::Product, variant_id)
            .await?;
        let mut created = 0;
        for assignment in assignments {
            if existing.iter().any(|v| v.feature_id == assignment.feature_id) {
                continue;
            }
            let feature = self.feature_of(assignment).await?;
            if feature.is_lot_feature {
                continue;
            }
            let body = Self::default_body(assignment, &feature);
            let value = FeatureValue::from_assignment(
                SubjectKind::Product,
                variant_id.clone(),
                assignment,
                body,
            );
            self.store.insert_value(value).await?;
            created += 1;
        }
        Ok(created)
    }

    /// Drop and rebuild the lot's values from the lot-flagged assignments
    /// of its product's template. A lot without a product ends up with no
    /// values at all. Returns the number of values after the refresh.
    ///
    /// The replacement batch is staged in full before anything is
    /// deleted, so a failed lookup (dangling assignment, missing variant)
    /// leaves the lot's existing values untouched.
    pub async fn refresh_lot(&self, lot_id: &Id) -> FeatureResult<usize> {
        let lot = self
            .store
            .get_lot(lot_id)
            .await?
            .ok_or_else(|| FeatureError::not_found("lot", lot_id))?;

        let mut staged = Vec::new();
        if let Some(product_id) = &lot.product_id {
            let variant = self
                .store
                .get_variant(product_id)
                .await?
                .ok_or_else(|| FeatureError::not_found("variant", product_id))?;
            let assignments = self
                .store
                .list_assignments_for_template(&variant.template_id)
                .await?;
            for assignment in &assignments {
                let feature = self.feature_of(assignment).await?;
                if !feature.is_lot_feature {
                    continue;
                }
                let body = Self::default_body(assignment, &feature);
                staged.push(FeatureValue::from_assignment(
                    SubjectKind::Lot,
                    lot.id.clone(),
                    assignment,
                    body,
                ));
            }
        }

        let removed = self
            .store
            .delete_values_for_subject(SubjectKind::Lot, &lot.id)
            .await?;
        let created = staged.len();
        for value in staged {
            self.store.insert_value(value).await?;
        }
        debug!(
            "refreshed lot {}: {} values dropped, {} created",
            lot.id, removed, created
        );
        Ok(created)
    }

    async fn feature_of(&self, assignment: &FeatureAssignment) -> FeatureResult<FeatureDefinition> {
        self.store
            .get_feature(&assignment.feature_id)
            .await?
            .ok_or_else(|| FeatureError::not_found("feature", &assignment.feature_id))
    }

    /// The body a freshly propagated value starts with. Defaults are only
    /// applied when they carry information; a zero number default counts
    /// as absent.
    fn default_body(assignment: &FeatureAssignment, feature: &FeatureDefinition) -> ValueBody {
        match feature.value_kind {
            ValueKind::Table => ValueBody::Table {
                table_value_id: assignment.default_table_value_id.clone(),
            },
            ValueKind::Text => ValueBody::Text {
                code: None,
                text: assignment
                    .default_text_value
                    .clone()
                    .filter(|t| !t.is_empty()),
            },
            ValueKind::Number => ValueBody::Number {
                code: None,
                number: assignment.default_number_value.filter(|n| *n != 0.0),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        NewFeatureAssignment, NewFeatureDefinition, NewProductTemplate, NewProductVariant,
        NewProductionLot,
    };
    use crate::store::traits::{
        AssignmentStore, FeatureDefinitionStore, SubjectStore, ValueStore,
    };
    use crate::store::MemoryStore;

    const SCOPE: &str = "acme";

    async fn feature(
        store: &MemoryStore,
        name: &str,
        kind: ValueKind,
        is_lot: bool,
    ) -> FeatureDefinition {
        let f = NewFeatureDefinition {
            code: None,
            name: name.to_string(),
            value_kind: kind,
            num_decimals: 2,
            is_lot_feature: is_lot,
        }
        .into_definition(SCOPE.to_string());
        store.insert_feature(f.clone()).await.unwrap();
        f
    }

    #[tokio::test]
    async fn propagation_applies_defaults_and_is_idempotent() {
        let store = MemoryStore::new();
        let template = NewProductTemplate {
            name: "Cable".to_string(),
        }
        .into_template(SCOPE.to_string());
        store.insert_template(template.clone()).await.unwrap();
        let variant = NewProductVariant {
            template_id: template.id.clone(),
            name: "Cable 3m".to_string(),
        }
        .into_variant(SCOPE.to_string());
        store.insert_variant(variant.clone()).await.unwrap();

        let length = feature(&store, "Length", ValueKind::Number, false).await;
        let assignment = NewFeatureAssignment {
            feature_id: length.id.clone(),
            sequence: 7,
            default_number_value: Some(12.5),
            ..Default::default()
        }
        .into_assignment(template.id.clone(), &length);
        store.insert_assignment(assignment.clone()).await.unwrap();

        let propagator = Propagator::new(&store);
        assert_eq!(propagator.propagate_template(&template.id).await.unwrap(), 1);

        let values = store
            .list_values_for_subject(SubjectKind::Product, &variant.id)
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].body.number(), Some(12.5));
        assert_eq!(values[0].sequence, 7);
        assert_eq!(values[0].assignment_id.as_deref(), Some(assignment.id.as_str()));

        // Second run adds nothing and leaves the record alone.
        assert_eq!(propagator.propagate_template(&template.id).await.unwrap(), 0);
        let again = store
            .list_values_for_subject(SubjectKind::Product, &variant.id)
            .await
            .unwrap();
        assert_eq!(again, values);
    }

    #[tokio::test]
    async fn zero_number_default_yields_empty_body() {
        let store = MemoryStore::new();
        let template = NewProductTemplate {
            name: "Cable".to_string(),
        }
        .into_template(SCOPE.to_string());
        store.insert_template(template.clone()).await.unwrap();
        let variant = NewProductVariant {
            template_id: template.id.clone(),
            name: "Cable 5m".to_string(),
        }
        .into_variant(SCOPE.to_string());
        store.insert_variant(variant.clone()).await.unwrap();

        let gauge = feature(&store, "Gauge", ValueKind::Number, false).await;
        let assignment = NewFeatureAssignment {
            feature_id: gauge.id.clone(),
            default_number_value: Some(0.0),
            ..Default::default()
        }
        .into_assignment(template.id.clone(), &gauge);
        store.insert_assignment(assignment).await.unwrap();

        Propagator::new(&store)
            .propagate_template(&template.id)
            .await
            .unwrap();
        let values = store
            .list_values_for_subject(SubjectKind::Product, &variant.id)
            .await
            .unwrap();
        assert_eq!(values[0].body, ValueBody::empty(ValueKind::Number));
    }

    #[tokio::test]
    async fn lot_features_skip_variants_and_fill_lots_on_refresh() {
        let store = MemoryStore::new();
        let template = NewProductTemplate {
            name: "Cable".to_string(),
        }
        .into_template(SCOPE.to_string());
        store.insert_template(template.clone()).await.unwrap();
        let variant = NewProductVariant {
            template_id: template.id.clone(),
            name: "Cable 3m".to_string(),
        }
        .into_variant(SCOPE.to_string());
        store.insert_variant(variant.clone()).await.unwrap();
        let lot = NewProductionLot {
            name: "LOT-001".to_string(),
            product_id: Some(variant.id.clone()),
        }
        .into_lot(SCOPE.to_string());
        store.insert_lot(lot.clone()).await.unwrap();

        let batch = feature(&store, "Batch note", ValueKind::Text, true).await;
        let assignment = NewFeatureAssignment {
            feature_id: batch.id.clone(),
            default_text_value: Some("inspect".to_string()),
            ..Default::default()
        }
        .into_assignment(template.id.clone(), &batch);
        store.insert_assignment(assignment).await.unwrap();

        let propagator = Propagator::new(&store);
        assert_eq!(propagator.propagate_template(&template.id).await.unwrap(), 0);
        assert!(store
            .list_values_for_subject(SubjectKind::Product, &variant.id)
            .await
            .unwrap()
            .is_empty());

        assert_eq!(propagator.refresh_lot(&lot.id).await.unwrap(), 1);
        let values = store
            .list_values_for_subject(SubjectKind::Lot, &lot.id)
            .await
            .unwrap();
        assert_eq!(values[0].body.text(), Some("inspect"));

        // Refresh replaces, never duplicates.
        assert_eq!(propagator.refresh_lot(&lot.id).await.unwrap(), 1);
        assert_eq!(
            store
                .list_values_for_subject(SubjectKind::Lot, &lot.id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn failed_refresh_leaves_existing_lot_values_intact() {
        let store = MemoryStore::new();
        let template = NewProductTemplate {
            name: "Cable".to_string(),
        }
        .into_template(SCOPE.to_string());
        store.insert_template(template.clone()).await.unwrap();
        let variant = NewProductVariant {
            template_id: template.id.clone(),
            name: "Cable 3m".to_string(),
        }
        .into_variant(SCOPE.to_string());
        store.insert_variant(variant.clone()).await.unwrap();
        let lot = NewProductionLot {
            name: "LOT-003".to_string(),
            product_id: Some(variant.id.clone()),
        }
        .into_lot(SCOPE.to_string());
        store.insert_lot(lot.clone()).await.unwrap();

        let batch = feature(&store, "Batch note", ValueKind::Text, true).await;
        let assignment = NewFeatureAssignment {
            feature_id: batch.id.clone(),
            default_text_value: Some("inspect".to_string()),
            ..Default::default()
        }
        .into_assignment(template.id.clone(), &batch);
        store.insert_assignment(assignment).await.unwrap();

        let propagator = Propagator::new(&store);
        assert_eq!(propagator.refresh_lot(&lot.id).await.unwrap(), 1);

        // An assignment whose feature is gone makes the rebuild fail.
        let dangling = FeatureAssignment {
            id: crate::model::generate_id(),
            template_id: template.id.clone(),
            feature_id: "ghost".to_string(),
            scope_id: SCOPE.to_string(),
            sequence: 0,
            default_table_value_id: None,
            default_text_value: None,
            default_number_value: None,
            min_number_value: None,
            max_number_value: None,
            filtered_table_value_ids: Vec::new(),
        };
        store.insert_assignment(dangling).await.unwrap();

        propagator.refresh_lot(&lot.id).await.unwrap_err();
        let values = store
            .list_values_for_subject(SubjectKind::Lot, &lot.id)
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].body.text(), Some("inspect"));
    }

    #[tokio::test]
    async fn lot_without_product_refreshes_to_nothing() {
        let store = MemoryStore::new();
        let lot = NewProductionLot {
            name: "LOT-002".to_string(),
            product_id: None,
        }
        .into_lot(SCOPE.to_string());
        store.insert_lot(lot.clone()).await.unwrap();

        assert_eq!(Propagator::new(&store).refresh_lot(&lot.id).await.unwrap(), 0);
    }
}
