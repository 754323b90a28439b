use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::model::{
    DeletionPolicy, FeatureAssignment, FeatureDefinition, FeatureError, FeatureResult,
    FeatureValue, Id, OnAssignmentDelete, ProductTemplate, ProductVariant, ProductionLot,
    SubjectKind, TableValue,
};
use crate::store::traits::{
    AssignmentStore, FeatureDefinitionStore, Store, SubjectStore, TableValueStore, ValueStore,
};

/// In-memory store backend. Used by the test suite and for local
/// development; enforces the same uniqueness tuples and delete semantics
/// the PostgreSQL backend gets from its constraints.
#[derive(Debug)]
pub struct MemoryStore {
    features: RwLock<HashMap<Id, FeatureDefinition>>,
    table_values: RwLock<HashMap<Id, TableValue>>,
    assignments: RwLock<HashMap<Id, FeatureAssignment>>,
    templates: RwLock<HashMap<Id, ProductTemplate>>,
    variants: RwLock<HashMap<Id, ProductVariant>>,
    lots: RwLock<HashMap<Id, ProductionLot>>,
    values: RwLock<HashMap<Id, FeatureValue>>,
    deletion_policy: DeletionPolicy,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_policy(DeletionPolicy::default())
    }

    pub fn with_policy(deletion_policy: DeletionPolicy) -> Self {
        Self {
            features: RwLock::new(HashMap::new()),
            table_values: RwLock::new(HashMap::new()),
            assignments: RwLock::new(HashMap::new()),
            templates: RwLock::new(HashMap::new()),
            variants: RwLock::new(HashMap::new()),
            lots: RwLock::new(HashMap::new()),
            values: RwLock::new(HashMap::new()),
            deletion_policy,
        }
    }

    pub fn deletion_policy(&self) -> DeletionPolicy {
        self.deletion_policy
    }

    /// Apply the deletion policy to the values originating from one
    /// assignment. Shared by assignment and template deletion.
    async fn unlink_assignment_values(&self, assignment_id: &Id) {
        let mut values = self.values.write().await;
        let affected: Vec<Id> = values
            .iter()
            .filter(|(_, v)| v.assignment_id.as_ref() == Some(assignment_id))
            .map(|(id, _)| id.clone())
            .collect();
        for id in affected {
            let kind = values[&id].subject_kind;
            match self.deletion_policy.for_kind(kind) {
                OnAssignmentDelete::Cascade => {
                    values.remove(&id);
                }
                OnAssignmentDelete::Detach => {
                    if let Some(v) = values.get_mut(&id) {
                        v.assignment_id = None;
                    }
                }
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FeatureDefinitionStore for MemoryStore {
    async fn get_feature(&self, id: &Id) -> FeatureResult<Option<FeatureDefinition>> {
        Ok(self.features.read().await.get(id).cloned())
    }

    async fn list_features(&self, scope_id: &Id) -> FeatureResult<Vec<FeatureDefinition>> {
        let mut features: Vec<FeatureDefinition> = self
            .features
            .read()
            .await
            .values()
            .filter(|f| &f.scope_id == scope_id)
            .cloned()
            .collect();
        features.sort_by(|a, b| (&a.code, &a.name).cmp(&(&b.code, &b.name)));
        Ok(features)
    }

    async fn insert_feature(&self, feature: FeatureDefinition) -> FeatureResult<()> {
        let mut features = self.features.write().await;
        let duplicate = features.values().any(|f| {
            f.scope_id == feature.scope_id && f.code == feature.code && f.name == feature.name
        });
        if duplicate {
            return Err(FeatureError::constraint(
                "you can not have two features with the same code and name",
            ));
        }
        features.insert(feature.id.clone(), feature);
        Ok(())
    }

    async fn update_feature(&self, feature: FeatureDefinition) -> FeatureResult<()> {
        let mut features = self.features.write().await;
        if !features.contains_key(&feature.id) {
            return Err(FeatureError::not_found("feature", &feature.id));
        }
        let duplicate = features.values().any(|f| {
            f.id != feature.id
                && f.scope_id == feature.scope_id
                && f.code == feature.code
                && f.name == feature.name
        });
        if duplicate {
            return Err(FeatureError::constraint(
                "you can not have two features with the same code and name",
            ));
        }
        features.insert(feature.id.clone(), feature);
        Ok(())
    }

    async fn delete_feature(&self, id: &Id) -> FeatureResult<bool> {
        let referenced_by_assignment = self
            .assignments
            .read()
            .await
            .values()
            .any(|a| &a.feature_id == id);
        let referenced_by_value = self
            .values
            .read()
            .await
            .values()
            .any(|v| &v.feature_id == id);
        if referenced_by_assignment || referenced_by_value {
            return Err(FeatureError::validation(
                "feature is referenced by assignments or values and can not be deleted",
            ));
        }
        self.table_values
            .write()
            .await
            .retain(|_, tv| &tv.feature_id != id);
        Ok(self.features.write().await.remove(id).is_some())
    }
}

#[async_trait::async_trait]
impl TableValueStore for MemoryStore {
    async fn get_table_value(&self, id: &Id) -> FeatureResult<Option<TableValue>> {
        Ok(self.table_values.read().await.get(id).cloned())
    }

    async fn list_table_values(&self, feature_id: &Id) -> FeatureResult<Vec<TableValue>> {
        let mut values: Vec<TableValue> = self
            .table_values
            .read()
            .await
            .values()
            .filter(|tv| &tv.feature_id == feature_id)
            .cloned()
            .collect();
        values.sort_by(|a, b| (&a.code, &a.name).cmp(&(&b.code, &b.name)));
        Ok(values)
    }

    async fn insert_table_value(&self, value: TableValue) -> FeatureResult<()> {
        let mut table_values = self.table_values.write().await;
        let duplicate = table_values.values().any(|tv| {
            tv.scope_id == value.scope_id
                && tv.feature_id == value.feature_id
                && tv.code == value.code
                && tv.name == value.name
        });
        if duplicate {
            return Err(FeatureError::constraint(
                "you can not have two values with the same code and name in the feature",
            ));
        }
        table_values.insert(value.id.clone(), value);
        Ok(())
    }

    async fn delete_table_value(&self, id: &Id) -> FeatureResult<bool> {
        let referenced = self
            .values
            .read()
            .await
            .values()
            .any(|v| v.body.table_value_id() == Some(id));
        if referenced {
            return Err(FeatureError::validation(
                "table value is referenced by feature values and can not be deleted",
            ));
        }
        Ok(self.table_values.write().await.remove(id).is_some())
    }

    async fn find_table_value_by_code(
        &self,
        scope_id: &Id,
        feature_id: &Id,
        code: &str,
    ) -> FeatureResult<Option<TableValue>> {
        Ok(self
            .table_values
            .read()
            .await
            .values()
            .find(|tv| {
                &tv.scope_id == scope_id
                    && &tv.feature_id == feature_id
                    && tv.code.as_deref() == Some(code)
            })
            .cloned())
    }

    async fn find_table_value_by_name(
        &self,
        scope_id: &Id,
        feature_id: &Id,
        name: &str,
    ) -> FeatureResult<Option<TableValue>> {
        Ok(self
            .table_values
            .read()
            .await
            .values()
            .find(|tv| &tv.scope_id == scope_id && &tv.feature_id == feature_id && tv.name == name)
            .cloned())
    }
}

#[async_trait::async_trait]
impl AssignmentStore for MemoryStore {
    async fn get_assignment(&self, id: &Id) -> FeatureResult<Option<FeatureAssignment>> {
        Ok(self.assignments.read().await.get(id).cloned())
    }

    async fn list_assignments_for_template(
        &self,
        template_id: &Id,
    ) -> FeatureResult<Vec<FeatureAssignment>> {
        let mut assignments: Vec<FeatureAssignment> = self
            .assignments
            .read()
            .await
            .values()
            .filter(|a| &a.template_id == template_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|a| a.sequence);
        Ok(assignments)
    }

    async fn insert_assignment(&self, assignment: FeatureAssignment) -> FeatureResult<()> {
        let mut assignments = self.assignments.write().await;
        let duplicate = assignments.values().any(|a| {
            a.scope_id == assignment.scope_id
                && a.template_id == assignment.template_id
                && a.feature_id == assignment.feature_id
        });
        if duplicate {
            return Err(FeatureError::constraint(
                "you can not have the same feature two times on the template",
            ));
        }
        assignments.insert(assignment.id.clone(), assignment);
        Ok(())
    }

    async fn update_assignment(&self, assignment: FeatureAssignment) -> FeatureResult<()> {
        let mut assignments = self.assignments.write().await;
        if !assignments.contains_key(&assignment.id) {
            return Err(FeatureError::not_found("assignment", &assignment.id));
        }
        assignments.insert(assignment.id.clone(), assignment);
        Ok(())
    }

    async fn delete_assignment(&self, id: &Id) -> FeatureResult<bool> {
        let existed = self.assignments.write().await.remove(id).is_some();
        if existed {
            self.unlink_assignment_values(id).await;
        }
        Ok(existed)
    }
}

#[async_trait::async_trait]
impl SubjectStore for MemoryStore {
    async fn get_template(&self, id: &Id) -> FeatureResult<Option<ProductTemplate>> {
        Ok(self.templates.read().await.get(id).cloned())
    }

    async fn list_templates(&self, scope_id: &Id) -> FeatureResult<Vec<ProductTemplate>> {
        let mut templates: Vec<ProductTemplate> = self
            .templates
            .read()
            .await
            .values()
            .filter(|t| &t.scope_id == scope_id)
            .cloned()
            .collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    async fn insert_template(&self, template: ProductTemplate) -> FeatureResult<()> {
        self.templates
            .write()
            .await
            .insert(template.id.clone(), template);
        Ok(())
    }

    async fn delete_template(&self, id: &Id) -> FeatureResult<bool> {
        let Some(_) = self.templates.write().await.remove(id) else {
            return Ok(false);
        };
        // Assignments cascade with their template, each applying the
        // value deletion policy.
        let assignment_ids: Vec<Id> = self
            .assignments
            .read()
            .await
            .values()
            .filter(|a| &a.template_id == id)
            .map(|a| a.id.clone())
            .collect();
        for assignment_id in assignment_ids {
            self.assignments.write().await.remove(&assignment_id);
            self.unlink_assignment_values(&assignment_id).await;
        }
        let variant_ids: Vec<Id> = self
            .variants
            .read()
            .await
            .values()
            .filter(|v| &v.template_id == id)
            .map(|v| v.id.clone())
            .collect();
        for variant_id in variant_ids {
            self.delete_variant(&variant_id).await?;
        }
        Ok(true)
    }

    async fn get_variant(&self, id: &Id) -> FeatureResult<Option<ProductVariant>> {
        Ok(self.variants.read().await.get(id).cloned())
    }

    async fn list_variants_for_template(
        &self,
        template_id: &Id,
    ) -> FeatureResult<Vec<ProductVariant>> {
        let mut variants: Vec<ProductVariant> = self
            .variants
            .read()
            .await
            .values()
            .filter(|v| &v.template_id == template_id)
            .cloned()
            .collect();
        variants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(variants)
    }

    async fn insert_variant(&self, variant: ProductVariant) -> FeatureResult<()> {
        self.variants
            .write()
            .await
            .insert(variant.id.clone(), variant);
        Ok(())
    }

    async fn delete_variant(&self, id: &Id) -> FeatureResult<bool> {
        let existed = self.variants.write().await.remove(id).is_some();
        if existed {
            self.values
                .write()
                .await
                .retain(|_, v| !(v.subject_kind == SubjectKind::Product && &v.subject_id == id));
            // Lots pointing at the removed variant lose the reference but
            // keep their historical values.
            let mut lots = self.lots.write().await;
            for lot in lots.values_mut() {
                if lot.product_id.as_ref() == Some(id) {
                    lot.product_id = None;
                }
            }
        }
        Ok(existed)
    }

    async fn get_lot(&self, id: &Id) -> FeatureResult<Option<ProductionLot>> {
        Ok(self.lots.read().await.get(id).cloned())
    }

    async fn list_lots(&self, scope_id: &Id) -> FeatureResult<Vec<ProductionLot>> {
        let mut lots: Vec<ProductionLot> = self
            .lots
            .read()
            .await
            .values()
            .filter(|l| &l.scope_id == scope_id)
            .cloned()
            .collect();
        lots.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(lots)
    }

    async fn insert_lot(&self, lot: ProductionLot) -> FeatureResult<()> {
        self.lots.write().await.insert(lot.id.clone(), lot);
        Ok(())
    }

    async fn update_lot(&self, lot: ProductionLot) -> FeatureResult<()> {
        let mut lots = self.lots.write().await;
        if !lots.contains_key(&lot.id) {
            return Err(FeatureError::not_found("lot", &lot.id));
        }
        lots.insert(lot.id.clone(), lot);
        Ok(())
    }

    async fn delete_lot(&self, id: &Id) -> FeatureResult<bool> {
        let existed = self.lots.write().await.remove(id).is_some();
        if existed {
            self.values
                .write()
                .await
                .retain(|_, v| !(v.subject_kind == SubjectKind::Lot && &v.subject_id == id));
        }
        Ok(existed)
    }
}

#[async_trait::async_trait]
impl ValueStore for MemoryStore {
    async fn get_value(&self, id: &Id) -> FeatureResult<Option<FeatureValue>> {
        Ok(self.values.read().await.get(id).cloned())
    }

    async fn list_values_for_subject(
        &self,
        subject_kind: SubjectKind,
        subject_id: &Id,
    ) -> FeatureResult<Vec<FeatureValue>> {
        let mut values: Vec<FeatureValue> = self
            .values
            .read()
            .await
            .values()
            .filter(|v| v.subject_kind == subject_kind && &v.subject_id == subject_id)
            .cloned()
            .collect();
        values.sort_by_key(|v| v.sequence);
        Ok(values)
    }

    async fn list_values_for_feature(&self, feature_id: &Id) -> FeatureResult<Vec<FeatureValue>> {
        Ok(self
            .values
            .read()
            .await
            .values()
            .filter(|v| &v.feature_id == feature_id)
            .cloned()
            .collect())
    }

    async fn insert_value(&self, value: FeatureValue) -> FeatureResult<()> {
        let mut values = self.values.write().await;
        let duplicate = values.values().any(|v| {
            v.scope_id == value.scope_id
                && v.subject_kind == value.subject_kind
                && v.subject_id == value.subject_id
                && v.feature_id == value.feature_id
        });
        if duplicate {
            return Err(FeatureError::constraint(
                "you can not have more than one value for a feature",
            ));
        }
        values.insert(value.id.clone(), value);
        Ok(())
    }

    async fn update_value(&self, value: FeatureValue) -> FeatureResult<()> {
        let mut values = self.values.write().await;
        if !values.contains_key(&value.id) {
            return Err(FeatureError::not_found("feature value", &value.id));
        }
        values.insert(value.id.clone(), value);
        Ok(())
    }

    async fn delete_value(&self, id: &Id) -> FeatureResult<bool> {
        Ok(self.values.write().await.remove(id).is_some())
    }

    async fn delete_values_for_subject(
        &self,
        subject_kind: SubjectKind,
        subject_id: &Id,
    ) -> FeatureResult<usize> {
        let mut values = self.values.write().await;
        let before = values.len();
        values.retain(|_, v| !(v.subject_kind == subject_kind && &v.subject_id == subject_id));
        Ok(before - values.len())
    }
}

impl Store for MemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        FeatureValue, NewFeatureAssignment, NewFeatureDefinition, ValueBody, ValueKind,
    };

    fn color_feature(scope: &str) -> FeatureDefinition {
        NewFeatureDefinition {
            code: Some("COL".to_string()),
            name: "Color".to_string(),
            value_kind: ValueKind::Table,
            num_decimals: 2,
            is_lot_feature: false,
        }
        .into_definition(scope.to_string())
    }

    #[tokio::test]
    async fn duplicate_feature_key_is_rejected() {
        let store = MemoryStore::new();
        store.insert_feature(color_feature("acme")).await.unwrap();

        let result = store.insert_feature(color_feature("acme")).await;
        assert!(matches!(
            result,
            Err(FeatureError::ConstraintViolation(_))
        ));

        // Same tuple in another scope is fine.
        store.insert_feature(color_feature("globex")).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_subject_value_is_rejected() {
        let store = MemoryStore::new();
        let feature = color_feature("acme");
        store.insert_feature(feature.clone()).await.unwrap();

        let make_value = || FeatureValue {
            id: crate::model::generate_id(),
            subject_kind: SubjectKind::Product,
            subject_id: "variant-1".to_string(),
            assignment_id: None,
            feature_id: feature.id.clone(),
            scope_id: "acme".to_string(),
            sequence: 0,
            body: ValueBody::empty(ValueKind::Table),
        };

        store.insert_value(make_value()).await.unwrap();
        let result = store.insert_value(make_value()).await;
        assert!(matches!(
            result,
            Err(FeatureError::ConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn assignment_delete_applies_per_kind_policy() {
        let store = MemoryStore::new();
        let feature = color_feature("acme");
        store.insert_feature(feature.clone()).await.unwrap();

        let assignment = NewFeatureAssignment {
            feature_id: feature.id.clone(),
            ..Default::default()
        }
        .into_assignment("tmpl-1".to_string(), &feature);
        store.insert_assignment(assignment.clone()).await.unwrap();

        let product_value = FeatureValue::from_assignment(
            SubjectKind::Product,
            "variant-1".to_string(),
            &assignment,
            ValueBody::empty(ValueKind::Table),
        );
        let lot_value = FeatureValue::from_assignment(
            SubjectKind::Lot,
            "lot-1".to_string(),
            &assignment,
            ValueBody::empty(ValueKind::Table),
        );
        store.insert_value(product_value.clone()).await.unwrap();
        store.insert_value(lot_value.clone()).await.unwrap();

        store.delete_assignment(&assignment.id).await.unwrap();

        // Product value cascades away, lot value survives detached.
        assert!(store.get_value(&product_value.id).await.unwrap().is_none());
        let survivor = store.get_value(&lot_value.id).await.unwrap().unwrap();
        assert_eq!(survivor.assignment_id, None);
        assert_eq!(survivor.sequence, assignment.sequence);
    }
}
