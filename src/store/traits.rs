use crate::model::{
    FeatureAssignment, FeatureDefinition, FeatureResult, FeatureValue, Id, ProductTemplate,
    ProductVariant, ProductionLot, SubjectKind, TableValue,
};

/// Reference data: feature definitions.
///
/// Backends enforce the (scope, code, name) uniqueness tuple on insert and
/// update, failing with `FeatureError::ConstraintViolation`. Deletion is
/// restricted while any assignment or value references the definition;
/// the definition's own table values are removed with it.
#[async_trait::async_trait]
pub trait FeatureDefinitionStore: Send + Sync {
    async fn get_feature(&self, id: &Id) -> FeatureResult<Option<FeatureDefinition>>;
    async fn list_features(&self, scope_id: &Id) -> FeatureResult<Vec<FeatureDefinition>>;
    async fn insert_feature(&self, feature: FeatureDefinition) -> FeatureResult<()>;
    async fn update_feature(&self, feature: FeatureDefinition) -> FeatureResult<()>;
    async fn delete_feature(&self, id: &Id) -> FeatureResult<bool>;
}

/// Reference data: the legal discrete values of table-kind features.
/// (scope, feature, code, name) unique; deletion restricted while a value
/// references the entry. Lookups by code/name are exact matches within
/// one feature and scope.
#[async_trait::async_trait]
pub trait TableValueStore: Send + Sync {
    async fn get_table_value(&self, id: &Id) -> FeatureResult<Option<TableValue>>;
    async fn list_table_values(&self, feature_id: &Id) -> FeatureResult<Vec<TableValue>>;
    async fn insert_table_value(&self, value: TableValue) -> FeatureResult<()>;
    async fn delete_table_value(&self, id: &Id) -> FeatureResult<bool>;
    async fn find_table_value_by_code(
        &self,
        scope_id: &Id,
        feature_id: &Id,
        code: &str,
    ) -> FeatureResult<Option<TableValue>>;
    async fn find_table_value_by_name(
        &self,
        scope_id: &Id,
        feature_id: &Id,
        name: &str,
    ) -> FeatureResult<Option<TableValue>>;
}

/// Template-to-feature bindings. (scope, template, feature) unique.
/// Deleting an assignment applies the configured deletion policy to the
/// values that originated from it (cascade for product values, detach for
/// lot values by default).
#[async_trait::async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn get_assignment(&self, id: &Id) -> FeatureResult<Option<FeatureAssignment>>;
    async fn list_assignments_for_template(
        &self,
        template_id: &Id,
    ) -> FeatureResult<Vec<FeatureAssignment>>;
    async fn insert_assignment(&self, assignment: FeatureAssignment) -> FeatureResult<()>;
    async fn update_assignment(&self, assignment: FeatureAssignment) -> FeatureResult<()>;
    async fn delete_assignment(&self, id: &Id) -> FeatureResult<bool>;
}

/// The external subject entities: templates, variants, lots. Only the
/// slices of them the propagation engine needs. Deleting a subject takes
/// its feature values with it; deleting a template cascades to its
/// assignments (and from there per the deletion policy) and its variants.
#[async_trait::async_trait]
pub trait SubjectStore: Send + Sync {
    async fn get_template(&self, id: &Id) -> FeatureResult<Option<ProductTemplate>>;
    async fn list_templates(&self, scope_id: &Id) -> FeatureResult<Vec<ProductTemplate>>;
    async fn insert_template(&self, template: ProductTemplate) -> FeatureResult<()>;
    async fn delete_template(&self, id: &Id) -> FeatureResult<bool>;

    async fn get_variant(&self, id: &Id) -> FeatureResult<Option<ProductVariant>>;
    async fn list_variants_for_template(
        &self,
        template_id: &Id,
    ) -> FeatureResult<Vec<ProductVariant>>;
    async fn insert_variant(&self, variant: ProductVariant) -> FeatureResult<()>;
    async fn delete_variant(&self, id: &Id) -> FeatureResult<bool>;

    async fn get_lot(&self, id: &Id) -> FeatureResult<Option<ProductionLot>>;
    async fn list_lots(&self, scope_id: &Id) -> FeatureResult<Vec<ProductionLot>>;
    async fn insert_lot(&self, lot: ProductionLot) -> FeatureResult<()>;
    async fn update_lot(&self, lot: ProductionLot) -> FeatureResult<()>;
    async fn delete_lot(&self, id: &Id) -> FeatureResult<bool>;
}

/// Feature values themselves. (scope, subject, feature) unique on insert.
#[async_trait::async_trait]
pub trait ValueStore: Send + Sync {
    async fn get_value(&self, id: &Id) -> FeatureResult<Option<FeatureValue>>;
    async fn list_values_for_subject(
        &self,
        subject_kind: SubjectKind,
        subject_id: &Id,
    ) -> FeatureResult<Vec<FeatureValue>>;
    /// Every value referencing a feature, across both subject kinds.
    /// Used by the reclassification guards.
    async fn list_values_for_feature(&self, feature_id: &Id) -> FeatureResult<Vec<FeatureValue>>;
    async fn insert_value(&self, value: FeatureValue) -> FeatureResult<()>;
    async fn update_value(&self, value: FeatureValue) -> FeatureResult<()>;
    async fn delete_value(&self, id: &Id) -> FeatureResult<bool>;
    /// Delete all values of one subject; used by the lot full-refresh
    /// policy. Returns the number removed.
    async fn delete_values_for_subject(
        &self,
        subject_kind: SubjectKind,
        subject_id: &Id,
    ) -> FeatureResult<usize>;
}

pub trait Store:
    FeatureDefinitionStore + TableValueStore + AssignmentStore + SubjectStore + ValueStore + Send + Sync
{
}
