use crate::logic::propagate::Propagator;
use crate::logic::validate::{BoundsWarning, FeatureValidator};
use crate::model::{
    FeatureAssignment, FeatureAssignmentUpdate, FeatureDefinition, FeatureDefinitionUpdate,
    FeatureError, FeatureResult, Id, NewFeatureAssignment, NewFeatureDefinition, NewTableValue,
    RequestContext, TableValue, ValueKind,
};
use crate::store::traits::Store;
use log::info;

/// Lifecycle operations on the reference side: definitions, table values
/// and template assignments. Reclassification guards and bound checks run
/// here, before anything reaches the store; assignment creation also kicks
/// off variant propagation so new templates fill in without a separate
/// call.
pub struct FeatureOps<'a, S> {
    store: &'a S,
    ctx: &'a RequestContext,
}

impl<'a, S: Store> FeatureOps<'a, S> {
    pub fn new(store: &'a S, ctx: &'a RequestContext) -> Self {
        Self { store, ctx }
    }

    pub async fn create_feature(
        &self,
        new: NewFeatureDefinition,
    ) -> FeatureResult<FeatureDefinition> {
        let feature = new.into_definition(self.ctx.scope_id.clone());
        self.store.insert_feature(feature.clone()).await?;
        info!("created feature {} ({})", feature.name, feature.id);
        Ok(feature)
    }

    /// Apply a partial update. Kind and lot-flag changes are refused once
    /// any value references the definition.
    pub async fn update_feature(
        &self,
        id: &Id,
        update: FeatureDefinitionUpdate,
    ) -> FeatureResult<FeatureDefinition> {
        let mut feature = self
            .store
            .get_feature(id)
            .await?
            .ok_or_else(|| FeatureError::not_found("feature", id))?;

        if let Some(kind) = update.value_kind {
            if kind != feature.value_kind {
                FeatureValidator::ensure_kind_change_allowed(self.store, id).await?;
            }
        }
        if let Some(is_lot) = update.is_lot_feature {
            if is_lot != feature.is_lot_feature {
                FeatureValidator::ensure_lot_flag_change_allowed(self.store, id).await?;
            }
        }

        feature.apply_update(update);
        self.store.update_feature(feature.clone()).await?;
        Ok(feature)
    }

    pub async fn delete_feature(&self, id: &Id) -> FeatureResult<bool> {
        self.store.delete_feature(id).await
    }

    /// Register a legal discrete option. Only table-kind definitions carry
    /// them.
    pub async fn create_table_value(
        &self,
        feature_id: &Id,
        new: NewTableValue,
    ) -> FeatureResult<TableValue> {
        let feature = self
            .store
            .get_feature(feature_id)
            .await?
            .ok_or_else(|| FeatureError::not_found("feature", feature_id))?;
        if feature.value_kind != ValueKind::Table {
            return Err(FeatureError::validation(
                "table values can only be defined for a table-kind feature",
            ));
        }
        let value = new.into_table_value(&feature);
        self.store.insert_table_value(value.clone()).await?;
        Ok(value)
    }

    pub async fn delete_table_value(&self, id: &Id) -> FeatureResult<bool> {
        self.store.delete_table_value(id).await
    }

    /// Bind a feature to a template. The bound-ordering invariants are
    /// enforced before insert; on success the template's variants are
    /// propagated immediately.
    pub async fn create_assignment(
        &self,
        template_id: &Id,
        new: NewFeatureAssignment,
    ) -> FeatureResult<FeatureAssignment> {
        self.store
            .get_template(template_id)
            .await?
            .ok_or_else(|| FeatureError::not_found("template", template_id))?;
        let feature = self
            .store
            .get_feature(&new.feature_id)
            .await?
            .ok_or_else(|| FeatureError::not_found("feature", &new.feature_id))?;

        let assignment = new.into_assignment(template_id.clone(), &feature);
        FeatureValidator::check_assignment_bounds(&assignment, &feature)?;
        self.store.insert_assignment(assignment.clone()).await?;

        Propagator::new(self.store)
            .propagate_template(template_id)
            .await?;
        Ok(assignment)
    }

    /// Apply a partial update to an assignment, re-checking bounds on the
    /// merged record. A sequence change is pushed down to the values that
    /// originated from this assignment.
    pub async fn update_assignment(
        &self,
        id: &Id,
        update: FeatureAssignmentUpdate,
    ) -> FeatureResult<FeatureAssignment> {
        let mut assignment = self
            .store
            .get_assignment(id)
            .await?
            .ok_or_else(|| FeatureError::not_found("assignment", id))?;
        let feature = self
            .store
            .get_feature(&assignment.feature_id)
            .await?
            .ok_or_else(|| FeatureError::not_found("feature", &assignment.feature_id))?;

        let old_sequence = assignment.sequence;
        assignment.apply_update(update);
        FeatureValidator::check_assignment_bounds(&assignment, &feature)?;
        self.store.update_assignment(assignment.clone()).await?;

        if assignment.sequence != old_sequence {
            self.sync_value_sequences(&assignment).await?;
        }
        Ok(assignment)
    }

    pub async fn delete_assignment(&self, id: &Id) -> FeatureResult<bool> {
        self.store.delete_assignment(id).await
    }

    /// Soft preview of the bound checks for a form that is still being
    /// composed; the blocking check still runs on save.
    pub async fn preview_assignment_bounds(
        &self,
        template_id: &Id,
        new: NewFeatureAssignment,
    ) -> FeatureResult<Option<BoundsWarning>> {
        let feature = self
            .store
            .get_feature(&new.feature_id)
            .await?
            .ok_or_else(|| FeatureError::not_found("feature", &new.feature_id))?;
        let assignment = new.into_assignment(template_id.clone(), &feature);
        Ok(FeatureValidator::assignment_bounds_warning(
            &assignment,
            &feature,
        ))
    }

    async fn sync_value_sequences(&self, assignment: &FeatureAssignment) -> FeatureResult<()> {
        let values = self
            .store
            .list_values_for_feature(&assignment.feature_id)
            .await?;
        for mut value in values {
            if value.assignment_id.as_deref() == Some(assignment.id.as_str()) {
                value.sequence = assignment.sequence;
                self.store.update_value(value).await?;
            }
        }
        Ok(())
    }
}
