use crate::logic::accessor::ValueAccessor;
use crate::logic::validate::{BoundsWarning, FeatureValidator};
use crate::model::{
    FeatureError, FeatureResult, FeatureValue, Id, NewFeatureValue, RenderedValue, RequestContext,
    SubjectKind, TableValue,
};
use crate::store::traits::Store;

/// Lifecycle operations on feature values. Creation checks the body shape
/// against the definition and the subject kind against the lot flag; all
/// reads and writes after that go through the uniform accessor and are
/// persisted here.
pub struct ValueOps<'a, S> {
    store: &'a S,
    ctx: &'a RequestContext,
}

impl<'a, S: Store> ValueOps<'a, S> {
    pub fn new(store: &'a S, ctx: &'a RequestContext) -> Self {
        Self { store, ctx }
    }

    fn accessor(&self) -> ValueAccessor<'a, S> {
        ValueAccessor::new(self.store, self.ctx)
    }

    pub async fn create_value(&self, new: NewFeatureValue) -> FeatureResult<FeatureValue> {
        let feature = self
            .store
            .get_feature(&new.feature_id)
            .await?
            .ok_or_else(|| FeatureError::not_found("feature", &new.feature_id))?;
        if new.body.kind() != feature.value_kind {
            return Err(FeatureError::validation(format!(
                "feature {} carries {:?} values, got a {:?} body",
                feature.name,
                feature.value_kind,
                new.body.kind()
            )));
        }
        let expected_kind = if feature.is_lot_feature {
            SubjectKind::Lot
        } else {
            SubjectKind::Product
        };
        if new.subject_kind != expected_kind {
            return Err(FeatureError::validation(format!(
                "feature {} applies to {:?} subjects",
                feature.name, expected_kind
            )));
        }

        let mut sequence = 0;
        if let Some(assignment_id) = &new.assignment_id {
            let assignment = self
                .store
                .get_assignment(assignment_id)
                .await?
                .ok_or_else(|| FeatureError::not_found("assignment", assignment_id))?;
            if assignment.feature_id != feature.id {
                return Err(FeatureError::validation(
                    "assignment does not belong to the value's feature",
                ));
            }
            if let Some(number) = new.body.number() {
                FeatureValidator::check_number_limits(
                    number,
                    &assignment,
                    &feature,
                    &self.ctx.locale,
                )?;
            }
            sequence = assignment.sequence;
        }

        let value = FeatureValue {
            id: crate::model::generate_id(),
            subject_kind: new.subject_kind,
            subject_id: new.subject_id,
            assignment_id: new.assignment_id,
            feature_id: feature.id.clone(),
            scope_id: feature.scope_id.clone(),
            sequence,
            body: new.body,
        };
        self.store.insert_value(value.clone()).await?;
        Ok(value)
    }

    async fn fetch(&self, id: &Id) -> FeatureResult<FeatureValue> {
        self.store
            .get_value(id)
            .await?
            .ok_or_else(|| FeatureError::not_found("value", id))
    }

    /// Write through the code projection and persist. An unresolved table
    /// code leaves the stored record untouched.
    pub async fn set_code(&self, id: &Id, code: &str) -> FeatureResult<FeatureValue> {
        let mut value = self.fetch(id).await?;
        self.accessor().write_code(&mut value, code).await?;
        self.store.update_value(value.clone()).await?;
        Ok(value)
    }

    /// Write through the value projection and persist.
    pub async fn set_value(&self, id: &Id, input: &str) -> FeatureResult<FeatureValue> {
        let mut value = self.fetch(id).await?;
        self.accessor().write_value(&mut value, input).await?;
        self.store.update_value(value.clone()).await?;
        Ok(value)
    }

    pub async fn set_number(&self, id: &Id, number: f64) -> FeatureResult<FeatureValue> {
        let mut value = self.fetch(id).await?;
        self.accessor().write_number(&mut value, number).await?;
        self.store.update_value(value.clone()).await?;
        Ok(value)
    }

    pub async fn render(&self, id: &Id) -> FeatureResult<RenderedValue> {
        let value = self.fetch(id).await?;
        self.accessor().render(&value).await
    }

    pub async fn render_for_subject(
        &self,
        subject_kind: SubjectKind,
        subject_id: &Id,
    ) -> FeatureResult<Vec<RenderedValue>> {
        let mut values = self
            .store
            .list_values_for_subject(subject_kind, subject_id)
            .await?;
        values.sort_by_key(|v| v.sequence);
        let accessor = self.accessor();
        let mut out = Vec::with_capacity(values.len());
        for value in &values {
            out.push(accessor.render(value).await?);
        }
        Ok(out)
    }

    pub async fn possible_values(&self, id: &Id) -> FeatureResult<Vec<TableValue>> {
        let value = self.fetch(id).await?;
        self.accessor().possible_values(&value).await
    }

    /// Soft preview of the number bound check for a value still being
    /// edited. None for detached values or non-number features.
    pub async fn number_limits_warning(
        &self,
        id: &Id,
        number: f64,
    ) -> FeatureResult<Option<BoundsWarning>> {
        let value = self.fetch(id).await?;
        let Some(assignment_id) = &value.assignment_id else {
            return Ok(None);
        };
        let Some(assignment) = self.store.get_assignment(assignment_id).await? else {
            return Ok(None);
        };
        let feature = self
            .store
            .get_feature(&value.feature_id)
            .await?
            .ok_or_else(|| FeatureError::not_found("feature", &value.feature_id))?;
        Ok(FeatureValidator::number_limits_warning(
            number,
            &assignment,
            &feature,
            &self.ctx.locale,
        ))
    }

    pub async fn delete_value(&self, id: &Id) -> FeatureResult<bool> {
        self.store.delete_value(id).await
    }
}
