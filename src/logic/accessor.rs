use crate::logic::numeric::{format_number, parse_number};
use crate::logic::validate::FeatureValidator;
use crate::model::{
    FeatureDefinition, FeatureError, FeatureResult, FeatureValue, RenderedValue, RequestContext,
    TableValue, ValueBody,
};
use crate::store::traits::Store;

/// Uniform read/write surface over the three physical value shapes.
///
/// Reads dispatch on the body variant and have no side effects; writes
/// perform the reverse lookup (table kinds) or locale-aware parse (number
/// kind) before mutating the record. Persistence stays with the caller.
pub struct ValueAccessor<'a, S> {
    store: &'a S,
    ctx: &'a RequestContext,
}

impl<'a, S: Store> ValueAccessor<'a, S> {
    pub fn new(store: &'a S, ctx: &'a RequestContext) -> Self {
        Self { store, ctx }
    }

    async fn feature_of(&self, value: &FeatureValue) -> FeatureResult<FeatureDefinition> {
        self.store
            .get_feature(&value.feature_id)
            .await?
            .ok_or_else(|| FeatureError::not_found("feature", &value.feature_id))
    }

    async fn bound_table_value(&self, value: &FeatureValue) -> FeatureResult<Option<TableValue>> {
        match value.body.table_value_id() {
            Some(id) => self.store.get_table_value(id).await,
            None => Ok(None),
        }
    }

    /// The `code` projection: the bound table value's code for table
    /// kind, the stored raw code otherwise. Empty when unset.
    pub async fn code(&self, value: &FeatureValue) -> FeatureResult<String> {
        Ok(match &value.body {
            ValueBody::Table { .. } => self
                .bound_table_value(value)
                .await?
                .and_then(|tv| tv.code)
                .unwrap_or_default(),
            ValueBody::Text { code, .. } | ValueBody::Number { code, .. } => {
                code.clone().unwrap_or_default()
            }
        })
    }

    /// The `value` projection: the table value's display name, the free
    /// text, or the number rendered at the definition's precision with
    /// the context locale's separators.
    pub async fn value(&self, value: &FeatureValue) -> FeatureResult<String> {
        Ok(match &value.body {
            ValueBody::Table { .. } => self
                .bound_table_value(value)
                .await?
                .map(|tv| tv.name)
                .unwrap_or_default(),
            ValueBody::Text { text, .. } => text.clone().unwrap_or_default(),
            ValueBody::Number { number, .. } => match number {
                Some(n) => {
                    let feature = self.feature_of(value).await?;
                    format_number(*n, feature.num_decimals, &self.ctx.locale)
                }
                None => String::new(),
            },
        })
    }

    /// `"<feature>: [<code>] - <value>"`, dropping the bracketed code
    /// when there is none.
    pub async fn display_name(&self, value: &FeatureValue) -> FeatureResult<String> {
        let feature = self.feature_of(value).await?;
        let code = self.code(value).await?;
        let rendered = self.value(value).await?;
        Ok(if code.is_empty() {
            format!("{}: {}", feature.name, rendered)
        } else {
            format!("{}: [{}] - {}", feature.name, code, rendered)
        })
    }

    pub async fn render(&self, value: &FeatureValue) -> FeatureResult<RenderedValue> {
        Ok(RenderedValue {
            id: value.id.clone(),
            feature_id: value.feature_id.clone(),
            code: self.code(value).await?,
            value: self.value(value).await?,
            display_name: self.display_name(value).await?,
        })
    }

    /// The table values a user may choose for this record: the
    /// assignment's restricted subset when one is configured, otherwise
    /// the feature's whole registry. A detached value offers nothing.
    pub async fn possible_values(&self, value: &FeatureValue) -> FeatureResult<Vec<TableValue>> {
        let Some(assignment_id) = &value.assignment_id else {
            return Ok(Vec::new());
        };
        let Some(assignment) = self.store.get_assignment(assignment_id).await? else {
            return Ok(Vec::new());
        };
        if assignment.filtered_table_value_ids.is_empty() {
            return self.store.list_table_values(&value.feature_id).await;
        }
        let mut out = Vec::with_capacity(assignment.filtered_table_value_ids.len());
        for id in &assignment.filtered_table_value_ids {
            if let Some(tv) = self.store.get_table_value(id).await? {
                out.push(tv);
            }
        }
        Ok(out)
    }

    /// Write through the `code` projection. For table kind this is an
    /// exact code lookup within the feature and scope; an unresolved
    /// code is deliberately swallowed, leaving the prior binding intact
    /// (see the workflow tests before changing this). For the other
    /// kinds the raw code string is stored as-is.
    pub async fn write_code(&self, value: &mut FeatureValue, input: &str) -> FeatureResult<()> {
        match &mut value.body {
            ValueBody::Table { table_value_id } => {
                if let Some(tv) = self
                    .store
                    .find_table_value_by_code(&self.ctx.scope_id, &value.feature_id, input)
                    .await?
                {
                    *table_value_id = Some(tv.id);
                }
            }
            ValueBody::Text { code, .. } | ValueBody::Number { code, .. } => {
                *code = Some(input.to_string());
            }
        }
        Ok(())
    }

    /// Write through the `value` projection. Table kind resolves by
    /// exact display-name match with the same swallow-on-miss policy;
    /// text is stored as-is; number is parsed with the context locale
    /// and bounds-checked against the origin assignment before the
    /// mutation is applied.
    pub async fn write_value(&self, value: &mut FeatureValue, input: &str) -> FeatureResult<()> {
        match &mut value.body {
            ValueBody::Table { table_value_id } => {
                if let Some(tv) = self
                    .store
                    .find_table_value_by_name(&self.ctx.scope_id, &value.feature_id, input)
                    .await?
                {
                    *table_value_id = Some(tv.id);
                }
                Ok(())
            }
            ValueBody::Text { text, .. } => {
                *text = Some(input.to_string());
                Ok(())
            }
            ValueBody::Number { .. } => {
                let parsed = parse_number(input, &self.ctx.locale)?;
                self.write_number(value, parsed).await
            }
        }
    }

    /// Direct numeric write, shared with `write_value`: the same
    /// precision-aware bounds check applies on both paths.
    pub async fn write_number(&self, value: &mut FeatureValue, number: f64) -> FeatureResult<()> {
        let feature = self.feature_of(value).await?;
        if let Some(assignment_id) = &value.assignment_id {
            if let Some(assignment) = self.store.get_assignment(assignment_id).await? {
                FeatureValidator::check_number_limits(
                    number,
                    &assignment,
                    &feature,
                    &self.ctx.locale,
                )?;
            }
        }
        match &mut value.body {
            ValueBody::Number { number: slot, .. } => {
                *slot = Some(number);
                Ok(())
            }
            _ => Err(FeatureError::validation(
                "a numeric value can only be written to a number-kind feature",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        NewFeatureAssignment, NewFeatureDefinition, NewTableValue, SubjectKind, ValueKind,
    };
    use crate::store::traits::{AssignmentStore, FeatureDefinitionStore, TableValueStore};
    use crate::store::MemoryStore;

    async fn table_fixture(store: &MemoryStore) -> (FeatureDefinition, TableValue, TableValue) {
        let feature = NewFeatureDefinition {
            code: Some("COL".to_string()),
            name: "Color".to_string(),
            value_kind: ValueKind::Table,
            num_decimals: 2,
            is_lot_feature: false,
        }
        .into_definition("acme".to_string());
        store.insert_feature(feature.clone()).await.unwrap();

        let red = NewTableValue {
            code: Some("R".to_string()),
            name: "Red".to_string(),
        }
        .into_table_value(&feature);
        let blue = NewTableValue {
            code: Some("B".to_string()),
            name: "Blue".to_string(),
        }
        .into_table_value(&feature);
        store.insert_table_value(red.clone()).await.unwrap();
        store.insert_table_value(blue.clone()).await.unwrap();
        (feature, red, blue)
    }

    #[tokio::test]
    async fn table_code_write_resolves_and_misses_silently() {
        let store = MemoryStore::new();
        let ctx = RequestContext::for_scope("acme");
        let (feature, red, _blue) = table_fixture(&store).await;
        let accessor = ValueAccessor::new(&store, &ctx);

        let mut value = FeatureValue {
            id: crate::model::generate_id(),
            subject_kind: SubjectKind::Product,
            subject_id: "variant-1".to_string(),
            assignment_id: None,
            feature_id: feature.id.clone(),
            scope_id: "acme".to_string(),
            sequence: 0,
            body: ValueBody::empty(ValueKind::Table),
        };

        accessor.write_code(&mut value, "R").await.unwrap();
        assert_eq!(value.body.table_value_id(), Some(&red.id));
        assert_eq!(accessor.value(&value).await.unwrap(), "Red");
        assert_eq!(accessor.code(&value).await.unwrap(), "R");
        assert_eq!(
            accessor.display_name(&value).await.unwrap(),
            "Color: [R] - Red"
        );

        // Unknown code: the write is swallowed, Red stays bound.
        accessor.write_code(&mut value, "X").await.unwrap();
        assert_eq!(value.body.table_value_id(), Some(&red.id));
    }

    #[tokio::test]
    async fn table_value_write_resolves_by_name() {
        let store = MemoryStore::new();
        let ctx = RequestContext::for_scope("acme");
        let (feature, _red, blue) = table_fixture(&store).await;
        let accessor = ValueAccessor::new(&store, &ctx);

        let mut value = FeatureValue {
            id: crate::model::generate_id(),
            subject_kind: SubjectKind::Product,
            subject_id: "variant-1".to_string(),
            assignment_id: None,
            feature_id: feature.id.clone(),
            scope_id: "acme".to_string(),
            sequence: 0,
            body: ValueBody::empty(ValueKind::Table),
        };

        accessor.write_value(&mut value, "Blue").await.unwrap();
        assert_eq!(value.body.table_value_id(), Some(&blue.id));
        // Name lookup from another scope's context resolves nothing.
        let other_ctx = RequestContext::for_scope("globex");
        let other = ValueAccessor::new(&store, &other_ctx);
        accessor.write_value(&mut value, "Red").await.unwrap();
        let before = value.body.table_value_id().cloned();
        other.write_value(&mut value, "Blue").await.unwrap();
        assert_eq!(value.body.table_value_id().cloned(), before);
    }

    #[tokio::test]
    async fn number_write_parses_locale_and_checks_bounds() {
        let store = MemoryStore::new();
        let ctx = RequestContext::for_scope("acme");
        let feature = NewFeatureDefinition {
            code: Some("LEN".to_string()),
            name: "Length".to_string(),
            value_kind: ValueKind::Number,
            num_decimals: 2,
            is_lot_feature: false,
        }
        .into_definition("acme".to_string());
        store.insert_feature(feature.clone()).await.unwrap();
        let assignment = NewFeatureAssignment {
            feature_id: feature.id.clone(),
            min_number_value: Some(0.0),
            max_number_value: Some(100.0),
            ..Default::default()
        }
        .into_assignment("tmpl-1".to_string(), &feature);
        store.insert_assignment(assignment.clone()).await.unwrap();

        let accessor = ValueAccessor::new(&store, &ctx);
        let mut value = FeatureValue::from_assignment(
            SubjectKind::Product,
            "variant-1".to_string(),
            &assignment,
            ValueBody::empty(ValueKind::Number),
        );

        accessor.write_value(&mut value, "red").await.unwrap_err();
        accessor.write_value(&mut value, "12.5").await.unwrap();
        assert_eq!(value.body.number(), Some(12.5));
        // Read-after-write renders at the declared precision.
        assert_eq!(accessor.value(&value).await.unwrap(), "12.50");
        assert_eq!(
            accessor.display_name(&value).await.unwrap(),
            "Length: 12.50"
        );

        let err = accessor.write_value(&mut value, "250").await.unwrap_err();
        assert!(err.to_string().contains("maximum value (100.00)"));
        assert_eq!(value.body.number(), Some(12.5));
    }
}
