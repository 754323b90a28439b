use crate::logic::Propagator;
use crate::model::{
    NewFeatureAssignment, NewFeatureDefinition, NewProductTemplate, NewProductVariant,
    NewProductionLot, NewTableValue, ValueKind,
};
use crate::store::traits::Store;
use anyhow::Result;
use log::info;

const SEED_SCOPE: &str = "default";

/// Demo data set: a cable product with a table-kind color feature, a
/// bounded number-kind length feature and a lot-scoped batch note.
pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    let color = NewFeatureDefinition {
        code: Some("COL".to_string()),
        name: "Color".to_string(),
        value_kind: ValueKind::Table,
        num_decimals: 2,
        is_lot_feature: false,
    }
    .into_definition(SEED_SCOPE.to_string());
    store.insert_feature(color.clone()).await?;

    for (code, name) in [("R", "Red"), ("B", "Blue"), ("G", "Green")] {
        let value = NewTableValue {
            code: Some(code.to_string()),
            name: name.to_string(),
        }
        .into_table_value(&color);
        store.insert_table_value(value).await?;
    }
    let red = store
        .find_table_value_by_code(&color.scope_id, &color.id, "R")
        .await?;

    let length = NewFeatureDefinition {
        code: Some("LEN".to_string()),
        name: "Length".to_string(),
        value_kind: ValueKind::Number,
        num_decimals: 2,
        is_lot_feature: false,
    }
    .into_definition(SEED_SCOPE.to_string());
    store.insert_feature(length.clone()).await?;

    let batch_note = NewFeatureDefinition {
        code: Some("BATCH".to_string()),
        name: "Batch note".to_string(),
        value_kind: ValueKind::Text,
        num_decimals: 2,
        is_lot_feature: true,
    }
    .into_definition(SEED_SCOPE.to_string());
    store.insert_feature(batch_note.clone()).await?;

    let template = NewProductTemplate {
        name: "Cable".to_string(),
    }
    .into_template(SEED_SCOPE.to_string());
    store.insert_template(template.clone()).await?;

    let color_assignment = NewFeatureAssignment {
        feature_id: color.id.clone(),
        sequence: 1,
        default_table_value_id: red.map(|tv| tv.id),
        ..Default::default()
    }
    .into_assignment(template.id.clone(), &color);
    store.insert_assignment(color_assignment).await?;

    let length_assignment = NewFeatureAssignment {
        feature_id: length.id.clone(),
        sequence: 2,
        default_number_value: Some(12.5),
        min_number_value: Some(0.5),
        max_number_value: Some(100.0),
        ..Default::default()
    }
    .into_assignment(template.id.clone(), &length);
    store.insert_assignment(length_assignment).await?;

    let note_assignment = NewFeatureAssignment {
        feature_id: batch_note.id.clone(),
        sequence: 3,
        ..Default::default()
    }
    .into_assignment(template.id.clone(), &batch_note);
    store.insert_assignment(note_assignment).await?;

    let mut first_variant = None;
    for name in ["Cable 3m", "Cable 5m"] {
        let variant = NewProductVariant {
            template_id: template.id.clone(),
            name: name.to_string(),
        }
        .into_variant(SEED_SCOPE.to_string());
        store.insert_variant(variant.clone()).await?;
        first_variant.get_or_insert(variant);
    }

    let propagator = Propagator::new(store);
    let created = propagator.propagate_template(&template.id).await?;
    info!("seed: propagated {} variant values", created);

    if let Some(variant) = first_variant {
        let lot = NewProductionLot {
            name: "LOT-0001".to_string(),
            product_id: Some(variant.id.clone()),
        }
        .into_lot(SEED_SCOPE.to_string());
        store.insert_lot(lot.clone()).await?;
        propagator.refresh_lot(&lot.id).await?;
    }

    Ok(())
}
