//! End-to-end workflow over the in-memory store: reference data setup,
//! assignment propagation, typed value access, and the deletion policies.

use product_feature_db::logic::{FeatureOps, Propagator, ValueAccessor, ValueOps};
use product_feature_db::model::{
    DeletionPolicy, FeatureAssignmentUpdate, FeatureDefinitionUpdate, FeatureError,
    NewFeatureAssignment, NewFeatureDefinition, NewProductTemplate, NewProductVariant,
    NewProductionLot, NewTableValue, OnAssignmentDelete, RequestContext, SubjectKind, ValueKind,
};
use product_feature_db::store::traits::{SubjectStore, ValueStore};
use product_feature_db::store::MemoryStore;

const SCOPE: &str = "acme";

struct Fixture {
    store: MemoryStore,
    ctx: RequestContext,
}

impl Fixture {
    fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            ctx: RequestContext::for_scope(SCOPE),
        }
    }
}

#[tokio::test]
async fn full_product_workflow() {
    let f = Fixture::new();
    let ops = FeatureOps::new(&f.store, &f.ctx);
    let value_ops = ValueOps::new(&f.store, &f.ctx);

    // Reference data: a color table feature and a bounded length feature.
    let color = ops
        .create_feature(NewFeatureDefinition {
            code: Some("COL".to_string()),
            name: "Color".to_string(),
            value_kind: ValueKind::Table,
            num_decimals: 2,
            is_lot_feature: false,
        })
        .await
        .unwrap();
    let red = ops
        .create_table_value(
            &color.id,
            NewTableValue {
                code: Some("R".to_string()),
                name: "Red".to_string(),
            },
        )
        .await
        .unwrap();
    ops.create_table_value(
        &color.id,
        NewTableValue {
            code: Some("B".to_string()),
            name: "Blue".to_string(),
        },
    )
    .await
    .unwrap();

    let length = ops
        .create_feature(NewFeatureDefinition {
            code: Some("LEN".to_string()),
            name: "Length".to_string(),
            value_kind: ValueKind::Number,
            num_decimals: 2,
            is_lot_feature: false,
        })
        .await
        .unwrap();

    // Duplicate (scope, code, name) tuple is refused.
    let dup = ops
        .create_feature(NewFeatureDefinition {
            code: Some("LEN".to_string()),
            name: "Length".to_string(),
            value_kind: ValueKind::Text,
            num_decimals: 2,
            is_lot_feature: false,
        })
        .await;
    assert!(matches!(dup, Err(FeatureError::ConstraintViolation(_))));

    // A template with one variant, then assignments that propagate.
    let template = NewProductTemplate {
        name: "Cable".to_string(),
    }
    .into_template(SCOPE.to_string());
    f.store.insert_template(template.clone()).await.unwrap();
    let variant = NewProductVariant {
        template_id: template.id.clone(),
        name: "Cable 3m".to_string(),
    }
    .into_variant(SCOPE.to_string());
    f.store.insert_variant(variant.clone()).await.unwrap();

    ops.create_assignment(
        &template.id,
        NewFeatureAssignment {
            feature_id: color.id.clone(),
            sequence: 1,
            default_table_value_id: Some(red.id.clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    ops.create_assignment(
        &template.id,
        NewFeatureAssignment {
            feature_id: length.id.clone(),
            sequence: 2,
            default_number_value: Some(12.5),
            min_number_value: Some(0.5),
            max_number_value: Some(100.0),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // Propagation applied the defaults, in sequence order.
    let rendered = value_ops
        .render_for_subject(SubjectKind::Product, &variant.id)
        .await
        .unwrap();
    assert_eq!(rendered.len(), 2);
    assert_eq!(rendered[0].display_name, "Color: [R] - Red");
    assert_eq!(rendered[1].display_name, "Length: 12.50");

    // Re-running propagation changes nothing.
    assert_eq!(
        Propagator::new(&f.store)
            .propagate_template(&template.id)
            .await
            .unwrap(),
        0
    );

    // Write by code: known code rebinds, unknown code is a silent no-op.
    let values = f
        .store
        .list_values_for_subject(SubjectKind::Product, &variant.id)
        .await
        .unwrap();
    let color_value = values
        .iter()
        .find(|v| v.feature_id == color.id)
        .cloned()
        .unwrap();
    value_ops.set_code(&color_value.id, "B").await.unwrap();
    assert_eq!(
        value_ops.render(&color_value.id).await.unwrap().display_name,
        "Color: [B] - Blue"
    );
    value_ops.set_code(&color_value.id, "X").await.unwrap();
    assert_eq!(
        value_ops.render(&color_value.id).await.unwrap().display_name,
        "Color: [B] - Blue"
    );

    // Number writes are bounds-checked at the declared precision.
    let length_value = values
        .iter()
        .find(|v| v.feature_id == length.id)
        .cloned()
        .unwrap();
    value_ops.set_value(&length_value.id, "42").await.unwrap();
    assert_eq!(
        value_ops.render(&length_value.id).await.unwrap().value,
        "42.00"
    );
    let err = value_ops
        .set_value(&length_value.id, "250")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("maximum value (100.00)"));

    // Kind and lot-flag reclassification are frozen while values exist.
    assert!(ops
        .update_feature(
            &length.id,
            FeatureDefinitionUpdate {
                value_kind: Some(ValueKind::Text),
                ..Default::default()
            },
        )
        .await
        .is_err());
    assert!(ops
        .update_feature(
            &length.id,
            FeatureDefinitionUpdate {
                is_lot_feature: Some(true),
                ..Default::default()
            },
        )
        .await
        .is_err());
}

#[tokio::test]
async fn lot_workflow_refresh_and_detach() {
    let f = Fixture::new();
    let ops = FeatureOps::new(&f.store, &f.ctx);

    let note = ops
        .create_feature(NewFeatureDefinition {
            code: None,
            name: "Batch note".to_string(),
            value_kind: ValueKind::Text,
            num_decimals: 2,
            is_lot_feature: true,
        })
        .await
        .unwrap();

    let template = NewProductTemplate {
        name: "Cable".to_string(),
    }
    .into_template(SCOPE.to_string());
    f.store.insert_template(template.clone()).await.unwrap();
    let variant = NewProductVariant {
        template_id: template.id.clone(),
        name: "Cable 5m".to_string(),
    }
    .into_variant(SCOPE.to_string());
    f.store.insert_variant(variant.clone()).await.unwrap();

    let assignment = ops
        .create_assignment(
            &template.id,
            NewFeatureAssignment {
                feature_id: note.id.clone(),
                sequence: 9,
                default_text_value: Some("inspect".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Lot features never land on variants.
    assert!(f
        .store
        .list_values_for_subject(SubjectKind::Product, &variant.id)
        .await
        .unwrap()
        .is_empty());

    let lot = NewProductionLot {
        name: "LOT-001".to_string(),
        product_id: Some(variant.id.clone()),
    }
    .into_lot(SCOPE.to_string());
    f.store.insert_lot(lot.clone()).await.unwrap();
    Propagator::new(&f.store).refresh_lot(&lot.id).await.unwrap();

    let lot_values = f
        .store
        .list_values_for_subject(SubjectKind::Lot, &lot.id)
        .await
        .unwrap();
    assert_eq!(lot_values.len(), 1);
    assert_eq!(lot_values[0].body.text(), Some("inspect"));
    assert_eq!(lot_values[0].sequence, 9);

    // Deleting the assignment detaches lot values instead of removing them.
    ops.delete_assignment(&assignment.id).await.unwrap();
    let detached = f
        .store
        .list_values_for_subject(SubjectKind::Lot, &lot.id)
        .await
        .unwrap();
    assert_eq!(detached.len(), 1);
    assert!(detached[0].assignment_id.is_none());
    assert_eq!(detached[0].sequence, 9);

    // A detached value offers no selectable table values.
    let accessor = ValueAccessor::new(&f.store, &f.ctx);
    assert!(accessor
        .possible_values(&detached[0])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn product_values_cascade_on_assignment_delete() {
    let f = Fixture::new();
    let ops = FeatureOps::new(&f.store, &f.ctx);

    let length = ops
        .create_feature(NewFeatureDefinition {
            code: None,
            name: "Length".to_string(),
            value_kind: ValueKind::Number,
            num_decimals: 2,
            is_lot_feature: false,
        })
        .await
        .unwrap();
    let template = NewProductTemplate {
        name: "Cable".to_string(),
    }
    .into_template(SCOPE.to_string());
    f.store.insert_template(template.clone()).await.unwrap();
    let variant = NewProductVariant {
        template_id: template.id.clone(),
        name: "Cable 3m".to_string(),
    }
    .into_variant(SCOPE.to_string());
    f.store.insert_variant(variant.clone()).await.unwrap();

    let assignment = ops
        .create_assignment(
            &template.id,
            NewFeatureAssignment {
                feature_id: length.id.clone(),
                default_number_value: Some(1.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        f.store
            .list_values_for_subject(SubjectKind::Product, &variant.id)
            .await
            .unwrap()
            .len(),
        1
    );

    ops.delete_assignment(&assignment.id).await.unwrap();
    assert!(f
        .store
        .list_values_for_subject(SubjectKind::Product, &variant.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn deletion_policy_is_configurable() {
    // Cascade for lots as well: values vanish with the assignment.
    let store = MemoryStore::with_policy(DeletionPolicy {
        product: OnAssignmentDelete::Cascade,
        lot: OnAssignmentDelete::Cascade,
    });
    let ctx = RequestContext::for_scope(SCOPE);
    let ops = FeatureOps::new(&store, &ctx);

    let note = ops
        .create_feature(NewFeatureDefinition {
            code: None,
            name: "Batch note".to_string(),
            value_kind: ValueKind::Text,
            num_decimals: 2,
            is_lot_feature: true,
        })
        .await
        .unwrap();
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
        name: "LOT-002".to_string(),
        product_id: Some(variant.id.clone()),
    }
    .into_lot(SCOPE.to_string());
    store.insert_lot(lot.clone()).await.unwrap();

    let assignment = ops
        .create_assignment(
            &template.id,
            NewFeatureAssignment {
                feature_id: note.id.clone(),
                default_text_value: Some("check".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    Propagator::new(&store).refresh_lot(&lot.id).await.unwrap();

    ops.delete_assignment(&assignment.id).await.unwrap();
    assert!(store
        .list_values_for_subject(SubjectKind::Lot, &lot.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn assignment_filter_restricts_possible_values() {
    let f = Fixture::new();
    let ops = FeatureOps::new(&f.store, &f.ctx);
    let value_ops = ValueOps::new(&f.store, &f.ctx);

    let color = ops
        .create_feature(NewFeatureDefinition {
            code: None,
            name: "Color".to_string(),
            value_kind: ValueKind::Table,
            num_decimals: 2,
            is_lot_feature: false,
        })
        .await
        .unwrap();
    let red = ops
        .create_table_value(
            &color.id,
            NewTableValue {
                code: Some("R".to_string()),
                name: "Red".to_string(),
            },
        )
        .await
        .unwrap();
    ops.create_table_value(
        &color.id,
        NewTableValue {
            code: Some("B".to_string()),
            name: "Blue".to_string(),
        },
    )
    .await
    .unwrap();

    let template = NewProductTemplate {
        name: "Cable".to_string(),
    }
    .into_template(SCOPE.to_string());
    f.store.insert_template(template.clone()).await.unwrap();
    let variant = NewProductVariant {
        template_id: template.id.clone(),
        name: "Cable 3m".to_string(),
    }
    .into_variant(SCOPE.to_string());
    f.store.insert_variant(variant.clone()).await.unwrap();

    let assignment = ops
        .create_assignment(
            &template.id,
            NewFeatureAssignment {
                feature_id: color.id.clone(),
                filtered_table_value_ids: vec![red.id.clone()],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let values = f
        .store
        .list_values_for_subject(SubjectKind::Product, &variant.id)
        .await
        .unwrap();
    let possible = value_ops.possible_values(&values[0].id).await.unwrap();
    assert_eq!(possible.len(), 1);
    assert_eq!(possible[0].id, red.id);

    // Widening the filter back to empty exposes the whole registry.
    ops.update_assignment(
        &assignment.id,
        FeatureAssignmentUpdate {
            filtered_table_value_ids: Some(Vec::new()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let possible = value_ops.possible_values(&values[0].id).await.unwrap();
    assert_eq!(possible.len(), 2);
}
