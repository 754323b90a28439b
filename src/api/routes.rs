use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<Arc<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Feature definitions
        .route("/features", get(handlers::list_features::<S>))
        .route("/features", post(handlers::create_feature::<S>))
        .route("/features/:id", get(handlers::get_feature::<S>))
        .route("/features/:id", patch(handlers::update_feature::<S>))
        .route("/features/:id", delete(handlers::delete_feature::<S>))
        // Table values of a feature
        .route(
            "/features/:feature_id/table-values",
            get(handlers::list_table_values::<S>),
        )
        .route(
            "/features/:feature_id/table-values",
            post(handlers::create_table_value::<S>),
        )
        .route(
            "/table-values/:id",
            delete(handlers::delete_table_value::<S>),
        )
        // Product templates and their feature assignments
        .route("/templates", get(handlers::list_templates::<S>))
        .route("/templates", post(handlers::create_template::<S>))
        .route("/templates/:id", get(handlers::get_template::<S>))
        .route("/templates/:id", delete(handlers::delete_template::<S>))
        .route(
            "/templates/:template_id/assignments",
            get(handlers::list_assignments::<S>),
        )
        .route(
            "/templates/:template_id/assignments",
            post(handlers::create_assignment::<S>),
        )
        .route(
            "/templates/:template_id/assignments/preview",
            post(handlers::preview_assignment::<S>),
        )
        .route("/assignments/:id", get(handlers::get_assignment::<S>))
        .route("/assignments/:id", patch(handlers::update_assignment::<S>))
        .route(
            "/assignments/:id",
            delete(handlers::delete_assignment::<S>),
        )
        // Variants
        .route("/variants", post(handlers::create_variant::<S>))
        .route("/variants/:id", get(handlers::get_variant::<S>))
        .route("/variants/:id", delete(handlers::delete_variant::<S>))
        .route(
            "/variants/:id/values",
            get(handlers::list_variant_values::<S>),
        )
        // Production lots
        .route("/lots", get(handlers::list_lots::<S>))
        .route("/lots", post(handlers::create_lot::<S>))
        .route("/lots/:id", get(handlers::get_lot::<S>))
        .route("/lots/:id", patch(handlers::update_lot::<S>))
        .route("/lots/:id", delete(handlers::delete_lot::<S>))
        .route("/lots/:id/values", get(handlers::list_lot_values::<S>))
        // Propagation
        .route(
            "/templates/:id/propagate",
            post(handlers::propagate_template::<S>),
        )
        .route(
            "/variants/:id/propagate",
            post(handlers::propagate_variant::<S>),
        )
        .route("/lots/:id/refresh", post(handlers::refresh_lot::<S>))
        // Feature values
        .route("/values", post(handlers::create_value::<S>))
        .route("/values/:id", get(handlers::get_value::<S>))
        .route("/values/:id", delete(handlers::delete_value::<S>))
        .route("/values/:id/code", post(handlers::set_value_code::<S>))
        .route("/values/:id/value", post(handlers::set_value::<S>))
        .route("/values/:id/number", post(handlers::set_value_number::<S>))
        .route(
            "/values/:id/possible-values",
            get(handlers::list_possible_values::<S>),
        )
        .route(
            "/values/:id/check-number",
            post(handlers::check_value_number::<S>),
        )
}
