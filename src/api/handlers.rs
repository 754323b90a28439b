use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::logic::{BoundsWarning, FeatureOps, Propagator, ValueOps};
use crate::model::{
    FeatureAssignment, FeatureAssignmentUpdate, FeatureDefinition, FeatureDefinitionUpdate,
    FeatureError, FeatureValue, Id, NewFeatureAssignment, NewFeatureDefinition, NewFeatureValue,
    NewProductTemplate, NewProductVariant, NewProductionLot, NewTableValue, ProductTemplate,
    ProductVariant, ProductionLot, RenderedValue, RequestContext, SubjectKind, TableValue,
};
use crate::store::traits::Store;

pub type AppState<S> = Arc<S>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResponse<T> {
    fn new(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn error_response(e: FeatureError) -> ApiError {
    let status = match &e {
        FeatureError::ConstraintViolation(_) => StatusCode::CONFLICT,
        FeatureError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FeatureError::NotFound(_) => StatusCode::NOT_FOUND,
        FeatureError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(&e.to_string())))
}

fn not_found(what: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(&format!("{} not found", what))),
    )
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct PropagationResponse {
    pub values_created: usize,
}

#[derive(Debug, Serialize)]
pub struct WarningResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<BoundsWarning>,
}

// --- features -------------------------------------------------------------

pub async fn list_features<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
) -> ApiResult<ListResponse<FeatureDefinition>> {
    let features = store
        .list_features(&ctx.scope_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ListResponse::new(features)))
}

pub async fn create_feature<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    RequestJson(new): RequestJson<NewFeatureDefinition>,
) -> ApiResult<FeatureDefinition> {
    let feature = FeatureOps::new(&*store, &ctx)
        .create_feature(new)
        .await
        .map_err(error_response)?;
    Ok(Json(feature))
}

pub async fn get_feature<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<FeatureDefinition> {
    match store.get_feature(&id).await.map_err(error_response)? {
        Some(feature) => Ok(Json(feature)),
        None => Err(not_found("Feature")),
    }
}

pub async fn update_feature<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
    RequestJson(update): RequestJson<FeatureDefinitionUpdate>,
) -> ApiResult<FeatureDefinition> {
    let feature = FeatureOps::new(&*store, &ctx)
        .update_feature(&id, update)
        .await
        .map_err(error_response)?;
    Ok(Json(feature))
}

pub async fn delete_feature<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
) -> ApiResult<DeletedResponse> {
    let deleted = FeatureOps::new(&*store, &ctx)
        .delete_feature(&id)
        .await
        .map_err(error_response)?;
    if !deleted {
        return Err(not_found("Feature"));
    }
    Ok(Json(DeletedResponse { deleted }))
}

// --- table values ---------------------------------------------------------

pub async fn list_table_values<S: Store>(
    State(store): State<AppState<S>>,
    Path(feature_id): Path<Id>,
) -> ApiResult<ListResponse<TableValue>> {
    let values = store
        .list_table_values(&feature_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ListResponse::new(values)))
}

pub async fn create_table_value<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(feature_id): Path<Id>,
    RequestJson(new): RequestJson<NewTableValue>,
) -> ApiResult<TableValue> {
    let value = FeatureOps::new(&*store, &ctx)
        .create_table_value(&feature_id, new)
        .await
        .map_err(error_response)?;
    Ok(Json(value))
}

pub async fn delete_table_value<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
) -> ApiResult<DeletedResponse> {
    let deleted = FeatureOps::new(&*store, &ctx)
        .delete_table_value(&id)
        .await
        .map_err(error_response)?;
    if !deleted {
        return Err(not_found("Table value"));
    }
    Ok(Json(DeletedResponse { deleted }))
}

// --- templates and assignments --------------------------------------------

pub async fn list_templates<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
) -> ApiResult<ListResponse<ProductTemplate>> {
    let templates = store
        .list_templates(&ctx.scope_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ListResponse::new(templates)))
}

pub async fn create_template<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    RequestJson(new): RequestJson<NewProductTemplate>,
) -> ApiResult<ProductTemplate> {
    let template = new.into_template(ctx.scope_id.clone());
    store
        .insert_template(template.clone())
        .await
        .map_err(error_response)?;
    Ok(Json(template))
}

pub async fn get_template<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<ProductTemplate> {
    match store.get_template(&id).await.map_err(error_response)? {
        Some(template) => Ok(Json(template)),
        None => Err(not_found("Template")),
    }
}

pub async fn delete_template<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<DeletedResponse> {
    let deleted = store.delete_template(&id).await.map_err(error_response)?;
    if !deleted {
        return Err(not_found("Template"));
    }
    Ok(Json(DeletedResponse { deleted }))
}

pub async fn list_assignments<S: Store>(
    State(store): State<AppState<S>>,
    Path(template_id): Path<Id>,
) -> ApiResult<ListResponse<FeatureAssignment>> {
    let assignments = store
        .list_assignments_for_template(&template_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ListResponse::new(assignments)))
}

pub async fn create_assignment<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(template_id): Path<Id>,
    RequestJson(new): RequestJson<NewFeatureAssignment>,
) -> ApiResult<FeatureAssignment> {
    let assignment = FeatureOps::new(&*store, &ctx)
        .create_assignment(&template_id, new)
        .await
        .map_err(error_response)?;
    Ok(Json(assignment))
}

/// Soft bound check for an assignment being composed; never persists.
pub async fn preview_assignment<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(template_id): Path<Id>,
    RequestJson(new): RequestJson<NewFeatureAssignment>,
) -> ApiResult<WarningResponse> {
    let warning = FeatureOps::new(&*store, &ctx)
        .preview_assignment_bounds(&template_id, new)
        .await
        .map_err(error_response)?;
    Ok(Json(WarningResponse { warning }))
}

pub async fn get_assignment<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<FeatureAssignment> {
    match store.get_assignment(&id).await.map_err(error_response)? {
        Some(assignment) => Ok(Json(assignment)),
        None => Err(not_found("Assignment")),
    }
}

pub async fn update_assignment<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
    RequestJson(update): RequestJson<FeatureAssignmentUpdate>,
) -> ApiResult<FeatureAssignment> {
    let assignment = FeatureOps::new(&*store, &ctx)
        .update_assignment(&id, update)
        .await
        .map_err(error_response)?;
    Ok(Json(assignment))
}

pub async fn delete_assignment<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
) -> ApiResult<DeletedResponse> {
    let deleted = FeatureOps::new(&*store, &ctx)
        .delete_assignment(&id)
        .await
        .map_err(error_response)?;
    if !deleted {
        return Err(not_found("Assignment"));
    }
    Ok(Json(DeletedResponse { deleted }))
}

// --- variants and lots ----------------------------------------------------

pub async fn create_variant<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    RequestJson(new): RequestJson<NewProductVariant>,
) -> ApiResult<ProductVariant> {
    let variant = new.into_variant(ctx.scope_id.clone());
    store
        .insert_variant(variant.clone())
        .await
        .map_err(error_response)?;
    // A fresh variant picks up its template's assignments immediately.
    Propagator::new(&*store)
        .propagate_variant(&variant.id)
        .await
        .map_err(error_response)?;
    Ok(Json(variant))
}

pub async fn get_variant<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<ProductVariant> {
    match store.get_variant(&id).await.map_err(error_response)? {
        Some(variant) => Ok(Json(variant)),
        None => Err(not_found("Variant")),
    }
}

pub async fn delete_variant<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<DeletedResponse> {
    let deleted = store.delete_variant(&id).await.map_err(error_response)?;
    if !deleted {
        return Err(not_found("Variant"));
    }
    Ok(Json(DeletedResponse { deleted }))
}

pub async fn list_variant_values<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
) -> ApiResult<ListResponse<RenderedValue>> {
    let rendered = ValueOps::new(&*store, &ctx)
        .render_for_subject(SubjectKind::Product, &id)
        .await
        .map_err(error_response)?;
    Ok(Json(ListResponse::new(rendered)))
}

#[derive(Debug, Default, Deserialize)]
pub struct LotUpdate {
    pub name: Option<String>,
    /// Outer None leaves the product untouched, inner None clears it.
    /// Either way a change triggers a full refresh of the lot's values.
    #[serde(default, deserialize_with = "crate::model::double_option")]
    pub product_id: Option<Option<Id>>,
}

pub async fn list_lots<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
) -> ApiResult<ListResponse<ProductionLot>> {
    let lots = store
        .list_lots(&ctx.scope_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ListResponse::new(lots)))
}

pub async fn create_lot<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    RequestJson(new): RequestJson<NewProductionLot>,
) -> ApiResult<ProductionLot> {
    let lot = new.into_lot(ctx.scope_id.clone());
    store
        .insert_lot(lot.clone())
        .await
        .map_err(error_response)?;
    if lot.product_id.is_some() {
        Propagator::new(&*store)
            .refresh_lot(&lot.id)
            .await
            .map_err(error_response)?;
    }
    Ok(Json(lot))
}

pub async fn get_lot<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<ProductionLot> {
    match store.get_lot(&id).await.map_err(error_response)? {
        Some(lot) => Ok(Json(lot)),
        None => Err(not_found("Lot")),
    }
}

pub async fn update_lot<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    RequestJson(update): RequestJson<LotUpdate>,
) -> ApiResult<ProductionLot> {
    let mut lot = match store.get_lot(&id).await.map_err(error_response)? {
        Some(lot) => lot,
        None => return Err(not_found("Lot")),
    };

    let mut product_changed = false;
    if let Some(name) = update.name {
        lot.name = name;
    }
    if let Some(product_id) = update.product_id {
        product_changed = product_id != lot.product_id;
        lot.product_id = product_id;
    }

    store.update_lot(lot.clone()).await.map_err(error_response)?;
    if product_changed {
        Propagator::new(&*store)
            .refresh_lot(&lot.id)
            .await
            .map_err(error_response)?;
    }
    Ok(Json(lot))
}

pub async fn delete_lot<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<DeletedResponse> {
    let deleted = store.delete_lot(&id).await.map_err(error_response)?;
    if !deleted {
        return Err(not_found("Lot"));
    }
    Ok(Json(DeletedResponse { deleted }))
}

pub async fn list_lot_values<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
) -> ApiResult<ListResponse<RenderedValue>> {
    let rendered = ValueOps::new(&*store, &ctx)
        .render_for_subject(SubjectKind::Lot, &id)
        .await
        .map_err(error_response)?;
    Ok(Json(ListResponse::new(rendered)))
}

// --- propagation ----------------------------------------------------------

pub async fn propagate_template<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<PropagationResponse> {
    let values_created = Propagator::new(&*store)
        .propagate_template(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(PropagationResponse { values_created }))
}

pub async fn propagate_variant<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<PropagationResponse> {
    let values_created = Propagator::new(&*store)
        .propagate_variant(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(PropagationResponse { values_created }))
}

pub async fn refresh_lot<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<PropagationResponse> {
    let values_created = Propagator::new(&*store)
        .refresh_lot(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(PropagationResponse { values_created }))
}

// --- values ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CodeWrite {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ValueWrite {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct NumberWrite {
    pub number: f64,
}

pub async fn create_value<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    RequestJson(new): RequestJson<NewFeatureValue>,
) -> ApiResult<FeatureValue> {
    let value = ValueOps::new(&*store, &ctx)
        .create_value(new)
        .await
        .map_err(error_response)?;
    Ok(Json(value))
}

pub async fn get_value<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
) -> ApiResult<RenderedValue> {
    let rendered = ValueOps::new(&*store, &ctx)
        .render(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(rendered))
}

pub async fn delete_value<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
) -> ApiResult<DeletedResponse> {
    let deleted = ValueOps::new(&*store, &ctx)
        .delete_value(&id)
        .await
        .map_err(error_response)?;
    if !deleted {
        return Err(not_found("Value"));
    }
    Ok(Json(DeletedResponse { deleted }))
}

pub async fn set_value_code<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
    RequestJson(write): RequestJson<CodeWrite>,
) -> ApiResult<FeatureValue> {
    let value = ValueOps::new(&*store, &ctx)
        .set_code(&id, &write.code)
        .await
        .map_err(error_response)?;
    Ok(Json(value))
}

pub async fn set_value<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
    RequestJson(write): RequestJson<ValueWrite>,
) -> ApiResult<FeatureValue> {
    let value = ValueOps::new(&*store, &ctx)
        .set_value(&id, &write.value)
        .await
        .map_err(error_response)?;
    Ok(Json(value))
}

pub async fn set_value_number<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
    RequestJson(write): RequestJson<NumberWrite>,
) -> ApiResult<FeatureValue> {
    let value = ValueOps::new(&*store, &ctx)
        .set_number(&id, write.number)
        .await
        .map_err(error_response)?;
    Ok(Json(value))
}

pub async fn list_possible_values<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
) -> ApiResult<ListResponse<TableValue>> {
    let values = ValueOps::new(&*store, &ctx)
        .possible_values(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(ListResponse::new(values)))
}

/// Soft bound check for a number being typed into an existing value.
pub async fn check_value_number<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(id): Path<Id>,
    RequestJson(write): RequestJson<NumberWrite>,
) -> ApiResult<WarningResponse> {
    let warning = ValueOps::new(&*store, &ctx)
        .number_limits_warning(&id, write.number)
        .await
        .map_err(error_response)?;
    Ok(Json(WarningResponse { warning }))
}
