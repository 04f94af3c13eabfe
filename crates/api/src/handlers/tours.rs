//! Handlers for the `/tours` resource.

use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tourbook_core::error::CoreError;
use tourbook_core::tour::{Stage, TourDraft, TourFilter, TourPatch, VisibleFilter, VisiblePipeline};
use tourbook_core::types::DbId;
use tourbook_db::models::tour::Tour;
use tourbook_db::repositories::TourRepo;

use crate::error::{AppError, AppResult};
use crate::extract::{JsonBody, PathParam};
use crate::middleware::request_time::RequestTime;
use crate::response::{DataResponse, ListResponse};
use crate::state::AppState;

/// Request body for `POST /tours/aggregate`.
#[derive(Debug, Deserialize)]
pub struct AggregateRequest {
    pub pipeline: Vec<Stage>,
}

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity: "Tour", id })
}

/// Decode a JSON body into a draft or patch. Type mismatches are reported
/// as 400s rather than the extractor's plain-text rejection.
fn parse_payload<T: serde::de::DeserializeOwned>(body: Value) -> AppResult<T> {
    serde_json::from_value(body).map_err(|e| AppError::BadRequest(format!("Invalid tour payload: {e}")))
}

/// GET /api/v1/tours
///
/// Query pairs are parsed into a find filter, e.g. `?difficulty=easy&duration[gte]=5`.
pub async fn list(
    State(state): State<AppState>,
    RequestTime(requested_at): RequestTime,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Json<ListResponse<Tour>>> {
    let filter = TourFilter::from_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
    let tours = TourRepo::find_many(&state.pool, &VisibleFilter::new(filter)).await?;
    Ok(Json(ListResponse::new(requested_at, tours)))
}

/// POST /api/v1/tours
pub async fn create(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Value>,
) -> AppResult<(StatusCode, Json<DataResponse<Tour>>)> {
    let input = parse_payload::<TourDraft>(body)?.into_new_tour()?;
    let tour = TourRepo::create(&state.pool, &input).await?;
    tracing::info!(tour_id = tour.id, slug = %tour.slug, "Tour created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: tour })))
}

/// GET /api/v1/tours/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    PathParam(id): PathParam<DbId>,
) -> AppResult<Json<DataResponse<Tour>>> {
    let tour = TourRepo::find_one(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: tour }))
}

/// PATCH /api/v1/tours/{id}
///
/// The patch is merged onto the stored tour and the result is validated as
/// a whole, so the discount rule holds against the merged price.
pub async fn update(
    State(state): State<AppState>,
    PathParam(id): PathParam<DbId>,
    JsonBody(body): JsonBody<Value>,
) -> AppResult<Json<DataResponse<Tour>>> {
    let patch = parse_payload::<TourPatch>(body)?;
    let existing = TourRepo::find_one(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    let input = patch.merge_onto(existing.to_draft()).into_new_tour()?;
    let tour = TourRepo::update(&state.pool, id, &input)
        .await?
        .ok_or_else(|| not_found(id))?;
    tracing::info!(tour_id = tour.id, "Tour updated");
    Ok(Json(DataResponse { data: tour }))
}

/// DELETE /api/v1/tours/{id}
pub async fn delete(
    State(state): State<AppState>,
    PathParam(id): PathParam<DbId>,
) -> AppResult<StatusCode> {
    if TourRepo::delete(&state.pool, id).await? {
        tracing::info!(tour_id = id, "Tour deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

/// GET /api/v1/tours/tour-stats
pub async fn tour_stats(State(state): State<AppState>) -> AppResult<Json<DataResponse<Vec<Value>>>> {
    let stats = TourRepo::aggregate(&state.pool, &VisiblePipeline::tour_stats()).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/v1/tours/monthly-plan/{year}
pub async fn monthly_plan(
    State(state): State<AppState>,
    PathParam(year): PathParam<i32>,
) -> AppResult<Json<DataResponse<Vec<Value>>>> {
    let pipeline = VisiblePipeline::monthly_plan(year)?;
    let plan = TourRepo::aggregate(&state.pool, &pipeline).await?;
    Ok(Json(DataResponse { data: plan }))
}

/// POST /api/v1/tours/aggregate
pub async fn aggregate(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Value>,
) -> AppResult<Json<DataResponse<Vec<Value>>>> {
    let request: AggregateRequest = serde_json::from_value(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid pipeline: {e}")))?;
    let pipeline = VisiblePipeline::new(request.pipeline)?;
    let results = TourRepo::aggregate(&state.pool, &pipeline).await?;
    Ok(Json(DataResponse { data: results }))
}

/// Fallback for requests that match no route and no static file.
pub async fn route_not_found(uri: Uri) -> AppError {
    AppError::RouteNotFound(uri.to_string())
}
