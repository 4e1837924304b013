use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    auth::{AuthenticatedUser, CurrentUser},
    emissions::TransportMode,
    error::AppError,
    services::{estimator, insights},
    state::AppState,
};

const DEFAULT_GEOCODE_LIMIT: usize = 5;
const MAX_GEOCODE_LIMIT: usize = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/geocode", get(geocode))
        .route("/routes/estimate", post(estimate))
        .route("/trips", get(trips_list))
        .route("/trips/:id", delete(trip_delete))
        .route("/insights/travel", get(travel_insights))
}

/// Response envelope shared by every API endpoint.
#[derive(Serialize)]
pub struct ApiEnvelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn ok<T: Serialize>(data: T) -> Response {
    Json(ApiEnvelope {
        success: true,
        data: Some(data),
        message: None,
    })
    .into_response()
}

fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiEnvelope::<()> {
            success: false,
            data: None,
            message: Some(message.into()),
        }),
    )
        .into_response()
}

fn require_user(current: &CurrentUser) -> Result<&AuthenticatedUser, Response> {
    current
        .0
        .as_ref()
        .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "please log in again"))
}

/// Maps a handler error into the envelope where the failure is the caller's
/// to deal with; everything else stays an internal error.
fn envelope_error(err: AppError) -> Result<Response, AppError> {
    match err {
        AppError::BadRequest(msg) => Ok(fail(StatusCode::BAD_REQUEST, msg)),
        AppError::Upstream(msg) => Ok(fail(StatusCode::BAD_GATEWAY, msg)),
        AppError::NotFound => Ok(fail(StatusCode::NOT_FOUND, "not found")),
        other => Err(other),
    }
}

#[derive(Deserialize)]
struct GeocodeParams {
    q: String,
    limit: Option<usize>,
}

async fn geocode(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<GeocodeParams>,
) -> Result<Response, AppError> {
    if let Err(response) = require_user(&current) {
        return Ok(response);
    }
    let query = params.q.trim();
    if query.is_empty() {
        return Ok(fail(StatusCode::BAD_REQUEST, "please enter a search term"));
    }
    let limit = params
        .limit
        .unwrap_or(DEFAULT_GEOCODE_LIMIT)
        .clamp(1, MAX_GEOCODE_LIMIT);
    match state.geocoder.search(query, limit).await {
        Ok(places) => Ok(ok(places)),
        Err(err) => envelope_error(err),
    }
}

#[derive(Deserialize)]
struct EstimateRequest {
    source: String,
    destination: String,
    mode: String,
}

async fn estimate(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<EstimateRequest>,
) -> Result<Response, AppError> {
    if let Err(response) = require_user(&current) {
        return Ok(response);
    }
    let Some(mode) = TransportMode::parse(&request.mode) else {
        return Ok(fail(StatusCode::BAD_REQUEST, "unknown transport mode"));
    };
    match estimator::estimate_route(&state, &request.source, &request.destination, mode).await {
        Ok(estimate) => Ok(ok(estimate)),
        Err(err) => envelope_error(err),
    }
}

async fn trips_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, AppError> {
    let user = match require_user(&current) {
        Ok(user) => user,
        Err(response) => return Ok(response),
    };
    let mut trips = state.trips.load_user_trips(&user.uuid).await?;
    trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(ok(trips))
}

async fn trip_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Response, AppError> {
    let user = match require_user(&current) {
        Ok(user) => user,
        Err(response) => return Ok(response),
    };
    if state.trips.delete_trip(&user.uuid, &trip_id).await? {
        Ok(ok(serde_json::json!({ "deleted": trip_id })))
    } else {
        Ok(fail(StatusCode::NOT_FOUND, "no trip with this id"))
    }
}

async fn travel_insights(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, AppError> {
    let user = match require_user(&current) {
        Ok(user) => user,
        Err(response) => return Ok(response),
    };
    let trips = state.trips.load_user_trips(&user.uuid).await?;
    let summary = if trips.is_empty() {
        insights::demo_insights(Utc::now())
    } else {
        insights::summarize_trips(&trips, Utc::now())
    };
    Ok(ok(summary))
}
