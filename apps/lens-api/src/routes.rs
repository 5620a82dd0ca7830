use axum::{
	Json, Router,
	extract::{Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::get,
};
use serde::{Deserialize, Serialize};

use lens_service::{
	Error as ServiceError, ListResponse, SearchRequest, SearchResponse, StatsResponse,
	SuggestResponse,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search", get(search))
		.route("/v1/items/latest", get(latest))
		.route("/v1/stats", get(stats))
		.route("/v1/suggest", get(suggest))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct QueryParams {
	q: String,
}

async fn search(
	State(state): State<AppState>,
	Query(params): Query<QueryParams>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(SearchRequest { query: params.q }).await?;

	Ok(Json(response))
}

async fn latest(State(state): State<AppState>) -> Result<Json<ListResponse>, ApiError> {
	let response = state.service.latest().await?;

	Ok(Json(response))
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
	let response = state.service.stats().await?;

	Ok(Json(response))
}

async fn suggest(
	State(state): State<AppState>,
	Query(params): Query<QueryParams>,
) -> Result<Json<SuggestResponse>, ApiError> {
	let response = state.service.suggest(&params.q).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let (status, error_code) = match &err {
			ServiceError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
			ServiceError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
			ServiceError::Provider { .. } => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
			ServiceError::Storage { .. } | ServiceError::Qdrant { .. } =>
				(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
		};

		Self { status, error_code: error_code.to_string(), message: err.to_string() }
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
