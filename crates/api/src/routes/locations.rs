//! Storage location endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::PageRequest;
use storage::{Location, NewLocation, WarehouseStore};

use super::SharedState;
use crate::error::ApiError;
use crate::extract::{JsonBody, QueryParams};

/// POST /api/v1/locations
#[tracing::instrument(skip(state))]
pub async fn create<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    JsonBody(req): JsonBody<NewLocation>,
) -> Result<(StatusCode, Json<Location>), ApiError> {
    let location = state.catalog.add_location(req).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

/// GET /api/v1/locations
#[tracing::instrument(skip(state))]
pub async fn list<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    QueryParams(page): QueryParams<PageRequest>,
) -> Result<Json<Vec<Location>>, ApiError> {
    Ok(Json(state.catalog.list_locations(page).await?))
}
