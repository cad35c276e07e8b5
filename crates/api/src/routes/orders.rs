//! Receiving and shipping order endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, PageRequest};
use domain::FulfillmentRequest;
use storage::{Order, WarehouseStore};

use super::{SharedState, parse_id};
use crate::error::ApiError;
use crate::extract::{JsonBody, QueryParams};

/// POST /api/v1/orders/receive: record incoming goods.
#[tracing::instrument(skip(state))]
pub async fn receive<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    JsonBody(req): JsonBody<FulfillmentRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.fulfillment.receive_order(req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// POST /api/v1/orders/ship: record outgoing goods.
#[tracing::instrument(skip(state))]
pub async fn ship<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    JsonBody(req): JsonBody<FulfillmentRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.fulfillment.ship_order(req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/v1/orders: list orders, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    QueryParams(page): QueryParams<PageRequest>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.fulfillment.get_all_orders(page).await?))
}

/// GET /api/v1/orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    Ok(Json(state.fulfillment.get_order_by_id(order_id).await?))
}
