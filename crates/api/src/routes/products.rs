//! Product catalog endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{PageRequest, ProductId};
use storage::{NewProduct, Product, ProductUpdate, WarehouseStore};

use super::{SharedState, parse_id};
use crate::error::ApiError;
use crate::extract::{JsonBody, QueryParams};

/// POST /api/v1/products
#[tracing::instrument(skip(state))]
pub async fn create<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    JsonBody(req): JsonBody<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.catalog.add_product(req).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/v1/products: list products by name.
#[tracing::instrument(skip(state))]
pub async fn list<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    QueryParams(page): QueryParams<PageRequest>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.catalog.list_products(page).await?))
}

#[tracing::instrument(skip(state))]
pub async fn get<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product_id: ProductId = parse_id(&id)?;
    Ok(Json(state.catalog.get_product(product_id).await?))
}

/// PUT /api/v1/products/{id}: change name, SKU or location.
#[tracing::instrument(skip(state))]
pub async fn update<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<ProductUpdate>,
) -> Result<Json<Product>, ApiError> {
    let product_id: ProductId = parse_id(&id)?;
    Ok(Json(state.catalog.update_product(product_id, req).await?))
}

#[tracing::instrument(skip(state))]
pub async fn delete<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let product_id: ProductId = parse_id(&id)?;
    state.catalog.delete_product(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
