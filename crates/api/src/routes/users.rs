//! Registration, login and account endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::PageRequest;
use domain::{AccessToken, LoginRequest, RegisterRequest};
use storage::{User, WarehouseStore};

use super::SharedState;
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::extract::{JsonBody, QueryParams};

/// POST /api/v1/register: create a staff account, or an admin when allowed.
#[tracing::instrument(skip(state, caller))]
pub async fn register<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    MaybeAuthUser(caller): MaybeAuthUser,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.users.register(req, caller.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/v1/login: exchange credentials for a bearer token.
#[tracing::instrument(skip(state))]
pub async fn login<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<AccessToken>, ApiError> {
    Ok(Json(state.users.login(req).await?))
}

/// GET /api/v1/users/me
#[tracing::instrument(skip(state, claims))]
pub async fn me<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users.get_me(&claims).await?))
}

/// GET /api/v1/users: list accounts by email.
#[tracing::instrument(skip(state))]
pub async fn list<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    QueryParams(page): QueryParams<PageRequest>,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.users.list_users(page).await?))
}
