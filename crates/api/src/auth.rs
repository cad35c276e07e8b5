//! Bearer token authentication and role checks.
//!
//! [`authenticate`] runs in front of every `/api/v1` route and attaches the
//! verified [`Claims`] to the request. Missing or invalid tokens are not an
//! error there; the per-route guards decide whether a caller is required.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use domain::Claims;
use storage::{UserRole, WarehouseStore};

use crate::error::ApiError;
use crate::routes::SharedState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Verifies the `Authorization: Bearer` token, if any, and stores its claims.
pub async fn authenticate<S: WarehouseStore>(
    State(state): State<SharedState<S>>,
    mut req: Request,
    next: Next,
) -> Response {
    match bearer_token(req.headers()).map(|token| state.users.authenticate(token)) {
        Some(Ok(claims)) => {
            req.extensions_mut().insert(claims);
        }
        Some(Err(e)) => tracing::debug!(error = %e, "ignoring invalid bearer token"),
        None => {}
    }
    next.run(req).await
}

fn require_role(req: &Request, allowed: &[UserRole]) -> Result<(), ApiError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))?;
    if allowed.contains(&claims.role) {
        Ok(())
    } else {
        tracing::debug!(user_id = %claims.sub, role = %claims.role, "role not allowed");
        Err(ApiError::Forbidden("forbidden".to_string()))
    }
}

/// Lets only admins through.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    require_role(&req, &[UserRole::Admin])?;
    Ok(next.run(req).await)
}

/// Lets only staff through.
pub async fn require_staff(req: Request, next: Next) -> Result<Response, ApiError> {
    require_role(&req, &[UserRole::Staff])?;
    Ok(next.run(req).await)
}

/// Lets any signed-in admin or staff member through.
pub async fn require_member(req: Request, next: Next) -> Result<Response, ApiError> {
    require_role(&req, &[UserRole::Admin, UserRole::Staff])?;
    Ok(next.run(req).await)
}

/// The verified caller; rejects with 401 when there is none.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
    }
}

/// The verified caller, if a valid token was presented.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<Claims>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeAuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(parts.extensions.get::<Claims>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_token_is_read_from_the_authorization_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(bearer_token(&headers), None);
    }
}
