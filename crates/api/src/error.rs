//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CatalogError, FulfillmentError, UserError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Order fulfillment error.
    Fulfillment(FulfillmentError),
    /// Product or location error.
    Catalog(CatalogError),
    /// Account or login error.
    User(UserError),
    /// No valid bearer token was presented.
    Unauthorized(String),
    /// The caller's role may not use this route.
    Forbidden(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Fulfillment(err) => fulfillment_status(err),
            ApiError::Catalog(err) => catalog_status(err),
            ApiError::User(err) => user_status(err),
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) | ApiError::Forbidden(msg) => {
                msg
            }
            ApiError::Fulfillment(err) => err.to_string(),
            ApiError::Catalog(err) => err.to_string(),
            ApiError::User(err) => err.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(error = %message, %status, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_status(err: &FulfillmentError) -> StatusCode {
    match err {
        FulfillmentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        FulfillmentError::ProductNotFound(_) | FulfillmentError::OrderNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        FulfillmentError::InsufficientStock { .. } | FulfillmentError::StockOverflow { .. } => {
            StatusCode::CONFLICT
        }
        FulfillmentError::DeadlineExceeded(_) | FulfillmentError::CommitTimedOut(_) => {
            StatusCode::GATEWAY_TIMEOUT
        }
        FulfillmentError::Write(_) | FulfillmentError::Commit(_) | FulfillmentError::Read(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn catalog_status(err: &CatalogError) -> StatusCode {
    match err {
        CatalogError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        CatalogError::ProductNotFound(_) | CatalogError::LocationNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        CatalogError::NameTaken(_) | CatalogError::SkuTaken(_) | CatalogError::ProductInUse(_) => {
            StatusCode::CONFLICT
        }
        CatalogError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn user_status(err: &UserError) -> StatusCode {
    match err {
        UserError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        UserError::InvalidCredentials | UserError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
        UserError::Forbidden(_) => StatusCode::FORBIDDEN,
        UserError::UserNotFound(_) => StatusCode::NOT_FOUND,
        UserError::EmailTaken(_) => StatusCode::CONFLICT,
        UserError::Credentials(_) | UserError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Catalog(err)
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        ApiError::User(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
