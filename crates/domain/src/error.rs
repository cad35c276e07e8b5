//! Domain error types.

use std::time::Duration;

use common::{LocationId, OrderId, ProductId, UserId};
use storage::StorageError;
use thiserror::Error;

/// Errors produced by receiving, shipping and reading orders.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Malformed input, rejected before any transaction opens.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The referenced product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Shipping would drive the product's stock below zero.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// Receiving would push the product's stock past the largest storable quantity.
    #[error("Stock overflow for product {product_id}: cannot add {added} to {current}")]
    StockOverflow {
        product_id: ProductId,
        current: i64,
        added: i64,
    },

    /// A write inside the transaction failed; the transaction was rolled back.
    #[error("Write failed: {0}")]
    Write(#[source] StorageError),

    /// Both writes succeeded but the commit did not; nothing was persisted.
    #[error("Commit failed: {0}")]
    Commit(#[source] StorageError),

    /// The request deadline passed while the transaction was open; it was rolled back.
    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// The commit was issued but did not answer within its grace period.
    /// Whether the order was persisted is unknown; callers must check before retrying.
    #[error("Commit did not complete within {0:?}; outcome unknown")]
    CommitTimedOut(Duration),

    /// No order with the given id exists.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Reading the order log failed.
    #[error("Read failed: {0}")]
    Read(#[source] StorageError),
}

impl FulfillmentError {
    /// Classifies a storage failure raised inside the fulfillment transaction.
    pub(crate) fn from_write(err: StorageError, product_id: ProductId) -> Self {
        match err {
            StorageError::ProductNotFound(id) => FulfillmentError::ProductNotFound(id),
            StorageError::InsufficientStock {
                product_id,
                requested,
                available,
            } => FulfillmentError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StorageError::StockOverflow {
                product_id,
                current,
                added,
            } => FulfillmentError::StockOverflow {
                product_id,
                current,
                added,
            },
            StorageError::ForeignKeyViolation { ref constraint }
                if constraint == "orders_product_id_fkey" =>
            {
                FulfillmentError::ProductNotFound(product_id)
            }
            other => FulfillmentError::Write(other),
        }
    }

    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            FulfillmentError::InvalidRequest(_) => "invalid_request",
            FulfillmentError::ProductNotFound(_) => "product_not_found",
            FulfillmentError::InsufficientStock { .. } => "insufficient_stock",
            FulfillmentError::StockOverflow { .. } => "stock_overflow",
            FulfillmentError::Write(_) => "write_error",
            FulfillmentError::Commit(_) => "commit_error",
            FulfillmentError::DeadlineExceeded(_) => "deadline_exceeded",
            FulfillmentError::CommitTimedOut(_) => "commit_timeout",
            FulfillmentError::OrderNotFound(_) => "order_not_found",
            FulfillmentError::Read(_) => "read_error",
        }
    }
}

/// Errors produced by product and location management.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Location not found: {0}")]
    LocationNotFound(LocationId),

    /// Another product or location already uses this name.
    #[error("Name already exists: {0}")]
    NameTaken(String),

    #[error("SKU already exists: {0}")]
    SkuTaken(String),

    /// Orders reference the product, so it cannot be deleted.
    #[error("Product {0} has orders and cannot be deleted")]
    ProductInUse(ProductId),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors produced by registration, login and account lookups.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    /// Unknown email or wrong password; the two are not told apart.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Missing, malformed, forged or expired bearer token.
    #[error("Invalid token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    /// The caller is authenticated but may not do this.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Hashing or signing failed inside the server.
    #[error("Credential processing failed: {0}")]
    Credentials(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
