use thiserror::Error;

use crate::ProductId;

/// Errors that can occur when interacting with warehouse storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No product row matched the given id.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A conditional decrease matched the row but the stock was too low.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// Adding to the product's stock would exceed the column's range.
    #[error("Stock overflow for product {product_id}: cannot add {added} to {current}")]
    StockOverflow {
        product_id: ProductId,
        current: i64,
        added: i64,
    },

    /// A unique constraint rejected the write.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A foreign key constraint rejected the write.
    #[error("Foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The backend failed for a reason not covered above.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Maps constraint violations out of a raw sqlx error.
    pub(crate) fn from_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            if db_err.is_unique_violation() {
                return StorageError::UniqueViolation { constraint };
            }
            if db_err.is_foreign_key_violation() {
                return StorageError::ForeignKeyViolation { constraint };
            }
        }
        StorageError::Database(err)
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
