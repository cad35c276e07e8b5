//! Domain layer for the warehouse.
//!
//! This crate provides:
//! - `FulfillmentService`, which records receiving and shipping orders and
//!   adjusts stock in the same transaction
//! - `CatalogService` for products and locations
//! - `UserService` and `TokenIssuer` for accounts and bearer tokens
//! - Error types for all three

pub mod catalog;
pub mod error;
pub mod fulfillment;
pub mod token;
pub mod users;

pub use catalog::CatalogService;
pub use error::{CatalogError, FulfillmentError, UserError};
pub use fulfillment::{DEFAULT_DEADLINE, FulfillmentRequest, FulfillmentService};
pub use token::{AccessToken, Claims, DEFAULT_TOKEN_TTL, TokenIssuer};
pub use users::{DEFAULT_HASH_COST, LoginRequest, RegisterRequest, UserService};
