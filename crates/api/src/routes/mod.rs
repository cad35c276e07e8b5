pub mod health;
pub mod locations;
pub mod metrics;
pub mod orders;
pub mod products;
pub mod users;

use std::str::FromStr;
use std::sync::Arc;

use domain::{CatalogService, FulfillmentService, UserService};
use storage::WarehouseStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: WarehouseStore> {
    pub fulfillment: FulfillmentService<S>,
    pub catalog: CatalogService<S>,
    pub users: UserService<S>,
}

pub type SharedState<S> = Arc<AppState<S>>;

/// Parses a path segment into a typed id.
fn parse_id<T: FromStr>(id: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
