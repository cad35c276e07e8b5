//! Warehouse storage: stock ledger, order log, catalog and user accounts.
//!
//! Backends implement [`TransactionProvider`] so that stock adjustments and
//! order appends issued against the same handle commit or roll back together.
//! [`PostgresWarehouse`] is the production backend; [`InMemoryWarehouse`]
//! mirrors its semantics for tests and local runs.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{LocationId, OrderId, PageRequest, ProductId, UserId};
pub use error::{Result, StorageError};
pub use memory::{InMemoryTransaction, InMemoryWarehouse};
pub use model::{
    Location, NewLocation, NewOrder, NewProduct, NewUser, Order, OrderType, Product, ProductUpdate,
    UnknownOrderType, UnknownUserRole, User, UserRole,
};
pub use postgres::PostgresWarehouse;
pub use store::{
    Catalog, OrderLog, StockLedger, TransactionProvider, UserDirectory, WarehouseStore,
};
