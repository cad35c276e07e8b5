//! Shared identifiers and paging types for the warehouse workspace.

pub mod page;
pub mod types;

pub use page::{MAX_PAGE_SIZE, PageRequest};
pub use types::{LocationId, OrderId, ProductId, UserId};
