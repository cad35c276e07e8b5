use serde::{Deserialize, Serialize};

/// Largest page size accepted by listing endpoints.
pub const MAX_PAGE_SIZE: u32 = 100;

/// One-based page selection for listing queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    /// Checks the bounds, returning the name of the offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.page < 1 {
            return Err("page");
        }
        if self.size < 1 || self.size > MAX_PAGE_SIZE {
            return Err("size");
        }
        Ok(())
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, size: 10 }
    }
}
