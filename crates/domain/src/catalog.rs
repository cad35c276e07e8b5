//! Product and location management.

use common::{PageRequest, ProductId};
use storage::{Catalog, Location, NewLocation, NewProduct, Product, ProductUpdate, StorageError};

use crate::error::CatalogError;

const MAX_FIELD_LEN: usize = 100;

fn require_text(field: &str, value: &str) -> Result<(), CatalogError> {
    if value.trim().is_empty() {
        return Err(CatalogError::InvalidRequest(format!("{field} is required")));
    }
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(CatalogError::InvalidRequest(format!(
            "{field} must be at most {MAX_FIELD_LEN} characters"
        )));
    }
    Ok(())
}

fn require_page(page: PageRequest) -> Result<(), CatalogError> {
    page.validate().map_err(|field| {
        CatalogError::InvalidRequest(format!("invalid pagination parameter: {field}"))
    })
}

/// Service for the product and location catalog.
///
/// Stock is never changed here after creation; that is the job of
/// [`FulfillmentService`](crate::FulfillmentService).
pub struct CatalogService<S: Catalog> {
    store: S,
}

impl<S: Catalog> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds a product with its opening stock.
    #[tracing::instrument(skip(self))]
    pub async fn add_product(&self, product: NewProduct) -> Result<Product, CatalogError> {
        require_text("name", &product.name)?;
        require_text("sku", &product.sku)?;
        if product.quantity < 0 {
            return Err(CatalogError::InvalidRequest(
                "quantity must not be negative".to_string(),
            ));
        }

        if self.store.find_product_by_name(&product.name).await?.is_some() {
            return Err(CatalogError::NameTaken(product.name));
        }
        if self.store.find_product_by_sku(&product.sku).await?.is_some() {
            return Err(CatalogError::SkuTaken(product.sku));
        }
        if self.store.find_location(product.location_id).await?.is_none() {
            return Err(CatalogError::LocationNotFound(product.location_id));
        }

        let (name, sku, location_id) =
            (product.name.clone(), product.sku.clone(), product.location_id);
        let created = self
            .store
            .insert_product(product)
            .await
            .map_err(|e| classify(e, &name, &sku, location_id))?;

        tracing::info!(product_id = %created.id, "product added");
        Ok(created)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.store
            .find_product(id)
            .await?
            .ok_or(CatalogError::ProductNotFound(id))
    }

    pub async fn list_products(&self, page: PageRequest) -> Result<Vec<Product>, CatalogError> {
        require_page(page)?;
        Ok(self.store.list_products(page).await?)
    }

    /// Renames or relocates a product. The stock level is left alone.
    #[tracing::instrument(skip(self))]
    pub async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, CatalogError> {
        require_text("name", &update.name)?;
        require_text("sku", &update.sku)?;

        if self.store.find_product(id).await?.is_none() {
            return Err(CatalogError::ProductNotFound(id));
        }
        let same_name = self.store.find_product_by_name(&update.name).await?;
        if same_name.is_some_and(|other| other.id != id) {
            return Err(CatalogError::NameTaken(update.name));
        }
        let same_sku = self.store.find_product_by_sku(&update.sku).await?;
        if same_sku.is_some_and(|other| other.id != id) {
            return Err(CatalogError::SkuTaken(update.sku));
        }
        if self.store.find_location(update.location_id).await?.is_none() {
            return Err(CatalogError::LocationNotFound(update.location_id));
        }

        let (name, sku, location_id) =
            (update.name.clone(), update.sku.clone(), update.location_id);
        self.store
            .update_product(id, update)
            .await
            .map_err(|e| classify(e, &name, &sku, location_id))?
            .ok_or(CatalogError::ProductNotFound(id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), CatalogError> {
        match self.store.delete_product(id).await {
            Ok(true) => {
                tracing::info!(product_id = %id, "product deleted");
                Ok(())
            }
            Ok(false) => Err(CatalogError::ProductNotFound(id)),
            Err(StorageError::ForeignKeyViolation { .. }) => Err(CatalogError::ProductInUse(id)),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_location(&self, location: NewLocation) -> Result<Location, CatalogError> {
        require_text("name", &location.name)?;
        if location.capacity < 0 {
            return Err(CatalogError::InvalidRequest(
                "capacity must not be negative".to_string(),
            ));
        }
        if self
            .store
            .find_location_by_name(&location.name)
            .await?
            .is_some()
        {
            return Err(CatalogError::NameTaken(location.name));
        }

        let name = location.name.clone();
        match self.store.insert_location(location).await {
            Ok(created) => Ok(created),
            Err(StorageError::UniqueViolation { .. }) => Err(CatalogError::NameTaken(name)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_locations(&self, page: PageRequest) -> Result<Vec<Location>, CatalogError> {
        require_page(page)?;
        Ok(self.store.list_locations(page).await?)
    }
}

/// Maps a constraint that lost a race with a concurrent writer.
fn classify(err: StorageError, name: &str, sku: &str, location_id: common::LocationId) -> CatalogError {
    match err {
        StorageError::UniqueViolation { ref constraint } if constraint == "products_name_key" => {
            CatalogError::NameTaken(name.to_string())
        }
        StorageError::UniqueViolation { ref constraint } if constraint == "products_sku_key" => {
            CatalogError::SkuTaken(sku.to_string())
        }
        StorageError::ForeignKeyViolation { ref constraint }
            if constraint == "products_location_id_fkey" =>
        {
            CatalogError::LocationNotFound(location_id)
        }
        other => CatalogError::Storage(other),
    }
}
