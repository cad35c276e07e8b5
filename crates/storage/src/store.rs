use async_trait::async_trait;

use crate::{
    Location, LocationId, NewLocation, NewOrder, NewProduct, NewUser, Order, OrderId, PageRequest,
    Product, ProductId, ProductUpdate, Result, User, UserId,
};

/// Opens, commits and aborts database transactions.
///
/// No write issued against a `Tx` is visible to other transactions until
/// `commit` succeeds, and `rollback` undoes every write issued against it.
/// Dropping a `Tx` without committing is equivalent to a rollback.
#[async_trait]
pub trait TransactionProvider: Send + Sync {
    /// Handle for one open transaction.
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> Result<()>;

    async fn rollback(&self, tx: Self::Tx) -> Result<()>;
}

/// Owns product stock levels.
///
/// Both operations run inside the caller's transaction and return the
/// product's quantity after the change.
#[async_trait]
pub trait StockLedger: TransactionProvider {
    /// Adds `quantity` to the product's stock.
    ///
    /// Fails with `ProductNotFound` if no row matches.
    async fn increase_stock(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<i64>;

    /// Removes `quantity` from the product's stock without letting it go negative.
    ///
    /// The compare and the subtraction are a single conditional update, so
    /// concurrent decreases of the same row can never both pass a stale check.
    /// Fails with `ProductNotFound` or `InsufficientStock`.
    async fn decrease_stock(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<i64>;
}

/// Append-only record of receiving and shipping orders.
#[async_trait]
pub trait OrderLog: TransactionProvider {
    /// Appends one order inside the caller's transaction, assigning its id.
    async fn append(&self, tx: &mut Self::Tx, order: NewOrder) -> Result<Order>;

    /// Lists committed orders, oldest first.
    async fn find_all(&self, page: PageRequest) -> Result<Vec<Order>>;

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>>;
}

/// Product and location catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    /// Rewrites the catalog fields of a product. Returns `None` if it does not exist.
    async fn update_product(&self, id: ProductId, update: ProductUpdate)
    -> Result<Option<Product>>;

    /// Deletes a product. Returns false if it did not exist.
    async fn delete_product(&self, id: ProductId) -> Result<bool>;

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>>;

    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>>;

    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<Product>>;

    async fn list_products(&self, page: PageRequest) -> Result<Vec<Product>>;

    async fn insert_location(&self, location: NewLocation) -> Result<Location>;

    async fn find_location(&self, id: LocationId) -> Result<Option<Location>>;

    async fn find_location_by_name(&self, name: &str) -> Result<Option<Location>>;

    async fn list_locations(&self, page: PageRequest) -> Result<Vec<Location>>;
}

/// Admin and staff accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Stores a new account. Fails with `UniqueViolation` on `users_email_key`.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Lists accounts ordered by email.
    async fn list_users(&self, page: PageRequest) -> Result<Vec<User>>;

    /// Returns true once any admin account exists.
    async fn has_admin(&self) -> Result<bool>;
}

/// Everything the services need from one backend.
pub trait WarehouseStore: StockLedger + OrderLog + Catalog + UserDirectory + Clone + 'static {}

impl<T> WarehouseStore for T where
    T: StockLedger + OrderLog + Catalog + UserDirectory + Clone + 'static
{
}
