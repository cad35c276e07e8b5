use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Catalog, Location, LocationId, NewLocation, NewOrder, NewProduct, NewUser, Order, OrderId,
    OrderLog, PageRequest, Product, ProductId, ProductUpdate, Result, StockLedger, StorageError,
    TransactionProvider, User, UserDirectory, UserId, UserRole,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    locations: Vec<Location>,
    products: Vec<Product>,
    orders: Vec<Order>,
    users: Vec<User>,
}

impl Tables {
    fn product_mut(&mut self, id: ProductId) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| p.id == id)
    }

    fn check_product_unique(&self, name: &str, sku: &str, except: Option<ProductId>) -> Result<()> {
        let others = self.products.iter().filter(|p| Some(p.id) != except);
        for product in others {
            if product.name == name {
                return Err(StorageError::UniqueViolation {
                    constraint: "products_name_key".to_string(),
                });
            }
            if product.sku == sku {
                return Err(StorageError::UniqueViolation {
                    constraint: "products_sku_key".to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_location_exists(&self, id: LocationId) -> Result<()> {
        if self.locations.iter().any(|l| l.id == id) {
            Ok(())
        } else {
            Err(StorageError::ForeignKeyViolation {
                constraint: "products_location_id_fkey".to_string(),
            })
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_append: AtomicBool,
    fail_on_commit: AtomicBool,
    write_delay_ms: AtomicU64,
    commit_delay_ms: AtomicU64,
}

/// In-memory warehouse storage for testing.
///
/// Transactions are fully serialized: `begin` takes a store-wide lock and
/// works on a private copy of the tables that `commit` publishes. Reads and
/// catalog writes wait for any open transaction to finish.
#[derive(Clone, Default)]
pub struct InMemoryWarehouse {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

/// Open transaction against an [`InMemoryWarehouse`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

impl InMemoryWarehouse {
    /// Creates a new empty in-memory warehouse.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent order append fail until reset.
    pub fn set_fail_on_append(&self, fail: bool) {
        self.faults.fail_on_append.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent commit fail (and discard its writes) until reset.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.faults.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Delays each transactional write, for exercising request deadlines.
    pub fn set_write_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.faults.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Delays each commit before it publishes, for exercising the commit bound.
    pub fn set_commit_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.faults.commit_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Returns the total number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    async fn simulate_latency(&self) {
        pause(&self.faults.write_delay_ms).await;
    }
}

async fn pause(delay_ms: &AtomicU64) {
    let millis = delay_ms.load(Ordering::SeqCst);
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

fn page_of<T: Clone>(rows: &[T], page: PageRequest) -> Vec<T> {
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
    rows.iter().skip(offset).take(limit).cloned().collect()
}

#[async_trait]
impl TransactionProvider for InMemoryWarehouse {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTransaction { guard, staged })
    }

    async fn commit(&self, tx: Self::Tx) -> Result<()> {
        pause(&self.faults.commit_delay_ms).await;
        if self.faults.fail_on_commit.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("commit rejected".to_string()));
        }
        let InMemoryTransaction { mut guard, staged } = tx;
        *guard = staged;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl StockLedger for InMemoryWarehouse {
    async fn increase_stock(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<i64> {
        self.simulate_latency().await;
        let product = tx
            .staged
            .product_mut(product_id)
            .ok_or(StorageError::ProductNotFound(product_id))?;
        product.quantity = product
            .quantity
            .checked_add(quantity)
            .ok_or(StorageError::StockOverflow {
                product_id,
                current: product.quantity,
                added: quantity,
            })?;
        Ok(product.quantity)
    }

    async fn decrease_stock(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<i64> {
        self.simulate_latency().await;
        let product = tx
            .staged
            .product_mut(product_id)
            .ok_or(StorageError::ProductNotFound(product_id))?;
        if product.quantity < quantity {
            return Err(StorageError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.quantity,
            });
        }
        product.quantity -= quantity;
        Ok(product.quantity)
    }
}

#[async_trait]
impl OrderLog for InMemoryWarehouse {
    async fn append(&self, tx: &mut Self::Tx, order: NewOrder) -> Result<Order> {
        self.simulate_latency().await;
        if self.faults.fail_on_append.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("order append rejected".to_string()));
        }
        if !tx.staged.products.iter().any(|p| p.id == order.product_id) {
            return Err(StorageError::ForeignKeyViolation {
                constraint: "orders_product_id_fkey".to_string(),
            });
        }
        let order = order.into_order();
        tx.staged.orders.push(order.clone());
        Ok(order)
    }

    async fn find_all(&self, page: PageRequest) -> Result<Vec<Order>> {
        Ok(page_of(&self.tables.lock().await.orders, page))
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }
}

#[async_trait]
impl Catalog for InMemoryWarehouse {
    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let mut tables = self.tables.lock().await;
        tables.check_product_unique(&product.name, &product.sku, None)?;
        tables.check_location_exists(product.location_id)?;

        let product = Product {
            id: ProductId::new(),
            name: product.name,
            sku: product.sku,
            quantity: product.quantity,
            location_id: product.location_id,
        };
        tables.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>> {
        let mut tables = self.tables.lock().await;
        if !tables.products.iter().any(|p| p.id == id) {
            return Ok(None);
        }
        tables.check_product_unique(&update.name, &update.sku, Some(id))?;
        tables.check_location_exists(update.location_id)?;

        let product = tables
            .product_mut(id)
            .ok_or(StorageError::ProductNotFound(id))?;
        product.name = update.name;
        product.sku = update.sku;
        product.location_id = update.location_id;
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        if tables.orders.iter().any(|o| o.product_id == id) {
            return Err(StorageError::ForeignKeyViolation {
                constraint: "orders_product_id_fkey".to_string(),
            });
        }
        let before = tables.products.len();
        tables.products.retain(|p| p.id != id);
        Ok(tables.products.len() != before)
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        let tables = self.tables.lock().await;
        Ok(tables.products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>> {
        let tables = self.tables.lock().await;
        Ok(tables.products.iter().find(|p| p.name == name).cloned())
    }

    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let tables = self.tables.lock().await;
        Ok(tables.products.iter().find(|p| p.sku == sku).cloned())
    }

    async fn list_products(&self, page: PageRequest) -> Result<Vec<Product>> {
        let mut products = self.tables.lock().await.products.clone();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page_of(&products, page))
    }

    async fn insert_location(&self, location: NewLocation) -> Result<Location> {
        let mut tables = self.tables.lock().await;
        if tables.locations.iter().any(|l| l.name == location.name) {
            return Err(StorageError::UniqueViolation {
                constraint: "locations_name_key".to_string(),
            });
        }
        let location = Location {
            id: LocationId::new(),
            name: location.name,
            capacity: location.capacity,
        };
        tables.locations.push(location.clone());
        Ok(location)
    }

    async fn find_location(&self, id: LocationId) -> Result<Option<Location>> {
        let tables = self.tables.lock().await;
        Ok(tables.locations.iter().find(|l| l.id == id).cloned())
    }

    async fn find_location_by_name(&self, name: &str) -> Result<Option<Location>> {
        let tables = self.tables.lock().await;
        Ok(tables.locations.iter().find(|l| l.name == name).cloned())
    }

    async fn list_locations(&self, page: PageRequest) -> Result<Vec<Location>> {
        let mut locations = self.tables.lock().await.locations.clone();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page_of(&locations, page))
    }
}

#[async_trait]
impl UserDirectory for InMemoryWarehouse {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StorageError::UniqueViolation {
                constraint: "users_email_key".to_string(),
            });
        }
        let user = User {
            id: UserId::new(),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            role: user.role,
            created_at: chrono::Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, page: PageRequest) -> Result<Vec<User>> {
        let mut users = self.tables.lock().await.users.clone();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(page_of(&users, page))
    }

    async fn has_admin(&self) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().any(|u| u.role == UserRole::Admin))
    }
}
