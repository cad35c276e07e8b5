use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Catalog, Location, LocationId, NewLocation, NewOrder, NewProduct, NewUser, Order, OrderId,
    OrderLog, OrderType, PageRequest, Product, ProductId, ProductUpdate, Result, StockLedger,
    StorageError, TransactionProvider, User, UserDirectory, UserId, UserRole,
};

const ORDER_COLUMNS: &str = "id, type, product_id, quantity, created_at";
const PRODUCT_COLUMNS: &str = "id, name, sku, quantity, location_id";
const LOCATION_COLUMNS: &str = "id, name, capacity";
const USER_COLUMNS: &str = "id, email, password_hash, name, role, created_at";

/// PostgreSQL-backed warehouse storage.
#[derive(Clone)]
pub struct PostgresWarehouse {
    pool: PgPool,
}

impl PostgresWarehouse {
    /// Creates a new PostgreSQL warehouse store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let order_type: String = row.try_get("type")?;
        let order_type = order_type
            .parse::<OrderType>()
            .map_err(|e| StorageError::Database(sqlx::Error::Decode(Box::new(e))))?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_type,
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: row.try_get("quantity")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            sku: row.try_get("sku")?,
            quantity: row.try_get("quantity")?,
            location_id: LocationId::from_uuid(row.try_get::<Uuid, _>("location_id")?),
        })
    }

    fn row_to_location(row: PgRow) -> Result<Location> {
        Ok(Location {
            id: LocationId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            capacity: row.try_get("capacity")?,
        })
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        let role: String = row.try_get("role")?;
        let role = role
            .parse::<UserRole>()
            .map_err(|e| StorageError::Database(sqlx::Error::Decode(Box::new(e))))?;

        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            name: row.try_get("name")?,
            role,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn find_product_where(&self, column: &str, value: &str) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE {column} = $1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_product).transpose()
    }
}

/// Converts a page into `(LIMIT, OFFSET)` bind values.
fn limit_offset(page: PageRequest) -> (i64, i64) {
    (
        i64::try_from(page.limit()).unwrap_or(i64::MAX),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

#[async_trait]
impl TransactionProvider for PostgresWarehouse {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<()> {
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl StockLedger for PostgresWarehouse {
    async fn increase_stock(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<i64> {
        // Guarded so an overflowing sum matches no row instead of aborting the transaction.
        let ceiling = i64::MAX.saturating_sub(quantity);
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products SET quantity = quantity + $1
            WHERE id = $2 AND quantity <= $3
            RETURNING quantity
            "#,
        )
        .bind(quantity)
        .bind(product_id.as_uuid())
        .bind(ceiling)
        .fetch_optional(&mut **tx)
        .await
        .map_err(StorageError::from_write)?;

        if let Some(total) = updated {
            return Ok(total);
        }

        let current: Option<i64> =
            sqlx::query_scalar("SELECT quantity FROM products WHERE id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&mut **tx)
                .await?;

        match current {
            Some(current) => Err(StorageError::StockOverflow {
                product_id,
                current,
                added: quantity,
            }),
            None => Err(StorageError::ProductNotFound(product_id)),
        }
    }

    async fn decrease_stock(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<i64> {
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products SET quantity = quantity - $1
            WHERE id = $2 AND quantity >= $1
            RETURNING quantity
            "#,
        )
        .bind(quantity)
        .bind(product_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(StorageError::from_write)?;

        if let Some(remaining) = updated {
            return Ok(remaining);
        }

        // Nothing matched: tell a missing row apart from a short one.
        let available: Option<i64> =
            sqlx::query_scalar("SELECT quantity FROM products WHERE id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&mut **tx)
                .await?;

        tracing::debug!(%product_id, requested = quantity, ?available, "conditional decrease matched no row");
        match available {
            Some(available) => Err(StorageError::InsufficientStock {
                product_id,
                requested: quantity,
                available,
            }),
            None => Err(StorageError::ProductNotFound(product_id)),
        }
    }
}

#[async_trait]
impl OrderLog for PostgresWarehouse {
    async fn append(&self, tx: &mut Self::Tx, order: NewOrder) -> Result<Order> {
        let sql = format!(
            "INSERT INTO orders (id, type, product_id, quantity) VALUES ($1, $2, $3, $4) RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(order.order_type.as_str())
            .bind(order.product_id.as_uuid())
            .bind(order.quantity)
            .fetch_one(&mut **tx)
            .await
            .map_err(StorageError::from_write)?;

        Self::row_to_order(row)
    }

    async fn find_all(&self, page: PageRequest) -> Result<Vec<Order>> {
        let (limit, offset) = limit_offset(page);
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }
}

#[async_trait]
impl Catalog for PostgresWarehouse {
    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let sql = format!(
            "INSERT INTO products (id, name, sku, quantity, location_id) VALUES ($1, $2, $3, $4, $5) RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&product.name)
            .bind(&product.sku)
            .bind(product.quantity)
            .bind(product.location_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from_write)?;

        Self::row_to_product(row)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>> {
        let sql = format!(
            "UPDATE products SET name = $2, sku = $3, location_id = $4 WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(&update.name)
            .bind(&update.sku)
            .bind(update.location_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from_write)?;

        row.map(Self::row_to_product).transpose()
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from_write)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>> {
        self.find_product_where("name", name).await
    }

    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        self.find_product_where("sku", sku).await
    }

    async fn list_products(&self, page: PageRequest) -> Result<Vec<Product>> {
        let (limit, offset) = limit_offset(page);
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn insert_location(&self, location: NewLocation) -> Result<Location> {
        let sql = format!(
            "INSERT INTO locations (id, name, capacity) VALUES ($1, $2, $3) RETURNING {LOCATION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&location.name)
            .bind(location.capacity)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from_write)?;

        Self::row_to_location(row)
    }

    async fn find_location(&self, id: LocationId) -> Result<Option<Location>> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_location).transpose()
    }

    async fn find_location_by_name(&self, name: &str) -> Result<Option<Location>> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE name = $1");
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_location).transpose()
    }

    async fn list_locations(&self, page: PageRequest) -> Result<Vec<Location>> {
        let (limit, offset) = limit_offset(page);
        let sql = format!(
            "SELECT {LOCATION_COLUMNS} FROM locations ORDER BY name ASC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_location).collect()
    }
}

#[async_trait]
impl UserDirectory for PostgresWarehouse {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (id, email, password_hash, name, role) VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from_write)?;

        Self::row_to_user(row)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn list_users(&self, page: PageRequest) -> Result<Vec<User>> {
        let (limit, offset) = limit_offset(page);
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users ORDER BY email ASC LIMIT $1 OFFSET $2");
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_user).collect()
    }

    async fn has_admin(&self) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE role = 'admin')")
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}
