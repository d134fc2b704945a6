use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions};
use sqlx::{FromRow, QueryBuilder, SqlitePool};
use std::str::FromStr;
use storefront_types::domain::cart::{CartLine, CartUpsert};
use storefront_types::domain::catalog::{CatalogPage, CatalogSearch, SortKey};
use storefront_types::domain::order::{Order, OrderStatus};
use storefront_types::domain::product::{Category, Product};
use storefront_types::ports::cart_repository::CartRepository;
use storefront_types::ports::order_repository::OrderRepository;
use storefront_types::ports::product_repository::ProductRepository;
use storefront_types::ports::RepoError;
use uuid::Uuid;

const MIGRATIONS: [&str; 3] = [
    include_str!("../migrations/0001_create_products.sql"),
    include_str!("../migrations/0002_create_cart_items.sql"),
    include_str!("../migrations/0003_create_orders.sql"),
];

const PRODUCT_COLUMNS: &str =
    "id, name, description, category, price, stock_quantity, is_active, created_at";
const CART_COLUMNS: &str = "id, user_id, product_id, quantity, created_at, updated_at";
const ORDER_COLUMNS: &str =
    "id, user_id, total_amount, status, shipping_address, note, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteRepo {
    pool: SqlitePool,
}

fn db_err(e: impl ToString) -> RepoError {
    RepoError::DbError(e.to_string())
}

// Fixed width so that text order matches time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepoError> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(db_err)?
        .with_timezone(&Utc))
}

fn parse_uuid(raw: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(raw).map_err(db_err)
}

#[derive(FromRow)]
struct DbProduct {
    id: String,
    name: String,
    description: Option<String>,
    category: String,
    price: i64,
    stock_quantity: i64,
    is_active: bool,
    created_at: String,
}

impl DbProduct {
    fn into_product(self) -> Result<Product, RepoError> {
        Ok(Product {
            id: parse_uuid(&self.id)?,
            name: self.name,
            description: self.description,
            category: Category::from_str(&self.category).map_err(db_err)?,
            price: self.price,
            stock_quantity: u32::try_from(self.stock_quantity).map_err(db_err)?,
            is_active: self.is_active,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[derive(FromRow)]
struct DbCartLine {
    id: String,
    user_id: String,
    product_id: String,
    quantity: i64,
    created_at: String,
    updated_at: String,
}

impl DbCartLine {
    fn into_line(self) -> Result<CartLine, RepoError> {
        Ok(CartLine {
            id: parse_uuid(&self.id)?,
            user_id: parse_uuid(&self.user_id)?,
            product_id: parse_uuid(&self.product_id)?,
            quantity: u32::try_from(self.quantity).map_err(db_err)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct DbOrder {
    id: String,
    user_id: String,
    total_amount: i64,
    status: String,
    shipping_address: String,
    note: Option<String>,
    created_at: String,
    updated_at: String,
}

impl DbOrder {
    fn into_order(self) -> Result<Order, RepoError> {
        Ok(Order {
            id: parse_uuid(&self.id)?,
            user_id: parse_uuid(&self.user_id)?,
            total_amount: self.total_amount,
            status: OrderStatus::from_str(&self.status).map_err(db_err)?,
            shipping_address: serde_json::from_str(&self.shipping_address).map_err(db_err)?,
            note: self.note,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn push_catalog_filters(qb: &mut QueryBuilder<'_, Sqlite>, search: &CatalogSearch) {
    qb.push(" WHERE is_active = 1");
    if let Some(category) = search.category.category() {
        qb.push(" AND category = ").push_bind(category.as_str());
    }
    // Matched against the folded columns: SQLite's lower() only folds ASCII.
    if let Some(needle) = &search.needle {
        qb.push(" AND (instr(name_folded, ")
            .push_bind(needle.clone())
            .push(") > 0 OR instr(description_folded, ")
            .push_bind(needle.clone())
            .push(") > 0)");
    }
}

fn order_by(sort: SortKey) -> &'static str {
    match sort {
        SortKey::Newest => " ORDER BY created_at DESC, id ASC",
        SortKey::NameAsc => " ORDER BY name ASC, id ASC",
        SortKey::PriceAsc => " ORDER BY price ASC, id ASC",
        SortKey::PriceDesc => " ORDER BY price DESC, id ASC",
    }
}

impl SqliteRepo {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        for ddl in MIGRATIONS {
            sqlx::query(ddl).execute(&pool).await?;
        }
        tracing::debug!(database_url, "sqlite schema ready");

        Ok(Self { pool })
    }
}

#[async_trait]
impl ProductRepository for SqliteRepo {
    async fn create_product(&self, product: Product) -> Result<Product, RepoError> {
        sqlx::query(
            "INSERT INTO products (id, name, description, category, price, stock_quantity, is_active, created_at, name_folded, description_folded)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(product.id.to_string())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category.as_str())
        .bind(product.price)
        .bind(i64::from(product.stock_quantity))
        .bind(product.is_active)
        .bind(timestamp(product.created_at))
        .bind(product.name.to_lowercase())
        .bind(product.description.as_deref().unwrap_or_default().to_lowercase())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
        let row: Option<DbProduct> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(DbProduct::into_product).transpose()
    }

    async fn search_products(&self, search: &CatalogSearch) -> Result<CatalogPage, RepoError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products");
        push_catalog_filters(&mut count, search);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let mut page = QueryBuilder::<Sqlite>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_catalog_filters(&mut page, search);
        page.push(order_by(search.sort))
            .push(" LIMIT ")
            .push_bind(i64::try_from(search.limit()).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(search.offset()).unwrap_or(i64::MAX));
        let rows: Vec<DbProduct> = page
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let items = rows
            .into_iter()
            .map(DbProduct::into_product)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CatalogPage::new(
            items,
            u64::try_from(total).map_err(db_err)?,
            search,
        ))
    }
}

#[async_trait]
impl CartRepository for SqliteRepo {
    async fn upsert_cart_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: u32,
        cap: Option<u32>,
    ) -> Result<CartUpsert, RepoError> {
        let fresh = CartLine::new(user_id, product_id, quantity);
        let row: DbCartLine = sqlx::query_as(&format!(
            "INSERT INTO cart_items ({CART_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (user_id, product_id) DO UPDATE SET
                 quantity = MIN(cart_items.quantity + excluded.quantity, ?),
                 updated_at = excluded.updated_at
             RETURNING {CART_COLUMNS}"
        ))
        .bind(fresh.id.to_string())
        .bind(user_id.to_string())
        .bind(product_id.to_string())
        .bind(i64::from(quantity))
        .bind(timestamp(fresh.created_at))
        .bind(timestamp(fresh.updated_at))
        .bind(cap.map_or(i64::MAX, i64::from))
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        let line = row.into_line()?;
        // A conflict keeps the stored id, so our fresh id only comes back on insert.
        Ok(CartUpsert {
            inserted: line.id == fresh.id,
            line,
        })
    }

    async fn list_cart_lines(&self, user_id: Uuid) -> Result<Vec<CartLine>, RepoError> {
        let rows: Vec<DbCartLine> = sqlx::query_as(&format!(
            "SELECT {CART_COLUMNS} FROM cart_items WHERE user_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(DbCartLine::into_line)
            .collect::<Result<Vec<_>, _>>()
    }

    async fn set_cart_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<Option<CartLine>, RepoError> {
        let row: Option<DbCartLine> = sqlx::query_as(&format!(
            "UPDATE cart_items SET quantity = ?, updated_at = ?
             WHERE user_id = ? AND product_id = ?
             RETURNING {CART_COLUMNS}"
        ))
        .bind(i64::from(quantity))
        .bind(timestamp(Utc::now()))
        .bind(user_id.to_string())
        .bind(product_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(DbCartLine::into_line).transpose()
    }

    async fn remove_cart_line(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, RepoError> {
        let res = sqlx::query("DELETE FROM cart_items WHERE user_id = ? AND product_id = ?")
            .bind(user_id.to_string())
            .bind(product_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_cart_lines(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        u64::try_from(count).map_err(db_err)
    }
}

#[async_trait]
impl OrderRepository for SqliteRepo {
    async fn create_order(&self, order: Order) -> Result<Order, RepoError> {
        let address = serde_json::to_string(&order.shipping_address).map_err(db_err)?;
        sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(order.id.to_string())
        .bind(order.user_id.to_string())
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(address)
        .bind(&order.note)
        .bind(timestamp(order.created_at))
        .bind(timestamp(order.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        let row: Option<DbOrder> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(DbOrder::into_order).transpose()
    }

    async fn list_orders(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepoError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = "
        ));
        qb.push_bind(user_id.to_string());
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows: Vec<DbOrder> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(DbOrder::into_order)
            .collect::<Result<Vec<_>, _>>()
    }
}
