#[cfg(not(any(feature = "memory", feature = "sqlite")))]
compile_error!("Enable a repo feature: `memory` or `sqlite`.");

use async_trait::async_trait;
use storefront_types::domain::cart::{CartLine, CartUpsert};
use storefront_types::domain::catalog::{CatalogPage, CatalogSearch};
use storefront_types::domain::order::{Order, OrderStatus};
use storefront_types::domain::product::Product;
use storefront_types::ports::cart_repository::CartRepository;
use storefront_types::ports::order_repository::OrderRepository;
use storefront_types::ports::product_repository::ProductRepository;
use storefront_types::ports::RepoError;
use uuid::Uuid;

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub const DEFAULT_SQLITE_URL: &str = "sqlite://storefront.db";

/// The backing store picked at startup.
#[derive(Clone)]
pub enum Repo {
    #[cfg(feature = "memory")]
    Memory(memory::InMemoryRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteRepo),
}

pub async fn build_repo(url: Option<&str>) -> anyhow::Result<Repo> {
    Repo::build_repo(url).await
}

impl Repo {
    #[cfg(all(feature = "memory", not(feature = "sqlite")))]
    pub async fn build_repo(_: Option<&str>) -> anyhow::Result<Self> {
        tracing::info!("using in-memory store");
        Ok(Self::Memory(memory::InMemoryRepo::new()))
    }

    #[cfg(all(feature = "sqlite", not(feature = "memory")))]
    pub async fn build_repo(database_url: Option<&str>) -> anyhow::Result<Self> {
        let url = database_url.unwrap_or(DEFAULT_SQLITE_URL);
        tracing::info!(url, "using sqlite store");
        Ok(Self::Sqlite(sqlite::SqliteRepo::new(url).await?))
    }

    // With both adapters compiled in, a database url selects sqlite.
    #[cfg(all(feature = "sqlite", feature = "memory"))]
    pub async fn build_repo(database_url: Option<&str>) -> anyhow::Result<Self> {
        match database_url {
            Some(url) => {
                tracing::info!(url, "using sqlite store");
                Ok(Self::Sqlite(sqlite::SqliteRepo::new(url).await?))
            }
            None => {
                tracing::info!("using in-memory store");
                Ok(Self::Memory(memory::InMemoryRepo::new()))
            }
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $repo:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "memory")]
            Repo::Memory($repo) => $call,
            #[cfg(feature = "sqlite")]
            Repo::Sqlite($repo) => $call,
        }
    };
}

#[async_trait]
impl ProductRepository for Repo {
    async fn create_product(&self, product: Product) -> Result<Product, RepoError> {
        dispatch!(self, repo => repo.create_product(product).await)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
        dispatch!(self, repo => repo.get_product(id).await)
    }

    async fn search_products(&self, search: &CatalogSearch) -> Result<CatalogPage, RepoError> {
        dispatch!(self, repo => repo.search_products(search).await)
    }
}

#[async_trait]
impl CartRepository for Repo {
    async fn upsert_cart_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: u32,
        cap: Option<u32>,
    ) -> Result<CartUpsert, RepoError> {
        dispatch!(self, repo => repo.upsert_cart_line(user_id, product_id, quantity, cap).await)
    }

    async fn list_cart_lines(&self, user_id: Uuid) -> Result<Vec<CartLine>, RepoError> {
        dispatch!(self, repo => repo.list_cart_lines(user_id).await)
    }

    async fn set_cart_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<Option<CartLine>, RepoError> {
        dispatch!(self, repo => repo.set_cart_quantity(user_id, product_id, quantity).await)
    }

    async fn remove_cart_line(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, RepoError> {
        dispatch!(self, repo => repo.remove_cart_line(user_id, product_id).await)
    }

    async fn count_cart_lines(&self, user_id: Uuid) -> Result<u64, RepoError> {
        dispatch!(self, repo => repo.count_cart_lines(user_id).await)
    }
}

#[async_trait]
impl OrderRepository for Repo {
    async fn create_order(&self, order: Order) -> Result<Order, RepoError> {
        dispatch!(self, repo => repo.create_order(order).await)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        dispatch!(self, repo => repo.get_order(id).await)
    }

    async fn list_orders(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepoError> {
        dispatch!(self, repo => repo.list_orders(user_id, status).await)
    }
}
