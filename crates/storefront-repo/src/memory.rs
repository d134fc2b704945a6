use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use storefront_types::domain::cart::{CartLine, CartUpsert};
use storefront_types::domain::catalog::{CatalogPage, CatalogSearch};
use storefront_types::domain::order::{Order, OrderStatus};
use storefront_types::domain::product::Product;
use storefront_types::ports::cart_repository::CartRepository;
use storefront_types::ports::order_repository::OrderRepository;
use storefront_types::ports::product_repository::ProductRepository;
use storefront_types::ports::RepoError;
use uuid::Uuid;

#[derive(Clone)]
pub struct InMemoryRepo {
    pub products: Arc<DashMap<Uuid, Product>>,
    /// Keyed by (user, product); the entry lock makes the upsert atomic.
    pub cart: Arc<DashMap<(Uuid, Uuid), CartLine>>,
    pub orders: Arc<DashMap<Uuid, Order>>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            products: Arc::new(DashMap::new()),
            cart: Arc::new(DashMap::new()),
            orders: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductRepository for InMemoryRepo {
    async fn create_product(&self, product: Product) -> Result<Product, RepoError> {
        self.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
        Ok(self.products.get(&id).map(|r| r.clone()))
    }

    async fn search_products(&self, search: &CatalogSearch) -> Result<CatalogPage, RepoError> {
        let snapshot: Vec<Product> = self.products.iter().map(|kv| kv.value().clone()).collect();
        Ok(search.apply(snapshot))
    }
}

#[async_trait]
impl CartRepository for InMemoryRepo {
    async fn upsert_cart_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: u32,
        cap: Option<u32>,
    ) -> Result<CartUpsert, RepoError> {
        let upsert = match self.cart.entry((user_id, product_id)) {
            Entry::Occupied(mut e) => {
                let line = e.get_mut();
                line.increment(quantity, cap);
                CartUpsert {
                    line: line.clone(),
                    inserted: false,
                }
            }
            Entry::Vacant(e) => CartUpsert {
                line: e
                    .insert(CartLine::new(user_id, product_id, quantity))
                    .value()
                    .clone(),
                inserted: true,
            },
        };
        Ok(upsert)
    }

    async fn list_cart_lines(&self, user_id: Uuid) -> Result<Vec<CartLine>, RepoError> {
        let mut lines: Vec<CartLine> = self
            .cart
            .iter()
            .filter(|kv| kv.key().0 == user_id)
            .map(|kv| kv.value().clone())
            .collect();
        lines.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(lines)
    }

    async fn set_cart_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<Option<CartLine>, RepoError> {
        if let Some(mut v) = self.cart.get_mut(&(user_id, product_id)) {
            v.set_quantity(quantity);
            return Ok(Some(v.clone()));
        }
        Ok(None)
    }

    async fn remove_cart_line(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, RepoError> {
        Ok(self.cart.remove(&(user_id, product_id)).is_some())
    }

    async fn count_cart_lines(&self, user_id: Uuid) -> Result<u64, RepoError> {
        Ok(self.cart.iter().filter(|kv| kv.key().0 == user_id).count() as u64)
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepo {
    async fn create_order(&self, order: Order) -> Result<Order, RepoError> {
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        Ok(self.orders.get(&id).map(|r| r.clone()))
    }

    async fn list_orders(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepoError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|kv| kv.user_id == user_id)
            .filter(|kv| status.map_or(true, |s| kv.status == s))
            .map(|kv| kv.value().clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }
}
