use std::sync::Arc;
use storefront_types::domain::cart::CartPolicy;
use storefront_types::ports::StoreRepository;

use super::cart_service::CartService;
use super::catalog_service::CatalogService;
use super::change_feed::ChangeFeed;
use super::order_service::OrderService;
use crate::config::Config;

/// The services the HTTP adapter serves, all sharing one store.
pub struct Storefront<R: StoreRepository> {
    pub catalog: CatalogService<R>,
    pub cart: CartService<R>,
    pub orders: OrderService<R>,
    pub changes: ChangeFeed,
}

impl<R: StoreRepository> Storefront<R> {
    pub fn new(repo: R, catalog_page_size: u32, cart_policy: CartPolicy) -> Self {
        let repo = Arc::new(repo);
        let changes = ChangeFeed::default();
        Self {
            catalog: CatalogService::new(repo.clone(), catalog_page_size),
            cart: CartService::new(repo.clone(), cart_policy, changes.clone()),
            orders: OrderService::new(repo),
            changes,
        }
    }

    pub fn from_config(repo: R, config: &Config) -> Self {
        Self::new(repo, config.catalog_page_size, config.cart)
    }
}
