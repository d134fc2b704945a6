pub mod cart_repository;
pub mod order_repository;
pub mod product_repository;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("db error: {0}")]
    DbError(String),
}

/// Everything the storefront needs from one backing store.
pub trait StoreRepository:
    product_repository::ProductRepository
    + cart_repository::CartRepository
    + order_repository::OrderRepository
{
}

impl<T> StoreRepository for T where
    T: product_repository::ProductRepository
        + cart_repository::CartRepository
        + order_repository::OrderRepository
{
}
