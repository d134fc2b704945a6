use async_trait::async_trait;
use uuid::Uuid;

use super::RepoError;
use crate::domain::catalog::{CatalogPage, CatalogSearch};
use crate::domain::product::Product;

#[async_trait]
pub trait ProductRepository: Send + Sync + 'static {
    async fn create_product(&self, product: Product) -> Result<Product, RepoError>;
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, RepoError>;
    async fn search_products(&self, search: &CatalogSearch) -> Result<CatalogPage, RepoError>;
}
