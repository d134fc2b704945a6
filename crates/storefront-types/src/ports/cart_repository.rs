use async_trait::async_trait;
use uuid::Uuid;

use super::RepoError;
use crate::domain::cart::{CartLine, CartUpsert};

#[async_trait]
pub trait CartRepository: Send + Sync + 'static {
    /// Inserts a line for (`user_id`, `product_id`) or adds `quantity` to the
    /// existing one, as a single atomic step. An existing line is held at
    /// `cap` when one is given. Reports whether the line was created.
    async fn upsert_cart_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: u32,
        cap: Option<u32>,
    ) -> Result<CartUpsert, RepoError>;
    async fn list_cart_lines(&self, user_id: Uuid) -> Result<Vec<CartLine>, RepoError>;
    async fn set_cart_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<Option<CartLine>, RepoError>;
    async fn remove_cart_line(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, RepoError>;
    async fn count_cart_lines(&self, user_id: Uuid) -> Result<u64, RepoError>;
}
