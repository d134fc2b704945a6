use async_trait::async_trait;
use uuid::Uuid;

use super::RepoError;
use crate::domain::order::{Order, OrderStatus};

#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    async fn create_order(&self, order: Order) -> Result<Order, RepoError>;
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError>;
    /// Orders owned by `user_id`, newest first.
    async fn list_orders(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepoError>;
}
