use crate::errors::AppError;
use std::sync::Arc;
use storefront_types::domain::order::{Order, OrderStatus};
use storefront_types::ports::order_repository::OrderRepository;
use uuid::Uuid;

pub struct OrderService<R: OrderRepository> {
    repo: Arc<R>,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn list_orders(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, AppError> {
        let orders = self.repo.list_orders(user_id, status).await?;
        tracing::debug!(%user_id, ?status, count = orders.len(), "order history");
        Ok(orders)
    }

    /// Someone else's order reads as missing.
    pub async fn get_order(&self, user_id: Uuid, id: Uuid) -> Result<Order, AppError> {
        match self.repo.get_order(id).await? {
            Some(o) if o.user_id == user_id => Ok(o),
            _ => Err(AppError::NotFound(format!("order {}", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storefront_repo::memory::InMemoryRepo;

    async fn place(repo: &InMemoryRepo, user_id: Uuid, status: OrderStatus) -> Order {
        let order = Order::new(user_id, 1500, json!({ "city": "Lyon" }), None)
            .unwrap()
            .with_status(status);
        repo.create_order(order).await.unwrap()
    }

    #[tokio::test]
    async fn status_filter_and_ownership() {
        let repo = Arc::new(InMemoryRepo::new());
        let svc = OrderService::new(repo.clone());
        let user = Uuid::new_v4();

        place(&repo, user, OrderStatus::Shipped).await;
        place(&repo, user, OrderStatus::Delivered).await;
        place(&repo, Uuid::new_v4(), OrderStatus::Shipped).await;

        let shipped = svc
            .list_orders(user, Some(OrderStatus::Shipped))
            .await
            .unwrap();
        assert_eq!(shipped.len(), 1);
        assert!(shipped.iter().all(|o| o.user_id == user));
        assert_eq!(svc.list_orders(user, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn not_found_paths() {
        let repo = Arc::new(InMemoryRepo::new());
        let svc = OrderService::new(repo.clone());
        let owner = Uuid::new_v4();
        let order = place(&repo, owner, OrderStatus::Pending).await;

        assert!(svc.get_order(owner, order.id).await.is_ok());
        assert!(matches!(
            svc.get_order(Uuid::new_v4(), order.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.get_order(owner, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
