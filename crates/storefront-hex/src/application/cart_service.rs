use crate::application::change_feed::ChangeFeed;
use crate::errors::AppError;
use std::sync::Arc;
use storefront_types::domain::cart::{
    CartItem, CartLine, CartPolicy, CartUpdate, CartUpsert, CartView,
};
use storefront_types::domain::change::{ChangeEvent, ChangeKind, Table};
use storefront_types::domain::product::Product;
use storefront_types::ports::cart_repository::CartRepository;
use storefront_types::ports::product_repository::ProductRepository;
use uuid::Uuid;

pub struct CartService<R>
where
    R: CartRepository + ProductRepository,
{
    repo: Arc<R>,
    policy: CartPolicy,
    changes: ChangeFeed,
}

impl<R> CartService<R>
where
    R: CartRepository + ProductRepository,
{
    pub fn new(repo: Arc<R>, policy: CartPolicy, changes: ChangeFeed) -> Self {
        Self {
            repo,
            policy,
            changes,
        }
    }

    async fn orderable_product(&self, product_id: Uuid) -> Result<Product, AppError> {
        match self.repo.get_product(product_id).await? {
            Some(p) if p.is_active => Ok(p),
            _ => Err(AppError::NotFound(format!("product {}", product_id))),
        }
    }

    /// Adds `quantity` of a product to the user's cart, creating the line or
    /// incrementing it in one store operation.
    pub async fn add_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i64,
    ) -> Result<CartUpdate, AppError> {
        let product = self.orderable_product(product_id).await?;
        let quantity = self
            .policy
            .clamp(&product, quantity)
            .ok_or(AppError::OutOfStock(product_id))?;

        let CartUpsert { line, inserted } = self
            .repo
            .upsert_cart_line(
                user_id,
                product_id,
                quantity,
                self.policy.increment_cap(&product),
            )
            .await?;

        // The row is committed; subscribers hear about it even if the count read fails.
        let kind = if inserted {
            ChangeKind::Insert
        } else {
            ChangeKind::Update
        };
        self.changes.publish(ChangeEvent::new(
            Table::CartItems,
            kind,
            user_id,
            Some(line.id),
        ));

        let line_count = self.repo.count_cart_lines(user_id).await?;
        tracing::info!(%user_id, %product_id, quantity = line.quantity, line_count, "cart line upserted");
        Ok(CartUpdate { line, line_count })
    }

    /// Sets a line to an absolute quantity, clamped the same way as an add.
    pub async fn set_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i64,
    ) -> Result<CartLine, AppError> {
        let product = self.orderable_product(product_id).await?;
        let quantity = self
            .policy
            .clamp(&product, quantity)
            .ok_or(AppError::OutOfStock(product_id))?;

        let line = self
            .repo
            .set_cart_quantity(user_id, product_id, quantity)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("cart line for product {}", product_id)))?;
        self.changes.publish(ChangeEvent::new(
            Table::CartItems,
            ChangeKind::Update,
            user_id,
            Some(line.id),
        ));
        Ok(line)
    }

    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<(), AppError> {
        let removed = self.repo.remove_cart_line(user_id, product_id).await?;
        if !removed {
            return Err(AppError::NotFound(format!(
                "cart line for product {}",
                product_id
            )));
        }
        self.changes.publish(ChangeEvent::new(
            Table::CartItems,
            ChangeKind::Delete,
            user_id,
            None,
        ));
        Ok(())
    }

    /// Lines joined with their products. Lines pointing at a missing or
    /// retired product are left out.
    pub async fn cart(&self, user_id: Uuid) -> Result<CartView, AppError> {
        let lines = self.repo.list_cart_lines(user_id).await?;
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            match self.repo.get_product(line.product_id).await? {
                Some(product) if product.is_active => items.push(CartItem { line, product }),
                _ => tracing::warn!(%user_id, product_id = %line.product_id, "cart line without orderable product"),
            }
        }
        Ok(CartView::new(items))
    }

    pub async fn line_count(&self, user_id: Uuid) -> Result<u64, AppError> {
        Ok(self.repo.count_cart_lines(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_repo::memory::InMemoryRepo;
    use storefront_types::domain::catalog::{CatalogPage, CatalogSearch};
    use storefront_types::domain::product::Category;
    use storefront_types::ports::RepoError;

    async fn setup(stock: u32, policy: CartPolicy) -> (CartService<InMemoryRepo>, Arc<InMemoryRepo>, Product) {
        let repo = Arc::new(InMemoryRepo::new());
        let product = Product::new("Mug".into(), None, Category::Home, 800, stock).unwrap();
        repo.create_product(product.clone()).await.unwrap();
        let svc = CartService::new(repo.clone(), policy, ChangeFeed::default());
        (svc, repo, product)
    }

    #[tokio::test]
    async fn repeat_add_increments_single_line() {
        let (svc, _, product) = setup(50, CartPolicy::default()).await;
        let user = Uuid::new_v4();

        let first = svc.add_to_cart(user, product.id, 2).await.unwrap();
        assert_eq!(first.line_count, 1);
        let second = svc.add_to_cart(user, product.id, 3).await.unwrap();
        assert_eq!(second.line.quantity, 5);
        assert_eq!(second.line.id, first.line.id);
        assert_eq!(second.line_count, 1);
    }

    #[tokio::test]
    async fn out_of_stock_add_writes_nothing() {
        let (svc, repo, product) = setup(0, CartPolicy::default()).await;
        let user = Uuid::new_v4();

        let res = svc.add_to_cart(user, product.id, 1).await;
        assert!(matches!(res, Err(AppError::OutOfStock(_))));
        assert_eq!(repo.count_cart_lines(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn quantities_are_clamped() {
        let (svc, _, product) = setup(5, CartPolicy::default()).await;
        let user = Uuid::new_v4();

        let added = svc.add_to_cart(user, product.id, 0).await.unwrap();
        assert_eq!(added.line.quantity, 1);
        let added = svc.add_to_cart(user, product.id, 40).await.unwrap();
        assert_eq!(added.line.quantity, 5);

        let set = svc.set_quantity(user, product.id, 100).await.unwrap();
        assert_eq!(set.quantity, 5);
    }

    #[tokio::test]
    async fn negative_quantities_clamp_to_one() {
        let (svc, _, product) = setup(5, CartPolicy::default()).await;
        let user = Uuid::new_v4();

        let added = svc.add_to_cart(user, product.id, -1).await.unwrap();
        assert_eq!(added.line.quantity, 1);
        let set = svc.set_quantity(user, product.id, i64::MIN).await.unwrap();
        assert_eq!(set.quantity, 1);
    }

    #[tokio::test]
    async fn increment_can_run_past_cap_when_configured() {
        let policy = CartPolicy {
            clamp_on_increment: false,
            ..Default::default()
        };
        let (svc, _, product) = setup(5, policy).await;
        let user = Uuid::new_v4();

        svc.add_to_cart(user, product.id, 4).await.unwrap();
        let added = svc.add_to_cart(user, product.id, 4).await.unwrap();
        assert_eq!(added.line.quantity, 8);
    }

    #[tokio::test]
    async fn missing_or_retired_products_are_not_found() {
        let (svc, repo, product) = setup(5, CartPolicy::default()).await;
        let user = Uuid::new_v4();
        assert!(matches!(
            svc.add_to_cart(user, Uuid::new_v4(), 1).await,
            Err(AppError::NotFound(_))
        ));

        let mut retired = product.clone();
        retired.is_active = false;
        repo.create_product(retired).await.unwrap();
        assert!(matches!(
            svc.add_to_cart(user, product.id, 1).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cart_view_and_removal() {
        let (svc, repo, product) = setup(10, CartPolicy::default()).await;
        let user = Uuid::new_v4();
        svc.add_to_cart(user, product.id, 3).await.unwrap();

        let ghost = Product::new("Ghost".into(), None, Category::Food, 100, 3).unwrap();
        repo.create_product(ghost.clone()).await.unwrap();
        svc.add_to_cart(user, ghost.id, 1).await.unwrap();
        repo.products.remove(&ghost.id);

        let view = svc.cart(user).await.unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.subtotal, 2400);
        assert_eq!(svc.line_count(user).await.unwrap(), 2);

        svc.remove(user, product.id).await.unwrap();
        assert!(matches!(
            svc.remove(user, product.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.set_quantity(user, product.id, 2).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn writes_notify_subscribers() {
        let (svc, _, product) = setup(10, CartPolicy::default()).await;
        let user = Uuid::new_v4();
        let mut sub = svc.changes.subscribe(user);

        svc.add_to_cart(user, product.id, 1).await.unwrap();
        let event = sub.next().await.unwrap();
        assert_eq!(event.table, Table::CartItems);
        assert_eq!(event.kind, ChangeKind::Insert);

        svc.add_to_cart(user, product.id, 1).await.unwrap();
        assert_eq!(sub.next().await.unwrap().kind, ChangeKind::Update);

        svc.remove(user, product.id).await.unwrap();
        assert_eq!(sub.next().await.unwrap().kind, ChangeKind::Delete);
    }

    /// Memory store whose line count always fails.
    struct CountFails(InMemoryRepo);

    #[async_trait::async_trait]
    impl ProductRepository for CountFails {
        async fn create_product(&self, product: Product) -> Result<Product, RepoError> {
            self.0.create_product(product).await
        }

        async fn get_product(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
            self.0.get_product(id).await
        }

        async fn search_products(&self, search: &CatalogSearch) -> Result<CatalogPage, RepoError> {
            self.0.search_products(search).await
        }
    }

    #[async_trait::async_trait]
    impl CartRepository for CountFails {
        async fn upsert_cart_line(
            &self,
            user_id: Uuid,
            product_id: Uuid,
            quantity: u32,
            cap: Option<u32>,
        ) -> Result<CartUpsert, RepoError> {
            self.0
                .upsert_cart_line(user_id, product_id, quantity, cap)
                .await
        }

        async fn list_cart_lines(&self, user_id: Uuid) -> Result<Vec<CartLine>, RepoError> {
            self.0.list_cart_lines(user_id).await
        }

        async fn set_cart_quantity(
            &self,
            user_id: Uuid,
            product_id: Uuid,
            quantity: u32,
        ) -> Result<Option<CartLine>, RepoError> {
            self.0.set_cart_quantity(user_id, product_id, quantity).await
        }

        async fn remove_cart_line(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, RepoError> {
            self.0.remove_cart_line(user_id, product_id).await
        }

        async fn count_cart_lines(&self, _user_id: Uuid) -> Result<u64, RepoError> {
            Err(RepoError::DbError("database is locked".into()))
        }
    }

    #[tokio::test]
    async fn committed_upsert_is_announced_when_count_fails() {
        let inner = InMemoryRepo::new();
        let product = Product::new("Lamp".into(), None, Category::Home, 2500, 4).unwrap();
        inner.create_product(product.clone()).await.unwrap();
        let svc = CartService::new(
            Arc::new(CountFails(inner.clone())),
            CartPolicy::default(),
            ChangeFeed::default(),
        );
        let user = Uuid::new_v4();
        let mut sub = svc.changes.subscribe(user);

        let res = svc.add_to_cart(user, product.id, 1).await;
        assert!(matches!(res, Err(AppError::Store(_))));

        let event = sub.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(inner.list_cart_lines(user).await.unwrap().len(), 1);
    }
}
