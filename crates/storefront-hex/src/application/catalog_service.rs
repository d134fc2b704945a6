use crate::errors::AppError;
use std::sync::Arc;
use storefront_types::domain::catalog::{CatalogPage, CatalogQuery};
use storefront_types::domain::product::Product;
use storefront_types::ports::product_repository::ProductRepository;
use uuid::Uuid;

pub struct CatalogService<R: ProductRepository> {
    repo: Arc<R>,
    default_page_size: u32,
}

impl<R: ProductRepository> CatalogService<R> {
    pub fn new(repo: Arc<R>, default_page_size: u32) -> Self {
        Self {
            repo,
            default_page_size,
        }
    }

    pub async fn search(&self, query: CatalogQuery) -> Result<CatalogPage, AppError> {
        let search = query.resolve(self.default_page_size);
        let page = self.repo.search_products(&search).await?;
        tracing::debug!(
            category = %search.category,
            sort = ?search.sort,
            page = search.page,
            total = page.total,
            "catalog search"
        );
        Ok(page)
    }

    /// Active products only; a retired product reads as missing.
    pub async fn get_product(&self, id: Uuid) -> Result<Product, AppError> {
        match self.repo.get_product(id).await? {
            Some(p) if p.is_active => Ok(p),
            _ => Err(AppError::NotFound(format!("product {}", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_repo::memory::InMemoryRepo;
    use storefront_types::domain::catalog::{CategoryFilter, SortKey};
    use storefront_types::domain::product::Category;

    async fn seeded() -> (Arc<InMemoryRepo>, Vec<Product>) {
        let repo = Arc::new(InMemoryRepo::new());
        let mut products = Vec::new();
        for (name, desc, category) in [
            ("Desk Lamp", Some("Warm LED light"), Category::Home),
            ("Headlamp", None, Category::Sports),
            ("Lampshade Book", Some("A novel"), Category::Books),
            ("Toaster", Some("Two slots"), Category::Home),
        ] {
            let p = Product::new(name.into(), desc.map(Into::into), category, 1000, 4).unwrap();
            products.push(repo.create_product(p).await.unwrap());
        }
        (repo, products)
    }

    #[tokio::test]
    async fn text_and_category_filters_combine() {
        let (repo, _) = seeded().await;
        let svc = CatalogService::new(repo, 12);

        let page = svc
            .search(CatalogQuery {
                q: Some("LAMP".into()),
                sort: SortKey::NameAsc,
                ..Default::default()
            })
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Desk Lamp", "Headlamp", "Lampshade Book"]);

        let page = svc
            .search(CatalogQuery {
                category: CategoryFilter::Only(Category::Home),
                q: Some("lamp".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Desk Lamp");
    }

    #[tokio::test]
    async fn default_page_size_applies() {
        let (repo, _) = seeded().await;
        let svc = CatalogService::new(repo, 3);
        let page = svc.search(CatalogQuery::default()).await.unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
    }

    #[tokio::test]
    async fn inactive_product_reads_as_missing() {
        let (repo, products) = seeded().await;
        let mut retired = products[0].clone();
        retired.is_active = false;
        repo.create_product(retired.clone()).await.unwrap();

        let svc = CatalogService::new(repo, 12);
        assert!(matches!(
            svc.get_product(retired.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(svc.get_product(products[1].id).await.is_ok());
        assert!(matches!(
            svc.get_product(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
