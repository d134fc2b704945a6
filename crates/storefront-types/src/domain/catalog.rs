use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::product::{Category, Product};

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn category(&self) -> Option<Category> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Only(c) => Some(*c),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("all"),
            CategoryFilter::Only(c) => c.fmt(f),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(CategoryFilter::All),
            other => other.parse().map(CategoryFilter::Only),
        }
    }
}

impl TryFrom<String> for CategoryFilter {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CategoryFilter> for String {
    fn from(value: CategoryFilter) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Newest,
    NameAsc,
    PriceAsc,
    PriceDesc,
}

impl SortKey {
    /// Total order for the key; ties fall back to product id.
    pub fn compare(&self, a: &Product, b: &Product) -> Ordering {
        let primary = match self {
            SortKey::Newest => b.created_at.cmp(&a.created_at),
            SortKey::NameAsc => a.name.cmp(&b.name),
            SortKey::PriceAsc => a.price.cmp(&b.price),
            SortKey::PriceDesc => b.price.cmp(&a.price),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Catalog request as it arrives on the wire. Missing fields take defaults in
/// [`CatalogQuery::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub category: CategoryFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl CatalogQuery {
    pub fn resolve(self, default_page_size: u32) -> CatalogSearch {
        let needle = self
            .q
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        CatalogSearch {
            category: self.category,
            needle,
            sort: self.sort,
            page: self.page.unwrap_or(1).max(1),
            page_size: self
                .page_size
                .unwrap_or(default_page_size)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// A normalised catalog query, ready to hand to a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSearch {
    pub category: CategoryFilter,
    /// Lowercased, trimmed, never empty.
    pub needle: Option<String>,
    pub sort: SortKey,
    pub page: u32,
    pub page_size: u32,
}

impl CatalogSearch {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }

    pub fn matches(&self, product: &Product) -> bool {
        if !product.is_active {
            return false;
        }
        if let Some(category) = self.category.category() {
            if product.category != category {
                return false;
            }
        }
        match &self.needle {
            Some(needle) => product.mentions(needle),
            None => true,
        }
    }

    /// Filter, sort and window an already loaded product set.
    pub fn apply<I>(&self, products: I) -> CatalogPage
    where
        I: IntoIterator<Item = Product>,
    {
        let mut matching: Vec<Product> = products.into_iter().filter(|p| self.matches(p)).collect();
        matching.sort_by(|a, b| self.sort.compare(a, b));
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit() as usize)
            .collect();
        CatalogPage::new(items, total, self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPage {
    pub items: Vec<Product>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl CatalogPage {
    pub fn new(items: Vec<Product>, total: u64, search: &CatalogSearch) -> Self {
        let total_pages = total.div_ceil(u64::from(search.page_size));
        Self {
            items,
            total,
            page: search.page,
            page_size: search.page_size,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }
}
