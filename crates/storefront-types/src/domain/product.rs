use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Electronics,
    Clothing,
    Books,
    Food,
    Sports,
    Beauty,
    Home,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Electronics,
        Category::Clothing,
        Category::Books,
        Category::Food,
        Category::Sports,
        Category::Beauty,
        Category::Home,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Electronics => "electronics",
            Category::Clothing => "clothing",
            Category::Books => "books",
            Category::Food => "food",
            Category::Sports => "sports",
            Category::Beauty => "beauty",
            Category::Home => "home",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown category: {s}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    /// Price in the smallest currency unit.
    pub price: i64,
    pub stock_quantity: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        name: String,
        description: Option<String>,
        category: Category,
        price: i64,
        stock_quantity: u32,
    ) -> anyhow::Result<Self> {
        if name.trim().is_empty() {
            anyhow::bail!("product name empty");
        }
        if price < 0 {
            anyhow::bail!("product price must be >= 0");
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            description,
            category,
            price,
            stock_quantity,
            is_active: true,
            created_at: Utc::now(),
        })
    }

    pub fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// Case-insensitive substring match on name or description. `needle` must
    /// already be lowercase.
    pub fn mentions(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(needle))
    }
}
