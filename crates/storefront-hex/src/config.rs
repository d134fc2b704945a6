use anyhow::Context;
use std::env;
use storefront_types::domain::cart::{CartPolicy, MAX_LINE_QUANTITY};
use storefront_types::domain::catalog::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: String,
    pub database_url: Option<String>,
    pub catalog_page_size: u32,
    pub cart: CartPolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_port = lookup("SERVER_PORT").unwrap_or_else(|| "3000".into());
        let database_url = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty());

        let catalog_page_size = parse_or(&lookup, "CATALOG_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if !(1..=MAX_PAGE_SIZE).contains(&catalog_page_size) {
            anyhow::bail!("CATALOG_PAGE_SIZE must be within 1..={MAX_PAGE_SIZE}");
        }

        let max_line_quantity = parse_or(&lookup, "CART_MAX_LINE_QUANTITY", MAX_LINE_QUANTITY)?;
        if max_line_quantity == 0 {
            anyhow::bail!("CART_MAX_LINE_QUANTITY must be >= 1");
        }
        let clamp_on_increment = parse_or(&lookup, "CART_CLAMP_ON_INCREMENT", true)?;

        Ok(Self {
            server_port,
            database_url,
            catalog_page_size,
            cart: CartPolicy {
                max_line_quantity,
                clamp_on_increment,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
