use storefront_hex::application::storefront::Storefront;
use storefront_hex::config::Config;
use storefront_hex::inbound::http::{HttpServer, HttpServerConfig};
use storefront_repo::{build_repo, Repo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for DATABASE_URL / SERVER_PORT / CART_* when present.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,storefront_hex=debug".to_string()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        port = %config.server_port,
        page_size = config.catalog_page_size,
        max_line_quantity = config.cart.max_line_quantity,
        clamp_on_increment = config.cart.clamp_on_increment,
        "configuration loaded"
    );
    let repo: Repo = build_repo(config.database_url.as_deref()).await?;
    let storefront = Storefront::from_config(repo, &config);

    let server_cfg = HttpServerConfig {
        port: config.server_port.clone(),
    };

    let http = HttpServer::new(storefront, server_cfg).await?;
    http.run().await
}
