use serde_json::json;
use storefront_client::{ApiError, StorefrontClient};
use storefront_hex::application::storefront::Storefront;
use storefront_hex::inbound::http::{HttpServer, HttpServerConfig};
use storefront_repo::build_repo;
use storefront_types::domain::cart::CartPolicy;
use storefront_types::domain::catalog::{CatalogQuery, CategoryFilter, SortKey};
use storefront_types::domain::change::ChangeKind;
use storefront_types::domain::order::{Order, OrderStatus};
use storefront_types::domain::product::{Category, Product};
use storefront_types::ports::order_repository::OrderRepository;
use storefront_types::ports::product_repository::ProductRepository;
use uuid::Uuid;

fn find_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

// Client against a live server backed by a file SQLite store.
#[tokio::test]
async fn client_drives_live_server() {
    let tmp = tempfile::tempdir().unwrap();
    let db_url = format!("sqlite://{}", tmp.path().join("storefront.db").display());
    let repo = build_repo(Some(&db_url)).await.unwrap();

    let mut products = Vec::new();
    for (name, category, price, stock) in [
        ("Tent", Category::Sports, 20000, 2),
        ("Stove", Category::Sports, 6000, 10),
        ("Lipstick", Category::Beauty, 1800, 30),
    ] {
        let p = Product::new(name.into(), None, category, price, stock).unwrap();
        products.push(repo.create_product(p).await.unwrap());
    }
    let user = Uuid::new_v4();
    let order = Order::new(user, 26000, json!({ "city": "Bergen" }), None)
        .unwrap()
        .with_status(OrderStatus::Delivered);
    repo.create_order(order.clone()).await.unwrap();

    let port = find_free_port();
    let server = HttpServer::new(
        Storefront::new(repo, 12, CartPolicy::default()),
        HttpServerConfig {
            port: port.to_string(),
        },
    )
    .await
    .unwrap();
    let handle = tokio::spawn(async move {
        server.run().await.expect("server run");
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let client = StorefrontClient::new(&format!("http://127.0.0.1:{port}/")).unwrap();
    let page = client
        .search_products(&CatalogQuery {
            category: CategoryFilter::Only(Category::Sports),
            sort: SortKey::PriceAsc,
            ..Default::default()
        })
        .await
        .unwrap();
    let names: Vec<_> = page.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Stove", "Tent"]);

    let shopper = client.as_user(user);
    let tent = &products[0];
    let mut events = shopper.cart_events().await.unwrap();
    let first = shopper.add_to_cart(tent.id, 1).await.unwrap();
    let event = tokio::time::timeout(std::time::Duration::from_secs(5), events.next())
        .await
        .expect("change event within timeout")
        .unwrap()
        .unwrap();
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.row_id, Some(first.line.id));

    let update = shopper.add_to_cart(tent.id, 5).await.unwrap();
    // Held at stock.
    assert_eq!(update.line.quantity, 2);
    assert_eq!(update.line_count, 1);

    let line = shopper.set_quantity(tent.id, 1).await.unwrap();
    assert_eq!(line.quantity, 1);
    let view = shopper.cart().await.unwrap();
    assert_eq!(view.subtotal, 20000);

    shopper.remove_from_cart(tent.id).await.unwrap();
    assert_eq!(shopper.cart_count().await.unwrap(), 0);

    let delivered = shopper
        .list_orders(Some(OrderStatus::Delivered))
        .await
        .unwrap();
    assert_eq!(delivered.len(), 1);
    let fetched = shopper.get_order(order.id).await.unwrap();
    assert_eq!(fetched.shipping_address["city"], "Bergen");

    let stranger = client.as_user(Uuid::new_v4());
    let err = stranger.get_order(order.id).await.unwrap_err();
    let api = err.downcast_ref::<ApiError>().unwrap();
    assert_eq!(api.status.as_u16(), 404);
    assert!(!api.retryable);

    handle.abort();
}
