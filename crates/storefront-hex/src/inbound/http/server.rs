use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, patch, post},
    serve, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::extract::{ApiJson, ApiQuery};
use super::identity::Identity;
use crate::application::storefront::Storefront;
use crate::errors::AppError;
use storefront_types::domain::cart::{CartLine, CartUpdate, CartView};
use storefront_types::domain::catalog::{CatalogPage, CatalogQuery};
use storefront_types::domain::order::{Order, OrderStatus};
use storefront_types::domain::product::Product;
use storefront_types::ports::StoreRepository;

#[derive(Clone)]
pub struct HttpServerConfig {
    pub port: String,
}

#[derive(Clone)]
pub struct HttpServer<R>
where
    R: StoreRepository,
{
    pub storefront: Arc<Storefront<R>>,
    pub config: HttpServerConfig,
}

type AppState<R> = State<Arc<Storefront<R>>>;

fn one() -> i64 {
    1
}

// Quantities are taken as signed and clamped by the cart policy.
#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct OrderListParams {
    pub status: Option<OrderStatus>,
}

#[derive(Serialize)]
struct CountResponse {
    count: u64,
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

impl<R> HttpServer<R>
where
    R: StoreRepository,
{
    pub async fn new(storefront: Storefront<R>, config: HttpServerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            storefront: Arc::new(storefront),
            config,
        })
    }

    pub fn router(&self) -> Router {
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http_request",
                    %request_id,
                    method = %request.method(),
                    uri
                )
            })
            .on_request(
                |request: &axum::extract::Request<_>, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        method = %request.method(),
                        uri = %request.uri(),
                        "request"
                    );
                },
            )
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        status = %response.status(),
                        latency_ms = %latency.as_millis(),
                        "response"
                    );
                },
            );

        Router::new()
            .route("/health", get(health))
            .route("/products", get(search_products::<R>))
            .route("/products/{id}", get(get_product::<R>))
            .route("/cart", get(get_cart::<R>))
            .route("/cart/count", get(cart_count::<R>))
            .route("/cart/events", get(cart_events::<R>))
            .route("/cart/items", post(add_to_cart::<R>))
            .route(
                "/cart/items/{product_id}",
                patch(set_quantity::<R>).delete(remove_from_cart::<R>),
            )
            .route("/orders", get(list_orders::<R>))
            .route("/orders/{id}", get(get_order::<R>))
            .layer(trace_layer)
            .with_state(self.storefront.clone())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app = self.router();
        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse()?;
        tracing::info!("starting server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn search_products<R: StoreRepository>(
    State(storefront): AppState<R>,
    ApiQuery(query): ApiQuery<CatalogQuery>,
) -> Result<Json<CatalogPage>, AppError> {
    let page = storefront.catalog.search(query).await?;
    Ok(Json(page))
}

async fn get_product<R: StoreRepository>(
    State(storefront): AppState<R>,
    Path(id): Path<String>,
) -> Result<Json<Product>, AppError> {
    let product = storefront.catalog.get_product(parse_id(&id)?).await?;
    Ok(Json(product))
}

async fn get_cart<R: StoreRepository>(
    State(storefront): AppState<R>,
    Identity(user_id): Identity,
) -> Result<Json<CartView>, AppError> {
    Ok(Json(storefront.cart.cart(user_id).await?))
}

async fn cart_count<R: StoreRepository>(
    State(storefront): AppState<R>,
    Identity(user_id): Identity,
) -> Result<Json<CountResponse>, AppError> {
    let count = storefront.cart.line_count(user_id).await?;
    Ok(Json(CountResponse { count }))
}

async fn add_to_cart<R: StoreRepository>(
    State(storefront): AppState<R>,
    Identity(user_id): Identity,
    ApiJson(payload): ApiJson<AddToCartRequest>,
) -> Result<Json<CartUpdate>, AppError> {
    let update = storefront
        .cart
        .add_to_cart(user_id, payload.product_id, payload.quantity)
        .await?;
    Ok(Json(update))
}

async fn set_quantity<R: StoreRepository>(
    State(storefront): AppState<R>,
    Identity(user_id): Identity,
    Path(product_id): Path<String>,
    ApiJson(payload): ApiJson<SetQuantityRequest>,
) -> Result<Json<CartLine>, AppError> {
    let line = storefront
        .cart
        .set_quantity(user_id, parse_id(&product_id)?, payload.quantity)
        .await?;
    Ok(Json(line))
}

async fn remove_from_cart<R: StoreRepository>(
    State(storefront): AppState<R>,
    Identity(user_id): Identity,
    Path(product_id): Path<String>,
) -> Result<StatusCode, AppError> {
    storefront
        .cart
        .remove(user_id, parse_id(&product_id)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cart_events<R: StoreRepository>(
    State(storefront): AppState<R>,
    Identity(user_id): Identity,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = storefront.changes.subscribe(user_id);
    let stream = async_stream::stream! {
        while let Some(change) = subscription.next().await {
            let json = serde_json::to_string(&change).unwrap_or_else(|_| {
                r#"{"kind":"resync"}"#.to_string()
            });
            yield Ok(Event::default().event("change").data(json));
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn list_orders<R: StoreRepository>(
    State(storefront): AppState<R>,
    Identity(user_id): Identity,
    ApiQuery(params): ApiQuery<OrderListParams>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = storefront.orders.list_orders(user_id, params.status).await?;
    Ok(Json(orders))
}

async fn get_order<R: StoreRepository>(
    State(storefront): AppState<R>,
    Identity(user_id): Identity,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order = storefront.orders.get_order(user_id, parse_id(&id)?).await?;
    Ok(Json(order))
}
