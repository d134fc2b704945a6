use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use storefront_types::domain::cart::{CartLine, CartUpdate, CartView};
use storefront_types::domain::catalog::{CatalogPage, CatalogQuery};
use storefront_types::domain::change::ChangeEvent;
use storefront_types::domain::order::{Order, OrderStatus};
use storefront_types::domain::product::Product;
use uuid::Uuid;

pub const IDENTITY_HEADER: &str = "x-user-id";

/// A non-success response, carrying the server's message and retry hint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status}: {error}")]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub retryable: bool,
}

async fn check(res: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let raw = res.bytes().await.unwrap_or_default();
    let err = match serde_json::from_slice::<ErrorBody>(&raw) {
        Ok(body) => ApiError {
            status,
            error: body.error,
            retryable: body.retryable,
        },
        Err(_) => ApiError {
            status,
            error: String::from_utf8_lossy(&raw).into_owned(),
            retryable: status == StatusCode::SERVICE_UNAVAILABLE,
        },
    };
    Err(err.into())
}

#[derive(Clone)]
pub struct StorefrontClientBuilder {
    base: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
}

/// Typed client for the storefront HTTP API. Cart and order calls need an
/// identity, set with [`StorefrontClientBuilder::with_identity`] or
/// [`StorefrontClient::as_user`].
#[derive(Clone)]
pub struct StorefrontClient {
    base: Url,
    client: reqwest::Client,
    identity: Option<Uuid>,
}

impl StorefrontClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::builder(base_url)?.build()
    }

    pub fn builder(base_url: &str) -> anyhow::Result<StorefrontClientBuilder> {
        let base = Url::parse(base_url).context("invalid base url")?;
        Ok(StorefrontClientBuilder {
            base,
            headers: HeaderMap::new(),
            timeout: None,
            client: None,
        })
    }

    /// Same connection pool, different caller.
    pub fn as_user(&self, user_id: Uuid) -> Self {
        Self {
            identity: Some(user_id),
            ..self.clone()
        }
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        self.base.join(path).context("failed to join url")
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> anyhow::Result<reqwest::RequestBuilder> {
        let user = self.identity.context("no identity set on client")?;
        Ok(req.header(IDENTITY_HEADER, user.to_string()))
    }

    pub async fn search_products(&self, query: &CatalogQuery) -> anyhow::Result<CatalogPage> {
        let res = self
            .client
            .get(self.url("products")?)
            .query(query)
            .send()
            .await?;
        let res = check(res).await?;
        Ok(res.json().await?)
    }

    pub async fn get_product(&self, id: Uuid) -> anyhow::Result<Product> {
        let res = self
            .client
            .get(self.url(&format!("products/{id}"))?)
            .send()
            .await?;
        let res = check(res).await?;
        Ok(res.json().await?)
    }

    pub async fn cart(&self) -> anyhow::Result<CartView> {
        let res = self
            .authed(self.client.get(self.url("cart")?))?
            .send()
            .await?;
        let res = check(res).await?;
        Ok(res.json().await?)
    }

    pub async fn cart_count(&self) -> anyhow::Result<u64> {
        let res = self
            .authed(self.client.get(self.url("cart/count")?))?
            .send()
            .await?;
        let res = check(res).await?;
        let body: CountResponse = res.json().await?;
        Ok(body.count)
    }

    pub async fn add_to_cart(&self, product_id: Uuid, quantity: u32) -> anyhow::Result<CartUpdate> {
        let res = self
            .authed(self.client.post(self.url("cart/items")?))?
            .json(&AddToCartRequest {
                product_id,
                quantity,
            })
            .send()
            .await?;
        let res = check(res).await?;
        Ok(res.json().await?)
    }

    pub async fn set_quantity(&self, product_id: Uuid, quantity: u32) -> anyhow::Result<CartLine> {
        let res = self
            .authed(
                self.client
                    .patch(self.url(&format!("cart/items/{product_id}"))?),
            )?
            .json(&SetQuantityRequest { quantity })
            .send()
            .await?;
        let res = check(res).await?;
        Ok(res.json().await?)
    }

    pub async fn remove_from_cart(&self, product_id: Uuid) -> anyhow::Result<()> {
        let res = self
            .authed(
                self.client
                    .delete(self.url(&format!("cart/items/{product_id}"))?),
            )?
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }

    /// Opens the caller's change stream. Events arrive until the server closes it.
    pub async fn cart_events(&self) -> anyhow::Result<CartEvents> {
        let res = self
            .authed(self.client.get(self.url("cart/events")?))?
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let res = check(res).await?;
        Ok(CartEvents {
            res,
            buf: Vec::new(),
        })
    }

    pub async fn list_orders(&self, status: Option<OrderStatus>) -> anyhow::Result<Vec<Order>> {
        let res = self
            .authed(self.client.get(self.url("orders")?))?
            .query(&OrderListParams { status })
            .send()
            .await?;
        let res = check(res).await?;
        Ok(res.json().await?)
    }

    pub async fn get_order(&self, id: Uuid) -> anyhow::Result<Order> {
        let res = self
            .authed(self.client.get(self.url(&format!("orders/{id}"))?))?
            .send()
            .await?;
        let res = check(res).await?;
        Ok(res.json().await?)
    }
}

impl StorefrontClientBuilder {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(
        mut self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let header_name =
            HeaderName::from_bytes(key.as_ref().as_bytes()).context("invalid header name")?;
        let header_value = HeaderValue::from_str(value.as_ref()).context("invalid header value")?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn with_identity(self, user_id: Uuid) -> anyhow::Result<Self> {
        self.with_header(IDENTITY_HEADER, user_id.to_string())
    }

    pub fn with_reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(mut self) -> anyhow::Result<StorefrontClient> {
        // Identity travels per request so `as_user` can swap it.
        let identity = self
            .headers
            .remove(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok().and_then(|v| Uuid::parse_str(v).ok()));

        if let Some(client) = self.client {
            return Ok(StorefrontClient {
                base: self.base,
                client,
                identity,
            });
        }

        let mut builder = reqwest::Client::builder();
        if !self.headers.is_empty() {
            builder = builder.default_headers(self.headers);
        }
        if let Some(t) = self.timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build()?;
        Ok(StorefrontClient {
            base: self.base,
            client,
            identity,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
struct SetQuantityRequest {
    quantity: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OrderListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<OrderStatus>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct CountResponse {
    count: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ErrorBody {
    error: String,
    retryable: bool,
}

/// Server-sent change events for one user.
pub struct CartEvents {
    res: reqwest::Response,
    buf: Vec<u8>,
}

impl CartEvents {
    /// Next change event, or `None` once the stream ends. Keep-alive comments
    /// are skipped.
    pub async fn next(&mut self) -> anyhow::Result<Option<ChangeEvent>> {
        loop {
            while let Some(end) = self.buf.windows(2).position(|w| w == b"\n\n") {
                let frame: Vec<u8> = self.buf.drain(..end + 2).collect();
                if let Some(event) = parse_frame(&String::from_utf8_lossy(&frame))? {
                    return Ok(Some(event));
                }
            }
            match self.res.chunk().await? {
                Some(chunk) => self.buf.extend_from_slice(&chunk),
                None => return Ok(None),
            }
        }
    }
}

fn parse_frame(frame: &str) -> anyhow::Result<Option<ChangeEvent>> {
    let mut name = None;
    let mut data = Vec::new();
    for line in frame.lines() {
        if let Some(v) = line.strip_prefix("event:") {
            name = Some(v.trim());
        } else if let Some(v) = line.strip_prefix("data:") {
            data.push(v.strip_prefix(' ').unwrap_or(v));
        }
    }
    if data.is_empty() || name.is_some_and(|n| n != "change") {
        return Ok(None);
    }
    let event = serde_json::from_str(&data.join("\n")).context("malformed change event")?;
    Ok(Some(event))
}
