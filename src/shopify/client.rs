//! Blocking Admin API client over `ureq`.
//!
//! Authentication uses the private-app password as an access token header.
//! Non-2xx responses become errors carrying the status and a truncated body;
//! HTTP 429 is retried a bounded number of times, honouring `Retry-After`.
use super::link::link_target;
use super::models::{
    Download, Image, ImageEnvelope, NewImage, NewImageEnvelope, NewProduct, NewProductEnvelope,
    Product, ProductEnvelope, ProductsEnvelope,
};
use super::Storefront;
use crate::config::StoreConfig;
use crate::util::{media_type, truncate_string};
use anyhow::{anyhow, Context, Result};
use std::time::{Duration, Instant};
use ureq::http::{Response, StatusCode};
use ureq::{Agent, Body};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
/// Largest page the products endpoint serves.
const PAGE_LIMIT: u32 = 250;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RATE_LIMIT_RETRIES: usize = 3;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(2);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);
const MAX_IMAGE_BYTES: u64 = 64 * 1024 * 1024;
const ERROR_BODY_LIMIT: usize = 500;

pub struct AdminClient {
    agent: Agent,
    api_base: String,
    access_token: String,
}

impl AdminClient {
    pub fn new(store: &StoreConfig) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build();
        Self {
            agent: Agent::new_with_config(config),
            api_base: store.api_base(),
            access_token: store.access_token.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn admin_get(&self, url: &str) -> Result<Response<Body>> {
        let response = self.send("GET", url, || {
            self.agent
                .get(url)
                .header(ACCESS_TOKEN_HEADER, self.access_token.as_str())
                .header("Accept", "application/json")
                .call()
        })?;
        ensure_success("GET", url, response)
    }

    fn admin_delete(&self, url: &str) -> Result<()> {
        let response = self.send("DELETE", url, || {
            self.agent
                .delete(url)
                .header(ACCESS_TOKEN_HEADER, self.access_token.as_str())
                .call()
        })?;
        ensure_success("DELETE", url, response)?;
        Ok(())
    }

    fn admin_post<T: serde::Serialize>(&self, url: &str, body: &T) -> Result<Response<Body>> {
        let response = self.send("POST", url, || {
            self.agent
                .post(url)
                .header(ACCESS_TOKEN_HEADER, self.access_token.as_str())
                .header("Accept", "application/json")
                .send_json(body)
        })?;
        ensure_success("POST", url, response)
    }

    /// Issue a request, retrying while the store answers 429.
    fn send<F>(&self, method: &str, url: &str, call: F) -> Result<Response<Body>>
    where
        F: Fn() -> Result<Response<Body>, ureq::Error>,
    {
        let mut retries = 0;
        loop {
            let start = Instant::now();
            let response = call().with_context(|| format!("{method} {url}"))?;
            tracing::debug!(
                method,
                url,
                status = response.status().as_u16(),
                elapsed_ms = start.elapsed().as_millis(),
                "admin request complete"
            );
            if response.status() != StatusCode::TOO_MANY_REQUESTS
                || retries >= MAX_RATE_LIMIT_RETRIES
            {
                return Ok(response);
            }
            retries += 1;
            let wait = retry_after(&response);
            tracing::warn!(
                method,
                url,
                retry = retries,
                wait_ms = wait.as_millis(),
                "rate limited, backing off"
            );
            std::thread::sleep(wait);
        }
    }
}

impl Storefront for AdminClient {
    fn list_products(&self) -> Result<Vec<Product>> {
        let mut products = Vec::new();
        let mut next = Some(self.endpoint(&format!("products.json?limit={PAGE_LIMIT}")));
        let mut page = 0;
        while let Some(url) = next.take() {
            page += 1;
            let mut response = self.admin_get(&url)?;
            next = header_str(&response, "link").and_then(|value| link_target(value, "next"));
            let envelope: ProductsEnvelope = response
                .body_mut()
                .read_json()
                .with_context(|| format!("decode products page {page}"))?;
            tracing::debug!(page, count = envelope.products.len(), "fetched products page");
            products.extend(envelope.products);
        }
        Ok(products)
    }

    fn get_product(&self, product_id: u64) -> Result<Product> {
        let url = self.endpoint(&format!("products/{product_id}.json"));
        let mut response = self.admin_get(&url)?;
        let envelope: ProductEnvelope = response
            .body_mut()
            .read_json()
            .with_context(|| format!("decode product {product_id}"))?;
        Ok(envelope.product)
    }

    fn image_content_type(&self, src: &str) -> Result<Option<String>> {
        let response = self.send("HEAD", src, || self.agent.head(src).call())?;
        let response = ensure_success("HEAD", src, response)?;
        Ok(header_str(&response, "content-type").map(media_type))
    }

    fn download_image(&self, src: &str) -> Result<Download> {
        let mut response = self.send("GET", src, || self.agent.get(src).call())?;
        if response.status() != StatusCode::OK {
            return Err(anyhow!(
                "error getting {src}: status {}",
                response.status().as_u16()
            ));
        }
        let canonical_url =
            header_str(&response, "link").and_then(|value| link_target(value, "canonical"));
        let bytes = response
            .body_mut()
            .with_config()
            .limit(MAX_IMAGE_BYTES)
            .read_to_vec()
            .with_context(|| format!("read image body {src}"))?;
        Ok(Download {
            bytes,
            canonical_url,
        })
    }

    fn create_image(&self, product_id: u64, image: &NewImage) -> Result<Image> {
        let url = self.endpoint(&format!("products/{product_id}/images.json"));
        let mut response = self.admin_post(&url, &NewImageEnvelope { image })?;
        let envelope: ImageEnvelope = response
            .body_mut()
            .read_json()
            .with_context(|| format!("decode created image for product {product_id}"))?;
        Ok(envelope.image)
    }

    fn delete_image(&self, product_id: u64, image_id: u64) -> Result<()> {
        let url = self.endpoint(&format!("products/{product_id}/images/{image_id}.json"));
        self.admin_delete(&url)
    }

    fn create_product(&self, product: &NewProduct) -> Result<Product> {
        let url = self.endpoint("products.json");
        let mut response = self.admin_post(&url, &NewProductEnvelope { product })?;
        let envelope: ProductEnvelope = response
            .body_mut()
            .read_json()
            .context("decode created product")?;
        Ok(envelope.product)
    }

    fn delete_product(&self, product_id: u64) -> Result<()> {
        let url = self.endpoint(&format!("products/{product_id}.json"));
        self.admin_delete(&url)
    }
}

fn header_str<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

fn ensure_success(method: &str, url: &str, mut response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.body_mut().read_to_string().unwrap_or_default();
    let body = truncate_string(body.trim(), ERROR_BODY_LIMIT);
    if body.is_empty() {
        Err(anyhow!("{method} {url} failed with status {}", status.as_u16()))
    } else {
        Err(anyhow!(
            "{method} {url} failed with status {}: {body}",
            status.as_u16()
        ))
    }
}

fn retry_after(response: &Response<Body>) -> Duration {
    header_str(response, "retry-after")
        .and_then(parse_retry_after)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Shopify sends fractional seconds, e.g. `2.0`.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(
        seconds.min(MAX_RETRY_AFTER.as_secs_f64()),
    ))
}
