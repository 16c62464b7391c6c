//! Shopify Admin REST API access.
//!
//! The pipeline talks to the store through [`Storefront`] so the HTTP client
//! can be swapped for an in-memory catalog in tests.
mod client;
mod link;
mod models;

pub use client::AdminClient;
pub use models::{Download, Image, NewImage, NewProduct, NewVariant, Product};

use anyhow::Result;

/// Catalog operations used by the conversion workflow and the fixtures.
pub trait Storefront {
    /// Every product in the store, following pagination to the end.
    fn list_products(&self) -> Result<Vec<Product>>;

    fn get_product(&self, product_id: u64) -> Result<Product>;

    /// `Content-Type` of an image `src` without parameters, from a HEAD request.
    fn image_content_type(&self, src: &str) -> Result<Option<String>>;

    fn download_image(&self, src: &str) -> Result<Download>;

    fn create_image(&self, product_id: u64, image: &NewImage) -> Result<Image>;

    fn delete_image(&self, product_id: u64, image_id: u64) -> Result<()>;

    fn create_product(&self, product: &NewProduct) -> Result<Product>;

    fn delete_product(&self, product_id: u64) -> Result<()>;
}
