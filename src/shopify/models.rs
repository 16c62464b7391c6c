//! Admin REST API resources.
//!
//! Only the fields the workflow reads are typed; everything else is carried in
//! `extra` so backups keep the full record as the store returned it.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: u64,
    #[serde(default)]
    pub product_id: u64,
    #[serde(default)]
    pub position: u32,
    pub src: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub variant_ids: Vec<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST products/<id>/images.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewImage {
    /// Base64-encoded image bytes.
    pub attachment: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variant_ids: Vec<u64>,
}

/// Body of `POST products.json`, used for sandbox fixtures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProduct {
    pub title: String,
    pub body_html: String,
    pub tags: String,
    pub variants: Vec<NewVariant>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<NewImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewVariant {
    pub price: String,
}

/// Bytes fetched from an image `src`.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    /// Target of a `Link: <...>; rel="canonical"` response header.
    pub canonical_url: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct ProductsEnvelope {
    pub(crate) products: Vec<Product>,
}

#[derive(Deserialize)]
pub(crate) struct ProductEnvelope {
    pub(crate) product: Product,
}

#[derive(Deserialize)]
pub(crate) struct ImageEnvelope {
    pub(crate) image: Image,
}

#[derive(Serialize)]
pub(crate) struct NewImageEnvelope<'a> {
    pub(crate) image: &'a NewImage,
}

#[derive(Serialize)]
pub(crate) struct NewProductEnvelope<'a> {
    pub(crate) product: &'a NewProduct,
}
