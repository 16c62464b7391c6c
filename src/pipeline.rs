//! The conversion workflow: list, filter, download, back up, convert, replace.
//!
//! Every product is snapshotted before work starts and each product's image
//! list is cloned before iteration, so replacements created mid-run are never
//! revisited. A replacement is created before its original is deleted; when
//! anything fails the run aborts with the original still on the product.
use crate::backup::BackupPaths;
use crate::convert::{verify_jpeg, ImageConverter};
use crate::shopify::{Image, NewImage, Product, Storefront};
use crate::util::{image_filename, is_png_content_type, jpeg_filename};
use anyhow::{Context, Result};
use base64::Engine;
use serde::Serialize;
use std::path::PathBuf;

/// Inputs for a conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub backup_root: PathBuf,
    /// Restrict the run to these products; empty means the whole catalog.
    pub products: Vec<u64>,
    pub dry_run: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct ConversionReport {
    pub products: usize,
    pub images: usize,
    pub converted: usize,
    pub skipped: usize,
    pub dry_run: bool,
    pub items: Vec<ConvertedImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertedImage {
    pub product_id: u64,
    pub original_image_id: u64,
    /// `None` on dry runs.
    pub replacement_image_id: Option<u64>,
    pub position: u32,
    pub filename: String,
    pub backup_path: PathBuf,
}

#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub products: usize,
    pub images: Vec<ScannedImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannedImage {
    pub product_id: u64,
    pub product_title: String,
    pub image_id: u64,
    pub position: u32,
    pub src: String,
    pub content_type: Option<String>,
    pub is_png: bool,
}

impl ScanReport {
    pub fn png_count(&self) -> usize {
        self.images.iter().filter(|image| image.is_png).count()
    }
}

/// Convert every PNG image in the catalog (or the selected products).
pub fn convert_all_products(
    store: &dyn Storefront,
    converter: &dyn ImageConverter,
    options: &ConvertOptions,
) -> Result<ConversionReport> {
    let products = load_products(store, &options.products)?;
    let backups = BackupPaths::new(options.backup_root.clone());
    tracing::info!(
        products = products.len(),
        backup_root = %backups.root().display(),
        dry_run = options.dry_run,
        "starting conversion"
    );

    let mut report = ConversionReport {
        dry_run: options.dry_run,
        ..ConversionReport::default()
    };
    for product in &products {
        convert_product_images(
            store,
            converter,
            &backups,
            product,
            options.dry_run,
            &mut report,
        )
        .with_context(|| format!("convert images for product {}", product.id))?;
        report.products += 1;
    }

    tracing::info!(
        products = report.products,
        images = report.images,
        converted = report.converted,
        skipped = report.skipped,
        "conversion complete"
    );
    Ok(report)
}

/// Convert the PNG images of one product, recording results in `report`.
pub fn convert_product_images(
    store: &dyn Storefront,
    converter: &dyn ImageConverter,
    backups: &BackupPaths,
    product: &Product,
    dry_run: bool,
    report: &mut ConversionReport,
) -> Result<()> {
    let images: Vec<Image> = product.images.clone();
    for image in &images {
        report.images += 1;
        let content_type = store
            .image_content_type(&image.src)
            .with_context(|| format!("inspect {}", image.src))?;
        if !is_png_content_type(content_type.as_deref()) {
            tracing::info!(
                product_id = product.id,
                src = %image.src,
                content_type = content_type.as_deref().unwrap_or("unknown"),
                "not a PNG, skipping"
            );
            report.skipped += 1;
            continue;
        }

        tracing::info!(product_id = product.id, src = %image.src, "converting");
        let converted = convert_image(store, converter, backups, product.id, image, dry_run)?;
        report.converted += 1;
        report.items.push(converted);
    }
    Ok(())
}

fn convert_image(
    store: &dyn Storefront,
    converter: &dyn ImageConverter,
    backups: &BackupPaths,
    product_id: u64,
    image: &Image,
    dry_run: bool,
) -> Result<ConvertedImage> {
    let download = store.download_image(&image.src)?;
    let filename = image_filename(download.canonical_url.as_deref(), &image.src, image.id);

    let metadata_path = backups.write_image_metadata(product_id, image)?;
    tracing::debug!(path = %metadata_path.display(), "saved image JSON");
    let png_path = backups.write_original(product_id, &filename, &download.bytes)?;
    tracing::debug!(path = %png_path.display(), bytes = download.bytes.len(), "saved PNG");

    let jpg_path = backups.converted_path(product_id, &filename)?;
    converter
        .convert(&png_path, &jpg_path)
        .with_context(|| format!("convert {}", png_path.display()))?;
    let jpg_bytes = verify_jpeg(&jpg_path)?;

    let replacement_image_id = if dry_run {
        tracing::info!(
            product_id,
            image_id = image.id,
            path = %jpg_path.display(),
            "dry run, leaving store untouched"
        );
        None
    } else {
        let replacement = store
            .create_image(product_id, &replacement_for(image, &filename, &jpg_bytes))
            .with_context(|| format!("upload replacement for image {}", image.id))?;
        store
            .delete_image(product_id, image.id)
            .with_context(|| format!("delete original image {}", image.id))?;
        tracing::info!(
            product_id,
            original = image.id,
            replacement = replacement.id,
            position = image.position,
            "replaced image"
        );
        Some(replacement.id)
    };

    Ok(ConvertedImage {
        product_id,
        original_image_id: image.id,
        replacement_image_id,
        position: image.position,
        filename: jpeg_filename(&filename),
        backup_path: png_path,
    })
}

/// The upload that stands in for `image`: same slot, alt text and variants.
fn replacement_for(image: &Image, filename: &str, jpg_bytes: &[u8]) -> NewImage {
    NewImage {
        attachment: base64::engine::general_purpose::STANDARD.encode(jpg_bytes),
        filename: jpeg_filename(filename),
        position: (image.position > 0).then_some(image.position),
        alt: image.alt.clone(),
        variant_ids: image.variant_ids.clone(),
    }
}

fn load_products(store: &dyn Storefront, product_ids: &[u64]) -> Result<Vec<Product>> {
    if product_ids.is_empty() {
        return store.list_products().context("list products");
    }
    product_ids
        .iter()
        .map(|&id| {
            store
                .get_product(id)
                .with_context(|| format!("get product {id}"))
        })
        .collect()
}

/// Report every image and whether it is PNG, without changing the store.
pub fn scan_products(store: &dyn Storefront) -> Result<ScanReport> {
    let products = store.list_products().context("list products")?;
    let mut report = ScanReport {
        products: products.len(),
        images: Vec::new(),
    };
    for product in &products {
        for image in &product.images {
            let content_type = store
                .image_content_type(&image.src)
                .with_context(|| format!("inspect {}", image.src))?;
            report.images.push(ScannedImage {
                product_id: product.id,
                product_title: product.title.clone(),
                image_id: image.id,
                position: image.position,
                src: image.src.clone(),
                is_png: is_png_content_type(content_type.as_deref()),
                content_type,
            });
        }
    }
    Ok(report)
}
