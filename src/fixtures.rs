//! Sandbox fixtures: random products with generated PNG images, and a purge.
//!
//! Callers gate both operations with [`require_sandbox`].
use crate::convert::run_tool;
use crate::shopify::{NewImage, NewProduct, NewVariant, Storefront};
use anyhow::{anyhow, Context, Result};
use base64::Engine;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::path::Path;

pub const WORDS_FILE: &str = "/usr/share/dict/american-english";
const IMAGE_SIZE: &str = "1024x768";
const MAX_IMAGES_PER_PRODUCT: u32 = 4;
const TITLE_WORDS: usize = 3;
const FIXTURE_TAGS: &str = "bits and bobs, hats";
const FIXTURE_BODY: &str = "<p>Hat in Grey. 100% Alpaca.</p>";

/// Renders a numbered PNG for a fixture image.
pub trait FixtureImages {
    fn render(&self, label: u32, output: &Path) -> Result<()>;
}

/// Draws `label` centred on a random solid colour with ImageMagick.
pub struct MagickFixtureImages {
    program: String,
}

impl MagickFixtureImages {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl FixtureImages for MagickFixtureImages {
    fn render(&self, label: u32, output: &Path) -> Result<()> {
        let mut rng = rand::thread_rng();
        let (r, g, b): (u8, u8, u8) = (rng.gen(), rng.gen(), rng.gen());
        let args = vec![
            "-size".to_string(),
            IMAGE_SIZE.to_string(),
            format!("xc:rgb({r}, {g}, {b})"),
            "-gravity".to_string(),
            "center".to_string(),
            "-pointsize".to_string(),
            "200".to_string(),
            "-draw".to_string(),
            format!("text 0,0 '{label}'"),
            format!("png:{}", output.display()),
        ];
        run_tool(&self.program, &args)
    }
}

pub fn require_sandbox(sandbox: bool, action: &str) -> Result<()> {
    if !sandbox {
        return Err(anyhow!(
            "{action} only runs against the sandbox store; pass --sandbox"
        ));
    }
    Ok(())
}

/// Create `count` random products, returning their ids.
pub fn seed_products(
    store: &dyn Storefront,
    images: &dyn FixtureImages,
    count: usize,
) -> Result<Vec<u64>> {
    let words = load_words(Path::new(WORDS_FILE));
    let scratch = tempfile::tempdir().context("create fixture scratch dir")?;
    let mut rng = rand::thread_rng();
    let mut created = Vec::with_capacity(count);

    for index in 0..count {
        let title = random_title(&words, index, &mut rng);
        let image_count = rng.gen_range(1..=MAX_IMAGES_PER_PRODUCT);
        let mut new_images = Vec::new();
        for position in 1..=image_count {
            let path = scratch.path().join(format!("IMG_{index}_{position}.png"));
            images
                .render(position, &path)
                .with_context(|| format!("render fixture image {position}"))?;
            let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            new_images.push(NewImage {
                attachment: base64::engine::general_purpose::STANDARD.encode(bytes),
                filename: format!("IMG_{position}.png"),
                position: Some(position),
                alt: None,
                variant_ids: Vec::new(),
            });
        }

        let product = NewProduct {
            title,
            body_html: FIXTURE_BODY.to_string(),
            tags: FIXTURE_TAGS.to_string(),
            variants: vec![NewVariant {
                price: format!("{}.00", rng.gen_range(1..=100)),
            }],
            images: new_images,
        };
        let saved = store
            .create_product(&product)
            .with_context(|| format!("create fixture product {:?}", product.title))?;
        tracing::info!(
            product_id = saved.id,
            title = %saved.title,
            images = image_count,
            "created fixture product"
        );
        created.push(saved.id);
    }
    Ok(created)
}

/// Delete every product in the store, returning how many were removed.
pub fn purge_products(store: &dyn Storefront) -> Result<usize> {
    let products = store.list_products().context("list products")?;
    for product in &products {
        store
            .delete_product(product.id)
            .with_context(|| format!("delete product {}", product.id))?;
        tracing::info!(product_id = product.id, "deleted product");
    }
    Ok(products.len())
}

fn load_words(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(raw) => raw
            .lines()
            .map(str::trim)
            .filter(|word| !word.is_empty())
            .map(str::to_string)
            .collect(),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "no word list, using numeric titles");
            Vec::new()
        }
    }
}

fn random_title<R: Rng>(words: &[String], index: usize, rng: &mut R) -> String {
    if words.is_empty() {
        return index.to_string();
    }
    (0..TITLE_WORDS)
        .filter_map(|_| words.choose(&mut *rng).map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
