//! Shared test infrastructure for integration tests.
//!
//! `MockShop` is a wiremock stand-in for the Admin REST API and the image CDN,
//! backed by one shared catalog so image create/delete change what later
//! requests see. Converter scripts stand in for ImageMagick.
#![allow(dead_code)]

use base64::Engine;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockBuilder, MockServer, Request, Respond, ResponseTemplate};

pub const ACCESS_TOKEN: &str = "test-token";
pub const API_PREFIX: &str = "/admin/api/2024-01";
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const PRODUCT_PATTERN: &str = r"^/admin/api/2024-01/products/\d+\.json$";
const IMAGES_PATTERN: &str = r"^/admin/api/2024-01/products/\d+/images\.json$";
const IMAGE_PATTERN: &str = r"^/admin/api/2024-01/products/\d+/images/\d+\.json$";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfixture";
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, b'J', b'F', b'I', b'F'];

/// Catalog and CDN contents behind the mock server.
#[derive(Default)]
pub struct ShopState {
    pub products: Vec<Value>,
    /// CDN path (e.g. `/cdn/1/IMG_1.png`) to bytes.
    pub files: BTreeMap<String, Vec<u8>>,
    /// `METHOD target` for every request served.
    pub requests: Vec<String>,
    base: String,
    next_id: u64,
}

impl ShopState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn product(&self, id: u64) -> Option<&Value> {
        self.products.iter().find(|product| product["id"] == id)
    }

    /// Images of a product ordered by position.
    pub fn images(&self, id: u64) -> Vec<Value> {
        let mut images = self
            .product(id)
            .and_then(|product| product["images"].as_array().cloned())
            .unwrap_or_default();
        images.sort_by_key(|image| image["position"].as_u64().unwrap_or_default());
        images
    }

    /// Sniffed media type of the file behind an image `src`.
    pub fn content_type_of(&self, src: &str) -> Option<&'static str> {
        let path = cdn_path(src)?;
        self.files.get(&path).map(|bytes| sniff(bytes))
    }

    pub fn count_requests(&self, prefix: &str) -> usize {
        self.requests
            .iter()
            .filter(|request| request.starts_with(prefix))
            .count()
    }
}

pub struct MockShop {
    server: MockServer,
    state: Arc<Mutex<ShopState>>,
}

impl MockShop {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(ShopState {
            base: server.uri(),
            next_id: 100,
            ..ShopState::default()
        }));
        let shop = Self { server, state };

        shop.route(Mock::given(path_regex(r"^/cdn/")), Route::Cdn).await;
        shop.admin(
            Mock::given(method("GET")).and(path(format!("{API_PREFIX}/products.json"))),
            Route::ListProducts,
        )
        .await;
        shop.admin(
            Mock::given(method("GET")).and(path_regex(PRODUCT_PATTERN)),
            Route::GetProduct,
        )
        .await;
        shop.admin(
            Mock::given(method("DELETE")).and(path_regex(PRODUCT_PATTERN)),
            Route::DeleteProduct,
        )
        .await;
        shop.admin(
            Mock::given(method("POST")).and(path_regex(IMAGES_PATTERN)),
            Route::CreateImage,
        )
        .await;
        shop.admin(
            Mock::given(method("DELETE")).and(path_regex(IMAGE_PATTERN)),
            Route::DeleteImage,
        )
        .await;
        // Anything under the API without a valid token.
        Mock::given(path_regex(r"^/admin/"))
            .respond_with(shop.responder(Route::Unauthorized))
            .with_priority(10)
            .mount(&shop.server)
            .await;
        shop
    }

    fn responder(&self, route: Route) -> ShopResponder {
        ShopResponder {
            state: Arc::clone(&self.state),
            route,
        }
    }

    async fn route(&self, mock: MockBuilder, route: Route) {
        mock.respond_with(self.responder(route))
            .mount(&self.server)
            .await;
    }

    async fn admin(&self, mock: MockBuilder, route: Route) {
        self.route(mock.and(header(ACCESS_TOKEN_HEADER, ACCESS_TOKEN)), route)
            .await;
    }

    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    pub fn state(&self) -> MutexGuard<'_, ShopState> {
        self.state.lock().expect("lock shop state")
    }

    /// Add a product whose images are served from the CDN with the given bytes.
    pub fn add_product(&self, title: &str, images: &[(&str, &[u8])]) -> u64 {
        let base = self.base_url();
        let mut state = self.state();
        let product_id = state.next_id();
        let mut image_values = Vec::new();
        for (idx, (filename, bytes)) in images.iter().enumerate() {
            let position = idx as u64 + 1;
            let image_id = state.next_id();
            let path = format!("/cdn/{product_id}/{filename}");
            state.files.insert(path.clone(), bytes.to_vec());
            image_values.push(json!({
                "id": image_id,
                "product_id": product_id,
                "position": position,
                "src": format!("{base}{path}?v=1"),
                "alt": format!("{title} {position}"),
                "width": 1024,
                "height": 768,
                "variant_ids": [product_id * 1000 + position],
                "created_at": "2017-02-01T10:00:00-05:00",
                "updated_at": "2017-02-01T10:00:00-05:00",
            }));
        }
        state.products.push(json!({
            "id": product_id,
            "title": title,
            "body_html": "<p>Hat in Grey. 100% Alpaca.</p>",
            "tags": "bits and bobs, hats",
            "updated_at": "2017-02-01T10:00:00-05:00",
            "variants": [{"id": product_id * 1000, "price": "12.00"}],
            "images": image_values,
        }));
        product_id
    }
}

#[derive(Debug, Clone, Copy)]
enum Route {
    Cdn,
    ListProducts,
    GetProduct,
    DeleteProduct,
    CreateImage,
    DeleteImage,
    Unauthorized,
}

/// Serves one route from the shared catalog, recording every request.
struct ShopResponder {
    state: Arc<Mutex<ShopState>>,
    route: Route,
}

impl Respond for ShopResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state.lock().expect("lock shop state");
        let path = request.url.path();
        let target = match request.url.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };
        state.requests.push(format!("{} {target}", request.method));

        let ids = path_ids(path);
        match (self.route, ids.as_slice()) {
            (Route::Cdn, _) => cdn_file(&state, path),
            (Route::ListProducts, _) => list_products(&state, &request.url),
            (Route::GetProduct, [id]) => match state.product(*id) {
                Some(product) => ResponseTemplate::new(200).set_body_json(json!({ "product": product })),
                None => not_found(),
            },
            (Route::DeleteProduct, [id]) => {
                let before = state.products.len();
                state.products.retain(|product| product["id"] != *id);
                if state.products.len() == before {
                    not_found()
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({}))
                }
            }
            (Route::CreateImage, [id]) => create_image(&mut state, *id, &request.body),
            (Route::DeleteImage, [id, image_id]) => delete_image(&mut state, *id, *image_id),
            (Route::Unauthorized, _) => ResponseTemplate::new(401).set_body_json(
                json!({"errors": "[API] Invalid API key or access token (unrecognized login or wrong password)"}),
            ),
            _ => not_found(),
        }
    }
}

/// Numeric path segments, e.g. product and image ids.
fn path_ids(path: &str) -> Vec<u64> {
    path.split('/')
        .filter_map(|segment| segment.trim_end_matches(".json").parse().ok())
        .collect()
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({"errors": "Not Found"}))
}

fn cdn_file(state: &ShopState, path: &str) -> ResponseTemplate {
    let Some(bytes) = state.files.get(path) else {
        return not_found();
    };
    ResponseTemplate::new(200)
        .insert_header("Link", format!("<{}{path}?v=1>; rel=\"canonical\"", state.base).as_str())
        .set_body_raw(bytes.clone(), sniff(bytes))
}

/// One product per page so pagination is exercised.
fn list_products(state: &ShopState, url: &Url) -> ResponseTemplate {
    let index = url
        .query_pairs()
        .find(|(key, _)| key == "page_info")
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let page: Vec<Value> = state.products.iter().skip(index).take(1).cloned().collect();
    let response = ResponseTemplate::new(200).set_body_json(json!({ "products": page }));
    if index + 1 < state.products.len() {
        let next = format!(
            "<{}{API_PREFIX}/products.json?limit=250&page_info={}>; rel=\"next\"",
            state.base,
            index + 1
        );
        response.insert_header("Link", next.as_str())
    } else {
        response
    }
}

fn create_image(state: &mut ShopState, product_id: u64, body: &[u8]) -> ResponseTemplate {
    let Ok(payload) = serde_json::from_slice::<Value>(body) else {
        return ResponseTemplate::new(422);
    };
    let image = &payload["image"];
    let Some(bytes) = image["attachment"]
        .as_str()
        .and_then(|data| base64::engine::general_purpose::STANDARD.decode(data).ok())
    else {
        return ResponseTemplate::new(422);
    };
    let filename = image["filename"].as_str().unwrap_or("upload").to_string();
    if state.product(product_id).is_none() {
        return not_found();
    }

    let image_id = state.next_id();
    let path = format!("/cdn/{product_id}/{filename}");
    state.files.insert(path.clone(), bytes);
    let src = format!("{}{path}?v=2", state.base);

    let Some(product) = state
        .products
        .iter_mut()
        .find(|product| product["id"] == product_id)
    else {
        return not_found();
    };
    let images = product["images"].as_array_mut().expect("images array");
    let position = image["position"]
        .as_u64()
        .unwrap_or(images.len() as u64 + 1);
    for existing in images.iter_mut() {
        let current = existing["position"].as_u64().unwrap_or_default();
        if current >= position {
            existing["position"] = json!(current + 1);
        }
    }
    let created = json!({
        "id": image_id,
        "product_id": product_id,
        "position": position,
        "src": src,
        "alt": image["alt"].clone(),
        "width": 1024,
        "height": 768,
        "variant_ids": image.get("variant_ids").cloned().unwrap_or_else(|| json!([])),
    });
    images.push(created.clone());
    images.sort_by_key(|image| image["position"].as_u64().unwrap_or_default());
    ResponseTemplate::new(200).set_body_json(json!({ "image": created }))
}

fn delete_image(state: &mut ShopState, product_id: u64, image_id: u64) -> ResponseTemplate {
    let Some(product) = state
        .products
        .iter_mut()
        .find(|product| product["id"] == product_id)
    else {
        return not_found();
    };
    let images = product["images"].as_array_mut().expect("images array");
    let before = images.len();
    images.retain(|image| image["id"] != image_id);
    if images.len() == before {
        return not_found();
    }
    for (idx, image) in images.iter_mut().enumerate() {
        image["position"] = json!(idx as u64 + 1);
    }
    ResponseTemplate::new(200).set_body_json(json!({}))
}

fn cdn_path(src: &str) -> Option<String> {
    Url::parse(src).ok().map(|url| url.path().to_string())
}

fn sniff(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8]) {
        "image/jpeg"
    } else if bytes.starts_with(b"\x89PNG") {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

/// Write an executable shell script standing in for the converter.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut permissions = fs::metadata(&path).expect("script metadata").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).expect("chmod script");
    path
}

/// Converter that writes a minimal JPEG to its output argument.
#[cfg(unix)]
pub fn jpeg_converter(dir: &Path) -> String {
    let script = write_script(
        dir,
        "fake-convert",
        "test -f \"$1\" || exit 2\nprintf '\\377\\330\\377\\340JFIF' > \"$2\"",
    );
    converter_template(&script)
}

/// Converter that exits zero but writes a GIF header.
#[cfg(unix)]
pub fn gif_converter(dir: &Path) -> String {
    let script = write_script(dir, "gif-convert", "printf 'GIF89a' > \"$2\"");
    converter_template(&script)
}

/// Converter that fails like ImageMagick missing a delegate.
#[cfg(unix)]
pub fn failing_converter(dir: &Path) -> String {
    let script = write_script(
        dir,
        "broken-convert",
        "echo 'convert: no decode delegate for this image format' >&2\nexit 1",
    );
    converter_template(&script)
}

fn converter_template(script: &Path) -> String {
    let quoted = shell_words::quote(&script.display().to_string()).into_owned();
    format!("{quoted} {{input}} {{output}}")
}

/// Write a config pointing both store sections at the mock shop.
pub fn write_config(dir: &Path, shop: &MockShop, converter: &str) -> PathBuf {
    let section = json!({
        "store": "mock.myshopify.com",
        "api_key": "key",
        "password": ACCESS_TOKEN,
        "base_url": shop.base_url(),
    });
    let config = json!({
        "auth": section,
        "test": section,
        "api_version": "2024-01",
        "backup_dir": dir.join("config-backups"),
        "converter": converter,
    });
    let path = dir.join("shopify_img_convert.json");
    fs::write(&path, serde_json::to_vec_pretty(&config).expect("serialize config"))
        .expect("write config");
    path
}

fn bin_command(args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_shopify-img-convert"));
    command
        .args(args)
        .env_remove("SHOPIFY_STORE")
        .env_remove("SHOPIFY_PASSWORD")
        .env_remove("SHOPIFY_IMG_CONVERT_CONFIG")
        .env_remove("RUST_LOG");
    command
}

/// Run the binary with a clean credential environment.
pub fn run_bin(args: &[&str]) -> Output {
    bin_command(args).output().expect("run shopify-img-convert")
}

/// `run_bin` without blocking the runtime serving the mock shop.
pub async fn run_bin_async(args: &[&str]) -> Output {
    tokio::process::Command::from(bin_command(args))
        .output()
        .await
        .expect("run shopify-img-convert")
}

pub fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout is not JSON ({err}): {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "command failed: {}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
}
