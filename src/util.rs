use std::path::Path;
use url::Url;

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

/// Lowercased media type of a `Content-Type` value, parameters dropped.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_png_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|value| media_type(value) == "image/png")
}

/// File name for a downloaded image: last path segment of the canonical URL
/// (or the `src`), falling back to `<image_id>.png`.
pub fn image_filename(canonical_url: Option<&str>, src: &str, image_id: u64) -> String {
    canonical_url
        .and_then(last_path_segment)
        .or_else(|| last_path_segment(src))
        .unwrap_or_else(|| format!("{image_id}.png"))
}

fn last_path_segment(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let encoded = url.path_segments()?.next_back()?;
    let segment = urlencoding::decode(encoded).ok()?;
    let unsafe_name = segment == "." || segment == ".." || segment.contains(['/', '\\']);
    if segment.is_empty() || unsafe_name {
        return None;
    }
    Some(segment.into_owned())
}

/// `IMG_1.png` -> `IMG_1.jpg`.
pub fn jpeg_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("image");
    format!("{stem}.jpg")
}
