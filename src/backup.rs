//! Local backups of original images.
//!
//! Layout under the backup root:
//!
//! ```text
//! <root>/<product_id>/<image_id>.json   original image record
//! <root>/<product_id>/<filename>.png    original bytes
//! <root>/<product_id>/<filename>.jpg    converted output
//! ```
//!
//! An original already named `*.jpg` converts to `<stem>.converted.jpg` so the
//! backup is never the converter's output path.
//!
//! Files are overwritten on re-runs.
use crate::shopify::Image;
use crate::util::jpeg_filename;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct BackupPaths {
    root: PathBuf,
}

impl BackupPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `<product_id>/` directory path.
    pub fn product_dir(&self, product_id: u64) -> PathBuf {
        self.root.join(product_id.to_string())
    }

    /// Return the `<product_id>/<image_id>.json` path.
    pub fn metadata_path(&self, product_id: u64, image_id: u64) -> PathBuf {
        self.product_dir(product_id).join(format!("{image_id}.json"))
    }

    pub fn original_path(&self, product_id: u64, filename: &str) -> Result<PathBuf> {
        Ok(self.product_dir(product_id).join(checked_filename(filename)?))
    }

    pub fn converted_path(&self, product_id: u64, filename: &str) -> Result<PathBuf> {
        let filename = checked_filename(filename)?;
        let mut converted = jpeg_filename(filename);
        if converted.eq_ignore_ascii_case(filename) {
            let stem = converted.trim_end_matches(".jpg");
            converted = format!("{stem}.converted.jpg");
        }
        Ok(self.product_dir(product_id).join(converted))
    }

    /// Stash the full image record as pretty JSON.
    pub fn write_image_metadata(&self, product_id: u64, image: &Image) -> Result<PathBuf> {
        let path = self.metadata_path(product_id, image.id);
        let bytes = serde_json::to_vec_pretty(image).context("serialize image metadata")?;
        write_bytes(&path, &bytes)?;
        Ok(path)
    }

    pub fn write_original(&self, product_id: u64, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.original_path(product_id, filename)?;
        write_bytes(&path, bytes)?;
        Ok(path)
    }
}

fn checked_filename(filename: &str) -> Result<&str> {
    let is_plain = Path::new(filename)
        .file_name()
        .is_some_and(|name| name == filename);
    if !is_plain {
        return Err(anyhow!("refusing backup filename {filename:?}"));
    }
    Ok(filename)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
