//! Content-addressed image store in OCI image-layout form

use std::path::{Path, PathBuf};

use crate::checksums::hash_bytes;
use crate::error::{CoreError, Result};
use crate::oci::{Descriptor, Index, Manifest, OCI_LAYOUT_CONTENT};

pub const IMAGES_DIR: &str = "images";
pub const OCI_LAYOUT: &str = "oci-layout";
pub const INDEX_JSON: &str = "index.json";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Images {
    pub base: PathBuf,
    pub oci_layout: Option<PathBuf>,
    pub index: Option<PathBuf>,
    /// Absolute blob paths in registration order
    pub blobs: Vec<PathBuf>,
}

impl Images {
    pub fn new(base: PathBuf) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.base.join("blobs").join("sha256")
    }

    /// Register a blob by digest, with or without the `sha256:` prefix
    pub fn add_blob(&mut self, digest: &str) -> Result<()> {
        let hex = digest.strip_prefix("sha256:").unwrap_or(digest);
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidDigest {
                digest: digest.to_string(),
            });
        }
        let abs = self.blobs_dir().join(hex);
        if !self.blobs.contains(&abs) {
            self.blobs.push(abs);
        }
        Ok(())
    }

    /// Register every blob an image consists of: its layers, its config and
    /// the manifest itself
    pub fn add_image(&mut self, manifest: &Manifest, manifest_digest: &str) -> Result<()> {
        for layer in &manifest.layers {
            self.add_blob(&layer.digest)?;
        }
        self.add_blob(&manifest.config.digest)?;
        self.add_blob(manifest_digest)
    }

    /// Store `data` as a blob, returning its `sha256:` digest
    pub fn write_blob(&mut self, data: &[u8]) -> Result<String> {
        let hex = hash_bytes(data);
        let dir = self.blobs_dir();
        std::fs::create_dir_all(&dir).map_err(|e| CoreError::path_io("create", &dir, e))?;
        let path = dir.join(&hex);
        if !path.exists() {
            std::fs::write(&path, data).map_err(|e| CoreError::path_io("write", &path, e))?;
        }
        let digest = format!("sha256:{hex}");
        self.add_blob(&digest)?;
        Ok(digest)
    }

    pub fn blob_path(&self, descriptor: &Descriptor) -> PathBuf {
        self.blobs_dir().join(descriptor.digest_hex())
    }

    pub fn read_blob(&self, descriptor: &Descriptor) -> Result<Vec<u8>> {
        let path = self.blob_path(descriptor);
        std::fs::read(&path).map_err(|e| CoreError::path_io("read", &path, e))
    }

    /// Read `index.json`, or an empty index when none exists yet
    pub fn read_index(&self) -> Result<Index> {
        let path = self.base.join(INDEX_JSON);
        if !path.exists() {
            return Ok(Index::default());
        }
        let content = std::fs::read(&path).map_err(|e| CoreError::path_io("read", &path, e))?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Write `index.json` and `oci-layout`, registering both
    pub fn write_index(&mut self, index: &Index) -> Result<()> {
        std::fs::create_dir_all(&self.base)
            .map_err(|e| CoreError::path_io("create", &self.base, e))?;

        let layout = self.base.join(OCI_LAYOUT);
        write(&layout, OCI_LAYOUT_CONTENT.as_bytes())?;
        self.oci_layout = Some(layout);

        let path = self.base.join(INDEX_JSON);
        write(&path, &serde_json::to_vec_pretty(index)?)?;
        self.index = Some(path);
        Ok(())
    }

    /// Read the manifest an index entry points at
    pub fn read_manifest(&self, entry: &Descriptor) -> Result<Manifest> {
        Ok(serde_json::from_slice(&self.read_blob(entry)?)?)
    }
}

fn write(path: &Path, data: &[u8]) -> Result<()> {
    std::fs::write(path, data).map_err(|e| CoreError::path_io("write", path, e))
}
