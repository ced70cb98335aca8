//! In-memory remote, used to publish a layout without a registry

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};

use skiff_core::PackagePaths;
use skiff_core::checksums::hash_bytes;
use skiff_core::oci::{Descriptor, Manifest, TITLE_ANNOTATION, media_types};

use super::{PackageRemote, RemoteConnector};
use crate::error::{RepoError, Result};

#[derive(Debug, Clone)]
pub struct MemoryRemote {
    reference: String,
    root: Manifest,
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryRemote {
    pub fn new(reference: impl Into<String>) -> Self {
        let config = b"{}".to_vec();
        let mut blobs = HashMap::new();
        let config_desc = Descriptor {
            media_type: media_types::SKIFF_CONFIG.to_string(),
            digest: format!("sha256:{}", hash_bytes(&config)),
            size: config.len() as i64,
            ..Default::default()
        };
        blobs.insert(config_desc.digest.clone(), config);

        Self {
            reference: reference.into(),
            root: Manifest {
                schema_version: 2,
                media_type: Some(media_types::IMAGE_MANIFEST.to_string()),
                config: config_desc,
                layers: Vec::new(),
                annotations: BTreeMap::new(),
            },
            blobs,
        }
    }

    /// Publish every file of a layout that exists on disk
    pub fn from_layout(reference: impl Into<String>, paths: &PackagePaths) -> Result<Self> {
        let mut remote = Self::new(reference);
        for (rel, abs) in paths.files() {
            if abs.is_file() {
                remote.add_layer(&rel, std::fs::read(&abs)?);
            }
        }
        Ok(remote)
    }

    /// Add a layer titled `path`, replacing any layer with the same title
    pub fn add_layer(&mut self, path: &str, data: Vec<u8>) -> Descriptor {
        let mut descriptor = Descriptor {
            media_type: media_types::SKIFF_LAYER.to_string(),
            digest: format!("sha256:{}", hash_bytes(&data)),
            size: data.len() as i64,
            ..Default::default()
        };
        descriptor
            .annotations
            .insert(TITLE_ANNOTATION.to_string(), path.to_string());

        self.root.layers.retain(|l| l.title() != Some(path));
        self.root.layers.push(descriptor.clone());
        self.blobs.insert(descriptor.digest.clone(), data);
        descriptor
    }

    /// Add an image blob under `images/blobs/sha256/<hex>`
    pub fn add_blob_layer(&mut self, data: Vec<u8>) -> Descriptor {
        let path = format!("images/blobs/sha256/{}", hash_bytes(&data));
        self.add_layer(&path, data)
    }
}

#[async_trait]
impl PackageRemote for MemoryRemote {
    fn reference(&self) -> &str {
        &self.reference
    }

    async fn fetch_root(&self) -> Result<Manifest> {
        Ok(self.root.clone())
    }

    async fn fetch_blob(&self, descriptor: &Descriptor) -> Result<Vec<u8>> {
        self.blobs
            .get(&descriptor.digest)
            .cloned()
            .ok_or_else(|| RepoError::LayerNotFound {
                reference: self.reference.clone(),
                path: descriptor.digest.clone(),
            })
    }
}

/// Resolves `oci://` URLs against a fixed set of in-memory remotes
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    remotes: HashMap<String, MemoryRemote>,
}

impl MemoryConnector {
    pub fn insert(&mut self, url: impl Into<String>, remote: MemoryRemote) {
        self.remotes.insert(url.into(), remote);
    }
}

impl RemoteConnector for MemoryConnector {
    fn connect(&self, url: &str) -> Result<Box<dyn PackageRemote>> {
        self.remotes
            .get(url)
            .cloned()
            .map(|r| Box::new(r) as Box<dyn PackageRemote>)
            .ok_or_else(|| RepoError::InvalidOciReference {
                reference: url.to_string(),
            })
    }
}
