//! OCI remote collaborator
//!
//! A published package is an OCI manifest whose layers each carry one package
//! file, named by the `org.opencontainers.image.title` annotation. Everything
//! above the wire (layer selection, pulling into a layout) is written against
//! the [`PackageRemote`] trait so sources can run against a registry or an
//! in-memory remote alike.

mod credentials;
mod memory;
mod pull;
mod registry;

pub use credentials::registry_auth;
pub use memory::{MemoryConnector, MemoryRemote};
pub use pull::{ProgressFn, PullProgress, pull_layers};
pub use registry::{RegistryConnector, RegistryOptions, RegistryRemote, SKELETON_ARCH};

use async_trait::async_trait;
use std::collections::BTreeSet;

use skiff_core::layout::{
    ALWAYS_PULL, COMPONENTS_DIR, DEFINITION_FILE, IMAGES_DIR, INDEX_JSON, OCI_LAYOUT, SBOM_TAR,
};
use skiff_core::oci::{Descriptor, Index, Manifest};
use skiff_core::{Component, ImageRef, SkiffPackage};

use crate::error::{RepoError, Result};

/// URL scheme of registry-hosted packages
pub const OCI_SCHEME: &str = "oci://";

/// A package published to an OCI registry
#[async_trait]
pub trait PackageRemote: Send + Sync {
    /// Reference this remote points at
    fn reference(&self) -> &str;

    /// Fetch the package's root manifest
    async fn fetch_root(&self) -> Result<Manifest>;

    /// Fetch the bytes of one blob
    async fn fetch_blob(&self, descriptor: &Descriptor) -> Result<Vec<u8>>;
}

/// Opens a [`PackageRemote`] for an `oci://` URL
pub trait RemoteConnector: Send + Sync {
    fn connect(&self, url: &str) -> Result<Box<dyn PackageRemote>>;
}

/// Find the root layer carrying `path`
pub fn locate<'a>(
    remote: &dyn PackageRemote,
    root: &'a Manifest,
    path: &str,
) -> Result<&'a Descriptor> {
    root.locate(path).ok_or_else(|| RepoError::LayerNotFound {
        reference: remote.reference().to_string(),
        path: path.to_string(),
    })
}

/// Fetch and parse the package definition layer
pub async fn fetch_definition(
    remote: &dyn PackageRemote,
    root: &Manifest,
) -> Result<SkiffPackage> {
    let layer = locate(remote, root, DEFINITION_FILE)?;
    let data = remote.fetch_blob(layer).await?;
    Ok(serde_yaml::from_slice(&data)?)
}

/// Fetch and parse the package's image index
pub async fn fetch_image_index(remote: &dyn PackageRemote, root: &Manifest) -> Result<Index> {
    let layer = locate(remote, root, &format!("{IMAGES_DIR}/{INDEX_JSON}"))?;
    let data = remote.fetch_blob(layer).await?;
    Ok(serde_json::from_slice(&data)?)
}

/// Root layers present for every always-pulled file
pub fn always_pull_layers(root: &Manifest) -> Vec<Descriptor> {
    ALWAYS_PULL
        .iter()
        .filter_map(|path| root.locate(path))
        .cloned()
        .collect()
}

/// The minimal layer set needed to load `requested` components.
///
/// Covers each requested or required component's tarball, every image those
/// components reference (manifest, config and layers via the image index) and
/// the SBOM tarball when published. Always-pulled files are not included.
pub async fn layers_for_components(
    remote: &dyn PackageRemote,
    root: &Manifest,
    pkg: &SkiffPackage,
    requested: &[Component],
) -> Result<Vec<Descriptor>> {
    for component in requested {
        if pkg.component(&component.name).is_none() {
            return Err(RepoError::UnknownComponent {
                name: component.name.clone(),
            });
        }
    }

    let mut layers = Vec::new();
    let mut images = BTreeSet::new();
    for component in &pkg.components {
        let wanted = requested.iter().any(|c| c.name == component.name)
            || component.required.unwrap_or(false);
        if !wanted {
            continue;
        }
        images.extend(component.images.iter().cloned());
        if let Some(layer) = root.locate(&format!("{COMPONENTS_DIR}/{}.tar", component.name)) {
            layers.push(layer.clone());
        }
    }

    if let Some(sboms) = root.locate(SBOM_TAR) {
        layers.push(sboms.clone());
    }

    if !images.is_empty() {
        let index_path = format!("{IMAGES_DIR}/{INDEX_JSON}");
        layers.push(locate(remote, root, &index_path)?.clone());
        layers.push(locate(remote, root, &format!("{IMAGES_DIR}/{OCI_LAYOUT}"))?.clone());

        let index = fetch_image_index(remote, root).await?;
        for image in &images {
            let entry = find_image(&index, image).ok_or_else(|| RepoError::LayerNotFound {
                reference: remote.reference().to_string(),
                path: format!("{index_path} entry for {image}"),
            })?;
            let manifest_layer = locate(remote, root, &blob_path(entry))?;
            let manifest: Manifest =
                serde_json::from_slice(&remote.fetch_blob(manifest_layer).await?)?;

            layers.push(manifest_layer.clone());
            layers.push(locate(remote, root, &blob_path(&manifest.config))?.clone());
            for layer in &manifest.layers {
                layers.push(locate(remote, root, &blob_path(layer))?.clone());
            }
        }
    }

    Ok(layers)
}

/// Deduplicate by digest, keeping first occurrences
pub fn dedup_layers(layers: Vec<Descriptor>) -> Vec<Descriptor> {
    let mut seen = BTreeSet::new();
    layers
        .into_iter()
        .filter(|l| !l.is_empty() && seen.insert(l.digest.clone()))
        .collect()
}

fn blob_path(descriptor: &Descriptor) -> String {
    format!("{IMAGES_DIR}/blobs/sha256/{}", descriptor.digest_hex())
}

/// Index entries are annotated with the reference the image was pulled
/// with, which may or may not carry the implied registry.
fn find_image<'a>(index: &'a Index, image: &str) -> Option<&'a Descriptor> {
    let parsed = ImageRef::parse(image).ok();
    index.manifests.iter().find(|entry| {
        let Some(name) = entry.base_name() else {
            return false;
        };
        if name == image {
            return true;
        }
        match &parsed {
            Some(r) => {
                name == r.to_string()
                    || (r.host == "docker.io" && name == format!("{}{}", r.path, r.tag_or_digest()))
                    || ImageRef::parse(name).is_ok_and(|n| n == *r)
            }
            None => false,
        }
    })
}
