//! Skeleton cache for remote imports

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use skiff_core::archive;
use skiff_core::checksums::hash_bytes;
use skiff_core::layout::COMPONENTS_DIR;
use skiff_repo::{PackageRemote, RepoError};

use crate::error::Result;

/// Materialize component `name` of the skeleton at `url` below `cache_dir`.
///
/// Component tarballs are cached under `oci/blobs/sha256/<hex>` and expanded
/// into `oci/dirs/<hex>`; a tarball already in the cache is not fetched
/// again. A skeleton that publishes no tarball for the component (it has no
/// local content) gets an empty directory keyed by the URL and name.
/// Returns the expanded directory.
pub async fn fetch_skeleton(
    remote: &dyn PackageRemote,
    url: &str,
    name: &str,
    cache_dir: &Path,
) -> Result<PathBuf> {
    let root = remote.fetch_root().await?;
    let title = format!("{COMPONENTS_DIR}/{name}.tar");

    let Some(layer) = root.locate(&title) else {
        let key = hex::encode(Sha256::digest(format!("{url}{name}")));
        let dir = cache_dir.join("oci").join("dirs").join(key);
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(url, component = name, "skeleton component has no tarball");
        return Ok(dir);
    };

    let hex = layer.digest.trim_start_matches("sha256:");
    let tarball = cache_dir.join("oci").join("blobs").join("sha256").join(hex);
    let dir = cache_dir.join("oci").join("dirs").join(hex);

    if !tarball.exists() {
        let data = remote.fetch_blob(layer).await?;
        let actual = format!("sha256:{}", hash_bytes(&data));
        if actual != layer.digest {
            return Err(RepoError::DigestMismatch {
                path: title,
                expected: layer.digest.clone(),
                actual,
            }
            .into());
        }
        if let Some(parent) = tarball.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&tarball, &data).await?;
        tracing::debug!(url, component = name, path = %tarball.display(), "cached skeleton component");
    }

    tokio::fs::create_dir_all(&dir).await?;
    archive::extract(&tarball, &dir, 1)?;
    Ok(dir)
}
