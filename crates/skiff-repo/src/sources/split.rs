//! Package archive split into numbered shards
//!
//! `pkg.tar.zst.part000` is a small JSON header describing the reassembled
//! archive; `part001` onwards hold its bytes in order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use skiff_core::{ComponentFilter, PackagePaths, checksums};

use super::{LoadedPackage, PackageSource, SourceKind, SourceOptions, TarballSource};
use crate::error::{RepoError, Result};

const FIRST_SHARD: &str = ".part000";

/// Header stored in the first shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPackageData {
    pub sha256_sum: String,
    pub bytes: u64,
    pub count: usize,
}

fn split_error(message: impl Into<String>) -> RepoError {
    RepoError::SplitPackage {
        message: message.into(),
    }
}

/// Split `archive` into shards of at most `chunk_size` bytes next to it,
/// returning the shard paths with the header first
pub fn split_archive(archive: &Path, chunk_size: usize) -> Result<Vec<PathBuf>> {
    if chunk_size == 0 {
        return Err(split_error("chunk size must be greater than zero"));
    }
    let bytes = std::fs::metadata(archive)?.len();
    let sha256_sum = checksums::hash_file(archive)?;
    let shard = |i: usize| PathBuf::from(format!("{}.part{:03}", archive.display(), i));

    let mut reader = File::open(archive)?;
    let mut buf = vec![0u8; chunk_size];
    let mut shards = vec![shard(0)];
    loop {
        let mut filled = 0;
        while filled < chunk_size {
            let n = reader.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        let path = shard(shards.len());
        std::fs::write(&path, &buf[..filled])?;
        shards.push(path);
        if filled < chunk_size {
            break;
        }
    }

    let header = SplitPackageData {
        sha256_sum,
        bytes,
        count: shards.len() - 1,
    };
    std::fs::write(&shards[0], serde_json::to_vec(&header)?)?;
    tracing::debug!(archive = %archive.display(), shards = header.count, "split package archive");
    Ok(shards)
}

pub struct SplitTarballSource {
    options: SourceOptions,
}

impl SplitTarballSource {
    pub fn new(options: SourceOptions) -> Self {
        Self { options }
    }

    fn shards(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.options.package_source.replace(FIRST_SHARD, ".part*");
        let mut shards = glob::glob(&pattern)
            .map_err(|e| split_error(format!("invalid shard pattern {pattern}: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| split_error(e.to_string()))?;
        shards.sort();

        if shards.len() <= 1 {
            return Err(split_error(format!(
                "unable to find split tarball files matching {pattern}"
            )));
        }
        Ok(shards)
    }

    async fn local(&self) -> Result<(tempfile::TempDir, TarballSource)> {
        let temp = self.options.make_temp_dir()?;
        let path = self.collect(temp.path()).await?;
        let mut options = self.options.clone();
        options.package_source = path.display().to_string();
        options.shasum = None;
        Ok((temp, TarballSource::new(options)))
    }
}

#[async_trait]
impl PackageSource for SplitTarballSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Split
    }

    async fn load_package(
        &self,
        dst: &mut PackagePaths,
        filter: &dyn ComponentFilter,
        unarchive_all: bool,
    ) -> Result<LoadedPackage> {
        let (_temp, tarball) = self.local().await?;
        tarball.load_package(dst, filter, unarchive_all).await
    }

    async fn load_package_metadata(
        &self,
        dst: &mut PackagePaths,
        want_sbom: bool,
        skip_validation: bool,
    ) -> Result<LoadedPackage> {
        let (_temp, tarball) = self.local().await?;
        tarball
            .load_package_metadata(dst, want_sbom, skip_validation)
            .await
    }

    async fn collect(&self, dir: &Path) -> Result<PathBuf> {
        let shards = self.shards()?;
        let header: SplitPackageData = serde_json::from_slice(&std::fs::read(&shards[0])?)?;
        let parts = &shards[1..];
        if parts.len() != header.count {
            return Err(split_error(format!(
                "expected {} shards, found {}",
                header.count,
                parts.len()
            )));
        }

        let name = Path::new(&self.options.package_source.replace(FIRST_SHARD, ""))
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| RepoError::UnidentifiedSource {
                input: self.options.package_source.clone(),
            })?;
        std::fs::create_dir_all(dir)?;
        let dest = dir.join(name);

        let mut writer = BufWriter::new(File::create(&dest)?);
        for part in parts {
            std::io::copy(&mut File::open(part)?, &mut writer)?;
        }
        writer.flush()?;
        drop(writer);

        let bytes = std::fs::metadata(&dest)?.len();
        if bytes != header.bytes {
            return Err(split_error(format!(
                "package size mismatch, expected {} bytes, got {bytes}",
                header.bytes
            )));
        }
        let actual = checksums::hash_file(&dest)?;
        if actual != header.sha256_sum {
            return Err(split_error(format!(
                "package integrity check failed, expected {}, got {actual}",
                header.sha256_sum
            )));
        }

        tracing::debug!(shards = parts.len(), dest = %dest.display(), "reassembled split package");
        Ok(dest)
    }
}
