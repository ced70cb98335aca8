//! Package archive downloaded over HTTP

use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use skiff_core::{ComponentFilter, PackagePaths, checksums};

use super::{
    LoadedPackage, PackageSource, SourceKind, SourceOptions, TarballSource, rename_from_metadata,
};
use crate::error::{RepoError, Result};

/// Legacy scheme, downloaded over https and gated like any other URL
const SGET_SCHEME: &str = "sget://";

/// Name a download gets until its definition has been read
const UNKNOWN_NAME: &str = "skiff-package-url-unknown";

pub struct UrlSource {
    options: SourceOptions,
}

impl UrlSource {
    pub fn new(options: SourceOptions) -> Self {
        Self { options }
    }

    fn download_url(&self) -> Result<url::Url> {
        let raw = match self.options.package_source.strip_prefix(SGET_SCHEME) {
            Some(rest) => format!("https://{rest}"),
            None => self.options.package_source.clone(),
        };
        url::Url::parse(&raw).map_err(|_| RepoError::UnidentifiedSource {
            input: self.options.package_source.clone(),
        })
    }

    async fn download(&self, dest: &Path) -> Result<()> {
        let url = self.download_url()?;
        tracing::debug!(%url, dest = %dest.display(), "downloading package");

        let client = reqwest::Client::builder()
            .user_agent(concat!("skiff/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RepoError::NetworkError {
                message: e.to_string(),
            })?;
        let response = client.get(url).send().await?.error_for_status()?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    /// Collect into a scratch directory and hand over to a tarball source
    async fn local(&self, shasum: Option<String>) -> Result<(tempfile::TempDir, TarballSource)> {
        let temp = self.options.make_temp_dir()?;
        let path = self.collect(temp.path()).await?;
        let mut options = self.options.clone();
        options.package_source = path.display().to_string();
        options.shasum = shasum;
        Ok((temp, TarballSource::new(options)))
    }
}

#[async_trait]
impl PackageSource for UrlSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Url
    }

    async fn load_package(
        &self,
        dst: &mut PackagePaths,
        filter: &dyn ComponentFilter,
        unarchive_all: bool,
    ) -> Result<LoadedPackage> {
        // The download was already checked against the shasum by collect.
        let (_temp, tarball) = self.local(None).await?;
        tarball.load_package(dst, filter, unarchive_all).await
    }

    async fn load_package_metadata(
        &self,
        dst: &mut PackagePaths,
        want_sbom: bool,
        skip_validation: bool,
    ) -> Result<LoadedPackage> {
        let (_temp, tarball) = self.local(None).await?;
        tarball
            .load_package_metadata(dst, want_sbom, skip_validation)
            .await
    }

    async fn collect(&self, dir: &Path) -> Result<PathBuf> {
        let shasum = self.options.shasum.as_deref().filter(|s| !s.is_empty());
        if !self.options.insecure && shasum.is_none() {
            return Err(RepoError::ShasumRequired);
        }

        std::fs::create_dir_all(dir)?;
        let dest = dir.join(UNKNOWN_NAME);
        self.download(&dest).await?;

        if let Some(expected) = shasum {
            let actual = checksums::hash_file(&dest)?;
            if actual != expected {
                std::fs::remove_file(&dest)?;
                return Err(RepoError::ChecksumMismatch {
                    path: self.options.package_source.clone(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        rename_from_metadata(&dest)
    }
}
