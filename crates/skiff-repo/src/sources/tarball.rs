//! Local package archive

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use skiff_core::layout::{ALWAYS_PULL, SBOM_TAR};
use skiff_core::{ComponentFilter, PackagePaths, archive, checksums};

use super::{
    LoadedPackage, PackageSource, SourceKind, SourceOptions, finish_load, finish_metadata,
    move_file,
};
use crate::error::{RepoError, Result};

pub struct TarballSource {
    options: SourceOptions,
}

impl TarballSource {
    pub fn new(options: SourceOptions) -> Self {
        Self { options }
    }

    fn path(&self) -> &Path {
        Path::new(&self.options.package_source)
    }

    fn verify_shasum(&self) -> Result<()> {
        let Some(expected) = self.options.shasum.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(());
        };
        let actual = checksums::hash_file(self.path())?;
        if actual != expected {
            return Err(RepoError::ChecksumMismatch {
                path: self.options.package_source.clone(),
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PackageSource for TarballSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Tarball
    }

    async fn load_package(
        &self,
        dst: &mut PackagePaths,
        filter: &dyn ComponentFilter,
        unarchive_all: bool,
    ) -> Result<LoadedPackage> {
        self.verify_shasum()?;
        tracing::debug!(source = %self.options.package_source, dest = %dst.base.display(), "extracting package");

        let extracted = archive::extract(self.path(), &dst.base, 0)?;
        dst.set_from_paths(&extracted);
        finish_load(dst, &self.options, filter, false, unarchive_all)
    }

    async fn load_package_metadata(
        &self,
        dst: &mut PackagePaths,
        want_sbom: bool,
        skip_validation: bool,
    ) -> Result<LoadedPackage> {
        self.verify_shasum()?;

        let mut wanted: Vec<&str> = ALWAYS_PULL.to_vec();
        if want_sbom {
            wanted.push(SBOM_TAR);
        }
        let extracted =
            archive::extract_matching(self.path(), &dst.base, 0, |p| wanted.contains(&p))?;
        dst.set_from_paths(&extracted);
        finish_metadata(dst, &self.options, want_sbom, skip_validation)
    }

    async fn collect(&self, dir: &Path) -> Result<PathBuf> {
        let name = self
            .path()
            .file_name()
            .ok_or_else(|| RepoError::UnidentifiedSource {
                input: self.options.package_source.clone(),
            })?;
        std::fs::create_dir_all(dir)?;
        let dest = dir.join(name);
        move_file(self.path(), &dest)?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testutil::{self, SBOM_CONTENT};
    use skiff_core::filters;
    use skiff_core::layout::ComponentState;
    use skiff_core::signing;
    use tempfile::TempDir;

    fn archived(temp: &Path, keys: Option<&signing::KeyFiles>) -> PathBuf {
        let paths = testutil::build_package(&temp.join("build"), keys);
        let tarball = temp.join("skiff-package-demo-amd64-1.0.0.tar.zst");
        paths.archive_package(&tarball, false).unwrap();
        tarball
    }

    #[tokio::test]
    async fn test_load_filters_and_unarchives() {
        let temp = TempDir::new().unwrap();
        let tarball = archived(temp.path(), None);
        let source = TarballSource::new(testutil::options(tarball.display().to_string()));

        let mut dst = PackagePaths::new(temp.path().join("load"));
        let filter = filters::by_select_state("web");
        let loaded = source.load_package(&mut dst, filter.as_ref(), true).await.unwrap();

        assert_eq!(loaded.package.metadata.name, "demo");
        let names: Vec<_> = loaded.package.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["web"]);
        assert!(matches!(dst.components.state("web"), Some(ComponentState::Directory(_))));
        assert!(matches!(dst.components.state("db"), Some(ComponentState::Tarball(_))));
        assert_eq!(
            std::fs::read_to_string(dst.base.join("sboms/web.json")).unwrap(),
            SBOM_CONTENT
        );
    }

    #[tokio::test]
    async fn test_shasum_mismatch() {
        let temp = TempDir::new().unwrap();
        let tarball = archived(temp.path(), None);
        let mut options = testutil::options(tarball.display().to_string());
        options.shasum = Some("0".repeat(64));

        let source = TarballSource::new(options);
        let mut dst = PackagePaths::new(temp.path().join("load"));
        let err = source
            .load_package(&mut dst, filters::empty().as_ref(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn test_metadata_extracts_selectively() {
        let temp = TempDir::new().unwrap();
        let tarball = archived(temp.path(), None);
        let source = TarballSource::new(testutil::options(tarball.display().to_string()));

        let mut dst = PackagePaths::new(temp.path().join("meta"));
        let loaded = source
            .load_package_metadata(&mut dst, true, false)
            .await
            .unwrap();
        assert_eq!(loaded.package.components.len(), 2);
        assert!(!dst.base.join("components").exists());
        assert!(dst.base.join("sboms/web.json").exists());
    }

    #[tokio::test]
    async fn test_signed_package_needs_key_unless_skipped() {
        let temp = TempDir::new().unwrap();
        let keys = signing::generate_keypair(&temp.path().join("keys"), None).unwrap();
        let tarball = archived(temp.path(), Some(&keys));

        let source = TarballSource::new(testutil::options(tarball.display().to_string()));
        let mut dst = PackagePaths::new(temp.path().join("a"));
        let err = source
            .load_package(&mut dst, filters::empty().as_ref(), false)
            .await
            .unwrap_err();
        assert!(err.is_signed_but_no_key());

        let mut dst = PackagePaths::new(temp.path().join("b"));
        source.load_package_metadata(&mut dst, false, true).await.unwrap();

        let mut options = testutil::options(tarball.display().to_string());
        options.public_key = Some(keys.public.clone());
        let source = TarballSource::new(options);
        let mut dst = PackagePaths::new(temp.path().join("c"));
        source
            .load_package(&mut dst, filters::empty().as_ref(), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_collect_moves_archive() {
        let temp = TempDir::new().unwrap();
        let tarball = archived(temp.path(), None);
        let source = TarballSource::new(testutil::options(tarball.display().to_string()));

        let out = temp.path().join("out");
        let collected = source.collect(&out).await.unwrap();
        assert_eq!(collected, out.join("skiff-package-demo-amd64-1.0.0.tar.zst"));
        assert!(!tarball.exists());
    }
}
