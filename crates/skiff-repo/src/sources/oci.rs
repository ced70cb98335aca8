//! Package published to an OCI registry

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use skiff_core::layout::SBOM_TAR;
use skiff_core::{ComponentFilter, PackagePaths};

use super::{
    LoadedPackage, PackageSource, SourceKind, SourceOptions, finish_load, finish_metadata,
    name_from_metadata, pkg_suffix,
};
use crate::error::Result;
use crate::oci::{
    self, PackageRemote, ProgressFn, RegistryOptions, RegistryRemote, SKELETON_ARCH,
    pull_layers,
};

pub struct OciSource {
    options: SourceOptions,
    remote: Box<dyn PackageRemote>,
    progress: Option<ProgressFn>,
}

impl OciSource {
    /// Connect to the registry named by `options.package_source`
    pub fn connect(options: SourceOptions) -> Result<Self> {
        let remote = RegistryRemote::new(
            &options.package_source,
            &RegistryOptions {
                architecture: options.architecture.clone(),
                plain_http: options.plain_http,
            },
        )?;
        Ok(Self::with_remote(options, Box::new(remote)))
    }

    pub fn with_remote(options: SourceOptions, remote: Box<dyn PackageRemote>) -> Self {
        Self {
            options,
            remote,
            progress: None,
        }
    }

    /// Report pull progress through `progress`
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    async fn pull(&self, dst: &Path, layers: &[skiff_core::oci::Descriptor]) -> Result<()> {
        pull_layers(
            self.remote.as_ref(),
            dst,
            layers,
            self.options.oci_concurrency,
            self.progress.clone(),
        )
        .await
    }
}

#[async_trait]
impl PackageSource for OciSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Oci
    }

    async fn load_package(
        &self,
        dst: &mut PackagePaths,
        filter: &dyn ComponentFilter,
        unarchive_all: bool,
    ) -> Result<LoadedPackage> {
        let remote = self.remote.as_ref();
        let root = remote.fetch_root().await?;
        let pkg = oci::fetch_definition(remote, &root).await?;
        let requested = filter.apply(&pkg)?;

        let mut layers = oci::layers_for_components(remote, &root, &pkg, &requested).await?;
        layers.extend(oci::always_pull_layers(&root));
        let layers = oci::dedup_layers(layers);
        let partial = layers.len() < root.layers.len();
        tracing::debug!(
            reference = remote.reference(),
            pulling = layers.len(),
            published = root.layers.len(),
            partial,
            "loading package"
        );

        self.pull(&dst.base, &layers).await?;
        dst.set_from_layers(&layers);
        finish_load(dst, &self.options, filter, partial, unarchive_all)
    }

    async fn load_package_metadata(
        &self,
        dst: &mut PackagePaths,
        want_sbom: bool,
        skip_validation: bool,
    ) -> Result<LoadedPackage> {
        let root = self.remote.fetch_root().await?;
        let mut layers = oci::always_pull_layers(&root);
        if want_sbom {
            layers.extend(root.locate(SBOM_TAR).cloned());
        }

        self.pull(&dst.base, &layers).await?;
        dst.set_from_layers(&layers);
        finish_metadata(dst, &self.options, want_sbom, skip_validation)
    }

    async fn collect(&self, dir: &Path) -> Result<PathBuf> {
        let root = self.remote.fetch_root().await?;
        let layers = oci::dedup_layers(root.layers.clone());

        let temp = self.options.make_temp_dir()?;
        let mut loaded = PackagePaths::new(temp.path());
        self.pull(&loaded.base, &layers).await?;
        loaded.set_from_layers(&layers);

        let pkg = loaded.read_definition()?;
        super::validate_integrity(&loaded, &pkg.metadata.aggregate_checksum, false)?;

        let is_skeleton = pkg.build.architecture == SKELETON_ARCH
            || self.remote.reference().ends_with(SKELETON_ARCH);
        let name = format!(
            "{}{}",
            name_from_metadata(&pkg, is_skeleton),
            pkg_suffix(pkg.metadata.uncompressed)
        );

        std::fs::create_dir_all(dir)?;
        let dest = dir.join(name);
        if dest.exists() {
            std::fs::remove_file(&dest)?;
        }
        loaded.archive_package(&dest, pkg.metadata.uncompressed)?;
        tracing::debug!(dest = %dest.display(), "collected package");
        Ok(dest)
    }
}
