//! Package sources
//!
//! A source materializes a package layout from one transport and validates
//! it. Every source offers the same three operations:
//!
//! - `load_package`: the filtered components, ready to deploy
//! - `load_package_metadata`: only the definition (and SBOMs on request)
//! - `collect`: the package as one local archive, without loading it
//!
//! URL and split sources materialize a local archive and then delegate to
//! the tarball source.

mod cluster;
mod oci;
mod split;
mod tarball;
mod url;
mod validate;

pub use cluster::{
    ClusterSource, DeployedPackage, DeployedPackageReader, SecretReader, validate_package_name,
};
pub use oci::OciSource;
pub use split::{SplitPackageData, SplitTarballSource, split_archive};
pub use tarball::TarballSource;
pub use url::UrlSource;
pub use validate::{validate_integrity, validate_signature};

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use skiff_core::archive;
use skiff_core::layout::DEFINITION_FILE;
use skiff_core::{ComponentFilter, PackageKind, PackagePaths, SkiffConfig, SkiffPackage};

use crate::error::{RepoError, Result};

/// A loaded definition together with the warnings loading produced
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPackage {
    pub package: SkiffPackage,
    pub warnings: Vec<String>,
}

#[async_trait]
pub trait PackageSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Populate `dst` with the components `filter` selects and validate them
    async fn load_package(
        &self,
        dst: &mut PackagePaths,
        filter: &dyn ComponentFilter,
        unarchive_all: bool,
    ) -> Result<LoadedPackage>;

    /// Populate `dst` with the definition, checksums and signature only.
    ///
    /// With `skip_validation`, a signed package loaded without a key is a
    /// warning instead of an error.
    async fn load_package_metadata(
        &self,
        dst: &mut PackagePaths,
        want_sbom: bool,
        skip_validation: bool,
    ) -> Result<LoadedPackage>;

    /// Write the package as a single archive into `dir`, returning its path
    async fn collect(&self, dir: &Path) -> Result<PathBuf>;
}

/// Transport a package source string refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Oci,
    Url,
    Tarball,
    Split,
    Cluster,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oci => "oci",
            Self::Url => "url",
            Self::Tarball => "tarball",
            Self::Split => "split",
            Self::Cluster => "cluster",
        }
    }
}

/// Schemes fetched over HTTP
pub const URL_SCHEMES: [&str; 3] = ["http", "https", "sget"];

/// Settings every source is constructed with
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// What to load: a path, URL or `oci://` reference
    pub package_source: String,
    /// Expected sha256 of the package archive
    pub shasum: Option<String>,
    pub public_key: Option<PathBuf>,
    /// Allow URL downloads without an expected shasum
    pub insecure: bool,
    pub oci_concurrency: usize,
    pub architecture: String,
    /// Parent for scratch directories, the system default when unset
    pub temp_dir: Option<PathBuf>,
    pub legacy_cutover: semver::Version,
    pub plain_http: bool,
}

impl SourceOptions {
    pub fn from_config(config: &SkiffConfig, package_source: impl Into<String>) -> Result<Self> {
        Ok(Self {
            package_source: package_source.into(),
            shasum: None,
            public_key: config.public_key.clone(),
            insecure: config.insecure,
            oci_concurrency: config.oci_concurrency,
            architecture: config.architecture.clone(),
            temp_dir: config.temp_dir.clone(),
            legacy_cutover: config.legacy_cutover()?,
            plain_http: false,
        })
    }

    /// A scratch directory, removed on drop
    pub(crate) fn make_temp_dir(&self) -> Result<tempfile::TempDir> {
        let dir = match &self.temp_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                tempfile::Builder::new().prefix("skiff-").tempdir_in(parent)?
            }
            None => tempfile::Builder::new().prefix("skiff-").tempdir()?,
        };
        Ok(dir)
    }
}

/// Identify the transport of a package source string
pub fn identify(package_source: &str) -> Option<SourceKind> {
    if skiff_core::paths::is_url(package_source) {
        let scheme = package_source.split_once("://").map(|(s, _)| s)?;
        return match scheme {
            "oci" => Some(SourceKind::Oci),
            s if URL_SCHEMES.contains(&s) => Some(SourceKind::Url),
            _ => None,
        };
    }
    if package_source.contains(".part000") {
        return Some(SourceKind::Split);
    }
    if package_source.ends_with(".tar.zst") || package_source.ends_with(".tar") {
        return Some(SourceKind::Tarball);
    }
    None
}

/// Build the source for `options.package_source`.
///
/// Cluster sources are never identified from a string; see
/// [`ClusterSource::new`].
pub fn new_source(options: SourceOptions) -> Result<Box<dyn PackageSource>> {
    let kind = identify(&options.package_source);
    tracing::debug!(source = %options.package_source, kind = ?kind, "identified package source");

    match kind {
        Some(SourceKind::Oci) => {
            let mut options = options;
            if let Some(shasum) = options.shasum.as_deref().filter(|s| !s.is_empty()) {
                options.package_source = format!("{}@sha256:{}", options.package_source, shasum);
            }
            Ok(Box::new(OciSource::connect(options)?))
        }
        Some(SourceKind::Url) => Ok(Box::new(UrlSource::new(options))),
        Some(SourceKind::Tarball) => Ok(Box::new(TarballSource::new(options))),
        Some(SourceKind::Split) => Ok(Box::new(SplitTarballSource::new(options))),
        Some(SourceKind::Cluster) | None => Err(RepoError::UnidentifiedSource {
            input: options.package_source,
        }),
    }
}

/// Archive file name (without suffix) for a package
pub fn name_from_metadata(pkg: &SkiffPackage, is_skeleton: bool) -> String {
    let arch = if is_skeleton {
        crate::oci::SKELETON_ARCH
    } else {
        pkg.architecture()
    };

    let mut name = match pkg.kind {
        PackageKind::SkiffInitConfig => format!("skiff-init-{arch}"),
        PackageKind::SkiffPackageConfig => {
            format!("skiff-package-{}-{arch}", pkg.metadata.name)
        }
    };

    if pkg.build.differential {
        name.push_str(&format!(
            "-{}-differential-{}",
            pkg.build.differential_package_version, pkg.metadata.version
        ));
    } else if !pkg.metadata.version.is_empty() {
        name.push_str(&format!("-{}", pkg.metadata.version));
    }
    name
}

/// Archive suffix for a package
pub fn pkg_suffix(uncompressed: bool) -> &'static str {
    if uncompressed { ".tar" } else { ".tar.zst" }
}

/// Rename a package archive after the definition it contains, returning
/// the new path
pub fn rename_from_metadata(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = if file_name.ends_with(".tar.zst") {
        ".tar.zst"
    } else if file_name.ends_with(".tar") {
        ".tar"
    } else if archive::is_zstd(path)? {
        ".tar.zst"
    } else {
        ".tar"
    };

    let missing = || RepoError::MissingDefinition {
        path: path.display().to_string(),
    };
    let data = archive::find_file(path, DEFINITION_FILE)?.ok_or_else(missing)?;
    let pkg: SkiffPackage = serde_yaml::from_slice(&data)?;
    if pkg.metadata.name.is_empty() {
        return Err(missing());
    }

    let renamed = path.with_file_name(format!("{}{}", name_from_metadata(&pkg, false), ext));
    move_file(path, &renamed)?;
    tracing::debug!(from = %path.display(), to = %renamed.display(), "renamed package from metadata");
    Ok(renamed)
}

/// Rename, falling back to copy and remove across filesystems
pub(crate) fn move_file(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

/// The steps every local load shares once files are in place: legacy
/// migration, definition load, filtering, validation and unarchiving
pub(crate) fn finish_load(
    dst: &mut PackagePaths,
    options: &SourceOptions,
    filter: &dyn ComponentFilter,
    partial: bool,
    unarchive_all: bool,
) -> Result<LoadedPackage> {
    dst.migrate_legacy(&options.legacy_cutover)?;
    let (mut pkg, warnings) = dst.load_definition()?;
    pkg.components = filter.apply(&pkg)?;

    if !dst.is_legacy_layout() {
        validate_integrity(dst, &pkg.metadata.aggregate_checksum, partial)?;
        validate_signature(dst, options.public_key.as_deref())?;
    }

    if unarchive_all {
        dst.components.unarchive_or_create_all(&pkg.components)?;
        if dst.sboms.path.is_some() {
            dst.sboms.unarchive()?;
        }
    }

    Ok(LoadedPackage {
        package: pkg,
        warnings,
    })
}

/// The metadata counterpart of [`finish_load`]
pub(crate) fn finish_metadata(
    dst: &mut PackagePaths,
    options: &SourceOptions,
    want_sbom: bool,
    skip_validation: bool,
) -> Result<LoadedPackage> {
    dst.migrate_legacy(&options.legacy_cutover)?;
    let (pkg, warnings) = dst.load_definition()?;

    if !dst.is_legacy_layout() {
        if want_sbom {
            validate_integrity(dst, &pkg.metadata.aggregate_checksum, true)?;
        }
        match validate_signature(dst, options.public_key.as_deref()) {
            Err(e) if e.is_signed_but_no_key() && skip_validation => {
                tracing::warn!(
                    "The package was signed but no public key was provided, skipping signature validation"
                );
            }
            other => other?,
        }
    }

    if want_sbom && dst.sboms.path.is_some() {
        dst.sboms.unarchive()?;
    }

    Ok(LoadedPackage {
        package: pkg,
        warnings,
    })
}
