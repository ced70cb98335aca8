//! Skiff Package Sources
//!
//! This crate materializes packages from wherever they live:
//!
//! - **OCI registries**: partial pulls of only the components being loaded
//! - **Tarballs**: local `.tar` / `.tar.zst` archives
//! - **URLs**: HTTP downloads, pinned by shasum
//! - **Split tarballs**: archives sharded into `.partNNN` files
//! - **Clusters**: definitions of packages that are already deployed
//!
//! Every source validates what it loaded against `checksums.txt` and,
//! when a public key is given, the package signature.
//!
//! ## Example
//!
//! ```rust,no_run
//! use skiff_core::{PackagePaths, SkiffConfig, filters};
//! use skiff_repo::{SourceOptions, new_source};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SkiffConfig::default();
//! let options = SourceOptions::from_config(&config, "oci://ghcr.io/acme/demo:1.0.0")?;
//! let source = new_source(options)?;
//!
//! let mut dst = PackagePaths::new("/tmp/demo");
//! let loaded = source
//!     .load_package(&mut dst, filters::by_select_state("web").as_ref(), true)
//!     .await?;
//! println!("{} components", loaded.package.components.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod oci;
pub mod sources;

pub use error::{RepoError, Result};
pub use oci::{
    MemoryConnector, MemoryRemote, PackageRemote, ProgressFn, PullProgress, RegistryConnector,
    RemoteConnector,
};
pub use sources::{
    ClusterSource, LoadedPackage, OciSource, PackageSource, SourceKind, SourceOptions,
    SplitTarballSource, TarballSource, UrlSource, identify, new_source,
};
