//! Skiff Packager - create-time processing of package definitions
//!
//! This crate turns an authored definition into the one that gets packaged:
//! - `composer`: resolves component imports, local or from published
//!   skeletons, and folds each import chain into a single component
//! - `differential`: drops images and repos a reference package already ships
//! - `pipeline`: compose, filter and diff in one call
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use skiff_core::{SkiffConfig, SkiffPackage, filters};
//! use skiff_packager::{ResolutionContext, prepare_package};
//! use skiff_repo::RegistryConnector;
//! use skiff_repo::oci::{RegistryOptions, SKELETON_ARCH};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SkiffConfig::default();
//! let pkg = SkiffPackage::from_file("app/skiff.yaml".as_ref())?;
//! let connector = RegistryConnector {
//!     options: RegistryOptions {
//!         architecture: SKELETON_ARCH.to_string(),
//!         plain_http: false,
//!     },
//! };
//! let ctx = ResolutionContext::new("app", &config, Arc::new(connector)).with_flavor("upstream");
//!
//! let prepared = prepare_package(pkg, &ctx, filters::empty().as_ref(), None).await?;
//! for warning in &prepared.warnings {
//!     eprintln!("{warning}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod composer;
pub mod differential;
pub mod error;
pub mod pipeline;

pub use composer::{ChainNode, ImportChain, ResolutionContext, compose_components};
pub use differential::{DifferentialData, apply_differential, load_differential_data, remove_copies};
pub use error::{PackagerError, Result};
pub use pipeline::{PreparedPackage, prepare_package};
