//! Skiff Core - types and on-disk layout for air-gapped deployment bundles
//!
//! This crate provides the pieces every other skiff crate builds on:
//! - `SkiffPackage` / `Component`: the package definition
//! - `PackagePaths`: the layout of a package instance on disk
//! - `ComponentFilter`: reduce a definition to the components to load
//! - checksums, minisign signing and deprecated-field migrations
//! - image and git reference parsing

pub mod archive;
pub mod checksums;
pub mod component;
pub mod config;
pub mod error;
pub mod filters;
pub mod layout;
pub mod migrations;
pub mod oci;
pub mod package;
pub mod paths;
pub mod reference;
pub mod signing;

pub use component::{
    Action, ActionDefaults, ActionSet, BigBang, Chart, Component, ComponentActions,
    ComponentFile, DataInjection, ImportDefinition, Manifest,
};
pub use config::SkiffConfig;
pub use error::{CoreError, Result};
pub use filters::ComponentFilter;
pub use layout::PackagePaths;
pub use package::{
    BuildData, Constant, DEFINITION_FILE, PackageKind, PackageMetadata, SkiffPackage, Variable,
};
pub use reference::ImageRef;
