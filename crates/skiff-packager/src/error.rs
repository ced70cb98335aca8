//! Error types for composition and differential builds

use skiff_core::CoreError;
use skiff_repo::RepoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackagerError {
    // ============ Import Chain Errors ============
    #[error("cannot build import chain: architecture must be provided")]
    MissingArchitecture,

    #[error("invalid import definition in the {component} component: {message}")]
    InvalidImport { component: String, message: String },

    #[error("detected malformed import chain, cannot import {kind} components from remote components")]
    RemoteImportsOther { kind: &'static str },

    #[error("component {name:?} not found in {origin:?}")]
    ComponentNotFound { name: String, origin: String },

    #[error("multiple components named {name:?} found in {origin:?} satisfying {architecture:?}")]
    AmbiguousComponent {
        name: String,
        origin: String,
        architecture: String,
    },

    #[error("detected circular import chain: {trail}")]
    CircularImport { trail: String },

    #[error("published skeleton package for {url:?} does not exist: {source}")]
    SkeletonNotFound {
        url: String,
        #[source]
        source: RepoError,
    },

    // ============ Compose Errors ============
    #[error("component {component:?}: \"only.localOS\" {current:?} cannot be redefined as {requested:?} during compose")]
    LocalOsConflict {
        component: String,
        current: String,
        requested: String,
    },

    // ============ Differential Errors ============
    #[error("unable to build differential package, both the package and the reference package must have a version")]
    MissingVersion,

    #[error("unable to build differential package when it has the same version as the reference package ({version})")]
    SameVersion { version: String },

    #[error("unable to parse image ref {image}: {source}")]
    InvalidImage {
        image: String,
        #[source]
        source: CoreError,
    },

    // ============ Wrapped Errors ============
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PackagerError>;

impl PackagerError {
    /// Resolution failed because of the shape of the chain rather than I/O
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            PackagerError::InvalidImport { .. }
                | PackagerError::RemoteImportsOther { .. }
                | PackagerError::ComponentNotFound { .. }
                | PackagerError::AmbiguousComponent { .. }
                | PackagerError::CircularImport { .. }
        )
    }
}
