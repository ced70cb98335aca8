//! Core error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Package definition not found: {path}")]
    DefinitionNotFound { path: String },

    #[error("Invalid package: {message}")]
    InvalidPackage { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O failure tied to a specific path and operation
    #[error("{op} {}: {source}", path.display())]
    PathIo {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),

    // ============ Filter Errors ============
    #[error("localOS is required")]
    LocalOsRequired,

    #[error("error applying filter {filter}: {source}")]
    Filter {
        filter: String,
        #[source]
        source: Box<CoreError>,
    },

    // ============ Layout Errors ============
    #[error("{op} {name}: not loaded")]
    ComponentNotLoaded { op: &'static str, name: String },

    #[error("component {name:?} is already archived to {}, use unarchive instead", tarball.display())]
    ComponentAlreadyArchived { name: String, tarball: PathBuf },

    #[error("Invalid blob digest: {digest:?}")]
    InvalidDigest { digest: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Legacy layout migration failed: {message}")]
    LegacyMigration { message: String },

    // ============ Reference Errors ============
    #[error("Invalid image reference {reference:?}: {message}")]
    InvalidImageReference { reference: String, message: String },

    // ============ Signing Errors ============
    #[error("Signing error: {message}")]
    Signing { message: String },

    #[error("Signature verification failed: {message}")]
    SignatureInvalid { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Wrap an I/O error with the operation and path that produced it
    pub fn path_io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PathIo {
            op,
            path: path.into(),
            source,
        }
    }

    /// True when a component was not registered in the expected state
    pub fn is_not_loaded(&self) -> bool {
        matches!(self, Self::ComponentNotLoaded { .. })
    }

    /// True when this error reports a missing path
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io(e) | Self::PathIo { source: e, .. } => {
                e.kind() == std::io::ErrorKind::NotFound
            }
            Self::DefinitionNotFound { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
