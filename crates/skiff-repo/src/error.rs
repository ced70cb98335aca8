//! Error types for package sources

use skiff_core::CoreError;
use thiserror::Error;

/// Package source errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Source Errors ============
    #[error("could not identify source type for {input:?}")]
    UnidentifiedSource { input: String },

    #[error(
        "remote package provided without a shasum, use --insecure to ignore, or provide one w/ --shasum"
    )]
    ShasumRequired,

    #[error("{operation} is not implemented for {kind} sources")]
    NotImplemented {
        operation: &'static str,
        kind: &'static str,
    },

    #[error("invalid package name {name:?}")]
    InvalidPackageName { name: String },

    #[error("{path:?} does not contain a skiff.yaml")]
    MissingDefinition { path: String },

    #[error("split package error: {message}")]
    SplitPackage { message: String },

    #[error("component {name} does not exist in this package")]
    UnknownComponent { name: String },

    // ============ Integrity Errors ============
    #[error("unable to validate checksums, {file} was not loaded")]
    NotLoaded { file: &'static str },

    #[error("mismatch on aggregate checksum, expected {expected}, got {actual}")]
    AggregateChecksumMismatch { expected: String, actual: String },

    #[error("duplicate path found in checksums.txt: {path}")]
    DuplicateChecksum { path: String },

    #[error("unable to validate checksums, {path} is listed but not found in the package")]
    MissingFromPackage { path: String },

    #[error("unable to validate checksums, {path} was not checked")]
    UncheckedFile { path: String },

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    // ============ Signature Errors ============
    #[error(
        "package is signed but no key was provided - add a key with the --key flag and run the command again"
    )]
    SignedButNoKey,

    #[error(
        "a key was provided but the package is not signed - the package may be corrupted or the --key flag was erroneously specified"
    )]
    KeyButUnsigned,

    // ============ OCI Errors ============
    #[error("OCI registry error: {message}")]
    OciError { message: String },

    #[error("Invalid OCI reference: {reference}")]
    InvalidOciReference { reference: String },

    #[error("{path} not found in {reference}")]
    LayerNotFound { reference: String, path: String },

    #[error("digest mismatch for {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    // ============ Network Errors ============
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },

    // ============ Cluster Errors ============
    #[error("package {name} is not deployed")]
    PackageNotDeployed { name: String },

    #[error("Kubernetes error: {message}")]
    Kube { message: String },

    // ============ Wrapped Errors ============
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Result type for package source operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl RepoError {
    /// A signed package was loaded without a public key
    pub fn is_signed_but_no_key(&self) -> bool {
        matches!(self, RepoError::SignedButNoKey)
    }

    /// Whether the error reports missing data rather than bad data
    pub fn is_not_found(&self) -> bool {
        match self {
            RepoError::Core(e) => e.is_not_found(),
            RepoError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            RepoError::LayerNotFound { .. } | RepoError::PackageNotDeployed { .. } => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout { seconds: 30 }
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<oci_distribution::errors::OciDistributionError> for RepoError {
    fn from(e: oci_distribution::errors::OciDistributionError) -> Self {
        RepoError::OciError {
            message: e.to_string(),
        }
    }
}

impl From<kube::Error> for RepoError {
    fn from(e: kube::Error) -> Self {
        RepoError::Kube {
            message: e.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for RepoError {
    fn from(e: tokio::task::JoinError) -> Self {
        RepoError::Task(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_but_no_key_is_distinguished() {
        assert!(RepoError::SignedButNoKey.is_signed_but_no_key());
        assert!(!RepoError::KeyButUnsigned.is_signed_but_no_key());
    }

    #[test]
    fn test_not_found_sees_through_core() {
        let err: RepoError = CoreError::DefinitionNotFound {
            path: "skiff.yaml".to_string(),
        }
        .into();
        assert!(err.is_not_found());
        assert!(!RepoError::ShasumRequired.is_not_found());
    }
}
