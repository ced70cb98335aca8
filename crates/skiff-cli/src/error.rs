//! CLI error types with exit code handling
//!
//! Library errors are sorted into a few categories, each with its own exit
//! code and, where there is something useful to say, a help line.

use miette::Diagnostic;
use skiff_core::CoreError;
use skiff_packager::PackagerError;
use skiff_repo::RepoError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Invalid package definition or layout
    #[error("Package error: {message}")]
    #[diagnostic(code(skiff::cli::package))]
    Package {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Import chain could not be resolved or composed
    #[error("Import error: {message}")]
    #[diagnostic(code(skiff::cli::import))]
    Import {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Checksum or signature verification failed
    #[error("Integrity check failed: {message}")]
    #[diagnostic(code(skiff::cli::integrity))]
    Integrity {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Registry, HTTP or cluster failure
    #[error("Remote error: {message}")]
    #[diagnostic(code(skiff::cli::remote))]
    Remote { message: String },

    /// Invalid arguments
    #[error("{message}")]
    #[diagnostic(code(skiff::cli::input))]
    Input {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(skiff::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(skiff::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Package { .. } => exit_codes::PACKAGE_ERROR,
            CliError::Import { .. } => exit_codes::IMPORT_ERROR,
            CliError::Integrity { .. } => exit_codes::INTEGRITY_ERROR,
            CliError::Remote { .. } => exit_codes::REMOTE_ERROR,
            CliError::Input { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an input error (user provided invalid input)
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: None,
        }
    }

    /// Create an input error with help text
    pub fn input_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    fn package(message: impl Into<String>) -> Self {
        Self::Package {
            message: message.into(),
            help: None,
        }
    }

    fn integrity(message: impl Into<String>, help: Option<&str>) -> Self {
        Self::Integrity {
            message: message.into(),
            help: help.map(str::to_string),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Io(_) | CoreError::PathIo { .. } => CliError::Io { message },
            CoreError::SignatureInvalid { .. } => CliError::integrity(message, None),
            CoreError::LocalOsRequired => CliError::input(message),
            _ => CliError::package(message),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        let message = err.to_string();
        match err {
            RepoError::Core(core) => core.into(),
            RepoError::Io(_) => CliError::Io { message },
            RepoError::UnidentifiedSource { .. } => CliError::input_with_help(
                message,
                "use an oci:// reference, an http(s):// or sget:// URL, a .tar or .tar.zst file, or a .part000 shard",
            ),
            RepoError::ShasumRequired => CliError::input_with_help(
                message,
                "pass --shasum, or --insecure to skip the check",
            ),
            RepoError::SignedButNoKey => {
                CliError::integrity(message, Some("pass the signer's public key with --key"))
            }
            RepoError::AggregateChecksumMismatch { .. }
            | RepoError::DuplicateChecksum { .. }
            | RepoError::MissingFromPackage { .. }
            | RepoError::UncheckedFile { .. }
            | RepoError::ChecksumMismatch { .. }
            | RepoError::KeyButUnsigned
            | RepoError::DigestMismatch { .. }
            | RepoError::SplitPackage { .. } => CliError::integrity(message, None),
            RepoError::OciError { .. }
            | RepoError::LayerNotFound { .. }
            | RepoError::HttpError { .. }
            | RepoError::NetworkError { .. }
            | RepoError::Timeout { .. }
            | RepoError::PackageNotDeployed { .. }
            | RepoError::Kube { .. } => CliError::Remote { message },
            RepoError::Task(_) => CliError::internal(message),
            _ => CliError::package(message),
        }
    }
}

impl From<PackagerError> for CliError {
    fn from(err: PackagerError) -> Self {
        if err.is_resolution_error() {
            return CliError::Import {
                message: err.to_string(),
                help: Some("run with --debug to see the resolved import chain".to_string()),
            };
        }
        let message = err.to_string();
        match err {
            PackagerError::Core(core) => core.into(),
            PackagerError::Repo(repo) => repo.into(),
            PackagerError::Io(_) => CliError::Io { message },
            PackagerError::SkeletonNotFound { .. } => CliError::Remote { message },
            PackagerError::SameVersion { .. } | PackagerError::MissingVersion => {
                CliError::input_with_help(
                    message,
                    "set a metadata.version that differs from the reference package",
                )
            }
            _ => CliError::Import {
                message,
                help: None,
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_category() {
        let err: CliError = RepoError::SignedButNoKey.into();
        assert_eq!(err.exit_code(), exit_codes::INTEGRITY_ERROR);

        let err: CliError = PackagerError::CircularImport {
            trail: "a -> a".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::IMPORT_ERROR);

        let err: CliError = PackagerError::Repo(RepoError::HttpError {
            status: 404,
            message: "not found".to_string(),
        })
        .into();
        assert_eq!(err.exit_code(), exit_codes::REMOTE_ERROR);

        let err: CliError = CoreError::LocalOsRequired.into();
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
    }
}
