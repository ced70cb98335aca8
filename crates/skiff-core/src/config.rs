//! User configuration
//!
//! Stored in `~/.config/skiff/config.yaml`. A missing file yields defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Packages built before this version may use the legacy layout
pub const DEFAULT_LEGACY_CUTOVER: &str = "0.25.0";

pub const DEFAULT_OCI_CONCURRENCY: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkiffConfig {
    /// Skeleton and blob cache
    pub cache_dir: PathBuf,

    /// Parent directory for package scratch space, system temp when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,

    /// Concurrent layer downloads per package
    pub oci_concurrency: usize,

    /// Allow URL downloads without an expected shasum
    pub insecure: bool,

    pub legacy_cutover: String,

    pub architecture: String,

    /// Public key used to verify signed packages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PathBuf>,
}

impl Default for SkiffConfig {
    fn default() -> Self {
        Self {
            cache_dir: dirs::cache_dir()
                .map(|d| d.join("skiff"))
                .unwrap_or_else(|| PathBuf::from(".skiff-cache")),
            temp_dir: None,
            oci_concurrency: DEFAULT_OCI_CONCURRENCY,
            insecure: false,
            legacy_cutover: DEFAULT_LEGACY_CUTOVER.to_string(),
            architecture: host_architecture().to_string(),
            public_key: None,
        }
    }
}

impl SkiffConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CoreError::path_io("read", path, e))?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::path_io("create", parent, e))?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(|e| CoreError::path_io("write", path, e))?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| CoreError::Config {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("skiff").join("config.yaml"))
    }

    /// Parsed legacy cutover version
    pub fn legacy_cutover(&self) -> Result<semver::Version> {
        Ok(semver::Version::parse(
            self.legacy_cutover.trim_start_matches('v'),
        )?)
    }

    fn validate(&self) -> Result<()> {
        if self.oci_concurrency == 0 {
            return Err(CoreError::Config {
                message: "ociConcurrency must be at least 1".to_string(),
            });
        }
        self.legacy_cutover()?;
        Ok(())
    }
}

/// Host architecture in package naming (`amd64`, `arm64`)
pub fn host_architecture() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    }
}
