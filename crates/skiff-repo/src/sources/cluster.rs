//! Package already deployed to a cluster
//!
//! Only the definition survives deployment, so the cluster can answer
//! metadata queries but has no archive to load or collect.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::Client;
use kube::api::Api;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use skiff_core::{ComponentFilter, PackagePaths, SkiffPackage};

use super::{LoadedPackage, PackageSource, SourceKind, SourceOptions};
use crate::error::{RepoError, Result};

/// Namespace holding deployed package records
pub const STATE_NAMESPACE: &str = "skiff";

/// Secret name prefix for deployed package records
pub const SECRET_PREFIX: &str = "skiff-package-";

static PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("valid regex"));

/// Package names are lowercase letters, digits and hyphens, not starting
/// with a hyphen
pub fn validate_package_name(name: &str) -> Result<()> {
    if PACKAGE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(RepoError::InvalidPackageName {
            name: name.to_string(),
        })
    }
}

/// Status of one deployed component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedComponent {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub observed_generation: u64,
}

/// Record of a deployment, as stored in the cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedPackage {
    pub name: String,
    pub data: SkiffPackage,
    #[serde(default)]
    pub cli_version: String,
    #[serde(default)]
    pub generation: u64,
    #[serde(default)]
    pub deployed_components: Vec<DeployedComponent>,
}

/// Reads deployment records from cluster state
#[async_trait]
pub trait DeployedPackageReader: Send + Sync {
    async fn get_deployed_package(&self, name: &str) -> Result<DeployedPackage>;
}

/// Reads deployment records from Kubernetes Secrets
pub struct SecretReader {
    client: Client,
    namespace: String,
}

impl SecretReader {
    /// Connect using the ambient kubeconfig
    pub async fn new() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            namespace: STATE_NAMESPACE.to_string(),
        }
    }

    fn secrets_api(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl DeployedPackageReader for SecretReader {
    async fn get_deployed_package(&self, name: &str) -> Result<DeployedPackage> {
        let key = format!("{SECRET_PREFIX}{name}");
        let secret = match self.secrets_api().get(&key).await {
            Ok(secret) => secret,
            Err(kube::Error::Api(e)) if e.code == 404 => {
                return Err(RepoError::PackageNotDeployed {
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let data = secret
            .data
            .as_ref()
            .and_then(|d| d.get("data"))
            .ok_or_else(|| RepoError::Kube {
                message: format!("secret {key} has no data"),
            })?;
        Ok(serde_json::from_slice(&data.0)?)
    }
}

pub struct ClusterSource {
    options: SourceOptions,
    reader: Box<dyn DeployedPackageReader>,
}

impl ClusterSource {
    /// `options.package_source` names the deployed package
    pub fn new(options: SourceOptions, reader: Box<dyn DeployedPackageReader>) -> Result<Self> {
        validate_package_name(&options.package_source)?;
        Ok(Self { options, reader })
    }

    /// Read from the Secrets of the current kube context
    pub async fn connect(options: SourceOptions) -> Result<Self> {
        validate_package_name(&options.package_source)?;
        let reader = SecretReader::new().await?;
        Self::new(options, Box::new(reader))
    }
}

#[async_trait]
impl PackageSource for ClusterSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Cluster
    }

    async fn load_package(
        &self,
        _dst: &mut PackagePaths,
        _filter: &dyn ComponentFilter,
        _unarchive_all: bool,
    ) -> Result<LoadedPackage> {
        Err(RepoError::NotImplemented {
            operation: "load_package",
            kind: "cluster",
        })
    }

    async fn load_package_metadata(
        &self,
        dst: &mut PackagePaths,
        _want_sbom: bool,
        _skip_validation: bool,
    ) -> Result<LoadedPackage> {
        let deployed = self
            .reader
            .get_deployed_package(&self.options.package_source)
            .await?;
        std::fs::create_dir_all(&dst.base)?;
        deployed.data.write_to(&dst.definition)?;
        tracing::debug!(
            package = %deployed.name,
            generation = deployed.generation,
            "loaded deployed package definition"
        );
        Ok(LoadedPackage {
            package: deployed.data,
            warnings: Vec::new(),
        })
    }

    async fn collect(&self, _dir: &Path) -> Result<PathBuf> {
        Err(RepoError::NotImplemented {
            operation: "collect",
            kind: "cluster",
        })
    }
}
