//! Registry-backed remote

use async_trait::async_trait;
use oci_distribution::client::{Client, ClientConfig, ClientProtocol};
use oci_distribution::manifest::{ImageIndexEntry, OciDescriptor};
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::{Reference, RegistryOperation};
use tokio::sync::OnceCell;

use skiff_core::oci::{Descriptor, Manifest};

use super::{OCI_SCHEME, PackageRemote, RemoteConnector, registry_auth};
use crate::error::{RepoError, Result};

/// Platform used when publishing skeleton packages
pub const SKELETON_ARCH: &str = "skeleton";

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Architecture picked when the reference resolves to an index
    pub architecture: String,
    /// Talk plain HTTP instead of HTTPS
    pub plain_http: bool,
}

/// OCI registry client bound to one package reference
pub struct RegistryRemote {
    raw: String,
    reference: Reference,
    client: Client,
    auth: RegistryAuth,
    authenticated: OnceCell<()>,
}

impl RegistryRemote {
    pub fn new(url: &str, options: &RegistryOptions) -> Result<Self> {
        let reference = parse_reference(url)?;
        let auth = registry_auth(reference.resolve_registry())?;

        let architecture = options.architecture.clone();
        let config = ClientConfig {
            protocol: if options.plain_http {
                ClientProtocol::Http
            } else {
                ClientProtocol::Https
            },
            platform_resolver: Some(Box::new(move |entries: &[ImageIndexEntry]| {
                pick_platform(entries, &architecture)
            })),
            ..Default::default()
        };

        Ok(Self {
            raw: url.to_string(),
            reference,
            client: Client::new(config),
            auth,
            authenticated: OnceCell::new(),
        })
    }

    async fn ensure_auth(&self) -> Result<()> {
        self.authenticated
            .get_or_try_init(|| async {
                self.client
                    .auth(&self.reference, &self.auth, RegistryOperation::Pull)
                    .await
                    .map(|_| ())
                    .map_err(|e| RepoError::OciError {
                        message: format!("Failed to authenticate to {}: {}", self.raw, e),
                    })
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PackageRemote for RegistryRemote {
    fn reference(&self) -> &str {
        &self.raw
    }

    async fn fetch_root(&self) -> Result<Manifest> {
        let (manifest, digest) = self
            .client
            .pull_image_manifest(&self.reference, &self.auth)
            .await
            .map_err(|e| RepoError::OciError {
                message: format!("Failed to fetch manifest for {}: {}", self.raw, e),
            })?;
        tracing::debug!(reference = %self.raw, %digest, layers = manifest.layers.len(), "fetched root manifest");
        convert(&manifest)
    }

    async fn fetch_blob(&self, descriptor: &Descriptor) -> Result<Vec<u8>> {
        self.ensure_auth().await?;
        let layer: OciDescriptor = convert(descriptor)?;
        let mut data = Vec::with_capacity(descriptor.size.max(0) as usize);
        self.client
            .pull_blob(&self.reference, &layer, &mut data)
            .await
            .map_err(|e| RepoError::OciError {
                message: format!("Failed to pull {}: {}", descriptor.digest, e),
            })?;
        Ok(data)
    }
}

/// Opens [`RegistryRemote`]s
#[derive(Debug, Clone)]
pub struct RegistryConnector {
    pub options: RegistryOptions,
}

impl RemoteConnector for RegistryConnector {
    fn connect(&self, url: &str) -> Result<Box<dyn PackageRemote>> {
        Ok(Box::new(RegistryRemote::new(url, &self.options)?))
    }
}

/// Parse an `oci://registry/repo:tag` reference
pub fn parse_reference(url: &str) -> Result<Reference> {
    let clean = url.strip_prefix(OCI_SCHEME).unwrap_or(url);
    Reference::try_from(clean).map_err(|e| RepoError::InvalidOciReference {
        reference: format!("{}: {}", url, e),
    })
}

fn pick_platform(entries: &[ImageIndexEntry], architecture: &str) -> Option<String> {
    let matches = |arch: &str| {
        entries.iter().find(|e| {
            e.platform
                .as_ref()
                .is_some_and(|p| p.architecture == arch)
        })
    };
    matches(architecture)
        .or_else(|| matches(SKELETON_ARCH))
        .or_else(|| entries.first())
        .map(|e| e.digest.clone())
}

/// Convert between the wire types and ours through their shared JSON form
fn convert<T, U>(value: &T) -> Result<U>
where
    T: serde::Serialize,
    U: serde::de::DeserializeOwned,
{
    let mut json = serde_json::to_value(value)?;
    strip_nulls(&mut json);
    Ok(serde_json::from_value(json)?)
}

fn strip_nulls(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}
