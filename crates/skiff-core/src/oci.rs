//! OCI image-spec JSON documents used by the package layout and registry sources

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Media types
pub mod media_types {
    pub const IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
    pub const IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
    pub const IMAGE_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
    pub const IMAGE_LAYER: &str = "application/vnd.oci.image.layer.v1.tar";
    /// Config blob of a published skiff package
    pub const SKIFF_CONFIG: &str = "application/vnd.skiff.config.v1+json";
    /// Any file layer of a published skiff package
    pub const SKIFF_LAYER: &str = "application/vnd.skiff.layer.v1.blob";
}

/// Relative path of a package file carried by a layer
pub const TITLE_ANNOTATION: &str = "org.opencontainers.image.title";

/// Image reference an image-index entry was created from
pub const BASE_NAME_ANNOTATION: &str = "org.opencontainers.image.base.name";

/// Content of an `oci-layout` file
pub const OCI_LAYOUT_CONTENT: &str = r#"{"imageLayoutVersion":"1.0.0"}"#;

/// A content descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,

    pub digest: String,

    pub size: i64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl Descriptor {
    /// The file path recorded in the title annotation
    pub fn title(&self) -> Option<&str> {
        self.annotations.get(TITLE_ANNOTATION).map(String::as_str)
    }

    /// The image reference recorded in the base-name annotation
    pub fn base_name(&self) -> Option<&str> {
        self.annotations
            .get(BASE_NAME_ANNOTATION)
            .map(String::as_str)
    }

    /// Hex part of the digest, without the algorithm prefix
    pub fn digest_hex(&self) -> &str {
        self.digest
            .split_once(':')
            .map(|(_, hex)| hex)
            .unwrap_or(&self.digest)
    }

    pub fn is_empty(&self) -> bool {
        self.digest.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    pub architecture: String,

    pub os: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// An image manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    pub config: Descriptor,

    #[serde(default)]
    pub layers: Vec<Descriptor>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Manifest {
    /// Find the layer whose title annotation equals `path`
    pub fn locate(&self, path: &str) -> Option<&Descriptor> {
        self.layers.iter().find(|l| l.title() == Some(path))
    }
}

/// An image index (`index.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub schema_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    #[serde(default)]
    pub manifests: Vec<Descriptor>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            schema_version: 2,
            media_type: Some(media_types::IMAGE_INDEX.to_string()),
            manifests: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }
}

impl Index {
    /// Find the manifest entry created from `image` (matched on the base-name annotation)
    pub fn find_image(&self, image: &str) -> Option<&Descriptor> {
        self.manifests.iter().find(|m| m.base_name() == Some(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_locate_by_title() {
        let json = r#"{
            "schemaVersion": 2,
            "config": {"mediaType": "application/vnd.skiff.config.v1+json", "digest": "sha256:aa", "size": 2},
            "layers": [
                {"mediaType": "application/vnd.skiff.layer.v1.blob", "digest": "sha256:bb", "size": 10,
                 "annotations": {"org.opencontainers.image.title": "skiff.yaml"}},
                {"mediaType": "application/vnd.skiff.layer.v1.blob", "digest": "sha256:cc", "size": 20,
                 "annotations": {"org.opencontainers.image.title": "components/web.tar"}}
            ]
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        let web = manifest.locate("components/web.tar").unwrap();
        assert_eq!(web.digest_hex(), "cc");
        assert!(manifest.locate("components/db.tar").is_none());
    }

    #[test]
    fn test_index_find_image() {
        let mut index = Index::default();
        let mut entry = Descriptor {
            media_type: media_types::IMAGE_MANIFEST.to_string(),
            digest: "sha256:dd".to_string(),
            size: 100,
            ..Default::default()
        };
        entry
            .annotations
            .insert(BASE_NAME_ANNOTATION.to_string(), "docker.io/library/nginx:1.25".to_string());
        index.manifests.push(entry);

        assert!(index.find_image("docker.io/library/nginx:1.25").is_some());
        assert!(index.find_image("docker.io/library/nginx:1.26").is_none());
    }
}
