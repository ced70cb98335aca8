//! Package definition (`skiff.yaml`)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::component::Component;
use crate::error::{CoreError, Result};

/// File name of the package definition
pub const DEFINITION_FILE: &str = "skiff.yaml";

/// A complete package definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkiffPackage {
    #[serde(default)]
    pub kind: PackageKind,

    #[serde(default)]
    pub metadata: PackageMetadata,

    #[serde(default, skip_serializing_if = "BuildData::is_empty")]
    pub build: BuildData,

    #[serde(default)]
    pub components: Vec<Component>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<Constant>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,
}

/// Package type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageKind {
    #[default]
    SkiffPackageConfig,
    SkiffInitConfig,
}

impl PackageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkiffPackageConfig => "SkiffPackageConfig",
            Self::SkiffInitConfig => "SkiffInitConfig",
        }
    }
}

/// Package metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Archive without zstd compression
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub uncompressed: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub yolo: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authors: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub documentation: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vendor: String,

    /// sha256 of `checksums.txt`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aggregate_checksum: String,
}

/// Provenance recorded when the package was built
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub terminal: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timestamp: String,

    /// Version of the tool that built the package
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Deprecated-field migrations already applied
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub migrations: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub registry_overrides: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub differential: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub differential_package_version: String,

    /// Components dropped because the reference package already carried them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub differential_missing: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_non_breaking_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flavor: String,
}

impl BuildData {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A deploy-time variable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub prompt: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_indent: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pattern: String,

    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub var_type: String,
}

/// A build-time constant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constant {
    pub name: String,

    #[serde(default)]
    pub value: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_indent: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pattern: String,
}

/// Anything with a name that can be merged by name
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Variable {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Constant {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Keep every entry of `first`, then append entries of `second` whose name
/// does not appear in `first`.
pub fn merge_by_name<T: Named + Clone>(first: &[T], second: &[T]) -> Vec<T> {
    let mut merged = first.to_vec();
    for item in second {
        if !first.iter().any(|f| f.name() == item.name()) {
            merged.push(item.clone());
        }
    }
    merged
}

impl SkiffPackage {
    /// Read a definition file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::DefinitionNotFound {
                path: path.display().to_string(),
            });
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| CoreError::path_io("read", path, e))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Write the definition as YAML, creating parent directories
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::path_io("create", parent, e))?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(|e| CoreError::path_io("write", path, e))?;
        Ok(())
    }

    pub fn is_init_config(&self) -> bool {
        self.kind == PackageKind::SkiffInitConfig
    }

    /// Architecture the package targets, preferring explicit metadata
    pub fn architecture(&self) -> &str {
        if !self.metadata.architecture.is_empty() {
            &self.metadata.architecture
        } else {
            &self.build.architecture
        }
    }

    /// Every image referenced by any component
    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.components
            .iter()
            .flat_map(|c| c.images.iter().map(String::as_str))
    }

    pub fn has_images(&self) -> bool {
        self.images().next().is_some()
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Whether a named deprecated-field migration is recorded
    pub fn has_migration(&self, id: &str) -> bool {
        self.build.migrations.iter().any(|m| m == id)
    }
}
