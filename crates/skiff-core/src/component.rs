//! Component definitions
//!
//! A component is the independently selectable unit of a package: images, charts,
//! manifests, repos, files and data injections plus the actions run around them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn is_false(b: &bool) -> bool {
    !*b
}

/// A named deployable unit within a package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Component name, unique within a package
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Selected by default in interactive deployments
    #[serde(default, skip_serializing_if = "is_false")]
    pub default: bool,

    /// Must always be deployed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Selection constraints
    #[serde(default, skip_serializing_if = "ComponentOnly::is_empty")]
    pub only: ComponentOnly,

    /// Deprecated: mutually exclusive selection group
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,

    /// Deprecated: cosign key used to verify remote files
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cosign_key_path: String,

    /// Another component this one is composed from
    #[serde(default, skip_serializing_if = "ImportDefinition::is_empty")]
    pub import: ImportDefinition,

    /// Deprecated: replaced by `actions`
    #[serde(default, skip_serializing_if = "DeprecatedScripts::is_empty")]
    pub scripts: DeprecatedScripts,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<ComponentFile>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<Chart>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manifests: Vec<Manifest>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    /// Git repositories, optionally pinned with `url@ref`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repos: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_injections: Vec<DataInjection>,

    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,

    #[serde(default, skip_serializing_if = "ComponentActions::is_empty")]
    pub actions: ComponentActions,
}

impl Component {
    /// Create an otherwise empty component with the given name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Name of the component this one imports, defaulting to its own name
    pub fn import_name(&self) -> &str {
        if self.import.name.is_empty() {
            &self.name
        } else {
            &self.import.name
        }
    }

    /// Whether this component applies to the given architecture and flavor.
    ///
    /// An unset selector on the component matches anything.
    pub fn is_compatible(&self, arch: &str, flavor: &str) -> bool {
        let arch_ok = self.only.cluster.architecture.is_empty()
            || self.only.cluster.architecture == arch;
        let flavor_ok = self.only.flavor.is_empty() || self.only.flavor == flavor;
        arch_ok && flavor_ok
    }

    /// True if any chart declares values files
    pub fn has_chart_values(&self) -> bool {
        self.charts.iter().any(|c| !c.values_files.is_empty())
    }

    /// True if the component references content that lives on the cluster
    pub fn requires_cluster(&self) -> bool {
        !self.images.is_empty()
            || !self.charts.is_empty()
            || !self.manifests.is_empty()
            || !self.repos.is_empty()
            || !self.data_injections.is_empty()
    }
}

/// Selection constraints for a component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentOnly {
    /// Only deploy from this operating system
    #[serde(rename = "localOS", default, skip_serializing_if = "String::is_empty")]
    pub local_os: String,

    #[serde(default, skip_serializing_if = "ClusterTarget::is_empty")]
    pub cluster: ClusterTarget,

    /// Only include when building this flavor
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flavor: String,
}

impl ComponentOnly {
    pub fn is_empty(&self) -> bool {
        self.local_os.is_empty() && self.cluster.is_empty() && self.flavor.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTarget {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distros: Vec<String>,
}

impl ClusterTarget {
    pub fn is_empty(&self) -> bool {
        self.architecture.is_empty() && self.distros.is_empty()
    }
}

/// Reference to a component defined in another package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDefinition {
    /// Name of the imported component, when it differs from the importer
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Relative path to a local package directory
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// `oci://` reference to a published skeleton package
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

impl ImportDefinition {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.path.is_empty() && self.url.is_empty()
    }

    /// True when neither a path nor a URL is set
    pub fn is_terminal(&self) -> bool {
        self.path.is_empty() && self.url.is_empty()
    }

    pub fn is_remote(&self) -> bool {
        !self.url.is_empty()
    }
}

/// Deprecated lifecycle scripts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeprecatedScripts {
    #[serde(default, skip_serializing_if = "is_false")]
    pub show_output: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i64>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub retry: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prepare: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<String>,
}

impl DeprecatedScripts {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// True if any script command is declared
    pub fn has_commands(&self) -> bool {
        !self.prepare.is_empty() || !self.before.is_empty() || !self.after.is_empty()
    }
}

/// A local or remote file placed on the deploying host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentFile {
    pub source: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shasum: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub executable: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symlinks: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extract_path: String,
}

/// A Helm chart to package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_path: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub local_path: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub release_name: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub no_wait: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_files: Vec<String>,
}

/// A set of raw Kubernetes manifests or kustomizations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub kustomize_allow_any_directory: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kustomizations: Vec<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub no_wait: bool,
}

/// Data pushed into a running container after deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInjection {
    pub source: String,

    #[serde(default)]
    pub target: ContainerTarget,

    #[serde(default, skip_serializing_if = "is_false")]
    pub compress: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerTarget {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub selector: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// Optional component extensions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bigbang: Option<BigBang>,
}

impl Extensions {
    pub fn is_empty(&self) -> bool {
        self.bigbang.is_none()
    }
}

/// Big Bang platform extension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BigBang {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_files: Vec<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_flux: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flux_patch_files: Vec<String>,
}

/// Actions grouped by lifecycle phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentActions {
    #[serde(default, skip_serializing_if = "ActionSet::is_empty")]
    pub on_create: ActionSet,

    #[serde(default, skip_serializing_if = "ActionSet::is_empty")]
    pub on_deploy: ActionSet,

    #[serde(default, skip_serializing_if = "ActionSet::is_empty")]
    pub on_remove: ActionSet,
}

impl ComponentActions {
    pub fn is_empty(&self) -> bool {
        self.on_create.is_empty() && self.on_deploy.is_empty() && self.on_remove.is_empty()
    }

    /// Mutable access to every action list across all phases
    pub fn lists_mut(&mut self) -> [&mut Vec<Action>; 12] {
        let [a, b, c, d] = self.on_create.lists_mut();
        let [e, f, g, h] = self.on_deploy.lists_mut();
        let [i, j, k, l] = self.on_remove.lists_mut();
        [a, b, c, d, e, f, g, h, i, j, k, l]
    }
}

/// Actions for one lifecycle phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSet {
    #[serde(default, skip_serializing_if = "ActionDefaults::is_empty")]
    pub defaults: ActionDefaults,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<Action>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<Action>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_success: Vec<Action>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_failure: Vec<Action>,
}

impl ActionSet {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn lists_mut(&mut self) -> [&mut Vec<Action>; 4] {
        [
            &mut self.before,
            &mut self.after,
            &mut self.on_success,
            &mut self.on_failure,
        ]
    }

    /// Append every list of `other` onto this set, keeping `other`'s defaults
    pub fn absorb(&mut self, other: ActionSet) {
        self.defaults = other.defaults;
        self.before.extend(other.before);
        self.after.extend(other.after);
        self.on_success.extend(other.on_success);
        self.on_failure.extend(other.on_failure);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefaults {
    #[serde(default, skip_serializing_if = "is_false")]
    pub mute: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_seconds: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i64>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dir: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub shell: BTreeMap<String, String>,
}

impl ActionDefaults {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A single command run at a lifecycle point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_seconds: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i64>,

    /// Working directory; falls back to the phase default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cmd: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub shell: BTreeMap<String, String>,

    /// Deprecated: use `setVariables`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub set_variable: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_variables: Vec<ActionVariable>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<serde_yaml::Value>,
}

impl Action {
    pub fn cmd(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            ..Default::default()
        }
    }
}

/// A variable set from an action's output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionVariable {
    pub name: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub sensitive: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_indent: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pattern: String,

    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub var_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatibility_selectors() {
        let mut c = Component::named("web");
        assert!(c.is_compatible("amd64", ""));
        assert!(c.is_compatible("arm64", "upstream"));

        c.only.cluster.architecture = "amd64".to_string();
        assert!(c.is_compatible("amd64", "upstream"));
        assert!(!c.is_compatible("arm64", ""));

        c.only.flavor = "registry1".to_string();
        assert!(c.is_compatible("amd64", "registry1"));
        assert!(!c.is_compatible("amd64", "upstream"));
    }

    #[test]
    fn test_import_name_defaults_to_own_name() {
        let mut c = Component::named("web");
        assert_eq!(c.import_name(), "web");
        c.import.name = "frontend".to_string();
        assert_eq!(c.import_name(), "frontend");
    }

    #[test]
    fn test_parse_component_yaml() {
        let yaml = r#"
name: podinfo
only:
  localOS: linux
  cluster:
    architecture: amd64
import:
  path: ../common
charts:
  - name: podinfo
    version: 6.4.0
    valuesFiles:
      - values.yaml
actions:
  onCreate:
    defaults:
      dir: scripts
    before:
      - cmd: ./prep.sh
        setVariable: PREP
"#;
        let c: Component = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.only.local_os, "linux");
        assert_eq!(c.only.cluster.architecture, "amd64");
        assert_eq!(c.import.path, "../common");
        assert_eq!(c.charts[0].values_files, vec!["values.yaml"]);
        assert_eq!(c.actions.on_create.defaults.dir, "scripts");
        assert_eq!(c.actions.on_create.before[0].set_variable, "PREP");
        assert!(c.actions.on_create.before[0].dir.is_none());

        let out = serde_yaml::to_string(&c).unwrap();
        assert!(out.contains("localOS: linux"));
        assert!(!out.contains("onDeploy"));
    }
}
