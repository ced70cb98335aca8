//! Import chain resolution and composition
//!
//! A component may import another component's definition from a local
//! package directory or from a skeleton published to an OCI registry. The
//! chain of imports is resolved into an [`ImportChain`] and then folded from
//! the deepest import outwards into one effective component.

mod chain;
mod compose;
mod skeleton;

pub use chain::{ChainNode, ImportChain, validate_import};
pub use skeleton::fetch_skeleton;

use std::path::PathBuf;
use std::sync::Arc;

use skiff_core::{SkiffConfig, SkiffPackage};
use skiff_repo::RemoteConnector;

use crate::error::Result;

/// Everything resolution reads besides the definition itself
#[derive(Clone)]
pub struct ResolutionContext {
    /// Directory of the package being composed; local imports resolve from here
    pub base_dir: PathBuf,
    /// Root of the skeleton cache
    pub cache_dir: PathBuf,
    /// Used when the definition does not set `metadata.architecture`
    pub architecture: String,
    pub flavor: String,
    /// Opens remote skeletons named by `import.url`
    pub connector: Arc<dyn RemoteConnector>,
}

impl ResolutionContext {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        config: &SkiffConfig,
        connector: Arc<dyn RemoteConnector>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache_dir: config.cache_dir.clone(),
            architecture: config.architecture.clone(),
            flavor: String::new(),
            connector,
        }
    }

    pub fn with_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.flavor = flavor.into();
        self
    }
}

/// Compose every component of `pkg` that matches the target architecture
/// and flavor, returning the composed package and any migration warnings
pub async fn compose_components(
    mut pkg: SkiffPackage,
    ctx: &ResolutionContext,
) -> Result<(SkiffPackage, Vec<String>)> {
    let arch = if pkg.metadata.architecture.is_empty() {
        ctx.architecture.clone()
    } else {
        pkg.metadata.architecture.clone()
    };

    let mut components = Vec::new();
    let mut warnings = Vec::new();
    let mut variables = std::mem::take(&mut pkg.variables);
    let mut constants = std::mem::take(&mut pkg.constants);

    for (index, component) in pkg.components.iter().enumerate() {
        if !component.is_compatible(&arch, &ctx.flavor) {
            tracing::debug!(component = %component.name, arch = %arch, flavor = %ctx.flavor, "skipping incompatible component");
            continue;
        }

        // Selectors have done their job once a match is found.
        let mut head = component.clone();
        head.only.cluster.architecture.clear();
        head.only.flavor.clear();

        let mut chain = ImportChain::new(head, index, &pkg.metadata.name);
        chain.resolve(ctx, &arch).await?;
        tracing::debug!("{chain}");

        warnings.extend(chain.migrate(&pkg.build));
        components.push(chain.compose(ctx).await?);

        variables = chain.merge_variables(&variables);
        constants = chain.merge_constants(&constants);
    }

    pkg.components = components;
    pkg.variables = variables;
    pkg.constants = constants;
    Ok((pkg, warnings))
}


#[cfg(test)]
mod tests {
    use super::testutil::{context, write_package};
    use super::*;
    use skiff_repo::MemoryConnector;
    use tempfile::TempDir;

    const ROOT: &str = r#"
kind: SkiffPackageConfig
metadata:
  name: root
  architecture: amd64
variables:
  - name: DOMAIN
    default: root.example
components:
  - name: web
    required: true
    import:
      path: sub
  - name: arm-only
    only:
      cluster:
        architecture: arm64
  - name: upstream
    only:
      flavor: upstream
    images:
      - nginx:1.25
"#;

    const SUB: &str = r#"
kind: SkiffPackageConfig
metadata:
  name: sub
variables:
  - name: DOMAIN
    default: sub.example
  - name: SUB_ONLY
    default: sub
constants:
  - name: VERSION
    value: "1.0"
components:
  - name: web
    description: from sub
    files:
      - source: f.txt
        target: /etc/f.txt
    charts:
      - name: c
        version: 1.0.0
        localPath: chart
        valuesFiles:
          - values.yaml
    scripts:
      before:
        - ./legacy.sh
"#;

    #[tokio::test]
    async fn test_compose_components_snapshot() {
        let temp = TempDir::new().unwrap();
        write_package(temp.path(), ROOT);
        write_package(&temp.path().join("sub"), SUB);

        let pkg = SkiffPackage::from_file(&temp.path().join("skiff.yaml")).unwrap();
        let ctx = context(temp.path(), MemoryConnector::default()).with_flavor("upstream");
        let (composed, warnings) = compose_components(pkg, &ctx).await.unwrap();

        assert_eq!(warnings.len(), 2);
        assert_eq!(
            warnings[1],
            "Migrations were performed on the import chain of: \"web\""
        );
        let web = serde_yaml::to_string(&composed.components[0]).unwrap();
        insta::assert_snapshot!(web, @r"
        name: web
        description: from sub
        required: true
        scripts:
          before:
          - ./legacy.sh
        files:
        - source: sub/f.txt
          target: /etc/f.txt
        charts:
        - name: c
          version: 1.0.0
          localPath: sub/chart
          valuesFiles:
          - sub/values.yaml
        actions:
          onDeploy:
            before:
            - cmd: ./legacy.sh
        ");
        let names: Vec<_> = composed.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["web", "upstream"]);
        assert!(composed.components[1].only.flavor.is_empty());
    }

    #[tokio::test]
    async fn test_compose_components_drops_other_flavors() {
        let temp = TempDir::new().unwrap();
        write_package(temp.path(), ROOT);
        write_package(&temp.path().join("sub"), SUB);

        let pkg = SkiffPackage::from_file(&temp.path().join("skiff.yaml")).unwrap();
        let ctx = context(temp.path(), MemoryConnector::default());
        let (composed, _) = compose_components(pkg, &ctx).await.unwrap();

        let names: Vec<_> = composed.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["web"]);
        assert_eq!(composed.variables[0].default, "root.example");
        assert_eq!(composed.variables[1].name, "SUB_ONLY");
        assert_eq!(composed.constants[0].name, "VERSION");
    }
}
