use std::fmt;
use std::path::Path;

use skiff_core::package::merge_by_name;
use skiff_core::{BuildData, Component, Constant, DEFINITION_FILE, SkiffPackage, Variable, paths};
use skiff_repo::PackageRemote;
use skiff_repo::oci::{self, OCI_SCHEME, SKELETON_ARCH};

use super::ResolutionContext;
use crate::error::{PackagerError, Result};

/// One resolved step of an import chain
#[derive(Debug, Clone)]
pub struct ChainNode {
    pub component: Component,
    index: usize,
    original_package_name: String,
    /// Directory of this node's package, from the head package
    pub(crate) relative_to_head: String,
    vars: Vec<Variable>,
    consts: Vec<Constant>,
}

impl ChainNode {
    /// Position of the component in its package's `components`
    pub fn index(&self) -> usize {
        self.index
    }

    /// `metadata.name` of the package the component came from
    pub fn original_package_name(&self) -> &str {
        &self.original_package_name
    }

    pub fn relative_to_head(&self) -> &str {
        &self.relative_to_head
    }
}

/// Check that an import names exactly one well-formed target
pub fn validate_import(component: &Component) -> Result<()> {
    let invalid = |message: &str| PackagerError::InvalidImport {
        component: component.name.clone(),
        message: message.to_string(),
    };
    let import = &component.import;

    match (import.path.is_empty(), import.url.is_empty()) {
        (true, true) => Err(invalid("neither a path nor a URL was provided")),
        (false, false) => Err(invalid("both a path and a URL were provided")),
        (false, true) if Path::new(&import.path).is_absolute() => {
            Err(invalid("path cannot be an absolute path"))
        }
        (true, false) if !import.url.starts_with(OCI_SCHEME) => {
            Err(invalid("URL is not a valid OCI URL"))
        }
        (true, false) if !import.url.ends_with(SKELETON_ARCH) => {
            Err(invalid("URL must end with 'skeleton'"))
        }
        _ => Ok(()),
    }
}

/// The sequence of components reached by following imports from a head
/// component. Nodes are only ever appended; the last node imports nothing.
pub struct ImportChain {
    nodes: Vec<ChainNode>,
    remote: Option<Box<dyn PackageRemote>>,
}

impl fmt::Debug for ImportChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportChain")
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

impl ImportChain {
    /// A chain holding only `head`, the component as written in the package
    /// at `index`
    pub fn new(head: Component, index: usize, package_name: &str) -> Self {
        Self {
            nodes: vec![ChainNode {
                component: head,
                index,
                original_package_name: package_name.to_string(),
                relative_to_head: ".".to_string(),
                vars: Vec::new(),
                consts: Vec::new(),
            }],
            remote: None,
        }
    }

    pub fn head(&self) -> &ChainNode {
        &self.nodes[0]
    }

    pub fn tail(&self) -> &ChainNode {
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn nodes(&self) -> &[ChainNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Where node `i` was imported from: the remote URL for a skeleton,
    /// otherwise its path from the head
    pub fn import_location(&self, i: usize) -> &str {
        match i.checked_sub(1).map(|p| &self.nodes[p].component.import.url) {
            Some(url) if !url.is_empty() => url,
            _ => &self.nodes[i].relative_to_head,
        }
    }

    /// Only the node before the tail may import remotely
    pub fn contains_oci_import(&self) -> bool {
        self.nodes.len() > 1 && self.nodes[self.nodes.len() - 2].component.import.is_remote()
    }

    /// Follow imports from the tail until a component imports nothing.
    ///
    /// On error the chain keeps every node resolved so far.
    pub async fn resolve(&mut self, ctx: &ResolutionContext, arch: &str) -> Result<()> {
        if arch.is_empty() {
            return Err(PackagerError::MissingArchitecture);
        }
        let mut history: Vec<String> = Vec::new();

        loop {
            let node = self.tail();
            let import = node.component.import.clone();
            if import.is_terminal() {
                return Ok(());
            }
            validate_import(&node.component)?;
            let name = node.component.import_name().to_string();

            let after_remote = self.nodes.len() > 1
                && self.nodes[self.nodes.len() - 2].component.import.is_remote();
            if after_remote {
                let kind = if import.is_remote() { "remote" } else { "local" };
                return Err(PackagerError::RemoteImportsOther { kind });
            }

            let (pkg, relative_to_head, origin) = if import.is_remote() {
                let remote = self.connect(ctx, &import.url).await?;
                let root = remote.fetch_root().await?;
                let pkg = oci::fetch_definition(remote, &root).await?;
                (pkg, String::new(), import.url.clone())
            } else {
                history.push(import.path.clone());
                let relative = paths::join(&history);
                if self.nodes.iter().any(|n| n.relative_to_head == relative) {
                    return Err(PackagerError::CircularImport {
                        trail: history.join(" -> "),
                    });
                }
                let definition = ctx.base_dir.join(&relative).join(DEFINITION_FILE);
                let pkg = SkiffPackage::from_file(&definition)?;
                (pkg, relative.clone(), relative)
            };

            let mut found = pkg
                .components
                .iter()
                .enumerate()
                .filter(|(_, c)| c.name == name && c.is_compatible(arch, &ctx.flavor));
            let (index, component) = match (found.next(), found.next()) {
                (Some(first), None) => first,
                (None, _) => {
                    return Err(PackagerError::ComponentNotFound { name, origin });
                }
                (Some(_), Some(_)) => {
                    return Err(PackagerError::AmbiguousComponent {
                        name,
                        origin,
                        architecture: arch.to_string(),
                    });
                }
            };

            tracing::debug!(component = %name, from = %origin, "resolved import");
            self.nodes.push(ChainNode {
                component: component.clone(),
                index,
                original_package_name: pkg.metadata.name.clone(),
                relative_to_head,
                vars: pkg.variables.clone(),
                consts: pkg.constants.clone(),
            });
        }
    }

    /// The remote for `url`, connected and checked on first use
    pub(crate) async fn connect(
        &mut self,
        ctx: &ResolutionContext,
        url: &str,
    ) -> Result<&dyn PackageRemote> {
        let remote = match self.remote.take() {
            Some(remote) => remote,
            None => {
                let remote = ctx.connector.connect(url)?;
                if let Err(source) = remote.fetch_root().await {
                    return Err(PackagerError::SkeletonNotFound {
                        url: url.to_string(),
                        source,
                    });
                }
                remote
            }
        };
        Ok(&**self.remote.insert(remote))
    }

    /// Run deprecated-field migrations on every node
    pub fn migrate(&mut self, build: &BuildData) -> Vec<String> {
        let mut warnings = Vec::new();
        for node in &mut self.nodes {
            warnings.extend(skiff_core::migrations::migrate_component(
                build,
                &mut node.component,
            ));
        }
        if !warnings.is_empty() {
            warnings.push(format!(
                "Migrations were performed on the import chain of: {:?}",
                self.head().component.name
            ));
        }
        warnings
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [ChainNode] {
        &mut self.nodes
    }

    /// Variables along the chain, outer definitions winning, folded under
    /// `existing`
    pub fn merge_variables(&self, existing: &[Variable]) -> Vec<Variable> {
        let merged = self
            .nodes
            .iter()
            .rev()
            .fold(Vec::new(), |merged, node| merge_by_name(&node.vars, &merged));
        merge_by_name(existing, &merged)
    }

    /// Constants along the chain, merged like [`Self::merge_variables`]
    pub fn merge_constants(&self, existing: &[Constant]) -> Vec<Constant> {
        let merged = self
            .nodes
            .iter()
            .rev()
            .fold(Vec::new(), |merged, node| merge_by_name(&node.consts, &merged));
        merge_by_name(existing, &merged)
    }
}

impl fmt::Display for ImportChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.head().component;
        if self.nodes.len() == 1 {
            return write!(f, "component {:?} imports nothing", head.name);
        }

        let location = |c: &Component| {
            if c.import.path.is_empty() {
                c.import.url.clone()
            } else {
                c.import.path.clone()
            }
        };
        write!(
            f,
            "component {:?} imports {:?} in {}",
            head.name,
            head.import_name(),
            location(head)
        )?;
        for node in &self.nodes[1..self.nodes.len() - 1] {
            let c = &node.component;
            write!(f, ", which imports {:?} in {}", c.import_name(), location(c))?;
        }
        Ok(())
    }
}
