//! Per-component directories and tarballs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::archive;
use crate::component::Component;
use crate::error::{CoreError, Result};

pub const FILES_DIR: &str = "files";
pub const CHARTS_DIR: &str = "charts";
pub const VALUES_DIR: &str = "values";
pub const REPOS_DIR: &str = "repos";
pub const MANIFESTS_DIR: &str = "manifests";
pub const DATA_INJECTIONS_DIR: &str = "data-injections";
pub const TEMP_DIR: &str = ".temp";

/// Directory tree of one expanded component.
///
/// Content directories are only set when the component declares that kind
/// of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentPaths {
    pub base: PathBuf,
    pub temp: PathBuf,
    pub files: Option<PathBuf>,
    pub charts: Option<PathBuf>,
    pub values: Option<PathBuf>,
    pub repos: Option<PathBuf>,
    pub manifests: Option<PathBuf>,
    pub data_injections: Option<PathBuf>,
}

impl ComponentPaths {
    fn declared(base: PathBuf, component: &Component) -> Self {
        let sub = |present: bool, dir: &str| present.then(|| base.join(dir));
        Self {
            temp: base.join(TEMP_DIR),
            files: sub(!component.files.is_empty(), FILES_DIR),
            charts: sub(!component.charts.is_empty(), CHARTS_DIR),
            values: sub(component.has_chart_values(), VALUES_DIR),
            repos: sub(!component.repos.is_empty(), REPOS_DIR),
            manifests: sub(!component.manifests.is_empty(), MANIFESTS_DIR),
            data_injections: sub(!component.data_injections.is_empty(), DATA_INJECTIONS_DIR),
            base,
        }
    }

    fn content_dirs(&self) -> impl Iterator<Item = &PathBuf> {
        [
            &self.files,
            &self.charts,
            &self.values,
            &self.repos,
            &self.manifests,
            &self.data_injections,
        ]
        .into_iter()
        .flatten()
    }
}

/// Where a component currently lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Directory(ComponentPaths),
    Tarball(PathBuf),
}

/// Registry of component locations below `components/`
#[derive(Debug, Clone, Default)]
pub struct Components {
    pub base: PathBuf,
    states: BTreeMap<String, ComponentState>,
}

impl Components {
    pub fn new(base: PathBuf) -> Self {
        Self {
            base,
            states: BTreeMap::new(),
        }
    }

    pub fn state(&self, name: &str) -> Option<&ComponentState> {
        self.states.get(name)
    }

    /// Expanded directory of a component, if it is not archived
    pub fn dir(&self, name: &str) -> Option<&ComponentPaths> {
        match self.states.get(name) {
            Some(ComponentState::Directory(paths)) => Some(paths),
            _ => None,
        }
    }

    /// Registered tarballs by component name
    pub fn tarballs(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.states.iter().filter_map(|(name, state)| match state {
            ComponentState::Tarball(tb) => Some((name.as_str(), tb.as_path())),
            ComponentState::Directory(_) => None,
        })
    }

    /// Register a tarball found on disk or in a registry listing
    pub fn register_tarball(&mut self, name: impl Into<String>, tarball: PathBuf) {
        self.states
            .insert(name.into(), ComponentState::Tarball(tarball));
    }

    /// Build the directory tree for a component.
    ///
    /// Fails when the component is registered as a tarball; unarchive it instead.
    pub fn create(&mut self, component: &Component) -> Result<ComponentPaths> {
        let name = &component.name;
        if let Some(ComponentState::Tarball(tarball)) = self.states.get(name) {
            return Err(CoreError::ComponentAlreadyArchived {
                name: name.clone(),
                tarball: tarball.clone(),
            });
        }

        let paths = ComponentPaths::declared(self.base.join(name), component);
        for dir in std::iter::once(&paths.temp).chain(paths.content_dirs()) {
            std::fs::create_dir_all(dir).map_err(|e| CoreError::path_io("create", dir, e))?;
        }

        self.states
            .insert(name.clone(), ComponentState::Directory(paths.clone()));
        Ok(paths)
    }

    /// Archive a component directory into `<name>.tar`.
    ///
    /// An empty directory is removed without producing a tarball and the
    /// component is dropped from the registry.
    pub fn archive(&mut self, component: &Component, cleanup_temp: bool) -> Result<()> {
        let name = &component.name;
        let Some(ComponentState::Directory(paths)) = self.states.get(name).cloned() else {
            return Err(CoreError::ComponentNotLoaded {
                op: "check dir map for",
                name: name.clone(),
            });
        };

        if cleanup_temp {
            let _ = std::fs::remove_dir_all(&paths.temp);
        }

        let size = archive::dir_size(&paths.base)?;
        if size > 0 {
            let tarball = PathBuf::from(format!("{}.tar", paths.base.display()));
            tracing::debug!(component = %name, "archiving component");
            archive::create_tar(&paths.base, &tarball, Some(name))?;
            self.states
                .insert(name.clone(), ComponentState::Tarball(tarball));
        } else {
            tracing::debug!(component = %name, "component is empty, skipping archive");
            self.states.remove(name);
        }

        std::fs::remove_dir_all(&paths.base)
            .map_err(|e| CoreError::path_io("remove", &paths.base, e))
    }

    /// Extract a component tarball back into its directory.
    ///
    /// A directory that already exists is kept as is.
    pub fn unarchive(&mut self, component: &Component) -> Result<()> {
        let name = &component.name;
        let Some(ComponentState::Tarball(tarball)) = self.states.get(name).cloned() else {
            return Err(CoreError::ComponentNotLoaded {
                op: "check tarball map for",
                name: name.clone(),
            });
        };

        if !tarball.exists() {
            return Err(CoreError::path_io(
                "stat",
                &tarball,
                std::io::ErrorKind::NotFound.into(),
            ));
        }

        let paths = ComponentPaths::declared(self.base.join(name), component);
        let exists = paths.base.exists();
        self.states
            .insert(name.clone(), ComponentState::Directory(paths));

        if exists {
            tracing::debug!(component = %name, "component already unarchived");
            return Ok(());
        }

        tracing::debug!(tarball = %tarball.display(), "unarchiving component");
        archive::extract(&tarball, &self.base, 0)?;
        std::fs::remove_file(&tarball).map_err(|e| CoreError::path_io("remove", &tarball, e))
    }

    /// Unarchive every component, creating directories for those never archived
    pub fn unarchive_or_create_all(&mut self, components: &[Component]) -> Result<()> {
        for component in components {
            match self.unarchive(component) {
                Ok(()) => {}
                Err(e) if e.is_not_loaded() => {
                    self.create(component)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Archive every expanded component
    pub fn archive_all(&mut self, components: &[Component], cleanup_temp: bool) -> Result<()> {
        for component in components {
            if self.dir(&component.name).is_some() {
                self.archive(component, cleanup_temp)?;
            }
        }
        Ok(())
    }
}
