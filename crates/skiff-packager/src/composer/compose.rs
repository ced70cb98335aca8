//! Folding an import chain into one component

use std::path::Path;

use skiff_core::component::{Action, BigBang};
use skiff_core::{Component, paths};

use super::chain::ImportChain;
use super::{ResolutionContext, skeleton};
use crate::error::{PackagerError, Result};

impl ImportChain {
    /// Merge the chain into a single component, from the tail outwards.
    ///
    /// Paths are rewritten to resolve from the head package and values set
    /// by outer components win. A chain of one returns its component as is.
    pub async fn compose(&mut self, ctx: &ResolutionContext) -> Result<Component> {
        if self.len() == 1 {
            return Ok(self.tail().component.clone());
        }

        if self.contains_oci_import() {
            let url = self.nodes()[self.len() - 2].component.import.url.clone();
            let name = self.nodes()[self.len() - 2].component.import_name().to_string();
            let cache = ctx.cache_dir.clone();
            let remote = self.connect(ctx, &url).await?;
            let dir = skeleton::fetch_skeleton(remote, &url, &name, &cache).await?;
            if let Some(tail) = self.nodes_mut().last_mut() {
                tail.relative_to_head = dir.display().to_string();
            }
        }

        let mut composed = Component::default();
        for node in self.nodes().iter().rev() {
            let mut component = node.component.clone();
            fix_paths(&mut component, &node.relative_to_head, &ctx.base_dir);

            override_metadata(&mut composed, &component)?;
            override_deprecated(&mut composed, &component);
            override_resources(&mut composed, &component);
            override_actions(&mut composed, component.actions);
            compose_extensions(&mut composed, component.extensions.bigbang);
        }
        Ok(composed)
    }
}

/// Rewrite every file-like reference of `c` to resolve from the head package
pub(crate) fn fix_paths(c: &mut Component, relative_to_head: &str, base_dir: &Path) {
    let fix = |path: &mut String| *path = paths::relative_to(path, relative_to_head);

    for file in &mut c.files {
        fix(&mut file.source);
    }
    for chart in &mut c.charts {
        chart.values_files.iter_mut().for_each(fix);
        if !chart.local_path.is_empty() {
            fix(&mut chart.local_path);
        }
    }
    for manifest in &mut c.manifests {
        manifest.files.iter_mut().for_each(fix);
        for kustomization in &mut manifest.kustomizations {
            // Kustomizations may be remote in forms that are not URLs.
            let composed = paths::relative_to(kustomization, relative_to_head);
            if base_dir.join(&composed).exists() {
                *kustomization = composed;
            }
        }
    }
    for injection in &mut c.data_injections {
        fix(&mut injection.source);
    }

    let default_dir = c.actions.on_create.defaults.dir.clone();
    for list in c.actions.on_create.lists_mut() {
        fix_action_dirs(list, &default_dir, relative_to_head);
    }

    if let Some(bigbang) = &mut c.extensions.bigbang {
        bigbang.values_files.iter_mut().for_each(fix);
        bigbang.flux_patch_files.iter_mut().for_each(fix);
    }

    if !c.cosign_key_path.is_empty() {
        fix(&mut c.cosign_key_path);
    }
}

fn fix_action_dirs(actions: &mut [Action], default_dir: &str, relative_to_head: &str) {
    for action in actions {
        let dir = action.dir.as_deref().unwrap_or(default_dir);
        action.dir = Some(paths::relative_to(dir, relative_to_head));
    }
}

fn override_metadata(c: &mut Component, over: &Component) -> Result<()> {
    c.name = over.name.clone();
    c.default = over.default;
    c.required = over.required;

    if !over.description.is_empty() {
        c.description = over.description.clone();
    }

    if !over.only.local_os.is_empty() {
        if !c.only.local_os.is_empty() {
            return Err(PackagerError::LocalOsConflict {
                component: c.name.clone(),
                current: c.only.local_os.clone(),
                requested: over.only.local_os.clone(),
            });
        }
        c.only.local_os = over.only.local_os.clone();
    }
    Ok(())
}

fn override_deprecated(c: &mut Component, over: &Component) {
    if !over.cosign_key_path.is_empty() {
        c.cosign_key_path = over.cosign_key_path.clone();
    }
    c.group = over.group.clone();

    let scripts = &over.scripts;
    c.scripts.prepare.extend(scripts.prepare.iter().cloned());
    c.scripts.before.extend(scripts.before.iter().cloned());
    c.scripts.after.extend(scripts.after.iter().cloned());
    if scripts.retry {
        c.scripts.retry = true;
    }
    if scripts.show_output {
        c.scripts.show_output = true;
    }
    if scripts.timeout_seconds.is_some_and(|t| t > 0) {
        c.scripts.timeout_seconds = scripts.timeout_seconds;
    }
}

fn override_resources(c: &mut Component, over: &Component) {
    c.data_injections.extend(over.data_injections.iter().cloned());
    c.files.extend(over.files.iter().cloned());
    c.images.extend(over.images.iter().cloned());
    c.repos.extend(over.repos.iter().cloned());

    for chart in &over.charts {
        match c.charts.iter_mut().find(|existing| existing.name == chart.name) {
            Some(existing) => {
                if !chart.namespace.is_empty() {
                    existing.namespace = chart.namespace.clone();
                }
                if !chart.release_name.is_empty() {
                    existing.release_name = chart.release_name.clone();
                }
                existing.values_files.extend(chart.values_files.iter().cloned());
            }
            None => c.charts.push(chart.clone()),
        }
    }

    for manifest in &over.manifests {
        match c.manifests.iter_mut().find(|existing| existing.name == manifest.name) {
            Some(existing) => {
                if !manifest.namespace.is_empty() {
                    existing.namespace = manifest.namespace.clone();
                }
                existing.files.extend(manifest.files.iter().cloned());
                existing
                    .kustomizations
                    .extend(manifest.kustomizations.iter().cloned());
            }
            None => c.manifests.push(manifest.clone()),
        }
    }
}

fn override_actions(c: &mut Component, over: skiff_core::ComponentActions) {
    c.actions.on_create.absorb(over.on_create);
    c.actions.on_deploy.absorb(over.on_deploy);
    c.actions.on_remove.absorb(over.on_remove);
}

fn compose_extensions(c: &mut Component, over: Option<BigBang>) {
    let Some(over) = over else {
        return;
    };
    match &mut c.extensions.bigbang {
        None => c.extensions.bigbang = Some(over),
        Some(existing) => {
            if !over.version.is_empty() {
                existing.version = over.version;
            }
            if !over.repo.is_empty() {
                existing.repo = over.repo;
            }
            existing.values_files.extend(over.values_files);
            existing.flux_patch_files.extend(over.flux_patch_files);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{context, write_package};
    use super::*;
    use skiff_core::component::{ActionDefaults, Chart, ComponentFile, DataInjection, Manifest};
    use skiff_core::layout::PackagePaths;
    use skiff_repo::{MemoryConnector, MemoryRemote};
    use tempfile::TempDir;

    fn dummy(name: &str, import_dir: &str, sub_name: &str) -> Component {
        let mut c = Component::named(format!("import-{name}"));
        c.import.path = import_dir.to_string();
        c.files = vec![ComponentFile {
            source: format!("{name}.txt"),
            ..Default::default()
        }];
        c.charts = vec![Chart {
            name: sub_name.to_string(),
            local_path: "chart".to_string(),
            values_files: vec!["values.yaml".to_string()],
            ..Default::default()
        }];
        c.manifests = vec![Manifest {
            name: sub_name.to_string(),
            files: vec!["manifest.yaml".to_string()],
            ..Default::default()
        }];
        c.data_injections = vec![DataInjection {
            source: name.to_string(),
            ..Default::default()
        }];
        for (set, suffix) in [
            (&mut c.actions.on_create, "c"),
            (&mut c.actions.on_deploy, "d"),
            (&mut c.actions.on_remove, "r"),
        ] {
            set.defaults = ActionDefaults {
                dir: format!("{name}-d{suffix}"),
                ..Default::default()
            };
            set.before = vec![Action::cmd(format!("{name}-b{suffix}"))];
            set.after = vec![Action::cmd(format!("{name}-a{suffix}"))];
        }
        c.extensions.bigbang = Some(BigBang {
            values_files: vec!["values.yaml".to_string()],
            flux_patch_files: vec!["patch.yaml".to_string()],
            ..Default::default()
        });
        c
    }

    /// hello imports world from `hello`, which imports today from `world`
    fn three_node_tree(base: &Path) -> ImportChain {
        let world = dummy("world", "world", "world");
        let mut today = dummy("today", "", "hello");
        today.import = Default::default();
        write_package(
            &base.join("hello"),
            &serde_yaml::to_string(&skiff_core::SkiffPackage {
                components: vec![Component {
                    name: "import-hello".to_string(),
                    ..world
                }],
                ..Default::default()
            })
            .unwrap(),
        );
        write_package(
            &base.join("hello/world"),
            &serde_yaml::to_string(&skiff_core::SkiffPackage {
                components: vec![Component {
                    name: "import-hello".to_string(),
                    ..today
                }],
                ..Default::default()
            })
            .unwrap(),
        );
        ImportChain::new(dummy("hello", "hello", "hello"), 0, "test-package")
    }

    #[tokio::test]
    async fn test_single_node_is_unchanged() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), MemoryConnector::default());
        let mut component = Component::named("no-import");
        component.files = vec![ComponentFile {
            source: "a.txt".to_string(),
            ..Default::default()
        }];
        let mut chain = ImportChain::new(component.clone(), 0, "pkg");
        chain.resolve(&ctx, "amd64").await.unwrap();
        assert_eq!(chain.compose(&ctx).await.unwrap(), component);
    }

    #[tokio::test]
    async fn test_compose_three_nodes() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), MemoryConnector::default());
        let mut chain = three_node_tree(temp.path());
        chain.resolve(&ctx, "amd64").await.unwrap();
        assert_eq!(chain.len(), 3);

        let composed = chain.compose(&ctx).await.unwrap();
        assert_eq!(composed.name, "import-hello");
        assert!(composed.import.is_empty());

        let sources: Vec<_> = composed.files.iter().map(|f| f.source.as_str()).collect();
        assert_eq!(sources, vec!["hello/world/today.txt", "hello/world.txt", "hello.txt"]);

        assert_eq!(composed.charts.len(), 2);
        assert_eq!(composed.charts[0].name, "hello");
        assert_eq!(composed.charts[0].local_path, "hello/world/chart");
        assert_eq!(
            composed.charts[0].values_files,
            vec!["hello/world/values.yaml", "values.yaml"]
        );
        assert_eq!(composed.charts[1].name, "world");
        assert_eq!(composed.charts[1].values_files, vec!["hello/values.yaml"]);

        assert_eq!(
            composed.manifests[0].files,
            vec!["hello/world/manifest.yaml", "manifest.yaml"]
        );
        let injections: Vec<_> = composed
            .data_injections
            .iter()
            .map(|d| d.source.as_str())
            .collect();
        assert_eq!(injections, vec!["hello/world/today", "hello/world", "hello"]);

        let on_create = &composed.actions.on_create;
        assert_eq!(on_create.defaults.dir, "hello-dc");
        let dirs: Vec<_> = on_create
            .before
            .iter()
            .map(|a| (a.cmd.as_str(), a.dir.as_deref()))
            .collect();
        assert_eq!(
            dirs,
            vec![
                ("today-bc", Some("hello/world/today-dc")),
                ("world-bc", Some("hello/world-dc")),
                ("hello-bc", Some("hello-dc")),
            ]
        );

        let on_deploy = &composed.actions.on_deploy;
        assert_eq!(on_deploy.defaults.dir, "hello-dd");
        assert!(on_deploy.before.iter().all(|a| a.dir.is_none()));
        let cmds: Vec<_> = composed.actions.on_remove.after.iter().map(|a| a.cmd.as_str()).collect();
        assert_eq!(cmds, vec!["today-ar", "world-ar", "hello-ar"]);

        let bigbang = composed.extensions.bigbang.unwrap();
        assert_eq!(
            bigbang.flux_patch_files,
            vec!["hello/world/patch.yaml", "hello/patch.yaml", "patch.yaml"]
        );
    }

    #[tokio::test]
    async fn test_outer_values_win() {
        let temp = TempDir::new().unwrap();
        write_package(
            &temp.path().join("sub"),
            r#"
components:
  - name: web
    description: inner
    default: true
    only: {localOS: linux}
    charts:
      - {name: c, namespace: inner, releaseName: inner}
"#,
        );
        let ctx = context(temp.path(), MemoryConnector::default());
        let mut head = Component::named("web");
        head.import.path = "sub".to_string();
        head.charts = vec![Chart {
            name: "c".to_string(),
            namespace: "outer".to_string(),
            ..Default::default()
        }];

        let mut chain = ImportChain::new(head.clone(), 0, "pkg");
        chain.resolve(&ctx, "amd64").await.unwrap();
        let composed = chain.compose(&ctx).await.unwrap();
        assert_eq!(composed.description, "inner");
        assert!(!composed.default);
        assert_eq!(composed.only.local_os, "linux");
        assert_eq!(composed.charts.len(), 1);
        assert_eq!(composed.charts[0].namespace, "outer");
        assert_eq!(composed.charts[0].release_name, "inner");

        head.only.local_os = "windows".to_string();
        let mut chain = ImportChain::new(head, 0, "pkg");
        chain.resolve(&ctx, "amd64").await.unwrap();
        assert!(matches!(
            chain.compose(&ctx).await,
            Err(PackagerError::LocalOsConflict { .. })
        ));
    }

    #[test]
    fn test_fix_paths_leaves_urls_and_missing_kustomizations() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("sub/kustomize")).unwrap();

        let mut c = Component::named("web");
        c.files = vec![ComponentFile {
            source: "https://example.com/f.txt".to_string(),
            ..Default::default()
        }];
        c.manifests = vec![Manifest {
            name: "m".to_string(),
            kustomizations: vec!["kustomize".to_string(), "github.com/org/repo//base".to_string()],
            ..Default::default()
        }];
        c.cosign_key_path = "cosign.pub".to_string();

        fix_paths(&mut c, "sub", temp.path());
        assert_eq!(c.files[0].source, "https://example.com/f.txt");
        assert_eq!(
            c.manifests[0].kustomizations,
            vec!["sub/kustomize", "github.com/org/repo//base"]
        );
        assert_eq!(c.cosign_key_path, "sub/cosign.pub");
    }

    #[tokio::test]
    async fn test_remote_skeleton_is_cached_and_rewritten() {
        let temp = TempDir::new().unwrap();
        let url = "oci://ghcr.io/acme/common:1.0.0-skeleton";

        let skel_dir = temp.path().join("skel");
        let mut paths = PackagePaths::new(&skel_dir);
        let mut inner = Component::named("web");
        inner.files = vec![ComponentFile {
            source: "files/config.yaml".to_string(),
            ..Default::default()
        }];
        let created = paths.components.create(&inner).unwrap();
        std::fs::write(created.base.join("files/config.yaml"), "key: value").unwrap();
        paths.components.archive(&inner, true).unwrap();
        skiff_core::SkiffPackage {
            components: vec![inner],
            ..Default::default()
        }
        .write_to(&paths.definition)
        .unwrap();
        paths.generate_checksums().unwrap();

        let mut connector = MemoryConnector::default();
        connector.insert(url, MemoryRemote::from_layout(url, &paths).unwrap());
        let work = temp.path().join("work");
        let ctx = context(&work, connector);

        let mut head = Component::named("web");
        head.import.url = url.to_string();
        let mut chain = ImportChain::new(head, 0, "pkg");
        chain.resolve(&ctx, "amd64").await.unwrap();
        let composed = chain.compose(&ctx).await.unwrap();

        let source = Path::new(&composed.files[0].source);
        assert!(source.starts_with(work.join(".cache/oci/dirs")));
        assert_eq!(std::fs::read_to_string(source).unwrap(), "key: value");
    }
}
