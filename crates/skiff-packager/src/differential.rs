//! Differential packages
//!
//! A differential package leaves out the images and git repositories that a
//! previously built reference package already ships. Floating image tags and
//! repositories that are not pinned to a tag or commit are always kept, since
//! their content may have moved since the reference was built.

use std::collections::HashSet;

use skiff_core::reference::{self, RepoPin};
use skiff_core::{Component, ImageRef, PackagePaths, SkiffPackage};
use skiff_repo::{SourceOptions, new_source};

use crate::error::{PackagerError, Result};

/// What a reference package already carries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DifferentialData {
    /// Normalized image references
    pub images: HashSet<String>,
    /// Repository URLs exactly as written, including any `@ref`
    pub repos: HashSet<String>,
    pub version: String,
    /// Component names of the reference package
    pub components: Vec<String>,
}

impl DifferentialData {
    /// Collect the images and repos of every component of `pkg`
    pub fn from_package(pkg: &SkiffPackage) -> Result<Self> {
        let mut data = Self {
            version: pkg.metadata.version.clone(),
            ..Default::default()
        };
        for component in &pkg.components {
            for image in &component.images {
                data.images.insert(normalize_image(image)?);
            }
            data.repos.extend(component.repos.iter().cloned());
            data.components.push(component.name.clone());
        }
        Ok(data)
    }
}

/// Load the metadata of the reference package at `options.package_source`.
///
/// Only the definition is pulled, into a scratch directory that is removed
/// before returning.
pub async fn load_differential_data(options: SourceOptions) -> Result<DifferentialData> {
    let temp = match &options.temp_dir {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            tempfile::Builder::new().prefix("skiff-diff-").tempdir_in(parent)?
        }
        None => tempfile::Builder::new().prefix("skiff-diff-").tempdir()?,
    };

    let source = new_source(options)?;
    let mut layout = PackagePaths::new(temp.path());
    let loaded = source.load_package_metadata(&mut layout, false, false).await?;
    for warning in &loaded.warnings {
        tracing::warn!("{warning}");
    }

    let data = DifferentialData::from_package(&loaded.package)?;
    tracing::debug!(
        version = %data.version,
        images = data.images.len(),
        repos = data.repos.len(),
        "loaded differential reference"
    );
    Ok(data)
}

/// Drop images and repos from `components` that the reference already ships
pub fn remove_copies(components: Vec<Component>, data: &DifferentialData) -> Result<Vec<Component>> {
    components
        .into_iter()
        .map(|mut component| -> Result<Component> {
            let mut images = Vec::with_capacity(component.images.len());
            for image in component.images {
                let parsed = ImageRef::parse(&image).map_err(|source| PackagerError::InvalidImage {
                    image: image.clone(),
                    source,
                })?;
                if parsed.is_floating() || !data.images.contains(&parsed.to_string()) {
                    images.push(image);
                } else {
                    tracing::debug!(component = %component.name, image = %image, "image already in reference package");
                }
            }

            let mut repos = Vec::with_capacity(component.repos.len());
            for repo in component.repos {
                let (_, git_ref) = reference::split_repo_ref(&repo)?;
                let pinned = git_ref.is_some_and(|r| reference::classify_ref(&r) != RepoPin::Other);
                if !pinned || !data.repos.contains(&repo) {
                    repos.push(repo);
                } else {
                    tracing::debug!(component = %component.name, repo = %repo, "repo already in reference package");
                }
            }

            component.images = images;
            component.repos = repos;
            Ok(component)
        })
        .collect()
}

/// Turn `pkg` into a differential package against `data`.
///
/// Both packages must carry a version and the versions must differ, so the
/// differential can be told apart from its reference.
pub fn apply_differential(mut pkg: SkiffPackage, data: &DifferentialData) -> Result<SkiffPackage> {
    if pkg.metadata.version.is_empty() || data.version.is_empty() {
        return Err(PackagerError::MissingVersion);
    }
    if pkg.metadata.version == data.version {
        return Err(PackagerError::SameVersion {
            version: data.version.clone(),
        });
    }

    pkg.components = remove_copies(pkg.components, data)?;
    pkg.build.differential = true;
    pkg.build.differential_package_version = data.version.clone();
    pkg.build.differential_missing = data
        .components
        .iter()
        .filter(|name| pkg.component(name).is_none())
        .cloned()
        .collect();
    Ok(pkg)
}

fn normalize_image(image: &str) -> Result<String> {
    ImageRef::parse(image)
        .map(|r| r.to_string())
        .map_err(|source| PackagerError::InvalidImage {
            image: image.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    const LIB: &str = "https://github.com/acme/lib.git@c74e1b3ba9a8fd19e2bb8a0d59d3a2e5e8d37c2f";

    fn package(version: &str, components: Vec<Component>) -> SkiffPackage {
        let mut pkg = SkiffPackage::default();
        pkg.metadata.name = "diff".to_string();
        pkg.metadata.version = version.to_string();
        pkg.components = components;
        pkg
    }

    fn with_content(name: &str, images: &[&str], repos: &[&str]) -> Component {
        let mut c = Component::named(name);
        c.images = images.iter().map(|s| s.to_string()).collect();
        c.repos = repos.iter().map(|s| s.to_string()).collect();
        c
    }

    fn reference() -> DifferentialData {
        DifferentialData::from_package(&package(
            "v0.25.0",
            vec![
                with_content("images", &["registry.example.com/x:tag1", "nginx:1.25"], &[]),
                with_content(
                    "repos",
                    &[],
                    &[
                        "https://github.com/acme/app.git@refs/tags/v1.0.0",
                        LIB,
                        "https://github.com/acme/main.git@refs/heads/main",
                        "https://github.com/acme/plain.git",
                    ],
                ),
            ],
        ))
        .unwrap()
    }

    #[test]
    fn test_images_already_shipped_are_dropped() {
        let components = vec![with_content(
            "c",
            &[
                "registry.example.com/x:tag1",
                "registry.example.com/x:latest",
                "registry.example.com/y:tag2",
            ],
            &[],
        )];
        let pruned = remove_copies(components, &reference()).unwrap();
        assert_eq!(
            pruned[0].images,
            vec!["registry.example.com/x:latest", "registry.example.com/y:tag2"]
        );
    }

    #[test]
    fn test_image_references_are_normalized() {
        let components = vec![with_content(
            "c",
            &["docker.io/library/nginx:1.25", "nginx:stable"],
            &[],
        )];
        let pruned = remove_copies(components, &reference()).unwrap();
        assert_eq!(pruned[0].images, vec!["nginx:stable"]);
    }

    #[test]
    fn test_only_pinned_repos_are_dropped() {
        let repos = [
            "https://github.com/acme/app.git@refs/tags/v1.0.0",
            LIB,
            "https://github.com/acme/main.git@refs/heads/main",
            "https://github.com/acme/plain.git",
            "https://github.com/acme/app.git@refs/tags/v1.1.0",
        ];
        let pruned = remove_copies(vec![with_content("c", &[], &repos)], &reference()).unwrap();
        assert_eq!(
            pruned[0].repos,
            vec![
                "https://github.com/acme/main.git@refs/heads/main",
                "https://github.com/acme/plain.git",
                "https://github.com/acme/app.git@refs/tags/v1.1.0",
            ]
        );
    }

    #[test]
    fn test_invalid_image_is_reported() {
        let err = remove_copies(vec![with_content("c", &["Not/Valid:!"], &[])], &reference())
            .unwrap_err();
        assert!(matches!(err, PackagerError::InvalidImage { ref image, .. } if image == "Not/Valid:!"));
    }

    #[test]
    fn test_apply_records_build_data() {
        let pkg = package(
            "v0.26.0",
            vec![with_content(
                "images",
                &["registry.example.com/x:tag1", "registry.example.com/y:tag2"],
                &[],
            )],
        );
        let diff = apply_differential(pkg, &reference()).unwrap();
        assert!(diff.build.differential);
        assert_eq!(diff.build.differential_package_version, "v0.25.0");
        assert_eq!(diff.build.differential_missing, vec!["repos"]);
        assert_eq!(diff.components[0].images, vec!["registry.example.com/y:tag2"]);
    }

    #[test]
    fn test_apply_requires_distinct_versions() {
        let err = apply_differential(package("v0.25.0", vec![]), &reference()).unwrap_err();
        assert!(matches!(err, PackagerError::SameVersion { ref version } if version == "v0.25.0"));

        let err = apply_differential(package("", vec![]), &reference()).unwrap_err();
        assert!(matches!(err, PackagerError::MissingVersion));
    }

    fn archive_reference(dir: &Path) -> std::path::PathBuf {
        let paths = PackagePaths::new(dir.join("build"));
        let mut pkg = package(
            "v0.25.0",
            vec![with_content("images", &["registry.example.com/x:tag1"], &[])],
        );
        pkg.metadata.architecture = "amd64".to_string();
        pkg.build.migrations = skiff_core::migrations::ALL
            .iter()
            .map(|m| m.to_string())
            .collect();
        pkg.write_to(&paths.definition).unwrap();
        pkg.metadata.aggregate_checksum = paths.generate_checksums().unwrap();
        pkg.write_to(&paths.definition).unwrap();

        let tarball = dir.join("skiff-package-diff-amd64-v0.25.0.tar.zst");
        paths.archive_package(&tarball, false).unwrap();
        tarball
    }

    #[tokio::test]
    async fn test_load_from_tarball_reference() {
        let temp = TempDir::new().unwrap();
        let tarball = archive_reference(temp.path());

        let mut config = skiff_core::SkiffConfig::default();
        config.temp_dir = Some(temp.path().join("tmp"));
        let options = SourceOptions::from_config(&config, tarball.display().to_string()).unwrap();

        let data = load_differential_data(options).await.unwrap();
        assert_eq!(data.version, "v0.25.0");
        assert!(data.images.contains("registry.example.com/x:tag1"));
        assert_eq!(data.components, vec!["images"]);
        assert_eq!(std::fs::read_dir(temp.path().join("tmp")).unwrap().count(), 0);
    }
}
