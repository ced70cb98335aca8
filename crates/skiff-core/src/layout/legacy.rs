//! Migration of the pre-checksum package layout
//!
//! Old packages carry a flat `sboms/` directory and every image in a single
//! docker-save `images.tar`. Both are moved into the current layout, and a
//! directory is created for every component.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::PackagePaths;
use super::images::Images;
use super::sboms::SBOM_DIR;
use crate::archive;
use crate::error::{CoreError, Result};
use crate::oci::{BASE_NAME_ANNOTATION, Descriptor, Index, Manifest, media_types};
use crate::package::SkiffPackage;
use crate::reference::ImageRef;

const LEGACY_IMAGES_TAR: &str = "images.tar";

/// One entry of a docker-save `manifest.json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SavedImage {
    config: String,
    #[serde(default)]
    repo_tags: Vec<String>,
    #[serde(default)]
    layers: Vec<String>,
}

impl PackagePaths {
    /// Convert a legacy layout in place.
    ///
    /// A package is legacy when it has neither a checksums file nor a
    /// signature and was built before `cutover`. Anything else is left alone.
    pub fn migrate_legacy(&mut self, cutover: &semver::Version) -> Result<()> {
        if self.checksums.exists() || self.signature.is_some() {
            return Ok(());
        }
        let pkg = SkiffPackage::from_file(&self.definition)?;
        if !built_before(&pkg.build.version, cutover)? {
            return Ok(());
        }
        self.legacy = true;
        tracing::debug!(version = %pkg.build.version, "migrating legacy package layout");

        let legacy_sboms = self.base.join(SBOM_DIR);
        if legacy_sboms.exists() {
            self.add_sboms();
            if let Some(target) = self.sboms.path.clone().filter(|p| *p != legacy_sboms) {
                tracing::debug!(from = %legacy_sboms.display(), to = %target.display(), "migrating SBOMs");
                std::fs::rename(&legacy_sboms, &target)
                    .map_err(|e| CoreError::path_io("rename", &legacy_sboms, e))?;
            }
        }

        let legacy_images = self.base.join(LEGACY_IMAGES_TAR);
        if legacy_images.exists() {
            self.add_images();
            tracing::debug!(from = %legacy_images.display(), to = %self.images.base.display(), "migrating images");
            let tags: Vec<String> = pkg.images().map(str::to_string).collect();
            convert_docker_archive(&mut self.images, &legacy_images, &tags)?;
            std::fs::remove_file(&legacy_images)
                .map_err(|e| CoreError::path_io("remove", &legacy_images, e))?;
        }

        for component in &pkg.components {
            self.components.create(component)?;
        }
        Ok(())
    }

    pub fn is_legacy_layout(&self) -> bool {
        self.legacy
    }
}

/// An empty build version never counts as legacy
fn built_before(version: &str, cutover: &semver::Version) -> Result<bool> {
    if version.is_empty() {
        return Ok(false);
    }
    let built = semver::Version::parse(version.trim_start_matches('v'))?;
    Ok(built < *cutover)
}

/// Re-encode every requested tag of a docker-save archive as an OCI image
/// with an uncompressed layer per saved layer
fn convert_docker_archive(images: &mut Images, tarball: &Path, tags: &[String]) -> Result<()> {
    let files = archive::read_all_files(tarball)?;
    let saved: Vec<SavedImage> = serde_json::from_slice(read(&files, "manifest.json")?)?;

    let mut index = images.read_index()?;
    let mut tag_to_digest = BTreeMap::new();

    for tag in tags {
        let image = find_saved(&saved, tag).ok_or_else(|| CoreError::LegacyMigration {
            message: format!("image {tag} not found in {LEGACY_IMAGES_TAR}"),
        })?;

        let config_data = read(&files, &image.config)?;
        let config = Descriptor {
            media_type: media_types::IMAGE_CONFIG.to_string(),
            digest: images.write_blob(config_data)?,
            size: config_data.len() as i64,
            ..Default::default()
        };

        let mut layers = Vec::with_capacity(image.layers.len());
        for layer_path in &image.layers {
            let data = read(&files, layer_path)?;
            layers.push(Descriptor {
                media_type: media_types::IMAGE_LAYER.to_string(),
                digest: images.write_blob(data)?,
                size: data.len() as i64,
                ..Default::default()
            });
        }

        let manifest = Manifest {
            schema_version: 2,
            media_type: Some(media_types::IMAGE_MANIFEST.to_string()),
            config,
            layers,
            annotations: BTreeMap::new(),
        };
        let manifest_data = serde_json::to_vec(&manifest)?;
        let digest = images.write_blob(&manifest_data)?;
        images.add_image(&manifest, &digest)?;

        index.manifests.retain(|m| m.base_name() != Some(tag.as_str()));
        index.manifests.push(Descriptor {
            media_type: media_types::IMAGE_MANIFEST.to_string(),
            digest: digest.clone(),
            size: manifest_data.len() as i64,
            ..Default::default()
        });
        tag_to_digest.insert(tag.clone(), digest);
    }

    annotate_base_names(&mut index, &tag_to_digest);
    images.write_index(&index)
}

fn annotate_base_names(index: &mut Index, tag_to_digest: &BTreeMap<String, String>) {
    for entry in &mut index.manifests {
        if let Some((tag, _)) = tag_to_digest.iter().find(|(_, d)| **d == entry.digest) {
            entry
                .annotations
                .insert(BASE_NAME_ANNOTATION.to_string(), tag.clone());
        }
    }
}

fn find_saved<'a>(saved: &'a [SavedImage], tag: &str) -> Option<&'a SavedImage> {
    let wanted = ImageRef::parse(tag).ok().map(|r| r.to_string());
    saved.iter().find(|image| {
        image.repo_tags.iter().any(|t| {
            t == tag
                || (wanted.is_some() && ImageRef::parse(t).ok().map(|r| r.to_string()) == wanted)
        })
    })
}

fn read<'a>(files: &'a HashMap<String, Vec<u8>>, path: &str) -> Result<&'a [u8]> {
    files
        .get(path.trim_start_matches("./"))
        .map(Vec::as_slice)
        .ok_or_else(|| CoreError::LegacyMigration {
            message: format!("{path} missing from {LEGACY_IMAGES_TAR}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::layout::CHECKSUMS_FILE;
    use tempfile::TempDir;

    fn legacy_package(dir: &Path, version: &str) {
        let mut pkg = SkiffPackage::default();
        pkg.metadata.name = "old".to_string();
        pkg.build.version = version.to_string();
        let mut web = Component::named("web");
        web.images.push("nginx:1.25".to_string());
        pkg.components.push(web);
        pkg.write_to(&dir.join(crate::package::DEFINITION_FILE)).unwrap();
    }

    fn docker_save(path: &Path) {
        let file = std::fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(file);
        let entries: [(&str, &[u8]); 3] = [
            (
                "manifest.json",
                br#"[{"Config":"cfg.json","RepoTags":["nginx:1.25"],"Layers":["abc/layer.tar"]}]"#,
            ),
            ("cfg.json", br#"{"architecture":"amd64"}"#),
            ("abc/layer.tar", b"layer-bytes"),
        ];
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, data).unwrap();
        }
        builder.finish().unwrap();
    }

    #[test]
    fn test_migrates_images_and_components() {
        let temp = TempDir::new().unwrap();
        legacy_package(temp.path(), "v0.24.3");
        docker_save(&temp.path().join(LEGACY_IMAGES_TAR));
        std::fs::create_dir_all(temp.path().join(SBOM_DIR)).unwrap();

        let mut paths = PackagePaths::new(temp.path());
        paths
            .migrate_legacy(&semver::Version::new(0, 25, 0))
            .unwrap();

        assert!(paths.is_legacy_layout());
        assert!(!temp.path().join(LEGACY_IMAGES_TAR).exists());
        assert!(paths.components.dir("web").is_some());
        assert!(paths.sboms.path.is_some());
        assert_eq!(paths.images.blobs.len(), 3);

        let index = paths.images.read_index().unwrap();
        let entry = index.find_image("nginx:1.25").unwrap();
        let manifest = paths.images.read_manifest(entry).unwrap();
        assert_eq!(manifest.layers.len(), 1);
        assert_eq!(manifest.layers[0].size, 11);
    }

    #[test]
    fn test_current_layouts_untouched() {
        let temp = TempDir::new().unwrap();
        legacy_package(temp.path(), "0.30.0");
        let mut paths = PackagePaths::new(temp.path());
        paths
            .migrate_legacy(&semver::Version::new(0, 25, 0))
            .unwrap();
        assert!(!paths.is_legacy_layout());

        let temp = TempDir::new().unwrap();
        legacy_package(temp.path(), "0.1.0");
        std::fs::write(temp.path().join(CHECKSUMS_FILE), "").unwrap();
        let mut paths = PackagePaths::new(temp.path());
        paths
            .migrate_legacy(&semver::Version::new(0, 25, 0))
            .unwrap();
        assert!(!paths.is_legacy_layout());
    }

    #[test]
    fn test_empty_build_version_is_not_legacy() {
        assert!(!built_before("", &semver::Version::new(0, 25, 0)).unwrap());
        assert!(built_before("v0.24.0", &semver::Version::new(0, 25, 0)).unwrap());
        assert!(built_before("garbage", &semver::Version::new(0, 25, 0)).is_err());
    }
}
