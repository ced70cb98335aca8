//! On-disk layout of one package instance
//!
//! ```text
//! <base>/
//!   skiff.yaml
//!   checksums.txt
//!   skiff.yaml.sig
//!   components/<name>.tar | components/<name>/
//!   images/{oci-layout, index.json, blobs/sha256/<hex>}
//!   sboms/ | sboms.tar
//! ```
//!
//! [`PackagePaths::new`] only computes paths; nothing touches the disk until
//! a component is created or archived.

mod components;
mod images;
mod legacy;
mod sboms;

pub use components::{
    CHARTS_DIR, ComponentPaths, ComponentState, Components, DATA_INJECTIONS_DIR, FILES_DIR,
    MANIFESTS_DIR, REPOS_DIR, TEMP_DIR, VALUES_DIR,
};
pub use images::{IMAGES_DIR, INDEX_JSON, Images, OCI_LAYOUT};
pub use sboms::{SBOM_DIR, SBOM_TAR, Sboms};

pub use crate::checksums::CHECKSUMS_FILE;
pub use crate::package::DEFINITION_FILE;
pub use crate::signing::SIGNATURE_FILE;

use minisign::SecretKey;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::archive;
use crate::checksums::{self, ChecksumLine};
use crate::error::{CoreError, Result};
use crate::migrations;
use crate::oci::Descriptor;
use crate::package::SkiffPackage;
use crate::signing;

pub const COMPONENTS_DIR: &str = "components";

/// Files every package source fetches first
pub const ALWAYS_PULL: [&str; 3] = [DEFINITION_FILE, CHECKSUMS_FILE, SIGNATURE_FILE];

const LEGACY_WARNING: &str = "Detected deprecated package layout, migrating to new layout - support for this package will be dropped in v1.0.0";

#[derive(Debug, Clone)]
pub struct PackagePaths {
    pub base: PathBuf,
    pub definition: PathBuf,
    pub checksums: PathBuf,
    pub signature: Option<PathBuf>,
    pub components: Components,
    pub sboms: Sboms,
    pub images: Images,
    legacy: bool,
}

impl PackagePaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            definition: base.join(DEFINITION_FILE),
            checksums: base.join(CHECKSUMS_FILE),
            signature: None,
            components: Components::new(base.join(COMPONENTS_DIR)),
            sboms: Sboms::default(),
            images: Images::new(base.join(IMAGES_DIR)),
            legacy: false,
            base,
        }
    }

    /// Track the signature file when a signing key is in use
    pub fn add_signature(&mut self, key_path: Option<&Path>) -> &mut Self {
        if key_path.is_some_and(|k| !k.as_os_str().is_empty()) {
            self.signature = Some(self.base.join(SIGNATURE_FILE));
        }
        self
    }

    pub fn add_images(&mut self) -> &mut Self {
        self.images.oci_layout = Some(self.images.base.join(OCI_LAYOUT));
        self.images.index = Some(self.images.base.join(INDEX_JSON));
        self
    }

    pub fn add_sboms(&mut self) -> &mut Self {
        self.sboms.path = Some(self.base.join(SBOM_DIR));
        self
    }

    /// Read the package definition
    pub fn read_definition(&self) -> Result<SkiffPackage> {
        SkiffPackage::from_file(&self.definition)
    }

    /// Read the definition of a loaded package, applying recorded
    /// deprecated-field migrations and collecting their warnings
    pub fn load_definition(&self) -> Result<(SkiffPackage, Vec<String>)> {
        let mut pkg = self.read_definition()?;
        let mut warnings = Vec::new();

        if self.legacy {
            warnings.push(LEGACY_WARNING.to_string());
        }
        if !pkg.build.migrations.is_empty() {
            for component in &mut pkg.components {
                warnings.extend(migrations::migrate_component(&pkg.build, component));
            }
        }
        Ok((pkg, warnings))
    }

    /// Map pulled layers to package paths via their title annotation
    pub fn set_from_layers(&mut self, layers: &[Descriptor]) {
        self.set_from_paths(layers.iter().filter_map(Descriptor::title));
    }

    /// Record the package files present at the given relative paths.
    ///
    /// Unknown paths are ignored.
    pub fn set_from_paths<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let blobs_prefix = format!("{IMAGES_DIR}/blobs/sha256/");
        let layout = format!("{IMAGES_DIR}/{OCI_LAYOUT}");
        let index = format!("{IMAGES_DIR}/{INDEX_JSON}");
        let components_prefix = format!("{COMPONENTS_DIR}/");

        for rel in paths {
            let rel = rel.as_ref().trim_start_matches("./");
            let abs = self.base.join(rel);
            match rel {
                DEFINITION_FILE => self.definition = abs,
                SIGNATURE_FILE => self.signature = Some(abs),
                CHECKSUMS_FILE => self.checksums = abs,
                SBOM_TAR => self.sboms.path = Some(abs),
                r if r == layout => self.images.oci_layout = Some(abs),
                r if r == index => self.images.index = Some(abs),
                r if r.starts_with(&blobs_prefix) => {
                    let digest = &r[blobs_prefix.len()..];
                    if let Err(e) = self.images.add_blob(digest) {
                        tracing::debug!(path = rel, error = %e, "ignoring blob");
                    }
                }
                r if r.starts_with(&components_prefix) && r.ends_with(".tar") => {
                    let name = &r[components_prefix.len()..r.len() - ".tar".len()];
                    if name.is_empty() || name.contains('/') {
                        tracing::debug!(path = rel, "ignoring path");
                    } else {
                        self.components.register_tarball(name, abs);
                    }
                }
                _ => tracing::debug!(path = rel, "ignoring path"),
            }
        }
    }

    /// Every tracked file, keyed by its slash separated path relative to base
    pub fn files(&self) -> BTreeMap<String, PathBuf> {
        let mut files = BTreeMap::new();
        let mut add = |path: &Path| {
            if let Ok(rel) = path.strip_prefix(&self.base) {
                let rel = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                files.insert(rel, path.to_path_buf());
            }
        };

        add(&self.definition);
        if let Some(sig) = &self.signature {
            add(sig);
        }
        add(&self.checksums);
        for path in [&self.images.oci_layout, &self.images.index].into_iter().flatten() {
            add(path);
        }
        for blob in &self.images.blobs {
            add(blob);
        }
        for (_, tarball) in self.components.tarballs() {
            add(tarball);
        }
        if self.sboms.is_tarball() {
            if let Some(path) = &self.sboms.path {
                add(path);
            }
        }
        files
    }

    /// Write `checksums.txt` covering every tracked file except the
    /// definition, the checksums file and the signature. Returns the sha256
    /// of the written file.
    pub fn generate_checksums(&self) -> Result<String> {
        let mut lines = Vec::new();
        for (rel, abs) in self.files() {
            if ALWAYS_PULL.contains(&rel.as_str()) {
                continue;
            }
            lines.push(ChecksumLine {
                sha256: checksums::hash_file(&abs)?,
                path: rel,
            });
        }
        let content = checksums::render(&mut lines);
        std::fs::write(&self.checksums, content)
            .map_err(|e| CoreError::path_io("write", &self.checksums, e))?;
        checksums::hash_file(&self.checksums)
    }

    /// Sign `checksums.txt`, writing `skiff.yaml.sig`
    pub fn sign_package(&mut self, key: &SecretKey) -> Result<()> {
        let data = std::fs::read(&self.checksums)
            .map_err(|e| CoreError::path_io("read", &self.checksums, e))?;
        let comment = format!("skiff checksums sha256:{}", checksums::hash_bytes(&data));
        let signature = signing::sign(key, &data, &comment)?;

        let path = self.base.join(SIGNATURE_FILE);
        std::fs::write(&path, signature).map_err(|e| CoreError::path_io("write", &path, e))?;
        self.signature = Some(path);
        Ok(())
    }

    /// Write the whole package directory as a single archive
    pub fn archive_package(&self, dest: &Path, uncompressed: bool) -> Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::path_io("create", parent, e))?;
        }
        tracing::debug!(dest = %dest.display(), "writing package archive");
        archive::create_package_archive(&self.base, dest, uncompressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::{TITLE_ANNOTATION, media_types};
    use tempfile::TempDir;

    const BLOB: &str = "43787a9b4f5b1aa33b0fc8ab4a9d3e1bb29e8d0e6d1d8e1b6b59e9c5a2e0f6d1";

    #[test]
    fn test_new_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("pkg");
        let paths = PackagePaths::new(&base);

        assert_eq!(paths.definition, base.join("skiff.yaml"));
        assert_eq!(paths.checksums, base.join("checksums.txt"));
        assert!(paths.signature.is_none());
        assert!(!base.exists());
    }

    #[test]
    fn test_opt_in_setters() {
        let mut paths = PackagePaths::new("/pkg");
        paths.add_signature(None);
        assert!(paths.signature.is_none());

        paths
            .add_signature(Some(Path::new("key.pem")))
            .add_images()
            .add_sboms();
        assert_eq!(paths.signature, Some(PathBuf::from("/pkg/skiff.yaml.sig")));
        assert_eq!(
            paths.images.index,
            Some(PathBuf::from("/pkg/images/index.json"))
        );
        assert_eq!(paths.sboms.path, Some(PathBuf::from("/pkg/sboms")));
    }

    #[test]
    fn test_set_from_paths_and_files() {
        let blob = format!("images/blobs/sha256/{BLOB}");
        let mut paths = PackagePaths::new("/pkg");
        paths.set_from_paths([
            "skiff.yaml",
            "checksums.txt",
            "skiff.yaml.sig",
            "sboms.tar",
            "images/oci-layout",
            "images/index.json",
            blob.as_str(),
            "images/blobs/sha256/short",
            "components/web.tar",
            "components/nested/x.tar",
            "random.txt",
        ]);

        let files = paths.files();
        let keys: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "checksums.txt",
                "components/web.tar",
                blob.as_str(),
                "images/index.json",
                "images/oci-layout",
                "sboms.tar",
                "skiff.yaml",
                "skiff.yaml.sig",
            ]
        );
        assert_eq!(files["components/web.tar"], PathBuf::from("/pkg/components/web.tar"));
    }

    #[test]
    fn test_load_definition_runs_recorded_migrations() {
        use crate::component::{Action, Component};

        let temp = TempDir::new().unwrap();
        let paths = PackagePaths::new(temp.path());
        let mut pkg = SkiffPackage::default();
        pkg.build.migrations = vec![migrations::PLURALIZE_SET_VARIABLE.to_string()];
        let mut web = Component::named("web");
        let mut action = Action::cmd("echo hi");
        action.set_variable = "OUT".to_string();
        web.actions.on_deploy.after.push(action);
        pkg.components.push(web);
        pkg.write_to(&paths.definition).unwrap();

        let (loaded, warnings) = paths.load_definition().unwrap();
        assert!(warnings.is_empty());
        assert!(loaded.components[0].actions.on_deploy.after[0]
            .set_variable
            .is_empty());
    }

    #[test]
    fn test_set_from_layers_uses_titles() {
        let layer = |title: &str| {
            let mut d = Descriptor {
                media_type: media_types::SKIFF_LAYER.to_string(),
                ..Default::default()
            };
            d.annotations
                .insert(TITLE_ANNOTATION.to_string(), title.to_string());
            d
        };
        let mut paths = PackagePaths::new("/pkg");
        paths.set_from_layers(&[layer("components/db.tar"), Descriptor::default()]);
        assert!(matches!(
            paths.components.state("db"),
            Some(ComponentState::Tarball(_))
        ));
    }

    #[test]
    fn test_generate_checksums_excludes_metadata_files() {
        let temp = TempDir::new().unwrap();
        let mut paths = PackagePaths::new(temp.path());
        std::fs::write(&paths.definition, "kind: SkiffPackageConfig\n").unwrap();
        std::fs::create_dir_all(temp.path().join("components")).unwrap();
        std::fs::write(temp.path().join("components/web.tar"), "tar").unwrap();
        paths.set_from_paths(["components/web.tar"]);

        let aggregate = paths.generate_checksums().unwrap();
        let content = std::fs::read_to_string(&paths.checksums).unwrap();
        assert_eq!(
            content,
            format!("{}  components/web.tar\n", checksums::hash_bytes(b"tar"))
        );
        assert_eq!(aggregate, checksums::hash_bytes(content.as_bytes()));

        let keys = signing::generate_keypair(&temp.path().join("keys"), None).unwrap();
        let sk = signing::load_secret_key(&keys.secret, None).unwrap();
        paths.sign_package(&sk).unwrap();
        let pk = signing::load_public_key(&keys.public).unwrap();
        let sig = std::fs::read_to_string(paths.signature.as_ref().unwrap()).unwrap();
        signing::verify(&pk, content.as_bytes(), &sig).unwrap();
    }
}
