//! Package SBOM area, held either as a directory or as `sboms.tar`

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::archive;
use crate::error::{CoreError, Result};

pub const SBOM_DIR: &str = "sboms";
pub const SBOM_TAR: &str = "sboms.tar";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sboms {
    pub path: Option<PathBuf>,
}

impl Sboms {
    pub fn is_tarball(&self) -> bool {
        self.path
            .as_deref()
            .is_some_and(|p| !p.is_dir() && p.extension().is_some_and(|e| e == "tar"))
    }

    fn existing(&self) -> Result<&Path> {
        match self.path.as_deref() {
            Some(p) if p.exists() => Ok(p),
            other => Err(CoreError::path_io(
                "stat",
                other.unwrap_or(Path::new("")),
                std::io::ErrorKind::NotFound.into(),
            )),
        }
    }

    /// Pack the SBOM directory into `sboms.tar` next to it
    pub fn archive(&mut self) -> Result<()> {
        let dir = self.existing()?.to_path_buf();
        if !dir.is_dir() {
            return Ok(());
        }
        let tarball = sibling(&dir, SBOM_TAR);
        archive::create_tar(&dir, &tarball, None)?;
        std::fs::remove_dir_all(&dir).map_err(|e| CoreError::path_io("remove", &dir, e))?;
        self.path = Some(tarball);
        Ok(())
    }

    /// Expand `sboms.tar` into the `sboms` directory next to it
    pub fn unarchive(&mut self) -> Result<()> {
        let tarball = self.existing()?.to_path_buf();
        if tarball.is_dir() {
            return Ok(());
        }
        let dir = sibling(&tarball, SBOM_DIR);
        archive::extract(&tarball, &dir, 0)?;
        std::fs::remove_file(&tarball).map_err(|e| CoreError::path_io("remove", &tarball, e))?;
        self.path = Some(dir);
        Ok(())
    }

    /// Copy the unpacked SBOMs into `<out_dir>/<package_name>`, replacing
    /// anything already there. Returns the destination.
    pub fn output_files(&self, out_dir: &Path, package_name: &str) -> Result<PathBuf> {
        if self.is_tarball() {
            return Err(CoreError::Archive {
                message: "SBOMs must be unarchived before they can be copied".to_string(),
            });
        }
        let src = self.existing()?;
        let dest = out_dir.join(package_name);
        if dest.exists() {
            std::fs::remove_dir_all(&dest).map_err(|e| CoreError::path_io("remove", &dest, e))?;
        }

        for entry in WalkDir::new(src).min_depth(1) {
            let entry = entry.map_err(|e| CoreError::Archive {
                message: e.to_string(),
            })?;
            let rel = entry.path().strip_prefix(src).map_err(|e| CoreError::Archive {
                message: e.to_string(),
            })?;
            let target = dest.join(rel);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)
                    .map_err(|e| CoreError::path_io("create", &target, e))?;
            } else {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| CoreError::path_io("create", parent, e))?;
                }
                std::fs::copy(entry.path(), &target)
                    .map_err(|e| CoreError::path_io("copy", entry.path(), e))?;
            }
        }
        Ok(dest)
    }
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    path.parent().unwrap_or(Path::new(".")).join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archive_and_unarchive() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(SBOM_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("nginx.json"), "{}").unwrap();

        let mut sboms = Sboms {
            path: Some(dir.clone()),
        };
        assert!(!sboms.is_tarball());
        sboms.archive().unwrap();
        assert!(sboms.is_tarball());
        assert!(!dir.exists());

        sboms.unarchive().unwrap();
        assert_eq!(sboms.path.as_deref(), Some(dir.as_path()));
        assert_eq!(std::fs::read_to_string(dir.join("nginx.json")).unwrap(), "{}");

        let out = temp.path().join("out");
        let copied = sboms.output_files(&out, "demo").unwrap();
        assert!(copied.join("nginx.json").exists());
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let mut sboms = Sboms::default();
        assert!(sboms.archive().unwrap_err().is_not_found());
        let mut sboms = Sboms {
            path: Some(PathBuf::from("/nonexistent/sboms.tar")),
        };
        assert!(sboms.unarchive().unwrap_err().is_not_found());
    }
}
