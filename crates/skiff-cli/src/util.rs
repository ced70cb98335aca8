//! Shared utility functions for CLI commands

use std::path::Path;
use walkdir::WalkDir;

use skiff_core::{DEFINITION_FILE, PackagePaths, SkiffConfig};
use skiff_repo::RegistryConnector;
use skiff_repo::oci::{RegistryOptions, SKELETON_ARCH};

use crate::error::{CliError, Result};

/// Format a byte size as a human-readable string
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Safely truncate a hash string to a maximum length
///
/// Returns the entire string if it's shorter than `max_len`.
#[must_use]
pub fn truncate_hash(hash: &str, max_len: usize) -> &str {
    let end = hash.len().min(max_len);
    &hash[..end]
}

/// Open an unpacked package directory, registering every file it holds
pub fn open_layout(dir: &Path) -> Result<PackagePaths> {
    if !dir.join(DEFINITION_FILE).is_file() {
        return Err(CliError::input_with_help(
            format!("{} does not contain a {DEFINITION_FILE}", dir.display()),
            "point at a package directory, for example one written by `skiff package extract`",
        ));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| CliError::internal(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(dir) {
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(rel);
        }
    }

    let mut paths = PackagePaths::new(dir);
    paths.set_from_paths(&files);
    Ok(paths)
}

/// A scratch directory below the configured temp dir, removed on drop
pub fn scratch_dir(config: &SkiffConfig) -> Result<tempfile::TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("skiff-");
    let dir = match &config.temp_dir {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            builder.tempdir_in(parent)?
        }
        None => builder.tempdir()?,
    };
    Ok(dir)
}

/// Connector that resolves `import.url` skeletons from their registry
pub fn skeleton_connector(plain_http: bool) -> RegistryConnector {
    RegistryConnector {
        options: RegistryOptions {
            architecture: SKELETON_ARCH.to_string(),
            plain_http,
        },
    }
}
