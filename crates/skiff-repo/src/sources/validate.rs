//! Integrity and signature checks shared by every source

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use skiff_core::checksums;
use skiff_core::layout::{ALWAYS_PULL, CHECKSUMS_FILE, DEFINITION_FILE};
use skiff_core::{PackagePaths, signing};

use crate::error::{RepoError, Result};

/// Check every loaded file against `checksums.txt`, and `checksums.txt`
/// against the aggregate recorded in the definition.
///
/// A partial check skips checksum lines for files that were not pulled.
/// Every file that was loaded must be covered either way.
pub fn validate_integrity(paths: &PackagePaths, aggregate: &str, partial: bool) -> Result<()> {
    if !paths.checksums.is_file() {
        return Err(RepoError::NotLoaded {
            file: CHECKSUMS_FILE,
        });
    }
    if !paths.definition.is_file() {
        return Err(RepoError::NotLoaded {
            file: DEFINITION_FILE,
        });
    }

    let actual = checksums::hash_file(&paths.checksums)?;
    if actual != aggregate {
        return Err(RepoError::AggregateChecksumMismatch {
            expected: aggregate.to_string(),
            actual,
        });
    }

    let mut checked: BTreeMap<String, (std::path::PathBuf, bool)> = paths
        .files()
        .into_iter()
        .filter(|(rel, abs)| !ALWAYS_PULL.contains(&rel.as_str()) && abs.is_file())
        .map(|(rel, abs)| (rel, (abs, false)))
        .collect();

    let content = std::fs::read_to_string(&paths.checksums)?;
    let mut seen = HashSet::new();
    for line in checksums::parse(&content)? {
        if !seen.insert(line.path.clone()) {
            return Err(RepoError::DuplicateChecksum { path: line.path });
        }
        let Some((abs, done)) = checked.get_mut(&line.path) else {
            if partial {
                continue;
            }
            return Err(RepoError::MissingFromPackage { path: line.path });
        };
        let actual = checksums::hash_file(abs)?;
        if actual != line.sha256 {
            return Err(RepoError::ChecksumMismatch {
                path: line.path,
                expected: line.sha256,
                actual,
            });
        }
        *done = true;
    }

    if let Some((path, _)) = checked.iter().find(|(_, (_, done))| !done) {
        return Err(RepoError::UncheckedFile { path: path.clone() });
    }
    tracing::debug!(files = checked.len(), partial, "package integrity validated");
    Ok(())
}

/// Verify the detached signature over `checksums.txt`.
///
/// A signed package without a key is [`RepoError::SignedButNoKey`] so that
/// callers may downgrade it to a warning.
pub fn validate_signature(paths: &PackagePaths, public_key: Option<&Path>) -> Result<()> {
    let signature = paths.signature.as_deref().filter(|p| p.is_file());
    let public_key = public_key.filter(|p| !p.as_os_str().is_empty());

    match (signature, public_key) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(RepoError::KeyButUnsigned),
        (Some(_), None) => Err(RepoError::SignedButNoKey),
        (Some(signature), Some(key)) => {
            let pk = signing::load_public_key(key)?;
            let data = std::fs::read(&paths.checksums)?;
            let signature = std::fs::read_to_string(signature)?;
            signing::verify(&pk, &data, &signature)?;
            tracing::debug!(key = %key.display(), "package signature verified");
            Ok(())
        }
    }
}
