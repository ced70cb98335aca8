//! Integration tests for CLI commands

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Helper to run the skiff binary with an isolated cache
fn skiff(cache: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_skiff"))
        .arg("--cache")
        .arg(cache)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute skiff")
}

/// Get the fixtures path
fn fixture(name: &str) -> String {
    format!("{}/../../fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// A package directory holding the composed fixture and one component tarball
fn package_dir(temp: &TempDir) -> PathBuf {
    let dir = temp.path().join("pkg");
    std::fs::create_dir_all(dir.join("components")).unwrap();
    let definition = dir.join("skiff.yaml");
    let output = skiff(
        &temp.path().join("cache"),
        &["dev", "compose", &fixture("compose"), "-o", definition.to_str().unwrap()],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    std::fs::write(dir.join("components/docs.tar"), b"docs tarball").unwrap();
    dir
}

mod compose_command {
    use super::*;

    #[test]
    fn test_compose_resolves_local_import() {
        let temp = TempDir::new().unwrap();
        let output = skiff(temp.path(), &["dev", "compose", &fixture("compose")]);

        assert!(output.status.success(), "{}", stderr(&output));
        let yaml = stdout(&output);
        assert!(yaml.contains("description: Podinfo from the shared definition"));
        assert!(yaml.contains("localPath: common/chart"));
        assert!(yaml.contains("- common/values.yaml"));
        assert!(yaml.contains("source: docs/README.md"));
        assert!(yaml.contains("default: bundle.example"));
        assert!(yaml.contains("name: REPLICAS"));
        assert!(!yaml.contains("upstream-extras"));
        assert!(!yaml.contains("import:"));
    }

    #[test]
    fn test_compose_flavor_and_components() {
        let temp = TempDir::new().unwrap();
        let output = skiff(
            temp.path(),
            &["dev", "compose", &fixture("compose"), "--flavor", "upstream"],
        );
        assert!(output.status.success(), "{}", stderr(&output));
        let yaml = stdout(&output);
        assert!(yaml.contains("name: upstream-extras"));
        assert!(yaml.contains("flavor: upstream"));

        let output = skiff(
            temp.path(),
            &["dev", "compose", &fixture("compose"), "--components", "podinfo"],
        );
        assert!(output.status.success(), "{}", stderr(&output));
        let yaml = stdout(&output);
        assert!(yaml.contains("name: podinfo"));
        assert!(!yaml.contains("name: docs"));
    }

    #[test]
    fn test_compose_reports_cycles() {
        let temp = TempDir::new().unwrap();
        let output = skiff(temp.path(), &["dev", "compose", &fixture("cycle")]);

        assert_eq!(output.status.code(), Some(3));
        assert!(stderr(&output).contains("circular import chain"));
    }

    #[test]
    fn test_compose_requires_definition() {
        let temp = TempDir::new().unwrap();
        let output = skiff(temp.path(), &["dev", "compose", temp.path().to_str().unwrap()]);

        assert_eq!(output.status.code(), Some(64));
        assert!(stderr(&output).contains("does not contain a skiff.yaml"));
    }

    #[test]
    fn test_differential_rejects_unknown_reference() {
        let temp = TempDir::new().unwrap();
        let output = skiff(
            temp.path(),
            &["dev", "differential", &fixture("compose"), "--reference", "not-a-package"],
        );

        assert_eq!(output.status.code(), Some(64));
        assert!(stderr(&output).contains("could not identify source type"));
    }
}

mod package_command {
    use super::*;

    #[test]
    fn test_checksums_then_verify() {
        let temp = TempDir::new().unwrap();
        let dir = package_dir(&temp);
        let cache = temp.path().join("cache");

        let output = skiff(&cache, &["package", "checksums", dir.to_str().unwrap()]);
        assert!(output.status.success(), "{}", stderr(&output));
        let aggregate = stdout(&output).trim().to_string();
        assert_eq!(aggregate.len(), 64);

        let definition = std::fs::read_to_string(dir.join("skiff.yaml")).unwrap();
        assert!(definition.contains(&aggregate));
        let checksums = std::fs::read_to_string(dir.join("checksums.txt")).unwrap();
        assert!(checksums.contains("components/docs.tar"));

        let output = skiff(&cache, &["package", "verify", dir.to_str().unwrap()]);
        assert!(output.status.success(), "{}", stderr(&output));
        assert!(stderr(&output).contains("All file checksums match"));
        assert!(stderr(&output).contains("Package is not signed"));
    }

    #[test]
    fn test_verify_detects_tampering() {
        let temp = TempDir::new().unwrap();
        let dir = package_dir(&temp);
        let cache = temp.path().join("cache");

        let output = skiff(&cache, &["package", "checksums", dir.to_str().unwrap()]);
        assert!(output.status.success(), "{}", stderr(&output));

        std::fs::write(dir.join("components/docs.tar"), b"swapped").unwrap();
        let output = skiff(&cache, &["package", "verify", dir.to_str().unwrap()]);
        assert_eq!(output.status.code(), Some(4));
        assert!(stderr(&output).contains("checksum mismatch for components/docs.tar"));
    }

    #[test]
    fn test_sign_and_verify_with_key() {
        let temp = TempDir::new().unwrap();
        let dir = package_dir(&temp);
        let cache = temp.path().join("cache");
        let keys = temp.path().join("keys");

        let output = skiff(
            &cache,
            &["keygen", "--no-password", "-o", keys.to_str().unwrap()],
        );
        assert!(output.status.success(), "{}", stderr(&output));
        assert!(keys.join("skiff.key").exists());

        let output = skiff(&cache, &["package", "checksums", dir.to_str().unwrap()]);
        assert!(output.status.success(), "{}", stderr(&output));

        let secret = keys.join("skiff.key");
        let output = skiff(
            &cache,
            &["package", "sign", dir.to_str().unwrap(), "--key", secret.to_str().unwrap()],
        );
        assert!(output.status.success(), "{}", stderr(&output));
        assert!(dir.join("skiff.yaml.sig").exists());

        let public = keys.join("skiff.pub");
        let output = skiff(
            &cache,
            &["package", "verify", dir.to_str().unwrap(), "--key", public.to_str().unwrap()],
        );
        assert!(output.status.success(), "{}", stderr(&output));
        assert!(stderr(&output).contains("Signature valid"));

        let output = skiff(&cache, &["package", "verify", dir.to_str().unwrap()]);
        assert_eq!(output.status.code(), Some(4));
    }

    #[test]
    fn test_sign_requires_checksums() {
        let temp = TempDir::new().unwrap();
        let dir = package_dir(&temp);
        let cache = temp.path().join("cache");
        let keys = temp.path().join("keys");

        let output = skiff(&cache, &["keygen", "--no-password", "-o", keys.to_str().unwrap()]);
        assert!(output.status.success(), "{}", stderr(&output));

        let secret = keys.join("skiff.key");
        let output = skiff(
            &cache,
            &["package", "sign", dir.to_str().unwrap(), "--key", secret.to_str().unwrap()],
        );
        assert_eq!(output.status.code(), Some(64));
        assert!(stderr(&output).contains("has no checksums.txt"));
    }

    #[test]
    fn test_pull_requires_oci_reference() {
        let temp = TempDir::new().unwrap();
        let output = skiff(temp.path(), &["package", "pull", "https://example.com/pkg.tar.zst"]);

        assert_eq!(output.status.code(), Some(64));
        assert!(stderr(&output).contains("is not an OCI reference"));
    }
}

mod keygen_command {
    use super::*;

    #[test]
    fn test_keygen_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let keys = temp.path().join("keys");
        let args = ["keygen", "--no-password", "-o", keys.to_str().unwrap()];

        let output = skiff(temp.path(), &args);
        assert!(output.status.success(), "{}", stderr(&output));
        assert!(stderr(&output).contains("NOT password-protected"));

        let output = skiff(temp.path(), &args);
        assert_eq!(output.status.code(), Some(64));
        assert!(stderr(&output).contains("Keys already exist"));

        let mut forced = args.to_vec();
        forced.push("--force");
        let output = skiff(temp.path(), &forced);
        assert!(output.status.success(), "{}", stderr(&output));
    }
}
