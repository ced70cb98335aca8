//! Minisign signatures over package checksums

use minisign::{KeyPair, PublicKey, PublicKeyBox, SecretKey, SecretKeyBox, SignatureBox};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Signature file written next to the package definition
pub const SIGNATURE_FILE: &str = "skiff.yaml.sig";

/// Default directory holding generated keys
#[must_use]
pub fn default_key_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".skiff"))
        .unwrap_or_else(|| PathBuf::from(".skiff"))
}

/// Load a secret key, trying it unencrypted before using `password`
pub fn load_secret_key(path: &Path, password: Option<String>) -> Result<SecretKey> {
    let content =
        std::fs::read_to_string(path).map_err(|e| CoreError::path_io("read", path, e))?;
    let sk_box = SecretKeyBox::from_string(&content).map_err(|e| CoreError::Signing {
        message: format!("failed to parse secret key: {e}"),
    })?;

    if let Ok(sk) = sk_box.clone().into_unencrypted_secret_key() {
        return Ok(sk);
    }
    sk_box
        .into_secret_key(password)
        .map_err(|e| CoreError::Signing {
            message: format!("failed to decrypt secret key: {e}"),
        })
}

/// True when the secret key at `path` needs a password
pub fn is_encrypted(path: &Path) -> Result<bool> {
    let content =
        std::fs::read_to_string(path).map_err(|e| CoreError::path_io("read", path, e))?;
    let sk_box = SecretKeyBox::from_string(&content).map_err(|e| CoreError::Signing {
        message: format!("failed to parse secret key: {e}"),
    })?;
    Ok(sk_box.into_unencrypted_secret_key().is_err())
}

pub fn load_public_key(path: &Path) -> Result<PublicKey> {
    let content =
        std::fs::read_to_string(path).map_err(|e| CoreError::path_io("read", path, e))?;
    PublicKeyBox::from_string(&content)
        .and_then(|b| b.into_public_key())
        .map_err(|e| CoreError::Signing {
            message: format!("failed to parse public key {}: {e}", path.display()),
        })
}

/// Sign `data`, returning the signature file content
pub fn sign(sk: &SecretKey, data: &[u8], trusted_comment: &str) -> Result<String> {
    let mut cursor = Cursor::new(data);
    let signature = minisign::sign(None, sk, &mut cursor, Some(trusted_comment), None)
        .map_err(|e| CoreError::Signing {
            message: format!("failed to sign: {e}"),
        })?;
    Ok(signature.to_string())
}

/// Verify `signature` (file content) over `data`
pub fn verify(pk: &PublicKey, data: &[u8], signature: &str) -> Result<()> {
    let sig_box = SignatureBox::from_string(signature).map_err(|e| CoreError::SignatureInvalid {
        message: format!("failed to parse signature: {e}"),
    })?;
    let mut cursor = Cursor::new(data);
    minisign::verify(pk, &sig_box, &mut cursor, true, false, false).map_err(|e| {
        CoreError::SignatureInvalid {
            message: e.to_string(),
        }
    })
}

/// Paths of a generated key pair
#[derive(Debug, Clone)]
pub struct KeyFiles {
    pub secret: PathBuf,
    pub public: PathBuf,
}

/// Generate a key pair into `dir` as `skiff.key` and `skiff.pub`
pub fn generate_keypair(dir: &Path, password: Option<String>) -> Result<KeyFiles> {
    std::fs::create_dir_all(dir).map_err(|e| CoreError::path_io("create", dir, e))?;

    let KeyPair { pk, sk } = match password {
        Some(pw) => KeyPair::generate_encrypted_keypair(Some(pw)),
        None => KeyPair::generate_unencrypted_keypair(),
    }
    .map_err(|e| CoreError::Signing {
        message: format!("failed to generate key pair: {e}"),
    })?;
    let pk_box = pk.to_box().map_err(|e| CoreError::Signing {
        message: e.to_string(),
    })?;
    let sk_box = sk
        .to_box(Some("skiff secret key"))
        .map_err(|e| CoreError::Signing {
            message: e.to_string(),
        })?;

    let files = KeyFiles {
        secret: dir.join("skiff.key"),
        public: dir.join("skiff.pub"),
    };
    std::fs::write(&files.public, pk_box.to_string())
        .map_err(|e| CoreError::path_io("write", &files.public, e))?;
    std::fs::write(&files.secret, sk_box.to_string())
        .map_err(|e| CoreError::path_io("write", &files.secret, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&files.secret, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sign_and_verify() {
        let temp = TempDir::new().unwrap();
        let keys = generate_keypair(temp.path(), None).unwrap();

        let sk = load_secret_key(&keys.secret, None).unwrap();
        let pk = load_public_key(&keys.public).unwrap();
        let signature = sign(&sk, b"aa  components/web.tar\n", "skiff:test").unwrap();

        verify(&pk, b"aa  components/web.tar\n", &signature).unwrap();
        let err = verify(&pk, b"tampered\n", &signature).unwrap_err();
        assert!(matches!(err, CoreError::SignatureInvalid { .. }));
    }

    #[test]
    fn test_encrypted_key_needs_password() {
        let temp = TempDir::new().unwrap();
        let keys = generate_keypair(temp.path(), Some("hunter2".to_string())).unwrap();

        assert!(is_encrypted(&keys.secret).unwrap());
        assert!(load_secret_key(&keys.secret, Some("wrong".to_string())).is_err());
        load_secret_key(&keys.secret, Some("hunter2".to_string())).unwrap();
    }
}
