//! Registry credentials
//!
//! Resolution order: `SKIFF_REGISTRY_USERNAME` / `SKIFF_REGISTRY_PASSWORD`,
//! then the docker `config.json` entry for the registry host, then anonymous.

use base64::Engine;
use oci_distribution::secrets::RegistryAuth;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

const USERNAME_VAR: &str = "SKIFF_REGISTRY_USERNAME";
const PASSWORD_VAR: &str = "SKIFF_REGISTRY_PASSWORD";

/// Docker config.json format
#[derive(Debug, Clone, Default, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, DockerAuth>,
}

#[derive(Debug, Clone, Deserialize)]
struct DockerAuth {
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Credentials for `registry` (a host, with port if any)
pub fn registry_auth(registry: &str) -> Result<RegistryAuth> {
    if let (Ok(username), Ok(password)) = (std::env::var(USERNAME_VAR), std::env::var(PASSWORD_VAR))
    {
        return Ok(RegistryAuth::Basic(username, password));
    }
    let config = load_docker_config(docker_config_path().as_deref())?;
    Ok(config.auth_for(registry).unwrap_or(RegistryAuth::Anonymous))
}

fn docker_config_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("DOCKER_CONFIG") {
        return Some(PathBuf::from(dir).join("config.json"));
    }
    dirs::home_dir().map(|home| home.join(".docker").join("config.json"))
}

fn load_docker_config(path: Option<&Path>) -> Result<DockerConfig> {
    let Some(path) = path.filter(|p| p.exists()) else {
        return Ok(DockerConfig::default());
    };
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

impl DockerConfig {
    fn auth_for(&self, registry: &str) -> Option<RegistryAuth> {
        let mut candidates = vec![
            registry.to_string(),
            format!("https://{}", registry),
            format!("http://{}", registry),
        ];
        if registry == "docker.io" || registry == "index.docker.io" {
            candidates.push("https://index.docker.io/v1/".to_string());
        }

        for candidate in &candidates {
            let Some(auth) = self.auths.get(candidate) else {
                continue;
            };
            if let Some(decoded) = auth.auth.as_deref().and_then(decode_basic) {
                return Some(decoded);
            }
            if let (Some(u), Some(p)) = (&auth.username, &auth.password) {
                return Some(RegistryAuth::Basic(u.clone(), p.clone()));
            }
        }
        None
    }
}

fn decode_basic(encoded: &str) -> Option<RegistryAuth> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(RegistryAuth::Basic(
        username.to_string(),
        password.to_string(),
    ))
}
