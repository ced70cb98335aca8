//! Image and git repository reference parsing
//!
//! Image references are normalized the way container runtimes resolve them:
//! `nginx` → `docker.io/library/nginx:latest`.

use crate::error::{CoreError, Result};

const DEFAULT_REGISTRY: &str = "docker.io";
const DEFAULT_TAG: &str = "latest";

/// Tags that move over time and so never count as already shipped
pub const FLOATING_TAGS: [&str; 3] = ["latest", "stable", "nightly"];

/// A normalized container image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Registry host, with port if any
    pub host: String,
    /// Repository path below the host
    pub path: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageRef {
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = |message: &str| CoreError::InvalidImageReference {
            reference: reference.to_string(),
            message: message.to_string(),
        };

        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty reference"));
        }

        let (name_tag, digest) = match trimmed.split_once('@') {
            Some((n, d)) => {
                if !d.contains(':') {
                    return Err(invalid("digest must be algorithm:hex"));
                }
                (n, Some(d.to_string()))
            }
            None => (trimmed, None),
        };

        // A colon only separates a tag when it follows the last slash.
        let last_slash = name_tag.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match name_tag[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                (&name_tag[..split], Some(name_tag[split + 1..].to_string()))
            }
            None => (name_tag, None),
        };

        if let Some(t) = &tag {
            let valid = !t.is_empty()
                && t.len() <= 128
                && t.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-');
            if !valid {
                return Err(invalid("invalid tag"));
            }
        }

        let (host, path) = split_host(name);
        if path.is_empty() {
            return Err(invalid("empty repository"));
        }
        let path_ok = path.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-' | '/')
        });
        if !path_ok {
            return Err(invalid("repository must be lowercase alphanumerics and separators"));
        }

        let tag = if tag.is_none() && digest.is_none() {
            Some(DEFAULT_TAG.to_string())
        } else {
            tag
        };

        Ok(Self {
            host,
            path,
            tag,
            digest,
        })
    }

    /// `:tag`, or `@digest` when the reference is pinned by digest
    pub fn tag_or_digest(&self) -> String {
        match (&self.digest, &self.tag) {
            (Some(d), _) => format!("@{d}"),
            (None, Some(t)) => format!(":{t}"),
            (None, None) => String::new(),
        }
    }

    /// True for unpinned tags such as `latest`
    pub fn is_floating(&self) -> bool {
        self.digest.is_none()
            && self
                .tag
                .as_deref()
                .is_some_and(|t| FLOATING_TAGS.contains(&t))
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.host, self.path)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

fn split_host(name: &str) -> (String, String) {
    if let Some((first, rest)) = name.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            return (first.to_string(), rest.to_string());
        }
        return (DEFAULT_REGISTRY.to_string(), name.to_string());
    }
    (DEFAULT_REGISTRY.to_string(), format!("library/{name}"))
}

/// What a git repository pin refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoPin {
    /// A tag, either `refs/tags/<x>` or a bare name
    Tag,
    /// A full 40 character commit hash
    Commit,
    /// Any other ref, such as `refs/heads/main`
    Other,
}

/// Split `https://host/org/repo.git@ref` into the URL and the optional ref.
pub fn split_repo_ref(repo: &str) -> Result<(String, Option<String>)> {
    let invalid = || CoreError::InvalidPackage {
        message: format!("unable to parse git repository url {repo:?}"),
    };

    let (scheme, rest) = repo.split_once("://").ok_or_else(invalid)?;
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(invalid());
    }
    // Userinfo may contain '@', so only look for a ref after the host.
    let path_start = rest.find('/').ok_or_else(invalid)?;
    let path = &rest[path_start..];

    match path.find('@') {
        Some(at) => {
            let url = format!("{scheme}://{}{}", &rest[..path_start], &path[..at]);
            let git_ref = path[at + 1..].trim_start_matches('+');
            if git_ref.is_empty() {
                return Err(invalid());
            }
            Ok((url, Some(git_ref.to_string())))
        }
        None => Ok((repo.to_string(), None)),
    }
}

/// Classify a git ref string
pub fn classify_ref(git_ref: &str) -> RepoPin {
    if is_commit_hash(git_ref) {
        RepoPin::Commit
    } else if git_ref.starts_with("refs/tags/") {
        RepoPin::Tag
    } else if git_ref.starts_with("refs/") {
        RepoPin::Other
    } else {
        RepoPin::Tag
    }
}

fn is_commit_hash(s: &str) -> bool {
    s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_docker_hub() {
        let r = ImageRef::parse("nginx").unwrap();
        assert_eq!(r.to_string(), "docker.io/library/nginx:latest");
        assert!(r.is_floating());

        let r = ImageRef::parse("bitnami/redis:7.2").unwrap();
        assert_eq!(r.to_string(), "docker.io/bitnami/redis:7.2");
        assert_eq!(r.tag_or_digest(), ":7.2");
    }

    #[test]
    fn test_registry_with_port() {
        let r = ImageRef::parse("localhost:5000/app/api:v1").unwrap();
        assert_eq!(r.host, "localhost:5000");
        assert_eq!(r.path, "app/api");
        assert_eq!(r.tag.as_deref(), Some("v1"));
    }

    #[test]
    fn test_digest_wins_tag_or_digest() {
        let r = ImageRef::parse("ghcr.io/org/app:1.0@sha256:abcd").unwrap();
        assert_eq!(r.tag_or_digest(), "@sha256:abcd");
        assert!(!r.is_floating());
    }

    #[test]
    fn test_rejects_uppercase_repository() {
        assert!(ImageRef::parse("ghcr.io/Org/App:1").is_err());
        assert!(ImageRef::parse("").is_err());
        assert!(ImageRef::parse("nginx@nodigest").is_err());
    }

    #[test]
    fn test_split_repo_ref() {
        let (url, r) = split_repo_ref("https://github.com/org/repo.git@v1.2.0").unwrap();
        assert_eq!(url, "https://github.com/org/repo.git");
        assert_eq!(r.as_deref(), Some("v1.2.0"));

        let (url, r) =
            split_repo_ref("https://user@git.example.com/org/repo.git@refs/heads/main").unwrap();
        assert_eq!(url, "https://user@git.example.com/org/repo.git");
        assert_eq!(r.as_deref(), Some("refs/heads/main"));

        let (_, r) = split_repo_ref("https://github.com/org/repo.git").unwrap();
        assert!(r.is_none());

        assert!(split_repo_ref("github.com/org/repo").is_err());
    }

    #[test]
    fn test_classify_ref() {
        assert_eq!(classify_ref("v1.0.0"), RepoPin::Tag);
        assert_eq!(classify_ref("refs/tags/v1.0.0"), RepoPin::Tag);
        assert_eq!(classify_ref("refs/heads/main"), RepoPin::Other);
        assert_eq!(
            classify_ref("c74e2e9626da0400e0a41e78319b3054c53a5d4c"),
            RepoPin::Commit
        );
    }
}
