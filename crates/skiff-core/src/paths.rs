//! Lexical path helpers for the slash-separated paths stored in package definitions.
//!
//! Paths inside `skiff.yaml` are plain strings, not host paths, so they are joined
//! and cleaned lexically without touching the filesystem.

/// True if `s` parses as an absolute URL with both a scheme and a host.
pub fn is_url(s: &str) -> bool {
    match url::Url::parse(s) {
        Ok(u) => !u.scheme().is_empty() && u.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// Lexically clean a slash-separated path.
///
/// Collapses repeated separators, drops `.` segments and resolves `..` against the
/// preceding segment where possible. An empty result becomes `.`.
pub fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|s| *s != "..") {
                    out.pop();
                } else if !rooted {
                    out.push("..");
                }
            }
            s => out.push(s),
        }
    }

    let body = out.join("/");
    if rooted {
        format!("/{body}")
    } else if body.is_empty() {
        ".".to_string()
    } else {
        body
    }
}

/// Join path segments and clean the result. Empty segments are ignored; joining
/// nothing but empty segments yields an empty string.
pub fn join<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if joined.is_empty() {
        joined
    } else {
        clean(&joined)
    }
}

/// Rewrite `path` so it resolves from the import-chain head, leaving URLs untouched.
pub fn relative_to(path: &str, base: &str) -> String {
    if is_url(path) {
        path.to_string()
    } else {
        join(&[base, path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean("a/./b//c"), "a/b/c");
        assert_eq!(clean("a/../b"), "b");
        assert_eq!(clean("../a"), "../a");
        assert_eq!(clean("/../a"), "/a");
        assert_eq!(clean(""), ".");
        assert_eq!(clean("./"), ".");
    }

    #[test]
    fn test_join_drops_current_dir() {
        assert_eq!(join(&[".", "values.yaml"]), "values.yaml");
        assert_eq!(join(&["hello", "world", "today.txt"]), "hello/world/today.txt");
        assert_eq!(join(&["hello", ""]), "hello");
        assert_eq!(join(&["", ""]), "");
        assert_eq!(join(&["sub/..", "x"]), "x");
    }

    #[test]
    fn test_relative_to_keeps_urls() {
        assert_eq!(
            relative_to("https://example.com/values.yaml", "sub"),
            "https://example.com/values.yaml"
        );
        assert_eq!(relative_to("values.yaml", "sub"), "sub/values.yaml");
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("oci://ghcr.io/org/pkg:1.0.0"));
        assert!(is_url("https://example.com/a.tar"));
        assert!(!is_url("some/local/path"));
        assert!(!is_url("file.tar.zst"));
    }
}
