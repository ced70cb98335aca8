//! SHA-256 helpers and the `checksums.txt` format
//!
//! Each line is `<hex sha256>  <relative path>`, sorted by path.

use sha2::{Digest, Sha256};
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{CoreError, Result};

/// File listing the checksum of every package file
pub const CHECKSUMS_FILE: &str = "checksums.txt";

/// Hex SHA-256 of a file's content
pub fn hash_file(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|e| CoreError::path_io("open", path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-256 of in-memory data
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// One `checksums.txt` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumLine {
    pub sha256: String,
    pub path: String,
}

/// Parse `checksums.txt` content.
///
/// The two fields may be separated by any run of whitespace. Blank lines are
/// ignored; a line missing either field is an error.
pub fn parse(content: &str) -> Result<Vec<ChecksumLine>> {
    let mut lines = Vec::new();
    for (n, raw) in content.lines().enumerate() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let mut fields = raw.splitn(2, char::is_whitespace);
        let sha = fields.next().unwrap_or_default();
        let path = fields.next().unwrap_or_default().trim();
        if sha.is_empty() || path.is_empty() {
            return Err(CoreError::InvalidPackage {
                message: format!("invalid checksum line {}: {:?}", n + 1, raw),
            });
        }
        lines.push(ChecksumLine {
            sha256: sha.to_string(),
            path: path.to_string(),
        });
    }
    Ok(lines)
}

/// Render entries sorted by path, one per line with a trailing newline
pub fn render(lines: &mut [ChecksumLine]) -> String {
    lines.sort_by(|a, b| a.path.cmp(&b.path));
    lines
        .iter()
        .map(|l| format!("{}  {}\n", l.sha256, l.path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_bytes_known_value() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_file_matches_bytes() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), b"skiff").unwrap();
        assert_eq!(hash_file(temp.path()).unwrap(), hash_bytes(b"skiff"));
    }

    #[test]
    fn test_render_sorts_and_parse_tolerates_spacing() {
        let mut lines = vec![
            ChecksumLine {
                sha256: "bb".to_string(),
                path: "images/index.json".to_string(),
            },
            ChecksumLine {
                sha256: "aa".to_string(),
                path: "components/web.tar".to_string(),
            },
        ];
        let rendered = render(&mut lines);
        insta::assert_snapshot!(rendered, @r"
        aa  components/web.tar
        bb  images/index.json
        ");

        let parsed = parse("aa components/web.tar\n\n bb\timages/index.json \n").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].path, "images/index.json");
    }

    #[test]
    fn test_parse_rejects_missing_path() {
        let err = parse("aa  x\nbb\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
