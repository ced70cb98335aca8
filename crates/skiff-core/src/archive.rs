//! Reproducible tar archives
//!
//! Component tarballs, SBOM bundles and whole package archives are written with
//! zeroed timestamps and ownership and in sorted order, so identical content
//! yields byte-identical archives across builds.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Component as PathComponent, Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};
use walkdir::WalkDir;

use crate::error::{CoreError, Result};

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Write `src_dir` to a reproducible tar at `dest`.
///
/// When `prefix` is set every entry is nested under it, so the archive
/// extracts to `<prefix>/...`.
pub fn create_tar(src_dir: &Path, dest: &Path, prefix: Option<&str>) -> Result<()> {
    let file = File::create(dest).map_err(|e| CoreError::path_io("create", dest, e))?;
    let builder = append_dir(Builder::new(file), src_dir, prefix)?;
    builder.into_inner()?.flush()?;
    Ok(())
}

/// Write `src_dir` to a reproducible tar, zstd compressed unless `uncompressed`
pub fn create_package_archive(src_dir: &Path, dest: &Path, uncompressed: bool) -> Result<()> {
    if uncompressed {
        return create_tar(src_dir, dest, None);
    }
    let file = File::create(dest).map_err(|e| CoreError::path_io("create", dest, e))?;
    let encoder = zstd::stream::write::Encoder::new(file, 3)?;
    let builder = append_dir(Builder::new(encoder), src_dir, None)?;
    builder.into_inner()?.finish()?;
    Ok(())
}

fn append_dir<W: Write>(
    mut builder: Builder<W>,
    src_dir: &Path,
    prefix: Option<&str>,
) -> Result<Builder<W>> {
    let walker = WalkDir::new(src_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| CoreError::Archive {
            message: format!("walking {}: {}", src_dir.display(), e),
        })?;
        let rel = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(|e| CoreError::Archive {
                message: e.to_string(),
            })?;
        let name = archive_name(rel, prefix);
        let file_type = entry.file_type();

        let mut header = Header::new_gnu();
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        if file_type.is_dir() {
            header.set_entry_type(EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            header.set_cksum();
            builder.append_data(&mut header, &name, io::empty())?;
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path())
                .map_err(|e| CoreError::path_io("readlink", entry.path(), e))?;
            header.set_entry_type(EntryType::Symlink);
            header.set_mode(0o777);
            header.set_size(0);
            builder.append_link(&mut header, &name, &target)?;
        } else {
            let file = File::open(entry.path())
                .map_err(|e| CoreError::path_io("open", entry.path(), e))?;
            let meta = file.metadata()?;
            header.set_entry_type(EntryType::Regular);
            header.set_mode(if is_executable(&meta) { 0o755 } else { 0o644 });
            header.set_size(meta.len());
            header.set_cksum();
            builder.append_data(&mut header, &name, file)?;
        }
    }

    Ok(builder)
}

fn archive_name(rel: &Path, prefix: Option<&str>) -> String {
    let rel = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}/{rel}"),
        _ => rel,
    }
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

/// Open a tar, transparently decompressing zstd
pub fn open_archive(path: &Path) -> Result<Archive<Box<dyn Read>>> {
    let mut file = File::open(path).map_err(|e| CoreError::path_io("open", path, e))?;
    let mut magic = [0u8; 4];
    let read = file.read(&mut magic)?;
    let file = File::open(path).map_err(|e| CoreError::path_io("open", path, e))?;

    let reader: Box<dyn Read> = if read == 4 && magic == ZSTD_MAGIC {
        Box::new(zstd::stream::read::Decoder::new(file)?)
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(Archive::new(reader))
}

/// Extract an archive into `dest`, dropping the first `strip` path components
/// of every entry. Returns the relative paths of extracted regular files.
pub fn extract(archive_path: &Path, dest: &Path, strip: usize) -> Result<Vec<String>> {
    extract_matching(archive_path, dest, strip, |_| true)
}

/// Extract only the entries whose (stripped) relative path satisfies `keep`
pub fn extract_matching<F>(
    archive_path: &Path,
    dest: &Path,
    strip: usize,
    keep: F,
) -> Result<Vec<String>>
where
    F: Fn(&str) -> bool,
{
    std::fs::create_dir_all(dest).map_err(|e| CoreError::path_io("create", dest, e))?;
    let mut archive = open_archive(archive_path)?;
    let mut files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw = entry.path()?.into_owned();
        let Some(rel) = stripped(&raw, strip)? else {
            continue;
        };
        let rel_str = archive_name(&rel, None);
        if !keep(&rel_str) {
            continue;
        }

        let target = dest.join(&rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::path_io("create", parent, e))?;
        }
        let is_file = entry.header().entry_type().is_file();
        entry.unpack(&target)?;
        if is_file {
            files.push(rel_str);
        }
    }

    Ok(files)
}

fn stripped(path: &Path, strip: usize) -> Result<Option<PathBuf>> {
    let mut out = PathBuf::new();
    for component in path.components().skip(strip) {
        match component {
            PathComponent::Normal(c) => out.push(c),
            PathComponent::CurDir => {}
            _ => {
                return Err(CoreError::Archive {
                    message: format!("refusing to extract unsafe path {}", path.display()),
                });
            }
        }
    }
    Ok((!out.as_os_str().is_empty()).then_some(out))
}

/// List the relative paths of every regular file in an archive
pub fn list_files(archive_path: &Path) -> Result<Vec<String>> {
    let mut archive = open_archive(archive_path)?;
    let mut paths = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        if entry.header().entry_type().is_file() {
            paths.push(archive_name(&entry.path()?, None));
        }
    }
    Ok(paths)
}

/// Read one file out of an archive without extracting anything else
pub fn read_file(archive_path: &Path, file_path: &str) -> Result<Vec<u8>> {
    find_file(archive_path, file_path)?.ok_or_else(|| CoreError::Archive {
        message: format!(
            "file {} not found in {}",
            file_path,
            archive_path.display()
        ),
    })
}

/// Like [`read_file`], but a missing entry is `None` rather than an error
pub fn find_file(archive_path: &Path, file_path: &str) -> Result<Option<Vec<u8>>> {
    let mut archive = open_archive(archive_path)?;
    for entry in archive.entries()? {
        let mut entry = entry?;
        if archive_name(&entry.path()?, None) == file_path {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            return Ok(Some(content));
        }
    }
    Ok(None)
}

/// True if the file starts with the zstd frame magic
pub fn is_zstd(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| CoreError::path_io("open", path, e))?;
    let mut magic = [0u8; 4];
    let read = file.read(&mut magic)?;
    Ok(read == 4 && magic == ZSTD_MAGIC)
}

/// Read every regular file of an archive in a single pass, keyed by path
pub fn read_all_files(archive_path: &Path) -> Result<HashMap<String, Vec<u8>>> {
    let mut archive = open_archive(archive_path)?;
    let mut contents = HashMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = archive_name(&entry.path()?, None);
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        contents.insert(path, data);
    }

    Ok(contents)
}

/// Total size in bytes of all regular files below `path`
pub fn dir_size(path: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| CoreError::Archive {
            message: format!("walking {}: {}", path.display(), e),
        })?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(|e| CoreError::Archive {
                message: e.to_string(),
            })?.len();
        }
    }
    Ok(total)
}
