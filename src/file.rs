// src/file.rs
//
// JSON file plumbing shared by the config loader and the seen store.
// Reads are tolerant (missing / blank files are reported, not failed),
// writes go through a temp file in the same directory and an atomic rename.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::consts::TEMPLATE_SUFFIX;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("could not read '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("could not write '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("'{}' is not valid JSON: {source}", path.display())]
    Json { path: PathBuf, source: serde_json::Error },
    #[error("could not serialize data for '{}': {source}", path.display())]
    Serialize { path: PathBuf, source: serde_json::Error },
    #[error("path exists but is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

/// What was found at a JSON path.
#[derive(Debug, PartialEq, Eq)]
pub enum JsonFile<T> {
    Missing,
    /// Present but empty or whitespace only.
    Blank,
    Loaded(T),
}

/// How a missing file was brought into existence.
#[derive(Debug, PartialEq, Eq)]
pub enum Bootstrap {
    FromTemplate(PathBuf),
    Fallback,
}

/// Content that is not UTF-8 is reported as `Json`, like any other unusable content.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<JsonFile<T>, FileError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(JsonFile::Missing),
        Err(source) => return Err(FileError::Read { path: path.to_path_buf(), source }),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(JsonFile::Blank);
    }
    serde_json::from_slice(&bytes)
        .map(JsonFile::Loaded)
        .map_err(|source| FileError::Json { path: path.to_path_buf(), source })
}

/// Pretty-print `value` (2-space indent) and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), FileError> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|source| FileError::Serialize { path: path.to_path_buf(), source })?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

/// Write to a temp file next to `path`, fsync, then rename over `path`.
/// An interrupted write leaves the previous contents untouched; the temp
/// file is removed when it is dropped without being persisted.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FileError> {
    let dir = parent_dir(path);
    ensure_directory(dir)?;

    let werr = |source: io::Error| FileError::Write { path: path.to_path_buf(), source };
    let mut tmp = NamedTempFile::new_in(dir).map_err(werr)?;
    tmp.write_all(bytes).map_err(werr)?;
    tmp.as_file().sync_all().map_err(werr)?;
    tmp.persist(path).map_err(|e| werr(e.error))?;
    Ok(())
}

/// `<path>.example`
pub fn template_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(TEMPLATE_SUFFIX);
    PathBuf::from(os)
}

/// Create a missing file from its `.example` template, or from `fallback` when
/// there is no template.
pub fn bootstrap_from_template(path: &Path, fallback: &str) -> Result<Bootstrap, FileError> {
    let template = template_for(path);
    match fs::read(&template) {
        Ok(bytes) => {
            write_atomic(path, &bytes)?;
            Ok(Bootstrap::FromTemplate(template))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            write_atomic(path, fallback.as_bytes())?;
            Ok(Bootstrap::Fallback)
        }
        Err(source) => Err(FileError::Read { path: template, source }),
    }
}

/// Copy a file aside as `<path>.corrupt` so a later save does not destroy it.
pub fn quarantine(path: &Path) -> Result<PathBuf, FileError> {
    let mut os = path.as_os_str().to_os_string();
    os.push(".corrupt");
    let target = PathBuf::from(os);
    fs::copy(path, &target).map_err(|source| FileError::Write { path: target.clone(), source })?;
    Ok(target)
}

pub fn ensure_directory(dir: &Path) -> Result<(), FileError> {
    if dir.exists() && !dir.is_dir() {
        return Err(FileError::NotADirectory(dir.to_path_buf()));
    }
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| FileError::Write { path: dir.to_path_buf(), source })?;
    }
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
