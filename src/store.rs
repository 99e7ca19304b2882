// src/store.rs
//! DedupStore: the persisted set of listing URLs already reported.
//!
//! On disk it is a JSON array of strings (sorted, pretty-printed). Loading never
//! fails the run: a missing file starts empty (and is created), unreadable or
//! corrupt content is logged, set aside as `<file>.corrupt` and treated as empty.
//! Entries are only ever added.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::file::{self, Bootstrap, FileError, JsonFile};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not save seen items: {0}")]
    Save(#[from] FileError),
}

/// Read-only membership view the pipeline evaluates against.
pub trait Seen {
    fn contains(&self, url: &str) -> bool;
}

impl Seen for HashSet<String> {
    fn contains(&self, url: &str) -> bool {
        HashSet::contains(self, url)
    }
}

#[derive(Debug)]
pub struct SeenStore {
    path: PathBuf,
    items: HashSet<String>,
    dirty: bool,
}

impl Seen for SeenStore {
    fn contains(&self, url: &str) -> bool {
        self.items.contains(url)
    }
}

impl SeenStore {
    /// Load from `path`, tolerating every failure mode.
    pub fn open(path: &Path) -> Self {
        Self { path: path.to_path_buf(), items: load_seen(path), dirty: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` if the URL was new.
    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        let added = self.items.insert(url.into());
        self.dirty |= added;
        added
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist the whole set. On failure the in-memory set is kept and stays dirty.
    pub fn save(&mut self) -> Result<(), StoreError> {
        save_seen(&self.path, &self.items)?;
        self.dirty = false;
        Ok(())
    }
}

/// Last saved set, or empty.
pub fn load_seen(path: &Path) -> HashSet<String> {
    match file::read_json::<Vec<String>>(path) {
        Ok(JsonFile::Loaded(list)) => {
            let set: HashSet<String> = list.into_iter().collect();
            info!("{} known listing(s) loaded from '{}'", set.len(), path.display());
            set
        }
        Ok(JsonFile::Blank) => {
            warn!("Seen-items file '{}' is empty; starting with an empty set", path.display());
            HashSet::new()
        }
        Ok(JsonFile::Missing) => {
            info!("No seen-items file at '{}'; starting with an empty set", path.display());
            match file::bootstrap_from_template(path, "[]\n") {
                Ok(Bootstrap::FromTemplate(t)) => {
                    info!("Created '{}' from '{}'", path.display(), t.display());
                    // a template may carry entries on purpose
                    load_existing(path)
                }
                Ok(Bootstrap::Fallback) => HashSet::new(),
                Err(e) => {
                    warn!("Could not create '{}': {e}", path.display());
                    HashSet::new()
                }
            }
        }
        Err(e @ FileError::Json { .. }) => {
            error!("{e}; starting with an empty set");
            match file::quarantine(path) {
                Ok(copy) => warn!("Corrupt seen-items file kept as '{}'", copy.display()),
                Err(qe) => warn!("{qe}"),
            }
            HashSet::new()
        }
        Err(e) => {
            error!("{e}; starting with an empty set");
            HashSet::new()
        }
    }
}

fn load_existing(path: &Path) -> HashSet<String> {
    match file::read_json::<Vec<String>>(path) {
        Ok(JsonFile::Loaded(list)) => list.into_iter().collect(),
        Ok(_) => HashSet::new(),
        Err(e) => {
            warn!("{e}; starting with an empty set");
            HashSet::new()
        }
    }
}

/// Sorted, so diffs of the file stay readable.
pub fn save_seen(path: &Path, items: &HashSet<String>) -> Result<(), FileError> {
    let mut list: Vec<&String> = items.iter().collect();
    list.sort();
    file::write_json_atomic(path, &list)?;
    debug!("{} seen item(s) saved to '{}'", list.len(), path.display());
    Ok(())
}
