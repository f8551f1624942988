//! Session id ↔ file path mapping.
//!
//! A session with id `abc` and extension `.json` lives at `<dir>/abc.json`.
//! The reverse mapping strips the extension and returns an empty string for
//! anything that is not a session file, so callers can filter on it.

use regex::Regex;
use std::path::{Path, PathBuf};

/// The on-disk naming scheme of a store.
#[derive(Debug, Clone)]
pub struct FileLayout {
    dir: PathBuf,
    extension: String,
    pattern: Regex,
}

impl FileLayout {
    /// Builds a layout, compiling the extension into an anchored suffix pattern.
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Result<Self, regex::Error> {
        let extension = extension.into();
        let pattern = Regex::new(&format!("{}$", regex::escape(&extension)))?;
        Ok(Self {
            dir: dir.into(),
            extension,
            pattern,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// The compiled file-matching pattern.
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Path of the file backing session `id`.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", id, self.extension))
    }

    /// Session id encoded in `file_name`, or `""` if it is not a session file.
    pub fn id_for(&self, file_name: &str) -> String {
        if self.extension.is_empty() {
            return file_name.to_string();
        }
        match self.pattern.find(file_name) {
            Some(m) => file_name[..m.start()].to_string(),
            None => String::new(),
        }
    }

    /// Returns true if `file_name` looks like a session file.
    pub fn matches(&self, file_name: &str) -> bool {
        self.pattern.is_match(file_name)
    }
}
