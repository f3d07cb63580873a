//! Virtual file set submitted with every run

use crate::errors::{Result, SandboxError};
use crate::utils;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A single virtual file, identified by its path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// `/`-separated path relative to the workspace root
    pub path: String,
    /// File text
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Mapping from virtual path to [`SourceFile`]
///
/// Serialises as a flat `{ "path": "content" }` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct FileSet {
    files: BTreeMap<String, SourceFile>,
}

impl FileSet {
    /// Create an empty file set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file, returning the previous version
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Option<SourceFile> {
        let file = SourceFile::new(path, content);
        self.files.insert(file.path.clone(), file)
    }

    /// Look up a file by path
    pub fn get(&self, path: &str) -> Option<&SourceFile> {
        self.files.get(path)
    }

    /// Check whether a path is present
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Remove a file
    pub fn remove(&mut self, path: &str) -> Option<SourceFile> {
        self.files.remove(path)
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the set holds no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate files in path order
    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    /// Iterate paths in order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Check every path is a valid workspace-relative path
    pub fn validate(&self) -> Result<()> {
        for path in self.files.keys() {
            utils::sandbox_relative_path(path)?;
        }
        Ok(())
    }

    /// Parse a flat JSON snapshot
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render as a flat JSON snapshot
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load every UTF-8 file below `dir`, keyed by its `/`-separated relative path
    ///
    /// Hidden entries (leading `.`) are skipped.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(SandboxError::InvalidConfig(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let mut set = FileSet::new();
        let mut pending = vec![(dir.to_path_buf(), String::new())];

        while let Some((current, prefix)) = pending.pop() {
            for entry in fs::read_dir(&current)? {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }

                let virtual_path = if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", prefix, name)
                };

                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    pending.push((entry.path(), virtual_path));
                } else if file_type.is_file() {
                    match fs::read_to_string(entry.path()) {
                        Ok(content) => {
                            set.insert(virtual_path, content);
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                            log::debug!("Skipping non-UTF-8 file {}", virtual_path);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }

        Ok(set)
    }
}

impl From<BTreeMap<String, String>> for FileSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<FileSet> for BTreeMap<String, String> {
    fn from(set: FileSet) -> Self {
        set.files
            .into_values()
            .map(|file| (file.path, file.content))
            .collect()
    }
}

impl<P: Into<String>, C: Into<String>> FromIterator<(P, C)> for FileSet {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut set = FileSet::new();
        set.extend(iter);
        set
    }
}

impl<P: Into<String>, C: Into<String>> Extend<(P, C)> for FileSet {
    fn extend<I: IntoIterator<Item = (P, C)>>(&mut self, iter: I) {
        for (path, content) in iter {
            self.insert(path, content);
        }
    }
}
