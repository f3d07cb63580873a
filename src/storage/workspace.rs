//! Sandbox workspace: the root directory the interpreter runs in

use crate::errors::Result;
use crate::storage::FileSet;
use crate::utils;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Root of a sandbox's virtual filesystem
pub struct Workspace {
    root: PathBuf,
    // Removed on drop when the workspace is temporary
    _temp: Option<TempDir>,
}

impl Workspace {
    /// Create a fresh temporary workspace, optionally under `parent`
    pub fn temporary(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("playground-");

        let temp = match parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        Ok(Self {
            root: temp.path().to_path_buf(),
            _temp: Some(temp),
        })
    }

    /// Use an existing directory, creating it if needed. It is kept on drop.
    pub fn at(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root, _temp: None })
    }

    /// Workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path for a virtual path
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        Ok(self.root.join(utils::sandbox_relative_path(path)?))
    }

    /// Write one file, creating parent directories as needed
    pub fn write_file(&self, path: &str, content: &str) -> Result<PathBuf> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            // Existing directories are fine
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, content)?;
        Ok(target)
    }

    /// Write every file of the set, returning the paths written
    ///
    /// All paths are validated before the first write.
    pub fn materialize(&self, files: &FileSet) -> Result<Vec<String>> {
        files.validate()?;

        let mut written = Vec::with_capacity(files.len());
        for file in files.iter() {
            self.write_file(&file.path, &file.content)?;
            written.push(file.path.clone());
        }

        debug!(
            "Materialized {} file(s) into {}",
            written.len(),
            self.root.display()
        );
        Ok(written)
    }
}
