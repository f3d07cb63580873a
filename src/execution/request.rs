//! Run requests submitted to a session

use crate::errors::{Result, SandboxError};
use crate::storage::FileSet;
use crate::utils;

/// A single run: entry file plus a snapshot of every virtual file
#[derive(Debug, Clone)]
pub struct RunRequest {
    entry_path: String,
    entry_content: String,
    files: FileSet,
}

impl RunRequest {
    /// Run `entry_path` with its content taken from `files`
    pub fn new(entry_path: impl Into<String>, files: FileSet) -> Result<Self> {
        let entry_path = entry_path.into();
        let entry_content = files
            .get(&entry_path)
            .map(|file| file.content.clone())
            .ok_or_else(|| SandboxError::UnknownEntry(entry_path.clone()))?;

        Ok(Self {
            entry_path,
            entry_content,
            files,
        })
    }

    /// Run `entry_content` as `entry_path`, e.g. an unsaved editor buffer
    ///
    /// The entry must still name a file in `files`; [`RunRequest::validate`]
    /// checks it.
    pub fn with_entry_content(
        entry_path: impl Into<String>,
        entry_content: impl Into<String>,
        files: FileSet,
    ) -> Self {
        Self {
            entry_path: entry_path.into(),
            entry_content: entry_content.into(),
            files,
        }
    }

    pub fn entry_path(&self) -> &str {
        &self.entry_path
    }

    pub fn entry_content(&self) -> &str {
        &self.entry_content
    }

    pub fn files(&self) -> &FileSet {
        &self.files
    }

    /// Check the request before it touches a sandbox
    pub fn validate(&self) -> Result<()> {
        if !self.files.contains(&self.entry_path) {
            return Err(SandboxError::UnknownEntry(self.entry_path.clone()));
        }
        utils::sandbox_relative_path(&self.entry_path)?;
        self.files.validate()
    }
}
