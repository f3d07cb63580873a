//! Storage layer: virtual file tree and sandbox workspace
//!
//! The editor side owns a [`FileSet`], a flat mapping from virtual path to
//! text. Each run hands a snapshot of it to the sandbox, which writes it into
//! its [`Workspace`] before executing the entry file.
//!
//! # Features
//!
//! - **FileSet**: ordered path -> content map, last write wins
//! - **Snapshots**: the flat JSON object shape browsers keep in local storage
//! - **Workspace**: temporary or caller-chosen root with idempotent mkdir
//!
//! # Examples
//!
//! ```ignore
//! use sandbox_playground::storage::{FileSet, Workspace};
//!
//! let mut files = FileSet::new();
//! files.insert("main.py", "import util\nutil.hello()\n");
//! files.insert("util.py", "def hello():\n    print('hi')\n");
//!
//! let workspace = Workspace::temporary(None)?;
//! workspace.materialize(&files)?;
//! ```

pub mod fileset;
pub mod workspace;
pub use fileset::{FileSet, SourceFile};
pub use workspace::Workspace;

#[cfg(test)]
mod tests;
