//! Utility functions for playground sessions

use crate::errors::{Result, SandboxError};
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, MutexGuard};

/// Environment variable naming the Python executable to launch
pub const PYTHON_ENV: &str = "PLAYGROUND_PYTHON";

/// Python executable used when `PLAYGROUND_PYTHON` is unset
pub const DEFAULT_PYTHON: &str = "python3";

/// Resolve the Python executable from the environment
pub fn default_python() -> PathBuf {
    python_from(std::env::var_os(PYTHON_ENV).map(PathBuf::from))
}

fn python_from(value: Option<PathBuf>) -> PathBuf {
    value
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON))
}

/// Query the version string of a Python executable, if it runs at all
pub fn python_version(python: &Path) -> Option<String> {
    let output = Command::new(python)
        .args(["-c", "import sys; print(sys.version.split()[0])"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!version.is_empty()).then_some(version)
}

/// Turn a `/`-separated virtual path into a relative path inside the workspace
///
/// Rejects empty and absolute paths, `..` components and NUL bytes. `.` and
/// repeated separators are dropped.
pub fn sandbox_relative_path(path: &str) -> Result<PathBuf> {
    if path.contains('\0') || path.starts_with('/') {
        return Err(SandboxError::InvalidPath(path.to_string()));
    }

    let mut relative = PathBuf::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(SandboxError::InvalidPath(path.to_string())),
            _ => relative.push(part),
        }
    }

    // A Windows-style prefix or root sneaking in through a single component
    if relative.as_os_str().is_empty()
        || !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(SandboxError::InvalidPath(path.to_string()));
    }

    Ok(relative)
}

/// Best-effort 1-based line number from a textual diagnostic
///
/// Picks the last `line N` in the message, which for a traceback is the
/// innermost frame.
pub fn extract_line_number(message: &str) -> Option<u32> {
    message.rmatch_indices("line ").find_map(|(idx, pat)| {
        let digits: String = message[idx + pat.len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse::<u32>().ok().filter(|line| *line > 0)
    })
}

/// Lock a mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_simple() {
        assert_eq!(
            sandbox_relative_path("main.py").unwrap(),
            PathBuf::from("main.py")
        );
    }

    #[test]
    fn test_relative_path_nested() {
        assert_eq!(
            sandbox_relative_path("pkg/sub/mod.py").unwrap(),
            PathBuf::from("pkg").join("sub").join("mod.py")
        );
    }

    #[test]
    fn test_relative_path_normalises_dots_and_slashes() {
        assert_eq!(
            sandbox_relative_path("./pkg//mod.py").unwrap(),
            PathBuf::from("pkg").join("mod.py")
        );
    }

    #[test]
    fn test_relative_path_rejects_escapes() {
        assert!(sandbox_relative_path("../etc/passwd").is_err());
        assert!(sandbox_relative_path("pkg/../../x").is_err());
        assert!(sandbox_relative_path("/etc/passwd").is_err());
    }

    #[test]
    fn test_relative_path_rejects_empty() {
        assert!(sandbox_relative_path("").is_err());
        assert!(sandbox_relative_path("./").is_err());
        assert!(sandbox_relative_path("a\0b").is_err());
    }

    #[test]
    fn test_extract_line_from_traceback() {
        let message = "Traceback (most recent call last):\n  File \"main.py\", line 3, in <module>\nZeroDivisionError: division by zero";
        assert_eq!(extract_line_number(message), Some(3));
    }

    #[test]
    fn test_extract_line_prefers_innermost_frame() {
        let message = "File \"main.py\", line 7, in <module>\nFile \"util.py\", line 12, in f";
        assert_eq!(extract_line_number(message), Some(12));
    }

    #[test]
    fn test_extract_line_skips_words_without_digits() {
        let message = "File \"main.py\", line 4\nSyntaxError: unexpected line break";
        assert_eq!(extract_line_number(message), Some(4));
    }

    #[test]
    fn test_extract_line_absent() {
        assert_eq!(extract_line_number("NameError: name 'x' is not defined"), None);
        assert_eq!(extract_line_number("line 0"), None);
    }

    #[test]
    fn test_python_from_default() {
        assert_eq!(python_from(None), PathBuf::from(DEFAULT_PYTHON));
        assert_eq!(
            python_from(Some(PathBuf::new())),
            PathBuf::from(DEFAULT_PYTHON)
        );
        assert_eq!(
            python_from(Some(PathBuf::from("/opt/py/bin/python3.12"))),
            PathBuf::from("/opt/py/bin/python3.12")
        );
    }

    #[test]
    fn test_python_version_missing_binary() {
        assert!(python_version(Path::new("/nonexistent/python-playground")).is_none());
    }

    #[test]
    fn test_lock_recovers_poison() {
        let mutex = std::sync::Arc::new(Mutex::new(1));
        let clone = mutex.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert_eq!(*lock(&mutex), 1);
    }
}
