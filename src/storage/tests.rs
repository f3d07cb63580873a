use super::{FileSet, SourceFile, Workspace};
use crate::errors::SandboxError;
use std::fs;
use tempfile::tempdir;

fn sample_files() -> FileSet {
    let mut files = FileSet::new();
    files.insert("main.py", "import util\nutil.hello()\n");
    files.insert("util.py", "def hello():\n    print('hi')\n");
    files.insert("data/input/names.txt", "Ada\nGrace\n");
    files
}

#[test]
fn file_set_last_insert_wins() {
    let mut files = FileSet::new();
    assert!(files.insert("main.py", "print(1)").is_none());

    let previous = files.insert("main.py", "print(2)");
    assert_eq!(previous, Some(SourceFile::new("main.py", "print(1)")));
    assert_eq!(files.len(), 1);
    assert_eq!(files.get("main.py").unwrap().content, "print(2)");
}

#[test]
fn file_set_iterates_in_path_order() {
    let files = sample_files();
    let paths: Vec<&str> = files.paths().collect();
    assert_eq!(paths, vec!["data/input/names.txt", "main.py", "util.py"]);
}

#[test]
fn file_set_remove_and_contains() {
    let mut files = sample_files();
    assert!(files.contains("util.py"));
    assert!(files.remove("util.py").is_some());
    assert!(!files.contains("util.py"));
    assert!(files.remove("util.py").is_none());
}

#[test]
fn file_set_snapshot_uses_flat_object() {
    let mut files = FileSet::new();
    files.insert("main.py", "print('hi')\n");

    let json = files.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["main.py"], "print('hi')\n");

    let restored = FileSet::from_json(&json).unwrap();
    assert_eq!(restored, files);
}

#[test]
fn file_set_rejects_malformed_snapshot() {
    let err = FileSet::from_json("[1, 2, 3]").unwrap_err();
    assert!(matches!(err, SandboxError::Protocol(_)));
}

#[test]
fn file_set_validate_flags_escaping_paths() {
    let mut files = sample_files();
    assert!(files.validate().is_ok());

    files.insert("../outside.py", "x = 1");
    assert!(matches!(
        files.validate(),
        Err(SandboxError::InvalidPath(path)) if path == "../outside.py"
    ));
}

#[test]
fn file_set_loads_directory_tree() {
    let tmp = tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("pkg")).unwrap();
    fs::create_dir_all(tmp.path().join(".git")).unwrap();
    fs::write(tmp.path().join("main.py"), "import pkg.mod\n").unwrap();
    fs::write(tmp.path().join("pkg/mod.py"), "VALUE = 1\n").unwrap();
    fs::write(tmp.path().join(".git/HEAD"), "ref: main\n").unwrap();
    fs::write(tmp.path().join("blob.bin"), [0xff, 0xfe, 0x00]).unwrap();

    let files = FileSet::from_dir(tmp.path()).unwrap();
    let paths: Vec<&str> = files.paths().collect();
    assert_eq!(paths, vec!["main.py", "pkg/mod.py"]);
}

#[test]
fn file_set_from_dir_requires_directory() {
    let tmp = tempdir().unwrap();
    let file = tmp.path().join("main.py");
    fs::write(&file, "").unwrap();
    assert!(FileSet::from_dir(&file).is_err());
}

#[test]
fn workspace_materializes_nested_directories() {
    let workspace = Workspace::temporary(None).unwrap();
    let written = workspace.materialize(&sample_files()).unwrap();

    assert_eq!(written.len(), 3);
    let names = fs::read_to_string(workspace.root().join("data/input/names.txt")).unwrap();
    assert_eq!(names, "Ada\nGrace\n");
    assert!(workspace.root().join("util.py").is_file());
}

#[test]
fn workspace_materialize_is_idempotent() {
    let workspace = Workspace::temporary(None).unwrap();
    let mut files = sample_files();
    workspace.materialize(&files).unwrap();

    files.insert("data/input/names.txt", "Linus\n");
    workspace.materialize(&files).unwrap();

    let names = fs::read_to_string(workspace.root().join("data/input/names.txt")).unwrap();
    assert_eq!(names, "Linus\n");
}

#[test]
fn workspace_rejects_invalid_paths_before_writing() {
    let workspace = Workspace::temporary(None).unwrap();
    let mut files = FileSet::new();
    files.insert("a.py", "x = 1");
    files.insert("/etc/evil", "boom");

    assert!(workspace.materialize(&files).is_err());
    assert!(!workspace.root().join("a.py").exists());
}

#[test]
fn temporary_workspace_is_removed_on_drop() {
    let parent = tempdir().unwrap();
    let root = {
        let workspace = Workspace::temporary(Some(parent.path())).unwrap();
        assert!(workspace.root().starts_with(parent.path()));
        workspace.root().to_path_buf()
    };
    assert!(!root.exists());
}

#[test]
fn persistent_workspace_survives_drop() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("ws");
    {
        let workspace = Workspace::at(&root).unwrap();
        workspace.write_file("keep.txt", "kept").unwrap();
    }
    assert_eq!(fs::read_to_string(root.join("keep.txt")).unwrap(), "kept");
}
