use log::info;
use sandbox_playground::bridge::{DEFAULT_INPUT_BUFFER_BYTES, STATUS_CELL_BYTES};
use sandbox_playground::utils;
use std::path::PathBuf;

/// Report whether a usable Python runtime is available; returns success
pub fn check_requirements(python: Option<PathBuf>) -> bool {
    let python = python.unwrap_or_else(utils::default_python);

    info!("Checking playground requirements");
    println!("Checking playground requirements...\n");

    let found = match utils::python_version(&python) {
        Some(version) => {
            println!("[✓] {} ({})", version, python.display());
            true
        }
        None => {
            println!("[✗] No Python runtime at {} (required)", python.display());
            println!("    Set {} or pass --python", utils::PYTHON_ENV);
            false
        }
    };

    println!("\nSession defaults:");
    println!(
        "  Input buffer: {} bytes ({} data + {} status)",
        DEFAULT_INPUT_BUFFER_BYTES,
        DEFAULT_INPUT_BUFFER_BYTES - STATUS_CELL_BYTES,
        STATUS_CELL_BYTES
    );
    println!("  Workspaces:   {}", std::env::temp_dir().display());

    found
}
