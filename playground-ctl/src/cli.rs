use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "playground-ctl")]
#[command(version, about = "Run playground programs in an interactive Python sandbox", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Run main.py from the current directory, answering input() prompts here
    playground-ctl run main.py

    # Run from another directory, or from a saved file-tree snapshot
    playground-ctl run app.py --dir ./project
    playground-ctl run main.py --snapshot files.json

    # Stop the program after ten seconds
    playground-ctl run loop.py --timeout 10

    # Check the Python runtime
    playground-ctl check --python /usr/bin/python3.12
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Session ID (auto-generated if not provided)
    #[arg(short, long, value_name = "ID", global = true)]
    pub id: Option<String>,

    /// Python executable (defaults to $PLAYGROUND_PYTHON, then python3)
    #[arg(short, long, value_name = "PATH", global = true)]
    pub python: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an entry file in a fresh session
    Run {
        /// Entry file, relative to the file set root
        entry: String,

        /// Directory to load the file set from (default: current directory)
        #[arg(short, long, value_name = "DIR", conflicts_with = "snapshot")]
        dir: Option<PathBuf>,

        /// JSON snapshot mapping virtual paths to file contents
        #[arg(short, long, value_name = "FILE")]
        snapshot: Option<PathBuf>,

        /// Make input() fail instead of prompting
        #[arg(long)]
        no_input: bool,

        /// Input buffer size in bytes, status cell included
        #[arg(long, value_name = "BYTES")]
        input_buffer: Option<usize>,

        /// Stop the program after this many seconds
        #[arg(short, long, value_name = "SECONDS")]
        timeout: Option<u64>,

        /// Give up if the sandbox is not ready after this many seconds
        #[arg(long, value_name = "SECONDS", default_value_t = 30)]
        load_timeout: u64,
    },

    /// Check the Python runtime
    Check,
}
