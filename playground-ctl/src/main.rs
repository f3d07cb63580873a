//! Playground controller CLI - Run programs in an interactive Python sandbox

mod cli;
mod commands;
mod logging;
mod runner;

use clap::Parser;
use cli::{Cli, Commands};
use commands::check_requirements;
use console::style;
use runner::{RunConfig, run_program};

fn main() {
    let cli = Cli::parse();

    logging::init_logger(cli.verbose);

    match cli.command {
        Commands::Run {
            entry,
            dir,
            snapshot,
            no_input,
            input_buffer,
            timeout,
            load_timeout,
        } => {
            let config = RunConfig {
                id: cli.id,
                entry,
                dir,
                snapshot,
                python: cli.python,
                no_input,
                input_buffer,
                timeout,
                load_timeout,
            };
            match run_program(config) {
                Ok(code) => std::process::exit(code),
                Err(e) => {
                    eprintln!("{} {}", style("error:").red().bold(), e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Check => {
            if !check_requirements(cli.python) {
                std::process::exit(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_arguments_parse() {
        let cli = Cli::parse_from([
            "playground-ctl",
            "run",
            "main.py",
            "--dir",
            "/tmp/project",
            "--timeout",
            "5",
            "--no-input",
        ]);
        match cli.command {
            Commands::Run {
                entry,
                dir,
                timeout,
                no_input,
                load_timeout,
                ..
            } => {
                assert_eq!(entry, "main.py");
                assert_eq!(dir.as_deref(), Some(std::path::Path::new("/tmp/project")));
                assert_eq!(timeout, Some(5));
                assert!(no_input);
                assert_eq!(load_timeout, 30);
            }
            Commands::Check => panic!("expected run"),
        }
    }

    #[test]
    fn dir_and_snapshot_conflict() {
        let result = Cli::try_parse_from([
            "playground-ctl",
            "run",
            "main.py",
            "--dir",
            "a",
            "--snapshot",
            "b.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn check_requirements_runs() {
        check_requirements(Some("/nonexistent/python3".into()));
    }
}
