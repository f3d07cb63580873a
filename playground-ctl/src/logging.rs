use console::style;
use env_logger::{Builder, Env};
use log::{Level, LevelFilter};
use std::io::Write;

/// Initialize the stderr logger
///
/// `RUST_LOG` applies unless `--verbose` forces debug output for this crate.
pub fn init_logger(verbose: bool) {
    let env = Env::default().filter_or("RUST_LOG", "warn");

    let mut builder = Builder::from_env(env);
    builder.format(|buf, record| {
        let level = match record.level() {
            Level::Error => format!("{}", style("ERROR").red().bold()),
            Level::Warn => format!("{}", style("WARN ").yellow().bold()),
            Level::Info => format!("{}", style("INFO ").green()),
            Level::Debug => format!("{}", style("DEBUG").cyan()),
            Level::Trace => format!("{}", style("TRACE").dim()),
        };
        if record.level() >= Level::Debug {
            writeln!(
                buf,
                "{} {} {}",
                level,
                style(record.target()).dim(),
                record.args()
            )
        } else {
            writeln!(buf, "{} {}", level, record.args())
        }
    });

    if verbose {
        builder.filter_module("sandbox_playground", LevelFilter::Debug);
        builder.filter_module("playground_ctl", LevelFilter::Debug);
    }

    // Tests in the same process may have installed a logger already
    let _ = builder.try_init();
}
