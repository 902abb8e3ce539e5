// dbdump/src/logging.rs
//! Diagnostic logging.
//!
//! Logs go to stderr so they never interleave with the wizard screen or the status lines on
//! stdout. `RUST_LOG` overrides the level picked from the command line flags.

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::errors::AppError;

/// Maps `-v`/`-q` to a level. Quiet wins over verbose.
pub fn level_for(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::INFO,
        (false, 2) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

pub fn init_logging(verbose: u8, quiet: bool) -> Result<(), AppError> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level_for(verbose, quiet)).into())
        .from_env_lossy()
        // sqlx logs every statement at info.
        .add_directive(
            "sqlx=warn"
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid log directive: {}", e)))?,
        );

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to initialize logging: {}", e)))
}
