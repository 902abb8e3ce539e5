//! Interactive database dump tool
//!
//! Provides the CLI around the selection wizard and the dump orchestrator

// dbdump/src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use dbdump::catalog::LiveCatalog;
use dbdump::config::{self, AppConfig, ConnectionRegistry};
use dbdump::dump::{DumpOrchestrator, StrategyTable};
use dbdump::errors::AppError;
use dbdump::logging::init_logging;
use dbdump::wizard::terminal::TerminalSource;
use dbdump::wizard::{run_wizard, Wizard};

#[derive(Parser, Debug)]
#[command(name = "dbdump", version, about = "Pick databases and tables interactively, then dump them")]
struct Cli {
    /// More diagnostics on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (defaults to $DBDUMP_CONFIG, then ~/.config/dbdump/dbdump.yaml)
    #[arg(long, global = true, env = config::CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the selection wizard, then dump what was selected
    Dump,
    /// List stored connections
    Connections,
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write an empty configuration if none exists
    Init,
    /// Overwrite the configuration with an empty one
    Reset,
    /// Print the configuration file location
    Path,
}

/// Main entry point for the dump tool
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.verbose, cli.quiet) {
        eprintln!("❌ Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run_app(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the command succeeded; `Err` is reserved for failures before any work started.
async fn run_app(cli: Cli) -> Result<bool> {
    let config_path = config::resolve_config_path(cli.config.as_deref())?;

    match cli.command {
        Command::Dump => run_dump(&config_path).await,
        Command::Connections => {
            let app_config = AppConfig::load_from_yaml(&config_path)?;
            let connections = app_config.list_connections();
            if connections.is_empty() {
                println!("No stored connections in {}", config_path.display());
            }
            for conn in connections {
                println!("{:<16} {:<32} {}", conn.tag, conn.endpoint(), conn.driver);
            }
            Ok(true)
        }
        Command::Config { action } => {
            match action {
                ConfigAction::Init => {
                    if config::init_config(&config_path)? {
                        println!("✅ Created {}", config_path.display());
                    } else {
                        println!("Configuration already exists at {}", config_path.display());
                    }
                }
                ConfigAction::Reset => {
                    config::reset_config(&config_path)?;
                    println!("✅ Reset {}", config_path.display());
                }
                ConfigAction::Path => println!("{}", config_path.display()),
            }
            Ok(true)
        }
    }
}

async fn run_dump(config_path: &std::path::Path) -> Result<bool> {
    let app_config = AppConfig::load_from_yaml(config_path).with_context(|| {
        format!(
            "Failed to load application configuration from {}",
            config_path.display()
        )
    })?;
    if app_config.list_connections().is_empty() {
        return Err(AppError::NoConnections.into());
    }

    let catalog = LiveCatalog;
    let mut wizard = Wizard::new(&app_config, app_config.default_destination());

    // The terminal guard must be dropped before anything else is printed.
    let outcome = {
        let mut terminal = TerminalSource::enter().context("Failed to prepare the terminal")?;
        run_wizard(&mut wizard, &catalog, &mut terminal).await
    };

    let scope = match outcome {
        Ok(Some(scope)) => scope,
        Ok(None) => {
            println!("Dump cancelled, nothing was written.");
            return Ok(true);
        }
        Err(AppError::Catalog(e)) => {
            println!("❌ {}", e);
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    println!("🚀 Starting dump into {}...", scope.destination().display());
    let orchestrator = DumpOrchestrator::new(StrategyTable::with_defaults());
    info!(run = orchestrator.run_timestamp(), "Starting orchestration");
    let report = orchestrator.run(&scope).await;
    for line in report.status_lines() {
        println!("{}", line);
    }
    Ok(report.success)
}
