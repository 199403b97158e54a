//! # driveseal CLI
//!
//! Seal a removable volume and later check it for changes.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use driveseal_config::{init_logging, log_cli_debug, log_cli_info, Config};
use driveseal_scan::{is_sealed, Sealer, StatusCode};

mod device;

/// Tamper detection for removable volumes
#[derive(Parser)]
#[command(name = "driveseal")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.driveseal/config.toml
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not require the root to be a USB mass-storage mount point
    #[arg(long, global = true, env = "DRIVESEAL_SKIP_DEVICE_CHECK")]
    skip_device_check: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the current state of a volume
    Auth {
        #[arg(value_name = "ROOT")]
        root: PathBuf,
    },

    /// Re-record a volume that has already been sealed
    #[command(alias = "authagain")]
    Reauth {
        #[arg(value_name = "ROOT")]
        root: PathBuf,
    },

    /// Check a sealed volume against its recorded state
    Scan {
        #[arg(value_name = "ROOT")]
        root: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print the global config file location
    Path,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => exit(StatusCode::OptionError),
            };
        }
    };

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return exit(StatusCode::OptionError);
        }
    };
    init_logging(config.log.level);

    match cli.command {
        Commands::Config { command } => match show_config(&command, &config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                exit(StatusCode::OptionError)
            }
        },
        Commands::Auth { root } => exit(seal(&root, config, Mode::Authorize, cli.skip_device_check)),
        Commands::Reauth { root } => {
            exit(seal(&root, config, Mode::Reauthorize, cli.skip_device_check))
        }
        Commands::Scan { root } => exit(seal(&root, config, Mode::Verify, cli.skip_device_check)),
    }
}

fn exit(status: StatusCode) -> ExitCode {
    ExitCode::from(status.exit_code())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load().context("Failed to load global config"),
    }
}

fn show_config(command: &ConfigCommands, config: &Config) -> Result<()> {
    match command {
        ConfigCommands::Show => print!("{}", config.to_toml()?),
        ConfigCommands::Path => match Config::global_config_path() {
            Some(path) => println!("Global: {}", path.display()),
            None => println!("Global: (no home directory)"),
        },
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Authorize,
    Reauthorize,
    Verify,
}

fn seal(root: &Path, config: Config, mode: Mode, skip_device_check: bool) -> StatusCode {
    log_cli_debug!(
        "Dispatching",
        mode = tracing::field::debug(mode),
        root = tracing::field::display(root.display()),
    );

    if matches!(mode, Mode::Reauthorize | Mode::Verify) && !is_sealed(root) {
        eprintln!("Error: {} has not been sealed", root.display());
        return StatusCode::SignatureMismatch;
    }
    if !skip_device_check && !device::is_removable_usb(root) {
        eprintln!(
            "Error: {} is not the mount point of a USB storage device",
            root.display()
        );
        return StatusCode::DeviceError;
    }

    let sealer = Sealer::new(config);
    let status = match mode {
        Mode::Authorize | Mode::Reauthorize => match sealer.authorize(root) {
            Ok(report) => {
                println!(
                    "Sealed {} ({} entries, {} bits, {} rounds)",
                    root.display(),
                    report.entries,
                    report.bit_count,
                    report.hash_rounds
                );
                StatusCode::Success
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                e.status()
            }
        },
        Mode::Verify => match sealer.verify(root) {
            Ok(report) => {
                println!("Verified {} ({} entries)", root.display(), report.entries);
                StatusCode::Success
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                e.status()
            }
        },
    };

    log_cli_info!("Finished", status = status.code());
    status
}
