//! eeprog CLI - Command-line tool for reading and writing serial EEPROMs.
//!
//! ## Features
//!
//! - Read an EEPROM into a file
//! - Write a file to an EEPROM with read-back verification
//! - Encode and decode odometer mileage blocks
//! - Serial port auto-detection
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use console::style;
use eeprog::{CancelFlag, DeviceKind, Framing, RetryPolicy};
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

mod commands;
mod config;

use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Tripped by the Ctrl-C handler and shared with every programmer session.
static INTERRUPT: LazyLock<CancelFlag> = LazyLock::new(CancelFlag::new);

/// Exit code for runtime failures.
const EXIT_FAILURE: u8 = 1;
/// Exit code for invalid usage or configuration.
const EXIT_USAGE: u8 = 2;
/// Exit code after Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

/// Check if progress bars should be drawn (TTY and colors enabled).
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Whether Ctrl-C was pressed.
pub(crate) fn was_interrupted() -> bool {
    INTERRUPT.is_cancelled()
}

/// Handle on the Ctrl-C flag for library sessions.
pub(crate) fn interrupt_flag() -> CancelFlag {
    INTERRUPT.clone()
}

/// Errors the CLI reports with a dedicated exit code.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Invalid arguments or configuration.
    #[error("{0}")]
    Usage(String),
    /// Ctrl-C was pressed.
    #[error("{0}")]
    Cancelled(String),
}

/// eeprog - Read and write serial EEPROMs through an Arduino bridge.
///
/// Environment variables:
///   EEPROG_PORT            - Serial port
///   EEPROG_TYPE            - EEPROM type (microwire, i2c)
///   EEPROG_START_ADDRESS   - Start address (decimal or 0x-prefixed hex)
///   EEPROG_FRAMING         - Bridge framing (cobs, line)
#[derive(Parser)]
#[command(name = "eeprog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "EEPROG_PORT")]
    pub port: Option<String>,

    /// EEPROM type [default: microwire].
    #[arg(short = 't', long = "type", global = true, value_enum, env = "EEPROG_TYPE")]
    pub eeprom_type: Option<EepromType>,

    /// Start address in registers (microwire) or bytes (I2C) [default: 0].
    #[arg(short, long, global = true, value_parser = parse_address, env = "EEPROG_START_ADDRESS")]
    pub start_address: Option<u16>,

    /// Bridge framing [default: cobs].
    #[arg(long, global = true, value_enum, env = "EEPROG_FRAMING")]
    pub framing: Option<FramingArg>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported EEPROM types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum EepromType {
    /// Three-wire microwire EEPROM (93Cxx).
    Microwire,
    /// Two-wire I2C EEPROM (24Cxx).
    I2c,
}

impl From<EepromType> for DeviceKind {
    fn from(kind: EepromType) -> Self {
        match kind {
            EepromType::Microwire => DeviceKind::Microwire,
            EepromType::I2c => DeviceKind::I2c,
        }
    }
}

/// Bridge firmware framing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum FramingArg {
    /// COBS-framed binary commands.
    Cobs,
    /// ASCII line commands.
    Line,
}

impl From<FramingArg> for Framing {
    fn from(framing: FramingArg) -> Self {
        match framing {
            FramingArg::Cobs => Framing::Cobs,
            FramingArg::Line => Framing::Line,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Read the EEPROM into a file.
    Read {
        /// File to write the EEPROM contents to.
        #[arg(short, long)]
        output_file: PathBuf,

        /// Number of bytes to read.
        #[arg(short = 'l', long, default_value_t = 256)]
        read_length: usize,
    },

    /// Write a file to the EEPROM and verify it.
    Write {
        /// File to write to the EEPROM.
        #[arg(short, long)]
        input_file: PathBuf,

        /// Skip the read-back comparison.
        #[arg(long)]
        no_verify: bool,
    },

    /// Encode or decode odometer mileage blocks.
    Odometer {
        #[command(subcommand)]
        action: OdometerAction,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type (detected from $SHELL if not specified).
        #[arg(value_enum)]
        shell: Option<Shell>,
    },
}

/// Odometer subcommands.
#[derive(Subcommand)]
pub(crate) enum OdometerAction {
    /// Encode mileage into a 32-byte block.
    Encode {
        /// Mileage to encode (0..=1048575).
        mileage: u32,

        /// Also write the raw block to this file.
        #[arg(short, long)]
        output_file: Option<PathBuf>,
    },

    /// Decode a 32-byte block file into mileage.
    Decode {
        /// File holding the 32-byte block.
        file: PathBuf,
    },
}

/// Parse an address in decimal or `0x`-prefixed hex.
fn parse_address(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let s: String = s.chars().filter(|c| *c != '_').collect();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse::<u32>()
    };
    let value = parsed.map_err(|e| format!("Invalid address '{s}': {e}"))?;
    u16::try_from(value).map_err(|_| format!("Address {value:#x} does not fit in 16 bits"))
}

/// Effective settings after merging flags, environment and config files.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    /// Serial port, if one was configured.
    pub port: Option<String>,
    /// EEPROM type.
    pub kind: DeviceKind,
    /// Start address.
    pub start_address: u16,
    /// Bridge framing.
    pub framing: Framing,
    /// Retry budget.
    pub retry: RetryPolicy,
    /// Skip read-back verification by default.
    pub skip_verify: bool,
}

impl Settings {
    /// Flags and environment win over config files.
    fn resolve(cli: &Cli, config: &Config) -> Result<Self> {
        let kind = match (cli.eeprom_type, config.eeprom.kind.as_deref()) {
            (Some(kind), _) => kind.into(),
            (None, Some(name)) => name
                .parse()
                .map_err(|e: eeprog::Error| CliError::Usage(e.to_string()))?,
            (None, None) => DeviceKind::default(),
        };

        let framing = match (cli.framing, config.connection.framing.as_deref()) {
            (Some(framing), _) => framing.into(),
            (None, Some(name)) => name
                .parse()
                .map_err(|e: eeprog::Error| CliError::Usage(e.to_string()))?,
            (None, None) => Framing::default(),
        };

        let start_address = match (cli.start_address, config.eeprom.start_address) {
            (Some(address), _) => address,
            (None, Some(address)) => u16::try_from(address).map_err(|_| {
                CliError::Usage(format!("Configured start address {address:#x} does not fit in 16 bits"))
            })?,
            (None, None) => 0,
        };

        let mut retry = RetryPolicy::default();
        if let Some(attempts) = config.connection.retries {
            retry.max_attempts = attempts;
        }
        if let Some(delay) = config.connection.retry_delay_ms {
            retry.delay = Duration::from_millis(delay);
        }

        Ok(Self {
            port: cli.port.clone().or_else(|| config.connection.serial.clone()),
            kind,
            start_address,
            framing,
            retry,
            skip_verify: config.eeprom.skip_verify,
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);
    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "eeprog v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    install_interrupt_handler();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            ExitCode::from(exit_code(&err))
        },
    }
}

fn install_interrupt_handler() {
    let result = ctrlc::set_handler(|| {
        if INTERRUPT.cancel() {
            // Second Ctrl-C: give up immediately
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
    });
    if let Err(e) = result {
        debug!("Failed to install Ctrl-C handler: {e}");
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Read {
            output_file,
            read_length,
        } => {
            let settings = Settings::resolve(cli, &config)?;
            commands::eeprom::cmd_read(cli, &settings, output_file, *read_length)
        },
        Commands::Write {
            input_file,
            no_verify,
        } => {
            let settings = Settings::resolve(cli, &config)?;
            let verify = !(*no_verify || settings.skip_verify);
            commands::eeprom::cmd_write(cli, &settings, input_file, verify)
        },
        Commands::Odometer { action } => match action {
            OdometerAction::Encode {
                mileage,
                output_file,
            } => commands::odometer::cmd_encode(cli, *mileage, output_file.as_deref()),
            OdometerAction::Decode { file } => commands::odometer::cmd_decode(cli, file),
        },
        Commands::ListPorts { json } => commands::ports::cmd_list_ports(*json),
        Commands::Completions { shell } => {
            let shell = shell
                .or_else(commands::completions::detect_shell_type)
                .ok_or_else(|| {
                    CliError::Usage(
                        "Could not detect the shell, specify one, e.g.: eeprog completions bash"
                            .to_string(),
                    )
                })?;
            commands::completions::cmd_completions(shell);
            Ok(())
        },
    }
}

/// Map an error chain to the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return match cli_err {
                CliError::Usage(_) => EXIT_USAGE,
                CliError::Cancelled(_) => EXIT_INTERRUPTED,
            };
        }
        if let Some(eeprog::Error::Interrupted) = cause.downcast_ref::<eeprog::Error>() {
            return EXIT_INTERRUPTED;
        }
    }
    EXIT_FAILURE
}
