//! Read and write command implementations.

use anyhow::{Context, Result};
use console::style;
use eeprog::{Error, NativePort, Programmer, SerialConfig, SessionConfig, hexdump};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::fs;
use std::path::Path;

use crate::{Cli, CliError, Settings, interrupt_flag, use_fancy_output, was_interrupted};

fn ensure_not_interrupted() -> Result<()> {
    if was_interrupted() {
        Err(CliError::Cancelled("Interrupted".to_string()).into())
    } else {
        Ok(())
    }
}

/// Resolve the port, open it and connect to the bridge.
fn open_programmer(cli: &Cli, settings: &Settings) -> Result<Programmer<NativePort>> {
    let port = match &settings.port {
        Some(port) => port.clone(),
        None => {
            eeprog::auto_detect_port()
                .context("No serial port specified and none could be detected (use --port)")?
                .name
        },
    };

    if !cli.quiet {
        eprintln!(
            "{} Using {} ({} EEPROM, {} framing)",
            style("🔌").cyan(),
            style(&port).cyan(),
            settings.kind,
            settings.framing
        );
    }

    let mut config = SessionConfig::new(port)
        .with_framing(settings.framing)
        .with_cancel_flag(interrupt_flag());
    config.retry = settings.retry;

    let mut programmer = Programmer::open(&config)?;
    programmer
        .connect()
        .context("Failed to connect to the bridge board")?;
    Ok(programmer)
}

/// Read command implementation.
pub(crate) fn cmd_read(
    cli: &Cli,
    settings: &Settings,
    output_file: &Path,
    read_length: usize,
) -> Result<()> {
    let mut programmer = open_programmer(cli, settings)?;
    ensure_not_interrupted()?;

    let wire_time = SerialConfig::default().wire_time(read_length);
    info!(
        "Reading {read_length} bytes from {:#06x} (~{:.1}s on the wire)",
        settings.start_address,
        wire_time.as_secs_f64()
    );

    let result = programmer.read(settings.start_address, read_length, settings.kind);
    programmer.close()?;
    let data = result.context("EEPROM read failed")?;

    fs::write(output_file, &data)
        .with_context(|| format!("Failed to write {}", output_file.display()))?;

    print!("{}", hexdump::dump(&data));
    if !cli.quiet {
        eprintln!(
            "{} Saved {} bytes to {}",
            style("✓").green(),
            data.len(),
            output_file.display()
        );
    }

    Ok(())
}

/// Write command implementation.
pub(crate) fn cmd_write(
    cli: &Cli,
    settings: &Settings,
    input_file: &Path,
    verify: bool,
) -> Result<()> {
    let data = fs::read(input_file)
        .with_context(|| format!("Failed to read {}", input_file.display()))?;
    debug!("Loaded {} bytes from {}", data.len(), input_file.display());

    let mut programmer = open_programmer(cli, settings)?;
    ensure_not_interrupted()?;

    let result = write_and_verify(cli, &mut programmer, settings, &data, verify);
    programmer.close()?;
    result?;

    if !cli.quiet {
        let what = if verify { "written and verified" } else { "written" };
        eprintln!(
            "{} {} bytes {what} from {}",
            style("✓").green(),
            data.len(),
            input_file.display()
        );
    }

    Ok(())
}

fn write_and_verify(
    cli: &Cli,
    programmer: &mut Programmer<NativePort>,
    settings: &Settings,
    data: &[u8],
    verify: bool,
) -> Result<()> {
    let pb = if cli.quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(data.len() as u64)
    };
    #[allow(clippy::unwrap_used)] // Static template string
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message("writing");

    let mut progress = |done: usize, _total: usize| pb.set_position(done as u64);
    let (address, kind) = (settings.start_address, settings.kind);
    let result = if verify {
        programmer.write_verified(address, data, kind, &mut progress)
    } else {
        programmer.write_image(address, data, kind, &mut progress)
    };

    match result {
        Ok(()) => {
            pb.finish_with_message(if verify { "verified" } else { "done" });
            Ok(())
        },
        Err(e) => {
            pb.abandon_with_message("failed");
            if let Error::VerifyMismatch { readback, .. } = &e {
                eprintln!("{}", style("Expected:").bold());
                eprint!("{}", hexdump::dump(data));
                eprintln!("{}", style("Read back:").bold());
                eprint!("{}", hexdump::dump(readback));
                return Err(e.into());
            }
            Err(e).context("EEPROM write failed")
        },
    }
}
