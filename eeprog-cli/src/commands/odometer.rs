//! Odometer encode/decode commands.

use anyhow::{Context, Result};
use console::style;
use eeprog::odometer;
use std::fs;
use std::path::Path;

use crate::Cli;

/// Bytes per printed row.
const ROW_LEN: usize = 16;

/// Encode command implementation.
pub(crate) fn cmd_encode(cli: &Cli, mileage: u32, output_file: Option<&Path>) -> Result<()> {
    let block = odometer::encode(mileage)?;

    if !cli.quiet {
        eprintln!("{} Encoding value: {mileage}", style("ℹ").blue());
    }
    for row in format_rows(&block) {
        println!("{row}");
    }

    if let Some(path) = output_file {
        fs::write(path, block).with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.quiet {
            eprintln!(
                "{} Saved {} bytes to {}",
                style("✓").green(),
                block.len(),
                path.display()
            );
        }
    }

    Ok(())
}

/// Decode command implementation.
pub(crate) fn cmd_decode(cli: &Cli, file: &Path) -> Result<()> {
    let data = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let mileage = odometer::decode_slice(&data)
        .with_context(|| format!("{} is not an odometer block", file.display()))?;

    if !cli.quiet {
        for row in format_rows(&data) {
            eprintln!("  {}", style(row).dim());
        }
    }
    println!("{mileage}");
    Ok(())
}

/// Format bytes as rows of `0x..` tokens.
fn format_rows(data: &[u8]) -> Vec<String> {
    data.chunks(ROW_LEN)
        .map(|row| {
            row.iter()
                .map(|b| format!("0x{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}
