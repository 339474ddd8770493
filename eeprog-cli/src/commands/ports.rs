//! Serial port listing.

use anyhow::{Context, Result};
use console::style;
use eeprog::DetectedPort;

/// List ports command implementation.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let detected = eeprog::detect_ports();

    if json {
        println!("{}", ports_json(&detected)?);
        return Ok(());
    }

    eprintln!("{}", style("Available serial ports").bold().underlined());

    if detected.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for line in eeprog::device::format_port_list(&detected) {
        eprintln!("  {} {line}", style("•").green());
    }

    if let Ok(auto_port) = eeprog::device::select_port(detected) {
        eprintln!();
        eprintln!(
            "{} Auto-detect would use {}",
            style("→").cyan(),
            style(&auto_port.name).bold()
        );
    }

    Ok(())
}

fn ports_json(ports: &[DetectedPort]) -> Result<String> {
    serde_json::to_string_pretty(ports).context("Failed to serialize port list")
}
