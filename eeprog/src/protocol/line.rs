//! ASCII line codec.
//!
//! One command or response per line, terminated by `\n`. Responses may use
//! `\r\n`. Fields are upper-case hex separated by single spaces:
//!
//! ```text
//! RST
//! MR 0010 0100
//! MW 0010 0004 DEADBEEF
//! IR 50 0000 0020
//! IW 50 0000 0002 AA55
//! ACK 82
//! ```

use crate::error::{Error, Result};
use crate::protocol::command::{Command, DeviceKind};
use std::fmt::Write as _;

/// Line terminator.
pub const DELIMITER: u8 = b'\n';

/// Prefix of acknowledgement lines.
pub const ACK_PREFIX: &str = "ACK ";

/// Terminate `payload` with a newline.
///
/// The payload is a single line of command text and must not contain `\n`.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    debug_assert!(
        !payload.contains(&DELIMITER),
        "line payload must not contain a newline"
    );
    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.extend_from_slice(payload);
    frame.push(DELIMITER);
    frame
}

/// Strip the line terminator (and an optional carriage return).
pub fn decode(frame: &[u8]) -> Result<Vec<u8>> {
    let body = frame.strip_suffix(&[DELIMITER]).unwrap_or(frame);
    let body = body.strip_suffix(b"\r").unwrap_or(body);

    if body.contains(&DELIMITER) {
        return Err(Error::InvalidFrame("line frame contains more than one line".into()));
    }
    Ok(body.to_vec())
}

/// Render a command as a line (without terminator).
pub fn command_text(command: &Command<'_>) -> String {
    let mut text = String::with_capacity(16);

    match command {
        Command::Reset => text.push_str("RST"),
        Command::Read { kind, address, length } => {
            push_prefix(&mut text, *kind, 'R');
            let _ = write!(text, " {address:04X} {length:04X}");
        },
        Command::Write { kind, address, data } => {
            push_prefix(&mut text, *kind, 'W');
            let _ = write!(text, " {address:04X} {:04X}", command.length());
            if !data.is_empty() {
                text.push(' ');
                for b in *data {
                    let _ = write!(text, "{b:02X}");
                }
            }
        },
    }

    text
}

fn push_prefix(text: &mut String, kind: DeviceKind, op: char) {
    match kind {
        DeviceKind::Microwire => text.push('M'),
        DeviceKind::I2c => text.push('I'),
    }
    text.push(op);
    if let Some(bus) = kind.bus_address() {
        let _ = write!(text, " {bus:02X}");
    }
}

/// Parse an `ACK xx` line into its code.
pub fn parse_ack(line: &[u8]) -> Result<u8> {
    let text = std::str::from_utf8(line)
        .map_err(|_| Error::InvalidFrame("ack line is not ASCII".into()))?;
    let code = text
        .trim()
        .strip_prefix(ACK_PREFIX)
        .ok_or_else(|| Error::InvalidFrame(format!("expected ack line, got '{}'", text.trim())))?;
    u8::from_str_radix(code.trim(), 16)
        .map_err(|e| Error::InvalidFrame(format!("bad ack code '{code}': {e}")))
}
