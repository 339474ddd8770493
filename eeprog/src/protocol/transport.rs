//! Transport abstraction: command layout plus frame codec.
//!
//! Two bridge firmwares exist. The binary one frames commands with COBS, the
//! older one speaks ASCII lines. Both share the same link handling, retry
//! loop and chunking; only the bytes on the wire differ.

use crate::error::{Error, Result};
use crate::protocol::command::{Command, DeviceKind};
use crate::protocol::{cobs, line};
use std::fmt;
use std::str::FromStr;

/// Largest frame the bridge can buffer.
pub const MAX_FRAME_LEN: usize = 64;

/// Wire encoding of bridge commands.
pub trait Transport {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Byte terminating every frame.
    fn delimiter(&self) -> u8;

    /// Unframed representation of a command.
    fn encode_command(&self, command: &Command<'_>) -> Vec<u8>;

    /// Wrap a payload into a delimited frame.
    fn encode_frame(&self, payload: &[u8]) -> Vec<u8>;

    /// Recover the payload from a frame (delimiter optional).
    fn decode_frame(&self, frame: &[u8]) -> Result<Vec<u8>>;

    /// Extract the ack code from a decoded response payload.
    fn parse_ack(&self, payload: &[u8]) -> Result<u8>;

    /// Largest write payload whose frame fits in [`MAX_FRAME_LEN`].
    ///
    /// Always a multiple of the device's register width.
    fn max_payload(&self, kind: DeviceKind) -> usize;

    /// Encode a command straight to a frame.
    fn frame_command(&self, command: &Command<'_>) -> Vec<u8> {
        self.encode_frame(&self.encode_command(command))
    }
}

/// Binary commands framed with COBS.
#[derive(Debug, Clone, Copy, Default)]
pub struct CobsTransport;

impl Transport for CobsTransport {
    fn name(&self) -> &'static str {
        "cobs"
    }

    fn delimiter(&self) -> u8 {
        cobs::DELIMITER
    }

    fn encode_command(&self, command: &Command<'_>) -> Vec<u8> {
        command.to_bytes()
    }

    fn encode_frame(&self, payload: &[u8]) -> Vec<u8> {
        cobs::encode(payload)
    }

    fn decode_frame(&self, frame: &[u8]) -> Result<Vec<u8>> {
        cobs::decode(frame)
    }

    fn parse_ack(&self, payload: &[u8]) -> Result<u8> {
        payload
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidFrame("empty ack frame".into()))
    }

    fn max_payload(&self, kind: DeviceKind) -> usize {
        match kind {
            DeviceKind::Microwire => 56,
            DeviceKind::I2c => 55,
        }
    }
}

/// ASCII commands, one per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineTransport;

impl Transport for LineTransport {
    fn name(&self) -> &'static str {
        "line"
    }

    fn delimiter(&self) -> u8 {
        line::DELIMITER
    }

    fn encode_command(&self, command: &Command<'_>) -> Vec<u8> {
        line::command_text(command).into_bytes()
    }

    fn encode_frame(&self, payload: &[u8]) -> Vec<u8> {
        line::encode(payload)
    }

    fn decode_frame(&self, frame: &[u8]) -> Result<Vec<u8>> {
        line::decode(frame)
    }

    fn parse_ack(&self, payload: &[u8]) -> Result<u8> {
        line::parse_ack(payload)
    }

    fn max_payload(&self, kind: DeviceKind) -> usize {
        match kind {
            DeviceKind::Microwire => 24,
            DeviceKind::I2c => 23,
        }
    }
}

/// Transport selected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Framing {
    /// COBS-framed binary commands.
    #[default]
    Cobs,
    /// ASCII line commands.
    Line,
}

impl Framing {
    fn inner(self) -> &'static dyn Transport {
        match self {
            Self::Cobs => &CobsTransport,
            Self::Line => &LineTransport,
        }
    }
}

impl Transport for Framing {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn delimiter(&self) -> u8 {
        self.inner().delimiter()
    }

    fn encode_command(&self, command: &Command<'_>) -> Vec<u8> {
        self.inner().encode_command(command)
    }

    fn encode_frame(&self, payload: &[u8]) -> Vec<u8> {
        self.inner().encode_frame(payload)
    }

    fn decode_frame(&self, frame: &[u8]) -> Result<Vec<u8>> {
        self.inner().decode_frame(frame)
    }

    fn parse_ack(&self, payload: &[u8]) -> Result<u8> {
        self.inner().parse_ack(payload)
    }

    fn max_payload(&self, kind: DeviceKind) -> usize {
        self.inner().max_payload(kind)
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Framing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cobs" | "framed" => Ok(Self::Cobs),
            "line" | "ascii" => Ok(Self::Line),
            other => Err(Error::Config(format!(
                "unknown framing '{other}', expected one of: cobs, line"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [DeviceKind; 2] = [DeviceKind::Microwire, DeviceKind::I2c];

    #[test]
    fn test_max_payload_fits_frame_ceiling() {
        for framing in [Framing::Cobs, Framing::Line] {
            for kind in KINDS {
                let max = framing.max_payload(kind);
                assert_eq!(max % kind.register_width(), 0, "{framing} {kind}");

                let data = vec![0xA5; max];
                let cmd = Command::write(kind, 0xFFFF, &data).unwrap();
                let frame = framing.frame_command(&cmd);
                assert!(frame.len() <= MAX_FRAME_LEN, "{framing} {kind}: {}", frame.len());
            }
        }
    }

    #[test]
    fn test_cobs_max_payload_is_tight_for_microwire() {
        let data = vec![0xA5; 58];
        let cmd = Command::write(DeviceKind::Microwire, 0, &data).unwrap();
        assert!(CobsTransport.frame_command(&cmd).len() > MAX_FRAME_LEN);
    }

    #[test]
    fn test_cobs_reset_frame() {
        assert_eq!(CobsTransport.frame_command(&Command::Reset), vec![0x01, 0x01, 0x00]);
    }

    #[test]
    fn test_line_reset_frame() {
        assert_eq!(LineTransport.frame_command(&Command::Reset), b"RST\n");
    }

    #[test]
    fn test_parse_ack_per_transport() {
        let cobs_payload = CobsTransport.decode_frame(&[0x02, 0x82, 0x00]).unwrap();
        assert_eq!(CobsTransport.parse_ack(&cobs_payload).unwrap(), 130);
        assert!(CobsTransport.parse_ack(&[]).is_err());

        let line_payload = LineTransport.decode_frame(b"ACK 84\n").unwrap();
        assert_eq!(LineTransport.parse_ack(&line_payload).unwrap(), 132);
    }

    #[test]
    fn test_framing_delegates() {
        assert_eq!(Framing::Cobs.delimiter(), 0x00);
        assert_eq!(Framing::Line.delimiter(), b'\n');
        assert_eq!(Framing::default(), Framing::Cobs);
        assert_eq!("line".parse::<Framing>().unwrap(), Framing::Line);
        assert_eq!("framed".parse::<Framing>().unwrap(), Framing::Cobs);
        assert!("slip".parse::<Framing>().is_err());
    }
}
