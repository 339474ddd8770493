//! Error types for eeprog.

use crate::hexdump;
use crate::programmer::LinkState;
use std::io;
use thiserror::Error;

/// Result type for eeprog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for eeprog operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Hard I/O error on the link. Never retried.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The serial port could not be opened.
    #[cfg(feature = "native")]
    #[error("Unable to open serial port {port}: {source}")]
    LinkOpenFailed {
        /// Port name/path.
        port: String,
        /// Underlying serial port error.
        source: serialport::Error,
    },

    /// The bridge never answered the reset request.
    #[error("Bridge did not answer the reset request after {attempts} attempts")]
    ConnectTimeout {
        /// Number of attempts made.
        attempts: u32,
    },

    /// The bridge never acknowledged a write request.
    #[error("Timed out waiting for ack {expected} after {attempts} attempts")]
    AckTimeout {
        /// Ack code that was expected.
        expected: u8,
        /// Number of attempts made.
        attempts: u32,
    },

    /// A frame arrived but carried the wrong ack code.
    #[error("Bridge acknowledged with unexpected code: expected {expected}, got {actual}")]
    UnexpectedAck {
        /// Ack code that was expected.
        expected: u8,
        /// Ack code that was received.
        actual: u8,
    },

    /// Fewer bytes arrived than were requested.
    #[error(
        "Did not receive all bytes from EEPROM read: expected {expected} bytes, got {actual}\n\n{}",
        hexdump::dump(.data)
    )]
    ShortRead {
        /// Requested byte count.
        expected: usize,
        /// Received byte count.
        actual: usize,
        /// Bytes received before the link went quiet.
        data: Vec<u8>,
    },

    /// The encoded frame would overflow the bridge's receive buffer.
    #[error("Encoded frame is {size} bytes, exceeding the {limit}-byte packet limit")]
    FrameTooLarge {
        /// Encoded frame size.
        size: usize,
        /// Packet ceiling.
        limit: usize,
    },

    /// Read-back content differs from what was written.
    #[error("Verification failed at offset {offset:#06x}: expected {expected:#04x?}, got {actual:#04x?}")]
    VerifyMismatch {
        /// First differing byte offset.
        offset: usize,
        /// Expected byte (`None` past the end of the source).
        expected: Option<u8>,
        /// Actual byte (`None` past the end of the read-back).
        actual: Option<u8>,
        /// Full read-back content.
        readback: Vec<u8>,
    },

    /// A received frame could not be decoded.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Operation requires a connected programmer.
    #[error("Programmer is not ready (state: {0})")]
    NotReady(LinkState),

    /// An EEPROM address does not fit the 16-bit address field.
    #[error("Address {address:#x} does not fit in 16 bits")]
    AddressOutOfRange {
        /// Offending address.
        address: u32,
    },

    /// A transfer length does not fit the 16-bit length field.
    #[error("Length {length} does not fit in 16 bits")]
    LengthOutOfRange {
        /// Offending length.
        length: usize,
    },

    /// Mileage cannot be represented by the odometer encoding.
    #[error("Mileage {mileage} is out of range (max {max})")]
    MileageOutOfRange {
        /// Requested mileage.
        mileage: u32,
        /// Largest encodable mileage.
        max: u32,
    },

    /// Odometer buffer has the wrong size.
    #[error("Odometer buffer must be 32 bytes, got {len}")]
    InvalidOdometerBuffer {
        /// Actual buffer length.
        len: usize,
    },

    /// No usable serial port was found.
    #[error("No serial port found")]
    DeviceNotFound,

    /// The embedding application requested cancellation.
    #[error("Operation interrupted")]
    Interrupted,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
