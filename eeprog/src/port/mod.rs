//! Port abstraction for the serial link to the bridge board.
//!
//! The protocol layer only needs a byte-oriented duplex stream with a
//! settable inter-character read timeout. Everything else about the port
//! (line settings, device path) is fixed when it is opened.
//!
//! ```text
//! +------------------+
//! |    Programmer    |   connect / read / write
//! +--------+---------+
//!          |
//! +--------+---------+
//! |  Link + Retry    |   frames, acks, bounded polling
//! +--------+---------+
//!          |
//! +--------+---------+
//! |    Port trait    |   bytes
//! +--------+---------+
//!          |
//! +--------+---------+
//! | NativePort       |
//! |  (serialport)    |
//! +------------------+
//! ```
//!
//! Reads that time out without data must surface as
//! [`std::io::ErrorKind::TimedOut`]; that is the only error the retry loop
//! treats as transient.

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Baud rate the bridge firmware listens on.
pub const DEFAULT_BAUD: u32 = 9600;

/// Inter-character read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);

/// Bits on the wire per byte (start + 8 data + stop).
const BITS_PER_BYTE: u64 = 10;

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyACM0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Inter-character read timeout.
    pub timeout: Duration,
    /// Data bits.
    pub data_bits: DataBits,
    /// Parity.
    pub parity: Parity,
    /// Stop bits.
    pub stop_bits: StopBits,
    /// Flow control.
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD,
            timeout: DEFAULT_TIMEOUT,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialConfig {
    /// Create a configuration for the given port with bridge defaults (9600 8N1).
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Time needed to clock `bytes` bytes over the wire at the configured baud.
    pub fn wire_time(&self, bytes: usize) -> Duration {
        let bits = bytes as u64 * BITS_PER_BYTE;
        let micros = (bits * 1_000_000 + u64::from(self.baud_rate) / 2) / u64::from(self.baud_rate.max(1));
        Duration::from_micros(micros)
    }
}

/// Number of data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBits {
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    /// No parity.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// Hardware flow control (RTS/CTS).
    Hardware,
}

/// Serial port information.
#[derive(Debug, Clone, Default)]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial_number: Option<String>,
}

/// Byte stream to the bridge board.
pub trait Port: Read + Write + Send {
    /// Set the inter-character read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Get the current timeout.
    fn timeout(&self) -> Duration;

    /// Discard anything buffered in either direction.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Close the port and release resources. Calling it twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

/// Trait for listing available serial ports.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;
}

#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator};
