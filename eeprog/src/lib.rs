//! # eeprog
//!
//! A library for reading and writing serial EEPROMs through an Arduino
//! bridge board.
//!
//! The bridge sits on a USB serial port and accepts short command frames:
//!
//! - reset, answered with an ack code
//! - read, answered with the raw EEPROM bytes
//! - write, answered with an ack code once the data is committed
//!
//! Two EEPROM families are supported: microwire (93Cxx, 16-bit registers)
//! and I2C (24Cxx, byte addressed). The bridge speaks either COBS-framed
//! binary commands or ASCII lines, selected with [`Framing`].
//!
//! The crate also ships the odometer codec used by the instrument cluster
//! EEPROMs these tools are typically pointed at.
//!
//! ## Features
//!
//! - `native` (default): serial port support via the `serialport` crate
//! - `serde`: serialization support for configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use eeprog::{DeviceKind, Programmer, SessionConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new("/dev/ttyACM0");
//!     let mut programmer = Programmer::open(&config)?;
//!     programmer.connect()?;
//!
//!     let image = programmer.read(0, 256, DeviceKind::Microwire)?;
//!     programmer.write_verified(0, &image, DeviceKind::Microwire, &mut |done, total| {
//!         println!("{done}/{total}");
//!     })?;
//!
//!     programmer.close()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod chunk;
pub mod device;
pub mod error;
pub mod hexdump;
pub mod link;
pub mod odometer;
pub mod port;
pub mod programmer;
pub mod protocol;
pub mod retry;

#[cfg(test)]
mod mock;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    cancel::CancelFlag,
    chunk::{Chunk, ChunkPlan},
    device::{BridgeKind, DetectedPort, auto_detect_port, detect_ports},
    error::{Error, Result},
    programmer::{LinkState, Programmer, SessionConfig},
    port::{Port, PortEnumerator, PortInfo, SerialConfig},
    protocol::{CobsTransport, Command, DeviceKind, Framing, LineTransport, Transport},
    retry::{RetryPolicy, Sleeper, ThreadSleeper},
};

