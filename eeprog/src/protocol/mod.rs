//! Bridge protocol: commands, frame codecs and transports.

pub mod cobs;
pub mod command;
pub mod line;
pub mod transport;

// Re-export common types
pub use command::{Command, DeviceKind, I2C_DEVICE_ADDRESS, Opcode};
pub use transport::{CobsTransport, Framing, LineTransport, MAX_FRAME_LEN, Transport};
