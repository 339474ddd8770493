//! Bridge commands, opcodes and acknowledgement codes.
//!
//! ## Binary Layout
//!
//! Multi-byte fields are big-endian (MSB first).
//!
//! ```text
//! +----------------+--------+--------+----------+----------+---------+-----+
//! | Command        | Opcode | Device | Address  | Length   | Data    | Ack |
//! +----------------+--------+--------+----------+----------+---------+-----+
//! | Reset          | 0x00   |   -    |    -     |    -     |    -    | 128 |
//! | Read (uWire)   | 0x01   |   -    | 2 bytes  | 2 bytes  |    -    |  -  |
//! | Write (uWire)  | 0x02   |   -    | 2 bytes  | 2 bytes  | payload | 130 |
//! | Read (I2C)     | 0x03   | 0x50   | 2 bytes  | 2 bytes  |    -    |  -  |
//! | Write (I2C)    | 0x04   | 0x50   | 2 bytes  | 2 bytes  | payload | 132 |
//! +----------------+--------+--------+----------+----------+---------+-----+
//! ```
//!
//! Reads are not acknowledged; the bridge streams the raw EEPROM bytes.

use crate::error::{Error, Result};
use byteorder::{BigEndian, WriteBytesExt};
use std::fmt;
use std::str::FromStr;

/// 7-bit bus address of the I2C EEPROM.
pub const I2C_DEVICE_ADDRESS: u8 = 0x50;

/// Command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Reset the bridge (0x00).
    Reset = 0x00,
    /// Read from a microwire EEPROM (0x01).
    MicrowireRead = 0x01,
    /// Write to a microwire EEPROM (0x02).
    MicrowireWrite = 0x02,
    /// Read from an I2C EEPROM (0x03).
    I2cRead = 0x03,
    /// Write to an I2C EEPROM (0x04).
    I2cWrite = 0x04,
}

impl Opcode {
    /// Ack code the bridge answers with, if the command is acknowledged.
    ///
    /// The bridge echoes the opcode with the high bit set.
    pub fn ack_code(self) -> Option<u8> {
        match self {
            Self::Reset | Self::MicrowireWrite | Self::I2cWrite => Some(self as u8 | 0x80),
            Self::MicrowireRead | Self::I2cRead => None,
        }
    }
}

/// Kind of EEPROM attached to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DeviceKind {
    /// Three-wire microwire EEPROM (93Cxx/93Lxx), 16-bit registers.
    #[default]
    Microwire,
    /// Two-wire I2C EEPROM (24Cxx), byte addressed.
    I2c,
}

impl DeviceKind {
    /// Bytes per addressable register.
    ///
    /// Microwire parts are addressed in 16-bit registers, so one address step
    /// covers two bytes of the host buffer.
    pub fn register_width(self) -> usize {
        match self {
            Self::Microwire => 2,
            Self::I2c => 1,
        }
    }

    /// Opcode used for reads.
    pub fn read_opcode(self) -> Opcode {
        match self {
            Self::Microwire => Opcode::MicrowireRead,
            Self::I2c => Opcode::I2cRead,
        }
    }

    /// Opcode used for writes.
    pub fn write_opcode(self) -> Opcode {
        match self {
            Self::Microwire => Opcode::MicrowireWrite,
            Self::I2c => Opcode::I2cWrite,
        }
    }

    /// Bus address byte carried by the command, if any.
    pub fn bus_address(self) -> Option<u8> {
        match self {
            Self::Microwire => None,
            Self::I2c => Some(I2C_DEVICE_ADDRESS),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Microwire => write!(f, "microwire"),
            Self::I2c => write!(f, "i2c"),
        }
    }
}

impl FromStr for DeviceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "microwire" | "uwire" => Ok(Self::Microwire),
            "i2c" => Ok(Self::I2c),
            other => Err(Error::Config(format!(
                "unknown EEPROM type '{other}', expected one of: microwire, i2c"
            ))),
        }
    }
}

/// A single request to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Reset the bridge and wait for it to come up.
    Reset,
    /// Read `length` bytes starting at `address`.
    Read {
        /// Device kind.
        kind: DeviceKind,
        /// Start address (registers for microwire, bytes for I2C).
        address: u16,
        /// Number of bytes to read.
        length: u16,
    },
    /// Write `data` starting at `address`.
    Write {
        /// Device kind.
        kind: DeviceKind,
        /// Start address (registers for microwire, bytes for I2C).
        address: u16,
        /// Bytes to write.
        data: &'a [u8],
    },
}

impl<'a> Command<'a> {
    /// Build a read command, validating the length field.
    pub fn read(kind: DeviceKind, address: u16, length: usize) -> Result<Self> {
        Ok(Self::Read {
            kind,
            address,
            length: field_u16(length)?,
        })
    }

    /// Build a write command, validating the length field.
    pub fn write(kind: DeviceKind, address: u16, data: &'a [u8]) -> Result<Self> {
        field_u16(data.len())?;
        Ok(Self::Write {
            kind,
            address,
            data,
        })
    }

    /// Opcode of this command.
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Reset => Opcode::Reset,
            Self::Read { kind, .. } => kind.read_opcode(),
            Self::Write { kind, .. } => kind.write_opcode(),
        }
    }

    /// Ack code the bridge must answer with, if acknowledged.
    pub fn expected_ack(&self) -> Option<u8> {
        self.opcode().ack_code()
    }

    /// Length field carried on the wire.
    pub fn length(&self) -> u16 {
        match self {
            Self::Reset => 0,
            Self::Read { length, .. } => *length,
            // Validated by the constructor; a hand-built oversize write is truncated.
            Self::Write { data, .. } => data.len() as u16,
        }
    }

    /// Encode the binary layout (unframed).
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(6);
        buf.push(self.opcode() as u8);

        match self {
            Self::Reset => {},
            Self::Read { kind, address, .. } | Self::Write { kind, address, .. } => {
                if let Some(bus) = kind.bus_address() {
                    buf.push(bus);
                }
                buf.write_u16::<BigEndian>(*address).unwrap();
                buf.write_u16::<BigEndian>(self.length()).unwrap();
            },
        }

        if let Self::Write { data, .. } = self {
            buf.extend_from_slice(data);
        }

        buf
    }
}

/// Check that a value fits a 16-bit length field.
pub fn field_u16(length: usize) -> Result<u16> {
    u16::try_from(length).map_err(|_| Error::LengthOutOfRange { length })
}

/// Check that an address fits the 16-bit address field.
pub fn address_u16(address: u32) -> Result<u16> {
    u16::try_from(address).map_err(|_| Error::AddressOutOfRange { address })
}
