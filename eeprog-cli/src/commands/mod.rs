//! Command implementations.
//!
//! Each subcommand is implemented in its own module for clean separation.

pub(crate) mod completions;
pub(crate) mod eeprom;
pub(crate) mod odometer;
pub(crate) mod ports;
