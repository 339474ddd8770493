//! Bridge board discovery and classification.
//!
//! The bridge firmware runs on an Arduino-class board, which shows up either
//! with the Arduino vendor ID (native USB boards) or behind a common
//! USB-to-UART converter (clones).

use crate::error::{Error, Result};
use crate::port::PortInfo;
use log::info;
#[cfg(feature = "native")]
use log::{debug, trace};

/// Known USB bridge kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BridgeKind {
    /// Genuine Arduino board (Arduino LLC / Arduino SRL).
    Arduino,
    /// CH340/CH341 USB-to-Serial converter (most clones).
    Ch340,
    /// FTDI FT232 family.
    Ftdi,
    /// Silicon Labs CP210x.
    Cp210x,
    /// Anything else.
    Unknown,
}

/// Vendor IDs of boards able to run the bridge firmware.
const KNOWN_VENDORS: &[(u16, BridgeKind)] = &[
    (0x2341, BridgeKind::Arduino),
    (0x2A03, BridgeKind::Arduino),
    (0x1A86, BridgeKind::Ch340),
    (0x0403, BridgeKind::Ftdi),
    (0x10C4, BridgeKind::Cp210x),
];

impl BridgeKind {
    /// Classify a USB vendor ID.
    #[must_use]
    pub fn from_vid(vid: u16) -> Self {
        KNOWN_VENDORS
            .iter()
            .find(|(known, _)| *known == vid)
            .map_or(Self::Unknown, |(_, kind)| *kind)
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Arduino => "Arduino",
            Self::Ch340 => "CH340/CH341",
            Self::Ftdi => "FTDI",
            Self::Cp210x => "CP210x",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether the vendor is recognised.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Serial port with its bridge classification.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DetectedPort {
    /// Port name/path (e.g., "/dev/ttyACM0" or "COM3").
    pub name: String,
    /// Classified bridge kind.
    pub bridge: BridgeKind,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial: Option<String>,
}

impl From<PortInfo> for DetectedPort {
    fn from(info: PortInfo) -> Self {
        let bridge = info.vid.map_or(BridgeKind::Unknown, BridgeKind::from_vid);
        Self {
            name: info.name,
            bridge,
            vid: info.vid,
            pid: info.pid,
            manufacturer: info.manufacturer,
            product: info.product,
            serial: info.serial_number,
        }
    }
}

impl DetectedPort {
    /// Whether this port is likely a bridge board.
    pub fn is_likely_bridge(&self) -> bool {
        self.bridge.is_known()
    }
}

/// Enumerate serial ports and classify them.
#[cfg(feature = "native")]
pub fn detect_ports() -> Vec<DetectedPort> {
    use crate::port::{NativePortEnumerator, PortEnumerator};

    match NativePortEnumerator::list_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(DetectedPort::from)
            .inspect(|p| {
                trace!("Found port: {} ({}, VID: {:04X?})", p.name, p.bridge.name(), p.vid);
            })
            .collect(),
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
            Vec::new()
        },
    }
}

/// Enumerate serial ports (no native serial support: always empty).
#[cfg(not(feature = "native"))]
pub fn detect_ports() -> Vec<DetectedPort> {
    Vec::new()
}

/// Pick a port automatically.
pub fn auto_detect_port() -> Result<DetectedPort> {
    select_port(detect_ports())
}

/// Pick the best candidate: a genuine Arduino, then any known converter,
/// then the first port at all.
pub fn select_port(ports: Vec<DetectedPort>) -> Result<DetectedPort> {
    if let Some(port) = ports.iter().find(|p| p.bridge == BridgeKind::Arduino) {
        info!("Auto-detected Arduino bridge: {}", port.name);
        return Ok(port.clone());
    }

    if let Some(port) = ports.iter().find(|p| p.is_likely_bridge()) {
        info!("Auto-detected {} bridge: {}", port.bridge.name(), port.name);
        return Ok(port.clone());
    }

    if let Some(port) = ports.into_iter().next() {
        info!("Using first available port: {}", port.name);
        return Ok(port);
    }

    Err(Error::DeviceNotFound)
}

/// Format ports for display, one line each.
pub fn format_port_list(ports: &[DetectedPort]) -> Vec<String> {
    ports
        .iter()
        .map(|port| {
            let bridge = if port.is_likely_bridge() {
                format!(" [{}]", port.bridge.name())
            } else if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
                format!(" [VID:{vid:04X} PID:{pid:04X}]")
            } else {
                String::new()
            };
            let product = port
                .product
                .as_ref()
                .map(|p| format!(" - {p}"))
                .unwrap_or_default();
            format!("{}{bridge}{product}", port.name)
        })
        .collect()
}
