//! EEPROM programmer session.
//!
//! A [`Programmer`] owns the link to the bridge board from connect to close
//! and runs one request at a time through it.
//!
//! ```text
//!                 connect()            ack 128
//! Disconnected ------------> Connecting --------> Ready
//!       ^                         |                 |
//!       |                         | timeout /       | link failure
//!       |                         v wrong ack       v
//!       +------ close() ------ Faulted <------------+
//! ```
//!
//! Validation errors raised before anything is sent (oversized frame, address
//! or length overflow, not connected) leave the state unchanged. Failures on
//! the link itself move the session to [`LinkState::Faulted`]; the caller has
//! to connect again.

use crate::cancel::CancelFlag;
use crate::chunk::{self, ChunkPlan};
use crate::error::{Error, Result};
use crate::link::Link;
use crate::port::{Port, SerialConfig};
use crate::protocol::{Command, DeviceKind, Framing, MAX_FRAME_LEN, Transport};
use crate::retry::{Exchange, Resend, Retry, RetryPolicy, Sleeper, ThreadSleeper};
use log::{debug, info};
use std::fmt;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No session; connect has not been called or the link was closed.
    Disconnected,
    /// Reset sent, waiting for the bridge.
    Connecting,
    /// Bridge answered; reads and writes are allowed.
    Ready,
    /// The last exchange failed; connect again.
    Faulted,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Ready => write!(f, "ready"),
            Self::Faulted => write!(f, "faulted"),
        }
    }
}

/// Everything needed to open a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Serial line settings.
    pub serial: SerialConfig,
    /// Wire encoding the bridge firmware speaks.
    pub framing: Framing,
    /// Retry budget for acknowledged exchanges.
    pub retry: RetryPolicy,
    /// Largest frame the bridge accepts.
    pub max_frame_len: usize,
    /// Checked between retry attempts and between write chunks.
    pub cancel: CancelFlag,
}

impl SessionConfig {
    /// Defaults for the given port.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            serial: SerialConfig::new(port_name),
            framing: Framing::default(),
            retry: RetryPolicy::default(),
            max_frame_len: MAX_FRAME_LEN,
            cancel: CancelFlag::new(),
        }
    }

    /// Set the framing.
    #[must_use]
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Share a cancellation flag with the session.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Programmer session over a port.
///
/// Generic over the port, the wire transport and the retry sleeper so tests
/// can run against an in-memory port without real delays.
pub struct Programmer<P: Port, T: Transport = Framing, S: Sleeper = ThreadSleeper> {
    link: Link<P>,
    transport: T,
    retry: Retry<S>,
    state: LinkState,
    max_frame_len: usize,
}

impl<P: Port, T: Transport> Programmer<P, T, ThreadSleeper> {
    /// Create a disconnected session over an open port.
    pub fn new(port: P, transport: T) -> Self {
        Self {
            link: Link::new(port),
            transport,
            retry: Retry::new(RetryPolicy::default()),
            state: LinkState::Disconnected,
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

impl<P: Port, T: Transport, S: Sleeper> Programmer<P, T, S> {
    /// Replace the sleeper used between retry attempts.
    #[must_use]
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> Programmer<P, T, S2> {
        Programmer {
            link: self.link,
            transport: self.transport,
            retry: self.retry.replace_sleeper(sleeper),
            state: self.state,
            max_frame_len: self.max_frame_len,
        }
    }

    /// Set the retry budget.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry.set_policy(policy);
        self
    }

    /// Set the frame ceiling for both requests and responses.
    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self.link.set_max_frame_len(max_frame_len);
        self
    }

    /// Share a cancellation flag, e.g. one tripped by a Ctrl-C handler.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.retry.set_cancel_flag(cancel);
        self
    }

    /// Cancellation flag of this session.
    pub fn cancel_flag(&self) -> &CancelFlag {
        self.retry.cancel_flag()
    }

    /// Current state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Wire transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Retry controller.
    pub fn retry(&self) -> &Retry<S> {
        &self.retry
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        self.link.port()
    }

    /// Largest write payload the transport fits in one frame.
    pub fn max_payload(&self, kind: DeviceKind) -> usize {
        self.transport.max_payload(kind)
    }

    /// Reset the bridge and wait for it to answer.
    ///
    /// The reset frame is resent on every attempt; the bridge may still be
    /// booting after the port was opened.
    pub fn connect(&mut self) -> Result<()> {
        self.state = LinkState::Connecting;
        info!(
            "Connecting to bridge on {} ({} framing)...",
            self.link.port().name(),
            self.transport.name()
        );

        let command = Command::Reset;
        let frame = self.transport.frame_command(&command);
        let result = self.await_ack(&command, &frame, Resend::EveryAttempt, |_, attempts| {
            Error::ConnectTimeout { attempts }
        });

        match result {
            Ok(()) => {
                self.state = LinkState::Ready;
                info!("Bridge ready");
                Ok(())
            },
            Err(e) => {
                self.state = LinkState::Faulted;
                Err(e)
            },
        }
    }

    /// Read `length` bytes starting at `address`.
    ///
    /// The bridge streams the raw bytes back without framing.
    pub fn read(&mut self, address: u16, length: usize, kind: DeviceKind) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        let command = Command::read(kind, address, length)?;
        let frame = self.checked_frame(&command)?;

        debug!("Reading {length} bytes at {address:#06x} ({kind})");
        let result = self.link.send(&frame).and_then(|()| {
            if self.cancel_flag().is_cancelled() {
                return Err(Error::Interrupted);
            }
            self.link.read_exact(length)
        });
        self.track(result)
    }

    /// Write `data` starting at `address` and wait for the ack.
    ///
    /// A frame over the ceiling is rejected before anything is sent.
    pub fn write(&mut self, address: u16, data: &[u8], kind: DeviceKind) -> Result<()> {
        self.ensure_ready()?;
        let command = Command::write(kind, address, data)?;
        let frame = self.checked_frame(&command)?;

        debug!("Writing {} bytes at {address:#06x} ({kind})", data.len());
        let result = self.await_ack(&command, &frame, Resend::Once, |expected, attempts| {
            Error::AckTimeout { expected, attempts }
        });
        self.track(result)
    }

    /// Write a whole buffer in bridge-sized chunks starting at register `base`.
    ///
    /// `progress` receives `(bytes_written, total)` after every chunk.
    pub fn write_image(
        &mut self,
        base: u16,
        data: &[u8],
        kind: DeviceKind,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        self.ensure_ready()?;
        let plan = ChunkPlan::new(base, data, kind, self.transport.max_payload(kind))?;
        info!(
            "Writing {} bytes to {kind} EEPROM at {base:#06x} in {} packets of up to {} bytes",
            plan.total_bytes(),
            plan.len(),
            plan.max_payload()
        );

        let total = plan.total_bytes();
        let mut done = 0;
        for chunk in plan.iter() {
            if self.cancel_flag().is_cancelled() {
                return Err(Error::Interrupted);
            }
            self.write(chunk.address, chunk.data, kind)?;
            done += chunk.data.len();
            progress(done, total);
        }

        Ok(())
    }

    /// Write a buffer, read the full span back and compare.
    ///
    /// A mismatch is reported as [`Error::VerifyMismatch`] carrying the
    /// read-back content.
    pub fn write_verified(
        &mut self,
        base: u16,
        data: &[u8],
        kind: DeviceKind,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        self.write_image(base, data, kind, progress)?;
        info!("Verifying {} bytes...", data.len());
        let readback = self.read(base, data.len(), kind)?;
        chunk::verify(data, &readback)?;
        info!("Verification passed");
        Ok(())
    }

    /// Release the link. Valid in any state; calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state != LinkState::Disconnected {
            debug!("Closing link ({})", self.state);
        }
        self.state = LinkState::Disconnected;
        self.link.close()
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            LinkState::Ready => Ok(()),
            state => Err(Error::NotReady(state)),
        }
    }

    fn checked_frame(&self, command: &Command<'_>) -> Result<Vec<u8>> {
        let frame = self.transport.frame_command(command);
        if frame.len() > self.max_frame_len {
            return Err(Error::FrameTooLarge {
                size: frame.len(),
                limit: self.max_frame_len,
            });
        }
        Ok(frame)
    }

    fn await_ack(
        &mut self,
        command: &Command<'_>,
        frame: &[u8],
        resend: Resend,
        timeout: impl FnOnce(u8, u32) -> Error,
    ) -> Result<()> {
        let expected = command.expected_ack().ok_or_else(|| {
            Error::InvalidFrame(format!("{:?} is not acknowledged by the bridge", command.opcode()))
        })?;

        let delimiter = self.transport.delimiter();
        let response = match self.retry.exchange(&mut self.link, frame, resend, delimiter)? {
            Exchange::Response(response) => response,
            Exchange::Exhausted { attempts } => return Err(timeout(expected, attempts)),
        };

        let payload = self.transport.decode_frame(&response)?;
        let actual = self.transport.parse_ack(&payload)?;
        if actual != expected {
            return Err(Error::UnexpectedAck { expected, actual });
        }
        debug!("Ack {actual}");
        Ok(())
    }

    fn track<R>(&mut self, result: Result<R>) -> Result<R> {
        if result.is_err() {
            self.state = LinkState::Faulted;
        }
        result
    }
}

#[cfg(feature = "native")]
mod native_impl {
    use super::{Programmer, SessionConfig};
    use crate::error::Result;
    use crate::port::NativePort;
    use crate::protocol::Framing;
    use crate::retry::ThreadSleeper;

    impl Programmer<NativePort, Framing, ThreadSleeper> {
        /// Open the configured serial port and create a disconnected session.
        pub fn open(config: &SessionConfig) -> Result<Self> {
            let port = NativePort::open(&config.serial)?;
            Ok(Self::new(port, config.framing)
                .with_retry_policy(config.retry)
                .with_max_frame_len(config.max_frame_len)
                .with_cancel_flag(config.cancel.clone()))
        }
    }
}
