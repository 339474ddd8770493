//! Link adapter: frame-oriented access to the port.
//!
//! The serial driver hands back whatever bytes arrived before the
//! inter-character timeout, so a frame may be split across reads or share a
//! read with the next one. The link keeps an accumulator and only surfaces
//! complete frames.

use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::MAX_FRAME_LEN;
use log::{debug, trace};
use std::io::ErrorKind;

/// Size of a single port read.
const READ_CHUNK: usize = 64;

/// Exclusive owner of the port between connect and close.
pub struct Link<P: Port> {
    port: P,
    rx: Vec<u8>,
    max_frame_len: usize,
}

impl<P: Port> Link<P> {
    /// Wrap an open port.
    pub fn new(port: P) -> Self {
        Self {
            port,
            rx: Vec::with_capacity(READ_CHUNK),
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    /// Longest response frame accepted, delimiter included.
    pub fn set_max_frame_len(&mut self, max_frame_len: usize) {
        self.max_frame_len = max_frame_len;
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Drop everything received but not yet consumed.
    pub fn discard_input(&mut self) -> Result<()> {
        if !self.rx.is_empty() {
            debug!("Discarding {} stale bytes", self.rx.len());
            self.rx.clear();
        }
        self.port.clear_buffers()
    }

    /// Send a frame. Stale input is discarded first; one request is in flight at a time.
    pub fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.discard_input()?;
        trace!("TX {} bytes: {:02X?}", frame.len(), frame);
        self.port.write_all_bytes(frame)
    }

    /// One read attempt: collect bytes until `delimiter` or until the port times out.
    ///
    /// Returns `Ok(None)` when no complete frame arrived yet. Partial data is kept
    /// for the next attempt. Empty frames (a lone delimiter) are skipped.
    /// More than a frame's worth of bytes without a delimiter is an
    /// [`Error::InvalidFrame`].
    pub fn poll_frame(&mut self, delimiter: u8) -> Result<Option<Vec<u8>>> {
        loop {
            while let Some(pos) = self.rx.iter().position(|&b| b == delimiter) {
                let frame: Vec<u8> = self.rx.drain(..=pos).collect();
                if frame.len() > self.max_frame_len {
                    return Err(self.overflow(frame.len()));
                }
                if frame.len() > 1 {
                    trace!("RX frame {} bytes: {:02X?}", frame.len(), frame);
                    return Ok(Some(frame));
                }
            }
            if self.rx.len() >= self.max_frame_len {
                let len = self.rx.len();
                return Err(self.overflow(len));
            }

            let mut buf = [0u8; READ_CHUNK];
            match self.port.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => self.rx.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) if is_timeout(&e) => return Ok(None),
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Read `len` raw bytes. Stops early when the port goes quiet.
    ///
    /// Fewer bytes than requested is a [`Error::ShortRead`] carrying what did arrive.
    pub fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(len);
        let buffered = self.rx.len().min(len);
        data.extend(self.rx.drain(..buffered));

        let mut buf = [0u8; READ_CHUNK];
        while data.len() < len {
            let want = (len - data.len()).min(READ_CHUNK);
            match self.port.read(&mut buf[..want]) {
                Ok(0) => break,
                Ok(n) => data.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) if is_timeout(&e) => break,
                Err(e) => return Err(Error::Io(e)),
            }
        }

        if data.len() < len {
            return Err(Error::ShortRead {
                expected: len,
                actual: data.len(),
                data,
            });
        }

        trace!("RX {len} raw bytes");
        Ok(data)
    }

    fn overflow(&mut self, len: usize) -> Error {
        self.rx.clear();
        Error::InvalidFrame(format!(
            "{len} bytes received without a frame delimiter (limit {})",
            self.max_frame_len
        ))
    }

    /// Close the port. Safe to call repeatedly.
    pub fn close(&mut self) -> Result<()> {
        self.rx.clear();
        self.port.close()
    }
}

/// Whether an I/O error only means "no data yet".
pub fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPort;

    #[test]
    fn test_poll_frame_reassembles_split_reads() {
        let mut port = MockPort::new();
        port.max_read = 2;
        port.queue_input(&[0x02, 0x80, 0x00, 0x03]);
        let mut link = Link::new(port);

        assert_eq!(link.poll_frame(0x00).unwrap(), Some(vec![0x02, 0x80, 0x00]));
        // Leftover partial frame stays buffered
        assert_eq!(link.poll_frame(0x00).unwrap(), None);
        link.port_mut().queue_input(&[0x82, 0x01, 0x00]);
        assert_eq!(
            link.poll_frame(0x00).unwrap(),
            Some(vec![0x03, 0x82, 0x01, 0x00])
        );
    }

    #[test]
    fn test_poll_frame_skips_empty_frames() {
        let mut port = MockPort::new();
        port.queue_input(&[0x00, 0x00, 0x02, 0x80, 0x00]);
        let mut link = Link::new(port);
        assert_eq!(link.poll_frame(0x00).unwrap(), Some(vec![0x02, 0x80, 0x00]));
    }

    #[test]
    fn test_poll_frame_timeout_is_none() {
        let mut link = Link::new(MockPort::new());
        assert_eq!(link.poll_frame(0x00).unwrap(), None);
    }

    #[test]
    fn test_poll_frame_hard_error() {
        let mut port = MockPort::new();
        port.read_error = Some(ErrorKind::BrokenPipe);
        let mut link = Link::new(port);
        assert!(matches!(link.poll_frame(0x00), Err(Error::Io(_))));
    }

    #[test]
    fn test_read_exact_full() {
        let mut port = MockPort::new();
        port.max_read = 5;
        port.queue_input(&[0xAB; 100]);
        let mut link = Link::new(port);
        assert_eq!(link.read_exact(100).unwrap(), vec![0xAB; 100]);
    }

    #[test]
    fn test_read_exact_short() {
        let mut port = MockPort::new();
        port.queue_input(&[1, 2, 3]);
        let mut link = Link::new(port);
        match link.read_exact(8) {
            Err(Error::ShortRead {
                expected,
                actual,
                data,
            }) => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 3);
                assert_eq!(data, vec![1, 2, 3]);
            },
            other => panic!("expected ShortRead, got {other:?}"),
        }
    }

    #[test]
    fn test_send_discards_stale_input() {
        let mut port = MockPort::new();
        port.queue_input(&[0xEE, 0xEE]);
        let mut link = Link::new(port);
        link.send(&[0x01, 0x01, 0x00]).unwrap();
        assert_eq!(link.port().written, vec![0x01, 0x01, 0x00]);
        assert_eq!(link.poll_frame(0x00).unwrap(), None);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut link = Link::new(MockPort::new());
        link.close().unwrap();
        link.close().unwrap();
        assert!(link.port().closed);
    }

    #[test]
    fn test_poll_frame_rejects_endless_stream() {
        let mut port = MockPort::new();
        port.max_read = 16;
        port.queue_input(&[0x55; 500]);
        let mut link = Link::new(port);

        assert!(matches!(link.poll_frame(0x00), Err(Error::InvalidFrame(_))));
        // Nothing beyond the ceiling was buffered
        assert_eq!(link.port().read_buf.len(), 500 - MAX_FRAME_LEN);
    }

    #[test]
    fn test_poll_frame_accepts_frame_at_ceiling() {
        let mut frame = vec![0x55; MAX_FRAME_LEN - 1];
        frame.push(0x00);
        let mut port = MockPort::new();
        port.queue_input(&frame);
        let mut link = Link::new(port);

        assert_eq!(link.poll_frame(0x00).unwrap(), Some(frame));
    }

    #[test]
    fn test_poll_frame_custom_ceiling() {
        let mut port = MockPort::new();
        port.queue_input(&[0x02, 0x80, 0x03, 0x04, 0x00]);
        let mut link = Link::new(port);
        link.set_max_frame_len(4);

        assert!(matches!(link.poll_frame(0x00), Err(Error::InvalidFrame(_))));
    }
}
