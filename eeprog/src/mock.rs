//! In-memory port and sleeper for unit tests.

use crate::cancel::CancelFlag;
use crate::error::Result;
use crate::port::Port;
use crate::retry::Sleeper;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::time::Duration;

/// Mock serial port with separate read/write sides.
///
/// Each `write` call releases the next scripted response into the read side,
/// which models a bridge answering one request at a time. Reads on an empty
/// read side fail with `TimedOut`, or with `read_error` when set.
pub(crate) struct MockPort {
    pub read_buf: VecDeque<u8>,
    pub written: Vec<u8>,
    pub writes: Vec<Vec<u8>>,
    pub responses: VecDeque<Vec<u8>>,
    pub max_read: usize,
    pub read_error: Option<ErrorKind>,
    pub closed: bool,
    timeout: Duration,
}

impl MockPort {
    pub fn new() -> Self {
        Self {
            read_buf: VecDeque::new(),
            written: Vec::new(),
            writes: Vec::new(),
            responses: VecDeque::new(),
            max_read: usize::MAX,
            read_error: None,
            closed: false,
            timeout: Duration::from_millis(200),
        }
    }

    /// Bytes available immediately.
    pub fn queue_input(&mut self, data: &[u8]) {
        self.read_buf.extend(data.iter().copied());
    }

    /// Bytes released after the next write.
    pub fn respond(&mut self, data: &[u8]) {
        self.responses.push_back(data.to_vec());
    }
}

impl std::io::Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.read_buf.is_empty() {
            let kind = self.read_error.unwrap_or(ErrorKind::TimedOut);
            return Err(std::io::Error::new(kind, "no data"));
        }
        let n = buf.len().min(self.read_buf.len()).min(self.max_read);
        for (slot, b) in buf.iter_mut().zip(self.read_buf.drain(..n)) {
            *slot = b;
        }
        Ok(n)
    }
}

impl std::io::Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.written.extend_from_slice(buf);
        self.writes.push(buf.to_vec());
        if let Some(response) = self.responses.pop_front() {
            self.read_buf.extend(response);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Port for MockPort {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.read_buf.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Records requested sleeps instead of sleeping.
///
/// Optionally trips a cancellation flag once a number of sleeps was recorded,
/// standing in for a Ctrl-C arriving while the caller waits.
#[derive(Debug, Default)]
pub(crate) struct RecordingSleeper {
    pub sleeps: Vec<Duration>,
    cancel_after: Option<(usize, CancelFlag)>,
}

impl RecordingSleeper {
    pub fn cancelling_after(sleeps: usize, cancel: CancelFlag) -> Self {
        Self {
            sleeps: Vec::new(),
            cancel_after: Some((sleeps, cancel)),
        }
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
        if let Some((after, cancel)) = &self.cancel_after {
            if self.sleeps.len() >= *after {
                cancel.cancel();
            }
        }
    }
}
