//! Bounded request/response polling.
//!
//! After a reset the bridge needs a moment to boot, and a write takes a while
//! to commit to the EEPROM. Until then reads simply time out. The retry loop
//! polls for a response frame a fixed number of times with a fixed delay in
//! between. Only "no data yet" is retried; any other I/O error aborts.
//! The controller's [`CancelFlag`] is checked before every attempt.

use crate::cancel::CancelFlag;
use crate::error::{Error, Result};
use crate::link::Link;
use crate::port::Port;
use log::{debug, trace, warn};
use std::thread;
use std::time::Duration;

/// Default number of read attempts per exchange.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 50;

/// Default delay between read attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Retry budget for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetryPolicy {
    /// Read attempts before giving up (at least one is always made).
    pub max_attempts: u32,
    /// Pause after an attempt that saw no complete frame.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Source of the inter-attempt pause.
pub trait Sleeper {
    /// Block for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// When the request frame is (re)sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resend {
    /// Send once, then only poll.
    Once,
    /// Send before every read attempt.
    EveryAttempt,
}

/// Result of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    /// A complete response frame (still encoded, delimiter included).
    Response(Vec<u8>),
    /// Every attempt timed out.
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
}

/// Retry controller.
#[derive(Debug, Clone, Default)]
pub struct Retry<S: Sleeper = ThreadSleeper> {
    policy: RetryPolicy,
    sleeper: S,
    cancel: CancelFlag,
}

impl Retry<ThreadSleeper> {
    /// Create a controller that sleeps the current thread.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, ThreadSleeper)
    }
}

impl<S: Sleeper> Retry<S> {
    /// Create a controller with a custom sleeper.
    pub fn with_sleeper(policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            policy,
            sleeper,
            cancel: CancelFlag::new(),
        }
    }

    /// Current policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Replace the policy.
    pub fn set_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    /// Cancellation flag checked before every attempt.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Replace the cancellation flag.
    pub fn set_cancel_flag(&mut self, cancel: CancelFlag) {
        self.cancel = cancel;
    }

    /// Get a reference to the sleeper.
    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Replace the sleeper, keeping the policy.
    pub fn replace_sleeper<S2: Sleeper>(self, sleeper: S2) -> Retry<S2> {
        Retry {
            policy: self.policy,
            sleeper,
            cancel: self.cancel,
        }
    }

    /// Send `frame` and wait for a response frame terminated by `delimiter`.
    pub fn exchange<P: Port>(
        &mut self,
        link: &mut Link<P>,
        frame: &[u8],
        resend: Resend,
        delimiter: u8,
    ) -> Result<Exchange> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }

            if attempt == 1 || resend == Resend::EveryAttempt {
                link.send(frame)?;
            }

            if let Some(response) = link.poll_frame(delimiter)? {
                if attempt > 1 {
                    debug!("Response after {attempt} attempts");
                }
                return Ok(Exchange::Response(response));
            }

            trace!("No response yet (attempt {attempt}/{max_attempts})");
            if attempt % 10 == 0 && attempt < max_attempts {
                warn!("Still waiting for the bridge ({attempt}/{max_attempts})");
            }
            if attempt < max_attempts {
                self.sleeper.sleep(self.policy.delay);
            }
        }

        Ok(Exchange::Exhausted {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPort, RecordingSleeper};
    use std::io::ErrorKind;

    fn retry() -> Retry<RecordingSleeper> {
        Retry::with_sleeper(RetryPolicy::default(), RecordingSleeper::default())
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 50);
        assert_eq!(policy.delay, Duration::from_millis(100));
    }

    #[test]
    fn test_immediate_response() {
        let mut port = MockPort::new();
        port.respond(&[0x02, 0x80, 0x00]);
        let mut link = Link::new(port);
        let mut retry = retry();

        let result = retry.exchange(&mut link, &[0x01, 0x01, 0x00], Resend::Once, 0x00);
        assert_eq!(result.unwrap(), Exchange::Response(vec![0x02, 0x80, 0x00]));
        assert!(retry.sleeper().sleeps.is_empty());
    }

    #[test]
    fn test_silent_link_exhausts_budget() {
        let mut link = Link::new(MockPort::new());
        let mut retry = retry();

        let result = retry.exchange(&mut link, &[0x01, 0x01, 0x00], Resend::Once, 0x00);
        assert_eq!(result.unwrap(), Exchange::Exhausted { attempts: 50 });
        assert_eq!(retry.sleeper().sleeps.len(), 49);
        assert!(retry.sleeper().sleeps.iter().all(|d| *d == Duration::from_millis(100)));
        // Sent exactly once
        assert_eq!(link.port().writes.len(), 1);
    }

    #[test]
    fn test_resend_every_attempt() {
        let mut link = Link::new(MockPort::new());
        let mut retry = Retry::with_sleeper(
            RetryPolicy {
                max_attempts: 5,
                delay: Duration::from_millis(1),
            },
            RecordingSleeper::default(),
        );

        let result = retry.exchange(&mut link, &[0x01, 0x01, 0x00], Resend::EveryAttempt, 0x00);
        assert_eq!(result.unwrap(), Exchange::Exhausted { attempts: 5 });
        assert_eq!(link.port().writes.len(), 5);
    }

    #[test]
    fn test_late_response_after_transient_timeouts() {
        let mut port = MockPort::new();
        // Nothing for the first two sends, then an ack
        port.respond(&[]);
        port.respond(&[]);
        port.respond(&[0x02, 0x80, 0x00]);
        let mut link = Link::new(port);
        let mut retry = retry();

        let result = retry.exchange(&mut link, &[0x01, 0x01, 0x00], Resend::EveryAttempt, 0x00);
        assert_eq!(result.unwrap(), Exchange::Response(vec![0x02, 0x80, 0x00]));
        assert_eq!(retry.sleeper().sleeps.len(), 2);
    }

    #[test]
    fn test_hard_error_aborts_without_retry() {
        let mut port = MockPort::new();
        port.read_error = Some(ErrorKind::PermissionDenied);
        let mut link = Link::new(port);
        let mut retry = retry();

        let result = retry.exchange(&mut link, &[0x01, 0x01, 0x00], Resend::Once, 0x00);
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(retry.sleeper().sleeps.is_empty());
    }

    #[test]
    fn test_zero_attempt_policy_still_tries_once() {
        let mut link = Link::new(MockPort::new());
        let mut retry = Retry::with_sleeper(
            RetryPolicy {
                max_attempts: 0,
                delay: Duration::ZERO,
            },
            RecordingSleeper::default(),
        );
        let result = retry.exchange(&mut link, &[0x00], Resend::Once, 0x00);
        assert_eq!(result.unwrap(), Exchange::Exhausted { attempts: 1 });
    }

    #[test]
    fn test_cancel_before_first_attempt() {
        let mut link = Link::new(MockPort::new());
        let mut retry = retry();
        retry.cancel_flag().cancel();

        let result = retry.exchange(&mut link, &[0x01, 0x01, 0x00], Resend::EveryAttempt, 0x00);
        assert!(matches!(result, Err(Error::Interrupted)));
        assert!(link.port().writes.is_empty());
    }

    #[test]
    fn test_cancel_mid_exchange_stops_polling() {
        let cancel = CancelFlag::new();
        let mut link = Link::new(MockPort::new());
        let mut retry = Retry::with_sleeper(
            RetryPolicy::default(),
            RecordingSleeper::cancelling_after(3, cancel.clone()),
        );
        retry.set_cancel_flag(cancel);

        let result = retry.exchange(&mut link, &[0x01, 0x01, 0x00], Resend::EveryAttempt, 0x00);
        assert!(matches!(result, Err(Error::Interrupted)));
        // Three attempts were made before the flag tripped
        assert_eq!(link.port().writes.len(), 3);
        assert_eq!(retry.sleeper().sleeps.len(), 3);
    }
}
