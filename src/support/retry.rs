//! Retry arbitrary remote operations with exponential backoff.
//!
//! A [`RetryAction`] drives a fallible operation until it succeeds, fails with
//! a fault whose [`FaultKind`] is not in the policy's retryable set, or the
//! policy's wall-clock timeout is exhausted. The timeout is checked only after
//! a failed attempt, so a slow attempt is always allowed to run to completion.
//!
//! Delays grow as `(2^failures - 1) * base_delay`, i.e. 0.1s, 0.3s, 0.7s,
//! 1.5s, ... with the default base delay.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{Span, debug, warn};

/// Default unit of the backoff schedule.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Enumerable tag attached to every failure that can flow through a
/// [`RetryAction`]. Retry decisions are made on this tag alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    ConnectionRefused,
    ConnectionReset,
    Connect,
    RequestTimeout,
    Transport,
    Authentication,
    Api,
    Timeout,
    Configuration,
    Decode,
    Stream,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::ConnectionRefused => "ConnectionRefused",
            FaultKind::ConnectionReset => "ConnectionReset",
            FaultKind::Connect => "Connect",
            FaultKind::RequestTimeout => "RequestTimeout",
            FaultKind::Transport => "Transport",
            FaultKind::Authentication => "Authentication",
            FaultKind::Api => "Api",
            FaultKind::Timeout => "Timeout",
            FaultKind::Configuration => "Configuration",
            FaultKind::Decode => "Decode",
            FaultKind::Stream => "Stream",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by error types that can be classified for retrying.
pub trait Fault {
    fn kind(&self) -> FaultKind;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Option<Duration>,
    pub retryable: HashSet<FaultKind>,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: None,
            retryable: HashSet::new(),
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Default::default()
        }
    }

    pub fn retry_on(mut self, kind: FaultKind) -> Self {
        self.retryable.insert(kind);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn is_retryable(&self, kind: FaultKind) -> bool {
        self.retryable.contains(&kind)
    }

    /// Delay before the next attempt after `failures` consecutive failures.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures).saturating_sub(1);
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("No timeout given to the retry action")]
    NoTimeoutGiven,
    #[error("Timeout expired after {attempts} attempt(s) in {elapsed:?}: {last}")]
    Timeout {
        attempts: u32,
        elapsed: Duration,
        #[source]
        last: E,
    },
    #[error(transparent)]
    Failed(E),
}

/// Suspension point between attempts.
pub trait Sleep: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested delays instead of blocking. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleep {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.slept.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.delays().iter().sum()
    }
}

impl Sleep for RecordingSleep {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}

pub struct RetryAction {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleep>,
    span: Span,
}

impl fmt::Debug for RetryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAction")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryAction {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(ThreadSleep),
            span: tracing::info_span!("retry_action"),
        }
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleep + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Run `operation` until it succeeds, fails fatally, or times out.
    pub fn run<T, E, F>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        E: Fault + fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let timeout = self.policy.timeout.ok_or(RetryError::NoTimeoutGiven)?;

        let start = Instant::now();
        let mut failures = 0u32;

        loop {
            let error = match operation() {
                Ok(value) => {
                    if failures > 0 {
                        debug!(parent: &self.span, failures, "Operation succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                warn!(
                    parent: &self.span,
                    attempts = failures + 1,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Timeout expired: {}: {}",
                    error.kind(),
                    error
                );
                return Err(RetryError::Timeout {
                    attempts: failures + 1,
                    elapsed,
                    last: error,
                });
            }

            if !self.policy.is_retryable(error.kind()) {
                return Err(RetryError::Failed(error));
            }

            warn!(parent: &self.span, "Retrying: {}: {}", error.kind(), error);

            failures += 1;
            self.sleeper.sleep(self.policy.backoff_delay(failures));
        }
    }
}
