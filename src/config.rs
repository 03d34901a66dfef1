//! Tunables for a tail session.

use std::time::Duration;

/// Default bound of the line queue.
pub const DEFAULT_LINE_CAPACITY: usize = 100;
/// Default starting size of the line scanning buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 2048;
/// Default first delay between reopen attempts after a rotation.
pub const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_secs(1);
/// Default ceiling for the delay between reopen attempts.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Configuration for a tail session.
///
/// ```rust
/// use log_tail::TailConfig;
/// use std::time::Duration;
///
/// let config = TailConfig::default()
///     .with_line_capacity(1000)
///     .with_max_reopen_attempts(Some(10))
///     .with_backoff(Duration::from_millis(250), Duration::from_secs(5));
/// assert_eq!(config.line_capacity, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailConfig {
    /// How many undelivered lines may queue up before the reader waits for the consumer.
    pub line_capacity: usize,
    /// Starting capacity of the scan buffer. It doubles whenever a line does not fit.
    pub initial_buffer_size: usize,
    /// Delay after the first failed reopen.
    pub backoff_initial: Duration,
    /// Upper bound for the reopen delay.
    pub backoff_max: Duration,
    /// Give up after this many failed reopens. `None` retries for as long as the session lives.
    pub max_reopen_attempts: Option<u32>,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            line_capacity: DEFAULT_LINE_CAPACITY,
            initial_buffer_size: DEFAULT_BUFFER_SIZE,
            backoff_initial: DEFAULT_BACKOFF_INITIAL,
            backoff_max: DEFAULT_BACKOFF_MAX,
            max_reopen_attempts: None,
        }
    }
}

impl TailConfig {
    pub fn with_line_capacity(mut self, capacity: usize) -> Self {
        self.line_capacity = capacity.max(1);
        self
    }

    pub fn with_initial_buffer_size(mut self, size: usize) -> Self {
        self.initial_buffer_size = size.max(1);
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial = initial;
        self.backoff_max = max.max(initial);
        self
    }

    pub fn with_max_reopen_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_reopen_attempts = attempts;
        self
    }

    pub(crate) fn backoff(&self) -> Backoff {
        Backoff::new(self.backoff_initial, self.backoff_max)
    }
}

/// Doubling delay sequence with a ceiling: 1, 2, 4, 8, 16, 30, 30, ...
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial.min(max),
            max,
        }
    }

    /// Returns the delay to wait now and advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = delay.saturating_mul(2).min(self.max);
        delay
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}
