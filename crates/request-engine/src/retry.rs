//! Rate-limit retry policy
//!
//! Only `RateLimited` failures are retried. The wait is the server's
//! `Retry-After` when it sent one, otherwise a fixed fallback of
//! `initial_backoff * 2^max_retries` that does not grow between attempts.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{ClassifiedError, ErrorKind};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Lower bound for a delay computed from an HTTP-date `Retry-After`.
const MIN_DATE_DELAY: Duration = Duration::from_secs(1);

/// Retry limits shared by every call an executor makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// Delay used when the server gave no `Retry-After`.
    pub fn fallback_delay(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.max_retries);
        self.initial_backoff.saturating_mul(factor)
    }

    /// Fresh per-call state.
    pub fn start(&self) -> RetryState {
        RetryState {
            retries: 0,
            max_retries: self.max_retries,
            initial_backoff: self.initial_backoff,
        }
    }
}

/// Retry bookkeeping for one logical call. Never shared between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    retries: u32,
    max_retries: u32,
    initial_backoff: Duration,
}

impl RetryState {
    /// Retries performed so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Transport attempts made once the current one finishes.
    pub fn attempt(&self) -> u32 {
        self.retries + 1
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    fn fallback_delay(&self) -> Duration {
        RetryPolicy::new(self.max_retries, self.initial_backoff).fallback_delay()
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then attempt again.
    Retry(Duration),
    /// Still rate limited with no retries left; surface the error with
    /// this delay attached.
    Exhausted(Duration),
    /// Not a retryable failure.
    NotRetryable,
}

pub fn should_retry(error: &ClassifiedError, state: &RetryState) -> RetryDecision {
    if error.kind() != ErrorKind::RateLimited {
        return RetryDecision::NotRetryable;
    }

    let delay = error.retry_after().unwrap_or_else(|| state.fallback_delay());
    if state.retries < state.max_retries {
        RetryDecision::Retry(delay)
    } else {
        RetryDecision::Exhausted(delay)
    }
}

/// Parse a `Retry-After` header value.
///
/// Digits are taken as exact seconds. Otherwise the value must be an HTTP
/// date (IMF-fixdate, RFC 850 or asctime), converted to a delay relative to
/// `now` and floored at one second. Returns `None` for anything else.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse::<u64>().ok().map(Duration::from_secs);
    }

    let at = parse_http_date(value)?;
    let delay = (at - now).to_std().unwrap_or(Duration::ZERO);
    Some(delay.max(MIN_DATE_DELAY))
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Some(at.with_timezone(&Utc));
    }
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
