//! Generic polling with a deadline.
//!
//! Nothing in here knows about UI elements: a search is any closure returning
//! `Result<Option<T>, E>`, where `Ok(None)` means "not yet".

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::errors::AutomationError;

/// Interval between two polling attempts unless configured otherwise.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

const TIMEOUT_ENV: &str = "FLUENT_FIND_TIMEOUT_MS";
const INTERVAL_ENV: &str = "FLUENT_FIND_INTERVAL_MS";
const IGNORE_ERRORS_ENV: &str = "FLUENT_FIND_IGNORE_ERRORS";

/// How long and how often a search is retried.
///
/// Without a timeout the search runs exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RetryPolicyRepr", into = "RetryPolicyRepr")]
pub struct RetryPolicy {
    pub timeout: Option<Duration>,
    pub interval: Duration,
    /// Treat errors raised by the search as "not yet" instead of aborting.
    pub ignore_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: None,
            interval: DEFAULT_RETRY_INTERVAL,
            ignore_errors: false,
        }
    }
}

impl From<Duration> for RetryPolicy {
    fn from(timeout: Duration) -> Self {
        Self::with_timeout(timeout)
    }
}

impl RetryPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }

    /// Builds a policy from the defaults overlaid with `FLUENT_FIND_TIMEOUT_MS`,
    /// `FLUENT_FIND_INTERVAL_MS` and `FLUENT_FIND_IGNORE_ERRORS`.
    pub fn from_env() -> Result<Self, AutomationError> {
        let mut policy = Self::default();

        if let Some(value) = read_env(TIMEOUT_ENV) {
            policy.timeout = Some(parse_millis(TIMEOUT_ENV, &value)?);
        }
        if let Some(value) = read_env(INTERVAL_ENV) {
            policy.interval = parse_millis(INTERVAL_ENV, &value)?;
        }
        if let Some(value) = read_env(IGNORE_ERRORS_ENV) {
            policy.ignore_errors = match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(AutomationError::InvalidArgument(format!(
                        "{IGNORE_ERRORS_ENV} must be a boolean, got '{other}'"
                    )))
                }
            };
        }

        Ok(policy)
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timeout {
            Some(timeout) => write!(f, "timeout {timeout:?}, interval {:?}", self.interval)?,
            None => write!(f, "single attempt")?,
        }
        if self.ignore_errors {
            write!(f, ", ignoring errors")?;
        }
        Ok(())
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_millis(key: &str, value: &str) -> Result<Duration, AutomationError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| {
            AutomationError::InvalidArgument(format!(
                "{key} must be a number of milliseconds, got '{value}': {e}"
            ))
        })
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
struct RetryPolicyRepr {
    timeout_ms: Option<u64>,
    interval_ms: u64,
    ignore_errors: bool,
}

impl Default for RetryPolicyRepr {
    fn default() -> Self {
        RetryPolicy::default().into()
    }
}

impl From<RetryPolicyRepr> for RetryPolicy {
    fn from(repr: RetryPolicyRepr) -> Self {
        Self {
            timeout: repr.timeout_ms.map(Duration::from_millis),
            interval: Duration::from_millis(repr.interval_ms),
            ignore_errors: repr.ignore_errors,
        }
    }
}

impl From<RetryPolicy> for RetryPolicyRepr {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            timeout_ms: policy.timeout.map(millis),
            interval_ms: millis(policy.interval),
            ignore_errors: policy.ignore_errors,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Runs `search` until it yields a value or the policy's timeout elapses.
///
/// See [`poll_until_found_with`].
pub fn poll_until_found<T, E, F>(search: F, policy: &RetryPolicy) -> Result<Option<T>, E>
where
    F: FnMut() -> Result<Option<T>, E>,
    E: fmt::Display,
{
    poll_until_found_with(search, policy, &SystemClock)
}

/// Runs `search` until it yields a value or the policy's timeout elapses,
/// using `clock` for time and sleeping.
///
/// The first attempt is immediate. After a miss the loop sleeps for the
/// policy interval, unless the next attempt would start past the timeout, in
/// which case `Ok(None)` is returned. Timing out is never an error. Errors
/// from `search` abort the loop unless `ignore_errors` is set.
pub fn poll_until_found_with<T, E, F>(
    mut search: F,
    policy: &RetryPolicy,
    clock: &dyn Clock,
) -> Result<Option<T>, E>
where
    F: FnMut() -> Result<Option<T>, E>,
    E: fmt::Display,
{
    let Some(timeout) = policy.timeout else {
        return search();
    };

    let start = clock.now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match search() {
            Ok(Some(value)) => {
                trace!(attempt, "search succeeded");
                return Ok(Some(value));
            }
            Ok(None) => trace!(attempt, "search found nothing yet"),
            Err(e) if policy.ignore_errors => {
                debug!(attempt, error = %e, "ignoring search error while polling");
            }
            Err(e) => return Err(e),
        }

        let elapsed = clock.now().saturating_duration_since(start);
        if elapsed.saturating_add(policy.interval) > timeout {
            debug!(attempts = attempt, ?elapsed, ?timeout, "polling timed out");
            return Ok(None);
        }
        clock.sleep(policy.interval);
    }
}

/// Polls `check` until it returns `true`. Returns `false` on timeout.
pub fn wait_until<E, F>(check: F, policy: &RetryPolicy) -> Result<bool, E>
where
    F: FnMut() -> Result<bool, E>,
    E: fmt::Display,
{
    wait_until_with(check, policy, &SystemClock)
}

pub fn wait_until_with<E, F>(mut check: F, policy: &RetryPolicy, clock: &dyn Clock) -> Result<bool, E>
where
    F: FnMut() -> Result<bool, E>,
    E: fmt::Display,
{
    poll_until_found_with(|| check().map(|done| done.then_some(())), policy, clock)
        .map(|found| found.is_some())
}
