//! Retry classification and randomized backoff
//!
//! A single transfer retries transient transport failures locally. The delay
//! before retry `n` is drawn uniformly from `[0, n * factor * unit)`: the upper
//! bound grows linearly with the retry counter and the jitter spreads out
//! transfers that failed at the same moment.
//!
//! Every transfer gets its own [`Backoff`] instance (and with it its own
//! random generator) from [`RetryPolicy::backoff`], so concurrent transfers
//! never contend on a shared RNG. Tests inject a deterministic backoff with
//! [`RetryPolicy::with_backoff`].
//!
//! # Example
//!
//! ```
//! use media_dl::retry::{NoBackoff, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::with_backoff(3, || Box::new(NoBackoff));
//! let mut backoff = policy.backoff();
//! assert_eq!(backoff.delay(2), Duration::ZERO);
//! ```

use crate::config::TransferConfig;
use crate::error::Error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network errors, malformed responses, server busy) should return `true`.
/// Permanent failures (not found, bad configuration) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the attempt should be repeated
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Any failure of the HTTP client during one attempt
            Error::Network(_) => true,
            Error::Io(_) => true,
            Error::MalformedResponse { .. } => true,
            // Timeouts, rate limiting and server-side errors go away on their own
            Error::Http { status, .. } => matches!(status, 408 | 429 | 500..=599),
            Error::Transfer { source, .. } => source.is_retryable(),
            Error::Config { .. }
            | Error::Url(_)
            | Error::Serialization(_)
            | Error::InvalidState(_)
            | Error::NothingToSave { .. }
            | Error::Save { .. }
            | Error::NoReader(_)
            | Error::Other(_) => false,
        }
    }
}

/// Source of delays between two attempts of one transfer
pub trait Backoff: Send {
    /// Delay to wait before retry number `retry` (1-based)
    fn delay(&mut self, retry: u32) -> Duration;
}

/// Uniform jitter below a linearly growing bound
///
/// Owns its random generator.
pub struct LinearJitterBackoff {
    unit: Duration,
    factor: u32,
    rng: StdRng,
}

impl LinearJitterBackoff {
    /// Create a backoff seeded from system entropy
    pub fn new(unit: Duration, factor: u32) -> Self {
        Self {
            unit,
            factor,
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a backoff with a fixed seed (reproducible delays)
    pub fn seeded(unit: Duration, factor: u32, seed: u64) -> Self {
        Self {
            unit,
            factor,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Exclusive upper bound of the delay before retry `retry`
    pub fn upper_bound(&self, retry: u32) -> Duration {
        self.unit
            .saturating_mul(retry)
            .saturating_mul(self.factor)
    }
}

impl Backoff for LinearJitterBackoff {
    fn delay(&mut self, retry: u32) -> Duration {
        let bound = self.upper_bound(retry);
        let bound_nanos = u64::try_from(bound.as_nanos()).unwrap_or(u64::MAX);
        if bound_nanos == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.rng.gen_range(0..bound_nanos))
    }
}

/// Always the same delay
#[derive(Debug, Clone, Copy)]
pub struct ConstantBackoff(pub Duration);

impl Backoff for ConstantBackoff {
    fn delay(&mut self, _retry: u32) -> Duration {
        self.0
    }
}

/// Retry immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    fn delay(&mut self, _retry: u32) -> Duration {
        Duration::ZERO
    }
}

type BackoffFactory = Arc<dyn Fn() -> Box<dyn Backoff> + Send + Sync>;

/// Retry ceiling plus a factory for per-transfer backoffs
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    make_backoff: BackoffFactory,
}

impl RetryPolicy {
    /// Policy built from the transfer configuration (jittered linear backoff)
    pub fn from_config(config: &TransferConfig) -> Self {
        let unit = config.backoff_unit;
        let factor = config.backoff_factor;
        Self {
            max_retries: config.max_retries,
            make_backoff: Arc::new(move || Box::new(LinearJitterBackoff::new(unit, factor))),
        }
    }

    /// Policy with a custom backoff factory
    pub fn with_backoff<F>(max_retries: u32, make_backoff: F) -> Self
    where
        F: Fn() -> Box<dyn Backoff> + Send + Sync + 'static,
    {
        Self {
            max_retries,
            make_backoff: Arc::new(make_backoff),
        }
    }

    /// Retry ceiling
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// A fresh backoff for one transfer
    pub fn backoff(&self) -> Box<dyn Backoff> {
        (self.make_backoff)()
    }

    /// Whether another attempt is allowed after `retries` failed retries
    pub fn should_retry(&self, error: &Error, retries: u32) -> bool {
        error.is_retryable() && retries <= self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TransferConfig::default())
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}
