//! Wait-duration strategies used between attempts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Default minimum wait of [`Backoff::default`].
pub const DEFAULT_MIN_WAIT: Duration = Duration::from_secs(1);
/// Default maximum wait of [`Backoff::default`].
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(30);
/// Base wait substituted when a linear backoff is given a zero base.
pub const DEFAULT_BASE_WAIT: Duration = Duration::from_secs(1);

/// Specifies how long to wait before the next attempt, given the number of
/// attempts already made.
///
/// Strategies are pure functions of the attempt count; the only state is the
/// seeded generator behind [`Backoff::LinearJitter`], which clones share.
#[derive(Clone)]
pub enum Backoff {
    /// Waits the same duration regardless of the attempt count.
    Fixed(Duration),
    /// Waits `base * attempt`. A zero base is replaced by [`DEFAULT_BASE_WAIT`].
    Linear(Duration),
    /// Waits `(min + jitter) * attempt` where the jitter is drawn uniformly from `[0, max - min)`.
    LinearJitter(Jitter),
    /// Waits `min * 2^attempt`, clamped to `max`.
    Exponential {
        /// The wait for attempt zero.
        min: Duration,
        /// Upper bound for every wait.
        max: Duration,
    },
    /// Any other strategy.
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Backoff {
    /// A linear backoff with the given base.
    pub fn linear(base: Duration) -> Self {
        Self::Linear(base)
    }

    /// A linear backoff randomized within `[min, max)`, reproducible for a fixed `seed`.
    ///
    /// If `min` is larger than `max` the two are swapped.
    pub fn linear_jitter(min: Duration, max: Duration, seed: u64) -> Self {
        Self::LinearJitter(Jitter::new(min, max, seed))
    }

    /// An exponential backoff between `min` and `max`.
    pub fn exponential(min: Duration, max: Duration) -> Self {
        Self::Exponential { min, max }
    }

    /// Wraps an arbitrary function of the attempt count.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Computes the wait before the next attempt after `attempt` attempts were made.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(d) => *d,
            Self::Linear(base) => {
                let base = if base.is_zero() {
                    DEFAULT_BASE_WAIT
                } else {
                    *base
                };
                base.saturating_mul(attempt)
            }
            Self::LinearJitter(jitter) => jitter.sample().saturating_mul(attempt),
            Self::Exponential { min, max } => 2u32
                .checked_pow(attempt)
                .and_then(|factor| min.checked_mul(factor))
                .map_or(*max, |wait| wait.min(*max)),
            Self::Custom(f) => f(attempt),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(DEFAULT_MIN_WAIT, DEFAULT_MAX_WAIT)
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            Self::Linear(d) => f.debug_tuple("Linear").field(d).finish(),
            Self::LinearJitter(j) => f.debug_tuple("LinearJitter").field(j).finish(),
            Self::Exponential { min, max } => f
                .debug_struct("Exponential")
                .field("min", min)
                .field("max", max)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Range and seeded generator behind [`Backoff::LinearJitter`].
#[derive(Clone)]
pub struct Jitter {
    min: Duration,
    max: Duration,
    rng: Arc<Mutex<StdRng>>,
}

impl Jitter {
    fn new(min: Duration, max: Duration, seed: u64) -> Self {
        let (min, max) = if min > max { (max, min) } else { (min, max) };
        Self {
            min,
            max,
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Lower bound of a single draw.
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Exclusive upper bound of a single draw.
    pub fn max(&self) -> Duration {
        self.max
    }

    fn sample(&self) -> Duration {
        let span = self.max - self.min;
        let unit: f64 = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random();
        self.min + span.mul_f64(unit)
    }
}

impl fmt::Debug for Jitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jitter")
            .field("min", &self.min)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}
