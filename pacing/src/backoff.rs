use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::types::PacingError;

pub const DEFAULT_DELAY_FACTOR: Duration = Duration::from_millis(200);
pub const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.25;
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// `2^31` is the largest multiplier applied to the delay factor.
const MAX_EXPONENT: u32 = 31;

/// Decides whether a failed attempt (1-based) may be retried.
pub type RetryPredicate<E> = Arc<dyn Fn(&E, u32) -> bool + Send + Sync>;

/// Suspends the retry loop between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Delay schedule of a [`Backoff`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    pub delay_factor: Duration,
    /// Fraction of the computed delay that jitter may add or remove, `0..=1`.
    pub randomization_factor: f64,
    pub max_delay: Duration,
    /// Upper bound on invocations, including the first one.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            delay_factor: DEFAULT_DELAY_FACTOR,
            randomization_factor: DEFAULT_RANDOMIZATION_FACTOR,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl BackoffPolicy {
    pub fn validate(&self) -> Result<(), PacingError> {
        if self.max_attempts < 1 {
            return Err(PacingError::configuration(format!(
                "max_attempts must be at least 1, got {}",
                self.max_attempts
            )));
        }
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(PacingError::configuration(format!(
                "randomization_factor must be within 0..=1, got {}",
                self.randomization_factor
            )));
        }
        Ok(())
    }

    /// Delay to sleep after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::rng())
    }

    pub fn delay_with<G: Rng>(&self, attempt: u32, rng: &mut G) -> Duration {
        let exponent = attempt.min(MAX_EXPONENT) as i32;
        let jitter = if self.randomization_factor > 0.0 {
            1.0 + self.randomization_factor * rng.random_range(-1.0..=1.0)
        } else {
            1.0
        };
        let raw = self.delay_factor.as_secs_f64() * 2f64.powi(exponent) * jitter;
        let capped = raw.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }
}

/// Construction options for [`Backoff`].
pub struct BackoffOptions<E> {
    pub delay_factor: Duration,
    pub randomization_factor: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
    /// Consulted on failures before the last attempt; `false` stops retrying.
    pub retry_if: Option<RetryPredicate<E>>,
}

impl<E> Default for BackoffOptions<E> {
    fn default() -> Self {
        Self::from_policy(BackoffPolicy::default())
    }
}

impl<E> Clone for BackoffOptions<E> {
    fn clone(&self) -> Self {
        Self {
            retry_if: self.retry_if.clone(),
            ..Self::from_policy(self.policy())
        }
    }
}

impl<E> BackoffOptions<E> {
    pub fn from_policy(policy: BackoffPolicy) -> Self {
        Self {
            delay_factor: policy.delay_factor,
            randomization_factor: policy.randomization_factor,
            max_delay: policy.max_delay,
            max_attempts: policy.max_attempts,
            retry_if: None,
        }
    }

    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E, u32) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Some(Arc::new(predicate));
        self
    }

    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            delay_factor: self.delay_factor,
            randomization_factor: self.randomization_factor,
            max_delay: self.max_delay,
            max_attempts: self.max_attempts,
        }
    }
}

/// Retries an async operation with exponentially growing, jittered delays.
///
/// Errors are never wrapped: the caller receives the error of the last
/// attempt, either because attempts ran out or because the retry predicate
/// refused to continue.
pub struct Backoff<F, E> {
    func: F,
    policy: BackoffPolicy,
    retry_if: Option<RetryPredicate<E>>,
    sleeper: Arc<dyn Sleeper>,
}

impl<F, E> Backoff<F, E> {
    pub fn new(func: F, options: BackoffOptions<E>) -> Result<Self, PacingError> {
        let policy = options.policy();
        policy.validate()?;
        Ok(Self {
            func,
            policy,
            retry_if: options.retry_if,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    #[instrument(skip_all, fields(max_attempts = self.policy.max_attempts))]
    pub async fn run<Fut, T>(&self) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match (self.func)().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if attempt >= self.policy.max_attempts {
                warn!(attempt, error = %err, "retry attempts exhausted");
                return Err(err);
            }
            if self
                .retry_if
                .as_ref()
                .is_some_and(|retry_if| !retry_if(&err, attempt))
            {
                debug!(attempt, error = %err, "retry rejected");
                return Err(err);
            }

            let delay = self.policy.delay(attempt);
            debug!(attempt, ?delay, error = %err, "attempt failed, backing off");
            self.sleeper.sleep(delay).await;
        }
    }
}
