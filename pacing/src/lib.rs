//! Debounce, throttle and exponential backoff wrappers for arbitrary functions.

pub mod backoff;
pub mod config;
pub mod policy_map;
pub mod types;

pub use backoff::{Backoff, BackoffOptions, BackoffPolicy, RetryPredicate, Sleeper, TokioSleeper};
pub use config::load_policy_config;
pub use pacing_core::{
    DebounceOptions, Debounced, ManualScheduler, Scheduler, SchedulerError, ThrottleOptions,
    Throttled, TimerCallback, TimerHandle, TokioScheduler,
};
pub use policy_map::PolicyMap;
pub use types::{PacingError, PolicyConfig, PolicyKind, PolicyRef};

use std::fmt;
use std::sync::Arc;

/// Debounce `func` on the current tokio runtime.
pub fn make_debounced<F, A, R, E>(
    func: F,
    options: DebounceOptions,
) -> Result<Debounced<A, R, E>, PacingError>
where
    F: FnMut(A) -> Result<R, E> + Send + 'static,
    A: Send + 'static,
    R: Clone + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let scheduler = TokioScheduler::new()?;
    Ok(Debounced::new(func, options, Arc::new(scheduler)))
}

/// Throttle `func` on the current tokio runtime.
pub fn make_throttled<F, A, R, E>(
    func: F,
    options: ThrottleOptions,
) -> Result<Throttled<A, R, E>, PacingError>
where
    F: FnMut(A) -> Result<R, E> + Send + 'static,
    A: Send + 'static,
    R: Clone + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let scheduler = TokioScheduler::new()?;
    Ok(Throttled::new(func, options, Arc::new(scheduler)))
}

/// Wrap an async operation in a retry loop; fails fast on invalid options.
pub fn with_backoff<F, E>(
    func: F,
    options: BackoffOptions<E>,
) -> Result<Backoff<F, E>, PacingError> {
    Backoff::new(func, options)
}

/// Convenience helper for loading a policy file and building a [`PolicyMap`].
pub fn load_policy_map(path: &std::path::Path) -> Result<PolicyMap, PacingError> {
    let config = load_policy_config(path)?;
    PolicyMap::from_config(&config)
}

pub mod test_tools;
