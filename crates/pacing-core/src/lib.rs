mod config;
mod debounce;
mod error;
mod manual;
mod scheduler;
mod throttle;

pub use config::{DebounceOptions, ThrottleOptions};
pub use debounce::Debounced;
pub use error::SchedulerError;
pub use manual::ManualScheduler;
pub use scheduler::{Scheduler, TimerCallback, TimerHandle, TokioScheduler};
pub use throttle::Throttled;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
