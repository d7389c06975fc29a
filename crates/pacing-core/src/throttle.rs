use std::fmt;
use std::sync::Arc;

use crate::config::ThrottleOptions;
use crate::debounce::Debounced;
use crate::scheduler::Scheduler;

/// Throttled wrapper: fires at most once per `wait` window, and keeps
/// firing under sustained calls.
///
/// This is a [`Debounced`] whose ceiling equals its quiet period.
pub struct Throttled<A, R, E> {
    debounced: Debounced<A, R, E>,
}

impl<A, R, E> Clone for Throttled<A, R, E> {
    fn clone(&self) -> Self {
        Self {
            debounced: self.debounced.clone(),
        }
    }
}

impl<A, R, E> Throttled<A, R, E>
where
    A: Send + 'static,
    R: Clone + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    pub fn new<F>(func: F, options: ThrottleOptions, scheduler: Arc<dyn Scheduler>) -> Self
    where
        F: FnMut(A) -> Result<R, E> + Send + 'static,
    {
        Self {
            debounced: Debounced::new(func, options.into(), scheduler),
        }
    }

    pub fn call(&self, args: A) -> Result<Option<R>, E> {
        self.debounced.call(args)
    }

    pub fn cancel(&self) {
        self.debounced.cancel();
    }

    pub fn flush(&self) -> Result<Option<R>, E> {
        self.debounced.flush()
    }

    pub fn is_pending(&self) -> bool {
        self.debounced.is_pending()
    }

    pub fn last_result(&self) -> Option<R> {
        self.debounced.last_result()
    }
}
