//! Helpers for exercising retry loops without real time passing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::backoff::Sleeper;

/// Sleeper that records requested delays and returns immediately.
#[derive(Clone, Debug, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn total(&self) -> Duration {
        self.delays().into_iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

/// Operation that fails with queued errors, in order, before succeeding.
pub struct FlakyOperation<T, E> {
    inner: Arc<FlakyState<T, E>>,
}

struct FlakyState<T, E> {
    failures: Mutex<VecDeque<E>>,
    value: T,
    attempts: AtomicUsize,
}

impl<T, E> Clone for FlakyOperation<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone, E> FlakyOperation<T, E> {
    pub fn new(failures: impl IntoIterator<Item = E>, value: T) -> Self {
        Self {
            inner: Arc::new(FlakyState {
                failures: Mutex::new(failures.into_iter().collect()),
                value,
                attempts: AtomicUsize::new(0),
            }),
        }
    }

    /// Operation that never succeeds within `failures` attempts.
    pub fn failing(error: E, failures: usize, value: T) -> Self
    where
        E: Clone,
    {
        Self::new(std::iter::repeat_n(error, failures), value)
    }

    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub async fn attempt(self) -> Result<T, E> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .inner
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match failure {
            Some(err) => Err(err),
            None => Ok(self.inner.value.clone()),
        }
    }
}
