use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Instant, sleep};

use crate::error::SchedulerError;
use crate::{lock, millis};

/// Work run once a scheduled delay has elapsed.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Identifies a timer issued by a [`Scheduler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// Clock and timer services consumed by the timing engines.
///
/// Timestamps are milliseconds on an arbitrary epoch. Implementations must
/// never run a callback synchronously from inside [`Scheduler::schedule`],
/// even for a zero delay.
pub trait Scheduler: Send + Sync {
    fn now_ms(&self) -> i64;

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Cancelling an unknown or already fired handle is a no-op.
    fn cancel(&self, handle: TimerHandle);
}

/// Scheduler backed by tokio timers.
///
/// Each timer is a task spawned on the captured runtime. The clock is
/// `tokio::time::Instant` measured from construction, so paused test time
/// applies to both.
#[derive(Clone)]
pub struct TokioScheduler {
    timers: Arc<TokioTimers>,
}

struct TokioTimers {
    runtime: Handle,
    origin: Instant,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, AbortHandle>>,
}

impl TokioScheduler {
    /// Bind to the runtime of the current context.
    pub fn new() -> Result<Self, SchedulerError> {
        Ok(Self::with_handle(Handle::try_current()?))
    }

    pub fn with_handle(runtime: Handle) -> Self {
        let origin = {
            let _guard = runtime.enter();
            Instant::now()
        };
        Self {
            timers: Arc::new(TokioTimers {
                runtime,
                origin,
                next_id: AtomicU64::new(1),
                tasks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending_timers(&self) -> usize {
        lock(&self.timers.tasks).len()
    }
}

impl Scheduler for TokioScheduler {
    fn now_ms(&self) -> i64 {
        let _guard = self.timers.runtime.enter();
        millis(self.timers.origin.elapsed())
    }

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let id = self.timers.next_id.fetch_add(1, Ordering::Relaxed);
        let timers = Arc::clone(&self.timers);

        // Registered before the task can observe the map, so a zero delay
        // cannot race the insert.
        let mut tasks = lock(&self.timers.tasks);
        let task = self.timers.runtime.spawn(async move {
            sleep(delay).await;
            let registered = lock(&timers.tasks).remove(&id).is_some();
            if registered {
                callback();
            }
        });
        tasks.insert(id, task.abort_handle());
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(task) = lock(&self.timers.tasks).remove(&handle.0) {
            task.abort();
        }
    }
}
