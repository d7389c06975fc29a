use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use crate::scheduler::{Scheduler, TimerCallback, TimerHandle};
use crate::{lock, millis};

/// Virtual-time scheduler for deterministic tests.
///
/// Time only moves through [`advance`](ManualScheduler::advance) and
/// [`set_time`](ManualScheduler::set_time). Callbacks run on the thread
/// that advances the clock, outside the scheduler's own lock, so they may
/// schedule or cancel further timers.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

#[derive(Default)]
struct ManualState {
    now: i64,
    next_id: u64,
    queue: BTreeMap<(i64, u64), TimerCallback>,
    due: HashMap<u64, i64>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now_ms: i64) -> Self {
        let scheduler = Self::default();
        scheduler.set_time(now_ms);
        scheduler
    }

    /// Move the clock without running any timer, like a busy loop that
    /// never yields to its event loop. The clock may move backward.
    pub fn set_time(&self, now_ms: i64) {
        lock(&self.state).now = now_ms;
    }

    /// Move the clock forward by `by`, running every timer that comes due
    /// in (due time, schedule order). Timers scheduled by those callbacks
    /// run too when they fall inside the window.
    pub fn advance(&self, by: Duration) {
        let target = lock(&self.state).now.saturating_add(millis(by));
        loop {
            let callback = {
                let mut state = lock(&self.state);
                let next = state.queue.first_key_value().map(|(key, _)| *key);
                match next {
                    Some((due, id)) if due <= target => {
                        state.due.remove(&id);
                        state.now = state.now.max(due);
                        state.queue.remove(&(due, id))
                    }
                    _ => {
                        state.now = target;
                        None
                    }
                }
            };
            match callback {
                Some(callback) => callback(),
                None => break,
            }
        }
    }

    pub fn pending_timers(&self) -> usize {
        lock(&self.state).queue.len()
    }
}

impl Scheduler for ManualScheduler {
    fn now_ms(&self) -> i64 {
        lock(&self.state).now
    }

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        let due = state.now.saturating_add(millis(delay));
        state.queue.insert((due, id), callback);
        state.due.insert(id, due);
        TimerHandle::new(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        let mut state = lock(&self.state);
        if let Some(due) = state.due.remove(&handle.id()) {
            state.queue.remove(&(due, handle.id()));
        }
    }
}
