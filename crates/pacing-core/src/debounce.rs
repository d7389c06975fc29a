use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::DebounceOptions;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::{lock, millis};

type BoxedFn<A, R, E> = Box<dyn FnMut(A) -> Result<R, E> + Send>;

/// Debounced wrapper around a function taking `A` and returning `Result<R, E>`.
///
/// All clones share one state machine. Every operation, and every timer
/// callback, runs under a single lock, so the wrapped function must not call
/// back into the same wrapper.
///
/// Errors from the wrapped function are returned unchanged from
/// [`call`](Debounced::call) and [`flush`](Debounced::flush). Bookkeeping is
/// updated before the function runs, so a failure leaves the wrapper as if
/// the invocation had happened, minus the result. A failing invocation
/// started by the timer has no caller to report to and is logged instead.
pub struct Debounced<A, R, E> {
    shared: Arc<Mutex<Engine<A, R, E>>>,
}

impl<A, R, E> Clone for Debounced<A, R, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A, R, E> Debounced<A, R, E>
where
    A: Send + 'static,
    R: Clone + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    pub fn new<F>(func: F, options: DebounceOptions, scheduler: Arc<dyn Scheduler>) -> Self
    where
        F: FnMut(A) -> Result<R, E> + Send + 'static,
    {
        let shared = Arc::new_cyclic(|this| {
            Mutex::new(Engine {
                func: Box::new(func),
                state: DebounceState::new(&options),
                scheduler,
                this: this.clone(),
            })
        });
        Self { shared }
    }

    /// Record a call with `args`, invoking now or scheduling as the options
    /// dictate. Returns the result of the latest invocation, if any.
    pub fn call(&self, args: A) -> Result<Option<R>, E> {
        lock(&self.shared).call(args)
    }

    /// Drop any pending invocation. The last result is kept.
    pub fn cancel(&self) {
        lock(&self.shared).cancel();
    }

    /// Run a pending trailing invocation immediately.
    pub fn flush(&self) -> Result<Option<R>, E> {
        lock(&self.shared).flush()
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.shared).state.pending.is_some()
    }

    pub fn last_result(&self) -> Option<R> {
        lock(&self.shared).state.last_result.clone()
    }
}

struct Engine<A, R, E> {
    func: BoxedFn<A, R, E>,
    state: DebounceState<A, R>,
    scheduler: Arc<dyn Scheduler>,
    this: Weak<Mutex<Engine<A, R, E>>>,
}

struct PendingTimer {
    handle: TimerHandle,
    seq: u64,
}

struct DebounceState<A, R> {
    wait: i64,
    leading: bool,
    trailing: bool,
    max_wait: Option<i64>,
    last_args: Option<A>,
    pending: Option<PendingTimer>,
    last_call_time: Option<i64>,
    last_invoke_time: i64,
    last_result: Option<R>,
    timer_seq: u64,
}

impl<A, R> DebounceState<A, R> {
    fn new(options: &DebounceOptions) -> Self {
        Self {
            wait: millis(options.wait),
            leading: options.leading,
            trailing: options.trailing,
            max_wait: options.effective_max_wait().map(millis),
            last_args: None,
            pending: None,
            last_call_time: None,
            last_invoke_time: 0,
            last_result: None,
            timer_seq: 0,
        }
    }

    fn should_invoke(&self, time: i64) -> bool {
        let Some(last_call) = self.last_call_time else {
            return true;
        };
        let since_call = time.saturating_sub(last_call);
        let since_invoke = time.saturating_sub(self.last_invoke_time);

        // A negative gap means the clock moved backward.
        since_call >= self.wait
            || since_call < 0
            || self.max_wait.is_some_and(|max| since_invoke >= max)
    }

    fn remaining_wait(&self, time: i64) -> i64 {
        let since_call = self
            .last_call_time
            .map_or(0, |last_call| time.saturating_sub(last_call));
        let waiting = self.wait.saturating_sub(since_call);
        let remaining = match self.max_wait {
            Some(max) => {
                let since_invoke = time.saturating_sub(self.last_invoke_time);
                waiting.min(max.saturating_sub(since_invoke))
            }
            None => waiting,
        };
        remaining.max(0)
    }
}

impl<A, R, E> Engine<A, R, E> {
    fn clear_timer(&mut self) {
        if let Some(timer) = self.state.pending.take() {
            self.scheduler.cancel(timer.handle);
        }
    }
}

impl<A, R, E> Engine<A, R, E>
where
    A: Send + 'static,
    R: Clone + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    fn call(&mut self, args: A) -> Result<Option<R>, E> {
        let time = self.scheduler.now_ms();
        let is_invoking = self.state.should_invoke(time);
        self.state.last_args = Some(args);
        self.state.last_call_time = Some(time);

        if is_invoking {
            if self.state.pending.is_none() {
                return self.leading_edge(time);
            }
            if self.state.max_wait.is_some() {
                // The ceiling passed while the timer had no chance to fire.
                self.clear_timer();
                self.start_timer(self.state.wait);
                return self.invoke(time, "max_wait");
            }
        }

        if self.state.pending.is_none() {
            self.start_timer(self.state.wait);
        }
        Ok(self.state.last_result.clone())
    }

    fn cancel(&mut self) {
        self.clear_timer();
        self.state.last_invoke_time = 0;
        self.state.last_args = None;
        self.state.last_call_time = None;
    }

    fn flush(&mut self) -> Result<Option<R>, E> {
        if self.state.pending.is_none() {
            return Ok(self.state.last_result.clone());
        }
        let time = self.scheduler.now_ms();
        self.trailing_edge(time)
    }

    fn leading_edge(&mut self, time: i64) -> Result<Option<R>, E> {
        self.state.last_invoke_time = time;
        self.start_timer(self.state.wait);
        if self.state.leading {
            self.invoke(time, "leading")
        } else {
            Ok(self.state.last_result.clone())
        }
    }

    fn trailing_edge(&mut self, time: i64) -> Result<Option<R>, E> {
        self.clear_timer();
        if self.state.trailing && self.state.last_args.is_some() {
            return self.invoke(time, "trailing");
        }
        self.state.last_args = None;
        Ok(self.state.last_result.clone())
    }

    fn invoke(&mut self, time: i64, edge: &'static str) -> Result<Option<R>, E> {
        let Some(args) = self.state.last_args.take() else {
            return Ok(self.state.last_result.clone());
        };
        self.state.last_invoke_time = time;
        debug!(edge, time, "invoking debounced function");
        let result = (self.func)(args)?;
        self.state.last_result = Some(result);
        Ok(self.state.last_result.clone())
    }

    fn on_timer(&mut self, seq: u64) {
        if self.state.pending.as_ref().map(|timer| timer.seq) != Some(seq) {
            trace!(seq, "ignoring stale debounce timer");
            return;
        }

        let time = self.scheduler.now_ms();
        if self.state.should_invoke(time) {
            if let Err(err) = self.trailing_edge(time) {
                warn!(error = %err, "trailing invocation failed");
            }
            return;
        }

        // The fired timer is spent; replace it without cancelling.
        self.state.pending = None;
        let remaining = self.state.remaining_wait(time);
        trace!(remaining, "quiet period not over, rescheduling");
        self.start_timer(remaining);
    }

    fn start_timer(&mut self, delay_ms: i64) {
        self.state.timer_seq = self.state.timer_seq.wrapping_add(1);
        let seq = self.state.timer_seq;
        let this = self.this.clone();
        let delay = Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0));
        let handle = self.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(shared) = this.upgrade() {
                    lock(&shared).on_timer(seq);
                }
            }),
        );
        self.state.pending = Some(PendingTimer { handle, seq });
    }
}

impl<A, R, E> Drop for Engine<A, R, E> {
    fn drop(&mut self) {
        self.clear_timer();
    }
}
