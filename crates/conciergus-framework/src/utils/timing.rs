//! Debounce and throttle wrappers.
//!
//! Both need a Tokio runtime: debounced calls are scheduled with
//! `tokio::spawn`, and both measure time with `tokio::time::Instant` so they
//! respect paused test clocks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

type AsyncCallback<A> = Arc<dyn Fn(A) -> BoxFuture<'static, ()> + Send + Sync>;

/// Delays a callback until `delay` has passed without another call.
///
/// Each [`call`](Self::call) cancels the pending invocation (if it has not
/// started yet) and schedules a new one with the latest argument. Once the
/// callback starts it always runs to completion.
pub struct Debounced<A> {
    delay: Duration,
    callback: AsyncCallback<A>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

/// Wraps `f` in a [`Debounced`].
pub fn debounce<A, F, Fut>(delay: Duration, f: F) -> Debounced<A>
where
    A: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Debounced {
        delay,
        callback: Arc::new(move |arg| -> BoxFuture<'static, ()> { Box::pin(f(arg)) }),
        pending: Mutex::new(None),
    }
}

impl<A: Send + 'static> Debounced<A> {
    /// Schedules the callback with `arg`, replacing any pending call.
    pub fn call(&self, arg: A) {
        let callback = Arc::clone(&self.callback);
        let delay = self.delay;
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detach so a later `call` cannot abort a running callback.
            tokio::spawn(callback(arg));
        }));
    }

    /// Drops the pending call, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }

    /// Returns `true` while a call is waiting for its delay to elapse.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<A> Drop for Debounced<A> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}

/// Runs a callback at most once per `interval`; extra calls are dropped.
pub struct Throttled<A> {
    interval: Duration,
    callback: Arc<dyn Fn(A) + Send + Sync>,
    last_run: Mutex<Option<Instant>>,
}

/// Wraps `f` in a [`Throttled`].
pub fn throttle<A, F>(interval: Duration, f: F) -> Throttled<A>
where
    F: Fn(A) + Send + Sync + 'static,
{
    Throttled {
        interval,
        callback: Arc::new(f),
        last_run: Mutex::new(None),
    }
}

impl<A> Throttled<A> {
    /// Invokes the callback unless it ran less than `interval` ago.
    ///
    /// Returns whether the callback ran.
    pub fn call(&self, arg: A) -> bool {
        let now = Instant::now();
        {
            let mut last = self.last_run.lock();
            if (*last).is_some_and(|at| now.duration_since(at) < self.interval) {
                return false;
            }
            *last = Some(now);
        }
        (self.callback)(arg);
        true
    }
}
