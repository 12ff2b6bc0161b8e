#![forbid(unsafe_code)]

//! One-shot, multi-waiter completion signal.
//!
//! Every state node carries a [`Ready`] signal that fires once, when the
//! node's successor is linked. Waiters do not register ahead of time: any
//! number of threads may block on the same signal and all of them wake on the
//! single notification.
//!
//! # Design
//!
//! The signal does not store its own flag. The condition being waited on is
//! supplied by the caller as a poll closure (in practice, "is the successor
//! link set?"), so the link itself is the single source of truth and a waiter
//! that observes the signal as set always observes a valid successor.
//!
//! The mutex guards no data. It only orders "check the condition, then park"
//! against "publish the condition, then notify", so a notification can never
//! slip between a waiter's check and its park. Poisoning is therefore
//! harmless and is recovered rather than propagated.
//!
//! [`Changes`] is the public face of the signal: a cheap handle to one node
//! that lets a consumer multiplex readiness across several sources without
//! advancing its cursor.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::state::State;

/// Broadcast-once wake-up primitive attached to a state node.
#[derive(Default)]
pub(crate) struct Ready {
    lock: Mutex<()>,
    cvar: Condvar,
}

impl Ready {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake every thread parked in [`Ready::wait_for`].
    ///
    /// The caller must make the polled condition observable *before* calling
    /// this.
    pub(crate) fn notify(&self) {
        let _guard = self.lock();
        self.cvar.notify_all();
    }

    /// Block until `poll` yields a value.
    ///
    /// `poll` is first tried without taking the lock, so an already-set
    /// condition costs a single atomic load.
    pub(crate) fn wait_for<R>(&self, mut poll: impl FnMut() -> Option<R>) -> R {
        if let Some(found) = poll() {
            return found;
        }
        let mut guard = self.lock();
        loop {
            if let Some(found) = poll() {
                return found;
            }
            guard = self
                .cvar
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`Ready::wait_for`], giving up after `timeout`.
    pub(crate) fn wait_for_timeout<R>(
        &self,
        timeout: Duration,
        mut poll: impl FnMut() -> Option<R>,
    ) -> Option<R> {
        if let Some(found) = poll() {
            return Some(found);
        }
        // A timeout too large to represent as a deadline waits forever.
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.wait_for(poll));
        };
        let mut guard = self.lock();
        loop {
            if let Some(found) = poll() {
                return Some(found);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (next_guard, _) = self
                .cvar
                .wait_timeout(guard, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            guard = next_guard;
        }
    }
}

/// Handle to the completion signal of one state node.
///
/// Obtained from [`Stream::changes`](crate::Stream::changes). The handle is
/// pinned to the node the cursor sat on when it was taken; advancing the
/// cursor afterwards does not move the handle.
///
/// Cancellation and timeouts are not part of the cursor. A higher layer
/// composes them here instead: poll [`Changes::is_ready`] alongside another
/// source, or bound the wait with [`Changes::wait_timeout`], then advance the
/// cursor once the signal is set.
pub struct Changes<T> {
    state: Arc<State<T>>,
}

impl<T> Changes<T> {
    pub(crate) fn new(state: Arc<State<T>>) -> Self {
        Self { state }
    }

    /// Whether the successor has been published. Never blocks.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Block until the successor has been published.
    pub fn wait(&self) {
        self.state.wait_next();
    }

    /// Block until the successor has been published or `timeout` elapses.
    ///
    /// Returns `true` if the signal is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.state.wait_next_timeout(timeout).is_some()
    }

    /// Version of the node this handle watches.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.version()
    }
}

// Manual Clone: shares the node, no `T: Clone` bound.
impl<T> Clone for Changes<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for Changes<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Changes")
            .field("version", &self.state.version())
            .field("ready", &self.state.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn wait_for_returns_immediately_when_condition_holds() {
        let ready = Ready::default();
        assert_eq!(ready.wait_for(|| Some(5)), 5);
    }

    #[test]
    fn wait_for_timeout_expires_when_never_notified() {
        let ready = Ready::default();
        let found: Option<()> = ready.wait_for_timeout(Duration::from_millis(20), || None);
        assert!(found.is_none());
    }

    #[test]
    fn notify_wakes_every_waiter() {
        let ready = Arc::new(Ready::default());
        let flag = Arc::new(OnceLock::<u32>::new());
        let woke = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ready = Arc::clone(&ready);
                let flag = Arc::clone(&flag);
                let woke = Arc::clone(&woke);
                thread::spawn(move || {
                    let seen = ready.wait_for(|| flag.get().copied());
                    woke.fetch_add(1, Ordering::SeqCst);
                    seen
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        assert_eq!(woke.load(Ordering::SeqCst), 0);

        flag.set(42).unwrap();
        ready.notify();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(woke.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn wait_for_timeout_sees_late_notification() {
        let ready = Arc::new(Ready::default());
        let flag = Arc::new(OnceLock::<&'static str>::new());

        let producer = {
            let ready = Arc::clone(&ready);
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                flag.set("done").unwrap();
                ready.notify();
            })
        };

        let found = ready.wait_for_timeout(Duration::from_secs(10), || flag.get().copied());
        producer.join().unwrap();
        assert_eq!(found, Some("done"));
    }

    #[test]
    fn huge_timeout_degrades_to_unbounded_wait() {
        let ready = Ready::default();
        let mut polls = 0;
        let found = ready.wait_for_timeout(Duration::MAX, || {
            polls += 1;
            (polls > 1).then_some(polls)
        });
        assert_eq!(found, Some(2));
    }
}
