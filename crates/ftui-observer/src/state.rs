#![forbid(unsafe_code)]

//! Write-once history chain.
//!
//! Each [`State`] holds one published value and, once the producer publishes
//! again, a link to the successor. The chain only ever grows at its tail;
//! nodes fall away by ordinary `Arc` reference counting once neither the
//! producer nor any cursor can reach them.
//!
//! # Invariants
//!
//! 1. `value` and `version` never change after construction.
//! 2. `next` is set at most once and never reassigned.
//! 3. The successor is stored before waiters are notified, so a node that
//!    reports ready always yields a valid successor.
//! 4. A successor's version is its predecessor's version plus one.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::{trace, warn};

use crate::error::{ObserverError, Result};
use crate::signal::Ready;

/// One immutable snapshot in the update history.
pub(crate) struct State<T> {
    value: T,
    version: u64,
    next: OnceLock<Arc<State<T>>>,
    ready: Ready,
}

impl<T> State<T> {
    fn new(value: T, version: u64) -> Self {
        Self {
            value,
            version,
            next: OnceLock::new(),
            ready: Ready::default(),
        }
    }

    /// First node of a chain, at version 0.
    pub(crate) fn origin(value: T) -> Arc<Self> {
        Arc::new(Self::new(value, 0))
    }

    pub(crate) fn value(&self) -> &T {
        &self.value
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    /// Whether the successor has been linked.
    pub(crate) fn is_ready(&self) -> bool {
        self.next.get().is_some()
    }

    /// The successor, if already linked. Never blocks.
    pub(crate) fn try_next(&self) -> Option<&Arc<State<T>>> {
        self.next.get()
    }

    /// Block until the successor is linked and return it.
    pub(crate) fn wait_next(&self) -> &Arc<State<T>> {
        self.ready.wait_for(|| self.next.get())
    }

    /// Block until the successor is linked or `timeout` elapses.
    pub(crate) fn wait_next_timeout(&self, timeout: Duration) -> Option<&Arc<State<T>>> {
        self.ready.wait_for_timeout(timeout, || self.next.get())
    }

    /// Publish `value` as this node's successor and wake every waiter.
    ///
    /// Producer-only. Callers must serialize links on the same node; a node
    /// that already has a successor is left untouched and
    /// [`ObserverError::AlreadyLinked`] is returned.
    pub(crate) fn link(&self, value: T) -> Result<Arc<State<T>>> {
        let version = self.version + 1;
        let next = Arc::new(Self::new(value, version));
        if self.next.set(Arc::clone(&next)).is_err() {
            #[cfg(feature = "tracing")]
            warn!(version = self.version, "rejected second link on state node");
            return Err(ObserverError::AlreadyLinked {
                version: self.version,
            });
        }
        self.ready.notify();

        #[cfg(feature = "tracing")]
        trace!(version, "linked state node");

        Ok(next)
    }
}

impl<T> Drop for State<T> {
    fn drop(&mut self) {
        // Unlink iteratively: a long unreachable suffix would otherwise be
        // torn down by one recursive drop per node.
        let mut next = self.next.take();
        while let Some(node) = next {
            next = match Arc::into_inner(node) {
                Some(mut state) => state.next.take(),
                None => None,
            };
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("value", &self.value)
            .field("version", &self.version)
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn origin_is_unlinked_version_zero() {
        let origin = State::origin("a");
        assert_eq!(*origin.value(), "a");
        assert_eq!(origin.version(), 0);
        assert!(!origin.is_ready());
        assert!(origin.try_next().is_none());
    }

    #[test]
    fn link_sets_successor_and_ready() {
        let origin = State::origin(1);
        let next = origin.link(2).unwrap();

        assert!(origin.is_ready());
        assert_eq!(*next.value(), 2);
        assert_eq!(next.version(), 1);
        assert!(Arc::ptr_eq(origin.try_next().unwrap(), &next));
        assert!(!next.is_ready());
    }

    #[test]
    fn second_link_is_rejected() {
        let origin = State::origin(1);
        let first = origin.link(2).unwrap();

        let err = origin.link(3).unwrap_err();
        assert_eq!(err, ObserverError::AlreadyLinked { version: 0 });
        // The first successor is untouched.
        assert!(Arc::ptr_eq(origin.try_next().unwrap(), &first));
        assert_eq!(*origin.wait_next().value(), 2);
    }

    #[test]
    fn wait_next_returns_immediately_once_linked() {
        let origin = State::origin(0);
        origin.link(1).unwrap();
        assert_eq!(*origin.wait_next().value(), 1);
    }

    #[test]
    fn wait_next_blocks_until_linked() {
        let origin = State::origin(0);
        let waiter = {
            let origin = Arc::clone(&origin);
            thread::spawn(move || *origin.wait_next().value())
        };

        thread::sleep(Duration::from_millis(20));
        origin.link(9).unwrap();
        assert_eq!(waiter.join().unwrap(), 9);
    }

    #[test]
    fn wait_next_timeout_expires_on_tail() {
        let origin = State::origin(0);
        assert!(origin.wait_next_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn versions_increase_along_chain() {
        let mut tail = State::origin(0u32);
        for i in 1..=10u32 {
            tail = tail.link(i).unwrap();
            assert_eq!(tail.version(), u64::from(i));
        }
    }

    #[test]
    fn dropping_long_chain_does_not_overflow() {
        let origin = State::origin(0u64);
        let mut tail = Arc::clone(&origin);
        for i in 1..=200_000u64 {
            tail = tail.link(i).unwrap();
        }
        drop(tail);
        drop(origin);
    }

    #[test]
    fn shared_suffix_survives_head_drop() {
        let origin = State::origin(0);
        let middle = origin.link(1).unwrap();
        let tail = middle.link(2).unwrap();

        drop(origin);
        assert_eq!(*middle.value(), 1);
        assert!(Arc::ptr_eq(middle.try_next().unwrap(), &tail));
    }
}
