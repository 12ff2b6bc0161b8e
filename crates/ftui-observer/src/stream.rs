#![forbid(unsafe_code)]

//! Per-consumer cursor over a property's update history.
//!
//! # Design
//!
//! A [`Stream<T>`] is nothing more than a reference to the state node its
//! holder currently considers "present". Every update appended by the
//! producer is visited exactly once by each cursor that advances over it, in
//! publication order. Advancing replaces the cursor's own reference; the
//! shared chain is never written by readers.
//!
//! Advancing takes `&mut self`, so a single cursor cannot be driven from two
//! places at once. To hand an independent view to another thread, clone the
//! cursor first: the clone starts at the same node and evolves on its own.
//!
//! # Performance
//!
//! | Operation        | Cost                                     |
//! |------------------|------------------------------------------|
//! | `value()`        | O(1), no synchronization                 |
//! | `has_next()`     | O(1), one atomic load                    |
//! | `wait()`         | O(1) when ready; parks otherwise         |
//! | `clone()`        | O(1), one refcount increment             |
//! | Memory           | one `Arc` per cursor                     |
//!
//! # Failure Modes
//!
//! - **Producer stops**: `wait()` parks forever. An absent update is
//!   indistinguishable from one that has not arrived yet; bound the wait
//!   through [`Stream::changes`] if that matters.
//! - **Stalled cursor**: a cursor that never advances keeps every node from
//!   its position onwards alive.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::trace;

use crate::signal::Changes;
use crate::state::State;

/// A consumer's position in the list of values a property was updated to.
///
/// Obtain one from [`Property::observe`](crate::Property::observe); the
/// cursor starts at the value current at that moment and sees every later
/// update.
pub struct Stream<T> {
    state: Arc<State<T>>,
}

impl<T> Stream<T> {
    pub(crate) fn at(state: Arc<State<T>>) -> Self {
        Self { state }
    }

    fn move_to(&mut self, next: Arc<State<T>>) {
        #[cfg(feature = "tracing")]
        trace!(
            from = self.state.version(),
            to = next.version(),
            "stream advanced"
        );
        self.state = next;
    }

    /// The value at the cursor's current position.
    #[must_use]
    pub fn value(&self) -> &T {
        self.state.value()
    }

    /// Version of the current position. The property's initial value is
    /// version 0 and each update adds one.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.version()
    }

    /// Block until the next update is published, then move to it.
    ///
    /// Returns immediately if the update already happened. Parks forever if
    /// the producer never publishes again.
    pub fn wait(&mut self) {
        let next = Arc::clone(self.state.wait_next());
        self.move_to(next);
    }

    /// [`wait`](Self::wait) followed by [`value`](Self::value).
    ///
    /// Never returns the value the cursor was created at, only later ones.
    pub fn wait_next(&mut self) -> &T {
        self.wait();
        self.value()
    }

    /// Move to the next update if it has already been published.
    ///
    /// Returns `None` without blocking or moving when it has not.
    pub fn try_wait_next(&mut self) -> Option<&T> {
        let next = Arc::clone(self.state.try_next()?);
        self.move_to(next);
        Some(self.value())
    }

    /// Whether an update is available. Never blocks, never moves the cursor.
    ///
    /// `true` exactly when the next [`wait`](Self::wait) would return
    /// without blocking.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.state.is_ready()
    }

    /// The completion signal of the current position.
    ///
    /// Use it to wait on several sources at once, or to bound a wait, then
    /// advance the cursor once the signal is set.
    #[must_use]
    pub fn changes(&self) -> Changes<T> {
        Changes::new(Arc::clone(&self.state))
    }

    /// Move to the next update and return its value.
    ///
    /// Only call this after [`changes`](Self::changes) or
    /// [`has_next`](Self::has_next) reported an update. Called early, it
    /// blocks until the update arrives.
    #[deprecated(note = "use `wait_next`, or `try_wait_next` after checking `has_next`")]
    pub fn advance(&mut self) -> &T {
        self.wait_next()
    }

    /// Move past every update published so far without blocking.
    ///
    /// Returns how many updates were skipped. Lets a slow consumer catch up
    /// to the newest value without replaying the ones in between.
    pub fn skip_to_latest(&mut self) -> u64 {
        let start = self.state.version();
        while let Some(next) = self.state.try_next() {
            let next = Arc::clone(next);
            self.move_to(next);
        }
        self.state.version() - start
    }

    /// Blocking iterator over every later value.
    ///
    /// Each item is produced by [`wait_next`](Self::wait_next). The iterator
    /// never ends on its own.
    pub fn values(&mut self) -> Values<'_, T> {
        Values { stream: self }
    }
}

impl<T: Clone> Stream<T> {
    /// Owned copy of the value at the current position.
    #[must_use]
    pub fn get(&self) -> T {
        self.value().clone()
    }
}

// Manual Clone: copies the position, no `T: Clone` bound.
impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("value", self.value())
            .field("version", &self.version())
            .field("has_next", &self.has_next())
            .finish()
    }
}

/// Blocking iterator returned by [`Stream::values`].
pub struct Values<'a, T> {
    stream: &'a mut Stream<T>,
}

impl<T: Clone> Iterator for Values<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        Some(self.stream.wait_next().clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Values<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Values")
            .field("stream", &self.stream)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
