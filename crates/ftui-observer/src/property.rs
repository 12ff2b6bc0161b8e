#![forbid(unsafe_code)]

//! Property: the single writer that extends a value's history chain.
//!
//! # Design
//!
//! [`Property<T>`] holds the newest state node behind a mutex. Every
//! [`set`](Property::set) links a new node after it and moves the property to
//! that node, so updates are published strictly one after another even when
//! several threads call `set` on clones of the same property. Readers never
//! touch the mutex once they hold a [`Stream`]; they only walk the chain.
//!
//! Unlike a callback-based observable, the property keeps no list of
//! subscribers. A new [`Stream`] is just a reference to the newest node, and
//! the completion signal on each node reaches every cursor waiting there.
//!
//! # Performance
//!
//! | Operation   | Complexity                          |
//! |-------------|-------------------------------------|
//! | `get()`     | O(1) + clone of `T`                 |
//! | `set()`     | O(1) allocation + wake of waiters   |
//! | `observe()` | O(1)                                |
//! | Memory      | one node per update still reachable |
//!
//! # Failure Modes
//!
//! - **Stalled consumer**: a [`Stream`] that is never advanced keeps every
//!   node after its position alive. Drop or advance idle streams.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[cfg(feature = "tracing")]
use tracing::{debug, trace, warn};

use crate::state::State;
use crate::stream::Stream;

/// Shared interior for [`Property<T>`].
struct PropertyInner<T> {
    /// Newest node. Always the unlinked tail of the chain.
    latest: Mutex<Arc<State<T>>>,
}

/// A shared value whose every update can be observed by any number of
/// independent [`Stream`]s.
///
/// Cloning a `Property` creates a new handle to the **same** history: all
/// handles publish into, and observe, one chain.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each `set`/`update`.
/// 2. Updates are published in the order the internal lock is acquired.
/// 3. A stream returned by [`observe`](Self::observe) starts at the value
///    current at that moment and sees every later update.
pub struct Property<T> {
    inner: Arc<PropertyInner<T>>,
}

// Manual Clone: shares the same chain.
impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Format outside the lock so a slow `Debug` never stalls publishers.
        let latest = Arc::clone(&self.latest());
        f.debug_struct("Property")
            .field("value", latest.value())
            .field("version", &latest.version())
            .finish()
    }
}

impl<T: Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Property<T> {
    /// Create a new property with the given initial value.
    ///
    /// The initial version is 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        #[cfg(feature = "tracing")]
        debug!(type_name = std::any::type_name::<T>(), "property created");

        Self {
            inner: Arc::new(PropertyInner {
                latest: Mutex::new(State::origin(value)),
            }),
        }
    }

    fn latest(&self) -> MutexGuard<'_, Arc<State<T>>> {
        self.inner
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Access the current value by reference without cloning.
    ///
    /// The closure `f` receives an immutable reference to the value. The
    /// internal lock is not held while `f` runs.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let latest = Arc::clone(&self.latest());
        f(latest.value())
    }

    /// Current version number. 0 for the initial value, incremented by 1 on
    /// each update.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.latest().version()
    }

    /// A new stream positioned at the current value.
    ///
    /// The stream sees only updates published after this call. Safe to call
    /// from any thread.
    #[must_use]
    pub fn observe(&self) -> Stream<T> {
        Stream::at(Arc::clone(&self.latest()))
    }

    /// Publish a new value and wake every stream waiting on the previous one.
    ///
    /// Returns the version of the published value.
    pub fn set(&self, value: T) -> u64 {
        let mut latest = self.latest();
        Self::publish(&mut latest, value)
    }

    fn publish(latest: &mut Arc<State<T>>, value: T) -> u64 {
        let linked = latest.link(value);
        debug_assert!(
            linked.is_ok(),
            "property tail was linked externally, value dropped: {:?}",
            linked.as_ref().err()
        );
        match linked {
            Ok(next) => *latest = next,
            Err(_err) => {
                // Someone linked the tail outside this property. Resync to
                // the true tail; the value is dropped.
                #[cfg(feature = "tracing")]
                warn!(error = %_err, "property tail was linked externally, resyncing");
                while let Some(next) = latest.try_next() {
                    let next = Arc::clone(next);
                    *latest = next;
                }
            }
        }

        #[cfg(feature = "tracing")]
        trace!(version = latest.version(), "property updated");

        latest.version()
    }
}

impl<T: Clone> Property<T> {
    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.latest().value().clone()
    }

    /// Derive the next value from a copy of the current one and publish it.
    ///
    /// The read and the publish happen under one lock acquisition, so no
    /// concurrent update can slip in between. Always publishes, even if `f`
    /// leaves the value unchanged.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> u64 {
        let mut latest = self.latest();
        let mut value = latest.value().clone();
        f(&mut value);
        Self::publish(&mut latest, value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
