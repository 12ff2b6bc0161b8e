#![forbid(unsafe_code)]

//! Observer: broadcast every update of a single value to independent readers.
//!
//! # Role in FrankenTUI
//! `ftui-observer` lets any number of threads follow one changing value
//! (configuration, connection status, a model snapshot) at their own pace.
//! Each update is recorded as an immutable snapshot; each reader replays the
//! snapshots it has not seen yet, in order, exactly once.
//!
//! # Primary responsibilities
//! - **[`Property`]**: the single writer. Holds the newest value and
//!   publishes updates one after another.
//! - **[`Stream`]**: a reader's cursor. Waits for, reads, and steps over
//!   updates without affecting any other reader.
//! - **[`Changes`]**: the completion signal of one snapshot, for readers that
//!   need to multiplex or bound their waits.
//!
//! # Architecture
//!
//! Updates form a write-once singly linked chain of `Arc`'d nodes. The
//! property owns the tail; each stream owns a reference to the node it is
//! currently on. A node's successor link is set exactly once, and every
//! thread waiting on that node is woken after the link is visible. Nodes no
//! stream can reach any more are freed by reference counting.
//!
//! ```
//! use ftui_observer::Property;
//!
//! let prop = Property::new(0);
//! let mut stream = prop.observe();
//! assert_eq!(*stream.value(), 0);
//!
//! prop.set(1);
//! assert_eq!(*stream.wait_next(), 1);
//!
//! let mut other = stream.clone();
//! prop.set(2);
//! assert_eq!(*stream.wait_next(), 2);
//! assert_eq!(*other.wait_next(), 2);
//! ```
//!
//! # Invariants
//!
//! 1. A stream sees every update published after its position, in
//!    publication order, and never the same update twice.
//! 2. Advancing one stream never moves another, including its clones.
//! 3. A snapshot's value never changes after it is published.
//! 4. [`Stream::has_next`] is `true` exactly when [`Stream::wait`] would
//!    return without blocking.

mod error;
pub mod property;
pub mod signal;
mod state;
pub mod stream;

pub use property::Property;
pub use signal::Changes;
pub use stream::{Stream, Values};
