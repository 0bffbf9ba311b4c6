//! Replay of host events that reached pre-rendered content before it
//! hydrated.
//!
//! The queue is host-agnostic: it talks to the runtime through
//! [`ReplayDriver`] and only needs node handles that compare by identity.

pub mod config;
pub mod flags;
/// Event names and their replay classes.
pub mod kind;
pub mod queue;

pub use config::ReplayConfig;
pub use flags::EventSystemFlags;
pub use kind::{ContinuousSlot, EventKind, ReplayClass};
pub use queue::{EventReplayQueue, NativeEvent, QueuedEvent, ReplayDriver};
