//! Core scheduling types: lanes, priorities, ids, and the contextual value
//! stack used while walking the work tree.

/// Stable identifiers for work units and roots.
pub mod ids;
/// Priority lane bitsets.
pub mod lane;
/// Event and scheduler priority levels.
pub mod priority;
/// Cursor save/restore stack.
pub mod stack;

pub use ids::{FiberId, RootId};
pub use lane::{Lane, LaneClaims, Lanes, higher_priority_lane};
pub use priority::{
	EventPriority, SchedulerPriority, higher_event_priority, lanes_to_event_priority,
	lower_event_priority,
};
pub use stack::{Cursor, StackError, ValueStack};
