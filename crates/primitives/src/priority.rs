//! Event and scheduler priority levels.
//!
//! Event priorities are a coarse view over lanes used by input handling;
//! scheduler priorities are what the host task scheduler understands.

use crate::lane::{Lane, Lanes};

/// Priority of the input that caused an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventPriority(Lane);

impl EventPriority {
	/// Clicks, key presses, form submission.
	pub const DISCRETE: Self = Self(Lanes::SYNC);
	/// Hover, drag, pointer movement.
	pub const CONTINUOUS: Self = Self(Lanes::INPUT_CONTINUOUS);
	pub const DEFAULT: Self = Self(Lanes::DEFAULT);
	pub const IDLE: Self = Self(Lanes::IDLE);

	pub const fn lane(self) -> Lane {
		self.0
	}

	/// Whether `self` is strictly more urgent than `other`.
	pub const fn is_higher_than(self, other: EventPriority) -> bool {
		self.0.is_higher_priority_than(other.0)
	}

	pub const fn as_str(self) -> &'static str {
		if self.0.bits() == Lanes::SYNC.bits() {
			"discrete"
		} else if self.0.bits() == Lanes::INPUT_CONTINUOUS.bits() {
			"continuous"
		} else if self.0.bits() == Lanes::DEFAULT.bits() {
			"default"
		} else {
			"idle"
		}
	}
}

impl Default for EventPriority {
	fn default() -> Self {
		Self::DEFAULT
	}
}

pub const fn higher_event_priority(a: EventPriority, b: EventPriority) -> EventPriority {
	if a.is_higher_than(b) { a } else { b }
}

pub const fn lower_event_priority(a: EventPriority, b: EventPriority) -> EventPriority {
	if a.0.is_empty() || a.0.bits() > b.0.bits() { a } else { b }
}

/// Buckets a lane set into the event priority of its most urgent lane.
pub fn lanes_to_event_priority(lanes: Lanes) -> EventPriority {
	let lane = lanes.highest_priority_lane();
	if !EventPriority::DISCRETE.0.is_higher_priority_than(lane) {
		return EventPriority::DISCRETE;
	}
	if !EventPriority::CONTINUOUS.0.is_higher_priority_than(lane) {
		return EventPriority::CONTINUOUS;
	}
	if lane.includes_non_idle_work() {
		return EventPriority::DEFAULT;
	}
	EventPriority::IDLE
}

/// Priority classes understood by the host task scheduler, most urgent
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchedulerPriority {
	Immediate,
	UserBlocking,
	Normal,
	Low,
	Idle,
}

impl SchedulerPriority {
	pub const ALL: [SchedulerPriority; 5] = [
		SchedulerPriority::Immediate,
		SchedulerPriority::UserBlocking,
		SchedulerPriority::Normal,
		SchedulerPriority::Low,
		SchedulerPriority::Idle,
	];

	pub const fn as_str(self) -> &'static str {
		match self {
			SchedulerPriority::Immediate => "immediate",
			SchedulerPriority::UserBlocking => "user_blocking",
			SchedulerPriority::Normal => "normal",
			SchedulerPriority::Low => "low",
			SchedulerPriority::Idle => "idle",
		}
	}

	pub const fn index(self) -> usize {
		self as usize
	}
}

impl From<EventPriority> for SchedulerPriority {
	fn from(priority: EventPriority) -> Self {
		if priority == EventPriority::DISCRETE {
			SchedulerPriority::Immediate
		} else if priority == EventPriority::CONTINUOUS {
			SchedulerPriority::UserBlocking
		} else if priority == EventPriority::IDLE {
			SchedulerPriority::Idle
		} else {
			SchedulerPriority::Normal
		}
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case(Lanes::SYNC_HYDRATION | Lanes::DEFAULT, EventPriority::DISCRETE)]
	#[case(Lanes::SYNC, EventPriority::DISCRETE)]
	#[case(Lanes::INPUT_CONTINUOUS_HYDRATION, EventPriority::CONTINUOUS)]
	#[case(Lanes::INPUT_CONTINUOUS | Lanes::IDLE, EventPriority::CONTINUOUS)]
	#[case(Lanes::DEFAULT_HYDRATION, EventPriority::DEFAULT)]
	#[case(Lanes::at(10), EventPriority::DEFAULT)]
	#[case(Lanes::SELECTIVE_HYDRATION, EventPriority::DEFAULT)]
	#[case(Lanes::IDLE, EventPriority::IDLE)]
	#[case(Lanes::OFFSCREEN, EventPriority::IDLE)]
	fn buckets_lanes(#[case] lanes: Lanes, #[case] expected: EventPriority) {
		assert_eq!(lanes_to_event_priority(lanes), expected);
	}

	#[test]
	fn higher_and_lower() {
		let d = EventPriority::DISCRETE;
		let i = EventPriority::IDLE;
		assert_eq!(higher_event_priority(d, i), d);
		assert_eq!(higher_event_priority(i, d), d);
		assert_eq!(lower_event_priority(d, i), i);
		assert_eq!(lower_event_priority(i, d), i);
		assert!(d.is_higher_than(EventPriority::CONTINUOUS));
		assert!(!d.is_higher_than(d));
	}

	#[test]
	fn scheduler_mapping() {
		assert_eq!(SchedulerPriority::from(EventPriority::DISCRETE), SchedulerPriority::Immediate);
		assert_eq!(SchedulerPriority::from(EventPriority::CONTINUOUS), SchedulerPriority::UserBlocking);
		assert_eq!(SchedulerPriority::from(EventPriority::DEFAULT), SchedulerPriority::Normal);
		assert_eq!(SchedulerPriority::from(EventPriority::IDLE), SchedulerPriority::Idle);
		assert!(SchedulerPriority::Immediate < SchedulerPriority::Idle);
		assert_eq!(SchedulerPriority::Low.as_str(), "low");
	}
}
