//! Lane bitsets.
//!
//! A lane is one bit of a 31-bit priority set. Lower bit positions are more
//! urgent, so the most urgent lane of any set is its lowest set bit. Sets of
//! lanes are used everywhere a "which priorities does this work belong to"
//! question is asked: pending updates on a root, the lanes a render attempt is
//! processing, the lanes still owed by a subtree.

use std::fmt;

bitflags::bitflags! {
	/// A set of lanes. A single-bit value doubles as a [`Lane`].
	#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
	pub struct Lanes: u32 {
		const SYNC_HYDRATION = 1 << 0;
		const SYNC = 1 << 1;
		const INPUT_CONTINUOUS_HYDRATION = 1 << 2;
		const INPUT_CONTINUOUS = 1 << 3;
		const DEFAULT_HYDRATION = 1 << 4;
		const DEFAULT = 1 << 5;
		const TRANSITION_HYDRATION = 1 << 6;
		/// Fifteen lanes handed out round-robin to transitions.
		const TRANSITIONS = 0x003F_FF80;
		/// Five lanes handed out round-robin to suspense retries.
		const RETRIES = 0x07C0_0000;
		const SELECTIVE_HYDRATION = 1 << 27;
		const IDLE_HYDRATION = 1 << 28;
		const IDLE = 1 << 29;
		const OFFSCREEN = 1 << 30;
	}
}

/// One lane. Always holds at most a single bit.
pub type Lane = Lanes;

/// Number of lane bits.
pub const TOTAL_LANES: usize = 31;

const FIRST_TRANSITION_LANE: u32 = 1 << 7;
const FIRST_RETRY_LANE: u32 = 1 << 22;

impl Lanes {
	pub const NONE: Self = Self::empty();

	/// Sync plus its hydration lane.
	pub const SYNC_LANES: Self = Self::SYNC_HYDRATION.union(Self::SYNC);

	/// Lanes that always render to completion without yielding.
	pub const BLOCKING: Self = Self::SYNC_LANES
		.union(Self::INPUT_CONTINUOUS_HYDRATION)
		.union(Self::INPUT_CONTINUOUS)
		.union(Self::DEFAULT_HYDRATION)
		.union(Self::DEFAULT);

	/// Everything more urgent than idle work.
	pub const NON_IDLE: Self = Self::from_bits_retain(0x0FFF_FFFF);

	/// The lane at bit `index`.
	pub const fn at(index: usize) -> Lane {
		Self::from_bits_retain(1 << index)
	}

	/// The most urgent lane in this set (its lowest set bit), or [`Lanes::NONE`].
	pub const fn highest_priority_lane(self) -> Lane {
		Self::from_bits_retain(self.bits() & self.bits().wrapping_neg())
	}

	/// The most urgent lane group in this set.
	///
	/// Transition and retry lanes are returned as a whole group so that every
	/// pending transition (or retry) renders together.
	pub fn highest_priority_lanes(self) -> Lanes {
		let lane = self.highest_priority_lane();
		if Self::TRANSITIONS.contains(lane) && !lane.is_empty() {
			self & Self::TRANSITIONS
		} else if Self::RETRIES.contains(lane) && !lane.is_empty() {
			self & Self::RETRIES
		} else {
			lane
		}
	}

	/// Whether this lane is strictly more urgent than `other`.
	///
	/// Comparisons against an empty lane are always false, in either
	/// direction.
	pub const fn is_higher_priority_than(self, other: Lane) -> bool {
		!self.is_empty() && self.bits() < other.bits()
	}

	pub const fn merge(self, other: Lanes) -> Lanes {
		self.union(other)
	}

	pub const fn includes_some(self, other: Lanes) -> bool {
		self.intersects(other)
	}

	pub const fn is_subset_of(self, superset: Lanes) -> bool {
		superset.contains(self)
	}

	pub const fn without(self, subset: Lanes) -> Lanes {
		self.difference(subset)
	}

	pub const fn includes_sync_lane(self) -> bool {
		self.intersects(Self::SYNC_LANES)
	}

	pub const fn includes_blocking_lane(self) -> bool {
		self.intersects(Self::BLOCKING)
	}

	pub const fn includes_non_idle_work(self) -> bool {
		self.intersects(Self::NON_IDLE)
	}

	pub const fn includes_only_retries(self) -> bool {
		!self.is_empty() && Self::RETRIES.contains(self)
	}

	pub const fn includes_only_transitions(self) -> bool {
		!self.is_empty() && Self::TRANSITIONS.contains(self)
	}

	pub const fn is_transition_lane(self) -> bool {
		self.intersects(Self::TRANSITIONS)
	}

	/// Bit index of the least urgent lane in the set.
	pub const fn index(self) -> usize {
		debug_assert!(!self.is_empty());
		let zeros = self.bits().leading_zeros();
		if zeros >= 32 { 0 } else { (31 - zeros) as usize }
	}

	/// Iterates the individual lanes of the set, most urgent first.
	pub fn lanes(self) -> LaneIter {
		LaneIter { remaining: self.bits() }
	}

	/// The lane used to hydrate a dehydrated subtree ahead of an update in
	/// `self`, or [`Lanes::NONE`] when no hydration lane applies.
	pub fn hydration_lane(self) -> Lane {
		let lane = self.highest_priority_lane();
		if lane == Self::SYNC {
			Self::SYNC_HYDRATION
		} else if lane == Self::INPUT_CONTINUOUS {
			Self::INPUT_CONTINUOUS_HYDRATION
		} else if lane == Self::DEFAULT {
			Self::DEFAULT_HYDRATION
		} else if lane.intersects(Self::TRANSITIONS.union(Self::RETRIES)) {
			Self::TRANSITION_HYDRATION
		} else if lane == Self::IDLE {
			Self::IDLE_HYDRATION
		} else {
			Self::NONE
		}
	}

	/// Short label of the most urgent lane, used in trace output.
	pub fn label(self) -> &'static str {
		const NAMED: [(Lanes, &str); 10] = [
			(Lanes::SYNC_HYDRATION, "SyncHydration"),
			(Lanes::SYNC, "Sync"),
			(Lanes::INPUT_CONTINUOUS_HYDRATION, "InputContinuousHydration"),
			(Lanes::INPUT_CONTINUOUS, "InputContinuous"),
			(Lanes::DEFAULT_HYDRATION, "DefaultHydration"),
			(Lanes::DEFAULT, "Default"),
			(Lanes::TRANSITION_HYDRATION, "TransitionHydration"),
			(Lanes::SELECTIVE_HYDRATION, "SelectiveHydration"),
			(Lanes::IDLE_HYDRATION, "IdleHydration"),
			(Lanes::IDLE, "Idle"),
		];
		let lane = self.highest_priority_lane();
		if lane.is_empty() {
			return "None";
		}
		if let Some((_, name)) = NAMED.iter().find(|(named, _)| *named == lane) {
			return name;
		}
		if lane.intersects(Self::TRANSITIONS) {
			"Transition"
		} else if lane.intersects(Self::RETRIES) {
			"Retry"
		} else {
			"Offscreen"
		}
	}
}

impl fmt::Debug for Lanes {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Lanes({:#033b})", self.bits())
	}
}

/// Returns whichever of `a` and `b` is more urgent.
pub const fn higher_priority_lane(a: Lane, b: Lane) -> Lane {
	if a.is_higher_priority_than(b) { a } else { b }
}

/// Iterator over the single lanes of a set.
#[derive(Debug, Clone)]
pub struct LaneIter {
	remaining: u32,
}

impl Iterator for LaneIter {
	type Item = Lane;

	fn next(&mut self) -> Option<Lane> {
		if self.remaining == 0 {
			return None;
		}
		let lane = self.remaining & self.remaining.wrapping_neg();
		self.remaining &= !lane;
		Some(Lanes::from_bits_retain(lane))
	}
}

/// Rotating cursors for the transition and retry lane groups.
///
/// Consecutive claims hand out different lanes so unrelated transitions can
/// finish independently; the cursor wraps once the group is exhausted.
#[derive(Debug, Clone)]
pub struct LaneClaims {
	next_transition: u32,
	next_retry: u32,
}

impl Default for LaneClaims {
	fn default() -> Self {
		Self {
			next_transition: FIRST_TRANSITION_LANE,
			next_retry: FIRST_RETRY_LANE,
		}
	}
}

impl LaneClaims {
	pub fn claim_transition_lane(&mut self) -> Lane {
		let lane = self.next_transition;
		self.next_transition <<= 1;
		if self.next_transition & Lanes::TRANSITIONS.bits() == 0 {
			self.next_transition = FIRST_TRANSITION_LANE;
		}
		Lanes::from_bits_retain(lane)
	}

	pub fn claim_retry_lane(&mut self) -> Lane {
		let lane = self.next_retry;
		self.next_retry <<= 1;
		if self.next_retry & Lanes::RETRIES.bits() == 0 {
			self.next_retry = FIRST_RETRY_LANE;
		}
		Lanes::from_bits_retain(lane)
	}
}

#[cfg(test)]
mod tests;
