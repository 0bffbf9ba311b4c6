//! Per-root lane bookkeeping.
//!
//! A root tracks which lanes have pending work, which of those are waiting
//! on an async dependency (suspended) and which of the suspended ones have
//! since been pinged. Choosing what to render next is a pure function of
//! that state; see [`FiberRoot::next_lanes`].

use std::rc::Rc;

use trellis_primitives::lane::TOTAL_LANES;
use trellis_primitives::{FiberId, Lane, Lanes};

use crate::cache::Cache;
use crate::element::Element;
use crate::fiber::FiberMode;
use crate::scheduler::TaskHandle;

/// A queued replacement of the root element.
#[derive(Debug, Clone)]
pub(crate) struct Update {
	pub lane: Lane,
	pub element: Element,
}

/// Where a root is in its render cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootPhase {
	Idle,
	Rendering,
	/// The last attempt suspended without a boundary and waits for a ping.
	Suspended,
	Committing,
}

impl RootPhase {
	pub fn as_str(self) -> &'static str {
		match self {
			RootPhase::Idle => "idle",
			RootPhase::Rendering => "rendering",
			RootPhase::Suspended => "suspended",
			RootPhase::Committing => "committing",
		}
	}
}

/// One mounted container and the lanes scheduled on it.
#[derive(Debug)]
pub(crate) struct FiberRoot<N> {
	pub container: N,
	/// The committed root unit.
	pub current: FiberId,
	pub mode: FiberMode,
	pub phase: RootPhase,
	pub pending_lanes: Lanes,
	pub suspended_lanes: Lanes,
	pub pinged_lanes: Lanes,
	pub entangled_lanes: Lanes,
	pub entanglements: [Lanes; TOTAL_LANES],
	/// Scheduled task and the lane it was scheduled for.
	pub callback_node: Option<TaskHandle>,
	pub callback_priority: Lane,
	pub updates: Vec<Update>,
	/// Cache handed to fresh cache boundaries of the lanes being rendered.
	pub pooled_cache: Option<Rc<Cache>>,
	pub pooled_cache_lanes: Lanes,
	/// Lanes of the most recent commit.
	pub finished_lanes: Lanes,
}

impl<N> FiberRoot<N> {
	pub fn new(container: N, current: FiberId, mode: FiberMode) -> Self {
		Self {
			container,
			current,
			mode,
			phase: RootPhase::Idle,
			pending_lanes: Lanes::NONE,
			suspended_lanes: Lanes::NONE,
			pinged_lanes: Lanes::NONE,
			entangled_lanes: Lanes::NONE,
			entanglements: [Lanes::NONE; TOTAL_LANES],
			callback_node: None,
			callback_priority: Lanes::NONE,
			updates: Vec::new(),
			pooled_cache: None,
			pooled_cache_lanes: Lanes::NONE,
			finished_lanes: Lanes::NONE,
		}
	}

	pub fn is_concurrent(&self) -> bool {
		self.mode.contains(FiberMode::CONCURRENT)
	}

	/// Lanes to render next.
	///
	/// Unsuspended work wins over pinged work, and non-idle over idle. While
	/// `wip_lanes` are being rendered they are kept unless the candidate is
	/// strictly more urgent. Entangled lanes are always rendered together.
	pub fn next_lanes(&self, wip_lanes: Lanes) -> Lanes {
		let pending = self.pending_lanes;
		if pending.is_empty() {
			return Lanes::NONE;
		}

		let suspended = self.suspended_lanes;
		let pinged = self.pinged_lanes;
		let non_idle = pending & Lanes::NON_IDLE;
		let pick = |lanes: Lanes| {
			let unblocked = lanes.without(suspended);
			if !unblocked.is_empty() {
				unblocked.highest_priority_lanes()
			} else {
				(lanes & pinged).highest_priority_lanes()
			}
		};
		let mut next = if non_idle.is_empty() { pick(pending) } else { pick(non_idle) };
		if next.is_empty() {
			return Lanes::NONE;
		}

		if !wip_lanes.is_empty() && wip_lanes != next && !wip_lanes.includes_some(suspended) {
			let next_lane = next.highest_priority_lane();
			let wip_lane = wip_lanes.highest_priority_lane();
			if next_lane.bits() >= wip_lane.bits()
				|| (next_lane == Lanes::DEFAULT && wip_lane.includes_some(Lanes::TRANSITIONS))
			{
				return wip_lanes;
			}
		}

		let entangled = self.entangled_lanes & next;
		for lane in entangled.lanes() {
			next |= self.entanglements[lane.index()];
		}
		next
	}

	/// Most urgent group of pending lanes, ignoring suspension.
	pub fn highest_pending_lanes(&self) -> Lanes {
		self.pending_lanes.highest_priority_lanes()
	}

	pub fn mark_updated(&mut self, lane: Lane) {
		self.pending_lanes |= lane;
		if lane != Lanes::IDLE {
			self.suspended_lanes = Lanes::NONE;
			self.pinged_lanes = Lanes::NONE;
		}
	}

	pub fn mark_suspended(&mut self, lanes: Lanes) {
		self.suspended_lanes |= lanes;
		self.pinged_lanes = self.pinged_lanes.without(lanes);
	}

	pub fn mark_pinged(&mut self, lanes: Lanes) {
		self.pinged_lanes |= self.suspended_lanes & lanes;
	}

	/// Retires every lane not in `remaining`.
	pub fn mark_finished(&mut self, remaining: Lanes) {
		let retired = self.pending_lanes.without(remaining);
		self.pending_lanes = remaining;
		self.suspended_lanes = Lanes::NONE;
		self.pinged_lanes = Lanes::NONE;
		self.entangled_lanes &= remaining;
		for lane in retired.lanes() {
			self.entanglements[lane.index()] = Lanes::NONE;
		}
	}

	/// Makes `lanes` render together from now on, along with everything
	/// already entangled with any of them.
	pub fn entangle(&mut self, lanes: Lanes) {
		self.entangled_lanes |= lanes;
		let all = self.entangled_lanes;
		for lane in all.lanes() {
			let slot = &mut self.entanglements[lane.index()];
			if lane.includes_some(lanes) || slot.includes_some(lanes) {
				*slot |= lanes;
			}
		}
	}

	/// Drops the pooled cache once none of the lanes that created it are
	/// pending. Returns the cache to release.
	pub fn take_finished_pooled_cache(&mut self, remaining: Lanes) -> Option<Rc<Cache>> {
		self.pooled_cache_lanes &= remaining;
		if self.pooled_cache_lanes.is_empty() {
			self.pooled_cache.take()
		} else {
			None
		}
	}
}
