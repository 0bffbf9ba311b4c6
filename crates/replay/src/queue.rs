//! Events that arrived while their target was still pre-rendered content.
//!
//! Discrete events wait in arrival order and replay strictly in that order:
//! the head blocks everything behind it. Continuous events keep only their
//! latest occurrence per family (per pointer id for pointer events). When
//! the host reports that a blocker hydrated, matching entries are marked
//! unblocked and one replay pass is requested.

use std::collections::VecDeque;

use indexmap::IndexMap;
use trellis_primitives::EventPriority;

use crate::config::ReplayConfig;
use crate::flags::EventSystemFlags;
use crate::kind::{ContinuousSlot, EventKind, ReplayClass};

/// A native event as the queue sees it.
pub trait NativeEvent {
	/// Identity of the occurrence. Listeners registered in different
	/// phases that see the same occurrence report the same id.
	fn id(&self) -> u64;

	fn pointer_id(&self) -> Option<i32> {
		None
	}
}

/// What the queue needs from the runtime it replays into.
pub trait ReplayDriver<N, E> {
	/// What still blocks `event` from being dispatched into `container`.
	fn find_blocking_instance(&mut self, kind: EventKind, flags: EventSystemFlags, container: &N, event: &E)
	-> Option<N>;

	fn dispatch(&mut self, kind: EventKind, flags: EventSystemFlags, event: &E, container: &N);

	/// Blocker of an arbitrary target node, for explicit hydration targets.
	fn blocking_instance_of(&mut self, target: &N) -> Option<N>;

	/// Hydrates `blocked` before returning.
	fn attempt_synchronous_hydration(&mut self, blocked: &N);

	/// Raises the priority `blocked` hydrates at.
	fn attempt_hydration_at_priority(&mut self, blocked: &N, priority: EventPriority);

	/// Blockers that finished hydrating since the last call.
	fn take_unblocked(&mut self) -> Vec<N>;

	/// Asks for [`EventReplayQueue::replay_unblocked_events`] to be called
	/// later at normal priority.
	fn schedule_replay(&mut self);
}

/// One blocked event.
#[derive(Debug, Clone)]
pub struct QueuedEvent<N, E> {
	pub blocked_on: Option<N>,
	pub kind: EventKind,
	pub flags: EventSystemFlags,
	pub event: E,
	/// Containers still to dispatch into, in order.
	pub target_containers: Vec<N>,
}

impl<N, E> QueuedEvent<N, E> {
	fn new(blocked_on: Option<N>, kind: EventKind, flags: EventSystemFlags, container: N, event: E) -> Self {
		Self {
			blocked_on,
			kind,
			flags,
			event,
			target_containers: vec![container],
		}
	}
}

/// A node the application asked to hydrate ahead of others.
#[derive(Debug, Clone)]
struct QueuedTarget<N> {
	blocked_on: Option<N>,
	target: N,
	priority: EventPriority,
}

pub struct EventReplayQueue<N, E> {
	config: ReplayConfig,
	discrete: VecDeque<QueuedEvent<N, E>>,
	focus: Option<QueuedEvent<N, E>>,
	drag: Option<QueuedEvent<N, E>>,
	mouse: Option<QueuedEvent<N, E>>,
	pointers: IndexMap<i32, QueuedEvent<N, E>>,
	pointer_captures: IndexMap<i32, QueuedEvent<N, E>>,
	explicit_targets: Vec<QueuedTarget<N>>,
	has_scheduled_replay: bool,
	/// Id of the event being re-dispatched right now.
	replaying: Option<u64>,
}

impl<N, E> EventReplayQueue<N, E>
where
	N: Clone + PartialEq + std::fmt::Debug,
	E: NativeEvent,
{
	pub fn new(config: ReplayConfig) -> Self {
		Self {
			config,
			discrete: VecDeque::new(),
			focus: None,
			drag: None,
			mouse: None,
			pointers: IndexMap::new(),
			pointer_captures: IndexMap::new(),
			explicit_targets: Vec::new(),
			has_scheduled_replay: false,
			replaying: None,
		}
	}

	pub fn config(&self) -> &ReplayConfig {
		&self.config
	}

	pub fn has_queued_discrete_events(&self) -> bool {
		!self.discrete.is_empty()
	}

	pub fn queued_discrete_events(&self) -> impl Iterator<Item = &QueuedEvent<N, E>> {
		self.discrete.iter()
	}

	pub fn has_queued_continuous_events(&self) -> bool {
		self.focus.is_some()
			|| self.drag.is_some()
			|| self.mouse.is_some()
			|| !self.pointers.is_empty()
			|| !self.pointer_captures.is_empty()
	}

	/// Latest blocked event of a continuous family. Pointer families need
	/// the pointer id.
	pub fn queued_continuous_event(&self, slot: ContinuousSlot, pointer_id: Option<i32>) -> Option<&QueuedEvent<N, E>> {
		match slot {
			ContinuousSlot::Focus => self.focus.as_ref(),
			ContinuousSlot::Drag => self.drag.as_ref(),
			ContinuousSlot::Mouse => self.mouse.as_ref(),
			ContinuousSlot::Pointer => self.pointers.get(&pointer_id?),
			ContinuousSlot::PointerCapture => self.pointer_captures.get(&pointer_id?),
		}
	}

	pub fn explicit_target_count(&self) -> usize {
		self.explicit_targets.len()
	}

	pub fn has_scheduled_replay(&self) -> bool {
		self.has_scheduled_replay
	}

	/// Id of the event being re-dispatched, while a replay is dispatching.
	pub fn replaying_event(&self) -> Option<u64> {
		self.replaying
	}

	pub fn is_replaying(&self, event: &E) -> bool {
		self.replaying == Some(event.id())
	}

	/// Queues a blocked discrete event. Returns false when the event was
	/// dropped: discrete replay is off or `kind` is not replayable.
	///
	/// The first discrete event queued tries to hydrate its blocker right
	/// away so it can still be handled before the host's default action.
	pub fn queue_discrete_event(
		&mut self,
		driver: &mut impl ReplayDriver<N, E>,
		blocked_on: N,
		kind: EventKind,
		flags: EventSystemFlags,
		container: N,
		event: E,
	) -> bool {
		if !self.config.discrete || !kind.is_discrete_replayable() {
			tracing::trace!(kind = kind.as_str(), "replay.discrete_dropped");
			return false;
		}
		tracing::debug!(kind = kind.as_str(), blocked_on = ?blocked_on, "replay.queue_discrete");
		self.discrete
			.push_back(QueuedEvent::new(Some(blocked_on.clone()), kind, flags, container, event));
		if self.discrete.len() != 1 {
			return true;
		}
		driver.attempt_synchronous_hydration(&blocked_on);
		self.absorb_unblocked(driver);
		if self.discrete.front().is_some_and(|e| e.blocked_on.is_none()) {
			self.replay_unblocked_events(driver);
		}
		true
	}

	/// Empties the continuous slot `kind` belongs to.
	pub fn clear_if_continuous_event(&mut self, kind: EventKind, event: &E) {
		match kind.cleared_slot() {
			Some(ContinuousSlot::Focus) => self.focus = None,
			Some(ContinuousSlot::Drag) => self.drag = None,
			Some(ContinuousSlot::Mouse) => self.mouse = None,
			Some(ContinuousSlot::Pointer) => {
				if let Some(id) = event.pointer_id() {
					self.pointers.shift_remove(&id);
				}
			}
			Some(ContinuousSlot::PointerCapture) => {
				if let Some(id) = event.pointer_id() {
					self.pointer_captures.shift_remove(&id);
				}
			}
			None => {}
		}
	}

	/// Keeps `event` as the latest of its continuous family. Returns false
	/// when `kind` is not a continuous replayable event.
	pub fn queue_if_continuous_event(
		&mut self,
		driver: &mut impl ReplayDriver<N, E>,
		blocked_on: Option<N>,
		kind: EventKind,
		flags: EventSystemFlags,
		container: N,
		event: E,
	) -> bool {
		if !self.config.continuous {
			return false;
		}
		let ReplayClass::Continuous(slot) = kind.replay_class() else {
			return false;
		};
		let existing = match slot {
			ContinuousSlot::Focus => self.focus.take(),
			ContinuousSlot::Drag => self.drag.take(),
			ContinuousSlot::Mouse => self.mouse.take(),
			ContinuousSlot::Pointer | ContinuousSlot::PointerCapture => {
				let Some(id) = event.pointer_id() else {
					return false;
				};
				let map = match slot {
					ContinuousSlot::Pointer => &mut self.pointers,
					_ => &mut self.pointer_captures,
				};
				map.shift_remove(&id)
			}
		};
		let pointer_id = event.pointer_id();
		let queued = accumulate_or_create(driver, existing, blocked_on, kind, flags, container, event);
		tracing::trace!(kind = kind.as_str(), "replay.queue_continuous");
		match slot {
			ContinuousSlot::Focus => self.focus = Some(queued),
			ContinuousSlot::Drag => self.drag = Some(queued),
			ContinuousSlot::Mouse => self.mouse = Some(queued),
			ContinuousSlot::Pointer => {
				if let Some(id) = pointer_id {
					self.pointers.insert(id, queued);
				}
			}
			ContinuousSlot::PointerCapture => {
				if let Some(id) = pointer_id {
					self.pointer_captures.insert(id, queued);
				}
			}
		}
		true
	}

	/// Asks for `target` to be hydrated ahead of lower-priority targets.
	pub fn queue_explicit_hydration_target(
		&mut self,
		driver: &mut impl ReplayDriver<N, E>,
		target: N,
		priority: EventPriority,
	) {
		let index = self
			.explicit_targets
			.iter()
			.position(|queued| priority.is_higher_than(queued.priority))
			.unwrap_or(self.explicit_targets.len());
		self.explicit_targets.insert(
			index,
			QueuedTarget {
				blocked_on: None,
				target,
				priority,
			},
		);
		if index == 0 {
			self.attempt_explicit_hydration_target(driver, 0);
		}
	}

	/// Probes an explicit target. Leaves it blocked on whatever still keeps
	/// it from hydrating, raising that blocker's priority.
	fn attempt_explicit_hydration_target(&mut self, driver: &mut impl ReplayDriver<N, E>, index: usize) {
		let Some(queued) = self.explicit_targets.get(index) else {
			return;
		};
		let target = queued.target.clone();
		let priority = queued.priority;
		let blocked_on = driver.blocking_instance_of(&target);
		if let Some(blocked) = &blocked_on {
			driver.attempt_hydration_at_priority(blocked, priority);
		}
		if let Some(queued) = self.explicit_targets.get_mut(index) {
			queued.blocked_on = blocked_on;
		}
	}

	/// Feeds the driver's newly hydrated blockers into the queue.
	pub fn absorb_unblocked(&mut self, driver: &mut impl ReplayDriver<N, E>) {
		for unblocked in driver.take_unblocked() {
			self.retry_if_blocked_on(driver, &unblocked);
		}
	}

	/// Marks everything blocked on `unblocked` as ready and requests a replay
	/// pass if one is not already pending.
	pub fn retry_if_blocked_on(&mut self, driver: &mut impl ReplayDriver<N, E>, unblocked: &N) {
		tracing::debug!(?unblocked, "replay.unblocked");
		let mut schedule = false;
		let mut unblock = |queued: &mut QueuedEvent<N, E>| {
			if queued.blocked_on.as_ref() == Some(unblocked) {
				queued.blocked_on = None;
				schedule = true;
			}
		};
		if let Some(head) = self.discrete.front_mut() {
			unblock(head);
		}
		for queued in self.discrete.iter_mut().skip(1) {
			if queued.blocked_on.as_ref() == Some(unblocked) {
				queued.blocked_on = None;
			}
		}
		for slot in [&mut self.focus, &mut self.drag, &mut self.mouse] {
			if let Some(queued) = slot.as_mut() {
				unblock(queued);
			}
		}
		for queued in self.pointers.values_mut().chain(self.pointer_captures.values_mut()) {
			unblock(queued);
		}
		if schedule && !self.has_scheduled_replay {
			self.has_scheduled_replay = true;
			driver.schedule_replay();
		}

		for queued in &mut self.explicit_targets {
			if queued.blocked_on.as_ref() == Some(unblocked) {
				queued.blocked_on = None;
			}
		}
		while self.explicit_targets.first().is_some_and(|t| t.blocked_on.is_none()) {
			self.attempt_explicit_hydration_target(driver, 0);
			if self.explicit_targets[0].blocked_on.is_some() {
				break;
			}
			self.explicit_targets.remove(0);
		}
	}

	/// Replays every event whose blocker has hydrated, discrete ones first
	/// and in order. An event found blocked again on another blocker stays
	/// queued on it and that blocker's hydration is raised.
	pub fn replay_unblocked_events(&mut self, driver: &mut impl ReplayDriver<N, E>) {
		self.has_scheduled_replay = false;
		while let Some(head) = self.discrete.front_mut() {
			if let Some(blocked) = &head.blocked_on {
				driver.attempt_hydration_at_priority(blocked, EventPriority::DISCRETE);
				break;
			}
			let replayed = replay_containers(driver, head, &mut self.replaying);
			if !replayed {
				break;
			}
			self.discrete.pop_front();
		}

		for slot in [&mut self.focus, &mut self.drag, &mut self.mouse] {
			if let Some(queued) = slot.as_mut()
				&& replay_continuous(driver, queued, &mut self.replaying)
			{
				*slot = None;
			}
		}
		let replaying = &mut self.replaying;
		self.pointers
			.retain(|_, queued| !replay_continuous(driver, queued, replaying));
		self.pointer_captures
			.retain(|_, queued| !replay_continuous(driver, queued, replaying));
	}
}

fn accumulate_or_create<N, E>(
	driver: &mut impl ReplayDriver<N, E>,
	existing: Option<QueuedEvent<N, E>>,
	blocked_on: Option<N>,
	kind: EventKind,
	flags: EventSystemFlags,
	container: N,
	event: E,
) -> QueuedEvent<N, E>
where
	N: Clone + PartialEq,
	E: NativeEvent,
{
	match existing {
		Some(mut queued) if queued.event.id() == event.id() => {
			queued.flags |= flags;
			if !queued.target_containers.contains(&container) {
				queued.target_containers.push(container);
			}
			queued
		}
		_ => {
			if let Some(blocked) = &blocked_on {
				driver.attempt_hydration_at_priority(blocked, EventPriority::CONTINUOUS);
			}
			QueuedEvent::new(blocked_on, kind, flags, container, event)
		}
	}
}

/// Dispatches `queued` into each remaining container. Returns false, with
/// the event blocked again, if a container turns out to be blocked.
fn replay_containers<N, E>(
	driver: &mut impl ReplayDriver<N, E>,
	queued: &mut QueuedEvent<N, E>,
	replaying: &mut Option<u64>,
) -> bool
where
	N: Clone + std::fmt::Debug,
	E: NativeEvent,
{
	while let Some(container) = queued.target_containers.first().cloned() {
		match driver.find_blocking_instance(queued.kind, queued.flags, &container, &queued.event) {
			None => {
				tracing::debug!(kind = queued.kind.as_str(), event = queued.event.id(), "replay.dispatch");
				*replaying = Some(queued.event.id());
				driver.dispatch(
					queued.kind,
					queued.flags | EventSystemFlags::IS_REPLAYED,
					&queued.event,
					&container,
				);
				*replaying = None;
				queued.target_containers.remove(0);
			}
			Some(blocked) => {
				tracing::debug!(kind = queued.kind.as_str(), blocked_on = ?blocked, "replay.reblocked");
				queued.blocked_on = Some(blocked);
				return false;
			}
		}
	}
	true
}

fn replay_continuous<N, E>(
	driver: &mut impl ReplayDriver<N, E>,
	queued: &mut QueuedEvent<N, E>,
	replaying: &mut Option<u64>,
) -> bool
where
	N: Clone + std::fmt::Debug,
	E: NativeEvent,
{
	if queued.blocked_on.is_some() {
		return false;
	}
	if replay_containers(driver, queued, replaying) {
		return true;
	}
	if let Some(blocked) = &queued.blocked_on {
		driver.attempt_hydration_at_priority(blocked, EventPriority::CONTINUOUS);
	}
	false
}
