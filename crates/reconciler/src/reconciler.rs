//! Roots, update scheduling, and the entry points an embedder drives.
//!
//! The reconciler owns the fiber arena and every mounted root. Updates are
//! tagged with a lane and recorded on their root; the root is then scheduled
//! on the [`Scheduler`], either through the shared sync queue (sync lanes) or
//! as its own task. The embedder feeds tasks back through
//! [`Reconciler::run_task`], which renders, commits, and reschedules.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use slab::Slab;
use trellis_primitives::{
	EventPriority, FiberId, Lane, LaneClaims, Lanes, RootId, SchedulerPriority, lanes_to_event_priority,
};

use crate::cache::Cache;
use crate::config::ReconcilerConfig;
use crate::element::Element;
use crate::error::{ReconcileError, Result};
use crate::fiber::{Fiber, FiberArena, FiberKind, FiberMode, FiberState, RootState};
use crate::host::HostConfig;
use crate::root::{FiberRoot, RootPhase, Update};
use crate::scheduler::{Scheduler, Task, TaskHandle, TaskOutcome};
use crate::work_loop::{Ping, PingInbox, RenderAttempt, RootExit, Work};

mod commit;
mod events;

/// Drives rendering of one or more roots into a host.
pub struct Reconciler<H: HostConfig, S: Scheduler> {
	host: H,
	scheduler: S,
	config: ReconcilerConfig,
	fibers: FiberArena<H::Node>,
	roots: Slab<FiberRoot<H::Node>>,
	claims: LaneClaims,
	/// The render in flight, if any. At most one root renders at a time.
	attempt: Option<RenderAttempt<H::Node, H::Context>>,
	/// Roots with sync lanes pending, flushed in order.
	sync_queue: Vec<RootId>,
	sync_task: Option<TaskHandle>,
	flushing_sync: bool,
	pings: PingInbox,
	/// Priority of updates requested inside [`Reconciler::run_with_priority`].
	update_priority: Option<EventPriority>,
	in_transition: bool,
	/// Wakeables a committed boundary already listens to.
	retry_cache: FxHashSet<(FiberId, u64)>,
	/// Boundaries left dehydrated on a pending marker, by that marker.
	marker_retries: FxHashMap<H::Node, FiberId>,
}

impl<H: HostConfig, S: Scheduler> Reconciler<H, S> {
	pub fn new(host: H, scheduler: S, config: ReconcilerConfig) -> Self {
		Self {
			host,
			scheduler,
			config,
			fibers: FiberArena::default(),
			roots: Slab::new(),
			claims: LaneClaims::default(),
			attempt: None,
			sync_queue: Vec::new(),
			sync_task: None,
			flushing_sync: false,
			pings: PingInbox::default(),
			update_priority: None,
			in_transition: false,
			retry_cache: FxHashSet::default(),
			marker_retries: FxHashMap::default(),
		}
	}

	/// Mounts an empty concurrent root on `container`.
	pub fn create_root(&mut self, container: H::Node) -> RootId {
		self.mount_root(container, FiberMode::CONCURRENT, None)
	}

	/// Mounts an empty legacy root: every update is sync and hydration
	/// mismatches are patched rather than client rendered.
	pub fn create_legacy_root(&mut self, container: H::Node) -> RootId {
		self.mount_root(container, FiberMode::empty(), None)
	}

	/// Mounts a concurrent root over pre-rendered output in `container` and
	/// schedules its hydration against `element`.
	pub fn hydrate_root(&mut self, container: H::Node, element: Element) -> Result<RootId> {
		let root = self.mount_root(container, FiberMode::CONCURRENT, Some(element.clone()));
		self.update_container(root, element)?;
		Ok(root)
	}

	/// Legacy counterpart of [`Reconciler::hydrate_root`]. Hydration runs
	/// before this returns.
	pub fn hydrate_legacy_root(&mut self, container: H::Node, element: Element) -> Result<RootId> {
		let root = self.mount_root(container, FiberMode::empty(), Some(element.clone()));
		self.update_container(root, element)?;
		self.flush_sync_work();
		Ok(root)
	}

	fn mount_root(&mut self, container: H::Node, mode: FiberMode, hydrate: Option<Element>) -> RootId {
		let cache = Cache::new();
		cache.retain();
		let entry = self.roots.vacant_entry();
		let id = RootId::from_index(entry.key());
		let mut fiber = Fiber::new(FiberKind::HostRoot, Element::empty(), None, mode);
		fiber.memoized_props = Some(fiber.pending_props.clone());
		fiber.state = FiberState::Root(RootState {
			root: id,
			is_dehydrated: hydrate.is_some(),
			element: hydrate,
			cache,
		});
		let current = self.fibers.insert(fiber);
		entry.insert(FiberRoot::new(container.clone(), current, mode));
		self.host.precache_fiber(&container, current);
		tracing::debug!(root = ?id, concurrent = mode.contains(FiberMode::CONCURRENT), "root.create");
		id
	}

	/// Replaces the element rendered into `root`. Returns the lane the update
	/// was scheduled at.
	pub fn update_container(&mut self, root: RootId, element: Element) -> Result<Lane> {
		let lane = self.request_update_lane(root)?;
		self.root_mut(root)?.updates.push(Update { lane, element });
		self.schedule_update_on_root(root, lane)?;
		Ok(lane)
	}

	/// Lane an update requested right now should use.
	pub fn request_update_lane(&mut self, root: RootId) -> Result<Lane> {
		if !self.root_ref(root)?.is_concurrent() {
			return Ok(Lanes::SYNC);
		}
		if self.in_transition {
			return Ok(self.claims.claim_transition_lane());
		}
		if let Some(priority) = self.update_priority {
			return Ok(priority.lane());
		}
		Ok(self.host.current_event_priority().lane())
	}

	/// Runs `f` with updates it requests tagged at `priority`.
	pub fn run_with_priority<R>(&mut self, priority: EventPriority, f: impl FnOnce(&mut Self) -> R) -> R {
		let previous = self.update_priority.replace(priority);
		let result = f(self);
		self.update_priority = previous;
		result
	}

	/// Runs `f` with updates it requests placed in transition lanes.
	pub fn start_transition<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
		let previous = std::mem::replace(&mut self.in_transition, true);
		let result = f(self);
		self.in_transition = previous;
		result
	}

	/// Runs `f` at discrete priority and renders the resulting sync work
	/// before returning.
	pub fn flush_sync<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
		let previous = std::mem::replace(&mut self.in_transition, false);
		let result = self.run_with_priority(EventPriority::DISCRETE, f);
		self.in_transition = previous;
		self.flush_sync_work();
		result
	}

	/// Makes `lanes` of `root` render together from now on.
	pub fn entangle(&mut self, root: RootId, lanes: Lanes) -> Result<()> {
		self.root_mut(root)?.entangle(lanes);
		Ok(())
	}

	fn schedule_update_on_root(&mut self, root_id: RootId, lane: Lane) -> Result<()> {
		let root = self.roots.get_mut(root_id.index()).ok_or(ReconcileError::UnknownRoot(root_id))?;
		let current = root.current;
		root.mark_updated(lane);
		self.mark_fiber_lanes(current, lane);
		if let Some(at) = self.attempt.as_mut()
			&& at.root == root_id
			&& at.lanes.includes_some(lane)
		{
			tracing::debug!(root = ?root_id, lane = lane.label(), "work.restart_requested");
			at.restart = true;
		}
		tracing::trace!(root = ?root_id, lane = lane.label(), "root.update");
		self.ensure_root_is_scheduled(root_id);
		Ok(())
	}

	fn mark_fiber_lanes(&mut self, fiber: FiberId, lane: Lane) {
		let Some(node) = self.fibers.get_mut(fiber) else {
			return;
		};
		node.lanes |= lane;
		if let Some(alternate) = node.alternate
			&& let Some(alt) = self.fibers.get_mut(alternate)
		{
			alt.lanes |= lane;
		}
	}

	/// Schedules `lane` on `fiber` and records it in the child lanes of every
	/// ancestor. Returns the root the fiber belongs to.
	fn mark_update_lane_from_fiber_to_root(&mut self, fiber: FiberId, lane: Lane) -> Option<RootId> {
		self.mark_fiber_lanes(fiber, lane);
		let mut node = fiber;
		let mut parent = self.fibers.get(fiber)?.return_fiber;
		while let Some(id) = parent {
			let ancestor = self.fibers.get_mut(id)?;
			ancestor.child_lanes |= lane;
			let (alternate, next) = (ancestor.alternate, ancestor.return_fiber);
			if let Some(alternate) = alternate
				&& let Some(alt) = self.fibers.get_mut(alternate)
			{
				alt.child_lanes |= lane;
			}
			node = id;
			parent = next;
		}
		self.fibers.get(node)?.root_state().map(|state| state.root)
	}

	/// Makes sure `root` has exactly one pending callback matching the
	/// priority of its next lanes.
	fn ensure_root_is_scheduled(&mut self, root_id: RootId) {
		let wip_lanes = self.wip_lanes_for(root_id);
		let Some(root) = self.roots.get_mut(root_id.index()) else {
			return;
		};
		let next = root.next_lanes(wip_lanes);
		let existing = root.callback_priority;
		if next.is_empty() {
			if let Some(handle) = root.callback_node.take() {
				self.scheduler.cancel(handle);
			}
			root.callback_priority = Lanes::NONE;
			return;
		}

		let priority = next.highest_priority_lane();
		let sync = priority.includes_sync_lane();
		if existing == priority && (sync || root.callback_node.is_some()) {
			return;
		}
		if let Some(handle) = root.callback_node.take() {
			self.scheduler.cancel(handle);
		}
		root.callback_priority = priority;

		if sync {
			if !self.sync_queue.contains(&root_id) {
				self.sync_queue.push(root_id);
			}
			if self.sync_task.is_none() && !self.flushing_sync {
				self.sync_task = Some(self.scheduler.schedule(SchedulerPriority::Immediate, Task::FlushSyncCallbacks));
			}
			tracing::trace!(root = ?root_id, "work.schedule_sync");
			return;
		}
		let scheduler_priority = SchedulerPriority::from(lanes_to_event_priority(next));
		let handle = self
			.scheduler
			.schedule(scheduler_priority, Task::PerformConcurrentWork(root_id));
		root.callback_node = Some(handle);
		tracing::trace!(
			root = ?root_id,
			lanes = next.label(),
			priority = scheduler_priority.as_str(),
			"work.schedule_concurrent"
		);
	}

	fn wip_lanes_for(&self, root: RootId) -> Lanes {
		match &self.attempt {
			Some(at) if at.root == root => at.lanes,
			_ => Lanes::NONE,
		}
	}

	/// Runs one scheduled task. Settled wakeables are processed first.
	pub fn run_task(&mut self, task: Task) -> TaskOutcome {
		self.process_pings();
		match task {
			Task::PerformConcurrentWork(root) => self.perform_concurrent_work_on_root(root),
			Task::FlushSyncCallbacks => {
				self.sync_task = None;
				self.flush_sync_work();
				TaskOutcome::Done
			}
			Task::AbortCache(cache) => {
				cache.abort();
				TaskOutcome::Done
			}
			Task::Host(tag) => TaskOutcome::Host(tag),
		}
	}

	fn perform_concurrent_work_on_root(&mut self, root_id: RootId) -> TaskOutcome {
		let wip_lanes = self.wip_lanes_for(root_id);
		let Some(root) = self.roots.get(root_id.index()) else {
			return TaskOutcome::Done;
		};
		let original = root.callback_node;
		let lanes = root.next_lanes(wip_lanes);
		if lanes.is_empty() {
			self.ensure_root_is_scheduled(root_id);
			return TaskOutcome::Done;
		}
		let time_slice = self.config.time_slicing && root.is_concurrent() && !lanes.includes_blocking_lane();
		let yielded = self.perform_work_on_root(root_id, lanes, time_slice);
		self.ensure_root_is_scheduled(root_id);
		let same_callback = self
			.roots
			.get(root_id.index())
			.is_some_and(|root| original.is_some() && root.callback_node == original);
		if yielded && same_callback {
			return TaskOutcome::Continue(Task::PerformConcurrentWork(root_id));
		}
		TaskOutcome::Done
	}

	/// Renders every queued root's sync lanes to completion. Nested calls are
	/// ignored.
	pub fn flush_sync_work(&mut self) {
		if self.flushing_sync {
			return;
		}
		self.flushing_sync = true;
		if let Some(handle) = self.sync_task.take() {
			self.scheduler.cancel(handle);
		}
		loop {
			self.process_pings();
			let queue = std::mem::take(&mut self.sync_queue);
			if queue.is_empty() {
				break;
			}
			for root in queue {
				self.perform_sync_work_on_root(root);
			}
		}
		self.flushing_sync = false;
	}

	fn perform_sync_work_on_root(&mut self, root_id: RootId) {
		let wip_lanes = self.wip_lanes_for(root_id);
		let Some(root) = self.roots.get(root_id.index()) else {
			return;
		};
		let lanes = root.next_lanes(wip_lanes);
		if lanes.includes_sync_lane() {
			self.perform_work_on_root(root_id, lanes, false);
		}
		self.ensure_root_is_scheduled(root_id);
	}

	/// Renders `lanes` of `root_id`, resuming the in-flight attempt when it
	/// matches. Returns whether the render yielded before finishing.
	fn perform_work_on_root(&mut self, root_id: RootId, lanes: Lanes, time_slice: bool) -> bool {
		let resumable = matches!(&self.attempt, Some(at) if at.root == root_id && at.lanes == lanes && !at.restart);
		if !resumable && self.prepare_fresh_stack(root_id, lanes).is_err() {
			return false;
		}
		let (Some(root), Some(at)) = (self.roots.get_mut(root_id.index()), self.attempt.as_mut()) else {
			return false;
		};
		let scheduler = &mut self.scheduler;
		Work::new(&mut self.host, &mut self.fibers, &self.config, root, at, &self.pings)
			.run(|| time_slice && scheduler.should_yield());
		if !at.is_finished() {
			tracing::debug!(root = ?root_id, units = at.units, "work.yielded");
			return true;
		}
		if matches!(at.exit, RootExit::Completed)
			&& let Err(error) = at.stacks.check_empty(at.root_fiber)
		{
			at.exit = RootExit::Fatal(error);
		}
		if matches!(at.exit, RootExit::Fatal(_)) {
			let dropped = at.stacks.reset_after_fatal();
			if dropped > 0 {
				tracing::debug!(root = ?root_id, dropped, "work.stacks_reset");
			}
		}

		let Some(mut at) = self.attempt.take() else {
			return false;
		};
		match std::mem::replace(&mut at.exit, RootExit::InProgress) {
			RootExit::Completed => self.commit_root(root_id, at),
			RootExit::SuspendedAtRoot => {
				if let Some(root) = self.roots.get_mut(root_id.index()) {
					root.mark_suspended(lanes);
					root.phase = RootPhase::Suspended;
					root.callback_priority = Lanes::NONE;
					root.callback_node = None;
				}
			}
			RootExit::Fatal(error) => self.fail_root(root_id, lanes, error),
			RootExit::InProgress => self.attempt = Some(at),
		}
		false
	}

	/// Starts a new attempt at `lanes`, discarding whatever was in flight.
	fn prepare_fresh_stack(&mut self, root_id: RootId, lanes: Lanes) -> Result<()> {
		if let Some(old) = self.attempt.take() {
			tracing::debug!(root = ?old.root, lanes = old.lanes.label(), units = old.units, "work.discard");
			if let Some(root) = self.roots.get_mut(old.root.index())
				&& root.phase == RootPhase::Rendering
			{
				root.phase = RootPhase::Idle;
			}
		}
		let root = self.roots.get_mut(root_id.index()).ok_or(ReconcileError::UnknownRoot(root_id))?;
		root.phase = RootPhase::Rendering;
		let current = root.current;
		let props = self.fibers[current].pending_props.clone();
		let wip = self.fibers.create_work_in_progress(current, props);
		self.fibers[wip].return_fiber = None;
		self.attempt = Some(RenderAttempt::new(root_id, wip, lanes, self.config.validate_stack));
		tracing::debug!(root = ?root_id, lanes = lanes.label(), "work.prepare");
		Ok(())
	}

	/// Drops the updates of `lanes` after a fatal render and reports the
	/// error.
	fn fail_root(&mut self, root_id: RootId, lanes: Lanes, error: ReconcileError) {
		let Some(root) = self.roots.get_mut(root_id.index()) else {
			return;
		};
		tracing::error!(root = ?root_id, lanes = lanes.label(), %error, "root.fatal");
		root.updates.retain(|update| !update.lane.is_subset_of(lanes));
		let remaining = root.pending_lanes.without(lanes);
		root.mark_finished(remaining);
		root.phase = RootPhase::Idle;
		root.callback_priority = Lanes::NONE;
		root.callback_node = None;
		let container = root.container.clone();
		self.host.report_fatal_error(&container, &error);
	}

	/// Drains settled wakeables: root suspensions become pinged lanes and
	/// boundary retries get a retry lane. Returns how many were processed.
	pub fn process_pings(&mut self) -> usize {
		let mut processed = 0;
		loop {
			let ping = self.pings.borrow_mut().pop_front();
			let Some(ping) = ping else {
				break;
			};
			processed += 1;
			match ping {
				Ping::Root { root, lanes } => {
					let Some(fiber_root) = self.roots.get_mut(root.index()) else {
						continue;
					};
					tracing::debug!(?root, lanes = lanes.label(), "work.pinged");
					fiber_root.mark_pinged(lanes);
					if fiber_root.phase == RootPhase::Suspended {
						fiber_root.phase = RootPhase::Idle;
					}
					self.ensure_root_is_scheduled(root);
				}
				Ping::Retry { boundary, wakeable } => {
					if self.retry_cache.remove(&(boundary, wakeable)) {
						self.retry_boundary(boundary);
					}
				}
			}
		}
		processed
	}

	/// Schedules a retry lane on a boundary that showed a fallback or was
	/// left dehydrated.
	fn retry_boundary(&mut self, boundary: FiberId) {
		let Some(fiber) = self.fibers.get(boundary) else {
			return;
		};
		let lane = if fiber.mode.contains(FiberMode::CONCURRENT) {
			self.claims.claim_retry_lane()
		} else {
			Lanes::SYNC
		};
		let Some(root_id) = self.mark_update_lane_from_fiber_to_root(boundary, lane) else {
			return;
		};
		tracing::debug!(?boundary, lane = lane.label(), "work.retry");
		if let Some(root) = self.roots.get_mut(root_id.index()) {
			root.mark_updated(lane);
		}
		self.ensure_root_is_scheduled(root_id);
	}

	/// Retries a boundary left dehydrated on a pending marker, once the host
	/// reports the marker's content arrived.
	pub fn retry_dehydrated_boundary(&mut self, marker: &H::Node) -> bool {
		match self.marker_retries.remove(marker) {
			Some(boundary) => {
				self.retry_boundary(boundary);
				true
			}
			None => false,
		}
	}

	/// Frees units no root can reach any more.
	fn sweep(&mut self) {
		let live: Vec<FiberId> = self
			.roots
			.iter()
			.map(|(_, root)| root.current)
			.chain(self.attempt.as_ref().map(|at| at.root_fiber))
			.collect();
		let freed = self.fibers.sweep(live);
		if freed.is_empty() {
			return;
		}
		let freed: FxHashSet<FiberId> = freed.into_iter().collect();
		self.retry_cache.retain(|(boundary, _)| !freed.contains(boundary));
		self.marker_retries.retain(|_, boundary| !freed.contains(boundary));
		tracing::trace!(freed = freed.len(), live = self.fibers.len(), "fiber.sweep");
	}

	fn root_ref(&self, root: RootId) -> Result<&FiberRoot<H::Node>> {
		self.roots.get(root.index()).ok_or(ReconcileError::UnknownRoot(root))
	}

	fn root_mut(&mut self, root: RootId) -> Result<&mut FiberRoot<H::Node>> {
		self.roots.get_mut(root.index()).ok_or(ReconcileError::UnknownRoot(root))
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	pub fn host_mut(&mut self) -> &mut H {
		&mut self.host
	}

	pub fn scheduler(&self) -> &S {
		&self.scheduler
	}

	pub fn scheduler_mut(&mut self) -> &mut S {
		&mut self.scheduler
	}

	pub fn config(&self) -> &ReconcilerConfig {
		&self.config
	}

	pub fn fiber(&self, id: FiberId) -> Option<&Fiber<H::Node>> {
		self.fibers.get(id)
	}

	/// Units currently allocated, across both buffers of every root.
	pub fn fiber_count(&self) -> usize {
		self.fibers.len()
	}

	pub fn root_phase(&self, root: RootId) -> Option<RootPhase> {
		self.roots.get(root.index()).map(|r| r.phase)
	}

	pub fn pending_lanes(&self, root: RootId) -> Option<Lanes> {
		self.roots.get(root.index()).map(|r| r.pending_lanes)
	}

	pub fn suspended_lanes(&self, root: RootId) -> Option<Lanes> {
		self.roots.get(root.index()).map(|r| r.suspended_lanes)
	}

	/// Lanes rendered by the last commit on `root`.
	pub fn committed_lanes(&self, root: RootId) -> Option<Lanes> {
		self.roots.get(root.index()).map(|r| r.finished_lanes)
	}

	/// The committed root unit of `root`.
	pub fn root_fiber(&self, root: RootId) -> Option<FiberId> {
		self.roots.get(root.index()).map(|r| r.current)
	}

	pub fn container(&self, root: RootId) -> Option<&H::Node> {
		self.roots.get(root.index()).map(|r| &r.container)
	}

	/// The cache the committed tree of `root` renders with.
	pub fn root_cache(&self, root: RootId) -> Option<Rc<Cache>> {
		let current = self.roots.get(root.index())?.current;
		self.fibers.get(current)?.root_state().map(|state| state.cache.clone())
	}

	pub fn is_rendering(&self) -> bool {
		self.attempt.is_some()
	}
}
