//! A reconciler, a replay queue and an event dispatcher over one
//! [`MemoryHost`].
//!
//! Events enter through [`MemoryRuntime::dispatch_event`]. One whose target
//! still sits in unhydrated content is queued instead of delivered, and its
//! blocker's hydration is pulled forward. Replays run as host tasks on the
//! same scheduler as rendering, so [`MemoryRuntime::flush`] drives both.

use rustc_hash::FxHashSet;
use trellis_reconciler::{
	Element, EventPriority, HostConfig, ManualScheduler, Reconciler, Result, RootId, Scheduler, SchedulerPriority, Task,
	TaskOutcome,
};
use trellis_replay::{EventKind, EventReplayQueue, EventSystemFlags, NativeEvent, ReplayClass, ReplayDriver};

use crate::config::RuntimeConfig;
use crate::document::{Document, NodeId};
use crate::host::MemoryHost;

/// Host task tag for a replay pass.
const REPLAY_TASK: u32 = 1;

pub type MemoryReconciler = Reconciler<MemoryHost, ManualScheduler>;

/// A native event aimed at one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEvent {
	pub id: u64,
	pub kind: EventKind,
	pub target: NodeId,
	pub pointer_id: Option<i32>,
}

impl NativeEvent for MemoryEvent {
	fn id(&self) -> u64 {
		self.id
	}

	fn pointer_id(&self) -> Option<i32> {
		self.pointer_id
	}
}

/// One delivery of an event to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
	pub event: MemoryEvent,
	pub container: NodeId,
	pub flags: EventSystemFlags,
}

impl Delivered {
	pub fn replayed(&self) -> bool {
		self.flags.contains(EventSystemFlags::IS_REPLAYED)
	}
}

/// What [`MemoryRuntime::dispatch_event`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
	Delivered,
	/// Held for replay until its blocker hydrates.
	Queued,
	/// Blocked and not replayable; dropped.
	Dropped,
}

/// Application callback run for every delivered event, with the host
/// reporting the event's priority.
pub type EventHandler = Box<dyn FnMut(&Delivered, &mut MemoryReconciler)>;

pub struct MemoryRuntime {
	reconciler: MemoryReconciler,
	replay: EventReplayQueue<NodeId, MemoryEvent>,
	containers: FxHashSet<NodeId>,
	delivered: Vec<Delivered>,
	handler: Option<EventHandler>,
	next_event: u64,
}

/// [`ReplayDriver`] over the runtime's fields, so the queue can be borrowed
/// separately.
struct Driver<'r> {
	reconciler: &'r mut MemoryReconciler,
	delivered: &'r mut Vec<Delivered>,
	handler: &'r mut Option<EventHandler>,
}

impl Driver<'_> {
	fn deliver(&mut self, event: &MemoryEvent, container: NodeId, flags: EventSystemFlags) {
		let delivered = Delivered {
			event: event.clone(),
			container,
			flags,
		};
		tracing::trace!(kind = event.kind.as_str(), id = event.id, replayed = delivered.replayed(), "event.deliver");
		if let Some(handler) = self.handler.as_mut() {
			let previous = self.reconciler.host_mut().set_event_priority(Some(event.kind.priority()));
			handler(&delivered, self.reconciler);
			self.reconciler.host_mut().set_event_priority(previous);
		}
		self.delivered.push(delivered);
	}
}

impl ReplayDriver<NodeId, MemoryEvent> for Driver<'_> {
	fn find_blocking_instance(
		&mut self,
		_kind: EventKind,
		_flags: EventSystemFlags,
		_container: &NodeId,
		event: &MemoryEvent,
	) -> Option<NodeId> {
		self.reconciler.blocking_instance(&event.target)
	}

	fn dispatch(&mut self, _kind: EventKind, flags: EventSystemFlags, event: &MemoryEvent, container: &NodeId) {
		self.deliver(event, *container, flags);
	}

	fn blocking_instance_of(&mut self, target: &NodeId) -> Option<NodeId> {
		self.reconciler.blocking_instance(target)
	}

	fn attempt_synchronous_hydration(&mut self, blocked: &NodeId) {
		self.reconciler.attempt_synchronous_hydration(blocked);
	}

	fn attempt_hydration_at_priority(&mut self, blocked: &NodeId, priority: EventPriority) {
		self.reconciler.attempt_hydration_at_priority(blocked, priority);
	}

	fn take_unblocked(&mut self) -> Vec<NodeId> {
		self.reconciler.host_mut().take_unblocked()
	}

	fn schedule_replay(&mut self) {
		self.reconciler
			.scheduler_mut()
			.schedule(SchedulerPriority::Normal, Task::Host(REPLAY_TASK));
	}
}

impl MemoryRuntime {
	pub fn new(doc: Document, config: RuntimeConfig) -> Self {
		let scheduler = ManualScheduler::new().with_yield_budget(config.scheduler.yield_budget);
		Self {
			reconciler: Reconciler::new(MemoryHost::with_document(doc), scheduler, config.reconciler),
			replay: EventReplayQueue::new(config.replay),
			containers: FxHashSet::default(),
			delivered: Vec::new(),
			handler: None,
			next_event: 1,
		}
	}

	fn split(&mut self) -> (&mut EventReplayQueue<NodeId, MemoryEvent>, Driver<'_>) {
		(
			&mut self.replay,
			Driver {
				reconciler: &mut self.reconciler,
				delivered: &mut self.delivered,
				handler: &mut self.handler,
			},
		)
	}

	pub fn reconciler(&self) -> &MemoryReconciler {
		&self.reconciler
	}

	pub fn reconciler_mut(&mut self) -> &mut MemoryReconciler {
		&mut self.reconciler
	}

	pub fn host(&self) -> &MemoryHost {
		self.reconciler.host()
	}

	pub fn document(&self) -> &Document {
		self.reconciler.host().document()
	}

	pub fn replay_queue(&self) -> &EventReplayQueue<NodeId, MemoryEvent> {
		&self.replay
	}

	pub fn delivered(&self) -> &[Delivered] {
		&self.delivered
	}

	pub fn take_delivered(&mut self) -> Vec<Delivered> {
		std::mem::take(&mut self.delivered)
	}

	pub fn set_handler(&mut self, handler: impl FnMut(&Delivered, &mut MemoryReconciler) + 'static) {
		self.handler = Some(Box::new(handler));
	}

	pub fn create_root(&mut self, container: NodeId) -> RootId {
		self.containers.insert(container);
		self.reconciler.create_root(container)
	}

	pub fn create_legacy_root(&mut self, container: NodeId) -> RootId {
		self.containers.insert(container);
		self.reconciler.create_legacy_root(container)
	}

	pub fn hydrate_root(&mut self, container: NodeId, element: Element) -> Result<RootId> {
		self.containers.insert(container);
		self.reconciler.hydrate_root(container, element)
	}

	pub fn hydrate_legacy_root(&mut self, container: NodeId, element: Element) -> Result<RootId> {
		self.containers.insert(container);
		let root = self.reconciler.hydrate_legacy_root(container, element)?;
		self.absorb_unblocked();
		Ok(root)
	}

	pub fn render(&mut self, root: RootId, element: Element) -> Result<()> {
		self.reconciler.update_container(root, element)?;
		Ok(())
	}

	fn container_of(&self, target: NodeId) -> NodeId {
		let doc = self.document();
		let mut node = Some(target);
		while let Some(current) = node {
			if self.containers.contains(&current) {
				return current;
			}
			node = doc.parent(current);
		}
		doc.root()
	}

	/// Delivers `kind` at `target`, or holds it for replay when the target
	/// is still pre-rendered content.
	pub fn dispatch_event(&mut self, kind: EventKind, target: NodeId) -> DispatchOutcome {
		self.dispatch_event_with(kind, target, None, EventSystemFlags::empty())
	}

	pub fn dispatch_pointer_event(&mut self, kind: EventKind, target: NodeId, pointer_id: i32) -> DispatchOutcome {
		self.dispatch_event_with(kind, target, Some(pointer_id), EventSystemFlags::empty())
	}

	pub fn dispatch_event_with(
		&mut self,
		kind: EventKind,
		target: NodeId,
		pointer_id: Option<i32>,
		flags: EventSystemFlags,
	) -> DispatchOutcome {
		let event = MemoryEvent {
			id: self.next_event,
			kind,
			target,
			pointer_id,
		};
		self.next_event += 1;
		let container = self.container_of(target);
		let blocked_on = self.reconciler.blocking_instance(&target);
		let (replay, mut driver) = self.split();

		let Some(blocked) = blocked_on else {
			replay.clear_if_continuous_event(kind, &event);
			driver.deliver(&event, container, flags);
			replay.absorb_unblocked(&mut driver);
			return DispatchOutcome::Delivered;
		};
		tracing::debug!(kind = kind.as_str(), %target, %blocked, "event.blocked");
		let queued = match kind.replay_class() {
			ReplayClass::Discrete => {
				replay.queue_discrete_event(&mut driver, blocked, kind, flags, container, event.clone())
			}
			ReplayClass::Continuous(_) => {
				replay.queue_if_continuous_event(&mut driver, Some(blocked), kind, flags, container, event.clone())
			}
			ReplayClass::NotReplayable => false,
		};
		let outcome = if queued {
			DispatchOutcome::Queued
		} else {
			replay.clear_if_continuous_event(kind, &event);
			DispatchOutcome::Dropped
		};
		replay.absorb_unblocked(&mut driver);
		outcome
	}

	/// Asks for `target` to hydrate ahead of other pending content, at the
	/// priority of the event being handled.
	pub fn queue_explicit_hydration_target(&mut self, target: NodeId) {
		let priority = self.reconciler.host().current_event_priority();
		let (replay, mut driver) = self.split();
		replay.queue_explicit_hydration_target(&mut driver, target, priority);
	}

	/// Feeds blockers that finished hydrating to the replay queue.
	pub fn absorb_unblocked(&mut self) {
		let (replay, mut driver) = self.split();
		replay.absorb_unblocked(&mut driver);
	}

	/// Runs the most urgent task. Returns false when the queue is empty.
	pub fn run_next_task(&mut self) -> bool {
		let Some(next) = self.reconciler.scheduler_mut().next_task() else {
			return false;
		};
		match self.reconciler.run_task(next.task) {
			TaskOutcome::Done => {}
			TaskOutcome::Continue(task) => self.reconciler.scheduler_mut().requeue(next.handle, next.priority, task),
			TaskOutcome::Host(REPLAY_TASK) => {
				let (replay, mut driver) = self.split();
				replay.replay_unblocked_events(&mut driver);
			}
			TaskOutcome::Host(tag) => tracing::warn!(tag, "runtime.unknown_host_task"),
		}
		self.absorb_unblocked();
		true
	}

	/// Processes settled wakeables and runs tasks until none are left.
	/// Returns how many ran.
	pub fn flush(&mut self) -> usize {
		self.reconciler.process_pings();
		let mut ran = 0;
		while self.run_next_task() {
			ran += 1;
		}
		ran
	}

	/// Runs at most `limit` tasks.
	pub fn run_tasks(&mut self, limit: usize) -> usize {
		self.reconciler.process_pings();
		(0..limit).take_while(|_| self.run_next_task()).count()
	}

	/// Renders pending sync work right away.
	pub fn flush_sync(&mut self) {
		self.reconciler.flush_sync_work();
		self.absorb_unblocked();
	}

	/// Marks a streamed-in boundary as ready to hydrate.
	pub fn retry_dehydrated_boundary(&mut self, marker: NodeId) -> bool {
		self.reconciler.retry_dehydrated_boundary(&marker)
	}

	pub fn has_pending_tasks(&self) -> bool {
		self.reconciler.scheduler().has_pending()
	}
}

#[cfg(test)]
mod tests;
