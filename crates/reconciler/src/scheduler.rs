//! Task scheduler contract and a deterministic in-process implementation.
//!
//! The reconciler never runs its own event loop. It hands [`Task`]s to a
//! [`Scheduler`] and expects the embedder to feed them back through
//! [`Reconciler::run_task`](crate::Reconciler::run_task) when their turn
//! comes. A task may hand back a continuation, which should be run next in
//! the same slot.

use std::collections::VecDeque;
use std::rc::Rc;

use trellis_primitives::{RootId, SchedulerPriority};

use crate::cache::Cache;

/// Opaque identifier of a scheduled task, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
	pub fn from_raw(raw: u64) -> Self {
		Self(raw)
	}

	pub fn raw(self) -> u64 {
		self.0
	}
}

/// Work the reconciler asks to be run later.
#[derive(Debug, Clone)]
pub enum Task {
	/// Render (and commit, once finished) the next lanes of a root.
	PerformConcurrentWork(RootId),
	/// Drain the queue of roots with synchronous work.
	FlushSyncCallbacks,
	/// Fire a released cache's abort signal.
	AbortCache(Rc<Cache>),
	/// Embedder-defined work sharing the same queue.
	Host(u32),
}

/// What running a task produced.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
	Done,
	/// More work remains; run this next in the same slot.
	Continue(Task),
	/// An embedder task the reconciler does not interpret.
	Host(u32),
}

/// A priority-aware cooperative task queue.
pub trait Scheduler {
	fn schedule(&mut self, priority: SchedulerPriority, task: Task) -> TaskHandle;

	/// Drops a task that has not run yet. Unknown handles are ignored.
	fn cancel(&mut self, handle: TaskHandle);

	/// Asked between units of time-sliced work.
	fn should_yield(&mut self) -> bool;
}

struct Queued {
	handle: TaskHandle,
	task: Task,
}

/// A task taken off a [`ManualScheduler`] queue.
#[derive(Debug, Clone)]
pub struct Dequeued {
	pub handle: TaskHandle,
	pub priority: SchedulerPriority,
	pub task: Task,
}

/// A scheduler driven by hand, one task at a time.
///
/// Queues are FIFO within a priority and strictly ordered across priorities.
/// Time slicing is simulated with a yield budget: the number of
/// [`Scheduler::should_yield`] checks a task gets before it is told to yield.
pub struct ManualScheduler {
	queues: [VecDeque<Queued>; SchedulerPriority::ALL.len()],
	next_handle: u64,
	yield_budget: Option<usize>,
	budget_left: usize,
	force_yield: bool,
	/// Total tasks scheduled.
	scheduled_total: u64,
	/// Total tasks handed out by [`ManualScheduler::next_task`].
	completed_total: u64,
	/// Total tasks cancelled before running.
	cancelled_total: u64,
}

impl Default for ManualScheduler {
	fn default() -> Self {
		Self {
			queues: Default::default(),
			next_handle: 1,
			yield_budget: None,
			budget_left: 0,
			force_yield: false,
			scheduled_total: 0,
			completed_total: 0,
			cancelled_total: 0,
		}
	}
}

impl ManualScheduler {
	pub fn new() -> Self {
		Self::default()
	}

	/// Yield after `units` checks per task. `None` never yields on its own.
	pub fn with_yield_budget(mut self, units: Option<usize>) -> Self {
		self.set_yield_budget(units);
		self
	}

	pub fn set_yield_budget(&mut self, units: Option<usize>) {
		self.yield_budget = units;
		self.budget_left = units.unwrap_or(0);
	}

	/// Makes the next yield check return true regardless of budget.
	pub fn request_yield(&mut self) {
		self.force_yield = true;
	}

	/// Takes the most urgent queued task and refills the yield budget.
	pub fn next_task(&mut self) -> Option<Dequeued> {
		let (priority, queued) = SchedulerPriority::ALL
			.into_iter()
			.find_map(|p| self.queues[p.index()].pop_front().map(|q| (p, q)))?;
		self.completed_total += 1;
		self.budget_left = self.yield_budget.unwrap_or(0);
		tracing::trace!(handle = queued.handle.0, priority = priority.as_str(), task = ?queued.task, "work.dequeue");
		Some(Dequeued {
			handle: queued.handle,
			priority,
			task: queued.task,
		})
	}

	/// Puts a continuation back at the head of its priority queue, keeping
	/// the original handle.
	pub fn requeue(&mut self, handle: TaskHandle, priority: SchedulerPriority, task: Task) {
		self.completed_total = self.completed_total.saturating_sub(1);
		self.queues[priority.index()].push_front(Queued { handle, task });
	}

	/// Priority a queued task was scheduled at.
	pub fn priority_of(&self, handle: TaskHandle) -> Option<SchedulerPriority> {
		SchedulerPriority::ALL
			.into_iter()
			.find(|p| self.queues[p.index()].iter().any(|q| q.handle == handle))
	}

	pub fn has_pending(&self) -> bool {
		self.queues.iter().any(|q| !q.is_empty())
	}

	pub fn pending_count(&self) -> usize {
		self.queues.iter().map(VecDeque::len).sum()
	}

	pub fn pending_at(&self, priority: SchedulerPriority) -> usize {
		self.queues[priority.index()].len()
	}

	pub fn scheduled_total(&self) -> u64 {
		self.scheduled_total
	}

	pub fn completed_total(&self) -> u64 {
		self.completed_total
	}

	pub fn cancelled_total(&self) -> u64 {
		self.cancelled_total
	}
}

impl Scheduler for ManualScheduler {
	fn schedule(&mut self, priority: SchedulerPriority, task: Task) -> TaskHandle {
		let handle = TaskHandle(self.next_handle);
		self.next_handle += 1;
		self.scheduled_total += 1;
		tracing::trace!(
			handle = handle.0,
			priority = priority.as_str(),
			task = ?task,
			scheduled_total = self.scheduled_total,
			"work.schedule"
		);
		self.queues[priority.index()].push_back(Queued { handle, task });
		handle
	}

	fn cancel(&mut self, handle: TaskHandle) {
		for queue in &mut self.queues {
			if let Some(pos) = queue.iter().position(|q| q.handle == handle) {
				queue.remove(pos);
				self.cancelled_total += 1;
				tracing::trace!(handle = handle.0, "work.cancel");
				return;
			}
		}
	}

	fn should_yield(&mut self) -> bool {
		if std::mem::take(&mut self.force_yield) {
			return true;
		}
		if self.yield_budget.is_none() {
			return false;
		}
		if self.budget_left == 0 {
			return true;
		}
		self.budget_left -= 1;
		false
	}
}

#[cfg(test)]
mod tests;
