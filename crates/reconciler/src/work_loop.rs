//! The render phase.
//!
//! A render attempt walks the work-in-progress tree depth first. Each unit is
//! begun, which reconciles its children against the committed ones, and
//! completed once its subtree is done, which creates or diffs host nodes and
//! bubbles effect flags and pending lanes upward. A unit interrupts the walk
//! by returning a [`Thrown`]; the nearest unit able to handle it is marked,
//! everything in between is unwound, and the handler is begun again.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use trellis_primitives::{FiberId, Lanes, RootId};

use crate::config::ReconcilerConfig;
use crate::error::{HydrationError, ReconcileError, RenderError};
use crate::fiber::{FiberArena, FiberFlags, FiberKind, FiberState};
use crate::host::HostConfig;
use crate::hydration::{HydrationContext, Scanner};
use crate::root::FiberRoot;
use crate::stacks::RenderStacks;
use crate::wakeable::Wakeable;

mod begin;
mod child;
mod complete;
mod hydrate;

/// A settled wakeable reported back to the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ping {
	/// A suspension with no boundary above it settled.
	Root { root: RootId, lanes: Lanes },
	/// Content a boundary was waiting on may be ready.
	Retry { boundary: FiberId, wakeable: u64 },
}

/// Pings queue up here until the reconciler processes them.
pub(crate) type PingInbox = Rc<RefCell<VecDeque<Ping>>>;

/// How a render attempt ended, or that it has not yet.
#[derive(Debug)]
pub(crate) enum RootExit {
	InProgress,
	Completed,
	/// Suspended with no boundary able to show a fallback.
	SuspendedAtRoot,
	Fatal(ReconcileError),
}

/// One render of a root at a fixed set of lanes.
#[derive(Debug)]
pub(crate) struct RenderAttempt<N, C> {
	pub root: RootId,
	/// Work-in-progress root unit.
	pub root_fiber: FiberId,
	pub lanes: Lanes,
	pub next_unit: Option<FiberId>,
	pub exit: RootExit,
	/// Lanes being rendered received an update; start over before the next
	/// slice.
	pub restart: bool,
	pub stacks: RenderStacks<N, C>,
	pub hydration: HydrationContext<N>,
	pub recoverable_errors: Vec<HydrationError>,
	/// Pending boundaries left dehydrated, keyed by their start marker.
	pub marker_retries: Vec<(N, FiberId)>,
	pub units: u64,
}

impl<N, C> RenderAttempt<N, C> {
	pub fn new(root: RootId, root_fiber: FiberId, lanes: Lanes, validate: bool) -> Self {
		Self {
			root,
			root_fiber,
			lanes,
			next_unit: Some(root_fiber),
			exit: RootExit::InProgress,
			restart: false,
			stacks: RenderStacks::new(lanes, validate),
			hydration: HydrationContext::default(),
			recoverable_errors: Vec::new(),
			marker_retries: Vec::new(),
			units: 0,
		}
	}

	pub fn is_finished(&self) -> bool {
		!matches!(self.exit, RootExit::InProgress)
	}
}

/// Why a unit stopped before handing out its children.
#[derive(Debug)]
pub(crate) enum Thrown {
	Suspend(Wakeable),
	Error(RenderError),
	/// Pre-rendered output did not match the tree.
	Mismatch(HydrationError),
	/// The unit marked itself for capture while completing.
	Captured,
	Fatal(ReconcileError),
}

impl From<ReconcileError> for Thrown {
	fn from(error: ReconcileError) -> Self {
		Thrown::Fatal(error)
	}
}

/// The reconciler state one render slice works on.
pub(crate) struct Work<'a, H: HostConfig> {
	pub host: &'a mut H,
	pub fibers: &'a mut FiberArena<H::Node>,
	pub config: &'a ReconcilerConfig,
	pub root: &'a mut FiberRoot<H::Node>,
	pub at: &'a mut RenderAttempt<H::Node, H::Context>,
	pub pings: &'a PingInbox,
	/// The unit being begun received props it did not have before.
	did_receive_update: bool,
}

impl<'a, H: HostConfig> Work<'a, H> {
	pub fn new(
		host: &'a mut H,
		fibers: &'a mut FiberArena<H::Node>,
		config: &'a ReconcilerConfig,
		root: &'a mut FiberRoot<H::Node>,
		at: &'a mut RenderAttempt<H::Node, H::Context>,
		pings: &'a PingInbox,
	) -> Self {
		Self {
			host,
			fibers,
			config,
			root,
			at,
			pings,
			did_receive_update: false,
		}
	}

	fn scanner(&self) -> Scanner<'_, H> {
		Scanner::new(&*self.host, &self.config.hydration)
	}

	fn is_concurrent(&self) -> bool {
		self.root.is_concurrent()
	}

	/// Performs units until the attempt finishes or `should_yield` asks to
	/// stop. At least one unit runs per call.
	pub fn run(&mut self, mut should_yield: impl FnMut() -> bool) {
		while let Some(unit) = self.at.next_unit {
			if let Err(error) = self.perform_unit(unit) {
				tracing::error!(%error, fiber = ?unit, "work.fatal");
				self.at.exit = RootExit::Fatal(error);
				self.at.next_unit = None;
				return;
			}
			if self.at.next_unit.is_some() && should_yield() {
				tracing::trace!(units = self.at.units, "work.yield");
				return;
			}
		}
		if !self.at.is_finished() {
			self.at.exit = RootExit::Completed;
		}
	}

	fn perform_unit(&mut self, unit: FiberId) -> Result<(), ReconcileError> {
		self.at.units += 1;
		match self.begin_work(unit) {
			Ok(next) => {
				let fiber = &mut self.fibers[unit];
				fiber.memoized_props = Some(fiber.pending_props.clone());
				match next {
					Some(child) => {
						self.at.next_unit = Some(child);
						Ok(())
					}
					None => self.complete_unit(unit),
				}
			}
			Err(thrown) => self.throw(unit, thrown),
		}
	}

	/// Completes `unit` and every ancestor whose subtree is now done, stopping
	/// at the first sibling left to begin.
	fn complete_unit(&mut self, unit: FiberId) -> Result<(), ReconcileError> {
		let mut completed = unit;
		loop {
			if let Err(thrown) = self.complete_work(completed) {
				return self.throw(completed, thrown);
			}
			let fiber = &self.fibers[completed];
			if let Some(sibling) = fiber.sibling {
				self.at.next_unit = Some(sibling);
				return Ok(());
			}
			match fiber.return_fiber {
				Some(parent) => completed = parent,
				None => {
					self.at.next_unit = None;
					return Ok(());
				}
			}
		}
	}

	/// Routes an interrupt raised by `source` to its handler.
	///
	/// A begin-phase throw happens before the source pushes anything and a
	/// complete-phase throw after it popped, so the source itself is never
	/// unwound.
	fn throw(&mut self, source: FiberId, thrown: Thrown) -> Result<(), ReconcileError> {
		self.fibers[source].flags |= FiberFlags::INCOMPLETE;
		let lanes = self.at.lanes;
		match thrown {
			Thrown::Fatal(error) => return Err(error),
			Thrown::Captured => {}
			Thrown::Suspend(wakeable) => match self.at.stacks.suspense.handler() {
				Some(boundary) => {
					tracing::debug!(?source, ?boundary, wakeable = wakeable.id(), "work.suspend");
					let fiber = &mut self.fibers[boundary];
					fiber.flags |= FiberFlags::SHOULD_CAPTURE;
					fiber.lanes |= lanes;
					if !fiber.retry_queue.contains(&wakeable) {
						fiber.retry_queue.push(wakeable);
					}
				}
				None if lanes.includes_sync_lane() || !self.is_concurrent() => {
					let error = RenderError::new(
						"a component suspended during a synchronous render with no suspense boundary above it",
					);
					return self.throw(source, Thrown::Error(error));
				}
				None => {
					self.suspend_at_root(wakeable);
					return Ok(());
				}
			},
			Thrown::Error(error) => {
				if !self.capture_error(source, error) {
					return Ok(());
				}
			}
			Thrown::Mismatch(error) => {
				self.at.hydration.queue_error(error);
				self.force_client_render();
			}
		}
		self.unwind(source)
	}

	/// Marks the error boundary that handles `error`. Returns false when none
	/// does and the attempt is over.
	fn capture_error(&mut self, source: FiberId, error: RenderError) -> bool {
		if self.at.hydration.is_hydrating && self.is_concurrent() {
			self.at.hydration.queue_error(HydrationError::Render(error));
			self.force_client_render();
			return true;
		}
		let lanes = self.at.lanes;
		let mut parent = self.fibers[source].return_fiber;
		while let Some(id) = parent {
			let fiber = &mut self.fibers[id];
			if fiber.kind == FiberKind::ErrorBoundary && !fiber.flags.contains(FiberFlags::DID_CAPTURE) {
				tracing::debug!(?source, boundary = ?id, %error, "work.error_captured");
				fiber.flags |= FiberFlags::SHOULD_CAPTURE;
				fiber.lanes |= lanes;
				fiber.state = FiberState::ErrorBoundary(Some(error));
				return true;
			}
			parent = fiber.return_fiber;
		}
		tracing::error!(%error, ?source, "work.uncaught");
		self.at.exit = RootExit::Fatal(ReconcileError::Uncaught(error));
		self.at.next_unit = None;
		false
	}

	/// Gives up hydrating the nearest dehydrated boundary, or the root when
	/// there is none, in favour of rendering it on the client.
	fn force_client_render(&mut self) {
		let target = self.at.stacks.suspense.handler().unwrap_or(self.at.root_fiber);
		let lanes = self.at.lanes;
		let fiber = &mut self.fibers[target];
		if !fiber.flags.contains(FiberFlags::SHOULD_CAPTURE) {
			fiber.flags |= FiberFlags::FORCE_CLIENT_RENDER;
		}
		fiber.flags |= FiberFlags::SHOULD_CAPTURE;
		fiber.lanes |= lanes;
		self.at.hydration.did_suspend_or_error = true;
		tracing::debug!(boundary = ?target, "hydration.client_render");
	}

	fn suspend_at_root(&mut self, wakeable: Wakeable) {
		let inbox = Rc::clone(self.pings);
		let root = self.at.root;
		let lanes = self.at.lanes;
		tracing::debug!(?root, lanes = lanes.label(), wakeable = wakeable.id(), "work.suspended_at_root");
		wakeable.then(move || inbox.borrow_mut().push_back(Ping::Root { root, lanes }));
		self.at.exit = RootExit::SuspendedAtRoot;
		self.at.next_unit = None;
	}

	/// Walks up from `source` popping what each ancestor pushed, until a unit
	/// marked for capture is found. That unit is begun again next.
	fn unwind(&mut self, source: FiberId) -> Result<(), ReconcileError> {
		let mut unit = source;
		loop {
			if unit != source {
				self.unwind_work(unit)?;
			}
			let fiber = &mut self.fibers[unit];
			if fiber.flags.contains(FiberFlags::SHOULD_CAPTURE) {
				fiber.flags = ((fiber.flags & FiberFlags::HOST_EFFECT_MASK) - FiberFlags::CHILD_DELETION)
					| FiberFlags::DID_CAPTURE;
				fiber.deletions.clear();
				let resets_hydration = match fiber.kind {
					FiberKind::HostRoot => true,
					FiberKind::Suspense => fiber.dehydrated_marker().is_some(),
					_ => false,
				};
				if resets_hydration {
					self.at.hydration.reset();
				}
				tracing::trace!(fiber = ?unit, "work.capture");
				self.at.next_unit = Some(unit);
				return Ok(());
			}
			let Some(parent) = fiber.return_fiber else {
				return Err(ReconcileError::Invariant("interrupt reached the root without being captured"));
			};
			let parent_fiber = &mut self.fibers[parent];
			parent_fiber.flags |= FiberFlags::INCOMPLETE;
			parent_fiber.subtree_flags = FiberFlags::empty();
			parent_fiber.deletions.clear();
			unit = parent;
		}
	}

	/// Pops whatever `unit` pushed when it was begun.
	fn unwind_work(&mut self, unit: FiberId) -> Result<(), ReconcileError> {
		let kind = self.fibers[unit].kind.clone();
		match kind {
			FiberKind::HostRoot => {
				self.at.stacks.cache.pop(unit)?;
				self.pop_host_container(unit)?;
				self.at.hydration.reset();
			}
			FiberKind::HostComponent(_) | FiberKind::HostSingleton(_) => self.at.stacks.host_context.pop(unit)?,
			FiberKind::Suspense => self.at.stacks.suspense.pop(unit)?,
			FiberKind::Offscreen => self.pop_offscreen(unit)?,
			FiberKind::Provider(context) => self.at.stacks.providers.pop(context, unit)?,
			FiberKind::CacheBoundary => self.at.stacks.cache.pop(unit)?,
			_ => {}
		}
		Ok(())
	}
}
