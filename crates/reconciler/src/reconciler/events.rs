//! Mapping host event targets back to units, and letting events pull
//! hydration of what blocks them forward.

use trellis_primitives::{EventPriority, FiberId, Lanes};

use super::Reconciler;
use crate::fiber::FiberKind;
use crate::host::HostConfig;
use crate::hydration::Scanner;
use crate::scheduler::Scheduler;

impl<H: HostConfig, S: Scheduler> Reconciler<H, S> {
	/// The unit that owns `target`, or the closest one above it.
	///
	/// Pre-rendered content that has not hydrated yet has no unit of its own.
	/// When the walk reaches an ancestor that does, the innermost boundary
	/// marker preceding the path is preferred, since the target sits inside
	/// that boundary's range.
	pub fn closest_instance(&self, target: &H::Node) -> Option<FiberId> {
		if let Some(fiber) = self.live_fiber_of(target) {
			return Some(fiber);
		}
		let scanner = Scanner::new(&self.host, &self.config.hydration);
		let mut child = target.clone();
		let mut parent = self.host.parent_node(target);
		while let Some(node) = parent {
			if let Some(fiber) = self.live_fiber_of(&node) {
				let mut marker = scanner.enclosing_marker(&child);
				while let Some(start) = marker {
					if let Some(boundary) = self.live_fiber_of(&start) {
						return Some(boundary);
					}
					marker = scanner.enclosing_marker(&start);
				}
				return Some(fiber);
			}
			parent = self.host.parent_node(&node);
			child = node;
		}
		None
	}

	fn live_fiber_of(&self, node: &H::Node) -> Option<FiberId> {
		self.host.fiber_of(node).filter(|&id| self.fibers.contains(id))
	}

	/// The committed buffer of `fiber`.
	///
	/// A unit is current when the root it hangs off is the committed root
	/// unit; otherwise its alternate is.
	fn current_of(&self, fiber: FiberId) -> FiberId {
		let mut top = fiber;
		while let Some(parent) = self.fibers.get(top).and_then(|f| f.return_fiber) {
			top = parent;
		}
		let committed = self
			.fibers
			.get(top)
			.and_then(|f| f.root_state())
			.and_then(|state| self.roots.get(state.root.index()))
			.is_some_and(|root| root.current == top);
		match self.fibers.get(fiber).and_then(|f| f.alternate) {
			Some(alternate) if !committed => alternate,
			_ => fiber,
		}
	}

	/// What keeps an event on `target` from being dispatched: the start
	/// marker of a dehydrated boundary, the container of a root still
	/// hydrating, or nothing.
	pub fn blocking_instance(&self, target: &H::Node) -> Option<H::Node> {
		let fiber = self.current_of(self.closest_instance(target)?);
		let unit = self.fibers.get(fiber)?;
		match unit.kind {
			FiberKind::Suspense | FiberKind::DehydratedFragment => {
				let boundary = match unit.kind {
					FiberKind::DehydratedFragment => self.fibers.get(unit.return_fiber?)?,
					_ => unit,
				};
				boundary.dehydrated_marker().cloned()
			}
			FiberKind::HostRoot => {
				let state = unit.root_state()?;
				if !state.is_dehydrated {
					return None;
				}
				self.roots.get(state.root.index()).map(|root| root.container.clone())
			}
			_ => None,
		}
	}

	/// Hydrates what `blocked` stands for before returning, so a discrete
	/// event waiting on it can be dispatched right away. Returns whether any
	/// hydration was attempted.
	pub fn attempt_synchronous_hydration(&mut self, blocked: &H::Node) -> bool {
		let Some(fiber) = self.live_fiber_of(blocked).map(|f| self.current_of(f)) else {
			return false;
		};
		match self.fibers[fiber].kind {
			FiberKind::HostRoot => {
				let Some(state) = self.fibers[fiber].root_state() else {
					return false;
				};
				if !state.is_dehydrated {
					return false;
				}
				let root_id = state.root;
				let Some(root) = self.roots.get_mut(root_id.index()) else {
					return false;
				};
				let lanes = root.highest_pending_lanes();
				if lanes.is_empty() {
					return false;
				}
				tracing::debug!(root = ?root_id, lanes = lanes.label(), "hydration.sync_root");
				root.entangle(lanes | Lanes::SYNC);
				self.ensure_root_is_scheduled(root_id);
			}
			FiberKind::Suspense => {
				if self.fibers[fiber].dehydrated_marker().is_none() {
					return false;
				}
				let Some(root_id) = self.mark_update_lane_from_fiber_to_root(fiber, Lanes::SYNC) else {
					return false;
				};
				tracing::debug!(boundary = ?fiber, "hydration.sync_boundary");
				if let Some(root) = self.roots.get_mut(root_id.index()) {
					root.mark_updated(Lanes::SYNC);
				}
				self.ensure_root_is_scheduled(root_id);
			}
			_ => return false,
		}
		if !self.is_rendering() {
			self.flush_sync_work();
		}
		true
	}

	/// Schedules hydration of the dehydrated boundary `blocked` at the
	/// hydration lane matching `priority`, without rendering it now.
	pub fn attempt_hydration_at_priority(&mut self, blocked: &H::Node, priority: EventPriority) -> bool {
		let Some(fiber) = self.live_fiber_of(blocked).map(|f| self.current_of(f)) else {
			return false;
		};
		if self.fibers[fiber].kind != FiberKind::Suspense || self.fibers[fiber].dehydrated_marker().is_none() {
			return false;
		}
		let lane = priority.lane().hydration_lane();
		let Some(root_id) = self.mark_update_lane_from_fiber_to_root(fiber, lane) else {
			return false;
		};
		tracing::debug!(boundary = ?fiber, lane = lane.label(), "hydration.bump");
		if let Some(root) = self.roots.get_mut(root_id.index()) {
			root.mark_updated(lane);
		}
		self.ensure_root_is_scheduled(root_id);
		true
	}

	/// Host nodes at the top of a scope's subtree, in tree order.
	pub fn scope_host_nodes(&self, scope: FiberId) -> Vec<H::Node> {
		let mut nodes = Vec::new();
		let Some(fiber) = self.fibers.get(scope) else {
			return nodes;
		};
		if fiber.kind != FiberKind::Scope {
			return nodes;
		}
		let mut stack: Vec<FiberId> = self.fibers.children(self.current_of(scope)).collect();
		stack.reverse();
		while let Some(id) = stack.pop() {
			let unit = &self.fibers[id];
			if unit.kind.is_host() {
				nodes.extend(unit.host_node().cloned());
				continue;
			}
			if unit.kind == FiberKind::Offscreen && unit.offscreen_state().is_some() {
				continue;
			}
			let mut children: Vec<FiberId> = self.fibers.children(id).collect();
			children.reverse();
			stack.extend(children);
		}
		nodes
	}

	/// The scope unit whose subtree contains `target`, if any.
	pub fn scope_of(&self, target: &H::Node) -> Option<FiberId> {
		let mut next = self.closest_instance(target);
		while let Some(id) = next {
			let fiber = self.fibers.get(id)?;
			if fiber.kind == FiberKind::Scope {
				return Some(self.current_of(id));
			}
			next = fiber.return_fiber;
		}
		None
	}
}
