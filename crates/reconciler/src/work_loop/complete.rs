//! Completing a unit once its subtree is done: popping what begin pushed,
//! creating or diffing host nodes, and bubbling flags and lanes upward.

use std::rc::Rc;

use trellis_primitives::{FiberId, Lanes};

use super::{Thrown, Work};
use crate::element::{Element, HostElement};
use crate::error::{HydrationError, ReconcileError};
use crate::fiber::{FiberFlags, FiberKind, FiberState, SuspenseState};
use crate::host::HostConfig;

fn invariant(message: &'static str) -> Thrown {
	Thrown::Fatal(ReconcileError::Invariant(message))
}

impl<H: HostConfig> Work<'_, H> {
	pub(super) fn complete_work(&mut self, wip: FiberId) -> Result<(), Thrown> {
		let current = self.fibers[wip].alternate;
		let kind = self.fibers[wip].kind.clone();
		let props = self.fibers[wip].pending_props.clone();
		tracing::trace!(fiber = ?wip, kind = kind.tag(), "work.complete");
		match (kind, props) {
			(FiberKind::HostRoot, _) => self.complete_host_root(current, wip)?,
			(FiberKind::HostComponent(_), Element::Host(element)) => {
				self.at.stacks.host_context.pop(wip)?;
				self.complete_host_component(current, wip, &element)?;
			}
			(FiberKind::HostSingleton(_), Element::Host(element)) => {
				self.at.stacks.host_context.pop(wip)?;
				self.complete_host_singleton(current, wip, &element)?;
			}
			(FiberKind::HostText, Element::Text(text)) => self.complete_host_text(current, wip, &text)?,
			(FiberKind::Suspense, _) => return self.complete_suspense(current, wip),
			(FiberKind::Offscreen, _) => self.complete_offscreen(current, wip)?,
			(FiberKind::CacheBoundary, _) => {
				self.at.stacks.cache.pop(wip)?;
				let next = self.fibers[wip].cache_state().map(|s| s.cache.clone());
				let prev = current.and_then(|c| self.fibers[c].cache_state().map(|s| s.cache.clone()));
				if !matches!((&prev, &next), (Some(a), Some(b)) if Rc::ptr_eq(a, b)) {
					self.fibers[wip].flags |= FiberFlags::PASSIVE;
				}
			}
			(FiberKind::Provider(context), _) => self.at.stacks.providers.pop(context, wip)?,
			(
				FiberKind::Component { .. }
				| FiberKind::Fragment
				| FiberKind::Scope
				| FiberKind::ErrorBoundary
				| FiberKind::DehydratedFragment,
				_,
			) => {}
			_ => return Err(invariant("cannot complete unit")),
		}
		self.bubble_properties(wip);
		Ok(())
	}

	fn complete_host_root(&mut self, current: Option<FiberId>, wip: FiberId) -> Result<(), Thrown> {
		self.at.stacks.cache.pop(wip)?;
		self.pop_host_container(wip)?;
		let Some(current) = current else {
			return Err(invariant("root unit without a committed buffer"));
		};
		let prev = self.fibers[current].root_state().cloned();
		let next_cache = self.fibers[wip].root_state().map(|s| s.cache.clone());
		if let (Some(prev), Some(next)) = (&prev, &next_cache)
			&& !Rc::ptr_eq(&prev.cache, next)
		{
			self.fibers[wip].flags |= FiberFlags::PASSIVE;
		}
		if self.fibers[current].child.is_none() {
			if self.pop_hydration_state(wip)? {
				self.fibers[wip].flags |= FiberFlags::UPDATE;
				self.upgrade_hydration_errors();
			} else if prev.is_none_or(|p| !p.is_dehydrated)
				|| self.fibers[wip].flags.contains(FiberFlags::FORCE_CLIENT_RENDER)
			{
				self.fibers[wip].flags |= FiberFlags::SNAPSHOT;
				self.upgrade_hydration_errors();
			}
		}
		Ok(())
	}

	fn complete_host_component(
		&mut self,
		current: Option<FiberId>,
		wip: FiberId,
		element: &HostElement,
	) -> Result<(), Thrown> {
		if let Some(current) = current
			&& self.fibers[wip].host_node().is_some()
		{
			self.diff_host_props(current, wip, element);
			return Ok(());
		}
		if self.pop_hydration_state(wip)? {
			self.prepare_to_hydrate_instance(wip, element);
			return Ok(());
		}
		let Some(context) = self.at.stacks.host_context.current().clone() else {
			return Err(invariant("host element outside a host container"));
		};
		let node = self.host.create_instance(&element.ty, &element.props, &context);
		self.append_all_children(&node, wip);
		self.host.precache_fiber(&node, wip);
		self.fibers[wip].state = FiberState::Host(Some(node));
		Ok(())
	}

	fn complete_host_singleton(
		&mut self,
		current: Option<FiberId>,
		wip: FiberId,
		element: &HostElement,
	) -> Result<(), Thrown> {
		if let Some(current) = current {
			self.diff_host_props(current, wip, element);
			return Ok(());
		}
		if self.pop_hydration_state(wip)? {
			self.prepare_to_hydrate_instance(wip, element);
			return Ok(());
		}
		if let Some(node) = self.fibers[wip].host_node().cloned() {
			self.host.precache_fiber(&node, wip);
		}
		// Acquired during commit, once the previous occupant is cleared.
		self.fibers[wip].flags |= FiberFlags::UPDATE;
		Ok(())
	}

	fn diff_host_props(&mut self, current: FiberId, wip: FiberId, element: &HostElement) {
		let diff = match &self.fibers[current].memoized_props {
			Some(Element::Host(old)) if std::ptr::eq(&**old, element) => return,
			Some(Element::Host(old)) => old.props.diff(&element.props),
			_ => return,
		};
		if !diff.is_empty() {
			let fiber = &mut self.fibers[wip];
			fiber.update_payload = Some(diff);
			fiber.flags |= FiberFlags::UPDATE;
		}
	}

	fn complete_host_text(&mut self, current: Option<FiberId>, wip: FiberId, text: &Rc<str>) -> Result<(), Thrown> {
		if let Some(current) = current
			&& self.fibers[wip].host_node().is_some()
		{
			let changed = match &self.fibers[current].memoized_props {
				Some(Element::Text(old)) => old != text,
				_ => true,
			};
			if changed {
				self.fibers[wip].flags |= FiberFlags::UPDATE;
			}
			return Ok(());
		}
		if self.pop_hydration_state(wip)? {
			return self.prepare_to_hydrate_text(wip, text);
		}
		let Some(context) = self.at.stacks.host_context.current().clone() else {
			return Err(invariant("text outside a host container"));
		};
		let node = self.host.create_text_instance(text, &context);
		self.host.precache_fiber(&node, wip);
		self.fibers[wip].state = FiberState::Host(Some(node));
		Ok(())
	}

	fn complete_suspense(&mut self, current: Option<FiberId>, wip: FiberId) -> Result<(), Thrown> {
		self.at.stacks.suspense.pop(wip)?;

		let current_dehydrated = current.is_some_and(|c| self.fibers[c].dehydrated_marker().is_some());
		if current.is_none() || current_dehydrated {
			let captured = self.fibers[wip].flags.contains(FiberFlags::DID_CAPTURE);
			let tail = self.unhydrated_tail();
			if self.is_concurrent() && !captured && let Some(tail) = tail {
				let found = self.scanner().describe(&tail);
				self.at.hydration.queue_error(HydrationError::UnhydratedTail { found });
				self.at.hydration.reset();
				self.fibers[wip].flags |= FiberFlags::FORCE_CLIENT_RENDER | FiberFlags::SHOULD_CAPTURE;
				return Err(Thrown::Captured);
			}
			let hydrated = self.pop_hydration_state(wip)?;
			if let Some(marker) = self.fibers[wip].dehydrated_marker().cloned() {
				if current.is_none() {
					if !hydrated {
						return Err(invariant("dehydrated boundary was never claimed"));
					}
					self.host.precache_fiber(&marker, wip);
				} else {
					self.at.hydration.reset();
					let fiber = &mut self.fibers[wip];
					if !fiber.flags.contains(FiberFlags::DID_CAPTURE) {
						tracing::debug!(fiber = ?wip, "hydration.boundary_hydrated");
						fiber.state = FiberState::Suspense(None);
					}
					fiber.flags |= FiberFlags::UPDATE;
				}
				self.bubble_properties(wip);
				return Ok(());
			}
			self.upgrade_hydration_errors();
		}

		let showing_fallback = |state: Option<&SuspenseState<H::Node>>| state.is_some_and(|s| s.dehydrated.is_none());
		let next_fallback = showing_fallback(self.fibers[wip].suspense_state());
		let prev_fallback = current.is_some_and(|c| showing_fallback(self.fibers[c].suspense_state()));
		if next_fallback
			&& !prev_fallback
			&& let Some(primary) = self.fibers[wip].child
		{
			self.fibers[primary].flags |= FiberFlags::VISIBILITY;
		}
		if !self.fibers[wip].retry_queue.is_empty() {
			self.fibers[wip].flags |= FiberFlags::UPDATE;
		}
		self.bubble_properties(wip);
		Ok(())
	}

	fn complete_offscreen(&mut self, current: Option<FiberId>, wip: FiberId) -> Result<(), Thrown> {
		self.pop_offscreen(wip)?;
		let next = self.fibers[wip].offscreen_state().cloned();
		let prev = current.and_then(|c| self.fibers[c].offscreen_state().cloned());
		let next_hidden = next.is_some();
		let hidden_changed = match current {
			Some(current) => self.fibers[current].offscreen_state().is_some() != next_hidden,
			None => next_hidden,
		};
		if hidden_changed {
			self.fibers[wip].flags |= FiberFlags::VISIBILITY;
		}

		if !next_hidden || !self.is_concurrent() {
			self.bubble_properties(wip);
		} else if self.at.stacks.render_lanes().includes_some(Lanes::OFFSCREEN) {
			self.bubble_properties(wip);
			let fiber = &mut self.fibers[wip];
			if fiber.subtree_flags.intersects(FiberFlags::PLACEMENT | FiberFlags::UPDATE) {
				fiber.flags |= FiberFlags::VISIBILITY;
			}
		}

		let prev_pool = prev.and_then(|s| s.cache_pool).map(|p| p.pool);
		let next_pool = next.and_then(|s| s.cache_pool).map(|p| p.pool);
		let pool_changed = match (&prev_pool, &next_pool) {
			(Some(a), Some(b)) => !Rc::ptr_eq(a, b),
			(None, None) => false,
			_ => true,
		};
		if pool_changed {
			self.fibers[wip].flags |= FiberFlags::PASSIVE;
		}
		Ok(())
	}

	/// Attaches the nearest host nodes below `wip` to `parent`, which is
	/// still detached.
	fn append_all_children(&mut self, parent: &H::Node, wip: FiberId) {
		let mut node = self.fibers[wip].child;
		while let Some(id) = node {
			let fiber = &self.fibers[id];
			match fiber.kind {
				FiberKind::HostComponent(_) | FiberKind::HostText => {
					if let Some(child) = fiber.host_node().cloned() {
						self.host.append_initial_child(parent, &child);
					}
				}
				FiberKind::HostSingleton(_) => {}
				_ => {
					if let Some(child) = fiber.child {
						self.fibers[child].return_fiber = Some(id);
						node = Some(child);
						continue;
					}
				}
			}
			if id == wip {
				return;
			}
			let mut climb = id;
			loop {
				let fiber = &self.fibers[climb];
				if let Some(sibling) = fiber.sibling {
					let parent_fiber = fiber.return_fiber;
					self.fibers[sibling].return_fiber = parent_fiber;
					node = Some(sibling);
					break;
				}
				match fiber.return_fiber {
					Some(up) if up != wip => climb = up,
					_ => return,
				}
			}
		}
	}

	/// Folds the children's pending lanes and effect flags into `wip`.
	///
	/// Children still shared with the committed buffer were bailed out of and
	/// carry no new effects.
	fn bubble_properties(&mut self, wip: FiberId) {
		let did_bailout = self.fibers[wip]
			.alternate
			.is_some_and(|current| self.fibers[current].child == self.fibers[wip].child);
		let mut child_lanes = Lanes::NONE;
		let mut subtree_flags = FiberFlags::empty();
		let mut next = self.fibers[wip].child;
		while let Some(id) = next {
			let child = &mut self.fibers[id];
			child_lanes |= child.lanes | child.child_lanes;
			if !did_bailout {
				subtree_flags |= child.subtree_flags | child.flags;
			}
			child.return_fiber = Some(wip);
			next = child.sibling;
		}
		let fiber = &mut self.fibers[wip];
		fiber.child_lanes = child_lanes;
		fiber.subtree_flags |= subtree_flags;
	}
}
