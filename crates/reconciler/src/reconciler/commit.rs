//! The commit phase: applying a finished tree to the host.
//!
//! Mutations run depth first with deletions before a unit's children and
//! placements and updates after them. Once the host reflects the finished
//! tree it becomes current, and the passive pass moves cache references from
//! the replaced values to the new ones.

use std::rc::Rc;

use trellis_primitives::{FiberId, Lanes, RootId, SchedulerPriority};

use super::Reconciler;
use crate::cache::{Cache, CacheRelease};
use crate::element::Element;
use crate::fiber::{FiberFlags, FiberKind, FiberState};
use crate::host::HostConfig;
use crate::root::RootPhase;
use crate::scheduler::{Scheduler, Task};
use crate::work_loop::{Ping, RenderAttempt};

/// What the mutation pass hands to the passive pass.
struct Released<N> {
	/// Caches held by deleted subtrees.
	caches: Vec<Rc<Cache>>,
	/// Start markers whose server content was removed.
	cleared_markers: Vec<N>,
}

impl<N> Default for Released<N> {
	fn default() -> Self {
		Self {
			caches: Vec::new(),
			cleared_markers: Vec::new(),
		}
	}
}

impl<H: HostConfig, S: Scheduler> Reconciler<H, S> {
	pub(super) fn commit_root(&mut self, root_id: RootId, mut at: RenderAttempt<H::Node, H::Context>) {
		let finished = at.root_fiber;
		let lanes = at.lanes;
		let remaining = self.fibers[finished].lanes | self.fibers[finished].child_lanes;
		let Some(root) = self.roots.get_mut(root_id.index()) else {
			return;
		};
		root.phase = RootPhase::Committing;
		root.updates.retain(|update| !update.lane.is_subset_of(lanes));
		root.mark_finished(remaining);
		root.finished_lanes = lanes;
		if let Some(handle) = root.callback_node.take() {
			self.scheduler.cancel(handle);
		}
		root.callback_priority = Lanes::NONE;
		let finished_pool = root.take_finished_pooled_cache(remaining);
		let container = root.container.clone();
		tracing::debug!(
			root = ?root_id,
			lanes = lanes.label(),
			remaining = remaining.label(),
			units = at.units,
			"root.commit"
		);

		if self.fibers[finished].flags.contains(FiberFlags::SNAPSHOT) {
			tracing::debug!(root = ?root_id, "root.clear_container");
			self.host.clear_container(&container);
			let abandoned = self.fibers[finished]
				.alternate
				.and_then(|c| self.fibers[c].root_state())
				.is_some_and(|state| state.is_dehydrated);
			if abandoned {
				self.host.notify_unblocked(&container);
			}
		}
		let mut released = Released::default();
		self.commit_mutation_effects(finished, &mut released);

		let previous = match self.roots.get_mut(root_id.index()) {
			Some(root) => std::mem::replace(&mut root.current, finished),
			None => return,
		};
		tracing::trace!(root = ?root_id, ?previous, current = ?finished, "root.swap");

		let mut freed = Vec::new();
		self.commit_passive_effects(finished, &mut freed);
		for cache in released.caches.into_iter().chain(finished_pool) {
			if cache.release() == CacheRelease::Freed {
				freed.push(cache);
			}
		}
		for cache in freed {
			tracing::debug!(cache = cache.id(), "cache.freed");
			self.scheduler.schedule(SchedulerPriority::Normal, Task::AbortCache(cache));
		}

		for (marker, boundary) in at.marker_retries.drain(..) {
			self.marker_retries.insert(marker, boundary);
		}
		for error in &at.recoverable_errors {
			tracing::warn!(root = ?root_id, %error, "hydration.recoverable_error");
			self.host.report_recoverable_error(error);
		}
		if let Some(root) = self.roots.get_mut(root_id.index()) {
			root.phase = RootPhase::Idle;
		}
		self.sweep();
		self.ensure_root_is_scheduled(root_id);
	}

	fn commit_mutation_effects(&mut self, fiber: FiberId, released: &mut Released<H::Node>) {
		let deletions = std::mem::take(&mut self.fibers[fiber].deletions);
		for deleted in deletions {
			self.commit_deletion(fiber, deleted, released);
		}
		if self.fibers[fiber].subtree_flags.intersects(FiberFlags::MUTATION_MASK) {
			let mut next = self.fibers[fiber].child;
			while let Some(child) = next {
				next = self.fibers[child].sibling;
				self.commit_mutation_effects(child, released);
			}
		}

		let flags = self.fibers[fiber].flags;
		if flags.contains(FiberFlags::PLACEMENT) {
			self.commit_placement(fiber);
		}
		self.fibers[fiber].flags.remove(FiberFlags::PLACEMENT | FiberFlags::HYDRATING);

		let current = self.fibers[fiber].alternate;
		let kind = self.fibers[fiber].kind.clone();
		match kind {
			FiberKind::HostComponent(ty) if flags.contains(FiberFlags::UPDATE) => {
				let payload = self.fibers[fiber].update_payload.take();
				if let (Some(node), Some(diff)) = (self.fibers[fiber].host_node().cloned(), payload) {
					self.host.commit_update(&node, &ty, &diff);
				}
			}
			FiberKind::HostText if flags.contains(FiberFlags::UPDATE) => self.commit_text_update(current, fiber),
			FiberKind::HostSingleton(ty) if flags.contains(FiberFlags::UPDATE) => {
				let Some(node) = self.fibers[fiber].host_node().cloned() else {
					return;
				};
				match self.fibers[fiber].update_payload.take() {
					Some(diff) => self.host.commit_update(&node, &ty, &diff),
					None => {
						if let Element::Host(element) = &self.fibers[fiber].pending_props {
							let props = element.props.clone();
							self.host.acquire_singleton(&node, &props);
						}
					}
				}
			}
			FiberKind::HostRoot if flags.contains(FiberFlags::UPDATE) => {
				let was_dehydrated = current
					.and_then(|c| self.fibers[c].root_state())
					.is_some_and(|state| state.is_dehydrated);
				let container = self.fibers[fiber]
					.root_state()
					.and_then(|state| self.roots.get(state.root.index()))
					.map(|root| root.container.clone());
				if was_dehydrated && let Some(container) = container {
					tracing::debug!(fiber = ?fiber, "hydration.root_committed");
					self.host.commit_hydrated_container(&container);
					self.host.notify_unblocked(&container);
				}
			}
			FiberKind::Suspense if flags.contains(FiberFlags::UPDATE) => {
				let marker = current.and_then(|c| self.fibers[c].dehydrated_marker().cloned());
				if let Some(marker) = marker
					&& self.fibers[fiber].dehydrated_marker().is_none()
					&& !released.cleared_markers.contains(&marker)
				{
					tracing::debug!(fiber = ?fiber, "hydration.boundary_committed");
					self.host.commit_hydrated_suspense_instance(&marker);
					self.host.notify_unblocked(&marker);
				}
				self.attach_retry_listeners(fiber);
			}
			FiberKind::Offscreen if flags.contains(FiberFlags::VISIBILITY) => {
				let hidden = self.fibers[fiber].offscreen_state().is_some();
				self.hide_or_unhide_all_children(fiber, hidden);
			}
			_ => {}
		}
	}

	fn commit_text_update(&mut self, current: Option<FiberId>, fiber: FiberId) {
		let Some(node) = self.fibers[fiber].host_node().cloned() else {
			return;
		};
		let Element::Text(text) = &self.fibers[fiber].pending_props else {
			return;
		};
		let text = text.clone();
		let old = match current.and_then(|c| self.fibers[c].memoized_props.clone()) {
			Some(Element::Text(old)) => old.to_string(),
			_ => self.host.text_content(&node).unwrap_or_default().to_string(),
		};
		self.host.commit_text_update(&node, &old, &text);
	}

	/// Subscribes the boundary to the wakeables it is waiting on, once each.
	fn attach_retry_listeners(&mut self, boundary: FiberId) {
		let wakeables = std::mem::take(&mut self.fibers[boundary].retry_queue);
		for wakeable in wakeables {
			let id = wakeable.id();
			if !self.retry_cache.insert((boundary, id)) {
				continue;
			}
			let inbox = Rc::clone(&self.pings);
			tracing::trace!(?boundary, wakeable = id, "work.retry_listener");
			wakeable.then(move || {
				inbox.borrow_mut().push_back(Ping::Retry { boundary, wakeable: id });
			});
		}
	}

	/// Hides or reveals the topmost host nodes under an offscreen unit.
	/// Nested hidden subtrees keep their own state.
	fn hide_or_unhide_all_children(&mut self, offscreen: FiberId, hide: bool) {
		let mut stack: Vec<FiberId> = self.fibers.children(offscreen).collect();
		stack.reverse();
		while let Some(id) = stack.pop() {
			let fiber = &self.fibers[id];
			match &fiber.kind {
				FiberKind::HostComponent(_) | FiberKind::HostSingleton(_) => {
					if let Some(node) = fiber.host_node().cloned() {
						if hide {
							self.host.hide_instance(&node);
						} else {
							self.host.unhide_instance(&node);
						}
					}
				}
				FiberKind::HostText => {
					let text = match &fiber.memoized_props {
						Some(Element::Text(text)) => text.clone(),
						_ => Rc::from(""),
					};
					if let Some(node) = fiber.host_node().cloned() {
						if hide {
							self.host.hide_text_instance(&node);
						} else {
							self.host.unhide_text_instance(&node, &text);
						}
					}
				}
				FiberKind::Offscreen if fiber.offscreen_state().is_some() => {}
				_ => {
					let mut children: Vec<FiberId> = self.fibers.children(id).collect();
					children.reverse();
					stack.extend(children);
				}
			}
		}
	}

	fn commit_placement(&mut self, fiber: FiberId) {
		let Some(parent) = self.host_parent_node(fiber) else {
			tracing::error!(?fiber, "commit.no_host_parent");
			return;
		};
		let before = self.host_sibling(fiber);
		self.insert_or_append(fiber, before.as_ref(), &parent);
	}

	/// Host node of the closest ancestor that owns host children.
	fn host_parent_node(&self, fiber: FiberId) -> Option<H::Node> {
		let mut parent = self.fibers[fiber].return_fiber;
		while let Some(id) = parent {
			let node = &self.fibers[id];
			match &node.kind {
				FiberKind::HostComponent(_) | FiberKind::HostSingleton(_) => return node.host_node().cloned(),
				FiberKind::HostRoot => {
					let root = node.root_state()?.root;
					return self.roots.get(root.index()).map(|r| r.container.clone());
				}
				_ => parent = node.return_fiber,
			}
		}
		None
	}

	/// The host node `fiber`'s nodes should be inserted before: the first
	/// host node after it in tree order that is already in place.
	fn host_sibling(&self, fiber: FiberId) -> Option<H::Node> {
		let mut node = fiber;
		'siblings: loop {
			while self.fibers[node].sibling.is_none() {
				let parent = self.fibers[node].return_fiber?;
				if self.fibers[parent].kind.is_host_parent() {
					return None;
				}
				node = parent;
			}
			node = self.fibers[node].sibling?;
			loop {
				let candidate = &self.fibers[node];
				match candidate.kind {
					FiberKind::HostComponent(_) | FiberKind::HostText | FiberKind::DehydratedFragment => break,
					FiberKind::HostSingleton(_) => continue 'siblings,
					_ => {}
				}
				if candidate.flags.contains(FiberFlags::PLACEMENT) {
					continue 'siblings;
				}
				match candidate.child {
					Some(child) => node = child,
					None => continue 'siblings,
				}
			}
			let candidate = &self.fibers[node];
			if !candidate.flags.contains(FiberFlags::PLACEMENT) {
				return match &candidate.state {
					FiberState::Host(Some(node)) | FiberState::Dehydrated(node) => Some(node.clone()),
					_ => None,
				};
			}
		}
	}

	fn insert_or_append(&mut self, fiber: FiberId, before: Option<&H::Node>, parent: &H::Node) {
		let node = &self.fibers[fiber];
		match node.kind {
			FiberKind::HostComponent(_) | FiberKind::HostText => {
				if let Some(child) = node.host_node().cloned() {
					match before {
						Some(before) => self.host.insert_before(parent, &child, before),
						None => self.host.append_child(parent, &child),
					}
				}
			}
			FiberKind::HostSingleton(_) => {}
			_ => {
				let children: Vec<FiberId> = self.fibers.children(fiber).collect();
				for child in children {
					self.insert_or_append(child, before, parent);
				}
			}
		}
	}

	fn commit_deletion(&mut self, parent: FiberId, deleted: FiberId, released: &mut Released<H::Node>) {
		let host_parent = match &self.fibers[parent].kind {
			FiberKind::HostComponent(_) | FiberKind::HostSingleton(_) => self.fibers[parent].host_node().cloned(),
			FiberKind::HostRoot => self.fibers[parent]
				.root_state()
				.and_then(|state| self.roots.get(state.root.index()))
				.map(|root| root.container.clone()),
			_ => self.host_parent_node(parent),
		};
		tracing::trace!(?parent, ?deleted, kind = self.fibers[deleted].kind.tag(), "commit.delete");
		self.delete_subtree(deleted, host_parent.as_ref(), released);
		self.fibers[deleted].return_fiber = None;
	}

	/// Removes the host nodes of a deleted subtree and collects what it held.
	///
	/// Only the topmost host nodes are detached from `parent`; nested ones go
	/// with them. Singletons stay in the document but their children are
	/// removed one by one.
	fn delete_subtree(&mut self, fiber: FiberId, parent: Option<&H::Node>, released: &mut Released<H::Node>) {
		let node = &self.fibers[fiber];
		match &node.kind {
			FiberKind::HostComponent(_) | FiberKind::HostText => {
				let own = node.host_node().cloned();
				let children: Vec<FiberId> = self.fibers.children(fiber).collect();
				for child in children {
					self.delete_subtree(child, None, released);
				}
				if let (Some(parent), Some(own)) = (parent, own) {
					self.host.remove_child(parent, &own);
				}
			}
			FiberKind::HostSingleton(_) => {
				let own = node.host_node().cloned();
				let children: Vec<FiberId> = self.fibers.children(fiber).collect();
				for child in children {
					self.delete_subtree(child, own.as_ref(), released);
				}
			}
			FiberKind::HostDeletion => {
				if let (Some(parent), Some(own)) = (parent, node.host_node().cloned()) {
					self.host.remove_child(parent, &own);
				}
			}
			FiberKind::DehydratedFragment => {
				let marker = match &node.state {
					FiberState::Dehydrated(marker) => Some(marker.clone()),
					_ => None,
				};
				if let (Some(parent), Some(marker)) = (parent, marker) {
					tracing::debug!(?fiber, "hydration.boundary_cleared");
					self.host.clear_suspense_boundary(parent, &marker);
					self.host.notify_unblocked(&marker);
					released.cleared_markers.push(marker);
				}
			}
			kind => {
				match kind {
					FiberKind::CacheBoundary => {
						if let Some(state) = node.cache_state() {
							released.caches.push(state.cache.clone());
						}
					}
					FiberKind::Offscreen => {
						if let Some(pool) = node.offscreen_state().and_then(|s| s.cache_pool.as_ref()) {
							released.caches.push(pool.pool.clone());
						}
					}
					_ => {}
				}
				let children: Vec<FiberId> = self.fibers.children(fiber).collect();
				for child in children {
					self.delete_subtree(child, parent, released);
				}
			}
		}
	}

	/// Retains the caches the finished tree now references and releases the
	/// ones it replaced. Released caches whose count reached zero are pushed
	/// to `freed`.
	fn commit_passive_effects(&mut self, fiber: FiberId, freed: &mut Vec<Rc<Cache>>) {
		if self.fibers[fiber].subtree_flags.intersects(FiberFlags::PASSIVE_MASK) {
			let children: Vec<FiberId> = self.fibers.children(fiber).collect();
			for child in children {
				self.commit_passive_effects(child, freed);
			}
		}
		let node = &self.fibers[fiber];
		if !node.flags.contains(FiberFlags::PASSIVE) {
			return;
		}
		let current = node.alternate.map(|c| &self.fibers[c]);
		let (prev, next) = match node.kind {
			FiberKind::HostRoot => (
				current.and_then(|c| c.root_state()).map(|s| s.cache.clone()),
				node.root_state().map(|s| s.cache.clone()),
			),
			FiberKind::CacheBoundary => (
				current.and_then(|c| c.cache_state()).map(|s| s.cache.clone()),
				node.cache_state().map(|s| s.cache.clone()),
			),
			FiberKind::Offscreen => (
				current
					.and_then(|c| c.offscreen_state())
					.and_then(|s| s.cache_pool.as_ref())
					.map(|p| p.pool.clone()),
				node.offscreen_state()
					.and_then(|s| s.cache_pool.as_ref())
					.map(|p| p.pool.clone()),
			),
			_ => (None, None),
		};
		self.fibers[fiber].flags.remove(FiberFlags::PASSIVE);
		if let (Some(prev), Some(next)) = (&prev, &next)
			&& Rc::ptr_eq(prev, next)
		{
			return;
		}
		if let Some(next) = next {
			next.retain();
		}
		if let Some(prev) = prev
			&& prev.release() == CacheRelease::Freed
		{
			freed.push(prev);
		}
	}
}
