//! Child list reconciliation.
//!
//! New children are matched against the committed ones first positionally,
//! while keys line up, then through a map of the remaining old children by
//! key (or index, for unkeyed ones). A reused child is placed again only if
//! it moved before a child that stayed in place.

use indexmap::IndexMap;
use trellis_primitives::FiberId;

use super::Work;
use crate::element::{Element, Key};
use crate::fiber::{Fiber, FiberFlags, FiberKind};
use crate::host::HostConfig;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
	Key(Key),
	Index(usize),
}

fn slot_key(element: &Element, index: usize) -> SlotKey {
	match element.key() {
		Some(key) => SlotKey::Key(key.clone()),
		None => SlotKey::Index(index),
	}
}

fn is_empty_text(element: &Element) -> bool {
	matches!(element, Element::Text(text) if text.is_empty())
}

impl<H: HostConfig> Work<'_, H> {
	/// Reconciles `wip`'s children against those of its committed buffer.
	/// Side effects are tracked only when there is one.
	pub(super) fn reconcile(&mut self, current: Option<FiberId>, wip: FiberId, elements: &[Element]) -> Option<FiberId> {
		match current {
			Some(current) => {
				let first_old = self.fibers[current].child;
				self.reconcile_children(wip, first_old, elements, true)
			}
			None => self.reconcile_children(wip, None, elements, false),
		}
	}

	/// Builds `wip`'s child list from `elements`, reusing fibers from the
	/// list starting at `first_old`, and links it under `wip`.
	///
	/// Without `track`, no placements or deletions are recorded: the subtree
	/// is mounting and gets inserted by its closest placed ancestor.
	pub(super) fn reconcile_children(
		&mut self,
		wip: FiberId,
		first_old: Option<FiberId>,
		elements: &[Element],
		track: bool,
	) -> Option<FiberId> {
		let elements: Vec<&Element> = elements.iter().filter(|e| !is_empty_text(e)).collect();
		let mut placed = Vec::with_capacity(elements.len());
		let mut last_placed = 0;
		let mut old = first_old;
		let mut index = 0;

		while let Some(old_fiber) = old
			&& index < elements.len()
		{
			let (slot_old, next_old) = if self.fibers[old_fiber].index > index {
				(None, Some(old_fiber))
			} else {
				(Some(old_fiber), self.fibers[old_fiber].sibling)
			};
			let element = elements[index];
			let old_key = slot_old.and_then(|o| self.fibers[o].key.clone());
			if element.key() != old_key.as_ref() {
				break;
			}
			let fiber = self.update_element(wip, slot_old, element);
			if track
				&& let Some(slot_old) = slot_old
				&& self.fibers[fiber].alternate.is_none()
			{
				self.delete_child(wip, slot_old);
			}
			last_placed = self.place_child(fiber, last_placed, index, track);
			placed.push(fiber);
			old = next_old;
			index += 1;
		}

		if index == elements.len() {
			if track {
				self.delete_remaining_children(wip, old);
			}
			return self.link_children(wip, &placed);
		}

		if old.is_none() {
			for (index, element) in elements.iter().enumerate().skip(index) {
				let fiber = self.create_fiber(wip, element);
				last_placed = self.place_child(fiber, last_placed, index, track);
				placed.push(fiber);
			}
			return self.link_children(wip, &placed);
		}

		let mut remaining: IndexMap<SlotKey, FiberId> = IndexMap::new();
		let mut next = old;
		while let Some(id) = next {
			let fiber = &self.fibers[id];
			let key = match &fiber.key {
				Some(key) => SlotKey::Key(key.clone()),
				None => SlotKey::Index(fiber.index),
			};
			remaining.insert(key, id);
			next = fiber.sibling;
		}

		for (index, element) in elements.iter().enumerate().skip(index) {
			let slot = slot_key(element, index);
			let matched = remaining.get(&slot).copied();
			let fiber = self.update_element(wip, matched, element);
			if track && self.fibers[fiber].alternate.is_some() {
				remaining.shift_remove(&slot);
			}
			last_placed = self.place_child(fiber, last_placed, index, track);
			placed.push(fiber);
		}

		if track {
			for (_, stale) in remaining {
				self.delete_child(wip, stale);
			}
		}
		self.link_children(wip, &placed)
	}

	pub(super) fn link_children(&mut self, wip: FiberId, placed: &[FiberId]) -> Option<FiberId> {
		for (i, &id) in placed.iter().enumerate() {
			let fiber = &mut self.fibers[id];
			fiber.return_fiber = Some(wip);
			fiber.sibling = placed.get(i + 1).copied();
		}
		let first = placed.first().copied();
		self.fibers[wip].child = first;
		first
	}

	/// Reuses `old` for `element` when their types agree, otherwise creates
	/// a new fiber.
	fn update_element(&mut self, wip: FiberId, old: Option<FiberId>, element: &Element) -> FiberId {
		let kind = self.kind_for(element);
		if let Some(old) = old
			&& self.fibers[old].kind == kind
		{
			let reused = self.fibers.create_work_in_progress(old, element.clone());
			let fiber = &mut self.fibers[reused];
			fiber.index = 0;
			fiber.sibling = None;
			fiber.return_fiber = Some(wip);
			return reused;
		}
		self.create_fiber(wip, element)
	}

	pub(super) fn create_fiber(&mut self, wip: FiberId, element: &Element) -> FiberId {
		let kind = self.kind_for(element);
		let mode = self.fibers[wip].mode;
		let mut fiber = Fiber::new(kind, element.clone(), element.key().cloned(), mode);
		fiber.return_fiber = Some(wip);
		self.fibers.insert(fiber)
	}

	pub(super) fn kind_for(&self, element: &Element) -> FiberKind {
		match element {
			Element::Host(host) if self.host.is_singleton_type(&host.ty) => FiberKind::HostSingleton(host.ty.clone()),
			Element::Host(host) => FiberKind::HostComponent(host.ty.clone()),
			Element::Text(_) => FiberKind::HostText,
			Element::Fragment(_) => FiberKind::Fragment,
			Element::Component(component) => FiberKind::Component {
				type_id: component.type_id(),
				name: component.component.name(),
			},
			Element::Suspense(_) => FiberKind::Suspense,
			Element::ErrorBoundary(_) => FiberKind::ErrorBoundary,
			Element::Cache(_) => FiberKind::CacheBoundary,
			Element::Offscreen(_) => FiberKind::Offscreen,
			Element::Provider(provider) => FiberKind::Provider(provider.context),
			Element::Scope(_) => FiberKind::Scope,
		}
	}

	fn place_child(&mut self, fiber: FiberId, last_placed: usize, index: usize, track: bool) -> usize {
		self.fibers[fiber].index = index;
		if !track {
			return last_placed;
		}
		let old_index = self.fibers[fiber].alternate.map(|current| self.fibers[current].index);
		match old_index {
			Some(old_index) if old_index >= last_placed => old_index,
			_ => {
				self.fibers[fiber].flags |= FiberFlags::PLACEMENT;
				last_placed
			}
		}
	}

	pub(super) fn delete_child(&mut self, wip: FiberId, child: FiberId) {
		let parent = &mut self.fibers[wip];
		parent.deletions.push(child);
		parent.flags |= FiberFlags::CHILD_DELETION;
	}

	pub(super) fn delete_remaining_children(&mut self, wip: FiberId, first: Option<FiberId>) {
		let mut next = first;
		while let Some(child) = next {
			next = self.fibers[child].sibling;
			self.delete_child(wip, child);
		}
	}

	/// Points `wip` at work-in-progress copies of its committed children
	/// without reconciling them.
	pub(super) fn clone_child_fibers(&mut self, wip: FiberId) {
		let mut placed = Vec::new();
		let mut next = self.fibers[wip].child;
		while let Some(current) = next {
			next = self.fibers[current].sibling;
			let props = self.fibers[current].pending_props.clone();
			let clone = self.fibers.create_work_in_progress(current, props);
			placed.push(clone);
		}
		self.link_children(wip, &placed);
	}
}
