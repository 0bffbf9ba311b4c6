//! Claiming pre-rendered nodes while units are begun, and checking what is
//! left over when they complete.

use trellis_primitives::{FiberId, Lanes};

use super::{Thrown, Work};
use crate::element::{Element, HostElement, PropsDiff};
use crate::error::HydrationError;
use crate::fiber::{Fiber, FiberFlags, FiberKind, FiberState, SuspenseState};
use crate::host::HostConfig;

impl<H: HostConfig> Work<'_, H> {
	/// Finds the pre-rendered node for `wip` at the cursor.
	///
	/// A concurrent root treats any miss as a mismatch. A legacy root tries
	/// the following node once, deleting the skipped one, and otherwise
	/// inserts `wip` as new and stops hydrating below it.
	fn try_claim(
		&mut self,
		wip: FiberId,
		matches: impl Fn(&H, &H::Node) -> bool,
		expected: impl FnOnce() -> String,
	) -> Result<Option<H::Node>, Thrown> {
		let candidate = self.scanner().next_hydratable(self.at.hydration.next.clone());
		if let Some(node) = &candidate
			&& matches(&*self.host, node)
		{
			return Ok(candidate);
		}
		if self.is_concurrent() {
			let found = match &candidate {
				Some(node) => self.scanner().describe(node),
				None => "nothing".to_string(),
			};
			return Err(Thrown::Mismatch(HydrationError::UnexpectedNode {
				expected: expected(),
				found,
			}));
		}
		let second = candidate
			.as_ref()
			.and_then(|first| self.scanner().next_hydratable_sibling(first));
		if let Some(first) = candidate
			&& let Some(second) = second
			&& matches(&*self.host, &second)
		{
			if let Some(parent) = self.at.hydration.parent {
				self.delete_hydratable_instance(parent, first);
			}
			return Ok(Some(second));
		}
		self.insert_non_hydrated(wip);
		Ok(None)
	}

	fn insert_non_hydrated(&mut self, wip: FiberId) {
		tracing::warn!(fiber = ?wip, kind = self.fibers[wip].kind.tag(), "hydration.insert_unmatched");
		let fiber = &mut self.fibers[wip];
		fiber.flags = (fiber.flags - FiberFlags::HYDRATING) | FiberFlags::PLACEMENT;
		self.at.hydration.is_hydrating = false;
		self.at.hydration.parent = Some(wip);
	}

	/// Schedules removal of a pre-rendered node nothing claimed.
	fn delete_hydratable_instance(&mut self, parent: FiberId, node: H::Node) {
		tracing::warn!(node = %self.scanner().describe(&node), "hydration.delete_unmatched");
		let mode = self.fibers[parent].mode;
		let mut fiber = Fiber::new(FiberKind::HostDeletion, Element::empty(), None, mode);
		fiber.state = FiberState::Host(Some(node));
		fiber.return_fiber = Some(parent);
		let id = self.fibers.insert(fiber);
		self.delete_child(parent, id);
	}

	pub(super) fn claim_host_instance(&mut self, wip: FiberId, element: &HostElement) -> Result<(), Thrown> {
		if !self.at.hydration.is_hydrating {
			return Ok(());
		}
		let claimed = if self.is_skip_listed(element) {
			self.adopt_skipped_instance(wip, element)
		} else {
			self.try_claim(
				wip,
				|host, node| host.can_hydrate_instance(node, &element.ty, &element.props),
				|| format!("<{}>", element.ty),
			)?
		};
		if let Some(node) = claimed {
			let first = self.scanner().first_child_position(&node);
			self.fibers[wip].state = FiberState::Host(Some(node));
			self.at.hydration.parent = Some(wip);
			self.at.hydration.next = first;
		}
		Ok(())
	}

	/// Whether the skip rules would step over `element` once rendered.
	fn is_skip_listed(&self, element: &HostElement) -> bool {
		let attrs: Vec<(&str, String)> = element
			.props
			.iter()
			.filter_map(|(name, value)| value.to_attribute().map(|text| (name, text)))
			.collect();
		self.config.hydration.skips(&element.ty, |name| {
			attrs.iter().find(|(attr, _)| *attr == name).map(|(_, text)| text.as_str())
		})
	}

	/// Finds the server node of a skip-listed element among the skipped
	/// nodes at the cursor. Without one, `wip` mounts fresh; the scanner never
	/// offered that node, so its absence is not a mismatch.
	fn adopt_skipped_instance(&mut self, wip: FiberId, element: &HostElement) -> Option<H::Node> {
		let scanner = self.scanner();
		let mut cursor = self.at.hydration.next.clone();
		let found = loop {
			let Some(node) = cursor else {
				break None;
			};
			if !scanner.is_skipped(&node) {
				break None;
			}
			if self.host.can_hydrate_instance(&node, &element.ty, &element.props) {
				break Some(node);
			}
			cursor = scanner.next_sibling_position(&node);
		};
		if found.is_none() {
			tracing::debug!(fiber = ?wip, ty = %element.ty, "hydration.skipped_mount");
			let fiber = &mut self.fibers[wip];
			fiber.flags = (fiber.flags - FiberFlags::HYDRATING) | FiberFlags::PLACEMENT;
			self.at.hydration.is_hydrating = false;
			self.at.hydration.parent = Some(wip);
		}
		found
	}

	pub(super) fn claim_text_instance(&mut self, wip: FiberId, text: &str) -> Result<(), Thrown> {
		if !self.at.hydration.is_hydrating {
			return Ok(());
		}
		let claimed = self.try_claim(
			wip,
			|host, node| host.can_hydrate_text_instance(node, text),
			|| format!("text {text:?}"),
		)?;
		if let Some(node) = claimed {
			self.fibers[wip].state = FiberState::Host(Some(node));
			self.at.hydration.parent = Some(wip);
			self.at.hydration.next = None;
		}
		Ok(())
	}

	/// Claims a boundary start marker and leaves `wip` dehydrated on it.
	/// Returns the marker when one was claimed.
	pub(super) fn claim_suspense_instance(&mut self, wip: FiberId) -> Result<Option<H::Node>, Thrown> {
		if !self.at.hydration.is_hydrating {
			return Ok(None);
		}
		let claimed = self.try_claim(
			wip,
			|host, node| host.can_hydrate_suspense_instance(node),
			|| "a suspense boundary".to_string(),
		)?;
		let Some(marker) = claimed else {
			return Ok(None);
		};
		let mode = self.fibers[wip].mode;
		let mut placeholder = Fiber::new(FiberKind::DehydratedFragment, Element::empty(), None, mode);
		placeholder.state = FiberState::Dehydrated(marker.clone());
		placeholder.return_fiber = Some(wip);
		let placeholder = self.fibers.insert(placeholder);

		let fiber = &mut self.fibers[wip];
		fiber.child = Some(placeholder);
		fiber.state = FiberState::Suspense(Some(SuspenseState {
			dehydrated: Some(marker.clone()),
			retry_lane: Lanes::NONE,
		}));
		self.at.hydration.parent = Some(wip);
		self.at.hydration.next = None;
		Ok(Some(marker))
	}

	/// Claims the document singleton for `wip` and continues hydration
	/// inside it.
	pub(super) fn enter_singleton(&mut self, wip: FiberId, node: &H::Node) {
		if !self.at.hydration.is_hydrating {
			return;
		}
		let first = self.scanner().first_child_position(node);
		self.at.hydration.parent = Some(wip);
		self.at.hydration.next = first;
	}

	/// Closes hydration of `fiber`'s children. Returns whether `fiber` itself
	/// was hydrated rather than created.
	///
	/// Unclaimed trailing nodes are a mismatch on concurrent roots and are
	/// deleted on legacy ones, except under parents configured to keep them.
	pub(super) fn pop_hydration_state(&mut self, fiber: FiberId) -> Result<bool, Thrown> {
		if self.at.hydration.parent != Some(fiber) {
			return Ok(false);
		}
		if !self.at.hydration.is_hydrating {
			self.pop_to_next_host_parent(fiber);
			self.at.hydration.is_hydrating = true;
			return Ok(false);
		}

		let kind = self.fibers[fiber].kind.clone();
		let keeps_tail = match &kind {
			FiberKind::HostRoot | FiberKind::HostSingleton(_) => true,
			FiberKind::HostComponent(ty) => self.config.hydration.keeps_tail_within(ty),
			_ => false,
		};
		if !keeps_tail && let Some(next) = self.unhydrated_tail() {
			if self.is_concurrent() {
				let found = self.scanner().describe(&next);
				return Err(Thrown::Mismatch(HydrationError::UnhydratedTail { found }));
			}
			let mut leftover = Some(next);
			while let Some(node) = leftover {
				leftover = self.scanner().next_hydratable_sibling(&node);
				self.delete_hydratable_instance(fiber, node);
			}
		}

		self.pop_to_next_host_parent(fiber);
		let next = match kind {
			FiberKind::Suspense => self.fibers[fiber]
				.dehydrated_marker()
				.and_then(|marker| self.scanner().skip_past_dehydrated(marker)),
			_ if self.at.hydration.parent.is_some() => self.fibers[fiber]
				.host_node()
				.and_then(|node| self.scanner().next_sibling_position(node)),
			_ => None,
		};
		self.at.hydration.next = next;
		Ok(true)
	}

	/// First node under the current parent that nothing claimed, ignoring
	/// skipped elements.
	pub(super) fn unhydrated_tail(&self) -> Option<H::Node> {
		if !self.at.hydration.is_hydrating {
			return None;
		}
		self.scanner().next_hydratable(self.at.hydration.next.clone())
	}

	fn pop_to_next_host_parent(&mut self, fiber: FiberId) {
		let mut parent = self.fibers[fiber].return_fiber;
		while let Some(id) = parent {
			match self.fibers[id].kind {
				FiberKind::HostComponent(_) | FiberKind::HostSingleton(_) | FiberKind::HostRoot | FiberKind::Suspense => {
					break;
				}
				_ => parent = self.fibers[id].return_fiber,
			}
		}
		self.at.hydration.parent = parent;
	}

	/// Records the claimed node of a hydrated element and queues the
	/// attribute changes the client props call for.
	pub(super) fn prepare_to_hydrate_instance(&mut self, wip: FiberId, element: &HostElement) {
		let Some(node) = self.fibers[wip].host_node().cloned() else {
			return;
		};
		self.host.precache_fiber(&node, wip);
		let diff: PropsDiff = self.host.diff_hydrated_props(&node, &element.props);
		if !diff.is_empty() {
			tracing::debug!(fiber = ?wip, changes = diff.changes.len(), "hydration.props_patched");
			let fiber = &mut self.fibers[wip];
			fiber.update_payload = Some(diff);
			fiber.flags |= FiberFlags::UPDATE;
		}
	}

	pub(super) fn prepare_to_hydrate_text(&mut self, wip: FiberId, text: &str) -> Result<(), Thrown> {
		let Some(node) = self.fibers[wip].host_node().cloned() else {
			return Ok(());
		};
		self.host.precache_fiber(&node, wip);
		let server = self.host.text_content(&node).unwrap_or_default();
		if server == text {
			return Ok(());
		}
		if self.is_concurrent() {
			return Err(Thrown::Mismatch(HydrationError::TextMismatch {
				server: server.to_string(),
				client: text.to_string(),
			}));
		}
		tracing::warn!(fiber = ?wip, server, client = text, "hydration.text_patched");
		self.fibers[wip].flags |= FiberFlags::UPDATE;
		Ok(())
	}

	/// Moves buffered hydration errors to the ones reported after commit.
	pub(super) fn upgrade_hydration_errors(&mut self) {
		let errors = self.at.hydration.take_errors();
		self.at.recoverable_errors.extend(errors);
	}
}
