//! Host adapter contract.
//!
//! The reconciler never touches display nodes directly. Everything it needs
//! from the environment, from creating and mutating nodes during commit to
//! walking pre-rendered output during hydration, goes through
//! [`HostConfig`].

use std::fmt;
use std::hash::Hash;

use trellis_primitives::{EventPriority, FiberId};

use crate::element::{Props, PropsDiff};
use crate::error::{HydrationError, ReconcileError};

/// Coarse classification of a host node, as seen by the hydration scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
	Element,
	Text,
	Comment,
	Other,
}

/// Sentinel comment contents delimiting a suspense boundary in pre-rendered
/// output.
pub mod markers {
	/// Resolved boundary content follows.
	pub const SUSPENSE_START: &str = "$";
	/// Content still streaming; fallback follows.
	pub const SUSPENSE_PENDING: &str = "$?";
	/// The server gave up on this boundary; fallback follows.
	pub const SUSPENSE_FALLBACK: &str = "$!";
	pub const SUSPENSE_END: &str = "/$";

	pub fn is_start(data: &str) -> bool {
		matches!(data, SUSPENSE_START | SUSPENSE_PENDING | SUSPENSE_FALLBACK)
	}
}

/// The environment the reconciler renders into.
///
/// Mutation methods are called only during commit and must not fail in a
/// recoverable way. Hydration probes are read-only and may be called during
/// render, possibly for an attempt that is later discarded.
pub trait HostConfig {
	/// A handle to one display node. Cheap to clone and compare.
	type Node: Clone + Eq + Hash + fmt::Debug;
	/// Context inherited down the tree, such as a namespace.
	type Context: Clone + fmt::Debug;

	fn root_host_context(&self, container: &Self::Node) -> Self::Context;
	fn child_host_context(&self, parent: &Self::Context, ty: &str) -> Self::Context;

	fn create_instance(&mut self, ty: &str, props: &Props, context: &Self::Context) -> Self::Node;
	fn create_text_instance(&mut self, text: &str, context: &Self::Context) -> Self::Node;

	/// Attaches a child to a parent that is not yet part of the visible tree.
	fn append_initial_child(&mut self, parent: &Self::Node, child: &Self::Node) {
		self.append_child(parent, child);
	}
	fn append_child(&mut self, parent: &Self::Node, child: &Self::Node);
	fn insert_before(&mut self, parent: &Self::Node, child: &Self::Node, before: &Self::Node);
	fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node);
	fn commit_text_update(&mut self, node: &Self::Node, old: &str, new: &str);
	fn commit_update(&mut self, node: &Self::Node, ty: &str, diff: &PropsDiff);
	fn clear_container(&mut self, container: &Self::Node);

	fn hide_instance(&mut self, node: &Self::Node);
	fn unhide_instance(&mut self, node: &Self::Node);
	fn hide_text_instance(&mut self, node: &Self::Node);
	fn unhide_text_instance(&mut self, node: &Self::Node, text: &str);

	fn node_kind(&self, node: &Self::Node) -> NodeKind;
	/// Lower-case tag of an element node.
	fn tag_name(&self, node: &Self::Node) -> Option<&str>;
	fn attribute(&self, node: &Self::Node, name: &str) -> Option<&str>;
	/// Data of a text or comment node.
	fn text_content(&self, node: &Self::Node) -> Option<&str>;
	fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;
	fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
	fn previous_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
	fn parent_node(&self, node: &Self::Node) -> Option<Self::Node>;

	/// Whether a pre-rendered node can serve as an instance of `ty`.
	fn can_hydrate_instance(&self, node: &Self::Node, ty: &str, _props: &Props) -> bool {
		self.node_kind(node) == NodeKind::Element
			&& self.tag_name(node).is_some_and(|tag| tag.eq_ignore_ascii_case(ty))
	}

	fn can_hydrate_text_instance(&self, node: &Self::Node, text: &str) -> bool {
		!text.is_empty() && self.node_kind(node) == NodeKind::Text
	}

	fn can_hydrate_suspense_instance(&self, node: &Self::Node) -> bool {
		self.node_kind(node) == NodeKind::Comment && self.text_content(node).is_some_and(markers::is_start)
	}

	/// Attribute changes needed to make a hydrated element match `props`.
	fn diff_hydrated_props(&self, node: &Self::Node, props: &Props) -> PropsDiff {
		let mut diff = PropsDiff::default();
		for (name, value) in props.iter() {
			let expected = value.to_attribute();
			if self.attribute(node, name) != expected.as_deref() {
				diff.changes.push(crate::element::PropChange {
					name: name.to_string(),
					value: Some(value.clone()),
				});
			}
		}
		diff
	}

	/// Server error code attached to a fallback-marked boundary.
	fn suspense_error_digest(&self, marker: &Self::Node) -> Option<String> {
		let template = self.next_sibling(marker)?;
		if self.tag_name(&template) != Some("template") {
			return None;
		}
		self.attribute(&template, "data-dgst").map(str::to_string)
	}

	fn is_pending_suspense_marker(&self, marker: &Self::Node) -> bool {
		self.text_content(marker) == Some(markers::SUSPENSE_PENDING)
	}

	fn is_fallback_suspense_marker(&self, marker: &Self::Node) -> bool {
		self.text_content(marker) == Some(markers::SUSPENSE_FALLBACK)
	}

	/// Element types the host owns exactly one of per document.
	fn is_singleton_type(&self, ty: &str) -> bool {
		matches!(ty, "html" | "head" | "body")
	}

	/// Locates the existing singleton instance of `ty` for `container`.
	fn resolve_singleton(&self, ty: &str, container: &Self::Node) -> Result<Self::Node, ReconcileError>;

	/// Applies `props` to a claimed singleton on mount.
	fn acquire_singleton(&mut self, node: &Self::Node, props: &Props);

	/// Remembers which unit a node belongs to, for event target lookup.
	fn precache_fiber(&mut self, node: &Self::Node, fiber: FiberId);
	fn fiber_of(&self, node: &Self::Node) -> Option<FiberId>;

	/// A boundary's pre-rendered content was removed in favour of client
	/// rendering. Also called for the marker itself.
	fn clear_suspense_boundary(&mut self, parent: &Self::Node, marker: &Self::Node) {
		let mut node = Some(marker.clone());
		let mut depth = 0usize;
		while let Some(current) = node {
			let next = self.next_sibling(&current);
			let data = (self.node_kind(&current) == NodeKind::Comment)
				.then(|| self.text_content(&current).map(str::to_string))
				.flatten();
			self.remove_child(parent, &current);
			match data.as_deref() {
				Some(markers::SUSPENSE_END) if depth == 0 => return,
				Some(markers::SUSPENSE_END) => depth -= 1,
				Some(d) if markers::is_start(d) && current != *marker => depth += 1,
				_ => {}
			}
			node = next;
		}
	}

	/// Hydration of a root container finished.
	fn commit_hydrated_container(&mut self, _container: &Self::Node) {}
	/// Hydration of a dehydrated boundary finished.
	fn commit_hydrated_suspense_instance(&mut self, _marker: &Self::Node) {}
	/// A boundary's server content was dropped; anything waiting on `marker`
	/// is no longer blocked.
	fn notify_unblocked(&mut self, _marker: &Self::Node) {}

	/// Priority of the event being dispatched right now. Updates requested
	/// outside any explicit priority scope use it.
	fn current_event_priority(&self) -> EventPriority {
		EventPriority::DEFAULT
	}

	fn report_fatal_error(&mut self, container: &Self::Node, error: &ReconcileError);
	fn report_recoverable_error(&mut self, error: &HydrationError);
}
