//! [`HostConfig`] over an in-memory [`Document`].
//!
//! Every mutation is appended to an op log so tests can assert exactly what
//! a commit did, and in particular that hydration created nothing.

use rustc_hash::FxHashMap;
use trellis_reconciler::element::{Props, PropsDiff};
use trellis_reconciler::error::{HydrationError, ReconcileError};
use trellis_reconciler::{EventPriority, FiberId, HostConfig, NodeKind};

use crate::document::{Document, Namespace, NodeData, NodeId};

/// One host mutation, in commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
	CreateElement { node: NodeId, tag: String },
	CreateText { node: NodeId, text: String },
	Append { parent: NodeId, child: NodeId },
	Insert { parent: NodeId, child: NodeId, before: NodeId },
	Remove { parent: NodeId, child: NodeId },
	SetText { node: NodeId, text: String },
	Update { node: NodeId, changes: usize },
	Hide(NodeId),
	Unhide(NodeId),
	ClearContainer(NodeId),
	HydratedContainer(NodeId),
	HydratedBoundary(NodeId),
}

impl HostOp {
	/// Whether the op produced a new node.
	pub fn is_creation(&self) -> bool {
		matches!(self, HostOp::CreateElement { .. } | HostOp::CreateText { .. })
	}
}

/// A fatal error reported for a root.
#[derive(Debug, Clone)]
pub struct FatalReport {
	pub container: NodeId,
	pub error: ReconcileError,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
	doc: Document,
	ops: Vec<HostOp>,
	fibers: FxHashMap<NodeId, FiberId>,
	unblocked: Vec<NodeId>,
	event_priority: Option<EventPriority>,
	fatal: Vec<FatalReport>,
	recoverable: Vec<HydrationError>,
}

impl MemoryHost {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_document(doc: Document) -> Self {
		Self {
			doc,
			..Self::default()
		}
	}

	pub fn document(&self) -> &Document {
		&self.doc
	}

	pub fn document_mut(&mut self) -> &mut Document {
		&mut self.doc
	}

	pub fn ops(&self) -> &[HostOp] {
		&self.ops
	}

	pub fn take_ops(&mut self) -> Vec<HostOp> {
		std::mem::take(&mut self.ops)
	}

	/// Markers and containers whose pending events may now be replayed.
	pub fn take_unblocked(&mut self) -> Vec<NodeId> {
		std::mem::take(&mut self.unblocked)
	}

	/// Sets the priority reported for the event being dispatched. `None`
	/// means no event is in flight.
	pub fn set_event_priority(&mut self, priority: Option<EventPriority>) -> Option<EventPriority> {
		std::mem::replace(&mut self.event_priority, priority)
	}

	pub fn fatal_errors(&self) -> &[FatalReport] {
		&self.fatal
	}

	pub fn recoverable_errors(&self) -> &[HydrationError] {
		&self.recoverable
	}

	pub fn take_recoverable_errors(&mut self) -> Vec<HydrationError> {
		std::mem::take(&mut self.recoverable)
	}

	fn apply_props(&mut self, node: NodeId, props: &Props) {
		for (name, value) in props.iter() {
			match value.to_attribute() {
				Some(text) => self.doc.set_attribute(node, name, &text),
				None => self.doc.remove_attribute(node, name),
			}
		}
	}

	/// Frees a removed subtree along with its fiber handles.
	fn release(&mut self, node: NodeId) {
		for freed in self.doc.release(node) {
			self.fibers.remove(&freed);
		}
	}

	fn singleton_scope(&self, container: NodeId) -> NodeId {
		let mut top = container;
		while let Some(parent) = self.doc.parent(top) {
			top = parent;
		}
		top
	}
}

impl HostConfig for MemoryHost {
	type Node = NodeId;
	type Context = Namespace;

	fn root_host_context(&self, container: &NodeId) -> Namespace {
		match self.doc.data(*container) {
			Some(NodeData::Element { namespace, .. }) => *namespace,
			_ => Namespace::Html,
		}
	}

	fn child_host_context(&self, parent: &Namespace, ty: &str) -> Namespace {
		match (parent, ty) {
			(_, "svg") => Namespace::Svg,
			(Namespace::Svg, "foreignObject") => Namespace::Html,
			(namespace, _) => *namespace,
		}
	}

	fn create_instance(&mut self, ty: &str, props: &Props, context: &Namespace) -> NodeId {
		let node = self.doc.create_element(ty, *context);
		self.apply_props(node, props);
		self.ops.push(HostOp::CreateElement {
			node,
			tag: ty.to_string(),
		});
		node
	}

	fn create_text_instance(&mut self, text: &str, _context: &Namespace) -> NodeId {
		let node = self.doc.create_text(text);
		self.ops.push(HostOp::CreateText {
			node,
			text: text.to_string(),
		});
		node
	}

	fn append_initial_child(&mut self, parent: &NodeId, child: &NodeId) {
		self.doc.append_child(*parent, *child);
	}

	fn append_child(&mut self, parent: &NodeId, child: &NodeId) {
		self.doc.append_child(*parent, *child);
		self.ops.push(HostOp::Append {
			parent: *parent,
			child: *child,
		});
	}

	fn insert_before(&mut self, parent: &NodeId, child: &NodeId, before: &NodeId) {
		self.doc.insert_before(*parent, *child, *before);
		self.ops.push(HostOp::Insert {
			parent: *parent,
			child: *child,
			before: *before,
		});
	}

	fn remove_child(&mut self, parent: &NodeId, child: &NodeId) {
		if self.doc.remove_child(*parent, *child) {
			self.ops.push(HostOp::Remove {
				parent: *parent,
				child: *child,
			});
			self.release(*child);
		} else {
			tracing::warn!(%parent, %child, "host.remove_detached");
		}
	}

	fn commit_text_update(&mut self, node: &NodeId, _old: &str, new: &str) {
		self.doc.set_text(*node, new);
		self.ops.push(HostOp::SetText {
			node: *node,
			text: new.to_string(),
		});
	}

	fn commit_update(&mut self, node: &NodeId, _ty: &str, diff: &PropsDiff) {
		for change in &diff.changes {
			match change.value.as_ref().and_then(|v| v.to_attribute()) {
				Some(text) => self.doc.set_attribute(*node, &change.name, &text),
				None => self.doc.remove_attribute(*node, &change.name),
			}
		}
		self.ops.push(HostOp::Update {
			node: *node,
			changes: diff.changes.len(),
		});
	}

	/// Empties the container, keeping document singletons in place but
	/// clearing their contents.
	fn clear_container(&mut self, container: &NodeId) {
		let mut pending = vec![*container];
		while let Some(parent) = pending.pop() {
			for child in self.doc.children(parent).to_vec() {
				let singleton = self.doc.tag(child).is_some_and(|tag| self.is_singleton_type(tag));
				if singleton {
					pending.push(child);
				} else if self.doc.remove_child(parent, child) {
					self.release(child);
				}
			}
		}
		self.ops.push(HostOp::ClearContainer(*container));
	}

	fn hide_instance(&mut self, node: &NodeId) {
		self.doc.set_hidden(*node, true);
		self.ops.push(HostOp::Hide(*node));
	}

	fn unhide_instance(&mut self, node: &NodeId) {
		self.doc.set_hidden(*node, false);
		self.ops.push(HostOp::Unhide(*node));
	}

	fn hide_text_instance(&mut self, node: &NodeId) {
		self.doc.set_hidden(*node, true);
		self.ops.push(HostOp::Hide(*node));
	}

	fn unhide_text_instance(&mut self, node: &NodeId, text: &str) {
		self.doc.set_text(*node, text);
		self.doc.set_hidden(*node, false);
		self.ops.push(HostOp::Unhide(*node));
	}

	fn node_kind(&self, node: &NodeId) -> NodeKind {
		match self.doc.data(*node) {
			Some(NodeData::Element { .. }) => NodeKind::Element,
			Some(NodeData::Text { .. }) => NodeKind::Text,
			Some(NodeData::Comment(_)) => NodeKind::Comment,
			Some(NodeData::Document) | None => NodeKind::Other,
		}
	}

	fn tag_name(&self, node: &NodeId) -> Option<&str> {
		self.doc.tag(*node)
	}

	fn attribute(&self, node: &NodeId, name: &str) -> Option<&str> {
		self.doc.attribute(*node, name)
	}

	fn text_content(&self, node: &NodeId) -> Option<&str> {
		self.doc.text(*node)
	}

	fn first_child(&self, node: &NodeId) -> Option<NodeId> {
		self.doc.first_child(*node)
	}

	fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
		self.doc.next_sibling(*node)
	}

	fn previous_sibling(&self, node: &NodeId) -> Option<NodeId> {
		self.doc.previous_sibling(*node)
	}

	fn parent_node(&self, node: &NodeId) -> Option<NodeId> {
		self.doc.parent(*node)
	}

	/// `html` hangs off the document; `head` and `body` off `html`.
	fn resolve_singleton(&self, ty: &str, container: &NodeId) -> Result<NodeId, ReconcileError> {
		let document = self.singleton_scope(*container);
		let html = self
			.doc
			.children(document)
			.iter()
			.copied()
			.find(|&n| self.doc.tag(n) == Some("html"));
		let found = match ty {
			"html" => html,
			_ => html.and_then(|html| {
				self.doc
					.children(html)
					.iter()
					.copied()
					.find(|&n| self.doc.tag(n) == Some(ty))
			}),
		};
		found.ok_or_else(|| ReconcileError::MissingSingleton { ty: ty.to_string() })
	}

	fn acquire_singleton(&mut self, node: &NodeId, props: &Props) {
		self.apply_props(*node, props);
	}

	fn precache_fiber(&mut self, node: &NodeId, fiber: FiberId) {
		self.fibers.insert(*node, fiber);
	}

	fn fiber_of(&self, node: &NodeId) -> Option<FiberId> {
		self.fibers.get(node).copied()
	}

	fn commit_hydrated_container(&mut self, container: &NodeId) {
		self.ops.push(HostOp::HydratedContainer(*container));
	}

	fn commit_hydrated_suspense_instance(&mut self, marker: &NodeId) {
		self.ops.push(HostOp::HydratedBoundary(*marker));
	}

	fn notify_unblocked(&mut self, marker: &NodeId) {
		tracing::trace!(%marker, "host.unblocked");
		self.unblocked.push(*marker);
	}

	fn current_event_priority(&self) -> EventPriority {
		self.event_priority.unwrap_or_default()
	}

	fn report_fatal_error(&mut self, container: &NodeId, error: &ReconcileError) {
		self.fatal.push(FatalReport {
			container: *container,
			error: error.clone(),
		});
	}

	fn report_recoverable_error(&mut self, error: &HydrationError) {
		self.recoverable.push(error.clone());
	}
}

#[cfg(test)]
mod tests;
