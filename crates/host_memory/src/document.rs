//! Arena-backed document tree.
//!
//! Removing a node only detaches it. A detached subtree is freed with
//! [`Document::release`]; every handle carries the stamp of the node it was
//! issued for, so a handle to a freed node reads as missing even after its
//! slot is reused.

use std::fmt::{self, Write as _};

use indexmap::IndexMap;
use slab::Slab;

/// Handle to one node of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
	index: usize,
	stamp: u64,
}

impl NodeId {
	pub fn index(self) -> usize {
		self.index
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.index)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Namespace {
	#[default]
	Html,
	Svg,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
	Document,
	Element {
		tag: String,
		namespace: Namespace,
		attrs: IndexMap<String, String>,
		hidden: bool,
	},
	Text {
		data: String,
		hidden: bool,
	},
	Comment(String),
}

#[derive(Debug)]
struct Entry {
	stamp: u64,
	data: NodeData,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
}

#[derive(Debug)]
pub struct Document {
	nodes: Slab<Entry>,
	root: NodeId,
	next_stamp: u64,
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl Document {
	pub fn new() -> Self {
		let mut doc = Self {
			nodes: Slab::new(),
			root: NodeId { index: 0, stamp: 0 },
			next_stamp: 0,
		};
		doc.root = doc.insert(NodeData::Document);
		doc
	}

	/// The document node itself.
	pub fn root(&self) -> NodeId {
		self.root
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	fn insert(&mut self, data: NodeData) -> NodeId {
		let stamp = self.next_stamp;
		self.next_stamp += 1;
		let index = self.nodes.insert(Entry {
			stamp,
			data,
			parent: None,
			children: Vec::new(),
		});
		NodeId { index, stamp }
	}

	fn entry(&self, node: NodeId) -> Option<&Entry> {
		self.nodes.get(node.index).filter(|entry| entry.stamp == node.stamp)
	}

	fn entry_mut(&mut self, node: NodeId) -> Option<&mut Entry> {
		self.nodes.get_mut(node.index).filter(|entry| entry.stamp == node.stamp)
	}

	/// Whether `node` still refers to a live node.
	pub fn is_live(&self, node: NodeId) -> bool {
		self.entry(node).is_some()
	}

	/// Frees `node` and everything below it when `node` is detached.
	/// Returns the freed handles; attached, freed or root nodes are left
	/// alone.
	pub fn release(&mut self, node: NodeId) -> Vec<NodeId> {
		if node == self.root || self.entry(node).is_none_or(|entry| entry.parent.is_some()) {
			return Vec::new();
		}
		let mut freed = vec![node];
		freed.extend(self.descendants(node));
		for released in &freed {
			self.nodes.remove(released.index);
		}
		freed
	}

	pub fn create_element(&mut self, tag: &str, namespace: Namespace) -> NodeId {
		self.insert(NodeData::Element {
			tag: tag.to_ascii_lowercase(),
			namespace,
			attrs: IndexMap::new(),
			hidden: false,
		})
	}

	pub fn create_text(&mut self, data: &str) -> NodeId {
		self.insert(NodeData::Text {
			data: data.to_string(),
			hidden: false,
		})
	}

	pub fn create_comment(&mut self, data: &str) -> NodeId {
		self.insert(NodeData::Comment(data.to_string()))
	}

	pub fn data(&self, node: NodeId) -> Option<&NodeData> {
		self.entry(node).map(|entry| &entry.data)
	}

	pub fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.entry(node)?.parent
	}

	pub fn children(&self, node: NodeId) -> &[NodeId] {
		self.entry(node).map(|entry| entry.children.as_slice()).unwrap_or_default()
	}

	pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
		self.children(node).first().copied()
	}

	fn position(&self, node: NodeId) -> Option<(NodeId, usize)> {
		let parent = self.parent(node)?;
		let index = self.children(parent).iter().position(|&c| c == node)?;
		Some((parent, index))
	}

	pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
		let (parent, index) = self.position(node)?;
		self.children(parent).get(index + 1).copied()
	}

	pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
		let (parent, index) = self.position(node)?;
		index.checked_sub(1).and_then(|i| self.children(parent).get(i).copied())
	}

	fn detach(&mut self, node: NodeId) {
		if let Some((parent, index)) = self.position(node)
			&& let Some(entry) = self.entry_mut(parent)
		{
			entry.children.remove(index);
		}
		if let Some(entry) = self.entry_mut(node) {
			entry.parent = None;
		}
	}

	pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
		if !self.is_live(child) {
			return;
		}
		self.detach(child);
		if let Some(entry) = self.entry_mut(parent) {
			entry.children.push(child);
			self.set_parent(child, parent);
		}
	}

	fn set_parent(&mut self, child: NodeId, parent: NodeId) {
		if let Some(entry) = self.entry_mut(child) {
			entry.parent = Some(parent);
		}
	}

	/// Inserts `child` before `before`, or appends it when `before` is not a
	/// child of `parent`.
	pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: NodeId) {
		if !self.is_live(child) {
			return;
		}
		self.detach(child);
		let Some(entry) = self.entry_mut(parent) else {
			return;
		};
		match entry.children.iter().position(|&c| c == before) {
			Some(index) => entry.children.insert(index, child),
			None => entry.children.push(child),
		}
		self.set_parent(child, parent);
	}

	/// Detaches `child` from `parent`. Returns false when it was not a child.
	pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
		if self.parent(child) != Some(parent) {
			return false;
		}
		self.detach(child);
		true
	}

	pub fn tag(&self, node: NodeId) -> Option<&str> {
		match self.data(node)? {
			NodeData::Element { tag, .. } => Some(tag),
			_ => None,
		}
	}

	pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
		match self.data(node)? {
			NodeData::Element { attrs, .. } => attrs.get(name).map(String::as_str),
			_ => None,
		}
	}

	pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
		if let Some(Entry {
			data: NodeData::Element { attrs, .. },
			..
		}) = self.entry_mut(node)
		{
			attrs.insert(name.to_string(), value.to_string());
		}
	}

	pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
		if let Some(Entry {
			data: NodeData::Element { attrs, .. },
			..
		}) = self.entry_mut(node)
		{
			attrs.shift_remove(name);
		}
	}

	/// Data of a text or comment node.
	pub fn text(&self, node: NodeId) -> Option<&str> {
		match self.data(node)? {
			NodeData::Text { data, .. } | NodeData::Comment(data) => Some(data),
			_ => None,
		}
	}

	pub fn set_text(&mut self, node: NodeId, value: &str) {
		match self.entry_mut(node).map(|entry| &mut entry.data) {
			Some(NodeData::Text { data, .. } | NodeData::Comment(data)) => *data = value.to_string(),
			_ => {}
		}
	}

	pub fn set_hidden(&mut self, node: NodeId, value: bool) {
		match self.entry_mut(node).map(|entry| &mut entry.data) {
			Some(NodeData::Element { hidden, .. } | NodeData::Text { hidden, .. }) => *hidden = value,
			_ => {}
		}
	}

	pub fn is_hidden(&self, node: NodeId) -> bool {
		matches!(
			self.data(node),
			Some(NodeData::Element { hidden: true, .. } | NodeData::Text { hidden: true, .. })
		)
	}

	/// Whether `node` is `ancestor` or sits below it.
	pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
		let mut next = Some(node);
		while let Some(current) = next {
			if current == ancestor {
				return true;
			}
			next = self.parent(current);
		}
		false
	}

	/// All nodes below `node` in document order.
	pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
		while let Some(current) = stack.pop() {
			out.push(current);
			stack.extend(self.children(current).iter().rev());
		}
		out
	}

	/// First element below `node` whose `id` attribute is `id`.
	pub fn element_by_id(&self, node: NodeId, id: &str) -> Option<NodeId> {
		self.descendants(node)
			.into_iter()
			.find(|&n| self.attribute(n, "id") == Some(id))
	}

	/// First text node below `node` with exactly `data`.
	pub fn text_node(&self, node: NodeId, data: &str) -> Option<NodeId> {
		self.descendants(node).into_iter().find(|&n| {
			matches!(self.data(n), Some(NodeData::Text { data: d, .. }) if d == data)
		})
	}

	/// Markup of everything below `node`. Hidden elements carry
	/// `style="display: none"` and hidden text is left out.
	pub fn inner_markup(&self, node: NodeId) -> String {
		let mut out = String::new();
		for &child in self.children(node) {
			self.write_markup(child, &mut out);
		}
		out
	}

	pub fn outer_markup(&self, node: NodeId) -> String {
		let mut out = String::new();
		self.write_markup(node, &mut out);
		out
	}

	fn write_markup(&self, node: NodeId, out: &mut String) {
		match self.data(node) {
			Some(NodeData::Element {
				tag, attrs, hidden, ..
			}) => {
				out.push('<');
				out.push_str(tag);
				for (name, value) in attrs {
					if value.is_empty() {
						let _ = write!(out, " {name}");
					} else {
						let _ = write!(out, " {name}=\"{value}\"");
					}
				}
				if *hidden {
					out.push_str(" style=\"display: none\"");
				}
				out.push('>');
				for &child in self.children(node) {
					self.write_markup(child, out);
				}
				let _ = write!(out, "</{tag}>");
			}
			Some(NodeData::Text { data, hidden: false }) => out.push_str(data),
			Some(NodeData::Text { hidden: true, .. }) => {}
			Some(NodeData::Comment(data)) => {
				let _ = write!(out, "<!--{data}-->");
			}
			Some(NodeData::Document) => {
				for &child in self.children(node) {
					self.write_markup(child, out);
				}
			}
			None => {}
		}
	}
}

#[cfg(test)]
mod tests;
