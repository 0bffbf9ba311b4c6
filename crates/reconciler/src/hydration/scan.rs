//! Walks pre-rendered host output in document order.

use crate::config::HydrationConfig;
use crate::host::{HostConfig, NodeKind, markers};

/// Read-only view of pre-rendered nodes that knows which ones hydration
/// steps over.
pub struct Scanner<'a, H: HostConfig> {
	host: &'a H,
	config: &'a HydrationConfig,
}

impl<'a, H: HostConfig> Scanner<'a, H> {
	pub fn new(host: &'a H, config: &'a HydrationConfig) -> Self {
		Self { host, config }
	}

	/// First claimable node at or after `node`. Stops at a boundary end
	/// marker, which closes the enclosing parent.
	pub fn next_hydratable(&self, node: Option<H::Node>) -> Option<H::Node> {
		self.scan(node, false)
	}

	/// Like [`Scanner::next_hydratable`], but also stops at elements the
	/// skip rules step over. The hydration cursor rests on these positions so
	/// a skip-listed client element can still adopt its server node.
	pub fn next_position(&self, node: Option<H::Node>) -> Option<H::Node> {
		self.scan(node, true)
	}

	fn scan(&self, mut node: Option<H::Node>, keep_skipped: bool) -> Option<H::Node> {
		while let Some(current) = node {
			match self.host.node_kind(&current) {
				NodeKind::Element => {
					if keep_skipped || !self.is_skipped(&current) {
						return Some(current);
					}
				}
				NodeKind::Text => return Some(current),
				NodeKind::Comment => match self.host.text_content(&current) {
					Some(data) if markers::is_start(data) => return Some(current),
					Some(markers::SUSPENSE_END) => return None,
					_ => {}
				},
				NodeKind::Other => {}
			}
			node = self.host.next_sibling(&current);
		}
		None
	}

	/// Whether `node` is an element the skip rules step over.
	pub fn is_skipped(&self, node: &H::Node) -> bool {
		self.host.node_kind(node) == NodeKind::Element
			&& self
				.config
				.skips(self.host.tag_name(node).unwrap_or_default(), |name| self.host.attribute(node, name))
	}

	pub fn next_hydratable_sibling(&self, node: &H::Node) -> Option<H::Node> {
		self.next_hydratable(self.host.next_sibling(node))
	}

	pub fn next_sibling_position(&self, node: &H::Node) -> Option<H::Node> {
		self.next_position(self.host.next_sibling(node))
	}

	pub fn first_child_position(&self, parent: &H::Node) -> Option<H::Node> {
		self.next_position(self.host.first_child(parent))
	}

	/// Cursor position after the end marker matching `marker`.
	pub fn skip_past_dehydrated(&self, marker: &H::Node) -> Option<H::Node> {
		let mut depth = 0usize;
		let mut node = self.host.next_sibling(marker);
		while let Some(current) = node {
			if self.host.node_kind(&current) == NodeKind::Comment {
				match self.host.text_content(&current) {
					Some(markers::SUSPENSE_END) if depth == 0 => return self.next_sibling_position(&current),
					Some(markers::SUSPENSE_END) => depth -= 1,
					Some(data) if markers::is_start(data) => depth += 1,
					_ => {}
				}
			}
			node = self.host.next_sibling(&current);
		}
		None
	}

	/// Start marker of the innermost boundary range that contains `node`
	/// among its preceding siblings.
	pub fn enclosing_marker(&self, node: &H::Node) -> Option<H::Node> {
		let mut depth = 0usize;
		let mut prev = self.host.previous_sibling(node);
		while let Some(current) = prev {
			if self.host.node_kind(&current) == NodeKind::Comment {
				match self.host.text_content(&current) {
					Some(data) if markers::is_start(data) => {
						if depth == 0 {
							return Some(current);
						}
						depth -= 1;
					}
					Some(markers::SUSPENSE_END) => depth += 1,
					_ => {}
				}
			}
			prev = self.host.previous_sibling(&current);
		}
		None
	}

	/// Short description of a node for diagnostics.
	pub fn describe(&self, node: &H::Node) -> String {
		match self.host.node_kind(node) {
			NodeKind::Element => format!("<{}>", self.host.tag_name(node).unwrap_or("?")),
			NodeKind::Text => format!("text {:?}", self.host.text_content(node).unwrap_or_default()),
			NodeKind::Comment => format!("comment {:?}", self.host.text_content(node).unwrap_or_default()),
			NodeKind::Other => "node".to_string(),
		}
	}
}
