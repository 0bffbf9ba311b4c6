//! Server-style output for hydration fixtures.
//!
//! Renders an element tree straight into a [`Document`] the way a streaming
//! server would: suspense boundaries are wrapped in marker comments, with
//! `$` for resolved content, `$?` for a boundary still waiting on data
//! (its fallback is emitted instead), and `$!` for a boundary that errored
//! (fallback plus a `template` carrying the error digest). Adjacent text is
//! separated by an empty comment so each text node can be claimed on its
//! own.

use std::rc::Rc;

use thiserror::Error;
use trellis_reconciler::element::{Element, OffscreenMode};
use trellis_reconciler::host::markers;
use trellis_reconciler::{Cache, Interrupt, RenderContext, RenderError};

use crate::document::{Document, Namespace, NodeData, NodeId};

const TEXT_SEPARATOR: &str = " ";

#[derive(Debug, Error)]
pub enum PrerenderError {
	#[error("render error outside any boundary: {0}")]
	Uncaught(RenderError),
	#[error("suspended outside any suspense boundary")]
	SuspendedAtRoot,
	#[error("{0} is not a pending boundary marker")]
	NotPending(NodeId),
}

/// Why a subtree stopped rendering.
enum Abort {
	Suspend,
	Error(RenderError),
}

impl From<Interrupt> for Abort {
	fn from(interrupt: Interrupt) -> Self {
		match interrupt {
			Interrupt::Suspend(_) => Abort::Suspend,
			Interrupt::Error(error) => Abort::Error(error),
		}
	}
}

pub struct Prerenderer<'d> {
	doc: &'d mut Document,
	cache: Option<Rc<Cache>>,
}

impl<'d> Prerenderer<'d> {
	pub fn new(doc: &'d mut Document) -> Self {
		Self { doc, cache: None }
	}

	/// Components render against `cache`, so a client sharing it sees the
	/// same data.
	pub fn with_cache(mut self, cache: Rc<Cache>) -> Self {
		self.cache = Some(cache);
		self
	}

	/// Appends the output of `element` to `container`.
	pub fn render_into(&mut self, container: NodeId, element: &Element) -> Result<(), PrerenderError> {
		let namespace = match self.doc.data(container) {
			Some(NodeData::Element { namespace, .. }) => *namespace,
			_ => Namespace::Html,
		};
		match self.render(container, element, namespace) {
			Ok(()) => Ok(()),
			Err(Abort::Suspend) => Err(PrerenderError::SuspendedAtRoot),
			Err(Abort::Error(error)) => Err(PrerenderError::Uncaught(error)),
		}
	}

	/// Streams in the content of a `$?` boundary: its fallback is replaced
	/// by `children` and the marker becomes `$`. If the content fails, the
	/// marker becomes `$!` and the fallback stays.
	pub fn complete_pending(&mut self, marker: NodeId, children: &[Element]) -> Result<(), PrerenderError> {
		if self.doc.text(marker) != Some(markers::SUSPENSE_PENDING) {
			return Err(PrerenderError::NotPending(marker));
		}
		let Some(parent) = self.doc.parent(marker) else {
			return Err(PrerenderError::NotPending(marker));
		};
		let inner = self.boundary_contents(marker);
		let Some((&end, fallback)) = inner.split_last() else {
			return Err(PrerenderError::NotPending(marker));
		};
		let namespace = self.namespace_of(parent);
		let (holder, result) = self.render_detached(children, namespace);
		match result {
			Ok(()) => {
				for &node in fallback {
					self.doc.remove_child(parent, node);
				}
				for child in self.doc.children(holder).to_vec() {
					self.doc.insert_before(parent, child, end);
				}
				self.doc.set_text(marker, markers::SUSPENSE_START);
				tracing::debug!(%marker, "prerender.complete");
			}
			Err(Abort::Suspend) => {}
			Err(Abort::Error(error)) => {
				self.doc.set_text(marker, markers::SUSPENSE_FALLBACK);
				let template = self.error_template(&error);
				if let Some(&first) = fallback.first() {
					self.doc.insert_before(parent, template, first);
				} else {
					self.doc.insert_before(parent, template, end);
				}
			}
		}
		Ok(())
	}

	/// Siblings after `marker` up to and including its end marker.
	fn boundary_contents(&self, marker: NodeId) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut depth = 0usize;
		let mut next = self.doc.next_sibling(marker);
		while let Some(node) = next {
			out.push(node);
			if matches!(self.doc.data(node), Some(NodeData::Comment(_))) {
				match self.doc.text(node) {
					Some(markers::SUSPENSE_END) if depth == 0 => return out,
					Some(markers::SUSPENSE_END) => depth -= 1,
					Some(data) if markers::is_start(data) => depth += 1,
					_ => {}
				}
			}
			next = self.doc.next_sibling(node);
		}
		Vec::new()
	}

	fn is_text(&self, node: NodeId) -> bool {
		matches!(self.doc.data(node), Some(NodeData::Text { .. }))
	}

	fn namespace_of(&self, node: NodeId) -> Namespace {
		match self.doc.data(node) {
			Some(NodeData::Element { namespace, .. }) => *namespace,
			_ => Namespace::Html,
		}
	}

	fn render(&mut self, parent: NodeId, element: &Element, namespace: Namespace) -> Result<(), Abort> {
		match element {
			Element::Host(host) => {
				let namespace = match &*host.ty {
					"svg" => Namespace::Svg,
					"foreignObject" => Namespace::Html,
					_ => namespace,
				};
				let node = self.doc.create_element(&host.ty, namespace);
				for (name, value) in host.props.iter() {
					if let Some(text) = value.to_attribute() {
						self.doc.set_attribute(node, name, &text);
					}
				}
				self.push(parent, node);
				self.render_children(node, &host.children, namespace)
			}
			Element::Text(text) => {
				if !text.is_empty() {
					let node = self.doc.create_text(text);
					self.push(parent, node);
				}
				Ok(())
			}
			Element::Component(component) => {
				let mut cx = RenderContext::detached(self.cache.clone());
				let rendered = component.component.render(&mut cx)?;
				self.render(parent, &rendered, namespace)
			}
			Element::Suspense(boundary) => {
				let (holder, result) = self.render_detached(&boundary.children, namespace);
				let start = match &result {
					Ok(()) => markers::SUSPENSE_START,
					Err(Abort::Suspend) => markers::SUSPENSE_PENDING,
					Err(Abort::Error(_)) => markers::SUSPENSE_FALLBACK,
				};
				let marker = self.doc.create_comment(start);
				self.push(parent, marker);
				match result {
					Ok(()) => self.adopt(holder, parent),
					Err(abort) => {
						if let Abort::Error(error) = &abort {
							tracing::debug!(%error, "prerender.boundary_errored");
							let template = self.error_template(error);
							self.push(parent, template);
						}
						self.render_children(parent, &boundary.fallback, namespace)?;
					}
				}
				let end = self.doc.create_comment(markers::SUSPENSE_END);
				self.push(parent, end);
				Ok(())
			}
			Element::ErrorBoundary(boundary) => {
				let (holder, result) = self.render_detached(&boundary.children, namespace);
				match result {
					Ok(()) => {
						self.adopt(holder, parent);
						Ok(())
					}
					Err(Abort::Error(error)) => self.render(parent, &(boundary.fallback)(&error), namespace),
					Err(Abort::Suspend) => Err(Abort::Suspend),
				}
			}
			Element::Offscreen(offscreen) if offscreen.mode == OffscreenMode::Hidden => Ok(()),
			other => self.render_children(parent, other.children(), namespace),
		}
	}

	fn render_children(&mut self, parent: NodeId, children: &[Element], namespace: Namespace) -> Result<(), Abort> {
		for child in children {
			self.render(parent, child, namespace)?;
		}
		Ok(())
	}

	/// Renders `children` under a detached holder so a failed subtree leaves
	/// nothing behind.
	fn render_detached(&mut self, children: &[Element], namespace: Namespace) -> (NodeId, Result<(), Abort>) {
		let holder = self.doc.create_element("template", namespace);
		let result = self.render_children(holder, children, namespace);
		(holder, result)
	}

	fn adopt(&mut self, holder: NodeId, parent: NodeId) {
		for child in self.doc.children(holder).to_vec() {
			self.push(parent, child);
		}
	}

	fn error_template(&mut self, error: &RenderError) -> NodeId {
		let template = self.doc.create_element("template", Namespace::Html);
		if let Some(digest) = error.digest() {
			self.doc.set_attribute(template, "data-dgst", digest);
		}
		template
	}

	/// Appends `node`, separating it from a preceding text node.
	fn push(&mut self, parent: NodeId, node: NodeId) {
		let last = self.doc.children(parent).last().copied();
		if self.is_text(node) && last.is_some_and(|last| self.is_text(last)) {
			let separator = self.doc.create_comment(TEXT_SEPARATOR);
			self.doc.append_child(parent, separator);
		}
		self.doc.append_child(parent, node);
	}
}

/// Renders `element` into a fresh document under `<div id="root">` and
/// returns both.
pub fn prerender(element: &Element) -> Result<(Document, NodeId), PrerenderError> {
	let mut doc = Document::new();
	let container = doc.create_element("div", Namespace::Html);
	doc.set_attribute(container, "id", "root");
	doc.append_child(doc.root(), container);
	Prerenderer::new(&mut doc).render_into(container, element)?;
	Ok((doc, container))
}
