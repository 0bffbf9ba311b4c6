//! Shared fixtures for runtime integration tests.

use std::cell::RefCell;
use std::rc::Rc;

use trellis_host_memory::{Document, HostOp, MemoryRuntime, Namespace, NodeId, RuntimeConfig, prerender};
use trellis_reconciler::element::text;
use trellis_reconciler::{Cache, Component, Element, RenderContext, RenderError, Rendered, Resource};

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt::try_init();
}

/// A runtime over an empty `<div>` container.
pub fn client_runtime() -> (MemoryRuntime, NodeId) {
	client_runtime_with(RuntimeConfig::default())
}

pub fn client_runtime_with(config: RuntimeConfig) -> (MemoryRuntime, NodeId) {
	init_tracing();
	let mut doc = Document::new();
	let container = doc.create_element("div", Namespace::Html);
	doc.append_child(doc.root(), container);
	(MemoryRuntime::new(doc, config), container)
}

/// A runtime over the pre-rendered output of `element`.
pub fn server_runtime(element: &Element) -> (MemoryRuntime, NodeId) {
	init_tracing();
	let (doc, container) = prerender(element).expect("prerender");
	(MemoryRuntime::new(doc, RuntimeConfig::default()), container)
}

pub fn markup(runtime: &MemoryRuntime, container: NodeId) -> String {
	runtime.document().inner_markup(container)
}

pub fn creations(runtime: &MemoryRuntime) -> usize {
	runtime.host().ops().iter().filter(|op| op.is_creation()).count()
}

pub fn has_op(runtime: &MemoryRuntime, wanted: impl Fn(&HostOp) -> bool) -> bool {
	runtime.host().ops().iter().any(wanted)
}

pub fn by_id(runtime: &MemoryRuntime, container: NodeId, id: &str) -> NodeId {
	runtime
		.document()
		.element_by_id(container, id)
		.unwrap_or_else(|| panic!("no element #{id}"))
}

/// Renders the value of a resource as text.
#[derive(Debug)]
pub struct Reads(pub Resource<String>);

impl Component for Reads {
	fn render(&self, cx: &mut RenderContext<'_>) -> Rendered {
		let value = cx.read(&self.0)?;
		Ok(text(&value))
	}
}

/// Always fails with the given digest.
#[derive(Debug)]
pub struct Fails(pub &'static str);

impl Component for Fails {
	fn render(&self, _cx: &mut RenderContext<'_>) -> Rendered {
		Err(RenderError::new("server only").with_digest(self.0).into())
	}
}

/// Records the cache it rendered with.
#[derive(Debug)]
pub struct GrabCache(pub Rc<RefCell<Option<Rc<Cache>>>>);

impl Component for GrabCache {
	fn render(&self, cx: &mut RenderContext<'_>) -> Rendered {
		*self.0.borrow_mut() = cx.cache().cloned();
		Ok(text("cached"))
	}
}
