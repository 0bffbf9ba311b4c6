use std::cell::Cell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use trellis_reconciler::element::{component, error_boundary, host, suspense, text};
use trellis_reconciler::{Component, Element, Lanes, RenderContext, RenderError, Rendered, Resource, RootPhase};

use crate::common::*;

fn boundary(data: &Resource<String>) -> Element {
	host("div")
		.child(suspense(
			[host("p").child(component(Reads(data.clone()))).build()],
			[text("loading")],
		))
		.build()
}

#[test]
fn fallback_is_replaced_once_data_arrives() {
	let (mut runtime, container) = client_runtime();
	let root = runtime.create_root(container);
	let data = Resource::pending();

	runtime.render(root, boundary(&data)).expect("render");
	runtime.flush();
	assert_eq!(markup(&runtime, container), "<div>loading</div>");

	data.resolve("ready".to_string());
	runtime.flush();
	assert_eq!(markup(&runtime, container), "<div><p>ready</p></div>");
}

/// Counts its renders.
#[derive(Debug)]
struct Counts(Rc<Cell<usize>>);

impl Component for Counts {
	fn render(&self, _cx: &mut RenderContext<'_>) -> Rendered {
		self.0.set(self.0.get() + 1);
		Ok(text("side"))
	}
}

#[test]
fn only_the_suspended_boundary_is_retried() {
	let (mut runtime, container) = client_runtime();
	let root = runtime.create_root(container);
	let data = Resource::pending();
	let renders = Rc::new(Cell::new(0));
	let tree = host("div")
		.child(component(Counts(Rc::clone(&renders))))
		.child(suspense(
			[host("p").child(component(Reads(data.clone()))).build()],
			[text("loading")],
		))
		.build();

	runtime.render(root, tree).expect("render");
	runtime.flush();
	assert!(markup(&runtime, container).contains("loading"));
	assert_eq!(runtime.reconciler().committed_lanes(root), Some(Lanes::DEFAULT));
	let before = runtime.reconciler().pending_lanes(root).expect("root");
	assert!(!before.includes_some(Lanes::RETRIES));
	let sibling_renders = renders.get();

	data.resolve("ready".to_string());
	runtime.reconciler_mut().process_pings();
	let pending = runtime.reconciler().pending_lanes(root).expect("root");
	let retry = pending & Lanes::RETRIES;
	assert!(retry.includes_only_retries());
	assert_eq!(retry.lanes().count(), 1);
	assert!(!pending.includes_some(Lanes::DEFAULT));

	runtime.flush();
	let committed = runtime.reconciler().committed_lanes(root).expect("root");
	assert!(retry.is_subset_of(committed));
	assert!(!committed.includes_some(Lanes::DEFAULT));
	let after = runtime.reconciler().pending_lanes(root).expect("root");
	assert!(!after.includes_some(Lanes::RETRIES));
	assert_eq!(renders.get(), sibling_renders);
	assert_eq!(markup(&runtime, container), "<div>side<p>ready</p></div>");
}

#[test]
fn revealed_content_is_hidden_while_an_update_suspends() {
	let (mut runtime, container) = client_runtime();
	let root = runtime.create_root(container);
	runtime
		.render(root, boundary(&Resource::ready("one".to_string())))
		.expect("render");
	runtime.flush();
	assert_eq!(markup(&runtime, container), "<div><p>one</p></div>");

	let next = Resource::pending();
	runtime.render(root, boundary(&next)).expect("render");
	runtime.flush();
	let shown = markup(&runtime, container);
	assert!(shown.contains("<p style=\"display: none\">one</p>"), "{shown}");
	assert!(shown.contains("loading"), "{shown}");

	next.resolve("two".to_string());
	runtime.flush();
	assert_eq!(markup(&runtime, container), "<div><p>two</p></div>");
}

#[test]
fn rejected_data_reaches_the_error_boundary() {
	let (mut runtime, container) = client_runtime();
	let root = runtime.create_root(container);
	let data = Resource::pending();
	let tree = error_boundary([boundary(&data)], |error| text(&format!("failed: {}", error.message())));

	runtime.render(root, tree).expect("render");
	runtime.flush();
	data.reject(RenderError::new("offline"));
	runtime.flush();

	assert_eq!(markup(&runtime, container), "failed: offline");
}

#[test]
fn suspending_without_a_boundary_suspends_the_root() {
	let (mut runtime, container) = client_runtime();
	let root = runtime.create_root(container);
	let data = Resource::pending();

	runtime.render(root, component(Reads(data.clone()))).expect("render");
	runtime.flush();
	assert_eq!(runtime.reconciler().root_phase(root), Some(RootPhase::Suspended));
	assert!(!runtime.reconciler().suspended_lanes(root).expect("root").is_empty());
	assert_eq!(markup(&runtime, container), "");

	data.resolve("late".to_string());
	runtime.flush();
	assert_eq!(runtime.reconciler().root_phase(root), Some(RootPhase::Idle));
	assert_eq!(markup(&runtime, container), "late");
}
