use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use trellis_reconciler::element::{host, suspense, text};
use trellis_reconciler::{Lanes, Scheduler};
use trellis_replay::{ContinuousSlot, ReplayConfig};

use super::*;
use crate::document::Namespace;
use crate::host::HostOp;
use crate::prerender::prerender;

fn button() -> Element {
	host("button").prop("id", "go").child("Go").build()
}

fn client_rendered(config: RuntimeConfig) -> (MemoryRuntime, RootId, NodeId) {
	let mut doc = Document::new();
	let container = doc.create_element("div", Namespace::Html);
	doc.append_child(doc.root(), container);
	let mut runtime = MemoryRuntime::new(doc, config);
	let root = runtime.create_root(container);
	runtime.render(root, button()).expect("render");
	runtime.flush();
	(runtime, root, container)
}

fn server_rendered(element: &Element, config: RuntimeConfig) -> (MemoryRuntime, NodeId) {
	let (doc, container) = prerender(element).expect("prerender");
	(MemoryRuntime::new(doc, config), container)
}

#[test]
fn events_on_mounted_content_are_delivered_directly() {
	let (mut runtime, _, container) = client_rendered(RuntimeConfig::default());
	let target = runtime.document().element_by_id(container, "go").expect("button");

	assert_eq!(runtime.dispatch_event(EventKind::Click, target), DispatchOutcome::Delivered);
	let delivered = runtime.take_delivered();
	assert_eq!(delivered.len(), 1);
	assert_eq!(delivered[0].container, container);
	assert!(!delivered[0].replayed());
}

#[test]
fn handler_updates_take_the_event_priority() {
	let (mut runtime, root, container) = client_rendered(RuntimeConfig::default());
	let target = runtime.document().element_by_id(container, "go").expect("button");
	let lanes = Rc::new(RefCell::new(Vec::new()));
	let seen = Rc::clone(&lanes);
	runtime.set_handler(move |_, reconciler| {
		seen.borrow_mut().push(reconciler.request_update_lane(root).expect("lane"));
	});

	runtime.dispatch_event(EventKind::Click, target);
	runtime.dispatch_event(EventKind::MouseMove, target);
	runtime.dispatch_event(EventKind::Load, target);
	assert_eq!(*lanes.borrow(), vec![Lanes::SYNC, Lanes::INPUT_CONTINUOUS, Lanes::DEFAULT]);
	assert_eq!(runtime.host().current_event_priority(), EventPriority::DEFAULT);
}

#[test]
fn targets_outside_any_root_use_the_document() {
	let (mut runtime, _, _) = client_rendered(RuntimeConfig::default());
	let stray = runtime.document().root();
	assert_eq!(runtime.dispatch_event(EventKind::Click, stray), DispatchOutcome::Delivered);
	assert_eq!(runtime.delivered()[0].container, stray);
}

#[test]
fn discrete_event_forces_root_hydration() {
	let (mut runtime, container) = server_rendered(&button(), RuntimeConfig::default());
	runtime.hydrate_root(container, button()).expect("hydrate");
	let target = runtime.document().element_by_id(container, "go").expect("button");

	assert_eq!(runtime.dispatch_event(EventKind::Click, target), DispatchOutcome::Queued);
	let delivered = runtime.take_delivered();
	assert_eq!(delivered.len(), 1);
	assert!(delivered[0].replayed());
	assert!(!runtime.replay_queue().has_queued_discrete_events());
	assert!(!runtime.host().ops().iter().any(HostOp::is_creation));
}

#[test]
fn blocked_events_that_cannot_replay_are_dropped() {
	let (mut runtime, container) = server_rendered(&button(), RuntimeConfig::default());
	runtime.hydrate_root(container, button()).expect("hydrate");
	let target = runtime.document().element_by_id(container, "go").expect("button");

	assert_eq!(runtime.dispatch_event(EventKind::Scroll, target), DispatchOutcome::Dropped);
	assert!(runtime.delivered().is_empty());
}

#[test]
fn discrete_replay_can_be_disabled() {
	let config = RuntimeConfig {
		replay: ReplayConfig {
			discrete: false,
			continuous: true,
		},
		..RuntimeConfig::default()
	};
	let (mut runtime, container) = server_rendered(&button(), config);
	runtime.hydrate_root(container, button()).expect("hydrate");
	let target = runtime.document().element_by_id(container, "go").expect("button");

	assert_eq!(runtime.dispatch_event(EventKind::Click, target), DispatchOutcome::Dropped);
	runtime.flush();
	assert!(runtime.delivered().is_empty());
}

#[test]
fn continuous_event_replays_once_the_root_hydrates() {
	let tree = host("main")
		.child(button())
		.child(suspense([host("p").child("later").build()], [text("loading")]))
		.build();
	let (mut runtime, container) = server_rendered(&tree, RuntimeConfig::default());
	runtime.hydrate_root(container, tree).expect("hydrate");
	let target = runtime.document().element_by_id(container, "go").expect("button");

	assert_eq!(runtime.dispatch_event(EventKind::MouseOver, target), DispatchOutcome::Queued);
	assert!(runtime.replay_queue().queued_continuous_event(ContinuousSlot::Mouse, None).is_some());
	runtime.flush();

	let delivered = runtime.take_delivered();
	assert_eq!(delivered.len(), 1);
	assert!(delivered[0].replayed());
	assert_eq!(delivered[0].event.kind, EventKind::MouseOver);
	assert!(!runtime.replay_queue().has_queued_continuous_events());
}

#[test]
fn leaving_clears_a_queued_hover() {
	let (mut runtime, container) = server_rendered(&button(), RuntimeConfig::default());
	runtime.hydrate_root(container, button()).expect("hydrate");
	let target = runtime.document().element_by_id(container, "go").expect("button");

	runtime.dispatch_event(EventKind::MouseOver, target);
	assert_eq!(runtime.dispatch_event(EventKind::MouseOut, target), DispatchOutcome::Dropped);
	assert!(!runtime.replay_queue().has_queued_continuous_events());
}

#[test]
fn unknown_host_tasks_are_skipped() {
	let (mut runtime, _, _) = client_rendered(RuntimeConfig::default());
	runtime
		.reconciler_mut()
		.scheduler_mut()
		.schedule(SchedulerPriority::Normal, Task::Host(99));
	assert!(runtime.has_pending_tasks());
	assert_eq!(runtime.flush(), 1);
	assert!(!runtime.has_pending_tasks());
}
