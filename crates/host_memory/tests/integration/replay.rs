use pretty_assertions::assert_eq;
use trellis_host_memory::{DispatchOutcome, HostOp};
use trellis_reconciler::element::{host, suspense, text};
use trellis_reconciler::{Element, EventPriority, Lanes};
use trellis_replay::EventKind;

use crate::common::*;

/// A button outside any boundary and one inside a boundary.
fn app() -> Element {
	host("main")
		.child(host("button").prop("id", "outer").child("Outer"))
		.child(suspense(
			[host("section")
				.child(host("button").prop("id", "inner").child("Inner"))
				.build()],
			[text("loading")],
		))
		.build()
}

#[test]
fn click_inside_a_dehydrated_boundary_is_replayed_after_it_hydrates() {
	let (mut runtime, container) = server_runtime(&app());
	runtime.hydrate_root(container, app()).expect("hydrate");
	let inner = by_id(&runtime, container, "inner");

	assert_eq!(runtime.dispatch_event(EventKind::Click, inner), DispatchOutcome::Queued);
	assert!(runtime.delivered().is_empty());
	assert!(runtime.replay_queue().has_queued_discrete_events());

	runtime.flush();

	let delivered = runtime.take_delivered();
	assert_eq!(delivered.len(), 1);
	assert_eq!(delivered[0].event.target, inner);
	assert!(delivered[0].replayed());
	assert!(!runtime.replay_queue().has_queued_discrete_events());
	assert_eq!(creations(&runtime), 0);
	assert_eq!(runtime.reconciler().blocking_instance(&inner), None);
}

#[test]
fn queued_clicks_replay_in_arrival_order() {
	let (mut runtime, container) = server_runtime(&app());
	runtime.hydrate_root(container, app()).expect("hydrate");
	let inner = by_id(&runtime, container, "inner");
	let outer = by_id(&runtime, container, "outer");

	runtime.dispatch_event(EventKind::Click, inner);
	runtime.dispatch_event(EventKind::KeyDown, inner);
	runtime.flush();
	assert_eq!(runtime.dispatch_event(EventKind::Click, outer), DispatchOutcome::Delivered);

	let order: Vec<_> = runtime
		.take_delivered()
		.into_iter()
		.map(|d| (d.event.kind, d.replayed()))
		.collect();
	assert_eq!(
		order,
		vec![
			(EventKind::Click, true),
			(EventKind::KeyDown, true),
			(EventKind::Click, false),
		]
	);
}

#[test]
fn event_outside_the_boundary_waits_only_for_the_root() {
	let (mut runtime, container) = server_runtime(&app());
	runtime.hydrate_root(container, app()).expect("hydrate");
	let outer = by_id(&runtime, container, "outer");
	let inner = by_id(&runtime, container, "inner");

	assert_eq!(runtime.dispatch_event(EventKind::Click, outer), DispatchOutcome::Queued);
	let delivered = runtime.take_delivered();
	assert_eq!(delivered.len(), 1);
	assert!(delivered[0].replayed());

	let marker = runtime.reconciler().blocking_instance(&inner).expect("boundary still dehydrated");
	assert!(!has_op(&runtime, |op| *op == HostOp::HydratedBoundary(marker)));
}

#[test]
fn explicit_target_pulls_its_boundary_forward() {
	let (mut runtime, container) = server_runtime(&app());
	runtime.hydrate_root(container, app()).expect("hydrate");
	runtime.run_tasks(1);
	let inner = by_id(&runtime, container, "inner");
	let marker = runtime.reconciler().blocking_instance(&inner).expect("boundary dehydrated");

	runtime.queue_explicit_hydration_target(inner);
	assert_eq!(runtime.replay_queue().explicit_target_count(), 1);
	runtime.flush();

	assert!(has_op(&runtime, |op| *op == HostOp::HydratedBoundary(marker)));
	assert_eq!(runtime.replay_queue().explicit_target_count(), 0);
}

#[test]
fn explicit_targets_take_the_dispatching_event_priority() {
	let (mut runtime, container) = server_runtime(&app());
	let root = runtime.hydrate_root(container, app()).expect("hydrate");
	runtime.run_tasks(1);
	let inner = by_id(&runtime, container, "inner");

	let previous = runtime
		.reconciler_mut()
		.host_mut()
		.set_event_priority(Some(EventPriority::DISCRETE));
	runtime.queue_explicit_hydration_target(inner);
	runtime.reconciler_mut().host_mut().set_event_priority(previous);

	let pending = runtime.reconciler().pending_lanes(root).expect("root");
	assert!(pending.contains(Lanes::SYNC_HYDRATION));
}

#[test]
fn pointer_hover_is_kept_per_pointer() {
	let (mut runtime, container) = server_runtime(&app());
	runtime.hydrate_root(container, app()).expect("hydrate");
	let outer = by_id(&runtime, container, "outer");

	runtime.dispatch_pointer_event(EventKind::PointerOver, outer, 1);
	runtime.dispatch_pointer_event(EventKind::PointerOver, outer, 2);
	runtime.dispatch_pointer_event(EventKind::PointerOut, outer, 1);
	runtime.flush();

	let pointers: Vec<_> = runtime
		.take_delivered()
		.into_iter()
		.filter(|d| d.replayed())
		.filter_map(|d| d.event.pointer_id)
		.collect();
	assert_eq!(pointers, vec![2]);
}
