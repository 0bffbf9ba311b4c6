use pretty_assertions::assert_eq;
use trellis_host_memory::{RuntimeConfig, SchedulerConfig};
use trellis_reconciler::element::{host, text};
use trellis_reconciler::{Element, Lanes};

use crate::common::*;

fn list(len: usize) -> Element {
	host("ul")
		.children((0..len).map(|i| host("li").child(text(&i.to_string())).build()))
		.build()
}

fn sliced() -> RuntimeConfig {
	RuntimeConfig {
		scheduler: SchedulerConfig { yield_budget: Some(2) },
		..RuntimeConfig::default()
	}
}

#[test]
fn transition_renders_across_several_tasks() {
	let (mut runtime, container) = client_runtime_with(sliced());
	let root = runtime.create_root(container);

	let lane = runtime
		.reconciler_mut()
		.start_transition(|r| r.update_container(root, list(8)))
		.expect("update");
	assert!(lane.intersects(Lanes::TRANSITIONS));

	assert_eq!(runtime.run_tasks(1), 1);
	assert!(runtime.reconciler().is_rendering());
	assert!(runtime.has_pending_tasks());
	assert_eq!(markup(&runtime, container), "");

	assert!(runtime.flush() > 1);
	assert!(!runtime.reconciler().is_rendering());
	assert!(markup(&runtime, container).starts_with("<ul><li>0</li>"));
	assert_eq!(runtime.document().descendants(container).len(), 17);
}

#[test]
fn default_updates_do_not_yield() {
	let (mut runtime, container) = client_runtime_with(sliced());
	let root = runtime.create_root(container);

	runtime.render(root, list(8)).expect("render");
	assert_eq!(runtime.run_tasks(1), 1);
	assert!(!runtime.reconciler().is_rendering());
	assert_eq!(runtime.document().descendants(container).len(), 17);
}

#[test]
fn sync_update_interrupts_a_sliced_render() {
	let (mut runtime, container) = client_runtime_with(sliced());
	let root = runtime.create_root(container);
	runtime
		.reconciler_mut()
		.start_transition(|r| r.update_container(root, list(8)))
		.expect("update");
	runtime.run_tasks(1);
	assert!(runtime.reconciler().is_rendering());

	runtime
		.reconciler_mut()
		.flush_sync(|r| r.update_container(root, text("urgent")))
		.expect("update");
	assert_eq!(markup(&runtime, container), "urgent");
}

#[test]
fn shrinking_a_list_frees_the_removed_nodes() {
	let (mut runtime, container) = client_runtime();
	let root = runtime.create_root(container);

	runtime.render(root, list(8)).expect("render");
	runtime.flush();
	let full = runtime.document().len();

	runtime.render(root, list(2)).expect("render");
	runtime.flush();
	assert_eq!(runtime.document().descendants(container).len(), 5);
	assert_eq!(runtime.document().len(), full - 12);
	assert_eq!(runtime.document().len(), 2 + runtime.document().descendants(container).len());
}
