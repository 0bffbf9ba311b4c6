use pretty_assertions::assert_eq;
use trellis_host_memory::HostOp;
use trellis_reconciler::element::host;
use trellis_reconciler::{Element, Lanes};

use crate::common::*;

#[test]
fn legacy_updates_are_sync() {
	let (mut runtime, container) = client_runtime();
	let root = runtime.create_legacy_root(container);

	let lane = runtime
		.reconciler_mut()
		.update_container(root, host("p").child("now").build())
		.expect("update");
	assert_eq!(lane, Lanes::SYNC);
	runtime.flush_sync();
	assert_eq!(markup(&runtime, container), "<p>now</p>");
}

#[test]
fn legacy_hydration_patches_text() {
	let (mut runtime, container) = server_runtime(&host("p").child("old").build());

	runtime
		.hydrate_legacy_root(container, host("p").child("new").build())
		.expect("hydrate");

	assert_eq!(markup(&runtime, container), "<p>new</p>");
	assert_eq!(creations(&runtime), 0);
	assert!(has_op(&runtime, |op| matches!(op, HostOp::SetText { text, .. } if text == "new")));
	assert!(runtime.host().recoverable_errors().is_empty());
}

#[test]
fn legacy_hydration_deletes_extra_server_nodes() {
	let server: Element = host("div")
		.child(host("p").child("a"))
		.child(host("span").child("extra"))
		.build();
	let (mut runtime, container) = server_runtime(&server);

	runtime
		.hydrate_legacy_root(container, host("div").child(host("p").child("a")).build())
		.expect("hydrate");

	assert_eq!(markup(&runtime, container), "<div><p>a</p></div>");
	assert!(has_op(&runtime, |op| matches!(op, HostOp::Remove { .. })));
	assert_eq!(creations(&runtime), 0);
}

#[test]
fn legacy_hydration_inserts_missing_nodes() {
	let (mut runtime, container) = server_runtime(&host("div").child(host("p").child("a")).build());

	runtime
		.hydrate_legacy_root(
			container,
			host("div").child(host("p").child("a")).child(host("em").child("new")).build(),
		)
		.expect("hydrate");

	assert_eq!(markup(&runtime, container), "<div><p>a</p><em>new</em></div>");
	assert!(has_op(&runtime, |op| matches!(op, HostOp::CreateElement { tag, .. } if tag == "em")));
}
