use pretty_assertions::assert_eq;
use trellis_host_memory::{HostOp, Prerenderer};
use trellis_reconciler::{HydrationError, ReconcileError, RootPhase};
use trellis_reconciler::element::{component, host, suspense, text};

use crate::common::*;

fn page() -> trellis_reconciler::Element {
	host("main")
		.prop("class", "app")
		.child(host("h1").prop("id", "title").child("Hello"))
		.child(host("p").child("one").child("two"))
		.build()
}

#[test]
fn matching_markup_hydrates_without_creating_nodes() {
	let (mut runtime, container) = server_runtime(&page());
	let before = markup(&runtime, container);

	runtime.hydrate_root(container, page()).expect("hydrate");
	runtime.flush();

	assert_eq!(creations(&runtime), 0);
	assert!(has_op(&runtime, |op| *op == HostOp::HydratedContainer(container)));
	assert!(runtime.host().recoverable_errors().is_empty());
	assert_eq!(markup(&runtime, container), before);

	let title = by_id(&runtime, container, "title");
	assert!(runtime.reconciler().closest_instance(&title).is_some());
	assert_eq!(runtime.reconciler().blocking_instance(&title), None);
}

fn page_with_metadata() -> trellis_reconciler::Element {
	host("div")
		.child(host("title").child("Docs"))
		.child(host("meta").prop("name", "x"))
		.child(host("p").prop("id", "body").child("hi"))
		.child(host("script").prop("async", true).prop("src", "a.js"))
		.build()
}

#[test]
fn skip_listed_elements_adopt_their_server_nodes() {
	let (mut runtime, container) = server_runtime(&page_with_metadata());
	let before = markup(&runtime, container);
	let div = runtime.document().first_child(container).expect("div");
	let server_title = runtime.document().first_child(div).expect("title");

	runtime.hydrate_root(container, page_with_metadata()).expect("hydrate");
	runtime.flush();

	assert_eq!(creations(&runtime), 0);
	assert!(!has_op(&runtime, |op| matches!(op, HostOp::Remove { .. })));
	assert!(runtime.host().recoverable_errors().is_empty());
	assert_eq!(markup(&runtime, container), before);
	assert!(runtime.reconciler().closest_instance(&server_title).is_some());
}

#[test]
fn server_only_metadata_is_left_alone() {
	let (mut runtime, container) = server_runtime(&page_with_metadata());
	let client = host("div").child(host("p").prop("id", "body").child("hi")).build();

	runtime.hydrate_root(container, client).expect("hydrate");
	runtime.flush();

	assert_eq!(creations(&runtime), 0);
	assert!(runtime.host().recoverable_errors().is_empty());
	assert!(!has_op(&runtime, |op| matches!(op, HostOp::ClearContainer(_))));
	assert!(markup(&runtime, container).contains("<meta name=\"x\">"));
}

#[test]
fn hydrated_props_are_patched() {
	let (mut runtime, container) = server_runtime(&page());
	let client = host("main")
		.prop("class", "app dark")
		.child(host("h1").prop("id", "title").child("Hello"))
		.child(host("p").child("one").child("two"))
		.build();

	runtime.hydrate_root(container, client).expect("hydrate");
	runtime.flush();

	assert_eq!(creations(&runtime), 0);
	let main = runtime.document().first_child(container).expect("main");
	assert_eq!(runtime.document().attribute(main, "class"), Some("app dark"));
	assert!(has_op(&runtime, |op| matches!(op, HostOp::Update { node, .. } if *node == main)));
}

#[test]
fn root_mismatch_client_renders() {
	let (mut runtime, container) = server_runtime(&host("p").child("server").build());

	runtime
		.hydrate_root(container, host("section").child("client").build())
		.expect("hydrate");
	runtime.flush();

	assert_eq!(markup(&runtime, container), "<section>client</section>");
	assert!(has_op(&runtime, |op| *op == HostOp::ClearContainer(container)));
	let errors = runtime.host().recoverable_errors();
	assert_eq!(errors.len(), 1);
	assert!(matches!(&errors[0], HydrationError::UnexpectedNode { expected, .. } if expected == "<section>"));
}

#[test]
fn text_mismatch_client_renders() {
	let (mut runtime, container) = server_runtime(&host("p").child("before").build());

	runtime.hydrate_root(container, host("p").child("after").build()).expect("hydrate");
	runtime.flush();

	assert_eq!(markup(&runtime, container), "<p>after</p>");
	assert!(matches!(
		runtime.host().recoverable_errors(),
		[HydrationError::TextMismatch { server, client }] if server == "before" && client == "after"
	));
}

#[test]
fn mismatch_inside_a_boundary_only_client_renders_the_boundary() {
	let server = host("div")
		.child(host("h1").prop("id", "title").child("Kept"))
		.child(suspense([host("p").child("server").build()], [text("loading")]))
		.build();
	let client = host("div")
		.child(host("h1").prop("id", "title").child("Kept"))
		.child(suspense([host("em").child("client").build()], [text("loading")]))
		.build();
	let (mut runtime, container) = server_runtime(&server);
	let title = by_id(&runtime, container, "title");

	runtime.hydrate_root(container, client).expect("hydrate");
	runtime.flush();

	assert_eq!(by_id(&runtime, container, "title"), title);
	assert!(!has_op(&runtime, |op| matches!(op, HostOp::ClearContainer(_))));
	assert_eq!(markup(&runtime, container), "<div><h1 id=\"title\">Kept</h1><em>client</em></div>");
	assert_eq!(runtime.host().recoverable_errors().len(), 1);
}

#[test]
fn server_errored_boundary_reports_its_digest() {
	let server = host("div")
		.child(suspense([component(Fails("E500"))], [text("sorry")]))
		.build();
	let client = host("div")
		.child(suspense([host("b").child("recovered").build()], [text("sorry")]))
		.build();
	let (mut runtime, container) = server_runtime(&server);
	assert!(markup(&runtime, container).contains("<!--$!--><template data-dgst=\"E500\"></template>"));

	runtime.hydrate_root(container, client).expect("hydrate");
	runtime.flush();

	assert_eq!(markup(&runtime, container), "<div><b>recovered</b></div>");
	assert!(matches!(
		runtime.host().recoverable_errors(),
		[HydrationError::ServerError { digest: Some(d) }] if d == "E500"
	));
}

#[test]
fn streamed_boundary_hydrates_after_its_content_arrives() {
	let pending = trellis_reconciler::Resource::pending();
	let server = host("div")
		.child(suspense([component(Reads(pending))], [text("loading")]))
		.build();
	let client = host("div")
		.child(suspense([host("em").child("done").build()], [text("loading")]))
		.build();
	let (mut runtime, container) = server_runtime(&server);
	let div = runtime.document().first_child(container).expect("div");
	let marker = runtime.document().first_child(div).expect("marker");

	runtime.hydrate_root(container, client).expect("hydrate");
	runtime.flush();
	assert!(!has_op(&runtime, |op| *op == HostOp::HydratedBoundary(marker)));
	assert_eq!(runtime.reconciler().blocking_instance(&marker), Some(marker));

	Prerenderer::new(runtime.reconciler_mut().host_mut().document_mut())
		.complete_pending(marker, &[host("em").child("done").build()])
		.expect("stream");
	assert!(runtime.retry_dehydrated_boundary(marker));
	runtime.flush();

	assert!(has_op(&runtime, |op| *op == HostOp::HydratedBoundary(marker)));
	assert_eq!(creations(&runtime), 0);
	assert!(runtime.host().recoverable_errors().is_empty());
	assert!(!runtime.retry_dehydrated_boundary(marker));
}

#[test]
fn missing_body_singleton_fails_the_root() {
	let (mut runtime, container) = client_runtime();
	let root = runtime.create_root(container);

	runtime.render(root, host("body").child("x").build()).expect("render");
	runtime.flush();

	let fatal = runtime.host().fatal_errors();
	assert_eq!(fatal.len(), 1);
	assert_eq!(fatal[0].container, container);
	assert!(matches!(
		&fatal[0].error,
		ReconcileError::MissingSingleton { ty } if ty == "body"
	));
	assert_eq!(runtime.reconciler().root_phase(root), Some(RootPhase::Idle));
	assert_eq!(markup(&runtime, container), "");
}
