use pretty_assertions::assert_eq;
use rstest::rstest;
use trellis_reconciler::element::{PropChange, PropValue};

use super::*;

fn page() -> (MemoryHost, NodeId, NodeId) {
	let mut doc = Document::new();
	let html = doc.create_element("html", Namespace::Html);
	let head = doc.create_element("head", Namespace::Html);
	let body = doc.create_element("body", Namespace::Html);
	let app = doc.create_element("div", Namespace::Html);
	doc.append_child(doc.root(), html);
	doc.append_child(html, head);
	doc.append_child(html, body);
	doc.append_child(body, app);
	(MemoryHost::with_document(doc), body, app)
}

#[test]
fn created_instances_carry_their_props() {
	let mut host = MemoryHost::new();
	let props = Props::new().with("id", "a").with("disabled", true).with("hidden", false);
	let node = host.create_instance("button", &props, &Namespace::Html);
	assert_eq!(host.document().attribute(node, "id"), Some("a"));
	assert_eq!(host.document().attribute(node, "disabled"), Some(""));
	assert_eq!(host.document().attribute(node, "hidden"), None);
	assert!(host.ops()[0].is_creation());
}

#[test]
fn updates_apply_removals_and_changes() {
	let mut host = MemoryHost::new();
	let node = host.create_instance("a", &Props::new().with("href", "/x").with("title", "t"), &Namespace::Html);
	let diff = PropsDiff {
		changes: vec![
			PropChange {
				name: "title".into(),
				value: None,
			},
			PropChange {
				name: "href".into(),
				value: Some(PropValue::from("/y")),
			},
		],
	};
	host.commit_update(&node, "a", &diff);
	assert_eq!(host.document().attribute(node, "href"), Some("/y"));
	assert_eq!(host.document().attribute(node, "title"), None);
	assert_eq!(host.ops().last(), Some(&HostOp::Update { node, changes: 2 }));
}

#[test]
fn clearing_the_document_keeps_singletons() {
	let (mut host, body, app) = page();
	let root = host.document().root();
	host.clear_container(&root);
	assert_eq!(host.document().parent(app), None);
	assert_eq!(host.document().parent(body).and_then(|p| host.document().tag(p)), Some("html"));
	assert_eq!(host.document().inner_markup(root), "<html><head></head><body></body></html>");
	assert!(!host.document().is_live(app));
	assert_eq!(host.document().len(), 4);
}

#[test]
fn removed_children_are_freed_with_their_fibers() {
	let (mut host, body, app) = page();
	let text = host.create_text_instance("x", &Namespace::Html);
	host.append_child(&app, &text);
	host.precache_fiber(&text, FiberId::from_index(7));

	host.remove_child(&body, &app);
	assert!(!host.document().is_live(app));
	assert!(!host.document().is_live(text));
	assert_eq!(host.fiber_of(&text), None);
	assert!(matches!(host.ops().last(), Some(HostOp::Remove { child, .. }) if *child == app));
}

#[test]
fn singletons_resolve_from_any_container() {
	let (host, body, app) = page();
	assert_eq!(host.resolve_singleton("body", &app).ok(), Some(body));
	assert!(host.resolve_singleton("html", &app).is_ok());

	let bare = MemoryHost::new();
	let root = bare.document().root();
	assert!(matches!(
		bare.resolve_singleton("head", &root),
		Err(ReconcileError::MissingSingleton { ty }) if ty == "head"
	));
}

#[rstest]
#[case(Namespace::Html, "div", Namespace::Html)]
#[case(Namespace::Html, "svg", Namespace::Svg)]
#[case(Namespace::Svg, "g", Namespace::Svg)]
#[case(Namespace::Svg, "foreignObject", Namespace::Html)]
#[case(Namespace::Html, "foreignObject", Namespace::Html)]
fn namespace_follows_the_element_type(#[case] parent: Namespace, #[case] ty: &str, #[case] expected: Namespace) {
	assert_eq!(MemoryHost::new().child_host_context(&parent, ty), expected);
}

#[test]
fn event_priority_defaults_outside_events() {
	let mut host = MemoryHost::new();
	assert_eq!(host.current_event_priority(), EventPriority::DEFAULT);
	host.set_event_priority(Some(EventPriority::DISCRETE));
	assert_eq!(host.current_event_priority(), EventPriority::DISCRETE);
}
