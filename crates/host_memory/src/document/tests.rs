use pretty_assertions::assert_eq;

use super::*;

fn sample() -> (Document, NodeId, NodeId, NodeId) {
	let mut doc = Document::new();
	let div = doc.create_element("DIV", Namespace::Html);
	let a = doc.create_text("a");
	let b = doc.create_comment("$");
	doc.append_child(doc.root(), div);
	doc.append_child(div, a);
	doc.append_child(div, b);
	(doc, div, a, b)
}

#[test]
fn siblings_follow_child_order() {
	let (doc, div, a, b) = sample();
	assert_eq!(doc.first_child(div), Some(a));
	assert_eq!(doc.next_sibling(a), Some(b));
	assert_eq!(doc.previous_sibling(b), Some(a));
	assert_eq!(doc.previous_sibling(a), None);
	assert_eq!(doc.next_sibling(b), None);
	assert_eq!(doc.tag(div), Some("div"));
}

#[test]
fn insert_before_moves_an_attached_node() {
	let (mut doc, div, a, b) = sample();
	doc.insert_before(div, b, a);
	assert_eq!(doc.children(div), &[b, a]);

	let span = doc.create_element("span", Namespace::Html);
	doc.append_child(span, a);
	assert_eq!(doc.children(div), &[b]);
	assert_eq!(doc.parent(a), Some(span));
}

#[test]
fn removal_detaches_but_keeps_the_handle() {
	let (mut doc, div, a, b) = sample();
	assert!(doc.remove_child(div, a));
	assert!(!doc.remove_child(div, a));
	assert_eq!(doc.parent(a), None);
	assert_eq!(doc.text(a), Some("a"));
	assert_eq!(doc.children(div), &[b]);
}

#[test]
fn markup_reflects_attributes_and_visibility() {
	let (mut doc, div, a, _) = sample();
	doc.set_attribute(div, "id", "x");
	doc.set_attribute(div, "hidden", "");
	assert_eq!(doc.inner_markup(doc.root()), "<div id=\"x\" hidden>a<!--$--></div>");

	doc.remove_attribute(div, "hidden");
	doc.set_hidden(a, true);
	doc.set_hidden(div, true);
	assert_eq!(doc.outer_markup(div), "<div id=\"x\" style=\"display: none\"><!--$--></div>");
	assert!(doc.is_hidden(div));
}

#[test]
fn lookups_search_in_document_order() {
	let (mut doc, div, a, _) = sample();
	doc.set_attribute(div, "id", "outer");
	assert_eq!(doc.element_by_id(doc.root(), "outer"), Some(div));
	assert_eq!(doc.text_node(doc.root(), "a"), Some(a));
	assert!(doc.contains(doc.root(), a));
	assert!(!doc.contains(a, div));
}

#[test]
fn releasing_a_detached_subtree_frees_its_nodes() {
	let (mut doc, div, a, b) = sample();
	let before = doc.len();
	assert!(doc.release(div).is_empty());

	assert!(doc.remove_child(doc.root(), div));
	let freed = doc.release(div);
	assert_eq!(freed, vec![div, a, b]);
	assert_eq!(doc.len(), before - 3);
	assert!(!doc.is_live(a));
	assert_eq!(doc.data(div), None);
	assert!(doc.children(div).is_empty());
	assert!(doc.release(div).is_empty());
}

#[test]
fn stale_handles_do_not_see_a_reused_slot() {
	let (mut doc, div, a, _) = sample();
	doc.remove_child(div, a);
	doc.release(a);

	let fresh = doc.create_text("fresh");
	assert_eq!(fresh.index(), a.index());
	assert_ne!(fresh, a);
	assert_eq!(doc.text(a), None);
	assert_eq!(doc.text(fresh), Some("fresh"));

	doc.append_child(div, a);
	assert_eq!(doc.children(div).len(), 1);
	assert_eq!(doc.parent(fresh), None);
}
