use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;

fn id(n: usize) -> FiberId {
	FiberId::from_index(n)
}

const VISIBLE: BoundaryEntry = BoundaryEntry {
	avoid_fallback: false,
	dehydrated: false,
	shows_content: true,
};

const AVOIDED: BoundaryEntry = BoundaryEntry {
	avoid_fallback: true,
	dehydrated: false,
	shows_content: true,
};

#[test]
fn nearest_regular_boundary_captures() {
	let mut stack = SuspenseStack::new(true);
	assert_eq!(stack.handler(), None);
	stack.push_primary(id(1), VISIBLE);
	stack.push_primary(id(2), VISIBLE);
	assert_eq!(stack.handler(), Some(id(2)));

	stack.pop(id(2)).unwrap();
	assert_eq!(stack.handler(), Some(id(1)));
	stack.pop(id(1)).unwrap();
	assert!(stack.is_empty());
}

#[rstest]
#[case::under_visible_ancestor(Some(VISIBLE), AVOIDED, 1)]
#[case::without_ancestor(None, AVOIDED, 2)]
#[case::dehydrated_under_visible_ancestor(
	Some(VISIBLE),
	BoundaryEntry { dehydrated: true, ..AVOIDED },
	2
)]
#[case::under_avoided_ancestor(Some(AVOIDED), AVOIDED, 2)]
#[case::under_ancestor_showing_fallback(
	Some(BoundaryEntry { shows_content: false, ..VISIBLE }),
	AVOIDED,
	2
)]
fn avoided_boundary_capture(#[case] outer: Option<BoundaryEntry>, #[case] inner: BoundaryEntry, #[case] expected: usize) {
	let mut stack = SuspenseStack::new(true);
	if let Some(entry) = outer {
		stack.push_primary(id(1), entry);
	}
	stack.push_primary(id(2), inner);
	assert_eq!(stack.handler(), Some(id(expected)));
}

#[test]
fn fallback_and_offscreen_keep_enclosing_handler() {
	let mut stack = SuspenseStack::new(true);
	stack.push_primary(id(1), VISIBLE);
	stack.push_fallback(id(2));
	assert_eq!(stack.handler(), Some(id(1)));
	stack.push_offscreen(id(3));
	assert_eq!(stack.handler(), Some(id(1)));
	stack.pop(id(3)).unwrap();
	stack.pop(id(2)).unwrap();
	stack.pop(id(1)).unwrap();
	assert!(stack.is_empty());
}

#[test]
fn mismatched_pop_is_reported() {
	let mut stack = SuspenseStack::new(true);
	stack.push_primary(id(1), VISIBLE);
	assert!(matches!(stack.pop(id(9)), Err(ReconcileError::Stack { .. })));
}

#[test]
fn avoided_boundary_inside_offscreen_defers_to_visible_ancestor() {
	let mut stack = SuspenseStack::new(true);
	stack.push_primary(id(1), VISIBLE);
	stack.push_offscreen(id(2));
	stack.push_primary(id(3), AVOIDED);
	assert_eq!(stack.handler(), Some(id(1)));
}
