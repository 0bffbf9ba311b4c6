use pretty_assertions::assert_eq;

use super::*;
use crate::element::{host, text};

fn unit(arena: &mut FiberArena<u32>, kind: FiberKind, parent: Option<FiberId>) -> FiberId {
	let mut fiber = Fiber::new(kind, Element::empty(), None, FiberMode::CONCURRENT);
	fiber.return_fiber = parent;
	let id = arena.insert(fiber);
	if let Some(parent) = parent {
		match arena[parent].child {
			None => arena[parent].child = Some(id),
			Some(first) => {
				let mut last = first;
				while let Some(next) = arena[last].sibling {
					last = next;
				}
				arena[last].sibling = Some(id);
			}
		}
	}
	id
}

#[test]
fn work_in_progress_is_paired_with_current() {
	let mut arena = FiberArena::default();
	let root = unit(&mut arena, FiberKind::HostRoot, None);
	arena[root].lanes = Lanes::DEFAULT;
	arena[root].flags = FiberFlags::PLACEMENT;

	let wip = arena.create_work_in_progress(root, text("next"));
	assert_eq!(arena[wip].alternate, Some(root));
	assert_eq!(arena[root].alternate, Some(wip));
	assert_eq!(arena[wip].lanes, Lanes::DEFAULT);
	assert_eq!(arena[wip].flags, FiberFlags::empty());

	let again = arena.create_work_in_progress(root, text("later"));
	assert_eq!(again, wip);
	assert_eq!(arena.len(), 2);
}

#[test]
fn reused_buffer_drops_stale_effects() {
	let mut arena = FiberArena::default();
	let current = unit(&mut arena, FiberKind::HostComponent("div".into()), None);
	let wip = arena.create_work_in_progress(current, host("div").build());
	arena[wip].flags = FiberFlags::UPDATE | FiberFlags::CHILD_DELETION;
	arena[wip].deletions.push(FiberId::from_index(42));
	arena[wip].update_payload = Some(PropsDiff::default());

	let reused = arena.create_work_in_progress(current, host("div").build());
	assert_eq!(reused, wip);
	assert_eq!(arena[reused].flags, FiberFlags::empty());
	assert!(arena[reused].deletions.is_empty());
	assert!(arena[reused].update_payload.is_none());
}

#[test]
fn children_iterates_in_order() {
	let mut arena = FiberArena::default();
	let root = unit(&mut arena, FiberKind::HostRoot, None);
	let a = unit(&mut arena, FiberKind::HostText, Some(root));
	let b = unit(&mut arena, FiberKind::Fragment, Some(root));
	let c = unit(&mut arena, FiberKind::HostText, Some(root));
	let _nested = unit(&mut arena, FiberKind::HostText, Some(b));

	assert_eq!(arena.children(root).collect::<Vec<_>>(), vec![a, b, c]);
	assert_eq!(arena.children(a).count(), 0);
}

#[test]
fn sweep_keeps_live_trees_and_their_alternates() {
	let mut arena = FiberArena::default();
	let root = unit(&mut arena, FiberKind::HostRoot, None);
	let kept = unit(&mut arena, FiberKind::HostText, Some(root));
	let alternate = arena.create_work_in_progress(kept, text("x"));
	let orphan = unit(&mut arena, FiberKind::Fragment, None);
	let orphan_child = unit(&mut arena, FiberKind::HostText, Some(orphan));

	let mut freed = arena.sweep([root]);
	freed.sort();
	assert_eq!(freed, vec![orphan, orphan_child]);
	assert!(arena.contains(root));
	assert!(arena.contains(kept));
	assert!(arena.contains(alternate));
	assert_eq!(arena.len(), 3);
}

#[test]
fn sweep_clears_pointers_to_freed_alternates() {
	let mut arena = FiberArena::default();
	let old_root = unit(&mut arena, FiberKind::HostRoot, None);
	let old_child = unit(&mut arena, FiberKind::HostText, Some(old_root));
	let new_root = arena.create_work_in_progress(old_root, Element::empty());
	let replacement = unit(&mut arena, FiberKind::HostText, None);
	arena[new_root].child = Some(replacement);
	arena[replacement].return_fiber = Some(new_root);

	// The replaced child is only reachable through the old root, which is
	// kept as an alternate but not traversed.
	let _ = arena.create_work_in_progress(old_child, text("stale"));
	let freed = arena.sweep([new_root]);
	assert!(freed.contains(&old_child));
	assert!(arena.contains(old_root));
	assert_eq!(arena[new_root].alternate, Some(old_root));
	assert!(
		arena
			.children(new_root)
			.all(|id| arena[id].alternate.is_none_or(|alt| arena.contains(alt)))
	);
}
