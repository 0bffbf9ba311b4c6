use pretty_assertions::assert_eq;
use trellis_primitives::StackError;

use super::*;
use crate::element::ContextKey;

fn id(n: usize) -> FiberId {
	FiberId::from_index(n)
}

#[test]
fn balanced_traversal_leaves_stacks_empty() {
	let mut stacks = RenderStacks::<u32, ()>::new(Lanes::DEFAULT, true);
	stacks.host_container.push(Some(7), id(2));
	stacks.render_lanes.push(Lanes::DEFAULT | Lanes::OFFSCREEN, id(3));
	assert_eq!(stacks.render_lanes(), Lanes::DEFAULT | Lanes::OFFSCREEN);
	stacks.render_lanes.pop(id(3)).unwrap();
	stacks.host_container.pop(id(2)).unwrap();
	assert_eq!(stacks.render_lanes(), Lanes::DEFAULT);
	assert!(stacks.check_empty(id(1)).is_ok());
}

#[test]
fn unpopped_entry_fails_the_empty_check() {
	let mut stacks = RenderStacks::<u32, ()>::new(Lanes::DEFAULT, true);
	stacks.host_container.push(Some(7), id(2));
	let error = stacks.check_empty(id(1)).unwrap_err();
	assert!(matches!(
		error,
		ReconcileError::Stack {
			fiber,
			error: StackError::NotEmpty { depth: 1 },
		} if fiber == id(1)
	));
}

#[test]
fn reset_after_fatal_drops_every_stack() {
	let mut stacks = RenderStacks::<u32, ()>::new(Lanes::DEFAULT, true);
	stacks.host_container.push(Some(7), id(2));
	stacks.suspense.push_fallback(id(3));
	let key = ContextKey::new(0u8);
	stacks.providers.push(key.id(), Rc::new(5u8), id(4));

	assert_eq!(stacks.reset_after_fatal(), 4);
	assert!(stacks.check_empty(id(1)).is_ok());
}
