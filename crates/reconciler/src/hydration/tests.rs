use pretty_assertions::assert_eq;

use super::*;

#[test]
fn enter_then_reset_keeps_buffered_errors() {
	let mut cx = HydrationContext::<u32>::default();
	assert!(!cx.is_hydrating);

	cx.enter(FiberId::from_index(3), Some(7));
	assert!(cx.is_hydrating);
	assert_eq!(cx.next, Some(7));
	cx.queue_error(HydrationError::UpdatedBeforeHydration);

	cx.reset();
	assert!(!cx.is_hydrating);
	assert_eq!(cx.parent, None);
	assert_eq!(cx.take_errors(), vec![HydrationError::UpdatedBeforeHydration]);
	assert!(cx.take_errors().is_empty());
}

#[test]
fn entering_clears_suspend_marker() {
	let mut cx = HydrationContext::<u32>::default();
	cx.did_suspend_or_error = true;
	cx.enter(FiberId::from_index(1), None);
	assert!(!cx.did_suspend_or_error);
	assert_eq!(cx.next, None);
}
