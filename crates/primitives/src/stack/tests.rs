use proptest::prelude::*;

use super::*;

#[test]
fn push_pop_restores_previous_value() {
	let mut stack = ValueStack::<&str, u32>::new(true);
	let mut cursor = Cursor::new("root");
	stack.push(&mut cursor, "a", 1);
	stack.push(&mut cursor, "b", 2);
	assert_eq!(*cursor.current(), "b");
	stack.pop(&mut cursor, 2).unwrap();
	assert_eq!(*cursor.current(), "a");
	stack.pop(&mut cursor, 1).unwrap();
	assert_eq!(*cursor.current(), "root");
	assert!(stack.is_empty());
	assert!(stack.check_empty().is_ok());
}

#[test]
fn pop_on_empty_is_underflow() {
	let mut stack = ValueStack::<u8, u32>::new(true);
	let mut cursor = Cursor::new(7);
	assert_eq!(stack.pop(&mut cursor, 1), Err(StackError::Underflow));
	assert_eq!(cursor.get(), 7);
}

#[test]
fn owner_mismatch_is_detected_when_validating() {
	let mut stack = ValueStack::<u8, u32>::new(true);
	let mut cursor = Cursor::new(0);
	stack.push(&mut cursor, 1, 10);
	assert_eq!(
		stack.pop(&mut cursor, 11),
		Err(StackError::OwnerMismatch { expected: 10, actual: 11 })
	);
	assert_eq!(cursor.get(), 0);
}

#[test]
fn owner_mismatch_is_ignored_without_validation() {
	let mut stack = ValueStack::<u8, u32>::new(false);
	let mut cursor = Cursor::new(0);
	stack.push(&mut cursor, 1, 10);
	assert!(stack.pop(&mut cursor, 11).is_ok());
}

#[test]
fn reset_after_fatal_clears_entries() {
	let mut stack = ValueStack::<u8, u32>::new(true);
	let mut cursor = Cursor::new(0);
	stack.push(&mut cursor, 1, 1);
	stack.push(&mut cursor, 2, 2);
	assert_eq!(stack.check_empty(), Err(StackError::NotEmpty { depth: 2 }));
	stack.reset_after_fatal();
	assert!(stack.is_empty());
	assert_eq!(stack.pop(&mut cursor, 2), Err(StackError::Underflow));
}

proptest! {
	#[test]
	fn prop_reverse_pops_restore_initial(initial in any::<i32>(), values in prop::collection::vec(any::<i32>(), 0..64)) {
		let mut stack = ValueStack::<i32, usize>::new(true);
		let mut cursor = Cursor::new(initial);
		for (owner, value) in values.iter().enumerate() {
			stack.push(&mut cursor, *value, owner);
		}
		for owner in (0..values.len()).rev() {
			prop_assert_eq!(cursor.get(), values[owner]);
			prop_assert!(stack.pop(&mut cursor, owner).is_ok());
		}
		prop_assert_eq!(cursor.get(), initial);
		prop_assert!(stack.is_empty());
	}

	#[test]
	fn prop_swapped_owner_detected(values in prop::collection::vec(any::<i32>(), 2..32)) {
		let mut stack = ValueStack::<i32, usize>::new(true);
		let mut cursor = Cursor::new(0);
		for (owner, value) in values.iter().enumerate() {
			stack.push(&mut cursor, *value, owner);
		}
		let wrong = values.len() - 2;
		let is_mismatch = matches!(
			stack.pop(&mut cursor, wrong),
			Err(StackError::OwnerMismatch { .. })
		);
		prop_assert!(is_mismatch);
	}
}
