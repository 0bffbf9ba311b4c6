//! Save/restore stack for contextual values during tree traversal.
//!
//! A [`Cursor`] holds the value visible to the unit currently being processed.
//! Entering a unit that provides a new value pushes the cursor's previous
//! value onto a [`ValueStack`] and installs the new one; leaving the unit pops
//! the saved value back. Pops must mirror pushes exactly. In validated mode
//! the stack also records which unit pushed each entry and rejects a pop from
//! a different unit, which catches traversal bugs where begin and complete
//! disagree on what was pushed.

use std::fmt;

use thiserror::Error;

/// The value visible at the current traversal position.
#[derive(Debug, Clone, Default)]
pub struct Cursor<T> {
	current: T,
}

impl<T> Cursor<T> {
	pub const fn new(default: T) -> Self {
		Self { current: default }
	}

	pub fn current(&self) -> &T {
		&self.current
	}

	pub fn replace(&mut self, value: T) -> T {
		std::mem::replace(&mut self.current, value)
	}
}

impl<T: Clone> Cursor<T> {
	pub fn get(&self) -> T {
		self.current.clone()
	}
}

/// Misuse of a [`ValueStack`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StackError<O: fmt::Debug> {
	#[error("unexpected pop from an empty context stack")]
	Underflow,
	#[error("context stack popped by {actual:?}, but the top entry was pushed by {expected:?}")]
	OwnerMismatch { expected: O, actual: O },
	#[error("context stack not empty after traversal: {depth} entries left")]
	NotEmpty { depth: usize },
}

/// Array-backed stack of saved cursor values.
#[derive(Debug, Clone)]
pub struct ValueStack<T, O> {
	values: Vec<T>,
	owners: Vec<O>,
	validate: bool,
}

impl<T, O> Default for ValueStack<T, O> {
	fn default() -> Self {
		Self {
			values: Vec::new(),
			owners: Vec::new(),
			validate: cfg!(debug_assertions),
		}
	}
}

impl<T, O: Copy + PartialEq + fmt::Debug> ValueStack<T, O> {
	/// Creates a stack. With `validate` set, every pop is checked against the
	/// owner that pushed the entry.
	pub fn new(validate: bool) -> Self {
		Self {
			values: Vec::new(),
			owners: Vec::new(),
			validate,
		}
	}

	/// Saves `cursor`'s current value and installs `value`.
	pub fn push(&mut self, cursor: &mut Cursor<T>, value: T, owner: O) {
		let previous = cursor.replace(value);
		self.values.push(previous);
		if self.validate {
			self.owners.push(owner);
		}
	}

	/// Restores the value saved by the matching [`push`](Self::push).
	///
	/// An owner mismatch still restores the value so the traversal state stays
	/// consistent with the push count; the error is for the caller to escalate.
	pub fn pop(&mut self, cursor: &mut Cursor<T>, owner: O) -> Result<(), StackError<O>> {
		let Some(previous) = self.values.pop() else {
			return Err(StackError::Underflow);
		};
		cursor.replace(previous);
		if self.validate
			&& let Some(expected) = self.owners.pop()
			&& expected != owner
		{
			return Err(StackError::OwnerMismatch { expected, actual: owner });
		}
		Ok(())
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn depth(&self) -> usize {
		self.values.len()
	}

	/// Fails when entries remain, i.e. some push was never popped.
	pub fn check_empty(&self) -> Result<(), StackError<O>> {
		if self.values.is_empty() {
			Ok(())
		} else {
			Err(StackError::NotEmpty { depth: self.values.len() })
		}
	}

	/// Drops every saved entry without restoring anything.
	///
	/// Used after an aborted traversal, where unwinding push by push is not
	/// possible; the caller resets its cursors separately.
	pub fn reset_after_fatal(&mut self) {
		self.values.clear();
		self.owners.clear();
	}
}

#[cfg(test)]
mod tests;
