//! Contextual values of one render attempt.
//!
//! Each kind of value gets its own cursor and saved-value stack. Begin pushes
//! what a unit provides; complete (or unwind) pops it in reverse order. A
//! discarded attempt drops the whole set, so nothing has to be unwound by
//! hand.

use std::any::Any;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use trellis_primitives::{Cursor, FiberId, Lanes, ValueStack};

use crate::cache::Cache;
use crate::element::ContextId;
use crate::error::ReconcileError;
use crate::suspense::SuspenseStack;

/// A cursor with its saved-value stack.
#[derive(Debug)]
pub(crate) struct Tracked<T> {
	cursor: Cursor<T>,
	stack: ValueStack<T, FiberId>,
}

impl<T> Tracked<T> {
	pub(crate) fn new(default: T, validate: bool) -> Self {
		Self {
			cursor: Cursor::new(default),
			stack: ValueStack::new(validate),
		}
	}

	pub(crate) fn current(&self) -> &T {
		self.cursor.current()
	}

	pub(crate) fn push(&mut self, value: T, owner: FiberId) {
		self.stack.push(&mut self.cursor, value, owner);
	}

	pub(crate) fn pop(&mut self, owner: FiberId) -> Result<(), ReconcileError> {
		self.stack
			.pop(&mut self.cursor, owner)
			.map_err(|error| ReconcileError::stack(owner, error))
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.stack.is_empty()
	}

	pub(crate) fn check_empty(&self, root: FiberId) -> Result<(), ReconcileError> {
		self.stack.check_empty().map_err(|error| ReconcileError::stack(root, error))
	}

	/// Drops saved entries without restoring them. Returns how many there were.
	pub(crate) fn reset_after_fatal(&mut self) -> usize {
		let depth = self.stack.depth();
		self.stack.reset_after_fatal();
		depth
	}
}

/// Values provided by context providers, one channel per context.
#[derive(Debug)]
pub struct Providers {
	channels: FxHashMap<ContextId, Tracked<Option<Rc<dyn Any>>>>,
	validate: bool,
}

impl Providers {
	fn new(validate: bool) -> Self {
		Self {
			channels: FxHashMap::default(),
			validate,
		}
	}

	pub(crate) fn push(&mut self, context: ContextId, value: Rc<dyn Any>, owner: FiberId) {
		let validate = self.validate;
		self.channels
			.entry(context)
			.or_insert_with(|| Tracked::new(None, validate))
			.push(Some(value), owner);
	}

	pub(crate) fn pop(&mut self, context: ContextId, owner: FiberId) -> Result<(), ReconcileError> {
		match self.channels.get_mut(&context) {
			Some(channel) => channel.pop(owner),
			None => Err(ReconcileError::Invariant("popped a context that was never provided")),
		}
	}

	/// Nearest provided value, if any provider is above the current unit.
	pub fn value(&self, context: ContextId) -> Option<Rc<dyn Any>> {
		self.channels.get(&context).and_then(|c| c.current().clone())
	}

	fn check_empty(&self, root: FiberId) -> Result<(), ReconcileError> {
		self.channels.values().try_for_each(|channel| channel.check_empty(root))
	}

	fn reset_after_fatal(&mut self) -> usize {
		self.channels.values_mut().map(Tracked::reset_after_fatal).sum()
	}
}

/// Every contextual cursor a render attempt maintains.
#[derive(Debug)]
pub(crate) struct RenderStacks<N, C> {
	/// Host node children are currently being attached to.
	pub(crate) host_container: Tracked<Option<N>>,
	pub(crate) host_context: Tracked<Option<C>>,
	pub(crate) suspense: SuspenseStack,
	/// Render lanes including those merged in by revealed hidden subtrees.
	pub(crate) render_lanes: Tracked<Lanes>,
	/// Cache provided by the nearest cache boundary or root.
	pub(crate) cache: Tracked<Option<Rc<Cache>>>,
	/// Cache pool restored by a resuming hidden subtree.
	pub(crate) resumed_cache: Tracked<Option<Rc<Cache>>>,
	pub(crate) providers: Providers,
}

impl<N, C> RenderStacks<N, C> {
	pub(crate) fn new(render_lanes: Lanes, validate: bool) -> Self {
		Self {
			host_container: Tracked::new(None, validate),
			host_context: Tracked::new(None, validate),
			suspense: SuspenseStack::new(validate),
			render_lanes: Tracked::new(render_lanes, validate),
			cache: Tracked::new(None, validate),
			resumed_cache: Tracked::new(None, validate),
			providers: Providers::new(validate),
		}
	}

	/// Fails unless every push has been matched by a pop. `root` is the
	/// unit the traversal started from.
	pub(crate) fn check_empty(&self, root: FiberId) -> Result<(), ReconcileError> {
		self.host_container.check_empty(root)?;
		self.host_context.check_empty(root)?;
		self.suspense.check_empty(root)?;
		self.render_lanes.check_empty(root)?;
		self.cache.check_empty(root)?;
		self.resumed_cache.check_empty(root)?;
		self.providers.check_empty(root)
	}

	/// Clears every stack after an aborted traversal instead of unwinding
	/// it. Returns the number of entries dropped.
	pub(crate) fn reset_after_fatal(&mut self) -> usize {
		self.host_container.reset_after_fatal()
			+ self.host_context.reset_after_fatal()
			+ self.suspense.reset_after_fatal()
			+ self.render_lanes.reset_after_fatal()
			+ self.cache.reset_after_fatal()
			+ self.resumed_cache.reset_after_fatal()
			+ self.providers.reset_after_fatal()
	}

	pub(crate) fn render_lanes(&self) -> Lanes {
		*self.render_lanes.current()
	}
}

#[cfg(test)]
mod tests;
