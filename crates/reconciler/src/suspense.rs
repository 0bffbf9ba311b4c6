//! Suspense handler selection.
//!
//! While rendering, the nearest boundary able to show a fallback sits on top
//! of the handler stack. A second cursor records whether some enclosing
//! boundary could switch to its own fallback; a boundary that asks to avoid
//! its fallback passes suspensions up to that boundary instead of capturing
//! them itself.

use trellis_primitives::FiberId;

use crate::error::ReconcileError;
use crate::stacks::Tracked;

/// The two cursors suspense boundaries maintain during a render.
#[derive(Debug)]
pub(crate) struct SuspenseStack {
	handler: Tracked<Option<FiberId>>,
	fallback_available: Tracked<bool>,
}

/// How a primary tree boundary enters the handler stack.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BoundaryEntry {
	pub avoid_fallback: bool,
	pub dehydrated: bool,
	/// The boundary is showing its content in the committed tree, or is
	/// mounting.
	pub shows_content: bool,
}

impl SuspenseStack {
	pub(crate) fn new(validate: bool) -> Self {
		Self {
			handler: Tracked::new(None, validate),
			fallback_available: Tracked::new(false, validate),
		}
	}

	/// Boundary that would capture a suspension raised right now.
	pub(crate) fn handler(&self) -> Option<FiberId> {
		*self.handler.current()
	}

	/// Enters a boundary about to render its primary children.
	pub(crate) fn push_primary(&mut self, boundary: FiberId, entry: BoundaryEntry) {
		let above = *self.fallback_available.current();
		let captures = entry.dehydrated || !entry.avoid_fallback || !above;
		let handler = if captures { Some(boundary) } else { self.handler() };
		self.handler.push(handler, boundary);

		let provides = entry.shows_content && !entry.avoid_fallback;
		self.fallback_available.push(above || provides, boundary);
	}

	/// Enters a boundary about to render its fallback. Suspensions inside a
	/// fallback belong to whatever handled suspensions outside it.
	pub(crate) fn push_fallback(&mut self, boundary: FiberId) {
		let handler = self.handler();
		self.handler.push(handler, boundary);
		let above = *self.fallback_available.current();
		self.fallback_available.push(above, boundary);
	}

	/// Enters an offscreen subtree, which keeps the enclosing handler.
	pub(crate) fn push_offscreen(&mut self, fiber: FiberId) {
		self.push_fallback(fiber);
	}

	pub(crate) fn pop(&mut self, owner: FiberId) -> Result<(), ReconcileError> {
		self.fallback_available.pop(owner)?;
		self.handler.pop(owner)
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.handler.is_empty() && self.fallback_available.is_empty()
	}

	pub(crate) fn check_empty(&self, root: FiberId) -> Result<(), ReconcileError> {
		self.handler.check_empty(root)?;
		self.fallback_available.check_empty(root)
	}

	pub(crate) fn reset_after_fatal(&mut self) -> usize {
		self.handler.reset_after_fatal() + self.fallback_available.reset_after_fatal()
	}
}

#[cfg(test)]
mod tests;
