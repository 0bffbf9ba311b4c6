//! Hydration cursor.
//!
//! One [`HydrationContext`] exists per render attempt. It is entered at a
//! dehydrated root or boundary, advanced as units claim pre-rendered nodes,
//! and reset when the subtree finishes or gives up. Mismatches are buffered
//! in [`HydrationContext::errors`] and only reported once the subtree that
//! produced them completes.

use trellis_primitives::FiberId;

use crate::error::HydrationError;

mod scan;

pub use scan::Scanner;

/// Position of the hydration pass within pre-rendered output.
#[derive(Debug)]
pub(crate) struct HydrationContext<N> {
	/// Unit whose host node the cursor is walking the children of.
	pub parent: Option<FiberId>,
	/// Cursor position: the next unclaimed pre-rendered node, possibly one
	/// the skip rules step over.
	pub next: Option<N>,
	pub is_hydrating: bool,
	/// Something under the current hydration root suspended or errored.
	pub did_suspend_or_error: bool,
	pub errors: Vec<HydrationError>,
}

impl<N> Default for HydrationContext<N> {
	fn default() -> Self {
		Self {
			parent: None,
			next: None,
			is_hydrating: false,
			did_suspend_or_error: false,
			errors: Vec::new(),
		}
	}
}

impl<N> HydrationContext<N> {
	/// Starts walking the children of `parent`, beginning at `first`.
	pub fn enter(&mut self, parent: FiberId, first: Option<N>) {
		tracing::trace!(parent = ?parent, "hydration.enter");
		self.parent = Some(parent);
		self.next = first;
		self.is_hydrating = true;
		self.did_suspend_or_error = false;
	}

	/// Leaves hydration. Buffered errors are kept for the caller to report.
	pub fn reset(&mut self) {
		self.parent = None;
		self.next = None;
		self.is_hydrating = false;
		self.did_suspend_or_error = false;
	}

	pub fn queue_error(&mut self, error: HydrationError) {
		tracing::debug!(%error, "hydration.error_buffered");
		self.errors.push(error);
	}

	/// Hands over everything buffered so far.
	pub fn take_errors(&mut self) -> Vec<HydrationError> {
		std::mem::take(&mut self.errors)
	}
}

#[cfg(test)]
mod tests;
