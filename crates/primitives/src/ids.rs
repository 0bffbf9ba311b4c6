//! Stable identifiers shared across crates.

use std::fmt;

/// Slot of a work unit in the fiber arena.
///
/// Both buffers of a unit (current and work-in-progress) live in the same
/// arena; each points at the other through its own id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId(u32);

impl FiberId {
	pub const fn from_index(index: usize) -> Self {
		Self(index as u32)
	}

	pub const fn index(self) -> usize {
		self.0 as usize
	}
}

impl fmt::Debug for FiberId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "FiberId({})", self.0)
	}
}

/// Handle of a mounted root container.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootId(u32);

impl RootId {
	pub const fn from_index(index: usize) -> Self {
		Self(index as u32)
	}

	pub const fn index(self) -> usize {
		self.0 as usize
	}
}

impl fmt::Debug for RootId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "RootId({})", self.0)
	}
}
