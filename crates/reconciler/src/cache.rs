//! Reference-counted render caches.
//!
//! A cache is shared by every unit that depends on it (the root, cache
//! boundaries, hidden subtrees waiting to resume). It starts with a count of
//! zero; each dependent retains it on commit and releases it on unmount or
//! replacement. When the count returns to zero the owner schedules the abort
//! signal, which also evicts the memoized entries.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

/// Shared memoization table with an abort signal.
pub struct Cache {
	id: u64,
	controller: CancellationToken,
	data: RefCell<FxHashMap<(TypeId, String), Rc<dyn Any>>>,
	ref_count: Cell<isize>,
}

/// What a [`Cache::release`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheRelease {
	/// Other dependents still hold the cache.
	Retained,
	/// That was the last reference; the abort should now be scheduled.
	Freed,
	/// Released more often than retained.
	Underflow,
}

impl Cache {
	pub fn new() -> Rc<Self> {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Rc::new(Self {
			id: NEXT.fetch_add(1, Ordering::Relaxed),
			controller: CancellationToken::new(),
			data: RefCell::new(FxHashMap::default()),
			ref_count: Cell::new(0),
		})
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn ref_count(&self) -> isize {
		self.ref_count.get()
	}

	pub fn is_aborted(&self) -> bool {
		self.controller.is_cancelled()
	}

	/// A handle that resolves once the cache is aborted.
	pub fn abort_signal(&self) -> CancellationToken {
		self.controller.clone()
	}

	/// Returns the value memoized under `key` for type `T`, computing it on
	/// first use.
	pub fn get_or_insert_with<T: Clone + 'static>(&self, key: &str, init: impl FnOnce() -> T) -> T {
		let slot = (TypeId::of::<T>(), key.to_string());
		if let Some(value) = self.data.borrow().get(&slot).and_then(|v| v.downcast_ref::<T>()) {
			return value.clone();
		}
		let value = init();
		if !self.is_aborted() {
			self.data.borrow_mut().insert(slot, Rc::new(value.clone()));
		}
		value
	}

	pub fn len(&self) -> usize {
		self.data.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.borrow().is_empty()
	}

	pub fn retain(&self) {
		if self.is_aborted() {
			tracing::warn!(cache = self.id, "cache.retain_after_abort");
		}
		self.ref_count.set(self.ref_count.get() + 1);
	}

	pub fn release(&self) -> CacheRelease {
		let count = self.ref_count.get() - 1;
		self.ref_count.set(count);
		match count {
			0 => CacheRelease::Freed,
			c if c < 0 => {
				tracing::warn!(cache = self.id, ref_count = c, "cache.release_below_zero");
				CacheRelease::Underflow
			}
			_ => CacheRelease::Retained,
		}
	}

	/// Fires the abort signal and drops memoized entries.
	pub(crate) fn abort(&self) {
		if self.controller.is_cancelled() {
			return;
		}
		tracing::debug!(cache = self.id, "cache.abort");
		self.controller.cancel();
		self.data.borrow_mut().clear();
	}
}

impl fmt::Debug for Cache {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Cache")
			.field("id", &self.id)
			.field("ref_count", &self.ref_count.get())
			.field("aborted", &self.is_aborted())
			.finish()
	}
}

/// Cache state of a cache boundary: the cache it provides and the one it
/// shadows.
#[derive(Debug, Clone)]
pub struct CacheState {
	pub parent: Rc<Cache>,
	pub cache: Rc<Cache>,
}

/// Cache pool captured when a subtree was hidden or suspended, restored when
/// it resumes so it sees the same cache identity.
#[derive(Debug, Clone)]
pub struct SpawnedCachePool {
	pub parent: Rc<Cache>,
	pub pool: Rc<Cache>,
}

#[cfg(test)]
mod tests;
