//! Asynchronous dependencies a render can wait on.
//!
//! A [`Wakeable`] is a one-shot signal: listeners registered with
//! [`Wakeable::then`] run once when it settles. A [`Resource`] pairs a value
//! slot with a wakeable so components can read it and suspend while it is
//! pending.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RenderError;
use crate::render::Interrupt;

type Listener = Box<dyn FnOnce()>;

struct WakeableInner {
	id: u64,
	settled: Cell<bool>,
	listeners: RefCell<Vec<Listener>>,
}

/// One-shot settle signal.
#[derive(Clone)]
pub struct Wakeable(Rc<WakeableInner>);

impl Wakeable {
	pub fn new() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(Rc::new(WakeableInner {
			id: NEXT.fetch_add(1, Ordering::Relaxed),
			settled: Cell::new(false),
			listeners: RefCell::new(Vec::new()),
		}))
	}

	pub fn id(&self) -> u64 {
		self.0.id
	}

	pub fn is_settled(&self) -> bool {
		self.0.settled.get()
	}

	/// Runs `listener` once this settles, or right away if it already has.
	pub fn then(&self, listener: impl FnOnce() + 'static) {
		if self.is_settled() {
			listener();
		} else {
			self.0.listeners.borrow_mut().push(Box::new(listener));
		}
	}

	/// Settles and runs every registered listener. Later calls do nothing.
	pub fn settle(&self) {
		if self.0.settled.replace(true) {
			return;
		}
		let listeners = std::mem::take(&mut *self.0.listeners.borrow_mut());
		for listener in listeners {
			listener();
		}
	}
}

impl Default for Wakeable {
	fn default() -> Self {
		Self::new()
	}
}

impl PartialEq for Wakeable {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl Eq for Wakeable {}

impl fmt::Debug for Wakeable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Wakeable")
			.field("id", &self.0.id)
			.field("settled", &self.is_settled())
			.finish()
	}
}

/// Settlement state of a [`Resource`].
#[derive(Debug, Clone)]
pub enum ResourceState<T> {
	Pending,
	Ready(T),
	Failed(RenderError),
}

struct ResourceInner<T> {
	state: RefCell<ResourceState<T>>,
	wakeable: Wakeable,
}

/// A value that may not be available yet.
pub struct Resource<T>(Rc<ResourceInner<T>>);

impl<T> Clone for Resource<T> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<T: Clone> Resource<T> {
	pub fn pending() -> Self {
		Self(Rc::new(ResourceInner {
			state: RefCell::new(ResourceState::Pending),
			wakeable: Wakeable::new(),
		}))
	}

	pub fn ready(value: T) -> Self {
		let resource = Self::pending();
		resource.resolve(value);
		resource
	}

	pub fn resolve(&self, value: T) {
		*self.0.state.borrow_mut() = ResourceState::Ready(value);
		self.0.wakeable.settle();
	}

	pub fn reject(&self, error: RenderError) {
		*self.0.state.borrow_mut() = ResourceState::Failed(error);
		self.0.wakeable.settle();
	}

	pub fn state(&self) -> ResourceState<T> {
		self.0.state.borrow().clone()
	}

	pub fn is_pending(&self) -> bool {
		matches!(*self.0.state.borrow(), ResourceState::Pending)
	}

	pub fn wakeable(&self) -> &Wakeable {
		&self.0.wakeable
	}

	/// The value, or the interrupt a component should return while waiting.
	pub fn read(&self) -> Result<T, Interrupt> {
		match &*self.0.state.borrow() {
			ResourceState::Pending => Err(Interrupt::Suspend(self.0.wakeable.clone())),
			ResourceState::Ready(value) => Ok(value.clone()),
			ResourceState::Failed(error) => Err(Interrupt::Error(error.clone())),
		}
	}
}

impl<T> fmt::Debug for Resource<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Resource").field("wakeable", &self.0.wakeable).finish_non_exhaustive()
	}
}
