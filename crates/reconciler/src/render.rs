//! What a component sees while it renders.

use std::rc::Rc;

use smallvec::SmallVec;
use trellis_primitives::{FiberId, Lanes};

use crate::cache::Cache;
use crate::element::{ContextId, ContextKey, Element};
use crate::error::RenderError;
use crate::stacks::Providers;
use crate::wakeable::{Resource, Wakeable};

/// Why a component did not produce an element.
#[derive(Debug, Clone)]
pub enum Interrupt {
	/// Waiting on an asynchronous dependency; the nearest suspense boundary
	/// shows its fallback until the wakeable settles.
	Suspend(Wakeable),
	/// Failed; the nearest error boundary renders its fallback.
	Error(RenderError),
}

impl From<RenderError> for Interrupt {
	fn from(error: RenderError) -> Self {
		Interrupt::Error(error)
	}
}

/// Result of rendering one component.
pub type Rendered = Result<Element, Interrupt>;

/// Render-time view of the surrounding tree.
pub struct RenderContext<'a> {
	fiber: Option<FiberId>,
	lanes: Lanes,
	cache: Option<Rc<Cache>>,
	providers: Option<&'a Providers>,
	dependencies: SmallVec<[ContextId; 2]>,
}

impl<'a> RenderContext<'a> {
	pub(crate) fn new(fiber: FiberId, lanes: Lanes, cache: Option<Rc<Cache>>, providers: &'a Providers) -> Self {
		Self {
			fiber: Some(fiber),
			lanes,
			cache,
			providers: Some(providers),
			dependencies: SmallVec::new(),
		}
	}

	/// A context outside any tree, for rendering components ahead of time.
	/// Every context read sees its default and nothing is cached unless a
	/// cache is given.
	pub fn detached(cache: Option<Rc<Cache>>) -> RenderContext<'static> {
		RenderContext {
			fiber: None,
			lanes: Lanes::DEFAULT,
			cache,
			providers: None,
			dependencies: SmallVec::new(),
		}
	}

	pub(crate) fn into_dependencies(self) -> SmallVec<[ContextId; 2]> {
		self.dependencies
	}

	/// The unit being rendered, or `None` in a detached context.
	pub fn fiber(&self) -> Option<FiberId> {
		self.fiber
	}

	/// Lanes of the render attempt, including those of any hidden subtree
	/// being revealed.
	pub fn render_lanes(&self) -> Lanes {
		self.lanes
	}

	/// The cache provided by the nearest cache boundary or the root.
	pub fn cache(&self) -> Option<&Rc<Cache>> {
		self.cache.as_ref()
	}

	/// Memoizes `init` in the current cache, or runs it uncached when there is
	/// none.
	pub fn cached<T: Clone + 'static>(&self, key: &str, init: impl FnOnce() -> T) -> T {
		match &self.cache {
			Some(cache) => cache.get_or_insert_with(key, init),
			None => init(),
		}
	}

	/// Reads the nearest provided value of `key`, subscribing this unit to
	/// changes of it.
	pub fn read_context<T: 'static>(&mut self, key: &ContextKey<T>) -> Rc<T> {
		let id = key.id();
		if !self.dependencies.contains(&id) {
			self.dependencies.push(id);
		}
		self.providers
			.and_then(|providers| providers.value(id))
			.and_then(|value| value.downcast::<T>().ok())
			.unwrap_or_else(|| key.default_value())
	}

	/// Unwraps a resource, suspending while it is pending.
	pub fn read<T: Clone>(&mut self, resource: &Resource<T>) -> Result<T, Interrupt> {
		resource.read()
	}
}
