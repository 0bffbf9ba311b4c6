//! Work units and the arena that owns them.
//!
//! Every unit has up to two buffers: the one committed to the host
//! ("current") and the one being built ("work in progress"). Both live in the
//! same [`FiberArena`] and reference each other through
//! [`Fiber::alternate`], so swapping trees on commit is a single root pointer
//! update and no buffer ever dangles.

use std::any::TypeId;
use std::ops::{Index, IndexMut};
use std::rc::Rc;

use slab::Slab;
use smallvec::SmallVec;
use trellis_primitives::{FiberId, Lane, Lanes, RootId};

use crate::cache::{Cache, CacheState, SpawnedCachePool};
use crate::element::{ContextId, Element, Key, PropsDiff};
use crate::error::RenderError;
use crate::wakeable::Wakeable;

mod flags;

pub use flags::{FiberFlags, FiberMode};

/// Role of a unit. Payload fields identify the type for reuse decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FiberKind {
	HostRoot,
	HostComponent(Rc<str>),
	/// A document-level element (`html`, `head`, `body`) claimed from the host
	/// rather than created.
	HostSingleton(Rc<str>),
	HostText,
	Component { type_id: TypeId, name: &'static str },
	Fragment,
	Suspense,
	Offscreen,
	ErrorBoundary,
	CacheBoundary,
	Provider(ContextId),
	Scope,
	/// Placeholder child of a suspense boundary whose server content is not
	/// hydrated yet.
	DehydratedFragment,
	/// Carries a superfluous pre-rendered host node to the commit phase for
	/// removal.
	HostDeletion,
}

impl FiberKind {
	pub fn tag(&self) -> &'static str {
		match self {
			FiberKind::HostRoot => "host_root",
			FiberKind::HostComponent(_) => "host_component",
			FiberKind::HostSingleton(_) => "host_singleton",
			FiberKind::HostText => "host_text",
			FiberKind::Component { .. } => "component",
			FiberKind::Fragment => "fragment",
			FiberKind::Suspense => "suspense",
			FiberKind::Offscreen => "offscreen",
			FiberKind::ErrorBoundary => "error_boundary",
			FiberKind::CacheBoundary => "cache_boundary",
			FiberKind::Provider(_) => "provider",
			FiberKind::Scope => "scope",
			FiberKind::DehydratedFragment => "dehydrated_fragment",
			FiberKind::HostDeletion => "host_deletion",
		}
	}

	/// Units that own a host node of their own.
	pub fn is_host(&self) -> bool {
		matches!(
			self,
			FiberKind::HostComponent(_) | FiberKind::HostSingleton(_) | FiberKind::HostText
		)
	}

	/// Units host children are inserted into.
	pub fn is_host_parent(&self) -> bool {
		matches!(
			self,
			FiberKind::HostComponent(_) | FiberKind::HostSingleton(_) | FiberKind::HostRoot
		)
	}

	pub fn host_type(&self) -> Option<&str> {
		match self {
			FiberKind::HostComponent(ty) | FiberKind::HostSingleton(ty) => Some(ty),
			_ => None,
		}
	}
}

/// Committed state of a root unit.
#[derive(Debug, Clone)]
pub struct RootState {
	pub root: RootId,
	pub element: Option<Element>,
	/// The container still holds server output that has not been hydrated.
	pub is_dehydrated: bool,
	pub cache: Rc<Cache>,
}

/// A suspense boundary that is either dehydrated or showing its fallback.
#[derive(Debug, Clone)]
pub struct SuspenseState<N> {
	/// Start marker of the server content, while it is not hydrated.
	pub dehydrated: Option<N>,
	/// Lane at which a dehydrated boundary is next attempted.
	pub retry_lane: Lane,
}

impl<N> SuspenseState<N> {
	pub fn fallback() -> Self {
		Self {
			dehydrated: None,
			retry_lane: Lanes::NONE,
		}
	}
}

/// State of a hidden offscreen subtree.
#[derive(Debug, Clone)]
pub struct OffscreenState {
	/// Lanes the subtree was last rendered at before being hidden.
	pub base_lanes: Lanes,
	pub cache_pool: Option<SpawnedCachePool>,
}

/// Role-specific memoized state and host handle.
#[derive(Debug, Clone)]
pub enum FiberState<N> {
	None,
	Root(RootState),
	Host(Option<N>),
	Suspense(Option<SuspenseState<N>>),
	Offscreen(Option<OffscreenState>),
	ErrorBoundary(Option<RenderError>),
	Cache(Option<CacheState>),
	Dehydrated(N),
}

/// One work unit.
#[derive(Debug, Clone)]
pub struct Fiber<N> {
	pub kind: FiberKind,
	pub key: Option<Key>,
	pub mode: FiberMode,
	pub pending_props: Element,
	pub memoized_props: Option<Element>,
	pub state: FiberState<N>,
	pub return_fiber: Option<FiberId>,
	pub child: Option<FiberId>,
	pub sibling: Option<FiberId>,
	pub index: usize,
	pub alternate: Option<FiberId>,
	pub flags: FiberFlags,
	pub subtree_flags: FiberFlags,
	pub lanes: Lanes,
	pub child_lanes: Lanes,
	pub deletions: Vec<FiberId>,
	pub update_payload: Option<PropsDiff>,
	pub retry_queue: Vec<Wakeable>,
	pub dependencies: SmallVec<[ContextId; 2]>,
}

impl<N: Clone> Fiber<N> {
	pub fn new(kind: FiberKind, pending_props: Element, key: Option<Key>, mode: FiberMode) -> Self {
		let state = match &kind {
			FiberKind::HostComponent(_) | FiberKind::HostSingleton(_) | FiberKind::HostText | FiberKind::HostDeletion => {
				FiberState::Host(None)
			}
			FiberKind::Suspense => FiberState::Suspense(None),
			FiberKind::Offscreen => FiberState::Offscreen(None),
			FiberKind::ErrorBoundary => FiberState::ErrorBoundary(None),
			FiberKind::CacheBoundary => FiberState::Cache(None),
			_ => FiberState::None,
		};
		Self {
			kind,
			key,
			mode,
			pending_props,
			memoized_props: None,
			state,
			return_fiber: None,
			child: None,
			sibling: None,
			index: 0,
			alternate: None,
			flags: FiberFlags::empty(),
			subtree_flags: FiberFlags::empty(),
			lanes: Lanes::NONE,
			child_lanes: Lanes::NONE,
			deletions: Vec::new(),
			update_payload: None,
			retry_queue: Vec::new(),
			dependencies: SmallVec::new(),
		}
	}

	pub fn host_node(&self) -> Option<&N> {
		match &self.state {
			FiberState::Host(node) => node.as_ref(),
			FiberState::Dehydrated(marker) => Some(marker),
			_ => None,
		}
	}

	pub fn root_state(&self) -> Option<&RootState> {
		match &self.state {
			FiberState::Root(state) => Some(state),
			_ => None,
		}
	}

	pub fn suspense_state(&self) -> Option<&SuspenseState<N>> {
		match &self.state {
			FiberState::Suspense(state) => state.as_ref(),
			_ => None,
		}
	}

	pub fn suspense_state_mut(&mut self) -> Option<&mut SuspenseState<N>> {
		match &mut self.state {
			FiberState::Suspense(state) => state.as_mut(),
			_ => None,
		}
	}

	/// Marker of the server content this boundary still waits to hydrate.
	pub fn dehydrated_marker(&self) -> Option<&N> {
		self.suspense_state().and_then(|s| s.dehydrated.as_ref())
	}

	pub fn offscreen_state(&self) -> Option<&OffscreenState> {
		match &self.state {
			FiberState::Offscreen(state) => state.as_ref(),
			_ => None,
		}
	}

	pub fn cache_state(&self) -> Option<&CacheState> {
		match &self.state {
			FiberState::Cache(state) => state.as_ref(),
			_ => None,
		}
	}
}

/// Slab of work units indexed by [`FiberId`].
#[derive(Debug)]
pub struct FiberArena<N> {
	slots: Slab<Fiber<N>>,
}

impl<N> Default for FiberArena<N> {
	fn default() -> Self {
		Self { slots: Slab::new() }
	}
}

impl<N: Clone> FiberArena<N> {
	pub fn insert(&mut self, fiber: Fiber<N>) -> FiberId {
		FiberId::from_index(self.slots.insert(fiber))
	}

	pub fn get(&self, id: FiberId) -> Option<&Fiber<N>> {
		self.slots.get(id.index())
	}

	pub fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<N>> {
		self.slots.get_mut(id.index())
	}

	pub fn contains(&self, id: FiberId) -> bool {
		self.slots.contains(id.index())
	}

	pub fn remove(&mut self, id: FiberId) -> Option<Fiber<N>> {
		self.slots.try_remove(id.index())
	}

	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Direct children of `id`, first to last.
	pub fn children(&self, id: FiberId) -> Children<'_, N> {
		Children {
			arena: self,
			next: self.get(id).and_then(|f| f.child),
		}
	}

	/// The work-in-progress buffer for `current`, reusing its alternate when
	/// one exists.
	///
	/// Effects, deletions and queued host updates are reset; lanes, children
	/// and memoized values are copied so an untouched subtree can be bailed
	/// out of without revisiting it. The caller links `return_fiber`.
	pub fn create_work_in_progress(&mut self, current: FiberId, pending_props: Element) -> FiberId {
		let cur = &self[current];
		let snapshot = (
			cur.lanes,
			cur.child_lanes,
			cur.child,
			cur.sibling,
			cur.index,
			cur.memoized_props.clone(),
			cur.state.clone(),
			cur.dependencies.clone(),
		);
		let (lanes, child_lanes, child, sibling, index, memoized_props, state, dependencies) = snapshot;
		let alternate = cur.alternate;
		match alternate {
			Some(wip) => {
				let fiber = &mut self[wip];
				fiber.pending_props = pending_props;
				fiber.flags = FiberFlags::empty();
				fiber.subtree_flags = FiberFlags::empty();
				fiber.deletions.clear();
				fiber.update_payload = None;
				fiber.retry_queue.clear();
				fiber.lanes = lanes;
				fiber.child_lanes = child_lanes;
				fiber.child = child;
				fiber.sibling = sibling;
				fiber.index = index;
				fiber.memoized_props = memoized_props;
				fiber.state = state;
				fiber.dependencies = dependencies;
				wip
			}
			None => {
				let mut fiber = Fiber::new(cur.kind.clone(), pending_props, cur.key.clone(), cur.mode);
				fiber.return_fiber = cur.return_fiber;
				fiber.lanes = lanes;
				fiber.child_lanes = child_lanes;
				fiber.child = child;
				fiber.sibling = sibling;
				fiber.index = index;
				fiber.memoized_props = memoized_props;
				fiber.state = state;
				fiber.dependencies = dependencies;
				fiber.alternate = Some(current);
				let wip = self.insert(fiber);
				self[current].alternate = Some(wip);
				wip
			}
		}
	}

	/// Frees every unit not reachable from `live`.
	///
	/// A unit is kept when it is in one of the trees hanging off `live` or is
	/// the alternate of such a unit. Alternates are not followed any further:
	/// their child links are stale and get overwritten before they are read
	/// again. Returns the freed ids.
	pub fn sweep(&mut self, live: impl IntoIterator<Item = FiberId>) -> Vec<FiberId> {
		let capacity = self.slots.capacity();
		let mut visited = vec![false; capacity];
		let mut keep = vec![false; capacity];
		let mut stack: Vec<FiberId> = live.into_iter().collect();
		while let Some(id) = stack.pop() {
			let Some(fiber) = self.get(id) else {
				continue;
			};
			if std::mem::replace(&mut visited[id.index()], true) {
				continue;
			}
			keep[id.index()] = true;
			stack.extend(fiber.child);
			stack.extend(fiber.sibling);
			if let Some(alternate) = fiber.alternate
				&& let Some(slot) = keep.get_mut(alternate.index())
			{
				*slot = true;
			}
		}
		let freed: Vec<FiberId> = self
			.slots
			.iter()
			.map(|(index, _)| FiberId::from_index(index))
			.filter(|id| !keep[id.index()])
			.collect();
		for &id in &freed {
			self.slots.remove(id.index());
		}
		for (_, fiber) in self.slots.iter_mut() {
			if fiber.alternate.is_some_and(|alternate| !keep[alternate.index()]) {
				fiber.alternate = None;
			}
		}
		freed
	}
}

impl<N> Index<FiberId> for FiberArena<N> {
	type Output = Fiber<N>;

	fn index(&self, id: FiberId) -> &Fiber<N> {
		&self.slots[id.index()]
	}
}

impl<N> IndexMut<FiberId> for FiberArena<N> {
	fn index_mut(&mut self, id: FiberId) -> &mut Fiber<N> {
		&mut self.slots[id.index()]
	}
}

/// Iterator over a unit's children.
pub struct Children<'a, N> {
	arena: &'a FiberArena<N>,
	next: Option<FiberId>,
}

impl<N: Clone> Iterator for Children<'_, N> {
	type Item = FiberId;

	fn next(&mut self) -> Option<FiberId> {
		let id = self.next?;
		self.next = self.arena.get(id).and_then(|f| f.sibling);
		Some(id)
	}
}

#[cfg(test)]
mod tests;
