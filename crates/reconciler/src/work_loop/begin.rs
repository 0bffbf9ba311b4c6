//! Beginning a unit: deciding whether it can be skipped, pushing what it
//! provides to its subtree, and reconciling its children.

use std::rc::Rc;

use trellis_primitives::{FiberId, Lanes};

use super::{Thrown, Work};
use crate::cache::{Cache, CacheState, SpawnedCachePool};
use crate::element::{
	CacheElement, ComponentElement, Element, ErrorBoundaryElement, HostElement, OffscreenElement, OffscreenMode,
	ProviderElement, SuspenseElement, fragment, offscreen,
};
use crate::error::{HydrationError, ReconcileError};
use crate::fiber::{Fiber, FiberFlags, FiberKind, FiberState, OffscreenState, RootState, SuspenseState};
use crate::host::HostConfig;
use crate::render::{Interrupt, RenderContext};
use crate::suspense::BoundaryEntry;

/// Next unit to begin, or `None` to complete the one just begun.
type Begun = Result<Option<FiberId>, Thrown>;

fn invariant(message: &'static str) -> Thrown {
	Thrown::Fatal(ReconcileError::Invariant(message))
}

fn same_element(a: &Option<Element>, b: &Option<Element>) -> bool {
	match (a, b) {
		(Some(a), Some(b)) => a.same(b),
		(None, None) => true,
		_ => false,
	}
}

fn same_pool(a: Option<&SpawnedCachePool>, b: Option<&SpawnedCachePool>) -> bool {
	match (a, b) {
		(Some(a), Some(b)) => Rc::ptr_eq(&a.pool, &b.pool),
		(None, None) => true,
		_ => false,
	}
}

impl<H: HostConfig> Work<'_, H> {
	pub(super) fn begin_work(&mut self, wip: FiberId) -> Begun {
		let render_lanes = self.at.stacks.render_lanes();
		let current = self.fibers[wip].alternate;
		self.did_receive_update = false;
		if let Some(current) = current {
			let fiber = &self.fibers[wip];
			let changed = match &self.fibers[current].memoized_props {
				Some(old) => !old.same(&fiber.pending_props),
				None => true,
			};
			if changed {
				self.did_receive_update = true;
			} else if !fiber.lanes.includes_some(render_lanes)
				&& !fiber.flags.contains(FiberFlags::DID_CAPTURE)
				&& fiber.kind != FiberKind::Offscreen
			{
				return self.attempt_early_bailout(current, wip);
			}
		}

		self.fibers[wip].lanes = Lanes::NONE;
		let kind = self.fibers[wip].kind.clone();
		let props = self.fibers[wip].pending_props.clone();
		tracing::trace!(fiber = ?wip, kind = kind.tag(), "work.begin");
		match (kind, props) {
			(FiberKind::HostRoot, _) => self.update_host_root(current, wip),
			(FiberKind::HostComponent(_), Element::Host(element)) => self.update_host_component(current, wip, &element),
			(FiberKind::HostSingleton(_), Element::Host(element)) => self.update_host_singleton(current, wip, &element),
			(FiberKind::HostText, Element::Text(text)) => {
				if current.is_none() {
					self.claim_text_instance(wip, &text)?;
				}
				Ok(None)
			}
			(FiberKind::Component { .. }, Element::Component(element)) => self.update_component(current, wip, &element),
			(FiberKind::Fragment | FiberKind::Scope, props) => Ok(self.reconcile(current, wip, props.children())),
			(FiberKind::Suspense, Element::Suspense(element)) => self.update_suspense(current, wip, &element),
			(FiberKind::Offscreen, Element::Offscreen(element)) => self.update_offscreen(current, wip, &element),
			(FiberKind::ErrorBoundary, Element::ErrorBoundary(element)) => {
				Ok(self.update_error_boundary(current, wip, &element))
			}
			(FiberKind::CacheBoundary, Element::Cache(element)) => self.update_cache_boundary(current, wip, &element),
			(FiberKind::Provider(_), Element::Provider(element)) => Ok(self.update_provider(current, wip, &element)),
			_ => Err(invariant("unit kind does not match its props")),
		}
	}

	/// Skips a unit with no work at the render lanes, still pushing whatever
	/// it provides so its descendants see the same context.
	fn attempt_early_bailout(&mut self, current: FiberId, wip: FiberId) -> Begun {
		let kind = self.fibers[wip].kind.clone();
		match kind {
			FiberKind::HostRoot => {
				self.push_host_container(wip);
				let cache = self.fibers[wip].root_state().map(|state| state.cache.clone());
				self.at.stacks.cache.push(cache, wip);
				self.at.hydration.reset();
			}
			FiberKind::HostComponent(ty) | FiberKind::HostSingleton(ty) => self.push_host_context(wip, &ty),
			FiberKind::Provider(context) => {
				let Element::Provider(element) = &self.fibers[wip].pending_props else {
					return Err(invariant("provider unit without provider props"));
				};
				let value = element.value.clone();
				self.at.stacks.providers.push(context, value, wip);
			}
			FiberKind::CacheBoundary => {
				let cache = self.fibers[wip].cache_state().map(|state| state.cache.clone());
				self.at.stacks.cache.push(cache, wip);
			}
			FiberKind::Suspense => {
				let Element::Suspense(element) = self.fibers[wip].pending_props.clone() else {
					return Err(invariant("suspense unit without suspense props"));
				};
				let entry = BoundaryEntry {
					avoid_fallback: element.avoid_this_fallback,
					dehydrated: false,
					shows_content: true,
				};
				if self.fibers[wip].dehydrated_marker().is_some() {
					self.at.stacks.suspense.push_primary(wip, BoundaryEntry { dehydrated: true, ..entry });
					self.fibers[wip].flags |= FiberFlags::DID_CAPTURE;
					return Ok(None);
				}
				if self.fibers[wip].suspense_state().is_some() {
					let primary_lanes = self.fibers[current]
						.child
						.map_or(Lanes::NONE, |primary| self.fibers[primary].child_lanes);
					if primary_lanes.includes_some(self.at.stacks.render_lanes()) {
						return self.update_suspense(Some(current), wip, &element);
					}
					self.at.stacks.suspense.push_primary(
						wip,
						BoundaryEntry {
							shows_content: false,
							..entry
						},
					);
					let primary = self.bailout_on_already_finished(wip);
					return Ok(primary.and_then(|primary| self.fibers[primary].sibling));
				}
				self.at.stacks.suspense.push_primary(wip, entry);
			}
			_ => {}
		}
		Ok(self.bailout_on_already_finished(wip))
	}

	/// Reuses the committed children when none of them has work at the
	/// render lanes; returns `None` to skip the subtree entirely.
	fn bailout_on_already_finished(&mut self, wip: FiberId) -> Option<FiberId> {
		if !self.fibers[wip].child_lanes.includes_some(self.at.stacks.render_lanes()) {
			tracing::trace!(fiber = ?wip, "work.bailout");
			return None;
		}
		self.clone_child_fibers(wip);
		self.fibers[wip].child
	}

	pub(super) fn push_host_container(&mut self, wip: FiberId) {
		let container = self.root.container.clone();
		let context = self.host.root_host_context(&container);
		self.at.stacks.host_container.push(Some(container), wip);
		self.at.stacks.host_context.push(Some(context), wip);
	}

	pub(super) fn pop_host_container(&mut self, wip: FiberId) -> Result<(), ReconcileError> {
		self.at.stacks.host_context.pop(wip)?;
		self.at.stacks.host_container.pop(wip)
	}

	fn push_host_context(&mut self, wip: FiberId, ty: &str) {
		let context = self
			.at
			.stacks
			.host_context
			.current()
			.as_ref()
			.map(|parent| self.host.child_host_context(parent, ty));
		self.at.stacks.host_context.push(context, wip);
	}

	fn update_host_root(&mut self, current: Option<FiberId>, wip: FiberId) -> Begun {
		let Some(current) = current else {
			return Err(invariant("root unit without a committed buffer"));
		};
		let Some(prev) = self.fibers[current].root_state().cloned() else {
			return Err(invariant("root unit without root state"));
		};
		self.push_host_container(wip);
		self.at.stacks.cache.push(Some(prev.cache.clone()), wip);

		let render_lanes = self.at.stacks.render_lanes();
		let mut element = prev.element.clone();
		let mut remaining = Lanes::NONE;
		for update in &self.root.updates {
			if update.lane.is_subset_of(render_lanes) {
				element = Some(update.element.clone());
			} else {
				remaining |= update.lane;
			}
		}
		let fiber = &mut self.fibers[wip];
		fiber.lanes = remaining;
		fiber.state = FiberState::Root(RootState {
			element: element.clone(),
			is_dehydrated: false,
			..prev.clone()
		});
		let children: Vec<Element> = element.iter().cloned().collect();

		if prev.is_dehydrated {
			if self.fibers[wip].flags.contains(FiberFlags::FORCE_CLIENT_RENDER) {
				return Ok(self.mount_root_without_hydrating(current, wip, &children, None));
			}
			if !same_element(&prev.element, &element) {
				let error = HydrationError::UpdatedBeforeHydration;
				return Ok(self.mount_root_without_hydrating(current, wip, &children, Some(error)));
			}
			let container = self.root.container.clone();
			let first = self.scanner().first_child_position(&container);
			self.at.hydration.enter(wip, first);
			let child = self.reconcile_children(wip, None, &children, false);
			let mut next = child;
			while let Some(id) = next {
				let fiber = &mut self.fibers[id];
				fiber.flags |= FiberFlags::HYDRATING;
				next = fiber.sibling;
			}
			return Ok(child);
		}

		self.at.hydration.reset();
		if same_element(&prev.element, &element) {
			return Ok(self.bailout_on_already_finished(wip));
		}
		Ok(self.reconcile(Some(current), wip, &children))
	}

	fn mount_root_without_hydrating(
		&mut self,
		current: FiberId,
		wip: FiberId,
		children: &[Element],
		error: Option<HydrationError>,
	) -> Option<FiberId> {
		self.at.hydration.reset();
		if let Some(error) = error {
			self.at.hydration.queue_error(error);
		}
		tracing::debug!(root = ?self.at.root, "hydration.root_client_render");
		self.fibers[wip].flags |= FiberFlags::FORCE_CLIENT_RENDER;
		self.reconcile(Some(current), wip, children)
	}

	fn update_host_component(&mut self, current: Option<FiberId>, wip: FiberId, element: &HostElement) -> Begun {
		if current.is_none() {
			self.claim_host_instance(wip, element)?;
		}
		self.push_host_context(wip, &element.ty);
		Ok(self.reconcile(current, wip, &element.children))
	}

	fn update_host_singleton(&mut self, current: Option<FiberId>, wip: FiberId, element: &HostElement) -> Begun {
		if current.is_none() {
			let node = self.host.resolve_singleton(&element.ty, &self.root.container)?;
			self.fibers[wip].state = FiberState::Host(Some(node.clone()));
			self.enter_singleton(wip, &node);
		}
		self.push_host_context(wip, &element.ty);
		if current.is_none() && !self.at.hydration.is_hydrating {
			return Ok(self.reconcile_children(wip, None, &element.children, true));
		}
		Ok(self.reconcile(current, wip, &element.children))
	}

	fn update_component(&mut self, current: Option<FiberId>, wip: FiberId, element: &ComponentElement) -> Begun {
		let cache = self.at.stacks.cache.current().clone();
		let lanes = self.at.stacks.render_lanes();
		let (rendered, dependencies) = {
			let mut cx = RenderContext::new(wip, lanes, cache, &self.at.stacks.providers);
			let rendered = element.component.render(&mut cx);
			(rendered, cx.into_dependencies())
		};
		let fiber = &mut self.fibers[wip];
		fiber.dependencies = dependencies;
		fiber.flags |= FiberFlags::PERFORMED_WORK;
		match rendered {
			Ok(child) => Ok(self.reconcile(current, wip, std::slice::from_ref(&child))),
			Err(Interrupt::Suspend(wakeable)) => Err(Thrown::Suspend(wakeable)),
			Err(Interrupt::Error(error)) => Err(Thrown::Error(error)),
		}
	}

	fn update_provider(&mut self, current: Option<FiberId>, wip: FiberId, element: &ProviderElement) -> Option<FiberId> {
		self.at.stacks.providers.push(element.context, element.value.clone(), wip);
		let changed = current.is_some_and(|current| {
			matches!(
				&self.fibers[current].memoized_props,
				Some(Element::Provider(old)) if !Rc::ptr_eq(&old.value, &element.value)
			)
		});
		if changed {
			let lanes = self.at.stacks.render_lanes();
			self.propagate_context_change(wip, element, lanes);
		}
		self.reconcile(current, wip, &element.children)
	}

	/// Schedules `lanes` on every unit under `provider` that read its
	/// context, so they render even if their props are unchanged.
	fn propagate_context_change(&mut self, provider: FiberId, element: &ProviderElement, lanes: Lanes) {
		let context = element.context;
		let mut stack: Vec<FiberId> = self.fibers[provider].child.into_iter().collect();
		while let Some(id) = stack.pop() {
			let fiber = &self.fibers[id];
			stack.extend(fiber.sibling);
			let depends = fiber.dependencies.contains(&context);
			let nested = fiber.kind == FiberKind::Provider(context);
			let (child, alternate, parent) = (fiber.child, fiber.alternate, fiber.return_fiber);
			if depends {
				self.fibers[id].lanes |= lanes;
				if let Some(alternate) = alternate {
					self.fibers[alternate].lanes |= lanes;
				}
				self.schedule_work_on_parent_path(parent, lanes, provider);
			}
			if !nested {
				stack.extend(child);
			}
		}
	}

	fn schedule_work_on_parent_path(&mut self, parent: Option<FiberId>, lanes: Lanes, stop: FiberId) {
		let stop_alternate = self.fibers[stop].alternate;
		let mut node = parent;
		while let Some(id) = node {
			let fiber = &mut self.fibers[id];
			fiber.child_lanes |= lanes;
			let (alternate, next) = (fiber.alternate, fiber.return_fiber);
			if let Some(alternate) = alternate {
				self.fibers[alternate].child_lanes |= lanes;
			}
			if id == stop || Some(id) == stop_alternate {
				break;
			}
			node = next;
		}
	}

	fn update_error_boundary(
		&mut self,
		current: Option<FiberId>,
		wip: FiberId,
		element: &ErrorBoundaryElement,
	) -> Option<FiberId> {
		let captured = self.fibers[wip].flags.contains(FiberFlags::DID_CAPTURE);
		let error = match &self.fibers[wip].state {
			FiberState::ErrorBoundary(error) => error.clone(),
			_ => None,
		};
		let Some(error) = error else {
			return self.reconcile(current, wip, &element.children);
		};
		let fallback = [(element.fallback)(&error)];
		match current {
			Some(current) if captured => {
				let committed = self.fibers[current].child;
				self.delete_remaining_children(wip, committed);
				self.reconcile_children(wip, None, &fallback, true)
			}
			_ => self.reconcile(current, wip, &fallback),
		}
	}

	fn update_cache_boundary(&mut self, current: Option<FiberId>, wip: FiberId, element: &CacheElement) -> Begun {
		let parent = self.at.stacks.cache.current().clone();
		let cache = match current {
			None => {
				let cache = self.request_cache_from_pool();
				let parent = parent.unwrap_or_else(|| cache.clone());
				self.fibers[wip].state = FiberState::Cache(Some(CacheState {
					parent,
					cache: cache.clone(),
				}));
				cache
			}
			Some(current) => match (self.fibers[current].cache_state().cloned(), parent) {
				(Some(prev), Some(parent)) if !Rc::ptr_eq(&prev.parent, &parent) => {
					tracing::debug!(fiber = ?wip, cache = parent.id(), "cache.refreshed_from_parent");
					self.fibers[wip].state = FiberState::Cache(Some(CacheState {
						parent: parent.clone(),
						cache: parent.clone(),
					}));
					parent
				}
				(Some(prev), _) => prev.cache,
				(None, _) => return Err(invariant("cache boundary without cache state")),
			},
		};
		self.at.stacks.cache.push(Some(cache), wip);
		Ok(self.reconcile(current, wip, &element.children))
	}

	fn peek_cache_from_pool(&self) -> Option<Rc<Cache>> {
		self.at
			.stacks
			.resumed_cache
			.current()
			.clone()
			.or_else(|| self.root.pooled_cache.clone())
	}

	/// The cache a fresh boundary mounting at these lanes should share.
	fn request_cache_from_pool(&mut self) -> Rc<Cache> {
		if let Some(cache) = self.peek_cache_from_pool() {
			return cache;
		}
		let fresh = Cache::new();
		fresh.retain();
		self.root.pooled_cache = Some(fresh.clone());
		self.root.pooled_cache_lanes |= self.at.lanes;
		tracing::debug!(cache = fresh.id(), lanes = self.at.lanes.label(), "cache.pooled");
		fresh
	}

	/// Cache pool a subtree being hidden should resume with.
	fn suspended_cache_pool(&self) -> Option<SpawnedCachePool> {
		let pool = self.peek_cache_from_pool()?;
		let parent = self.at.stacks.cache.current().clone().unwrap_or_else(|| pool.clone());
		Some(SpawnedCachePool { parent, pool })
	}

	fn mount_offscreen_state(&self) -> OffscreenState {
		OffscreenState {
			base_lanes: self.at.stacks.render_lanes(),
			cache_pool: self.suspended_cache_pool(),
		}
	}

	fn update_offscreen_state(&self, prev: &OffscreenState) -> OffscreenState {
		let cache_pool = match &prev.cache_pool {
			Some(pool) => match self.at.stacks.cache.current() {
				Some(parent) if !Rc::ptr_eq(parent, &pool.parent) => Some(SpawnedCachePool {
					parent: parent.clone(),
					pool: parent.clone(),
				}),
				_ => Some(pool.clone()),
			},
			None => self.suspended_cache_pool(),
		};
		OffscreenState {
			base_lanes: prev.base_lanes | self.at.stacks.render_lanes(),
			cache_pool,
		}
	}

	fn update_offscreen(&mut self, current: Option<FiberId>, wip: FiberId, element: &OffscreenElement) -> Begun {
		let prev = current.and_then(|current| self.fibers[current].offscreen_state().cloned());
		let render_lanes = self.at.stacks.render_lanes();
		let (pool, lanes) = match element.mode {
			OffscreenMode::Hidden if self.is_concurrent() && !render_lanes.includes_some(Lanes::OFFSCREEN) => {
				let (base_lanes, cache_pool) = match &prev {
					Some(prev) => (prev.base_lanes | render_lanes, self.suspended_cache_pool()),
					None => (render_lanes, None),
				};
				let fiber = &mut self.fibers[wip];
				fiber.state = FiberState::Offscreen(Some(OffscreenState { base_lanes, cache_pool }));
				fiber.lanes = Lanes::OFFSCREEN;
				fiber.child_lanes = Lanes::OFFSCREEN;
				self.push_offscreen(wip, None, render_lanes);
				tracing::trace!(fiber = ?wip, "work.defer_hidden");
				return Ok(None);
			}
			OffscreenMode::Hidden => {
				self.fibers[wip].state = FiberState::Offscreen(Some(OffscreenState {
					base_lanes: Lanes::NONE,
					cache_pool: None,
				}));
				match prev {
					Some(prev) => (prev.cache_pool.map(|c| c.pool), prev.base_lanes | render_lanes),
					None => (None, render_lanes),
				}
			}
			OffscreenMode::Visible => match prev {
				Some(prev) => {
					self.fibers[wip].state = FiberState::Offscreen(None);
					(prev.cache_pool.map(|c| c.pool), prev.base_lanes | render_lanes)
				}
				None => (None, render_lanes),
			},
		};
		self.push_offscreen(wip, pool, lanes);
		Ok(self.reconcile(current, wip, &element.children))
	}

	fn push_offscreen(&mut self, wip: FiberId, pool: Option<Rc<Cache>>, lanes: Lanes) {
		let resumed = pool.or_else(|| self.at.stacks.resumed_cache.current().clone());
		self.at.stacks.resumed_cache.push(resumed, wip);
		self.at.stacks.render_lanes.push(lanes, wip);
		self.at.stacks.suspense.push_offscreen(wip);
	}

	pub(super) fn pop_offscreen(&mut self, wip: FiberId) -> Result<(), ReconcileError> {
		self.at.stacks.suspense.pop(wip)?;
		self.at.stacks.render_lanes.pop(wip)?;
		self.at.stacks.resumed_cache.pop(wip)
	}

	fn update_suspense(&mut self, current: Option<FiberId>, wip: FiberId, element: &Rc<SuspenseElement>) -> Begun {
		let did_suspend = self.fibers[wip].flags.contains(FiberFlags::DID_CAPTURE);
		if did_suspend {
			self.fibers[wip].flags.remove(FiberFlags::DID_CAPTURE);
		}
		let entry = BoundaryEntry {
			avoid_fallback: element.avoid_this_fallback,
			dehydrated: false,
			shows_content: true,
		};

		let Some(current) = current else {
			if !did_suspend && let Some(marker) = self.claim_suspense_instance(wip)? {
				self.at.stacks.suspense.push_primary(wip, BoundaryEntry { dehydrated: true, ..entry });
				self.mount_dehydrated_suspense(wip, &marker);
				return Ok(None);
			}
			if did_suspend {
				self.at.stacks.suspense.push_fallback(wip);
				return Ok(Some(self.mount_suspense_fallback_children(wip, element)));
			}
			self.at.stacks.suspense.push_primary(wip, entry);
			return Ok(Some(self.mount_suspense_primary_children(wip, &element.children)));
		};

		if let Some(marker) = self.fibers[current].dehydrated_marker().cloned() {
			self.at.stacks.suspense.push_primary(wip, BoundaryEntry { dehydrated: true, ..entry });
			return self.update_dehydrated_suspense(current, wip, did_suspend, element, marker);
		}
		if did_suspend {
			self.at.stacks.suspense.push_fallback(wip);
			return Ok(Some(self.update_suspense_fallback_children(current, wip, element)));
		}
		let shows_content = self.fibers[current].suspense_state().is_none();
		self.at.stacks.suspense.push_primary(wip, BoundaryEntry { shows_content, ..entry });
		self.fibers[wip].state = FiberState::Suspense(None);
		Ok(Some(self.update_suspense_primary_children(current, wip, &element.children)))
	}

	/// Schedules a claimed boundary for hydration at a later lane.
	fn mount_dehydrated_suspense(&mut self, wip: FiberId, marker: &H::Node) {
		let lane = if !self.is_concurrent() {
			Lanes::SYNC
		} else if self.host.is_fallback_suspense_marker(marker) {
			Lanes::DEFAULT_HYDRATION
		} else {
			Lanes::OFFSCREEN
		};
		tracing::trace!(fiber = ?wip, lane = lane.label(), "hydration.boundary_deferred");
		self.fibers[wip].lanes = lane;
	}

	fn mount_suspense_primary_children(&mut self, wip: FiberId, children: &[Element]) -> FiberId {
		let props = offscreen(OffscreenMode::Visible, children.iter().cloned());
		let mode = self.fibers[wip].mode;
		let primary = self.fibers.insert(Fiber::new(FiberKind::Offscreen, props, None, mode));
		self.link_children(wip, &[primary]);
		primary
	}

	/// Mounts a boundary straight into its fallback. The primary subtree is
	/// kept as an unrendered hidden placeholder.
	fn mount_suspense_fallback_children(&mut self, wip: FiberId, element: &SuspenseElement) -> FiberId {
		let mode = self.fibers[wip].mode;
		let primary_props = offscreen(OffscreenMode::Hidden, element.children.iter().cloned());
		let mut primary = Fiber::new(FiberKind::Offscreen, primary_props.clone(), None, mode);
		primary.memoized_props = Some(primary_props);
		let state = self.mount_offscreen_state();
		if state.cache_pool.is_some() {
			primary.flags |= FiberFlags::PASSIVE;
		}
		primary.state = FiberState::Offscreen(Some(state));
		let primary = self.fibers.insert(primary);

		let fallback_props = fragment(element.fallback.iter().cloned());
		let fallback = self.fibers.insert(Fiber::new(FiberKind::Fragment, fallback_props, None, mode));
		self.link_children(wip, &[primary, fallback]);
		self.fibers[wip].state = FiberState::Suspense(Some(SuspenseState::fallback()));
		fallback
	}

	fn update_suspense_primary_children(&mut self, current: FiberId, wip: FiberId, children: &[Element]) -> FiberId {
		let Some(current_primary) = self.fibers[current].child else {
			return self.mount_suspense_primary_children(wip, children);
		};
		let current_fallback = self.fibers[current_primary].sibling;
		let props = offscreen(OffscreenMode::Visible, children.iter().cloned());
		let primary = self.fibers.create_work_in_progress(current_primary, props);
		self.link_children(wip, &[primary]);
		if let Some(fallback) = current_fallback {
			self.delete_child(wip, fallback);
		}
		primary
	}

	fn update_suspense_fallback_children(&mut self, current: FiberId, wip: FiberId, element: &SuspenseElement) -> FiberId {
		let Some(current_primary) = self.fibers[current].child else {
			return self.mount_suspense_fallback_children(wip, element);
		};
		let current_fallback = self.fibers[current_primary].sibling;
		let mode = self.fibers[wip].mode;

		let primary_props = offscreen(OffscreenMode::Hidden, element.children.iter().cloned());
		let primary = self.fibers.create_work_in_progress(current_primary, primary_props.clone());
		let prev_state = self.fibers[current_primary].offscreen_state().cloned();
		let state = match &prev_state {
			Some(prev) => self.update_offscreen_state(prev),
			None => self.mount_offscreen_state(),
		};
		let pool_changed = !same_pool(
			prev_state.as_ref().and_then(|s| s.cache_pool.as_ref()),
			state.cache_pool.as_ref(),
		);
		let remaining = self.fibers[current].child_lanes.without(self.at.stacks.render_lanes());
		let fiber = &mut self.fibers[primary];
		fiber.memoized_props = Some(primary_props);
		fiber.state = FiberState::Offscreen(Some(state));
		fiber.child_lanes = remaining;
		if pool_changed {
			fiber.flags |= FiberFlags::PASSIVE;
		}

		let fallback_props = fragment(element.fallback.iter().cloned());
		let fallback = match current_fallback {
			Some(existing) => self.fibers.create_work_in_progress(existing, fallback_props),
			None => {
				let mut fiber = Fiber::new(FiberKind::Fragment, fallback_props, None, mode);
				fiber.flags |= FiberFlags::PLACEMENT;
				self.fibers.insert(fiber)
			}
		};
		self.link_children(wip, &[primary, fallback]);
		self.fibers[wip].state = FiberState::Suspense(Some(SuspenseState::fallback()));
		fallback
	}

	/// Begins a boundary whose committed buffer still holds server content.
	fn update_dehydrated_suspense(
		&mut self,
		current: FiberId,
		wip: FiberId,
		did_suspend: bool,
		element: &SuspenseElement,
		marker: H::Node,
	) -> Begun {
		if !did_suspend {
			if !self.is_concurrent() {
				return Ok(Some(self.retry_suspense_without_hydrating(current, wip, element, None)));
			}
			if self.host.is_fallback_suspense_marker(&marker) {
				let digest = self.host.suspense_error_digest(&marker);
				let error = HydrationError::ServerError { digest };
				return Ok(Some(self.retry_suspense_without_hydrating(current, wip, element, Some(error))));
			}
			let context_changed = self.fibers[current]
				.child_lanes
				.includes_some(self.at.stacks.render_lanes());
			if self.did_receive_update || context_changed {
				let error = HydrationError::UpdatedBeforeHydration;
				return Ok(Some(self.retry_suspense_without_hydrating(current, wip, element, Some(error))));
			}
			if self.host.is_pending_suspense_marker(&marker) {
				let child = self.fibers[current].child;
				let fiber = &mut self.fibers[wip];
				fiber.flags |= FiberFlags::DID_CAPTURE;
				fiber.child = child;
				tracing::debug!(fiber = ?wip, "hydration.await_server");
				self.at.marker_retries.push((marker, current));
				return Ok(None);
			}
			let first = self.scanner().next_sibling_position(&marker);
			self.at.hydration.enter(wip, first);
			let primary = self.mount_suspense_primary_children(wip, &element.children);
			self.fibers[primary].flags |= FiberFlags::HYDRATING;
			return Ok(Some(primary));
		}

		if self.fibers[wip].flags.contains(FiberFlags::FORCE_CLIENT_RENDER) {
			self.fibers[wip].flags.remove(FiberFlags::FORCE_CLIENT_RENDER);
			return Ok(Some(self.retry_suspense_without_hydrating(current, wip, element, None)));
		}
		if self.fibers[wip].dehydrated_marker().is_some() {
			// Something under the boundary suspended while hydrating; keep the
			// server content and try again once it settles.
			let child = self.fibers[current].child;
			let fiber = &mut self.fibers[wip];
			fiber.child = child;
			fiber.flags |= FiberFlags::DID_CAPTURE;
			return Ok(None);
		}
		let committed = self.fibers[current].child;
		self.delete_remaining_children(wip, committed);
		let fallback = self.mount_suspense_fallback_children(wip, element);
		self.fibers[fallback].flags |= FiberFlags::PLACEMENT;
		Ok(Some(fallback))
	}

	/// Drops a boundary's server content and renders it from scratch.
	fn retry_suspense_without_hydrating(
		&mut self,
		current: FiberId,
		wip: FiberId,
		element: &SuspenseElement,
		error: Option<HydrationError>,
	) -> FiberId {
		if let Some(error) = error {
			self.at.hydration.queue_error(error);
		}
		tracing::debug!(fiber = ?wip, "hydration.boundary_client_render");
		let committed = self.fibers[current].child;
		self.delete_remaining_children(wip, committed);
		let primary = self.mount_suspense_primary_children(wip, &element.children);
		self.fibers[primary].flags |= FiberFlags::PLACEMENT;
		self.fibers[wip].state = FiberState::Suspense(None);
		primary
	}
}
