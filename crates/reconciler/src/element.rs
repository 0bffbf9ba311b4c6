//! Declarative element descriptions.
//!
//! An [`Element`] is an immutable description of what a position in the tree
//! should look like. Elements are reference-counted; passing the same element
//! again is how a parent signals "nothing changed here", which lets the work
//! loop skip the subtree.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::error::RenderError;
use crate::render::{RenderContext, Rendered};

/// Reconciliation key distinguishing siblings of the same type.
pub type Key = Rc<str>;

/// One attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
	Str(String),
	Bool(bool),
	Int(i64),
}

impl PropValue {
	/// The attribute text a host would serialize for this value, or `None`
	/// when the attribute is omitted entirely.
	pub fn to_attribute(&self) -> Option<String> {
		match self {
			PropValue::Str(s) => Some(s.clone()),
			PropValue::Bool(true) => Some(String::new()),
			PropValue::Bool(false) => None,
			PropValue::Int(n) => Some(n.to_string()),
		}
	}
}

impl From<&str> for PropValue {
	fn from(value: &str) -> Self {
		PropValue::Str(value.to_string())
	}
}

impl From<String> for PropValue {
	fn from(value: String) -> Self {
		PropValue::Str(value)
	}
}

impl From<bool> for PropValue {
	fn from(value: bool) -> Self {
		PropValue::Bool(value)
	}
}

impl From<i64> for PropValue {
	fn from(value: i64) -> Self {
		PropValue::Int(value)
	}
}

/// Ordered attribute map of a host element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Props(IndexMap<String, PropValue>);

impl Props {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, name: &str, value: impl Into<PropValue>) -> Self {
		self.insert(name, value);
		self
	}

	pub fn insert(&mut self, name: &str, value: impl Into<PropValue>) {
		self.0.insert(name.to_string(), value.into());
	}

	pub fn get(&self, name: &str) -> Option<&PropValue> {
		self.0.get(name)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Changes turning `self` into `next`: removals first, then additions and
	/// modifications in `next`'s order.
	pub fn diff(&self, next: &Props) -> PropsDiff {
		let mut changes = Vec::new();
		for name in self.0.keys() {
			if !next.0.contains_key(name) {
				changes.push(PropChange {
					name: name.clone(),
					value: None,
				});
			}
		}
		for (name, value) in &next.0 {
			if self.0.get(name) != Some(value) {
				changes.push(PropChange {
					name: name.clone(),
					value: Some(value.clone()),
				});
			}
		}
		PropsDiff { changes }
	}
}

/// One attribute change. `value: None` removes the attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropChange {
	pub name: String,
	pub value: Option<PropValue>,
}

/// Attribute changes queued for a host instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropsDiff {
	pub changes: Vec<PropChange>,
}

impl PropsDiff {
	pub fn is_empty(&self) -> bool {
		self.changes.is_empty()
	}
}

/// User code that produces a subtree.
///
/// Components are identified by their concrete type: re-rendering with a
/// value of the same type updates the existing position, a different type
/// replaces it.
pub trait Component: Any + fmt::Debug {
	fn render(&self, cx: &mut RenderContext<'_>) -> Rendered;

	fn name(&self) -> &'static str {
		std::any::type_name::<Self>()
	}
}

/// Identity of a context value channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

/// Typed handle for reading and providing a context value.
#[derive(Debug)]
pub struct ContextKey<T> {
	id: ContextId,
	default: Rc<T>,
}

impl<T> Clone for ContextKey<T> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			default: self.default.clone(),
		}
	}
}

impl<T: 'static> ContextKey<T> {
	pub fn new(default: T) -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self {
			id: ContextId(NEXT.fetch_add(1, Ordering::Relaxed)),
			default: Rc::new(default),
		}
	}

	pub fn id(&self) -> ContextId {
		self.id
	}

	pub fn default_value(&self) -> Rc<T> {
		self.default.clone()
	}
}

#[derive(Debug, Clone)]
pub struct HostElement {
	pub ty: Rc<str>,
	pub key: Option<Key>,
	pub props: Props,
	pub children: Vec<Element>,
}

#[derive(Debug, Clone)]
pub struct ComponentElement {
	pub key: Option<Key>,
	pub component: Rc<dyn Component>,
}

impl ComponentElement {
	pub fn type_id(&self) -> TypeId {
		<dyn Component as Any>::type_id(&*self.component)
	}
}

#[derive(Debug, Clone, Default)]
pub struct FragmentElement {
	pub key: Option<Key>,
	pub children: Vec<Element>,
}

#[derive(Debug, Clone, Default)]
pub struct SuspenseElement {
	pub key: Option<Key>,
	pub children: Vec<Element>,
	pub fallback: Vec<Element>,
	/// Prefer keeping already-visible content over showing this fallback.
	pub avoid_this_fallback: bool,
}

/// Builds the fallback shown by an error boundary.
pub type ErrorFallback = Rc<dyn Fn(&RenderError) -> Element>;

#[derive(Clone)]
pub struct ErrorBoundaryElement {
	pub key: Option<Key>,
	pub children: Vec<Element>,
	pub fallback: ErrorFallback,
}

impl fmt::Debug for ErrorBoundaryElement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ErrorBoundaryElement")
			.field("key", &self.key)
			.field("children", &self.children)
			.finish_non_exhaustive()
	}
}

#[derive(Debug, Clone, Default)]
pub struct CacheElement {
	pub key: Option<Key>,
	pub children: Vec<Element>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OffscreenMode {
	#[default]
	Visible,
	Hidden,
}

#[derive(Debug, Clone, Default)]
pub struct OffscreenElement {
	pub key: Option<Key>,
	pub mode: OffscreenMode,
	pub children: Vec<Element>,
}

#[derive(Clone)]
pub struct ProviderElement {
	pub key: Option<Key>,
	pub context: ContextId,
	pub value: Rc<dyn Any>,
	pub children: Vec<Element>,
}

impl fmt::Debug for ProviderElement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProviderElement")
			.field("key", &self.key)
			.field("context", &self.context)
			.field("children", &self.children)
			.finish_non_exhaustive()
	}
}

#[derive(Debug, Clone, Default)]
pub struct ScopeElement {
	pub key: Option<Key>,
	pub children: Vec<Element>,
}

/// A node of the declared tree.
#[derive(Debug, Clone)]
pub enum Element {
	Host(Rc<HostElement>),
	Text(Rc<str>),
	Fragment(Rc<FragmentElement>),
	Component(Rc<ComponentElement>),
	Suspense(Rc<SuspenseElement>),
	ErrorBoundary(Rc<ErrorBoundaryElement>),
	Cache(Rc<CacheElement>),
	Offscreen(Rc<OffscreenElement>),
	Provider(Rc<ProviderElement>),
	Scope(Rc<ScopeElement>),
}

impl Element {
	pub fn empty() -> Self {
		Element::Fragment(Rc::default())
	}

	pub fn key(&self) -> Option<&Key> {
		match self {
			Element::Host(e) => e.key.as_ref(),
			Element::Text(_) => None,
			Element::Fragment(e) => e.key.as_ref(),
			Element::Component(e) => e.key.as_ref(),
			Element::Suspense(e) => e.key.as_ref(),
			Element::ErrorBoundary(e) => e.key.as_ref(),
			Element::Cache(e) => e.key.as_ref(),
			Element::Offscreen(e) => e.key.as_ref(),
			Element::Provider(e) => e.key.as_ref(),
			Element::Scope(e) => e.key.as_ref(),
		}
	}

	/// Returns the element with `key` set. Text has no key and is returned
	/// unchanged.
	pub fn with_key(mut self, key: &str) -> Self {
		let key = Some(Key::from(key));
		match &mut self {
			Element::Host(e) => Rc::make_mut(e).key = key,
			Element::Text(_) => {}
			Element::Fragment(e) => Rc::make_mut(e).key = key,
			Element::Component(e) => Rc::make_mut(e).key = key,
			Element::Suspense(e) => Rc::make_mut(e).key = key,
			Element::ErrorBoundary(e) => Rc::make_mut(e).key = key,
			Element::Cache(e) => Rc::make_mut(e).key = key,
			Element::Offscreen(e) => Rc::make_mut(e).key = key,
			Element::Provider(e) => Rc::make_mut(e).key = key,
			Element::Scope(e) => Rc::make_mut(e).key = key,
		}
		self
	}

	/// Pointer identity. Two elements are the same when one is a clone of the
	/// other.
	pub fn same(&self, other: &Element) -> bool {
		match (self, other) {
			(Element::Host(a), Element::Host(b)) => Rc::ptr_eq(a, b),
			(Element::Text(a), Element::Text(b)) => Rc::ptr_eq(a, b),
			(Element::Fragment(a), Element::Fragment(b)) => Rc::ptr_eq(a, b),
			(Element::Component(a), Element::Component(b)) => Rc::ptr_eq(a, b),
			(Element::Suspense(a), Element::Suspense(b)) => Rc::ptr_eq(a, b),
			(Element::ErrorBoundary(a), Element::ErrorBoundary(b)) => Rc::ptr_eq(a, b),
			(Element::Cache(a), Element::Cache(b)) => Rc::ptr_eq(a, b),
			(Element::Offscreen(a), Element::Offscreen(b)) => Rc::ptr_eq(a, b),
			(Element::Provider(a), Element::Provider(b)) => Rc::ptr_eq(a, b),
			(Element::Scope(a), Element::Scope(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}

	/// Children carried directly by this element, in order.
	pub fn children(&self) -> &[Element] {
		match self {
			Element::Host(e) => &e.children,
			Element::Text(_) | Element::Component(_) => &[],
			Element::Fragment(e) => &e.children,
			Element::Suspense(e) => &e.children,
			Element::ErrorBoundary(e) => &e.children,
			Element::Cache(e) => &e.children,
			Element::Offscreen(e) => &e.children,
			Element::Provider(e) => &e.children,
			Element::Scope(e) => &e.children,
		}
	}
}

impl From<&str> for Element {
	fn from(value: &str) -> Self {
		text(value)
	}
}

/// Builder for host elements.
#[derive(Debug)]
pub struct HostBuilder {
	inner: HostElement,
}

impl HostBuilder {
	pub fn key(mut self, key: &str) -> Self {
		self.inner.key = Some(Key::from(key));
		self
	}

	pub fn prop(mut self, name: &str, value: impl Into<PropValue>) -> Self {
		self.inner.props.insert(name, value);
		self
	}

	pub fn child(mut self, child: impl Into<Element>) -> Self {
		self.inner.children.push(child.into());
		self
	}

	pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
		self.inner.children.extend(children);
		self
	}

	pub fn build(self) -> Element {
		Element::Host(Rc::new(self.inner))
	}
}

impl From<HostBuilder> for Element {
	fn from(builder: HostBuilder) -> Self {
		builder.build()
	}
}

pub fn host(ty: &str) -> HostBuilder {
	HostBuilder {
		inner: HostElement {
			ty: Rc::from(ty),
			key: None,
			props: Props::new(),
			children: Vec::new(),
		},
	}
}

pub fn text(value: &str) -> Element {
	Element::Text(Rc::from(value))
}

pub fn fragment(children: impl IntoIterator<Item = Element>) -> Element {
	Element::Fragment(Rc::new(FragmentElement {
		key: None,
		children: children.into_iter().collect(),
	}))
}

pub fn component(component: impl Component) -> Element {
	Element::Component(Rc::new(ComponentElement {
		key: None,
		component: Rc::new(component),
	}))
}

pub fn suspense(children: impl IntoIterator<Item = Element>, fallback: impl IntoIterator<Item = Element>) -> Element {
	Element::Suspense(Rc::new(SuspenseElement {
		key: None,
		children: children.into_iter().collect(),
		fallback: fallback.into_iter().collect(),
		avoid_this_fallback: false,
	}))
}

/// A suspense boundary that would rather keep showing existing content than
/// reveal its own fallback.
pub fn suspense_avoided(
	children: impl IntoIterator<Item = Element>,
	fallback: impl IntoIterator<Item = Element>,
) -> Element {
	Element::Suspense(Rc::new(SuspenseElement {
		key: None,
		children: children.into_iter().collect(),
		fallback: fallback.into_iter().collect(),
		avoid_this_fallback: true,
	}))
}

pub fn error_boundary(
	children: impl IntoIterator<Item = Element>,
	fallback: impl Fn(&RenderError) -> Element + 'static,
) -> Element {
	Element::ErrorBoundary(Rc::new(ErrorBoundaryElement {
		key: None,
		children: children.into_iter().collect(),
		fallback: Rc::new(fallback),
	}))
}

pub fn cache(children: impl IntoIterator<Item = Element>) -> Element {
	Element::Cache(Rc::new(CacheElement {
		key: None,
		children: children.into_iter().collect(),
	}))
}

pub fn offscreen(mode: OffscreenMode, children: impl IntoIterator<Item = Element>) -> Element {
	Element::Offscreen(Rc::new(OffscreenElement {
		key: None,
		mode,
		children: children.into_iter().collect(),
	}))
}

pub fn provider<T: 'static>(
	key: &ContextKey<T>,
	value: T,
	children: impl IntoIterator<Item = Element>,
) -> Element {
	Element::Provider(Rc::new(ProviderElement {
		key: None,
		context: key.id(),
		value: Rc::new(value),
		children: children.into_iter().collect(),
	}))
}

pub fn scope(children: impl IntoIterator<Item = Element>) -> Element {
	Element::Scope(Rc::new(ScopeElement {
		key: None,
		children: children.into_iter().collect(),
	}))
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn diff_reports_removals_then_changes() {
		let old = Props::new().with("class", "a").with("id", "x").with("hidden", true);
		let new = Props::new().with("class", "b").with("hidden", true).with("tabindex", 1i64);
		let diff = old.diff(&new);
		assert_eq!(
			diff.changes,
			vec![
				PropChange {
					name: "id".into(),
					value: None
				},
				PropChange {
					name: "class".into(),
					value: Some(PropValue::from("b"))
				},
				PropChange {
					name: "tabindex".into(),
					value: Some(PropValue::Int(1))
				},
			]
		);
		assert!(new.diff(&new).is_empty());
	}

	#[test]
	fn clones_are_the_same_element() {
		let a = host("div").child("hi").build();
		let b = a.clone();
		let c = host("div").child("hi").build();
		assert!(a.same(&b));
		assert!(!a.same(&c));
		assert_eq!(a.children().len(), 1);
	}

	#[test]
	fn with_key_copies_on_write() {
		let a = host("li").build();
		let keyed = a.clone().with_key("k");
		assert_eq!(keyed.key().map(|k| &**k), Some("k"));
		assert!(a.key().is_none());
	}

	#[test]
	fn bool_attributes_serialize_by_presence() {
		assert_eq!(PropValue::Bool(true).to_attribute(), Some(String::new()));
		assert_eq!(PropValue::Bool(false).to_attribute(), None);
		assert_eq!(PropValue::Int(3).to_attribute(), Some("3".into()));
	}
}
