use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use trellis_reconciler::element::{cache, component, suspense, text};
use trellis_reconciler::{Cache, Component, RenderContext, Rendered, Resource};

use crate::common::*;

#[test]
fn components_outside_a_boundary_share_the_root_cache() {
	let (mut runtime, container) = client_runtime();
	let root = runtime.create_root(container);
	let seen = Rc::new(RefCell::new(None));

	runtime.render(root, component(GrabCache(Rc::clone(&seen)))).expect("render");
	runtime.flush();

	let used = seen.borrow().clone().expect("rendered with a cache");
	let owned = runtime.reconciler().root_cache(root).expect("root cache");
	assert!(Rc::ptr_eq(&used, &owned));
}

#[tokio::test]
async fn unmounting_a_cache_boundary_aborts_its_cache() {
	let (mut runtime, container) = client_runtime();
	let root = runtime.create_root(container);
	let seen = Rc::new(RefCell::new(None));

	runtime
		.render(root, cache([component(GrabCache(Rc::clone(&seen)))]))
		.expect("render");
	runtime.flush();
	let boundary_cache = seen.borrow().clone().expect("rendered with a cache");
	assert!(!boundary_cache.is_aborted());
	let signal = boundary_cache.abort_signal();

	runtime.render(root, text("gone")).expect("render");
	runtime.flush();

	tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
		.await
		.expect("cache aborted");
	assert!(boundary_cache.is_aborted());
	assert!(boundary_cache.is_empty());
	assert_eq!(markup(&runtime, container), "gone");
}

/// Records the cache of every render attempt, then reads a resource.
#[derive(Debug)]
struct RecordsCaches {
	seen: Rc<RefCell<Vec<Rc<Cache>>>>,
	data: Resource<String>,
}

impl Component for RecordsCaches {
	fn render(&self, cx: &mut RenderContext<'_>) -> Rendered {
		if let Some(cache) = cx.cache() {
			self.seen.borrow_mut().push(Rc::clone(cache));
		}
		let value = cx.read(&self.data)?;
		Ok(text(&value))
	}
}

#[test]
fn cache_boundary_keeps_its_cache_across_suspend_and_resume() {
	let (mut runtime, container) = client_runtime();
	let root = runtime.create_root(container);
	let seen = Rc::new(RefCell::new(Vec::new()));
	let data = Resource::pending();
	let tree = suspense(
		[cache([component(RecordsCaches {
			seen: Rc::clone(&seen),
			data: data.clone(),
		})])],
		[text("loading")],
	);

	runtime.render(root, tree).expect("render");
	runtime.flush();
	assert_eq!(markup(&runtime, container), "loading");
	let suspended = seen.borrow().last().cloned().expect("rendered once");

	data.resolve("done".to_string());
	runtime.flush();
	assert_eq!(markup(&runtime, container), "done");

	let resumed = seen.borrow().last().cloned().expect("rendered again");
	assert!(seen.borrow().len() >= 2);
	assert!(Rc::ptr_eq(&suspended, &resumed));
	assert_eq!(suspended.id(), resumed.id());
	assert!(!resumed.is_aborted());
}
