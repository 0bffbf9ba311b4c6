use super::*;

#[test]
fn new_cache_starts_unretained() {
	let cache = Cache::new();
	assert_eq!(cache.ref_count(), 0);
	assert!(!cache.is_aborted());
}

#[test]
fn release_reports_last_reference() {
	let cache = Cache::new();
	cache.retain();
	cache.retain();
	assert_eq!(cache.release(), CacheRelease::Retained);
	assert_eq!(cache.release(), CacheRelease::Freed);
	assert_eq!(cache.release(), CacheRelease::Underflow);
}

#[test]
fn memo_table_is_keyed_by_type_and_key() {
	let cache = Cache::new();
	let mut calls = 0;
	let a: u32 = cache.get_or_insert_with("k", || {
		calls += 1;
		7
	});
	let b: u32 = cache.get_or_insert_with("k", || {
		calls += 1;
		8
	});
	let s: String = cache.get_or_insert_with("k", || "other".to_string());
	assert_eq!((a, b, calls), (7, 7, 1));
	assert_eq!(s, "other");
	assert_eq!(cache.len(), 2);
}

#[test]
fn abort_evicts_entries_once() {
	let cache = Cache::new();
	let _: u8 = cache.get_or_insert_with("x", || 1);
	cache.abort();
	cache.abort();
	assert!(cache.is_aborted());
	assert!(cache.is_empty());
	let v: u8 = cache.get_or_insert_with("x", || 2);
	assert_eq!(v, 2);
	assert!(cache.is_empty());
}

#[tokio::test]
async fn abort_signal_resolves() {
	let cache = Cache::new();
	let signal = cache.abort_signal();
	assert!(!signal.is_cancelled());
	cache.abort();
	tokio::time::timeout(std::time::Duration::from_secs(1), signal.cancelled())
		.await
		.expect("abort signal should fire");
}
