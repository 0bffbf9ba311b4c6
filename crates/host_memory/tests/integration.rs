#![allow(unused_crate_dependencies)]

#[path = "integration/common/mod.rs"]
mod common;

#[path = "integration/cache.rs"]
mod cache;

#[path = "integration/hydration.rs"]
mod hydration;

#[path = "integration/legacy.rs"]
mod legacy;

#[path = "integration/replay.rs"]
mod replay;

#[path = "integration/suspense.rs"]
mod suspense;

#[path = "integration/time_slicing.rs"]
mod time_slicing;
