//! Incremental tree reconciliation with hydration and suspense.
//!
//! A [`Reconciler`] renders [`Element`] trees into a host through
//! [`HostConfig`], one root at a time, scheduling work by lane on a
//! [`Scheduler`]. Pre-rendered host output can be hydrated instead of
//! recreated, and subtrees waiting on async data show fallbacks until their
//! [`Wakeable`]s settle.

/// Render caches shared across suspend/resume cycles.
pub mod cache;
/// TOML-backed settings.
pub mod config;
/// The declared tree.
pub mod element;
pub mod error;
/// Work units and their arena.
pub mod fiber;
/// Host adapter contract.
pub mod host;
pub mod hydration;
mod reconciler;
/// What components see while rendering.
pub mod render;
pub mod root;
/// Task scheduling contract.
pub mod scheduler;
mod stacks;
mod suspense;
pub mod wakeable;
mod work_loop;

pub use cache::Cache;
pub use config::{HydrationConfig, ReconcilerConfig};
pub use element::{Component, ContextKey, Element, Props, PropsDiff};
pub use error::{ConfigError, HydrationError, ReconcileError, RenderError, Result};
pub use fiber::{FiberKind, FiberMode};
pub use host::{HostConfig, NodeKind};
pub use reconciler::Reconciler;
pub use render::{Interrupt, RenderContext, Rendered};
pub use root::RootPhase;
pub use scheduler::{Dequeued, ManualScheduler, Scheduler, Task, TaskHandle, TaskOutcome};
pub use stacks::Providers;
pub use trellis_primitives::{EventPriority, FiberId, Lane, Lanes, RootId, SchedulerPriority};
pub use wakeable::{Resource, Wakeable};
