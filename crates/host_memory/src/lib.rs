//! An in-memory host for the reconciler.
//!
//! [`MemoryHost`] renders into a [`Document`] of element, text and comment
//! nodes. [`prerender`] produces the marker-annotated output a streaming
//! server would, so hydration can be exercised end to end, and
//! [`MemoryRuntime`] ties a reconciler, the event replay queue and event
//! delivery together on one deterministic scheduler.

pub mod config;
pub mod document;
pub mod host;
pub mod prerender;
pub mod runtime;

pub use config::{RuntimeConfig, SchedulerConfig};
pub use document::{Document, Namespace, NodeData, NodeId};
pub use host::{FatalReport, HostOp, MemoryHost};
pub use prerender::{PrerenderError, Prerenderer, prerender};
pub use runtime::{Delivered, DispatchOutcome, MemoryEvent, MemoryReconciler, MemoryRuntime};

// Only the integration tests drive async signals and install a subscriber.
#[cfg(test)]
use tokio as _;
#[cfg(test)]
use tracing_subscriber as _;
