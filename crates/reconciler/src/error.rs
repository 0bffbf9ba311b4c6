//! Error types for rendering, hydration, and configuration.

use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use thiserror::Error;
use trellis_primitives::{FiberId, RootId, StackError};

/// An error raised by a component while rendering.
///
/// Cheap to clone; boundaries keep it in their state and hand it to their
/// fallback.
#[derive(Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RenderError {
	message: Rc<str>,
	digest: Option<Rc<str>>,
}

impl RenderError {
	pub fn new(message: impl Into<Rc<str>>) -> Self {
		Self {
			message: message.into(),
			digest: None,
		}
	}

	/// Attaches the opaque code a server assigned to this failure.
	pub fn with_digest(mut self, digest: impl Into<Rc<str>>) -> Self {
		self.digest = Some(digest.into());
		self
	}

	pub fn message(&self) -> &str {
		&self.message
	}

	pub fn digest(&self) -> Option<&str> {
		self.digest.as_deref()
	}
}

impl fmt::Debug for RenderError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.digest {
			Some(digest) => write!(f, "RenderError({:?}, digest = {:?})", self.message, digest),
			None => write!(f, "RenderError({:?})", self.message),
		}
	}
}

/// One disagreement between pre-rendered host output and the tree being
/// built.
///
/// These are buffered while a subtree hydrates and reported as recoverable
/// once the subtree finishes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HydrationError {
	#[error("expected {expected} while hydrating, found {found}")]
	UnexpectedNode { expected: String, found: String },
	#[error("hydrated text does not match: server {server:?}, client {client:?}")]
	TextMismatch { server: String, client: String },
	#[error("unmatched server content left after hydration: {found}")]
	UnhydratedTail { found: String },
	#[error("suspense boundary errored on the server{}", digest_suffix(.digest))]
	ServerError { digest: Option<String> },
	#[error("suspense boundary received an update before it finished hydrating")]
	UpdatedBeforeHydration,
	#[error("error while hydrating: {0}")]
	Render(RenderError),
}

fn digest_suffix(digest: &Option<String>) -> String {
	digest.as_deref().map(|d| format!(" (digest {d})")).unwrap_or_default()
}

/// Errors that abort a root's render or commit.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
	/// A render error reached the root with no error boundary above it.
	#[error("uncaught render error: {0}")]
	Uncaught(RenderError),

	/// The host had no instance for a singleton element the tree requires.
	#[error("missing mandatory host singleton <{ty}>")]
	MissingSingleton { ty: String },

	/// Push/pop of contextual values went out of balance.
	#[error("context stack invariant violated at {fiber:?}: {error}")]
	Stack {
		fiber: FiberId,
		error: StackError<FiberId>,
	},

	/// Internal bookkeeping reached a state it never should.
	#[error("invariant violated: {0}")]
	Invariant(&'static str),

	#[error("unknown root {0:?}")]
	UnknownRoot(RootId),
}

impl ReconcileError {
	pub(crate) fn stack(fiber: FiberId, error: StackError<FiberId>) -> Self {
		ReconcileError::Stack { fiber, error }
	}
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("I/O error reading {path}: {error}")]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},

	#[error("invalid skip rule for <{tag}>: {reason}")]
	InvalidSkipRule { tag: String, reason: &'static str },
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
