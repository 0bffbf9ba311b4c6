//! Runtime settings: the reconciler's own keys at the top level, plus
//! `[replay]` and `[scheduler]` tables.
//!
//! ```toml
//! time_slicing = false
//!
//! [replay]
//! discrete = false
//!
//! [scheduler]
//! yield_budget = 4
//! ```

use std::path::Path;

use serde::Deserialize;
use trellis_reconciler::error::ConfigError;
use trellis_reconciler::ReconcilerConfig;
use trellis_replay::ReplayConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
	/// Yield checks a task gets before time-sliced work yields. Unset never
	/// yields on its own.
	#[serde(default)]
	pub yield_budget: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
	pub reconciler: ReconcilerConfig,
	pub replay: ReplayConfig,
	pub scheduler: SchedulerConfig,
}

/// The tables the reconciler does not read.
#[derive(Deserialize)]
struct Sections {
	#[serde(default)]
	replay: ReplayConfig,
	#[serde(default)]
	scheduler: SchedulerConfig,
}

impl RuntimeConfig {
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		let reconciler = ReconcilerConfig::from_toml_str(source)?;
		let Sections { replay, scheduler } = toml::from_str(source)?;
		Ok(Self {
			reconciler,
			replay,
			scheduler,
		})
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&source)
	}
}

#[cfg(test)]
mod tests;
