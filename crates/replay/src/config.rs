use serde::Deserialize;

/// Which blocked events are kept for replay.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReplayConfig {
	/// Queue discrete events (clicks, key presses) in arrival order.
	#[serde(default = "default_true")]
	pub discrete: bool,
	/// Keep the latest hover, focus and pointer event per family.
	#[serde(default = "default_true")]
	pub continuous: bool,
}

fn default_true() -> bool {
	true
}

impl Default for ReplayConfig {
	fn default() -> Self {
		Self {
			discrete: true,
			continuous: true,
		}
	}
}
