//! Reconciler configuration.
//!
//! Everything here has a working default; a TOML document only needs to
//! name the values it changes.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level reconciler settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconcilerConfig {
	/// Yield to the scheduler between units when rendering non-blocking
	/// lanes.
	#[serde(default = "default_true")]
	pub time_slicing: bool,
	/// Check that each contextual stack pop comes from the unit that pushed.
	#[serde(default = "default_validate_stack")]
	pub validate_stack: bool,
	#[serde(default)]
	pub hydration: HydrationConfig,
}

fn default_true() -> bool {
	true
}

fn default_validate_stack() -> bool {
	cfg!(debug_assertions)
}

impl Default for ReconcilerConfig {
	fn default() -> Self {
		Self {
			time_slicing: true,
			validate_stack: default_validate_stack(),
			hydration: HydrationConfig::default(),
		}
	}
}

impl ReconcilerConfig {
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(source)?;
		config.hydration.validate()?;
		Ok(config)
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

/// Which pre-rendered host nodes the hydration scanner steps over.
///
/// The skip set is the union of `skip` and, when enabled, the document
/// singletons.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HydrationConfig {
	#[serde(default = "default_skip_rules")]
	pub skip: Vec<SkipRule>,
	/// Also skip `html`, `head` and `body`; those are claimed as singletons
	/// rather than matched positionally.
	#[serde(default = "default_true")]
	pub skip_singletons: bool,
	/// Parents whose unmatched trailing children are left in place.
	#[serde(default = "default_keep_tail_within")]
	pub keep_tail_within: Vec<String>,
}

impl Default for HydrationConfig {
	fn default() -> Self {
		Self {
			skip: default_skip_rules(),
			skip_singletons: true,
			keep_tail_within: default_keep_tail_within(),
		}
	}
}

fn default_keep_tail_within() -> Vec<String> {
	vec!["head".to_string(), "body".to_string()]
}

fn default_skip_rules() -> Vec<SkipRule> {
	vec![
		SkipRule::always("title"),
		SkipRule::always("meta"),
		SkipRule::always("base"),
		SkipRule {
			tag: "link".to_string(),
			when: Vec::new(),
			unless: vec![
				AttrCondition::equals("rel", "stylesheet"),
				AttrCondition::absent("data-precedence"),
			],
		},
		SkipRule {
			tag: "style".to_string(),
			when: vec![AttrCondition::present("data-precedence")],
			unless: Vec::new(),
		},
		SkipRule {
			tag: "script".to_string(),
			when: vec![AttrCondition::present("async")],
			unless: Vec::new(),
		},
	]
}

impl HydrationConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		for rule in &self.skip {
			if rule.tag.is_empty() {
				return Err(ConfigError::InvalidSkipRule {
					tag: rule.tag.clone(),
					reason: "tag must not be empty",
				});
			}
			let conditions = rule.when.iter().chain(&rule.unless);
			if conditions.into_iter().any(|c| !c.present && c.equals.is_some()) {
				return Err(ConfigError::InvalidSkipRule {
					tag: rule.tag.clone(),
					reason: "an absent attribute cannot also require a value",
				});
			}
		}
		Ok(())
	}

	/// Whether an element with this tag is stepped over.
	///
	/// `attr` looks up an attribute on the candidate node.
	pub fn skips<'a>(&self, tag: &str, attr: impl Fn(&str) -> Option<&'a str>) -> bool {
		if self.skip_singletons && matches!(tag, "html" | "head" | "body") {
			return true;
		}
		self.skip
			.iter()
			.filter(|rule| rule.tag.eq_ignore_ascii_case(tag))
			.any(|rule| rule.applies(&attr))
	}

	pub fn keeps_tail_within(&self, tag: &str) -> bool {
		self.keep_tail_within.iter().any(|t| t.eq_ignore_ascii_case(tag))
	}
}

/// One element kind the hydration scanner skips.
///
/// The rule applies when every `when` condition holds and it is not the
/// case that every `unless` condition holds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SkipRule {
	pub tag: String,
	#[serde(default)]
	pub when: Vec<AttrCondition>,
	#[serde(default)]
	pub unless: Vec<AttrCondition>,
}

impl SkipRule {
	pub fn always(tag: &str) -> Self {
		Self {
			tag: tag.to_string(),
			when: Vec::new(),
			unless: Vec::new(),
		}
	}

	fn applies<'a>(&self, attr: &impl Fn(&str) -> Option<&'a str>) -> bool {
		let when = self.when.iter().all(|c| c.holds(attr));
		let unless = !self.unless.is_empty() && self.unless.iter().all(|c| c.holds(attr));
		when && !unless
	}
}

/// A test on one attribute of a candidate node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttrCondition {
	pub attr: String,
	#[serde(default)]
	pub equals: Option<String>,
	#[serde(default = "default_true")]
	pub present: bool,
}

impl AttrCondition {
	pub fn present(attr: &str) -> Self {
		Self {
			attr: attr.to_string(),
			equals: None,
			present: true,
		}
	}

	pub fn absent(attr: &str) -> Self {
		Self {
			attr: attr.to_string(),
			equals: None,
			present: false,
		}
	}

	pub fn equals(attr: &str, value: &str) -> Self {
		Self {
			attr: attr.to_string(),
			equals: Some(value.to_string()),
			present: true,
		}
	}

	fn holds<'a>(&self, attr: &impl Fn(&str) -> Option<&'a str>) -> bool {
		match (attr(&self.attr), self.present) {
			(None, present) => !present,
			(Some(_), false) => false,
			(Some(value), true) => self.equals.as_deref().is_none_or(|expected| expected == value),
		}
	}
}
