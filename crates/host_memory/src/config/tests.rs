use pretty_assertions::assert_eq;

use super::*;

#[test]
fn empty_source_is_the_default() {
	assert_eq!(RuntimeConfig::from_toml_str("").expect("parse"), RuntimeConfig::default());
}

#[test]
fn sections_are_read_alongside_reconciler_keys() {
	let config = RuntimeConfig::from_toml_str(
		r#"
		time_slicing = false

		[replay]
		discrete = false

		[scheduler]
		yield_budget = 4
		"#,
	)
	.expect("parse");
	assert!(!config.reconciler.time_slicing);
	assert!(!config.replay.discrete);
	assert!(config.replay.continuous);
	assert_eq!(config.scheduler.yield_budget, Some(4));
}

#[test]
fn reconciler_validation_still_applies() {
	let err = RuntimeConfig::from_toml_str(
		r#"
		[[hydration.skip]]
		tag = ""
		"#,
	)
	.unwrap_err();
	assert!(matches!(err, ConfigError::InvalidSkipRule { .. }));
}

#[test]
fn missing_file_is_an_io_error() {
	let err = RuntimeConfig::load("/nonexistent/trellis.toml").unwrap_err();
	assert!(matches!(err, ConfigError::Io { .. }));
}
