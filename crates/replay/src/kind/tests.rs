use std::str::FromStr;

use pretty_assertions::assert_eq;
use rstest::rstest;
use strum::IntoEnumIterator;

use super::*;

#[rstest]
#[case("mousedown", EventKind::MouseDown)]
#[case("textInput", EventKind::TextInput)]
#[case("gotpointercapture", EventKind::GotPointerCapture)]
#[case("focusin", EventKind::FocusIn)]
fn parses_host_names(#[case] name: &str, #[case] kind: EventKind) {
	assert_eq!(EventKind::from_str(name), Ok(kind));
	assert_eq!(kind.as_str(), name);
}

#[test]
fn unknown_name_is_rejected() {
	assert!(EventKind::from_str("hashchange").is_err());
}

#[rstest]
#[case(EventKind::Click, ReplayClass::Discrete)]
#[case(EventKind::KeyDown, ReplayClass::Discrete)]
#[case(EventKind::Submit, ReplayClass::Discrete)]
#[case(EventKind::FocusIn, ReplayClass::Continuous(ContinuousSlot::Focus))]
#[case(EventKind::DragEnter, ReplayClass::Continuous(ContinuousSlot::Drag))]
#[case(EventKind::MouseOver, ReplayClass::Continuous(ContinuousSlot::Mouse))]
#[case(EventKind::PointerOver, ReplayClass::Continuous(ContinuousSlot::Pointer))]
#[case(EventKind::GotPointerCapture, ReplayClass::Continuous(ContinuousSlot::PointerCapture))]
#[case(EventKind::FocusOut, ReplayClass::NotReplayable)]
#[case(EventKind::MouseMove, ReplayClass::NotReplayable)]
#[case(EventKind::Scroll, ReplayClass::NotReplayable)]
fn classifies(#[case] kind: EventKind, #[case] class: ReplayClass) {
	assert_eq!(kind.replay_class(), class);
}

#[test]
fn every_continuous_kind_clears_its_own_slot() {
	for kind in EventKind::iter() {
		if let ReplayClass::Continuous(slot) = kind.replay_class() {
			assert_eq!(kind.cleared_slot(), Some(slot), "{}", kind.as_str());
		}
	}
}

#[test]
fn discrete_kinds_dispatch_at_discrete_priority() {
	for kind in EventKind::iter().filter(|k| k.is_discrete_replayable()) {
		assert_eq!(kind.priority(), EventPriority::DISCRETE, "{}", kind.as_str());
	}
	assert_eq!(EventKind::MouseMove.priority(), EventPriority::CONTINUOUS);
	assert_eq!(EventKind::Load.priority(), EventPriority::DEFAULT);
}
