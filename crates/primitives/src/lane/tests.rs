use proptest::prelude::*;
use rstest::rstest;

use super::*;

#[test]
fn highest_priority_lane_is_lowest_bit() {
	let lanes = Lanes::DEFAULT | Lanes::INPUT_CONTINUOUS | Lanes::IDLE;
	assert_eq!(lanes.highest_priority_lane(), Lanes::INPUT_CONTINUOUS);
	assert_eq!(Lanes::NONE.highest_priority_lane(), Lanes::NONE);
}

#[test]
fn groups_are_disjoint_and_sized() {
	assert_eq!(Lanes::TRANSITIONS.bits().count_ones(), 15);
	assert_eq!(Lanes::RETRIES.bits().count_ones(), 5);
	assert!(!Lanes::TRANSITIONS.intersects(Lanes::RETRIES));
	assert!(!Lanes::TRANSITIONS.intersects(Lanes::BLOCKING));
	assert!(Lanes::NON_IDLE.contains(Lanes::SELECTIVE_HYDRATION));
	assert!(!Lanes::NON_IDLE.intersects(Lanes::IDLE | Lanes::IDLE_HYDRATION | Lanes::OFFSCREEN));
	assert_eq!(Lanes::all().bits().count_ones() as usize, TOTAL_LANES);
}

#[test]
fn transition_group_renders_together() {
	let mut claims = LaneClaims::default();
	let a = claims.claim_transition_lane();
	let b = claims.claim_transition_lane();
	assert_ne!(a, b);
	let pending = a | b | Lanes::IDLE;
	assert_eq!(pending.highest_priority_lanes(), a | b);
	assert_eq!((Lanes::SYNC | a).highest_priority_lanes(), Lanes::SYNC);
}

#[test]
fn claims_wrap_around() {
	let mut claims = LaneClaims::default();
	let first = claims.claim_retry_lane();
	for _ in 0..4 {
		assert!(Lanes::RETRIES.contains(claims.claim_retry_lane()));
	}
	assert_eq!(claims.claim_retry_lane(), first);

	let first = claims.claim_transition_lane();
	let mut seen = first;
	for _ in 0..14 {
		seen |= claims.claim_transition_lane();
	}
	assert_eq!(seen, Lanes::TRANSITIONS);
	assert_eq!(claims.claim_transition_lane(), first);
}

#[test]
fn empty_lane_never_compares_higher() {
	assert!(!Lanes::NONE.is_higher_priority_than(Lanes::IDLE));
	assert!(!Lanes::SYNC.is_higher_priority_than(Lanes::NONE));
	assert!(Lanes::SYNC.is_higher_priority_than(Lanes::DEFAULT));
	assert_eq!(higher_priority_lane(Lanes::NONE, Lanes::IDLE), Lanes::IDLE);
}

#[rstest]
#[case(Lanes::SYNC, Lanes::SYNC_HYDRATION)]
#[case(Lanes::INPUT_CONTINUOUS, Lanes::INPUT_CONTINUOUS_HYDRATION)]
#[case(Lanes::DEFAULT, Lanes::DEFAULT_HYDRATION)]
#[case(Lanes::at(9), Lanes::TRANSITION_HYDRATION)]
#[case(Lanes::at(23), Lanes::TRANSITION_HYDRATION)]
#[case(Lanes::IDLE, Lanes::IDLE_HYDRATION)]
#[case(Lanes::OFFSCREEN, Lanes::NONE)]
#[case(Lanes::SYNC_HYDRATION, Lanes::NONE)]
fn hydration_lane_for(#[case] lane: Lane, #[case] expected: Lane) {
	assert_eq!(lane.hydration_lane(), expected);
}

#[rstest]
#[case(Lanes::SYNC, "Sync")]
#[case(Lanes::at(12), "Transition")]
#[case(Lanes::at(24), "Retry")]
#[case(Lanes::OFFSCREEN, "Offscreen")]
#[case(Lanes::NONE, "None")]
fn labels(#[case] lane: Lane, #[case] expected: &str) {
	assert_eq!(lane.label(), expected);
}

#[test]
fn lane_iter_yields_most_urgent_first() {
	let lanes = Lanes::IDLE | Lanes::SYNC | Lanes::DEFAULT;
	let order: Vec<_> = lanes.lanes().collect();
	assert_eq!(order, vec![Lanes::SYNC, Lanes::DEFAULT, Lanes::IDLE]);
	assert_eq!(Lanes::IDLE.index(), 29);
}

fn arb_lanes() -> impl Strategy<Value = Lanes> {
	(0u32..(1 << 31)).prop_map(Lanes::from_bits_retain)
}

proptest! {
	#[test]
	fn prop_highest_lane_of_union(a in arb_lanes(), b in arb_lanes()) {
		let union = a.merge(b);
		let highest = union.highest_priority_lane();
		if union.is_empty() {
			prop_assert!(highest.is_empty());
		} else {
			prop_assert_eq!(highest.bits().count_ones(), 1);
			prop_assert!(a.includes_some(highest) || b.includes_some(highest));
			if !a.is_empty() {
				prop_assert!(highest.bits() <= a.highest_priority_lane().bits());
			}
			if !b.is_empty() {
				prop_assert!(highest.bits() <= b.highest_priority_lane().bits());
			}
		}
	}

	#[test]
	fn prop_without_then_merge_restores(a in arb_lanes(), b in arb_lanes()) {
		let removed = a.without(b);
		prop_assert!(!removed.includes_some(b));
		prop_assert!(removed.is_subset_of(a));
		prop_assert_eq!(removed.merge(a & b), a);
	}

	#[test]
	fn prop_iter_covers_set(a in arb_lanes()) {
		let rebuilt = a.lanes().fold(Lanes::NONE, Lanes::merge);
		prop_assert_eq!(rebuilt, a);
	}
}
