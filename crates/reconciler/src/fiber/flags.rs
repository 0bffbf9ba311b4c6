bitflags::bitflags! {
	/// Side effects a unit carries into the commit phase.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct FiberFlags: u32 {
		const PERFORMED_WORK = 1 << 0;
		const PLACEMENT = 1 << 1;
		const UPDATE = 1 << 2;
		const CHILD_DELETION = 1 << 4;
		const CONTENT_RESET = 1 << 5;
		const CALLBACK = 1 << 6;
		/// A descendant suspended or threw and this unit took over.
		const DID_CAPTURE = 1 << 7;
		/// Hydration failed; render this subtree on the client from scratch.
		const FORCE_CLIENT_RENDER = 1 << 8;
		/// Root container must be cleared before mounting.
		const SNAPSHOT = 1 << 10;
		const PASSIVE = 1 << 11;
		/// The unit matched a pre-rendered host node.
		const HYDRATING = 1 << 12;
		/// Hidden state of an offscreen subtree changed.
		const VISIBILITY = 1 << 13;
		/// Begin or complete failed; the unit is unwinding.
		const INCOMPLETE = 1 << 15;
		/// Nearest handler selected to capture an interrupt on unwind.
		const SHOULD_CAPTURE = 1 << 16;
	}
}

impl FiberFlags {
	pub const MUTATION_MASK: Self = Self::PLACEMENT
		.union(Self::UPDATE)
		.union(Self::CHILD_DELETION)
		.union(Self::CONTENT_RESET)
		.union(Self::HYDRATING)
		.union(Self::VISIBILITY)
		.union(Self::SNAPSHOT);

	pub const LAYOUT_MASK: Self = Self::UPDATE.union(Self::CALLBACK).union(Self::VISIBILITY);

	pub const PASSIVE_MASK: Self = Self::PASSIVE.union(Self::VISIBILITY).union(Self::CHILD_DELETION);

	/// Flags a unit keeps when it is re-begun after capturing.
	pub const HOST_EFFECT_MASK: Self = Self::from_bits_retain((1 << 15) - 1);
}

bitflags::bitflags! {
	/// Behavior inherited from the root.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct FiberMode: u8 {
		/// Updates are lane-scheduled and may be time-sliced; hydration
		/// mismatches force client rendering instead of being patched.
		const CONCURRENT = 1 << 0;
	}
}
