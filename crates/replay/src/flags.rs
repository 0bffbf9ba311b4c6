bitflags::bitflags! {
	/// How the listener that saw an event was registered.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct EventSystemFlags: u8 {
		const IS_EVENT_HANDLE_NON_MANAGED_NODE = 1 << 0;
		const IS_NON_DELEGATED = 1 << 1;
		const IS_CAPTURE_PHASE = 1 << 2;
		const IS_PASSIVE = 1 << 3;
		/// Set on dispatches coming out of the replay queue.
		const IS_REPLAYED = 1 << 5;
	}
}
