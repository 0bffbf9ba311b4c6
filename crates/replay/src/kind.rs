//! Event names and how each one is treated while its target is blocked.

use strum_macros::{EnumIter, EnumString, IntoStaticStr};
use trellis_primitives::EventPriority;

/// A native event type, named the way the host reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
	MouseDown,
	MouseUp,
	TouchCancel,
	TouchEnd,
	TouchStart,
	AuxClick,
	DblClick,
	PointerCancel,
	PointerDown,
	PointerUp,
	DragEnd,
	DragStart,
	Drop,
	CompositionEnd,
	CompositionStart,
	KeyDown,
	KeyPress,
	KeyUp,
	Input,
	#[strum(serialize = "textInput")]
	TextInput,
	Copy,
	Cut,
	Paste,
	Click,
	Change,
	ContextMenu,
	Reset,
	Submit,
	FocusIn,
	FocusOut,
	DragEnter,
	DragLeave,
	DragOver,
	MouseOver,
	MouseOut,
	MouseMove,
	PointerOver,
	PointerOut,
	PointerMove,
	GotPointerCapture,
	LostPointerCapture,
	Scroll,
	Wheel,
	TouchMove,
	SelectionChange,
	Load,
	Error,
}

/// Slot holding the latest blocked occurrence of a continuous event family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContinuousSlot {
	Focus,
	Drag,
	Mouse,
	/// One slot per pointer id.
	Pointer,
	/// One slot per pointer id.
	PointerCapture,
}

/// How a blocked event is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayClass {
	/// Queued in arrival order and replayed in that order.
	Discrete,
	/// Only the latest occurrence is kept.
	Continuous(ContinuousSlot),
	/// Dropped.
	NotReplayable,
}

impl EventKind {
	pub fn as_str(self) -> &'static str {
		self.into()
	}

	pub fn replay_class(self) -> ReplayClass {
		use EventKind::*;
		match self {
			MouseDown | MouseUp | TouchCancel | TouchEnd | TouchStart | AuxClick | DblClick | PointerCancel
			| PointerDown | PointerUp | DragEnd | DragStart | Drop | CompositionEnd | CompositionStart | KeyDown
			| KeyPress | KeyUp | Input | TextInput | Copy | Cut | Paste | Click | Change | ContextMenu | Reset
			| Submit => ReplayClass::Discrete,
			FocusIn => ReplayClass::Continuous(ContinuousSlot::Focus),
			DragEnter => ReplayClass::Continuous(ContinuousSlot::Drag),
			MouseOver => ReplayClass::Continuous(ContinuousSlot::Mouse),
			PointerOver => ReplayClass::Continuous(ContinuousSlot::Pointer),
			GotPointerCapture => ReplayClass::Continuous(ContinuousSlot::PointerCapture),
			_ => ReplayClass::NotReplayable,
		}
	}

	pub fn is_discrete_replayable(self) -> bool {
		self.replay_class() == ReplayClass::Discrete
	}

	/// The continuous slot this event empties: the leave/out counterpart of
	/// the event that fills it, or the filling event itself.
	pub fn cleared_slot(self) -> Option<ContinuousSlot> {
		use EventKind::*;
		match self {
			FocusIn | FocusOut => Some(ContinuousSlot::Focus),
			DragEnter | DragLeave => Some(ContinuousSlot::Drag),
			MouseOver | MouseOut => Some(ContinuousSlot::Mouse),
			PointerOver | PointerOut => Some(ContinuousSlot::Pointer),
			GotPointerCapture | LostPointerCapture => Some(ContinuousSlot::PointerCapture),
			_ => None,
		}
	}

	/// Priority updates dispatched from this event are scheduled at.
	pub fn priority(self) -> EventPriority {
		use EventKind::*;
		match self.replay_class() {
			ReplayClass::Discrete => EventPriority::DISCRETE,
			_ => match self {
				FocusIn | FocusOut => EventPriority::DISCRETE,
				DragEnter | DragLeave | DragOver | MouseOver | MouseOut | MouseMove | PointerOver | PointerOut
				| PointerMove | Scroll | Wheel | TouchMove => EventPriority::CONTINUOUS,
				_ => EventPriority::DEFAULT,
			},
		}
	}
}

#[cfg(test)]
mod tests;
