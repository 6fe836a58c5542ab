//! Native event model.
//!
//! Every event the toolkit hands to the router is one variant of the closed
//! [`NativeEvent`] enumeration, carrying only the fields relevant to its kind.

use horizon_bridge_core::{Point, Rect};

use crate::drag::{DragPayload, DropAction};

/// Keyboard modifier flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Self = Self(0);
    pub const SHIFT: Self = Self(1 << 0);
    pub const CONTROL: Self = Self(1 << 1);
    pub const ALT: Self = Self(1 << 2);
    pub const META: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The bit pattern handed to managed code.
    pub fn bits(self) -> i32 {
        i32::from(self.0)
    }

    pub fn set(&mut self, flag: Self, on: bool) {
        if on {
            self.0 |= flag.0;
        } else {
            self.0 &= !flag.0;
        }
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Mouse button flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MouseButtons(u8);

impl MouseButtons {
    pub const NONE: Self = Self(0);
    pub const LEFT: Self = Self(1 << 0);
    pub const RIGHT: Self = Self(1 << 1);
    pub const MIDDLE: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> i32 {
        i32::from(self.0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for MouseButtons {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Logical keys the bridge distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Tab,
    Backtab,
    Enter,
    Escape,
    Space,
    Select,
    Backspace,
    Delete,
    Insert,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    PageUp,
    PageDown,
    Home,
    End,
    /// Function keys F1..=F24.
    Function(u8),
    /// A key producing a character, normalised to lowercase.
    Character(char),
    /// A toolkit key code the bridge has no name for.
    Other(u32),
}

impl Key {
    /// Numeric key code handed to managed code.
    ///
    /// Character keys use their Unicode scalar value; named keys live above
    /// the Unicode range.
    pub fn code(self) -> i64 {
        const NAMED: i64 = 0x0100_0000;
        match self {
            Self::Character(c) => i64::from(u32::from(c)),
            Self::Tab => NAMED + 1,
            Self::Backtab => NAMED + 2,
            Self::Enter => NAMED + 3,
            Self::Escape => NAMED + 4,
            Self::Space => i64::from(b' '),
            Self::Select => NAMED + 5,
            Self::Backspace => NAMED + 6,
            Self::Delete => NAMED + 7,
            Self::Insert => NAMED + 8,
            Self::ArrowUp => NAMED + 0x10,
            Self::ArrowDown => NAMED + 0x11,
            Self::ArrowLeft => NAMED + 0x12,
            Self::ArrowRight => NAMED + 0x13,
            Self::PageUp => NAMED + 0x14,
            Self::PageDown => NAMED + 0x15,
            Self::Home => NAMED + 0x16,
            Self::End => NAMED + 0x17,
            Self::Function(n) => NAMED + 0x30 + i64::from(n),
            Self::Other(raw) => NAMED + 0x1000 + i64::from(raw),
        }
    }

    /// Keys that move between or within items.
    pub fn is_navigation(self) -> bool {
        matches!(
            self,
            Self::Tab
                | Self::Backtab
                | Self::Enter
                | Self::ArrowUp
                | Self::ArrowDown
                | Self::ArrowLeft
                | Self::ArrowRight
                | Self::PageUp
                | Self::PageDown
                | Self::Home
                | Self::End
        )
    }
}

/// Standard editing shortcuts recognised on keys that produce no text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardSequence {
    Undo,
    Redo,
    Cut,
    Copy,
    Paste,
    Close,
}

impl StandardSequence {
    /// Match a key chord against the platform-neutral bindings.
    pub fn match_key(key: Key, modifiers: Modifiers) -> Option<Self> {
        let primary = modifiers.contains(Modifiers::CONTROL) || modifiers.contains(Modifiers::META);
        let shift = modifiers.contains(Modifiers::SHIFT);
        match key {
            Key::Character('z') if primary && shift => Some(Self::Redo),
            Key::Character('z') if primary => Some(Self::Undo),
            Key::Character('y') if primary => Some(Self::Redo),
            Key::Character('x') if primary => Some(Self::Cut),
            Key::Character('c') if primary => Some(Self::Copy),
            Key::Character('v') if primary => Some(Self::Paste),
            Key::Character('w') if primary => Some(Self::Close),
            Key::Function(4) if primary => Some(Self::Close),
            Key::Delete if shift => Some(Self::Cut),
            Key::Insert if shift => Some(Self::Paste),
            Key::Insert if primary => Some(Self::Copy),
            _ => None,
        }
    }

    /// Identifier handed to managed code; 0 means "no sequence".
    pub fn code(sequence: Option<Self>) -> i32 {
        match sequence {
            None => 0,
            Some(Self::Undo) => 1,
            Some(Self::Redo) => 2,
            Some(Self::Cut) => 3,
            Some(Self::Copy) => 4,
            Some(Self::Paste) => 5,
            Some(Self::Close) => 6,
        }
    }
}

/// A key press or release.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
    /// Text produced by the key; empty for non-printing keys and releases.
    pub text: String,
    /// Number of keys this event represents (auto-repeat compression).
    pub count: u16,
}

impl KeyEvent {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self {
            key,
            modifiers,
            text: String::new(),
            count: 1,
        }
    }

    /// Builder-style text setter.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// The standard sequence this key forms, if it produced no text.
    pub fn sequence(&self) -> Option<StandardSequence> {
        if self.text.is_empty() {
            StandardSequence::match_key(self.key, self.modifiers)
        } else {
            None
        }
    }
}

/// A pointer button or motion event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub pos: Point,
    /// The button whose state changed; `NONE` for motion.
    pub button: MouseButtons,
    /// Buttons held after the change.
    pub buttons: MouseButtons,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn new(pos: Point, button: MouseButtons, buttons: MouseButtons) -> Self {
        Self {
            pos,
            button,
            buttons,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// A wheel rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEvent {
    pub pos: Point,
    /// Native delta; one notch is 120 units on most platforms.
    pub delta: i32,
    pub buttons: MouseButtons,
    pub modifiers: Modifiers,
}

/// A drag entering, moving over, or dropping onto a widget.
#[derive(Debug, Clone, PartialEq)]
pub struct DropEvent {
    pub pos: Point,
    pub modifiers: Modifiers,
    pub payload: DragPayload,
    pub proposed: DropAction,
    /// Action accepted by the receiver, written back by the router.
    pub accepted: Option<DropAction>,
}

impl DropEvent {
    pub fn new(pos: Point, payload: DragPayload, proposed: DropAction) -> Self {
        Self {
            pos,
            modifiers: Modifiers::NONE,
            payload,
            proposed,
            accepted: None,
        }
    }
}

/// Every event kind the router understands.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    /// A managed error reported off the UI thread, delivered on it.
    DeferredException { message: String },
    Paint { region: Rect },
    KeyPress(KeyEvent),
    KeyRelease(KeyEvent),
    PointerPress(PointerEvent),
    PointerDoubleClick(PointerEvent),
    PointerRelease(PointerEvent),
    PointerMove(PointerEvent),
    Wheel(WheelEvent),
    TouchBegin { pos: Point },
    FocusIn,
    FocusOut,
    WindowActivate,
    WindowDeactivate,
    DragEnter(DropEvent),
    DragMove(DropEvent),
    DragLeave,
    Drop(DropEvent),
}

impl NativeEvent {
    /// Short kind name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeferredException { .. } => "deferred-exception",
            Self::Paint { .. } => "paint",
            Self::KeyPress(_) => "key-press",
            Self::KeyRelease(_) => "key-release",
            Self::PointerPress(_) => "pointer-press",
            Self::PointerDoubleClick(_) => "pointer-double-click",
            Self::PointerRelease(_) => "pointer-release",
            Self::PointerMove(_) => "pointer-move",
            Self::Wheel(_) => "wheel",
            Self::TouchBegin { .. } => "touch-begin",
            Self::FocusIn => "focus-in",
            Self::FocusOut => "focus-out",
            Self::WindowActivate => "window-activate",
            Self::WindowDeactivate => "window-deactivate",
            Self::DragEnter(_) => "drag-enter",
            Self::DragMove(_) => "drag-move",
            Self::DragLeave => "drag-leave",
            Self::Drop(_) => "drop",
        }
    }

    /// Pointer position carried by the event, if any.
    pub fn pointer_pos(&self) -> Option<Point> {
        match self {
            Self::PointerPress(e)
            | Self::PointerDoubleClick(e)
            | Self::PointerRelease(e)
            | Self::PointerMove(e) => Some(e.pos),
            Self::Wheel(e) => Some(e.pos),
            Self::TouchBegin { pos } => Some(*pos),
            Self::DragEnter(e) | Self::DragMove(e) | Self::Drop(e) => Some(e.pos),
            _ => None,
        }
    }

    /// Events that can move input focus to a different widget.
    pub fn is_focus_relevant(&self) -> bool {
        matches!(
            self,
            Self::KeyPress(_)
                | Self::PointerPress(_)
                | Self::PointerDoubleClick(_)
                | Self::TouchBegin { .. }
                | Self::Wheel(_)
        )
    }
}
