//! Translation of winit window events into bridge events.
//!
//! Hosts driving their widgets from a winit event loop feed every
//! `WindowEvent` to a [`WinitTranslator`], which tracks the pointer, the held
//! buttons, the modifier state and double-click timing, and produces the
//! [`NativeEvent`] to hand to the router.
//!
//! ```ignore
//! use horizon_bridge::input::WinitTranslator;
//!
//! let mut translator = WinitTranslator::new();
//!
//! // In the winit `window_event` callback:
//! if let Some(mut event) = translator.translate(&window_event) {
//!     let outcome = bridge.route_event(widget_under_cursor, &mut event);
//!     // ...
//! }
//! ```

use std::path::PathBuf;
use std::time::{Duration, Instant};

use horizon_bridge_core::Point;
use horizon_bridge_core::logging::targets;
use winit::event::{
    ElementState, Modifiers as WinitModifiers, MouseButton as WinitMouseButton, MouseScrollDelta,
    TouchPhase, WindowEvent,
};
use winit::keyboard::{Key as WinitKey, NamedKey};

use crate::drag::{DragPayload, DropAction};
use crate::event::{
    DropEvent, Key, KeyEvent, Modifiers, MouseButtons, NativeEvent, PointerEvent, WheelEvent,
};

/// Default double-click time threshold in milliseconds.
///
/// Two clicks must occur within this time to be considered a double-click.
pub const DEFAULT_DOUBLE_CLICK_TIME_MS: u64 = 500;

/// Default double-click distance threshold, as a Manhattan distance in pixels.
pub const DEFAULT_DOUBLE_CLICK_DISTANCE: i32 = 5;

/// Native wheel units reported per scrolled line.
pub const WHEEL_UNITS_PER_LINE: f32 = 120.0;

/// Converts a winit mouse button to bridge button flags.
pub fn from_winit_mouse_button(button: WinitMouseButton) -> Option<MouseButtons> {
    match button {
        WinitMouseButton::Left => Some(MouseButtons::LEFT),
        WinitMouseButton::Right => Some(MouseButtons::RIGHT),
        WinitMouseButton::Middle => Some(MouseButtons::MIDDLE),
        WinitMouseButton::Back | WinitMouseButton::Forward | WinitMouseButton::Other(_) => None,
    }
}

/// Converts winit modifiers to bridge modifier flags.
pub fn from_winit_modifiers(modifiers: &WinitModifiers) -> Modifiers {
    let state = modifiers.state();
    let mut out = Modifiers::NONE;
    out.set(Modifiers::SHIFT, state.shift_key());
    out.set(Modifiers::CONTROL, state.control_key());
    out.set(Modifiers::ALT, state.alt_key());
    out.set(Modifiers::META, state.super_key());
    out
}

/// Converts a winit logical key.
///
/// Single characters are lowercased; anything the bridge has no name for
/// becomes [`Key::Other`].
pub fn from_winit_key(key: &WinitKey) -> Key {
    match key {
        WinitKey::Named(named) => from_winit_named_key(*named),
        WinitKey::Character(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Character(c.to_lowercase().next().unwrap_or(c)),
                _ => Key::Other(0),
            }
        }
        WinitKey::Unidentified(_) | WinitKey::Dead(_) => Key::Other(0),
    }
}

fn from_winit_named_key(key: NamedKey) -> Key {
    match key {
        NamedKey::Tab => Key::Tab,
        NamedKey::Enter => Key::Enter,
        NamedKey::Escape => Key::Escape,
        NamedKey::Space => Key::Space,
        NamedKey::Select => Key::Select,
        NamedKey::Backspace => Key::Backspace,
        NamedKey::Delete => Key::Delete,
        NamedKey::Insert => Key::Insert,
        NamedKey::ArrowUp => Key::ArrowUp,
        NamedKey::ArrowDown => Key::ArrowDown,
        NamedKey::ArrowLeft => Key::ArrowLeft,
        NamedKey::ArrowRight => Key::ArrowRight,
        NamedKey::PageUp => Key::PageUp,
        NamedKey::PageDown => Key::PageDown,
        NamedKey::Home => Key::Home,
        NamedKey::End => Key::End,
        NamedKey::F1 => Key::Function(1),
        NamedKey::F2 => Key::Function(2),
        NamedKey::F3 => Key::Function(3),
        NamedKey::F4 => Key::Function(4),
        NamedKey::F5 => Key::Function(5),
        NamedKey::F6 => Key::Function(6),
        NamedKey::F7 => Key::Function(7),
        NamedKey::F8 => Key::Function(8),
        NamedKey::F9 => Key::Function(9),
        NamedKey::F10 => Key::Function(10),
        NamedKey::F11 => Key::Function(11),
        NamedKey::F12 => Key::Function(12),
        _ => Key::Other(0),
    }
}

/// State for tracking a potential double-click.
#[derive(Debug, Clone, Copy)]
struct ClickState {
    button: MouseButtons,
    position: Point,
    time: Instant,
}

/// Stateful winit-to-bridge event translator for one window.
#[derive(Debug)]
pub struct WinitTranslator {
    position: Point,
    buttons: MouseButtons,
    modifiers: Modifiers,
    last_click: Option<ClickState>,
    double_click_time: Duration,
    double_click_distance: i32,
    hovered_files: Vec<PathBuf>,
}

impl Default for WinitTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl WinitTranslator {
    pub fn new() -> Self {
        Self {
            position: Point::default(),
            buttons: MouseButtons::NONE,
            modifiers: Modifiers::NONE,
            last_click: None,
            double_click_time: Duration::from_millis(DEFAULT_DOUBLE_CLICK_TIME_MS),
            double_click_distance: DEFAULT_DOUBLE_CLICK_DISTANCE,
            hovered_files: Vec::new(),
        }
    }

    pub fn set_double_click_time(&mut self, duration: Duration) {
        self.double_click_time = duration;
    }

    pub fn set_double_click_distance(&mut self, distance: i32) {
        self.double_click_distance = distance;
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn buttons(&self) -> MouseButtons {
        self.buttons
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Translate one window event. Events the bridge does not route return
    /// `None`.
    pub fn translate(&mut self, event: &WindowEvent) -> Option<NativeEvent> {
        match event {
            WindowEvent::CursorMoved { position, .. } => Some(
                self.handle_cursor_moved(Point::new(position.x as i32, position.y as i32)),
            ),
            WindowEvent::CursorLeft { .. } => {
                self.last_click = None;
                None
            }
            WindowEvent::MouseInput { state, button, .. } => self.handle_mouse_input(*state, *button),
            WindowEvent::MouseWheel { delta, .. } => Some(self.handle_mouse_wheel(*delta)),
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = from_winit_modifiers(modifiers);
                None
            }
            WindowEvent::KeyboardInput { event, .. } => Some(self.handle_key(
                &event.logical_key,
                event.state,
                event.text.as_deref(),
                event.repeat,
            )),
            WindowEvent::Focused(true) => Some(NativeEvent::WindowActivate),
            WindowEvent::Focused(false) => {
                self.buttons = MouseButtons::NONE;
                Some(NativeEvent::WindowDeactivate)
            }
            WindowEvent::Touch(touch) if touch.phase == TouchPhase::Started => {
                Some(NativeEvent::TouchBegin {
                    pos: Point::new(touch.location.x as i32, touch.location.y as i32),
                })
            }
            WindowEvent::HoveredFile(path) => Some(self.handle_hovered_file(path.clone())),
            WindowEvent::HoveredFileCancelled => {
                self.hovered_files.clear();
                Some(NativeEvent::DragLeave)
            }
            WindowEvent::DroppedFile(path) => Some(self.handle_dropped_file(path.clone())),
            _ => None,
        }
    }

    pub fn handle_cursor_moved(&mut self, position: Point) -> NativeEvent {
        self.position = position;
        NativeEvent::PointerMove(
            PointerEvent::new(position, MouseButtons::NONE, self.buttons)
                .with_modifiers(self.modifiers),
        )
    }

    /// Returns a press, double-click or release event depending on the
    /// button state and timing.
    pub fn handle_mouse_input(
        &mut self,
        state: ElementState,
        button: WinitMouseButton,
    ) -> Option<NativeEvent> {
        let button = from_winit_mouse_button(button)?;
        match state {
            ElementState::Pressed => {
                self.buttons.insert(button);
                let pointer = PointerEvent::new(self.position, button, self.buttons)
                    .with_modifiers(self.modifiers);

                let is_double_click = self.last_click.is_some_and(|last| {
                    last.button == button
                        && last.time.elapsed() < self.double_click_time
                        && last.position.manhattan_distance(self.position)
                            <= self.double_click_distance
                });
                if is_double_click {
                    // No triple clicks.
                    self.last_click = None;
                    Some(NativeEvent::PointerDoubleClick(pointer))
                } else {
                    self.last_click = Some(ClickState {
                        button,
                        position: self.position,
                        time: Instant::now(),
                    });
                    Some(NativeEvent::PointerPress(pointer))
                }
            }
            ElementState::Released => {
                self.buttons.remove(button);
                Some(NativeEvent::PointerRelease(
                    PointerEvent::new(self.position, button, self.buttons)
                        .with_modifiers(self.modifiers),
                ))
            }
        }
    }

    /// Vertical wheel movement in native units: one line is 120.
    pub fn handle_mouse_wheel(&mut self, delta: MouseScrollDelta) -> NativeEvent {
        let delta = match delta {
            MouseScrollDelta::LineDelta(_, y) => (y * WHEEL_UNITS_PER_LINE) as i32,
            MouseScrollDelta::PixelDelta(pos) => pos.y as i32,
        };
        NativeEvent::Wheel(WheelEvent {
            pos: self.position,
            delta,
            buttons: self.buttons,
            modifiers: self.modifiers,
        })
    }

    pub fn handle_key(
        &mut self,
        logical_key: &WinitKey,
        state: ElementState,
        text: Option<&str>,
        is_repeat: bool,
    ) -> NativeEvent {
        let mut key = from_winit_key(logical_key);
        if key == Key::Tab && self.modifiers.contains(Modifiers::SHIFT) {
            key = Key::Backtab;
        }
        let mut event = KeyEvent::new(key, self.modifiers);
        match state {
            ElementState::Pressed => {
                // Control characters produced alongside shortcuts are not text.
                let text = text.unwrap_or_default();
                if !text.chars().all(char::is_control) {
                    event = event.with_text(text);
                }
                if is_repeat {
                    tracing::trace!(target: targets::ROUTER, ?key, "auto-repeat key");
                }
                NativeEvent::KeyPress(event)
            }
            ElementState::Released => NativeEvent::KeyRelease(event),
        }
    }

    fn handle_hovered_file(&mut self, path: PathBuf) -> NativeEvent {
        let first = self.hovered_files.is_empty();
        self.hovered_files.push(path);
        let mut drop = DropEvent::new(
            self.position,
            DragPayload::from_paths(self.hovered_files.clone()),
            DropAction::COPY,
        );
        drop.modifiers = self.modifiers;
        if first {
            NativeEvent::DragEnter(drop)
        } else {
            NativeEvent::DragMove(drop)
        }
    }

    fn handle_dropped_file(&mut self, path: PathBuf) -> NativeEvent {
        self.hovered_files.clear();
        let mut drop = DropEvent::new(
            self.position,
            DragPayload::from_paths([path]),
            DropAction::COPY,
        );
        drop.modifiers = self.modifiers;
        NativeEvent::Drop(drop)
    }

    /// Clears button state, double-click tracking and hovered files.
    pub fn reset(&mut self) {
        self.position = Point::default();
        self.buttons = MouseButtons::NONE;
        self.last_click = None;
        self.hovered_files.clear();
    }
}
