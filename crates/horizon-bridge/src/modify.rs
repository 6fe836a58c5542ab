//! Read-only enforcement.
//!
//! A widget kind declares through [`ModifyCapability`] which event instances
//! would change its state. Before such an event reaches native handling the
//! [`ModifyGuard`] asks the capability whether modification is currently
//! permitted; a widget can be read-only while staying enabled. A denial
//! swallows the event but, unlike a focus veto, leaves focus movement alone.

use std::sync::Arc;

use horizon_bridge_core::Rect;
use horizon_bridge_core::logging::targets;

use crate::callback::{CallbackOutcome, CallbackRunner, names};
use crate::event::{Key, MouseButtons, NativeEvent, StandardSequence};
use crate::focus::resolve_focus_proxy;
use crate::toolkit::{NativeToolkit, WidgetId};

/// Classification of mutating events for one widget kind.
pub trait ModifyCapability: Send + Sync {
    /// Whether `event` would change the state of `widget`.
    fn is_modify_event(&self, widget: WidgetId, event: &NativeEvent) -> bool;

    /// Whether `widget` currently allows modification.
    ///
    /// The default asks the managed `on-modify` callback; a widget without
    /// one is always modifiable, and a callback that raises denies.
    fn can_modify(&self, widget: WidgetId, event: &NativeEvent, callbacks: &CallbackRunner) -> bool {
        let invocation = callbacks.call_with(widget, names::ON_MODIFY, |record| {
            record.set("event", event.kind());
        });
        match invocation.outcome {
            CallbackOutcome::NoProxy | CallbackOutcome::NoCallback => true,
            CallbackOutcome::Returned(value) => value.is_truthy(),
            CallbackOutcome::Failed => false,
        }
    }
}

/// Check boxes, radio buttons and other toggles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckableModify {
    /// Region, in widget coordinates, where a click toggles the state.
    pub hit_region: Rect,
}

impl CheckableModify {
    pub fn new(hit_region: Rect) -> Self {
        Self { hit_region }
    }
}

impl ModifyCapability for CheckableModify {
    fn is_modify_event(&self, _widget: WidgetId, event: &NativeEvent) -> bool {
        match event {
            NativeEvent::KeyPress(key) | NativeEvent::KeyRelease(key) => {
                matches!(key.key, Key::Space | Key::Select)
            }
            NativeEvent::PointerPress(pointer)
            | NativeEvent::PointerRelease(pointer)
            | NativeEvent::PointerDoubleClick(pointer) => {
                pointer.button == MouseButtons::LEFT && self.hit_region.contains(pointer.pos)
            }
            _ => false,
        }
    }
}

/// Line and text editors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextEditModify;

impl ModifyCapability for TextEditModify {
    fn is_modify_event(&self, _widget: WidgetId, event: &NativeEvent) -> bool {
        match event {
            NativeEvent::KeyPress(key) => {
                if key.text.chars().any(|c| !c.is_control()) {
                    return true;
                }
                if matches!(key.key, Key::Backspace | Key::Delete) {
                    return true;
                }
                matches!(
                    key.sequence(),
                    Some(
                        StandardSequence::Cut
                            | StandardSequence::Paste
                            | StandardSequence::Undo
                            | StandardSequence::Redo
                    )
                )
            }
            NativeEvent::Drop(_) => true,
            _ => false,
        }
    }
}

/// Outcome of a modify check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyDecision {
    /// No capability applies, or the event does not mutate.
    NotApplicable,
    Permitted,
    Denied,
    /// The check destroyed the receiver.
    ReceiverDestroyed,
}

impl ModifyDecision {
    /// Whether the event must be swallowed.
    pub fn is_veto(self) -> bool {
        matches!(self, Self::Denied | Self::ReceiverDestroyed)
    }
}

/// Asks the widget tree whether an event may modify its receiver.
pub struct ModifyGuard {
    toolkit: Arc<dyn NativeToolkit>,
    callbacks: Arc<CallbackRunner>,
}

impl ModifyGuard {
    pub fn new(toolkit: Arc<dyn NativeToolkit>, callbacks: Arc<CallbackRunner>) -> Self {
        Self { toolkit, callbacks }
    }

    /// Classify `event` for `receiver`.
    ///
    /// The receiver's focus proxy chain is followed first; the nearest
    /// enabled widget at or above the result that carries a capability
    /// decides.
    #[tracing::instrument(skip(self, event), target = "horizon_bridge::modify", level = "trace")]
    pub fn check(&self, receiver: WidgetId, event: &NativeEvent) -> ModifyDecision {
        let target = resolve_focus_proxy(self.toolkit.as_ref(), receiver);
        let Some((owner, capability)) = self.capability_for(target) else {
            return ModifyDecision::NotApplicable;
        };

        let decision = if !capability.is_modify_event(owner, event) {
            ModifyDecision::NotApplicable
        } else if capability.can_modify(owner, event, &self.callbacks) {
            ModifyDecision::Permitted
        } else {
            tracing::debug!(target: targets::MODIFY, ?owner, kind = event.kind(), "modification denied");
            ModifyDecision::Denied
        };

        if decision != ModifyDecision::Denied && !self.toolkit.is_alive(receiver) {
            tracing::debug!(target: targets::MODIFY, ?receiver, "receiver destroyed during modify check");
            return ModifyDecision::ReceiverDestroyed;
        }
        decision
    }

    /// `false` when `event` must not reach `widget`.
    pub fn is_modify_permitted(&self, widget: WidgetId, event: &NativeEvent) -> bool {
        !self.check(widget, event).is_veto()
    }

    fn capability_for(&self, start: WidgetId) -> Option<(WidgetId, Arc<dyn ModifyCapability>)> {
        let mut current = Some(start);
        while let Some(widget) = current {
            if self.toolkit.is_enabled(widget) {
                if let Some(capability) = self.toolkit.modify_capability(widget) {
                    return Some((widget, capability));
                }
            }
            if self.toolkit.is_window(widget) {
                break;
            }
            current = self.toolkit.parent(widget);
        }
        None
    }
}

impl std::fmt::Debug for ModifyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModifyGuard").finish_non_exhaustive()
    }
}
