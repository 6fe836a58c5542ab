//! The application-level event filter.
//!
//! Every event the toolkit would dispatch passes through
//! [`EventRouter::route_event`] first. The router runs a fixed pipeline and
//! stops at the first stage that swallows the event:
//!
//! 1. deferred exception reports go to the exception funnel,
//! 2. paint requests run the managed paint callback,
//! 3. the modify guard may veto the event,
//! 4. the focus chain may veto focus-relevant events,
//! 5. the receiver's managed callback for the event kind decides.
//!
//! A truthy callback result lets native default handling continue. The
//! drag gesture is detected in stage 5 on pointer moves.

use std::sync::Arc;

use horizon_bridge_core::logging::{span_names, targets};
use horizon_bridge_core::{EventRecord, IntoManaged, ManagedValue, Rect};

use crate::callback::{CallbackOutcome, CallbackRunner, Invocation, names};
use crate::config::{BridgeConfig, MissingCallback};
use crate::drag::{DragDropController, DropAction};
use crate::event::{
    DropEvent, KeyEvent, NativeEvent, PointerEvent, StandardSequence, WheelEvent,
};
use crate::exception::ExceptionFunnel;
use crate::focus::FocusChain;
use crate::modify::{ModifyDecision, ModifyGuard};
use crate::pump::{PumpEvent, PumpHandle};
use crate::registry::ObjectRegistry;
use crate::toolkit::{DropPosition, NativeToolkit, WidgetId};

/// Why an event was swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwallowReason {
    /// A deferred exception report was consumed.
    Exception,
    /// The modify guard denied the event.
    ModifyVeto,
    /// The focus chain refused to let focus leave.
    FocusVeto,
    /// The managed callback returned a falsy value, raised, or was missing.
    Callback,
    /// The pointer move started a drag.
    DragHandled,
    /// The receiver was destroyed while the event was being filtered.
    ReceiverDestroyed,
}

/// Decision of the router for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteOutcome {
    /// Let the toolkit dispatch the event normally.
    Forward,
    /// Stop the event here.
    Swallow(SwallowReason),
}

impl RouteOutcome {
    pub fn is_swallowed(self) -> bool {
        matches!(self, Self::Swallow(_))
    }
}

/// The global event filter.
pub struct EventRouter {
    toolkit: Arc<dyn NativeToolkit>,
    registry: Arc<ObjectRegistry>,
    callbacks: Arc<CallbackRunner>,
    funnel: Arc<ExceptionFunnel>,
    modify: ModifyGuard,
    focus: Arc<FocusChain>,
    drag: Arc<DragDropController>,
    pump: PumpHandle,
    missing_callback: MissingCallback,
    wheel_delta_divisor: i32,
}

impl EventRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        toolkit: Arc<dyn NativeToolkit>,
        registry: Arc<ObjectRegistry>,
        callbacks: Arc<CallbackRunner>,
        funnel: Arc<ExceptionFunnel>,
        focus: Arc<FocusChain>,
        drag: Arc<DragDropController>,
        pump: PumpHandle,
        config: &BridgeConfig,
    ) -> Self {
        let modify = ModifyGuard::new(Arc::clone(&toolkit), Arc::clone(&callbacks));
        Self {
            toolkit,
            registry,
            callbacks,
            funnel,
            modify,
            focus,
            drag,
            pump,
            missing_callback: config.missing_callback,
            wheel_delta_divisor: config.wheel_delta_divisor.max(1),
        }
    }

    pub fn modify_guard(&self) -> &ModifyGuard {
        &self.modify
    }

    /// Filter one event bound for `receiver`.
    ///
    /// Drop events are updated in place with the action the receiver
    /// accepted.
    pub fn route_event(&self, receiver: WidgetId, event: &mut NativeEvent) -> RouteOutcome {
        let span = tracing::trace_span!(
            target: targets::ROUTER,
            span_names::ROUTE_EVENT,
            ?receiver,
            kind = event.kind()
        );
        let _entered = span.enter();

        let outcome = self.route(receiver, event);
        tracing::trace!(target: targets::ROUTER, ?outcome, "routed");
        outcome
    }

    fn route(&self, receiver: WidgetId, event: &mut NativeEvent) -> RouteOutcome {
        // The exception modal runs its own nested loop; stay out of its way.
        if self.funnel.is_showing() {
            if let NativeEvent::DeferredException { message } = event {
                self.pump.post(PumpEvent::Exception {
                    message: std::mem::take(message),
                });
                return RouteOutcome::Swallow(SwallowReason::Exception);
            }
            return RouteOutcome::Forward;
        }

        // 1. deferred exceptions
        if let NativeEvent::DeferredException { message } = event {
            self.funnel.escalate(message);
            return RouteOutcome::Swallow(SwallowReason::Exception);
        }

        // 2. paint
        if let NativeEvent::Paint { region } = event {
            self.paint(receiver, *region);
            return RouteOutcome::Forward;
        }

        // 3. modify guard
        match self.modify.check(receiver, event) {
            ModifyDecision::Denied => return RouteOutcome::Swallow(SwallowReason::ModifyVeto),
            ModifyDecision::ReceiverDestroyed => {
                return RouteOutcome::Swallow(SwallowReason::ReceiverDestroyed);
            }
            ModifyDecision::NotApplicable | ModifyDecision::Permitted => {}
        }

        // 4. focus chain
        if event.is_focus_relevant() && self.focus.negotiate(receiver, event).is_veto() {
            return RouteOutcome::Swallow(SwallowReason::FocusVeto);
        }

        // 5. managed callbacks
        self.dispatch(receiver, event)
    }

    fn paint(&self, widget: WidgetId, region: Rect) {
        if self.registry.lookup(widget).is_none() || self.toolkit.paint_delegated(widget) {
            return;
        }
        if !self.callbacks.has_callback(widget, names::ON_PAINT) {
            return;
        }
        let context = self.toolkit.begin_paint(widget, region);
        let dc = context.clone();
        self.callbacks.call_with(widget, names::ON_PAINT, move |record| {
            record.set("dc", dc);
        });
        self.toolkit.end_paint(widget, context);
    }

    fn dispatch(&self, receiver: WidgetId, event: &mut NativeEvent) -> RouteOutcome {
        match event {
            NativeEvent::PointerPress(pointer) => self.drag.pointer_down(receiver, pointer.pos),
            NativeEvent::PointerRelease(_) => self.drag.pointer_up(),
            _ => {}
        }

        if self.registry.lookup(receiver).is_none() {
            return RouteOutcome::Forward;
        }

        match event {
            NativeEvent::PointerPress(pointer) => {
                self.press(receiver, names::ON_POINTER_DOWN, *pointer)
            }
            NativeEvent::PointerDoubleClick(pointer) => {
                self.press(receiver, names::ON_DOUBLE_CLICK, *pointer)
            }
            NativeEvent::PointerRelease(pointer) => {
                let pointer = *pointer;
                self.pointer(receiver, names::ON_POINTER_UP, &pointer, |record| {
                    record.set("up", pointer.button.bits());
                })
            }
            NativeEvent::PointerMove(pointer) => {
                let pointer = *pointer;
                if self.drag.handle_pointer_move(receiver, &pointer).consumed() {
                    return RouteOutcome::Swallow(SwallowReason::DragHandled);
                }
                self.pointer(receiver, names::ON_POINTER_MOVE, &pointer, |_| {})
            }
            NativeEvent::Wheel(wheel) => self.wheel(receiver, *wheel),
            NativeEvent::KeyPress(key) => self.key(receiver, key, true),
            NativeEvent::KeyRelease(key) => self.key(receiver, key, false),
            NativeEvent::FocusIn => {
                if !self.toolkit.is_window(receiver) {
                    self.callbacks.call_with(receiver, names::ON_FOCUS_IN, |_| {});
                }
                RouteOutcome::Forward
            }
            NativeEvent::WindowActivate | NativeEvent::WindowDeactivate => {
                if self.toolkit.is_window(receiver) {
                    let name = if matches!(event, NativeEvent::WindowActivate) {
                        names::ON_FOCUS_IN
                    } else {
                        names::ON_FOCUS_OUT
                    };
                    self.callbacks.call_with(receiver, name, |_| {});
                }
                RouteOutcome::Forward
            }
            NativeEvent::DragEnter(dnd) => self.drop_target(receiver, names::ON_DRAG_ENTER, dnd),
            NativeEvent::DragMove(dnd) => self.drop_target(receiver, names::ON_DRAG_MOVE, dnd),
            NativeEvent::Drop(dnd) => self.drop_target(receiver, names::ON_DROP, dnd),
            NativeEvent::DragLeave => {
                self.callbacks.call_with(receiver, names::ON_DRAG_LEAVE, |_| {});
                RouteOutcome::Forward
            }
            NativeEvent::FocusOut
            | NativeEvent::TouchBegin { .. }
            | NativeEvent::Paint { .. }
            | NativeEvent::DeferredException { .. } => RouteOutcome::Forward,
        }
    }

    fn press(&self, receiver: WidgetId, name: &str, pointer: PointerEvent) -> RouteOutcome {
        if let Some(viewport) = self.toolkit.viewport_rect(receiver) {
            if !viewport.contains(pointer.pos) {
                return RouteOutcome::Forward;
            }
        }
        self.pointer(receiver, name, &pointer, |record| {
            record.set("down", pointer.button.bits());
        })
    }

    fn pointer(
        &self,
        receiver: WidgetId,
        name: &str,
        pointer: &PointerEvent,
        extra: impl FnOnce(&EventRecord),
    ) -> RouteOutcome {
        let invocation = self.callbacks.call_with(receiver, name, |record| {
            extra(record);
            record.set("pos", pointer.pos.into_managed());
            record.set("buttons", pointer.buttons.bits());
            record.set("modifiers", pointer.modifiers.bits());
        });
        self.decide(invocation)
    }

    fn wheel(&self, receiver: WidgetId, wheel: WheelEvent) -> RouteOutcome {
        let delta = wheel.delta / self.wheel_delta_divisor;
        let invocation = self.callbacks.call_with(receiver, names::ON_WHEEL, |record| {
            record.set("delta", delta);
            record.set("pos", wheel.pos.into_managed());
            record.set("buttons", wheel.buttons.bits());
            record.set("modifiers", wheel.modifiers.bits());
        });
        self.decide(invocation)
    }

    fn key(&self, receiver: WidgetId, key: &KeyEvent, press: bool) -> RouteOutcome {
        // The focus proxy gets its own copy of the event.
        if self.toolkit.focus_proxy(receiver).is_some() {
            return RouteOutcome::Forward;
        }

        let sequence = if press { key.sequence() } else { None };
        let fill = |record: &EventRecord| {
            if press {
                record.set("count", i32::from(key.count));
            }
            record.set("modifiers", key.modifiers.bits());
            record.set("code", key.key.code());
            record.set("char", key.text.clone());
            record.set("seq", StandardSequence::code(sequence));
        };

        let name = if press { names::ON_KEY_DOWN } else { names::ON_KEY_UP };
        let outcome = self.decide(self.callbacks.call_with(receiver, name, fill));
        if outcome.is_swallowed() || !press || key.text.is_empty() {
            return outcome;
        }
        self.decide(self.callbacks.call_with(receiver, names::ON_CHAR, fill))
    }

    fn drop_target(&self, receiver: WidgetId, name: &str, dnd: &mut DropEvent) -> RouteOutcome {
        let location = self.toolkit.drop_location(receiver, dnd.pos);
        let (index, position) = match location {
            Some(location) => (location.index, location.position),
            None => (ManagedValue::None, DropPosition::OnItem),
        };
        let proposed = if dnd.proposed.contains(DropAction::MOVE) {
            DropAction::MOVE
        } else {
            DropAction::COPY
        };

        let invocation = self.callbacks.call_with(receiver, name, |record| {
            record.set("index", index);
            record.set("where", position.code());
            record.set("pos", dnd.pos.into_managed());
            record.set("modifiers", dnd.modifiers.bits());
            record.set("data", dnd.payload.to_managed_value());
            record.set("action", proposed.bits());
        });

        dnd.accepted = if invocation.outcome.is_truthy() {
            let action = invocation
                .record
                .get_as::<DropAction>("action")
                .unwrap_or(proposed);
            Some(action.default_action())
        } else {
            None
        };
        self.decide(invocation)
    }

    fn decide(&self, invocation: Invocation) -> RouteOutcome {
        match invocation.outcome {
            CallbackOutcome::Returned(value) if value.is_truthy() => RouteOutcome::Forward,
            CallbackOutcome::NoProxy => RouteOutcome::Forward,
            CallbackOutcome::NoCallback => match self.missing_callback {
                MissingCallback::Forward => RouteOutcome::Forward,
                MissingCallback::Swallow => RouteOutcome::Swallow(SwallowReason::Callback),
            },
            CallbackOutcome::Returned(_) | CallbackOutcome::Failed => {
                RouteOutcome::Swallow(SwallowReason::Callback)
            }
        }
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("missing_callback", &self.missing_callback)
            .field("drag", &self.drag)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swallow_flag() {
        assert!(!RouteOutcome::Forward.is_swallowed());
        assert!(RouteOutcome::Swallow(SwallowReason::FocusVeto).is_swallowed());
    }
}
