//! Cancelable focus transfer.
//!
//! Before an event that could move keyboard focus reaches native handling,
//! the [`FocusChain`] walks from the widget that currently holds focus up to
//! its window, looking for a [`FocusNegotiator`]. The first negotiator that
//! recognises the event as a focus-out trigger is asked whether focus may
//! leave. A "no" cancels the whole triggering event, not only the focus
//! change: most toolkits cannot veto one without the other.

use std::sync::Arc;

use horizon_bridge_core::logging::targets;
use horizon_bridge_core::ManagedValue;

use crate::callback::{CallbackOutcome, CallbackRunner, names};
use crate::event::{Key, KeyEvent, Modifiers, NativeEvent};
use crate::registry::ObjectRegistry;
use crate::toolkit::{NativeToolkit, WidgetId};

/// Upper bound on focus proxy chains; longer chains are treated as cycles.
const MAX_PROXY_DEPTH: usize = 64;

/// Follow `widget`'s focus proxies to the widget that actually takes focus.
pub fn resolve_focus_proxy(toolkit: &dyn NativeToolkit, widget: WidgetId) -> WidgetId {
    let mut current = widget;
    for _ in 0..MAX_PROXY_DEPTH {
        match toolkit.focus_proxy(current) {
            Some(next) if next != current => current = next,
            _ => return current,
        }
    }
    tracing::warn!(target: targets::FOCUS, ?widget, "focus proxy chain too deep");
    current
}

/// Focus-out negotiation for one widget kind.
pub trait FocusNegotiator: Send + Sync {
    /// Whether `event` can take focus away from `widget`.
    fn is_focus_out_event(&self, widget: WidgetId, event: &NativeEvent) -> bool;

    /// Whether focus may move from `from` to `to`.
    ///
    /// The default asks the managed `can-focus-out` callback of `from`,
    /// passing the managed owner of `to` as `target`. A missing callback,
    /// or one that raises, allows the transfer.
    fn can_focus_out(
        &self,
        from: WidgetId,
        to: WidgetId,
        callbacks: &CallbackRunner,
        registry: &ObjectRegistry,
    ) -> bool {
        let invocation = callbacks.call_with(from, names::CAN_FOCUS_OUT, |record| {
            let target = registry
                .lookup(to)
                .and_then(|proxy| proxy.owner())
                .map_or(ManagedValue::None, ManagedValue::Object);
            record.set("target", target);
        });
        match invocation.outcome {
            CallbackOutcome::Returned(value) => value.is_truthy(),
            CallbackOutcome::NoProxy | CallbackOutcome::NoCallback | CallbackOutcome::Failed => true,
        }
    }
}

/// Negotiator for item editors: navigation keys and pointer presses leave
/// the editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemEditorNegotiator;

impl FocusNegotiator for ItemEditorNegotiator {
    fn is_focus_out_event(&self, _widget: WidgetId, event: &NativeEvent) -> bool {
        match event {
            NativeEvent::KeyPress(key) => key.key.is_navigation(),
            NativeEvent::PointerPress(_)
            | NativeEvent::PointerDoubleClick(_)
            | NativeEvent::TouchBegin { .. }
            | NativeEvent::Wheel(_) => true,
            _ => false,
        }
    }
}

/// Result of a focus walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDecision {
    /// Nothing in the chain negotiated this event.
    NotApplicable,
    Allowed,
    /// The event must be swallowed.
    Vetoed,
    /// A completion popup holds focus; the walk ended without asking.
    HeldByPopup,
    /// A press outside a running completion popup closed it.
    PopupDismissed,
}

impl FocusDecision {
    pub fn is_veto(self) -> bool {
        self == Self::Vetoed
    }
}

/// Walks the focus chain and negotiates transfers.
pub struct FocusChain {
    toolkit: Arc<dyn NativeToolkit>,
    registry: Arc<ObjectRegistry>,
    callbacks: Arc<CallbackRunner>,
}

impl FocusChain {
    pub fn new(
        toolkit: Arc<dyn NativeToolkit>,
        registry: Arc<ObjectRegistry>,
        callbacks: Arc<CallbackRunner>,
    ) -> Self {
        Self {
            toolkit,
            registry,
            callbacks,
        }
    }

    /// Decide whether `event`, about to be delivered to `receiver`, may move
    /// focus away from the current focus widget.
    #[tracing::instrument(skip(self, event), target = "horizon_bridge::focus", level = "trace")]
    pub fn negotiate(&self, receiver: WidgetId, event: &NativeEvent) -> FocusDecision {
        let toolkit = self.toolkit.as_ref();
        let target = resolve_focus_proxy(toolkit, receiver);
        let mut current = toolkit.focus_widget();

        while let Some(widget) = current {
            if toolkit.is_enabled(widget) {
                if let Some(decision) = self.ask(widget, target, event) {
                    return decision;
                }
            }
            if toolkit.is_window(widget) {
                break;
            }
            current = toolkit.parent(widget);
        }
        FocusDecision::NotApplicable
    }

    /// `request_focus_transfer(from, to, event)`: `false` when the transfer
    /// must be refused and `event` swallowed.
    ///
    /// `from` is where the walk starts, normally the current focus widget.
    pub fn request_focus_transfer(&self, from: WidgetId, to: WidgetId, event: &NativeEvent) -> bool {
        let toolkit = self.toolkit.as_ref();
        let target = resolve_focus_proxy(toolkit, to);
        let mut current = Some(from);
        while let Some(widget) = current {
            if toolkit.is_enabled(widget) {
                if let Some(decision) = self.ask(widget, target, event) {
                    return !decision.is_veto();
                }
            }
            if toolkit.is_window(widget) {
                break;
            }
            current = toolkit.parent(widget);
        }
        true
    }

    /// Post a synthetic Tab (or Backtab) press to `widget`.
    pub fn send_tab_event(&self, widget: WidgetId, forward: bool) {
        let (key, modifiers) = if forward {
            (Key::Tab, Modifiers::NONE)
        } else {
            (Key::Backtab, Modifiers::SHIFT)
        };
        tracing::trace!(target: targets::FOCUS, ?widget, forward, "posting tab event");
        self.toolkit
            .post_event(widget, NativeEvent::KeyPress(KeyEvent::new(key, modifiers)));
    }

    /// Ask `widget` (or its focus proxy) about `event`. `None` means the walk
    /// continues with the parent.
    fn ask(&self, widget: WidgetId, target: WidgetId, event: &NativeEvent) -> Option<FocusDecision> {
        let toolkit = self.toolkit.as_ref();
        let (old_focus, negotiator) = match toolkit.focus_negotiator(widget) {
            Some(negotiator) => (widget, negotiator),
            None => {
                let proxy = resolve_focus_proxy(toolkit, widget);
                (proxy, toolkit.focus_negotiator(proxy)?)
            }
        };
        if !negotiator.is_focus_out_event(old_focus, event) {
            return None;
        }

        let popup = toolkit.completion_popup();
        if popup.is_some_and(|popup| popup.eats_focus) {
            return Some(FocusDecision::HeldByPopup);
        }

        let qualifies = match event {
            NativeEvent::KeyPress(_) | NativeEvent::Wheel(_) => {
                toolkit.focus_policy(target).accepts_tab()
            }
            NativeEvent::PointerPress(_)
            | NativeEvent::PointerDoubleClick(_)
            | NativeEvent::TouchBegin { .. } => {
                if let Some(popup) = popup.filter(|popup| popup.owner == old_focus) {
                    if popup.under_pointer {
                        return Some(FocusDecision::HeldByPopup);
                    }
                    tracing::debug!(target: targets::FOCUS, ?old_focus, "press outside completion popup");
                    toolkit.hide_completion_popup();
                    return Some(FocusDecision::PopupDismissed);
                }
                true
            }
            _ => false,
        };
        if !qualifies {
            return None;
        }

        if negotiator.can_focus_out(old_focus, target, &self.callbacks, &self.registry) {
            Some(FocusDecision::Allowed)
        } else {
            tracing::debug!(target: targets::FOCUS, ?old_focus, ?target, kind = event.kind(), "focus transfer vetoed");
            Some(FocusDecision::Vetoed)
        }
    }
}

impl std::fmt::Debug for FocusChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusChain").finish_non_exhaustive()
    }
}
