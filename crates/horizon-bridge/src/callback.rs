//! Named managed callbacks.
//!
//! Widgets expose behaviour to managed code through callbacks looked up by
//! name on the managed object that owns the widget's proxy. Each callback is
//! invoked with a single [`EventRecord`] argument under the execution lock;
//! errors never propagate out of here, they go to the exception funnel.

use std::sync::Arc;

use horizon_bridge_core::logging::targets;
use horizon_bridge_core::{EventRecord, ManagedRuntime, ManagedValue, invoke};

use crate::exception::ExceptionFunnel;
use crate::registry::ObjectRegistry;
use crate::toolkit::WidgetId;

/// Callback names, one per event kind.
pub mod names {
    pub const ON_PAINT: &str = "on-paint";
    pub const ON_FOCUS_IN: &str = "on-focus-in";
    pub const ON_FOCUS_OUT: &str = "on-focus-out";
    pub const ON_POINTER_DOWN: &str = "on-pointer-down";
    pub const ON_POINTER_UP: &str = "on-pointer-up";
    pub const ON_DOUBLE_CLICK: &str = "on-double-click";
    pub const ON_POINTER_MOVE: &str = "on-pointer-move";
    pub const ON_WHEEL: &str = "on-wheel";
    pub const ON_KEY_DOWN: &str = "on-key-down";
    pub const ON_KEY_UP: &str = "on-key-up";
    pub const ON_CHAR: &str = "on-char";
    pub const ON_DRAG_START: &str = "on-drag-start";
    pub const ON_DRAG_END: &str = "on-drag-end";
    pub const ON_DRAG_ENTER: &str = "on-drag-enter";
    pub const ON_DRAG_MOVE: &str = "on-drag-move";
    pub const ON_DRAG_LEAVE: &str = "on-drag-leave";
    pub const ON_DROP: &str = "on-drop";
    pub const ON_TIMER: &str = "on-timer";
    pub const ON_MODIFY: &str = "on-modify";
    pub const CAN_FOCUS_OUT: &str = "can-focus-out";
}

/// Result of looking up and running one callback.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// The widget has no managed owner.
    NoProxy,
    /// The owner defines no callback under that name.
    NoCallback,
    /// The callback ran and returned a value.
    Returned(ManagedValue),
    /// The callback raised; the error was reported.
    Failed,
}

impl CallbackOutcome {
    /// True only when a callback ran and returned a truthy value.
    pub fn is_truthy(&self) -> bool {
        matches!(self, Self::Returned(value) if value.is_truthy())
    }

    pub fn ran(&self) -> bool {
        matches!(self, Self::Returned(_) | Self::Failed)
    }
}

/// A finished invocation together with the record the callback saw, so
/// callers can read back fields the callback rewrote.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub outcome: CallbackOutcome,
    pub record: EventRecord,
}

/// Resolves widgets to managed callbacks and runs them.
pub struct CallbackRunner {
    registry: Arc<ObjectRegistry>,
    runtime: Arc<dyn ManagedRuntime>,
    funnel: Arc<ExceptionFunnel>,
}

impl CallbackRunner {
    pub fn new(
        registry: Arc<ObjectRegistry>,
        runtime: Arc<dyn ManagedRuntime>,
        funnel: Arc<ExceptionFunnel>,
    ) -> Self {
        Self {
            registry,
            runtime,
            funnel,
        }
    }

    /// Whether `widget` has a managed owner defining `name`.
    pub fn has_callback(&self, widget: WidgetId, name: &str) -> bool {
        self.registry
            .lookup(widget)
            .and_then(|proxy| proxy.owner())
            .is_some_and(|object| object.callback(name).is_some())
    }

    /// Run the `name` callback of `widget`'s managed owner.
    ///
    /// `build` fills the event record and is only called when the callback
    /// exists.
    #[tracing::instrument(skip(self, build), target = "horizon_bridge::callback", level = "trace")]
    pub fn call_with(
        &self,
        widget: WidgetId,
        name: &str,
        build: impl FnOnce(&EventRecord),
    ) -> Invocation {
        let record = EventRecord::new();
        let Some(object) = self
            .registry
            .lookup(widget)
            .and_then(|proxy| proxy.owner())
        else {
            return Invocation {
                outcome: CallbackOutcome::NoProxy,
                record,
            };
        };
        let Some(callable) = object.callback(name) else {
            return Invocation {
                outcome: CallbackOutcome::NoCallback,
                record,
            };
        };

        build(&record);
        let args = [ManagedValue::Event(record.clone())];
        let outcome = match invoke(self.runtime.as_ref(), callable.as_ref(), &args) {
            Ok(value) => CallbackOutcome::Returned(value),
            Err(err) => {
                tracing::warn!(target: targets::CALLBACK, ?widget, callback = name, %err, "managed callback raised");
                self.funnel.report(&err.render());
                CallbackOutcome::Failed
            }
        };
        Invocation { outcome, record }
    }

    /// Run a callback and report whether it was handled: `true` only when
    /// the callback exists, completed, and returned a truthy value.
    pub fn run_callback(
        &self,
        widget: WidgetId,
        name: &str,
        build: impl FnOnce(&EventRecord),
    ) -> bool {
        self.call_with(widget, name, build).outcome.is_truthy()
    }

    pub fn runtime(&self) -> &Arc<dyn ManagedRuntime> {
        &self.runtime
    }

    pub fn funnel(&self) -> &Arc<ExceptionFunnel> {
        &self.funnel
    }
}

impl std::fmt::Debug for CallbackRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRunner").finish_non_exhaustive()
    }
}
