//! Exclusive pointer grab bookkeeping.

use horizon_bridge_core::logging::targets;
use parking_lot::Mutex;

use crate::toolkit::{NativeToolkit, WidgetId};

/// The single slot holding the widget that currently grabs the pointer.
#[derive(Debug, Default)]
pub struct MouseGrabTracker {
    slot: Mutex<Option<WidgetId>>,
}

impl MouseGrabTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grab the pointer for `widget`, evicting any previous grab.
    pub fn grab(&self, toolkit: &dyn NativeToolkit, widget: WidgetId) {
        let previous = self.slot.lock().replace(widget);
        if let Some(previous) = previous.filter(|previous| *previous != widget) {
            tracing::debug!(target: targets::GRAB, ?previous, "evicting pointer grab");
            toolkit.release_pointer(previous);
        }
        tracing::debug!(target: targets::GRAB, ?widget, "pointer grabbed");
        toolkit.grab_pointer(widget);
    }

    /// Release the current grab, if any.
    pub fn release(&self, toolkit: &dyn NativeToolkit) -> Option<WidgetId> {
        let released = self.slot.lock().take();
        if let Some(widget) = released {
            tracing::debug!(target: targets::GRAB, ?widget, "pointer released");
            toolkit.release_pointer(widget);
        }
        released
    }

    /// Forget a grab held by a widget that no longer exists.
    pub fn forget(&self, widget: WidgetId) {
        let mut slot = self.slot.lock();
        if *slot == Some(widget) {
            *slot = None;
        }
    }

    pub fn current(&self) -> Option<WidgetId> {
        *self.slot.lock()
    }

    /// Release the grab natively until the returned guard drops.
    ///
    /// The slot keeps its value; on drop the grab is restored unless it was
    /// changed in the meantime.
    pub fn suspend<'a>(&'a self, toolkit: &'a dyn NativeToolkit) -> GrabSuspension<'a> {
        let widget = self.current();
        if let Some(widget) = widget {
            tracing::trace!(target: targets::GRAB, ?widget, "suspending pointer grab");
            toolkit.release_pointer(widget);
        }
        GrabSuspension {
            tracker: self,
            toolkit,
            widget,
        }
    }
}

/// Restores a suspended grab on drop.
#[must_use = "the grab is restored as soon as the suspension is dropped"]
pub struct GrabSuspension<'a> {
    tracker: &'a MouseGrabTracker,
    toolkit: &'a dyn NativeToolkit,
    widget: Option<WidgetId>,
}

impl Drop for GrabSuspension<'_> {
    fn drop(&mut self) {
        let Some(widget) = self.widget else { return };
        if self.tracker.current() == Some(widget) && self.toolkit.is_alive(widget) {
            tracing::trace!(target: targets::GRAB, ?widget, "restoring pointer grab");
            self.toolkit.grab_pointer(widget);
        }
    }
}
