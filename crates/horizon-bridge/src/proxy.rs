//! Managed proxy lifetime.
//!
//! A [`ManagedProxy`] is the native half of a managed widget object. The
//! managed object owns the proxy (strongly, through an `Arc`); the proxy
//! points back at it weakly, and at its native widget by handle only.
//!
//! Each proxy moves through `Unbound -> Bound -> Detached`:
//!
//! - binding happens when the proxy is registered for a widget,
//! - detaching happens when the proxy is finalized (dropped by the managed
//!   side) or explicitly deallocated. For widgets the proxy owns, detaching
//!   also schedules native destruction on the pump; destruction is never
//!   performed inline because the widget may be mid-dispatch.
//!
//! `Detached` is terminal.

use std::sync::{Arc, Weak};

use horizon_bridge_core::ManagedObject;
use horizon_bridge_core::logging::targets;
use parking_lot::{Mutex, RwLock};

use crate::pump::{PumpEvent, PumpHandle};
use crate::registry::ObjectRegistry;
use crate::toolkit::WidgetId;

/// Lifecycle state of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// Constructed, no widget yet.
    Unbound,
    /// Paired with a registered widget.
    Bound(WidgetId),
    /// Unpaired for good.
    Detached,
}

/// Who destroys the widget when the proxy goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The proxy allocated the widget and schedules its destruction.
    Owned,
    /// The widget belongs to the toolkit; the proxy only unregisters.
    Borrowed,
}

/// The native half of a managed widget object.
pub struct ManagedProxy {
    state: Mutex<ProxyState>,
    ownership: Ownership,
    owner: RwLock<Option<Weak<dyn ManagedObject>>>,
    registry: Arc<ObjectRegistry>,
    pump: PumpHandle,
}

impl ManagedProxy {
    /// Create an unbound proxy. Pair it with a widget through
    /// [`ObjectRegistry::register`].
    pub fn new(registry: Arc<ObjectRegistry>, pump: PumpHandle, ownership: Ownership) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ProxyState::Unbound),
            ownership,
            owner: RwLock::new(None),
            registry,
            pump,
        })
    }

    pub fn state(&self) -> ProxyState {
        *self.state.lock()
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// The bound widget.
    ///
    /// # Panics
    ///
    /// Panics if the proxy is not bound; using a detached proxy is a
    /// lifetime bug.
    #[track_caller]
    pub fn widget(&self) -> WidgetId {
        match self.state() {
            ProxyState::Bound(widget) => widget,
            state => panic!("use of a proxy that is not bound to a widget ({state:?})"),
        }
    }

    /// The bound widget, or `None` once detached.
    pub fn try_widget(&self) -> Option<WidgetId> {
        match self.state() {
            ProxyState::Bound(widget) => Some(widget),
            _ => None,
        }
    }

    /// Point the proxy back at the managed object that owns it.
    pub fn set_owner(&self, owner: &Arc<dyn ManagedObject>) {
        *self.owner.write() = Some(Arc::downgrade(owner));
    }

    /// The managed object owning this proxy, if still alive.
    pub fn owner(&self) -> Option<Arc<dyn ManagedObject>> {
        self.owner.read().as_ref()?.upgrade()
    }

    /// Detach now: unregister, forget the widget, and for owned widgets
    /// schedule destruction. Idempotent.
    pub fn detach(&self) {
        let Some(widget) = self.try_widget() else {
            self.mark_detached();
            return;
        };
        self.detach_from(widget);
    }

    /// Swap the native widget behind this proxy.
    ///
    /// The old widget is unregistered but not destroyed; it is returned so
    /// the caller can dispose of or reuse it.
    pub fn replace_native_target(self: &Arc<Self>, new_widget: WidgetId) -> Option<WidgetId> {
        let old = self.try_widget();
        if self.state() == ProxyState::Detached {
            panic!("cannot rebind a detached proxy to {new_widget:?}");
        }
        self.registry.rebind(self, old, new_widget);
        tracing::debug!(target: targets::PROXY, ?old, new = ?new_widget, "proxy rebound");
        old
    }

    fn detach_from(&self, widget: WidgetId) {
        let ownership = self.ownership;
        let pump = &self.pump;
        self.registry
            .detach_entry(widget, std::ptr::from_ref(self), |widget| {
                if ownership == Ownership::Owned {
                    tracing::debug!(target: targets::PROXY, ?widget, "scheduling widget destruction");
                    pump.post(PumpEvent::DestroyWidget { widget });
                }
            });
        self.mark_detached();
    }

    pub(crate) fn bind(&self, widget: WidgetId) {
        let mut state = self.state.lock();
        match *state {
            ProxyState::Unbound => *state = ProxyState::Bound(widget),
            other => panic!("cannot bind {widget:?}: proxy is already {other:?}"),
        }
    }

    pub(crate) fn rebind(&self, widget: WidgetId) {
        *self.state.lock() = ProxyState::Bound(widget);
    }

    pub(crate) fn mark_detached(&self) {
        *self.state.lock() = ProxyState::Detached;
    }
}

impl Drop for ManagedProxy {
    fn drop(&mut self) {
        if let ProxyState::Bound(widget) = *self.state.get_mut() {
            tracing::trace!(target: targets::PROXY, ?widget, "proxy finalized");
            self.detach_from(widget);
        }
    }
}

impl std::fmt::Debug for ManagedProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProxy")
            .field("state", &self.state())
            .field("ownership", &self.ownership)
            .finish()
    }
}
