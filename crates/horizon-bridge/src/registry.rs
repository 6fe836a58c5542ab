//! Widget-to-proxy registry.
//!
//! The registry joins the native widget tree and the managed object graph.
//! Entries are keyed by [`WidgetId`] and hold only a weak reference to the
//! proxy: the registry never extends a proxy's lifetime.
//!
//! The table is the one piece of bridge state touched off the UI thread
//! (proxy finalization may run on a collector thread), so every access goes
//! through its mutex. Removing an entry and scheduling the widget's
//! destruction happen under the same lock hold.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::ThreadId;

use horizon_bridge_core::UiThread;
use horizon_bridge_core::logging::targets;
use parking_lot::Mutex;

use crate::proxy::ManagedProxy;
use crate::toolkit::{NativeToolkit, WidgetId};

/// Process-wide serial for diagnostic names, shared by all registries.
static NEXT_SERIAL: AtomicU64 = AtomicU64::new(0);

struct RegistryEntry {
    name: String,
    proxy: Weak<ManagedProxy>,
}

/// A point-in-time copy of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub widget: WidgetId,
    pub name: String,
    /// Whether the proxy was still alive when the snapshot was taken.
    pub live: bool,
}

/// Table mapping native widgets to their managed proxies.
pub struct ObjectRegistry {
    toolkit: Arc<dyn NativeToolkit>,
    ui: UiThread,
    entries: Mutex<HashMap<WidgetId, RegistryEntry>>,
}

impl ObjectRegistry {
    pub fn new(toolkit: Arc<dyn NativeToolkit>, ui: UiThread) -> Self {
        Self {
            toolkit,
            ui,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register `proxy` as the managed owner of `widget` and bind it.
    ///
    /// Moves the widget onto the UI thread if it has affinity elsewhere.
    ///
    /// # Panics
    ///
    /// Panics if `widget` already has a live proxy, or if `proxy` is already
    /// bound. Both indicate a lifetime bug upstream.
    #[tracing::instrument(skip(self, proxy), target = "horizon_bridge::registry", level = "debug")]
    pub fn register(&self, widget: WidgetId, proxy: &Arc<ManagedProxy>) {
        if self.toolkit.widget_thread(widget) != Some(self.ui.id()) {
            tracing::debug!(target: targets::REGISTRY, ?widget, "moving widget to the UI thread");
            self.toolkit.move_to_thread(widget, self.ui.id());
        }
        let name = format!(
            "{}_{}",
            self.toolkit.class_name(widget),
            NEXT_SERIAL.fetch_add(1, Ordering::Relaxed)
        );

        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&widget) {
            if existing.proxy.strong_count() > 0 {
                panic!(
                    "widget {widget:?} ({}) is already registered with a live proxy",
                    existing.name
                );
            }
        }
        proxy.bind(widget);
        tracing::debug!(target: targets::REGISTRY, ?widget, %name, "registered proxy");
        entries.insert(
            widget,
            RegistryEntry {
                name,
                proxy: Arc::downgrade(proxy),
            },
        );
    }

    /// Remove the entry for `widget`, detaching its proxy without scheduling
    /// destruction. Used when the toolkit destroyed the widget on its own.
    ///
    /// No-op if the widget was never registered.
    pub fn unregister(&self, widget: WidgetId) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.remove(&widget) else {
            return false;
        };
        if let Some(proxy) = entry.proxy.upgrade() {
            proxy.mark_detached();
        }
        tracing::debug!(target: targets::REGISTRY, ?widget, name = %entry.name, "unregistered proxy");
        true
    }

    /// The live proxy for `widget`, if any.
    ///
    /// Absence is normal: natively-created helper widgets have no managed owner.
    pub fn lookup(&self, widget: WidgetId) -> Option<Arc<ManagedProxy>> {
        self.entries.lock().get(&widget)?.proxy.upgrade()
    }

    /// Move a widget's thread affinity, typically before registering a widget
    /// built off the UI thread.
    pub fn transfer_ownership(&self, widget: WidgetId, thread: ThreadId) {
        tracing::debug!(target: targets::REGISTRY, ?widget, ?thread, "transferring widget affinity");
        self.toolkit.move_to_thread(widget, thread);
    }

    /// Diagnostic name assigned at registration.
    pub fn name_of(&self, widget: WidgetId) -> Option<String> {
        self.entries.lock().get(&widget).map(|entry| entry.name.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of every entry, sorted by widget.
    pub fn snapshot(&self) -> Vec<RegistrySnapshot> {
        let mut rows: Vec<_> = self
            .entries
            .lock()
            .iter()
            .map(|(widget, entry)| RegistrySnapshot {
                widget: *widget,
                name: entry.name.clone(),
                live: entry.proxy.strong_count() > 0,
            })
            .collect();
        rows.sort_by_key(|row| row.widget);
        rows
    }

    /// Render the table for logs.
    pub fn debug_table(&self) -> String {
        let rows = self.snapshot();
        let mut out = format!("ObjectRegistry ({} entries)\n", rows.len());
        for row in rows {
            let _ = writeln!(
                out,
                "  {:>6}  {}{}",
                row.widget.as_raw(),
                row.name,
                if row.live { "" } else { " (finalizing)" }
            );
        }
        out
    }

    /// Remove `proxy`'s entry for `widget` and run `schedule` before the lock
    /// is released. Entries owned by a different proxy are left alone.
    pub(crate) fn detach_entry(
        &self,
        widget: WidgetId,
        proxy: *const ManagedProxy,
        schedule: impl FnOnce(WidgetId),
    ) -> bool {
        let mut entries = self.entries.lock();
        let owned = entries
            .get(&widget)
            .is_some_and(|entry| std::ptr::eq(entry.proxy.as_ptr(), proxy));
        if !owned {
            return false;
        }
        if let Some(entry) = entries.remove(&widget) {
            tracing::debug!(target: targets::REGISTRY, ?widget, name = %entry.name, "detached proxy");
        }
        schedule(widget);
        true
    }

    /// Re-key `proxy` from `old` to `new` in one lock hold.
    ///
    /// # Panics
    ///
    /// Panics if `new` already has a live proxy.
    pub(crate) fn rebind(&self, proxy: &Arc<ManagedProxy>, old: Option<WidgetId>, new: WidgetId) {
        if self.toolkit.widget_thread(new) != Some(self.ui.id()) {
            self.toolkit.move_to_thread(new, self.ui.id());
        }
        let name = format!(
            "{}_{}",
            self.toolkit.class_name(new),
            NEXT_SERIAL.fetch_add(1, Ordering::Relaxed)
        );

        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&new) {
            let foreign = !std::ptr::eq(existing.proxy.as_ptr(), Arc::as_ptr(proxy));
            if existing.proxy.strong_count() > 0 && foreign {
                panic!(
                    "widget {new:?} ({}) is already registered with a live proxy",
                    existing.name
                );
            }
        }
        if let Some(old) = old {
            let owned = entries
                .get(&old)
                .is_some_and(|entry| std::ptr::eq(entry.proxy.as_ptr(), Arc::as_ptr(proxy)));
            if owned {
                entries.remove(&old);
            }
        }
        proxy.rebind(new);
        tracing::debug!(target: targets::REGISTRY, ?old, ?new, %name, "replaced native target");
        entries.insert(
            new,
            RegistryEntry {
                name,
                proxy: Arc::downgrade(proxy),
            },
        );
    }
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("entries", &self.len())
            .finish()
    }
}
