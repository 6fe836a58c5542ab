//! The bridge instance and its process-wide accessor.
//!
//! A [`Bridge`] wires every subsystem together around one native toolkit and
//! one managed runtime. Hosts construct it on the UI thread, install it as
//! the process-wide instance, hand every native event to
//! [`Bridge::route_event`] and call [`Bridge::process_pending`] once per
//! native loop iteration.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use horizon_bridge::{Bridge, BridgeConfig};
//!
//! let bridge = Bridge::new(toolkit, runtime, BridgeConfig::default());
//! Bridge::install(Arc::clone(&bridge))?;
//!
//! // In the native event filter:
//! let outcome = bridge.route_event(receiver, &mut event);
//!
//! // Once per loop iteration:
//! bridge.process_pending();
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use horizon_bridge_core::logging::{span_names, targets};
use horizon_bridge_core::{
    BridgeError, EventRecord, ManagedCallable, ManagedObject, ManagedRuntime, ManagedValue,
    UiThread, thread_check,
};
use parking_lot::RwLock;

use crate::callback::CallbackRunner;
use crate::config::BridgeConfig;
use crate::drag::DragDropController;
use crate::event::NativeEvent;
use crate::exception::{ExceptionFunnel, ReportOutcome, Terminator};
use crate::focus::FocusChain;
use crate::grab::MouseGrabTracker;
use crate::proxy::{ManagedProxy, Ownership};
use crate::pump::{EventPump, PumpEvent, PumpHandle};
use crate::registry::ObjectRegistry;
use crate::router::{EventRouter, RouteOutcome};
use crate::scheduler::{TimedCall, TimedCallId, TimedCallScheduler};
use crate::toolkit::{NativeToolkit, WidgetId};

/// The installed process-wide bridge.
static GLOBAL_BRIDGE: RwLock<Option<Arc<Bridge>>> = RwLock::new(None);

/// One bridge between a native toolkit and a managed runtime.
pub struct Bridge {
    toolkit: Arc<dyn NativeToolkit>,
    runtime: Arc<dyn ManagedRuntime>,
    config: BridgeConfig,
    ui: UiThread,
    registry: Arc<ObjectRegistry>,
    pump: EventPump,
    pump_handle: PumpHandle,
    scheduler: TimedCallScheduler,
    grab: Arc<MouseGrabTracker>,
    funnel: Arc<ExceptionFunnel>,
    callbacks: Arc<CallbackRunner>,
    focus: Arc<FocusChain>,
    drag: Arc<DragDropController>,
    router: EventRouter,
}

impl Bridge {
    /// Build a bridge. The calling thread becomes its UI thread.
    pub fn new(
        toolkit: Arc<dyn NativeToolkit>,
        runtime: Arc<dyn ManagedRuntime>,
        config: BridgeConfig,
    ) -> Arc<Self> {
        let ui = UiThread::current();
        let registry = Arc::new(ObjectRegistry::new(Arc::clone(&toolkit), ui));
        let pump = EventPump::new(Arc::clone(&toolkit));
        let pump_handle = pump.handle();
        let scheduler = TimedCallScheduler::new(pump.handle(), ui);
        let grab = Arc::new(MouseGrabTracker::new());
        let funnel = Arc::new(ExceptionFunnel::new(
            Arc::clone(&toolkit),
            Arc::clone(&grab),
            pump.handle(),
            ui,
            &config,
        ));
        let callbacks = Arc::new(CallbackRunner::new(
            Arc::clone(&registry),
            Arc::clone(&runtime),
            Arc::clone(&funnel),
        ));
        let focus = Arc::new(FocusChain::new(
            Arc::clone(&toolkit),
            Arc::clone(&registry),
            Arc::clone(&callbacks),
        ));
        let drag = Arc::new(DragDropController::new(
            Arc::clone(&toolkit),
            Arc::clone(&callbacks),
            config.drag_start_distance,
        ));
        let router = EventRouter::new(
            Arc::clone(&toolkit),
            Arc::clone(&registry),
            Arc::clone(&callbacks),
            Arc::clone(&funnel),
            Arc::clone(&focus),
            Arc::clone(&drag),
            pump.handle(),
            &config,
        );

        tracing::debug!(target: targets::PUMP, ui = ?ui.id(), "bridge created");
        Arc::new(Self {
            toolkit,
            runtime,
            config,
            ui,
            registry,
            pump,
            pump_handle,
            scheduler,
            grab,
            funnel,
            callbacks,
            focus,
            drag,
            router,
        })
    }

    // -- process-wide instance --

    /// Install `bridge` as the process-wide instance.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AlreadyInstalled`] if another bridge is installed.
    pub fn install(bridge: Arc<Bridge>) -> Result<(), BridgeError> {
        let mut global = GLOBAL_BRIDGE.write();
        if global.is_some() {
            return Err(BridgeError::AlreadyInstalled);
        }
        if thread_check::ui_thread_id().is_none() && bridge.ui.is_current() {
            thread_check::set_ui_thread();
        }
        tracing::debug!(target: targets::PUMP, "bridge installed");
        *global = Some(bridge);
        Ok(())
    }

    /// The process-wide instance.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotInstalled`] before [`Bridge::install`].
    pub fn global() -> Result<Arc<Bridge>, BridgeError> {
        GLOBAL_BRIDGE.read().clone().ok_or(BridgeError::NotInstalled)
    }

    /// The process-wide instance, if installed.
    pub fn try_global() -> Option<Arc<Bridge>> {
        GLOBAL_BRIDGE.read().clone()
    }

    /// Remove the process-wide instance. Intended for tests and shutdown.
    pub fn uninstall() -> Option<Arc<Bridge>> {
        GLOBAL_BRIDGE.write().take()
    }

    // -- accessors --

    pub fn toolkit(&self) -> &Arc<dyn NativeToolkit> {
        &self.toolkit
    }

    pub fn runtime(&self) -> &Arc<dyn ManagedRuntime> {
        &self.runtime
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn ui_thread(&self) -> UiThread {
        self.ui
    }

    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    /// A sender for posting work onto this bridge's UI thread.
    pub fn pump_handle(&self) -> PumpHandle {
        self.pump_handle.clone()
    }

    pub fn scheduler(&self) -> &TimedCallScheduler {
        &self.scheduler
    }

    pub fn grab_tracker(&self) -> &MouseGrabTracker {
        &self.grab
    }

    pub fn exception_funnel(&self) -> &ExceptionFunnel {
        &self.funnel
    }

    pub fn callbacks(&self) -> &CallbackRunner {
        &self.callbacks
    }

    pub fn focus_chain(&self) -> &FocusChain {
        &self.focus
    }

    pub fn drag_controller(&self) -> &DragDropController {
        &self.drag
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    // -- registry --

    pub fn register_proxy(&self, widget: WidgetId, proxy: &Arc<ManagedProxy>) {
        self.registry.register(widget, proxy);
    }

    pub fn unregister_proxy(&self, widget: WidgetId) -> bool {
        self.registry.unregister(widget)
    }

    pub fn lookup_proxy(&self, widget: WidgetId) -> Option<Arc<ManagedProxy>> {
        self.registry.lookup(widget)
    }

    /// The registered proxy for `widget`, adopting the widget if it has none.
    ///
    /// A freshly adopted proxy has no managed owner yet; the caller wraps it
    /// and calls [`ManagedProxy::set_owner`]. Until someone holds the
    /// returned `Arc`, the registry entry stays dead.
    pub fn proxy_for(&self, widget: WidgetId) -> Arc<ManagedProxy> {
        if let Some(proxy) = self.registry.lookup(widget) {
            return proxy;
        }
        let proxy = ManagedProxy::new(
            Arc::clone(&self.registry),
            self.pump_handle(),
            Ownership::Borrowed,
        );
        self.registry.register(widget, &proxy);
        tracing::debug!(target: targets::PROXY, ?widget, "implicit proxy created");
        proxy
    }

    /// The toolkit destroyed `widget` on its own: forget everything that
    /// refers to it.
    pub fn widget_destroyed(&self, widget: WidgetId) {
        self.registry.unregister(widget);
        self.scheduler.cancel_owned_by(widget);
        self.grab.forget(widget);
    }

    // -- callbacks, focus, modification --

    /// Run the `name` callback of `widget`'s managed owner; `true` when it
    /// handled the event.
    pub fn run_callback(
        &self,
        widget: WidgetId,
        name: &str,
        build: impl FnOnce(&EventRecord),
    ) -> bool {
        self.callbacks.run_callback(widget, name, build)
    }

    pub fn request_focus_transfer(&self, from: WidgetId, to: WidgetId, event: &NativeEvent) -> bool {
        self.focus.request_focus_transfer(from, to, event)
    }

    pub fn is_modify_permitted(&self, widget: WidgetId, event: &NativeEvent) -> bool {
        self.router.modify_guard().is_modify_permitted(widget, event)
    }

    pub fn send_tab_event(&self, widget: WidgetId, forward: bool) {
        self.focus.send_tab_event(widget, forward);
    }

    pub fn route_event(&self, receiver: WidgetId, event: &mut NativeEvent) -> RouteOutcome {
        self.ui.debug_assert_current("Bridge::route_event");
        self.router.route_event(receiver, event)
    }

    // -- pointer grab --

    pub fn grab_pointer(&self, widget: WidgetId) {
        self.grab.grab(self.toolkit.as_ref(), widget);
    }

    pub fn release_pointer(&self) -> Option<WidgetId> {
        self.grab.release(self.toolkit.as_ref())
    }

    // -- timed calls and exceptions --

    pub fn schedule_timed_call(
        &self,
        owner: Option<WidgetId>,
        delay: Duration,
        callable: Option<Arc<dyn ManagedCallable>>,
        args: Vec<ManagedValue>,
    ) -> TimedCallId {
        self.scheduler.schedule(owner, delay, callable, args)
    }

    pub fn cancel_timed_call(&self, id: TimedCallId) -> bool {
        self.scheduler.cancel(id)
    }

    pub fn report_managed_exception(&self, message: &str) -> ReportOutcome {
        self.funnel.report(message)
    }

    /// Replace the function that ends the process when the user chooses
    /// "terminate".
    pub fn set_terminator(&self, terminator: Terminator) {
        self.funnel.set_terminator(terminator);
    }

    /// Ask the native loop to quit on the next pump iteration.
    pub fn request_quit(&self) -> bool {
        self.pump_handle.post(PumpEvent::Quit)
    }

    /// How long the native loop may sleep before the next timed call is due.
    pub fn time_until_next_timer(&self) -> Option<Duration> {
        self.scheduler.time_until_next()
    }

    // -- pump --

    /// Run one pump iteration: deliver posted events, then fire due timed
    /// calls. Returns the number of posted events handled.
    ///
    /// Events posted while the iteration runs wait for the next one.
    pub fn process_pending(&self) -> usize {
        self.ui.debug_assert_current("Bridge::process_pending");
        let span = tracing::trace_span!(target: targets::PUMP, span_names::PUMP_ITERATION);
        let _entered = span.enter();

        self.funnel.set_pumping(true);
        let batch = self.pump.take_batch();
        let handled = batch.len();
        for event in batch {
            self.handle_pump_event(event);
        }
        for (id, call) in self.scheduler.take_due(Instant::now()) {
            tracing::trace!(target: targets::TIMER, ?id, "timed call due");
            self.fire(call);
        }
        self.funnel.set_pumping(false);
        handled
    }

    fn handle_pump_event(&self, event: PumpEvent) {
        match event {
            PumpEvent::Exception { message } => {
                self.funnel.escalate(&message);
            }
            PumpEvent::DestroyWidget { widget } => {
                if self.registry.lookup(widget).is_some() {
                    tracing::debug!(target: targets::PUMP, ?widget, "widget re-adopted; not destroying");
                    return;
                }
                self.scheduler.cancel_owned_by(widget);
                self.grab.forget(widget);
                tracing::debug!(target: targets::PUMP, ?widget, "destroying widget");
                self.toolkit.destroy_widget(widget);
            }
            PumpEvent::TimedCall { id } => match self.scheduler.take(id) {
                Some(call) => self.fire(call),
                None => tracing::trace!(target: targets::TIMER, ?id, "timed call was cancelled"),
            },
            PumpEvent::Quit => {
                tracing::debug!(target: targets::PUMP, "quit requested");
                self.toolkit.quit();
            }
            PumpEvent::WakeUp => {}
        }
    }

    fn fire(&self, call: TimedCall) {
        let owner = call.owner();
        if let Err(err) = call.fire(self.runtime.as_ref(), &self.registry) {
            tracing::warn!(target: targets::TIMER, ?owner, %err, "timed call raised");
            self.funnel.report(&err.render());
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("ui", &self.ui)
            .field("registry", &self.registry)
            .field("scheduler", &self.scheduler)
            .field("pending", &self.pump.pending())
            .finish_non_exhaustive()
    }
}

impl ManagedProxy {
    /// Allocate a native widget of `kind` owned by a new proxy for `managed`.
    ///
    /// The widget is destroyed through the pump once the proxy is finalized.
    pub fn create(bridge: &Bridge, kind: &str, managed: &Arc<dyn ManagedObject>) -> Arc<Self> {
        let widget = bridge.toolkit.create_widget(kind);
        let proxy = Self::new(Arc::clone(&bridge.registry), bridge.pump_handle(), Ownership::Owned);
        proxy.set_owner(managed);
        bridge.registry.register(widget, &proxy);
        proxy
    }

    /// Wrap a natively-created widget. The toolkit keeps ownership.
    pub fn adopt(bridge: &Bridge, widget: WidgetId, managed: &Arc<dyn ManagedObject>) -> Arc<Self> {
        let proxy = Self::new(
            Arc::clone(&bridge.registry),
            bridge.pump_handle(),
            Ownership::Borrowed,
        );
        proxy.set_owner(managed);
        bridge.registry.register(widget, &proxy);
        proxy
    }
}

/// Schedule a timed call on the installed bridge. Callable from any thread.
///
/// # Errors
///
/// Returns [`BridgeError::NotInstalled`] if no bridge is installed.
pub fn schedule_timed_call(
    owner: Option<WidgetId>,
    delay: Duration,
    callable: Option<Arc<dyn ManagedCallable>>,
    args: Vec<ManagedValue>,
) -> Result<TimedCallId, BridgeError> {
    Ok(Bridge::global()?.schedule_timed_call(owner, delay, callable, args))
}

/// Report a rendered managed error on the installed bridge. Callable from
/// any thread.
///
/// # Errors
///
/// Returns [`BridgeError::NotInstalled`] if no bridge is installed.
pub fn report_managed_exception(message: &str) -> Result<ReportOutcome, BridgeError> {
    Ok(Bridge::global()?.report_managed_exception(message))
}
