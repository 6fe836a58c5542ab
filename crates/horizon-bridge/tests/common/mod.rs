//! Shared fixtures: an in-memory toolkit with an ordering log and a managed
//! object whose callbacks are plain closures.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::ThreadId;

use horizon_bridge::drag::{DragRequest, DropAction};
use horizon_bridge::event::NativeEvent;
use horizon_bridge::focus::FocusNegotiator;
use horizon_bridge::modify::ModifyCapability;
use horizon_bridge::toolkit::{
    CompletionPopup, ExceptionChoice, FocusPolicy, NativeToolkit, RenderedItem, WidgetId,
};
use horizon_bridge::{Bridge, BridgeConfig};
use horizon_bridge_core::{
    EventRecord, ExecutionLock, ManagedCallable, ManagedError, ManagedObject, ManagedRuntime,
    ManagedValue, Rect,
};
use parking_lot::{Mutex, RwLock};

/// Install a log subscriber once per test binary; `RUST_LOG` filters it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Fake toolkit
// ============================================================================

#[derive(Clone)]
struct Node {
    kind: String,
    parent: Option<WidgetId>,
    window: bool,
    enabled: bool,
    alive: bool,
    policy: FocusPolicy,
    focus_proxy: Option<WidgetId>,
    thread: Option<ThreadId>,
    negotiator: Option<Arc<dyn FocusNegotiator>>,
    capability: Option<Arc<dyn ModifyCapability>>,
    viewport: Option<Rect>,
    selection: Option<Vec<ManagedValue>>,
    rendered: Vec<RenderedItem>,
    paint_delegated: bool,
}

impl Node {
    fn new(kind: &str, parent: Option<WidgetId>) -> Self {
        Self {
            kind: kind.to_string(),
            parent,
            window: parent.is_none(),
            enabled: true,
            alive: true,
            policy: FocusPolicy::StrongFocus,
            focus_proxy: None,
            thread: None,
            negotiator: None,
            capability: None,
            viewport: None,
            selection: None,
            rendered: Vec::new(),
            paint_delegated: false,
        }
    }
}

type DestroyHook = Box<dyn Fn(WidgetId) + Send + Sync>;

/// A widget tree held in memory. Every side effect the bridge asks for is
/// appended to an ordering log.
pub struct FakeToolkit {
    nodes: Mutex<HashMap<WidgetId, Node>>,
    next_id: AtomicU64,
    log: Mutex<Vec<String>>,
    focus: Mutex<Option<WidgetId>>,
    popup: Mutex<Option<CompletionPopup>>,
    drag_result: Mutex<DropAction>,
    drag_requests: Mutex<Vec<DragRequest>>,
    exception_choice: Mutex<ExceptionChoice>,
    exceptions: Mutex<Vec<String>>,
    posted: Mutex<Vec<(WidgetId, NativeEvent)>>,
    on_destroy: RwLock<Option<DestroyHook>>,
    wakes: AtomicUsize,
}

impl FakeToolkit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            nodes: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            log: Mutex::new(Vec::new()),
            focus: Mutex::new(None),
            popup: Mutex::new(None),
            drag_result: Mutex::new(DropAction::COPY),
            drag_requests: Mutex::new(Vec::new()),
            exception_choice: Mutex::new(ExceptionChoice::default()),
            exceptions: Mutex::new(Vec::new()),
            posted: Mutex::new(Vec::new()),
            on_destroy: RwLock::new(None),
            wakes: AtomicUsize::new(0),
        })
    }

    fn insert(&self, kind: &str, parent: Option<WidgetId>) -> WidgetId {
        let id = WidgetId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.nodes.lock().insert(id, Node::new(kind, parent));
        id
    }

    fn update(&self, widget: WidgetId, f: impl FnOnce(&mut Node)) {
        if let Some(node) = self.nodes.lock().get_mut(&widget) {
            f(node);
        }
    }

    fn read<T>(&self, widget: WidgetId, f: impl FnOnce(&Node) -> T) -> Option<T> {
        self.nodes.lock().get(&widget).map(f)
    }

    // -- tree construction --

    /// A top-level window.
    pub fn add_window(&self, kind: &str) -> WidgetId {
        self.insert(kind, None)
    }

    /// A child widget.
    pub fn add_child(&self, kind: &str, parent: WidgetId) -> WidgetId {
        self.insert(kind, Some(parent))
    }

    pub fn set_enabled(&self, widget: WidgetId, enabled: bool) {
        self.update(widget, |node| node.enabled = enabled);
    }

    pub fn set_focus_policy(&self, widget: WidgetId, policy: FocusPolicy) {
        self.update(widget, |node| node.policy = policy);
    }

    pub fn set_focus_proxy(&self, widget: WidgetId, proxy: Option<WidgetId>) {
        self.update(widget, |node| node.focus_proxy = proxy);
    }

    pub fn set_negotiator(&self, widget: WidgetId, negotiator: Arc<dyn FocusNegotiator>) {
        self.update(widget, |node| node.negotiator = Some(negotiator));
    }

    pub fn set_capability(&self, widget: WidgetId, capability: Arc<dyn ModifyCapability>) {
        self.update(widget, |node| node.capability = Some(capability));
    }

    pub fn set_viewport(&self, widget: WidgetId, viewport: Rect) {
        self.update(widget, |node| node.viewport = Some(viewport));
    }

    pub fn set_selection(&self, widget: WidgetId, selection: Vec<ManagedValue>, rendered: Vec<RenderedItem>) {
        self.update(widget, |node| {
            node.selection = Some(selection);
            node.rendered = rendered;
        });
    }

    pub fn set_paint_delegated(&self, widget: WidgetId, delegated: bool) {
        self.update(widget, |node| node.paint_delegated = delegated);
    }

    pub fn set_focus(&self, widget: Option<WidgetId>) {
        *self.focus.lock() = widget;
    }

    pub fn set_popup(&self, popup: Option<CompletionPopup>) {
        *self.popup.lock() = popup;
    }

    pub fn set_drag_result(&self, action: DropAction) {
        *self.drag_result.lock() = action;
    }

    pub fn set_exception_choice(&self, choice: ExceptionChoice) {
        *self.exception_choice.lock() = choice;
    }

    pub fn set_on_destroy(&self, hook: impl Fn(WidgetId) + Send + Sync + 'static) {
        *self.on_destroy.write() = Some(Box::new(hook));
    }

    /// Destroy a widget behind the bridge's back.
    pub fn kill(&self, widget: WidgetId) {
        self.update(widget, |node| node.alive = false);
    }

    // -- observations --

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn push_log(&self, entry: impl Into<String>) {
        self.log.lock().push(entry.into());
    }

    pub fn exceptions(&self) -> Vec<String> {
        self.exceptions.lock().clone()
    }

    pub fn drag_requests(&self) -> Vec<DragRequest> {
        self.drag_requests.lock().clone()
    }

    pub fn posted(&self) -> Vec<(WidgetId, NativeEvent)> {
        self.posted.lock().clone()
    }

    pub fn thread_of(&self, widget: WidgetId) -> Option<ThreadId> {
        self.read(widget, |node| node.thread).flatten()
    }

    pub fn wakes(&self) -> usize {
        self.wakes.load(Ordering::Relaxed)
    }
}

impl NativeToolkit for FakeToolkit {
    fn create_widget(&self, kind: &str) -> WidgetId {
        let id = self.insert(kind, None);
        self.push_log(format!("create:{}", id.as_raw()));
        id
    }

    fn destroy_widget(&self, widget: WidgetId) {
        if let Some(hook) = self.on_destroy.read().as_ref() {
            hook(widget);
        }
        self.update(widget, |node| node.alive = false);
        self.push_log(format!("destroy:{}", widget.as_raw()));
    }

    fn is_alive(&self, widget: WidgetId) -> bool {
        self.read(widget, |node| node.alive).unwrap_or(false)
    }

    fn class_name(&self, widget: WidgetId) -> String {
        self.read(widget, |node| node.kind.clone())
            .unwrap_or_else(|| "Widget".to_string())
    }

    fn widget_thread(&self, widget: WidgetId) -> Option<ThreadId> {
        self.thread_of(widget)
    }

    fn move_to_thread(&self, widget: WidgetId, thread: ThreadId) {
        self.update(widget, |node| node.thread = Some(thread));
    }

    fn parent(&self, widget: WidgetId) -> Option<WidgetId> {
        self.read(widget, |node| node.parent).flatten()
    }

    fn is_window(&self, widget: WidgetId) -> bool {
        self.read(widget, |node| node.window).unwrap_or(true)
    }

    fn is_enabled(&self, widget: WidgetId) -> bool {
        self.read(widget, |node| node.enabled && node.alive).unwrap_or(false)
    }

    fn focus_policy(&self, widget: WidgetId) -> FocusPolicy {
        self.read(widget, |node| node.policy).unwrap_or_default()
    }

    fn focus_proxy(&self, widget: WidgetId) -> Option<WidgetId> {
        self.read(widget, |node| node.focus_proxy).flatten()
    }

    fn focus_widget(&self) -> Option<WidgetId> {
        *self.focus.lock()
    }

    fn focus_negotiator(&self, widget: WidgetId) -> Option<Arc<dyn FocusNegotiator>> {
        self.read(widget, |node| node.negotiator.clone()).flatten()
    }

    fn modify_capability(&self, widget: WidgetId) -> Option<Arc<dyn ModifyCapability>> {
        self.read(widget, |node| node.capability.clone()).flatten()
    }

    fn completion_popup(&self) -> Option<CompletionPopup> {
        *self.popup.lock()
    }

    fn hide_completion_popup(&self) {
        self.push_log("hide-popup");
        *self.popup.lock() = None;
    }

    fn paint_delegated(&self, widget: WidgetId) -> bool {
        self.read(widget, |node| node.paint_delegated).unwrap_or(false)
    }

    fn begin_paint(&self, widget: WidgetId, _region: Rect) -> ManagedValue {
        self.push_log(format!("begin-paint:{}", widget.as_raw()));
        ManagedValue::Str(format!("dc-{}", widget.as_raw()))
    }

    fn end_paint(&self, widget: WidgetId, _context: ManagedValue) {
        self.push_log(format!("end-paint:{}", widget.as_raw()));
    }

    fn drag_start_distance(&self) -> Option<i32> {
        None
    }

    fn viewport_rect(&self, widget: WidgetId) -> Option<Rect> {
        self.read(widget, |node| node.viewport).flatten()
    }

    fn selection(&self, widget: WidgetId) -> Option<Vec<ManagedValue>> {
        self.read(widget, |node| node.selection.clone()).flatten()
    }

    fn render_selection(&self, widget: WidgetId) -> Vec<RenderedItem> {
        self.read(widget, |node| node.rendered.clone()).unwrap_or_default()
    }

    fn run_drag_loop(&self, source: WidgetId, request: DragRequest) -> DropAction {
        self.push_log(format!("drag-loop:{}", source.as_raw()));
        self.drag_requests.lock().push(request);
        *self.drag_result.lock()
    }

    fn grab_pointer(&self, widget: WidgetId) {
        self.push_log(format!("grab:{}", widget.as_raw()));
    }

    fn release_pointer(&self, widget: WidgetId) {
        self.push_log(format!("release:{}", widget.as_raw()));
    }

    fn show_exception(&self, _title: &str, message: &str) -> ExceptionChoice {
        self.push_log("exception");
        self.exceptions.lock().push(message.to_string());
        *self.exception_choice.lock()
    }

    fn quit(&self) {
        self.push_log("quit");
    }

    fn wake(&self) {
        self.wakes.fetch_add(1, Ordering::Relaxed);
    }

    fn post_event(&self, widget: WidgetId, event: NativeEvent) {
        self.posted.lock().push((widget, event));
    }
}

// ============================================================================
// Fake managed object
// ============================================================================

type Handler = Arc<dyn Fn(&EventRecord) -> Result<ManagedValue, ManagedError> + Send + Sync>;

/// A managed object whose callbacks are closures over the event record.
pub struct FakeObject {
    type_name: String,
    handlers: RwLock<HashMap<String, Handler>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeObject {
    pub fn new(type_name: &str) -> Arc<Self> {
        Arc::new(Self {
            type_name: type_name.to_string(),
            handlers: RwLock::new(HashMap::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Define callback `name`.
    pub fn on(
        &self,
        name: &str,
        handler: impl Fn(&EventRecord) -> Result<ManagedValue, ManagedError> + Send + Sync + 'static,
    ) {
        self.handlers.write().insert(name.to_string(), Arc::new(handler));
    }

    /// Define callback `name` returning a constant.
    pub fn returning(&self, name: &str, value: impl Into<ManagedValue>) {
        let value = value.into();
        self.on(name, move |_| Ok(value.clone()));
    }

    /// Define callback `name` raising a managed error.
    pub fn raising(&self, name: &str, message: &str) {
        let message = message.to_string();
        self.on(name, move |_| Err(ManagedError::new("RuntimeError", message.clone())));
    }

    /// Callback names in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|call| *call == name).count()
    }

    pub fn as_managed(self: &Arc<Self>) -> Arc<dyn ManagedObject> {
        Arc::clone(self) as Arc<dyn ManagedObject>
    }
}

impl ManagedObject for FakeObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn attr(&self, _name: &str) -> Option<ManagedValue> {
        None
    }

    fn callback(&self, name: &str) -> Option<Arc<dyn ManagedCallable>> {
        let handler = self.handlers.read().get(name).cloned()?;
        let calls = Arc::clone(&self.calls);
        let name = name.to_string();
        let callable: Arc<dyn ManagedCallable> =
            Arc::new(move |args: &[ManagedValue]| -> Result<ManagedValue, ManagedError> {
                calls.lock().push(name.clone());
                let record = match args.first() {
                    Some(ManagedValue::Event(record)) => record.clone(),
                    _ => EventRecord::new(),
                };
                handler(&record)
            });
        Some(callable)
    }
}

/// A callable recording how many times it ran.
pub fn counting_callable(counter: Arc<AtomicUsize>) -> Arc<dyn ManagedCallable> {
    Arc::new(move |_: &[ManagedValue]| -> Result<ManagedValue, ManagedError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(ManagedValue::None)
    })
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub toolkit: Arc<FakeToolkit>,
    pub runtime: Arc<ExecutionLock>,
    pub bridge: Arc<Bridge>,
    pub terminated: Arc<Mutex<Vec<i32>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        init_tracing();
        let toolkit = FakeToolkit::new();
        let runtime = Arc::new(ExecutionLock::new());
        let bridge = Bridge::new(
            Arc::clone(&toolkit) as Arc<dyn NativeToolkit>,
            Arc::clone(&runtime) as Arc<dyn ManagedRuntime>,
            config,
        );
        let terminated = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&terminated);
        bridge.set_terminator(Arc::new(move |code| sink.lock().push(code)));
        Self {
            toolkit,
            runtime,
            bridge,
            terminated,
        }
    }

    /// A window with one child widget owned by `object`. Returns the child.
    ///
    /// The returned proxy keeps the registration alive.
    pub fn widget_with(&self, object: &Arc<FakeObject>) -> (WidgetId, Arc<horizon_bridge::ManagedProxy>) {
        let window = self.toolkit.add_window("Frame");
        let widget = self.toolkit.add_child("Panel", window);
        let proxy = horizon_bridge::ManagedProxy::adopt(&self.bridge, widget, &object.as_managed());
        (widget, proxy)
    }
}
