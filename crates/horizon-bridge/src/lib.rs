//! Horizon Bridge - object bridge and input-event router between a managed
//! scripting runtime and a native GUI toolkit.
//!
//! The bridge owns:
//!
//! - the [`registry`] mapping native widgets to managed proxies, and the
//!   [`proxy`] lifetime rules pairing them,
//! - the [`router`], a single filter every native event passes through
//!   before toolkit dispatch,
//! - cancelable focus transfer ([`focus`]) and read-only enforcement
//!   ([`modify`]),
//! - the drag-and-drop gesture ([`drag`]),
//! - cross-thread error escalation ([`exception`]), timed calls
//!   ([`scheduler`]) and pointer grab bookkeeping ([`grab`]).
//!
//! Hosts implement [`NativeToolkit`] over their widget tree and
//! [`ManagedRuntime`] over their scripting runtime, then drive a [`Bridge`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use horizon_bridge::prelude::*;
//!
//! let bridge = Bridge::new(toolkit, runtime, BridgeConfig::default());
//! Bridge::install(Arc::clone(&bridge))?;
//!
//! match bridge.route_event(receiver, &mut event) {
//!     RouteOutcome::Forward => native_dispatch(receiver, event),
//!     RouteOutcome::Swallow(_) => {}
//! }
//! bridge.process_pending();
//! ```

pub mod bridge;
pub mod callback;
pub mod config;
pub mod drag;
pub mod event;
pub mod exception;
pub mod focus;
pub mod grab;
#[cfg(feature = "winit-input")]
pub mod input;
pub mod modify;
pub mod prelude;
pub mod proxy;
pub mod pump;
pub mod registry;
pub mod router;
pub mod scheduler;
pub mod toolkit;

pub use horizon_bridge_core::*;

pub use bridge::{Bridge, report_managed_exception, schedule_timed_call};
pub use callback::{CallbackOutcome, CallbackRunner, Invocation};
pub use config::{BridgeConfig, ConfigError, MissingCallback};
pub use drag::{DragDropController, DragOutcome, DragPayload, DragRequest, DragState, DropAction};
pub use event::{
    DropEvent, Key, KeyEvent, Modifiers, MouseButtons, NativeEvent, PointerEvent,
    StandardSequence, WheelEvent,
};
pub use exception::{ExceptionFunnel, ExceptionRecords, ReportOutcome, Terminator};
pub use focus::{FocusChain, FocusDecision, FocusNegotiator, ItemEditorNegotiator};
pub use grab::MouseGrabTracker;
pub use modify::{CheckableModify, ModifyCapability, ModifyDecision, ModifyGuard, TextEditModify};
pub use proxy::{ManagedProxy, Ownership, ProxyState};
pub use pump::{EventPriority, PumpEvent, PumpHandle};
pub use registry::{ObjectRegistry, RegistrySnapshot};
pub use router::{EventRouter, RouteOutcome, SwallowReason};
pub use scheduler::{TimedCall, TimedCallId, TimedCallScheduler};
pub use toolkit::{
    CompletionPopup, DropLocation, DropPosition, ExceptionChoice, FocusPolicy, NativeToolkit,
    RenderedItem, WidgetId,
};

// The bridge is shared between the UI thread and collector/worker threads.
static_assertions::assert_impl_all!(Bridge: Send, Sync);
static_assertions::assert_impl_all!(ObjectRegistry: Send, Sync);
static_assertions::assert_impl_all!(ManagedProxy: Send, Sync);
static_assertions::assert_impl_all!(PumpHandle: Send, Sync);
static_assertions::assert_impl_all!(TimedCall: Send);
