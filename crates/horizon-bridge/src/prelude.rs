//! Prelude module for Horizon Bridge.
//!
//! ```ignore
//! use horizon_bridge::prelude::*;
//! ```

// ============================================================================
// Bridge
// ============================================================================

pub use crate::bridge::{Bridge, report_managed_exception, schedule_timed_call};
pub use crate::config::{BridgeConfig, MissingCallback};

// ============================================================================
// Toolkit and runtime seams
// ============================================================================

pub use crate::toolkit::{FocusPolicy, NativeToolkit, WidgetId};
pub use horizon_bridge_core::{
    EventRecord, ExecutionLock, ManagedCallable, ManagedError, ManagedObject, ManagedRuntime,
    ManagedValue,
};

// ============================================================================
// Objects and events
// ============================================================================

pub use crate::callback::names;
pub use crate::event::{Key, KeyEvent, Modifiers, MouseButtons, NativeEvent, PointerEvent};
pub use crate::proxy::{ManagedProxy, Ownership};
pub use crate::router::{RouteOutcome, SwallowReason};

// ============================================================================
// Capabilities
// ============================================================================

pub use crate::focus::FocusNegotiator;
pub use crate::modify::ModifyCapability;
