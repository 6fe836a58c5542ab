//! Core systems for Horizon Bridge.
//!
//! This crate holds the leaf layer of the bridge between a managed scripting
//! runtime and a native GUI toolkit:
//!
//! - [`values`]: the managed value model and native value converters.
//! - [`runtime`]: managed objects, callables and the execution lock.
//! - [`thread_check`]: UI-thread identity and thread affinity.
//! - [`logging`]: tracing targets.

pub mod error;
pub mod logging;
pub mod runtime;
pub mod thread_check;
pub mod values;

pub use error::{BridgeError, ConversionError, ManagedError, Result};
pub use runtime::{
    ExecutionGuard, ExecutionLock, ManagedCallable, ManagedObject, ManagedRuntime, invoke,
};
pub use thread_check::{ThreadAffinity, UiThread, is_ui_thread, set_ui_thread, ui_thread_id};
pub use values::{
    Buffer, Color, EventRecord, Font, FontFamily, FromManaged, IntoManaged, ManagedStruct,
    ManagedValue, Point, PointF, Rect, Size, SizeF,
};

// Values and records cross threads inside timed calls and posted events.
static_assertions::assert_impl_all!(ManagedValue: Send, Sync);
static_assertions::assert_impl_all!(EventRecord: Send, Sync);
static_assertions::assert_impl_all!(ExecutionLock: Send, Sync);
