//! Logging facilities for Horizon Bridge.
//!
//! Horizon Bridge uses the `tracing` crate for instrumentation. Install any
//! subscriber in the host application to see the output; the constants below
//! name the targets each subsystem logs under so they can be filtered, e.g.
//! `RUST_LOG=horizon_bridge::router=trace,horizon_bridge::registry=debug`.

/// Target names for log filtering.
pub mod targets {
    /// Managed runtime boundary.
    pub const RUNTIME: &str = "horizon_bridge_core::runtime";
    /// Widget-to-proxy registry.
    pub const REGISTRY: &str = "horizon_bridge::registry";
    /// Proxy lifecycle.
    pub const PROXY: &str = "horizon_bridge::proxy";
    /// UI-thread event pump.
    pub const PUMP: &str = "horizon_bridge::pump";
    /// Timed calls.
    pub const TIMER: &str = "horizon_bridge::timer";
    /// Event routing.
    pub const ROUTER: &str = "horizon_bridge::router";
    /// Managed callback invocation.
    pub const CALLBACK: &str = "horizon_bridge::callback";
    /// Focus negotiation.
    pub const FOCUS: &str = "horizon_bridge::focus";
    /// Read-only guard.
    pub const MODIFY: &str = "horizon_bridge::modify";
    /// Drag and drop.
    pub const DRAG: &str = "horizon_bridge::drag";
    /// Exception escalation.
    pub const EXCEPTION: &str = "horizon_bridge::exception";
    /// Pointer grab bookkeeping.
    pub const GRAB: &str = "horizon_bridge::grab";
}

/// Span names used for tracing.
pub mod span_names {
    /// One pass of the UI-thread event pump.
    pub const PUMP_ITERATION: &str = "horizon_bridge::pump_iteration";
    /// Routing of a single native event.
    pub const ROUTE_EVENT: &str = "horizon_bridge::route_event";
    /// A native modal drag loop.
    pub const DRAG_LOOP: &str = "horizon_bridge::drag_loop";
}
