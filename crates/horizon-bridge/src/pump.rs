//! Cross-thread event posting onto the UI thread.
//!
//! Off-thread code never touches widgets directly. It posts a [`PumpEvent`]
//! through a [`PumpHandle`], and the UI thread drains the queue once per
//! native loop iteration (`Bridge::process_pending`). Posting wakes the
//! native loop so the iteration happens promptly.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use horizon_bridge_core::logging::targets;

use crate::scheduler::TimedCallId;
use crate::toolkit::{NativeToolkit, WidgetId};

/// Priority levels for pump events.
/// Higher priority events are processed first within the same iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Deferred destruction runs after everything else in the iteration.
    Low = 0,
    /// Normal priority - timed calls.
    Normal = 1,
    /// High priority - error reports.
    High = 2,
    /// Critical priority - shutdown.
    Critical = 3,
}

/// Events delivered to the UI thread by the pump.
#[derive(Debug, Clone, PartialEq)]
pub enum PumpEvent {
    /// A managed error reported off the UI thread.
    Exception { message: String },
    /// A widget whose proxy was finalized, to be destroyed now that no
    /// native dispatch frame references it.
    DestroyWidget { widget: WidgetId },
    /// A zero-delay timed call.
    TimedCall { id: TimedCallId },
    /// Ask the native loop to quit.
    Quit,
    /// Only wake the loop.
    WakeUp,
}

impl PumpEvent {
    pub fn priority(&self) -> EventPriority {
        match self {
            Self::Quit => EventPriority::Critical,
            Self::Exception { .. } => EventPriority::High,
            Self::TimedCall { .. } | Self::WakeUp => EventPriority::Normal,
            Self::DestroyWidget { .. } => EventPriority::Low,
        }
    }
}

/// Cloneable, thread-safe sender of pump events.
#[derive(Clone)]
pub struct PumpHandle {
    sender: Sender<PumpEvent>,
    toolkit: Arc<dyn NativeToolkit>,
}

impl PumpHandle {
    /// Post an event for the next pump iteration and wake the native loop.
    ///
    /// Returns `false` if the pump has been dropped.
    pub fn post(&self, event: PumpEvent) -> bool {
        tracing::trace!(target: targets::PUMP, ?event, "posting pump event");
        if self.sender.send(event).is_err() {
            tracing::warn!(target: targets::PUMP, "pump is gone; event dropped");
            return false;
        }
        self.toolkit.wake();
        true
    }
}

impl std::fmt::Debug for PumpHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PumpHandle")
            .field("pending", &self.sender.len())
            .finish()
    }
}

/// The UI-thread end of the pump.
pub struct EventPump {
    receiver: Receiver<PumpEvent>,
    handle: PumpHandle,
}

impl EventPump {
    pub fn new(toolkit: Arc<dyn NativeToolkit>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            receiver,
            handle: PumpHandle { sender, toolkit },
        }
    }

    pub fn handle(&self) -> PumpHandle {
        self.handle.clone()
    }

    /// Number of events waiting.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Take the events queued at this instant, highest priority first.
    ///
    /// Events posted while the batch is being processed wait for the next
    /// iteration.
    pub fn take_batch(&self) -> Vec<PumpEvent> {
        let available = self.receiver.len();
        let mut batch = Vec::with_capacity(available);
        for _ in 0..available {
            match self.receiver.try_recv() {
                Ok(event) => batch.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        // Stable: equal priorities keep posting order.
        batch.sort_by(|a, b| b.priority().cmp(&a.priority()));
        batch
    }
}
