//! Timed managed calls.
//!
//! A [`TimedCall`] owns a managed callable and its captured arguments from
//! the moment it is scheduled until it fires or is cancelled; firing consumes
//! it, so the retained references are released right after invocation
//! whatever the outcome.
//!
//! Calls are always fired from the pump on the UI thread. A zero delay does
//! not mean "now": the call is posted to the pump and runs on the next
//! iteration, after the current handler has returned.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use horizon_bridge_core::logging::targets;
use horizon_bridge_core::{
    ManagedCallable, ManagedError, ManagedRuntime, ManagedValue, ThreadAffinity, UiThread, invoke,
};
use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::callback::names;
use crate::pump::{PumpEvent, PumpHandle};
use crate::registry::ObjectRegistry;
use crate::toolkit::WidgetId;

/// Delays are clamped to this; a longer delay never fires in practice.
pub const MAX_DELAY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

new_key_type! {
    /// A unique identifier for a scheduled call.
    pub struct TimedCallId;
}

/// A scheduled managed call.
pub struct TimedCall {
    owner: Option<WidgetId>,
    callable: Option<Arc<dyn ManagedCallable>>,
    args: Vec<ManagedValue>,
    affinity: ThreadAffinity,
}

impl TimedCall {
    pub fn owner(&self) -> Option<WidgetId> {
        self.owner
    }

    pub fn affinity(&self) -> &ThreadAffinity {
        &self.affinity
    }

    /// Invoke the call and drop everything it retained.
    ///
    /// Without a callable the owner's `on-timer` callback is invoked instead;
    /// a call whose owner has no managed proxy any more is dropped silently.
    pub fn fire(
        self,
        runtime: &dyn ManagedRuntime,
        registry: &ObjectRegistry,
    ) -> Result<ManagedValue, ManagedError> {
        let Self {
            owner,
            callable,
            args,
            ..
        } = self;

        let callable = match callable {
            Some(callable) => callable,
            None => {
                let handler = owner
                    .and_then(|widget| registry.lookup(widget))
                    .and_then(|proxy| proxy.owner())
                    .and_then(|object| object.callback(names::ON_TIMER));
                match handler {
                    Some(handler) => handler,
                    None => {
                        tracing::trace!(target: targets::TIMER, ?owner, "timed call has no target");
                        return Ok(ManagedValue::None);
                    }
                }
            }
        };
        invoke(runtime, callable.as_ref(), &args)
    }
}

impl std::fmt::Debug for TimedCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedCall")
            .field("owner", &self.owner)
            .field("has_callable", &self.callable.is_some())
            .field("args", &self.args.len())
            .field("affinity", &self.affinity)
            .finish()
    }
}

/// An entry in the timer queue (min-heap by fire time).
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    id: TimedCallId,
    fire_time: Instant,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_time == other.fire_time
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap (BinaryHeap is max-heap by default).
        other.fire_time.cmp(&self.fire_time)
    }
}

#[derive(Default)]
struct SchedulerInner {
    calls: SlotMap<TimedCallId, TimedCall>,
    queue: BinaryHeap<QueueEntry>,
}

/// Holds every scheduled call until it fires.
///
/// Scheduling is allowed from any thread; taking calls out happens on the UI
/// thread.
pub struct TimedCallScheduler {
    inner: Mutex<SchedulerInner>,
    pump: PumpHandle,
    ui: UiThread,
}

impl TimedCallScheduler {
    pub fn new(pump: PumpHandle, ui: UiThread) -> Self {
        Self {
            inner: Mutex::new(SchedulerInner::default()),
            pump,
            ui,
        }
    }

    /// Schedule `callable(*args)`, or the owner's `on-timer` callback when
    /// `callable` is `None`, to run after `delay`.
    #[tracing::instrument(skip(self, callable, args), target = "horizon_bridge::timer", level = "trace")]
    pub fn schedule(
        &self,
        owner: Option<WidgetId>,
        delay: Duration,
        callable: Option<Arc<dyn ManagedCallable>>,
        args: Vec<ManagedValue>,
    ) -> TimedCallId {
        let mut affinity = ThreadAffinity::current();
        if !affinity.is_ui(&self.ui) {
            affinity.move_to(self.ui.id());
        }
        let call = TimedCall {
            owner,
            callable,
            args,
            affinity,
        };

        let id = {
            let mut inner = self.inner.lock();
            let id = inner.calls.insert(call);
            if !delay.is_zero() {
                inner.queue.push(QueueEntry {
                    id,
                    fire_time: fire_time_after(Instant::now(), delay),
                });
            }
            id
        };

        if delay.is_zero() {
            self.pump.post(PumpEvent::TimedCall { id });
        } else {
            // Let the loop recompute its next deadline.
            self.pump.post(PumpEvent::WakeUp);
        }
        id
    }

    /// Remove a call so it can be fired.
    pub fn take(&self, id: TimedCallId) -> Option<TimedCall> {
        self.inner.lock().calls.remove(id)
    }

    /// Remove every queued call whose fire time has passed, earliest first.
    #[tracing::instrument(skip(self), target = "horizon_bridge::timer", level = "trace")]
    pub fn take_due(&self, now: Instant) -> Vec<(TimedCallId, TimedCall)> {
        let mut inner = self.inner.lock();
        let mut due = Vec::new();
        while let Some(entry) = inner.queue.peek().copied() {
            if entry.fire_time > now {
                break;
            }
            inner.queue.pop();
            if let Some(call) = inner.calls.remove(entry.id) {
                due.push((entry.id, call));
            }
        }
        due
    }

    /// Drop a call without firing it.
    pub fn cancel(&self, id: TimedCallId) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.calls.remove(id);
        if removed.is_some() {
            inner.queue.retain(|entry| entry.id != id);
            tracing::trace!(target: targets::TIMER, ?id, "timed call cancelled");
        }
        removed.is_some()
    }

    /// Drop every call owned by `widget`, returning how many were dropped.
    pub fn cancel_owned_by(&self, widget: WidgetId) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.calls.len();
        inner.calls.retain(|_, call| call.owner != Some(widget));
        let dropped = before - inner.calls.len();
        if dropped > 0 {
            let SchedulerInner { calls, queue } = &mut *inner;
            queue.retain(|entry| calls.contains_key(entry.id));
            tracing::debug!(target: targets::TIMER, ?widget, dropped, "cancelled timed calls of destroyed owner");
        }
        dropped
    }

    pub fn is_pending(&self, id: TimedCallId) -> bool {
        self.inner.lock().calls.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().calls.is_empty()
    }

    /// Number of delayed calls waiting in the timer queue.
    pub fn queued(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Time until the earliest delayed call is due.
    ///
    /// Returns `None` if no delayed call is pending.
    pub fn time_until_next(&self) -> Option<Duration> {
        let mut inner = self.inner.lock();
        while let Some(entry) = inner.queue.peek() {
            if inner.calls.contains_key(entry.id) {
                break;
            }
            inner.queue.pop();
        }
        inner
            .queue
            .peek()
            .map(|entry| entry.fire_time.saturating_duration_since(Instant::now()))
    }
}

fn fire_time_after(now: Instant, delay: Duration) -> Instant {
    let delay = delay.min(MAX_DELAY);
    now.checked_add(delay)
        .or_else(|| now.checked_add(MAX_DELAY / 1000))
        .unwrap_or(now)
}

impl std::fmt::Debug for TimedCallScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedCallScheduler")
            .field("pending", &self.len())
            .finish()
    }
}
