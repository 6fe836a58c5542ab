//! Managed exception reporting.
//!
//! Errors raised by managed callbacks are caught at the invocation boundary
//! and handed to the [`ExceptionFunnel`] as rendered text. On the UI thread
//! the funnel shows the toolkit's blocking exception modal right away;
//! anywhere else the message is posted to the pump and shown on the next
//! iteration.
//!
//! The modal offers "don't show again" (remembered per distinct message for
//! the rest of the process) and "terminate".

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use horizon_bridge_core::UiThread;
use horizon_bridge_core::logging::targets;
use parking_lot::{Mutex, RwLock};

use crate::config::BridgeConfig;
use crate::grab::MouseGrabTracker;
use crate::pump::{PumpEvent, PumpHandle};
use crate::toolkit::NativeToolkit;

/// Messages the user asked never to see again.
static SUPPRESSED: Mutex<Option<HashSet<String>>> = Mutex::new(None);

/// Process-wide deduplication table for exception messages.
pub struct ExceptionRecords;

impl ExceptionRecords {
    pub fn is_suppressed(message: &str) -> bool {
        SUPPRESSED
            .lock()
            .as_ref()
            .is_some_and(|set| set.contains(message))
    }

    /// Remember `message` as suppressed. Returns `false` if it already was.
    pub fn suppress(message: &str) -> bool {
        SUPPRESSED
            .lock()
            .get_or_insert_with(HashSet::new)
            .insert(message.to_string())
    }

    pub fn len() -> usize {
        SUPPRESSED.lock().as_ref().map_or(0, HashSet::len)
    }

    /// Forget every suppression. Intended for tests.
    pub fn reset_suppressions() {
        *SUPPRESSED.lock() = None;
    }
}

/// Called with the exit code when the user chooses to terminate.
pub type Terminator = Arc<dyn Fn(i32) + Send + Sync>;

/// What happened to a reported message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The modal was shown.
    Shown,
    /// The message was suppressed earlier; nothing was shown.
    Suppressed,
    /// The message was posted to the pump.
    Deferred,
}

/// Turns managed errors into user-visible modal reports.
pub struct ExceptionFunnel {
    toolkit: Arc<dyn NativeToolkit>,
    grab: Arc<MouseGrabTracker>,
    pump: PumpHandle,
    ui: UiThread,
    title: String,
    defer_while_pumping: bool,
    showing: AtomicBool,
    pumping: AtomicBool,
    terminator: RwLock<Terminator>,
}

impl ExceptionFunnel {
    pub fn new(
        toolkit: Arc<dyn NativeToolkit>,
        grab: Arc<MouseGrabTracker>,
        pump: PumpHandle,
        ui: UiThread,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            toolkit,
            grab,
            pump,
            ui,
            title: config.exception_title.clone(),
            defer_while_pumping: config.report_off_thread_when_running,
            showing: AtomicBool::new(false),
            pumping: AtomicBool::new(false),
            terminator: RwLock::new(Arc::new(|code| std::process::exit(code))),
        }
    }

    /// Replace the process terminator.
    pub fn set_terminator(&self, terminator: Terminator) {
        *self.terminator.write() = terminator;
    }

    /// True while the exception modal is on screen.
    pub fn is_showing(&self) -> bool {
        self.showing.load(Ordering::Acquire)
    }

    pub(crate) fn set_pumping(&self, pumping: bool) {
        self.pumping.store(pumping, Ordering::Release);
    }

    /// Report a rendered managed error. Callable from any thread.
    pub fn report(&self, message: &str) -> ReportOutcome {
        let immediate = self.ui.is_current()
            && self.toolkit.application_exists()
            && !(self.defer_while_pumping && self.pumping.load(Ordering::Acquire));
        if immediate {
            self.escalate(message)
        } else {
            self.defer(message)
        }
    }

    /// Show the modal for `message` on the UI thread.
    ///
    /// If the modal is already showing, the message is deferred so that the
    /// pump shows it once the current modal closes.
    #[tracing::instrument(skip(self, message), target = "horizon_bridge::exception", level = "trace")]
    pub fn escalate(&self, message: &str) -> ReportOutcome {
        self.ui.debug_assert_current("ExceptionFunnel::escalate");
        tracing::error!(target: targets::EXCEPTION, "{message}");
        if ExceptionRecords::is_suppressed(message) {
            return ReportOutcome::Suppressed;
        }
        if self.showing.swap(true, Ordering::AcqRel) {
            return self.defer(message);
        }

        let choice = {
            let _suspended = self.grab.suspend(self.toolkit.as_ref());
            self.toolkit.show_exception(&self.title, message)
        };
        self.showing.store(false, Ordering::Release);

        if choice.suppress {
            ExceptionRecords::suppress(message);
        }
        if choice.terminate {
            tracing::error!(target: targets::EXCEPTION, "terminating at the user's request");
            self.toolkit.quit();
            let terminator = self.terminator.read().clone();
            terminator(-1);
        }
        ReportOutcome::Shown
    }

    fn defer(&self, message: &str) -> ReportOutcome {
        tracing::debug!(target: targets::EXCEPTION, "deferring exception to the UI thread");
        self.pump.post(PumpEvent::Exception {
            message: message.to_string(),
        });
        ReportOutcome::Deferred
    }
}

impl std::fmt::Debug for ExceptionFunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionFunnel")
            .field("title", &self.title)
            .field("showing", &self.is_showing())
            .finish()
    }
}
