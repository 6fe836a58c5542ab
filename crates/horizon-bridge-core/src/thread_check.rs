//! UI-thread tracking for Horizon Bridge.
//!
//! All widget state and every managed callback dispatched by the bridge
//! lives on a single UI thread. [`UiThread`] records which thread that is;
//! the process-wide copy is set once by `Bridge::install()` and can be
//! queried from anywhere with [`is_ui_thread`].
//!
//! Work that starts elsewhere carries a [`ThreadAffinity`] so it can tell
//! whether it still has to hop onto the UI thread before touching widgets.
//!
//! ```ignore
//! use horizon_bridge_core::thread_check::{is_ui_thread, ThreadAffinity};
//!
//! if is_ui_thread() {
//!     report_now(message);
//! } else {
//!     post_to_ui_thread(message);
//! }
//! ```

use std::sync::OnceLock;
use std::thread::ThreadId;

/// Global storage for the UI thread ID.
static UI_THREAD_ID: OnceLock<ThreadId> = OnceLock::new();

/// Record the calling thread as the process-wide UI thread.
///
/// # Panics
///
/// Panics if a different thread was already recorded.
pub fn set_ui_thread() {
    let current = std::thread::current().id();
    if UI_THREAD_ID.set(current).is_err() && UI_THREAD_ID.get() != Some(&current) {
        panic!(
            "set_ui_thread() called from a different thread than the original. \
             The UI thread can only be set once."
        );
    }
}

/// The process-wide UI thread, if recorded.
#[inline]
pub fn ui_thread_id() -> Option<ThreadId> {
    UI_THREAD_ID.get().copied()
}

/// Check if the current thread is the process-wide UI thread.
///
/// Returns `false` until a UI thread has been recorded: before that there is
/// no thread on which widget work may run.
#[inline]
pub fn is_ui_thread() -> bool {
    UI_THREAD_ID
        .get()
        .is_some_and(|&id| std::thread::current().id() == id)
}

/// Identity of the thread that owns widget state for one bridge instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UiThread {
    id: ThreadId,
}

impl UiThread {
    /// Treat the calling thread as the UI thread.
    pub fn current() -> Self {
        Self {
            id: std::thread::current().id(),
        }
    }

    /// Wrap a known thread id.
    pub fn from_id(id: ThreadId) -> Self {
        Self { id }
    }

    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Returns true when called on this UI thread.
    #[inline]
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.id
    }

    /// Panic in debug builds when called off the UI thread.
    #[inline]
    #[track_caller]
    pub fn debug_assert_current(&self, operation: &str) {
        debug_assert!(
            self.is_current(),
            "{operation} must run on the UI thread ({:?}), called from {:?}",
            self.id,
            std::thread::current().id()
        );
    }
}

/// The thread an object was created on or last moved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadAffinity {
    thread_id: ThreadId,
}

impl ThreadAffinity {
    /// Affinity to the calling thread.
    pub fn current() -> Self {
        Self {
            thread_id: std::thread::current().id(),
        }
    }

    /// Affinity to a specific thread.
    pub fn for_thread(thread_id: ThreadId) -> Self {
        Self { thread_id }
    }

    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Returns true when called on the owning thread.
    #[inline]
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Returns true if this affinity is the given UI thread.
    #[inline]
    pub fn is_ui(&self, ui: &UiThread) -> bool {
        self.thread_id == ui.id()
    }

    /// Change the owning thread.
    pub fn move_to(&mut self, thread_id: ThreadId) {
        self.thread_id = thread_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_thread_identity() {
        let ui = UiThread::current();
        assert!(ui.is_current());
        let off = std::thread::spawn(move || ui.is_current()).join().unwrap();
        assert!(!off);
    }

    #[test]
    fn affinity_moves() {
        let ui = UiThread::current();
        let mut affinity = std::thread::spawn(ThreadAffinity::current).join().unwrap();
        assert!(!affinity.is_current());
        assert!(!affinity.is_ui(&ui));
        affinity.move_to(ui.id());
        assert!(affinity.is_current());
        assert!(affinity.is_ui(&ui));
    }
}
