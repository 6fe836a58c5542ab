//! Managed runtime abstraction.
//!
//! The bridge never talks to a scripting runtime directly. A runtime adapter
//! implements [`ManagedRuntime`] (the execution lock), and hands managed
//! objects and callables across as [`ManagedObject`] / [`ManagedCallable`]
//! trait objects.
//!
//! Every invocation of managed code goes through [`invoke`], which holds an
//! [`ExecutionGuard`] for the duration of the call and converts panics raised
//! by the adapter into [`ManagedError`]s so nothing unwinds into native code.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::{Condvar, Mutex};

use crate::error::ManagedError;
use crate::logging::targets;
use crate::values::ManagedValue;

/// A managed object reachable from native code.
pub trait ManagedObject: Send + Sync {
    /// Managed class name.
    fn type_name(&self) -> &str;

    /// Read an attribute; `None` when absent.
    fn attr(&self, name: &str) -> Option<ManagedValue>;

    /// Resolve a bound callback method by name.
    fn callback(&self, name: &str) -> Option<Arc<dyn ManagedCallable>>;
}

/// A managed callable.
pub trait ManagedCallable: Send + Sync {
    fn call(&self, args: &[ManagedValue]) -> Result<ManagedValue, ManagedError>;
}

impl<F> ManagedCallable for F
where
    F: Fn(&[ManagedValue]) -> Result<ManagedValue, ManagedError> + Send + Sync,
{
    fn call(&self, args: &[ManagedValue]) -> Result<ManagedValue, ManagedError> {
        self(args)
    }
}

/// The managed runtime's execution lock.
///
/// `acquire_execution` must be reentrant for the thread that already holds
/// the lock: managed code may call into native code that synchronously
/// dispatches another event back into managed code.
pub trait ManagedRuntime: Send + Sync {
    fn acquire_execution(&self);

    fn release_execution(&self);
}

/// Scoped ownership of the managed execution lock.
///
/// Released on drop, including during unwinding.
#[must_use = "the execution lock is released as soon as the guard is dropped"]
pub struct ExecutionGuard<'a> {
    runtime: &'a dyn ManagedRuntime,
}

impl<'a> ExecutionGuard<'a> {
    pub fn acquire(runtime: &'a dyn ManagedRuntime) -> Self {
        runtime.acquire_execution();
        Self { runtime }
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.runtime.release_execution();
    }
}

/// Invoke a managed callable under the execution lock.
///
/// Panics escaping the callable are caught and rendered as a
/// `InternalError` managed error.
pub fn invoke(
    runtime: &dyn ManagedRuntime,
    callable: &dyn ManagedCallable,
    args: &[ManagedValue],
) -> Result<ManagedValue, ManagedError> {
    let _guard = ExecutionGuard::acquire(runtime);
    match panic::catch_unwind(AssertUnwindSafe(|| callable.call(args))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(target: targets::RUNTIME, %message, "managed callable panicked");
            Err(ManagedError::new("InternalError", message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in managed callable".to_string()
    }
}

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// A reentrant exclusivity token, usable as the execution lock of a
/// free-threaded runtime adapter.
#[derive(Debug, Default)]
pub struct ExecutionLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl ExecutionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recursion depth held by the calling thread; 0 if it does not hold the lock.
    pub fn held_depth(&self) -> usize {
        let state = self.state.lock();
        if state.owner == Some(std::thread::current().id()) {
            state.depth
        } else {
            0
        }
    }

    /// Returns true if any thread holds the lock.
    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }
}

impl ManagedRuntime for ExecutionLock {
    fn acquire_execution(&self) {
        let me = std::thread::current().id();
        let mut state = self.state.lock();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    return;
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    return;
                }
                Some(_) => self.released.wait(&mut state),
            }
        }
    }

    fn release_execution(&self) {
        let mut state = self.state.lock();
        if state.owner != Some(std::thread::current().id()) {
            tracing::error!(target: targets::RUNTIME, "execution lock released by a thread that does not hold it");
            return;
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
    }
}
