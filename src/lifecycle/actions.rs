//! Cleanup actions and the LIFO stack that holds them.
//!
//! # Responsibilities
//! - Pair a callback with its argument into a single owned action
//! - Keep actions in strict last-in-first-out order
//! - Serialize concurrent push/pop behind one mutex
//!
//! # Design Decisions
//! - The argument type is generic at the call site and erased inside the action,
//!   so one stack can hold heterogeneous payloads
//! - Draining releases the lock before each action runs

use std::any::Any;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Object-safe view of a routine together with its typed argument.
trait BoundRoutine: Send {
    fn arg(&self) -> &dyn Any;
    fn run(self: Box<Self>);
}

struct Bound<A, F> {
    routine: F,
    arg: A,
}

impl<A, F> BoundRoutine for Bound<A, F>
where
    A: Send + 'static,
    F: FnOnce(A) + Send + 'static,
{
    fn arg(&self) -> &dyn Any {
        &self.arg
    }

    fn run(self: Box<Self>) {
        let Bound { routine, arg } = *self;
        routine(arg);
    }
}

/// A callback bound to the argument it will be invoked with.
pub struct CleanupAction {
    bound: Box<dyn BoundRoutine>,
    arg_type: &'static str,
}

impl CleanupAction {
    /// Bind `routine` to `arg`. The routine runs at most once.
    pub fn new<A, F>(routine: F, arg: A) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) + Send + 'static,
    {
        Self {
            bound: Box::new(Bound { routine, arg }),
            arg_type: std::any::type_name::<A>(),
        }
    }

    /// Borrow the argument if it has type `A`.
    pub fn argument<A: 'static>(&self) -> Option<&A> {
        self.bound.arg().downcast_ref::<A>()
    }

    /// Type name of the bound argument.
    pub fn argument_type(&self) -> &'static str {
        self.arg_type
    }

    /// Invoke the callback with its argument, consuming the action.
    pub fn run(self) {
        self.bound.run();
    }
}

impl fmt::Debug for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupAction")
            .field("arg_type", &self.arg_type)
            .finish_non_exhaustive()
    }
}

/// Thread-safe LIFO stack of cleanup actions.
#[derive(Debug, Default)]
pub struct ActionStack {
    actions: Mutex<Vec<CleanupAction>>,
}

impl ActionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an action onto the top of the stack.
    pub fn push(&self, action: CleanupAction) {
        self.lock().push(action);
    }

    /// Push unless `closed()` reports true, deciding under the stack lock.
    ///
    /// A rejected action is handed back. Because the check and the push are
    /// one critical section, a push either lands before a concurrent `drain`
    /// finishes (and is run by it) or observes `closed`.
    pub(crate) fn push_unless(
        &self,
        action: CleanupAction,
        closed: impl FnOnce() -> bool,
    ) -> Result<(), CleanupAction> {
        let mut actions = self.lock();
        if closed() {
            return Err(action);
        }
        actions.push(action);
        Ok(())
    }

    /// Remove and return the most recently pushed action.
    pub fn pop(&self) -> Option<CleanupAction> {
        self.lock().pop()
    }

    /// Pop unless `closed()` reports true, deciding under the stack lock.
    ///
    /// `Err(())` means the pop was refused; `Ok(None)` means the stack was empty.
    pub(crate) fn pop_unless(
        &self,
        closed: impl FnOnce() -> bool,
    ) -> Result<Option<CleanupAction>, ()> {
        let mut actions = self.lock();
        if closed() {
            return Err(());
        }
        Ok(actions.pop())
    }

    /// Number of actions currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Pop and run actions one at a time until the stack is empty.
    ///
    /// Returns the number of actions that ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        // `pop` drops the guard before the action runs.
        while let Some(action) = self.pop() {
            tracing::trace!(arg_type = action.argument_type(), "Running cleanup action");
            action.run();
            ran += 1;
        }
        ran
    }

    // Every mutation is a single push or pop, so a poisoned Vec is still consistent.
    fn lock(&self) -> MutexGuard<'_, Vec<CleanupAction>> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
