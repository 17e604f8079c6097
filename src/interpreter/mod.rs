//! Interpreter lifecycle and global interpreter lock management
//!
//! Design: a typed layer over the handful of lifecycle and lock entry points.
//! - Startup is run-once and guarded; a second `initialize` is an error
//! - Lock states and thread tokens are `!Send`, so they cannot leave the
//!   thread that acquired them
//! - Release order is checked against a per-thread stack before the native
//!   release runs
//! - States and tokens are tagged with the runtime that issued them and are
//!   refused by any other
//!
//! # Precondition
//!
//! Every entry point that reads or writes interpreter-owned state (objects,
//! error state, reference counts) must be called by a thread that holds the
//! interpreter lock. This layer does not detect violations; the native
//! runtime's behaviour is then undefined.


use crate::dispatch::{CallDispatcher, CallError};
use crate::marshal::{NativeAddress, Value};
use core::marker::PhantomData;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Observable interpreter state, as seen from the calling thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterState {
    Uninitialized,
    /// Running; this thread has no outstanding lock state or thread token
    Initialized,
    /// This thread saved its thread state and gave up the lock
    ThreadStateReleased,
    /// This thread holds at least one `ensure`d lock state
    ThreadStateHeld,
    Finalized,
}

/// How `initialize` brought the interpreter up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// This layer started the runtime
    Started,
    /// The host had already started it; adopted as-is
    Adopted,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    #[error("interpreter is already initialized")]
    AlreadyInitialized,

    #[error("interpreter is not initialized")]
    NotInitialized,

    #[error("interpreter has been finalized and cannot be restarted")]
    Finalized,

    #[error("`{entry}` returned {found}, not the declared kind")]
    UnexpectedReturn {
        entry: &'static str,
        found: &'static str,
    },

    #[error("{leaked} lock state(s) left unreleased inside a scoped section were unwound")]
    Unbalanced { leaked: usize },

    #[error("thread token was issued by another runtime")]
    ForeignToken,

    #[error(transparent)]
    Call(#[from] CallError),
}

/// Lock release misuse; the state is handed back when it was not consumed
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("lock state {} released out of order; state {expected} is more recent", .state.id)]
    OutOfOrder { state: GilState, expected: u64 },

    #[error("lock state {} is not held by this thread", .0.id)]
    NotHeld(GilState),

    #[error(transparent)]
    Call(#[from] CallError),
}

impl ReleaseError {
    /// Recover the unreleased state so it can be released correctly
    pub fn into_state(self) -> Option<GilState> {
        match self {
            Self::OutOfOrder { state, .. } | Self::NotHeld(state) => Some(state),
            Self::Call(_) => None,
        }
    }
}

/// Resumption token from `save_thread`; consumed by `restore_thread`
#[derive(Debug)]
#[must_use = "a saved thread state must be restored"]
pub struct ThreadToken {
    thread_state: NativeAddress,
    owner: u64,
    _not_send: PhantomData<*const ()>,
}

impl ThreadToken {
    pub fn thread_state(&self) -> NativeAddress {
        self.thread_state
    }
}

/// Lock state from `ensure`; consumed by `release`
#[derive(Debug)]
#[must_use = "an ensured lock state must be released"]
pub struct GilState {
    id: u64,
    owner: u64,
    native: i32,
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl GilState {
    /// Native `PyGILState_STATE` value
    pub fn native(&self) -> i32 {
        self.native
    }

    /// Nesting depth on this thread when acquired (1 = outermost)
    pub fn depth(&self) -> usize {
        self.depth
    }
}

const UNINITIALIZED: u8 = 0;
const INITIALIZED: u8 = 1;
const FINALIZED: u8 = 2;

static NEXT_STATE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_LIFECYCLE_ID: AtomicU64 = AtomicU64::new(1);

/// One outstanding `ensure` on this thread
#[derive(Debug, Clone, Copy)]
struct Held {
    owner: u64,
    id: u64,
    native: i32,
}

thread_local! {
    static HELD: RefCell<Vec<Held>> = const { RefCell::new(Vec::new()) };
    // Owner of each outstanding thread token
    static SAVED: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Process-wide lifecycle phase, owned by the runtime
#[derive(Debug)]
pub(crate) struct Lifecycle {
    id: u64,
    phase: AtomicU8,
    transition: Mutex<()>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_LIFECYCLE_ID.fetch_add(1, Ordering::Relaxed),
            phase: AtomicU8::new(UNINITIALIZED),
            transition: Mutex::new(()),
        }
    }

    fn phase(&self) -> u8 {
        self.phase.load(Ordering::Acquire)
    }
}

/// Lifecycle and lock operations over a runtime's dispatcher
#[derive(Debug, Clone, Copy)]
pub struct Interpreter<'rt> {
    dispatcher: &'rt CallDispatcher,
    lifecycle: &'rt Lifecycle,
}

impl<'rt> Interpreter<'rt> {
    pub(crate) fn new(dispatcher: &'rt CallDispatcher, lifecycle: &'rt Lifecycle) -> Self {
        Self { dispatcher, lifecycle }
    }

    /// Bring the interpreter up, once
    ///
    /// If the host process already started the runtime it is adopted without
    /// a second `Py_Initialize`.
    pub fn initialize(&self) -> Result<Startup, LifecycleError> {
        let _guard = self.lifecycle.transition.lock();

        match self.lifecycle.phase() {
            INITIALIZED => return Err(LifecycleError::AlreadyInitialized),
            FINALIZED => return Err(LifecycleError::Finalized),
            _ => {}
        }

        let startup = if self.int_call("Py_IsInitialized", &[])? != 0 {
            info!(event = "interpreter_adopted", "interpreter already running, adopting");
            Startup::Adopted
        } else {
            self.dispatcher.invoke("Py_Initialize", &[])?;
            info!(event = "interpreter_initialized", "interpreter started");
            Startup::Started
        };

        self.lifecycle.phase.store(INITIALIZED, Ordering::Release);
        Ok(startup)
    }

    /// Shut the interpreter down, returning the native status code
    ///
    /// The calling thread must hold the lock. No restart is allowed afterwards.
    pub fn finalize(&self) -> Result<i64, LifecycleError> {
        let _guard = self.lifecycle.transition.lock();
        self.require_initialized()?;

        let status = self.int_call("Py_FinalizeEx", &[])?;
        self.lifecycle.phase.store(FINALIZED, Ordering::Release);

        info!(event = "interpreter_finalized", status, "interpreter finalized");
        Ok(status)
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle.phase() == INITIALIZED
    }

    /// State of the interpreter from this thread's point of view
    pub fn state(&self) -> InterpreterState {
        match self.lifecycle.phase() {
            UNINITIALIZED => InterpreterState::Uninitialized,
            FINALIZED => InterpreterState::Finalized,
            _ if self.held_here() > 0 => InterpreterState::ThreadStateHeld,
            _ if SAVED.with(|saved| saved.borrow().contains(&self.lifecycle.id)) => {
                InterpreterState::ThreadStateReleased
            }
            _ => InterpreterState::Initialized,
        }
    }

    /// Release the lock and detach this thread's state
    pub fn save_thread(&self) -> Result<ThreadToken, LifecycleError> {
        self.require_initialized()?;

        let ret = self.dispatcher.invoke("PyEval_SaveThread", &[])?;
        let thread_state = ret.as_address().ok_or(LifecycleError::UnexpectedReturn {
            entry: "PyEval_SaveThread",
            found: ret.kind_name(),
        })?;

        SAVED.with(|saved| saved.borrow_mut().push(self.lifecycle.id));
        debug!(event = "thread_saved", thread_state = %thread_state, "thread state saved, lock released");

        Ok(ThreadToken {
            thread_state,
            owner: self.lifecycle.id,
            _not_send: PhantomData,
        })
    }

    /// Reacquire the lock and reattach the saved thread state
    pub fn restore_thread(&self, token: ThreadToken) -> Result<(), LifecycleError> {
        self.require_initialized()?;
        if token.owner != self.lifecycle.id {
            return Err(LifecycleError::ForeignToken);
        }

        self.dispatcher
            .invoke("PyEval_RestoreThread", &[Value::Address(token.thread_state)])?;

        SAVED.with(|saved| {
            let mut saved = saved.borrow_mut();
            if let Some(pos) = saved.iter().rposition(|&owner| owner == token.owner) {
                saved.remove(pos);
            }
        });
        debug!(event = "thread_restored", thread_state = %token.thread_state, "thread state restored");
        Ok(())
    }

    /// Acquire the lock for this thread; re-entrant
    ///
    /// May block until the lock is available. There is no timeout.
    pub fn ensure(&self) -> Result<GilState, LifecycleError> {
        self.require_initialized()?;

        // Native enum values are 0 and 1
        let native = self.int_call("PyGILState_Ensure", &[])? as i32;
        let id = NEXT_STATE_ID.fetch_add(1, Ordering::Relaxed);
        let owner = self.lifecycle.id;
        let depth = HELD.with(|held| {
            let mut held = held.borrow_mut();
            held.push(Held { owner, id, native });
            held.len()
        });

        trace!(event = "gil_ensure", state = id, depth, "lock state acquired");

        Ok(GilState {
            id,
            owner,
            native,
            depth,
            _not_send: PhantomData,
        })
    }

    /// Release a state from `ensure`; must be this thread's most recent one
    ///
    /// Order violations are rejected before any native call and the state
    /// is returned inside the error.
    pub fn release(&self, state: GilState) -> Result<(), ReleaseError> {
        if state.owner != self.lifecycle.id {
            return Err(ReleaseError::NotHeld(state));
        }

        let top = HELD.with(|held| held.borrow().last().copied());

        match top {
            Some(top) if top.id == state.id => {}
            Some(top) if is_held(state.id) => {
                return Err(ReleaseError::OutOfOrder { state, expected: top.id });
            }
            _ => return Err(ReleaseError::NotHeld(state)),
        }

        self.release_top(state.id, state.native)?;
        Ok(())
    }

    /// Run `f` with the lock held, releasing it afterwards
    ///
    /// The lock is released even if `f` panics. States that `f` ensured and
    /// left outstanding are released first, newest first, and reported as
    /// [`LifecycleError::Unbalanced`].
    pub fn with_gil<R>(&self, f: impl FnOnce(&Self) -> R) -> Result<R, LifecycleError> {
        let scope = ScopedGil {
            interpreter: self,
            state: Some(self.ensure()?),
        };

        let result = f(self);

        match scope.finish()? {
            0 => Ok(result),
            leaked => Err(LifecycleError::Unbalanced { leaked }),
        }
    }

    /// Whether the native runtime reports this thread as holding the lock
    pub fn holds_gil(&self) -> Result<bool, LifecycleError> {
        self.require_initialized()?;
        Ok(self.int_call("PyGILState_Check", &[])? != 0)
    }

    /// Release `state` and every state ensured above it on this thread
    ///
    /// Returns how many states above `state` had to be released.
    fn unwind_to(&self, state: GilState) -> Result<usize, CallError> {
        let mut leaked = 0;

        while let Some(top) = HELD.with(|held| held.borrow().last().copied()) {
            if top.id == state.id {
                self.release_top(top.id, top.native)?;
                break;
            }
            if !is_held(state.id) {
                break;
            }

            leaked += 1;
            if top.owner == self.lifecycle.id {
                warn!(event = "gil_unwind", state = top.id, "releasing lock state left outstanding");
                self.release_top(top.id, top.native)?;
            } else {
                warn!(event = "gil_unwind", state = top.id, "dropping lock state of another runtime");
                HELD.with(|held| held.borrow_mut().pop());
            }
        }

        Ok(leaked)
    }

    /// Native release of this thread's most recent state, then pop it
    fn release_top(&self, id: u64, native: i32) -> Result<(), CallError> {
        self.dispatcher
            .invoke("PyGILState_Release", &[Value::Int(native.into())])?;

        let depth = HELD.with(|held| {
            let mut held = held.borrow_mut();
            held.pop();
            held.len()
        });

        trace!(event = "gil_release", state = id, depth, "lock state released");
        Ok(())
    }

    fn held_here(&self) -> usize {
        HELD.with(|held| {
            held.borrow()
                .iter()
                .filter(|entry| entry.owner == self.lifecycle.id)
                .count()
        })
    }

    fn require_initialized(&self) -> Result<(), LifecycleError> {
        match self.lifecycle.phase() {
            INITIALIZED => Ok(()),
            FINALIZED => Err(LifecycleError::Finalized),
            _ => Err(LifecycleError::NotInitialized),
        }
    }

    fn int_call(&self, entry: &'static str, args: &[Value]) -> Result<i64, LifecycleError> {
        let ret = self.dispatcher.invoke(entry, args)?;
        ret.as_int().ok_or(LifecycleError::UnexpectedReturn {
            entry,
            found: ret.kind_name(),
        })
    }
}

/// Outstanding `ensure`d states on the calling thread
pub fn gil_depth() -> usize {
    HELD.with(|held| held.borrow().len())
}

fn is_held(id: u64) -> bool {
    HELD.with(|held| held.borrow().iter().any(|entry| entry.id == id))
}

/// Scoped lock state for `with_gil`; releases on drop, including unwind
struct ScopedGil<'a, 'rt> {
    interpreter: &'a Interpreter<'rt>,
    state: Option<GilState>,
}

impl ScopedGil<'_, '_> {
    fn finish(mut self) -> Result<usize, LifecycleError> {
        match self.state.take() {
            Some(state) => Ok(self.interpreter.unwind_to(state)?),
            None => Ok(0),
        }
    }
}

impl Drop for ScopedGil<'_, '_> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            if let Err(e) = self.interpreter.unwind_to(state) {
                warn!(event = "gil_unwind_failed", error = %e, "lock state not released");
            }
        }
    }
}
