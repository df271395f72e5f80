//! Process-wide named one-shot initialization gates.
//!
//! The compiler runtime is expensive to set up and shared by every session in
//! the process. Each runtime gets a named [`Gate`]; the first caller runs the
//! initializer while later callers block on a condition variable until it is
//! done.
//!
//! ```text
//! Uninitialized ──first caller──▶ Initializing ──ok──▶ Ready
//!        ▲                              │
//!        └────────err / panic───────────┘   (waiters wake, next caller retries)
//! ```

use std::sync::{Arc, LazyLock};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

/// State of a single gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Nobody has run the initializer successfully yet.
    Uninitialized,
    /// A caller is running the initializer right now.
    Initializing,
    /// The initializer completed successfully.
    Ready,
}

/// A one-shot initialization gate.
pub struct Gate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    /// Create an uninitialized gate.
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Uninitialized),
            changed: Condvar::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> GateState {
        *self.state.lock()
    }

    /// Run `init` unless it already succeeded, waiting if another caller is
    /// running it.
    ///
    /// On success every caller returns `Ok` only after the gate is ready. If
    /// `init` fails or panics the gate goes back to uninitialized and one of
    /// the waiters takes over. The error (or panic) stays with the caller
    /// that ran it.
    pub fn ensure_initialized<E>(&self, init: impl FnOnce() -> Result<(), E>) -> Result<(), E> {
        {
            let mut state = self.state.lock();
            loop {
                match *state {
                    GateState::Ready => return Ok(()),
                    GateState::Initializing => self.changed.wait(&mut state),
                    GateState::Uninitialized => {
                        *state = GateState::Initializing;
                        break;
                    }
                }
            }
        }

        let mut guard = InitGuard {
            gate: self,
            outcome: GateState::Uninitialized,
        };
        let result = init();
        if result.is_ok() {
            guard.outcome = GateState::Ready;
        }
        drop(guard);
        result
    }
}

/// Publishes the outcome of a running initializer, including when it
/// unwinds, so waiters never block on a dead `Initializing` state.
struct InitGuard<'a> {
    gate: &'a Gate,
    outcome: GateState,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        *self.gate.state.lock() = self.outcome;
        self.gate.changed.notify_all();
    }
}

/// Registry of named gates, shared by the whole process.
static GATES: LazyLock<Mutex<FxHashMap<String, Arc<Gate>>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

/// Get (or create) the gate registered under `key`.
pub fn gate(key: &str) -> Arc<Gate> {
    let mut gates = GATES.lock();
    gates
        .entry(key.to_string())
        .or_insert_with(|| Arc::new(Gate::new()))
        .clone()
}

/// Run `init` exactly once per process for `key`.
///
/// ```
/// use virtual_bundler::gate::ensure_initialized;
///
/// let result: Result<(), ()> = ensure_initialized("doc-example", || Ok(()));
/// assert!(result.is_ok());
/// ```
pub fn ensure_initialized<E>(key: &str, init: impl FnOnce() -> Result<(), E>) -> Result<(), E> {
    let gate = gate(key);
    gate.ensure_initialized(init)
}

/// Whether the gate for `key` is ready.
pub fn is_initialized(key: &str) -> bool {
    GATES
        .lock()
        .get(key)
        .is_some_and(|g| g.state() == GateState::Ready)
}
