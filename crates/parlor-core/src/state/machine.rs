//! Generic state container with guarded transitions.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{error::StateError, state::State};

/// Transition predicate. `None` in the table means the pair is explicitly
/// unguarded.
pub type Guard = Box<dyn Fn() -> bool + Send + Sync>;

struct MachineInner {
    current: Arc<dyn State>,
    /// `(from_id, to_id)` → optional guard. Pairs absent from the table are
    /// unrestricted: guards are a blacklist, not a whitelist.
    transitions: HashMap<(String, String), Option<Guard>>,
}

/// Thread-safe state container.
///
/// # Invariants
///
/// - The current state is never null: construction installs the initial
///   state and runs its `on_enter` exactly once.
/// - Every successful [`StateMachine::change_state`] runs `on_exit` on the
///   outgoing state, then `on_enter` on the incoming one. A rejected
///   transition runs neither and leaves the current state unchanged.
/// - Hooks run while the machine's write lock is held, which serializes
///   transitions. States must not re-enter the machine synchronously from
///   inside `on_enter`/`on_exit`.
pub struct StateMachine {
    inner: RwLock<MachineInner>,
}

impl StateMachine {
    /// Install `initial` and run its `on_enter`.
    pub fn new(initial: Arc<dyn State>) -> Self {
        initial.on_enter();
        Self {
            inner: RwLock::new(MachineInner { current: initial, transitions: HashMap::new() }),
        }
    }

    /// Transition to `next`.
    ///
    /// Looks up the guard for `(current.id, next.id)`; a present guard that
    /// returns false rejects the transition with no side effects.
    ///
    /// # Errors
    ///
    /// `StateError::TransitionNotAllowed` on guard rejection.
    pub fn change_state(&self, next: Arc<dyn State>) -> Result<(), StateError> {
        let mut inner = self.write();

        let from = inner.current.id().to_string();
        let to = next.id().to_string();

        if let Some(Some(guard)) = inner.transitions.get(&(from.clone(), to.clone())) {
            if !guard() {
                return Err(StateError::TransitionNotAllowed { from, to });
            }
        }

        inner.current.on_exit();
        inner.current = next;
        inner.current.on_enter();

        Ok(())
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> Arc<dyn State> {
        self.read().current.clone()
    }

    /// Id of the current state.
    pub fn current_id(&self) -> String {
        self.read().current.id().to_string()
    }

    /// Install a guard for the `(from, to)` pair. `None` means the pair is
    /// explicitly always allowed (same as being absent).
    pub fn add_transition(&self, from: &str, to: &str, guard: Option<Guard>) {
        self.write().transitions.insert((from.to_string(), to.to_string()), guard);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MachineInner> {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MachineInner> {
        self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine").field("current", &self.current_id()).finish()
    }
}
