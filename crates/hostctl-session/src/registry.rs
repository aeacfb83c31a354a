//! Process-wide caller → session mapping.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use hostctl_core::{CallerId, SessionHandle};

/// In-memory session registry.
///
/// Sessions are created lazily, live until cleared and are lost on restart.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<CallerId, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a session already open for each caller.
    #[must_use]
    pub fn with_callers<'a>(callers: impl IntoIterator<Item = &'a CallerId>) -> Self {
        let registry = Self::new();
        for caller in callers {
            registry.get_or_create(caller);
        }
        registry
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<CallerId, Arc<SessionHandle>>> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Return the caller's session, creating it on first use.
    pub fn get_or_create(&self, caller: &CallerId) -> Arc<SessionHandle> {
        let mut sessions = self.lock();
        if let Some(handle) = sessions.get(caller) {
            return Arc::clone(handle);
        }
        let handle = Arc::new(SessionHandle::new(caller.clone()));
        tracing::debug!(caller = %caller, session = %handle.id, "Session created");
        sessions.insert(caller.clone(), Arc::clone(&handle));
        handle
    }

    #[must_use]
    pub fn get(&self, caller: &CallerId) -> Option<Arc<SessionHandle>> {
        self.lock().get(caller).cloned()
    }

    /// Drop the caller's session. Returns whether one existed.
    pub fn clear(&self, caller: &CallerId) -> bool {
        let removed = self.lock().remove(caller).is_some();
        if removed {
            tracing::info!(caller = %caller, "Session cleared");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
