//! Session-scoped state and per-session invocation locks.
//!
//! Handlers reach session state only through a [`SessionHandle`] the binder
//! injects; there is no ambient session. Methods that mutate session state
//! can ask the dispatcher to serialise their invocations per session through
//! [`SessionLocks`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Errors raised by session storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A thread panicked while holding the store lock.
    #[error("session store lock poisoned")]
    Poisoned,
}

/// Key/value storage partitioned by session identifier.
pub trait SessionStore: Send + Sync {
    /// Reads the value stored under `key`.
    fn get(&self, session: &str, key: &str) -> Result<Option<Value>, SessionError>;

    /// Stores `value` under `key`, returning the previous value.
    fn put(&self, session: &str, key: &str, value: Value) -> Result<Option<Value>, SessionError>;

    /// Removes the value stored under `key`.
    fn remove(&self, session: &str, key: &str) -> Result<Option<Value>, SessionError>;
}

/// Session store held in process memory.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> Result<MutexGuard<'_, HashMap<String, HashMap<String, Value>>>, SessionError> {
        self.sessions.lock().map_err(|_| SessionError::Poisoned)
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, session: &str, key: &str) -> Result<Option<Value>, SessionError> {
        Ok(self
            .sessions()?
            .get(session)
            .and_then(|values| values.get(key))
            .cloned())
    }

    fn put(&self, session: &str, key: &str, value: Value) -> Result<Option<Value>, SessionError> {
        Ok(self
            .sessions()?
            .entry(session.to_owned())
            .or_default()
            .insert(key.to_owned(), value))
    }

    fn remove(&self, session: &str, key: &str) -> Result<Option<Value>, SessionError> {
        let mut sessions = self.sessions()?;
        let Some(values) = sessions.get_mut(session) else {
            return Ok(None);
        };
        let removed = values.remove(key);
        if values.is_empty() {
            sessions.remove(session);
        }
        Ok(removed)
    }
}

/// A session bound to its store, as injected into handlers.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SessionHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl PartialEq for SessionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.store, &other.store)
    }
}

impl SessionHandle {
    /// Binds a session identifier to a store.
    pub fn new(id: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            id: id.into(),
            store,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Reads a value from this session.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn get(&self, key: &str) -> Result<Option<Value>, SessionError> {
        self.store.get(&self.id, key)
    }

    /// Writes a value into this session.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn put(&self, key: &str, value: Value) -> Result<Option<Value>, SessionError> {
        self.store.put(&self.id, key, value)
    }

    /// Removes a value from this session.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn remove(&self, key: &str) -> Result<Option<Value>, SessionError> {
        self.store.remove(&self.id, key)
    }
}

/// One mutex per live session identifier.
///
/// Entries hold weak references: a lock lives only while some invocation
/// holds it, and dead entries are pruned on the next acquisition.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl SessionLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `session`, creating it on demand.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Poisoned`] if the table lock is poisoned.
    pub fn lock_for(&self, session: &str) -> Result<Arc<Mutex<()>>, SessionError> {
        let mut locks = self.locks.lock().map_err(|_| SessionError::Poisoned)?;
        if let Some(existing) = locks.get(session).and_then(Weak::upgrade) {
            return Ok(existing);
        }
        let before = locks.len();
        locks.retain(|_, lock| lock.strong_count() > 0);
        let pruned = before.saturating_sub(locks.len());
        if pruned > 0 {
            debug!(target: SESSION_TARGET, pruned, "pruned idle session locks");
        }
        let lock = Arc::new(Mutex::new(()));
        locks.insert(session.to_owned(), Arc::downgrade(&lock));
        Ok(lock)
    }

    /// Number of entries currently in the table, live or not.
    pub fn len(&self) -> usize {
        self.locks.lock().map_or(0, |locks| locks.len())
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;

    #[fixture]
    fn store() -> Arc<dyn SessionStore> {
        Arc::new(InMemorySessionStore::new())
    }

    #[rstest]
    fn sessions_are_isolated(store: Arc<dyn SessionStore>) {
        let alice = SessionHandle::new("alice", Arc::clone(&store));
        let bob = SessionHandle::new("bob", store);
        alice.put("cart", json!(["tea"])).expect("put");
        assert_eq!(alice.get("cart").expect("get"), Some(json!(["tea"])));
        assert_eq!(bob.get("cart").expect("get"), None);
    }

    #[rstest]
    fn remove_returns_previous_value(store: Arc<dyn SessionStore>) {
        let handle = SessionHandle::new("s1", store);
        handle.put("k", json!(1)).expect("put");
        assert_eq!(handle.remove("k").expect("remove"), Some(json!(1)));
        assert_eq!(handle.get("k").expect("get"), None);
    }

    #[test]
    fn same_session_shares_a_lock_while_held() {
        let locks = SessionLocks::new();
        let first = locks.lock_for("s1").expect("lock");
        let second = locks.lock_for("s1").expect("lock");
        assert!(Arc::ptr_eq(&first, &second));
        let other = locks.lock_for("s2").expect("lock");
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn idle_locks_are_pruned() {
        let locks = SessionLocks::new();
        drop(locks.lock_for("s1").expect("lock"));
        drop(locks.lock_for("s2").expect("lock"));
        let _held = locks.lock_for("s3").expect("lock");
        assert_eq!(locks.len(), 1);
    }
}
