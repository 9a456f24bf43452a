//! Session Registry
//!
//! Process-wide bookkeeping of live bridge sessions. Each record is owned by
//! exactly one bridge through a [`SessionGuard`]; the guard removes the record
//! when the bridge tears down, on every exit path.

use crate::ws::mode::SessionPlan;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Lifecycle of a bridge session. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionState {
    AwaitingConfig = 0,
    Active = 1,
    Draining = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::AwaitingConfig,
            1 => SessionState::Active,
            2 => SessionState::Draining,
            _ => SessionState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::AwaitingConfig => "awaiting_config",
            SessionState::Active => "active",
            SessionState::Draining => "draining",
            SessionState::Closed => "closed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Session capacity of {0} reached")]
    CapacityExhausted(usize),
    #[error("Session {0} is already registered")]
    DuplicateId(Uuid),
}

#[derive(Debug)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user: String,
    pub created_at: DateTime<Utc>,
    state: AtomicU8,
    plan: OnceLock<SessionPlan>,
}

impl SessionRecord {
    fn new(id: Uuid, user: &str) -> Self {
        Self {
            id,
            user: user.to_string(),
            created_at: Utc::now(),
            state: AtomicU8::new(SessionState::AwaitingConfig as u8),
            plan: OnceLock::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves the session to `next` if that is a forward step.
    /// Returns whether the state changed.
    pub fn advance(&self, next: SessionState) -> bool {
        let target = next as u8;
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current >= target {
                return false;
            }
            match self.state.compare_exchange(
                current,
                target,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// The resolved plan, once configuration is done.
    pub fn plan(&self) -> Option<&SessionPlan> {
        self.plan.get()
    }

    fn set_plan(&self, plan: SessionPlan) -> bool {
        self.plan.set(plan).is_ok()
    }
}

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<SessionRecord>>,
    capacity: usize,
    reserved: AtomicUsize,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            capacity,
            reserved: AtomicUsize::new(0),
        }
    }

    /// Registers a new session with a fresh id.
    pub fn create(self: &Arc<Self>, user: &str) -> Result<SessionGuard, RegistryError> {
        self.create_with_id(Uuid::new_v4(), user)
    }

    fn create_with_id(self: &Arc<Self>, id: Uuid, user: &str) -> Result<SessionGuard, RegistryError> {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .map_err(|_| RegistryError::CapacityExhausted(self.capacity))?;

        let record = Arc::new(SessionRecord::new(id, user));
        match self.sessions.entry(id) {
            Entry::Occupied(_) => {
                self.reserved.fetch_sub(1, Ordering::AcqRel);
                return Err(RegistryError::DuplicateId(id));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&record));
            }
        }
        info!(session_id = %id, user, "Session registered");
        Ok(SessionGuard {
            registry: Arc::clone(self),
            record,
            released: AtomicBool::new(false),
        })
    }

    /// Removes a session. Returns false if it was already gone.
    pub fn destroy(&self, id: &Uuid) -> bool {
        match self.sessions.remove(id) {
            Some((_, record)) => {
                record.advance(SessionState::Closed);
                self.reserved.fetch_sub(1, Ordering::AcqRel);
                debug!(session_id = %id, "Session removed from registry");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<SessionRecord>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of registered sessions per lifecycle state.
    pub fn stats(&self) -> BTreeMap<SessionState, usize> {
        let mut stats = BTreeMap::new();
        for entry in self.sessions.iter() {
            *stats.entry(entry.value().state()).or_insert(0) += 1;
        }
        stats
    }
}

/// Exclusive handle on one registered session.
///
/// Dropping the guard tears the session down.
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    record: Arc<SessionRecord>,
    released: AtomicBool,
}

impl SessionGuard {
    pub fn id(&self) -> Uuid {
        self.record.id
    }

    pub fn state(&self) -> SessionState {
        self.record.state()
    }

    pub fn advance(&self, next: SessionState) -> bool {
        let changed = self.record.advance(next);
        if changed {
            info!(session_id = %self.record.id, state = next.as_str(), "Session state changed");
        }
        changed
    }

    pub fn set_plan(&self, plan: SessionPlan) -> bool {
        self.record.set_plan(plan)
    }

    /// Marks the session closed and removes it from the registry.
    /// Only the first call has any effect.
    pub fn teardown(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.record.advance(SessionState::Closed);
        self.registry.destroy(&self.record.id);
        info!(session_id = %self.record.id, "Session torn down");
        true
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(capacity: usize) -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(capacity))
    }

    #[test]
    fn test_create_registers_unique_sessions() {
        let registry = registry(8);
        let a = registry.create("rep-1").unwrap();
        let b = registry.create("rep-1").unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);
        let record = registry.get(&a.id()).unwrap();
        assert_eq!(record.user, "rep-1");
        assert_eq!(record.state(), SessionState::AwaitingConfig);
        assert!(record.plan().is_none());
    }

    #[test]
    fn test_capacity_is_enforced_and_released() {
        let registry = registry(1);
        let first = registry.create("a").unwrap();
        assert!(matches!(
            registry.create("b"),
            Err(RegistryError::CapacityExhausted(1))
        ));
        drop(first);
        assert!(registry.create("b").is_ok());
    }

    #[test]
    fn test_duplicate_id_is_rejected_without_leaking_capacity() {
        let registry = registry(2);
        let id = Uuid::new_v4();
        let _guard = registry.create_with_id(id, "a").unwrap();
        assert!(matches!(
            registry.create_with_id(id, "b"),
            Err(RegistryError::DuplicateId(dup)) if dup == id
        ));
        assert!(registry.create("c").is_ok());
    }

    #[test]
    fn test_state_only_moves_forward() {
        let registry = registry(1);
        let guard = registry.create("a").unwrap();
        assert!(guard.advance(SessionState::Active));
        assert!(guard.advance(SessionState::Draining));
        assert!(!guard.advance(SessionState::Active));
        assert!(!guard.advance(SessionState::Draining));
        assert_eq!(guard.state(), SessionState::Draining);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let registry = registry(2);
        let guard = registry.create("a").unwrap();
        let other = registry.create("b").unwrap();
        let id = guard.id();

        assert!(guard.teardown());
        assert!(!guard.teardown());
        assert_eq!(guard.state(), SessionState::Closed);
        assert!(!registry.contains(&id));
        assert!(registry.contains(&other.id()));
        assert!(!registry.destroy(&id));

        drop(guard);
        assert_eq!(registry.len(), 1);
        assert!(registry.create("c").is_ok());
    }

    #[test]
    fn test_stats_group_by_state() {
        let registry = registry(4);
        let a = registry.create("a").unwrap();
        let _b = registry.create("b").unwrap();
        a.advance(SessionState::Active);
        let stats = registry.stats();
        assert_eq!(stats.get(&SessionState::Active), Some(&1));
        assert_eq!(stats.get(&SessionState::AwaitingConfig), Some(&1));
        assert_eq!(stats.get(&SessionState::Draining), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_and_teardown() {
        let registry = registry(64);
        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let guard = registry.create(&format!("rep-{i}")).unwrap();
                    guard.advance(SessionState::Active);
                    tokio::task::yield_now().await;
                    guard.teardown();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert!(registry.is_empty());
        assert_eq!(registry.reserved.load(Ordering::Acquire), 0);
    }
}
