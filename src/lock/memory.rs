//! Lease-based FIFO lock coordinator
//!
//! Each key has at most one holder and a FIFO queue of waiters. A waiter is a
//! oneshot sender; a waiter whose receiving future was dropped is skipped at
//! grant time.
//!
//! Sessions attached through a live connection never expire. When the last
//! connection of a session goes away the session is detached and its lease
//! starts; if it is not re-attached before the lease runs out, the reaper
//! releases every lock it holds and fails every wait it has pending.

use crate::error::LockError;
use crate::lock::{Lock, LockCoordinator};
use crate::types::SessionId;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct Waiter {
    session: SessionId,
    tx: oneshot::Sender<Result<Lock, LockError>>,
}

#[derive(Default)]
struct KeyState {
    holder: Option<Lock>,
    waiters: VecDeque<Waiter>,
}

impl KeyState {
    fn is_idle(&self) -> bool {
        self.holder.is_none() && self.waiters.is_empty()
    }

    /// Hand the key to the first waiter still listening.
    fn grant_next(&mut self, key: &str) {
        self.holder = None;
        while let Some(waiter) = self.waiters.pop_front() {
            let lock = Lock {
                key: key.to_string(),
                holder: waiter.session.clone(),
                granted_at: Utc::now(),
            };
            if waiter.tx.send(Ok(lock.clone())).is_ok() {
                debug!(key, session = %lock.holder, "Lock handed to next waiter");
                self.holder = Some(lock);
                return;
            }
            debug!(key, session = %waiter.session, "Skipping abandoned waiter");
        }
    }
}

#[derive(Debug, Default)]
struct Lease {
    connections: usize,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct State {
    keys: HashMap<String, KeyState>,
    sessions: HashMap<SessionId, Lease>,
}

/// In-process lock state with session leases
pub struct LeaseLockCoordinator {
    state: Mutex<State>,
    lease_ttl: Duration,
}

impl LeaseLockCoordinator {
    pub fn new(lease_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            lease_ttl,
        }
    }

    pub fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }

    /// Register a live connection for `session`, cancelling any running lease.
    pub fn attach(&self, session: &SessionId) {
        let mut state = self.state.lock();
        let lease = state.sessions.entry(session.clone()).or_default();
        lease.connections += 1;
        lease.expires_at = None;
        debug!(session = %session, connections = lease.connections, "Session attached");
    }

    /// Drop a live connection for `session`. The lease starts when the last
    /// connection goes away.
    pub fn detach(&self, session: &SessionId) {
        let mut state = self.state.lock();
        let Some(lease) = state.sessions.get_mut(session) else {
            return;
        };
        lease.connections = lease.connections.saturating_sub(1);
        if lease.connections == 0 {
            lease.expires_at = Some(Instant::now() + self.lease_ttl);
            info!(
                session = %session,
                lease_ms = self.lease_ttl.as_millis() as u64,
                "Session detached, lease started"
            );
        }
    }

    /// Expire every session whose lease ran out before `now`.
    ///
    /// Returns the expired session ids.
    pub fn expire_sessions(&self, now: Instant) -> Vec<SessionId> {
        let mut state = self.state.lock();
        let expired: Vec<SessionId> = state
            .sessions
            .iter()
            .filter(|(_, lease)| lease.expires_at.is_some_and(|at| at <= now))
            .map(|(session, _)| session.clone())
            .collect();

        for session in &expired {
            state.sessions.remove(session);
        }
        if expired.is_empty() {
            return expired;
        }

        for (key, key_state) in state.keys.iter_mut() {
            let (dead, live): (Vec<Waiter>, Vec<Waiter>) = key_state
                .waiters
                .drain(..)
                .partition(|waiter| expired.contains(&waiter.session));
            key_state.waiters = live.into();
            for waiter in dead {
                let _ = waiter
                    .tx
                    .send(Err(LockError::SessionExpired(waiter.session.clone())));
            }

            let holder_expired = key_state
                .holder
                .as_ref()
                .is_some_and(|lock| expired.contains(&lock.holder));
            if holder_expired {
                warn!(key = %key, "Reclaiming lock from expired session");
                key_state.grant_next(key);
            }
        }
        state.keys.retain(|_, key_state| !key_state.is_idle());

        for session in &expired {
            info!(session = %session, "Session lease expired");
        }
        expired
    }

    /// Current holder of `key`, if any.
    pub fn holder(&self, key: &str) -> Option<SessionId> {
        self.state
            .lock()
            .keys
            .get(key)
            .and_then(|key_state| key_state.holder.as_ref())
            .map(|lock| lock.holder.clone())
    }

    /// Number of sessions queued behind the holder of `key`.
    pub fn queue_len(&self, key: &str) -> usize {
        self.state
            .lock()
            .keys
            .get(key)
            .map(|key_state| key_state.waiters.iter().filter(|w| !w.tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl LockCoordinator for LeaseLockCoordinator {
    async fn acquire(&self, key: &str, session: &SessionId) -> Result<Lock, LockError> {
        let rx = {
            let mut state = self.state.lock();
            let key_state = state.keys.entry(key.to_string()).or_default();

            if key_state
                .holder
                .as_ref()
                .is_some_and(|lock| &lock.holder == session)
            {
                return Err(LockError::Denied {
                    key: key.to_string(),
                    reason: "already held by this session".to_string(),
                });
            }
            if key_state
                .waiters
                .iter()
                .any(|w| &w.session == session && !w.tx.is_closed())
            {
                return Err(LockError::Denied {
                    key: key.to_string(),
                    reason: "already queued by this session".to_string(),
                });
            }

            if key_state.holder.is_none() && key_state.waiters.is_empty() {
                let lock = Lock {
                    key: key.to_string(),
                    holder: session.clone(),
                    granted_at: Utc::now(),
                };
                key_state.holder = Some(lock.clone());
                info!(key, session = %session, "Lock granted");
                return Ok(lock);
            }

            let (tx, rx) = oneshot::channel();
            key_state.waiters.push_back(Waiter {
                session: session.clone(),
                tx,
            });
            debug!(
                key,
                session = %session,
                position = key_state.waiters.len(),
                "Waiting for lock"
            );
            rx
        };

        let lock = rx
            .await
            .map_err(|_| LockError::Unavailable(format!("lock queue for {} dropped", key)))??;
        info!(key, session = %session, "Lock granted");
        Ok(lock)
    }

    async fn release(&self, key: &str, session: &SessionId) -> Result<(), LockError> {
        let mut state = self.state.lock();
        let Some(key_state) = state.keys.get_mut(key) else {
            return Err(LockError::NotHeld {
                key: key.to_string(),
                session: session.clone(),
            });
        };
        if !key_state
            .holder
            .as_ref()
            .is_some_and(|lock| &lock.holder == session)
        {
            return Err(LockError::NotHeld {
                key: key.to_string(),
                session: session.clone(),
            });
        }

        key_state.grant_next(key);
        if key_state.is_idle() {
            state.keys.remove(key);
        }
        info!(key, session = %session, "Lock released");
        Ok(())
    }

    async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        Ok(self
            .state
            .lock()
            .keys
            .get(key)
            .is_some_and(|key_state| key_state.holder.is_some()))
    }
}

/// Expire overdue sessions every `period` on a tokio task.
pub fn spawn_reaper(coordinator: Arc<LeaseLockCoordinator>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let expired = coordinator.expire_sessions(Instant::now());
            if !expired.is_empty() {
                debug!(count = expired.len(), "Reaper expired sessions");
            }
        }
    })
}
