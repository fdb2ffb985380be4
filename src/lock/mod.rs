//! Distributed path locks
//!
//! One writer per key, granted in request order. The authoritative state
//! lives in [`LeaseLockCoordinator`]; [`service`] exposes it over TCP and
//! [`RemoteLockCoordinator`] is the client side of that service.

pub mod memory;
pub mod remote;
pub mod service;
pub mod wire;

pub use memory::{spawn_reaper, LeaseLockCoordinator};
pub use remote::RemoteLockCoordinator;

use crate::error::LockError;
use crate::types::SessionId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A granted lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub key: String,
    pub holder: SessionId,
    pub granted_at: DateTime<Utc>,
}

/// Mutual exclusion over string keys
#[async_trait]
pub trait LockCoordinator: Send + Sync {
    /// Block until `session` holds `key`.
    async fn acquire(&self, key: &str, session: &SessionId) -> Result<Lock, LockError>;

    /// Release `key`; fails `NotHeld` unless `session` is the holder.
    async fn release(&self, key: &str, session: &SessionId) -> Result<(), LockError>;

    /// Whether anyone currently holds `key`.
    async fn is_locked(&self, key: &str) -> Result<bool, LockError>;
}

#[async_trait]
impl<T: LockCoordinator + ?Sized> LockCoordinator for Arc<T> {
    async fn acquire(&self, key: &str, session: &SessionId) -> Result<Lock, LockError> {
        (**self).acquire(key, session).await
    }

    async fn release(&self, key: &str, session: &SessionId) -> Result<(), LockError> {
        (**self).release(key, session).await
    }

    async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        (**self).is_locked(key).await
    }
}
