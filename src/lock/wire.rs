//! Lock service messages
//!
//! Every connection opens with `hello` naming its session, then issues one
//! request at a time and reads one response per request.

use crate::error::LockError;
use crate::lock::Lock;
use crate::types::SessionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LockRequest {
    Hello { session: SessionId },
    Acquire { key: String },
    Release { key: String },
    IsLocked { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LockResponse {
    Welcome { session: SessionId },
    Granted { lock: Lock },
    Released { key: String },
    Locked { key: String, locked: bool },
    Error { failure: LockFailure },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockFailureKind {
    Denied,
    Timeout,
    NotHeld,
    SessionExpired,
    Unavailable,
}

/// A [`LockError`] in transmittable form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFailure {
    pub kind: LockFailureKind,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub session: String,
    pub message: String,
}

impl From<&LockError> for LockFailure {
    fn from(err: &LockError) -> Self {
        let (kind, key, session) = match err {
            LockError::Denied { key, .. } => (LockFailureKind::Denied, key.clone(), String::new()),
            LockError::Timeout(key) => (LockFailureKind::Timeout, key.clone(), String::new()),
            LockError::NotHeld { key, session } => {
                (LockFailureKind::NotHeld, key.clone(), session.clone())
            }
            LockError::SessionExpired(session) => {
                (LockFailureKind::SessionExpired, String::new(), session.clone())
            }
            LockError::Unavailable(_) => {
                (LockFailureKind::Unavailable, String::new(), String::new())
            }
        };
        Self {
            kind,
            key,
            session,
            message: err.to_string(),
        }
    }
}

impl From<LockFailure> for LockError {
    fn from(failure: LockFailure) -> Self {
        match failure.kind {
            LockFailureKind::Denied => LockError::Denied {
                key: failure.key,
                reason: failure.message,
            },
            LockFailureKind::Timeout => LockError::Timeout(failure.key),
            LockFailureKind::NotHeld => LockError::NotHeld {
                key: failure.key,
                session: failure.session,
            },
            LockFailureKind::SessionExpired => LockError::SessionExpired(failure.session),
            LockFailureKind::Unavailable => LockError::Unavailable(failure.message),
        }
    }
}
