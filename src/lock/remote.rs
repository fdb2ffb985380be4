//! Client side of the TCP lock service

use crate::error::{LockError, ProtocolError};
use crate::lock::wire::{LockRequest, LockResponse};
use crate::lock::{Lock, LockCoordinator};
use crate::protocol::codec::{expect_message, write_message};
use crate::types::SessionId;
use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tracing::debug;

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// [`LockCoordinator`] backed by a remote lock service
///
/// The connection is bound to one session; keeping it open keeps the
/// session alive. Requests on one connection are serialized.
pub struct RemoteLockCoordinator {
    session: SessionId,
    conn: Mutex<Connection>,
}

impl RemoteLockCoordinator {
    /// Connect to the lock service at `addr` as `session`.
    pub async fn connect<A: ToSocketAddrs>(addr: A, session: SessionId) -> Result<Self, LockError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| LockError::Unavailable(format!("connect failed: {}", e)))?;
        let (read_half, writer) = stream.into_split();
        let mut conn = Connection {
            reader: BufReader::new(read_half),
            writer,
        };

        let hello = LockRequest::Hello {
            session: session.clone(),
        };
        match round_trip(&mut conn, &hello).await? {
            LockResponse::Welcome { .. } => {}
            LockResponse::Error { failure } => return Err(failure.into()),
            other => return Err(unexpected(&other)),
        }
        debug!(session = %session, "Connected to lock service");

        Ok(Self {
            session,
            conn: Mutex::new(conn),
        })
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    fn check_session(&self, key: &str, session: &SessionId) -> Result<(), LockError> {
        if session != &self.session {
            return Err(LockError::Denied {
                key: key.to_string(),
                reason: format!("connection belongs to session {}", self.session),
            });
        }
        Ok(())
    }

    async fn request(&self, request: LockRequest) -> Result<LockResponse, LockError> {
        let mut conn = self.conn.lock().await;
        match round_trip(&mut conn, &request).await? {
            LockResponse::Error { failure } => Err(failure.into()),
            response => Ok(response),
        }
    }
}

async fn round_trip(
    conn: &mut Connection,
    request: &LockRequest,
) -> Result<LockResponse, LockError> {
    let io = |e: ProtocolError| LockError::Unavailable(e.to_string());
    write_message(&mut conn.writer, request).await.map_err(io)?;
    expect_message(&mut conn.reader).await.map_err(io)
}

fn unexpected(response: &LockResponse) -> LockError {
    LockError::Unavailable(format!("unexpected lock service response: {:?}", response))
}

#[async_trait]
impl LockCoordinator for RemoteLockCoordinator {
    async fn acquire(&self, key: &str, session: &SessionId) -> Result<Lock, LockError> {
        self.check_session(key, session)?;
        match self
            .request(LockRequest::Acquire {
                key: key.to_string(),
            })
            .await?
        {
            LockResponse::Granted { lock } => Ok(lock),
            other => Err(unexpected(&other)),
        }
    }

    async fn release(&self, key: &str, session: &SessionId) -> Result<(), LockError> {
        self.check_session(key, session)?;
        match self
            .request(LockRequest::Release {
                key: key.to_string(),
            })
            .await?
        {
            LockResponse::Released { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        match self
            .request(LockRequest::IsLocked {
                key: key.to_string(),
            })
            .await?
        {
            LockResponse::Locked { locked, .. } => Ok(locked),
            other => Err(unexpected(&other)),
        }
    }
}
