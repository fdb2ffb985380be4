//! TCP lock service
//!
//! Exposes a [`LeaseLockCoordinator`] to remote sessions. A connection's
//! lifetime is its session's liveness signal: the session is attached on
//! `hello` and detached when the connection ends, which starts its lease.

use crate::config::LockConfig;
use crate::error::{ApiError, LockError, ProtocolError};
use crate::lock::memory::{spawn_reaper, LeaseLockCoordinator};
use crate::lock::wire::{LockFailure, LockRequest, LockResponse};
use crate::lock::LockCoordinator;
use crate::protocol::codec::{peer_closed, read_message, write_message};
use crate::types::SessionId;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Standalone lock service: listener, coordinator and lease reaper
pub struct LockServer {
    listener: TcpListener,
    coordinator: Arc<LeaseLockCoordinator>,
    reap_interval: Duration,
}

impl LockServer {
    /// Bind the lock service described by `config`. Port 0 picks a free port.
    pub async fn bind(config: &LockConfig) -> Result<Self, ApiError> {
        let listener = TcpListener::bind(config.addr())
            .await
            .map_err(ProtocolError::from)?;
        Ok(Self {
            listener,
            coordinator: Arc::new(LeaseLockCoordinator::new(config.lease_ttl())),
            reap_interval: config.reap_interval(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ApiError> {
        Ok(self.listener.local_addr().map_err(ProtocolError::from)?)
    }

    pub fn coordinator(&self) -> &Arc<LeaseLockCoordinator> {
        &self.coordinator
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ApiError>
    where
        F: Future<Output = ()>,
    {
        let reaper = spawn_reaper(Arc::clone(&self.coordinator), self.reap_interval);
        let result = tokio::select! {
            result = serve(self.listener, Arc::clone(&self.coordinator)) => result,
            _ = shutdown => Ok(()),
        };
        reaper.abort();
        info!("Lock service stopped");
        Ok(result?)
    }
}

/// Accept lock service connections on `listener` until the task is dropped.
pub async fn serve(
    listener: TcpListener,
    coordinator: Arc<LeaseLockCoordinator>,
) -> Result<(), ProtocolError> {
    info!(addr = ?listener.local_addr().ok(), "Lock service listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, coordinator).await {
                warn!(peer = %peer, error = %e, "Lock service connection failed");
            }
        });
    }
}

/// Detaches the session when the connection handler exits for any reason.
struct Attachment {
    coordinator: Arc<LeaseLockCoordinator>,
    session: SessionId,
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.coordinator.detach(&self.session);
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    coordinator: Arc<LeaseLockCoordinator>,
) -> Result<(), ProtocolError> {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let session = match read_message::<_, LockRequest>(&mut reader).await? {
        Some(LockRequest::Hello { session }) => session,
        Some(other) => {
            let failure = LockFailure::from(&LockError::Unavailable(format!(
                "expected hello, got {:?}",
                other
            )));
            write_message(&mut writer, &LockResponse::Error { failure }).await?;
            return Ok(());
        }
        None => return Ok(()),
    };

    coordinator.attach(&session);
    let _attachment = Attachment {
        coordinator: Arc::clone(&coordinator),
        session: session.clone(),
    };
    info!(peer = %peer, session = %session, "Lock session connected");
    write_message(
        &mut writer,
        &LockResponse::Welcome {
            session: session.clone(),
        },
    )
    .await?;

    while let Some(request) = read_message::<_, LockRequest>(&mut reader).await? {
        debug!(session = %session, request = ?request, "Lock request");
        let response = match request {
            LockRequest::Hello { .. } => LockResponse::Error {
                failure: LockFailure::from(&LockError::Denied {
                    key: String::new(),
                    reason: "session already established".to_string(),
                }),
            },
            LockRequest::Acquire { key } => {
                let acquire = coordinator.acquire(&key, &session);
                tokio::pin!(acquire);
                let mut watching = true;
                let outcome = loop {
                    tokio::select! {
                        result = &mut acquire => break Some(result),
                        closed = peer_closed(&mut reader), if watching => {
                            if closed {
                                break None;
                            }
                            watching = false;
                        }
                    }
                };
                match outcome {
                    Some(Ok(lock)) => LockResponse::Granted { lock },
                    Some(Err(e)) => LockResponse::Error {
                        failure: LockFailure::from(&e),
                    },
                    None => {
                        info!(session = %session, key = %key, "Peer left while waiting for lock");
                        return Ok(());
                    }
                }
            }
            LockRequest::Release { key } => match coordinator.release(&key, &session).await {
                Ok(()) => LockResponse::Released { key },
                Err(e) => LockResponse::Error {
                    failure: LockFailure::from(&e),
                },
            },
            LockRequest::IsLocked { key } => match coordinator.is_locked(&key).await {
                Ok(locked) => LockResponse::Locked { key, locked },
                Err(e) => LockResponse::Error {
                    failure: LockFailure::from(&e),
                },
            },
        };
        write_message(&mut writer, &response).await?;
    }

    info!(peer = %peer, session = %session, "Lock session disconnected");
    Ok(())
}
