//! File server
//!
//! Binds the control and bulk channels (and, unless disabled, an embedded
//! lock service), then serves one task per connection until shutdown.
//! The namespace is persisted periodically and once more on shutdown.

pub mod dispatch;

pub use dispatch::{Channel, Dispatcher};

use crate::config::CheckoutConfig;
use crate::error::{ApiError, ProtocolError};
use crate::lock::memory::LeaseLockCoordinator;
use crate::lock::service::LockServer;
use crate::protocol::codec::{read_message, write_message};
use crate::protocol::{Request, Response};
use crate::store::{spawn_persister, FileSystemStore};
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Addresses the server actually bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddrs {
    pub control: SocketAddr,
    pub bulk: SocketAddr,
    pub lock: Option<SocketAddr>,
}

pub struct FileServer {
    config: CheckoutConfig,
    dispatcher: Arc<Dispatcher>,
    control: TcpListener,
    bulk: TcpListener,
    lock: Option<LockServer>,
}

impl FileServer {
    /// Open the store and bind every listener. Port 0 picks a free port.
    pub async fn bind(config: CheckoutConfig) -> Result<Self, ApiError> {
        config.ensure_valid()?;

        let store = Arc::new(FileSystemStore::open_at(&config.storage)?);
        let control = TcpListener::bind(config.server.control_addr())
            .await
            .map_err(ProtocolError::from)?;
        let bulk = TcpListener::bind(config.server.bulk_addr())
            .await
            .map_err(ProtocolError::from)?;
        let lock = if config.lock.embedded {
            Some(LockServer::bind(&config.lock).await?)
        } else {
            None
        };

        Ok(Self {
            config,
            dispatcher: Arc::new(Dispatcher::new(store)),
            control,
            bulk,
            lock,
        })
    }

    pub fn local_addrs(&self) -> Result<BoundAddrs, ApiError> {
        Ok(BoundAddrs {
            control: self.control.local_addr().map_err(ProtocolError::from)?,
            bulk: self.bulk.local_addr().map_err(ProtocolError::from)?,
            lock: self.lock.as_ref().map(LockServer::local_addr).transpose()?,
        })
    }

    pub fn store(&self) -> &Arc<FileSystemStore> {
        self.dispatcher.store()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The embedded lock coordinator, if this server runs one.
    pub fn lock_coordinator(&self) -> Option<&Arc<LeaseLockCoordinator>> {
        self.lock.as_ref().map(LockServer::coordinator)
    }

    /// Serve until `shutdown` resolves, then persist the namespace.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ApiError>
    where
        F: Future<Output = ()>,
    {
        let addrs = self.local_addrs()?;
        info!(
            control = %addrs.control,
            bulk = %addrs.bulk,
            lock = ?addrs.lock,
            "File server listening"
        );

        let store = Arc::clone(self.dispatcher.store());
        let snapshot_path = self.config.storage.snapshot_path.clone();
        let persister = spawn_persister(
            Arc::clone(&store),
            snapshot_path.clone(),
            self.config.storage.persist_interval(),
        );

        let (lock_stop, lock_stopped) = oneshot::channel::<()>();
        let lock_task = self.lock.map(|lock_server| {
            tokio::spawn(async move {
                let stop = async {
                    let _ = lock_stopped.await;
                };
                if let Err(e) = lock_server.serve(stop).await {
                    error!(error = %e, "Lock service failed");
                }
            })
        });

        let control = tokio::spawn(accept_loop(
            self.control,
            Arc::clone(&self.dispatcher),
            Channel::Control,
        ));
        let bulk = tokio::spawn(accept_loop(
            self.bulk,
            Arc::clone(&self.dispatcher),
            Channel::Bulk,
        ));

        shutdown.await;
        info!("Shutting down file server");

        control.abort();
        bulk.abort();
        persister.abort();
        let _ = lock_stop.send(());
        if let Some(task) = lock_task {
            let _ = task.await;
        }

        let target = snapshot_path.clone();
        match tokio::task::spawn_blocking(move || store.save(&target)).await {
            Ok(Ok(())) => info!(path = %snapshot_path.display(), "Persisted snapshot on shutdown"),
            Ok(Err(e)) => warn!(path = %snapshot_path.display(), error = %e, "Shutdown persist failed"),
            Err(e) => warn!(error = %e, "Shutdown persist task panicked"),
        }
        Ok(())
    }
}

async fn accept_loop(listener: TcpListener, dispatcher: Arc<Dispatcher>, channel: Channel) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, peer, dispatcher, channel).await {
                        warn!(peer = %peer, ?channel, error = %e, "Client connection failed");
                    }
                });
            }
            Err(e) => {
                error!(?channel, error = %e, "Failed to accept connection");
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    channel: Channel,
) -> Result<(), ProtocolError> {
    stream.set_nodelay(true)?;
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    debug!(peer = %peer, ?channel, "Client connected");

    loop {
        let response = match read_message::<_, Value>(&mut reader).await {
            Ok(Some(value)) => match Request::from_json(value) {
                Ok(request) => dispatcher.dispatch(request, channel).await,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "Rejected request");
                    Response::failure(e.to_string())
                }
            },
            Ok(None) => break,
            Err(ProtocolError::Malformed(message)) => {
                warn!(peer = %peer, error = %message, "Malformed request");
                Response::failure(ProtocolError::Malformed(message).to_string())
            }
            Err(e) => return Err(e),
        };
        write_message(&mut writer, &response).await?;
    }

    debug!(peer = %peer, ?channel, "Client disconnected");
    Ok(())
}
