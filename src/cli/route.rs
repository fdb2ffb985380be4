//! CLI route: run context and dispatch to the server, lock service and shell.

use crate::cli::parse::{Cli, Commands};
use crate::client::shell;
use crate::config::{CheckoutConfig, ConfigLoader};
use crate::error::ApiError;
use crate::lock::service::LockServer;
use crate::lock::RemoteLockCoordinator;
use crate::server::FileServer;
use crate::session::{ClientSession, TcpTransport};
use crate::types::new_session_id;
use tracing::{error, info};

/// Runtime context for CLI execution: the effective configuration.
pub struct RunContext {
    config: CheckoutConfig,
}

impl RunContext {
    /// Load configuration and fold in the command's flags.
    pub fn new(cli: &Cli) -> Result<Self, ApiError> {
        let mut config = ConfigLoader::load(cli.config.as_deref())?;
        apply_overrides(&mut config, &cli.command);
        config.ensure_valid()?;
        Ok(Self { config })
    }

    pub fn from_config(config: CheckoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    pub async fn execute(&self, command: &Commands) -> Result<(), ApiError> {
        match command {
            Commands::Serve { .. } => {
                let server = FileServer::bind(self.config.clone()).await?;
                server.serve(shutdown_signal()).await
            }
            Commands::Lockd { .. } => {
                let lock_server = LockServer::bind(&self.config.lock).await?;
                info!(addr = %lock_server.local_addr()?, "Lock service started");
                lock_server.serve(shutdown_signal()).await
            }
            Commands::Shell { .. } => {
                let session_id = new_session_id();
                let locks =
                    RemoteLockCoordinator::connect(self.config.lock.addr(), session_id.clone())
                        .await?;
                let transport = TcpTransport::connect(
                    self.config.server.control_addr(),
                    self.config.server.bulk_addr(),
                )
                .await?;
                let mut session = ClientSession::with_id(session_id, transport, locks);
                shell::run(&mut session).await
            }
        }
    }
}

/// Resolve on Ctrl-C.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
    }
}

/// Fold command-line flags over the loaded configuration.
pub fn apply_overrides(config: &mut CheckoutConfig, command: &Commands) {
    match command {
        Commands::Serve {
            host,
            port,
            bulk_port,
            blob_dir,
            snapshot,
            no_lock_service,
        } => {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
            if let Some(bulk_port) = bulk_port {
                config.server.bulk_port = *bulk_port;
            }
            if let Some(blob_dir) = blob_dir {
                config.storage.blob_dir = blob_dir.clone();
            }
            if let Some(snapshot) = snapshot {
                config.storage.snapshot_path = snapshot.clone();
            }
            if *no_lock_service {
                config.lock.embedded = false;
            }
        }
        Commands::Lockd {
            host,
            port,
            lease_ttl_ms,
        } => {
            if let Some(host) = host {
                config.lock.host = host.clone();
            }
            if let Some(port) = port {
                config.lock.port = *port;
            }
            if let Some(lease_ttl_ms) = lease_ttl_ms {
                config.lock.lease_ttl_ms = *lease_ttl_ms;
            }
        }
        Commands::Shell {
            host,
            port,
            bulk_port,
            lock_host,
            lock_port,
        } => {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
            if let Some(bulk_port) = bulk_port {
                config.server.bulk_port = *bulk_port;
            }
            if let Some(lock_host) = lock_host {
                config.lock.host = lock_host.clone();
            }
            if let Some(lock_port) = lock_port {
                config.lock.port = *lock_port;
            }
        }
    }
}
