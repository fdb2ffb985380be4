//! Request dispatch
//!
//! Turns protocol requests into store calls. Store calls are blocking and
//! run on the blocking pool so the store mutex is never held across a
//! network wait. Every failure becomes an `OK=false` response.

use crate::error::{ApiError, ProtocolError};
use crate::protocol::message::{decode_data, decode_entry, Request, Response};
use crate::store::FileSystemStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which listener a request arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// All actions
    Control,
    /// Content transfer only (`read`, `write`)
    Bulk,
}

pub struct Dispatcher {
    store: Arc<FileSystemStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<FileSystemStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<FileSystemStore> {
        &self.store
    }

    /// Handle one request, never failing: errors become `OK=false`.
    pub async fn dispatch(&self, request: Request, channel: Channel) -> Response {
        let action = request.action();
        if channel == Channel::Bulk && !request.is_bulk() {
            let err = ProtocolError::UnknownAction(format!("{} is not a bulk action", action));
            warn!(action, "Rejected control action on bulk channel");
            return Response::failure(err.to_string());
        }

        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || handle(&store, request))
            .await
            .unwrap_or_else(|e| Err(ApiError::Remote(format!("request handler failed: {}", e))));

        match result {
            Ok(response) => {
                debug!(action, ?channel, "Request handled");
                response
            }
            Err(e) => {
                warn!(action, ?channel, error = %e, "Request failed");
                Response::failure(e.to_string())
            }
        }
    }
}

fn handle(store: &FileSystemStore, request: Request) -> Result<Response, ApiError> {
    match request {
        Request::Open { path } => {
            let entry = store.open(&path)?;
            info!(path = %entry.virtual_path, size = entry.size_bytes, "Opened file");
            Ok(Response::success(format!("File {} opened", entry.virtual_path)).with_entry(&entry)?)
        }
        Request::Read { file_entry } => {
            let entry = decode_entry(&file_entry)?;
            let (current, data) = store.read(&entry.virtual_path)?;
            Ok(Response::success(format!("Read data from file {}", current.virtual_path))
                .with_entry(&current)?
                .with_data(&data))
        }
        Request::Write { file_entry, data } => {
            let entry = decode_entry(&file_entry)?;
            let data = decode_data(&data)?;
            if data.len() as u64 != entry.size_bytes {
                return Err(ApiError::SizeMismatch {
                    expected: entry.size_bytes,
                    actual: data.len() as u64,
                });
            }
            let written = store.save_file(&entry.virtual_path, &data)?;
            Ok(Response::success(format!("Wrote data to file {}", entry.virtual_path))
                .with_entry(&entry)?
                .with_bytes_written(written as u64))
        }
        Request::Close { file_entry, data } => {
            let entry = decode_entry(&file_entry)?;
            let data = decode_data(&data)?;
            let path = entry.virtual_path.clone();
            let (stored, written) = store.commit(&path, entry, &data)?;
            info!(path = %path, bytes = written, "Committed file");
            Ok(Response::success(format!("File {} closed", path))
                .with_entry(&stored)?
                .with_bytes_written(written as u64))
        }
        Request::Delete { path } => {
            let entry = store.delete_file(&path)?;
            Ok(Response::success(format!("File {} deleted", entry.virtual_path)))
        }
    }
}
