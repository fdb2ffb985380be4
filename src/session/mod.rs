//! Client checkout session
//!
//! A session checks out one whole file at a time:
//!
//! ```text
//! Idle -> Locking -> Fetching -> Editing -> Committing -> Idle
//! ```
//!
//! `open` takes the path's lock and copies the file into a private scratch
//! buffer; reads and writes touch only that buffer; `close` sends the buffer
//! back and releases the lock. A failed commit leaves the session in
//! `Committing` with the lock still held, so `close` can be retried.

pub mod transport;

pub use transport::{TcpTransport, Transport};

use crate::error::{ApiError, LockError};
use crate::lock::LockCoordinator;
use crate::protocol::codec::MAX_FRAME_BYTES;
use crate::protocol::message::{encode_data, encode_entry};
use crate::protocol::{Request, Response};
use crate::server::dispatch::Channel;
use crate::tree::node::FileEntry;
use crate::tree::path;
use crate::types::{new_session_id, SessionId};
use std::fmt;
use tracing::{debug, info, warn};

/// Largest file a session will hold. Content travels hex-encoded in one
/// frame, which doubles its size; the rest of the frame is the envelope.
pub const MAX_FILE_BYTES: usize = MAX_FRAME_BYTES / 2 - 64 * 1024;

/// Lifecycle position of a [`ClientSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Locking,
    Fetching,
    Editing,
    Committing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Locking => "locking",
            SessionState::Fetching => "fetching",
            SessionState::Editing => "editing",
            SessionState::Committing => "committing",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub session: SessionId,
    pub state: SessionState,
    pub entry: Option<FileEntry>,
}

struct OpenFile {
    entry: FileEntry,
    buffer: Vec<u8>,
}

pub struct ClientSession<T, L> {
    id: SessionId,
    transport: T,
    locks: L,
    state: SessionState,
    open: Option<OpenFile>,
}

impl<T: Transport, L: LockCoordinator> ClientSession<T, L> {
    /// Create a session with a freshly generated id.
    pub fn new(transport: T, locks: L) -> Self {
        Self::with_id(new_session_id(), transport, locks)
    }

    /// Create a session with a caller-chosen id. The id must match the one
    /// the lock coordinator knows this client by.
    pub fn with_id(id: SessionId, transport: T, locks: L) -> Self {
        Self {
            id,
            transport,
            locks,
            state: SessionState::Idle,
            open: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The checked-out file, while one is open.
    pub fn entry(&self) -> Option<&FileEntry> {
        self.open.as_ref().map(|open| &open.entry)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session: self.id.clone(),
            state: self.state,
            entry: self.entry().cloned(),
        }
    }

    /// Check out the file at `file_path`, creating it if missing.
    ///
    /// Blocks until the path's lock is granted. Fails `Denied` without
    /// touching the lock if this session already has a file open.
    pub async fn open(&mut self, file_path: &str) -> Result<FileEntry, ApiError> {
        if self.state != SessionState::Idle {
            let held = self
                .entry()
                .map(|entry| entry.virtual_path.clone())
                .unwrap_or_default();
            return Err(LockError::Denied {
                key: file_path.to_string(),
                reason: format!("session already has {} open ({})", held, self.state),
            }
            .into());
        }
        let key = path::normalize_path(file_path)?;

        self.state = SessionState::Locking;
        if let Err(e) = self.locks.acquire(&key, &self.id).await {
            self.state = SessionState::Idle;
            return Err(e.into());
        }
        debug!(session = %self.id, path = %key, "Lock acquired, fetching");

        self.state = SessionState::Fetching;
        match self.fetch(&key).await {
            Ok((entry, buffer)) => {
                info!(session = %self.id, path = %key, size = entry.size_bytes, "File checked out");
                self.open = Some(OpenFile {
                    entry: entry.clone(),
                    buffer,
                });
                self.state = SessionState::Editing;
                Ok(entry)
            }
            Err(e) => {
                if let Err(release_err) = self.locks.release(&key, &self.id).await {
                    warn!(session = %self.id, path = %key, error = %release_err, "Failed to release lock after fetch error");
                }
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    async fn fetch(&self, key: &str) -> Result<(FileEntry, Vec<u8>), ApiError> {
        let opened = self
            .call(
                Request::Open {
                    path: key.to_string(),
                },
                Channel::Control,
            )
            .await?;
        let entry = opened.entry()?;

        let read = self
            .call(
                Request::Read {
                    file_entry: encode_entry(&entry)?,
                },
                Channel::Bulk,
            )
            .await?;
        let content = read.content()?;
        if content.len() as u64 != entry.size_bytes {
            return Err(ApiError::SizeMismatch {
                expected: entry.size_bytes,
                actual: content.len() as u64,
            });
        }
        Ok((entry, content))
    }

    /// The whole scratch buffer.
    pub fn read(&self) -> Result<&[u8], ApiError> {
        Ok(&self.editing()?.buffer)
    }

    /// Up to `len` bytes of the scratch buffer starting at `offset`.
    pub fn read_range(&self, offset: usize, len: usize) -> Result<&[u8], ApiError> {
        let buffer = &self.editing()?.buffer;
        let start = offset.min(buffer.len());
        let end = offset.saturating_add(len).min(buffer.len());
        Ok(&buffer[start..end])
    }

    /// Overwrite the scratch buffer at `offset`, extending it as needed.
    /// A gap between the old end and `offset` is zero-filled. Fails
    /// `InvalidState` if the result would exceed [`MAX_FILE_BYTES`].
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize, ApiError> {
        if self.state != SessionState::Editing {
            return Err(self.wrong_state("write"));
        }
        let open = self
            .open
            .as_mut()
            .ok_or_else(|| ApiError::InvalidState("no file is open".to_string()))?;

        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= MAX_FILE_BYTES)
            .ok_or_else(|| {
                ApiError::InvalidState(format!(
                    "write of {} bytes at offset {} exceeds the {} byte file limit",
                    data.len(),
                    offset,
                    MAX_FILE_BYTES
                ))
            })?;
        if open.buffer.len() < end {
            open.buffer.resize(end, 0);
        }
        open.buffer[offset..end].copy_from_slice(data);
        open.entry.size_bytes = open.buffer.len() as u64;
        Ok(data.len())
    }

    /// Commit the scratch buffer and release the lock.
    ///
    /// On failure the session stays in `Committing`, still holding the lock;
    /// calling `close` again retries the commit.
    pub async fn close(&mut self) -> Result<FileEntry, ApiError> {
        if !matches!(self.state, SessionState::Editing | SessionState::Committing) {
            return Err(self.wrong_state("close"));
        }
        self.state = SessionState::Committing;

        let (request, expected) = {
            let open = self
                .open
                .as_ref()
                .ok_or_else(|| ApiError::InvalidState("no file is open".to_string()))?;
            let request = Request::Close {
                file_entry: encode_entry(&open.entry)?,
                data: encode_data(&open.buffer),
            };
            (request, open.entry.size_bytes)
        };

        let response = self.call(request, Channel::Control).await?;
        let written = response.bytes_written.unwrap_or_default();
        if written != expected {
            return Err(ApiError::SizeMismatch {
                expected,
                actual: written,
            });
        }
        let committed = response.entry()?;

        self.open = None;
        self.state = SessionState::Idle;
        info!(session = %self.id, path = %committed.virtual_path, size = committed.size_bytes, "File checked in");
        self.locks.release(&committed.virtual_path, &self.id).await?;
        Ok(committed)
    }

    /// Drop the scratch buffer without committing and release the lock.
    pub async fn discard(&mut self) -> Result<(), ApiError> {
        if !matches!(self.state, SessionState::Editing | SessionState::Committing) {
            return Err(self.wrong_state("discard"));
        }
        let open = self
            .open
            .take()
            .ok_or_else(|| ApiError::InvalidState("no file is open".to_string()))?;
        self.state = SessionState::Idle;
        info!(session = %self.id, path = %open.entry.virtual_path, "Checkout discarded");
        self.locks.release(&open.entry.virtual_path, &self.id).await?;
        Ok(())
    }

    /// Delete the file at `file_path` under its lock.
    pub async fn delete(&mut self, file_path: &str) -> Result<(), ApiError> {
        if self.state != SessionState::Idle {
            return Err(self.wrong_state("delete"));
        }
        let key = path::normalize_path(file_path)?;
        self.locks.acquire(&key, &self.id).await?;

        let result = self
            .call(Request::Delete { path: key.clone() }, Channel::Control)
            .await;
        let released = self.locks.release(&key, &self.id).await;
        result?;
        released?;
        info!(session = %self.id, path = %key, "File deleted");
        Ok(())
    }

    async fn call(&self, request: Request, channel: Channel) -> Result<Response, ApiError> {
        let response = self.transport.request(request, channel).await?;
        if !response.ok {
            return Err(ApiError::Remote(response.message));
        }
        Ok(response)
    }

    fn editing(&self) -> Result<&OpenFile, ApiError> {
        match (&self.state, &self.open) {
            (SessionState::Editing, Some(open)) => Ok(open),
            _ => Err(self.wrong_state("read")),
        }
    }

    fn wrong_state(&self, operation: &str) -> ApiError {
        ApiError::InvalidState(format!("cannot {} while {}", operation, self.state))
    }
}

