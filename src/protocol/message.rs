//! File protocol envelope
//!
//! Requests are tagged by `action`. The file entry travels as an opaque
//! string (hex of its bincode encoding) so that clients never need to
//! interpret it; file content travels as hex.

use crate::error::ProtocolError;
use crate::tree::node::FileEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Actions accepted by the file server
pub const ACTIONS: &[&str] = &["open", "close", "read", "write", "delete"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Request {
    Open {
        path: String,
    },
    Close {
        #[serde(rename = "fileEntry")]
        file_entry: String,
        data: String,
    },
    Read {
        #[serde(rename = "fileEntry")]
        file_entry: String,
    },
    Write {
        #[serde(rename = "fileEntry")]
        file_entry: String,
        data: String,
    },
    Delete {
        path: String,
    },
}

impl Request {
    /// Parse a request, telling unknown actions apart from malformed ones.
    pub fn from_json(value: Value) -> Result<Self, ProtocolError> {
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::Malformed("missing action".to_string()))?;
        if !ACTIONS.contains(&action) {
            return Err(ProtocolError::UnknownAction(action.to_string()));
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    pub fn action(&self) -> &'static str {
        match self {
            Request::Open { .. } => "open",
            Request::Close { .. } => "close",
            Request::Read { .. } => "read",
            Request::Write { .. } => "write",
            Request::Delete { .. } => "delete",
        }
    }

    /// Whether the bulk channel accepts this request.
    pub fn is_bulk(&self) -> bool {
        matches!(self, Request::Read { .. } | Request::Write { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
    #[serde(rename = "OK")]
    pub ok: bool,
    #[serde(rename = "fileEntry", default, skip_serializing_if = "Option::is_none")]
    pub file_entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(rename = "bytesWritten", default, skip_serializing_if = "Option::is_none")]
    pub bytes_written: Option<u64>,
}

impl Response {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ok: true,
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ok: false,
            ..Self::default()
        }
    }

    pub fn with_entry(mut self, entry: &FileEntry) -> Result<Self, ProtocolError> {
        self.file_entry = Some(encode_entry(entry)?);
        Ok(self)
    }

    pub fn with_data(mut self, data: &[u8]) -> Self {
        self.data = Some(encode_data(data));
        self
    }

    pub fn with_bytes_written(mut self, written: u64) -> Self {
        self.bytes_written = Some(written);
        self
    }

    /// Decode the attached file entry, failing if absent.
    pub fn entry(&self) -> Result<FileEntry, ProtocolError> {
        let encoded = self
            .file_entry
            .as_deref()
            .ok_or_else(|| ProtocolError::Malformed("response has no fileEntry".to_string()))?;
        decode_entry(encoded)
    }

    /// Decode the attached data, failing if absent.
    pub fn content(&self) -> Result<Vec<u8>, ProtocolError> {
        let encoded = self
            .data
            .as_deref()
            .ok_or_else(|| ProtocolError::Malformed("response has no data".to_string()))?;
        decode_data(encoded)
    }
}

pub fn encode_entry(entry: &FileEntry) -> Result<String, ProtocolError> {
    let bytes = bincode::serialize(entry).map_err(|e| ProtocolError::Encoding(e.to_string()))?;
    Ok(hex::encode(bytes))
}

pub fn decode_entry(encoded: &str) -> Result<FileEntry, ProtocolError> {
    let bytes = hex::decode(encoded).map_err(|e| ProtocolError::Encoding(e.to_string()))?;
    bincode::deserialize(&bytes).map_err(|e| ProtocolError::Encoding(e.to_string()))
}

pub fn encode_data(data: &[u8]) -> String {
    hex::encode(data)
}

pub fn decode_data(encoded: &str) -> Result<Vec<u8>, ProtocolError> {
    hex::decode(encoded).map_err(|e| ProtocolError::Encoding(e.to_string()))
}
