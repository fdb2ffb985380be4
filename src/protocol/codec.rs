//! Newline-delimited JSON framing
//!
//! One JSON document per line. Used by both the file protocol and the lock
//! service.

use crate::error::ProtocolError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame
pub const MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;

/// Read the next message. Returns `None` on a clean end of stream.
///
/// A line that is not UTF-8, not valid JSON, or longer than
/// [`MAX_FRAME_BYTES`] is `Malformed`; the stream stays positioned at the
/// start of the following line.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    read_frame(reader, MAX_FRAME_BYTES).await
}

async fn read_frame<R, T>(reader: &mut R, limit: usize) -> Result<Option<T>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut frame = Vec::new();
    loop {
        frame.clear();
        let read = (&mut *reader)
            .take(limit as u64 + 1)
            .read_until(b'\n', &mut frame)
            .await?;
        if read == 0 {
            return Ok(None);
        }
        if frame.len() > limit && frame.last() != Some(&b'\n') {
            skip_line(reader).await?;
            return Err(ProtocolError::Malformed(format!(
                "frame exceeds {} bytes",
                limit
            )));
        }
        if !frame.iter().all(u8::is_ascii_whitespace) {
            break;
        }
    }

    let text = std::str::from_utf8(&frame)
        .map_err(|e| ProtocolError::Malformed(format!("frame is not UTF-8: {}", e)))?;
    serde_json::from_str(text.trim_end())
        .map(Some)
        .map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Discard input up to and including the next newline.
async fn skip_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<(), ProtocolError> {
    loop {
        let (found, used) = {
            let buf = reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(());
            }
            match buf.iter().position(|b| *b == b'\n') {
                Some(i) => (true, i + 1),
                None => (false, buf.len()),
            }
        };
        reader.consume(used);
        if found {
            return Ok(());
        }
    }
}

/// Like [`read_message`], but end of stream is an error.
pub async fn expect_message<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    read_message(reader).await?.ok_or(ProtocolError::UnexpectedEof)
}

/// Write `message` followed by a newline and flush.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut bytes =
        serde_json::to_vec(message).map_err(|e| ProtocolError::Encoding(e.to_string()))?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Resolves once the peer has closed its side, or once it has sent more
/// data (returning `false`). Does not consume buffered input.
pub async fn peer_closed<R: AsyncBufRead + Unpin>(reader: &mut R) -> bool {
    match reader.fill_buf().await {
        Ok(buf) => buf.is_empty(),
        Err(_) => true,
    }
}
