//! How a client session reaches the file server

use crate::error::{ApiError, ProtocolError};
use crate::protocol::codec::{expect_message, write_message};
use crate::protocol::{Request, Response};
use crate::server::dispatch::{Channel, Dispatcher};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;

/// Request/response exchange with a file server
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: Request, channel: Channel) -> Result<Response, ApiError>;
}

/// In-process transport: requests go straight to the dispatcher.
#[async_trait]
impl Transport for Arc<Dispatcher> {
    async fn request(&self, request: Request, channel: Channel) -> Result<Response, ApiError> {
        Ok(self.dispatch(request, channel).await)
    }
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open<A: ToSocketAddrs>(addr: A) -> Result<Self, ProtocolError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer,
        })
    }

    async fn exchange(&mut self, request: &Request) -> Result<Response, ProtocolError> {
        write_message(&mut self.writer, request).await?;
        expect_message(&mut self.reader).await
    }
}

/// Persistent JSON-lines connections to the control and bulk channels
pub struct TcpTransport {
    control: Mutex<Connection>,
    bulk: Mutex<Connection>,
}

impl TcpTransport {
    pub async fn connect<A, B>(control: A, bulk: B) -> Result<Self, ApiError>
    where
        A: ToSocketAddrs,
        B: ToSocketAddrs,
    {
        Ok(Self {
            control: Mutex::new(Connection::open(control).await?),
            bulk: Mutex::new(Connection::open(bulk).await?),
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn request(&self, request: Request, channel: Channel) -> Result<Response, ApiError> {
        let conn = match channel {
            Channel::Control => &self.control,
            Channel::Bulk => &self.bulk,
        };
        Ok(conn.lock().await.exchange(&request).await?)
    }
}
