//! Integration tests over real TCP: file server, lock service and client

use super::test_utils::loopback_config;
use checkoutfs::config::CheckoutConfig;
use checkoutfs::lock::{LockCoordinator, RemoteLockCoordinator};
use checkoutfs::server::{BoundAddrs, FileServer};
use checkoutfs::session::{ClientSession, SessionState, TcpTransport};
use checkoutfs::store::FileSystemStore;
use checkoutfs::types::new_session_id;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

struct RunningServer {
    addrs: BoundAddrs,
    store: Arc<FileSystemStore>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RunningServer {
    async fn start(dir: &TempDir) -> Self {
        Self::start_with(loopback_config(dir)).await
    }

    async fn start_with(config: CheckoutConfig) -> Self {
        let server = FileServer::bind(config).await.unwrap();
        let addrs = server.local_addrs().unwrap();
        let store = Arc::clone(server.store());
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            server
                .serve(async {
                    let _ = stopped.await;
                })
                .await
                .unwrap();
        });
        Self {
            addrs,
            store,
            stop,
            task,
        }
    }

    fn lock_addr(&self) -> std::net::SocketAddr {
        self.addrs.lock.unwrap()
    }

    async fn shutdown(self) {
        self.stop.send(()).unwrap();
        timeout(Duration::from_secs(5), self.task)
            .await
            .unwrap()
            .unwrap();
    }
}

async fn connect_session(
    server: &RunningServer,
) -> ClientSession<TcpTransport, RemoteLockCoordinator> {
    let id = new_session_id();
    let locks = RemoteLockCoordinator::connect(server.lock_addr(), id.clone())
        .await
        .unwrap();
    let transport = TcpTransport::connect(server.addrs.control, server.addrs.bulk)
        .await
        .unwrap();
    ClientSession::with_id(id, transport, locks)
}

async fn exchange(stream: &mut BufReader<TcpStream>, line: &str) -> Value {
    stream.get_mut().write_all(line.as_bytes()).await.unwrap();
    stream.get_mut().write_all(b"\n").await.unwrap();
    let mut response = String::new();
    stream.read_line(&mut response).await.unwrap();
    serde_json::from_str(&response).unwrap()
}

/// Test a checkout and check-in over TCP
#[tokio::test]
async fn test_tcp_checkout_round_trip() {
    let dir = TempDir::new().unwrap();
    let server = RunningServer::start(&dir).await;

    let mut session = connect_session(&server).await;
    let entry = session.open("/remote/file.txt").await.unwrap();
    assert_eq!(entry.size_bytes, 0);
    session.write(0, b"over the wire").unwrap();
    let committed = session.close().await.unwrap();
    assert_eq!(committed.size_bytes, 13);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(
        server.store.get_file("/remote/file.txt").unwrap(),
        b"over the wire"
    );

    let mut reader = connect_session(&server).await;
    reader.open("/remote/file.txt").await.unwrap();
    assert_eq!(reader.read().unwrap(), b"over the wire");
    reader.discard().await.unwrap();

    server.shutdown().await;
}

/// Test that a second TCP client waits for the first to close
#[tokio::test]
async fn test_tcp_clients_take_turns() {
    let dir = TempDir::new().unwrap();
    let server = RunningServer::start(&dir).await;

    let mut first = connect_session(&server).await;
    first.open("/turns.txt").await.unwrap();
    first.write(0, b"first").unwrap();

    let second = connect_session(&server).await;
    let pending = tokio::spawn(async move {
        let mut second = second;
        second.open("/turns.txt").await.unwrap();
        second.read().unwrap().to_vec()
    });
    sleep(Duration::from_millis(100)).await;
    assert!(!pending.is_finished());

    first.close().await.unwrap();
    let seen = timeout(Duration::from_secs(2), pending)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen, b"first");

    server.shutdown().await;
}

/// Test that a dropped client's lock is reclaimed once its lease expires
#[tokio::test]
async fn test_dropped_client_lock_reclaimed() {
    let dir = TempDir::new().unwrap();
    let server = RunningServer::start(&dir).await;

    let crashed = RemoteLockCoordinator::connect(server.lock_addr(), "crashed".to_string())
        .await
        .unwrap();
    crashed.acquire("/held.txt", &"crashed".to_string()).await.unwrap();

    let survivor = RemoteLockCoordinator::connect(server.lock_addr(), "survivor".to_string())
        .await
        .unwrap();
    assert!(survivor.is_locked("/held.txt").await.unwrap());
    drop(crashed);

    let lock = timeout(
        Duration::from_secs(3),
        survivor.acquire("/held.txt", &"survivor".to_string()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(lock.holder, "survivor");

    server.shutdown().await;
}

/// Test that malformed lines get an error reply without closing the connection
#[tokio::test]
async fn test_malformed_request_keeps_connection() {
    let dir = TempDir::new().unwrap();
    let server = RunningServer::start(&dir).await;

    let stream = TcpStream::connect(server.addrs.control).await.unwrap();
    let mut stream = BufReader::new(stream);

    let reply = exchange(&mut stream, "this is not json").await;
    assert_eq!(reply["OK"], Value::Bool(false));

    let reply = exchange(&mut stream, r#"{"action":"rename","path":"/x"}"#).await;
    assert_eq!(reply["OK"], Value::Bool(false));
    assert!(reply["message"].as_str().unwrap().contains("rename"));

    let reply = exchange(&mut stream, r#"{"action":"open","path":"/raw.txt"}"#).await;
    assert_eq!(reply["OK"], Value::Bool(true));
    assert!(reply["fileEntry"].is_string());

    server.shutdown().await;
}

/// Test that a line with invalid UTF-8 is answered and the connection survives
#[tokio::test]
async fn test_invalid_utf8_request_keeps_connection() {
    let dir = TempDir::new().unwrap();
    let server = RunningServer::start(&dir).await;

    let stream = TcpStream::connect(server.addrs.control).await.unwrap();
    let mut stream = BufReader::new(stream);
    stream
        .get_mut()
        .write_all(b"{\"action\":\"open\",\"path\":\"/\xff\"}\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_line(&mut response).await.unwrap();
    let reply: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(reply["OK"], Value::Bool(false));

    let reply = exchange(&mut stream, r#"{"action":"open","path":"/after.txt"}"#).await;
    assert_eq!(reply["OK"], Value::Bool(true));

    server.shutdown().await;
}

/// Test that host names are resolved when binding and connecting
#[tokio::test]
async fn test_host_names_resolve() {
    let dir = TempDir::new().unwrap();
    let mut config = loopback_config(&dir);
    config.server.host = "localhost".to_string();
    config.lock.host = "localhost".to_string();
    let server = RunningServer::start_with(config).await;

    let mut session = connect_session(&server).await;
    session.open("/named.txt").await.unwrap();
    session.write(0, b"by name").unwrap();
    session.close().await.unwrap();
    assert_eq!(server.store.get_file("/named.txt").unwrap(), b"by name");

    server.shutdown().await;
}

/// Test that the bulk channel refuses control actions
#[tokio::test]
async fn test_bulk_channel_rejects_open() {
    let dir = TempDir::new().unwrap();
    let server = RunningServer::start(&dir).await;

    let stream = TcpStream::connect(server.addrs.bulk).await.unwrap();
    let mut stream = BufReader::new(stream);
    let reply = exchange(&mut stream, r#"{"action":"open","path":"/nope.txt"}"#).await;
    assert_eq!(reply["OK"], Value::Bool(false));
    assert!(server.store.stat("/nope.txt").is_err());

    server.shutdown().await;
}

/// Test that shutdown persists the namespace for the next start
#[tokio::test]
async fn test_shutdown_persists_snapshot() {
    let dir = TempDir::new().unwrap();
    let server = RunningServer::start(&dir).await;
    let mut session = connect_session(&server).await;
    session.open("/durable.txt").await.unwrap();
    session.write(0, b"survives restart").unwrap();
    session.close().await.unwrap();
    drop(session);
    server.shutdown().await;

    let config = loopback_config(&dir);
    assert!(config.storage.snapshot_path.exists());

    let restarted = RunningServer::start(&dir).await;
    assert_eq!(
        restarted.store.get_file("/durable.txt").unwrap(),
        b"survives restart"
    );
    restarted.shutdown().await;
}
