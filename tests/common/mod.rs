//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use tunnel_relay::net::SessionTracker;
use tunnel_relay::policy::PolicyKind;
use tunnel_relay::{RelayConfig, RelayError, RelayServer, Shutdown};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Loopback-only config with ephemeral ports everywhere.
pub fn test_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.hostname = "ria.test".into();
    config.listener.bind_address = "127.0.0.1".into();
    config.listener.endpoint_port = 0;
    config.listener.http_port = 0;
    config.policy.flex_port = 0;
    config.policy.silverlight_port = 0;
    config.shutdown.drain_timeout_secs = 1;
    config
}

/// A running relay and the addresses it listens on.
pub struct TestRelay {
    pub endpoint_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub flex_addr: Option<SocketAddr>,
    pub silverlight_addr: Option<SocketAddr>,
    pub sessions: SessionTracker,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), RelayError>>,
}

pub async fn start_relay(config: RelayConfig) -> TestRelay {
    let server = RelayServer::bind(config).await.unwrap();
    let shutdown = Shutdown::new();
    TestRelay {
        endpoint_addr: server.endpoint_addr().unwrap(),
        http_addr: server.http_addr().unwrap(),
        flex_addr: server.policy_addr(PolicyKind::Flex),
        silverlight_addr: server.policy_addr(PolicyKind::Silverlight),
        sessions: server.sessions(),
        shutdown: shutdown.clone(),
        task: tokio::spawn(server.run(shutdown)),
    }
}

/// A fake rich client connected to the endpoint port.
pub struct FakeEndpoint {
    stream: BufReader<TcpStream>,
}

impl FakeEndpoint {
    /// Connect and send a handshake that is not a policy request.
    pub async fn connect(addr: SocketAddr) -> Self {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"hello relay").await.unwrap();
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Next tunneled request line, without the newline.
    pub async fn next_line(&mut self) -> String {
        let mut line = String::new();
        tokio::time::timeout(TIMEOUT, self.stream.read_line(&mut line))
            .await
            .expect("endpoint line timed out")
            .unwrap();
        assert!(line.ends_with('\n'), "line not newline-terminated: {:?}", line);
        line.pop();
        line
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        let stream = self.stream.get_mut();
        stream.write_all(bytes).await.unwrap();
        stream.flush().await.unwrap();
    }

    /// Close with a zero linger so the relay sees a connection reset
    /// instead of end-of-stream.
    #[allow(deprecated)]
    pub fn reset(self) {
        self.stream.get_ref().set_linger(Some(Duration::ZERO)).unwrap();
        drop(self.stream);
    }
}

/// Send a raw request on a fresh HTTP-side connection and read until the
/// relay closes it.
pub async fn http_exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(TIMEOUT, stream.read_to_end(&mut response))
        .await
        .expect("HTTP-side response timed out")
        .unwrap();
    response
}

/// Poll until `f` holds or the timeout elapses.
pub async fn eventually<F: Fn() -> bool>(f: F) -> bool {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if f() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    f()
}
