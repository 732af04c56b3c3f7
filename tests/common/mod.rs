//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dispatch_proxy::config::ProxyConfig;
use dispatch_proxy::http::HttpServer;
use dispatch_proxy::lifecycle::Shutdown;
use dispatch_proxy::net::listener::Listener;
use dispatch_proxy::observability::metrics::Counters;
use dispatch_proxy::resilience::CircuitBreaker;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start a programmable mock backend on an ephemeral loopback port.
///
/// `f` receives the raw request head (request line and headers) and returns
/// the status code and body to answer with. Every response carries an
/// `X-Backend` header naming the backend's port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        let (status, body) = f(head).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nX-Backend: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            addr.port(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock backend that always answers 200 with `body`.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, body.to_string()) }).await
}

/// Start a backend that writes `partial` (a response head and part of its
/// body) and then holds the connection open for `stall`.
#[allow(dead_code)]
pub async fn start_stalling_backend(partial: &'static str, stall: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let _ = socket.write_all(partial.as_bytes()).await;
                let _ = socket.flush().await;
                tokio::time::sleep(stall).await;
            });
        }
    });

    addr
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Config pointing at `backends` with test-friendly limits.
pub fn proxy_config(backends: &[SocketAddr]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.backends = backends.iter().map(|a| format!("http://{}", a)).collect();
    config.upstream.write_timeout = Duration::from_secs(2);
    config.rate_limit.requests_per_second = 1_000;
    config
}

/// Running proxy bound to an ephemeral loopback port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub counters: Arc<Counters>,
    pub health: Arc<CircuitBreaker>,
    shutdown: Shutdown,
}

impl TestProxy {
    pub async fn start(config: ProxyConfig) -> Self {
        let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = tcp.local_addr().unwrap();
        let listener = Listener::from_tcp(tcp, &config.listener);

        let shutdown = Shutdown::new();
        let receiver = shutdown.subscribe();
        let server = HttpServer::new(config);
        let counters = server.state().counters.clone();
        let health = server.state().health.clone();
        tokio::spawn(async move {
            server.run(listener, receiver).await.unwrap();
        });

        Self {
            addr,
            counters,
            health,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
