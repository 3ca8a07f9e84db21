//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use axum::body::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use query_gate::admission::{AdmissionController, QueryBudget};
use query_gate::config::GateConfig;
use query_gate::query::{LogQuery, QueryError, QueryExecutor, QueryResponse};
use query_gate::{HttpServer, Shutdown};

/// Executor that sleeps for `delay` (or until cancelled), then echoes the
/// query parameters back. Counts how many queries it was handed.
#[allow(dead_code)]
pub struct SlowExecutor {
    delay: Duration,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl SlowExecutor {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for SlowExecutor {
    async fn execute(
        &self,
        query: LogQuery,
        _budget: QueryBudget,
        cancel: CancellationToken,
    ) -> Result<QueryResponse, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            _ = cancel.cancelled() => Err(QueryError::Cancelled),
            _ = tokio::time::sleep(self.delay) => Ok(QueryResponse {
                content_type: "text/plain".into(),
                body: Bytes::from(query.to_form()),
            }),
        }
    }
}

/// A running gate bound to an ephemeral port.
#[allow(dead_code)]
pub struct TestGate {
    pub addr: SocketAddr,
    pub controller: Arc<AdmissionController>,
    pub shutdown: Shutdown,
    pub server: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

#[allow(dead_code)]
impl TestGate {
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

/// Start a gate with the given limits in front of `executor`.
#[allow(dead_code)]
pub async fn start_gate(config: GateConfig, executor: Arc<dyn QueryExecutor>) -> TestGate {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let controller = Arc::new(AdmissionController::new(config));
    let shutdown = Shutdown::new();

    let server = HttpServer::new(Arc::clone(&controller), executor, shutdown.token());
    let server = tokio::spawn(server.run(listener));

    TestGate {
        addr,
        controller,
        shutdown,
        server,
    }
}

/// Wait until `check` holds, polling every few milliseconds.
#[allow(dead_code)]
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 5s");
}

/// A request as seen by the mock query node.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub head: String,
    pub body: String,
}

/// Start a mock query node. `respond` maps each request to a status and body.
#[allow(dead_code)]
pub async fn start_query_node<F>(respond: F) -> SocketAddr
where
    F: Fn(RecordedRequest) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let respond = Arc::clone(&respond);
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = respond(request);
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            500 => "500 Internal Server Error",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/stream+json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
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

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = String::from_utf8_lossy(&buf[head_end..]).into_owned();
    Some(RecordedRequest { head, body })
}
