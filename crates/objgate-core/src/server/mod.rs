//! TCP gateway server.
//!
//! Binds the configured address, admits connections into a bounded waiting
//! queue and serves them with a fixed pool of workers. Every admitted
//! connection is greeted with `ACCEPTED`; a connection arriving while the
//! queue is full is greeted with `BUSY` and closed.
//!
//! # Thread Safety
//!
//! The server runs on the tokio runtime: one acceptor task plus one task per
//! worker. Request execution is delegated to a [`RequestHandler`] shared via
//! `Arc`; handlers synchronize internally.

mod listener;
mod worker;

use crate::config::ServerConfig;
use crate::dispatch::RequestHandler;
use crate::{GatewayError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::info;

/// An admitted connection waiting for a worker.
pub(crate) struct ConnectionSlot {
    pub(crate) stream: TcpStream,
    pub(crate) peer_addr: SocketAddr,
}

/// Handle to a running gateway server. Dropping stops it without waiting.
pub struct GatewayServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    worker_shutdown_tx: watch::Sender<bool>,
    acceptor: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl GatewayServerHandle {
    /// Get the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the bound port (useful when started on port 0).
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Shut down the server gracefully.
    ///
    /// Stops accepting first, then lets every worker finish the request it
    /// is executing before returning. Connections still waiting in the queue
    /// are closed without being served.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.await;
        }

        self.worker_shutdown_tx.send_replace(true);
        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }
        info!("Gateway server on {} stopped", self.addr);
    }
}

impl Drop for GatewayServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.worker_shutdown_tx.send_replace(true);
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
        for worker in self.workers.drain(..) {
            worker.abort();
        }
    }
}

/// Gateway server entry point.
pub struct GatewayServer;

impl GatewayServer {
    /// Validate `config`, bind and start serving with `handler`.
    ///
    /// Returns once the listener is bound; the server runs in background
    /// tokio tasks until the returned handle is shut down or dropped.
    pub async fn start<H: RequestHandler>(
        config: &ServerConfig,
        handler: Arc<H>,
    ) -> Result<GatewayServerHandle> {
        config.validate()?;
        let bind_addr = config.bind_addr()?;
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| GatewayError::connection(format!("cannot bind {}", bind_addr), e))?;
        let addr = listener.local_addr()?;

        info!(
            "Gateway listening on {} ({} workers, {} waiting slots)",
            addr,
            config.workers(),
            config.max_waiting()
        );

        let (queue_tx, queue_rx) = mpsc::channel::<ConnectionSlot>(config.max_waiting());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);

        let workers =
            worker::spawn_workers(config.workers(), queue_rx, handler, worker_shutdown_rx);
        let acceptor = tokio::spawn(listener::accept_loop(listener, queue_tx, shutdown_rx));

        Ok(GatewayServerHandle {
            addr,
            shutdown_tx: Some(shutdown_tx),
            worker_shutdown_tx,
            acceptor: Some(acceptor),
            workers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{read_line, write_line, Reply, Request, WireValue};
    use std::time::Duration;
    use tokio::io::BufReader;
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    /// Replies with the invoked method name; `slow` sleeps first and `verse`
    /// answers with two lines of text.
    struct EchoHandler;

    #[async_trait::async_trait]
    impl RequestHandler for EchoHandler {
        async fn handle(&self, request: Request) -> Reply {
            match request {
                Request::Invoke { method, .. } => {
                    if method == "slow" {
                        tokio::time::sleep(Duration::from_millis(400)).await;
                    }
                    if method == "verse" {
                        return Reply::Value(WireValue::Text("line1\nline2".to_string()));
                    }
                    Reply::Value(WireValue::Text(method))
                }
                _ => Reply::Ack,
            }
        }
    }

    struct Peer {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl Peer {
        async fn connect(addr: SocketAddr) -> (Self, Option<String>) {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (reader, writer) = stream.into_split();
            let mut peer = Peer {
                reader: BufReader::new(reader),
                writer,
            };
            let greeting = peer.next_line().await;
            (peer, greeting)
        }

        async fn next_line(&mut self) -> Option<String> {
            timeout(WAIT, read_line(&mut self.reader, 1024))
                .await
                .expect("timed out waiting for a line")
                .unwrap_or(None)
        }

        async fn send(&mut self, line: &str) {
            write_line(&mut self.writer, line).await.unwrap();
        }

        async fn request(&mut self, line: &str) -> String {
            self.send(line).await;
            self.next_line().await.expect("connection closed")
        }
    }

    async fn start(workers: usize, max_waiting: usize) -> GatewayServerHandle {
        let config = ServerConfig::new(0, workers, max_waiting).unwrap();
        GatewayServer::start(&config, Arc::new(EchoHandler))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_binds_ephemeral_port() {
        let server = start(1, 1).await;
        assert_ne!(server.port(), 0);
        assert_eq!(server.addr().port(), server.port());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let config: ServerConfig = serde_json::from_str(r#"{"workers": 0}"#).unwrap();
        let result = GatewayServer::start(&config, Arc::new(EchoHandler)).await;
        assert!(matches!(result, Err(GatewayError::Config { .. })));
    }

    #[tokio::test]
    async fn test_admission_accepts_until_queue_full() {
        let server = start(1, 1).await;
        let addr = server.addr();

        let (mut a, greeting) = Peer::connect(addr).await;
        assert_eq!(greeting.as_deref(), Some("ACCEPTED"));
        // A reply proves the single worker has taken A off the queue.
        assert_eq!(a.request("method;demo.T;first").await, "characterfirst");

        let (mut b, greeting) = Peer::connect(addr).await;
        assert_eq!(greeting.as_deref(), Some("ACCEPTED"));

        let (mut c, greeting) = Peer::connect(addr).await;
        assert_eq!(greeting.as_deref(), Some("BUSY"));
        assert_eq!(c.next_line().await, None);

        assert_eq!(a.request("close").await, "CLOSING");
        assert_eq!(b.request("method;demo.T;second").await, "charactersecond");

        let (_d, greeting) = Peer::connect(addr).await;
        assert_eq!(greeting.as_deref(), Some("ACCEPTED"));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_requests_answered_in_order() {
        let server = start(2, 4).await;
        let (mut peer, _) = Peer::connect(server.addr()).await;

        peer.send("method;demo.T;slow").await;
        peer.send("method;demo.T;fast").await;
        peer.send("sync").await;

        assert_eq!(peer.next_line().await.as_deref(), Some("characterslow"));
        assert_eq!(peer.next_line().await.as_deref(), Some("characterfast"));
        assert_eq!(
            peer.next_line().await.as_deref(),
            Some("REQUEST_RECEIVED_AND_PROCESSED")
        );
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_slow_request_does_not_stall_other_connections() {
        let server = start(2, 4).await;
        let (mut slow, _) = Peer::connect(server.addr()).await;
        let (mut quick, _) = Peer::connect(server.addr()).await;

        slow.send("method;demo.T;slow").await;
        let started = tokio::time::Instant::now();
        assert_eq!(quick.request("method;demo.T;now").await, "characternow");
        assert!(started.elapsed() < Duration::from_millis(400));

        assert_eq!(slow.next_line().await.as_deref(), Some("characterslow"));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_line_keeps_connection_usable() {
        let server = start(1, 1).await;
        let (mut peer, _) = Peer::connect(server.addr()).await;

        let reply = peer.request("explode;now").await;
        assert!(reply.starts_with("FAULT;MalformedRequest;"), "{}", reply);
        assert_eq!(peer.request("method;demo.T;after").await, "characterafter");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_keeps_connection_usable() {
        use tokio::io::AsyncWriteExt;

        let server = start(1, 1).await;
        let (mut peer, _) = Peer::connect(server.addr()).await;

        peer.writer.write_all(b"create;p.\xff\xfe\n").await.unwrap();
        let reply = peer.next_line().await.expect("connection closed");
        assert!(reply.starts_with("FAULT;MalformedRequest;"), "{}", reply);
        assert_eq!(peer.request("method;demo.T;after").await, "characterafter");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_multiline_text_reply_keeps_replies_in_step() {
        let server = start(1, 1).await;
        let (mut peer, _) = Peer::connect(server.addr()).await;

        let reply = peer.request("method;demo.T;verse").await;
        assert_eq!(reply, "characterline1\\nline2");
        assert_eq!(
            Reply::parse(&reply).unwrap(),
            Reply::Value(WireValue::Text("line1\nline2".to_string()))
        );
        assert_eq!(peer.request("sync").await, "REQUEST_RECEIVED_AND_PROCESSED");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_line_closes_connection() {
        let server = start(1, 1).await;
        let (mut peer, _) = Peer::connect(server.addr()).await;

        let huge = "x".repeat(crate::config::GatewayConfig::MAX_LINE_BYTES + 16);
        let _ = write_line(&mut peer.writer, &huge).await;
        // The fault line may be lost to a reset since the tail of the line is never read.
        if let Some(reply) = peer.next_line().await {
            assert!(reply.starts_with("FAULT;MalformedRequest;"), "{}", reply);
            assert_eq!(peer.next_line().await, None);
        }

        // The worker is free again.
        let (mut next, greeting) = Peer::connect(server.addr()).await;
        assert_eq!(greeting.as_deref(), Some("ACCEPTED"));
        assert_eq!(next.request("method;demo.T;ok").await, "characterok");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_peer_disconnect_frees_worker() {
        let server = start(1, 1).await;
        {
            let (mut peer, _) = Peer::connect(server.addr()).await;
            assert_eq!(peer.request("method;demo.T;one").await, "characterone");
        }
        let (mut peer, _) = Peer::connect(server.addr()).await;
        assert_eq!(peer.request("method;demo.T;two").await, "charactertwo");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_connections_and_listener() {
        let server = start(1, 2).await;
        let addr = server.addr();
        let (mut served, _) = Peer::connect(addr).await;
        assert_eq!(served.request("method;demo.T;x").await, "characterx");
        let (mut queued, _) = Peer::connect(addr).await;

        timeout(WAIT, server.shutdown())
            .await
            .expect("shutdown hung");

        assert_eq!(served.next_line().await, None);
        assert_eq!(queued.next_line().await, None);
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_request() {
        let server = start(1, 1).await;
        let (mut peer, _) = Peer::connect(server.addr()).await;
        peer.send("method;demo.T;slow").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        server.shutdown().await;
        assert_eq!(peer.next_line().await.as_deref(), Some("characterslow"));
    }
}
