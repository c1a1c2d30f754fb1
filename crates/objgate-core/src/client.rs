//! TCP client for a gateway server.
//!
//! [`GatewayClient::connect`] waits for the server's admission line and fails
//! with [`GatewayError::AdmissionRejected`] on `BUSY`. Each
//! [`GatewayClient::send`] writes one request and reads exactly one reply
//! under the client's read timeout.
//!
//! # Thread Safety
//!
//! The client uses a tokio `Mutex` to serialize access to the connection, so
//! concurrent callers never interleave request and reply lines.

use crate::codec::{
    read_line, write_line, ObjectReference, Reply, Request, Target, WireValue,
};
use crate::config::{ClientConfig, GatewayConfig};
use crate::retry::{retry_async, RetryConfig};
use crate::{GatewayError, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Set once the stream can no longer be trusted to be in sync.
    broken: bool,
}

/// Client connected to a gateway server.
pub struct GatewayClient {
    conn: Mutex<Connection>,
    addr: SocketAddr,
    read_timeout: Duration,
}

impl GatewayClient {
    /// Connect and wait for admission.
    ///
    /// `connect_timeout` bounds both the TCP connect and the wait for the
    /// admission line.
    pub async fn connect(addr: SocketAddr, connect_timeout: Duration) -> Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| GatewayError::ConnectionFailed {
                message: format!("connect to {} timed out after {:?}", addr, connect_timeout),
                source: None,
            })?
            .map_err(|e| GatewayError::connection(format!("cannot connect to {}", addr), e))?;

        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let greeting = timeout(
            connect_timeout,
            read_line(&mut reader, GatewayConfig::MAX_LINE_BYTES),
        )
        .await
        .map_err(|_| GatewayError::RequestTimeout(connect_timeout))?
        .map_err(transport_error)?
        .ok_or_else(|| closed_by_server(addr))?;

        match Reply::parse(&greeting)? {
            Reply::Accepted => {}
            Reply::Busy => {
                debug!("Gateway at {} is busy", addr);
                return Err(GatewayError::AdmissionRejected {
                    addr: addr.to_string(),
                });
            }
            other => {
                return Err(GatewayError::MalformedReply {
                    message: format!("expected admission reply, got {:?}", other),
                })
            }
        }

        debug!("Gateway client connected to {}", addr);
        Ok(Self {
            conn: Mutex::new(Connection {
                reader,
                writer,
                broken: false,
            }),
            addr,
            read_timeout: ClientConfig::READ_TIMEOUT,
        })
    }

    /// Connect, retrying busy or unreachable servers according to `retry`.
    pub async fn connect_with_retry(
        addr: SocketAddr,
        connect_timeout: Duration,
        retry: &RetryConfig,
    ) -> Result<Self> {
        retry_async(
            retry,
            || Self::connect(addr, connect_timeout),
            GatewayError::is_retryable,
        )
        .await
        .result
    }

    /// Set the per-request read timeout.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Send a request and read its reply.
    ///
    /// Fault replies are returned as `Ok(Reply::Fault { .. })`; use
    /// [`Reply::into_result`] to turn them into errors. After a timeout or
    /// transport failure the client is unusable and every later call fails
    /// with [`GatewayError::ConnectionFailed`].
    pub async fn send(&self, request: &Request) -> Result<Reply> {
        self.send_line(&request.encode()).await
    }

    /// Send one raw protocol line and read its reply.
    pub async fn send_line(&self, line: &str) -> Result<Reply> {
        let mut conn = self.conn.lock().await;
        if conn.broken {
            return Err(GatewayError::ConnectionFailed {
                message: format!("connection to {} is no longer usable", self.addr),
                source: None,
            });
        }

        let result = Self::exchange(&mut conn, line, self.read_timeout, self.addr).await;
        if let Err(e) = &result {
            if e.is_transport() || matches!(e, GatewayError::RequestTimeout(_)) {
                conn.broken = true;
            }
        }
        result
    }

    async fn exchange(
        conn: &mut Connection,
        line: &str,
        read_timeout: Duration,
        addr: SocketAddr,
    ) -> Result<Reply> {
        write_line(&mut conn.writer, line)
            .await
            .map_err(transport_error)?;

        let reply = timeout(
            read_timeout,
            read_line(&mut conn.reader, GatewayConfig::MAX_LINE_BYTES),
        )
        .await
        .map_err(|_| GatewayError::RequestTimeout(read_timeout))?
        .map_err(transport_error)?
        .ok_or_else(|| closed_by_server(addr))?;

        Reply::parse(&reply)
    }

    /// Create an instance of `type_name`; faults become errors.
    pub async fn create(&self, type_name: &str, args: Vec<Vec<WireValue>>) -> Result<Reply> {
        self.send(&Request::Create {
            type_name: type_name.to_string(),
            args,
        })
        .await?
        .into_result()
    }

    /// Invoke `method` on `target`; faults become errors.
    pub async fn invoke(
        &self,
        target: Target,
        method: &str,
        args: Vec<Vec<WireValue>>,
    ) -> Result<Reply> {
        self.send(&Request::Invoke {
            target,
            method: method.to_string(),
            args,
        })
        .await?
        .into_result()
    }

    /// Reconcile the server registry to exactly `live`.
    pub async fn sync(&self, live: &[ObjectReference]) -> Result<()> {
        match self.send(&Request::Reconcile(live.to_vec())).await?.into_result()? {
            Reply::Ack => Ok(()),
            other => Err(GatewayError::MalformedReply {
                message: format!("expected acknowledgement for sync, got {:?}", other),
            }),
        }
    }

    /// Say goodbye and release the socket.
    ///
    /// The `close` request is best-effort: failures and timeouts are ignored
    /// and the connection is dropped regardless.
    pub async fn close(self) {
        let mut conn = self.conn.into_inner();
        if !conn.broken {
            let goodbye = Self::exchange(
                &mut conn,
                &Request::Close.encode(),
                ClientConfig::CLOSE_TIMEOUT,
                self.addr,
            )
            .await;
            if let Err(e) = goodbye {
                debug!("Close handshake with {} failed: {}", self.addr, e);
            }
        }
        let _ = conn.writer.shutdown().await;
    }
}

/// Map a stream failure to the client's error taxonomy.
fn transport_error(err: GatewayError) -> GatewayError {
    match err {
        GatewayError::Io { message, source } => GatewayError::ConnectionFailed { message, source },
        GatewayError::MalformedRequest { message } => GatewayError::MalformedReply { message },
        other => other,
    }
}

fn closed_by_server(addr: SocketAddr) -> GatewayError {
    GatewayError::ConnectionFailed {
        message: format!("{} closed the connection", addr),
        source: None,
    }
}
