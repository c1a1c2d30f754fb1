//! Fixed pool of workers serving admitted connections.
//!
//! Each worker takes one connection at a time from the waiting queue and
//! serves it until the peer closes, sends `close`, or the server shuts down.
//! Requests on a connection are handled strictly in order: the reply to one
//! request is written before the next line is read.

use super::ConnectionSlot;
use crate::codec::{read_line, write_line, Reply, Request};
use crate::config::GatewayConfig;
use crate::dispatch::RequestHandler;
use crate::{GatewayError, Result};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub(crate) fn spawn_workers<H: RequestHandler>(
    count: usize,
    queue: mpsc::Receiver<ConnectionSlot>,
    handler: Arc<H>,
    shutdown_rx: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let queue = Arc::new(Mutex::new(queue));
    (0..count)
        .map(|id| {
            tokio::spawn(run_worker(
                id,
                queue.clone(),
                handler.clone(),
                shutdown_rx.clone(),
            ))
        })
        .collect()
}

async fn run_worker<H: RequestHandler>(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<ConnectionSlot>>>,
    handler: Arc<H>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!("Worker {} started", id);
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown_rx) => None,
            slot = async { queue.lock().await.recv().await } => slot,
        };
        let Some(slot) = next else {
            break;
        };

        debug!("Worker {} serving {}", id, slot.peer_addr);
        match serve_connection(slot.stream, &*handler, &mut shutdown_rx).await {
            Ok(()) => debug!("Worker {} finished with {}", id, slot.peer_addr),
            Err(e) => debug!("Connection {} ended: {}", slot.peer_addr, e),
        }
    }
    info!("Worker {} stopped", id);
}

/// Resolves once shutdown is signalled or the server handle is gone.
async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

async fn serve_connection<H: RequestHandler>(
    stream: TcpStream,
    handler: &H,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown_requested(shutdown_rx) => return Ok(()),
            result = read_line(&mut reader, GatewayConfig::MAX_LINE_BYTES) => result,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(()), // Clean disconnect
            Err(e) if e.is_transport() => return Err(e),
            Err(e @ GatewayError::LineTooLong { .. }) => {
                // The tail of the line is still unread, so the stream cannot be resynchronised.
                let _ = write_line(&mut writer, &Reply::fault(&e).encode()).await;
                return Err(e);
            }
            Err(e) => {
                debug!("Rejected undecodable line: {}", e);
                write_line(&mut writer, &Reply::fault(&e).encode()).await?;
                continue;
            }
        };

        let request = match Request::parse(&line) {
            Ok(request) => request,
            Err(e) => {
                debug!("Rejected line {:?}: {}", line, e);
                write_line(&mut writer, &Reply::fault(&e).encode()).await?;
                continue;
            }
        };

        if matches!(request, Request::Close) {
            write_line(&mut writer, &Reply::Closing.encode()).await?;
            let _ = writer.shutdown().await;
            return Ok(());
        }

        let reply = handler.handle(request).await;
        write_line(&mut writer, &reply.encode()).await?;
    }
}
