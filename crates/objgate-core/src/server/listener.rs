//! Connection listener with accept-time admission control.
//!
//! A connection is admitted only if a slot can be reserved in the bounded
//! waiting queue at the moment it is accepted; otherwise it is told `BUSY`
//! and closed. The decision never waits for a worker to become free.

use super::ConnectionSlot;
use crate::codec::{write_line, REPLY_ACCEPTED, REPLY_BUSY};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

pub(crate) async fn accept_loop(
    listener: TcpListener,
    queue: mpsc::Sender<ConnectionSlot>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                info!("Gateway listener shutting down");
                break;
            }
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => admit(stream, peer_addr, &queue).await,
                    Err(e) => {
                        error!("Gateway accept error: {}", e);
                    }
                }
            }
        }
    }
}

async fn admit(mut stream: TcpStream, peer_addr: SocketAddr, queue: &mpsc::Sender<ConnectionSlot>) {
    match queue.try_reserve() {
        Ok(permit) => {
            if let Err(e) = write_line(&mut stream, REPLY_ACCEPTED).await {
                debug!("Connection from {} lost during admission: {}", peer_addr, e);
                return;
            }
            debug!("Admitted connection from {}", peer_addr);
            permit.send(ConnectionSlot {
                stream,
                peer_addr,
            });
        }
        Err(_) => {
            warn!(
                "Rejecting connection from {}: waiting queue full ({})",
                peer_addr,
                queue.max_capacity()
            );
            let _ = write_line(&mut stream, REPLY_BUSY).await;
            let _ = stream.shutdown().await;
        }
    }
}
