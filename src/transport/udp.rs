//! UDP side of the session transport
//!
//! No framing: each inbound datagram is handled independently and the
//! engine's output is returned verbatim-sized to the sender. Ordering and
//! delivery are not guaranteed.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::collaborators::{InferenceEngine, InferenceOutcome};
use crate::queue::TaskQueue;
use crate::{Error, Result};

/// Fixed receive-buffer size; datagrams are bounded to this many bytes
pub const UDP_BUFFER_SIZE: usize = 1024;

/// Unframed datagram listener
pub struct UdpServer {
    socket: UdpSocket,
    engine: Arc<dyn InferenceEngine>,
    queue: Arc<TaskQueue>,
}

impl UdpServer {
    /// Bind the socket
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the socket cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        engine: Arc<dyn InferenceEngine>,
        queue: Arc<TaskQueue>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| Error::Transport(format!("bind {addr}: {e}")))?;
        Ok(Self {
            socket,
            engine,
            queue,
        })
    }

    /// Address the socket is bound to
    ///
    /// # Errors
    ///
    /// Returns error if the local address cannot be determined.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive datagrams until cancelled
    ///
    /// Receive and send failures are logged and the loop continues; a bad
    /// datagram never takes the listener down.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok` after cancellation; the signature
    /// matches the [`crate::supervisor::Service`] body contract.
    pub async fn serve(self, token: CancellationToken) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "datagram listener running");
        let mut buf = vec![0_u8; UDP_BUFFER_SIZE];

        loop {
            let (len, peer) = tokio::select! {
                () = token.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "recv failed");
                        continue;
                    }
                },
            };

            self.handle_datagram(&buf[..len], peer).await;
        }

        tracing::info!("datagram listener stopped");
        Ok(())
    }

    /// Process one datagram
    async fn handle_datagram(&self, datagram: &[u8], peer: SocketAddr) {
        match self.engine.process(datagram).await {
            Ok(InferenceOutcome::Raw(bytes)) => {
                if let Err(e) = self.socket.send_to(&bytes, peer).await {
                    tracing::warn!(peer = %peer, error = %e, "reply send failed");
                }
            }
            Ok(InferenceOutcome::Intent(task)) => {
                tracing::info!(peer = %peer, kind = ?task.kind, "intent recognized");
                self.queue.push(task);
            }
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "inference failed for datagram");
            }
        }
    }
}
