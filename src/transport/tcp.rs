//! TCP side of the session transport
//!
//! The listener accepts one connection per session; the session worker
//! reads exactly one frame, forwards the payload to the inference engine,
//! writes exactly one response frame, and closes. A protocol error on one
//! session produces a `400` response and closes that session only.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::collaborators::{InferenceEngine, InferenceOutcome};
use crate::proto::{encode_request, encode_response, read_frame, Frame, Status};
use crate::queue::TaskQueue;
use crate::transport::{Session, SessionState, TransportKind};
use crate::{Error, Result};

/// Framed request/response listener
pub struct TcpServer {
    listener: TcpListener,
    engine: Arc<dyn InferenceEngine>,
    queue: Arc<TaskQueue>,
    permits: Arc<Semaphore>,
}

impl TcpServer {
    /// Bind the listener
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the socket cannot be bound; this is
    /// fatal at process startup.
    pub async fn bind(
        addr: SocketAddr,
        engine: Arc<dyn InferenceEngine>,
        queue: Arc<TaskQueue>,
        max_sessions: usize,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Transport(format!("bind {addr}: {e}")))?;
        Ok(Self {
            listener,
            engine,
            queue,
            permits: Arc::new(Semaphore::new(max_sessions.max(1))),
        })
    }

    /// Address the listener is bound to
    ///
    /// # Errors
    ///
    /// Returns error if the local address cannot be determined.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until cancelled
    ///
    /// A connection is accepted only once a session permit is free;
    /// arrivals beyond the bound queue in the listener backlog. Accept
    /// failures are logged and the loop continues.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok` after cancellation; the signature
    /// matches the [`crate::supervisor::Service`] body contract.
    pub async fn serve(self, token: CancellationToken) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "transport listener running");

        loop {
            let permit = tokio::select! {
                () = token.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let (stream, peer) = tokio::select! {
                () = token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            let engine = Arc::clone(&self.engine);
            let queue = Arc::clone(&self.queue);
            tokio::spawn(async move {
                let _permit = permit;
                run_session(stream, peer, engine, queue).await;
            });
        }

        tracing::info!("transport listener stopped");
        Ok(())
    }
}

/// Process one request/response exchange, then close the connection
async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    engine: Arc<dyn InferenceEngine>,
    queue: Arc<TaskQueue>,
) {
    let mut session = Session::new(TransportKind::Tcp, peer);
    tracing::debug!(session = %session.id, peer = %peer, "session opened");

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let response = match read_frame(&mut reader).await {
        Ok(frame) => {
            session.advance(SessionState::Processing);
            process_frame(&frame, &engine, &queue, &session).await
        }
        Err(e) => {
            tracing::warn!(session = %session.id, error = %e, "malformed request");
            encode_response(Status::BadRequest, &[])
        }
    };

    session.advance(SessionState::Responding);
    if let Err(e) = write_half.write_all(&response).await {
        tracing::warn!(session = %session.id, error = %e, "response write failed");
    }
    let _ = write_half.shutdown().await;

    session.advance(SessionState::Closed);
    tracing::debug!(session = %session.id, "session closed");
}

/// Forward an assembled frame to the inference engine and build the
/// response
async fn process_frame(
    frame: &Frame,
    engine: &Arc<dyn InferenceEngine>,
    queue: &Arc<TaskQueue>,
    session: &Session,
) -> Vec<u8> {
    match engine.process(&frame.payload).await {
        Ok(InferenceOutcome::Raw(bytes)) => encode_response(Status::Ok, &bytes),
        Ok(InferenceOutcome::Intent(task)) => {
            tracing::info!(session = %session.id, kind = ?task.kind, "intent recognized");
            match serde_json::to_vec(&task) {
                Ok(body) => {
                    queue.push(task);
                    encode_response(Status::Ok, &body)
                }
                Err(e) => {
                    tracing::error!(session = %session.id, error = %e, "intent serialization failed");
                    encode_response(Status::InternalError, &[])
                }
            }
        }
        Err(e) => {
            tracing::warn!(session = %session.id, error = %e, "inference failed");
            encode_response(Status::InternalError, &[])
        }
    }
}

/// Connect to a server, retrying forever with a fixed backoff
///
/// Edge nodes never give up on reaching their server; there is no retry
/// limit and no exponential growth. Returns `None` only if the token is
/// cancelled while waiting.
pub async fn connect_with_retry(
    addr: &str,
    backoff: Duration,
    token: &CancellationToken,
) -> Option<TcpStream> {
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                tracing::info!(addr, "connected");
                return Some(stream);
            }
            Err(e) => {
                tracing::warn!(addr, error = %e, backoff = ?backoff, "connect failed, retrying");
            }
        }

        tokio::select! {
            () = token.cancelled() => return None,
            () = tokio::time::sleep(backoff) => {}
        }
    }
}

/// Send one request frame and read the response
///
/// Client-side counterpart of [`run_session`]; the connection is spent
/// after the exchange.
///
/// # Errors
///
/// Returns error if the write fails or the response frame is malformed.
pub async fn send_request(stream: &mut TcpStream, path: &str, payload: &[u8]) -> Result<Frame> {
    let request = encode_request(path, &HashMap::new(), payload);
    stream.write_all(&request).await?;

    let (read_half, _) = stream.split();
    let mut reader = BufReader::new(read_half);
    let frame = read_frame(&mut reader).await?;
    Ok(frame)
}
