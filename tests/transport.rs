//! Session transport integration tests

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;

use harken_core::proto::{read_frame, Status};
use harken_core::transport::{connect_with_retry, send_request, TcpServer, UdpServer};
use harken_core::{InferenceEngine, InferenceOutcome, Result, TaskKind, TaskQueue};

mod common;
use common::{EchoEngine, IntentEngine};

/// Bind a TCP server on an ephemeral port and serve it in the background
async fn spawn_server(
    engine: Arc<dyn InferenceEngine>,
    max_sessions: usize,
) -> (SocketAddr, CancellationToken, Arc<TaskQueue>) {
    let queue = Arc::new(TaskQueue::new());
    let server = TcpServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        engine,
        Arc::clone(&queue),
        max_sessions,
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let token = CancellationToken::new();
    tokio::spawn(server.serve(token.clone()));
    (addr, token, queue)
}

#[tokio::test]
async fn round_trip_returns_processed_payload() {
    let (addr, token, _queue) = spawn_server(Arc::new(EchoEngine), 8).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let response = send_request(&mut stream, "/process", &[0x01, 0x02, 0x03, 0x04])
        .await
        .unwrap();

    assert!(response.has_status(Status::Ok));
    assert_eq!(response.content_length(), Some(4));
    assert_eq!(response.payload, vec![0x01, 0x02, 0x03, 0x04]);

    // One request per connection: the server closes after responding.
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    token.cancel();
}

#[tokio::test]
async fn missing_length_gets_bad_request() {
    let (addr, token, _queue) = spawn_server(Arc::new(EchoEngine), 8).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"POST /process HARKEN/1.0\r\nContent-Type: application/octet-stream\r\n\r\n")
        .await
        .unwrap();

    let (read_half, _) = stream.split();
    let mut reader = BufReader::new(read_half);
    let response = read_frame(&mut reader).await.unwrap();

    assert!(response.has_status(Status::BadRequest));
    assert_eq!(response.content_length(), Some(0));

    // The server closed the connection after the error response.
    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    token.cancel();
}

#[tokio::test]
async fn malformed_session_does_not_affect_others() {
    let (addr, token, _queue) = spawn_server(Arc::new(EchoEngine), 8).await;

    // Open a healthy session first, then wreck a second one.
    let mut healthy = TcpStream::connect(addr).await.unwrap();
    let mut broken = TcpStream::connect(addr).await.unwrap();

    broken
        .write_all(b"POST / HARKEN/1.0\r\nContent-Type: text/plain\r\n\r\n")
        .await
        .unwrap();
    let (broken_read, _) = broken.split();
    let mut broken_reader = BufReader::new(broken_read);
    let error_response = read_frame(&mut broken_reader).await.unwrap();
    assert!(error_response.has_status(Status::BadRequest));

    // The healthy session is untouched.
    let response = send_request(&mut healthy, "/process", b"still alive")
        .await
        .unwrap();
    assert!(response.has_status(Status::Ok));
    assert_eq!(response.payload, b"still alive");

    token.cancel();
}

#[tokio::test]
async fn recognized_intent_is_enqueued() {
    let (addr, token, queue) = spawn_server(Arc::new(IntentEngine), 8).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let response = send_request(&mut stream, "/process", b"fake audio")
        .await
        .unwrap();
    assert!(response.has_status(Status::Ok));

    let task = queue.pop().unwrap();
    assert_eq!(task.kind, TaskKind::ControlLight);
    assert_eq!(task.entity_id.as_deref(), Some("light.kitchen"));

    token.cancel();
}

/// Engine that tracks how many sessions run inference concurrently
struct GaugedEngine {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl InferenceEngine for GaugedEngine {
    async fn process(&self, audio: &[u8]) -> Result<InferenceOutcome> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(InferenceOutcome::Raw(audio.to_vec()))
    }
}

#[tokio::test]
async fn admission_control_bounds_concurrent_sessions() {
    let engine = Arc::new(GaugedEngine {
        current: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let engine_dyn: Arc<dyn InferenceEngine> = Arc::clone(&engine) as Arc<dyn InferenceEngine>;
    let (addr, token, _queue) = spawn_server(engine_dyn, 2).await;

    let mut workers = Vec::new();
    for _ in 0..6 {
        workers.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            send_request(&mut stream, "/process", b"load").await.unwrap()
        }));
    }
    for worker in workers {
        let response = worker.await.unwrap();
        assert!(response.has_status(Status::Ok));
    }

    assert!(engine.peak.load(Ordering::SeqCst) <= 2);

    token.cancel();
}

#[tokio::test]
async fn udp_datagram_is_echoed_verbatim() {
    let queue = Arc::new(TaskQueue::new());
    let server = UdpServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        Arc::new(EchoEngine),
        Arc::clone(&queue),
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let token = CancellationToken::new();
    tokio::spawn(server.serve(token.clone()));

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"ping", addr).await.unwrap();

    let mut buf = [0_u8; 64];
    let (len, from) = client.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..len], b"ping");
    assert_eq!(from, addr);

    token.cancel();
}

#[tokio::test]
async fn connect_with_retry_succeeds_once_listener_is_up() {
    let (addr, server_token, _queue) = spawn_server(Arc::new(EchoEngine), 8).await;

    let token = CancellationToken::new();
    let stream = connect_with_retry(&addr.to_string(), Duration::from_millis(20), &token).await;
    assert!(stream.is_some());

    server_token.cancel();
}

#[tokio::test]
async fn connect_with_retry_stops_on_cancellation() {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
    });

    // Unroutable port on localhost: every attempt fails fast, the loop
    // keeps retrying until the token fires.
    let stream = connect_with_retry("127.0.0.1:1", Duration::from_millis(20), &token).await;
    assert!(stream.is_none());
}
