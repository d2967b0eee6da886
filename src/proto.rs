//! Frame codec for the Harken wire protocol
//!
//! A frame is a start line, a block of `key: value` header lines terminated
//! by a blank line, and exactly `Content-Length` raw payload bytes. The
//! payload may arrive across any number of partial reads; the decoder
//! accumulates until the declared length is collected. A frame without a
//! `Content-Length` header is rejected before any payload read is attempted.

use std::collections::HashMap;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Protocol version used on request and response start lines
pub const VERSION: &str = "HARKEN/1.0";

/// Header carrying the payload length (mandatory)
pub const CONTENT_LENGTH: &str = "Content-Length";

/// Header carrying the payload media type
pub const CONTENT_TYPE: &str = "Content-Type";

/// Upper bound on a single header line, to keep malformed peers from
/// growing the buffer without limit
const MAX_HEADER_LINE: usize = 8 * 1024;

/// Upper bound on a declared payload length; larger frames are rejected
/// before any buffer is allocated
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Errors produced while decoding a frame
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Header block ended without a `Content-Length` header
    #[error("missing Content-Length header")]
    MissingLength,

    /// `Content-Length` header was present but not a valid length
    #[error("invalid Content-Length value: {0}")]
    InvalidLength(String),

    /// `Content-Length` declared a payload larger than the codec accepts
    #[error("payload length {0} exceeds the {MAX_PAYLOAD_SIZE} byte limit")]
    PayloadTooLarge(usize),

    /// A header line had no `key: value` shape
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// The stream ended before the frame was fully assembled
    #[error("connection closed mid-frame")]
    UnexpectedEof,

    /// Underlying stream failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Response status for the reply frame of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Request processed
    Ok,
    /// Request frame was malformed
    BadRequest,
    /// Collaborator failed while processing the request
    InternalError,
}

impl Status {
    /// Status line text, mirroring HTTP conventions
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "200 OK",
            Self::BadRequest => "400 Bad Request",
            Self::InternalError => "500 Internal Server Error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded request or response frame
///
/// Invariant: once assembled, `headers[CONTENT_LENGTH]` equals
/// `payload.len()`. Frames are not mutated after decoding.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Request line (`<verb> <path> <version>`) or status line
    /// (`<version> <status>`)
    pub start_line: String,
    /// Header block, one entry per `key: value` line
    pub headers: HashMap<String, String>,
    /// Raw payload bytes
    pub payload: Vec<u8>,
}

impl Frame {
    /// Declared payload length, if the header parses
    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get(CONTENT_LENGTH)?.parse().ok()
    }

    /// Whether this frame's start line reports the given status
    #[must_use]
    pub fn has_status(&self, status: Status) -> bool {
        self.start_line.ends_with(status.as_str())
    }
}

/// Encode a request frame for the given path and payload
#[must_use]
pub fn encode_request(path: &str, headers: &HashMap<String, String>, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 128);
    buf.extend_from_slice(format!("POST {path} {VERSION}\r\n").as_bytes());
    for (key, value) in headers {
        // The length line is always derived from the actual payload.
        if key == CONTENT_LENGTH {
            continue;
        }
        buf.extend_from_slice(format!("{key}: {value}\r\n").as_bytes());
    }
    if !headers.contains_key(CONTENT_TYPE) {
        buf.extend_from_slice(format!("{CONTENT_TYPE}: application/octet-stream\r\n").as_bytes());
    }
    buf.extend_from_slice(format!("{CONTENT_LENGTH}: {}\r\n\r\n", payload.len()).as_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Encode a response frame
///
/// The response always declares `Content-Length` and `Connection: close`;
/// the server closes the connection after writing it.
#[must_use]
pub fn encode_response(status: Status, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 128);
    buf.extend_from_slice(format!("{VERSION} {status}\r\n").as_bytes());
    buf.extend_from_slice(format!("{CONTENT_TYPE}: application/octet-stream\r\n").as_bytes());
    buf.extend_from_slice(format!("{CONTENT_LENGTH}: {}\r\n", payload.len()).as_bytes());
    buf.extend_from_slice(b"Connection: close\r\n\r\n");
    buf.extend_from_slice(payload);
    buf
}

/// Read one frame from the stream
///
/// # Errors
///
/// Returns [`ProtocolError::MissingLength`] if the header block ends
/// without a `Content-Length` header (no payload read is attempted),
/// [`ProtocolError::UnexpectedEof`] if the peer closes mid-frame, and
/// other variants for malformed headers or stream failures.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let start_line = read_header_line(reader).await?;

    let mut headers = HashMap::new();
    loop {
        let line = read_header_line(reader).await?;
        if line.is_empty() {
            break;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| ProtocolError::MalformedHeader(line.clone()))?;
        headers.insert(key.trim().to_string(), value.trim().to_string());
    }

    let declared = headers
        .get(CONTENT_LENGTH)
        .ok_or(ProtocolError::MissingLength)?;
    let length: usize = declared
        .parse()
        .map_err(|_| ProtocolError::InvalidLength(declared.clone()))?;
    if length > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge(length));
    }

    let mut payload = vec![0_u8; length];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::UnexpectedEof
        } else {
            ProtocolError::Io(e)
        }
    })?;

    Ok(Frame {
        start_line,
        headers,
        payload,
    })
}

/// Read one CRLF-terminated header line, without the terminator
///
/// The read goes through a limited reader, so an over-long or
/// never-terminated line is rejected after at most `MAX_HEADER_LINE`
/// bytes are buffered.
async fn read_header_line<R>(reader: &mut R) -> Result<String, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = (&mut *reader).take(MAX_HEADER_LINE as u64 + 1);
    let n = limited.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Err(ProtocolError::UnexpectedEof);
    }
    if !buf.ends_with(b"\n") {
        if buf.len() > MAX_HEADER_LINE {
            return Err(ProtocolError::MalformedHeader(
                "header line too long".to_string(),
            ));
        }
        return Err(ProtocolError::UnexpectedEof);
    }
    while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf)
        .map_err(|_| ProtocolError::MalformedHeader("invalid utf-8 in header".to_string()))
}
