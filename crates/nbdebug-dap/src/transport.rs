//! Backend transport: Content-Length framing and the channel triple the
//! session runs on.

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{broadcast, mpsc};

use crate::bus::EventBus;
use crate::correlator::Correlator;
use crate::error::DapError;
use crate::protocol::{Event, Incoming, Reply, Request};

/// Buffered events per listener before it starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Encode a JSON value as a framed wire message.
pub fn encode_message(value: &serde_json::Value) -> Vec<u8> {
    let body = value.to_string();
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    let mut buf = Vec::with_capacity(header.len() + body.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(body.as_bytes());
    buf
}

/// Largest message body accepted from the backend (64 MiB).
pub const MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// Decode one framed message from the front of `data`.
///
/// Returns the parsed JSON value and the number of bytes consumed.
pub fn decode_message(data: &[u8]) -> Result<(serde_json::Value, usize), DapError> {
    let separator = b"\r\n\r\n";
    let sep_pos = data
        .windows(separator.len())
        .position(|w| w == separator)
        .ok_or_else(|| DapError::Protocol("incomplete header: missing \\r\\n\\r\\n".into()))?;

    let header = std::str::from_utf8(&data[..sep_pos])
        .map_err(|e| DapError::Protocol(format!("header is not UTF-8: {e}")))?;
    let content_length = parse_content_length(header)?;

    let body_start = sep_pos + separator.len();
    let total = body_start + content_length;
    if data.len() < total {
        return Err(DapError::Protocol(format!(
            "incomplete body: expected {content_length} bytes, have {}",
            data.len() - body_start
        )));
    }

    Ok((decode_body(&data[body_start..total])?, total))
}

fn parse_content_length(header: &str) -> Result<usize, DapError> {
    for line in header.split("\r\n") {
        if let Some(value) = line.trim().strip_prefix("Content-Length:") {
            let value = value.trim();
            let length = value.parse::<usize>().map_err(|e| {
                DapError::Protocol(format!("invalid Content-Length value '{value}': {e}"))
            })?;
            if length > MAX_BODY_SIZE {
                return Err(DapError::Protocol(format!(
                    "Content-Length {length} exceeds the {MAX_BODY_SIZE} byte limit"
                )));
            }
            return Ok(length);
        }
    }
    Err(DapError::Protocol("missing Content-Length header".into()))
}

fn decode_body(body: &[u8]) -> Result<serde_json::Value, DapError> {
    serde_json::from_slice(body).map_err(|e| DapError::Protocol(format!("JSON parse error: {e}")))
}

/// Read the next frame's body from a byte stream.
///
/// Returns `Ok(None)` when the stream ends between frames. A bad header
/// leaves the stream position unknown, so it is an error rather than a
/// skipped frame.
async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, DapError>
where
    R: AsyncBufRead + Unpin,
{
    let mut header = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            if header.is_empty() {
                return Ok(None);
            }
            return Err(DapError::Protocol("stream ended inside a header".into()));
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        header.push_str(line);
        header.push_str("\r\n");
    }

    let length = parse_content_length(&header)?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// The engine's side of the backend link.
///
/// Requests go out on `outgoing`, replies come back on `replies`, and
/// events fan out on a broadcast channel so every listener attach gets a
/// fresh subscription.
#[derive(Debug)]
pub struct Connection {
    outgoing: mpsc::Sender<Request>,
    replies: mpsc::Receiver<Reply>,
    events: broadcast::Sender<Event>,
}

/// The backend's side of an in-memory [`Connection`].
#[derive(Debug)]
pub struct BackendChannels {
    /// Requests sent by the engine.
    pub requests: mpsc::Receiver<Request>,
    /// Replies for the engine. Dropping this closes the transport.
    pub replies: mpsc::Sender<Reply>,
    /// Events for the engine.
    pub events: broadcast::Sender<Event>,
}

impl Connection {
    /// A connection backed by plain channels, for embedding and tests.
    pub fn in_memory(capacity: usize) -> (Self, BackendChannels) {
        let (outgoing, requests) = mpsc::channel(capacity);
        let (reply_tx, replies) = mpsc::channel(capacity);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let connection = Self {
            outgoing,
            replies,
            events: events.clone(),
        };
        let backend = BackendChannels {
            requests,
            replies: reply_tx,
            events,
        };
        (connection, backend)
    }

    /// Connect to a backend listening on `addr`.
    pub async fn connect_tcp(addr: impl ToSocketAddrs, capacity: usize) -> Result<Self, DapError> {
        let stream = TcpStream::connect(addr).await?;
        if let Ok(peer) = stream.peer_addr() {
            tracing::info!(%peer, "connected to debug backend");
        }
        let (reader, writer) = stream.into_split();
        Ok(Self::from_stream(reader, writer, capacity))
    }

    /// Run the wire protocol over an arbitrary byte stream.
    ///
    /// Spawns a writer task that frames requests and a reader task that
    /// deframes incoming messages and routes them to the reply channel or
    /// the event broadcast.
    pub fn from_stream<R, W>(reader: R, writer: W, capacity: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (connection, backend) = Self::in_memory(capacity);
        let BackendChannels {
            requests,
            replies,
            events,
        } = backend;
        tokio::spawn(write_requests(writer, requests));
        tokio::spawn(read_messages(reader, replies, events));
        connection
    }

    /// Subscribe to backend events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Split into the raw channel ends.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Sender<Request>,
        mpsc::Receiver<Reply>,
        broadcast::Sender<Event>,
    ) {
        (self.outgoing, self.replies, self.events)
    }

    /// Wrap the request/reply half in a [`Correlator`], discarding the
    /// event half.
    pub fn into_correlator(self, bus: EventBus) -> Correlator {
        Correlator::new(self.outgoing, self.replies, bus)
    }
}

async fn write_requests<W>(mut writer: W, mut requests: mpsc::Receiver<Request>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(request) = requests.recv().await {
        let value = match serde_json::to_value(&request) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(seq = request.seq, "cannot serialize request: {e}");
                continue;
            }
        };
        let frame = encode_message(&value);
        if let Err(e) = writer.write_all(&frame).await {
            tracing::warn!("write to backend failed: {e}");
            break;
        }
        if let Err(e) = writer.flush().await {
            tracing::warn!("flush to backend failed: {e}");
            break;
        }
    }
    tracing::debug!("request writer stopped");
}

async fn read_messages<R>(reader: R, replies: mpsc::Sender<Reply>, events: broadcast::Sender<Event>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    loop {
        let body = match read_frame(&mut reader).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                tracing::info!("debug backend closed the connection");
                return;
            }
            Err(e) => {
                // Dropping `replies` here fails every pending request.
                tracing::warn!("dropping backend link: {e}");
                return;
            }
        };

        match decode_body(&body).and_then(Incoming::from_value) {
            Ok(Incoming::Reply(reply)) => {
                if replies.send(reply).await.is_err() {
                    tracing::debug!("reply receiver gone");
                    return;
                }
            }
            Ok(Incoming::Event(event)) => {
                tracing::trace!(event = %event.event, "event received");
                // No listener attached is fine.
                let _ = events.send(event);
            }
            Err(e) => tracing::warn!("{e}"),
        }
    }
}
