//! Streaming transport seam and the default HTTP implementation.
//!
//! The supervisor only sees a [`Connector`]: a factory that turns a URL
//! into an [`EventStreamHandle`] whose channel carries `open`, `message`
//! and `error` notices. The default connector speaks Server-Sent Events
//! over a `reqwest` byte stream; tests substitute channel-backed fakes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use futures_util::stream::StreamExt;
use reqwest::header::ACCEPT;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, warn};

/// Errors from the streaming transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stream endpoint returned {status}")]
    Status { status: u16 },

    #[error("stream closed")]
    Closed,
}

/// Notices emitted by a transport while a stream is live.
#[derive(Debug)]
pub enum StreamNotice {
    /// The stream is established and events may follow.
    Open,
    /// One event payload, already deframed by the transport.
    Message(String),
    /// The stream failed. The transport emits nothing after this.
    Error(TransportError),
}

/// Control half of a stream: cancellation plus a closed flag.
///
/// Cancellation is supervisor-initiated and silent; the closed flag is set
/// by the transport itself when its read loop ends on its own, so a stream
/// that died without an error notice can still be detected by polling.
#[derive(Clone, Debug)]
pub struct StreamControl {
    cancel: CancellationToken,
    closed: Arc<AtomicBool>,
}

impl StreamControl {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Tears the stream down. The read task exits without emitting further
    /// notices.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Marks the stream as ended. Called by transport implementations when
    /// their read loop exits for any reason other than cancellation.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Whether two controls refer to the same stream.
    pub(crate) fn same(&self, other: &StreamControl) -> bool {
        Arc::ptr_eq(&self.closed, &other.closed)
    }
}

impl Default for StreamControl {
    fn default() -> Self {
        Self::new()
    }
}

/// A live stream: the notice channel plus its control half.
#[derive(Debug)]
pub struct EventStreamHandle {
    pub notices: mpsc::Receiver<StreamNotice>,
    pub control: StreamControl,
}

impl EventStreamHandle {
    /// Builds a handle backed by a plain channel. The returned sender is
    /// the transport side; fakes in tests drive it directly.
    pub fn channel(capacity: usize) -> (mpsc::Sender<StreamNotice>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            Self {
                notices: rx,
                control: StreamControl::new(),
            },
        )
    }
}

/// Factory for live streams, injected into the client at construction.
pub type Connector =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<EventStreamHandle, TransportError>> + Send + Sync>;

/// The default connector: HTTP GET with `Accept: text/event-stream`,
/// SSE-deframed into [`StreamNotice::Message`] payloads.
pub fn http_connector() -> Connector {
    let client = reqwest::Client::new();
    Arc::new(move |url: String| {
        let client = client.clone();
        async move {
            let resp = client
                .get(&url)
                .header(ACCEPT, "text/event-stream")
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                });
            }

            let (tx, rx) = mpsc::channel(64);
            let control = StreamControl::new();
            tokio::spawn(read_stream(resp, tx, control.clone()));
            Ok(EventStreamHandle {
                notices: rx,
                control,
            })
        }
        .boxed()
    })
}

/// Reads the response body and forwards deframed events as notices.
async fn read_stream(
    resp: reqwest::Response,
    tx: mpsc::Sender<StreamNotice>,
    control: StreamControl,
) {
    if tx.send(StreamNotice::Open).await.is_err() {
        return;
    }

    let mut body = resp.bytes_stream();
    let mut decoder = SseDecoder::new();

    loop {
        tokio::select! {
            _ = control.cancelled() => {
                debug!("stream read task cancelled");
                return;
            }
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    for data in decoder.feed(&bytes) {
                        if tx.send(StreamNotice::Message(data)).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "stream read error");
                    control.mark_closed();
                    let _ = tx.send(StreamNotice::Error(e.into())).await;
                    return;
                }
                None => {
                    debug!("stream ended by server");
                    control.mark_closed();
                    let _ = tx.send(StreamNotice::Error(TransportError::Closed)).await;
                    return;
                }
            }
        }
    }
}

/// Incremental Server-Sent-Events deframer.
///
/// Only the `data` field is used by the cloud; `event`, `id` and `retry`
/// fields are ignored, as are comment lines.
struct SseDecoder {
    buf: String,
    data: Vec<String>,
}

impl SseDecoder {
    fn new() -> Self {
        Self {
            buf: String::new(),
            data: Vec::new(),
        }
    }

    /// Consumes a chunk of bytes and returns every event completed by it.
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(bytes));

        let mut out = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line = self.buf[..pos].trim_end_matches('\r').to_string();
            self.buf.drain(..=pos);

            if line.is_empty() {
                if !self.data.is_empty() {
                    out.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
            // Comments (`:` prefix) and other fields carry nothing we use.
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[test]
    fn decoder_single_event() {
        let mut d = SseDecoder::new();
        let events = d.feed(b"data: {\"type\":\"ping\"}\n\n");
        assert_eq!(events, vec!["{\"type\":\"ping\"}".to_string()]);
    }

    #[test]
    fn decoder_split_across_chunks() {
        let mut d = SseDecoder::new();
        assert!(d.feed(b"data: {\"type\":").is_empty());
        assert!(d.feed(b"\"ping\"}").is_empty());
        let events = d.feed(b"\n\n");
        assert_eq!(events, vec!["{\"type\":\"ping\"}".to_string()]);
    }

    #[test]
    fn decoder_multi_line_data() {
        let mut d = SseDecoder::new();
        let events = d.feed(b"data: first\ndata: second\n\n");
        assert_eq!(events, vec!["first\nsecond".to_string()]);
    }

    #[test]
    fn decoder_ignores_comments_and_other_fields() {
        let mut d = SseDecoder::new();
        let events = d.feed(b": keep-alive\nevent: message\nid: 4\ndata: x\n\n");
        assert_eq!(events, vec!["x".to_string()]);
    }

    #[test]
    fn decoder_crlf_lines() {
        let mut d = SseDecoder::new();
        let events = d.feed(b"data: x\r\n\r\n");
        assert_eq!(events, vec!["x".to_string()]);
    }

    #[test]
    fn decoder_blank_lines_without_data_emit_nothing() {
        let mut d = SseDecoder::new();
        assert!(d.feed(b"\n\n\n").is_empty());
    }

    #[test]
    fn decoder_two_events_one_chunk() {
        let mut d = SseDecoder::new();
        let events = d.feed(b"data: a\n\ndata: b\n\n");
        assert_eq!(events, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn control_close_is_silent() {
        let control = StreamControl::new();
        control.close();
        assert!(control.is_cancelled());
        assert!(!control.is_closed());
    }

    #[test]
    fn control_identity() {
        let a = StreamControl::new();
        let b = a.clone();
        let c = StreamControl::new();
        assert!(a.same(&b));
        assert!(!a.same(&c));
    }

    /// Serves one SSE response over raw TCP, then closes the socket.
    async fn mock_sse_server(events: &str) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/sse");
        let body = events.to_string();

        let handle = tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(body.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, handle)
    }

    #[tokio::test]
    async fn http_connector_delivers_open_messages_and_closure() {
        let (url, server) = mock_sse_server("data: one\n\ndata: two\n\n").await;

        let connector = http_connector();
        let mut handle = connector(url).await.unwrap();

        match handle.notices.recv().await {
            Some(StreamNotice::Open) => {}
            other => panic!("expected open, got {other:?}"),
        }
        match handle.notices.recv().await {
            Some(StreamNotice::Message(m)) => assert_eq!(m, "one"),
            other => panic!("expected message, got {other:?}"),
        }
        match handle.notices.recv().await {
            Some(StreamNotice::Message(m)) => assert_eq!(m, "two"),
            other => panic!("expected message, got {other:?}"),
        }
        match handle.notices.recv().await {
            Some(StreamNotice::Error(TransportError::Closed)) => {}
            other => panic!("expected closure, got {other:?}"),
        }
        assert!(handle.control.is_closed());

        server.abort();
    }

    #[tokio::test]
    async fn http_connector_rejects_error_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/sse");

        let server = tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let head =
                    "HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        let connector = http_connector();
        let err = connector(url).await.unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 401 }));

        server.abort();
    }
}
