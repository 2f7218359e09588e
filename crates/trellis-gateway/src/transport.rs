//! Stream transport
//!
//! One server-push channel bound to a single client connection. The transport
//! mints the session id at creation time; that id is the only bridge between
//! the long-lived stream and the short-lived submit requests that follow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// A single framed message pushed downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    /// Event name of the frame.
    pub event: String,
    /// Payload of the frame.
    pub data: String,
}

impl StreamMessage {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Frames delivered to the response stream draining this transport.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// A discrete message to forward to the client.
    Message(StreamMessage),
    /// Framing terminator: the stream ends cleanly after this.
    Shutdown,
}

/// Receiving half of a transport, handed to the HTTP response stream.
pub type FrameReceiver = mpsc::UnboundedReceiver<StreamFrame>;

type CloseCallback = Box<dyn FnOnce() + Send>;

/// A server-push channel for one client connection.
///
/// Owned by its session registry entry for its whole lifetime. The close
/// notification fires exactly once, whatever the trigger: an explicit
/// `close()`, server shutdown, or the client dropping the connection (via
/// [`DisconnectGuard`]).
pub struct StreamTransport {
    session_id: String,
    tx: mpsc::UnboundedSender<StreamFrame>,
    closed: AtomicBool,
    on_close: Mutex<Option<CloseCallback>>,
}

impl std::fmt::Debug for StreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("session_id", &self.session_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl StreamTransport {
    /// Open a new transport, minting its session id.
    ///
    /// The returned receiver yields the frames to write to the client and is
    /// consumed by exactly one response stream.
    pub fn open() -> (Arc<Self>, FrameReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            session_id: Uuid::new_v4().to_string(),
            tx,
            closed: AtomicBool::new(false),
            on_close: Mutex::new(None),
        });
        (transport, rx)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Register the one-shot callback fired when the transport closes.
    ///
    /// The callback must not call back into `close()`; it only tears down
    /// external references (the registry entry).
    pub fn on_close(&self, callback: impl FnOnce() + Send + 'static) {
        *self.on_close.lock() = Some(Box::new(callback));
    }

    /// Send one framed message downstream.
    pub fn push(&self, message: StreamMessage) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.tx
            .send(StreamFrame::Message(message))
            .map_err(|_| TransportError::Closed)
    }

    /// Terminate the channel.
    ///
    /// Idempotent: only the first call fires the close notification and
    /// flushes the framing terminator. The terminator may fail to deliver
    /// when the peer is already gone; the notification has fired regardless.
    pub fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(callback) = self.on_close.lock().take() {
            callback();
        }
        self.tx
            .send(StreamFrame::Shutdown)
            .map_err(|_| TransportError::Closed)
    }
}

/// Drop guard owned by the response stream.
///
/// When the client disconnects the HTTP layer drops the stream, the guard
/// drops with it, and the transport closes promptly so later dispatches fail
/// fast instead of pushing into the void.
pub struct DisconnectGuard {
    transport: Arc<StreamTransport>,
}

impl DisconnectGuard {
    pub fn new(transport: Arc<StreamTransport>) -> Self {
        Self { transport }
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.transport.is_closed() {
            debug!(
                session_id = %self.transport.session_id(),
                "stream dropped, closing transport"
            );
        }
        let _ = self.transport.close();
    }
}

/// Transport-level errors.
#[derive(Debug, Error, PartialEq)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,
}
