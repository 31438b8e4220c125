//! Stream connection with request/response correlation.
//!
//! Envelopes are exchanged as length-prefixed JSON frames over any
//! bidirectional byte stream (TCP, Unix socket, in-memory duplex). Two
//! background tasks own the stream: a writer draining a queue of encoded
//! frames, and a reader handing each response to the caller waiting on its
//! request id. Callers only enqueue whole frames, so a caller that gives up
//! never leaves a partial frame on the wire.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use kurento_protocol::{Envelope, Request, RequestId, Response, encode_message, read_frame};

use crate::config::ServerAddress;
use crate::connection::{BoxFuture, Connection};
use crate::error::TransportError;

type Delivery = Result<Envelope<Response>, TransportError>;

enum WriteCmd {
    Frame(Vec<u8>),
    Close,
}

/// Requests waiting for their response.
#[derive(Default)]
struct PendingMap {
    waiters: HashMap<RequestId, oneshot::Sender<Delivery>>,
    closed: bool,
}

#[derive(Default)]
struct Shared {
    pending: Mutex<PendingMap>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PendingMap> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, id: &RequestId) -> Result<oneshot::Receiver<Delivery>, TransportError> {
        let mut pending = self.lock();
        if pending.closed {
            return Err(TransportError::Closed);
        }
        if pending.waiters.contains_key(id) {
            return Err(TransportError::DuplicateRequestId(id.clone()));
        }
        let (tx, rx) = oneshot::channel();
        pending.waiters.insert(id.clone(), tx);
        Ok(rx)
    }

    fn forget(&self, id: &RequestId) {
        self.lock().waiters.remove(id);
    }

    /// The id of the only request in flight, if exactly one is.
    fn sole_waiter(&self) -> Option<RequestId> {
        let pending = self.lock();
        match pending.waiters.len() {
            1 => pending.waiters.keys().next().cloned(),
            _ => None,
        }
    }

    fn deliver(&self, id: &RequestId, delivery: Delivery) {
        let waiter = self.lock().waiters.remove(id);
        match waiter {
            Some(tx) => {
                if tx.send(delivery).is_err() {
                    debug!(request_id = %id, "waiter dropped before delivery");
                }
            }
            None => debug!(request_id = %id, "discarding response with no pending request"),
        }
    }

    /// Routes one received frame.
    ///
    /// An error response with a null or missing id (the server could not
    /// parse the request) goes to the only request in flight. With several
    /// in flight it cannot be attributed and is dropped.
    fn dispatch(&self, frame: &[u8]) {
        let mut value: Value = match serde_json::from_slice(frame) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "discarding frame that is not JSON");
                return;
            }
        };

        if let Some(method) = value.get("method").and_then(Value::as_str) {
            debug!(method, "ignoring server-initiated message");
            return;
        }

        let has_error = value.get("error").is_some();
        let id = match value.get("id").cloned() {
            None | Some(Value::Null) if has_error => {
                let Some(id) = self.sole_waiter() else {
                    warn!("discarding error response without an id");
                    return;
                };
                debug!(request_id = %id, "attributing error response without id");
                value["id"] = Value::String(id.to_string());
                id
            }
            Some(raw) => match serde_json::from_value::<RequestId>(raw.clone()) {
                Ok(id) => id,
                Err(_) => {
                    warn!(id = %raw, "discarding response with an unusable id");
                    return;
                }
            },
            None => {
                warn!("discarding response without an id");
                return;
            }
        };

        let delivery = serde_json::from_value::<Envelope<Response>>(value)
            .map_err(|e| TransportError::malformed(e.to_string()));
        self.deliver(&id, delivery);
    }

    /// Fails every waiter and refuses new requests.
    fn close(&self) {
        let mut pending = self.lock();
        pending.closed = true;
        let abandoned = pending.waiters.len();
        pending.waiters.clear();
        if abandoned > 0 {
            debug!(abandoned, "connection closed with requests in flight");
        }
    }
}

/// Removes the waiter when a request is abandoned.
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.forget(&self.id);
    }
}

/// A [`Connection`] over a framed byte stream.
pub struct StreamConnection {
    write_tx: tokio::sync::Mutex<Option<mpsc::UnboundedSender<WriteCmd>>>,
    shared: Arc<Shared>,
    reader: JoinHandle<()>,
}

impl StreamConnection {
    /// Wraps an established stream and starts the reader and writer tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());

        let reader = tokio::spawn(read_loop(read_half, shared.clone()));
        tokio::spawn(write_loop(write_half, write_rx, shared.clone()));

        Self {
            write_tx: tokio::sync::Mutex::new(Some(write_tx)),
            shared,
            reader,
        }
    }

    /// Connects over TCP.
    pub async fn connect_tcp<A: ToSocketAddrs>(addr: A) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }

    /// Connects to a Unix domain socket.
    #[cfg(unix)]
    pub async fn connect_unix(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let stream = tokio::net::UnixStream::connect(path).await.map_err(|e| {
            TransportError::Connect(format!("failed to connect to {}: {}", path.display(), e))
        })?;
        Ok(Self::new(stream))
    }

    /// Connects to a configured address within `timeout`.
    pub async fn connect(
        address: &ServerAddress,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        debug!(address = %address, "connecting to media server");

        let connect = async {
            match address {
                ServerAddress::Tcp { host, port } => {
                    Self::connect_tcp((host.as_str(), *port)).await
                }
                #[cfg(unix)]
                ServerAddress::Unix(path) => Self::connect_unix(path).await,
                #[cfg(not(unix))]
                ServerAddress::Unix(_) => Err(TransportError::Connect(
                    "unix sockets are not supported on this platform".to_string(),
                )),
            }
        };

        let connection = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| TransportError::Timeout {
                operation: format!("connection to {address}"),
                after: timeout,
            })??;

        info!(address = %address, "connected to media server");
        Ok(connection)
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.lock().waiters.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Closes the connection; in-flight requests fail with [`TransportError::Closed`].
    pub async fn close(&self) {
        self.shared.close();
        if let Some(tx) = self.write_tx.lock().await.take() {
            let _ = tx.send(WriteCmd::Close);
        }
        self.reader.abort();
    }

    async fn send(&self, envelope: Envelope<Request>) -> Delivery {
        let frame = encode_message(&envelope)?;
        let receiver = self.shared.register(&envelope.id)?;
        let _guard = PendingGuard {
            shared: &self.shared,
            id: envelope.id.clone(),
        };

        {
            let write_tx = self.write_tx.lock().await;
            let write_tx = write_tx.as_ref().ok_or(TransportError::Closed)?;
            write_tx
                .send(WriteCmd::Frame(frame))
                .map_err(|_| TransportError::Closed)?;
        }

        debug!(request_id = %envelope.id, "request queued, waiting for response");

        receiver.await.unwrap_or(Err(TransportError::Closed))
    }
}

impl Connection for StreamConnection {
    fn request(&self, request: Envelope<Request>) -> BoxFuture<'_, Delivery> {
        Box::pin(self.send(request))
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop<R>(mut reader: R, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => shared.dispatch(&frame),
            Ok(None) => {
                info!("media server closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "connection read failed");
                break;
            }
        }
    }
    shared.close();
}

/// Writes queued frames one at a time until closed.
///
/// A write failure closes the connection: the stream may hold a partial
/// frame, so nothing after it can be trusted.
async fn write_loop<W>(
    mut writer: W,
    mut write_rx: mpsc::UnboundedReceiver<WriteCmd>,
    shared: Arc<Shared>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(cmd) = write_rx.recv().await {
        let frame = match cmd {
            WriteCmd::Frame(frame) => frame,
            WriteCmd::Close => break,
        };
        let written = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            warn!(error = %e, "connection write failed");
            shared.close();
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "error shutting down writer");
    }
}
