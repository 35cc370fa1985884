use bookmux::rpc::{ConnectionState, InboundFrame, RequestEnvelope, TransportError};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub type StateHandler = Arc<dyn Fn() + Send + Sync>;
pub type MessageHandler = Arc<dyn Fn(InboundFrame) + Send + Sync>;
pub type ConnectedCallback = Box<dyn FnOnce() + Send>;

enum Outbound {
    Frame {
        queued_at: Instant,
        message: WsMessage,
    },
    Close,
}

#[derive(Default)]
struct Subscribers {
    on_open: Vec<StateHandler>,
    on_close: Vec<StateHandler>,
    on_message: Vec<MessageHandler>,
    when_connected: Vec<ConnectedCallback>,
}

/// State reachable from the background tasks.
struct Shared {
    label: String,
    state: watch::Sender<ConnectionState>,
    subscribers: Mutex<Subscribers>,
    failure: Mutex<Option<String>>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Applies a legal state change and notifies subscribers. Illegal or
    /// repeated transitions are ignored.
    fn transition(&self, next: ConnectionState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });

        if !changed {
            return false;
        }

        match next {
            ConnectionState::Open => {
                tracing::info!("[{}] connection open", self.label);
                let (handlers, callbacks) = {
                    let mut subscribers = lock(&self.subscribers);
                    (
                        subscribers.on_open.clone(),
                        std::mem::take(&mut subscribers.when_connected),
                    )
                };
                for handler in handlers {
                    handler();
                }
                for callback in callbacks {
                    callback();
                }
            }
            ConnectionState::Closed => {
                tracing::info!("[{}] connection closed", self.label);
                let handlers = lock(&self.subscribers).on_close.clone();
                for handler in handlers {
                    handler();
                }
            }
            ConnectionState::Connecting => {}
        }

        true
    }

    fn deliver(&self, text: &str) {
        let frame = match InboundFrame::from_json(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!("[{}] dropping frame without a request id: {}", self.label, err);
                return;
            }
        };

        if let InboundFrame::Malformed { id, reason } = &frame {
            tracing::warn!("[{}] malformed response {}: {}", self.label, id, reason);
        }

        let handlers = lock(&self.subscribers).on_message.clone();
        match handlers.as_slice() {
            [] => tracing::warn!(
                "[{}] no message handler for response {}",
                self.label,
                frame.id()
            ),
            [only] => only(frame),
            many => {
                for handler in many {
                    handler(frame.clone());
                }
            }
        }
    }
}

/// Owns one WebSocket connection to the server.
///
/// The handshake runs in a background task started by [`connect`](Self::connect);
/// the state moves `Connecting -> Open -> Closed` and never leaves `Closed`.
/// Outbound frames go through a writer task that holds each frame until its
/// artificial delay has elapsed, preserving send order.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Outbound>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Starts the handshake for `request`. Must be called from within a tokio
    /// runtime.
    pub fn connect<R>(request: R, label: impl Into<String>, artificial_delay: Duration) -> Self
    where
        R: IntoClientRequest + Unpin + Send + 'static,
    {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let shared = Arc::new(Shared {
            label: label.into(),
            state,
            subscribers: Mutex::new(Subscribers::default()),
            failure: Mutex::new(None),
        });
        let (outbound, outbound_rx) = mpsc::unbounded_channel::<Outbound>();

        let task = tokio::spawn(Self::run(
            shared.clone(),
            request,
            outbound_rx,
            artificial_delay,
        ));

        Self {
            shared,
            outbound,
            tasks: Mutex::new(vec![task]),
        }
    }

    async fn run<R>(
        shared: Arc<Shared>,
        request: R,
        outbound_rx: mpsc::UnboundedReceiver<Outbound>,
        artificial_delay: Duration,
    ) where
        R: IntoClientRequest + Unpin + Send + 'static,
    {
        let ws_stream = match connect_async(request).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(err) => {
                tracing::error!("[{}] failed to connect: {}", shared.label, err);
                *lock(&shared.failure) = Some(err.to_string());
                shared.transition(ConnectionState::Closed);
                return;
            }
        };

        // Closed while the handshake was in flight.
        if *shared.state.borrow() == ConnectionState::Closed {
            return;
        }

        let (sink, stream) = ws_stream.split();
        let writer = tokio::spawn(Self::write_loop(
            shared.label.clone(),
            sink,
            outbound_rx,
            artificial_delay,
        ));

        shared.transition(ConnectionState::Open);
        Self::read_loop(&shared, stream).await;

        writer.abort();
        shared.transition(ConnectionState::Closed);
    }

    async fn read_loop(shared: &Shared, mut stream: SplitStream<WsStream>) {
        while let Some(message) = stream.next().await {
            match message {
                Ok(WsMessage::Text(text)) => shared.deliver(text.as_str()),
                Ok(WsMessage::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => shared.deliver(text),
                    Err(err) => {
                        tracing::warn!("[{}] dropping non UTF-8 frame: {}", shared.label, err)
                    }
                },
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("[{}] read failed: {}", shared.label, err);
                    break;
                }
            }
        }
    }

    async fn write_loop(
        label: String,
        mut sink: SplitSink<WsStream, WsMessage>,
        mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
        artificial_delay: Duration,
    ) {
        while let Some(outbound) = outbound_rx.recv().await {
            match outbound {
                Outbound::Frame { queued_at, message } => {
                    if !artificial_delay.is_zero() {
                        sleep_until(queued_at + artificial_delay).await;
                    }
                    if let Err(err) = sink.send(message).await {
                        tracing::warn!("[{}] write failed: {}", label, err);
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    let _ = sink.close().await;
                    break;
                }
            }
        }
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Queues a text frame. Fails unless the connection is `Open`.
    pub fn send(&self, text: String) -> Result<(), TransportError> {
        let state = self.state();
        if !state.is_open() {
            tracing::error!("[{}] refusing to send while {}", self.shared.label, state);
            return Err(TransportError::NotOpen(state));
        }

        self.outbound
            .send(Outbound::Frame {
                queued_at: Instant::now(),
                message: WsMessage::Text(text.into()),
            })
            .map_err(|_| TransportError::Closed)
    }

    pub fn send_envelope(&self, envelope: &RequestEnvelope) -> Result<(), TransportError> {
        let text = envelope
            .to_json()
            .map_err(|err| TransportError::Encode(err.to_string()))?;
        self.send(text)
    }

    /// Resolves once the connection is open, or fails if it closes first.
    pub async fn wait_open(&self) -> Result<(), TransportError> {
        let mut state_rx = self.shared.state.subscribe();
        let state = *state_rx
            .wait_for(|state| *state != ConnectionState::Connecting)
            .await
            .map_err(|_| TransportError::Closed)?;

        if state.is_open() {
            return Ok(());
        }

        match lock(&self.shared.failure).clone() {
            Some(reason) => Err(TransportError::ConnectFailed(reason)),
            None => Err(TransportError::NotOpen(state)),
        }
    }

    pub fn on_open<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.shared.subscribers)
            .on_open
            .push(Arc::new(handler));
    }

    pub fn on_close<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.shared.subscribers)
            .on_close
            .push(Arc::new(handler));
    }

    /// Subscribes to inbound frames that carry a request id.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(InboundFrame) + Send + Sync + 'static,
    {
        lock(&self.shared.subscribers)
            .on_message
            .push(Arc::new(handler));
    }

    /// Runs `callback` once: now, if already open and
    /// `invoke_if_already_connected` is set, otherwise on the next transition
    /// to `Open`.
    pub fn on_connected<F>(&self, invoke_if_already_connected: bool, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            // Checked under the lock so an Open transition cannot slip between
            // the check and the push.
            let mut subscribers = lock(&self.shared.subscribers);
            if !(invoke_if_already_connected && self.is_open()) {
                subscribers.when_connected.push(Box::new(callback));
                return;
            }
        }

        callback();
    }

    /// Removes the callbacks still waiting for an `Open` transition, so they
    /// can be carried over to a replacement connection.
    pub fn take_when_connected(&self) -> Vec<ConnectedCallback> {
        std::mem::take(&mut lock(&self.shared.subscribers).when_connected)
    }

    /// Closes the connection after the frames already queued are written.
    pub fn close(&self) {
        if self.shared.transition(ConnectionState::Closed) {
            let _ = self.outbound.send(Outbound::Close);
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        self.shared.transition(ConnectionState::Closed);
    }
}
