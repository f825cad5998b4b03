use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use log::{debug, error, info, warn};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use crate::{Error, Result};
use crate::amf::{Amf0Codec, AmfCodec};
use crate::chunk::MessageAssembler;
use crate::connection::config::check_bucket_fits_chunk;
use crate::connection::receiver::Receiver;
use crate::connection::sender::Sender;
use crate::connection::{ConnectionConfig, ConnectionState, Transport};
use crate::flow::{AckMode, TokenBucket, WindowControl};
use crate::message::{MessageBody, MessageHandler, MessagePriorityQueue, QueueTelemetry, RtmpMessage};
use crate::protocol::{RtmpPacket, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};

/// Upper bound on shutting the transport down during teardown
const TRANSPORT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Called once with the error that brought the connection down
pub type ErrorHook = Box<dyn Fn(&Error) + Send + Sync>;

/// Point-in-time counters for monitoring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub window_size: u32,
    pub received_acknowledgement: u64,
    pub ack_mode: AckMode,
    pub queue: QueueTelemetry,
}

/// State shared by the connection handle and its two loops
pub(crate) struct Shared {
    pub(crate) id: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) codec: Arc<dyn AmfCodec>,
    pub(crate) handler: Arc<dyn MessageHandler>,
    pub(crate) queue: MessagePriorityQueue,
    pub(crate) window: Mutex<WindowControl>,
    /// Last window size announced to the peer
    pub(crate) announced_window: AtomicU32,
    pub(crate) cancel: CancellationToken,
    state: RwLock<ConnectionState>,
    invalidated: AtomicBool,
    failure: Mutex<Option<Error>>,
    error_hook: Mutex<Option<ErrorHook>>,
    done: CancellationToken,
}

impl Shared {
    /// Queue a protocol or user control message. Failures are logged; they
    /// only happen once the connection is going away or the queue is full.
    pub(crate) async fn enqueue_control(&self, body: MessageBody) {
        let packet = match RtmpMessage::control(body).to_packet(self.codec.as_ref()) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("[{}] Failed to encode control message: {}", self.id, e);
                return;
            }
        };
        if let Err(e) = self.queue.enqueue(packet, false, None).await {
            warn!("[{}] Failed to queue control message: {}", self.id, e);
        }
    }

    /// Tear the connection down. Only the first call has any effect.
    pub(crate) async fn invalidate(&self, reason: Option<Error>) {
        if self.invalidated.swap(true, Ordering::SeqCst) {
            return;
        }

        match &reason {
            Some(e) => error!("[{}] Connection failed: {}", self.id, e),
            None => info!("[{}] Closing connection", self.id),
        }
        *self.state.write().await = ConnectionState::Closing;

        self.cancel.cancel();

        let queue_reason = match &reason {
            Some(e) => e.duplicate(),
            None => Error::connection("Connection closed"),
        };
        self.queue.invalidate(&queue_reason).await;

        match timeout(TRANSPORT_CLOSE_TIMEOUT, self.transport.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("[{}] Transport close failed: {}", self.id, e),
            Err(_) => warn!("[{}] Transport close timed out", self.id),
        }

        if let Some(e) = &reason {
            if let Some(hook) = self.error_hook.lock().await.take() {
                hook(e);
            }
        }

        *self.failure.lock().await = reason;
        *self.state.write().await = ConnectionState::Closed;
        self.done.cancel();
    }
}

/// One chunk-stream connection over an established transport.
///
/// `start` spawns a sender loop, which owns the chunk encoder and the egress
/// limiter, and a receiver loop, which owns the message assembler. Outbound
/// packets go through a priority queue; inbound messages are handed to the
/// [`MessageHandler`] after protocol control messages have been acted upon.
pub struct Connection {
    /// Connection ID
    id: String,

    config: ConnectionConfig,

    shared: Arc<Shared>,

    started: AtomicBool,
}

impl Connection {
    /// Create new connection
    pub fn new(
        transport: Arc<dyn Transport>,
        config: ConnectionConfig,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Connection::with_codec(transport, config, handler, Arc::new(Amf0Codec))
    }

    /// Create a connection that interprets command and data payloads with
    /// `codec`
    pub fn with_codec(
        transport: Arc<dyn Transport>,
        config: ConnectionConfig,
        handler: Arc<dyn MessageHandler>,
        codec: Arc<dyn AmfCodec>,
    ) -> Self {
        let id = Uuid::new_v4().to_string();

        let shared = Arc::new(Shared {
            id: id.clone(),
            transport,
            codec,
            handler,
            queue: MessagePriorityQueue::new(config.max_pending_messages),
            window: Mutex::new(WindowControl::new(config.window_ack_size)),
            announced_window: AtomicU32::new(config.window_ack_size),
            cancel: CancellationToken::new(),
            state: RwLock::new(ConnectionState::Uninitialized),
            invalidated: AtomicBool::new(false),
            failure: Mutex::new(None),
            error_hook: Mutex::new(None),
            done: CancellationToken::new(),
        });

        Connection {
            id,
            config,
            shared,
            started: AtomicBool::new(false),
        }
    }

    /// Get connection ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get current state
    pub async fn state(&self) -> ConnectionState {
        *self.shared.state.read().await
    }

    /// Install the hook run when the connection fails. Replaces any
    /// previous hook.
    pub async fn on_error<F>(&self, hook: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        *self.shared.error_hook.lock().await = Some(Box::new(hook));
    }

    /// Spawn the sender and receiver loops
    pub async fn start(&self) -> Result<()> {
        self.config.validate()?;
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::invalid_state("Connection already started"));
        }

        {
            let mut state = self.shared.state.write().await;
            if !state.can_transition_to(ConnectionState::Connected) {
                return Err(Error::invalid_state(format!("Cannot start from {:?}", *state)));
            }
            *state = ConnectionState::Connected;
        }

        if self.config.chunk_size != DEFAULT_CHUNK_SIZE {
            self.shared
                .enqueue_control(MessageBody::SetChunkSize(self.config.chunk_size))
                .await;
        }

        let sender = Sender::new(
            self.shared.clone(),
            self.config.egress.map(TokenBucket::new),
            self.config.backpressure_retry_interval,
        );
        let receiver = Receiver::new(
            self.shared.clone(),
            MessageAssembler::new(self.shared.codec.clone()),
        );

        tokio::spawn(sender.run());
        tokio::spawn(receiver.run());

        info!("[{}] Connection started", self.id);
        Ok(())
    }

    /// Queue a packet for sending
    pub async fn send(&self, packet: RtmpPacket) -> Result<()> {
        self.shared.queue.enqueue(packet, false, None).await
    }

    /// Queue a packet whose first chunk carries a full Type 0 header
    pub async fn send_forced(&self, packet: RtmpPacket) -> Result<()> {
        self.shared.queue.enqueue(packet, true, None).await
    }

    /// Queue a packet and wait until it has been written, or until the
    /// connection fails
    pub async fn send_and_wait(&self, packet: RtmpPacket) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.shared.queue.enqueue(packet, false, Some(tx)).await?;

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::connection("Connection closed before the message was sent")),
        }
    }

    /// Encode and queue a message
    pub async fn send_message(&self, message: &RtmpMessage) -> Result<()> {
        let packet = message.to_packet(self.shared.codec.as_ref())?;
        self.send(packet).await
    }

    /// Announce a new outgoing chunk size. It takes effect for the packets
    /// sent after the announcement.
    pub async fn set_chunk_size(&self, size: u32) -> Result<()> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) {
            return Err(Error::ChunkSizeRejected {
                requested: size,
                min: MIN_CHUNK_SIZE,
                max: MAX_CHUNK_SIZE,
            });
        }
        if let Some(egress) = &self.config.egress {
            check_bucket_fits_chunk(egress, size)?;
        }

        let packet = RtmpMessage::control(MessageBody::SetChunkSize(size))
            .to_packet(self.shared.codec.as_ref())?;
        self.shared.queue.enqueue(packet, false, None).await
    }

    /// Set the acknowledgement window locally and announce it to the peer
    pub async fn set_window_ack_size(&self, size: u32) -> Result<()> {
        self.shared.window.lock().await.set_window_size(size)?;
        self.shared.announced_window.store(size, Ordering::SeqCst);

        let packet = RtmpMessage::control(MessageBody::WindowAckSize(size))
            .to_packet(self.shared.codec.as_ref())?;
        self.shared.queue.enqueue(packet, false, None).await
    }

    pub async fn stats(&self) -> ConnectionStats {
        let (bytes_in, bytes_out, window_size, received_acknowledgement, ack_mode) = {
            let window = self.shared.window.lock().await;
            (
                window.total_in_bytes(),
                window.total_out_bytes(),
                window.window_size(),
                window.received_acknowledgement(),
                window.ack_mode(),
            )
        };

        ConnectionStats {
            bytes_in,
            bytes_out,
            window_size,
            received_acknowledgement,
            ack_mode,
            queue: self.shared.queue.telemetry().await,
        }
    }

    /// Stop both loops and close the transport. Pending messages are
    /// dropped with an error.
    pub async fn close(&self) {
        self.shared.invalidate(None).await;
    }

    /// Wait for the connection to be torn down. Returns the failure that
    /// caused it, or `Ok` after a local `close`.
    pub async fn closed(&self) -> Result<()> {
        self.shared.done.cancelled().await;
        match self.shared.failure.lock().await.as_ref() {
            Some(e) => Err(e.duplicate()),
            None => Ok(()),
        }
    }
}

impl Drop for Connection {
    /// Same teardown as `close`, run in the background when a runtime is
    /// available
    fn drop(&mut self) {
        self.shared.cancel.cancel();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let shared = self.shared.clone();
            handle.spawn(async move { shared.invalidate(None).await });
        }
    }
}
