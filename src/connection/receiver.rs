use std::sync::atomic::Ordering;
use std::sync::Arc;
use log::{debug, info, warn};
use crate::{Error, Result};
use crate::chunk::MessageAssembler;
use crate::connection::connection::Shared;
use crate::message::{MessageBody, PeerBandwidthLimit, RtmpMessage, UserControlEvent};

/// Inbound loop: wire -> window accounting -> assembler -> handler
pub(crate) struct Receiver {
    shared: Arc<Shared>,
    assembler: MessageAssembler,
    /// Limit type of the last Set Peer Bandwidth that was applied
    last_limit: Option<PeerBandwidthLimit>,
}

impl Receiver {
    pub(crate) fn new(shared: Arc<Shared>, assembler: MessageAssembler) -> Self {
        Receiver {
            shared,
            assembler,
            last_limit: None,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("[{}] Receiver loop started", self.shared.id);

        match self.receive_loop().await {
            Ok(()) | Err(Error::Cancelled) => debug!("[{}] Receiver loop stopped", self.shared.id),
            Err(e) => self.shared.invalidate(Some(e)).await,
        }
        self.assembler.reset();
    }

    async fn receive_loop(&mut self) -> Result<()> {
        let cancel = self.shared.cancel.clone();

        loop {
            let data = tokio::select! {
                result = self.shared.transport.receive_data() => result?,
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            };

            let ack = self.shared.window.lock().await.add_in_bytes(data.len());
            if let Some(value) = ack {
                debug!("[{}] Acknowledging {} bytes", self.shared.id, value);
                self.shared.enqueue_control(MessageBody::Acknowledgement(value)).await;
            }

            self.assembler.feed(&data);
            loop {
                match self.assembler.next_message() {
                    Ok(Some(message)) => self.dispatch(message).await,
                    Ok(None) => break,
                    Err(e) if e.is_fatal_framing() => return Err(e),
                    Err(e) => warn!("[{}] Skipping malformed message: {}", self.shared.id, e),
                }
            }
        }
    }

    async fn dispatch(&mut self, message: RtmpMessage) {
        match &message.body {
            MessageBody::Acknowledgement(value) => {
                self.shared.window.lock().await.update_received_acknowledgement(*value);
            }
            MessageBody::WindowAckSize(size) => {
                if let Err(e) = self.shared.window.lock().await.set_window_size(*size) {
                    warn!("[{}] Ignoring window acknowledgement size: {}", self.shared.id, e);
                }
            }
            MessageBody::SetPeerBandwidth { size, limit } => {
                self.on_peer_bandwidth(*size, *limit).await;
            }
            MessageBody::UserControl(UserControlEvent::PingRequest(timestamp)) => {
                self.shared
                    .enqueue_control(MessageBody::UserControl(UserControlEvent::PingResponse(*timestamp)))
                    .await;
            }
            _ => {}
        }

        if let Err(e) = self.shared.handler.handle(message).await {
            warn!("[{}] Message handler failed: {}", self.shared.id, e);
        }
    }

    async fn on_peer_bandwidth(&mut self, size: u32, limit: PeerBandwidthLimit) {
        let effective = {
            let mut window = self.shared.window.lock().await;
            let current = window.window_size();

            let (applied, new_size) = match limit {
                PeerBandwidthLimit::Hard => (limit, size),
                PeerBandwidthLimit::Soft => (limit, size.min(current)),
                PeerBandwidthLimit::Dynamic if self.last_limit == Some(PeerBandwidthLimit::Hard) => {
                    (PeerBandwidthLimit::Hard, size)
                }
                PeerBandwidthLimit::Dynamic => {
                    debug!("[{}] Ignoring dynamic peer bandwidth {}", self.shared.id, size);
                    return;
                }
            };

            if let Err(e) = window.set_window_size(new_size) {
                warn!("[{}] Ignoring peer bandwidth: {}", self.shared.id, e);
                return;
            }
            self.last_limit = Some(applied);
            new_size
        };

        let announced = self.shared.announced_window.swap(effective, Ordering::SeqCst);
        if announced != effective {
            info!("[{}] Peer bandwidth {}, announcing window", self.shared.id, effective);
            self.shared.enqueue_control(MessageBody::WindowAckSize(effective)).await;
        }
    }
}
