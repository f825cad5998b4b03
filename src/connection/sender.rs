use std::sync::Arc;
use std::time::Duration;
use log::{debug, warn};
use crate::{Error, Result};
use crate::chunk::{Chunk, ChunkEncoder};
use crate::connection::connection::Shared;
use crate::flow::TokenBucket;
use crate::message::{MessageBody, QueueEntry};
use crate::protocol::MSG_TYPE_SET_CHUNK_SIZE;

/// Outbound loop: queue -> window check -> chunks -> egress limit -> wire
pub(crate) struct Sender {
    shared: Arc<Shared>,
    encoder: ChunkEncoder,
    bucket: Option<TokenBucket>,
    retry_interval: Duration,
}

impl Sender {
    pub(crate) fn new(shared: Arc<Shared>, bucket: Option<TokenBucket>, retry_interval: Duration) -> Self {
        Sender {
            shared,
            encoder: ChunkEncoder::new(),
            bucket,
            retry_interval,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("[{}] Sender loop started", self.shared.id);

        match self.send_loop().await {
            Ok(()) | Err(Error::Cancelled) => debug!("[{}] Sender loop stopped", self.shared.id),
            Err(e) => self.shared.invalidate(Some(e)).await,
        }
    }

    async fn send_loop(&mut self) -> Result<()> {
        let cancel = self.shared.cancel.clone();

        loop {
            let mut entry = self.shared.queue.dequeue(&cancel).await?;

            // Control traffic is never held back, or both sides could end up
            // waiting for each other's acknowledgements
            if !entry.packet.is_protocol_control()
                && self.shared.window.lock().await.should_wait_acknowledgement()
            {
                debug!("[{}] Peer window full, holding back", self.shared.id);
                self.shared.queue.requeue(entry).await;
                tokio::select! {
                    _ = tokio::time::sleep(self.retry_interval) => continue,
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                }
            }

            // A packet that cannot be encoded only costs itself
            let chunks = match self.encoder.encode(&entry.packet, entry.force_type0) {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!("[{}] Dropping unsendable message: {}", self.shared.id, e);
                    entry.complete(Err(e));
                    continue;
                }
            };

            // Anything failing on the way to the wire ends the connection
            if let Err(e) = self.write_chunks(&chunks).await {
                entry.complete(Err(e.duplicate()));
                return Err(e);
            }

            self.apply_sent(&entry);
            entry.complete(Ok(()));
        }
    }

    async fn write_chunks(&mut self, chunks: &[Chunk]) -> Result<()> {
        let cancel = &self.shared.cancel;

        for chunk in chunks {
            let bytes = chunk.to_bytes()?;

            if let Some(bucket) = self.bucket.as_mut() {
                bucket.acquire(bytes.len() as u64, cancel).await?;
            }

            // A peer that stops reading must not keep the write pending
            tokio::select! {
                result = self.shared.transport.send_data(&bytes) => result?,
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
            self.shared.window.lock().await.add_out_bytes(bytes.len());
        }
        Ok(())
    }

    /// A Set Chunk Size takes effect from the next packet on
    fn apply_sent(&mut self, entry: &QueueEntry) {
        if entry.packet.message_type() != MSG_TYPE_SET_CHUNK_SIZE {
            return;
        }

        let body = MessageBody::decode(
            MSG_TYPE_SET_CHUNK_SIZE,
            &entry.packet.payload,
            self.shared.codec.as_ref(),
        );
        let result = match body {
            Ok(MessageBody::SetChunkSize(size)) => self.encoder.set_chunk_size(size),
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("[{}] Sent chunk size not applied: {}", self.shared.id, e);
        }
    }
}
