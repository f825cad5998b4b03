use std::cmp::Ordering;
use std::collections::BinaryHeap;
use log::debug;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio_util::sync::CancellationToken;
use crate::{Error, Result};
use crate::protocol::{PacketCategory, RtmpPacket};

/// Resolved once the entry has been written, or with the failure that
/// prevented it
pub type CompletionSender = oneshot::Sender<Result<()>>;

/// Pending outbound message
#[derive(Debug)]
pub struct QueueEntry {
    pub packet: RtmpPacket,
    /// Send the first chunk with a full Type 0 header
    pub force_type0: bool,
    completion: Option<CompletionSender>,
    sequence: u64,
    priority: u8,
}

impl QueueEntry {
    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    /// Resolve the completion signal, if any. Later calls do nothing.
    pub fn complete(&mut self, result: Result<()>) {
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(result);
        }
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then submission order
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending-work snapshot for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueTelemetry {
    pub total: usize,
    pub video: usize,
    pub audio: usize,
    pub other: usize,
}

impl QueueTelemetry {
    fn add(&mut self, category: PacketCategory) {
        self.total += 1;
        match category {
            PacketCategory::Video => self.video += 1,
            PacketCategory::Audio => self.audio += 1,
            PacketCategory::Other => self.other += 1,
        }
    }

    fn remove(&mut self, category: PacketCategory) {
        self.total = self.total.saturating_sub(1);
        match category {
            PacketCategory::Video => self.video = self.video.saturating_sub(1),
            PacketCategory::Audio => self.audio = self.audio.saturating_sub(1),
            PacketCategory::Other => self.other = self.other.saturating_sub(1),
        }
    }
}

struct QueueInner {
    heap: BinaryHeap<QueueEntry>,
    next_sequence: u64,
    telemetry: QueueTelemetry,
    closed: bool,
}

impl QueueInner {
    fn push(&mut self, entry: QueueEntry) {
        self.telemetry.add(entry.packet.category());
        self.heap.push(entry);
    }

    fn pop(&mut self) -> Option<QueueEntry> {
        let entry = self.heap.pop()?;
        self.telemetry.remove(entry.packet.category());
        Some(entry)
    }
}

/// Outbound scheduler: priority first, FIFO within a priority
pub struct MessagePriorityQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    max_pending: usize,
}

impl MessagePriorityQueue {
    pub fn new(max_pending: usize) -> Self {
        MessagePriorityQueue {
            inner: Mutex::new(QueueInner {
                heap: BinaryHeap::new(),
                next_sequence: 0,
                telemetry: QueueTelemetry::default(),
                closed: false,
            }),
            notify: Notify::new(),
            max_pending,
        }
    }

    /// Add a packet. Fails once the queue is full or invalidated.
    pub async fn enqueue(
        &self,
        packet: RtmpPacket,
        force_type0: bool,
        completion: Option<CompletionSender>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(Error::connection("Connection closed"));
        }
        if inner.heap.len() >= self.max_pending {
            return Err(Error::QueueFull(inner.heap.len()));
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        let priority = packet.priority();
        inner.push(QueueEntry {
            packet,
            force_type0,
            completion,
            sequence,
            priority,
        });
        drop(inner);

        self.notify.notify_one();
        Ok(())
    }

    /// Put back an entry that could not be sent yet. It keeps its original
    /// place in line and is not subject to the pending limit.
    pub async fn requeue(&self, mut entry: QueueEntry) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            entry.complete(Err(Error::connection("Connection closed")));
            return;
        }
        inner.push(entry);
        drop(inner);

        self.notify.notify_one();
    }

    /// Highest-priority entry, if any is pending
    pub async fn try_dequeue(&self) -> Option<QueueEntry> {
        self.inner.lock().await.pop()
    }

    /// Wait for the highest-priority entry
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Result<QueueEntry> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().await;
                if let Some(entry) = inner.pop() {
                    return Ok(entry);
                }
                if inner.closed {
                    return Err(Error::connection("Connection closed"));
                }
            }

            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
    }

    pub async fn telemetry(&self) -> QueueTelemetry {
        self.inner.lock().await.telemetry
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.heap.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every pending entry, failing their completion signals, and
    /// refuse further work
    pub async fn invalidate(&self, reason: &Error) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;

        let mut dropped = 0;
        while let Some(mut entry) = inner.pop() {
            entry.complete(Err(reason.duplicate()));
            dropped += 1;
        }
        drop(inner);

        if dropped > 0 {
            debug!("Dropped {} pending messages: {}", dropped, reason);
        }
        self.notify.notify_waiters();
    }
}
