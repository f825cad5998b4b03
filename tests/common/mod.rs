// Common test utilities and helper functions
//
// The far end of a connection is played by `Peer`: the other half of an
// in-memory duplex stream with its own encoder and assembler.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use rtmp_transport::{
    Amf0Codec, ChunkEncoder, Connection, ConnectionConfig, MessageAssembler, MessageBody,
    MessageStreamId, RtmpMessage, RtmpPacket, TcpTransport, Timestamp, Transport,
};
use tokio::sync::mpsc;

/// Generous bound for anything that should arrive
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Create a test video packet with specified timestamp
pub fn create_test_video_packet(timestamp: u32, is_keyframe: bool) -> RtmpPacket {
    // AVC keyframe / inter-frame, then a NALU header
    let mut payload = vec![if is_keyframe { 0x17 } else { 0x27 }];
    payload.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);

    RtmpPacket::video(Timestamp::new(timestamp), MessageStreamId::new(1), payload)
}

/// Create a test audio packet with specified timestamp
pub fn create_test_audio_packet(timestamp: u32) -> RtmpPacket {
    // AAC, 44.1kHz, 16-bit, stereo; raw packet
    RtmpPacket::audio(Timestamp::new(timestamp), MessageStreamId::new(1), vec![0xAF, 0x01])
}

/// The remote side of a connection under test
pub struct Peer {
    pub transport: TcpTransport,
    pub encoder: ChunkEncoder,
    pub assembler: MessageAssembler,
}

impl Peer {
    pub async fn send_packet(&mut self, packet: &RtmpPacket) {
        let bytes = self.encoder.encode_to_bytes(packet, false).unwrap();
        self.transport.send_data(&bytes).await.unwrap();
    }

    pub async fn send_message(&mut self, message: RtmpMessage) {
        let packet = message.to_packet(&Amf0Codec).unwrap();
        self.send_packet(&packet).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.transport.send_data(bytes).await.unwrap();
    }

    /// Next message from the connection, panicking after `RECV_TIMEOUT`
    pub async fn recv(&mut self) -> RtmpMessage {
        tokio::time::timeout(RECV_TIMEOUT, self.next())
            .await
            .expect("timed out waiting for a message")
    }

    /// Next message that is not protocol housekeeping the test does not
    /// care about
    pub async fn recv_matching<F>(&mut self, mut wanted: F) -> RtmpMessage
    where
        F: FnMut(&RtmpMessage) -> bool,
    {
        loop {
            let message = self.recv().await;
            if wanted(&message) {
                return message;
            }
        }
    }

    /// Whether anything arrives within `wait`
    pub async fn try_recv(&mut self, wait: Duration) -> Option<RtmpMessage> {
        tokio::time::timeout(wait, self.next()).await.ok()
    }

    async fn next(&mut self) -> RtmpMessage {
        loop {
            if let Some(message) = self.assembler.next_message().unwrap() {
                return message;
            }
            let data = self.transport.receive_data().await.unwrap();
            self.assembler.feed(&data);
        }
    }
}

/// Connection over an in-memory duplex stream, plus the peer on the other
/// end and a channel of everything the connection's handler received
pub fn connected_pair(config: ConnectionConfig) -> (Connection, Peer, mpsc::Receiver<RtmpMessage>) {
    connected_pair_with_capacity(config, 64 * 1024)
}

/// As `connected_pair`, with `capacity` bytes of buffering in each direction
pub fn connected_pair_with_capacity(
    config: ConnectionConfig,
    capacity: usize,
) -> (Connection, Peer, mpsc::Receiver<RtmpMessage>) {
    let (local, remote) = tokio::io::duplex(capacity);
    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::from_stream(local, config.receive_buffer_size));

    let (tx, rx) = mpsc::channel(64);
    let connection = Connection::new(transport, config, Arc::new(tx));

    let peer = Peer {
        transport: TcpTransport::from_stream(remote, 4096),
        encoder: ChunkEncoder::new(),
        assembler: MessageAssembler::new(Arc::new(Amf0Codec)),
    };

    (connection, peer, rx)
}

pub fn is_media(message: &RtmpMessage) -> bool {
    matches!(message.body, MessageBody::Audio(_) | MessageBody::Video(_))
}
