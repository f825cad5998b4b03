// End-to-end tests for Connection over an in-memory transport

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use common::*;
use rtmp_transport::{
    Amf0Value, ConnectionConfig, ConnectionState, Error, MessageBody, MessageStreamId,
    PeerBandwidthLimit, RtmpCommand, RtmpMessage, RtmpPacket, Timestamp, Transport,
    UserControlEvent,
};

fn small_chunks() -> ConnectionConfig {
    ConnectionConfig::builder().chunk_size(128).build().unwrap()
}

fn video(ts: u32, len: usize) -> RtmpPacket {
    RtmpPacket::video(Timestamp::new(ts), MessageStreamId::new(1), vec![0x27; len])
}

#[tokio::test]
async fn test_sends_audio_to_peer() {
    init_logging();
    let (connection, mut peer, _rx) = connected_pair(ConnectionConfig::default());
    connection.start().await.unwrap();
    assert_eq!(connection.state().await, ConnectionState::Connected);

    connection.send(create_test_audio_packet(1000)).await.unwrap();

    // Non-default chunk size is announced first
    let first = peer.recv().await;
    assert_eq!(first.body, MessageBody::SetChunkSize(4096));

    let audio = peer.recv_matching(is_media).await;
    assert_eq!(audio.body, MessageBody::Audio(vec![0xAF, 0x01]));
    assert_eq!(audio.timestamp(), Timestamp::new(1000));
    assert_eq!(audio.message_stream_id(), MessageStreamId::new(1));
}

#[tokio::test]
async fn test_chunk_size_change_applies_after_announcement() {
    let (connection, mut peer, _rx) = connected_pair(small_chunks());
    connection.start().await.unwrap();

    connection.set_chunk_size(1024).await.unwrap();
    connection.send_and_wait(video(0, 3000)).await.unwrap();

    assert_eq!(peer.recv().await.body, MessageBody::SetChunkSize(1024));
    let message = peer.recv_matching(is_media).await;
    assert_eq!(message.body, MessageBody::Video(vec![0x27; 3000]));
    assert_eq!(peer.assembler.decoder().max_chunk_size(), 1024);

    // Set Chunk Size is 12 + 4 bytes; the video goes out as one Type 0
    // chunk and two Type 3 continuations
    let stats = connection.stats().await;
    assert_eq!(stats.bytes_out, 16 + 12 + 3000 + 2);
}

#[tokio::test]
async fn test_rejects_bad_chunk_size() {
    let (connection, _peer, _rx) = connected_pair(small_chunks());
    let err = connection.set_chunk_size(0).await.unwrap_err();
    assert!(matches!(err, Error::ChunkSizeRejected { requested: 0, min: 1, max: 0xFF_FFFF }));
}

#[tokio::test]
async fn test_handler_receives_commands() {
    let (connection, mut peer, mut rx) = connected_pair(small_chunks());
    connection.start().await.unwrap();

    let info = Amf0Value::object([
        ("level", Amf0Value::String("status".into())),
        ("code", Amf0Value::String("NetStream.Publish.Start".into())),
    ]);
    let command = RtmpCommand::new("onStatus", 0.0).with_argument(info);
    peer.send_message(RtmpMessage::new(
        MessageBody::Command { command, amf3: false },
        Timestamp::ZERO,
        MessageStreamId::new(1),
    ))
    .await;

    let received = tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    let MessageBody::Command { command, .. } = received.body else {
        panic!("expected a command, got {:?}", received.body);
    };
    assert_eq!(command.name, "onStatus");
    let code = command.info().and_then(|i| i.get_property("code")).and_then(|c| c.as_string());
    assert_eq!(code, Some("NetStream.Publish.Start"));
}

#[tokio::test]
async fn test_ping_is_answered() {
    let (connection, mut peer, mut rx) = connected_pair(small_chunks());
    connection.start().await.unwrap();

    peer.send_message(RtmpMessage::control(MessageBody::UserControl(
        UserControlEvent::PingRequest(1234),
    )))
    .await;

    let reply = peer
        .recv_matching(|m| matches!(m.body, MessageBody::UserControl(_)))
        .await;
    assert_eq!(reply.body, MessageBody::UserControl(UserControlEvent::PingResponse(1234)));

    // The handler still sees the request
    let seen = tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(seen.body, MessageBody::UserControl(UserControlEvent::PingRequest(1234)));
}

#[tokio::test]
async fn test_acknowledges_each_window() {
    let config = ConnectionConfig::builder()
        .chunk_size(128)
        .window_ack_size(1000)
        .build()
        .unwrap();
    let (connection, mut peer, _rx) = connected_pair(config);
    connection.start().await.unwrap();

    peer.send_packet(&video(0, 600)).await;
    peer.send_packet(&video(40, 600)).await;

    let ack = peer
        .recv_matching(|m| matches!(m.body, MessageBody::Acknowledgement(_)))
        .await;
    let MessageBody::Acknowledgement(value) = ack.body else { unreachable!() };
    assert!(value >= 1000, "acknowledged {} bytes", value);
}

#[tokio::test]
async fn test_backpressure_holds_media_until_acknowledged() {
    let config = ConnectionConfig::builder()
        .chunk_size(128)
        .window_ack_size(1000)
        .backpressure_retry_interval(Duration::from_millis(5))
        .build()
        .unwrap();
    let (connection, mut peer, _rx) = connected_pair(config);
    connection.start().await.unwrap();

    connection.send_and_wait(video(0, 1200)).await.unwrap();
    assert!(is_media(&peer.recv().await));

    connection.send(video(40, 10)).await.unwrap();

    // Control traffic still gets through
    connection.set_chunk_size(256).await.unwrap();
    assert_eq!(peer.recv().await.body, MessageBody::SetChunkSize(256));

    assert!(peer.try_recv(Duration::from_millis(100)).await.is_none());

    let sent = connection.stats().await.bytes_out;
    peer.send_message(RtmpMessage::control(MessageBody::Acknowledgement(sent as u32))).await;

    let released = peer.recv_matching(is_media).await;
    assert_eq!(released.timestamp(), Timestamp::new(40));
    assert_eq!(connection.stats().await.received_acknowledgement, sent);
}

#[tokio::test]
async fn test_peer_bandwidth_announces_window() {
    let (connection, mut peer, _rx) = connected_pair(small_chunks());
    connection.start().await.unwrap();

    peer.send_message(RtmpMessage::control(MessageBody::SetPeerBandwidth {
        size: 5_000_000,
        limit: PeerBandwidthLimit::Hard,
    }))
    .await;

    let reply = peer
        .recv_matching(|m| matches!(m.body, MessageBody::WindowAckSize(_)))
        .await;
    assert_eq!(reply.body, MessageBody::WindowAckSize(5_000_000));
    assert_eq!(connection.stats().await.window_size, 5_000_000);
}

#[tokio::test]
async fn test_inbound_chunk_size_respected() {
    let (connection, mut peer, mut rx) = connected_pair(small_chunks());
    connection.start().await.unwrap();

    peer.send_message(RtmpMessage::control(MessageBody::SetChunkSize(4096))).await;
    peer.encoder.set_chunk_size(4096).unwrap();
    peer.send_packet(&video(0, 3000)).await;

    let first = tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.body, MessageBody::SetChunkSize(4096));
    let second = tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(second.body, MessageBody::Video(vec![0x27; 3000]));
}

#[tokio::test]
async fn test_peer_disconnect_invalidates_once() {
    let (connection, peer, _rx) = connected_pair(small_chunks());
    let calls = Arc::new(AtomicUsize::new(0));
    {
        let calls = calls.clone();
        connection.on_error(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .await;
    }
    connection.start().await.unwrap();

    drop(peer);

    let result = tokio::time::timeout(RECV_TIMEOUT, connection.closed()).await.unwrap();
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(connection.state().await, ConnectionState::Closed);
    assert!(connection.send(create_test_audio_packet(0)).await.is_err());
}

#[tokio::test]
async fn test_pending_completion_resolves_on_failure() {
    let config = ConnectionConfig::builder()
        .chunk_size(128)
        .window_ack_size(100)
        .build()
        .unwrap();
    let (connection, mut peer, _rx) = connected_pair(config);
    let connection = Arc::new(connection);
    connection.start().await.unwrap();

    connection.send_and_wait(video(0, 200)).await.unwrap();
    assert!(is_media(&peer.recv().await));

    // Held back by the full window
    let waiter = {
        let connection = connection.clone();
        tokio::spawn(async move { connection.send_and_wait(video(40, 10)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(peer);

    let result = tokio::time::timeout(RECV_TIMEOUT, waiter).await.unwrap().unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_framing_error_tears_down() {
    let (connection, mut peer, _rx) = connected_pair(small_chunks());
    connection.start().await.unwrap();

    // Type 3 chunk on a chunk stream that never had a header
    peer.send_raw(&[0xC5, 0x00]).await;

    let result = tokio::time::timeout(RECV_TIMEOUT, connection.closed()).await.unwrap();
    assert!(matches!(result, Err(Error::Chunk(_))));
}

#[tokio::test]
async fn test_close_is_clean() {
    let (connection, _peer, _rx) = connected_pair(small_chunks());
    connection.start().await.unwrap();

    connection.close().await;
    assert!(connection.closed().await.is_ok());
    assert_eq!(connection.state().await, ConnectionState::Closed);
    assert!(connection.send(create_test_video_packet(0, true)).await.is_err());
}

#[tokio::test]
async fn test_start_twice_fails() {
    let (connection, _peer, _rx) = connected_pair(small_chunks());
    connection.start().await.unwrap();
    assert!(matches!(connection.start().await, Err(Error::InvalidState(_))));
}

#[tokio::test]
async fn test_egress_limited_delivery() {
    let config = ConnectionConfig::builder()
        .chunk_size(4096)
        .egress_limit(4096 + 18, 100_000.0)
        .build()
        .unwrap();
    let (connection, mut peer, _rx) = connected_pair(config);
    connection.start().await.unwrap();

    connection.send(video(0, 10_000)).await.unwrap();
    let message = peer.recv_matching(is_media).await;
    assert_eq!(message.body, MessageBody::Video(vec![0x27; 10_000]));
}

#[tokio::test]
async fn test_close_with_stalled_peer() {
    // The peer never reads, so the 10 KB write cannot complete
    let (connection, _peer, _rx) = connected_pair_with_capacity(small_chunks(), 64);
    let calls = Arc::new(AtomicUsize::new(0));
    {
        let calls = calls.clone();
        connection.on_error(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .await;
    }
    connection.start().await.unwrap();

    connection.send(video(0, 10_000)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(RECV_TIMEOUT, connection.close()).await.unwrap();
    let result = tokio::time::timeout(RECV_TIMEOUT, connection.closed()).await.unwrap();
    assert!(result.is_ok());
    assert_eq!(connection.state().await, ConnectionState::Closed);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pending_send_fails_when_stalled_connection_closes() {
    let (connection, _peer, _rx) = connected_pair_with_capacity(small_chunks(), 64);
    let connection = Arc::new(connection);
    connection.start().await.unwrap();

    let waiter = {
        let connection = connection.clone();
        tokio::spawn(async move { connection.send_and_wait(video(0, 10_000)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(RECV_TIMEOUT, connection.close()).await.unwrap();
    let result = tokio::time::timeout(RECV_TIMEOUT, waiter).await.unwrap().unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_drop_shuts_transport_down() {
    let (connection, peer, _rx) = connected_pair(small_chunks());
    connection.start().await.unwrap();

    drop(connection);

    // The peer sees end of stream once the background teardown has run
    let read = tokio::time::timeout(RECV_TIMEOUT, peer.transport.receive_data()).await.unwrap();
    assert!(read.is_err());
}
