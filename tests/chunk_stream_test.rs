// Wire-level tests: exact chunk bytes and stream reassembly

mod common;

use std::sync::Arc;
use common::*;
use rtmp_transport::{
    Amf0Codec, ChunkEncoder, ChunkStreamId, MessageAssembler, MessageStreamId, RtmpHeader,
    RtmpPacket, Timestamp, MSG_TYPE_AUDIO,
};

fn audio_on(csid: u32, ts: u32, payload: Vec<u8>) -> RtmpPacket {
    let header = RtmpHeader::new(
        Timestamp::new(ts),
        0,
        MSG_TYPE_AUDIO,
        MessageStreamId::new(1),
        ChunkStreamId::new(csid).unwrap(),
    );
    RtmpPacket::new(header, payload)
}

fn drain(assembler: &mut MessageAssembler) -> Vec<RtmpPacket> {
    let mut packets = Vec::new();
    while let Some(packet) = assembler.next_packet().unwrap() {
        packets.push(packet);
    }
    packets
}

#[test]
fn test_type0_layout() {
    let mut encoder = ChunkEncoder::new();
    let bytes = encoder
        .encode_to_bytes(&audio_on(10, 1000, vec![0xAB; 9]), false)
        .unwrap();

    assert_eq!(
        &bytes[..12],
        &[
            0x0A, // fmt 0, csid 10
            0x00, 0x03, 0xE8, // timestamp 1000
            0x00, 0x00, 0x09, // length
            0x08, // audio
            0x01, 0x00, 0x00, 0x00, // stream id, little endian
        ]
    );
    assert_eq!(&bytes[12..], &[0xAB; 9]);
}

#[test]
fn test_same_shape_compresses_to_type2() {
    let mut encoder = ChunkEncoder::new();
    encoder.encode_to_bytes(&audio_on(10, 1000, vec![0; 9]), false).unwrap();

    let bytes = encoder.encode_to_bytes(&audio_on(10, 1040, vec![0; 9]), false).unwrap();
    assert_eq!(&bytes[..4], &[0x8A, 0x00, 0x00, 0x28]);
    assert_eq!(bytes.len(), 4 + 9);

    // A different length needs Type 1
    let bytes = encoder.encode_to_bytes(&audio_on(10, 1080, vec![0; 5]), false).unwrap();
    assert_eq!(&bytes[..8], &[0x4A, 0x00, 0x00, 0x28, 0x00, 0x00, 0x05, 0x08]);

    // Forced back to Type 0
    let bytes = encoder.encode_to_bytes(&audio_on(10, 1120, vec![0; 5]), true).unwrap();
    assert_eq!(bytes[0], 0x0A);
    assert_eq!(bytes.len(), 12 + 5);
}

#[test]
fn test_extended_timestamp_repeated_on_continuations() {
    let mut encoder = ChunkEncoder::new();
    let bytes = encoder
        .encode_to_bytes(&audio_on(10, 0x0100_0000, vec![0x55; 200]), false)
        .unwrap();

    assert_eq!(&bytes[1..4], &[0xFF, 0xFF, 0xFF]);
    assert_eq!(&bytes[12..16], &[0x01, 0x00, 0x00, 0x00]);

    // 1 + 11 + 4 + 128 bytes, then a Type 3 continuation with its own copy
    let second = 1 + 11 + 4 + 128;
    assert_eq!(bytes[second], 0xCA);
    assert_eq!(&bytes[second + 1..second + 5], &[0x01, 0x00, 0x00, 0x00]);
    assert_eq!(bytes.len(), second + 5 + 72);

    let mut assembler = MessageAssembler::new(Arc::new(Amf0Codec));
    assembler.feed(&bytes);
    let packets = drain(&mut assembler);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].timestamp(), Timestamp::new(0x0100_0000));
    assert_eq!(packets[0].payload, vec![0x55; 200]);
}

#[test]
fn test_basic_header_forms() {
    let mut encoder = ChunkEncoder::new();

    let two = encoder.encode_to_bytes(&audio_on(64, 0, vec![1]), false).unwrap();
    assert_eq!(&two[..2], &[0x00, 0x00]);

    let three = encoder.encode_to_bytes(&audio_on(400, 0, vec![1]), false).unwrap();
    // 400 - 64 = 0x150, low byte first
    assert_eq!(&three[..3], &[0x01, 0x50, 0x01]);

    let mut assembler = MessageAssembler::new(Arc::new(Amf0Codec));
    assembler.feed(&two);
    assembler.feed(&three);
    let packets = drain(&mut assembler);
    let ids: Vec<u32> = packets.iter().map(|p| p.chunk_stream_id().value()).collect();
    assert_eq!(ids, vec![64, 400]);
}

#[test]
fn test_interleaved_streams_split_across_reads() {
    let mut encoder = ChunkEncoder::new();
    let audio = encoder.encode(&create_test_audio_packet(0), false).unwrap();
    let video = encoder
        .encode(
            &RtmpPacket::video(Timestamp::new(0), MessageStreamId::new(1), vec![0x17; 300]),
            false,
        )
        .unwrap();
    assert_eq!(video.len(), 3);

    // Video chunk, audio, then the rest of the video
    let mut wire = Vec::new();
    wire.extend(video[0].to_bytes().unwrap());
    wire.extend(audio[0].to_bytes().unwrap());
    wire.extend(video[1].to_bytes().unwrap());
    wire.extend(video[2].to_bytes().unwrap());

    let mut assembler = MessageAssembler::new(Arc::new(Amf0Codec));
    let mut packets = Vec::new();
    for piece in wire.chunks(7) {
        assembler.feed(piece);
        packets.extend(drain(&mut assembler));
    }

    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0], create_test_audio_packet(0));
    assert_eq!(packets[1].payload, vec![0x17; 300]);
}
