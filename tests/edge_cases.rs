#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests: frame boundaries, payload validation, registry corner cases and
//! error formatting

use bytes::BytesMut;
use duplex_wire::core::codec::FrameCodec;
use duplex_wire::core::frame::{pack, Frame, HEADER_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};
use duplex_wire::core::scanner::{scan, Scan};
use duplex_wire::error::{ProtocolError, Result};
use duplex_wire::protocol::{Heartbeat, Message, MessageFactory, MessageType, SingleString};
use duplex_wire::utils::timeout::with_timeout_error;
use std::time::Duration;
use tokio_util::codec::{Decoder, Encoder};

// ============================================================================
// FRAME EDGE CASES
// ============================================================================

#[test]
fn test_frame_empty_payload() {
    let frame = Frame::new(MessageType(9), Vec::new()).unwrap();
    let bytes = frame.to_bytes();
    assert_eq!(&bytes[..], &[0x00, 0x09, 0x00, 0x00]);

    let decoded = Frame::from_bytes(&bytes).expect("Should decode empty payload");
    assert!(decoded.payload().is_empty());
    assert_eq!(decoded.message_type(), MessageType(9));
}

#[test]
fn test_frame_payload_exactly_max() {
    let frame = Frame::new(MessageType(3), vec![0xAB; MAX_PAYLOAD_SIZE]).unwrap();
    let bytes = frame.to_bytes();
    assert_eq!(bytes.len(), MAX_FRAME_SIZE);
    assert_eq!(&bytes[2..4], &[0xFF, 0xFF]);
    assert_eq!(Frame::from_bytes(&bytes).unwrap(), frame);
}

#[test]
fn test_frame_payload_one_more_than_max_fails() {
    let result = Frame::new(MessageType(3), vec![0; MAX_PAYLOAD_SIZE + 1]);
    assert!(matches!(result, Err(ProtocolError::PayloadTooLarge(65536))));
}

#[test]
fn test_frame_truncated_header() {
    let result = Frame::from_bytes(&[0x00, 0x01, 0x00]);
    assert!(matches!(result, Err(ProtocolError::TruncatedFrame(3))));
}

#[test]
fn test_frame_trailing_bytes_rejected() {
    let mut bytes = Frame::new(MessageType(1), vec![1, 2]).unwrap().to_bytes().to_vec();
    bytes.push(0xEE);
    assert!(matches!(
        Frame::from_bytes(&bytes),
        Err(ProtocolError::MalformedPayload(_))
    ));
}

#[test]
fn test_type_id_zero_and_max_are_ordinary() {
    for ty in [0u16, u16::MAX] {
        let frame = Frame::new(MessageType(ty), vec![7]).unwrap();
        assert_eq!(Frame::from_bytes(&frame.to_bytes()).unwrap().message_type().0, ty);
    }
}

// ============================================================================
// SCANNER / CODEC EDGE CASES
// ============================================================================

#[test]
fn test_scan_empty_buffer() {
    assert_eq!(scan(&[], false), Scan::NeedMore);
    assert_eq!(scan(&[], true), Scan::End);
}

#[test]
fn test_scan_leaves_following_bytes() {
    let wire = [0x00, 0x02, 0x00, 0x01, b'a', 0x00, 0x02];
    match scan(&wire, false) {
        Scan::Frame { consumed, frame } => {
            assert_eq!(consumed, HEADER_SIZE + 1);
            assert_eq!(frame, &wire[..5]);
        }
        other => panic!("expected a frame, got {other:?}"),
    }
}

#[test]
fn test_codec_back_to_back_frames_in_one_read() {
    let mut buf = BytesMut::new();
    let mut codec = FrameCodec;
    for i in 0..3u64 {
        codec
            .encode(Frame::from_message(&Heartbeat::new(i)).unwrap(), &mut buf)
            .unwrap();
    }
    codec
        .encode(Frame::new(MessageType(5), Vec::new()).unwrap(), &mut buf)
        .unwrap();

    let mut seen = Vec::new();
    while let Some(frame) = codec.decode(&mut buf).unwrap() {
        seen.push(frame.message_type());
    }
    assert_eq!(
        seen,
        vec![
            MessageType::HEARTBEAT,
            MessageType::HEARTBEAT,
            MessageType::HEARTBEAT,
            MessageType(5)
        ]
    );
    assert!(codec.decode_eof(&mut buf).unwrap().is_none());
}

#[test]
fn test_oversize_frame_cannot_be_encoded() {
    // the only ways to a `Frame` all enforce the 16-bit length
    let oversized = vec![0u8; MAX_PAYLOAD_SIZE + 10];
    assert!(matches!(
        Frame::new(MessageType(1), oversized.clone()),
        Err(ProtocolError::PayloadTooLarge(65545))
    ));

    let mut smuggled = vec![0x00, 0x01, 0x00, 0x00];
    smuggled.extend_from_slice(&oversized);
    assert!(Frame::from_bytes(&smuggled).is_err());

    let mut buf = BytesMut::new();
    let largest = Frame::new(MessageType(1), vec![0u8; MAX_PAYLOAD_SIZE]).unwrap();
    FrameCodec.encode(largest.clone(), &mut buf).unwrap();
    assert_eq!(buf.len(), MAX_FRAME_SIZE);
    assert_eq!(FrameCodec.decode(&mut buf).unwrap(), Some(largest));
}

// ============================================================================
// MESSAGE EDGE CASES
// ============================================================================

#[test]
fn test_single_string_empty() {
    let bytes = pack(&SingleString::new("")).unwrap();
    assert_eq!(&bytes[..], &[0x00, 0x02, 0x00, 0x00]);

    let msg = MessageFactory::global()
        .generate(MessageType::SINGLE_STRING, &[])
        .unwrap();
    assert_eq!(msg.downcast_ref::<SingleString>().unwrap().message(), "");
}

#[test]
fn test_single_string_unicode() {
    let text = "héllo wörld ✓ 日本語 🚀";
    let frame = Frame::from_message(&SingleString::new(text)).unwrap();
    assert_eq!(frame.payload().len(), text.len());
    let msg = MessageFactory::global()
        .generate(frame.message_type(), frame.payload())
        .unwrap();
    assert_eq!(msg.downcast_ref::<SingleString>().unwrap().message(), text);
}

#[test]
fn test_single_string_invalid_utf8() {
    let result = MessageFactory::global().generate(MessageType::SINGLE_STRING, &[0xC3, 0x28]);
    assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
}

#[test]
fn test_single_string_too_long_to_pack() {
    let text = "x".repeat(MAX_PAYLOAD_SIZE + 1);
    assert!(matches!(
        pack(&SingleString::new(text)),
        Err(ProtocolError::PayloadTooLarge(65536))
    ));
}

#[test]
fn test_heartbeat_wire_format() {
    let bytes = pack(&Heartbeat::new(0x0102_0304_0506_0708)).unwrap();
    assert_eq!(
        &bytes[..],
        &[0x00, 0x01, 0x00, 0x08, 1, 2, 3, 4, 5, 6, 7, 8]
    );
}

#[test]
fn test_heartbeat_short_and_long_payloads() {
    let factory = MessageFactory::global();
    for len in [0usize, 7, 9] {
        let result = factory.generate(MessageType::HEARTBEAT, &vec![0; len]);
        assert!(
            matches!(result, Err(ProtocolError::MalformedPayload(_))),
            "length {len} accepted"
        );
    }
}

#[test]
fn test_downcast_to_wrong_kind() {
    let msg: Box<dyn Message> = Box::new(Heartbeat::new(1));
    assert!(msg.is::<Heartbeat>());
    assert!(msg.downcast_ref::<SingleString>().is_none());
    let msg = msg.downcast::<SingleString>().unwrap_err();
    assert_eq!(msg.message_type(), MessageType::HEARTBEAT);
}

#[test]
fn test_type_mismatch_on_direct_construct() {
    let result = Heartbeat::construct(MessageType::SINGLE_STRING, &[0; 8]);
    assert!(matches!(
        result,
        Err(ProtocolError::TypeMismatch {
            expected: MessageType::HEARTBEAT,
            actual: MessageType::SINGLE_STRING,
        })
    ));
}

// ============================================================================
// REGISTRY EDGE CASES
// ============================================================================

#[test]
fn test_separate_factories_are_independent() {
    let a = MessageFactory::new();
    let b = MessageFactory::new();
    a.register(MessageType(0x0300), |_, payload| {
        SingleString::construct(MessageType::SINGLE_STRING, payload)
    })
    .unwrap();
    assert!(a.is_registered(MessageType(0x0300)));
    assert!(!b.is_registered(MessageType(0x0300)));
    assert!(matches!(
        b.generate(MessageType(0x0300), &[]),
        Err(ProtocolError::UnknownType(MessageType(0x0300)))
    ));
}

#[test]
fn test_builtins_listed() {
    let types = MessageFactory::with_builtins().registered_types();
    assert_eq!(types, vec![MessageType::HEARTBEAT, MessageType::SINGLE_STRING]);
}

// ============================================================================
// TIMEOUT EDGE CASES
// ============================================================================

#[tokio::test]
async fn test_timeout_zero_duration() {
    let result = with_timeout_error(
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, ProtocolError>(())
        },
        Duration::ZERO,
    )
    .await;
    assert!(matches!(result, Err(ProtocolError::Timeout)));
}

#[tokio::test]
async fn test_timeout_passes_inner_error_through() {
    let result: Result<()> = with_timeout_error(
        async { Err(ProtocolError::ConnectionClosed) },
        Duration::from_secs(1),
    )
    .await;
    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}

// ============================================================================
// ERROR FORMATTING
// ============================================================================

#[test]
fn test_error_display_formatting() {
    let cases = [
        (
            ProtocolError::UnknownType(MessageType(0x7777)),
            "Unknown message type 0x7777",
        ),
        (
            ProtocolError::DuplicateType(MessageType::HEARTBEAT),
            "Message type 0x0001 is already registered",
        ),
        (
            ProtocolError::PayloadTooLarge(70000),
            "Payload too large: 70000 bytes (maximum 65535)",
        ),
        (ProtocolError::ConnectionClosed, "Connection closed"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn test_error_remote_classification() {
    assert!(ProtocolError::ConnectionTimeout.is_remote());
    assert!(ProtocolError::MalformedPayload("x".into()).is_remote());
    assert!(!ProtocolError::PayloadTooLarge(70000).is_remote());
    assert!(!ProtocolError::ConnectionClosed.is_remote());
}
