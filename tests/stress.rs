use bytes::BytesMut;
use duplex_wire::core::codec::FrameCodec;
use duplex_wire::core::frame::Frame;
use duplex_wire::protocol::{MessageFactory, MessageType, SingleString};
use tokio_util::codec::{Decoder, Encoder};

#[test]
fn stress_frame_encode_decode_large_series() {
    // heavy burst of frames through one buffer: no panics, nothing left behind
    let mut codec = FrameCodec;
    let mut buf = BytesMut::new();

    for size in [0usize, 1, 64, 512, 4096, 65535] {
        for i in 0..2_000u16 {
            let frame = Frame::new(MessageType(i), vec![0u8; size]).unwrap();
            codec.encode(frame.clone(), &mut buf).unwrap();
            let decoded = codec.decode(&mut buf).unwrap();
            assert_eq!(decoded.as_ref(), Some(&frame));
            assert!(buf.is_empty());
        }
    }
}

#[test]
fn stress_factory_generate_many() {
    let factory = MessageFactory::global();
    for i in 0..50_000 {
        let text = format!("payload-{i}");
        let msg = factory
            .generate(MessageType::SINGLE_STRING, text.as_bytes())
            .unwrap();
        assert_eq!(msg.downcast_ref::<SingleString>().unwrap().message(), text);
    }
}
