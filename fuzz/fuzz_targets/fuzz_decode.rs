#![no_main]

use bytes::BytesMut;
use duplex_wire::core::codec::FrameCodec;
use duplex_wire::protocol::MessageFactory;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Drive the stream decoder and the factory over hostile bytes
    let factory = MessageFactory::with_builtins();
    let mut codec = FrameCodec;
    let mut buf = BytesMut::from(data);

    loop {
        match codec.decode_eof(&mut buf) {
            Ok(Some(frame)) => {
                let _ = factory.generate(frame.message_type(), frame.payload());
            }
            Ok(None) | Err(_) => break,
        }
    }
});
