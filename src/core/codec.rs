//! # Frame Codec
//!
//! Tokio codec that drives [`scan`](crate::core::scanner::scan) over a socket.
//!
//! `FramedRead<_, FrameCodec>` is the streaming token splitter: it owns the read
//! buffer, calls `decode` whenever new bytes arrive, and `decode_eof` once the stream
//! ends. The codec only translates scanner outcomes into frames or errors.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::core::frame::Frame;
use crate::core::scanner::{bytes_needed, scan, Scan};
use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    fn take_frame(src: &mut BytesMut, at_eof: bool) -> Result<Option<Frame>> {
        let consumed = match scan(src, at_eof) {
            Scan::Frame { consumed, .. } => consumed,
            Scan::NeedMore => 0,
            Scan::End => return Ok(None),
        };

        if consumed == 0 {
            if at_eof {
                return Err(ProtocolError::TruncatedFrame(src.len()));
            }
            let needed = bytes_needed(src);
            src.reserve(needed);
            return Ok(None);
        }

        let mut raw = src.split_to(consumed);
        let message_type = raw.get_u16();
        raw.advance(2);
        trace!(%message_type, bytes = consumed, "Frame scanned");

        Frame::new(message_type.into(), raw.freeze()).map(Some)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        Self::take_frame(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        Self::take_frame(src, true)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        frame.encode_into(dst);
        Ok(())
    }
}
