//! # Frame
//!
//! One complete wire unit: header plus the payload of a single message.
//!
//! ```text
//! ┌──────────────────┬────────────────────┬──────────────────────┐
//! │ MessageType (2B) │ PayloadLength (2B) │ Payload              │
//! │ big-endian       │ big-endian         │ (PayloadLength bytes)│
//! └──────────────────┴────────────────────┴──────────────────────┘
//! ```
//!
//! There is no magic, version or checksum. Integrity is the transport's job.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};
use crate::protocol::message::{recover, Message, MessageType};

/// Header size: type (2) + length (2).
pub const HEADER_SIZE: usize = 4;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Largest number of bytes a single frame occupies on the wire.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// A type id and payload whose length always fits the 16-bit length field.
///
/// Fields are private so every frame passes through [`Frame::new`]; encoding can then
/// never emit a length field that disagrees with the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    message_type: MessageType,
    payload: Bytes,
}

impl Frame {
    /// Build a frame, rejecting payloads the length field cannot carry.
    pub fn new(message_type: MessageType, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge(payload.len()));
        }
        Ok(Self {
            message_type,
            payload,
        })
    }

    /// Pack a message into a frame. A panicking `pack` becomes an error.
    pub fn from_message(msg: &dyn Message) -> Result<Self> {
        let payload = recover("pack", || msg.pack())?;
        Self::new(msg.message_type(), payload)
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Split into type id and payload.
    pub fn into_parts(self) -> (MessageType, Bytes) {
        (self.message_type, self.payload)
    }

    /// Total wire size (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Append the encoded frame to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        dst.put_u16(self.message_type.0);
        // every constructor goes through `Frame::new`, which bounds the payload to u16::MAX
        dst.put_u16(self.payload.len() as u16);
        dst.put_slice(&self.payload);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Parse exactly one frame. `data` must hold the header and the full payload and
    /// nothing after it, which is what the scanner hands out.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::TruncatedFrame(data.len()));
        }
        let message_type = MessageType(u16::from_be_bytes([data[0], data[1]]));
        let length = u16::from_be_bytes([data[2], data[3]]) as usize;
        let body = &data[HEADER_SIZE..];
        if body.len() != length {
            return Err(ProtocolError::MalformedPayload(format!(
                "length field says {length} bytes, frame carries {}",
                body.len()
            )));
        }
        Self::new(message_type, Bytes::copy_from_slice(body))
    }
}

/// Encode `msg` as one contiguous frame buffer.
///
/// Fails with [`ProtocolError::PayloadTooLarge`] before anything is produced when the
/// packed payload exceeds 65535 bytes.
pub fn pack(msg: &dyn Message) -> Result<Bytes> {
    Frame::from_message(msg).map(|frame| frame.to_bytes())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::protocol::{Heartbeat, SingleString};

    #[derive(Debug)]
    struct Blob(usize);

    impl Message for Blob {
        fn message_type(&self) -> MessageType {
            MessageType(0x0300)
        }

        fn pack(&self) -> Result<Vec<u8>> {
            Ok(vec![0xAB; self.0])
        }

        fn unpack(&mut self, payload: &[u8]) -> Result<()> {
            self.0 = payload.len();
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Faulty;

    impl Message for Faulty {
        fn message_type(&self) -> MessageType {
            MessageType(0x0301)
        }

        fn pack(&self) -> Result<Vec<u8>> {
            panic!("pack exploded")
        }

        fn unpack(&mut self, _payload: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_heartbeat_wire_bytes() {
        let bytes = pack(&Heartbeat::new(1)).unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0x00, 0x01, 0x00, 0x08, 0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn test_single_string_wire_bytes() {
        let bytes = pack(&SingleString::new("hi")).unwrap();
        assert_eq!(bytes.as_ref(), &[0x00, 0x02, 0x00, 0x02, b'h', b'i']);
    }

    #[test]
    fn test_max_payload_packs() {
        let bytes = pack(&Blob(MAX_PAYLOAD_SIZE)).unwrap();
        assert_eq!(bytes.len(), MAX_FRAME_SIZE);
        assert_eq!(&bytes[2..4], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_oversize_payload_rejected() {
        let err = pack(&Blob(MAX_PAYLOAD_SIZE + 1)).unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooLarge(65536)));
    }

    #[test]
    fn test_panicking_pack_recovered() {
        let err = pack(&Faulty).unwrap_err();
        assert!(matches!(err, ProtocolError::Panicked { context: "pack", .. }));
    }

    #[test]
    fn test_from_bytes_rejects_length_mismatch() {
        let mut bytes = pack(&SingleString::new("abc")).unwrap().to_vec();
        bytes.push(b'!');
        assert!(matches!(
            Frame::from_bytes(&bytes),
            Err(ProtocolError::MalformedPayload(_))
        ));
        assert!(matches!(
            Frame::from_bytes(&bytes[..3]),
            Err(ProtocolError::TruncatedFrame(3))
        ));
    }

    #[test]
    fn test_oversize_payload_never_reaches_the_wire() {
        let oversized = vec![b'a'; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            Frame::new(MessageType::SINGLE_STRING, oversized.clone()),
            Err(ProtocolError::PayloadTooLarge(65536))
        ));

        // a header claiming an empty payload followed by the oversized body
        let mut wire = vec![0x00, 0x02, 0x00, 0x00];
        wire.extend_from_slice(&oversized);
        assert!(matches!(
            Frame::from_bytes(&wire),
            Err(ProtocolError::MalformedPayload(_))
        ));

        let longest = Frame::new(MessageType::SINGLE_STRING, vec![b'a'; MAX_PAYLOAD_SIZE]).unwrap();
        let bytes = longest.to_bytes();
        assert_eq!(&bytes[2..4], &[0xFF, 0xFF]);
        assert_eq!(bytes.len() - HEADER_SIZE, longest.payload().len());
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame::new(MessageType(7), Bytes::from_static(b"payload")).unwrap();
        let decoded = Frame::from_bytes(&frame.to_bytes()).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(frame.wire_size(), HEADER_SIZE + 7);

        let (message_type, payload) = decoded.into_parts();
        assert_eq!(message_type, MessageType(7));
        assert_eq!(payload.as_ref(), b"payload");
    }
}
