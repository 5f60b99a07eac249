//! Keep-alive message carrying a monotonically increasing serial number.
//!
//! Payload: 8 bytes, big-endian `u64`.

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{Message, MessageType};

const PAYLOAD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Heartbeat {
    serial_number: u64,
}

impl Heartbeat {
    pub fn new(serial_number: u64) -> Self {
        Self { serial_number }
    }

    pub fn serial_number(&self) -> u64 {
        self.serial_number
    }

    /// Factory constructor: checks the id, then unpacks.
    pub fn construct(message_type: MessageType, payload: &[u8]) -> Result<Box<dyn Message>> {
        if message_type != MessageType::HEARTBEAT {
            return Err(ProtocolError::TypeMismatch {
                expected: MessageType::HEARTBEAT,
                actual: message_type,
            });
        }
        let mut heartbeat = Heartbeat::default();
        heartbeat.unpack(payload)?;
        Ok(Box::new(heartbeat))
    }
}

impl Message for Heartbeat {
    fn message_type(&self) -> MessageType {
        MessageType::HEARTBEAT
    }

    fn pack(&self) -> Result<Vec<u8>> {
        Ok(self.serial_number.to_be_bytes().to_vec())
    }

    fn unpack(&mut self, payload: &[u8]) -> Result<()> {
        let bytes: [u8; PAYLOAD_LEN] = payload.try_into().map_err(|_| {
            ProtocolError::MalformedPayload(format!(
                "{} (got {})",
                constants::ERR_HEARTBEAT_LENGTH,
                payload.len()
            ))
        })?;
        self.serial_number = u64::from_be_bytes(bytes);
        Ok(())
    }
}
