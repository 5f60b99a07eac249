//! Raw text message. The payload is the UTF-8 bytes of the string, verbatim.

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{Message, MessageType};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SingleString {
    message: String,
}

impl SingleString {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_string(self) -> String {
        self.message
    }

    /// Factory constructor: checks the id, then unpacks.
    pub fn construct(message_type: MessageType, payload: &[u8]) -> Result<Box<dyn Message>> {
        if message_type != MessageType::SINGLE_STRING {
            return Err(ProtocolError::TypeMismatch {
                expected: MessageType::SINGLE_STRING,
                actual: message_type,
            });
        }
        let mut single = SingleString::default();
        single.unpack(payload)?;
        Ok(Box::new(single))
    }
}

impl From<&str> for SingleString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SingleString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Message for SingleString {
    fn message_type(&self) -> MessageType {
        MessageType::SINGLE_STRING
    }

    fn pack(&self) -> Result<Vec<u8>> {
        Ok(self.message.as_bytes().to_vec())
    }

    fn unpack(&mut self, payload: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(payload).map_err(|e| {
            ProtocolError::MalformedPayload(format!("{}: {e}", constants::ERR_INVALID_UTF8))
        })?;
        self.message = text.to_owned();
        Ok(())
    }
}
