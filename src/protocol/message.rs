//! The capability contract every wire message implements.
//!
//! A message knows its [`MessageType`], can `pack` itself into payload bytes and
//! `unpack` payload bytes back into its own state. The 4-byte frame header is never
//! part of the payload; framing lives in [`crate::core::frame`].

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{ProtocolError, Result};

/// Numeric id carried in every frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageType(pub u16);

impl MessageType {
    /// Built-in keep-alive message.
    pub const HEARTBEAT: MessageType = MessageType(1);
    /// Built-in raw text message.
    pub const SINGLE_STRING: MessageType = MessageType(2);

    /// Whether this id is one of the built-in kinds.
    pub fn is_builtin(self) -> bool {
        self == Self::HEARTBEAT || self == Self::SINGLE_STRING
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl From<u16> for MessageType {
    fn from(value: u16) -> Self {
        MessageType(value)
    }
}

/// Upcast helper so `dyn Message` can be downcast to its concrete kind.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A message that can travel inside a frame.
///
/// Implementations must uphold `unpack(pack(x)) == x` for their observable state.
/// Payloads larger than 65535 bytes are rejected by the packer, not here.
pub trait Message: AsAny + fmt::Debug + Send + Sync {
    /// The id written into the frame header.
    fn message_type(&self) -> MessageType;

    /// Encode this message's state as payload bytes (no header).
    fn pack(&self) -> Result<Vec<u8>>;

    /// Replace this message's state with the decoded payload.
    fn unpack(&mut self, payload: &[u8]) -> Result<()>;
}

impl dyn Message {
    /// Whether the boxed message is a `T`.
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrow the message as its concrete kind.
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Recover the concrete kind, handing the box back on mismatch.
    pub fn downcast<T: Message>(self: Box<Self>) -> std::result::Result<Box<T>, Box<dyn Message>> {
        if self.is::<T>() {
            match self.into_any().downcast::<T>() {
                Ok(concrete) => Ok(concrete),
                // `is::<T>` held, so the cast above cannot miss
                Err(_) => unreachable!("type id checked before downcast"),
            }
        } else {
            Err(self)
        }
    }
}

/// Run `f`, turning a panic into [`ProtocolError::Panicked`].
///
/// User-supplied `pack`/`unpack` code runs behind this so a faulty implementation
/// closes one connection instead of unwinding through a connection task.
pub(crate) fn recover<T>(context: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ProtocolError::Panicked {
            context,
            message: panic_message(payload.as_ref()),
        }),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::protocol::{Heartbeat, SingleString};

    #[test]
    fn test_message_type_display() {
        assert_eq!(MessageType::HEARTBEAT.to_string(), "0x0001");
        assert_eq!(MessageType(0xBEEF).to_string(), "0xbeef");
    }

    #[test]
    fn test_builtin_ids() {
        assert!(MessageType::HEARTBEAT.is_builtin());
        assert!(MessageType::SINGLE_STRING.is_builtin());
        assert!(!MessageType(100).is_builtin());
    }

    #[test]
    fn test_downcast_ref_and_box() {
        let msg: Box<dyn Message> = Box::new(Heartbeat::new(9));
        assert!(msg.is::<Heartbeat>());
        assert!(msg.downcast_ref::<SingleString>().is_none());
        assert_eq!(msg.downcast_ref::<Heartbeat>().unwrap().serial_number(), 9);

        let msg = match msg.downcast::<SingleString>() {
            Ok(_) => panic!("heartbeat is not a string"),
            Err(original) => original,
        };
        let hb = msg.downcast::<Heartbeat>().expect("heartbeat downcast");
        assert_eq!(hb.serial_number(), 9);
    }

    #[test]
    fn test_recover_converts_panic() {
        let result: Result<()> = recover("pack", || panic!("boom"));
        match result {
            Err(ProtocolError::Panicked { context, message }) => {
                assert_eq!(context, "pack");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_recover_passes_through() {
        assert_eq!(recover("pack", || Ok(7)).unwrap(), 7);
    }
}
