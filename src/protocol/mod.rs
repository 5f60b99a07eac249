//! # Message Layer
//!
//! Typed messages and the registry that rehydrates them from frames.
//!
//! ## Components
//! - **Message**: the pack/unpack contract plus downcasting helpers
//! - **MessageFactory**: type id → constructor registry
//! - **Heartbeat**: keep-alive carrying a `u64` serial number
//! - **SingleString**: raw UTF-8 text
//!
//! ## Registering a custom kind
//! ```rust
//! use duplex_wire::error::Result;
//! use duplex_wire::protocol::{Message, MessageFactory, MessageType};
//!
//! #[derive(Debug, Default)]
//! struct Ack(u8);
//!
//! impl Message for Ack {
//!     fn message_type(&self) -> MessageType { MessageType(0x10) }
//!     fn pack(&self) -> Result<Vec<u8>> { Ok(vec![self.0]) }
//!     fn unpack(&mut self, payload: &[u8]) -> Result<()> {
//!         self.0 = payload.first().copied().unwrap_or_default();
//!         Ok(())
//!     }
//! }
//!
//! let factory = MessageFactory::with_builtins();
//! factory
//!     .register(MessageType(0x10), |_, payload| {
//!         let mut ack = Ack::default();
//!         ack.unpack(payload)?;
//!         Ok(Box::new(ack) as Box<dyn Message>)
//!     })
//!     .unwrap();
//! assert!(factory.is_registered(MessageType(0x10)));
//! ```

pub mod factory;
pub mod heartbeat;
pub mod message;
pub mod single_string;

pub use factory::{Constructor, MessageFactory};
pub use heartbeat::Heartbeat;
pub use message::{Message, MessageType};
pub use single_string::SingleString;
