//! # duplex-wire
//!
//! Type-length-value message framing and a heartbeat-supervised connection layer for
//! any duplex byte stream.
//!
//! ## Wire Format
//! ```text
//! [MessageType(2, BE)] [PayloadLength(2, BE)] [Payload(N ≤ 65535)]
//! ```
//!
//! ## Layers
//! - [`core`]: frames, the pure scanner, the tokio codec
//! - [`protocol`]: the [`Message`](protocol::Message) contract, the
//!   [`MessageFactory`](protocol::MessageFactory) registry and the built-in kinds
//! - [`service`]: [`Conn`](service::Conn), which runs the send, receive and heartbeat loops
//! - [`transport`]: TCP dial and accept helpers
//!
//! ## Example
//! ```rust,no_run
//! use duplex_wire::protocol::{MessageFactory, SingleString};
//! use duplex_wire::config::ConnectionConfig;
//! use duplex_wire::Conn;
//!
//! # async fn run() -> duplex_wire::error::Result<()> {
//! let (left, right) = tokio::io::duplex(64 * 1024);
//! let a = Conn::wrap(left, MessageFactory::global(), ConnectionConfig::default());
//! let b = Conn::wrap(right, MessageFactory::global(), ConnectionConfig::default());
//! a.start()?;
//! b.start()?;
//!
//! a.send_message(SingleString::new("hello")).await?;
//! if let Some(msg) = b.recv().await {
//!     if let Some(text) = msg.downcast_ref::<SingleString>() {
//!         println!("{}", text.message());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::frame::Frame;
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::{Heartbeat, Message, MessageFactory, MessageType, SingleString};
pub use crate::service::Conn;
