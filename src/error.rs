//! # Error Types
//!
//! Error handling for the wire protocol and the connection layer.
//!
//! This module defines every error variant that can occur while registering message
//! kinds, packing and decoding frames, and driving a connection.
//!
//! ## Error Categories
//! - **Registration Errors**: duplicate message types, returned to the registrant
//! - **Decode Errors**: unknown types, mismatched ids, malformed or truncated payloads
//! - **Encode Errors**: oversized payloads, panicking `pack` implementations
//! - **Connection Errors**: I/O failures, idle timeouts, sends after close
//!
//! Decode, encode, I/O and liveness errors are fatal to a connection: the connection
//! closes and the error is only logged. Registration errors and `ConnectionClosed`
//! are the only ones a caller ever sees.
//!
//! ## Example Usage
//! ```rust
//! use duplex_wire::error::{ProtocolError, Result};
//! use duplex_wire::protocol::{MessageFactory, MessageType};
//!
//! fn lookup(factory: &MessageFactory) -> Result<()> {
//!     let msg = factory.generate(MessageType(0x7777), &[])?;
//!     println!("{msg:?}");
//!     Ok(())
//! }
//!
//! let factory = MessageFactory::with_builtins();
//! assert!(matches!(lookup(&factory), Err(ProtocolError::UnknownType(_))));
//! ```

use std::io;
use thiserror::Error;

use crate::protocol::message::MessageType;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Registry errors
    pub const ERR_FACTORY_WRITE_LOCK: &str = "Failed to acquire write lock on message factory";
    pub const ERR_FACTORY_READ_LOCK: &str = "Failed to acquire read lock on message factory";

    /// Payload validation errors
    pub const ERR_HEARTBEAT_LENGTH: &str = "Heartbeat payload must be exactly 8 bytes";
    pub const ERR_INVALID_UTF8: &str = "SingleString payload is not valid UTF-8";
}

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Message type {0} is already registered")]
    DuplicateType(MessageType),

    #[error("Unknown message type {0}")]
    UnknownType(MessageType),

    #[error("Message type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: MessageType,
        actual: MessageType,
    },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Payload too large: {0} bytes (maximum 65535)")]
    PayloadTooLarge(usize),

    #[error("Stream ended inside a frame ({0} bytes buffered)")]
    TruncatedFrame(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out (no activity)")]
    ConnectionTimeout,

    #[error("Connection already started")]
    AlreadyStarted,

    #[error("Panic inside {context}: {message}")]
    Panicked {
        context: &'static str,
        message: String,
    },

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// True for errors that come from the peer or the transport rather than from
    /// local misuse. Used to pick the log level when a connection dies.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_)
                | ProtocolError::UnknownType(_)
                | ProtocolError::TypeMismatch { .. }
                | ProtocolError::MalformedPayload(_)
                | ProtocolError::TruncatedFrame(_)
                | ProtocolError::ConnectionTimeout
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
