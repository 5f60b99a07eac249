//! # Core Protocol Components
//!
//! Frame layout, the pure scanner, and the tokio codec that drives it.
//!
//! ## Components
//! - **Frame**: header + payload of one message, and the packer
//! - **Scanner**: extracts one complete frame from buffered bytes
//! - **Codec**: `tokio_util` decoder/encoder built on the scanner
//!
//! ## Wire Format
//! ```text
//! [MessageType(2, BE)] [PayloadLength(2, BE)] [Payload(N)]
//! ```
//!
//! ## Limits
//! - Maximum payload size: 65535 bytes (the length field is 16 bits)
//! - At most 65539 bytes are buffered for any one frame

pub mod codec;
pub mod frame;
pub mod scanner;
