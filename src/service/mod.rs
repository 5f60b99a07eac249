//! # Connection Services
//!
//! The connection orchestrator built on the core framing and the message registry.

pub mod conn;

pub use conn::Conn;
