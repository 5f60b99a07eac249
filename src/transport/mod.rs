//! # Transport Layer
//!
//! Socket plumbing that produces started connections.
//!
//! [`Conn`](crate::service::conn::Conn) itself works over any
//! `AsyncRead + AsyncWrite` stream (in-memory pipes, Unix sockets, TLS streams);
//! this module only adds the TCP dial/accept loop.

pub mod tcp;
