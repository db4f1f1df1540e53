//! # Transport Layer
//!
//! Binds sessions to real sockets.
//!
//! A [`Session`](crate::session::Session) works over any `AsyncRead + AsyncWrite` stream; this
//! layer only establishes those streams and applies the connect and shutdown deadlines.
//!
//! ## Transports
//! - **TCP**: client connect with a deadline, and an accept loop with graceful shutdown

pub mod tcp;
