//! Lantern - Minimal HTTP/1.1 Server
//!
//! Core library: request parsing, routing, response writing, and the
//! per-connection keep-alive loop, built directly on TCP.

pub mod config;
pub mod handlers;
pub mod http;
pub mod router;
pub mod server;
