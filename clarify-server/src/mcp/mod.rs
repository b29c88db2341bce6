//! MCP surfaces: the four tool operations, the stdio server, and the
//! streamable-HTTP bridge.

pub mod http;
pub mod ops;
pub mod server;

pub use server::{serve_stdio, ClarifyServer};
