//! A Model Context Protocol server, speaking line-delimited JSON-RPC 2.0.

pub mod protocol;
mod server;

pub use server::serve;
