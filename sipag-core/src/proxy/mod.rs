//! The git-proxy RPC: protocol, validators, executor, and socket server.

pub mod executor;
pub mod protocol;
pub mod server;
pub mod validate;

pub use protocol::{Operation, Request, Response};
