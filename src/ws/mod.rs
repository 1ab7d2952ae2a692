//! WebSocket bridge to the chain watcher and renderer

pub mod handler;
pub mod protocol;
