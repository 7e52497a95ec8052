//! IPC module for daemon-client communication

mod protocol;
mod server;

pub use server::{Server, ServerContext};
