//! Unix socket transport for driving a running assistant.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::send_request;
pub use protocol::{Request, Response};
pub use server::{IpcServer, RequestHandler};
