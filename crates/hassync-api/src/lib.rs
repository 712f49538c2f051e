// hassync-api: wire protocol and WebSocket transport for the Home Assistant WebSocket API.

pub mod error;
pub mod frame;
pub mod transport;

pub use error::Error;
