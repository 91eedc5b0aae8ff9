//! WebSocket relay module
//!
//! Accepts chat client connections and fans their messages out to every
//! connected client.

mod protocol;
mod registry;
mod router;
mod websocket;

#[allow(unused_imports)]
pub use protocol::*;
#[allow(unused_imports)]
pub use registry::*;
pub use websocket::*;
