//! HTTP Handlers

mod ping;
mod speech;
mod voice;
mod websocket;

pub use ping::*;
pub use speech::*;
pub use voice::*;
pub use websocket::*;
