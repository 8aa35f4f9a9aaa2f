//! TTS Adapter - 服务商流式通道与 HTTP 回退客户端实现

mod fake_transport;
mod fake_tts_client;
mod http_tts_client;
mod ws_transport;

pub use fake_transport::{FakeFrame, FakeSpeechTransport};
pub use fake_tts_client::FakeTtsClient;
pub use http_tts_client::*;
pub use ws_transport::WebSocketTransport;
