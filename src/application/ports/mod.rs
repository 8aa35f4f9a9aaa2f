//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod session_manager;
mod speech_transport;
mod tts_engine;

pub use session_manager::{SessionError, SynthesisSessionPort};
pub use speech_transport::{ProviderFrame, SpeechConnection, SpeechTransport};
pub use tts_engine::{ProviderVoice, SpeechRequest, SpeechResponse, TtsEnginePort, TtsError};
