//! Application Services
//!
//! 编排多个端口的长生命周期服务

mod speech_client;

pub use speech_client::{
    AudioChunk, AudioStream, ClientStatus, SpeechClientConfig, SpeechSessionClient,
    SynthesisRequest,
};
