//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（SpeechTransport、TtsEngine、SessionManager）
//! - protocol: 服务商流式通道消息格式
//! - services: 流式合成会话客户端
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod protocol;
pub mod queries;
pub mod services;

// Re-exports
pub use commands::{
    handlers::{
        SwitchVoiceHandler, SwitchVoiceResponse, SynthesizeSpeechHandler,
        SynthesizeSpeechResponse,
    },
    SwitchVoice, SynthesizeSpeech,
};

pub use error::ApplicationError;

pub use ports::{
    ProviderFrame, ProviderVoice, SessionError, SpeechConnection, SpeechRequest,
    SpeechResponse, SpeechTransport, SynthesisSessionPort, TtsEnginePort, TtsError,
};

pub use queries::{
    handlers::{
        GetSpeechStatusHandler, ListProviderVoicesHandler, ListVoiceProfilesHandler,
        PersonaVoiceCheck, ValidateVoicesHandler, VoiceValidationReport,
    },
    GetSpeechStatus, ListProviderVoices, ListVoiceProfiles, ValidateVoices,
};

pub use services::{
    AudioChunk, AudioStream, ClientStatus, SpeechClientConfig, SpeechSessionClient,
    SynthesisRequest,
};
