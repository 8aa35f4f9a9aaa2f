//! TTS Engine Port - 一次性语音合成（回退路径）与服务商音色目录
//!
//! 定义非流式合成的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::voice::AudioConfig;

/// TTS 错误
///
/// 覆盖流式通道与 HTTP 回退两条路径。所有变体都在本地恢复（回退或静默降级），
/// 不会传播给最终用户。
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("API credential is not configured")]
    MissingCredential,

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),
}

/// 一次性合成请求
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    /// 要合成的文本（已按服务商上限截断）
    pub text: String,
    /// 服务商音色 ID
    pub voice_id: String,
    /// 输出格式
    pub audio: AudioConfig,
}

/// 一次性合成响应
#[derive(Debug, Clone)]
pub struct SpeechResponse {
    /// 完整音频数据
    pub audio_data: Vec<u8>,
    /// 响应的 Content-Type（如有）
    pub content_type: Option<String>,
}

/// 服务商目录中的音色
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderVoice {
    pub voice_id: String,
    pub display_name: Option<String>,
    pub locale: Option<String>,
    pub gender: Option<String>,
}

impl ProviderVoice {
    /// 印度语区音色（hi-*, en-IN）
    pub fn is_indian(&self) -> bool {
        let locale = self.locale.as_deref().unwrap_or(&self.voice_id);
        locale.starts_with("hi") || locale.starts_with("en-IN")
    }
}

/// TTS Engine Port
///
/// 外部 TTS 服务的请求/响应式接口
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 一次性合成，返回完整音频
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse, TtsError>;

    /// 列出服务商可用音色
    async fn list_voices(&self) -> Result<Vec<ProviderVoice>, TtsError> {
        Ok(Vec::new())
    }

    /// 检查 TTS 服务是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(id: &str, locale: Option<&str>) -> ProviderVoice {
        ProviderVoice {
            voice_id: id.to_string(),
            display_name: None,
            locale: locale.map(str::to_string),
            gender: None,
        }
    }

    #[test]
    fn test_indian_voice_detection() {
        assert!(voice("hi-IN-shweta", None).is_indian());
        assert!(voice("x", Some("en-IN")).is_indian());
        assert!(!voice("en-US-sarah", None).is_indian());
        assert!(!voice("hi-IN-fake", Some("en-US")).is_indian());
    }
}
