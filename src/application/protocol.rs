//! Provider Protocol - 流式合成通道的消息格式
//!
//! 上行（JSON 文本）:
//! - `{"type": "session_init", session_id, audio_config}`
//! - `{"type": "voice_change", voice_id, session_id}`
//! - `{"type": "tts_stream", text, voice_id, context_id, user_id, agent_type, audio_config, voice_settings}`
//!
//! 下行:
//! - `{"type": "audio_chunk", "audio": <base64>}`
//! - `{"type": "stream_complete"}`
//! - `{"type": "error", "message": ...}`
//! - 原始二进制音频帧

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::application::ports::ProviderFrame;
use crate::domain::voice::{AudioConfig, VoiceSettings};

/// 上行控制消息
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    SessionInit {
        session_id: String,
        audio_config: AudioConfig,
    },
    VoiceChange {
        voice_id: String,
        session_id: String,
    },
    TtsStream {
        text: String,
        voice_id: String,
        context_id: String,
        user_id: String,
        agent_type: String,
        audio_config: AudioConfig,
        voice_settings: VoiceSettings,
    },
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionInit { .. } => "session_init",
            Self::VoiceChange { .. } => "voice_change",
            Self::TtsStream { .. } => "tts_stream",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// 下行控制消息
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundMessage {
    AudioChunk {
        audio: String,
    },
    StreamComplete,
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

/// 解码后的下行事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// 一块音频，原样交给调用方
    Audio(Vec<u8>),
    /// 本次合成完成
    Complete,
    /// 服务商报告错误
    Error(String),
}

/// 解码一帧下行消息
///
/// 无法识别为控制信封的文本（包括 base64 损坏的 audio_chunk）按原始字节转发，不丢弃。
pub fn decode_frame(frame: ProviderFrame) -> ProviderEvent {
    let text = match frame {
        ProviderFrame::Binary(bytes) => return ProviderEvent::Audio(bytes),
        ProviderFrame::Text(text) => text,
    };

    match serde_json::from_str::<InboundMessage>(&text) {
        Ok(InboundMessage::AudioChunk { audio }) => {
            match base64::engine::general_purpose::STANDARD.decode(audio.as_bytes()) {
                Ok(bytes) => ProviderEvent::Audio(bytes),
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid base64 in audio_chunk, forwarding raw");
                    ProviderEvent::Audio(text.into_bytes())
                }
            }
        }
        Ok(InboundMessage::StreamComplete) => ProviderEvent::Complete,
        Ok(InboundMessage::Error { message }) => {
            ProviderEvent::Error(message.unwrap_or_else(|| "Unknown error".to_string()))
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                len = text.len(),
                "Unrecognized provider message, forwarding raw"
            );
            ProviderEvent::Audio(text.into_bytes())
        }
    }
}
