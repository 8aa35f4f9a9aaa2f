//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::time::Duration;

use crate::application::SpeechClientConfig;
use crate::domain::voice::{AudioConfig, Persona, VoiceMap, VoiceProfile, VoiceSettings};

use super::ConfigError;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 语音服务商配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 角色音色配置
    #[serde(default)]
    pub voices: VoicesConfig,

    /// 合成会话配置
    #[serde(default)]
    pub session: SessionConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 语音服务商配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// 服务商凭证
    #[serde(default)]
    pub api_key: Option<String>,

    /// 回退 HTTP 接口基础 URL
    #[serde(default = "default_http_base_url")]
    pub http_base_url: String,

    /// 流式通道地址
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    /// 连接、发送、接收的超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    /// 单次请求最大字符数
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub voice_settings: VoiceSettings,
}

fn default_http_base_url() -> String {
    "https://api.murf.ai/v1".to_string()
}

fn default_stream_url() -> String {
    "wss://api.murf.ai/v1/speech/stream-input".to_string()
}

fn default_tts_timeout() -> u64 {
    30
}

fn default_max_text_chars() -> usize {
    500
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            http_base_url: default_http_base_url(),
            stream_url: default_stream_url(),
            timeout_secs: default_tts_timeout(),
            max_text_chars: default_max_text_chars(),
            audio: AudioConfig::default(),
            voice_settings: VoiceSettings::default(),
        }
    }
}

impl TtsConfig {
    /// 凭证是否可用（空白视为未配置）
    pub fn api_key_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }

    /// 流式合成客户端配置
    pub fn client_config(&self) -> SpeechClientConfig {
        SpeechClientConfig {
            api_key: self.api_key.clone(),
            stream_url: self.stream_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_text_chars: self.max_text_chars,
            audio: self.audio.clone(),
            voice_settings: self.voice_settings.clone(),
        }
    }
}

/// 角色音色配置
#[derive(Debug, Clone, Deserialize)]
pub struct VoicesConfig {
    #[serde(default = "default_companion_voice")]
    pub companion: String,

    #[serde(default = "default_mentor_voice")]
    pub mentor: String,

    #[serde(default = "default_interviewer_voice")]
    pub interviewer: String,

    /// 未识别角色时使用的角色
    #[serde(default = "default_persona")]
    pub default_persona: String,
}

fn default_companion_voice() -> String {
    "hi-IN-shweta".to_string()
}

fn default_mentor_voice() -> String {
    "en-IN-eashwar".to_string()
}

fn default_interviewer_voice() -> String {
    "en-IN-isha".to_string()
}

fn default_persona() -> String {
    "companion".to_string()
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            companion: default_companion_voice(),
            mentor: default_mentor_voice(),
            interviewer: default_interviewer_voice(),
            default_persona: default_persona(),
        }
    }
}

impl VoicesConfig {
    fn voice_id(&self, persona: Persona) -> &str {
        match persona {
            Persona::Companion => &self.companion,
            Persona::Mentor => &self.mentor,
            Persona::Interviewer => &self.interviewer,
        }
    }

    /// 构建角色音色映射（内置元数据 + 配置的音色 ID）
    pub fn voice_map(&self) -> Result<VoiceMap, ConfigError> {
        let default_persona = Persona::parse(&self.default_persona).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "Unknown default persona: {}",
                self.default_persona
            ))
        })?;

        let profiles = Persona::ALL
            .iter()
            .map(|p| VoiceProfile::builtin(*p).with_voice_id(self.voice_id(*p).trim()))
            .collect();

        VoiceMap::new(profiles, default_persona)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// 合成会话配置
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 会话空闲超时（秒），0 表示不清理
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_idle_timeout() -> u64 {
    1800 // 30 分钟
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
