//! HTTP TTS Client - 调用服务商的一次性合成接口
//!
//! 实现 TtsEnginePort trait，作为流式通道不可用时的回退路径
//!
//! 服务商 HTTP API:
//! POST {base_url}/speech/generate
//! Headers: api-key: <credential>
//! Request: {"voiceId": "...", "text": "...", "format": "WAV", "sampleRate": 44100}  (JSON)
//! Response: 200 原始音频字节；其它状态为错误文本
//!
//! GET {base_url}/speech/voices
//! Response: 音色列表（裸数组，或包在 voices/data 字段中）

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::application::ports::{
    ProviderVoice, SpeechRequest, SpeechResponse, TtsEnginePort, TtsError,
};

/// 合成请求体 (JSON)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateSpeechBody<'a> {
    voice_id: &'a str,
    text: &'a str,
    format: &'static str,
    sample_rate: u32,
}

/// HTTP TTS 客户端配置
#[derive(Debug, Clone)]
pub struct HttpTtsClientConfig {
    /// 服务商 HTTP API 基础 URL
    pub base_url: String,
    /// 服务商凭证
    pub api_key: Option<String>,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpTtsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.murf.ai/v1".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl HttpTtsClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP TTS 客户端
pub struct HttpTtsClient {
    client: Client,
    config: HttpTtsClientConfig,
}

impl HttpTtsClient {
    /// 创建新的 HTTP TTS 客户端
    pub fn new(config: HttpTtsClientConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// 获取合成 URL
    fn generate_url(&self) -> String {
        format!("{}/speech/generate", self.config.base_url.trim_end_matches('/'))
    }

    /// 获取音色目录 URL
    fn voices_url(&self) -> String {
        format!("{}/speech/voices", self.config.base_url.trim_end_matches('/'))
    }

    fn api_key(&self) -> Result<&str, TtsError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(TtsError::MissingCredential)
    }
}

fn map_request_error(e: reqwest::Error) -> TtsError {
    if e.is_timeout() {
        TtsError::Timeout
    } else if e.is_connect() {
        TtsError::Network(format!("Cannot connect to TTS service: {}", e))
    } else {
        TtsError::Network(e.to_string())
    }
}

#[async_trait]
impl TtsEnginePort for HttpTtsClient {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse, TtsError> {
        let api_key = self.api_key()?;
        let body = GenerateSpeechBody {
            voice_id: &request.voice_id,
            text: &request.text,
            format: request.audio.format.provider_name(),
            sample_rate: request.audio.sample_rate,
        };

        tracing::debug!(
            url = %self.generate_url(),
            text_len = request.text.len(),
            voice_id = %request.voice_id,
            "Sending fallback TTS request"
        );

        let response = self
            .client
            .post(self.generate_url())
            .header("api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                voice_id = %request.voice_id,
                body = %error_text,
                "Fallback TTS request rejected"
            );
            return Err(TtsError::Service {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // 直接获取音频字节
        let audio_data = response
            .bytes()
            .await
            .map_err(|e| TtsError::Receive(format!("Failed to read audio: {}", e)))?
            .to_vec();

        tracing::info!(
            voice_id = %request.voice_id,
            audio_size = audio_data.len(),
            "Fallback TTS completed"
        );

        Ok(SpeechResponse {
            audio_data,
            content_type,
        })
    }

    async fn list_voices(&self) -> Result<Vec<ProviderVoice>, TtsError> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .get(self.voices_url())
            .header("api-key", api_key)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TtsError::Service {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| TtsError::Receive(format!("Invalid voice catalog: {}", e)))?;

        let voices = parse_voice_catalog(&payload);
        tracing::info!(count = voices.len(), "Fetched provider voices");
        Ok(voices)
    }

    async fn health_check(&self) -> bool {
        if self.api_key().is_err() {
            return false;
        }
        self.list_voices().await.is_ok()
    }
}

/// 解析音色目录
///
/// 接受三种形态：裸数组、`{"voices": [...]}`、`{"data": [...]}`；单个对象视为一条。
pub fn parse_voice_catalog(payload: &Value) -> Vec<ProviderVoice> {
    let entries: Vec<&Value> = match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("voices").or_else(|| map.get("data")) {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => vec![payload],
        },
        _ => Vec::new(),
    };

    entries.into_iter().filter_map(parse_voice_entry).collect()
}

fn parse_voice_entry(entry: &Value) -> Option<ProviderVoice> {
    let field = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| entry.get(*n).and_then(Value::as_str))
            .map(str::to_string)
    };

    Some(ProviderVoice {
        voice_id: field(&["voiceId", "voice_id", "id"])?,
        display_name: field(&["displayName", "name"]),
        locale: field(&["locale", "languageCode"]),
        gender: field(&["gender"]),
    })
}
