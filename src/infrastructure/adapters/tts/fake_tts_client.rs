//! Fake TTS Client - 用于测试的一次性合成客户端
//!
//! 不实际调用服务商，返回固定音频或固定错误，并记录收到的请求

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::application::ports::{
    ProviderVoice, SpeechRequest, SpeechResponse, TtsEnginePort, TtsError,
};

enum FakeOutcome {
    Audio(Vec<u8>),
    Status(u16),
}

/// Fake TTS Client
pub struct FakeTtsClient {
    outcome: FakeOutcome,
    voices: Vec<ProviderVoice>,
    calls: AtomicUsize,
    requests: Mutex<Vec<SpeechRequest>>,
}

impl FakeTtsClient {
    /// 每次合成都返回同一段音频
    pub fn succeeding(audio_data: Vec<u8>) -> Self {
        Self::with_outcome(FakeOutcome::Audio(audio_data))
    }

    /// 每次合成都以给定 HTTP 状态失败
    pub fn failing(status: u16) -> Self {
        Self::with_outcome(FakeOutcome::Status(status))
    }

    /// 设置音色目录
    pub fn with_voices(mut self, voices: Vec<ProviderVoice>) -> Self {
        self.voices = voices;
        self
    }

    fn with_outcome(outcome: FakeOutcome) -> Self {
        Self {
            outcome,
            voices: Vec::new(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SpeechRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse, TtsError> {
        tracing::debug!(
            text_len = request.text.len(),
            voice_id = %request.voice_id,
            "FakeTtsClient: returning fixed outcome"
        );

        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        match &self.outcome {
            FakeOutcome::Audio(audio) => Ok(SpeechResponse {
                audio_data: audio.clone(),
                content_type: Some("audio/wav".to_string()),
            }),
            FakeOutcome::Status(status) => Err(TtsError::Service {
                status: *status,
                body: "fake failure".to_string(),
            }),
        }
    }

    async fn list_voices(&self) -> Result<Vec<ProviderVoice>, TtsError> {
        Ok(self.voices.clone())
    }

    async fn health_check(&self) -> bool {
        matches!(self.outcome, FakeOutcome::Audio(_))
    }
}
