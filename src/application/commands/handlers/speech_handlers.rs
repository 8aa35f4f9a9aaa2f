//! Speech Command Handlers

use crate::application::commands::{SwitchVoice, SynthesizeSpeech};
use crate::application::error::ApplicationError;
use crate::application::services::{SpeechSessionClient, SynthesisRequest};

// ============================================================================
// SynthesizeSpeech
// ============================================================================

/// 整段合成响应
#[derive(Debug, Clone)]
pub struct SynthesizeSpeechResponse {
    pub audio_data: Vec<u8>,
    pub content_type: &'static str,
    pub voice_id: String,
    pub chunks: usize,
}

/// SynthesizeSpeech Handler
///
/// 读完整个音频块序列后一次性返回，供不支持流式播放的调用方使用
pub struct SynthesizeSpeechHandler {
    client: SpeechSessionClient,
    content_type: &'static str,
}

impl SynthesizeSpeechHandler {
    pub fn new(client: SpeechSessionClient, content_type: &'static str) -> Self {
        Self {
            client,
            content_type,
        }
    }

    pub async fn handle(
        &self,
        command: SynthesizeSpeech,
    ) -> Result<SynthesizeSpeechResponse, ApplicationError> {
        if command.text.trim().is_empty() {
            return Err(ApplicationError::validation("text cannot be empty"));
        }
        if command.user_id.trim().is_empty() {
            return Err(ApplicationError::validation("user_id cannot be empty"));
        }

        let voice_id = self.client.voices().voice_id_for(&command.persona).to_string();
        let mut request = SynthesisRequest::new(command.text, command.user_id, command.persona);
        request.context_id = command.context_id;

        let mut stream = self.client.stream_synthesize(request);
        let mut audio_data = Vec::new();
        let mut chunks = 0;
        while let Some(chunk) = futures_util::StreamExt::next(&mut stream).await {
            audio_data.extend_from_slice(&chunk);
            chunks += 1;
        }

        // 空序列表示“没有音频”，由上层降级为纯文本
        if audio_data.is_empty() {
            return Err(ApplicationError::external("No audio produced"));
        }

        tracing::info!(
            voice_id = %voice_id,
            chunks = chunks,
            bytes = audio_data.len(),
            "Speech synthesized"
        );

        Ok(SynthesizeSpeechResponse {
            audio_data,
            content_type: self.content_type,
            voice_id,
            chunks,
        })
    }
}

// ============================================================================
// SwitchVoice
// ============================================================================

/// 切换音色响应
#[derive(Debug, Clone)]
pub struct SwitchVoiceResponse {
    pub switched: bool,
    pub voice_id: String,
}

/// SwitchVoice Handler
pub struct SwitchVoiceHandler {
    client: SpeechSessionClient,
}

impl SwitchVoiceHandler {
    pub fn new(client: SpeechSessionClient) -> Self {
        Self { client }
    }

    pub async fn handle(&self, command: SwitchVoice) -> SwitchVoiceResponse {
        let voice_id = self.client.voices().voice_id_for(&command.persona).to_string();
        let switched = self.client.switch_voice(&command.persona).await;
        SwitchVoiceResponse { switched, voice_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::SpeechClientConfig;
    use crate::domain::voice::VoiceMap;
    use crate::infrastructure::adapters::{FakeFrame, FakeSpeechTransport, FakeTtsClient};
    use crate::infrastructure::memory::InMemorySynthesisSessionManager;
    use std::sync::Arc;

    fn client(transport: FakeSpeechTransport, fallback: FakeTtsClient) -> SpeechSessionClient {
        SpeechSessionClient::new(
            SpeechClientConfig::default().with_api_key("k"),
            Arc::new(VoiceMap::builtin()),
            Arc::new(transport),
            Arc::new(fallback),
            Arc::new(InMemorySynthesisSessionManager::new()),
        )
    }

    fn command(text: &str) -> SynthesizeSpeech {
        SynthesizeSpeech {
            text: text.to_string(),
            user_id: "user1".to_string(),
            persona: "mentor".to_string(),
            context_id: None,
        }
    }

    #[tokio::test]
    async fn test_synthesize_concatenates_chunks() {
        let transport = FakeSpeechTransport::new(vec![
            FakeFrame::audio_chunk(b"abc"),
            FakeFrame::audio_chunk(b"def"),
            FakeFrame::complete(),
        ]);
        let handler = SynthesizeSpeechHandler::new(
            client(transport, FakeTtsClient::failing(500)),
            "audio/wav",
        );

        let response = handler.handle(command("Hello")).await.unwrap();
        assert_eq!(response.audio_data, b"abcdef".to_vec());
        assert_eq!(response.chunks, 2);
        assert_eq!(response.voice_id, "en-IN-eashwar");
    }

    #[tokio::test]
    async fn test_synthesize_without_audio_is_external_error() {
        let handler = SynthesizeSpeechHandler::new(
            client(
                FakeSpeechTransport::failing_handshake(),
                FakeTtsClient::failing(500),
            ),
            "audio/wav",
        );

        let err = handler.handle(command("Hello")).await.unwrap_err();
        assert!(matches!(err, ApplicationError::ExternalServiceError(_)));
    }

    #[tokio::test]
    async fn test_synthesize_rejects_empty_text() {
        let handler = SynthesizeSpeechHandler::new(
            client(
                FakeSpeechTransport::new(Vec::new()),
                FakeTtsClient::failing(500),
            ),
            "audio/wav",
        );

        let err = handler.handle(command("   ")).await.unwrap_err();
        assert!(matches!(err, ApplicationError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_switch_voice_reports_voice() {
        let handler = SwitchVoiceHandler::new(client(
            FakeSpeechTransport::new(Vec::new()),
            FakeTtsClient::failing(500),
        ));

        let response = handler
            .handle(SwitchVoice {
                persona: "parikshak".to_string(),
            })
            .await;
        assert!(response.switched);
        assert_eq!(response.voice_id, "en-IN-isha");
    }
}
