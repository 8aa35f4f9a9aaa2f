//! Speech Session Client - 流式语音合成会话客户端
//!
//! 持有一条到 TTS 服务商的长连接，负责:
//! - 连接/断开与 session_init
//! - 按角色切换音色（voice_change）
//! - 流式合成（tts_stream），逐块转发服务商音频
//! - 通道不可用或中途出错时回退到一次性 HTTP 合成
//!
//! 连接由一把异步锁保护：一次 stream_synthesize 从发送请求到结束独占连接，
//! 并发调用方排队，不同用户的音频不会交错。

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::Utc;
use futures_util::{FutureExt, Stream};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::application::ports::{
    SpeechConnection, SpeechRequest, SpeechTransport, SynthesisSessionPort, TtsEnginePort,
    TtsError,
};
use crate::application::protocol::{decode_frame, OutboundMessage, ProviderEvent};
use crate::domain::synthesis::{
    derive_context_id, truncate_for_provider, ConnectionState, SynthesisSession,
};
use crate::domain::voice::{AudioConfig, Persona, VoiceMap, VoiceSettings};

/// 一块音频，格式由连接时协商，客户端不解析
pub type AudioChunk = Vec<u8>;

/// 客户端配置
#[derive(Debug, Clone)]
pub struct SpeechClientConfig {
    /// 服务商凭证，构造时读取一次
    pub api_key: Option<String>,
    /// 流式通道地址
    pub stream_url: String,
    /// 连接、发送、接收的等待上限
    pub timeout: Duration,
    /// 单次请求的最大字符数
    pub max_text_chars: usize,
    pub audio: AudioConfig,
    pub voice_settings: VoiceSettings,
}

impl Default for SpeechClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            stream_url: "wss://api.murf.ai/v1/speech/stream-input".to_string(),
            timeout: Duration::from_secs(30),
            max_text_chars: 500,
            audio: AudioConfig::default(),
            voice_settings: VoiceSettings::default(),
        }
    }
}

impl SpeechClientConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// 合成请求
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub user_id: String,
    pub persona: String,
    /// 调用方指定的 context id；为空时复用或生成
    pub context_id: Option<String>,
}

impl SynthesisRequest {
    pub fn new(
        text: impl Into<String>,
        user_id: impl Into<String>,
        persona: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            user_id: user_id.into(),
            persona: persona.into(),
            context_id: None,
        }
    }

    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }
}

/// 音频块序列
///
/// 惰性、一次性：每次 stream_synthesize 产生一个新序列。
/// 底层通道容量为 1，不在单块之外缓冲。丢弃即取消。
pub struct AudioStream {
    rx: mpsc::Receiver<AudioChunk>,
}

impl AudioStream {
    /// 读完整个序列并拼接
    pub async fn concat(mut self) -> Vec<u8> {
        let mut audio = Vec::new();
        while let Some(chunk) = self.rx.recv().await {
            audio.extend_from_slice(&chunk);
        }
        audio
    }
}

impl Stream for AudioStream {
    type Item = AudioChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// 客户端状态快照
#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    pub state: ConnectionState,
    pub session_id: String,
    pub active_voice: Option<String>,
    pub open_sessions: usize,
    pub credential_configured: bool,
}

/// 服务商连接
///
/// 每次重连都替换为新的 ProviderLink，状态从 Disconnected 重新开始。
struct ProviderLink {
    connection: Option<Box<dyn SpeechConnection>>,
    state: ConnectionState,
    session_id: String,
    active_voice: Option<String>,
}

impl ProviderLink {
    fn fresh() -> Self {
        Self {
            connection: None,
            state: ConnectionState::Disconnected,
            session_id: Uuid::new_v4().to_string(),
            active_voice: None,
        }
    }

    fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.connection.is_some()
    }

    fn transition(&mut self, next: ConnectionState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                session_id = %self.session_id,
                from = %self.state,
                to = %next,
                "Ignoring invalid connection state transition"
            );
            return;
        }
        tracing::debug!(session_id = %self.session_id, from = %self.state, to = %next, "Connection state changed");
        self.state = next;
    }
}

enum StreamOutcome {
    Complete { chunks: usize },
    Cancelled,
}

struct ClientInner {
    config: SpeechClientConfig,
    voices: Arc<VoiceMap>,
    transport: Arc<dyn SpeechTransport>,
    fallback: Arc<dyn TtsEnginePort>,
    sessions: Arc<dyn SynthesisSessionPort>,
    link: Mutex<ProviderLink>,
}

/// 流式合成会话客户端
///
/// 由调用方服务显式构造并持有，clone 共享同一条连接。
#[derive(Clone)]
pub struct SpeechSessionClient {
    inner: Arc<ClientInner>,
}

impl SpeechSessionClient {
    pub fn new(
        config: SpeechClientConfig,
        voices: Arc<VoiceMap>,
        transport: Arc<dyn SpeechTransport>,
        fallback: Arc<dyn TtsEnginePort>,
        sessions: Arc<dyn SynthesisSessionPort>,
    ) -> Self {
        if config.credential().is_none() {
            tracing::warn!("No TTS API key configured, speech synthesis will produce no audio");
        }

        Self {
            inner: Arc::new(ClientInner {
                config,
                voices,
                transport,
                fallback,
                sessions,
                link: Mutex::new(ProviderLink::fresh()),
            }),
        }
    }

    pub fn voices(&self) -> &VoiceMap {
        &self.inner.voices
    }

    /// 建立长连接
    ///
    /// 凭证缺失或握手失败时返回 false 并记录日志，不向调用方抛错。
    pub async fn connect(&self) -> bool {
        let mut link = self.inner.link.lock().await;
        if link.is_connected() {
            return true;
        }

        match self.open_link(&mut link).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to speech provider");
                false
            }
        }
    }

    /// 关闭长连接并销毁全部会话
    pub async fn disconnect(&self) {
        let mut link = self.inner.link.lock().await;
        self.release_link(&mut link, ConnectionState::Disconnected)
            .await;
    }

    /// 切换到角色对应的音色
    ///
    /// 未连接或音色未变化时直接成功，音色会在下次合成时生效。
    pub async fn switch_voice(&self, persona: &str) -> bool {
        let mut link = self.inner.link.lock().await;
        match self.apply_voice(&mut link, persona).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, persona = %persona, "Failed to switch voice");
                self.release_link(&mut link, ConnectionState::Failed).await;
                false
            }
        }
    }

    /// 流式合成
    ///
    /// 调用方总是得到统一的音频块序列，无论由流式通道还是 HTTP 回退提供；
    /// 序列可能为空（完全失败时），但不会出错。
    pub fn stream_synthesize(&self, request: SynthesisRequest) -> AudioStream {
        let (tx, rx) = mpsc::channel(1);
        let client = self.clone();

        tokio::spawn(async move {
            client.run_stream(request, tx).await;
        });

        AudioStream { rx }
    }

    /// 当前状态
    pub async fn status(&self) -> ClientStatus {
        let link = self.inner.link.lock().await;
        ClientStatus {
            state: link.state,
            session_id: link.session_id.clone(),
            active_voice: link.active_voice.clone(),
            open_sessions: self.inner.sessions.count(),
            credential_configured: self.inner.config.credential().is_some(),
        }
    }

    /// 清理空闲会话，返回清理数量
    pub fn purge_idle_sessions(&self, idle_timeout_secs: u64) -> usize {
        let expired = self.inner.sessions.get_expired(idle_timeout_secs);
        let mut purged = 0;
        for session in expired {
            if self
                .inner
                .sessions
                .close(&session.user_id, session.persona)
                .is_ok()
            {
                purged += 1;
            }
        }
        if purged > 0 {
            tracing::info!(purged = purged, "Idle synthesis sessions purged");
        }
        purged
    }

    async fn run_stream(&self, request: SynthesisRequest, tx: mpsc::Sender<AudioChunk>) {
        let mut link = self.inner.link.lock().await;

        if !link.is_connected() {
            if let Err(e) = self.open_link(&mut link).await {
                tracing::error!(
                    error = %e,
                    user_id = %request.user_id,
                    persona = %request.persona,
                    "Streaming unavailable, using HTTP fallback"
                );
                drop(link);
                self.run_fallback(&request, &tx).await;
                return;
            }
        }

        match self.stream_on_link(&mut link, &request, &tx).await {
            Ok(StreamOutcome::Complete { chunks }) => {
                tracing::info!(
                    user_id = %request.user_id,
                    persona = %request.persona,
                    chunks = chunks,
                    "Streaming synthesis completed"
                );
            }
            Ok(StreamOutcome::Cancelled) => {
                // 协议没有取消消息：关闭连接，避免残留音频流入下一个调用方
                tracing::info!(user_id = %request.user_id, "Streaming synthesis cancelled by caller");
                self.release_link(&mut link, ConnectionState::Disconnected)
                    .await;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    user_id = %request.user_id,
                    persona = %request.persona,
                    "Streaming synthesis failed, using HTTP fallback"
                );
                self.release_link(&mut link, ConnectionState::Failed).await;
                drop(link);
                self.run_fallback(&request, &tx).await;
            }
        }
    }

    async fn open_link(&self, link: &mut ProviderLink) -> Result<(), TtsError> {
        let config = &self.inner.config;
        let api_key = config.credential().ok_or(TtsError::MissingCredential)?;

        if let Some(mut stale) = link.connection.take() {
            stale.close().await;
        }
        *link = ProviderLink::fresh();

        let mut connection = tokio::time::timeout(
            config.timeout,
            self.inner.transport.connect(&config.stream_url, api_key),
        )
        .await
        .map_err(|_| TtsError::Timeout)??;

        let init = OutboundMessage::SessionInit {
            session_id: link.session_id.clone(),
            audio_config: config.audio.clone(),
        };
        if let Err(e) = send_message(&mut connection, &init, config.timeout).await {
            connection.close().await;
            return Err(e);
        }

        link.connection = Some(connection);
        link.transition(ConnectionState::Connected);
        tracing::info!(
            session_id = %link.session_id,
            url = %config.stream_url,
            "Speech provider connected"
        );
        Ok(())
    }

    async fn release_link(&self, link: &mut ProviderLink, final_state: ConnectionState) {
        if let Some(mut connection) = link.connection.take() {
            if tokio::time::timeout(self.inner.config.timeout, connection.close())
                .await
                .is_err()
            {
                tracing::warn!(session_id = %link.session_id, "Timed out closing provider connection");
            }
        }
        if link.state == ConnectionState::Connected {
            link.transition(final_state);
        }
        link.active_voice = None;

        let closed = self.inner.sessions.close_all(final_state);
        tracing::info!(
            session_id = %link.session_id,
            state = %link.state,
            closed_sessions = closed,
            "Speech provider connection released"
        );
    }

    async fn apply_voice(&self, link: &mut ProviderLink, persona: &str) -> Result<(), TtsError> {
        let voice_id = self.inner.voices.voice_id_for(persona).to_string();

        if !link.is_connected() {
            tracing::debug!(voice_id = %voice_id, "Not connected, voice applies on next synthesis");
            return Ok(());
        }
        if link.active_voice.as_deref() == Some(voice_id.as_str()) {
            return Ok(());
        }

        let message = OutboundMessage::VoiceChange {
            voice_id: voice_id.clone(),
            session_id: link.session_id.clone(),
        };
        let connection = link
            .connection
            .as_mut()
            .ok_or_else(|| TtsError::Send("connection closed".to_string()))?;
        send_message(connection, &message, self.inner.config.timeout).await?;

        tracing::info!(persona = %persona, voice_id = %voice_id, "Voice switched");
        link.active_voice = Some(voice_id);
        Ok(())
    }

    async fn stream_on_link(
        &self,
        link: &mut ProviderLink,
        request: &SynthesisRequest,
        tx: &mpsc::Sender<AudioChunk>,
    ) -> Result<StreamOutcome, TtsError> {
        let config = &self.inner.config;

        self.apply_voice(link, &request.persona).await?;

        let profile = self.inner.voices.profile_for(&request.persona);
        let context_id = self.resolve_context(request, profile.persona);
        let text = truncate_for_provider(&request.text, config.max_text_chars);
        if text.len() < request.text.len() {
            tracing::debug!(
                original_chars = request.text.chars().count(),
                max_chars = config.max_text_chars,
                "Text truncated to provider limit"
            );
        }

        let message = OutboundMessage::TtsStream {
            text: text.to_string(),
            voice_id: profile.voice_id.clone(),
            context_id: context_id.clone(),
            user_id: request.user_id.clone(),
            agent_type: profile.persona.as_str().to_string(),
            audio_config: config.audio.clone(),
            voice_settings: config.voice_settings.clone(),
        };

        let connection = link
            .connection
            .as_mut()
            .ok_or_else(|| TtsError::Send("connection closed".to_string()))?;
        let stale = discard_buffered_frames(connection)?;
        if stale > 0 {
            tracing::debug!(frames = stale, "Discarded frames left over from previous synthesis");
        }
        send_message(connection, &message, config.timeout).await?;
        tracing::debug!(context_id = %context_id, voice_id = %profile.voice_id, "Synthesis request sent");

        let mut chunks = 0usize;
        loop {
            let next = tokio::select! {
                _ = tx.closed() => return Ok(StreamOutcome::Cancelled),
                next = tokio::time::timeout(config.timeout, connection.recv()) => {
                    next.map_err(|_| TtsError::Timeout)?
                }
            };

            let frame = match next {
                Some(frame) => frame?,
                None => {
                    return Err(TtsError::Receive(
                        "connection closed by provider".to_string(),
                    ))
                }
            };

            match decode_frame(frame) {
                ProviderEvent::Audio(audio) => {
                    if audio.is_empty() {
                        continue;
                    }
                    tracing::debug!(bytes = audio.len(), "Audio chunk received");
                    if tx.send(audio).await.is_err() {
                        return Ok(StreamOutcome::Cancelled);
                    }
                    chunks += 1;
                }
                ProviderEvent::Complete => return Ok(StreamOutcome::Complete { chunks }),
                ProviderEvent::Error(message) => return Err(TtsError::Provider(message)),
            }
        }
    }

    /// 调用方给定的 context 优先；否则复用 (user, persona) 已有会话；再否则新建
    fn resolve_context(&self, request: &SynthesisRequest, persona: Persona) -> String {
        let sessions = &self.inner.sessions;

        if let Some(existing) = sessions.find(&request.user_id, persona) {
            sessions.touch(&request.user_id, persona);
            return request
                .context_id
                .clone()
                .unwrap_or(existing.context_id);
        }

        let context_id = request
            .context_id
            .clone()
            .unwrap_or_else(|| derive_context_id(&request.user_id, persona.as_str(), Utc::now()));
        let session = SynthesisSession::new(
            Uuid::new_v4().to_string(),
            request.user_id.clone(),
            persona,
            context_id.clone(),
        );
        if let Err(e) = sessions.open(session) {
            tracing::warn!(error = %e, "Failed to register synthesis session");
        }
        context_id
    }

    async fn run_fallback(&self, request: &SynthesisRequest, tx: &mpsc::Sender<AudioChunk>) {
        if tx.is_closed() {
            return;
        }

        let config = &self.inner.config;
        let profile = self.inner.voices.profile_for(&request.persona);
        let speech = SpeechRequest {
            text: truncate_for_provider(&request.text, config.max_text_chars).to_string(),
            voice_id: profile.voice_id.clone(),
            audio: config.audio.clone(),
        };

        let result = tokio::time::timeout(config.timeout, self.inner.fallback.synthesize(speech))
            .await
            .unwrap_or(Err(TtsError::Timeout));

        match result {
            Ok(response) if response.audio_data.is_empty() => {
                tracing::warn!(persona = %request.persona, "Fallback synthesis returned no audio");
            }
            Ok(response) => {
                tracing::info!(
                    persona = %request.persona,
                    bytes = response.audio_data.len(),
                    "Fallback synthesis completed"
                );
                let _ = tx.send(response.audio_data).await;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    user_id = %request.user_id,
                    persona = %request.persona,
                    "Fallback synthesis failed, no audio produced"
                );
            }
        }
    }
}

/// 丢弃连接上已缓冲的下行帧
///
/// stream_complete 之后服务商仍可能下发帧，它们属于上一次合成，
/// 不能流入下一个调用方。只读取无需等待即可得到的帧。
fn discard_buffered_frames(
    connection: &mut Box<dyn SpeechConnection>,
) -> Result<usize, TtsError> {
    let mut discarded = 0;
    while let Some(next) = connection.recv().now_or_never() {
        match next {
            Some(Ok(_)) => discarded += 1,
            Some(Err(e)) => return Err(e),
            // 连接已关闭，由随后的读取报告
            None => break,
        }
    }
    Ok(discarded)
}

async fn send_message(
    connection: &mut Box<dyn SpeechConnection>,
    message: &OutboundMessage,
    wait: Duration,
) -> Result<(), TtsError> {
    let payload = message
        .to_json()
        .map_err(|e| TtsError::Send(format!("Failed to encode {}: {}", message.kind(), e)))?;
    tokio::time::timeout(wait, connection.send_text(payload))
        .await
        .map_err(|_| TtsError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::{FakeFrame, FakeSpeechTransport, FakeTtsClient};
    use crate::infrastructure::memory::InMemorySynthesisSessionManager;
    use futures_util::StreamExt;

    struct Harness {
        client: SpeechSessionClient,
        transport: Arc<FakeSpeechTransport>,
        fallback: Arc<FakeTtsClient>,
        sessions: Arc<InMemorySynthesisSessionManager>,
    }

    fn harness(
        config: SpeechClientConfig,
        transport: FakeSpeechTransport,
        fallback: FakeTtsClient,
    ) -> Harness {
        let transport = Arc::new(transport);
        let fallback = Arc::new(fallback);
        let sessions = Arc::new(InMemorySynthesisSessionManager::new());
        let client = SpeechSessionClient::new(
            config,
            Arc::new(VoiceMap::builtin()),
            transport.clone(),
            fallback.clone(),
            sessions.clone(),
        );
        Harness {
            client,
            transport,
            fallback,
            sessions,
        }
    }

    fn keyed_config() -> SpeechClientConfig {
        SpeechClientConfig::default()
            .with_api_key("test-key")
            .with_timeout(Duration::from_millis(200))
    }

    fn two_chunk_script() -> Vec<FakeFrame> {
        vec![
            FakeFrame::audio_chunk(&[1u8; 10]),
            FakeFrame::audio_chunk(&[2u8; 20]),
            FakeFrame::complete(),
        ]
    }

    async fn collect(stream: AudioStream) -> Vec<AudioChunk> {
        stream.collect::<Vec<_>>().await
    }

    #[tokio::test]
    async fn test_streams_chunks_in_provider_order() {
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::new(two_chunk_script()),
            FakeTtsClient::succeeding(vec![9; 5000]),
        );

        let chunks = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("Hello there", "user1", "mentor")),
        )
        .await;

        assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![10, 20]);
        assert_eq!(chunks[0], vec![1u8; 10]);
        assert_eq!(h.fallback.call_count(), 0);

        let sent = h.transport.sent_messages();
        let kinds: Vec<_> = sent.iter().map(|m| m["type"].as_str().unwrap_or("")).collect();
        assert_eq!(kinds, vec!["session_init", "voice_change", "tts_stream"]);
        assert_eq!(sent[1]["voice_id"], "en-IN-eashwar");
        assert_eq!(sent[2]["text"], "Hello there");
        assert_eq!(sent[2]["agent_type"], "mentor");
        assert_eq!(h.transport.api_keys(), vec!["test-key".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_complete_ignores_later_messages() {
        let script = vec![
            FakeFrame::audio_chunk(&[7u8; 4]),
            FakeFrame::complete(),
            FakeFrame::audio_chunk(&[8u8; 4]),
            FakeFrame::binary(vec![0u8; 16]),
        ];
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::new(script),
            FakeTtsClient::failing(500),
        );

        let chunks = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("hi", "user1", "companion")),
        )
        .await;

        assert_eq!(chunks, vec![vec![7u8; 4]]);
        assert_eq!(h.fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn test_trailing_frames_not_delivered_to_next_caller() {
        let script = vec![
            FakeFrame::audio_chunk(&[7u8; 4]),
            FakeFrame::complete(),
            FakeFrame::audio_chunk(&[8u8; 4]),
            FakeFrame::binary(vec![0u8; 16]),
        ];
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::new(script),
            FakeTtsClient::failing(500),
        );

        let alice = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("first", "alice", "mentor")),
        )
        .await;
        let bob = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("second", "bob", "mentor")),
        )
        .await;

        assert_eq!(alice, vec![vec![7u8; 4]]);
        assert_eq!(bob, vec![vec![7u8; 4]]);
        assert_eq!(h.transport.connect_count(), 1);
        assert_eq!(h.fallback.call_count(), 0);
        assert_eq!(h.client.status().await.state, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_binary_and_unparseable_frames_forwarded() {
        let script = vec![
            FakeFrame::binary(vec![3u8; 6]),
            FakeFrame::raw_text("garbage"),
            FakeFrame::complete(),
        ];
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::new(script),
            FakeTtsClient::failing(500),
        );

        let chunks = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("hi", "user1", "guru")),
        )
        .await;

        assert_eq!(chunks, vec![vec![3u8; 6], b"garbage".to_vec()]);
    }

    #[tokio::test]
    async fn test_long_text_is_truncated() {
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::new(two_chunk_script()),
            FakeTtsClient::failing(500),
        );
        let text = "x".repeat(1500);

        let _ = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new(text.clone(), "user1", "mentor")),
        )
        .await;

        let sent = h.transport.sent_of_type("tts_stream");
        let sent_text = sent[0]["text"].as_str().unwrap().to_string();
        assert_eq!(sent_text.chars().count(), 500);
        assert!(text.starts_with(&sent_text));
    }

    #[tokio::test]
    async fn test_handshake_failure_uses_fallback_audio() {
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::failing_handshake(),
            FakeTtsClient::succeeding(vec![5u8; 5000]),
        );

        let chunks = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("Hello there", "user1", "mentor")),
        )
        .await;

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 5000);
        let requests = h.fallback.requests();
        assert_eq!(requests[0].voice_id, "en-IN-eashwar");
        assert_eq!(requests[0].text, "Hello there");
    }

    #[tokio::test]
    async fn test_handshake_and_fallback_failure_yields_nothing() {
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::failing_handshake(),
            FakeTtsClient::failing(500),
        );

        assert!(!h.client.connect().await);
        let chunks = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("Hello there", "user1", "mentor")),
        )
        .await;

        assert!(chunks.is_empty());
        assert_eq!(h.fallback.call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_credential_never_connects() {
        let h = harness(
            SpeechClientConfig::default(),
            FakeSpeechTransport::new(two_chunk_script()),
            FakeTtsClient::failing(401),
        );

        assert!(!h.client.connect().await);
        assert_eq!(h.transport.connect_count(), 0);

        let chunks = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("Hello", "user1", "mentor")),
        )
        .await;
        assert!(chunks.is_empty());
        assert!(!h.client.status().await.credential_configured);
    }

    #[tokio::test]
    async fn test_provider_error_switches_to_fallback() {
        let script = vec![FakeFrame::error("voice unavailable")];
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::new(script),
            FakeTtsClient::succeeding(vec![4u8; 32]),
        );

        let chunks = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("Hello", "user1", "interviewer")),
        )
        .await;

        assert_eq!(chunks, vec![vec![4u8; 32]]);
        let status = h.client.status().await;
        assert_eq!(status.state, ConnectionState::Failed);
        assert_eq!(status.open_sessions, 0);
    }

    #[tokio::test]
    async fn test_receive_failure_mid_stream_falls_back() {
        let script = vec![
            FakeFrame::audio_chunk(&[1u8; 10]),
            FakeFrame::fail("connection reset"),
        ];
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::new(script),
            FakeTtsClient::succeeding(vec![6u8; 64]),
        );

        let chunks = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("Hello", "user1", "mentor")),
        )
        .await;

        assert_eq!(chunks, vec![vec![1u8; 10], vec![6u8; 64]]);
        assert_eq!(h.transport.close_count(), 1);
    }

    #[tokio::test]
    async fn test_receive_timeout_falls_back() {
        let script = vec![FakeFrame::audio_chunk(&[1u8; 10]), FakeFrame::Stall];
        let h = harness(
            keyed_config().with_timeout(Duration::from_millis(50)),
            FakeSpeechTransport::new(script),
            FakeTtsClient::succeeding(vec![2u8; 8]),
        );

        let chunks = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("Hello", "user1", "mentor")),
        )
        .await;

        assert_eq!(chunks, vec![vec![1u8; 10], vec![2u8; 8]]);
        assert_eq!(h.client.status().await.state, ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_reconnects_after_failure_with_fresh_link() {
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::new(vec![FakeFrame::error("boom")]),
            FakeTtsClient::succeeding(vec![1u8; 4]),
        );

        let _ = collect(h.client.stream_synthesize(SynthesisRequest::new("a", "u", "mentor"))).await;
        let failed = h.client.status().await;
        assert_eq!(failed.state, ConnectionState::Failed);

        assert!(h.client.connect().await);
        let reconnected = h.client.status().await;
        assert_eq!(reconnected.state, ConnectionState::Connected);
        assert_ne!(reconnected.session_id, failed.session_id);
        assert_eq!(h.transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_dropping_stream_closes_connection() {
        let script = vec![FakeFrame::audio_chunk(&[1u8; 10]), FakeFrame::Stall];
        let h = harness(
            keyed_config().with_timeout(Duration::from_secs(5)),
            FakeSpeechTransport::new(script),
            FakeTtsClient::succeeding(vec![2u8; 8]),
        );

        let mut stream = h
            .client
            .stream_synthesize(SynthesisRequest::new("Hello", "user1", "mentor"));
        assert_eq!(stream.next().await, Some(vec![1u8; 10]));
        drop(stream);

        // 等待后台任务观察到取消并释放连接
        let mut state = ConnectionState::Connected;
        for _ in 0..50 {
            state = h.client.status().await.state;
            if state != ConnectionState::Connected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(h.transport.close_count(), 1);
        assert_eq!(h.fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn test_switch_voice_behaviour() {
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::new(two_chunk_script()),
            FakeTtsClient::failing(500),
        );

        // 未连接时为 no-op
        assert!(h.client.switch_voice("mentor").await);
        assert!(h.transport.sent_messages().is_empty());

        assert!(h.client.connect().await);
        assert!(h.client.switch_voice("mentor").await);
        assert!(h.client.switch_voice("guru").await);
        assert!(h.client.switch_voice("pirate").await);

        let changes = h.transport.sent_of_type("voice_change");
        let voices: Vec<_> = changes.iter().map(|m| m["voice_id"].as_str().unwrap()).collect();
        // 同一音色不重复发送；未知角色回退到默认音色
        assert_eq!(voices, vec!["en-IN-eashwar", "hi-IN-shweta"]);
        assert_eq!(
            h.client.status().await.active_voice.as_deref(),
            Some("hi-IN-shweta")
        );
    }

    #[tokio::test]
    async fn test_context_id_reused_per_user_and_persona() {
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::new(two_chunk_script()),
            FakeTtsClient::failing(500),
        );

        for _ in 0..2 {
            let _ = collect(
                h.client
                    .stream_synthesize(SynthesisRequest::new("Hello", "user1", "mentor")),
            )
            .await;
        }
        let _ = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("Hello", "user1", "companion")),
        )
        .await;
        let _ = collect(
            h.client.stream_synthesize(
                SynthesisRequest::new("Hello", "user1", "mentor").with_context_id("explicit"),
            ),
        )
        .await;

        let sent = h.transport.sent_of_type("tts_stream");
        let contexts: Vec<_> = sent.iter().map(|m| m["context_id"].as_str().unwrap()).collect();
        assert_eq!(contexts.len(), 4);
        assert!(contexts[0].starts_with("user1_mentor_"));
        assert_eq!(contexts[0], contexts[1]);
        assert!(contexts[2].starts_with("user1_companion_"));
        assert_eq!(contexts[3], "explicit");
        assert_eq!(h.sessions.list_all().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_do_not_interleave() {
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::new(two_chunk_script()),
            FakeTtsClient::failing(500),
        );

        let a = h
            .client
            .stream_synthesize(SynthesisRequest::new("first", "alice", "mentor"));
        let b = h
            .client
            .stream_synthesize(SynthesisRequest::new("second", "bob", "interviewer"));
        let (a, b) = tokio::join!(collect(a), collect(b));

        assert_eq!(a, vec![vec![1u8; 10], vec![2u8; 20]]);
        assert_eq!(b, vec![vec![1u8; 10], vec![2u8; 20]]);
        assert_eq!(h.transport.connect_count(), 1);
        assert_eq!(h.transport.sent_of_type("tts_stream").len(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_destroys_sessions() {
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::new(two_chunk_script()),
            FakeTtsClient::failing(500),
        );

        let _ = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("Hello", "user1", "mentor")),
        )
        .await;
        assert_eq!(h.client.status().await.open_sessions, 1);

        h.client.disconnect().await;
        let status = h.client.status().await;
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.open_sessions, 0);
        assert_eq!(status.active_voice, None);
    }

    #[tokio::test]
    async fn test_purge_idle_sessions() {
        let h = harness(
            keyed_config(),
            FakeSpeechTransport::new(two_chunk_script()),
            FakeTtsClient::failing(500),
        );
        let _ = collect(
            h.client
                .stream_synthesize(SynthesisRequest::new("Hello", "user1", "mentor")),
        )
        .await;

        let mut stale = SynthesisSession::new("s-stale", "user2", Persona::Companion, "ctx");
        stale.last_activity = Utc::now() - chrono::Duration::seconds(120);
        h.sessions.open(stale).unwrap();

        assert_eq!(h.client.purge_idle_sessions(3600), 0);
        assert_eq!(h.client.purge_idle_sessions(60), 1);
        let remaining = h.sessions.list_all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, "user1");
    }
}
