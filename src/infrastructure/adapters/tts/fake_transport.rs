//! Fake Speech Transport - 用于测试的脚本化服务商连接
//!
//! 每收到一条 tts_stream 消息，就把预设脚本排入下行队列；
//! 记录所有上行消息、握手凭证以及连接/关闭次数，供断言使用。

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::application::ports::{ProviderFrame, SpeechConnection, SpeechTransport, TtsError};

/// 脚本中的一步
#[derive(Debug, Clone)]
pub enum FakeFrame {
    /// 下发一帧
    Frame(ProviderFrame),
    /// 读取时返回传输错误
    Fail(String),
    /// 服务商关闭连接
    Close,
    /// 永远不再下发（用于超时与取消）
    Stall,
}

impl FakeFrame {
    pub fn audio_chunk(audio: &[u8]) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(audio);
        Self::json(json!({"type": "audio_chunk", "audio": encoded}))
    }

    pub fn binary(audio: Vec<u8>) -> Self {
        Self::Frame(ProviderFrame::Binary(audio))
    }

    pub fn complete() -> Self {
        Self::json(json!({"type": "stream_complete"}))
    }

    pub fn error(message: &str) -> Self {
        Self::json(json!({"type": "error", "message": message}))
    }

    pub fn raw_text(text: &str) -> Self {
        Self::Frame(ProviderFrame::Text(text.to_string()))
    }

    pub fn fail(message: &str) -> Self {
        Self::Fail(message.to_string())
    }

    fn json(value: Value) -> Self {
        Self::Frame(ProviderFrame::Text(value.to_string()))
    }
}

#[derive(Default)]
struct FakeState {
    sent: Mutex<Vec<Value>>,
    api_keys: Mutex<Vec<String>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

/// Fake Speech Transport
pub struct FakeSpeechTransport {
    script: Vec<FakeFrame>,
    handshake_fails: bool,
    state: Arc<FakeState>,
}

impl FakeSpeechTransport {
    /// 每次 tts_stream 都回放同一份脚本
    pub fn new(script: Vec<FakeFrame>) -> Self {
        Self {
            script,
            handshake_fails: false,
            state: Arc::new(FakeState::default()),
        }
    }

    /// 握手总是失败
    pub fn failing_handshake() -> Self {
        Self {
            handshake_fails: true,
            ..Self::new(Vec::new())
        }
    }

    /// 所有上行消息（按发送顺序）
    pub fn sent_messages(&self) -> Vec<Value> {
        lock(&self.state.sent).clone()
    }

    pub fn sent_of_type(&self, kind: &str) -> Vec<Value> {
        self.sent_messages()
            .into_iter()
            .filter(|m| m["type"] == kind)
            .collect()
    }

    /// 成功握手的次数
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// 每次握手（包括失败的）携带的凭证
    pub fn api_keys(&self) -> Vec<String> {
        lock(&self.state.api_keys).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl SpeechTransport for FakeSpeechTransport {
    async fn connect(
        &self,
        url: &str,
        api_key: &str,
    ) -> Result<Box<dyn SpeechConnection>, TtsError> {
        lock(&self.state.api_keys).push(api_key.to_string());

        if self.handshake_fails {
            return Err(TtsError::Handshake(format!("{}: connection refused", url)));
        }

        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            script: self.script.clone(),
            pending: VecDeque::new(),
            state: self.state.clone(),
        }))
    }
}

struct FakeConnection {
    script: Vec<FakeFrame>,
    pending: VecDeque<FakeFrame>,
    state: Arc<FakeState>,
}

#[async_trait]
impl SpeechConnection for FakeConnection {
    async fn send_text(&mut self, payload: String) -> Result<(), TtsError> {
        let value: Value = serde_json::from_str(&payload)
            .map_err(|e| TtsError::Send(format!("not json: {}", e)))?;
        if value["type"] == "tts_stream" {
            self.pending.extend(self.script.iter().cloned());
        }
        lock(&self.state.sent).push(value);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<ProviderFrame, TtsError>> {
        match self.pending.pop_front() {
            Some(FakeFrame::Frame(frame)) => Some(Ok(frame)),
            Some(FakeFrame::Fail(message)) => Some(Err(TtsError::Receive(message))),
            Some(FakeFrame::Close) | None => None,
            Some(FakeFrame::Stall) => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}
