//! Speech WebSocket Handler
//!
//! 客户端消息（JSON 文本）:
//! - `{"type": "speak", "text": "...", "agent": "mentor", "context_id": "..."}`
//! - `{"type": "agent_switch", "agent": "interviewer"}`
//!
//! 服务端消息: JSON 事件 + 二进制音频帧（按服务商顺序转发）

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application::SynthesisRequest;
use crate::domain::voice::Persona;
use crate::infrastructure::http::state::AppState;

/// 客户端消息
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Speak {
        text: String,
        #[serde(default)]
        agent: Option<String>,
        #[serde(default)]
        context_id: Option<String>,
    },
    AgentSwitch {
        agent: String,
    },
}

/// 服务端事件
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SpeechEvent {
    ConnectionEstablished {
        user_id: String,
        agent: Persona,
        voice_id: String,
    },
    AgentSwitched {
        agent: Persona,
        voice_id: String,
        switched: bool,
    },
    AudioStreamStart {
        agent: Persona,
        voice_id: String,
    },
    AudioStreamEnd {
        chunks: usize,
        bytes: usize,
    },
    Error {
        message: String,
    },
}

type Sender = SplitSink<WebSocket, Message>;

/// 流式合成 WebSocket 连接处理
pub async fn speech_websocket_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_speech_socket(socket, user_id, state))
}

async fn handle_speech_socket(socket: WebSocket, user_id: String, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut agent = state.voices.default_persona();

    tracing::info!(user_id = %user_id, agent = %agent, "Speech WebSocket connected");

    let established = SpeechEvent::ConnectionEstablished {
        user_id: user_id.clone(),
        agent,
        voice_id: voice_id_of(&state, agent),
    };
    if send_event(&mut sender, &established).await.is_err() {
        return;
    }

    // 按到达顺序逐条处理，同一连接上的合成请求不会交错
    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => {
                tracing::info!(user_id = %user_id, "Speech WebSocket closed by client");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(user_id = %user_id, error = %e, "Speech WebSocket error");
                break;
            }
        };

        let message = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(m) => m,
            Err(e) => {
                let event = SpeechEvent::Error {
                    message: format!("Invalid message: {}", e),
                };
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let result = match message {
            ClientMessage::AgentSwitch { agent: requested } => {
                agent = resolve_agent(&state, &requested);
                let switched = state.client.switch_voice(agent.as_str()).await;
                let event = SpeechEvent::AgentSwitched {
                    agent,
                    voice_id: voice_id_of(&state, agent),
                    switched,
                };
                send_event(&mut sender, &event).await
            }
            ClientMessage::Speak {
                text,
                agent: requested,
                context_id,
            } => {
                let persona = requested
                    .map(|a| resolve_agent(&state, &a))
                    .unwrap_or(agent);
                speak(&mut sender, &state, &user_id, persona, text, context_id).await
            }
        };

        if result.is_err() {
            break;
        }
    }

    tracing::info!(user_id = %user_id, "Speech WebSocket disconnected");
}

/// 合成一段文本并把音频块转发给客户端
///
/// 发送失败时直接返回，丢弃的 AudioStream 会让合成任务停止读取。
async fn speak(
    sender: &mut Sender,
    state: &AppState,
    user_id: &str,
    persona: Persona,
    text: String,
    context_id: Option<String>,
) -> Result<(), axum::Error> {
    if text.trim().is_empty() {
        let event = SpeechEvent::Error {
            message: "text cannot be empty".to_string(),
        };
        return send_event(sender, &event).await;
    }

    let start = SpeechEvent::AudioStreamStart {
        agent: persona,
        voice_id: voice_id_of(state, persona),
    };
    send_event(sender, &start).await?;

    let mut request = SynthesisRequest::new(text, user_id, persona.as_str());
    request.context_id = context_id;
    let mut stream = state.client.stream_synthesize(request);

    let mut chunks = 0;
    let mut bytes = 0;
    while let Some(chunk) = stream.next().await {
        bytes += chunk.len();
        chunks += 1;
        sender.send(Message::Binary(chunk)).await?;
    }

    if chunks == 0 {
        let event = SpeechEvent::Error {
            message: "No audio produced".to_string(),
        };
        send_event(sender, &event).await?;
    }

    tracing::debug!(user_id = %user_id, chunks = chunks, bytes = bytes, "Audio stream forwarded");
    send_event(sender, &SpeechEvent::AudioStreamEnd { chunks, bytes }).await
}

fn resolve_agent(state: &AppState, requested: &str) -> Persona {
    Persona::parse(requested).unwrap_or_else(|| {
        let fallback = state.voices.default_persona();
        tracing::warn!(agent = %requested, fallback = %fallback, "Unknown agent, using default");
        fallback
    })
}

fn voice_id_of(state: &AppState, persona: Persona) -> String {
    state.voices.voice_id_for(persona.as_str()).to_string()
}

/// 序列化失败同样返回错误，调用方据此关闭连接
async fn send_event(sender: &mut Sender, event: &SpeechEvent) -> Result<(), axum::Error> {
    let json = encode_event(event)?;
    sender.send(Message::Text(json)).await
}

fn encode_event<T: Serialize>(event: &T) -> Result<String, axum::Error> {
    serde_json::to_string(event).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialize event");
        axum::Error::new(e)
    })
}
