//! 端到端测试：本地 axum 模拟服务商（WebSocket 流式通道 + HTTP 回退接口），
//! 通过真实的 WebSocketTransport / HttpTtsClient 驱动合成客户端与 HTTP 服务。

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use buddyvoice::application::{
    SpeechClientConfig, SpeechSessionClient, SynthesisRequest, TtsEnginePort,
};
use buddyvoice::domain::synthesis::ConnectionState;
use buddyvoice::domain::voice::{AudioFormat, VoiceMap};
use buddyvoice::infrastructure::adapters::{
    HttpTtsClient, HttpTtsClientConfig, WebSocketTransport,
};
use buddyvoice::infrastructure::http::{build_router, AppState};
use buddyvoice::infrastructure::memory::InMemorySynthesisSessionManager;

const API_KEY: &str = "loopback-key";
const FALLBACK_AUDIO: &[u8] = b"fallback-audio";
const TRAILER: [u8; 4] = [0xAA; 4];

// ============================================================================
// Provider stub
// ============================================================================

#[derive(Default)]
struct ProviderStub {
    received: Mutex<Vec<Value>>,
    fallback_calls: AtomicUsize,
}

impl ProviderStub {
    fn received_types(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|m| m["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

async fn stream_endpoint(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(stub): State<Arc<ProviderStub>>,
) -> Response {
    let authorized = headers
        .get("api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == API_KEY)
        .unwrap_or(false);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| serve_stream(socket, stub))
}

/// 每条 tts_stream：文本字节（base64）+ 一帧二进制 + stream_complete；
/// 文本包含 "explode" 时回复 error。
async fn serve_stream(mut socket: WebSocket, stub: Arc<ProviderStub>) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let Ok(value) = serde_json::from_str::<Value>(&text) else { continue };
        stub.received.lock().unwrap().push(value.clone());

        if value["type"] != "tts_stream" {
            continue;
        }
        let spoken = value["text"].as_str().unwrap_or_default().to_string();

        let replies = if spoken.contains("explode") {
            vec![Message::Text(
                json!({"type": "error", "message": "synthesis exploded"}).to_string(),
            )]
        } else {
            let encoded = base64::engine::general_purpose::STANDARD.encode(spoken.as_bytes());
            vec![
                Message::Text(json!({"type": "audio_chunk", "audio": encoded}).to_string()),
                Message::Binary(TRAILER.to_vec()),
                Message::Text(json!({"type": "stream_complete"}).to_string()),
            ]
        };

        for reply in replies {
            if socket.send(reply).await.is_err() {
                return;
            }
        }
    }
}

async fn generate_endpoint(
    headers: HeaderMap,
    State(stub): State<Arc<ProviderStub>>,
    Json(body): Json<Value>,
) -> Response {
    stub.fallback_calls.fetch_add(1, Ordering::SeqCst);
    if headers.get("api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    if body["voiceId"].as_str().is_none() || body["format"] != "WAV" {
        return (StatusCode::BAD_REQUEST, "bad body").into_response();
    }
    ([("content-type", "audio/wav")], FALLBACK_AUDIO.to_vec()).into_response()
}

async fn voices_endpoint() -> Json<Value> {
    Json(json!({
        "voices": [
            {"voiceId": "hi-IN-shweta", "displayName": "Shweta", "locale": "hi-IN", "gender": "Female"},
            {"voiceId": "en-IN-eashwar", "displayName": "Eashwar", "locale": "en-IN", "gender": "Male"},
            {"voiceId": "en-US-natalie", "displayName": "Natalie", "locale": "en-US", "gender": "Female"}
        ]
    }))
}

async fn spawn_router(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn spawn_provider() -> (SocketAddr, Arc<ProviderStub>) {
    let stub = Arc::new(ProviderStub::default());
    let router = Router::new()
        .route("/v1/speech/stream-input", get(stream_endpoint))
        .route("/v1/speech/generate", post(generate_endpoint))
        .route("/v1/speech/voices", get(voices_endpoint))
        .with_state(stub.clone());
    (spawn_router(router).await, stub)
}

// ============================================================================
// Client wiring
// ============================================================================

struct Wiring {
    client: SpeechSessionClient,
    engine: Arc<HttpTtsClient>,
    voices: Arc<VoiceMap>,
}

fn wire(provider: SocketAddr, stream_path: &str) -> Wiring {
    let engine = Arc::new(
        HttpTtsClient::new(
            HttpTtsClientConfig::new(format!("http://{}/v1", provider))
                .with_api_key(API_KEY)
                .with_timeout(5),
        )
        .unwrap(),
    );

    let mut config = SpeechClientConfig::default()
        .with_api_key(API_KEY)
        .with_timeout(Duration::from_secs(5));
    config.stream_url = format!("ws://{}{}", provider, stream_path);

    let voices = Arc::new(VoiceMap::builtin());
    let client = SpeechSessionClient::new(
        config,
        voices.clone(),
        Arc::new(WebSocketTransport::new()),
        engine.clone(),
        Arc::new(InMemorySynthesisSessionManager::new()),
    );

    Wiring {
        client,
        engine,
        voices,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn streams_audio_over_websocket() {
    let (addr, stub) = spawn_provider().await;
    let w = wire(addr, "/v1/speech/stream-input");

    let chunks: Vec<Vec<u8>> = w
        .client
        .stream_synthesize(SynthesisRequest::new("Namaste", "user1", "mitra"))
        .collect()
        .await;

    assert_eq!(chunks, vec![b"Namaste".to_vec(), TRAILER.to_vec()]);
    assert_eq!(stub.fallback_calls.load(Ordering::SeqCst), 0);

    let types = stub.received_types();
    assert_eq!(types.first().map(String::as_str), Some("session_init"));
    assert!(types.contains(&"voice_change".to_string()));
    assert_eq!(types.last().map(String::as_str), Some("tts_stream"));

    let sent = stub.received.lock().unwrap().last().cloned().unwrap();
    assert_eq!(sent["voice_id"], "hi-IN-shweta");
    assert_eq!(sent["user_id"], "user1");

    let status = w.client.status().await;
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.open_sessions, 1);
}

#[tokio::test]
async fn consecutive_requests_share_connection_and_context() {
    let (addr, stub) = spawn_provider().await;
    let w = wire(addr, "/v1/speech/stream-input");

    for text in ["first", "second"] {
        let audio = w
            .client
            .stream_synthesize(SynthesisRequest::new(text, "user1", "guru"))
            .concat()
            .await;
        let mut expected = text.as_bytes().to_vec();
        expected.extend_from_slice(&TRAILER);
        assert_eq!(audio, expected);
    }

    let received = stub.received.lock().unwrap().clone();
    let streams: Vec<&Value> = received
        .iter()
        .filter(|m| m["type"] == "tts_stream")
        .collect();
    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0]["context_id"], streams[1]["context_id"]);
    assert_eq!(
        received.iter().filter(|m| m["type"] == "session_init").count(),
        1
    );
}

#[tokio::test]
async fn provider_error_falls_back_to_http() {
    let (addr, stub) = spawn_provider().await;
    let w = wire(addr, "/v1/speech/stream-input");

    let chunks: Vec<Vec<u8>> = w
        .client
        .stream_synthesize(SynthesisRequest::new("please explode", "user1", "mentor"))
        .collect()
        .await;

    assert_eq!(chunks, vec![FALLBACK_AUDIO.to_vec()]);
    assert_eq!(stub.fallback_calls.load(Ordering::SeqCst), 1);
    assert_eq!(w.client.status().await.state, ConnectionState::Failed);
}

#[tokio::test]
async fn rejected_handshake_falls_back_to_http() {
    let (addr, stub) = spawn_provider().await;
    let w = wire(addr, "/v1/speech/missing");

    assert!(!w.client.connect().await);
    let audio = w
        .client
        .stream_synthesize(SynthesisRequest::new("hello", "user1", "parikshak"))
        .concat()
        .await;

    assert_eq!(audio, FALLBACK_AUDIO.to_vec());
    assert_eq!(stub.fallback_calls.load(Ordering::SeqCst), 1);
    assert_eq!(w.client.status().await.state, ConnectionState::Disconnected);
}

#[tokio::test]
async fn provider_catalog_is_parsed() {
    let (addr, _stub) = spawn_provider().await;
    let w = wire(addr, "/v1/speech/stream-input");

    let voices = w.engine.list_voices().await.unwrap();
    assert_eq!(voices.len(), 3);
    assert_eq!(voices.iter().filter(|v| v.is_indian()).count(), 2);
    assert!(w.engine.health_check().await);
}

#[tokio::test]
async fn http_surface_end_to_end() {
    let (provider, _stub) = spawn_provider().await;
    let w = wire(provider, "/v1/speech/stream-input");

    let state = AppState::new(
        w.client.clone(),
        w.voices.clone(),
        w.engine.clone(),
        AudioFormat::Wav,
        true,
    );
    let server = spawn_router(build_router(Arc::new(state))).await;
    let http = reqwest::Client::new();

    // 整段合成
    let response = http
        .post(format!("http://{}/api/speech/synthesize", server))
        .json(&json!({"text": "Hello", "user_id": "u1", "persona": "mentor"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "audio/wav");
    let mut expected = b"Hello".to_vec();
    expected.extend_from_slice(&TRAILER);
    assert_eq!(response.bytes().await.unwrap().to_vec(), expected);

    // 空文本 -> errno 400
    let envelope: Value = http
        .post(format!("http://{}/api/speech/synthesize", server))
        .json(&json!({"text": "  ", "user_id": "u1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(envelope["errno"], 400);

    // 校验报告
    let report: Value = http
        .get(format!("http://{}/api/voice/validate", server))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["errno"], 0);
    assert_eq!(report["data"]["total_voices"], 3);
    assert_eq!(report["data"]["persona_voices"]["mentor"]["available"], true);
    assert_eq!(report["data"]["persona_voices"]["interviewer"]["available"], false);

    // 流式 WebSocket
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/speech/u2", server))
        .await
        .unwrap();
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    let next_json = |msg: WsMessage| -> Value {
        match msg {
            WsMessage::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    };

    let established = next_json(ws.next().await.unwrap().unwrap());
    assert_eq!(established["type"], "connection_established");
    assert_eq!(established["agent"], "companion");

    ws.send(WsMessage::Text(
        json!({"type": "agent_switch", "agent": "parikshak"}).to_string(),
    ))
    .await
    .unwrap();
    let switched = next_json(ws.next().await.unwrap().unwrap());
    assert_eq!(switched["type"], "agent_switched");
    assert_eq!(switched["voice_id"], "en-IN-isha");

    ws.send(WsMessage::Text(json!({"type": "speak", "text": "Hi"}).to_string()))
        .await
        .unwrap();
    let start = next_json(ws.next().await.unwrap().unwrap());
    assert_eq!(start["type"], "audio_stream_start");
    assert_eq!(start["agent"], "interviewer");

    let mut audio = Vec::new();
    let end = loop {
        match ws.next().await.unwrap().unwrap() {
            WsMessage::Binary(bytes) => audio.push(bytes),
            other => break next_json(other),
        }
    };
    assert_eq!(audio, vec![b"Hi".to_vec(), TRAILER.to_vec()]);
    assert_eq!(end["type"], "audio_stream_end");
    assert_eq!(end["chunks"], 2);
    assert_eq!(end["bytes"], 6);
}
