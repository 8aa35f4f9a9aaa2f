//! WebSocket Transport - 服务商流式合成通道
//!
//! 握手时通过 `api-key` 请求头鉴权；文本帧为 JSON 控制消息，二进制帧为原始音频。

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::application::ports::{ProviderFrame, SpeechConnection, SpeechTransport, TtsError};

/// 基于 tokio-tungstenite 的传输工厂
#[derive(Debug, Default, Clone)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SpeechTransport for WebSocketTransport {
    async fn connect(
        &self,
        url: &str,
        api_key: &str,
    ) -> Result<Box<dyn SpeechConnection>, TtsError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TtsError::Handshake(format!("Invalid stream URL: {}", e)))?;
        let header = HeaderValue::from_str(api_key)
            .map_err(|_| TtsError::Handshake("Invalid API key for HTTP header".to_string()))?;
        request.headers_mut().insert("api-key", header);

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| TtsError::Handshake(e.to_string()))?;

        tracing::debug!(url = %url, status = %response.status(), "Provider stream handshake complete");

        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl SpeechConnection for WebSocketConnection {
    async fn send_text(&mut self, payload: String) -> Result<(), TtsError> {
        self.stream
            .send(Message::Text(payload))
            .await
            .map_err(|e| TtsError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<ProviderFrame, TtsError>> {
        while let Some(message) = self.stream.next().await {
            let message = match message {
                Ok(m) => m,
                Err(e) => return Some(Err(TtsError::Receive(e.to_string()))),
            };
            match message {
                Message::Text(text) => return Some(Ok(ProviderFrame::Text(text))),
                Message::Binary(bytes) => return Some(Ok(ProviderFrame::Binary(bytes))),
                Message::Close(frame) => {
                    tracing::debug!(frame = ?frame, "Provider closed stream");
                    return None;
                }
                // tungstenite 自动回应 Ping
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
        None
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "Provider stream close failed");
        }
    }
}
