//! Speech Transport Port - 服务商双向消息通道
//!
//! 流式合成客户端只依赖这里的抽象，真实实现基于 WebSocket，
//! 测试中替换为脚本化的假连接。

use async_trait::async_trait;

use super::TtsError;

/// 服务商下行的一帧消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFrame {
    /// 文本消息（JSON 控制信封）
    Text(String),
    /// 原始二进制音频
    Binary(Vec<u8>),
}

/// 已建立的服务商连接
#[async_trait]
pub trait SpeechConnection: Send {
    /// 发送一条文本（JSON）控制消息
    async fn send_text(&mut self, payload: String) -> Result<(), TtsError>;

    /// 读取下一帧；连接正常关闭时返回 None
    async fn recv(&mut self) -> Option<Result<ProviderFrame, TtsError>>;

    /// 关闭连接（尽力而为）
    async fn close(&mut self);
}

/// 建立连接的工厂
#[async_trait]
pub trait SpeechTransport: Send + Sync {
    /// 握手并鉴权
    async fn connect(
        &self,
        url: &str,
        api_key: &str,
    ) -> Result<Box<dyn SpeechConnection>, TtsError>;
}
