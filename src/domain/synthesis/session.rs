//! Synthesis Context - 会话与连接状态

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::voice::Persona;

/// 服务商连接状态
///
/// 只允许单向迁移：
/// - Disconnected -> Connected
/// - Connected -> Disconnected | Failed
///
/// 重连不会“复活”旧状态，而是从新的 Disconnected 开始。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connected)
                | (Self::Connected, Self::Disconnected)
                | (Self::Connected, Self::Failed)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 合成会话（in-memory）
///
/// 同一 (user, persona) 复用 context_id，服务商据此保持连续语句的韵律。
/// 连接关闭或进程退出时销毁。
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisSession {
    pub session_id: String,
    pub user_id: String,
    pub persona: Persona,
    pub context_id: String,
    pub connection_state: ConnectionState,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SynthesisSession {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        persona: Persona,
        context_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            persona,
            context_id: context_id.into(),
            connection_state: ConnectionState::Connected,
            created_at: now,
            last_activity: now,
        }
    }

    /// 注册表中的键
    pub fn key(&self) -> String {
        session_key(&self.user_id, self.persona)
    }
}

pub fn session_key(user_id: &str, persona: Persona) -> String {
    format!("{}:{}", user_id, persona.as_str())
}

/// 生成 context id: `{user_id}_{persona}_{timestamp}`
pub fn derive_context_id(user_id: &str, persona: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}_{}", user_id, persona, at.timestamp_millis())
}
