//! Session Manager Port - 合成会话生命周期管理
//!
//! 定义会话注册表的抽象接口，具体实现在 infrastructure/memory 层

use thiserror::Error;

use crate::domain::synthesis::{ConnectionState, SynthesisSession};
use crate::domain::voice::Persona;

/// Session Manager 错误
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already exists: {0}")]
    AlreadyExists(String),
}

/// Session Manager Port
///
/// 以 (user_id, persona) 为键管理合成会话，所有状态存储在内存中
pub trait SynthesisSessionPort: Send + Sync {
    /// 注册新会话
    fn open(&self, session: SynthesisSession) -> Result<String, SessionError>;

    /// 查找会话
    fn find(&self, user_id: &str, persona: Persona) -> Option<SynthesisSession>;

    /// 更新最后活动时间
    fn touch(&self, user_id: &str, persona: Persona);

    /// 关闭单个会话
    fn close(&self, user_id: &str, persona: Persona) -> Result<(), SessionError>;

    /// 连接结束时销毁全部会话，返回销毁数量
    fn close_all(&self, final_state: ConnectionState) -> usize;

    /// 获取空闲超时的会话
    fn get_expired(&self, idle_timeout_secs: u64) -> Vec<SynthesisSession>;

    /// 获取所有会话
    fn list_all(&self) -> Vec<SynthesisSession>;

    fn count(&self) -> usize {
        self.list_all().len()
    }
}
