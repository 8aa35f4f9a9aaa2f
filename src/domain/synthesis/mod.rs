//! Synthesis Context - 语音合成限界上下文
//!
//! 职责:
//! - 合成会话（user + persona 维度的 context 复用）
//! - 服务商连接状态机
//! - 文本长度限制

mod session;
mod text;

pub use session::{derive_context_id, session_key, ConnectionState, SynthesisSession};
pub use text::truncate_for_provider;
