//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Voice Context: 角色与音色映射
//! - Synthesis Context: 合成会话与连接状态

pub mod synthesis;
pub mod voice;
