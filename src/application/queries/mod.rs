//! 应用层 - 查询（读操作）
//!
//! CQRS 查询侧：音色映射、服务商目录、客户端状态

mod voice_queries;

pub mod handlers;

pub use voice_queries::*;
