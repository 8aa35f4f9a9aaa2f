//! Memory Layer - In-Memory State Management
//!
//! 实现 SynthesisSessionPort，管理 (user, persona) 合成会话的内存状态

mod session_manager;

pub use session_manager::InMemorySynthesisSessionManager;
