//! BuddyVoice - 多角色聊天伙伴的流式语音合成服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Voice Context: 角色与音色映射
//! - Synthesis Context: 合成会话、连接状态、文本长度限制
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SpeechTransport, TtsEngine, SynthesisSession）
//! - Protocol: 服务商流式通道消息格式
//! - Services: 流式合成会话客户端（含 HTTP 回退）
//! - Commands / Queries: CQRS 处理器
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: WebSocket 传输、HTTP TTS 客户端、测试用假实现
//! - Memory: 合成会话注册表
//! - HTTP: RESTful API + WebSocket

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
