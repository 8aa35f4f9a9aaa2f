//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                  GET   健康检查
//! - /api/voice/list            GET   角色音色配置
//! - /api/voice/provider        GET   服务商音色目录
//! - /api/voice/validate        GET   校验音色配置
//! - /api/speech/status         GET   流式连接状态
//! - /api/speech/switch_voice   POST  切换角色音色
//! - /api/speech/synthesize     POST  整段合成，返回音频
//! - /ws/speech/{user_id}       WS    流式合成（二进制音频帧）

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/speech/:user_id", get(handlers::speech_websocket_handler))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/voice", voice_routes())
        .nest("/speech", speech_routes())
}

/// Voice 路由
fn voice_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/list", get(handlers::list_voice_profiles))
        .route("/provider", get(handlers::list_provider_voices))
        .route("/validate", get(handlers::validate_voices))
}

/// Speech 路由
fn speech_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(handlers::speech_status))
        .route("/switch_voice", post(handlers::switch_voice))
        .route("/synthesize", post(handlers::synthesize))
}
