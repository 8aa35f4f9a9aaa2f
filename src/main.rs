//! BuddyVoice - 流式语音合成服务
//!
//! 启动顺序: 配置 -> 日志 -> 适配器 -> 合成客户端 -> HTTP 服务器

use std::sync::Arc;
use std::time::Duration;

use buddyvoice::application::SpeechSessionClient;
use buddyvoice::config::{load_config, print_config, AppConfig};
use buddyvoice::infrastructure::adapters::{
    HttpTtsClient, HttpTtsClientConfig, WebSocketTransport,
};
use buddyvoice::infrastructure::http::{AppState, HttpServer, ServerConfig};
use buddyvoice::infrastructure::memory::InMemorySynthesisSessionManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!("BuddyVoice - 流式语音合成服务");
    print_config(&config);

    if !config.tts.api_key_configured() {
        tracing::warn!("TTS API key not configured, speech synthesis will produce no audio");
    }

    let voices = Arc::new(config.voices.voice_map()?);

    // 创建 HTTP TTS 引擎（回退路径 + 音色目录）
    let mut http_config = HttpTtsClientConfig::new(&config.tts.http_base_url)
        .with_timeout(config.tts.timeout_secs);
    http_config.api_key = config.tts.api_key.clone();
    let tts_engine = Arc::new(HttpTtsClient::new(http_config)?);

    // 创建会话注册表与流式合成客户端
    let sessions = Arc::new(InMemorySynthesisSessionManager::new());
    let client = SpeechSessionClient::new(
        config.tts.client_config(),
        voices.clone(),
        Arc::new(WebSocketTransport::new()),
        tts_engine.clone(),
        sessions,
    );

    // 预热长连接，失败时首次合成会重试
    if client.connect().await {
        tracing::info!("Speech provider connected");
    }

    // 空闲会话清理
    if config.session.idle_timeout_secs > 0 {
        let idle_timeout = config.session.idle_timeout_secs;
        let sweeper = client.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(idle_timeout.min(60)));
            loop {
                interval.tick().await;
                sweeper.purge_idle_sessions(idle_timeout);
            }
        });
    }

    // 创建 HTTP 服务器
    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let state = AppState::new(
        client.clone(),
        voices,
        tts_engine,
        config.tts.audio.format,
        config.tts.api_key_configured(),
    );
    let server = HttpServer::new(server_config, state);

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    client.disconnect().await;
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// 初始化日志，`RUST_LOG` 优先于配置的级别
fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},buddyvoice={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
