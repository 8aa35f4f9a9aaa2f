//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 未配置 tts.api_key 时读取的旧环境变量
pub const LEGACY_API_KEY_VAR: &str = "MURF_API_KEY";

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `BUDDY_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `BUDDY_SERVER__PORT=8080`
/// - `BUDDY_TTS__API_KEY=...`
/// - `BUDDY_TTS__TIMEOUT_SECS=10`
/// - `BUDDY_VOICES__MENTOR=en-IN-eashwar`
///
/// 若以上来源都没有提供凭证，再读取一次 `MURF_API_KEY`。
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default("tts.http_base_url", "https://api.murf.ai/v1")?
        .set_default("tts.stream_url", "wss://api.murf.ai/v1/speech/stream-input")?
        .set_default("tts.timeout_secs", 30)?
        .set_default("tts.max_text_chars", 500)?
        .set_default("voices.companion", "hi-IN-shweta")?
        .set_default("voices.mentor", "en-IN-eashwar")?
        .set_default("voices.interviewer", "en-IN-isha")?
        .set_default("voices.default_persona", "companion")?
        .set_default("session.idle_timeout_secs", 1800)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 例如: BUDDY_TTS__STREAM_URL=wss://...
    builder = builder.add_source(
        Environment::with_prefix("BUDDY")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let mut app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    // 6. 兼容旧凭证变量
    apply_legacy_credential(&mut app_config, |name| std::env::var(name).ok());

    // 7. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 凭证缺失时从 `MURF_API_KEY` 补齐
fn apply_legacy_credential<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if config.tts.api_key_configured() {
        return;
    }
    if let Some(key) = lookup(LEGACY_API_KEY_VAR).filter(|k| !k.trim().is_empty()) {
        config.tts.api_key = Some(key);
    }
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.tts.http_base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "TTS HTTP base URL cannot be empty".to_string(),
        ));
    }

    if config.tts.stream_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "TTS stream URL cannot be empty".to_string(),
        ));
    }

    if config.tts.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "TTS timeout cannot be 0".to_string(),
        ));
    }

    if config.tts.max_text_chars == 0 {
        return Err(ConfigError::ValidationError(
            "TTS max_text_chars cannot be 0".to_string(),
        ));
    }

    config
        .tts
        .voice_settings
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    // 音色 ID 非空 + 默认角色可识别
    config.voices.voice_map()?;

    Ok(())
}

/// 打印配置信息（用于启动时日志），凭证只显示掩码
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("TTS API Key: {}", mask_secret(config.tts.api_key.as_deref()));
    tracing::info!("TTS Stream URL: {}", config.tts.stream_url);
    tracing::info!("TTS HTTP URL: {}", config.tts.http_base_url);
    tracing::info!("TTS Timeout: {}s", config.tts.timeout_secs);
    tracing::info!("TTS Max Text: {} chars", config.tts.max_text_chars);
    tracing::info!(
        "Audio: {:?} {}Hz x{}",
        config.tts.audio.format,
        config.tts.audio.sample_rate,
        config.tts.audio.channels
    );
    tracing::info!(
        "Voices: companion={} mentor={} interviewer={} (default: {})",
        config.voices.companion,
        config.voices.mentor,
        config.voices.interviewer,
        config.voices.default_persona
    );
    tracing::info!("Session Idle Timeout: {}s", config.session.idle_timeout_secs);
    tracing::info!("Log Level: {} (json: {})", config.log.level, config.log.json);
    tracing::info!("=================================");
}

fn mask_secret(secret: Option<&str>) -> String {
    match secret.map(str::trim).filter(|s| !s.is_empty()) {
        None => "<not set>".to_string(),
        Some(s) if s.chars().count() <= 8 => "****".to_string(),
        Some(s) => {
            let head: String = s.chars().take(4).collect();
            format!("{}****", head)
        }
    }
}
