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
use crate::domain::voice::{MAX_RATE, MIN_RATE};

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

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `GOVORUN_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `GOVORUN_SERVER__HOST=127.0.0.1`
/// - `GOVORUN_SERVER__PORT=10201`
/// - `GOVORUN_ENGINE__URL=http://tts-engine:8000`
/// - `GOVORUN_SYNTHESIS__DEFAULT_VOICE=0`
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
        .set_default("server.port", 10200)?
        .set_default("server.max_connections", 32)?
        .set_default("server.idle_timeout_secs", 300)?
        .set_default("engine.url", "http://localhost:8000")?
        .set_default("engine.timeout_secs", 120)?
        .set_default("engine.max_retries", 0)?
        .set_default("engine.model", "vosk-model-tts-ru-0.7-multi")?
        .set_default("synthesis.default_voice", "3")?
        .set_default("synthesis.default_rate", 1.0)?
        .set_default("synthesis.min_sentence_chars", 20)?
        .set_default("audio.samples_per_chunk", 1024)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        // 搜索默认配置文件
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: GOVORUN_
    // 层级分隔符: __ (双下划线)
    // 例如: GOVORUN_ENGINE__URL=http://tts-engine:8000
    builder = builder.add_source(
        Environment::with_prefix("GOVORUN")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    // 6. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.server.max_connections == 0 {
        return Err(ConfigError::ValidationError(
            "Max connections cannot be 0".to_string(),
        ));
    }

    if config.engine.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Engine URL cannot be empty".to_string(),
        ));
    }

    if !config.synthesis.default_rate.is_finite()
        || config.synthesis.default_rate < MIN_RATE
        || config.synthesis.default_rate > MAX_RATE
    {
        return Err(ConfigError::ValidationError(format!(
            "Default rate must be within [{}, {}]",
            MIN_RATE, MAX_RATE
        )));
    }

    if config.audio.samples_per_chunk == 0 {
        return Err(ConfigError::ValidationError(
            "Samples per chunk cannot be 0".to_string(),
        ));
    }

    if let Some(max_len) = config.synthesis.max_input_length {
        if max_len == 0 {
            return Err(ConfigError::ValidationError(
                "Max input length cannot be 0 (omit it to disable the limit)".to_string(),
            ));
        }
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Max Connections: {}", config.server.max_connections);
    tracing::info!("Idle Timeout: {}s", config.server.idle_timeout_secs);
    tracing::info!("Engine URL: {}", config.engine.url);
    tracing::info!("Engine Timeout: {}s", config.engine.timeout_secs);
    tracing::info!("Engine Model: {}", config.engine.model);
    tracing::info!("Default Voice: {}", config.synthesis.default_voice);
    tracing::info!("Default Rate: {}", config.synthesis.default_rate);
    match config.synthesis.max_input_length {
        Some(n) => tracing::info!("Max Input Length: {} chars", n),
        None => tracing::info!("Max Input Length: unlimited"),
    }
    tracing::info!("Samples Per Chunk: {}", config.audio.samples_per_chunk);
    tracing::info!("Voices: {}", config.effective_voices().len());
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
