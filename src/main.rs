//! Govorun - 局域网语音合成服务
//!
//! 启动顺序：配置 → 日志 → 音色目录 → 引擎客户端（启动预检）→
//! 调度器 → TCP 服务器。引擎预检失败时以非零码退出——没有可用
//! 引擎就没有任何请求能被服务。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use govorun::application::dispatcher::SynthDispatcher;
use govorun::application::ports::SynthEnginePort;
use govorun::config::{load_config, print_config};
use govorun::domain::normalizer::NormalizeOptions;
use govorun::domain::sentence::SentenceConfig;
use govorun::domain::voice::VoiceCatalogue;
use govorun::infrastructure::server::{SessionContext, SynthServer};
use govorun::infrastructure::HttpSynthEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!("{},govorun={}", config.log.level, config.log.level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));
    if config.log.json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    tracing::info!("Govorun - 语音合成服务");
    print_config(&config);

    // 音色目录
    let catalogue = Arc::new(VoiceCatalogue::new(
        config.effective_voices(),
        &config.synthesis.default_voice,
        config.synthesis.default_rate,
    ));

    // 引擎客户端 + 启动预检
    let engine = Arc::new(
        HttpSynthEngine::new(config.engine.clone())
            .map_err(|e| anyhow::anyhow!("Failed to create engine client: {}", e))?,
    );
    if !engine.health_check().await {
        anyhow::bail!(
            "Synthesis engine at {} is not available, refusing to start",
            config.engine.url
        );
    }
    tracing::info!(url = %config.engine.url, "Engine health check passed");

    // 调度器
    let dispatcher = Arc::new(SynthDispatcher::new(
        engine,
        SentenceConfig {
            min_chars: config.synthesis.min_sentence_chars,
        },
    ));

    // 会话上下文
    let context = Arc::new(SessionContext {
        dispatcher,
        catalogue,
        normalize_options: NormalizeOptions {
            max_chars: config.synthesis.max_input_length,
            truncate: config.synthesis.truncate,
        },
        samples_per_chunk: config.audio.samples_per_chunk,
        idle_timeout: Duration::from_secs(config.server.idle_timeout_secs),
        model: config.engine.model.clone(),
    });

    // TCP 服务器（带优雅关闭）
    let server = SynthServer::bind(
        &config.server.addr(),
        config.server.max_connections,
        context,
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", config.server.addr(), e))?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received shutdown signal");
                shutdown.cancel();
            }
        });
    }

    server
        .run(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("Server terminated: {}", e))?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
