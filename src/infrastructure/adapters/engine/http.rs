//! HTTP Synthesis Engine - 调用外部合成引擎 HTTP 服务
//!
//! 实现 SynthEnginePort trait，通过 HTTP 调用外部合成引擎。
//!
//! 引擎 API:
//! POST {base_url}/api/tts/synthesize
//! Request: {"text": "...", "speaker_id": "3", "speech_rate": 1.0}  (JSON)
//! Response: audio/wav binary

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::application::ports::{EngineError, EngineRequest, PcmAudio, SynthEnginePort};
use crate::config::EngineConfig;
use crate::infrastructure::adapters::wav::parse_wav;

/// 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct SynthHttpRequest {
    /// 要合成的文本
    text: String,
    /// 引擎内的音色 ID
    speaker_id: String,
    /// 语速
    speech_rate: f32,
}

/// HTTP 合成引擎客户端
pub struct HttpSynthEngine {
    client: Client,
    config: EngineConfig,
}

impl HttpSynthEngine {
    /// 创建新的 HTTP 引擎客户端
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// 获取合成 URL
    fn synth_url(&self) -> String {
        format!("{}/api/tts/synthesize", self.config.url)
    }

    /// 获取健康检查 URL
    fn health_url(&self) -> String {
        format!("{}/health", self.config.url)
    }

    async fn synthesize_once(&self, request: &EngineRequest) -> Result<PcmAudio, EngineError> {
        let http_request = SynthHttpRequest {
            text: request.text.clone(),
            speaker_id: request.voice_id.clone(),
            speech_rate: request.rate,
        };

        tracing::debug!(
            url = %self.synth_url(),
            text_len = http_request.text.chars().count(),
            speaker_id = %http_request.speaker_id,
            speech_rate = http_request.speech_rate,
            "Sending synthesis request"
        );

        let response = self
            .client
            .post(&self.synth_url())
            .json(&http_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout
                } else if e.is_connect() {
                    EngineError::Network(format!("Cannot connect to engine: {}", e))
                } else {
                    EngineError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            // 503 表示模型未加载：进程级致命
            if status.as_u16() == 503 {
                return Err(EngineError::Unavailable(format!(
                    "HTTP {}: {}",
                    status, error_text
                )));
            }
            return Err(EngineError::Service(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let wav_data = response
            .bytes()
            .await
            .map_err(|e| EngineError::InvalidResponse(format!("Failed to read audio: {}", e)))?;

        let pcm = parse_wav(&wav_data)?;

        tracing::info!(
            audio_bytes = pcm.data.len(),
            sample_rate = pcm.spec.rate,
            "Synthesis completed"
        );

        Ok(pcm)
    }
}

#[async_trait]
impl SynthEnginePort for HttpSynthEngine {
    async fn synthesize(&self, request: EngineRequest) -> Result<PcmAudio, EngineError> {
        let mut attempt = 0;
        loop {
            match self.synthesize_once(&request).await {
                Ok(pcm) => return Ok(pcm),
                // 网络错误可重试；超时、服务错误和致命错误不重试
                Err(EngineError::Network(msg)) if attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %msg,
                        "Engine request failed, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(&self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_from_config() {
        let engine = HttpSynthEngine::new(EngineConfig {
            url: "http://engine:9000".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(engine.synth_url(), "http://engine:9000/api/tts/synthesize");
        assert_eq!(engine.health_url(), "http://engine:9000/health");
    }
}
