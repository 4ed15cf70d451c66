//! Fake Synthesis Engine - 用于测试的引擎实现
//!
//! 不调用任何外部服务，按文本长度生成正弦波 PCM。
//! 集成测试通过它驱动完整的协议会话。

use async_trait::async_trait;
use std::time::Duration;

use crate::application::ports::{EngineError, EngineRequest, PcmAudio, SynthEnginePort};
use crate::domain::audio::AudioSpec;

/// Fake 引擎配置
#[derive(Debug, Clone)]
pub struct FakeSynthEngineConfig {
    /// 输出音频规格
    pub spec: AudioSpec,
    /// 每个字符对应的音频毫秒数
    pub ms_per_char: u64,
    /// 模拟的推理延迟
    pub delay: Duration,
}

impl Default for FakeSynthEngineConfig {
    fn default() -> Self {
        Self {
            spec: AudioSpec::default(),
            ms_per_char: 50,
            delay: Duration::from_millis(20),
        }
    }
}

/// Fake 合成引擎
///
/// 输出长度与输入文本长度成正比，便于测试断言。
pub struct FakeSynthEngine {
    config: FakeSynthEngineConfig,
}

impl FakeSynthEngine {
    pub fn new(config: FakeSynthEngineConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeSynthEngineConfig::default())
    }

    /// 按时长生成 440Hz 正弦波
    fn generate_pcm(&self, duration_ms: u64) -> Vec<u8> {
        let spec = &self.config.spec;
        let total_samples = (spec.rate as u64 * duration_ms / 1000) as usize;
        let mut pcm = Vec::with_capacity(total_samples * spec.bytes_per_sample());

        for i in 0..total_samples {
            let t = i as f32 / spec.rate as f32;
            let value = (t * 440.0 * std::f32::consts::TAU).sin();
            let sample = (value * i16::MAX as f32 * 0.3) as i16;
            for _ in 0..spec.channels {
                pcm.extend_from_slice(&sample.to_le_bytes());
            }
        }
        pcm
    }
}

#[async_trait]
impl SynthEnginePort for FakeSynthEngine {
    async fn synthesize(&self, request: EngineRequest) -> Result<PcmAudio, EngineError> {
        tracing::debug!(
            text_len = request.text.chars().count(),
            voice_id = %request.voice_id,
            "FakeSynthEngine: generating synthetic audio"
        );

        tokio::time::sleep(self.config.delay).await;

        let duration_ms = request.text.chars().count() as u64 * self.config.ms_per_char;
        Ok(PcmAudio {
            spec: self.config.spec,
            data: self.generate_pcm(duration_ms.max(self.config.ms_per_char)),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_output_length_scales_with_text() {
        let engine = FakeSynthEngine::with_defaults();

        let short = engine
            .synthesize(EngineRequest {
                text: "да".to_string(),
                voice_id: "0".to_string(),
                rate: 1.0,
            })
            .await
            .unwrap();
        let long = engine
            .synthesize(EngineRequest {
                text: "длинное предложение".to_string(),
                voice_id: "0".to_string(),
                rate: 1.0,
            })
            .await
            .unwrap();

        assert!(long.data.len() > short.data.len());
        assert_eq!(short.spec, AudioSpec::default());
    }
}
