//! 音色目录与语速解析
//!
//! 音色集合在启动时从配置加载，之后只读。未知音色 ID 直接报错而
//! 不是静默替换，让客户端能及时修正自己的配置。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 语速安全范围（取自引擎文档建议范围）
pub const MIN_RATE: f32 = 0.2;
pub const MAX_RATE: f32 = 2.0;

/// 解析错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// 请求的音色不在已加载的目录中
    #[error("unknown voice: {0}")]
    UnknownVoice(String),
}

/// 一个已安装的音色
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// 引擎内的音色 ID
    pub id: String,
    /// 对外展示名
    pub name: String,
    /// 人类可读描述
    pub description: String,
    /// 语言代码
    pub language: String,
    /// 该音色的默认语速
    pub default_rate: f32,
}

/// 解析后的合成参数
#[derive(Debug, Clone)]
pub struct ResolvedVoice {
    pub profile: VoiceProfile,
    pub rate: f32,
}

/// 只读音色目录
#[derive(Debug, Clone)]
pub struct VoiceCatalogue {
    voices: Vec<VoiceProfile>,
    default_voice_id: String,
    default_rate: f32,
}

impl VoiceCatalogue {
    /// 构建目录
    ///
    /// 配置的默认音色不在目录中时，回退到第一个条目并告警
    /// （与其让所有无音色请求失败，不如降级服务）。
    pub fn new(voices: Vec<VoiceProfile>, default_voice_id: &str, default_rate: f32) -> Self {
        assert!(!voices.is_empty(), "voice catalogue cannot be empty");

        let default_voice_id = if voices.iter().any(|v| v.id == default_voice_id) {
            default_voice_id.to_string()
        } else {
            let fallback = voices[0].id.clone();
            tracing::warn!(
                configured = %default_voice_id,
                fallback = %fallback,
                "Configured default voice not in catalogue, using first entry"
            );
            fallback
        };

        Self {
            voices,
            default_voice_id,
            default_rate,
        }
    }

    pub fn voices(&self) -> &[VoiceProfile] {
        &self.voices
    }

    pub fn default_voice_id(&self) -> &str {
        &self.default_voice_id
    }

    /// 解析请求的音色与语速
    ///
    /// 音色缺省时使用服务默认音色；未知音色报
    /// [`ResolveError::UnknownVoice`]。语速缺省时使用音色默认值；
    /// 非法值（非有限数或 ≤ 0）回退服务默认值，其余值收敛到
    /// [`MIN_RATE`, `MAX_RATE`] 区间——语速是便利参数，不做硬性拒绝。
    pub fn resolve(
        &self,
        voice_id: Option<&str>,
        rate: Option<f32>,
    ) -> Result<ResolvedVoice, ResolveError> {
        let id = voice_id.unwrap_or(&self.default_voice_id);
        let profile = self
            .voices
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownVoice(id.to_string()))?;

        let rate = match rate {
            Some(r) if r.is_finite() && r > 0.0 => r.clamp(MIN_RATE, MAX_RATE),
            Some(r) => {
                tracing::warn!(rate = r, "Invalid speech rate, using default");
                self.default_rate
            }
            None => {
                if profile.default_rate > 0.0 {
                    profile.default_rate
                } else {
                    self.default_rate
                }
            }
        };

        Ok(ResolvedVoice { profile, rate })
    }
}
