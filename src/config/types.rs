//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

use crate::domain::normalizer::TruncateBoundary;
use crate::domain::voice::VoiceProfile;

/// 应用主配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 合成引擎配置
    #[serde(default)]
    pub engine: EngineConfig,

    /// 文本与合成策略配置
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// 音频输出配置
    #[serde(default)]
    pub audio: AudioConfig,

    /// 音色目录（为空时使用内置目录）
    #[serde(default)]
    pub voices: Vec<VoiceProfile>,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            engine: EngineConfig::default(),
            synthesis: SynthesisConfig::default(),
            audio: AudioConfig::default(),
            voices: Vec::new(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 生效的音色目录
    ///
    /// 配置未给出音色时，使用引擎自带的五个俄语音色。
    pub fn effective_voices(&self) -> Vec<VoiceProfile> {
        if self.voices.is_empty() {
            builtin_voices()
        } else {
            self.voices.clone()
        }
    }
}

/// 引擎自带的音色目录
fn builtin_voices() -> Vec<VoiceProfile> {
    let entries = [
        ("0", "female_01", "Female 01"),
        ("1", "female_02", "Female 02"),
        ("2", "female_03", "Female 03"),
        ("3", "male_01", "Male 01"),
        ("4", "male_02", "Male 02"),
    ];
    entries
        .iter()
        .map(|(id, name, description)| VoiceProfile {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            language: "ru".to_string(),
            default_rate: 1.0,
        })
        .collect()
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 最大并发连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// 连接空闲超时（秒），0 表示不超时
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10200
}

fn default_max_connections() -> usize {
    32
}

fn default_idle_timeout() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 合成引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// 引擎服务基础 URL
    #[serde(default = "default_engine_url")]
    pub url: String,

    /// 单次合成请求超时时间（秒）
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,

    /// 最大重试次数
    #[serde(default)]
    pub max_retries: u32,

    /// 引擎加载的模型名（仅用于 info 事件的自描述）
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_engine_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_engine_timeout() -> u64 {
    120
}

fn default_model() -> String {
    "vosk-model-tts-ru-0.7-multi".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            timeout_secs: default_engine_timeout(),
            max_retries: 0,
            model: default_model(),
        }
    }
}

/// 文本与合成策略配置
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    /// 默认音色 ID
    #[serde(default = "default_voice")]
    pub default_voice: String,

    /// 默认语速
    #[serde(default = "default_rate")]
    pub default_rate: f32,

    /// 输入文本的最大字符数（规范化之后），None 表示不限制
    #[serde(default)]
    pub max_input_length: Option<usize>,

    /// 超长文本的截断边界
    #[serde(default)]
    pub truncate: TruncateBoundary,

    /// 流式切分的句子最小字符数
    #[serde(default = "default_min_sentence_chars")]
    pub min_sentence_chars: usize,
}

fn default_voice() -> String {
    "3".to_string()
}

fn default_rate() -> f32 {
    1.0
}

fn default_min_sentence_chars() -> usize {
    20
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            default_voice: default_voice(),
            default_rate: default_rate(),
            max_input_length: None,
            truncate: TruncateBoundary::default(),
            min_sentence_chars: default_min_sentence_chars(),
        }
    }
}

/// 音频输出配置
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// 每个音频块的采样数
    #[serde(default = "default_samples_per_chunk")]
    pub samples_per_chunk: usize,
}

fn default_samples_per_chunk() -> usize {
    1024
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            samples_per_chunk: default_samples_per_chunk(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 10200);
        assert_eq!(config.engine.url, "http://localhost:8000");
        assert_eq!(config.synthesis.default_voice, "3");
        assert_eq!(config.audio.samples_per_chunk, 1024);
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:10200");
    }

    #[test]
    fn test_builtin_voice_catalogue() {
        let config = AppConfig::default();
        let voices = config.effective_voices();
        assert_eq!(voices.len(), 5);
        assert_eq!(voices[3].id, "3");
        assert_eq!(voices[3].name, "male_01");
        assert!(voices.iter().all(|v| v.language == "ru"));
    }

    #[test]
    fn test_configured_voices_override_builtin() {
        let mut config = AppConfig::default();
        config.voices = vec![VoiceProfile {
            id: "custom".into(),
            name: "custom_voice".into(),
            description: "Custom".into(),
            language: "ru".into(),
            default_rate: 1.2,
        }];
        let voices = config.effective_voices();
        assert_eq!(voices.len(), 1);
        assert_eq!(voices[0].id, "custom");
    }
}
