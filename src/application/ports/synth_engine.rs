//! Synthesis Engine Port - 合成引擎抽象
//!
//! 定义外部合成引擎的抽象接口，具体实现在 infrastructure/adapters 层。
//! 引擎是黑盒：接收规范化文本 + 音色 ID + 语速，返回原始 PCM。
//! 引擎不可重入，调用方必须保证全进程同一时刻只有一个调用在途
//! （由调度器负责，见 application/dispatcher.rs）。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::audio::AudioSpec;

/// 引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Engine error: {0}")]
    Service(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// 引擎句柄不可用（模型加载失败或彻底失联）。
    /// 进程级致命：重建句柄等价于整个模型重载，按重启处理。
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

impl EngineError {
    /// 是否为进程级致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Unavailable(_))
    }
}

/// 引擎合成请求
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// 规范化之后的文本
    pub text: String,
    /// 引擎内的音色 ID
    pub voice_id: String,
    /// 语速
    pub rate: f32,
}

/// 引擎合成结果：原始 PCM
#[derive(Debug, Clone)]
pub struct PcmAudio {
    pub spec: AudioSpec,
    pub data: Vec<u8>,
}

/// Synthesis Engine Port
///
/// 外部合成引擎的抽象接口
#[async_trait]
pub trait SynthEnginePort: Send + Sync {
    /// 执行一次合成调用
    async fn synthesize(&self, request: EngineRequest) -> Result<PcmAudio, EngineError>;

    /// 检查引擎是否可用（启动预检）
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}
