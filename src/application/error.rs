//! 请求级错误分类
//!
//! 这些错误通过协议的 error 事件回给客户端，连接保持存活。
//! 连接级致命错误（协议帧损坏）在 server::protocol 中单独定义；
//! 进程级致命错误（引擎不可用）由调度器触发全局关停。

use thiserror::Error;

use crate::application::dispatcher::DispatchError;
use crate::domain::normalizer::NormalizeError;
use crate::domain::voice::ResolveError;

/// 单个合成请求的错误
#[derive(Debug, Error)]
pub enum RequestError {
    /// 规范化之后没有可朗读的内容
    #[error("input is empty after normalization")]
    EmptyInput,

    /// 请求的音色不在目录中
    #[error("unknown voice: {0}")]
    InvalidVoice(String),

    /// 引擎级故障，仅影响本次请求
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),
}

impl RequestError {
    /// 线上错误码
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::EmptyInput => "empty-input",
            RequestError::InvalidVoice(_) => "invalid-voice",
            RequestError::SynthesisFailed(_) => "synthesis-failed",
        }
    }
}

impl From<NormalizeError> for RequestError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::EmptyInput => RequestError::EmptyInput,
        }
    }
}

impl From<ResolveError> for RequestError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::UnknownVoice(id) => RequestError::InvalidVoice(id),
        }
    }
}

impl From<DispatchError> for RequestError {
    fn from(err: DispatchError) -> Self {
        RequestError::SynthesisFailed(err.to_string())
    }
}
