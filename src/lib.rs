//! Govorun - 局域网语音合成服务
//!
//! 把一个非重入的外部合成引擎通过行式流协议暴露给语音助手中枢。
//!
//! 领域层 (domain/):
//! - normalizer / num2words: 文本规范化管线（数字展开、转写、字符过滤）
//! - sentence: 流式合成的句子切分
//! - audio: PCM 值对象与分包器
//! - voice: 音色目录与语速解析
//!
//! 应用层 (application/):
//! - Ports: 合成引擎端口
//! - Dispatcher: 串行化引擎访问（全进程单槽队列）
//!
//! 基础设施层 (infrastructure/):
//! - Server: 协议帧编解码、会话状态机、TCP 监听器
//! - Adapters: 引擎 HTTP 客户端、WAV 解析、测试引擎

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
