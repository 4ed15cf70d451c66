//! Domain Layer - 领域层
//!
//! 纯逻辑，无 I/O：
//! - normalizer: 文本规范化管线
//! - num2words: 俄语数字展开
//! - sentence: 流式合成的句子切分
//! - audio: 音频值对象与分包器
//! - voice: 音色目录与语速解析

pub mod audio;
pub mod normalizer;
pub mod num2words;
pub mod sentence;
pub mod voice;
