//! Application Layer - 应用层
//!
//! 编排领域逻辑与出站端口：
//! - dispatcher: 串行化引擎访问的合成调度器
//! - error: 请求级错误分类（映射到协议 error 事件）
//! - ports: 出站端口定义

pub mod dispatcher;
pub mod error;
pub mod ports;

pub use dispatcher::{DispatchError, SynthDispatcher, SynthesisRequest};
pub use error::RequestError;
