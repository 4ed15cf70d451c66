//! Protocol Server - 协议服务器
//!
//! 行式事件协议的完整服务端：帧编解码、会话状态机、在线登记表
//! 与 TCP 接受循环。

pub mod listener;
pub mod protocol;
pub mod registry;
pub mod session;

pub use listener::SynthServer;
pub use registry::SessionRegistry;
pub use session::SessionContext;
