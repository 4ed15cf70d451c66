//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod server;

pub use adapters::{FakeSynthEngine, FakeSynthEngineConfig, HttpSynthEngine};
pub use server::{SessionContext, SynthServer};
