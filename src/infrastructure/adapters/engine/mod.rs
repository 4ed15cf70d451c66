//! Engine Adapters - 合成引擎适配器

mod fake;
mod http;

pub use fake::{FakeSynthEngine, FakeSynthEngineConfig};
pub use http::HttpSynthEngine;
