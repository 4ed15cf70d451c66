//! Wire Protocol - 行式事件帧编解码
//!
//! 帧格式：一行 JSON 事件头（`type` + 可选 `data_length` /
//! `payload_length`），后跟 `data_length` 字节的 JSON 数据和
//! `payload_length` 字节的二进制负载。
//!
//! 帧级错误（头部非 JSON、长度超限）对连接是致命的；数据字段不合
//! 预期属于请求级错误，由会话层处理。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// 事件头中携带的协议版本
pub const PROTOCOL_VERSION: &str = "1.5.2";

/// 事件头行的最大字节数
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

/// data 段的最大字节数
pub const MAX_DATA_BYTES: usize = 1024 * 1024;

/// payload 段的最大字节数
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

/// 帧级错误，一律断开连接
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed event header: {0}")]
    MalformedHeader(String),

    #[error("Frame section '{section}' too large: {len} bytes (limit {limit})")]
    Oversized {
        section: &'static str,
        len: usize,
        limit: usize,
    },

    #[error("Unsupported protocol version: {0} (supported major: {1})")]
    VersionMismatch(String, u64),
}

/// 事件头（每帧一行 JSON）
#[derive(Debug, Serialize, Deserialize)]
struct EventHeader {
    #[serde(rename = "type")]
    event_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    data_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    payload_length: Option<usize>,

    /// 小数据可以内联在头里（兼容形式，只读不写）
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

fn major_version(version: &str) -> Option<u64> {
    version.split('.').next()?.parse().ok()
}

fn supported_major() -> u64 {
    // PROTOCOL_VERSION 是编译期常量，主版本号总能解析出来
    major_version(PROTOCOL_VERSION).unwrap_or(0)
}

/// 解码后的完整事件
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub data: Value,
    pub payload: Vec<u8>,
}

/// 读取一个事件
///
/// 返回 `Ok(None)` 表示对端干净关闭了连接。
pub async fn read_event<R>(reader: &mut R) -> Result<Option<Event>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        // 限长读取，防止无换行的超长头占满内存
        let mut limited = (&mut *reader).take(MAX_HEADER_BYTES as u64 + 1);
        let n = limited.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        if n > MAX_HEADER_BYTES {
            return Err(FramingError::Oversized {
                section: "header",
                len: n,
                limit: MAX_HEADER_BYTES,
            });
        }
        // 容忍事件之间的空行
        if !line.trim().is_empty() {
            break;
        }
    }

    let header: EventHeader = serde_json::from_str(line.trim())
        .map_err(|e| FramingError::MalformedHeader(e.to_string()))?;

    // 主版本不兼容对连接是致命的；缺省版本按兼容处理
    if let Some(version) = &header.version {
        if major_version(version) != Some(supported_major()) {
            return Err(FramingError::VersionMismatch(
                version.clone(),
                supported_major(),
            ));
        }
    }

    let data = match header.data_length {
        Some(len) if len > MAX_DATA_BYTES => {
            return Err(FramingError::Oversized {
                section: "data",
                len,
                limit: MAX_DATA_BYTES,
            });
        }
        Some(len) => {
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).await?;
            serde_json::from_slice(&buf)
                .map_err(|e| FramingError::MalformedHeader(format!("data section: {}", e)))?
        }
        None => header.data.unwrap_or(Value::Null),
    };

    let payload = match header.payload_length {
        Some(len) if len > MAX_PAYLOAD_BYTES => {
            return Err(FramingError::Oversized {
                section: "payload",
                len,
                limit: MAX_PAYLOAD_BYTES,
            });
        }
        Some(len) => {
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).await?;
            buf
        }
        None => Vec::new(),
    };

    Ok(Some(Event {
        event_type: header.event_type,
        data,
        payload,
    }))
}

/// 写出一个事件并 flush
pub async fn write_event<W>(
    writer: &mut W,
    event_type: &str,
    data: &Value,
    payload: Option<&[u8]>,
) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let data_bytes = if data.is_null() {
        Vec::new()
    } else {
        serde_json::to_vec(data)
            .map_err(|e| FramingError::MalformedHeader(format!("data encode: {}", e)))?
    };

    let header = EventHeader {
        event_type: event_type.to_string(),
        version: Some(PROTOCOL_VERSION.to_string()),
        data_length: (!data_bytes.is_empty()).then_some(data_bytes.len()),
        payload_length: payload.map(|p| p.len()),
        data: None,
    };

    let mut frame = serde_json::to_vec(&header)
        .map_err(|e| FramingError::MalformedHeader(format!("header encode: {}", e)))?;
    frame.push(b'\n');
    frame.extend_from_slice(&data_bytes);
    if let Some(p) = payload {
        frame.extend_from_slice(p);
    }

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// synthesize 事件的数据段
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesizeData {
    pub text: String,
    #[serde(default)]
    pub voice: Option<SynthesizeVoice>,
    #[serde(default)]
    pub rate: Option<f32>,
    #[serde(default)]
    pub streaming: Option<bool>,
}

/// synthesize 事件中的音色引用
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesizeVoice {
    pub id: String,
}

/// audio-start / audio-chunk 事件的数据段
#[derive(Debug, Clone, Serialize)]
pub struct AudioFormatData {
    pub rate: u32,
    pub width: u16,
    pub channels: u16,
}

impl From<crate::domain::audio::AudioSpec> for AudioFormatData {
    fn from(spec: crate::domain::audio::AudioSpec) -> Self {
        Self {
            rate: spec.rate,
            width: spec.width,
            channels: spec.channels,
        }
    }
}
