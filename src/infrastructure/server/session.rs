//! Protocol Session - 每连接协议状态机
//!
//! 读取客户端事件，驱动 规范化 → 音色解析 → 调度器 → 分包器，
//! 按协议次序写回响应。每条连接同一时刻只有一个在途请求——
//! 下一个事件要等上一个请求的全部响应写完才会被读取。
//!
//! 错误分层：
//! - 请求级（空输入、未知音色、引擎单次故障）→ error 事件，连接存活
//! - 连接级（帧损坏、超限、空闲超时）→ 尽力发 error 事件后断开
//! - 进程级（引擎不可用）→ 调度器触发全局关停

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::time::timeout;

use crate::application::dispatcher::{SynthDispatcher, SynthesisRequest};
use crate::application::error::RequestError;
use crate::domain::audio::{to_chunks, AudioSegment, AudioSpec};
use crate::domain::normalizer::{normalize, NormalizeOptions};
use crate::domain::voice::VoiceCatalogue;
use crate::infrastructure::server::protocol::{
    read_event, write_event, AudioFormatData, Event, FramingError, SynthesizeData,
};
use crate::infrastructure::server::registry::SessionRegistry;

/// 所有会话共享的上下文
pub struct SessionContext {
    pub dispatcher: Arc<SynthDispatcher>,
    pub catalogue: Arc<VoiceCatalogue>,
    pub normalize_options: NormalizeOptions,
    /// 每个音频块的采样数
    pub samples_per_chunk: usize,
    /// 空闲超时，zero 表示不限
    pub idle_timeout: Duration,
    /// info 事件中报告的引擎模型名
    pub model: String,
}

impl SessionContext {
    /// 单块字节上限：采样数 × 每采样字节数
    fn max_chunk_bytes(&self, segment: &AudioSegment) -> usize {
        self.samples_per_chunk * segment.spec.bytes_per_sample()
    }

    /// info 事件的数据段：服务自描述 + 音色目录
    fn info_data(&self) -> serde_json::Value {
        let voices: Vec<_> = self
            .catalogue
            .voices()
            .iter()
            .map(|v| {
                json!({
                    "id": v.id,
                    "name": v.name,
                    "description": v.description,
                    "language": v.language,
                    "default_rate": v.default_rate,
                })
            })
            .collect();

        json!({
            "tts": [{
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "model": self.model,
                "default_voice": self.catalogue.default_voice_id(),
                "voices": voices,
            }]
        })
    }
}

/// 运行一条连接的完整生命周期
///
/// 返回时连接已结束；登记表条目由调用方（监听器）负责清理。
pub async fn run_session<R, W>(
    ctx: Arc<SessionContext>,
    registry: Arc<SessionRegistry>,
    session_id: String,
    reader: R,
    mut writer: W,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);

    loop {
        let event = match next_event(&mut reader, ctx.idle_timeout).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::debug!(session_id = %session_id, "Connection closed by peer");
                break;
            }
            Err(SessionEnd::IdleTimeout) => {
                tracing::info!(session_id = %session_id, "Idle timeout, closing connection");
                break;
            }
            Err(SessionEnd::Framing(e)) => {
                tracing::warn!(session_id = %session_id, error = %e, "Framing error");
                // 尽力上报后断开
                let _ = write_event(
                    &mut writer,
                    "error",
                    &json!({"code": "protocol", "message": e.to_string()}),
                    None,
                )
                .await;
                break;
            }
        };

        registry.touch(&session_id);

        let result = match event.event_type.as_str() {
            "describe" => {
                tracing::debug!(session_id = %session_id, "Describe request");
                write_event(&mut writer, "info", &ctx.info_data(), None).await
            }
            "synthesize" => {
                let r = handle_synthesize(&ctx, &mut reader, &mut writer, event, &session_id).await;
                registry.record_request(&session_id);
                match r {
                    Ok(RequestOutcome::Completed) => Ok(()),
                    Ok(RequestOutcome::Disconnected) => {
                        tracing::debug!(session_id = %session_id, "Client disconnected during request");
                        break;
                    }
                    Err(e) => Err(e),
                }
            }
            other => {
                tracing::debug!(session_id = %session_id, event_type = %other, "Ignoring unsupported event");
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::warn!(session_id = %session_id, error = %e, "Write failed, closing connection");
            break;
        }
    }
}

enum SessionEnd {
    IdleTimeout,
    Framing(FramingError),
}

/// 一次请求的收尾方式
enum RequestOutcome {
    /// 响应（或错误事件）已完整写出
    Completed,
    /// 客户端在请求处理期间断开
    Disconnected,
}

/// 等待对端断开
///
/// 只探测缓冲区，不消费字节：请求在途时客户端不应发新事件，但
/// 若真的提前发了数据，这里保持挂起，数据留给下一轮事件循环。
async fn wait_disconnect<R>(reader: &mut BufReader<R>)
where
    R: AsyncRead + Unpin,
{
    match reader.fill_buf().await {
        Ok(buf) if buf.is_empty() => {}
        Ok(_) => std::future::pending::<()>().await,
        Err(_) => {}
    }
}

async fn next_event<R>(
    reader: &mut BufReader<R>,
    idle_timeout: Duration,
) -> Result<Option<Event>, SessionEnd>
where
    R: AsyncRead + Unpin,
{
    let read = read_event(reader);
    let result = if idle_timeout.is_zero() {
        read.await
    } else {
        match timeout(idle_timeout, read).await {
            Ok(result) => result,
            Err(_) => return Err(SessionEnd::IdleTimeout),
        }
    };
    result.map_err(SessionEnd::Framing)
}

/// 处理一个 synthesize 事件
///
/// 返回 Err 仅当连接已不可写；请求级失败在这里转成 error 事件。
/// 请求在途期间监视读端：对端断开时放弃（排队中的请求随之出队）。
async fn handle_synthesize<R, W>(
    ctx: &SessionContext,
    reader: &mut BufReader<R>,
    writer: &mut W,
    event: Event,
    session_id: &str,
) -> Result<RequestOutcome, FramingError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let request: SynthesizeData = match serde_json::from_value(event.data) {
        Ok(r) => r,
        Err(e) => {
            // 帧完好但字段不合预期：请求级错误，连接保留
            tracing::warn!(session_id = %session_id, error = %e, "Malformed synthesize data");
            write_event(
                writer,
                "error",
                &json!({"code": "protocol", "message": format!("malformed synthesize request: {}", e)}),
                None,
            )
            .await?;
            return Ok(RequestOutcome::Completed);
        }
    };

    let streaming = request.streaming.unwrap_or(false);
    tracing::info!(
        session_id = %session_id,
        text_len = request.text.chars().count(),
        voice = request.voice.as_ref().map(|v| v.id.as_str()),
        rate = request.rate,
        streaming,
        "Synthesize request"
    );

    let prepared = normalize(&request.text, &ctx.normalize_options)
        .map_err(RequestError::from)
        .and_then(|text| {
            let voice = ctx
                .catalogue
                .resolve(request.voice.as_ref().map(|v| v.id.as_str()), request.rate)?;
            Ok(SynthesisRequest { text, voice })
        });

    let synth_request = match prepared {
        Ok(r) => r,
        Err(e) => {
            write_request_error(writer, &e, session_id).await?;
            return Ok(RequestOutcome::Completed);
        }
    };

    if streaming {
        stream_response(ctx, reader, writer, synth_request, session_id).await
    } else {
        blob_response(ctx, reader, writer, synth_request, session_id).await
    }
}

/// 非流式响应：单个 final 段一次性发出
async fn blob_response<R, W>(
    ctx: &SessionContext,
    reader: &mut BufReader<R>,
    writer: &mut W,
    request: SynthesisRequest,
    session_id: &str,
) -> Result<RequestOutcome, FramingError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let synth = ctx.dispatcher.synthesize(request);
    tokio::pin!(synth);

    let result = tokio::select! {
        result = &mut synth => result,
        _ = wait_disconnect(reader) => return Ok(RequestOutcome::Disconnected),
    };

    match result {
        Ok(segment) => {
            write_audio_start(writer, segment.spec).await?;
            write_segment_chunks(ctx, writer, &segment).await?;
            write_event(writer, "audio-stop", &json!({"final": true}), None).await?;
        }
        Err(e) => write_request_error(writer, &RequestError::from(e), session_id).await?,
    }
    Ok(RequestOutcome::Completed)
}

/// 流式响应：逐段转发，段一到就分块发出
async fn stream_response<R, W>(
    ctx: &SessionContext,
    reader: &mut BufReader<R>,
    writer: &mut W,
    request: SynthesisRequest,
    session_id: &str,
) -> Result<RequestOutcome, FramingError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut rx = ctx.dispatcher.synthesize_stream(request);
    let mut started = false;
    let mut finished = false;

    loop {
        let item = tokio::select! {
            item = rx.recv() => item,
            _ = wait_disconnect(reader) => return Ok(RequestOutcome::Disconnected),
        };
        let Some(item) = item else {
            break;
        };
        match item {
            Ok(segment) => {
                if !started {
                    write_audio_start(writer, segment.spec).await?;
                    started = true;
                }
                let is_final = segment.is_final;
                write_segment_chunks(ctx, writer, &segment).await?;
                if is_final {
                    write_event(writer, "audio-stop", &json!({"final": true}), None).await?;
                    finished = true;
                }
            }
            Err(e) => {
                write_request_error(writer, &RequestError::from(e), session_id).await?;
                if started {
                    // 已经开始的音频流必须有终止标记
                    write_event(writer, "audio-stop", &json!({"final": true}), None).await?;
                }
                finished = true;
                break;
            }
        }
    }

    if started && !finished {
        write_event(writer, "audio-stop", &json!({"final": true}), None).await?;
    }
    Ok(RequestOutcome::Completed)
}

async fn write_audio_start<W>(writer: &mut W, spec: AudioSpec) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let format_value = serde_json::to_value(AudioFormatData::from(spec)).unwrap_or(json!({}));
    write_event(writer, "audio-start", &format_value, None).await
}

/// 把一个段按块上限切开写出
async fn write_segment_chunks<W>(
    ctx: &SessionContext,
    writer: &mut W,
    segment: &AudioSegment,
) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    for chunk in to_chunks(segment, ctx.max_chunk_bytes(segment)) {
        let format_value =
            serde_json::to_value(AudioFormatData::from(chunk.spec)).unwrap_or(json!({}));
        write_event(writer, "audio-chunk", &format_value, Some(&chunk.payload)).await?;
    }
    Ok(())
}

async fn write_request_error<W>(
    writer: &mut W,
    error: &RequestError,
    session_id: &str,
) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    tracing::warn!(session_id = %session_id, code = error.code(), error = %error, "Request failed");
    write_event(
        writer,
        "error",
        &json!({"code": error.code(), "message": error.to_string()}),
        None,
    )
    .await
}
