//! WAV Parsing - 引擎响应的 WAV 解析
//!
//! 引擎以 WAV 容器返回音频；协议层只发送裸 PCM，所以这里剥掉容器。
//! 只处理未压缩 PCM（audio_format = 1），其他编码一律拒绝。

use crate::application::ports::{EngineError, PcmAudio};
use crate::domain::audio::AudioSpec;

/// fmt chunk 的解析结果
#[derive(Debug, Clone, Copy)]
struct FmtChunk {
    audio_format: u16,
    num_channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

/// 解析 WAV 数据，提取音频规格与 PCM 负载
pub fn parse_wav(data: &[u8]) -> Result<PcmAudio, EngineError> {
    if data.len() < 44 {
        return Err(EngineError::InvalidResponse(
            "WAV data too short".to_string(),
        ));
    }

    if &data[0..4] != b"RIFF" {
        return Err(EngineError::InvalidResponse(
            "Invalid WAV: missing RIFF header".to_string(),
        ));
    }

    if &data[8..12] != b"WAVE" {
        return Err(EngineError::InvalidResponse(
            "Invalid WAV: missing WAVE identifier".to_string(),
        ));
    }

    // 遍历 chunk，找 fmt 和 data
    let mut pos = 12;
    let mut fmt_chunk: Option<FmtChunk> = None;
    let mut data_start = 0;
    let mut data_size = 0;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size =
            u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
                as usize;

        match chunk_id {
            b"fmt " => {
                if chunk_size < 16 || pos + 8 + 16 > data.len() {
                    return Err(EngineError::InvalidResponse(
                        "Invalid fmt chunk size".to_string(),
                    ));
                }
                let fmt_data = &data[pos + 8..pos + 8 + 16];
                fmt_chunk = Some(FmtChunk {
                    audio_format: u16::from_le_bytes([fmt_data[0], fmt_data[1]]),
                    num_channels: u16::from_le_bytes([fmt_data[2], fmt_data[3]]),
                    sample_rate: u32::from_le_bytes([
                        fmt_data[4],
                        fmt_data[5],
                        fmt_data[6],
                        fmt_data[7],
                    ]),
                    bits_per_sample: u16::from_le_bytes([fmt_data[14], fmt_data[15]]),
                });
            }
            b"data" => {
                data_start = pos + 8;
                data_size = chunk_size;
                break;
            }
            _ => {}
        }

        pos += 8 + chunk_size;
        // 对齐到偶数字节
        if chunk_size % 2 != 0 {
            pos += 1;
        }
    }

    let fmt = fmt_chunk.ok_or_else(|| {
        EngineError::InvalidResponse("Invalid WAV: missing fmt chunk".to_string())
    })?;

    if fmt.audio_format != 1 {
        return Err(EngineError::InvalidResponse(format!(
            "Unsupported WAV encoding: {} (expected PCM)",
            fmt.audio_format
        )));
    }

    if fmt.bits_per_sample % 8 != 0 || fmt.bits_per_sample == 0 {
        return Err(EngineError::InvalidResponse(format!(
            "Unsupported bits per sample: {}",
            fmt.bits_per_sample
        )));
    }

    if data_size == 0 || data_start == 0 {
        return Err(EngineError::InvalidResponse(
            "Invalid WAV: missing data chunk".to_string(),
        ));
    }

    // data chunk 声明的长度可能超过实际字节数（流式写出的 WAV 常见）
    let data_end = (data_start + data_size).min(data.len());

    Ok(PcmAudio {
        spec: AudioSpec {
            rate: fmt.sample_rate,
            width: fmt.bits_per_sample / 8,
            channels: fmt.num_channels,
        },
        data: data[data_start..data_end].to_vec(),
    })
}

/// 构造 WAV 字节流（测试与 fake 引擎用）
pub fn build_wav(spec: &AudioSpec, pcm: &[u8]) -> Vec<u8> {
    let byte_rate = spec.rate * spec.width as u32 * spec.channels as u32;
    let block_align = spec.width * spec.channels;
    let data_len = pcm.len() as u32;

    let mut out = Vec::with_capacity(44 + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&spec.channels.to_le_bytes());
    out.extend_from_slice(&spec.rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&((spec.width * 8) as u16).to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}
