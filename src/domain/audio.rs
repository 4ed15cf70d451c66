//! 音频值对象与分包器
//!
//! PCM 缓冲在这里被切成不超过字节预算的有序分包，供会话逐个写出。
//! 切分永远对齐到整样本边界（宽度 × 声道数），最后一个分包带终止标记。

use serde::{Deserialize, Serialize};

/// PCM 音频格式描述
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSpec {
    /// 采样率 (Hz)
    pub rate: u32,
    /// 样本宽度（字节）
    pub width: u16,
    /// 声道数
    pub channels: u16,
}

impl AudioSpec {
    /// 一个完整样本（所有声道）占用的字节数
    pub fn bytes_per_sample(&self) -> usize {
        self.width as usize * self.channels as usize
    }
}

impl Default for AudioSpec {
    fn default() -> Self {
        // Vosk TTS 模型输出：16-bit mono @ 22050 Hz
        Self {
            rate: 22050,
            width: 2,
            channels: 1,
        }
    }
}

/// 一段 PCM 音频
///
/// 由调度器产出、分包器消费；流式模式下每句一段（intermediate），
/// 最后一段标记为 final。
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub spec: AudioSpec,
    pub pcm: Vec<u8>,
    /// 是否为本次请求的最后一段
    pub is_final: bool,
}

impl AudioSegment {
    pub fn duration_ms(&self) -> u64 {
        let bytes_per_sample = self.spec.bytes_per_sample();
        if bytes_per_sample == 0 || self.spec.rate == 0 {
            return 0;
        }
        let samples = self.pcm.len() / bytes_per_sample;
        samples as u64 * 1000 / self.spec.rate as u64
    }
}

/// 一个线上分包
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub spec: AudioSpec,
    pub payload: Vec<u8>,
    /// 是否为所属段的最后一个分包
    pub is_last: bool,
}

/// 将一段 PCM 切成不超过 max_chunk_bytes 的有序分包
///
/// 实际分包大小向下对齐到整样本，绝不从样本中间切开。
/// 段的 final 标记传播到它的最后一个分包。
pub fn to_chunks(segment: &AudioSegment, max_chunk_bytes: usize) -> Vec<AudioChunk> {
    let bytes_per_sample = segment.spec.bytes_per_sample();
    if segment.pcm.is_empty() || bytes_per_sample == 0 {
        return Vec::new();
    }

    // 对齐到整样本；预算小于一个样本时退化为单样本分包
    let chunk_bytes = (max_chunk_bytes / bytes_per_sample).max(1) * bytes_per_sample;

    let chunks: Vec<&[u8]> = segment.pcm.chunks(chunk_bytes).collect();
    let last_index = chunks.len() - 1;

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, payload)| AudioChunk {
            spec: segment.spec,
            payload: payload.to_vec(),
            is_last: segment.is_final && i == last_index,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(len: usize, is_final: bool) -> AudioSegment {
        AudioSegment {
            spec: AudioSpec::default(),
            pcm: (0..len).map(|i| (i % 256) as u8).collect(),
            is_final,
        }
    }

    #[test]
    fn test_chunks_respect_max_bytes_and_alignment() {
        let seg = segment(10_000, true);
        let chunks = to_chunks(&seg, 1000);

        for chunk in &chunks {
            assert!(chunk.payload.len() <= 1000);
            assert_eq!(chunk.payload.len() % seg.spec.bytes_per_sample(), 0);
        }
    }

    #[test]
    fn test_chunks_preserve_order_and_content() {
        let seg = segment(5000, true);
        let chunks = to_chunks(&seg, 512);

        let rejoined: Vec<u8> = chunks.iter().flat_map(|c| c.payload.clone()).collect();
        assert_eq!(rejoined, seg.pcm);
    }

    #[test]
    fn test_final_flag_only_on_last_chunk_of_final_segment() {
        let seg = segment(3000, true);
        let chunks = to_chunks(&seg, 1024);

        assert!(chunks.len() > 1);
        assert!(chunks.last().unwrap().is_last);
        assert!(chunks[..chunks.len() - 1].iter().all(|c| !c.is_last));
    }

    #[test]
    fn test_intermediate_segment_has_no_terminal_chunk() {
        let seg = segment(3000, false);
        let chunks = to_chunks(&seg, 1024);
        assert!(chunks.iter().all(|c| !c.is_last));
    }

    #[test]
    fn test_max_bytes_smaller_than_sample() {
        // 上限 1 字节，样本 2 字节：退化为单样本分包而不是切开样本
        let seg = segment(8, true);
        let chunks = to_chunks(&seg, 1);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.payload.len() == 2));
    }

    #[test]
    fn test_empty_pcm_yields_no_chunks() {
        let seg = segment(0, true);
        assert!(to_chunks(&seg, 1024).is_empty());
    }

    #[test]
    fn test_duration() {
        // 22050 样本 @ 22050 Hz 16-bit mono = 1 秒
        let seg = segment(44100, true);
        assert_eq!(seg.duration_ms(), 1000);
    }
}
