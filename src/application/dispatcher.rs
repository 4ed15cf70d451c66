//! Synthesis Dispatcher - 合成调度器
//!
//! 独占持有引擎端口，保证全进程同一时刻最多一个引擎调用在途。
//! 串行化通过单槽 `tokio::sync::Mutex` 实现：锁按到达顺序授予
//! （tokio 互斥锁是公平队列），等待中的请求被 drop 时自动出队。
//!
//! 引擎调用本身跑在独立任务里并持有槽位守卫：客户端中途断开时，
//! 在途调用仍然自然跑完（引擎没有中断契约），结果被丢弃，槽位随
//! 任务结束立即释放——死客户端不会把引擎占住超过其调用的自然时长。

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{EngineError, EngineRequest, SynthEnginePort};
use crate::domain::audio::AudioSegment;
use crate::domain::normalizer::NormalizedText;
use crate::domain::sentence::{split_sentences, SentenceConfig};
use crate::domain::voice::ResolvedVoice;

/// 调度错误
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("Dispatcher internal error: {0}")]
    Internal(String),
}

/// 一次合成请求的参数
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: NormalizedText,
    pub voice: ResolvedVoice,
}

/// 合成调度器
pub struct SynthDispatcher {
    engine: Arc<dyn SynthEnginePort>,
    /// 单槽工作队列：持有锁 = 持有引擎
    slot: Arc<Mutex<()>>,
    sentence_config: SentenceConfig,
    /// 引擎进入不可用状态时触发，通知监听器整体关停
    fatal: CancellationToken,
}

impl SynthDispatcher {
    pub fn new(engine: Arc<dyn SynthEnginePort>, sentence_config: SentenceConfig) -> Self {
        Self {
            engine,
            slot: Arc::new(Mutex::new(())),
            sentence_config,
            fatal: CancellationToken::new(),
        }
    }

    /// 引擎致命故障的关停令牌
    pub fn fatal_token(&self) -> CancellationToken {
        self.fatal.clone()
    }

    fn engine_request(request: &SynthesisRequest, text: String) -> EngineRequest {
        EngineRequest {
            text,
            voice_id: request.voice.profile.id.clone(),
            rate: request.voice.rate,
        }
    }

    /// 阻塞式合成：整段文本一次送入引擎，返回单个 final 段
    ///
    /// 调用方在排队等待槽位期间可被取消（出队即可，不触碰引擎）。
    pub async fn synthesize(
        &self,
        request: SynthesisRequest,
    ) -> Result<AudioSegment, DispatchError> {
        let guard = self.slot.clone().lock_owned().await;

        let engine = self.engine.clone();
        let engine_req = Self::engine_request(&request, request.text.as_str().to_string());

        // 拿到槽位之后引擎调用不再可取消
        let handle = tokio::spawn(async move {
            let _slot = guard;
            engine.synthesize(engine_req).await
        });

        let result = handle
            .await
            .map_err(|e| DispatchError::Internal(format!("engine task panicked: {}", e)))?;

        match result {
            Ok(pcm) => {
                let segment = AudioSegment {
                    spec: pcm.spec,
                    pcm: pcm.data,
                    is_final: true,
                };
                tracing::debug!(duration_ms = segment.duration_ms(), "Synthesis complete");
                Ok(segment)
            }
            Err(e) => Err(self.note_engine_error(e)),
        }
    }

    /// 流式合成：按句子边界逐句送入引擎，每句产出一段
    ///
    /// 整个话语期间持有引擎槽位——两个话语的引擎调用交错不是底层
    /// 模型支持的用法。接收端被 drop 时停止拉取后续句子（不会强行
    /// 打断在途的引擎调用）。
    pub fn synthesize_stream(
        &self,
        request: SynthesisRequest,
    ) -> mpsc::Receiver<Result<AudioSegment, DispatchError>> {
        let (tx, rx) = mpsc::channel(2);

        let sentences = split_sentences(request.text.as_str(), &self.sentence_config);
        let slot = self.slot.clone();
        let engine = self.engine.clone();
        let fatal = self.fatal.clone();

        tokio::spawn(async move {
            let _guard = slot.lock_owned().await;

            // 排队期间客户端已断开：立即释放槽位，一次引擎调用都不做
            if tx.is_closed() || sentences.is_empty() {
                return;
            }

            let last = sentences.len() - 1;
            for (i, sentence) in sentences.into_iter().enumerate() {
                let engine_req = Self::engine_request(&request, sentence);

                match engine.synthesize(engine_req).await {
                    Ok(pcm) => {
                        let segment = AudioSegment {
                            spec: pcm.spec,
                            pcm: pcm.data,
                            is_final: i == last,
                        };
                        tracing::debug!(
                            sentence = i,
                            duration_ms = segment.duration_ms(),
                            "Sentence synthesized"
                        );
                        if tx.send(Ok(segment)).await.is_err() {
                            // 接收端消失：停止拉取后续句子
                            tracing::debug!("Stream receiver dropped, abandoning utterance");
                            return;
                        }
                    }
                    Err(e) => {
                        if e.is_fatal() {
                            tracing::error!(error = %e, "Engine became unavailable");
                            fatal.cancel();
                        }
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                }
            }
        });

        rx
    }

    fn note_engine_error(&self, e: EngineError) -> DispatchError {
        if e.is_fatal() {
            tracing::error!(error = %e, "Engine became unavailable");
            self.fatal.cancel();
        }
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::PcmAudio;
    use crate::domain::audio::AudioSpec;
    use crate::domain::normalizer::{normalize, NormalizeOptions};
    use crate::domain::voice::{VoiceCatalogue, VoiceProfile};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 记录并发度的测试引擎
    struct ProbeEngine {
        active: AtomicUsize,
        max_active: AtomicUsize,
        calls: AtomicUsize,
        delay: Duration,
        fail_fatal: bool,
    }

    impl ProbeEngine {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                delay,
                fail_fatal: false,
            })
        }

        fn fatal(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                delay,
                fail_fatal: true,
            })
        }
    }

    #[async_trait]
    impl SynthEnginePort for ProbeEngine {
        async fn synthesize(&self, request: EngineRequest) -> Result<PcmAudio, EngineError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail_fatal {
                return Err(EngineError::Unavailable("model handle lost".into()));
            }

            // 每个字符 4 字节 PCM，便于断言
            Ok(PcmAudio {
                spec: AudioSpec::default(),
                data: vec![0u8; request.text.chars().count() * 4],
            })
        }
    }

    fn request(text: &str) -> SynthesisRequest {
        let voices = vec![VoiceProfile {
            id: "0".into(),
            name: "female_01".into(),
            description: "Female 01".into(),
            language: "ru".into(),
            default_rate: 1.0,
        }];
        let catalogue = VoiceCatalogue::new(voices, "0", 1.0);
        SynthesisRequest {
            text: normalize(text, &NormalizeOptions::default()).unwrap(),
            voice: catalogue.resolve(None, None).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_engine_calls_never_overlap() {
        let engine = ProbeEngine::new(Duration::from_millis(20));
        let dispatcher = Arc::new(SynthDispatcher::new(
            engine.clone(),
            SentenceConfig::default(),
        ));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let d = dispatcher.clone();
            handles.push(tokio::spawn(
                async move { d.synthesize(request("проверка параллельных запросов")).await },
            ));
        }
        for h in handles {
            assert!(h.await.unwrap().is_ok());
        }

        assert_eq!(engine.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_blob_returns_single_final_segment() {
        let engine = ProbeEngine::new(Duration::from_millis(1));
        let dispatcher = SynthDispatcher::new(engine, SentenceConfig::default());

        let segment = dispatcher.synthesize(request("привет мир")).await.unwrap();
        assert!(segment.is_final);
        assert!(!segment.pcm.is_empty());
    }

    #[tokio::test]
    async fn test_stream_yields_segment_per_sentence() {
        let engine = ProbeEngine::new(Duration::from_millis(5));
        let dispatcher = SynthDispatcher::new(engine.clone(), SentenceConfig { min_chars: 1 });

        let mut rx = dispatcher.synthesize_stream(request(
            "Первое предложение подлиннее. Второе предложение тоже.",
        ));

        let first = rx.recv().await.unwrap().unwrap();
        assert!(!first.is_final);
        let second = rx.recv().await.unwrap().unwrap();
        assert!(second.is_final);
        assert!(rx.recv().await.is_none());

        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_queued_request_dropped_without_engine_call() {
        let engine = ProbeEngine::new(Duration::from_millis(50));
        let dispatcher = Arc::new(SynthDispatcher::new(
            engine.clone(),
            SentenceConfig::default(),
        ));

        // A 占住引擎
        let d = dispatcher.clone();
        let a = tokio::spawn(async move { d.synthesize(request("первый длинный запрос")).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // B 排队后被放弃（模拟客户端断开）
        let d = dispatcher.clone();
        let b = tokio::spawn(async move { d.synthesize(request("второй запрос")).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        b.abort();
        let _ = b.await;

        // C 仍然能在 A 结束后正常完成
        let c = dispatcher.synthesize(request("третий запрос")).await;
        assert!(c.is_ok());
        assert!(a.await.unwrap().is_ok());

        // B 从未触发引擎调用
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stream_receiver_drop_stops_pulling() {
        let engine = ProbeEngine::new(Duration::from_millis(20));
        let dispatcher = SynthDispatcher::new(engine.clone(), SentenceConfig { min_chars: 1 });

        let mut rx = dispatcher.synthesize_stream(request(
            "Первое предложение. Второе предложение. Третье предложение.",
        ));

        // 只取第一段就断开
        let first = rx.recv().await.unwrap().unwrap();
        assert!(!first.is_final);
        drop(rx);

        // 给后台任务时间退出；不应把剩下的句子全部合成
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(engine.calls.load(Ordering::SeqCst) < 3);

        // 引擎槽位已释放：新请求可正常完成
        let segment = dispatcher.synthesize(request("следующий клиент")).await;
        assert!(segment.is_ok());
    }

    #[tokio::test]
    async fn test_fatal_engine_error_fires_token() {
        let engine = ProbeEngine::fatal(Duration::from_millis(1));
        let dispatcher = SynthDispatcher::new(engine, SentenceConfig::default());
        let token = dispatcher.fatal_token();

        let result = dispatcher.synthesize(request("тест отказа")).await;
        assert!(result.is_err());
        assert!(token.is_cancelled());
    }
}
