//! Connection Listener - TCP 监听器
//!
//! 接受连接、按上限发放会话槽位、为每条连接起一个会话任务。
//! 超出并发上限的连接被明确关闭而不是静默丢弃。监听器自身
//! 不持有任何合成状态。

use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::server::registry::SessionRegistry;
use crate::infrastructure::server::session::{run_session, SessionContext};

/// TCP 合成服务器
pub struct SynthServer {
    listener: TcpListener,
    max_connections: usize,
    context: Arc<SessionContext>,
    registry: Arc<SessionRegistry>,
}

impl SynthServer {
    /// 绑定监听地址
    ///
    /// 立即绑定，便于调用方在启动接受循环之前拿到实际端口。
    pub async fn bind(
        addr: &str,
        max_connections: usize,
        context: Arc<SessionContext>,
    ) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            max_connections,
            context,
            registry: SessionRegistry::new().arc(),
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// 运行接受循环直到关停
    ///
    /// 两个关停来源：外部 shutdown 信号（干净退出）和引擎致命
    /// 故障令牌（以错误退出，让进程以非零码结束）。
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        let Self {
            listener,
            max_connections,
            context,
            registry,
        } = self;

        let fatal = context.dispatcher.fatal_token();
        let permits = Arc::new(Semaphore::new(max_connections));

        tracing::info!(
            addr = ?listener.local_addr(),
            max_connections,
            "Listening for connections"
        );

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown signal received, stopping listener");
                    return Ok(());
                }
                _ = fatal.cancelled() => {
                    tracing::error!("Engine unavailable, stopping listener");
                    return Err(std::io::Error::other("synthesis engine became unavailable"));
                }
            };

            let (stream, peer_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    continue;
                }
            };

            let permit = match permits.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    // 上限已满：明确关闭而不是悄悄挂起
                    tracing::warn!(
                        peer = %peer_addr,
                        active = registry.count(),
                        "Connection limit reached, rejecting"
                    );
                    drop(stream);
                    continue;
                }
            };

            spawn_session(context.clone(), registry.clone(), stream, peer_addr, permit);
        }
    }
}

fn spawn_session(
    context: Arc<SessionContext>,
    registry: Arc<SessionRegistry>,
    stream: TcpStream,
    peer_addr: std::net::SocketAddr,
    permit: tokio::sync::OwnedSemaphorePermit,
) {
    let session_id = registry.register(peer_addr);

    tokio::spawn(async move {
        let _permit = permit;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(session_id = %session_id, error = %e, "set_nodelay failed");
        }
        let (read_half, write_half) = stream.into_split();
        run_session(
            context,
            registry.clone(),
            session_id.clone(),
            read_half,
            write_half,
        )
        .await;
        registry.remove(&session_id);
    });
}
