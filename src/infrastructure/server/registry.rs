//! Session Registry - 在线连接登记表
//!
//! 记录每个活跃连接的元数据，给监听器提供并发视图，给日志提供
//! 会话标识。不持有任何合成状态。

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

/// 一个活跃连接
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub id: String,
    pub peer_addr: SocketAddr,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// 本连接已完成的合成请求数
    pub requests_served: u64,
}

/// 在线会话登记表
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 登记新连接，返回会话 ID
    pub fn register(&self, peer_addr: SocketAddr) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        self.sessions.insert(
            id.clone(),
            SessionEntry {
                id: id.clone(),
                peer_addr,
                connected_at: now,
                last_activity: now,
                requests_served: 0,
            },
        );
        tracing::info!(session_id = %id, peer = %peer_addr, "Session registered");
        id
    }

    /// 刷新活跃时间
    pub fn touch(&self, id: &str) {
        if let Some(mut entry) = self.sessions.get_mut(id) {
            entry.last_activity = Utc::now();
        }
    }

    /// 记录一次完成的请求
    pub fn record_request(&self, id: &str) {
        if let Some(mut entry) = self.sessions.get_mut(id) {
            entry.requests_served += 1;
            entry.last_activity = Utc::now();
        }
    }

    /// 注销连接
    pub fn remove(&self, id: &str) {
        if let Some((_, entry)) = self.sessions.remove(id) {
            tracing::info!(
                session_id = %id,
                peer = %entry.peer_addr,
                requests_served = entry.requests_served,
                "Session removed"
            );
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn get(&self, id: &str) -> Option<SessionEntry> {
        self.sessions.get(id).map(|e| e.clone())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_session_lifecycle() {
        let registry = SessionRegistry::new();
        let id = registry.register(addr());

        assert_eq!(registry.count(), 1);
        assert!(registry.get(&id).is_some());

        registry.record_request(&id);
        registry.record_request(&id);
        assert_eq!(registry.get(&id).unwrap().requests_served, 2);

        registry.remove(&id);
        assert_eq!(registry.count(), 0);
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn test_touch_updates_activity() {
        let registry = SessionRegistry::new();
        let id = registry.register(addr());
        let before = registry.get(&id).unwrap().last_activity;

        registry.touch(&id);
        assert!(registry.get(&id).unwrap().last_activity >= before);
    }
}
