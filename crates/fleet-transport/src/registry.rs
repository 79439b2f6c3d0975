//! 订阅注册表
//!
//! 实例级的 主题 → 订阅 映射，供具体后端复用。每个主题只保留最后一次注册，
//! 注册被替换或清空后，旧回调不会再被查到。

use crate::MessageCallback;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// 订阅句柄 ID（单调递增，用于区分同一主题的先后注册）
pub type SubscriptionId = u64;

/// 一次订阅注册
#[derive(Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub topic: String,
    pub callback: MessageCallback,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

/// 订阅注册表
///
/// # 线程安全
///
/// 内部使用 `parking_lot::RwLock`。查找回调时只克隆 `Arc` 并立即释放锁，
/// 回调本身在锁外执行，因此回调里再次订阅/关闭不会死锁。
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<String, Subscription>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册订阅（替换同主题的旧订阅）
    ///
    /// # 返回
    /// `(新句柄 ID, 被替换的旧订阅)`
    pub fn register(
        &self,
        topic: &str,
        callback: MessageCallback,
    ) -> (SubscriptionId, Option<Subscription>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let subscription = Subscription {
            id,
            topic: topic.to_string(),
            callback,
        };
        let previous = self.entries.write().insert(topic.to_string(), subscription);
        (id, previous)
    }

    /// 移除主题的订阅
    pub fn remove(&self, topic: &str) -> Option<Subscription> {
        self.entries.write().remove(topic)
    }

    /// 查找主题当前的回调
    pub fn callback(&self, topic: &str) -> Option<MessageCallback> {
        self.entries
            .read()
            .get(topic)
            .map(|subscription| subscription.callback.clone())
    }

    /// 查找主题当前的订阅
    pub fn get(&self, topic: &str) -> Option<Subscription> {
        self.entries.read().get(topic).cloned()
    }

    /// 清空所有订阅，返回被释放的数量
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// 当前已订阅的主题（排序后）
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.entries.read().keys().cloned().collect();
        topics.sort();
        topics
    }
}
