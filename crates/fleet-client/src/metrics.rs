//! 客户端运行指标
//!
//! 原子计数器，可以在任意线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 客户端实时指标
///
/// # 使用示例
///
/// ```rust
/// use fleet_client::ClientMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = ClientMetrics::new();
/// metrics.publish_ok.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.publish_ok, 1);
/// ```
#[derive(Debug, Default)]
pub struct ClientMetrics {
    /// 发布成功的状态快照数
    pub publish_ok: AtomicU64,

    /// 发布失败次数（传输层返回错误）
    pub publish_failures: AtomicU64,

    /// 未通过校验、未被发布的状态快照数
    pub invalid_states: AtomicU64,

    /// 采样成功次数
    pub samples_ok: AtomicU64,

    /// 采样失败次数（保留旧值）
    pub sample_failures: AtomicU64,

    /// 已分发给处理函数的命令数
    pub commands_dispatched: AtomicU64,

    /// 因格式错误或任务 ID 为空而丢弃的命令数
    pub commands_rejected: AtomicU64,

    /// 合法但没有注册处理函数的命令数
    pub commands_unhandled: AtomicU64,
}

impl ClientMetrics {
    /// 创建新的指标实例（所有计数器初始化为 0）
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    ///
    /// 各计数器单独读取，之间可能存在微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            publish_ok: self.publish_ok.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            invalid_states: self.invalid_states.load(Ordering::Relaxed),
            samples_ok: self.samples_ok.load(Ordering::Relaxed),
            sample_failures: self.sample_failures.load(Ordering::Relaxed),
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
            commands_rejected: self.commands_rejected.load(Ordering::Relaxed),
            commands_unhandled: self.commands_unhandled.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.publish_ok.store(0, Ordering::Relaxed);
        self.publish_failures.store(0, Ordering::Relaxed);
        self.invalid_states.store(0, Ordering::Relaxed);
        self.samples_ok.store(0, Ordering::Relaxed);
        self.sample_failures.store(0, Ordering::Relaxed);
        self.commands_dispatched.store(0, Ordering::Relaxed);
        self.commands_rejected.store(0, Ordering::Relaxed);
        self.commands_unhandled.store(0, Ordering::Relaxed);
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub publish_ok: u64,
    pub publish_failures: u64,
    pub invalid_states: u64,
    pub samples_ok: u64,
    pub sample_failures: u64,
    pub commands_dispatched: u64,
    pub commands_rejected: u64,
    pub commands_unhandled: u64,
}

impl MetricsSnapshot {
    /// 发布成功率（百分比，0-100）
    ///
    /// 尚未发布过时返回 100。
    pub fn publish_success_rate(&self) -> f64 {
        let total = self.publish_ok + self.publish_failures;
        if total == 0 {
            return 100.0;
        }
        (self.publish_ok as f64 / total as f64) * 100.0
    }

    /// 收到的命令总数
    pub fn commands_received(&self) -> u64 {
        self.commands_dispatched + self.commands_rejected + self.commands_unhandled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot_and_reset() {
        let metrics = ClientMetrics::new();
        ClientMetrics::incr(&metrics.publish_ok);
        ClientMetrics::incr(&metrics.publish_ok);
        ClientMetrics::incr(&metrics.publish_failures);
        ClientMetrics::incr(&metrics.commands_rejected);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.publish_ok, 2);
        assert_eq!(snapshot.publish_failures, 1);
        assert_eq!(snapshot.commands_received(), 1);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_publish_success_rate() {
        assert_eq!(MetricsSnapshot::default().publish_success_rate(), 100.0);

        let snapshot = MetricsSnapshot {
            publish_ok: 3,
            publish_failures: 1,
            ..Default::default()
        };
        assert!((snapshot.publish_success_rate() - 75.0).abs() < 1e-9);
    }
}
