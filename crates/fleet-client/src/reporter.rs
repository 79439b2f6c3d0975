//! 错误上报
//!
//! 采样失败、格式错误的命令、发布失败等单周期错误不会中断运行循环，
//! 而是以 `(组件, 消息)` 的形式交给 [`ErrorReporter`]。

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// 错误上报 Trait
///
/// 实现必须快速返回：上报可能发生在采样线程或传输层的投递路径上。
pub trait ErrorReporter: Send + Sync {
    fn report(&self, component: &str, message: &str);
}

/// 闭包形式的上报器
impl<F> ErrorReporter for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn report(&self, component: &str, message: &str) {
        self(component, message)
    }
}

/// 共享的上报器句柄
pub type SharedReporter = Arc<dyn ErrorReporter>;

/// 默认上报器：转发到 `tracing::warn!`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, component: &str, message: &str) {
        warn!(component, "{}", message);
    }
}

/// 记录所有上报内容的上报器（测试和诊断用）
#[derive(Debug, Default)]
pub struct RecordingReporter {
    entries: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有上报记录（按时间顺序）
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().clone()
    }

    /// 某组件的上报次数
    pub fn count_for(&self, component: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(c, _)| c == component)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, component: &str, message: &str) {
        self.entries
            .lock()
            .push((component.to_string(), message.to_string()));
    }
}

/// 默认的共享上报器
pub fn default_reporter() -> SharedReporter {
    Arc::new(TracingReporter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_reporter() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let reporter: SharedReporter = Arc::new(move |component: &str, _message: &str| {
            assert_eq!(component, "pose");
            count_clone.fetch_add(1, Ordering::Relaxed);
        });

        reporter.report("pose", "lookup failed");
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_recording_reporter() {
        let reporter = RecordingReporter::new();
        assert!(reporter.is_empty());

        reporter.report("battery", "telemetry unavailable");
        reporter.report("command", "malformed payload");
        reporter.report("battery", "telemetry unavailable");

        assert_eq!(reporter.len(), 3);
        assert_eq!(reporter.count_for("battery"), 2);
        assert_eq!(reporter.entries()[1].0, "command");
    }

    #[test]
    fn test_tracing_reporter_does_not_panic() {
        // 未安装 subscriber 时也应安全
        TracingReporter.report("transport", "send failed");
    }
}
