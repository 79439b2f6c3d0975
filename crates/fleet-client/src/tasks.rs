//! 任务与状态跟踪
//!
//! [`TaskTracker`] 是可克隆的共享句柄：客户端在组装快照时读取，
//! 命令处理函数在开始/结束任务时写入。

use fleet_protocol::{RobotState, RobotStatus, TaskHistory};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct TaskState {
    status: RobotStatus,
    /// 状态是否被显式设置过（显式设置后不再自动提升）
    status_explicit: bool,
    current_task: Option<String>,
    history: TaskHistory,
}

/// 任务跟踪器
///
/// # 线程安全
///
/// 内部使用 `parking_lot::RwLock`，克隆的句柄共享同一份状态。
///
/// # 示例
///
/// ```rust
/// use fleet_client::TaskTracker;
/// use fleet_protocol::RobotStatus;
///
/// let tasks = TaskTracker::new();
/// tasks.begin_task("t-1");
/// tasks.set_status(RobotStatus::Working);
/// assert_eq!(tasks.current_task().as_deref(), Some("t-1"));
///
/// assert_eq!(tasks.finish_task().as_deref(), Some("t-1"));
/// assert!(tasks.history().contains("t-1"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TaskTracker {
    inner: Arc<RwLock<TaskState>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 显式设置机器人状态
    pub fn set_status(&self, status: RobotStatus) {
        let mut state = self.inner.write();
        state.status = status;
        state.status_explicit = true;
    }

    pub fn status(&self) -> RobotStatus {
        self.inner.read().status
    }

    /// 开始任务：设为当前任务并记入历史
    ///
    /// # 返回
    /// 任务 ID 是否是第一次进入历史
    pub fn begin_task(&self, task_id: impl Into<String>) -> bool {
        let task_id = task_id.into();
        let mut state = self.inner.write();
        let inserted = state.history.push(task_id.clone());
        debug!(task_id = %task_id, inserted, "Task started");
        state.current_task = Some(task_id);
        inserted
    }

    /// 结束当前任务，返回被结束的任务 ID
    pub fn finish_task(&self) -> Option<String> {
        self.inner.write().current_task.take()
    }

    pub fn current_task(&self) -> Option<String> {
        self.inner.read().current_task.clone()
    }

    pub fn history(&self) -> TaskHistory {
        self.inner.read().history.clone()
    }

    /// 首次拿到提供者数据时把 `Uninitialized` 提升为 `Idle`
    ///
    /// 状态被显式设置过时不做任何改变。
    pub(crate) fn promote_if_uninitialized(&self) -> bool {
        let mut state = self.inner.write();
        if state.status == RobotStatus::Uninitialized && !state.status_explicit {
            state.status = RobotStatus::Idle;
            true
        } else {
            false
        }
    }

    /// 把状态/任务元数据写入快照
    pub(crate) fn fill(&self, snapshot: &mut RobotState) {
        let state = self.inner.read();
        snapshot.status = state.status;
        snapshot.task_id = state.current_task.clone();
        snapshot.task_history = if state.history.is_empty() {
            None
        } else {
            Some(state.history.clone())
        };
    }
}
