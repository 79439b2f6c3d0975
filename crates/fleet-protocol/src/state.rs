//! 机器人状态快照定义
//!
//! `RobotState` 是发布到调度后端的聚合快照。每个发布周期都会重新构建，
//! 交给传输层之后不再原地修改。

use crate::location::Location2D;
use crate::{BATTERY_PERCENT_MAX, BATTERY_PERCENT_MIN, ProtocolError, TASK_HISTORY_LIMIT};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 机器人运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotStatus {
    /// 尚未得到任何有效采样
    #[default]
    Uninitialized,
    Offline,
    Shutdown,
    Idle,
    Charging,
    Working,
    Error,
}

/// 任务历史（有界、去重、保留插入顺序）
///
/// - 最多 [`TASK_HISTORY_LIMIT`] 条，超出时淘汰最旧的一条
/// - 插入已存在的 ID 不改变历史
///
/// 反序列化不做约束检查（线上收到的数据可能不合法），由 [`RobotState::validate`] 负责。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHistory(Vec<String>);

impl TaskHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录任务 ID
    ///
    /// # 返回
    /// - `true`: 新 ID 已追加
    /// - `false`: ID 已存在，历史不变
    pub fn push(&mut self, task_id: impl Into<String>) -> bool {
        let task_id = task_id.into();
        if self.contains(&task_id) {
            return false;
        }
        self.0.push(task_id);
        if self.0.len() > TASK_HISTORY_LIMIT {
            let overflow = self.0.len() - TASK_HISTORY_LIMIT;
            self.0.drain(..overflow);
        }
        true
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.0.iter().any(|id| id == task_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 从旧到新迭代
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.0.len() > TASK_HISTORY_LIMIT {
            return Err(ProtocolError::TaskHistoryTooLong {
                len: self.0.len(),
                max: TASK_HISTORY_LIMIT,
            });
        }
        let mut seen = HashSet::with_capacity(self.0.len());
        for id in &self.0 {
            if !seen.insert(id.as_str()) {
                return Err(ProtocolError::DuplicateTaskId {
                    task_id: id.clone(),
                });
            }
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for TaskHistory {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut history = TaskHistory::new();
        for id in iter {
            history.push(id);
        }
        history
    }
}

/// 机器人状态快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    /// 机器人标识
    pub name: String,
    #[serde(default)]
    pub status: RobotStatus,
    /// 当前任务 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_history: Option<TaskHistory>,
    /// 快照时间（Unix 纪元毫秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    /// 电量百分比，范围 [0.0, 1.0]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location2D>,
}

impl RobotState {
    /// 创建只有名称的空快照（状态为 `uninitialized`）
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: RobotStatus::Uninitialized,
            task_id: None,
            task_history: None,
            time: None,
            battery_percent: None,
            location: None,
        }
    }

    /// 按 schema 校验快照
    ///
    /// - 名称非空
    /// - 电量在 [0.0, 1.0] 内
    /// - 任务历史不超过上限且无重复
    /// - 位置的地图名非空
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.name.is_empty() {
            return Err(ProtocolError::EmptyRobotName);
        }
        if let Some(battery) = self.battery_percent {
            validate_battery_percent(battery)?;
        }
        if let Some(history) = &self.task_history {
            history.validate()?;
        }
        if let Some(location) = &self.location {
            location.validate()?;
        }
        Ok(())
    }
}

/// 校验电量读数
///
/// NaN 与区间外的值都会被拒绝。
pub fn validate_battery_percent(value: f64) -> Result<(), ProtocolError> {
    if (BATTERY_PERCENT_MIN..=BATTERY_PERCENT_MAX).contains(&value) {
        Ok(())
    } else {
        Err(ProtocolError::BatteryOutOfRange { value })
    }
}
