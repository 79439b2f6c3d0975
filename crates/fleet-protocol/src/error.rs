//! 协议层错误类型定义

use crate::command::CommandKind;
use thiserror::Error;

/// 协议层错误类型
///
/// 覆盖两类失败：
/// - 负载无法解析为任何已知消息（格式错误）
/// - 负载可以解析，但违反了 schema 约束（校验失败）
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// JSON 解析/序列化失败（字段缺失、未知 `type`、非对象负载等）
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// 命令的任务 ID 为空
    #[error("Empty task id in {kind:?} command")]
    EmptyTaskId { kind: CommandKind },

    /// 动作请求的动作名为空
    #[error("Empty action name for task {task_id}")]
    EmptyActionName { task_id: String },

    /// 机器人名称为空
    #[error("Robot name must not be empty")]
    EmptyRobotName,

    /// 地图名称为空
    #[error("Location map name must not be empty")]
    EmptyMapName,

    /// 坐标不是有限值（NaN 或无穷大）
    #[error("Location coordinate is not finite: {field}")]
    NonFiniteCoordinate { field: &'static str },

    /// 电量超出 [0.0, 1.0]
    #[error("Battery percent out of range [0.0, 1.0]: {value}")]
    BatteryOutOfRange { value: f64 },

    /// 任务历史超过上限
    #[error("Task history too long: {len} entries (max {max})")]
    TaskHistoryTooLong { len: usize, max: usize },

    /// 任务历史中存在重复 ID
    #[error("Duplicate task id in task history: {task_id}")]
    DuplicateTaskId { task_id: String },
}

impl ProtocolError {
    /// 是否为格式错误（负载形状不匹配任何消息）
    ///
    /// 格式错误之外的都是 schema 校验失败。
    pub fn is_malformed(&self) -> bool {
        matches!(self, ProtocolError::Malformed(_))
    }
}
