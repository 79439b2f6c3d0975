//! # Fleet Protocol
//!
//! 机器人与调度后端之间的消息协议定义（无传输依赖）
//!
//! ## 模块
//!
//! - `location`: 地图坐标与路径点
//! - `state`: 机器人状态快照（`RobotState`）及任务历史
//! - `command`: 后端下发的命令消息（`CommandMessage`）
//! - `codec`: JSON 编解码 + 校验
//!
//! ## 线格式
//!
//! 所有消息均为自描述的 JSON 对象（保留字段名）。命令消息带有 `type` 标签：
//!
//! ```text
//! {"type": "pause_request", "task_id": "t-1"}
//! ```
//!
//! 校验在编解码边界完成：不合法的状态不会被发布，不合法的命令不会被分发。

pub mod codec;
pub mod command;
mod error;
pub mod location;
pub mod state;

pub use codec::{decode_command, decode_state, encode_command, encode_state};
pub use command::{
    ActionParameters, ActionRequest, CommandKind, CommandMessage, NavigationRequest, ParamValue,
    PauseRequest, RelocalizeRequest, ResumeRequest,
};
pub use error::ProtocolError;
pub use location::{Location2D, Waypoint2D};
pub use state::{RobotState, RobotStatus, TaskHistory, validate_battery_percent};

/// 任务历史的最大长度（超过后淘汰最旧的任务 ID）
pub const TASK_HISTORY_LIMIT: usize = 10;

/// 电量百分比下限（含）
pub const BATTERY_PERCENT_MIN: f64 = 0.0;

/// 电量百分比上限（含）
pub const BATTERY_PERCENT_MAX: f64 = 1.0;
