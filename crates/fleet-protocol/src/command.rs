//! 命令消息定义
//!
//! 后端下发的每一条命令都携带任务 ID（用于关联一次工作单元）。
//! 线格式为带 `type` 标签的 JSON 对象：
//!
//! | type | 附加字段 |
//! |------|----------|
//! | `pause_request` | - |
//! | `resume_request` | - |
//! | `navigation_request` | `path`（可选路径点列表） |
//! | `relocalize_request` | `location`（可选） |
//! | `action_request` | `action_name`，`parameters`（可选） |

use crate::ProtocolError;
use crate::location::{Location2D, Waypoint2D};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 命令类别（用于分发表的键）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandKind {
    Pause,
    Resume,
    Navigation,
    Relocalize,
    Action,
}

impl CommandKind {
    /// 所有命令类别
    pub const ALL: [CommandKind; 5] = [
        CommandKind::Pause,
        CommandKind::Resume,
        CommandKind::Navigation,
        CommandKind::Relocalize,
        CommandKind::Action,
    ];

    /// 线格式中的 `type` 标签
    pub fn wire_tag(self) -> &'static str {
        match self {
            CommandKind::Pause => "pause_request",
            CommandKind::Resume => "resume_request",
            CommandKind::Navigation => "navigation_request",
            CommandKind::Relocalize => "relocalize_request",
            CommandKind::Action => "action_request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseRequest {
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRequest {
    pub task_id: String,
}

/// 导航请求
///
/// `path` 按 `index` 顺序遍历；为空时由机器人侧决定目标（例如沿用已下发的任务）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationRequest {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Waypoint2D>,
}

/// 重定位请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelocalizeRequest {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location2D>,
}

/// 动作参数值（仅限基本类型）
///
/// 嵌套的数组/对象不被接受，整条命令按格式错误处理。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// 动作参数：按键排序的 名称 → 基本值 映射
pub type ActionParameters = BTreeMap<String, ParamValue>;

/// 自定义动作请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub task_id: String,
    pub action_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: ActionParameters,
}

impl ActionRequest {
    pub fn new(task_id: impl Into<String>, action_name: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            action_name: action_name.into(),
            parameters: ActionParameters::new(),
        }
    }

    /// 添加一个参数
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// 后端下发的命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandMessage {
    PauseRequest(PauseRequest),
    ResumeRequest(ResumeRequest),
    NavigationRequest(NavigationRequest),
    RelocalizeRequest(RelocalizeRequest),
    ActionRequest(ActionRequest),
}

impl CommandMessage {
    pub fn pause(task_id: impl Into<String>) -> Self {
        CommandMessage::PauseRequest(PauseRequest {
            task_id: task_id.into(),
        })
    }

    pub fn resume(task_id: impl Into<String>) -> Self {
        CommandMessage::ResumeRequest(ResumeRequest {
            task_id: task_id.into(),
        })
    }

    pub fn navigate(task_id: impl Into<String>, path: Vec<Waypoint2D>) -> Self {
        CommandMessage::NavigationRequest(NavigationRequest {
            task_id: task_id.into(),
            path,
        })
    }

    pub fn relocalize(task_id: impl Into<String>, location: Option<Location2D>) -> Self {
        CommandMessage::RelocalizeRequest(RelocalizeRequest {
            task_id: task_id.into(),
            location,
        })
    }

    pub fn action(task_id: impl Into<String>, action_name: impl Into<String>) -> Self {
        CommandMessage::ActionRequest(ActionRequest::new(task_id, action_name))
    }

    /// 命令类别
    pub fn kind(&self) -> CommandKind {
        match self {
            CommandMessage::PauseRequest(_) => CommandKind::Pause,
            CommandMessage::ResumeRequest(_) => CommandKind::Resume,
            CommandMessage::NavigationRequest(_) => CommandKind::Navigation,
            CommandMessage::RelocalizeRequest(_) => CommandKind::Relocalize,
            CommandMessage::ActionRequest(_) => CommandKind::Action,
        }
    }

    /// 任务 ID
    pub fn task_id(&self) -> &str {
        match self {
            CommandMessage::PauseRequest(r) => &r.task_id,
            CommandMessage::ResumeRequest(r) => &r.task_id,
            CommandMessage::NavigationRequest(r) => &r.task_id,
            CommandMessage::RelocalizeRequest(r) => &r.task_id,
            CommandMessage::ActionRequest(r) => &r.task_id,
        }
    }

    /// 动作名（仅 `ActionRequest` 有）
    pub fn action_name(&self) -> Option<&str> {
        match self {
            CommandMessage::ActionRequest(r) => Some(&r.action_name),
            _ => None,
        }
    }

    /// 分发前校验
    ///
    /// - 任务 ID 不能为空（纯空白也视为空）
    /// - 动作名不能为空
    /// - 携带的位置/路径点必须合法
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.task_id().trim().is_empty() {
            return Err(ProtocolError::EmptyTaskId { kind: self.kind() });
        }
        match self {
            CommandMessage::NavigationRequest(r) => {
                for waypoint in &r.path {
                    waypoint.validate()?;
                }
            },
            CommandMessage::RelocalizeRequest(r) => {
                if let Some(location) = &r.location {
                    location.validate()?;
                }
            },
            CommandMessage::ActionRequest(r) => {
                if r.action_name.trim().is_empty() {
                    return Err(ProtocolError::EmptyActionName {
                        task_id: r.task_id.clone(),
                    });
                }
            },
            CommandMessage::PauseRequest(_) | CommandMessage::ResumeRequest(_) => {},
        }
        Ok(())
    }
}
