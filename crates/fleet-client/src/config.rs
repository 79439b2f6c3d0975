//! 客户端配置

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认发布周期（毫秒）
pub const DEFAULT_PUBLISH_INTERVAL_MS: u64 = 1000;

/// 客户端配置
///
/// 主题留空时按机器人名称生成：`fleet/<robot_name>/state`、`fleet/<robot_name>/command`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 机器人标识（快照的 `name` 字段）
    pub robot_name: String,
    /// 状态发布主题
    pub state_topic: String,
    /// 命令订阅主题
    pub command_topic: String,
    /// 发布周期（毫秒）
    pub publish_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            robot_name: String::new(),
            state_topic: String::new(),
            command_topic: String::new(),
            publish_interval_ms: DEFAULT_PUBLISH_INTERVAL_MS,
        }
    }
}

impl ClientConfig {
    pub fn new(robot_name: impl Into<String>) -> Self {
        Self {
            robot_name: robot_name.into(),
            ..Self::default()
        }
    }

    /// 实际使用的状态主题
    pub fn resolved_state_topic(&self) -> String {
        if self.state_topic.is_empty() {
            format!("fleet/{}/state", self.robot_name)
        } else {
            self.state_topic.clone()
        }
    }

    /// 实际使用的命令主题
    pub fn resolved_command_topic(&self) -> String {
        if self.command_topic.is_empty() {
            format!("fleet/{}/command", self.robot_name)
        } else {
            self.command_topic.clone()
        }
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    /// 校验配置
    ///
    /// # 错误
    /// - `ConfigError::EmptyRobotName`: 名称为空（或只有空白）
    /// - `ConfigError::ZeroInterval`: 发布周期为 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.robot_name.trim().is_empty() {
            return Err(ConfigError::EmptyRobotName);
        }
        if self.publish_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "publish_interval_ms",
            });
        }
        Ok(())
    }
}
