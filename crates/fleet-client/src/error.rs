//! 客户端层错误类型定义

use fleet_transport::TransportError;
use std::path::PathBuf;
use thiserror::Error;

/// 采样错误
///
/// 由采集协作方（位姿查询、电量遥测）返回。采样失败只影响当前周期：
/// 提供者保留旧值并上报，不会向调用方传播。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    /// 坐标变换无法解析
    #[error("Could not transform {source_frame} to {target_frame}: {reason}")]
    TransformUnavailable {
        source_frame: String,
        target_frame: String,
        reason: String,
    },

    /// 遥测数据不可用
    #[error("Telemetry unavailable: {0}")]
    TelemetryUnavailable(String),

    /// 读数被提供者拒绝（空值或超出范围）
    #[error("Provider {provider} rejected reading: {reason}")]
    Rejected { provider: String, reason: String },
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 机器人名称为空
    #[error("Robot name must not be empty")]
    EmptyRobotName,

    /// 周期为 0
    #[error("Interval {field} must be greater than zero")]
    ZeroInterval { field: &'static str },

    /// 坐标系名称为空
    #[error("Frame {field} must not be empty")]
    EmptyFrame { field: &'static str },

    /// 数值超出允许范围
    #[error("Value {value} of {field} is out of range")]
    OutOfRange { field: &'static str, value: f64 },

    /// 配置文件读取失败
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件解析失败
    #[error("Failed to parse config: {0}")]
    Parse(String),
}

/// 客户端错误
#[derive(Error, Debug)]
pub enum ClientError {
    /// 配置不合法
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// 构造时未提供传输层
    #[error("No transport configured")]
    MissingTransport,

    /// 同名提供者已注册
    #[error("State provider {name:?} is already registered")]
    DuplicateProvider { name: String },

    /// 客户端已在运行
    #[error("Client is already running")]
    AlreadyRunning,

    /// 客户端已停止（终态，不能重新启动）
    #[error("Client has been stopped")]
    AlreadyStopped,

    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 后台线程创建失败
    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// 判断是否为致命错误（客户端已无法继续运行）
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::AlreadyStopped => true,
            ClientError::Transport(e) => e.is_fatal(),
            ClientError::Spawn { .. } => true,
            _ => false,
        }
    }
}
