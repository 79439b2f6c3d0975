//! # Fleet Client
//!
//! 机器人侧的调度客户端：周期采样内部状态、发布状态快照、接收并分发后端命令。
//!
//! ## 模块
//!
//! - `provider`: 状态提供者框架（值槽、位姿、电量）
//! - `dispatch`: 命令分发表
//! - `tasks`: 任务与状态跟踪
//! - `client`: 编排器（`FleetClient`）与运行循环
//! - `builder`: 链式构造
//! - `config`: 客户端配置
//! - `metrics`: 原子计数器
//! - `reporter`: 错误上报协作方
//!
//! ## 错误处理
//!
//! 单周期内的失败（采样失败、快照校验失败、发布失败、格式错误的命令）
//! 只会上报并计数，不会中断运行循环。只有显式 `stop()` 或传输层关闭会结束客户端。

mod builder;
mod client;
mod config;
pub mod dispatch;
mod error;
mod metrics;
pub mod provider;
pub mod reporter;
mod tasks;

pub use builder::ClientBuilder;
pub use client::{ClientState, CycleReport, FleetClient, PublishOutcome, RunHandle};
pub use config::{ClientConfig, DEFAULT_PUBLISH_INTERVAL_MS};
pub use dispatch::{CommandDispatcher, CommandHandler, CommandOutcome};
pub use error::{ClientError, ConfigError, SampleError};
pub use metrics::{ClientMetrics, MetricsSnapshot};
pub use provider::{
    BATTERY_PROVIDER_NAME, BatteryLevelProvider, BatteryTelemetry, POSE_PROVIDER_NAME, Pose2D,
    PoseProvider, StateProvider, StateSlot, TransformLookup,
};
pub use reporter::{ErrorReporter, RecordingReporter, SharedReporter, TracingReporter};
pub use tasks::TaskTracker;
