//! Fleet SDK - 机器人侧调度桥接
//!
//! 在机器人上周期采样内部状态（位姿、电量、任务进度），以结构化快照发布给调度后端，
//! 并接收后端下发的命令（暂停、恢复、导航、重定位、自定义动作）分发给机器人控制逻辑。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 状态快照与命令的 schema、校验、JSON 编解码
//! - **传输层** (`transport`): 与后端无关的发布/订阅抽象，附带进程内回环实现
//! - **客户端层** (`client`): 状态提供者、命令分发、运行循环
//!
//! # 快速开始
//!
//! ```rust
//! use fleet_sdk::prelude::*;
//! use std::sync::Arc;
//!
//! let transport = Arc::new(LoopbackTransport::inline());
//! let client = FleetClient::builder("tinyRobot1")
//!     .transport(transport.clone())
//!     .build()
//!     .unwrap();
//!
//! let battery = Arc::new(BatteryLevelProvider::from_fn(|| Ok(0.42)));
//! client.register_provider(battery).unwrap();
//! client.on_pause(|task_id| println!("Pausing task {}", task_id));
//!
//! assert!(client.run_once().unwrap().published());
//! ```

pub use fleet_client as client;
pub use fleet_protocol as protocol;
pub use fleet_transport as transport;

mod logging;
pub mod prelude;

pub use logging::{LoggingError, init_logging};

// --- 用户以此为界 ---
// 常用类型的 Facade

pub use fleet_client::{
    BatteryLevelProvider, ClientBuilder, ClientConfig, ClientError, ClientState, ConfigError,
    CycleReport, FleetClient, Pose2D, PoseProvider, PublishOutcome, RunHandle, SampleError,
    StateProvider, TaskTracker,
};
pub use fleet_protocol::{CommandKind, CommandMessage, ProtocolError, RobotState, RobotStatus};
pub use fleet_transport::{LoopbackTransport, Transport, TransportError};
