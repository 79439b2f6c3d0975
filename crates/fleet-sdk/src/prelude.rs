//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use fleet_sdk::prelude::*;
//! ```

// 客户端层
pub use fleet_client::{
    BatteryLevelProvider, ClientBuilder, ClientConfig, ClientState, CommandOutcome, CycleReport,
    ErrorReporter, FleetClient, Pose2D, PoseProvider, PublishOutcome, RunHandle, StateProvider,
    TaskTracker,
};

// 协议层
pub use fleet_protocol::{
    ActionRequest, CommandKind, CommandMessage, Location2D, NavigationRequest, ParamValue,
    RelocalizeRequest, RobotState, RobotStatus, Waypoint2D,
};

// 传输层（常用 Trait）
pub use fleet_transport::{LoopbackTransport, Transport};

// 错误类型
pub use fleet_client::{ClientError, ConfigError, SampleError};
pub use fleet_protocol::ProtocolError;
pub use fleet_transport::TransportError;
