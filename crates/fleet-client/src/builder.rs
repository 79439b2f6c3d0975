//! Builder 模式实现
//!
//! 提供链式构造 [`FleetClient`] 的便捷方式。

use crate::client::FleetClient;
use crate::metrics::ClientMetrics;
use crate::reporter::{SharedReporter, default_reporter};
use crate::tasks::TaskTracker;
use crate::{ClientConfig, ClientError};
use fleet_transport::Transport;
use std::sync::Arc;
use std::time::Duration;

/// FleetClient Builder（链式构造）
///
/// # Example
///
/// ```rust
/// use fleet_client::ClientBuilder;
/// use fleet_transport::LoopbackTransport;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let client = ClientBuilder::new("tinyRobot1")
///     .transport(Arc::new(LoopbackTransport::threaded()))
///     .publish_interval(Duration::from_millis(500))
///     .state_topic("robot_state")
///     .build()
///     .unwrap();
/// assert_eq!(client.state_topic(), "robot_state");
/// assert_eq!(client.command_topic(), "fleet/tinyRobot1/command");
/// ```
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    reporter: Option<SharedReporter>,
    tasks: Option<TaskTracker>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl ClientBuilder {
    /// 创建新的 Builder
    pub fn new(robot_name: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(robot_name))
    }

    /// 从配置创建 Builder
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            reporter: None,
            tasks: None,
            metrics: None,
        }
    }

    /// 设置传输层
    pub fn transport<T: Transport + 'static>(mut self, transport: Arc<T>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// 设置已类型擦除的传输层
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// 设置状态主题（默认 `fleet/<robot_name>/state`）
    pub fn state_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.state_topic = topic.into();
        self
    }

    /// 设置命令主题（默认 `fleet/<robot_name>/command`）
    pub fn command_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.command_topic = topic.into();
        self
    }

    /// 设置发布周期（按毫秒截断）
    pub fn publish_interval(mut self, interval: Duration) -> Self {
        self.config.publish_interval_ms = interval.as_millis() as u64;
        self
    }

    /// 设置上报器（默认转发到 tracing）
    pub fn reporter(mut self, reporter: SharedReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// 共享外部的任务跟踪器
    pub fn task_tracker(mut self, tasks: TaskTracker) -> Self {
        self.tasks = Some(tasks);
        self
    }

    /// 共享外部的指标实例
    pub fn metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 构建客户端
    ///
    /// # 错误
    /// - `ClientError::InvalidConfig`: 名称为空或发布周期为 0
    /// - `ClientError::MissingTransport`: 未设置传输层
    pub fn build(self) -> Result<FleetClient, ClientError> {
        self.config.validate()?;
        let transport = self.transport.ok_or(ClientError::MissingTransport)?;
        Ok(FleetClient::from_parts(
            self.config,
            transport,
            self.reporter.unwrap_or_else(default_reporter),
            self.tasks.unwrap_or_default(),
            self.metrics.unwrap_or_default(),
        ))
    }
}
