//! 客户端编排
//!
//! [`FleetClient`] 拥有传输层、状态提供者注册表和命令分发表：
//!
//! - 发布方向：按发布周期读取所有提供者的当前值，组装 [`RobotState`]，
//!   校验、序列化后发布到状态主题
//! - 订阅方向：启动时订阅一次命令主题，解码、校验后分发给对应的处理函数
//!
//! # 生命周期
//!
//! ```text
//! Created ──run()/run_async()──▶ Running ──stop() / 传输层关闭──▶ Stopped（终态）
//!    └──────────────────────stop()───────────────────────────────▶ Stopped
//! ```
//!
//! # 线程模型
//!
//! - 每个提供者一个采样线程，各自按提供者的周期采样
//! - 一个发布线程，按发布周期组装并发布快照
//! - 命令处理函数在传输层的投递路径上执行
//!
//! 所有循环都等待同一个 crossbeam 关闭通道，`stop()` 丢弃发送端即可唤醒全部线程。

use crate::dispatch::{
    CommandDispatcher, CommandHandler, CommandOutcome, action_handler, navigation_handler,
    pause_handler, relocalize_handler, resume_handler,
};
use crate::metrics::ClientMetrics;
use crate::provider::{ProviderEntry, StateProvider};
use crate::reporter::SharedReporter;
use crate::tasks::TaskTracker;
use crate::{ClientConfig, ClientError};
use arc_swap::ArcSwapOption;
use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use fleet_protocol::{
    ActionRequest, CommandKind, NavigationRequest, RelocalizeRequest, RobotState, decode_command,
    encode_state,
};
use fleet_transport::{Transport, TransportError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

/// 采样线程的最小等待间隔（避免 0 周期空转）
const MIN_LOOP_INTERVAL: Duration = Duration::from_millis(1);

/// 上报时使用的组件名
const COMPONENT_STATE: &str = "state";
const COMPONENT_TRANSPORT: &str = "transport";
const COMPONENT_COMMAND: &str = "command";

/// 客户端状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// 已创建，尚未运行
    Created,
    /// 后台循环运行中
    Running,
    /// 已停止（终态）
    Stopped,
}

/// 单次发布的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// 快照未通过校验，没有发布
    InvalidState,
    /// 传输层返回错误
    Failed(TransportError),
}

/// `run_once()` 的周期报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub samples_attempted: usize,
    pub samples_failed: usize,
    pub publish: PublishOutcome,
}

impl CycleReport {
    pub fn published(&self) -> bool {
        self.publish == PublishOutcome::Published
    }
}

struct Lifecycle {
    state: ClientState,
    /// 关闭信号：丢弃即通知所有循环退出
    shutdown_tx: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
    /// 导致终止的传输层错误（显式停止时为 None）
    failure: Option<TransportError>,
}

pub(crate) struct ClientInner {
    config: ClientConfig,
    state_topic: String,
    command_topic: String,
    transport: Arc<dyn Transport>,
    providers: RwLock<Vec<ProviderEntry>>,
    dispatcher: CommandDispatcher,
    tasks: TaskTracker,
    reporter: SharedReporter,
    metrics: Arc<ClientMetrics>,
    last_published: ArcSwapOption<RobotState>,
    lifecycle: Mutex<Lifecycle>,
}

/// 调度客户端
///
/// # 示例
///
/// ```rust
/// use fleet_client::{BatteryLevelProvider, FleetClient};
/// use fleet_transport::LoopbackTransport;
/// use std::sync::Arc;
///
/// let transport = Arc::new(LoopbackTransport::inline());
/// let client = FleetClient::builder("r1")
///     .transport(transport.clone())
///     .build()
///     .unwrap();
///
/// client
///     .register_provider(Arc::new(BatteryLevelProvider::from_fn(|| Ok(0.8))))
///     .unwrap();
/// client.on_pause(|task_id| println!("pause {}", task_id));
///
/// let report = client.run_once().unwrap();
/// assert!(report.published());
/// assert_eq!(transport.published("fleet/r1/state").len(), 1);
/// ```
pub struct FleetClient {
    inner: Arc<ClientInner>,
}

impl FleetClient {
    /// 创建构造器
    pub fn builder(robot_name: impl Into<String>) -> crate::ClientBuilder {
        crate::ClientBuilder::new(robot_name)
    }

    pub(crate) fn from_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        reporter: SharedReporter,
        tasks: TaskTracker,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        let state_topic = config.resolved_state_topic();
        let command_topic = config.resolved_command_topic();
        Self {
            inner: Arc::new(ClientInner {
                config,
                state_topic,
                command_topic,
                transport,
                providers: RwLock::new(Vec::new()),
                dispatcher: CommandDispatcher::new(),
                tasks,
                reporter,
                metrics,
                last_published: ArcSwapOption::empty(),
                lifecycle: Mutex::new(Lifecycle {
                    state: ClientState::Created,
                    shutdown_tx: None,
                    workers: Vec::new(),
                    failure: None,
                }),
            }),
        }
    }

    /// 注册状态提供者
    ///
    /// 必须在 `run()`/`run_async()` 之前注册，采样线程在启动时创建。
    ///
    /// # 错误
    /// - `ClientError::DuplicateProvider`: 同名提供者已存在
    /// - `ClientError::AlreadyRunning` / `ClientError::AlreadyStopped`: 客户端已启动
    pub fn register_provider<P: StateProvider>(&self, provider: Arc<P>) -> Result<(), ClientError> {
        // 持有生命周期锁直到写入完成，与 start() 互斥
        let lifecycle = self.inner.lifecycle.lock();
        ClientInner::check_created(&lifecycle)?;
        let entry = ProviderEntry::new(provider);
        let mut providers = self.inner.providers.write();
        if providers.iter().any(|existing| existing.name == entry.name) {
            return Err(ClientError::DuplicateProvider { name: entry.name });
        }
        debug!(provider = %entry.name, interval = ?entry.interval, "State provider registered");
        providers.push(entry);
        Ok(())
    }

    /// 已注册的提供者名称（按注册顺序）
    pub fn provider_names(&self) -> Vec<String> {
        self.inner
            .providers
            .read()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// 注册命令处理函数（替换同类别的旧处理函数）
    pub fn on_command(&self, kind: CommandKind, handler: CommandHandler) -> Option<CommandHandler> {
        self.inner.dispatcher.register(kind, handler)
    }

    pub fn on_pause<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_command(CommandKind::Pause, pause_handler(f));
    }

    pub fn on_resume<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_command(CommandKind::Resume, resume_handler(f));
    }

    pub fn on_navigate<F>(&self, f: F)
    where
        F: Fn(&NavigationRequest) + Send + Sync + 'static,
    {
        self.on_command(CommandKind::Navigation, navigation_handler(f));
    }

    pub fn on_relocalize<F>(&self, f: F)
    where
        F: Fn(&RelocalizeRequest) + Send + Sync + 'static,
    {
        self.on_command(CommandKind::Relocalize, relocalize_handler(f));
    }

    pub fn on_action<F>(&self, f: F)
    where
        F: Fn(&ActionRequest) + Send + Sync + 'static,
    {
        self.on_command(CommandKind::Action, action_handler(f));
    }

    /// 处理一条入站命令负载（订阅回调走的也是这条路径）
    pub fn handle_command_payload(&self, payload: &[u8]) -> CommandOutcome {
        self.inner.handle_command_payload(payload)
    }

    /// 用所有提供者的当前值组装一份快照（不采样、不发布）
    ///
    /// 只读：不会把 `Uninitialized` 提升为 `Idle`，提升只在发布时发生。
    pub fn snapshot(&self) -> RobotState {
        self.inner.build_snapshot(false)
    }

    /// 同步执行一次 采样 + 发布
    ///
    /// 单周期内的失败记录在 [`CycleReport`] 中，不作为错误返回。
    ///
    /// # 错误
    /// - `ClientError::AlreadyStopped`: 客户端已停止
    pub fn run_once(&self) -> Result<CycleReport, ClientError> {
        self.inner.run_once()
    }

    /// 启动后台循环并立即返回
    ///
    /// # 错误
    /// - `ClientError::AlreadyRunning`: 已在运行
    /// - `ClientError::AlreadyStopped`: 已停止，不能重新启动
    /// - `ClientError::Transport`: 订阅命令主题失败
    pub fn run_async(&self) -> Result<RunHandle, ClientError> {
        ClientInner::start(&self.inner)
    }

    /// 运行直到 `stop()` 或传输层不可恢复地关闭
    ///
    /// # 错误
    /// 除启动错误外，因传输层关闭而终止时返回 `ClientError::Transport`
    pub fn run(&self) -> Result<(), ClientError> {
        self.run_async()?.wait()
    }

    /// 停止客户端（幂等）
    ///
    /// 通知所有循环退出、等待线程结束、关闭传输层。
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn state(&self) -> ClientState {
        self.inner.lifecycle.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == ClientState::Running
    }

    pub fn tasks(&self) -> &TaskTracker {
        &self.inner.tasks
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.inner.metrics
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn state_topic(&self) -> &str {
        &self.inner.state_topic
    }

    pub fn command_topic(&self) -> &str {
        &self.inner.command_topic
    }

    /// 最近一次成功发布的快照
    pub fn last_published(&self) -> Option<Arc<RobotState>> {
        self.inner.last_published.load_full()
    }
}

impl Drop for FleetClient {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl std::fmt::Debug for FleetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetClient")
            .field("robot_name", &self.inner.config.robot_name)
            .field("state", &self.state())
            .field("providers", &self.provider_names())
            .finish_non_exhaustive()
    }
}

impl ClientInner {
    fn check_created(lifecycle: &Lifecycle) -> Result<(), ClientError> {
        match lifecycle.state {
            ClientState::Created => Ok(()),
            ClientState::Running => Err(ClientError::AlreadyRunning),
            ClientState::Stopped => Err(ClientError::AlreadyStopped),
        }
    }

    fn start(self: &Arc<Self>) -> Result<RunHandle, ClientError> {
        let mut lifecycle = self.lifecycle.lock();
        Self::check_created(&lifecycle)?;

        // 回调只持有 Weak，避免 传输层 → 回调 → 客户端 的引用环
        let weak = Arc::downgrade(self);
        let subscribed = self.transport.subscribe(
            &self.command_topic,
            Arc::new(move |payload: Bytes| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_command_payload(&payload);
                }
            }),
        );
        if let Err(e) = subscribed {
            if e.is_fatal() {
                lifecycle.state = ClientState::Stopped;
                lifecycle.failure = Some(e.clone());
            }
            return Err(ClientError::Transport(e));
        }

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        lifecycle.state = ClientState::Running;
        lifecycle.shutdown_tx = Some(shutdown_tx);

        let mut spawn_error = None;
        let entries = self.providers.read().clone();
        for entry in entries {
            let inner = self.clone();
            let rx = shutdown_rx.clone();
            let name = format!("fleet-sampler-{}", entry.name);
            match std::thread::Builder::new()
                .name(name.clone())
                .spawn(move || sampler_loop(inner, entry, rx))
            {
                Ok(handle) => lifecycle.workers.push(handle),
                Err(source) => {
                    spawn_error = Some(ClientError::Spawn { name, source });
                    break;
                },
            }
        }

        if spawn_error.is_none() {
            let inner = self.clone();
            match std::thread::Builder::new()
                .name("fleet-publisher".into())
                .spawn(move || publish_loop(inner, shutdown_rx, done_tx))
            {
                Ok(handle) => lifecycle.workers.push(handle),
                Err(source) => {
                    spawn_error = Some(ClientError::Spawn {
                        name: "fleet-publisher".into(),
                        source,
                    });
                },
            }
        }

        let sampler_count = self.providers.read().len();
        drop(lifecycle);

        if let Some(e) = spawn_error {
            error!("Failed to start fleet client: {}", e);
            self.stop();
            return Err(e);
        }

        info!(
            robot = %self.config.robot_name,
            state_topic = %self.state_topic,
            command_topic = %self.command_topic,
            samplers = sampler_count,
            "Fleet client started"
        );
        Ok(RunHandle {
            inner: self.clone(),
            done_rx,
        })
    }

    fn stop(&self) {
        let workers = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == ClientState::Stopped {
                return;
            }
            lifecycle.state = ClientState::Stopped;
            drop(lifecycle.shutdown_tx.take());
            std::mem::take(&mut lifecycle.workers)
        };

        let current = std::thread::current().id();
        for worker in workers {
            // 发布线程因传输层关闭而停止时，不能 join 自己
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                warn!("Fleet client worker thread panicked");
            }
        }

        self.transport.close();
        info!(robot = %self.config.robot_name, "Fleet client stopped");
    }

    /// 传输层不可恢复时进入终态
    fn fail(&self, error: TransportError) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == ClientState::Stopped {
                return;
            }
            lifecycle.failure = Some(error.clone());
        }
        error!(robot = %self.config.robot_name, "Transport failed, stopping: {}", error);
        self.stop();
    }

    fn failure(&self) -> Option<TransportError> {
        self.lifecycle.lock().failure.clone()
    }

    fn is_stopped(&self) -> bool {
        self.lifecycle.lock().state == ClientState::Stopped
    }

    fn run_once(&self) -> Result<CycleReport, ClientError> {
        if self.is_stopped() {
            return Err(ClientError::AlreadyStopped);
        }

        let entries = self.providers.read().clone();
        let mut samples_failed = 0;
        for entry in &entries {
            if !self.sample_entry(entry) {
                samples_failed += 1;
            }
        }

        Ok(CycleReport {
            samples_attempted: entries.len(),
            samples_failed,
            publish: self.publish_snapshot(),
        })
    }

    fn sample_entry(&self, entry: &ProviderEntry) -> bool {
        let ok = (entry.sample)();
        if ok {
            ClientMetrics::incr(&self.metrics.samples_ok);
        } else {
            ClientMetrics::incr(&self.metrics.sample_failures);
        }
        ok
    }

    fn build_snapshot(&self, promote: bool) -> RobotState {
        let mut state = RobotState::new(self.config.robot_name.clone());
        state.time = Some(now_millis());

        let mut has_value = false;
        for entry in self.providers.read().iter() {
            has_value |= (entry.fill)(&mut state);
        }
        if promote && has_value && self.tasks.promote_if_uninitialized() {
            info!(robot = %self.config.robot_name, "First state sample received, status idle");
        }
        self.tasks.fill(&mut state);
        state
    }

    fn publish_snapshot(&self) -> PublishOutcome {
        let snapshot = self.build_snapshot(true);
        let payload = match encode_state(&snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                ClientMetrics::incr(&self.metrics.invalid_states);
                self.reporter.report(
                    COMPONENT_STATE,
                    &format!("Dropping malformed outgoing state: {}", e),
                );
                return PublishOutcome::InvalidState;
            },
        };

        match self.transport.publish(&self.state_topic, Bytes::from(payload)) {
            Ok(()) => {
                ClientMetrics::incr(&self.metrics.publish_ok);
                debug!(topic = %self.state_topic, status = ?snapshot.status, "State published");
                self.last_published.store(Some(Arc::new(snapshot)));
                PublishOutcome::Published
            },
            Err(e) => {
                ClientMetrics::incr(&self.metrics.publish_failures);
                self.reporter.report(
                    COMPONENT_TRANSPORT,
                    &format!("Failed to publish state on {}: {}", self.state_topic, e),
                );
                if e.is_fatal() {
                    self.fail(e.clone());
                }
                PublishOutcome::Failed(e)
            },
        }
    }

    fn handle_command_payload(&self, payload: &[u8]) -> CommandOutcome {
        let command = match decode_command(payload) {
            Ok(command) => command,
            Err(e) => {
                ClientMetrics::incr(&self.metrics.commands_rejected);
                self.reporter
                    .report(COMPONENT_COMMAND, &format!("Dropping command: {}", e));
                return CommandOutcome::Rejected;
            },
        };

        debug!(
            kind = command.kind().wire_tag(),
            task_id = command.task_id(),
            "Command received"
        );
        let outcome = self.dispatcher.dispatch(&command);
        match outcome {
            CommandOutcome::Dispatched(_) => {
                ClientMetrics::incr(&self.metrics.commands_dispatched);
            },
            CommandOutcome::Unhandled(kind) => {
                ClientMetrics::incr(&self.metrics.commands_unhandled);
                self.reporter.report(
                    COMPONENT_COMMAND,
                    &format!(
                        "No handler for {} (task {})",
                        kind.wire_tag(),
                        command.task_id()
                    ),
                );
            },
            CommandOutcome::Rejected => {},
        }
        outcome
    }
}

/// 后台运行句柄
///
/// 丢弃句柄不会停止客户端；客户端本身被丢弃时才会停止。
pub struct RunHandle {
    inner: Arc<ClientInner>,
    /// 发布线程退出时断开
    done_rx: Receiver<()>,
}

impl RunHandle {
    /// 停止客户端（幂等）
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_running(&self) -> bool {
        !self.inner.is_stopped()
    }

    /// 最多等待 `timeout`，返回后台循环是否已结束
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.done_rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// 阻塞直到后台循环结束
    ///
    /// # 错误
    /// 因传输层关闭而终止时返回 `ClientError::Transport`
    pub fn wait(self) -> Result<(), ClientError> {
        // 发布线程退出时 done_tx 被丢弃，recv 返回 Err
        let _ = self.done_rx.recv();
        self.inner.stop();
        match self.inner.failure() {
            Some(e) => Err(ClientError::Transport(e)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn sampler_loop(inner: Arc<ClientInner>, entry: ProviderEntry, shutdown: Receiver<()>) {
    let interval = entry.interval.max(MIN_LOOP_INTERVAL);
    debug!(provider = %entry.name, ?interval, "Sampler loop started");
    loop {
        inner.sample_entry(&entry);
        match shutdown.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }
    debug!(provider = %entry.name, "Sampler loop exited");
}

fn publish_loop(inner: Arc<ClientInner>, shutdown: Receiver<()>, _done: Sender<()>) {
    let interval = inner.config.publish_interval().max(MIN_LOOP_INTERVAL);
    loop {
        match shutdown.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {},
            _ => break,
        }
        if let PublishOutcome::Failed(e) = inner.publish_snapshot()
            && e.is_fatal()
        {
            break;
        }
    }
    debug!("Publish loop exited");
}

/// 当前时间（Unix 纪元毫秒）
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
